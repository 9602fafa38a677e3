//! Generation, linking, collision geometry and the navigation grid, run as
//! one fallible step before the first tick.

use std::collections::HashMap;

use log::info;
use thiserror::Error;

use crate::{
    config::{ConfigError, DungeonConfig, RoomGeometry},
    context::SimContext,
    events::DungeonEvent,
    geom::{WorldPoint, WorldRect},
    map::{CARDINALS, Direction, GenerationError, LevelLayout, RoomId},
    nav::{ColliderId, ColliderSet, GridError, LayerMask, NavigationGrid, Shape},
    rooms::{RoomGraph, UnlinkedRooms},
};

#[derive(Debug, Error)]
pub enum BuildError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Generation(#[from] GenerationError),
    #[error(transparent)]
    Grid(#[from] GridError),
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct DoorCollider {
    pub collider: ColliderId,
    pub bounds: WorldRect,
}

pub struct Level {
    pub layout: LevelLayout,
    pub graph: RoomGraph,
    pub colliders: ColliderSet,
    pub grid: NavigationGrid,
    pub bounds: WorldRect,
    doors: HashMap<(RoomId, Direction), DoorCollider>,
}

impl Level {
    pub fn assemble(ctx: &mut SimContext) -> Result<Self, BuildError> {
        let layout = ctx.generator().generate(&mut ctx.rng)?;
        Self::from_layout(layout, &ctx.config)
    }

    pub fn from_layout(layout: LevelLayout, config: &DungeonConfig) -> Result<Self, BuildError> {
        config.validate()?;
        let graph = UnlinkedRooms::instantiate(&layout, &config.geometry, &config.pressure).link();

        let mut colliders = ColliderSet::new();
        let doors = build_room_colliders(&graph, &config.geometry, &mut colliders);

        let bounds = layout.world_bounds(&config.geometry);
        let mut grid = NavigationGrid::new(config.grid.clone());
        grid.build_over(bounds, &colliders)?;

        info!(
            "assembled level: {} rooms, {} colliders, {}x{} grid ({} walkable)",
            graph.len(),
            colliders.len(),
            grid.width(),
            grid.height(),
            grid.walkable_count()
        );

        Ok(Self {
            layout,
            graph,
            colliders,
            grid,
            bounds,
            doors,
        })
    }

    pub fn door_collider(&self, room: RoomId, direction: Direction) -> Option<&DoorCollider> {
        self.doors.get(&(room, direction))
    }

    /// Mirrors a door's solid surface onto its collider, then re-samples
    /// the cells around it. Returns how many grid cells flipped.
    pub fn sync_door(&mut self, room: RoomId, direction: Direction) -> usize {
        let Some(door) = self.doors.get(&(room, direction)).copied() else {
            return 0;
        };
        let Some(solid) = self
            .graph
            .room(room)
            .map(|node| node.door(direction).surface().solid)
        else {
            return 0;
        };
        self.colliders.set_enabled(door.collider, solid);
        let half_diagonal = WorldPoint::new(0.0, 0.0)
            .distance(WorldPoint::new(door.bounds.width(), door.bounds.height()))
            * 0.5;
        self.grid
            .update_region(door.bounds.center(), half_diagonal, &self.colliders)
    }

    /// Applies the spatial side effects of a room event.
    pub fn apply_event(&mut self, event: &DungeonEvent) -> usize {
        match event {
            DungeonEvent::DoorChanged {
                room, direction, ..
            } => self.sync_door(*room, *direction),
            _ => 0,
        }
    }

    pub fn place_obstacle(&mut self, center: WorldPoint, radius: f32) -> ColliderId {
        let id = self
            .colliders
            .insert(Shape::Circle { center, radius }, LayerMask::OBSTACLE);
        self.grid
            .notify_obstacle_placed(center, radius, &self.colliders);
        id
    }

    pub fn remove_obstacle(&mut self, id: ColliderId) -> bool {
        let Some(collider) = self.colliders.remove(id) else {
            return false;
        };
        if let Shape::Circle { center, radius } = collider.shape {
            self.grid
                .notify_obstacle_removed(center, radius, &self.colliders);
        }
        true
    }
}

/// Wall segments for every room edge, split around a door gap wherever a
/// neighbor exists, plus one door collider per gap.
fn build_room_colliders(
    graph: &RoomGraph,
    geometry: &RoomGeometry,
    colliders: &mut ColliderSet,
) -> HashMap<(RoomId, Direction), DoorCollider> {
    let mut doors = HashMap::new();
    let t = geometry.wall_thickness;
    let half_door = geometry.door_width * 0.5;

    for room in graph.rooms() {
        let b = room.bounds;
        let center = b.center();
        for dir in CARDINALS {
            let door = room.door(dir);
            // (along-axis span, cross-axis span, horizontal?)
            let (along, cross, horizontal) = match dir {
                Direction::North => ((b.min.x, b.max.x), (b.max.y - t, b.max.y), true),
                Direction::South => ((b.min.x, b.max.x), (b.min.y, b.min.y + t), true),
                Direction::East => ((b.min.y, b.max.y), (b.max.x - t, b.max.x), false),
                Direction::West => ((b.min.y, b.max.y), (b.min.x, b.min.x + t), false),
            };
            let rect = |from: f32, to: f32| {
                if horizontal {
                    WorldRect::from_corners(
                        WorldPoint::new(from, cross.0),
                        WorldPoint::new(to, cross.1),
                    )
                } else {
                    WorldRect::from_corners(
                        WorldPoint::new(cross.0, from),
                        WorldPoint::new(cross.1, to),
                    )
                }
            };

            if door.is_wall() {
                colliders.insert(Shape::Box(rect(along.0, along.1)), LayerMask::WALL);
                continue;
            }

            let mid = if horizontal { center.x } else { center.y };
            colliders.insert(Shape::Box(rect(along.0, mid - half_door)), LayerMask::WALL);
            colliders.insert(Shape::Box(rect(mid + half_door, along.1)), LayerMask::WALL);
            let bounds = rect(mid - half_door, mid + half_door);
            let collider = colliders.insert(Shape::Box(bounds), LayerMask::DOOR);
            colliders.set_enabled(collider, door.surface().solid);
            doors.insert((room.id, dir), DoorCollider { collider, bounds });
        }
    }
    doors
}
