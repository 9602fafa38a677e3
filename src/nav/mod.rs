pub mod collision;
pub mod planner;

use bracket_geometry::prelude::Point;
use bracket_pathfinding::prelude::{Algorithm2D, BaseMap, DistanceAlg};
use smallvec::SmallVec;
use thiserror::Error;

use crate::{
    config::GridConfig,
    geom::{WorldPoint, WorldRect},
};

pub use collision::{Collider, ColliderId, ColliderSet, CollisionLayer, LayerMask, Shape};
pub use planner::{NoPathReason, Path, PathPlanner, PathResult};

pub const STRAIGHT_COST: i32 = 10;
pub const DIAGONAL_COST: i32 = 14;
/// Upper bound on `width * height` cells for one grid.
pub const MAX_GRID_CELLS: i32 = 1 << 24;

const STEPS: [(i32, i32); 8] = [
    (1, 0),
    (-1, 0),
    (0, 1),
    (0, -1),
    (1, 1),
    (1, -1),
    (-1, 1),
    (-1, -1),
];

#[derive(Debug, Error, PartialEq)]
pub enum GridError {
    #[error("cell diameter must be positive, got {0}")]
    InvalidCellDiameter(f32),
    #[error("grid of {width}x{height} world units cannot hold a {cell_diameter}-unit cell")]
    InvalidSize {
        width: f32,
        height: f32,
        cell_diameter: f32,
    },
    #[error("grid of {width}x{height} cells exceeds the cell limit")]
    TooManyCells { width: i32, height: i32 },
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct NavCell {
    pub coord: Point,
    pub world: WorldPoint,
    pub walkable: bool,
}

#[derive(Clone, Debug)]
struct GridLayout {
    origin: WorldPoint,
    width: i32,
    height: i32,
    cells: Vec<NavCell>,
}

/// Uniform occupancy grid sampled from a [`CollisionLayer`].
#[derive(Clone, Debug)]
pub struct NavigationGrid {
    config: GridConfig,
    layout: Option<GridLayout>,
}

impl NavigationGrid {
    pub fn new(config: GridConfig) -> Self {
        Self {
            config,
            layout: None,
        }
    }

    pub fn config(&self) -> &GridConfig {
        &self.config
    }

    pub fn build_over(
        &mut self,
        bounds: WorldRect,
        collision: &impl CollisionLayer,
    ) -> Result<(), GridError> {
        self.build(
            bounds.center(),
            WorldPoint::new(bounds.width(), bounds.height()),
            collision,
        )
    }

    /// Samples every cell. A failed build leaves the grid unbuilt.
    pub fn build(
        &mut self,
        center: WorldPoint,
        size: WorldPoint,
        collision: &impl CollisionLayer,
    ) -> Result<(), GridError> {
        self.layout = None;
        let diameter = self.config.cell_diameter;
        if !(diameter > 0.0) {
            return Err(GridError::InvalidCellDiameter(diameter));
        }
        let width = (size.x / diameter).round() as i32;
        let height = (size.y / diameter).round() as i32;
        if width <= 0 || height <= 0 || size.x < diameter || size.y < diameter {
            return Err(GridError::InvalidSize {
                width: size.x,
                height: size.y,
                cell_diameter: diameter,
            });
        }

        let count = match width.checked_mul(height) {
            Some(count) if count <= MAX_GRID_CELLS => count as usize,
            _ => return Err(GridError::TooManyCells { width, height }),
        };

        let origin = center.offset(-size.x * 0.5, -size.y * 0.5);
        let mut cells = Vec::with_capacity(count);
        for y in 0..height {
            for x in 0..width {
                let world = origin.offset(
                    x as f32 * diameter + diameter * 0.5,
                    y as f32 * diameter + diameter * 0.5,
                );
                cells.push(NavCell {
                    coord: Point::new(x, y),
                    world,
                    walkable: self.sample(world, collision),
                });
            }
        }
        self.layout = Some(GridLayout {
            origin,
            width,
            height,
            cells,
        });
        Ok(())
    }

    fn sample(&self, world: WorldPoint, collision: &impl CollisionLayer) -> bool {
        let radius = self.cell_radius() + self.config.overlap_buffer;
        !collision.overlaps_disc(world, radius, self.config.unwalkable_mask)
    }

    pub fn is_built(&self) -> bool {
        self.layout.is_some()
    }

    pub fn width(&self) -> i32 {
        self.layout.as_ref().map_or(0, |layout| layout.width)
    }

    pub fn height(&self) -> i32 {
        self.layout.as_ref().map_or(0, |layout| layout.height)
    }

    pub fn cell_diameter(&self) -> f32 {
        self.config.cell_diameter
    }

    pub fn cell_radius(&self) -> f32 {
        self.config.cell_diameter * 0.5
    }

    pub fn origin(&self) -> Option<WorldPoint> {
        self.layout.as_ref().map(|layout| layout.origin)
    }

    pub fn cells(&self) -> &[NavCell] {
        self.layout
            .as_ref()
            .map_or(&[], |layout| layout.cells.as_slice())
    }

    pub fn in_grid(&self, coord: Point) -> bool {
        coord.x >= 0 && coord.x < self.width() && coord.y >= 0 && coord.y < self.height()
    }

    pub fn index_of(&self, coord: Point) -> Option<usize> {
        if self.in_grid(coord) {
            Some((coord.y * self.width() + coord.x) as usize)
        } else {
            None
        }
    }

    pub fn cell(&self, coord: Point) -> Option<&NavCell> {
        let idx = self.index_of(coord)?;
        self.cells().get(idx)
    }

    pub fn is_walkable(&self, coord: Point) -> bool {
        self.cell(coord).is_some_and(|cell| cell.walkable)
    }

    pub fn walkable_count(&self) -> usize {
        self.cells().iter().filter(|cell| cell.walkable).count()
    }

    /// Clamped world-to-cell lookup; `None` only before the grid is built.
    pub fn cell_from_world(&self, position: WorldPoint) -> Option<Point> {
        let layout = self.layout.as_ref()?;
        let diameter = self.config.cell_diameter;
        let x = ((position.x - layout.origin.x) / diameter).floor() as i32;
        let y = ((position.y - layout.origin.y) / diameter).floor() as i32;
        Some(Point::new(
            x.clamp(0, layout.width - 1),
            y.clamp(0, layout.height - 1),
        ))
    }

    pub fn world_of(&self, coord: Point) -> Option<WorldPoint> {
        self.cell(coord).map(|cell| cell.world)
    }

    /// Re-samples the cell nearest `position`. Returns true if it flipped.
    pub fn update_single(&mut self, position: WorldPoint, collision: &impl CollisionLayer) -> bool {
        let Some(coord) = self.cell_from_world(position) else {
            return false;
        };
        self.resample(coord, collision)
    }

    /// Re-samples every cell whose center lies within `radius` plus the
    /// sampling radius of `position`. Returns how many cells flipped.
    pub fn update_region(
        &mut self,
        position: WorldPoint,
        radius: f32,
        collision: &impl CollisionLayer,
    ) -> usize {
        let reach = radius.max(0.0) + self.cell_radius() + self.config.overlap_buffer;
        let (Some(low), Some(high)) = (
            self.cell_from_world(position.offset(-reach, -reach)),
            self.cell_from_world(position.offset(reach, reach)),
        ) else {
            return 0;
        };

        let mut flipped = 0;
        for y in low.y..=high.y {
            for x in low.x..=high.x {
                let coord = Point::new(x, y);
                let inside = self
                    .world_of(coord)
                    .is_some_and(|world| world.distance_squared(position) <= reach * reach);
                if inside && self.resample(coord, collision) {
                    flipped += 1;
                }
            }
        }
        flipped
    }

    pub fn notify_obstacle_placed(
        &mut self,
        position: WorldPoint,
        radius: f32,
        collision: &impl CollisionLayer,
    ) -> usize {
        self.update_region(position, radius, collision)
    }

    /// The obstacle's collider must already be disabled or removed.
    pub fn notify_obstacle_removed(
        &mut self,
        position: WorldPoint,
        radius: f32,
        collision: &impl CollisionLayer,
    ) -> usize {
        self.update_region(position, radius, collision)
    }

    fn resample(&mut self, coord: Point, collision: &impl CollisionLayer) -> bool {
        let Some(idx) = self.index_of(coord) else {
            return false;
        };
        let Some(world) = self.world_of(coord) else {
            return false;
        };
        let walkable = self.sample(world, collision);
        let Some(layout) = self.layout.as_mut() else {
            return false;
        };
        let cell = &mut layout.cells[idx];
        let flipped = cell.walkable != walkable;
        cell.walkable = walkable;
        flipped
    }

    /// Walkable 8-connected steps out of `coord` with their fixed-point
    /// cost. Diagonals need both orthogonal cells open.
    pub fn neighbors(&self, coord: Point) -> SmallVec<[(Point, i32); 8]> {
        let mut exits = SmallVec::new();
        for (dx, dy) in STEPS {
            let dest = Point::new(coord.x + dx, coord.y + dy);
            if !self.is_walkable(dest) {
                continue;
            }
            if dx != 0 && dy != 0 {
                let side_a = Point::new(coord.x + dx, coord.y);
                let side_b = Point::new(coord.x, coord.y + dy);
                if !(self.is_walkable(side_a) && self.is_walkable(side_b)) {
                    continue;
                }
                exits.push((dest, DIAGONAL_COST));
            } else {
                exits.push((dest, STRAIGHT_COST));
            }
        }
        exits
    }
}

impl BaseMap for NavigationGrid {
    fn is_opaque(&self, idx: usize) -> bool {
        self.cells().get(idx).is_none_or(|cell| !cell.walkable)
    }

    fn get_available_exits(&self, idx: usize) -> SmallVec<[(usize, f32); 10]> {
        let mut exits = SmallVec::new();
        let Some(cell) = self.cells().get(idx) else {
            return exits;
        };
        for (dest, cost) in self.neighbors(cell.coord) {
            if let Some(dest_idx) = self.index_of(dest) {
                exits.push((dest_idx, cost as f32 / STRAIGHT_COST as f32));
            }
        }
        exits
    }

    fn get_pathing_distance(&self, idx1: usize, idx2: usize) -> f32 {
        let p1 = self.index_to_point2d(idx1);
        let p2 = self.index_to_point2d(idx2);
        DistanceAlg::Pythagoras.distance2d(p1, p2)
    }
}

impl Algorithm2D for NavigationGrid {
    fn dimensions(&self) -> Point {
        Point::new(self.width(), self.height())
    }

    fn in_bounds(&self, point: Point) -> bool {
        self.in_grid(point)
    }
}
