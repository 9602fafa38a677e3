pub mod generator;

use bracket_geometry::prelude::Point;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::{
    config::RoomGeometry,
    geom::{WorldPoint, WorldRect},
};

pub use generator::{GenerationError, LevelGraphGenerator};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    North,
    East,
    South,
    West,
}

pub const CARDINALS: [Direction; 4] = [
    Direction::North,
    Direction::East,
    Direction::South,
    Direction::West,
];

impl Direction {
    pub fn opposite(self) -> Self {
        match self {
            Direction::North => Direction::South,
            Direction::East => Direction::West,
            Direction::South => Direction::North,
            Direction::West => Direction::East,
        }
    }

    /// Lattice step; north is +y to match world space.
    pub fn delta(self) -> Point {
        match self {
            Direction::North => Point::new(0, 1),
            Direction::East => Point::new(1, 0),
            Direction::South => Point::new(0, -1),
            Direction::West => Point::new(-1, 0),
        }
    }

    pub fn index(self) -> usize {
        match self {
            Direction::North => 0,
            Direction::East => 1,
            Direction::South => 2,
            Direction::West => 3,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::North => "north",
            Direction::East => "east",
            Direction::South => "south",
            Direction::West => "west",
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Archetype {
    Start,
    Shop,
    Boss,
    Generic,
}

impl Archetype {
    pub fn as_str(&self) -> &'static str {
        match self {
            Archetype::Start => "start",
            Archetype::Shop => "shop",
            Archetype::Boss => "boss",
            Archetype::Generic => "generic",
        }
    }
}

/// Upper bound on `width * height` for a room lattice.
pub const MAX_LATTICE_SLOTS: i32 = 1 << 16;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RoomId(pub usize);

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct RoomSlot {
    pub coord: Point,
    pub occupied: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PlacedRoom {
    pub id: RoomId,
    pub coord: Point,
    pub archetype: Archetype,
    pub prefab: Option<u32>,
}

/// Generator output: the lattice plus every placed room, Start first.
#[derive(Clone, Debug)]
pub struct LevelLayout {
    pub width: i32,
    pub height: i32,
    pub start: Point,
    cells: Vec<Option<RoomId>>,
    rooms: Vec<PlacedRoom>,
}

impl LevelLayout {
    pub(crate) fn with_start(width: i32, height: i32, start: Point) -> Self {
        let mut layout = Self {
            width,
            height,
            start,
            cells: vec![None; width.max(0) as usize * height.max(0) as usize],
            rooms: Vec::new(),
        };
        layout.place(start, Archetype::Start, None);
        layout
    }

    fn idx(&self, point: Point) -> Option<usize> {
        if self.in_bounds(point) {
            Some((point.y * self.width + point.x) as usize)
        } else {
            None
        }
    }

    pub fn in_bounds(&self, point: Point) -> bool {
        point.x >= 0 && point.x < self.width && point.y >= 0 && point.y < self.height
    }

    pub fn is_occupied(&self, point: Point) -> bool {
        self.idx(point)
            .and_then(|idx| self.cells[idx])
            .is_some()
    }

    pub(crate) fn place(
        &mut self,
        coord: Point,
        archetype: Archetype,
        prefab: Option<u32>,
    ) -> Option<RoomId> {
        let idx = self.idx(coord)?;
        if self.cells[idx].is_some() {
            return None;
        }
        let id = RoomId(self.rooms.len());
        self.cells[idx] = Some(id);
        self.rooms.push(PlacedRoom {
            id,
            coord,
            archetype,
            prefab,
        });
        Some(id)
    }

    pub fn room_at(&self, coord: Point) -> Option<&PlacedRoom> {
        let id = self.idx(coord).and_then(|idx| self.cells[idx])?;
        self.rooms.get(id.0)
    }

    pub fn rooms(&self) -> &[PlacedRoom] {
        &self.rooms
    }

    pub fn occupied_count(&self) -> usize {
        self.rooms.len()
    }

    pub fn count_of(&self, archetype: Archetype) -> usize {
        self.rooms
            .iter()
            .filter(|room| room.archetype == archetype)
            .count()
    }

    pub fn slots(&self) -> impl Iterator<Item = RoomSlot> + '_ {
        (0..self.height).flat_map(move |y| {
            (0..self.width).map(move |x| {
                let coord = Point::new(x, y);
                RoomSlot {
                    coord,
                    occupied: self.is_occupied(coord),
                }
            })
        })
    }

    pub fn lattice_neighbors(&self, coord: Point) -> SmallVec<[Point; 4]> {
        CARDINALS
            .iter()
            .map(|dir| coord + dir.delta())
            .filter(|point| self.in_bounds(*point))
            .collect()
    }

    pub fn room_bounds(&self, coord: Point, geometry: &RoomGeometry) -> WorldRect {
        let center = WorldPoint::new(
            coord.x as f32 * geometry.room_width,
            coord.y as f32 * geometry.room_height,
        );
        WorldRect::from_center_size(center, geometry.room_width, geometry.room_height)
    }

    /// Bounding box of every placed room.
    pub fn world_bounds(&self, geometry: &RoomGeometry) -> WorldRect {
        let start = self.room_bounds(self.start, geometry);
        self.rooms
            .iter()
            .map(|room| self.room_bounds(room.coord, geometry))
            .fold(start, |acc, rect| acc.union(&rect))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opposite_round_trips() {
        for dir in CARDINALS {
            assert_eq!(dir.opposite().opposite(), dir);
            assert_eq!(dir.delta() + dir.opposite().delta(), Point::new(0, 0));
        }
    }

    #[test]
    fn place_rejects_occupied_and_out_of_bounds() {
        let mut layout = LevelLayout::with_start(3, 3, Point::new(1, 1));
        assert!(layout.place(Point::new(1, 1), Archetype::Shop, None).is_none());
        assert!(layout.place(Point::new(3, 0), Archetype::Shop, None).is_none());
        let id = layout.place(Point::new(0, 1), Archetype::Shop, None).unwrap();
        assert_eq!(id, RoomId(1));
        assert_eq!(layout.room_at(Point::new(0, 1)).unwrap().archetype, Archetype::Shop);
        assert_eq!(layout.slots().filter(|slot| slot.occupied).count(), 2);
    }

    #[test]
    fn world_bounds_span_rooms() {
        let mut layout = LevelLayout::with_start(4, 4, Point::new(0, 0));
        layout.place(Point::new(1, 0), Archetype::Generic, Some(0));
        let geometry = RoomGeometry::default();
        let bounds = layout.world_bounds(&geometry);
        assert_eq!(bounds.min, WorldPoint::new(-8.0, -5.0));
        assert_eq!(bounds.max, WorldPoint::new(24.0, 5.0));
    }

    #[test]
    fn corner_has_two_lattice_neighbors() {
        let layout = LevelLayout::with_start(4, 4, Point::new(0, 0));
        assert_eq!(layout.lattice_neighbors(Point::new(0, 0)).len(), 2);
        assert_eq!(layout.lattice_neighbors(Point::new(1, 1)).len(), 4);
    }
}
