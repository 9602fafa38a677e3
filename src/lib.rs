//! Room-lattice dungeon core: level generation, door locking driven by room
//! occupancy and pressure, and grid pathfinding over the assembled level.

pub mod config;
pub mod context;
pub mod ecs;
pub mod events;
pub mod geom;
pub mod level;
pub mod map;
pub mod nav;
pub mod pressure;
pub mod rooms;
pub mod scripted_input;

pub use config::{ConfigError, DungeonConfig};
pub use context::SimContext;
pub use ecs::DungeonRun;
pub use events::{DungeonEvent, EventBus, EventSink};
pub use geom::{WorldPoint, WorldRect};
pub use level::{BuildError, Level};
pub use map::{Archetype, Direction, LevelGraphGenerator, LevelLayout, RoomId};
pub use nav::{NavigationGrid, PathPlanner, PathResult};
pub use pressure::{PressureGate, PressureLevel};
pub use rooms::{RoomGraph, RoomState};
