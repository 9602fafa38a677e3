//! Room lifecycle and door locking.
//!
//! Rooms are instantiated from a [`LevelLayout`] as [`UnlinkedRooms`], which
//! carry no door logic at all. [`UnlinkedRooms::link`] resolves every
//! neighbor reference in one pass and only then hands out a [`RoomGraph`],
//! so no transition can ever observe a half-linked graph.

pub mod door;
pub mod spawn;

use std::collections::HashMap;

use bracket_geometry::prelude::Point;
use log::debug;
use smallvec::SmallVec;
use thiserror::Error;

use crate::{
    config::{PressureConfig, RoomGeometry},
    events::{DungeonEvent, EventSink},
    geom::{WorldPoint, WorldRect},
    map::{Archetype, CARDINALS, Direction, LevelLayout, PlacedRoom, RoomId},
    pressure::{PressureGate, PressureSignal},
};

pub use door::{Door, DoorSurface};
pub use spawn::{SpawnSource, SpawnSourceId};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RoomError {
    #[error("no room with id {0:?}")]
    UnknownRoom(RoomId),
    #[error("no spawn source {0:?}")]
    UnknownSpawnSource(SpawnSourceId),
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct OccupantId(pub u64);

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum RoomState {
    Dormant,
    Locked,
    Cleared,
    Stabilized,
}

impl RoomState {
    pub fn as_str(&self) -> &'static str {
        match self {
            RoomState::Dormant => "dormant",
            RoomState::Locked => "locked",
            RoomState::Cleared => "cleared",
            RoomState::Stabilized => "stabilized",
        }
    }
}

#[derive(Clone, Debug)]
pub struct RoomNode {
    pub id: RoomId,
    pub coord: Point,
    pub bounds: WorldRect,
    pub archetype: Archetype,
    pub prefab: Option<u32>,
    doors: [Door; 4],
    state: RoomState,
    gate: PressureGate,
    /// Occupant -> counts toward clearance.
    occupants: HashMap<OccupantId, bool>,
    spawn_sources: Vec<SpawnSource>,
    always_open: bool,
    tutorial_locked: bool,
    player_entered: bool,
}

impl RoomNode {
    fn new(
        placed: &PlacedRoom,
        bounds: WorldRect,
        pressure: &PressureConfig,
    ) -> Self {
        Self {
            id: placed.id,
            coord: placed.coord,
            bounds,
            archetype: placed.archetype,
            prefab: placed.prefab,
            doors: CARDINALS.map(|dir| Door::new(dir, None)),
            state: RoomState::Dormant,
            gate: PressureGate::new(pressure.clone()),
            occupants: HashMap::new(),
            spawn_sources: Vec::new(),
            always_open: matches!(placed.archetype, Archetype::Start | Archetype::Shop),
            tutorial_locked: false,
            player_entered: false,
        }
    }

    pub fn state(&self) -> RoomState {
        self.state
    }

    pub fn is_cleared(&self) -> bool {
        self.state == RoomState::Cleared
    }

    pub fn player_has_entered(&self) -> bool {
        self.player_entered
    }

    pub fn is_always_open(&self) -> bool {
        self.always_open
    }

    pub fn is_tutorial_locked(&self) -> bool {
        self.tutorial_locked
    }

    pub fn door(&self, direction: Direction) -> &Door {
        &self.doors[direction.index()]
    }

    pub fn doors(&self) -> &[Door; 4] {
        &self.doors
    }

    pub fn gate(&self) -> &PressureGate {
        &self.gate
    }

    pub fn pressure(&self) -> f32 {
        self.gate.pressure()
    }

    pub fn occupant_count(&self) -> usize {
        self.occupants.len()
    }

    pub fn counting_occupants(&self) -> usize {
        self.occupants.values().filter(|counts| **counts).count()
    }

    pub fn spawn_sources(&self) -> &[SpawnSource] {
        &self.spawn_sources
    }

    pub fn has_active_spawns(&self) -> bool {
        self.spawn_sources.iter().any(SpawnSource::is_active)
    }

    fn clearance_met(&self) -> bool {
        self.counting_occupants() == 0 && !self.has_active_spawns()
    }

    fn doors_should_open(&self) -> bool {
        !self.tutorial_locked && matches!(self.state, RoomState::Dormant | RoomState::Cleared)
    }
}

/// Phase one: rooms exist but no door knows its neighbor.
#[derive(Debug)]
pub struct UnlinkedRooms {
    rooms: Vec<RoomNode>,
    lattice: HashMap<Point, RoomId>,
}

impl UnlinkedRooms {
    pub fn instantiate(
        layout: &LevelLayout,
        geometry: &RoomGeometry,
        pressure: &PressureConfig,
    ) -> Self {
        let rooms: Vec<RoomNode> = layout
            .rooms()
            .iter()
            .map(|placed| {
                RoomNode::new(placed, layout.room_bounds(placed.coord, geometry), pressure)
            })
            .collect();
        let lattice = rooms.iter().map(|room| (room.coord, room.id)).collect();
        Self { rooms, lattice }
    }

    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }

    /// Phase two: resolve every 4-directional neighbor, then hand out the
    /// live graph.
    pub fn link(mut self) -> RoomGraph {
        let lattice = &self.lattice;
        for room in self.rooms.iter_mut() {
            let coord = room.coord;
            room.doors =
                CARDINALS.map(|dir| Door::new(dir, lattice.get(&(coord + dir.delta())).copied()));
        }
        let edges = self
            .rooms
            .iter()
            .flat_map(|room| room.doors.iter())
            .filter(|door| !door.is_wall())
            .count()
            / 2;
        debug!("linked {} rooms with {} edges", self.rooms.len(), edges);
        RoomGraph {
            rooms: self.rooms,
            lattice: self.lattice,
        }
    }
}

/// Phase-two graph: adjacency is fixed and door transitions are live.
#[derive(Clone, Debug)]
pub struct RoomGraph {
    rooms: Vec<RoomNode>,
    lattice: HashMap<Point, RoomId>,
}

impl RoomGraph {
    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }

    pub fn rooms(&self) -> &[RoomNode] {
        &self.rooms
    }

    pub fn room(&self, id: RoomId) -> Option<&RoomNode> {
        self.rooms.get(id.0)
    }

    fn room_mut(&mut self, id: RoomId) -> Result<&mut RoomNode, RoomError> {
        self.rooms.get_mut(id.0).ok_or(RoomError::UnknownRoom(id))
    }

    fn get(&self, id: RoomId) -> Result<&RoomNode, RoomError> {
        self.rooms.get(id.0).ok_or(RoomError::UnknownRoom(id))
    }

    pub fn room_at(&self, coord: Point) -> Option<RoomId> {
        self.lattice.get(&coord).copied()
    }

    pub fn room_containing(&self, point: WorldPoint) -> Option<RoomId> {
        self.rooms
            .iter()
            .find(|room| room.bounds.contains(point))
            .map(|room| room.id)
    }

    pub fn neighbor(&self, id: RoomId, direction: Direction) -> Option<RoomId> {
        self.room(id)?.door(direction).neighbor()
    }

    pub fn neighbors(&self, id: RoomId) -> SmallVec<[(Direction, RoomId); 4]> {
        self.room(id)
            .map(|room| {
                room.doors
                    .iter()
                    .filter_map(|door| door.neighbor().map(|n| (door.direction(), n)))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn state(&self, id: RoomId) -> Result<RoomState, RoomError> {
        self.get(id).map(RoomNode::state)
    }

    pub fn is_cleared(&self, id: RoomId) -> Result<bool, RoomError> {
        self.get(id).map(RoomNode::is_cleared)
    }

    pub fn player_has_entered(&self, id: RoomId) -> Result<bool, RoomError> {
        self.get(id).map(RoomNode::player_has_entered)
    }

    pub fn set_always_open(&mut self, id: RoomId, always_open: bool) -> Result<(), RoomError> {
        self.room_mut(id)?.always_open = always_open;
        Ok(())
    }

    pub fn register_occupant(
        &mut self,
        id: RoomId,
        occupant: OccupantId,
        counts_toward_clearance: bool,
    ) -> Result<(), RoomError> {
        let room = self.room_mut(id)?;
        room.occupants.insert(occupant, counts_toward_clearance);
        Ok(())
    }

    /// Returns whether the occupant was registered here.
    pub fn occupant_removed(
        &mut self,
        id: RoomId,
        occupant: OccupantId,
        sink: &mut impl EventSink,
    ) -> Result<bool, RoomError> {
        let room = self.room_mut(id)?;
        if room.occupants.remove(&occupant).is_none() {
            return Ok(false);
        }
        let signal = room.gate.on_occupant_removed();
        self.apply_signals(id, signal, sink);
        self.evaluate_clearance(id, sink);
        Ok(true)
    }

    pub fn notify_damaged(&mut self, id: RoomId, sink: &mut impl EventSink) -> Result<(), RoomError> {
        let signal = self.room_mut(id)?.gate.on_agent_damaged();
        self.apply_signals(id, signal, sink);
        Ok(())
    }

    pub fn notify_missed(
        &mut self,
        id: RoomId,
        amount: f32,
        sink: &mut impl EventSink,
    ) -> Result<(), RoomError> {
        let signal = self.room_mut(id)?.gate.on_missed(amount);
        self.apply_signals(id, signal, sink);
        Ok(())
    }

    pub fn add_spawn_source(
        &mut self,
        id: RoomId,
        mut source: SpawnSource,
    ) -> Result<SpawnSourceId, RoomError> {
        let room = self.room_mut(id)?;
        if matches!(room.state, RoomState::Cleared | RoomState::Stabilized) {
            source.disable();
        }
        room.spawn_sources.push(source);
        Ok(SpawnSourceId {
            room: id,
            index: room.spawn_sources.len() - 1,
        })
    }

    pub fn disable_spawn_source(
        &mut self,
        source: SpawnSourceId,
        sink: &mut impl EventSink,
    ) -> Result<(), RoomError> {
        let room = self
            .rooms
            .get_mut(source.room.0)
            .ok_or(RoomError::UnknownSpawnSource(source))?;
        room.spawn_sources
            .get_mut(source.index)
            .ok_or(RoomError::UnknownSpawnSource(source))?
            .disable();
        self.evaluate_clearance(source.room, sink);
        Ok(())
    }

    /// First-entry transition. Re-entering a room changes nothing.
    pub fn player_entered(
        &mut self,
        id: RoomId,
        sink: &mut impl EventSink,
    ) -> Result<RoomState, RoomError> {
        let room = self.room_mut(id)?;
        if room.player_entered {
            return Ok(room.state);
        }
        room.player_entered = true;
        sink.emit(DungeonEvent::RoomEntered { room: id });

        let opens_freely = room.always_open || room.clearance_met();
        let state = room.state;
        match state {
            RoomState::Dormant if opens_freely => {
                self.mark_cleared(id, sink);
            }
            RoomState::Dormant => {
                room.state = RoomState::Locked;
                room.gate.activate();
                debug!("room {} locked on entry", id.0);
                sink.emit(DungeonEvent::RoomLocked { room: id });
                sink.emit(DungeonEvent::PressureActivated { room: id });
                self.apply_doors(id, sink);
            }
            _ => self.apply_doors(id, sink),
        }
        Ok(self.get(id)?.state)
    }

    pub fn set_tutorial_lock(
        &mut self,
        id: RoomId,
        locked: bool,
        sink: &mut impl EventSink,
    ) -> Result<(), RoomError> {
        let room = self.room_mut(id)?;
        let released = room.tutorial_locked && !locked;
        room.tutorial_locked = locked;
        if released {
            sink.emit(DungeonEvent::TutorialReleased { room: id });
        }
        self.apply_doors(id, sink);
        Ok(())
    }

    pub fn release_tutorial_lock(
        &mut self,
        id: RoomId,
        sink: &mut impl EventSink,
    ) -> Result<(), RoomError> {
        self.set_tutorial_lock(id, false, sink)
    }

    /// Advances pressure and spawn timers for every locked room.
    pub fn tick(&mut self, dt: f32, idle: bool, sink: &mut impl EventSink) {
        for idx in 0..self.rooms.len() {
            let id = RoomId(idx);
            if self.rooms[idx].state != RoomState::Locked {
                continue;
            }

            let signals = self.rooms[idx].gate.update(dt, idle);
            for signal in signals {
                self.apply_signals(id, Some(signal), sink);
            }
            if self.rooms[idx].state != RoomState::Locked {
                continue;
            }

            let room = &mut self.rooms[idx];
            let multiplier = room.gate.spawn_rate_multiplier();
            let mut ran_dry = false;
            for (index, source) in room.spawn_sources.iter_mut().enumerate() {
                let was_active = source.is_active();
                for _ in 0..source.tick(dt, multiplier) {
                    sink.emit(DungeonEvent::SpawnRequested {
                        room: id,
                        source: SpawnSourceId { room: id, index },
                    });
                }
                ran_dry |= was_active && !source.is_active();
            }
            if ran_dry {
                self.evaluate_clearance(id, sink);
            }
        }
    }

    fn apply_signals(
        &mut self,
        id: RoomId,
        signal: Option<PressureSignal>,
        sink: &mut impl EventSink,
    ) {
        match signal {
            Some(PressureSignal::LevelChanged { from, to, pressure }) => {
                sink.emit(DungeonEvent::PressureChanged {
                    room: id,
                    from,
                    to,
                    pressure,
                });
            }
            Some(PressureSignal::Stabilized) => self.stabilize(id, sink),
            None => {}
        }
    }

    fn stabilize(&mut self, id: RoomId, sink: &mut impl EventSink) {
        let Some(room) = self.rooms.get_mut(id.0) else {
            return;
        };
        if room.state != RoomState::Locked {
            return;
        }
        room.state = RoomState::Stabilized;
        for source in room.spawn_sources.iter_mut() {
            source.disable();
        }
        debug!("room {} stabilized", id.0);
        sink.emit(DungeonEvent::RoomStabilized { room: id });
        self.evaluate_clearance(id, sink);
    }

    fn evaluate_clearance(&mut self, id: RoomId, sink: &mut impl EventSink) {
        let Some(room) = self.rooms.get(id.0) else {
            return;
        };
        if matches!(room.state, RoomState::Locked | RoomState::Stabilized) && room.clearance_met() {
            self.mark_cleared(id, sink);
        }
    }

    fn mark_cleared(&mut self, id: RoomId, sink: &mut impl EventSink) {
        let Some(room) = self.rooms.get_mut(id.0) else {
            return;
        };
        if room.state == RoomState::Cleared {
            return;
        }
        room.state = RoomState::Cleared;
        room.gate.deactivate();
        debug!("room {} cleared", id.0);
        self.apply_doors(id, sink);
        sink.emit(DungeonEvent::RoomCleared { room: id });
    }

    fn apply_doors(&mut self, id: RoomId, sink: &mut impl EventSink) {
        let Some(room) = self.rooms.get_mut(id.0) else {
            return;
        };
        let open = room.doors_should_open();
        for door in room.doors.iter_mut().filter(|door| !door.is_wall()) {
            if door.set_locked(!open) {
                sink.emit(DungeonEvent::DoorChanged {
                    room: id,
                    direction: door.direction(),
                    locked: door.is_locked(),
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use bracket_random::prelude::RandomNumberGenerator;

    use super::*;
    use crate::{
        config::GenerationConfig,
        map::LevelGraphGenerator,
        pressure::PressureLevel,
    };

    fn pressure() -> PressureConfig {
        PressureConfig {
            initial_pressure: 50.0,
            passive_rate: 0.0,
            stabilization_time: 2.0,
            minimum_survival_time: 2.0,
            ..PressureConfig::default()
        }
    }

    /// Start at (1,1) with generic rooms east and north of it.
    fn small_graph(pressure: PressureConfig) -> RoomGraph {
        let generator = LevelGraphGenerator::new(GenerationConfig {
            lattice_width: 2,
            lattice_height: 2,
            start_x: 0,
            start_y: 0,
            ..GenerationConfig::default()
        });
        let mut rng = RandomNumberGenerator::seeded(1);
        let layout = generator
            .place_deck(&[Archetype::Generic, Archetype::Generic, Archetype::Generic], &mut rng)
            .unwrap();
        UnlinkedRooms::instantiate(&layout, &RoomGeometry::default(), &pressure).link()
    }

    fn generic(graph: &RoomGraph) -> RoomId {
        graph
            .room_at(Point::new(1, 0))
            .expect("east room exists")
    }

    #[test]
    fn linking_is_symmetric() {
        let graph = small_graph(pressure());
        for room in graph.rooms() {
            for door in room.doors() {
                if let Some(neighbor) = door.neighbor() {
                    assert_eq!(
                        graph.neighbor(neighbor, door.direction().opposite()),
                        Some(room.id)
                    );
                } else {
                    assert!(door.is_locked());
                }
            }
        }
        assert_eq!(graph.neighbors(RoomId(0)).len(), 2);
    }

    #[test]
    fn empty_room_clears_on_entry() {
        let mut graph = small_graph(pressure());
        let room = generic(&graph);
        let mut events: Vec<DungeonEvent> = Vec::new();
        assert_eq!(graph.player_entered(room, &mut events).unwrap(), RoomState::Cleared);
        assert!(!events.iter().any(|e| matches!(e, DungeonEvent::RoomLocked { .. })));
        assert!(events.contains(&DungeonEvent::RoomCleared { room }));
    }

    #[test]
    fn occupied_room_locks_until_last_counting_occupant_dies() {
        let mut graph = small_graph(pressure());
        let room = generic(&graph);
        let mut events: Vec<DungeonEvent> = Vec::new();
        graph.register_occupant(room, OccupantId(1), true).unwrap();
        graph.register_occupant(room, OccupantId(2), false).unwrap();

        assert_eq!(graph.player_entered(room, &mut events).unwrap(), RoomState::Locked);
        let node = graph.room(room).unwrap();
        assert!(node.doors().iter().all(Door::is_locked));
        assert!(node.gate().is_running());

        events.clear();
        assert!(graph.occupant_removed(room, OccupantId(1), &mut events).unwrap());
        assert!(graph.is_cleared(room).unwrap());
        let node = graph.room(room).unwrap();
        assert!(node.doors().iter().filter(|d| !d.is_wall()).all(|d| !d.is_locked()));
        assert!(events.contains(&DungeonEvent::RoomCleared { room }));
        assert!(events.iter().any(|e| matches!(e, DungeonEvent::DoorChanged { locked: false, .. })));
    }

    #[test]
    fn removing_unknown_occupant_is_a_no_op() {
        let mut graph = small_graph(pressure());
        let room = generic(&graph);
        let mut events: Vec<DungeonEvent> = Vec::new();
        assert!(!graph.occupant_removed(room, OccupantId(9), &mut events).unwrap());
        assert!(events.is_empty());
    }

    #[test]
    fn active_spawner_alone_holds_room_locked() {
        let mut graph = small_graph(pressure());
        let room = generic(&graph);
        let mut events: Vec<DungeonEvent> = Vec::new();
        let source = graph.add_spawn_source(room, SpawnSource::endless(1.0)).unwrap();
        assert_eq!(graph.player_entered(room, &mut events).unwrap(), RoomState::Locked);

        events.clear();
        graph.tick(1.0, false, &mut events);
        assert!(events.contains(&DungeonEvent::SpawnRequested { room, source }));

        graph.disable_spawn_source(source, &mut events).unwrap();
        assert!(graph.is_cleared(room).unwrap());
    }

    #[test]
    fn room_clears_when_its_last_limited_spawner_runs_dry() {
        let mut graph = small_graph(pressure());
        let room = generic(&graph);
        let mut events: Vec<DungeonEvent> = Vec::new();
        let source = graph
            .add_spawn_source(room, SpawnSource::limited(1.0, 1))
            .unwrap();
        assert_eq!(graph.player_entered(room, &mut events).unwrap(), RoomState::Locked);

        events.clear();
        graph.tick(1.0, false, &mut events);
        assert_eq!(events[0], DungeonEvent::SpawnRequested { room, source });
        assert!(events.contains(&DungeonEvent::RoomCleared { room }));
        assert_eq!(graph.state(room).unwrap(), RoomState::Cleared);
        assert!(!graph.room(room).unwrap().has_active_spawns());
    }

    #[test]
    fn stabilization_disables_spawners_and_clears() {
        let mut graph = small_graph(PressureConfig {
            initial_pressure: 0.0,
            ..pressure()
        });
        let room = generic(&graph);
        let mut events: Vec<DungeonEvent> = Vec::new();
        graph.add_spawn_source(room, SpawnSource::endless(100.0)).unwrap();
        graph.player_entered(room, &mut events).unwrap();

        graph.tick(1.0, false, &mut events);
        assert_eq!(graph.state(room).unwrap(), RoomState::Locked);
        graph.tick(1.0, false, &mut events);

        assert!(events.contains(&DungeonEvent::RoomStabilized { room }));
        assert!(graph.is_cleared(room).unwrap());
        assert!(!graph.room(room).unwrap().has_active_spawns());
    }

    #[test]
    fn stabilized_room_waits_for_living_occupants() {
        let mut graph = small_graph(PressureConfig {
            initial_pressure: 0.0,
            ..pressure()
        });
        let room = generic(&graph);
        let mut events: Vec<DungeonEvent> = Vec::new();
        graph.register_occupant(room, OccupantId(4), true).unwrap();
        graph.player_entered(room, &mut events).unwrap();
        graph.tick(1.0, false, &mut events);
        graph.tick(1.0, false, &mut events);

        assert_eq!(graph.state(room).unwrap(), RoomState::Stabilized);
        assert!(graph.room(room).unwrap().door(Direction::West).is_locked());
        graph.occupant_removed(room, OccupantId(4), &mut events).unwrap();
        assert!(graph.is_cleared(room).unwrap());
    }

    #[test]
    fn tutorial_lock_holds_cleared_doors_closed() {
        let mut graph = small_graph(pressure());
        let start = RoomId(0);
        let mut events: Vec<DungeonEvent> = Vec::new();
        graph.set_tutorial_lock(start, true, &mut events).unwrap();
        assert_eq!(graph.player_entered(start, &mut events).unwrap(), RoomState::Cleared);
        assert!(graph.room(start).unwrap().doors().iter().all(Door::is_locked));

        events.clear();
        graph.release_tutorial_lock(start, &mut events).unwrap();
        assert_eq!(events[0], DungeonEvent::TutorialReleased { room: start });
        let node = graph.room(start).unwrap();
        assert!(node.doors().iter().filter(|d| !d.is_wall()).all(|d| !d.is_locked()));
    }

    #[test]
    fn pressure_crossings_surface_as_events() {
        let mut graph = small_graph(pressure());
        let room = generic(&graph);
        let mut events: Vec<DungeonEvent> = Vec::new();
        graph.register_occupant(room, OccupantId(1), true).unwrap();
        graph.player_entered(room, &mut events).unwrap();
        events.clear();

        graph.notify_missed(room, 15.0, &mut events).unwrap();
        assert_eq!(
            events,
            vec![DungeonEvent::PressureChanged {
                room,
                from: PressureLevel::Low,
                to: PressureLevel::Mid,
                pressure: 65.0,
            }]
        );
        graph.notify_damaged(room, &mut events).unwrap();
        assert_eq!(graph.room(room).unwrap().pressure(), 70.0);
    }

    #[test]
    fn unknown_rooms_are_reported() {
        let mut graph = small_graph(pressure());
        let mut events: Vec<DungeonEvent> = Vec::new();
        assert_eq!(
            graph.player_entered(RoomId(99), &mut events),
            Err(RoomError::UnknownRoom(RoomId(99)))
        );
        let missing = SpawnSourceId {
            room: RoomId(1),
            index: 5,
        };
        assert_eq!(
            graph.disable_spawn_source(missing, &mut events),
            Err(RoomError::UnknownSpawnSource(missing))
        );
    }

    #[test]
    fn room_containing_maps_world_points() {
        let graph = small_graph(pressure());
        let east = generic(&graph);
        let center = graph.room(east).unwrap().bounds.center();
        assert_eq!(graph.room_containing(center), Some(east));
        assert_eq!(graph.room_containing(WorldPoint::new(-500.0, 0.0)), None);
    }
}
