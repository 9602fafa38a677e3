pub mod components;
pub mod resources;
pub mod systems;

use specs::prelude::{Builder, Dispatcher, DispatcherBuilder, Entity, World, WorldExt};

use crate::{
    context::SimContext,
    events::{EventBus, EventSink},
    geom::WorldPoint,
    level::{BuildError, Level},
    map::RoomId,
    nav::{ColliderId, PathResult},
    rooms::{OccupantId, RoomError, RoomGraph, RoomState, SpawnSource, SpawnSourceId},
};

use self::{
    components::{IdleTracker, NavTarget, Navigator, Occupant, PlayerTag, Position},
    resources::{DeltaTime, IdleState, PendingEvents, PlayerRoom},
    systems::{DoorSyncSystem, IdleSystem, NavigatorSystem, PressureSystem, RoomTrackingSystem},
};

const HUNTER_SPEED: f32 = 3.0;
const HUNTER_REPATH: f32 = 0.5;

/// One playable level: the assembled [`Level`] lives in a specs world as a
/// resource, the player and occupants as entities. Events raised by any
/// step are forwarded to the context's [`EventBus`] before it returns.
pub struct DungeonRun {
    specs_world: World,
    dispatcher: Dispatcher<'static, 'static>,
    player: Entity,
    ctx: SimContext,
    next_occupant: u64,
    pub steps: u64,
    pub elapsed: f32,
}

impl DungeonRun {
    pub fn start(mut ctx: SimContext) -> Result<Self, BuildError> {
        let level = Level::assemble(&mut ctx)?;
        Ok(Self::new(ctx, level))
    }

    pub fn new(ctx: SimContext, level: Level) -> Self {
        let mut specs_world = World::new();
        Self::register_components(&mut specs_world);

        let spawn = level
            .graph
            .room_at(level.layout.start)
            .and_then(|id| level.graph.room(id))
            .map_or(level.bounds.center(), |room| room.bounds.center());

        specs_world.insert(level);
        specs_world.insert(ctx.planner());
        specs_world.insert(ctx.config.idle.clone());
        specs_world.insert(DeltaTime::default());
        specs_world.insert(IdleState::default());
        specs_world.insert(PlayerRoom::default());
        specs_world.insert(PendingEvents::default());

        let player = Self::spawn_player(&mut specs_world, spawn);
        let dispatcher = DispatcherBuilder::new()
            .with(RoomTrackingSystem::default(), "room_tracking", &[])
            .with(IdleSystem::default(), "idle", &[])
            .with(PressureSystem::default(), "pressure", &["room_tracking", "idle"])
            .with(DoorSyncSystem::default(), "door_sync", &["pressure"])
            .with(NavigatorSystem::default(), "navigator", &["door_sync"])
            .build();

        Self {
            specs_world,
            dispatcher,
            player,
            ctx,
            next_occupant: 0,
            steps: 0,
            elapsed: 0.0,
        }
    }

    fn register_components(world: &mut World) {
        world.register::<Position>();
        world.register::<PlayerTag>();
        world.register::<Occupant>();
        world.register::<IdleTracker>();
        world.register::<Navigator>();
    }

    fn spawn_player(world: &mut World, point: WorldPoint) -> Entity {
        world
            .create_entity()
            .with(Position { point })
            .with(IdleTracker {
                last: point,
                still_for: 0.0,
            })
            .with(PlayerTag)
            .build()
    }

    pub fn advance(&mut self, dt: f32) {
        self.specs_world.insert(DeltaTime(dt));
        self.dispatcher.dispatch(&mut self.specs_world);
        self.specs_world.maintain();
        self.publish();
        self.steps = self.steps.wrapping_add(1);
        self.elapsed += dt.max(0.0);
    }

    /// Brings door colliders up to date, then hands queued events to the bus.
    fn publish(&mut self) {
        let events = {
            let mut level = self.specs_world.write_resource::<Level>();
            let mut pending = self.specs_world.write_resource::<PendingEvents>();
            pending.sync_doors(&mut level);
            pending.take()
        };
        for event in events {
            self.ctx.events.emit(event);
        }
    }

    fn with_rooms<R>(&mut self, f: impl FnOnce(&mut RoomGraph, &mut PendingEvents) -> R) -> R {
        let out = {
            let mut level = self.specs_world.write_resource::<Level>();
            let mut pending = self.specs_world.write_resource::<PendingEvents>();
            f(&mut level.graph, &mut pending)
        };
        self.publish();
        out
    }

    pub fn context(&self) -> &SimContext {
        &self.ctx
    }

    pub fn events(&mut self) -> &mut EventBus {
        &mut self.ctx.events
    }

    pub fn with_level<R>(&self, f: impl FnOnce(&Level) -> R) -> R {
        let level = self.specs_world.read_resource::<Level>();
        f(&level)
    }

    pub fn player_entity(&self) -> Entity {
        self.player
    }

    pub fn player_position(&self) -> WorldPoint {
        self.position_of(self.player).unwrap_or_default()
    }

    pub fn move_player(&mut self, point: WorldPoint) {
        let mut positions = self.specs_world.write_component::<Position>();
        if let Some(pos) = positions.get_mut(self.player) {
            pos.point = point;
        }
    }

    pub fn current_room(&self) -> Option<RoomId> {
        self.specs_world.read_resource::<PlayerRoom>().0
    }

    pub fn is_idle(&self) -> bool {
        self.specs_world.read_resource::<IdleState>().idle
    }

    pub fn position_of(&self, entity: Entity) -> Option<WorldPoint> {
        let positions = self.specs_world.read_component::<Position>();
        positions.get(entity).map(|pos| pos.point)
    }

    pub fn navigator_of(&self, entity: Entity) -> Option<Navigator> {
        let navigators = self.specs_world.read_component::<Navigator>();
        navigators.get(entity).cloned()
    }

    pub fn room_state(&self, room: RoomId) -> Result<RoomState, RoomError> {
        self.with_level(|level| level.graph.state(room))
    }

    pub fn room_pressure(&self, room: RoomId) -> Option<f32> {
        self.with_level(|level| level.graph.room(room).map(|node| node.pressure()))
    }

    /// Registers an occupant with `room`. Hunters chase the player once
    /// their room locks; others hold their ground.
    pub fn spawn_occupant(
        &mut self,
        room: RoomId,
        point: WorldPoint,
        counts: bool,
        hunts: bool,
    ) -> Result<Entity, RoomError> {
        let id = OccupantId(self.next_occupant);
        self.with_rooms(|graph, _| graph.register_occupant(room, id, counts))?;
        self.next_occupant += 1;

        let builder = self
            .specs_world
            .create_entity()
            .with(Position { point })
            .with(Occupant { room, id, counts });
        let entity = if hunts {
            builder
                .with(Navigator::new(NavTarget::Player, HUNTER_SPEED, HUNTER_REPATH))
                .build()
        } else {
            builder.build()
        };
        Ok(entity)
    }

    /// Returns false if `entity` was not a registered occupant.
    pub fn kill(&mut self, entity: Entity) -> Result<bool, RoomError> {
        let occupant = {
            let occupants = self.specs_world.read_component::<Occupant>();
            occupants.get(entity).copied()
        };
        let Some(occupant) = occupant else {
            return Ok(false);
        };
        let removed =
            self.with_rooms(|graph, sink| graph.occupant_removed(occupant.room, occupant.id, sink))?;
        if self.specs_world.delete_entity(entity).is_ok() {
            self.specs_world.maintain();
        }
        Ok(removed)
    }

    /// Damage counts against whichever room the player stands in.
    pub fn damage_player(&mut self) -> Result<bool, RoomError> {
        let Some(room) = self.current_room() else {
            return Ok(false);
        };
        self.with_rooms(|graph, sink| graph.notify_damaged(room, sink))?;
        Ok(true)
    }

    pub fn missed(&mut self, amount: f32) -> Result<bool, RoomError> {
        let Some(room) = self.current_room() else {
            return Ok(false);
        };
        self.with_rooms(|graph, sink| graph.notify_missed(room, amount, sink))?;
        Ok(true)
    }

    pub fn add_spawn_source(
        &mut self,
        room: RoomId,
        source: SpawnSource,
    ) -> Result<SpawnSourceId, RoomError> {
        self.with_rooms(|graph, _| graph.add_spawn_source(room, source))
    }

    pub fn disable_spawn_source(&mut self, source: SpawnSourceId) -> Result<(), RoomError> {
        self.with_rooms(|graph, sink| graph.disable_spawn_source(source, sink))
    }

    pub fn set_tutorial_lock(&mut self, room: RoomId, locked: bool) -> Result<(), RoomError> {
        self.with_rooms(|graph, sink| graph.set_tutorial_lock(room, locked, sink))
    }

    pub fn release_tutorial_lock(&mut self, room: RoomId) -> Result<(), RoomError> {
        self.set_tutorial_lock(room, false)
    }

    pub fn place_obstacle(&mut self, center: WorldPoint, radius: f32) -> ColliderId {
        let mut level = self.specs_world.write_resource::<Level>();
        level.place_obstacle(center, radius)
    }

    pub fn remove_obstacle(&mut self, id: ColliderId) -> bool {
        let mut level = self.specs_world.write_resource::<Level>();
        level.remove_obstacle(id)
    }

    pub fn find_path(&self, from: WorldPoint, goal: WorldPoint) -> PathResult {
        let planner = self.ctx.planner();
        self.with_level(|level| planner.find_path(&level.grid, from, goal))
    }
}

#[cfg(test)]
mod tests {
    use std::{cell::RefCell, rc::Rc};

    use bracket_geometry::prelude::Point;
    use bracket_random::prelude::RandomNumberGenerator;

    use super::*;
    use crate::{
        config::{DungeonConfig, GenerationConfig},
        events::DungeonEvent,
        map::{Archetype, Direction, LevelGraphGenerator},
    };

    /// Start at (0,0) with one generic room to the east.
    fn two_room_run() -> (DungeonRun, RoomId) {
        let config = DungeonConfig {
            generation: GenerationConfig {
                lattice_width: 2,
                lattice_height: 1,
                start_x: 0,
                start_y: 0,
                ..GenerationConfig::default()
            },
            ..DungeonConfig::default()
        };
        let mut rng = RandomNumberGenerator::seeded(3);
        let layout = LevelGraphGenerator::new(config.generation.clone())
            .place_deck(&[Archetype::Generic], &mut rng)
            .unwrap();
        let level = Level::from_layout(layout, &config).unwrap();
        let east = level.graph.room_at(Point::new(1, 0)).unwrap();
        let ctx = SimContext::new(config, 3).unwrap();
        (DungeonRun::new(ctx, level), east)
    }

    fn room_center(run: &DungeonRun, room: RoomId) -> WorldPoint {
        run.with_level(|level| level.graph.room(room).unwrap().bounds.center())
    }

    fn gap_walkable(run: &DungeonRun, room: RoomId, direction: Direction) -> bool {
        run.with_level(|level| {
            let gap = level.door_collider(room, direction).unwrap().bounds.center();
            let cell = level.grid.cell_from_world(gap).unwrap();
            level.grid.is_walkable(cell)
        })
    }

    #[test]
    fn start_room_clears_on_first_step() {
        let mut run = DungeonRun::start(SimContext::new(DungeonConfig::default(), 11).unwrap())
            .unwrap();
        run.advance(0.1);
        let start = run.current_room().unwrap();
        assert_eq!(run.room_state(start), Ok(RoomState::Cleared));
        let events = run.events().drain();
        assert_eq!(events.first(), Some(&DungeonEvent::RoomEntered { room: start }));
        assert!(events.contains(&DungeonEvent::RoomCleared { room: start }));
    }

    #[test]
    fn entering_locks_and_killing_the_last_occupant_reopens() {
        let (mut run, east) = two_room_run();
        let center = room_center(&run, east);
        let guard = run
            .spawn_occupant(east, center.offset(2.0, 0.0), true, false)
            .unwrap();

        run.move_player(center);
        run.advance(0.1);
        assert_eq!(run.current_room(), Some(east));
        assert_eq!(run.room_state(east), Ok(RoomState::Locked));
        assert!(!gap_walkable(&run, east, Direction::West));

        assert_eq!(run.kill(guard), Ok(true));
        assert_eq!(run.room_state(east), Ok(RoomState::Cleared));
        assert!(gap_walkable(&run, east, Direction::West));
        assert_eq!(run.kill(guard), Ok(false));
    }

    #[test]
    fn hunters_wait_for_the_lock_then_close_in() {
        let (mut run, east) = two_room_run();
        let center = room_center(&run, east);
        let hunter = run
            .spawn_occupant(east, center.offset(5.0, 2.0), true, true)
            .unwrap();

        run.advance(0.1);
        assert_eq!(run.position_of(hunter), Some(center.offset(5.0, 2.0)));

        let player = center.offset(-4.0, 0.0);
        run.move_player(player);
        let before = center.offset(5.0, 2.0).distance(player);
        for _ in 0..10 {
            run.advance(0.1);
        }
        let after = run.position_of(hunter).unwrap().distance(player);
        assert!(after < before - 1.0, "hunter went from {before} to {after}");
        assert_eq!(run.navigator_of(hunter).unwrap().last_failure, None);
    }

    #[test]
    fn damage_raises_pressure_in_the_current_room() {
        let (mut run, east) = two_room_run();
        let center = room_center(&run, east);
        run.spawn_occupant(east, center.offset(3.0, 3.0), true, false)
            .unwrap();
        assert_eq!(run.damage_player(), Ok(false));

        run.move_player(center);
        run.advance(0.1);
        let before = run.room_pressure(east).unwrap();
        assert_eq!(run.damage_player(), Ok(true));
        let after = run.room_pressure(east).unwrap();
        assert!((after - before - 5.0).abs() < 1e-4);
    }

    #[test]
    fn standing_still_past_the_grace_period_is_idle() {
        let (mut run, _) = two_room_run();
        for _ in 0..10 {
            run.advance(0.1);
        }
        assert!(!run.is_idle());
        for _ in 0..10 {
            run.advance(0.1);
        }
        assert!(run.is_idle());

        let here = run.player_position();
        run.move_player(here.offset(1.0, 0.0));
        run.advance(0.1);
        assert!(!run.is_idle());
    }

    #[test]
    fn observers_see_every_published_event() {
        let (mut run, east) = two_room_run();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        run.events()
            .subscribe(move |event: &DungeonEvent| sink.borrow_mut().push(event.clone()));

        run.set_tutorial_lock(east, true).unwrap();
        run.release_tutorial_lock(east).unwrap();
        assert!(seen
            .borrow()
            .contains(&DungeonEvent::TutorialReleased { room: east }));
        assert_eq!(seen.borrow().len(), run.events().pending().len());
    }
}
