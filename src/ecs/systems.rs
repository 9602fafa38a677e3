use log::{debug, warn};
use specs::prelude::*;

use crate::{
    config::IdleConfig,
    level::Level,
    nav::{PathPlanner, PathResult},
    rooms::RoomState,
};

use super::{
    components::{IdleTracker, NavTarget, Navigator, Occupant, PlayerTag, Position},
    resources::{DeltaTime, IdleState, PendingEvents, PlayerRoom},
};

/// Fires the first-entry transition when the player crosses into a room.
#[derive(Default)]
pub struct RoomTrackingSystem;

impl<'a> System<'a> for RoomTrackingSystem {
    type SystemData = (
        ReadStorage<'a, PlayerTag>,
        ReadStorage<'a, Position>,
        WriteExpect<'a, Level>,
        Write<'a, PlayerRoom>,
        Write<'a, PendingEvents>,
    );

    fn run(&mut self, (players, positions, mut level, mut current, mut events): Self::SystemData) {
        let Some(point) = (&positions, &players).join().next().map(|(pos, _)| pos.point) else {
            return;
        };
        let room = level.graph.room_containing(point);
        if room == current.0 {
            return;
        }
        current.0 = room;
        if let Some(room) = room {
            if let Err(err) = level.graph.player_entered(room, &mut *events) {
                warn!("player entry ignored: {err}");
            }
        }
    }
}

#[derive(Default)]
pub struct IdleSystem;

impl<'a> System<'a> for IdleSystem {
    type SystemData = (
        Read<'a, DeltaTime>,
        ReadExpect<'a, IdleConfig>,
        ReadStorage<'a, PlayerTag>,
        ReadStorage<'a, Position>,
        WriteStorage<'a, IdleTracker>,
        Write<'a, IdleState>,
    );

    fn run(
        &mut self,
        (dt, config, players, positions, mut trackers, mut state): Self::SystemData,
    ) {
        let dt = dt.0;
        if dt <= 0.0 {
            return;
        }
        for (_, pos, tracker) in (&players, &positions, &mut trackers).join() {
            let speed = pos.point.distance(tracker.last) / dt;
            tracker.last = pos.point;
            if speed < config.min_speed {
                tracker.still_for += dt;
            } else {
                tracker.still_for = 0.0;
            }
            state.idle = tracker.still_for >= config.grace_seconds;
        }
    }
}

#[derive(Default)]
pub struct PressureSystem;

impl<'a> System<'a> for PressureSystem {
    type SystemData = (
        Read<'a, DeltaTime>,
        Read<'a, IdleState>,
        WriteExpect<'a, Level>,
        Write<'a, PendingEvents>,
    );

    fn run(&mut self, (dt, idle, mut level, mut events): Self::SystemData) {
        level.graph.tick(dt.0, idle.idle, &mut *events);
    }
}

/// Pushes door lock changes raised this step into colliders and the grid.
#[derive(Default)]
pub struct DoorSyncSystem;

impl<'a> System<'a> for DoorSyncSystem {
    type SystemData = (WriteExpect<'a, Level>, Write<'a, PendingEvents>);

    fn run(&mut self, (mut level, mut events): Self::SystemData) {
        let flipped = events.sync_doors(&mut level);
        if flipped > 0 {
            debug!("door sync flipped {flipped} grid cells");
        }
    }
}

/// Replans on each agent's own cadence and walks the current waypoints.
/// Room-bound agents stay put until their room locks.
#[derive(Default)]
pub struct NavigatorSystem;

impl<'a> System<'a> for NavigatorSystem {
    type SystemData = (
        Entities<'a>,
        Read<'a, DeltaTime>,
        ReadExpect<'a, Level>,
        ReadExpect<'a, PathPlanner>,
        ReadStorage<'a, PlayerTag>,
        ReadStorage<'a, Occupant>,
        WriteStorage<'a, Position>,
        WriteStorage<'a, Navigator>,
    );

    fn run(
        &mut self,
        (
            entities,
            dt,
            level,
            planner,
            players,
            occupants,
            mut positions,
            mut navigators,
        ): Self::SystemData,
    ) {
        let dt = dt.0;
        let player = (&positions, &players).join().next().map(|(pos, _)| pos.point);

        for (entity, pos, nav) in (&entities, &mut positions, &mut navigators).join() {
            if let Some(occupant) = occupants.get(entity) {
                let awake = matches!(
                    level.graph.state(occupant.room),
                    Ok(RoomState::Locked | RoomState::Stabilized)
                );
                if !awake {
                    continue;
                }
            }
            let goal = match nav.target {
                NavTarget::Point(point) => Some(point),
                NavTarget::Player => player,
            };
            let Some(goal) = goal else {
                continue;
            };

            nav.repath_timer -= dt;
            if nav.repath_timer <= 0.0 {
                nav.repath_timer = nav.repath_interval;
                match planner.find_path(&level.grid, pos.point, goal) {
                    PathResult::Found(path) => {
                        nav.waypoints = path.waypoints;
                        nav.next = 0;
                        nav.last_failure = None;
                    }
                    PathResult::NoPath(reason) => {
                        debug!("agent {} holding: {reason:?}", entity.id());
                        nav.waypoints.clear();
                        nav.next = 0;
                        nav.last_failure = Some(reason);
                    }
                }
            }
            step_along(pos, nav, dt);
        }
    }
}

fn step_along(pos: &mut Position, nav: &mut Navigator, dt: f32) {
    let mut travel = nav.speed * dt;
    while travel > 0.0 {
        let Some(target) = nav.current_waypoint() else {
            break;
        };
        let gap = pos.point.distance(target);
        if gap <= travel {
            pos.point = target;
            nav.next += 1;
            travel -= gap;
        } else {
            pos.point = pos.point + (target - pos.point).scale(travel / gap);
            travel = 0.0;
        }
    }
}
