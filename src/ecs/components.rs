#![allow(dead_code)]

use specs::prelude::{Component, NullStorage, VecStorage};

use crate::{
    geom::WorldPoint,
    map::RoomId,
    nav::NoPathReason,
    rooms::OccupantId,
};

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Position {
    pub point: WorldPoint,
}

impl Component for Position {
    type Storage = VecStorage<Self>;
}

#[derive(Clone, Debug, Default)]
pub struct PlayerTag;

impl Component for PlayerTag {
    type Storage = NullStorage<Self>;
}

/// Binds an entity to the room that must see it die before clearing.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Occupant {
    pub room: RoomId,
    pub id: OccupantId,
    pub counts: bool,
}

impl Component for Occupant {
    type Storage = VecStorage<Self>;
}

/// Movement history used to judge whether the player is idling.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct IdleTracker {
    pub last: WorldPoint,
    pub still_for: f32,
}

impl Component for IdleTracker {
    type Storage = VecStorage<Self>;
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub enum NavTarget {
    Point(WorldPoint),
    Player,
}

#[derive(Clone, Debug)]
pub struct Navigator {
    pub target: NavTarget,
    pub speed: f32,
    pub repath_interval: f32,
    pub repath_timer: f32,
    pub waypoints: Vec<WorldPoint>,
    pub next: usize,
    pub last_failure: Option<NoPathReason>,
}

impl Navigator {
    pub fn new(target: NavTarget, speed: f32, repath_interval: f32) -> Self {
        Self {
            target,
            speed,
            repath_interval,
            repath_timer: 0.0,
            waypoints: Vec::new(),
            next: 0,
            last_failure: None,
        }
    }

    pub fn current_waypoint(&self) -> Option<WorldPoint> {
        self.waypoints.get(self.next).copied()
    }

    pub fn is_holding(&self) -> bool {
        self.current_waypoint().is_none()
    }
}

impl Component for Navigator {
    type Storage = VecStorage<Self>;
}
