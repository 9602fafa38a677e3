use crate::map::RoomId;

pub const MAX_SPAWNS_PER_TICK: u32 = 64;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct SpawnSourceId {
    pub room: RoomId,
    pub index: usize,
}

/// A timer that asks the host for a new occupant every `interval` seconds,
/// scaled by the room's pressure level.
#[derive(Clone, Debug, PartialEq)]
pub struct SpawnSource {
    interval: f32,
    timer: f32,
    remaining: Option<u32>,
    active: bool,
}

impl SpawnSource {
    pub fn endless(interval: f32) -> Self {
        Self {
            interval,
            timer: 0.0,
            remaining: None,
            active: true,
        }
    }

    pub fn limited(interval: f32, count: u32) -> Self {
        Self {
            interval,
            timer: 0.0,
            remaining: Some(count),
            active: count > 0,
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn remaining(&self) -> Option<u32> {
        self.remaining
    }

    pub(crate) fn disable(&mut self) -> bool {
        std::mem::replace(&mut self.active, false)
    }

    /// Returns how many spawns came due this tick, at most
    /// [`MAX_SPAWNS_PER_TICK`]. Backlog beyond the cap is dropped.
    pub(crate) fn tick(&mut self, dt: f32, rate_multiplier: f32) -> u32 {
        if !self.active || !(self.interval > 0.0) {
            return 0;
        }
        self.timer += dt * rate_multiplier;
        if !self.timer.is_finite() {
            self.timer = 0.0;
            return 0;
        }
        if self.timer < self.interval {
            return 0;
        }

        let periods = (self.timer / self.interval).floor();
        let mut due = if periods >= MAX_SPAWNS_PER_TICK as f32 {
            MAX_SPAWNS_PER_TICK
        } else {
            periods as u32
        };
        self.timer %= self.interval;
        if let Some(remaining) = self.remaining.as_mut() {
            due = due.min(*remaining);
            *remaining -= due;
            if *remaining == 0 {
                self.active = false;
            }
        }
        due
    }
}
