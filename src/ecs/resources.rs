use crate::{
    events::{DungeonEvent, EventSink},
    level::Level,
    map::RoomId,
};

#[derive(Copy, Clone, Debug, Default)]
pub struct DeltaTime(pub f32);

#[derive(Copy, Clone, Debug, Default)]
pub struct IdleState {
    pub idle: bool,
}

#[derive(Copy, Clone, Debug, Default)]
pub struct PlayerRoom(pub Option<RoomId>);

/// Events raised during the current step. `synced` marks how far door
/// colliders have caught up.
#[derive(Default)]
pub struct PendingEvents {
    pub events: Vec<DungeonEvent>,
    synced: usize,
}

impl PendingEvents {
    pub fn take(&mut self) -> Vec<DungeonEvent> {
        self.synced = 0;
        std::mem::take(&mut self.events)
    }

    /// Applies the spatial side of every event not yet seen. Returns how
    /// many grid cells flipped.
    pub fn sync_doors(&mut self, level: &mut Level) -> usize {
        let flipped = self.events[self.synced..]
            .iter()
            .map(|event| level.apply_event(event))
            .sum();
        self.synced = self.events.len();
        flipped
    }
}

impl EventSink for PendingEvents {
    fn emit(&mut self, event: DungeonEvent) {
        self.events.push(event);
    }
}
