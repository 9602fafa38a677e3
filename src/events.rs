use crate::{
    map::{Direction, RoomId},
    pressure::PressureLevel,
    rooms::SpawnSourceId,
};

#[derive(Clone, Debug, PartialEq)]
pub enum DungeonEvent {
    RoomEntered {
        room: RoomId,
    },
    RoomLocked {
        room: RoomId,
    },
    RoomCleared {
        room: RoomId,
    },
    RoomStabilized {
        room: RoomId,
    },
    PressureActivated {
        room: RoomId,
    },
    PressureChanged {
        room: RoomId,
        from: PressureLevel,
        to: PressureLevel,
        pressure: f32,
    },
    DoorChanged {
        room: RoomId,
        direction: Direction,
        locked: bool,
    },
    SpawnRequested {
        room: RoomId,
        source: SpawnSourceId,
    },
    TutorialReleased {
        room: RoomId,
    },
}

impl DungeonEvent {
    pub fn room(&self) -> RoomId {
        match self {
            DungeonEvent::RoomEntered { room }
            | DungeonEvent::RoomLocked { room }
            | DungeonEvent::RoomCleared { room }
            | DungeonEvent::RoomStabilized { room }
            | DungeonEvent::PressureActivated { room }
            | DungeonEvent::PressureChanged { room, .. }
            | DungeonEvent::DoorChanged { room, .. }
            | DungeonEvent::SpawnRequested { room, .. }
            | DungeonEvent::TutorialReleased { room } => *room,
        }
    }
}

/// Anything room transitions can report into.
pub trait EventSink {
    fn emit(&mut self, event: DungeonEvent);
}

impl EventSink for Vec<DungeonEvent> {
    fn emit(&mut self, event: DungeonEvent) {
        self.push(event);
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

type Observer = Box<dyn FnMut(&DungeonEvent)>;

/// Synchronous event bus. Observers run inside `emit`, on the caller's
/// thread, and every event is also queued for `drain`.
#[derive(Default)]
pub struct EventBus {
    observers: Vec<(ObserverId, Observer)>,
    pending: Vec<DungeonEvent>,
    next_id: u64,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<F>(&mut self, observer: F) -> ObserverId
    where
        F: FnMut(&DungeonEvent) + 'static,
    {
        let id = ObserverId(self.next_id);
        self.next_id += 1;
        self.observers.push((id, Box::new(observer)));
        id
    }

    pub fn unsubscribe(&mut self, id: ObserverId) -> bool {
        let before = self.observers.len();
        self.observers.retain(|(observer_id, _)| *observer_id != id);
        self.observers.len() != before
    }

    pub fn observer_count(&self) -> usize {
        self.observers.len()
    }

    pub fn pending(&self) -> &[DungeonEvent] {
        &self.pending
    }

    pub fn drain(&mut self) -> Vec<DungeonEvent> {
        std::mem::take(&mut self.pending)
    }
}

impl EventSink for EventBus {
    fn emit(&mut self, event: DungeonEvent) {
        for (_, observer) in self.observers.iter_mut() {
            observer(&event);
        }
        self.pending.push(event);
    }
}
