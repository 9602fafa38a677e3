use crate::map::{Direction, RoomId};

/// What a door presents to the world. Both fields always move together.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct DoorSurface {
    pub visible: bool,
    pub solid: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Door {
    direction: Direction,
    neighbor: Option<RoomId>,
    locked: bool,
    surface: DoorSurface,
}

impl Door {
    pub(crate) fn new(direction: Direction, neighbor: Option<RoomId>) -> Self {
        let locked = neighbor.is_none();
        Self {
            direction,
            neighbor,
            locked,
            surface: DoorSurface {
                visible: locked,
                solid: locked,
            },
        }
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn neighbor(&self) -> Option<RoomId> {
        self.neighbor
    }

    pub fn is_wall(&self) -> bool {
        self.neighbor.is_none()
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    pub fn surface(&self) -> DoorSurface {
        self.surface
    }

    /// Returns true if the lock state changed. Walls refuse to unlock.
    pub(crate) fn set_locked(&mut self, locked: bool) -> bool {
        let locked = locked || self.is_wall();
        if self.locked == locked {
            return false;
        }
        self.locked = locked;
        self.surface = DoorSurface {
            visible: locked,
            solid: locked,
        };
        true
    }
}
