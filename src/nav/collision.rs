use std::ops::BitOr;

use serde::{Deserialize, Serialize};

use crate::geom::{WorldPoint, WorldRect};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LayerMask(pub u32);

impl LayerMask {
    pub const NONE: LayerMask = LayerMask(0);
    pub const WALL: LayerMask = LayerMask(1);
    pub const DOOR: LayerMask = LayerMask(1 << 1);
    pub const OBSTACLE: LayerMask = LayerMask(1 << 2);
    pub const TRIGGER: LayerMask = LayerMask(1 << 3);
    pub const UNWALKABLE: LayerMask = LayerMask(Self::WALL.0 | Self::DOOR.0 | Self::OBSTACLE.0);

    pub fn intersects(self, other: LayerMask) -> bool {
        self.0 & other.0 != 0
    }
}

impl BitOr for LayerMask {
    type Output = LayerMask;

    fn bitor(self, rhs: LayerMask) -> LayerMask {
        LayerMask(self.0 | rhs.0)
    }
}

/// The only question the navigation grid asks of the physics world.
pub trait CollisionLayer {
    fn overlaps_disc(&self, center: WorldPoint, radius: f32, mask: LayerMask) -> bool;
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Shape {
    Box(WorldRect),
    Circle { center: WorldPoint, radius: f32 },
}

impl Shape {
    fn overlaps_disc(&self, center: WorldPoint, radius: f32) -> bool {
        match self {
            Shape::Box(rect) => rect.closest_point(center).distance_squared(center) < radius * radius,
            Shape::Circle {
                center: other,
                radius: other_radius,
            } => {
                let reach = radius + other_radius;
                other.distance_squared(center) < reach * reach
            }
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Collider {
    pub shape: Shape,
    pub layer: LayerMask,
    pub enabled: bool,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct ColliderId(usize);

/// Flat collider arena. Removed slots stay empty so ids remain stable.
#[derive(Clone, Debug, Default)]
pub struct ColliderSet {
    colliders: Vec<Option<Collider>>,
}

impl ColliderSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, shape: Shape, layer: LayerMask) -> ColliderId {
        self.colliders.push(Some(Collider {
            shape,
            layer,
            enabled: true,
        }));
        ColliderId(self.colliders.len() - 1)
    }

    pub fn remove(&mut self, id: ColliderId) -> Option<Collider> {
        self.colliders.get_mut(id.0).and_then(Option::take)
    }

    pub fn get(&self, id: ColliderId) -> Option<&Collider> {
        self.colliders.get(id.0).and_then(Option::as_ref)
    }

    /// Returns false if the collider no longer exists.
    pub fn set_enabled(&mut self, id: ColliderId, enabled: bool) -> bool {
        match self.colliders.get_mut(id.0).and_then(Option::as_mut) {
            Some(collider) => {
                collider.enabled = enabled;
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.colliders.iter().flatten().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = (ColliderId, &Collider)> {
        self.colliders
            .iter()
            .enumerate()
            .filter_map(|(idx, slot)| slot.as_ref().map(|c| (ColliderId(idx), c)))
    }
}

impl CollisionLayer for ColliderSet {
    fn overlaps_disc(&self, center: WorldPoint, radius: f32, mask: LayerMask) -> bool {
        self.colliders.iter().flatten().any(|collider| {
            collider.enabled
                && collider.layer.intersects(mask)
                && collider.shape.overlaps_disc(center, radius)
        })
    }
}
