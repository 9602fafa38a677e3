use std::ops::{Add, Sub};

use serde::{Deserialize, Serialize};

/// A continuous world-space position. `y` grows northward.
#[derive(Copy, Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct WorldPoint {
    pub x: f32,
    pub y: f32,
}

impl WorldPoint {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn distance(self, other: WorldPoint) -> f32 {
        self.distance_squared(other).sqrt()
    }

    pub fn distance_squared(self, other: WorldPoint) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx * dx + dy * dy
    }

    pub fn offset(self, dx: f32, dy: f32) -> Self {
        Self::new(self.x + dx, self.y + dy)
    }

    pub fn scale(self, factor: f32) -> Self {
        Self::new(self.x * factor, self.y * factor)
    }
}

impl Add for WorldPoint {
    type Output = WorldPoint;

    fn add(self, rhs: WorldPoint) -> WorldPoint {
        WorldPoint::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for WorldPoint {
    type Output = WorldPoint;

    fn sub(self, rhs: WorldPoint) -> WorldPoint {
        WorldPoint::new(self.x - rhs.x, self.y - rhs.y)
    }
}

/// Axis-aligned rectangle in world space, `min` at the bottom-left.
#[derive(Copy, Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct WorldRect {
    pub min: WorldPoint,
    pub max: WorldPoint,
}

impl WorldRect {
    pub fn from_corners(a: WorldPoint, b: WorldPoint) -> Self {
        Self {
            min: WorldPoint::new(a.x.min(b.x), a.y.min(b.y)),
            max: WorldPoint::new(a.x.max(b.x), a.y.max(b.y)),
        }
    }

    pub fn from_center_size(center: WorldPoint, width: f32, height: f32) -> Self {
        let half_w = width * 0.5;
        let half_h = height * 0.5;
        Self {
            min: center.offset(-half_w, -half_h),
            max: center.offset(half_w, half_h),
        }
    }

    pub fn width(&self) -> f32 {
        self.max.x - self.min.x
    }

    pub fn height(&self) -> f32 {
        self.max.y - self.min.y
    }

    pub fn center(&self) -> WorldPoint {
        WorldPoint::new(
            (self.min.x + self.max.x) * 0.5,
            (self.min.y + self.max.y) * 0.5,
        )
    }

    pub fn contains(&self, point: WorldPoint) -> bool {
        point.x >= self.min.x && point.x <= self.max.x && point.y >= self.min.y && point.y <= self.max.y
    }

    pub fn union(&self, other: &WorldRect) -> WorldRect {
        WorldRect {
            min: WorldPoint::new(self.min.x.min(other.min.x), self.min.y.min(other.min.y)),
            max: WorldPoint::new(self.max.x.max(other.max.x), self.max.y.max(other.max.y)),
        }
    }

    pub fn closest_point(&self, point: WorldPoint) -> WorldPoint {
        WorldPoint::new(
            point.x.clamp(self.min.x, self.max.x),
            point.y.clamp(self.min.y, self.max.y),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rect_from_center_is_symmetric() {
        let rect = WorldRect::from_center_size(WorldPoint::new(2.0, -1.0), 4.0, 2.0);
        assert_eq!(rect.min, WorldPoint::new(0.0, -2.0));
        assert_eq!(rect.max, WorldPoint::new(4.0, 0.0));
        assert_eq!(rect.center(), WorldPoint::new(2.0, -1.0));
    }

    #[test]
    fn closest_point_clamps_outside_points() {
        let rect = WorldRect::from_corners(WorldPoint::new(0.0, 0.0), WorldPoint::new(2.0, 2.0));
        assert_eq!(rect.closest_point(WorldPoint::new(5.0, 1.0)), WorldPoint::new(2.0, 1.0));
        assert_eq!(rect.closest_point(WorldPoint::new(1.0, 1.0)), WorldPoint::new(1.0, 1.0));
    }

    #[test]
    fn union_covers_both() {
        let a = WorldRect::from_corners(WorldPoint::new(0.0, 0.0), WorldPoint::new(1.0, 1.0));
        let b = WorldRect::from_corners(WorldPoint::new(3.0, -2.0), WorldPoint::new(4.0, 0.5));
        let u = a.union(&b);
        assert_eq!(u.min, WorldPoint::new(0.0, -2.0));
        assert_eq!(u.max, WorldPoint::new(4.0, 1.0));
    }
}
