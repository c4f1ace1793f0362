//! Spatial query result structures.
//!
//! These hold the results of the raycasts and sphere-casts used for ground,
//! slope, wall and ledge detection.

use bevy::prelude::*;

/// Information about a raycast/sphere-cast hit.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CollisionData {
    /// Distance travelled along the cast direction before the hit.
    pub distance: f32,
    /// Normal of the surface at the hit point.
    pub normal: Vec3,
    /// World position of the hit point.
    pub point: Vec3,
    /// Entity that was hit (if known).
    pub entity: Option<Entity>,
}

impl CollisionData {
    /// Create a collision result.
    pub fn new(distance: f32, normal: Vec3, point: Vec3, entity: Option<Entity>) -> Self {
        Self {
            distance,
            normal,
            point,
            entity,
        }
    }

    /// Angle between the hit normal and `up`, in degrees.
    pub fn angle_to(&self, up: Vec3) -> f32 {
        self.normal.angle_between(up).to_degrees()
    }
}
