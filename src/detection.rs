//! Ground, slope and wall detection.
//!
//! Every detector here is a pure function of the current pose and a
//! [`SpatialQuery`]. Nothing is cached between ticks: callers re-run the
//! detectors each tick and thread the returned values through.

use bevy::prelude::*;

use crate::backend::SpatialQuery;
use crate::collision::CollisionData;
use crate::config::{MovementConfig, WallRunConfig};

/// Normals closer to world up than this are treated as flat ground.
const FLAT_EPSILON: f32 = 1.0e-4;

/// Ground test: a sphere overlap at the actor's feet.
pub fn is_grounded(query: &impl SpatialQuery, translation: Vec3, config: &MovementConfig) -> bool {
    query.sphere_overlap(
        translation + config.ground_check_offset,
        config.ground_check_radius,
        config.ground_layers,
    )
}

/// Normal of the slope under the actor, if it is standing on one.
///
/// Casts one ray down from the capsule center, reaching `margin` past the
/// capsule bottom. Flat ground and misses both return `None`.
pub fn slope_normal(
    query: &impl SpatialQuery,
    capsule_center: Vec3,
    capsule_height: f32,
    config: &MovementConfig,
) -> Option<Vec3> {
    let hit = query.raycast(
        capsule_center,
        Vec3::NEG_Y,
        capsule_height * 0.5 + config.slope_margin,
        config.ground_layers,
    )?;
    (hit.normal.dot(Vec3::Y) < 1.0 - FLAT_EPSILON).then_some(hit.normal)
}

/// Project a planar direction onto the plane with `normal`, re-normalised.
pub fn project_on_slope(direction: Vec3, normal: Vec3) -> Vec3 {
    (direction - normal * direction.dot(normal)).normalize_or_zero()
}

/// Which side of the actor a wall is on.
#[derive(Reflect, Debug, Clone, Copy, PartialEq, Eq)]
pub enum WallSide {
    Left,
    Right,
}

impl WallSide {
    /// Sign of the camera tilt toward this side: left rolls negative.
    #[inline]
    pub fn tilt_sign(self) -> f32 {
        match self {
            WallSide::Left => -1.0,
            WallSide::Right => 1.0,
        }
    }
}

/// A wall touching one side of the actor this tick.
#[derive(Reflect, Debug, Clone, Copy, PartialEq)]
pub struct WallContact {
    pub side: WallSide,
    pub point: Vec3,
    pub normal: Vec3,
}

/// Raw per-side wall probe results.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct WallContacts {
    pub left: Option<CollisionData>,
    pub right: Option<CollisionData>,
}

impl WallContacts {
    /// The contact if exactly one side touches a wall.
    pub fn single(&self) -> Option<WallContact> {
        match (self.left, self.right) {
            (Some(hit), None) => Some(WallContact {
                side: WallSide::Left,
                point: hit.point,
                normal: hit.normal,
            }),
            (None, Some(hit)) => Some(WallContact {
                side: WallSide::Right,
                point: hit.point,
                normal: hit.normal,
            }),
            _ => None,
        }
    }

    pub fn any(&self) -> bool {
        self.left.is_some() || self.right.is_some()
    }
}

/// Probe both sides of the actor with rays from the capsule center.
pub fn detect_walls(
    query: &impl SpatialQuery,
    capsule_center: Vec3,
    right: Vec3,
    config: &WallRunConfig,
) -> WallContacts {
    WallContacts {
        left: query.raycast(capsule_center, -right, config.wall_distance, config.layers),
        right: query.raycast(capsule_center, right, config.wall_distance, config.layers),
    }
}

/// True if nothing lies within `minimum_height` below the feet.
pub fn clear_below(query: &impl SpatialQuery, translation: Vec3, config: &WallRunConfig) -> bool {
    query
        .raycast(translation, Vec3::NEG_Y, config.minimum_height, config.layers)
        .is_none()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::LayerMask;

    /// Query stub answering every ray with a fixed hit and every overlap
    /// with a fixed answer.
    struct FixedQuery {
        ray: Option<CollisionData>,
        overlap: bool,
    }

    impl SpatialQuery for FixedQuery {
        fn raycast(&self, _: Vec3, _: Vec3, _: f32, _: LayerMask) -> Option<CollisionData> {
            self.ray
        }

        fn sphere_cast(&self, _: Vec3, _: f32, _: Vec3, _: f32, _: LayerMask) -> Option<CollisionData> {
            None
        }

        fn sphere_overlap(&self, _: Vec3, _: f32, _: LayerMask) -> bool {
            self.overlap
        }
    }

    fn hit(normal: Vec3) -> Option<CollisionData> {
        Some(CollisionData::new(1.0, normal, Vec3::ZERO, None))
    }

    // ==================== Ground Tests ====================

    #[test]
    fn grounded_follows_overlap() {
        let config = MovementConfig::default();
        let on = FixedQuery { ray: None, overlap: true };
        let off = FixedQuery { ray: None, overlap: false };

        assert!(is_grounded(&on, Vec3::ZERO, &config));
        assert!(!is_grounded(&off, Vec3::ZERO, &config));
    }

    // ==================== Slope Tests ====================

    #[test]
    fn flat_ground_is_not_a_slope() {
        let query = FixedQuery { ray: hit(Vec3::Y), overlap: true };
        assert_eq!(slope_normal(&query, Vec3::Y, 2.0, &MovementConfig::default()), None);
    }

    #[test]
    fn tilted_ground_is_a_slope() {
        let normal = Vec3::new(0.0, 1.0, 1.0).normalize();
        let query = FixedQuery { ray: hit(normal), overlap: true };
        assert_eq!(
            slope_normal(&query, Vec3::Y, 2.0, &MovementConfig::default()),
            Some(normal)
        );
    }

    #[test]
    fn missing_ground_is_not_a_slope() {
        let query = FixedQuery { ray: None, overlap: false };
        assert_eq!(slope_normal(&query, Vec3::Y, 2.0, &MovementConfig::default()), None);
    }

    #[test]
    fn slope_projection_stays_in_plane() {
        // 45 degree ramp rising toward -Z.
        let normal = Vec3::new(0.0, 1.0, 1.0).normalize();
        let projected = project_on_slope(Vec3::NEG_Z, normal);

        assert!((projected.length() - 1.0).abs() < 0.001);
        assert!(projected.dot(normal).abs() < 0.001);
        assert!(projected.y > 0.0, "walking uphill must climb");
    }

    // ==================== Wall Tests ====================

    #[test]
    fn single_contact_requires_exactly_one_side() {
        let wall = CollisionData::new(0.5, Vec3::X, Vec3::new(-0.5, 1.0, 0.0), None);

        let left_only = WallContacts { left: Some(wall), right: None };
        let contact = left_only.single();
        assert_eq!(contact.map(|c| c.side), Some(WallSide::Left));
        assert_eq!(contact.map(|c| c.normal), Some(Vec3::X));

        let both = WallContacts { left: Some(wall), right: Some(wall) };
        assert!(both.any());
        assert_eq!(both.single(), None);

        assert_eq!(WallContacts::default().single(), None);
    }

    #[test]
    fn tilt_sign_per_side() {
        assert_eq!(WallSide::Left.tilt_sign(), -1.0);
        assert_eq!(WallSide::Right.tilt_sign(), 1.0);
    }

    #[test]
    fn clear_below_is_inverse_of_hit() {
        let config = WallRunConfig::default();
        let floor = FixedQuery { ray: hit(Vec3::Y), overlap: false };
        let void = FixedQuery { ray: None, overlap: false };

        assert!(!clear_below(&floor, Vec3::ZERO, &config));
        assert!(clear_below(&void, Vec3::ZERO, &config));
    }
}
