//! Ledge detection and the grab/pull-up transitions.
//!
//! Detection runs while airborne and produces a [`LedgeCandidate`]. A grab
//! moves the actor into the hang pose with a [`TransitionSession`]; a
//! pull-up moves it from there onto the ledge. Mode bookkeeping (who owns the
//! body, when physics flags flip) lives in
//! [`LocomotionController`](crate::controller::LocomotionController).

use bevy::prelude::*;

use crate::backend::SpatialQuery;
use crate::config::LedgeConfig;
use crate::transition::{Easing, TransitionSession};

/// A grabbable ledge found this tick.
#[derive(Reflect, Debug, Clone, Copy, PartialEq)]
pub struct LedgeCandidate {
    /// Point on the top surface just behind the edge.
    pub ledge_point: Vec3,
    /// Outward normal of the wall below the edge.
    pub wall_normal: Vec3,
    /// Actor origin while hanging.
    pub hang_position: Vec3,
    /// Actor origin after pulling up.
    pub stand_position: Vec3,
}

impl LedgeCandidate {
    /// Build a candidate from the edge point and wall normal.
    ///
    /// `wall_normal` points out of the wall toward the actor: the hang pose
    /// sits along it, in front of the wall face, and the stand pose sits
    /// against it, on the top surface.
    pub fn new(ledge_point: Vec3, wall_normal: Vec3, config: &LedgeConfig) -> Self {
        let mut hang_position = ledge_point + wall_normal * config.hang_wall_offset;
        hang_position.y = ledge_point.y - config.hang_drop;

        let mut stand_position = ledge_point - wall_normal * config.stand_inset;
        stand_position.y = ledge_point.y + config.stand_lift;

        Self {
            ledge_point,
            wall_normal,
            hang_position,
            stand_position,
        }
    }

    /// Orientation while hanging: facing the wall.
    pub fn hang_rotation(&self) -> Quat {
        let facing = Vec3::new(-self.wall_normal.x, 0.0, -self.wall_normal.z);
        if facing.length_squared() < 1.0e-6 {
            return Quat::IDENTITY;
        }
        Transform::IDENTITY.looking_to(facing, Vec3::Y).rotation
    }
}

/// Look for a grabbable ledge in front of the actor.
///
/// 1. Sphere-cast forward from high on the capsule and require a steep wall.
/// 2. Cast up from just inside the wall, starting at foot level, to find its
///    top edge.
/// 3. Cast down from just above the edge, over the top surface, to confirm
///    the surface and measure its height.
pub fn detect_ledge(
    query: &impl SpatialQuery,
    translation: Vec3,
    forward: Vec3,
    capsule_height: f32,
    config: &LedgeConfig,
) -> Option<LedgeCandidate> {
    let anchor = translation + Vec3::Y * capsule_height * config.probe_height;
    let wall = query.sphere_cast(
        anchor,
        config.probe_radius,
        forward,
        config.detection_range,
        config.layers,
    )?;
    if wall.angle_to(Vec3::Y) < config.min_wall_angle {
        return None;
    }
    let normal = wall.normal;

    let mut edge_probe = wall.point - normal * config.wall_inset;
    edge_probe.y = translation.y;
    let edge = query.raycast(edge_probe, Vec3::Y, config.max_ledge_height, config.layers)?;

    let surface_probe = edge.point + Vec3::Y * config.probe_lift - normal * config.probe_inset;
    let surface = query.raycast(surface_probe, Vec3::NEG_Y, config.probe_depth, config.layers)?;

    let height = surface.point.y - translation.y;
    if !config.height_in_range(height) {
        return None;
    }

    Some(LedgeCandidate::new(surface.point, normal, config))
}

/// True if the actor is close enough to the hang pose to grab.
pub fn within_grab_reach(translation: Vec3, candidate: &LedgeCandidate, config: &LedgeConfig) -> bool {
    translation.distance(candidate.hang_position) <= config.max_grab_distance
}

/// Transition from the current pose into the hang pose.
pub fn grab_session(
    translation: Vec3,
    rotation: Quat,
    candidate: &LedgeCandidate,
    config: &LedgeConfig,
) -> TransitionSession {
    TransitionSession::new(
        translation,
        candidate.hang_position,
        config.grab_duration,
        Easing::SmoothStep,
    )
    .with_rotation(rotation, candidate.hang_rotation())
}

/// Position-only transition from the hang pose onto the ledge.
pub fn pull_up_session(translation: Vec3, candidate: &LedgeCandidate, config: &LedgeConfig) -> TransitionSession {
    TransitionSession::new(
        translation,
        candidate.stand_position,
        config.pull_up_duration,
        Easing::EaseOutQuad,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn candidate_poses_straddle_the_edge() {
        let config = LedgeConfig::default();
        let candidate = LedgeCandidate::new(Vec3::new(0.0, 1.8, -0.85), Vec3::Z, &config);

        assert!((candidate.hang_position - Vec3::new(0.0, 0.2, -0.1)).length() < 1.0e-5);
        assert!((candidate.stand_position - Vec3::new(0.0, 2.0, -1.35)).length() < 1.0e-5);

        // Hang in front of the wall face, stand over the top surface.
        assert!((candidate.hang_position - candidate.ledge_point).dot(Vec3::Z) > 0.0);
        assert!((candidate.stand_position - candidate.ledge_point).dot(Vec3::Z) < 0.0);
    }

    #[test]
    fn hang_rotation_faces_the_wall() {
        let candidate = LedgeCandidate::new(Vec3::ZERO, Vec3::Z, &LedgeConfig::default());
        let forward = candidate.hang_rotation() * Vec3::NEG_Z;
        assert!((forward - Vec3::NEG_Z).length() < 1.0e-5);

        let candidate = LedgeCandidate::new(Vec3::ZERO, Vec3::X, &LedgeConfig::default());
        let forward = candidate.hang_rotation() * Vec3::NEG_Z;
        assert!((forward - Vec3::NEG_X).length() < 1.0e-5);
    }

    #[test]
    fn grab_reach_is_inclusive() {
        let config = LedgeConfig::default();
        let candidate = LedgeCandidate::new(Vec3::new(0.0, 1.6, 0.0), Vec3::Z, &config);
        // Hang pose sits at (0, 0, 0.75).
        assert!(within_grab_reach(Vec3::new(0.0, 0.0, 0.75), &candidate, &config));
        assert!(within_grab_reach(Vec3::new(0.0, 0.0, 1.75), &candidate, &config));
        assert!(!within_grab_reach(Vec3::new(0.0, 0.0, 1.8), &candidate, &config));
    }

    #[test]
    fn sessions_use_their_easings() {
        let config = LedgeConfig::default();
        let candidate = LedgeCandidate::new(Vec3::new(0.0, 1.8, -0.85), Vec3::Z, &config);

        let grab = grab_session(Vec3::ZERO, Quat::IDENTITY, &candidate, &config);
        assert_eq!(grab.easing, Easing::SmoothStep);
        assert_eq!(grab.duration, config.grab_duration);
        assert!(grab.to_rotation.is_some());

        let pull = pull_up_session(candidate.hang_position, &candidate, &config);
        assert_eq!(pull.easing, Easing::EaseOutQuad);
        assert_eq!(pull.to_rotation, None);
        assert_eq!(pull.to, candidate.stand_position);
    }
}
