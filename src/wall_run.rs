//! Wall-running: eligibility, camera signals and the wall jump.

use bevy::prelude::*;

use crate::backend::{ForceMode, PhysicsBody, SpatialQuery};
use crate::config::WallRunConfig;
use crate::detection::{clear_below, detect_walls, WallContact};
use crate::transition::exp_approach;

/// Camera signals produced by the wall-run controller.
///
/// The controller only publishes these; it never rolls a transform itself.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WallRunSignals {
    /// Camera roll in degrees. Negative toward a wall on the left.
    pub tilt: f32,
    /// Camera field of view in degrees.
    pub fov: f32,
}

impl WallRunSignals {
    pub fn new(config: &WallRunConfig) -> Self {
        Self {
            tilt: 0.0,
            fov: config.base_fov,
        }
    }

    /// Ease toward full tilt on the contact side and the wall-run FOV.
    pub fn ease_toward_wall(&mut self, contact: &WallContact, config: &WallRunConfig, dt: f32) {
        let tilt = contact.side.tilt_sign() * config.max_tilt;
        self.ease(tilt, config.wall_run_fov, config, dt);
    }

    /// Ease back to no tilt and the base FOV.
    pub fn ease_to_baseline(&mut self, config: &WallRunConfig, dt: f32) {
        self.ease(0.0, config.base_fov, config, dt);
    }

    fn ease(&mut self, tilt: f32, fov: f32, config: &WallRunConfig, dt: f32) {
        self.tilt = exp_approach(self.tilt, tilt, config.tilt_transition_rate, dt);
        self.fov = exp_approach(self.fov, fov, config.fov_transition_rate, dt);
    }
}

/// The wall to run on this tick, if wall-running is allowed.
///
/// Requires the actor to be airborne with nothing within `minimum_height`
/// below its feet, and exactly one side touching a wall.
pub fn wall_run_contact(
    query: &impl SpatialQuery,
    translation: Vec3,
    capsule_center: Vec3,
    right: Vec3,
    grounded: bool,
    config: &WallRunConfig,
) -> Option<WallContact> {
    if grounded || !clear_below(query, translation, config) {
        return None;
    }
    detect_walls(query, translation + capsule_center, right, config).single()
}

/// Kick off the wall: cancel vertical velocity, then push up and away.
pub fn wall_jump(body: &mut impl PhysicsBody, contact: &WallContact, config: &WallRunConfig) {
    let mut velocity = body.velocity();
    velocity.y = 0.0;
    body.set_velocity(velocity);
    body.add_force(
        (Vec3::Y + contact.normal) * config.wall_jump_force,
        ForceMode::Impulse,
    );
}

/// Simulation tick while wall-running: the constant downward pull that
/// replaces gravity.
pub fn apply_wall_run_gravity(body: &mut impl PhysicsBody, config: &WallRunConfig) {
    body.add_force(Vec3::NEG_Y * config.wall_run_gravity, ForceMode::Force);
}

pub fn apply_wall_run_drag(body: &mut impl PhysicsBody, config: &WallRunConfig) {
    body.set_linear_damping(config.wall_run_drag);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::WallSide;

    fn contact(side: WallSide) -> WallContact {
        let normal = match side {
            WallSide::Left => Vec3::X,
            WallSide::Right => Vec3::NEG_X,
        };
        WallContact {
            side,
            point: Vec3::ZERO,
            normal,
        }
    }

    #[test]
    fn tilt_converges_to_side() {
        let config = WallRunConfig::default();
        let mut signals = WallRunSignals::new(&config);

        for _ in 0..120 {
            signals.ease_toward_wall(&contact(WallSide::Left), &config, 1.0 / 60.0);
        }
        assert!((signals.tilt + config.max_tilt).abs() < 0.01);
        assert!((signals.fov - config.wall_run_fov).abs() < 0.01);

        for _ in 0..120 {
            signals.ease_toward_wall(&contact(WallSide::Right), &config, 1.0 / 60.0);
        }
        assert!((signals.tilt - config.max_tilt).abs() < 0.01);
    }

    #[test]
    fn baseline_restores_signals() {
        let config = WallRunConfig::default();
        let mut signals = WallRunSignals {
            tilt: 20.0,
            fov: 100.0,
        };

        for _ in 0..120 {
            signals.ease_to_baseline(&config, 1.0 / 60.0);
        }
        assert!(signals.tilt.abs() < 0.01);
        assert!((signals.fov - config.base_fov).abs() < 0.01);
    }

    #[test]
    fn single_step_is_partial() {
        let config = WallRunConfig::default();
        let mut signals = WallRunSignals::new(&config);
        signals.ease_toward_wall(&contact(WallSide::Right), &config, 1.0 / 60.0);

        let expected = 20.0 * (1.0 - (-20.0_f32 / 60.0).exp());
        assert!((signals.tilt - expected).abs() < 0.001);
    }
}
