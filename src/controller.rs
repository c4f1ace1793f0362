//! The locomotion state machine.
//!
//! [`LocomotionController`] arbitrates which sub-controller owns the rigid
//! body each tick: ledge transitions first, then wall-running, then ordinary
//! movement. Only the owner writes physics flags, and only when they differ
//! from what the body already reports.

use bevy::prelude::*;

use crate::backend::{CapsuleDimensions, PhysicsBody, SpatialQuery};
use crate::config::LocomotionConfig;
use crate::detection::{is_grounded, WallContact};
use crate::error::ConfigError;
use crate::intent::InputFrame;
use crate::ledge::{detect_ledge, grab_session, pull_up_session, within_grab_reach, LedgeCandidate};
use crate::movement::{MovementCore, StanceGeometry};
use crate::state::{LocomotionMode, Stance};
use crate::transition::TransitionPose;
use crate::wall_run::{
    apply_wall_run_drag, apply_wall_run_gravity, wall_jump, wall_run_contact, WallRunSignals,
};

/// How far a capsule's center may sit from half its height above the feet.
const CENTER_TOLERANCE: f32 = 1.0e-3;

/// Per-actor locomotion state machine.
///
/// Built once from the actor's [`LocomotionConfig`] and capsule, then driven
/// by a backend through [`frame_tick`](Self::frame_tick) (every rendered
/// frame) and [`simulation_tick`](Self::simulation_tick) (every physics step).
///
/// # Example
///
/// ```rust
/// use parkour_controller::prelude::*;
///
/// let config = LocomotionConfig::default();
/// let controller =
///     LocomotionController::new(&config, CapsuleDimensions::standing(2.0, 0.5)).unwrap();
/// assert!(!controller.is_wall_running());
/// ```
#[derive(Component, Debug, Clone)]
pub struct LocomotionController {
    core: MovementCore,
    mode: LocomotionMode,
    grounded: bool,
    ledge: Option<LedgeCandidate>,
    signals: WallRunSignals,
}

impl LocomotionController {
    /// Validate `config` against the actor's capsule and build a controller.
    pub fn new(config: &LocomotionConfig, capsule: CapsuleDimensions) -> Result<Self, ConfigError> {
        config.validate()?;
        if !(capsule.radius > 0.0 && capsule.height > 0.0) {
            return Err(ConfigError::invalid(
                "collider",
                "capsule radius and height must be positive",
            ));
        }
        // Stance easing keeps the center at half the height.
        if capsule.center.distance(Vec3::Y * capsule.height * 0.5) > CENTER_TOLERANCE {
            return Err(ConfigError::UnsupportedCollider);
        }
        if capsule.radius * 2.0 > config.movement.crouch_height + f32::EPSILON {
            return Err(ConfigError::invalid(
                "movement.crouch_height",
                "must fit the capsule diameter",
            ));
        }

        Ok(Self {
            core: MovementCore::new(&config.movement, capsule),
            mode: LocomotionMode::Movement,
            grounded: false,
            ledge: None,
            signals: WallRunSignals::new(&config.wall_run),
        })
    }

    // === Accessors ===

    pub fn mode(&self) -> &LocomotionMode {
        &self.mode
    }

    pub fn stance(&self) -> Stance {
        self.core.stance()
    }

    /// Ground state from the most recent tick.
    pub fn is_grounded(&self) -> bool {
        self.grounded
    }

    pub fn is_crouching(&self) -> bool {
        self.core.stance().is_crouching()
    }

    pub fn is_sliding(&self) -> bool {
        self.core.stance().is_sliding()
    }

    pub fn is_wall_running(&self) -> bool {
        self.mode.is_wall_running()
    }

    /// True while moving into or holding the hang pose.
    pub fn is_hanging(&self) -> bool {
        self.mode.is_hanging()
    }

    pub fn is_pulling_up(&self) -> bool {
        self.mode.is_pulling_up()
    }

    /// Current target move speed.
    pub fn move_speed(&self) -> f32 {
        self.core.move_speed()
    }

    pub fn signals(&self) -> WallRunSignals {
        self.signals
    }

    pub fn geometry(&self) -> StanceGeometry {
        self.core.geometry()
    }

    /// Ledge found by the most recent frame tick, if any.
    pub fn ledge_candidate(&self) -> Option<&LedgeCandidate> {
        self.ledge.as_ref()
    }

    /// Wall being run on, if any.
    pub fn wall_contact(&self) -> Option<&WallContact> {
        match &self.mode {
            LocomotionMode::WallRunning(contact) => Some(contact),
            _ => None,
        }
    }

    pub fn slope_normal(&self) -> Option<Vec3> {
        self.core.slope()
    }

    // === Ticks ===

    /// Frame tick: detectors, toggles, transitions and signal easing.
    pub fn frame_tick(
        &mut self,
        input: &InputFrame,
        config: &LocomotionConfig,
        query: &impl SpatialQuery,
        body: &mut impl PhysicsBody,
        dt: f32,
    ) {
        self.grounded = is_grounded(query, body.translation(), &config.movement);

        if self.mode.is_ledge() {
            self.advance_ledge(input, config, body, dt);
            self.signals.ease_to_baseline(&config.wall_run, dt);
            return;
        }

        self.core
            .frame(input, self.grounded, &config.movement, query, body, dt);

        self.ledge = if self.grounded {
            None
        } else {
            detect_ledge(
                query,
                body.translation(),
                input.forward(),
                self.core.geometry().height,
                &config.ledge,
            )
        };

        if input.jump_pressed && !self.grounded {
            if let Some(candidate) = self.ledge {
                if within_grab_reach(body.translation(), &candidate, &config.ledge) {
                    self.begin_grab(candidate, config, body);
                    self.signals.ease_to_baseline(&config.wall_run, dt);
                    return;
                }
            }
        }

        let contact = wall_run_contact(
            query,
            body.translation(),
            self.core.geometry().center,
            input.right(),
            self.grounded,
            &config.wall_run,
        );
        match contact {
            Some(contact) => {
                if !self.mode.is_wall_running() {
                    debug!("wall-run started ({:?})", contact.side);
                }
                self.mode = LocomotionMode::WallRunning(contact);
                if body.gravity_enabled() {
                    body.set_gravity_enabled(false);
                }
                apply_wall_run_drag(body, &config.wall_run);
                self.signals
                    .ease_toward_wall(&contact, &config.wall_run, dt);

                if input.jump_pressed {
                    debug!("wall jump");
                    wall_jump(body, &contact, &config.wall_run);
                }
            }
            None => {
                if self.mode.is_wall_running() {
                    debug!("wall-run ended");
                    self.mode = LocomotionMode::Movement;
                }
                if !body.gravity_enabled() {
                    body.set_gravity_enabled(true);
                }
                self.core
                    .apply_drag(self.grounded, &config.movement, body);
                self.signals.ease_to_baseline(&config.wall_run, dt);
            }
        }
    }

    /// Simulation tick: forces from whichever sub-controller owns the body.
    pub fn simulation_tick(
        &mut self,
        config: &LocomotionConfig,
        query: &impl SpatialQuery,
        body: &mut impl PhysicsBody,
    ) {
        self.grounded = is_grounded(query, body.translation(), &config.movement);

        match self.mode {
            LocomotionMode::Grabbing { .. }
            | LocomotionMode::Hanging(_)
            | LocomotionMode::PullingUp(_) => {}
            LocomotionMode::WallRunning(_) => {
                apply_wall_run_gravity(body, &config.wall_run);
            }
            LocomotionMode::Movement => {
                self.core
                    .simulation(self.grounded, &config.movement, body);
            }
        }
    }

    /// Abort any grab, hang or pull-up and hand the body back to physics.
    ///
    /// Returns `false` (and does nothing) if no ledge transition is active.
    pub fn cancel_ledge_grab(&mut self, body: &mut impl PhysicsBody) -> bool {
        if !self.mode.is_ledge() {
            return false;
        }
        debug!("ledge grab cancelled while {}", self.mode.label());
        self.release_body(body);
        true
    }

    fn begin_grab(
        &mut self,
        candidate: LedgeCandidate,
        config: &LocomotionConfig,
        body: &mut impl PhysicsBody,
    ) {
        debug!("grabbing ledge at {}", candidate.ledge_point);
        self.core.abort_slide();
        self.core.clear_wish_direction();

        let session = grab_session(body.translation(), body.rotation(), &candidate, &config.ledge);
        body.set_velocity(Vec3::ZERO);
        body.set_kinematic(true);
        body.set_gravity_enabled(false);
        self.mode = LocomotionMode::Grabbing { session, candidate };
    }

    fn advance_ledge(
        &mut self,
        input: &InputFrame,
        config: &LocomotionConfig,
        body: &mut impl PhysicsBody,
        dt: f32,
    ) {
        match self.mode {
            LocomotionMode::Grabbing {
                mut session,
                candidate,
            } => {
                let pose = session.advance(dt);
                apply_pose(body, &pose);
                self.mode = if pose.finished {
                    debug!("hanging from ledge");
                    LocomotionMode::Hanging(candidate)
                } else {
                    LocomotionMode::Grabbing { session, candidate }
                };
            }
            LocomotionMode::Hanging(candidate) => {
                if input.jump_pressed {
                    debug!("pulling up");
                    self.mode = LocomotionMode::PullingUp(pull_up_session(
                        body.translation(),
                        &candidate,
                        &config.ledge,
                    ));
                }
            }
            LocomotionMode::PullingUp(mut session) => {
                let pose = session.advance(dt);
                apply_pose(body, &pose);
                if pose.finished {
                    debug!("pulled up onto ledge");
                    self.release_body(body);
                } else {
                    self.mode = LocomotionMode::PullingUp(session);
                }
            }
            LocomotionMode::Movement | LocomotionMode::WallRunning(_) => {}
        }
    }

    fn release_body(&mut self, body: &mut impl PhysicsBody) {
        if body.is_kinematic() {
            body.set_kinematic(false);
        }
        if !body.gravity_enabled() {
            body.set_gravity_enabled(true);
        }
        self.core.clear_wish_direction();
        self.mode = LocomotionMode::Movement;
        self.ledge = None;
    }
}

fn apply_pose(body: &mut impl PhysicsBody, pose: &TransitionPose) {
    body.set_translation(pose.translation);
    if let Some(rotation) = pose.rotation {
        body.set_rotation(rotation);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MovementConfig;

    #[test]
    fn invalid_config_is_rejected() {
        let config = LocomotionConfig::default()
            .with_movement(MovementConfig::default().with_speeds(-1.0, 15.0));
        let result = LocomotionController::new(&config, CapsuleDimensions::standing(2.0, 0.5));
        assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));
    }

    #[test]
    fn capsule_too_wide_for_crouch_is_rejected() {
        let config = LocomotionConfig::default();
        let result = LocomotionController::new(&config, CapsuleDimensions::standing(2.0, 0.6));
        assert_eq!(
            result.err(),
            Some(ConfigError::invalid(
                "movement.crouch_height",
                "must fit the capsule diameter"
            ))
        );
    }

    #[test]
    fn degenerate_capsule_is_rejected() {
        let config = LocomotionConfig::default();
        let result = LocomotionController::new(&config, CapsuleDimensions::standing(2.0, 0.0));
        assert!(result.is_err());
    }

    #[test]
    fn capsule_centered_on_the_origin_is_rejected() {
        let config = LocomotionConfig::default();
        let centered = CapsuleDimensions {
            center: Vec3::ZERO,
            ..CapsuleDimensions::standing(2.0, 0.5)
        };
        let result = LocomotionController::new(&config, centered);
        assert_eq!(result.err(), Some(ConfigError::UnsupportedCollider));
    }

    #[test]
    fn new_controller_starts_standing_at_walk_speed() {
        let config = LocomotionConfig::default();
        let controller =
            LocomotionController::new(&config, CapsuleDimensions::standing(2.0, 0.5)).unwrap();

        assert_eq!(controller.stance(), Stance::Standing);
        assert_eq!(*controller.mode(), LocomotionMode::Movement);
        assert_eq!(controller.move_speed(), config.movement.walk_speed);
        assert_eq!(controller.signals().fov, config.wall_run.base_fov);
    }
}
