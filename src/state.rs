//! Locomotion state.
//!
//! The controller keeps its state in two values: a [`Stance`] owned by the
//! movement core and a [`LocomotionMode`] naming which sub-controller owns
//! the rigid body this tick. Both are enums, so `Sliding ⇒ Crouching` and
//! "at most one override" hold by construction.
//!
//! The marker components below mirror that state onto the actor entity so
//! other systems can filter on it. They are added/removed automatically by
//! [`sync_state_markers`](crate::systems::sync_state_markers).

use bevy::prelude::*;

use crate::detection::WallContact;
use crate::ledge::LedgeCandidate;
use crate::transition::TransitionSession;

/// Active slide: counts down and remembers the direction it was launched in.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SlideSession {
    pub remaining: f32,
    pub direction: Vec3,
}

/// Body posture, owned by the movement core.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum Stance {
    #[default]
    Standing,
    Crouching,
    /// Sliding is a crouch with an active slide session.
    Sliding(SlideSession),
}

impl Stance {
    /// True while crouched, including while sliding.
    #[inline]
    pub fn is_crouching(&self) -> bool {
        !matches!(self, Stance::Standing)
    }

    #[inline]
    pub fn is_sliding(&self) -> bool {
        matches!(self, Stance::Sliding(_))
    }
}

/// Which sub-controller owns the rigid body.
///
/// Precedence: ledge transitions > wall-run > ordinary movement.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum LocomotionMode {
    #[default]
    Movement,
    WallRunning(WallContact),
    /// Moving into the hang pose.
    Grabbing {
        session: TransitionSession,
        candidate: LedgeCandidate,
    },
    Hanging(LedgeCandidate),
    PullingUp(TransitionSession),
}

impl LocomotionMode {
    #[inline]
    pub fn is_wall_running(&self) -> bool {
        matches!(self, LocomotionMode::WallRunning(_))
    }

    /// True while moving into or holding the hang pose.
    #[inline]
    pub fn is_hanging(&self) -> bool {
        matches!(
            self,
            LocomotionMode::Grabbing { .. } | LocomotionMode::Hanging(_)
        )
    }

    #[inline]
    pub fn is_pulling_up(&self) -> bool {
        matches!(self, LocomotionMode::PullingUp(_))
    }

    /// True while a ledge transition owns the body.
    #[inline]
    pub fn is_ledge(&self) -> bool {
        self.is_hanging() || self.is_pulling_up()
    }

    /// Short name for logs.
    pub fn label(&self) -> &'static str {
        match self {
            LocomotionMode::Movement => "movement",
            LocomotionMode::WallRunning(_) => "wall-running",
            LocomotionMode::Grabbing { .. } => "grabbing",
            LocomotionMode::Hanging(_) => "hanging",
            LocomotionMode::PullingUp(_) => "pulling-up",
        }
    }
}

/// Marker component indicating the actor is on the ground.
///
/// Mutually exclusive with [`Airborne`].
///
/// # Example
///
/// ```rust
/// use bevy::prelude::*;
/// use parkour_controller::prelude::*;
///
/// fn landed(q: Query<Entity, Added<Grounded>>) {
///     for entity in &q {
///         info!("{entity} landed");
///     }
/// }
/// ```
#[derive(Component, Reflect, Debug, Clone, Copy, Default)]
#[reflect(Component)]
pub struct Grounded;

/// Marker component indicating the actor is off the ground.
#[derive(Component, Reflect, Debug, Clone, Copy, Default)]
#[reflect(Component)]
pub struct Airborne;

/// Marker component indicating the actor is crouched (also while sliding).
#[derive(Component, Reflect, Debug, Clone, Copy, Default)]
#[reflect(Component)]
pub struct Crouching;

/// Marker component indicating the actor is sliding.
#[derive(Component, Reflect, Debug, Clone, Copy, Default)]
#[reflect(Component)]
pub struct Sliding;

/// Marker component indicating the actor is wall-running.
///
/// Carries the side and normal of the wall being run on.
#[derive(Component, Reflect, Debug, Clone, Copy)]
#[reflect(Component)]
pub struct WallRunning {
    pub contact: WallContact,
}

/// Marker component indicating the actor is grabbing or hanging from a ledge.
#[derive(Component, Reflect, Debug, Clone, Copy, Default)]
#[reflect(Component)]
pub struct LedgeHanging;

/// Marker component indicating the actor is pulling up onto a ledge.
#[derive(Component, Reflect, Debug, Clone, Copy, Default)]
#[reflect(Component)]
pub struct PullingUp;

/// Added instead of a controller when an actor's configuration is unusable.
///
/// Disabled actors are never ticked.
#[derive(Component, Reflect, Debug, Clone, Default)]
#[reflect(Component)]
pub struct LocomotionDisabled {
    pub reason: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::WallSide;
    use crate::transition::Easing;

    #[test]
    fn sliding_is_crouching() {
        let slide = Stance::Sliding(SlideSession {
            remaining: 0.5,
            direction: Vec3::NEG_Z,
        });
        assert!(slide.is_crouching());
        assert!(slide.is_sliding());

        assert!(Stance::Crouching.is_crouching());
        assert!(!Stance::Crouching.is_sliding());
        assert!(!Stance::Standing.is_crouching());
    }

    #[test]
    fn mode_flags_are_exclusive() {
        let contact = WallContact {
            side: WallSide::Left,
            point: Vec3::ZERO,
            normal: Vec3::X,
        };
        let session = TransitionSession::new(Vec3::ZERO, Vec3::Y, 0.5, Easing::EaseOutQuad);

        let modes = [
            LocomotionMode::Movement,
            LocomotionMode::WallRunning(contact),
            LocomotionMode::PullingUp(session),
        ];
        for mode in modes {
            let active = [mode.is_wall_running(), mode.is_hanging(), mode.is_pulling_up()]
                .into_iter()
                .filter(|flag| *flag)
                .count();
            assert!(active <= 1, "{} has {active} overrides", mode.label());
        }
    }

    #[test]
    fn default_mode_is_movement() {
        assert_eq!(LocomotionMode::default(), LocomotionMode::Movement);
        assert!(!LocomotionMode::default().is_ledge());
    }
}
