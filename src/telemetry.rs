//! Read-only signals for the camera rig and effects, plus the external
//! cancel request.

use bevy::prelude::*;

use crate::config::LocomotionConfig;
use crate::controller::LocomotionController;
use crate::movement::horizontal_speed;
use crate::transition::blend_toward;

/// Published locomotion state, refreshed every frame tick.
///
/// Downstream systems (camera roll and FOV, crouch camera mount, wind
/// streaks) read this instead of reaching into the controller.
///
/// # Example
///
/// ```rust
/// use bevy::prelude::*;
/// use parkour_controller::prelude::*;
///
/// fn drive_camera_fov(q: Query<&LocomotionTelemetry>, mut cams: Query<&mut Projection>) {
///     let Ok(telemetry) = q.single() else { return };
///     for mut projection in &mut cams {
///         if let Projection::Perspective(p) = projection.as_mut() {
///             p.fov = telemetry.wall_run_fov.to_radians();
///         }
///     }
/// }
/// ```
#[derive(Component, Reflect, Debug, Clone, Default)]
#[reflect(Component)]
pub struct LocomotionTelemetry {
    pub grounded: bool,
    /// Camera roll in degrees (negative toward a wall on the left).
    pub wall_run_tilt: f32,
    /// Camera field of view in degrees.
    pub wall_run_fov: f32,
    /// `clamp01((speed − walk) / (sprint − walk))` of the horizontal speed.
    pub speed_ratio: f32,
    /// Speed ratio eased over time, for particle emission and similar effects.
    pub effect_intensity: f32,
    /// Camera mount offset from the actor origin.
    pub camera_offset: Vec3,
    pub horizontal_speed: f32,
    pub crouching: bool,
    pub sliding: bool,
    pub wall_running: bool,
    pub hanging: bool,
    pub pulling_up: bool,
}

impl LocomotionTelemetry {
    /// Refresh from the controller after its frame tick.
    pub fn update(
        &mut self,
        controller: &LocomotionController,
        velocity: Vec3,
        config: &LocomotionConfig,
        dt: f32,
    ) {
        let movement = &config.movement;
        let speed = horizontal_speed(velocity);
        let signals = controller.signals();
        let stance = controller.stance();
        let mode = controller.mode();

        self.grounded = controller.is_grounded();
        self.wall_run_tilt = signals.tilt;
        self.wall_run_fov = signals.fov;
        self.horizontal_speed = speed;
        self.speed_ratio = speed_ratio(speed, movement.walk_speed, movement.sprint_speed);
        self.effect_intensity = blend_toward(
            self.effect_intensity,
            self.speed_ratio,
            movement.effect_smoothing,
            dt,
        );
        self.camera_offset = controller.geometry().camera_offset;
        self.crouching = stance.is_crouching();
        self.sliding = stance.is_sliding();
        self.wall_running = mode.is_wall_running();
        self.hanging = mode.is_hanging();
        self.pulling_up = mode.is_pulling_up();
    }
}

/// Where `speed` sits between walk and sprint speed, clamped to [0, 1].
///
/// A degenerate range (sprint ≈ walk) reads as 1 once sprint speed is
/// reached and 0 below it.
pub fn speed_ratio(speed: f32, walk: f32, sprint: f32) -> f32 {
    let range = sprint - walk;
    if range > 0.01 {
        ((speed - walk) / range).clamp(0.0, 1.0)
    } else if speed >= sprint {
        1.0
    } else {
        0.0
    }
}

/// Ask an actor to let go of a ledge immediately.
///
/// Ignored unless the actor is grabbing, hanging or pulling up.
#[derive(Event, Debug, Clone, Copy)]
pub struct CancelLedgeGrab {
    pub entity: Entity,
}
