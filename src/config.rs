//! Locomotion configuration components.
//!
//! Every tuning constant the controller uses lives here. Configuration is
//! read-only at runtime: the controller never writes back to it.

use bevy::prelude::*;

use crate::backend::LayerMask;
use crate::error::ConfigError;

/// Complete configuration for one actor.
///
/// Spawn it next to the actor's collider; the controller is built from it
/// the first time the actor is seen.
///
/// # Example
///
/// ```rust
/// use parkour_controller::prelude::*;
///
/// let config = LocomotionConfig::default()
///     .with_movement(MovementConfig::default().with_speeds(6.0, 12.0))
///     .with_ledge(LedgeConfig::default().with_height_range(0.5, 2.0));
/// assert!(config.validate().is_ok());
/// ```
#[derive(Component, Reflect, Debug, Clone, Default)]
#[reflect(Component)]
pub struct LocomotionConfig {
    pub movement: MovementConfig,
    pub wall_run: WallRunConfig,
    pub ledge: LedgeConfig,
    pub keys: KeyBindings,
}

impl LocomotionConfig {
    /// A slightly snappier tuning for player characters.
    pub fn player() -> Self {
        Self {
            movement: MovementConfig {
                acceleration_rate: 14.0,
                ..default()
            },
            ..default()
        }
    }

    /// Builder: replace the movement settings.
    pub fn with_movement(mut self, movement: MovementConfig) -> Self {
        self.movement = movement;
        self
    }

    /// Builder: replace the wall-run settings.
    pub fn with_wall_run(mut self, wall_run: WallRunConfig) -> Self {
        self.wall_run = wall_run;
        self
    }

    /// Builder: replace the ledge settings.
    pub fn with_ledge(mut self, ledge: LedgeConfig) -> Self {
        self.ledge = ledge;
        self
    }

    /// Builder: replace the key bindings.
    pub fn with_keys(mut self, keys: KeyBindings) -> Self {
        self.keys = keys;
        self
    }

    /// Check that the constants are usable together.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.movement.validate()?;
        self.wall_run.validate()?;
        self.ledge.validate()
    }
}

fn positive(value: f32, field: &'static str) -> Result<(), ConfigError> {
    if value > 0.0 && value.is_finite() {
        Ok(())
    } else {
        Err(ConfigError::invalid(field, "must be positive and finite"))
    }
}

fn non_negative(value: f32, field: &'static str) -> Result<(), ConfigError> {
    if value >= 0.0 && value.is_finite() {
        Ok(())
    } else {
        Err(ConfigError::invalid(field, "must be non-negative and finite"))
    }
}

fn unit_interval(value: f32, field: &'static str) -> Result<(), ConfigError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::invalid(field, "must lie in [0, 1]"))
    }
}

/// Ground movement, crouch and slide tuning.
#[derive(Reflect, Debug, Clone)]
pub struct MovementConfig {
    // === Speed ===
    /// Target speed while walking (units/second).
    pub walk_speed: f32,
    /// Target speed while sprinting on the ground (units/second).
    pub sprint_speed: f32,
    /// Rate at which the current speed blends toward its target (1/second).
    pub acceleration_rate: f32,
    /// Scales `speed * direction` into the steering acceleration.
    pub movement_multiplier: f32,
    /// Fraction of the steering acceleration applied while airborne.
    pub air_multiplier: f32,

    // === Jump ===
    /// Upward impulse of a grounded jump.
    pub jump_force: f32,
    /// Jump impulse multiplier when jumping out of a slide.
    pub slide_jump_boost: f32,

    // === Crouch ===
    /// Target speed multiplier while crouched.
    pub crouch_speed_multiplier: f32,
    /// Capsule height while crouched or sliding.
    pub crouch_height: f32,
    /// Capsule height while standing.
    pub standing_height: f32,
    /// Rate at which capsule and camera blend between stances (1/second).
    pub crouch_transition_speed: f32,
    /// Camera mount offset from the actor origin while standing.
    pub standing_camera_offset: Vec3,
    /// Camera mount offset from the actor origin while crouched.
    pub crouching_camera_offset: Vec3,
    /// Extra gap kept between the stand-up sweep and the crouched capsule top.
    pub stand_clearance: f32,
    /// Layers that can block standing up.
    pub obstruction_layers: LayerMask,

    // === Slide ===
    /// Horizontal impulse applied when a slide starts.
    pub slide_force: f32,
    /// Maximum slide duration (seconds).
    pub slide_duration: f32,
    /// Horizontal speed needed to start a slide, as a fraction of walk speed.
    pub slide_entry_speed_ratio: f32,
    /// A slide ends once horizontal speed drops to this value.
    pub slide_exit_speed: f32,

    // === Drag ===
    pub ground_drag: f32,
    pub air_drag: f32,
    pub slide_drag: f32,

    // === Ground & slope ===
    /// Radius of the ground overlap sphere.
    pub ground_check_radius: f32,
    /// Offset of the ground overlap sphere from the actor origin.
    pub ground_check_offset: Vec3,
    /// Layers counted as ground.
    pub ground_layers: LayerMask,
    /// Extra length of the slope probe past the capsule bottom.
    pub slope_margin: f32,

    // === Effects ===
    /// Rate at which the published effect intensity follows the speed ratio.
    pub effect_smoothing: f32,
}

impl Default for MovementConfig {
    fn default() -> Self {
        Self {
            walk_speed: 8.0,
            sprint_speed: 15.0,
            acceleration_rate: 10.0,
            movement_multiplier: 10.0,
            air_multiplier: 0.4,

            jump_force: 7.0,
            slide_jump_boost: 1.5,

            crouch_speed_multiplier: 0.5,
            crouch_height: 1.0,
            standing_height: 2.0,
            crouch_transition_speed: 10.0,
            standing_camera_offset: Vec3::new(0.0, 1.8, 0.0),
            crouching_camera_offset: Vec3::new(0.0, 0.8, 0.0),
            stand_clearance: 0.05,
            obstruction_layers: LayerMask::ALL,

            slide_force: 10.0,
            slide_duration: 0.75,
            slide_entry_speed_ratio: 0.9,
            slide_exit_speed: 8.0,

            ground_drag: 6.0,
            air_drag: 2.0,
            slide_drag: 1.0,

            ground_check_radius: 0.2,
            ground_check_offset: Vec3::ZERO,
            ground_layers: LayerMask::ALL,
            slope_margin: 0.5,

            effect_smoothing: 5.0,
        }
    }
}

impl MovementConfig {
    /// Builder: set walk and sprint speeds.
    pub fn with_speeds(mut self, walk: f32, sprint: f32) -> Self {
        self.walk_speed = walk;
        self.sprint_speed = sprint;
        self
    }

    /// Builder: set the grounded jump impulse.
    pub fn with_jump_force(mut self, force: f32) -> Self {
        self.jump_force = force;
        self
    }

    /// Builder: set standing and crouched capsule heights.
    pub fn with_heights(mut self, standing: f32, crouched: f32) -> Self {
        self.standing_height = standing;
        self.crouch_height = crouched;
        self
    }

    /// Builder: set slide duration and the speed at which a slide ends.
    pub fn with_slide(mut self, duration: f32, exit_speed: f32) -> Self {
        self.slide_duration = duration;
        self.slide_exit_speed = exit_speed;
        self
    }

    /// Builder: set ground, air and slide drag.
    pub fn with_drag(mut self, ground: f32, air: f32, slide: f32) -> Self {
        self.ground_drag = ground;
        self.air_drag = air;
        self.slide_drag = slide;
        self
    }

    /// Builder: set the layers counted as ground.
    pub fn with_ground_layers(mut self, layers: LayerMask) -> Self {
        self.ground_layers = layers;
        self
    }

    /// Horizontal speed a sprint must exceed for crouch to start a slide.
    #[inline]
    pub fn slide_entry_speed(&self) -> f32 {
        self.walk_speed * self.slide_entry_speed_ratio
    }

    fn validate(&self) -> Result<(), ConfigError> {
        positive(self.walk_speed, "movement.walk_speed")?;
        positive(self.sprint_speed, "movement.sprint_speed")?;
        positive(self.acceleration_rate, "movement.acceleration_rate")?;
        non_negative(self.movement_multiplier, "movement.movement_multiplier")?;
        unit_interval(self.air_multiplier, "movement.air_multiplier")?;
        non_negative(self.jump_force, "movement.jump_force")?;
        non_negative(self.slide_jump_boost, "movement.slide_jump_boost")?;
        non_negative(self.crouch_speed_multiplier, "movement.crouch_speed_multiplier")?;
        positive(self.crouch_height, "movement.crouch_height")?;
        positive(self.standing_height, "movement.standing_height")?;
        if self.crouch_height > self.standing_height {
            return Err(ConfigError::invalid(
                "movement.crouch_height",
                "must not exceed standing_height",
            ));
        }
        positive(self.crouch_transition_speed, "movement.crouch_transition_speed")?;
        non_negative(self.stand_clearance, "movement.stand_clearance")?;
        non_negative(self.slide_force, "movement.slide_force")?;
        positive(self.slide_duration, "movement.slide_duration")?;
        non_negative(self.slide_entry_speed_ratio, "movement.slide_entry_speed_ratio")?;
        non_negative(self.slide_exit_speed, "movement.slide_exit_speed")?;
        non_negative(self.ground_drag, "movement.ground_drag")?;
        non_negative(self.air_drag, "movement.air_drag")?;
        non_negative(self.slide_drag, "movement.slide_drag")?;
        positive(self.ground_check_radius, "movement.ground_check_radius")?;
        non_negative(self.slope_margin, "movement.slope_margin")?;
        non_negative(self.effect_smoothing, "movement.effect_smoothing")
    }
}

/// Wall-run tuning.
#[derive(Reflect, Debug, Clone)]
pub struct WallRunConfig {
    /// Length of the side probes, measured from the capsule center.
    pub wall_distance: f32,
    /// Clearance needed below the feet before a wall-run may start.
    pub minimum_height: f32,
    /// Constant downward force applied while wall-running.
    pub wall_run_gravity: f32,
    /// Linear damping while wall-running.
    pub wall_run_drag: f32,
    /// Impulse magnitude of a wall jump along `up + wall normal`.
    pub wall_jump_force: f32,
    /// Camera field of view outside a wall-run (degrees).
    pub base_fov: f32,
    /// Camera field of view during a wall-run (degrees).
    pub wall_run_fov: f32,
    /// Exponential rate of the FOV blend (1/second).
    pub fov_transition_rate: f32,
    /// Camera roll at full tilt (degrees).
    pub max_tilt: f32,
    /// Exponential rate of the tilt blend (1/second).
    pub tilt_transition_rate: f32,
    /// Layers that can be wall-run on.
    pub layers: LayerMask,
}

impl Default for WallRunConfig {
    fn default() -> Self {
        Self {
            wall_distance: 0.6,
            minimum_height: 1.5,
            wall_run_gravity: 1.0,
            wall_run_drag: 2.0,
            wall_jump_force: 6.0,
            base_fov: 90.0,
            wall_run_fov: 100.0,
            fov_transition_rate: 20.0,
            max_tilt: 20.0,
            tilt_transition_rate: 20.0,
            layers: LayerMask::ALL,
        }
    }
}

impl WallRunConfig {
    /// Builder: set side probe length and the clearance needed below the feet.
    pub fn with_detection(mut self, wall_distance: f32, minimum_height: f32) -> Self {
        self.wall_distance = wall_distance;
        self.minimum_height = minimum_height;
        self
    }

    /// Builder: set the camera signals produced while wall-running.
    pub fn with_camera(mut self, base_fov: f32, wall_run_fov: f32, max_tilt: f32) -> Self {
        self.base_fov = base_fov;
        self.wall_run_fov = wall_run_fov;
        self.max_tilt = max_tilt;
        self
    }

    /// Builder: set the wall jump impulse.
    pub fn with_jump_force(mut self, force: f32) -> Self {
        self.wall_jump_force = force;
        self
    }

    /// Builder: set the downward pull and damping while wall-running.
    pub fn with_wall_run_physics(mut self, gravity: f32, drag: f32) -> Self {
        self.wall_run_gravity = gravity;
        self.wall_run_drag = drag;
        self
    }

    fn validate(&self) -> Result<(), ConfigError> {
        positive(self.wall_distance, "wall_run.wall_distance")?;
        non_negative(self.minimum_height, "wall_run.minimum_height")?;
        non_negative(self.wall_run_gravity, "wall_run.wall_run_gravity")?;
        non_negative(self.wall_run_drag, "wall_run.wall_run_drag")?;
        non_negative(self.wall_jump_force, "wall_run.wall_jump_force")?;
        positive(self.base_fov, "wall_run.base_fov")?;
        positive(self.wall_run_fov, "wall_run.wall_run_fov")?;
        non_negative(self.fov_transition_rate, "wall_run.fov_transition_rate")?;
        non_negative(self.max_tilt, "wall_run.max_tilt")?;
        non_negative(self.tilt_transition_rate, "wall_run.tilt_transition_rate")
    }
}

/// Ledge detection and grab tuning.
///
/// Detection is a three-stage probe: a forward sphere-cast finds a wall, an
/// upward ray just inside the wall finds its top edge, and a short downward
/// ray over the top confirms a walkable surface.
#[derive(Reflect, Debug, Clone)]
pub struct LedgeConfig {
    // === Detection ===
    /// Forward reach of the wall probe.
    pub detection_range: f32,
    /// Radius of the forward wall probe.
    pub probe_radius: f32,
    /// Height of the wall probe, as a fraction of the capsule height.
    pub probe_height: f32,
    /// Minimum angle between the wall normal and world up (degrees).
    pub min_wall_angle: f32,
    /// How far inside the wall the upward edge probe starts.
    pub wall_inset: f32,
    /// Height above the edge the downward surface probe starts from.
    pub probe_lift: f32,
    /// How far over the top surface the downward probe is placed.
    pub probe_inset: f32,
    /// Length of the downward surface probe.
    pub probe_depth: f32,
    /// Lowest accepted ledge, measured from the actor's feet (inclusive).
    pub min_ledge_height: f32,
    /// Highest accepted ledge, measured from the actor's feet (inclusive).
    pub max_ledge_height: f32,
    /// Layers that can be grabbed.
    pub layers: LayerMask,

    // === Grab ===
    /// Maximum distance between the actor and the hang pose to start a grab.
    pub max_grab_distance: f32,
    /// Duration of the move into the hang pose (seconds).
    pub grab_duration: f32,
    /// Duration of the pull-up onto the ledge (seconds).
    pub pull_up_duration: f32,
    /// Horizontal offset of the hang pose from the edge, away from the wall.
    pub hang_wall_offset: f32,
    /// How far below the edge the actor origin hangs.
    pub hang_drop: f32,
    /// Horizontal offset of the stand pose from the edge, over the top surface.
    pub stand_inset: f32,
    /// Height of the stand pose above the top surface.
    pub stand_lift: f32,
}

impl Default for LedgeConfig {
    fn default() -> Self {
        Self {
            detection_range: 0.7,
            probe_radius: 0.25,
            probe_height: 0.75,
            min_wall_angle: 80.0,
            wall_inset: 0.05,
            probe_lift: 0.1,
            probe_inset: 0.2,
            probe_depth: 0.3,
            min_ledge_height: 0.5,
            max_ledge_height: 2.5,
            layers: LayerMask::ALL,

            max_grab_distance: 1.0,
            grab_duration: 0.4,
            pull_up_duration: 0.6,
            hang_wall_offset: 0.75,
            hang_drop: 1.6,
            stand_inset: 0.5,
            stand_lift: 0.2,
        }
    }
}

impl LedgeConfig {
    /// Builder: set the accepted ledge height range (inclusive).
    pub fn with_height_range(mut self, min: f32, max: f32) -> Self {
        self.min_ledge_height = min;
        self.max_ledge_height = max;
        self
    }

    /// Builder: set grab and pull-up durations.
    pub fn with_durations(mut self, grab: f32, pull_up: f32) -> Self {
        self.grab_duration = grab;
        self.pull_up_duration = pull_up;
        self
    }

    /// Builder: set the forward probe reach.
    pub fn with_detection_range(mut self, range: f32) -> Self {
        self.detection_range = range;
        self
    }

    /// True if a ledge `height` above the feet is grabbable.
    #[inline]
    pub fn height_in_range(&self, height: f32) -> bool {
        height >= self.min_ledge_height && height <= self.max_ledge_height
    }

    fn validate(&self) -> Result<(), ConfigError> {
        positive(self.detection_range, "ledge.detection_range")?;
        positive(self.probe_radius, "ledge.probe_radius")?;
        unit_interval(self.probe_height, "ledge.probe_height")?;
        non_negative(self.min_wall_angle, "ledge.min_wall_angle")?;
        non_negative(self.wall_inset, "ledge.wall_inset")?;
        non_negative(self.probe_lift, "ledge.probe_lift")?;
        non_negative(self.probe_inset, "ledge.probe_inset")?;
        positive(self.probe_depth, "ledge.probe_depth")?;
        non_negative(self.min_ledge_height, "ledge.min_ledge_height")?;
        positive(self.max_ledge_height, "ledge.max_ledge_height")?;
        if self.min_ledge_height > self.max_ledge_height {
            return Err(ConfigError::invalid(
                "ledge.min_ledge_height",
                "must not exceed max_ledge_height",
            ));
        }
        non_negative(self.max_grab_distance, "ledge.max_grab_distance")?;
        positive(self.grab_duration, "ledge.grab_duration")?;
        positive(self.pull_up_duration, "ledge.pull_up_duration")
    }
}

/// Keyboard bindings read by [`read_keyboard_input`](crate::systems::read_keyboard_input).
#[derive(Reflect, Debug, Clone)]
pub struct KeyBindings {
    pub forward: KeyCode,
    pub back: KeyCode,
    pub left: KeyCode,
    pub right: KeyCode,
    pub sprint: KeyCode,
    pub jump: KeyCode,
    pub crouch: KeyCode,
}

impl Default for KeyBindings {
    fn default() -> Self {
        Self {
            forward: KeyCode::KeyW,
            back: KeyCode::KeyS,
            left: KeyCode::KeyA,
            right: KeyCode::KeyD,
            sprint: KeyCode::ShiftLeft,
            jump: KeyCode::Space,
            crouch: KeyCode::KeyC,
        }
    }
}
