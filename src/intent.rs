//! Locomotion input.
//!
//! [`LocomotionInput`] holds the raw button and axis state for one actor.
//! Anything can write it (keyboard, gamepad, AI, replay). Once per frame tick
//! the controller calls [`LocomotionInput::sample`], which turns held buttons
//! into press edges and returns an [`InputFrame`].

use bevy::prelude::*;

/// Raw locomotion input for one actor.
///
/// # Example
///
/// ```rust
/// use bevy::prelude::*;
/// use parkour_controller::prelude::*;
///
/// let mut input = LocomotionInput::default();
/// input.set_movement(Vec2::new(0.0, 1.0));
/// input.jump = true;
///
/// let frame = input.sample();
/// assert!(frame.jump_pressed);
///
/// // Still held: no new edge.
/// let frame = input.sample();
/// assert!(!frame.jump_pressed);
/// ```
#[derive(Component, Reflect, Debug, Clone, Default)]
#[reflect(Component)]
pub struct LocomotionInput {
    /// Planar movement axes: `x` = strafe right, `y` = forward. Each in [-1, 1].
    pub movement: Vec2,
    /// Look yaw in radians, counter-clockwise around world up. Zero faces -Z.
    pub yaw: f32,
    /// Sprint button held.
    pub sprint: bool,
    /// Jump button held.
    pub jump: bool,
    /// Crouch button held.
    pub crouch: bool,
    jump_prev: bool,
    crouch_prev: bool,
}

impl LocomotionInput {
    /// Create an empty input.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the movement axes, clamping each to [-1, 1].
    pub fn set_movement(&mut self, movement: Vec2) {
        self.movement = movement.clamp(Vec2::NEG_ONE, Vec2::ONE);
    }

    /// Set the look yaw (radians).
    pub fn set_yaw(&mut self, yaw: f32) {
        self.yaw = yaw;
    }

    /// Release every button and zero the axes. Edge history is kept.
    pub fn clear(&mut self) {
        self.movement = Vec2::ZERO;
        self.sprint = false;
        self.jump = false;
        self.crouch = false;
    }

    /// Produce this tick's input and latch button state for edge detection.
    pub fn sample(&mut self) -> InputFrame {
        let frame = InputFrame {
            movement: self.movement,
            yaw: self.yaw,
            sprint_held: self.sprint,
            crouch_held: self.crouch,
            jump_pressed: self.jump && !self.jump_prev,
            crouch_pressed: self.crouch && !self.crouch_prev,
        };
        self.jump_prev = self.jump;
        self.crouch_prev = self.crouch;
        frame
    }
}

/// Marks an actor whose [`LocomotionInput`] is filled from the keyboard by
/// [`read_keyboard_input`](crate::systems::read_keyboard_input).
#[derive(Component, Reflect, Debug, Clone, Copy, Default)]
#[reflect(Component)]
pub struct KeyboardControlled;

/// One tick of sampled input.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct InputFrame {
    pub movement: Vec2,
    pub yaw: f32,
    pub sprint_held: bool,
    pub crouch_held: bool,
    /// Jump went down this tick.
    pub jump_pressed: bool,
    /// Crouch went down this tick.
    pub crouch_pressed: bool,
}

impl InputFrame {
    /// Planar forward direction for the current yaw.
    #[inline]
    pub fn forward(&self) -> Vec3 {
        Quat::from_rotation_y(self.yaw) * Vec3::NEG_Z
    }

    /// Planar right direction for the current yaw.
    #[inline]
    pub fn right(&self) -> Vec3 {
        Quat::from_rotation_y(self.yaw) * Vec3::X
    }

    /// Normalised world-space movement direction, or zero without input.
    pub fn wish_direction(&self) -> Vec3 {
        (self.forward() * self.movement.y + self.right() * self.movement.x).normalize_or_zero()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::FRAC_PI_2;

    #[test]
    fn jump_edge_fires_once_per_press() {
        let mut input = LocomotionInput::new();

        input.jump = true;
        assert!(input.sample().jump_pressed);
        assert!(!input.sample().jump_pressed);

        input.jump = false;
        assert!(!input.sample().jump_pressed);

        input.jump = true;
        assert!(input.sample().jump_pressed);
    }

    #[test]
    fn crouch_edge_and_hold_are_separate() {
        let mut input = LocomotionInput::new();
        input.crouch = true;

        let first = input.sample();
        assert!(first.crouch_pressed);
        assert!(first.crouch_held);

        let second = input.sample();
        assert!(!second.crouch_pressed);
        assert!(second.crouch_held);
    }

    #[test]
    fn movement_is_clamped() {
        let mut input = LocomotionInput::new();
        input.set_movement(Vec2::new(3.0, -2.0));
        assert_eq!(input.movement, Vec2::new(1.0, -1.0));
    }

    #[test]
    fn wish_direction_follows_yaw() {
        let mut input = LocomotionInput::new();
        input.set_movement(Vec2::new(0.0, 1.0));

        let frame = input.sample();
        assert!((frame.wish_direction() - Vec3::NEG_Z).length() < 0.001);

        // Quarter turn left: forward becomes -X.
        input.set_yaw(FRAC_PI_2);
        let frame = input.sample();
        assert!((frame.wish_direction() - Vec3::NEG_X).length() < 0.001);
    }

    #[test]
    fn diagonal_wish_direction_is_normalised() {
        let mut input = LocomotionInput::new();
        input.set_movement(Vec2::new(1.0, 1.0));
        let direction = input.sample().wish_direction();
        assert!((direction.length() - 1.0).abs() < 0.001);
    }

    #[test]
    fn no_input_means_no_direction() {
        let mut input = LocomotionInput::new();
        assert_eq!(input.sample().wish_direction(), Vec3::ZERO);
    }

    #[test]
    fn clear_keeps_edge_history() {
        let mut input = LocomotionInput::new();
        input.jump = true;
        input.sample();
        input.clear();
        input.jump = true;
        // jump_prev was latched true before clear; no new edge.
        assert!(!input.sample().jump_pressed);
    }
}
