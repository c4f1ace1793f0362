//! Physics backend abstraction.
//!
//! The locomotion core never talks to a physics engine directly. It reads the
//! world through [`SpatialQuery`] and drives the actor's rigid body through
//! [`PhysicsBody`]. A [`LocomotionBackend`] ties both to a concrete engine
//! (Rapier3D, the analytic [`HeadlessBackend`](crate::headless::HeadlessBackend),
//! or your own) and provides the systems that run the controller against it.

use bevy::prelude::*;

use crate::collision::CollisionData;

/// Collision layer bitmask used to filter spatial queries.
#[derive(Reflect, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LayerMask(pub u32);

impl LayerMask {
    /// Matches every layer.
    pub const ALL: Self = Self(u32::MAX);
    /// Matches nothing.
    pub const NONE: Self = Self(0);

    /// Mask containing only the given layer index (0..32).
    ///
    /// Indices past the last layer give [`LayerMask::NONE`].
    pub const fn layer(index: u32) -> Self {
        match 1u32.checked_shl(index) {
            Some(bits) => Self(bits),
            None => Self::NONE,
        }
    }

    /// True if any bit of `other` is set in this mask.
    #[inline]
    pub fn intersects(&self, other: LayerMask) -> bool {
        self.0 & other.0 != 0
    }
}

impl Default for LayerMask {
    fn default() -> Self {
        Self::ALL
    }
}

/// How [`PhysicsBody::add_force`] interprets its vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForceMode {
    /// Continuous force, scaled by inverse mass by the engine.
    Force,
    /// Continuous acceleration, independent of mass.
    Acceleration,
    /// Instantaneous change in momentum.
    Impulse,
}

/// Capsule collider dimensions, measured from the actor's origin (its feet).
#[derive(Reflect, Debug, Clone, Copy, PartialEq)]
pub struct CapsuleDimensions {
    /// Total height, including both hemispherical caps.
    pub height: f32,
    /// Radius of the capsule.
    pub radius: f32,
    /// Offset of the capsule center from the actor origin.
    pub center: Vec3,
}

impl CapsuleDimensions {
    /// A capsule standing on the origin: its center sits at half the height.
    pub fn standing(height: f32, radius: f32) -> Self {
        Self {
            height,
            radius,
            center: Vec3::Y * height * 0.5,
        }
    }

    /// Half-length of the capsule's inner segment.
    #[inline]
    pub fn half_segment(&self) -> f32 {
        (self.height * 0.5 - self.radius).max(0.0)
    }
}

/// Read-only spatial queries against the physics world.
///
/// Implementations exclude the querying actor's own collider.
pub trait SpatialQuery {
    /// Cast a ray and return the first boundary it crosses.
    ///
    /// A ray that starts inside a solid reports the point where it leaves it.
    fn raycast(
        &self,
        origin: Vec3,
        direction: Vec3,
        max_distance: f32,
        layers: LayerMask,
    ) -> Option<CollisionData>;

    /// Sweep a sphere along `direction`.
    ///
    /// A sphere that already overlaps geometry at `origin` reports a hit at
    /// distance zero.
    fn sphere_cast(
        &self,
        origin: Vec3,
        radius: f32,
        direction: Vec3,
        max_distance: f32,
        layers: LayerMask,
    ) -> Option<CollisionData>;

    /// True if a sphere at `center` overlaps any geometry in `layers`.
    fn sphere_overlap(&self, center: Vec3, radius: f32, layers: LayerMask) -> bool;
}

/// Mutable access to the actor's rigid body.
pub trait PhysicsBody {
    /// Current linear velocity.
    fn velocity(&self) -> Vec3;

    /// Overwrite the linear velocity.
    fn set_velocity(&mut self, velocity: Vec3);

    /// Apply a force, acceleration or impulse.
    ///
    /// Impulses take effect immediately; forces and accelerations accumulate
    /// until the next physics step.
    fn add_force(&mut self, force: Vec3, mode: ForceMode);

    /// Switch between kinematic (script-driven) and dynamic simulation.
    fn set_kinematic(&mut self, kinematic: bool);

    /// True while the body is kinematic.
    fn is_kinematic(&self) -> bool;

    /// Enable or disable engine gravity for the body.
    fn set_gravity_enabled(&mut self, enabled: bool);

    /// True while engine gravity applies to the body.
    fn gravity_enabled(&self) -> bool;

    /// Set the linear damping ("drag") coefficient.
    fn set_linear_damping(&mut self, damping: f32);

    /// World position of the actor origin (its feet).
    fn translation(&self) -> Vec3;

    /// World orientation of the actor.
    fn rotation(&self) -> Quat;

    /// Teleport the actor origin.
    fn set_translation(&mut self, translation: Vec3);

    /// Overwrite the actor's orientation.
    fn set_rotation(&mut self, rotation: Quat);

    /// Resize the actor's capsule collider.
    fn set_capsule(&mut self, capsule: CapsuleDimensions);
}

/// Trait for physics backend implementations.
///
/// A backend names the collider component the controller is initialised
/// from, knows how to read capsule dimensions from it, and returns the plugin
/// that runs the controller's frame and simulation ticks against its engine.
pub trait LocomotionBackend: 'static + Send + Sync {
    /// The collider component the actor's capsule is read from.
    type Collider: Component;

    /// Returns the plugin that sets up this backend.
    fn plugin() -> impl Plugin;

    /// Capsule dimensions of `collider`, or `None` if it is not a capsule.
    fn capsule_of(collider: &Self::Collider) -> Option<CapsuleDimensions>;
}
