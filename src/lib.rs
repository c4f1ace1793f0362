//! # `parkour_controller`
//!
//! A first-person parkour locomotion controller with physics backend abstraction.
//!
//! This crate provides a rigid-body movement state machine that:
//! - Walks, sprints and jumps with smoothed speed changes and slope projection
//! - Crouches with a resizing capsule, and slides out of a sprint
//! - Runs along walls with reduced gravity, camera tilt and FOV signals
//! - Detects, grabs, hangs from and pulls up onto ledges
//! - Publishes read-only telemetry for cameras and effects
//! - Abstracts physics for easy swapping (Rapier3D and a headless world included)
//!
//! ## Architecture
//!
//! Each actor owns a [`LocomotionController`](controller::LocomotionController),
//! driven by two ticks:
//! 1. A **frame tick** (every rendered frame) samples input, runs detection,
//!    toggles stances, advances ledge transitions and eases camera signals
//! 2. A **simulation tick** (every physics step) applies movement and wall-run
//!    forces
//!
//! Exactly one sub-controller owns the body at a time: ledge transitions take
//! precedence over wall-running, which takes precedence over plain movement.
//!
//! ## Usage
//!
//! ```rust
//! use bevy::prelude::*;
//! use parkour_controller::prelude::*;
//!
//! // Configure an actor; the plugin builds its controller from the collider.
//! let config = LocomotionConfig::player();
//! let input = LocomotionInput::default();
//!
//! // Or run one without an App:
//! let world = BoxWorld::new().with(SolidBox::new(Vec3::new(-10.0, -1.0, -10.0), Vec3::new(10.0, 0.0, 10.0)));
//! let mut sim = HeadlessSimulation::new(world, HeadlessBody::capsule(Vec3::ZERO, 2.0, 0.5), config).unwrap();
//! sim.tick(1.0 / 60.0);
//! assert!(sim.controller.is_grounded());
//! ```

use bevy::prelude::*;

pub mod backend;
pub mod collision;
pub mod config;
pub mod controller;
pub mod detection;
pub mod error;
pub mod headless;
pub mod intent;
pub mod ledge;
pub mod movement;
pub mod state;
pub mod systems;
pub mod telemetry;
pub mod transition;
pub mod wall_run;

#[cfg(feature = "rapier3d")]
pub mod rapier;

pub mod prelude {
    //! Convenient re-exports for common usage.

    pub use crate::backend::{
        CapsuleDimensions, ForceMode, LayerMask, LocomotionBackend, PhysicsBody, SpatialQuery,
    };
    pub use crate::collision::CollisionData;
    pub use crate::config::{KeyBindings, LedgeConfig, LocomotionConfig, MovementConfig, WallRunConfig};
    pub use crate::controller::LocomotionController;
    pub use crate::detection::{WallContact, WallSide};
    pub use crate::error::ConfigError;
    pub use crate::headless::{
        BoxWorld, HeadlessBackend, HeadlessBody, HeadlessGravity, HeadlessSimulation, SolidBox,
    };
    pub use crate::intent::{InputFrame, KeyboardControlled, LocomotionInput};
    pub use crate::ledge::LedgeCandidate;
    pub use crate::state::{
        Airborne, Crouching, Grounded, LedgeHanging, LocomotionDisabled, LocomotionMode,
        PullingUp, Sliding, Stance, WallRunning,
    };
    pub use crate::telemetry::{CancelLedgeGrab, LocomotionTelemetry};
    pub use crate::{LocomotionPlugin, LocomotionSet};

    #[cfg(feature = "rapier3d")]
    pub use crate::rapier::{Rapier3dBackend, Rapier3dLocomotionBundle};
}

/// System sets for ordering locomotion systems.
///
/// In `Update`: [`Input`](Self::Input) → [`Setup`](Self::Setup) →
/// [`Frame`](Self::Frame) → [`Publish`](Self::Publish).
/// In `FixedUpdate`: [`Simulation`](Self::Simulation).
///
/// Input sources (gamepads, AI, replays) should write [`LocomotionInput`](intent::LocomotionInput)
/// in or before [`LocomotionSet::Input`]; camera rigs should read
/// [`LocomotionTelemetry`](telemetry::LocomotionTelemetry) after [`LocomotionSet::Publish`].
#[derive(SystemSet, Debug, Clone, PartialEq, Eq, Hash)]
pub enum LocomotionSet {
    /// Collect input into `LocomotionInput`.
    Input,
    /// Build controllers for newly configured actors.
    Setup,
    /// The backend's frame tick.
    Frame,
    /// Sync state marker components.
    Publish,
    /// The backend's simulation tick and force application.
    Simulation,
}

/// Main plugin for the locomotion controller.
///
/// This plugin is generic over a physics backend `B` which provides the actual
/// physics operations (queries, forces, the two ticks).
///
/// # Type Parameters
/// - `B`: The physics backend implementation (e.g., `Rapier3dBackend`)
///
/// # Examples
///
/// With Rapier3D backend:
/// ```rust,no_run
/// use bevy::prelude::*;
/// use bevy_rapier3d::prelude::*;
/// use parkour_controller::prelude::*;
///
/// App::new()
///     .add_plugins(DefaultPlugins)
///     .add_plugins(RapierPhysicsPlugin::<NoUserData>::default())
///     .add_plugins(LocomotionPlugin::<Rapier3dBackend>::default())
///     .run();
/// ```
pub struct LocomotionPlugin<B: backend::LocomotionBackend> {
    _marker: std::marker::PhantomData<B>,
}

impl<B: backend::LocomotionBackend> Default for LocomotionPlugin<B> {
    fn default() -> Self {
        Self {
            _marker: std::marker::PhantomData,
        }
    }
}

impl<B: backend::LocomotionBackend> Plugin for LocomotionPlugin<B> {
    fn build(&self, app: &mut App) {
        // Register core types
        app.register_type::<config::LocomotionConfig>();
        app.register_type::<intent::LocomotionInput>();
        app.register_type::<intent::KeyboardControlled>();
        app.register_type::<telemetry::LocomotionTelemetry>();
        app.register_type::<state::Grounded>();
        app.register_type::<state::Airborne>();
        app.register_type::<state::Crouching>();
        app.register_type::<state::Sliding>();
        app.register_type::<state::WallRunning>();
        app.register_type::<state::LedgeHanging>();
        app.register_type::<state::PullingUp>();
        app.register_type::<state::LocomotionDisabled>();

        app.add_event::<telemetry::CancelLedgeGrab>();

        app.configure_sets(
            Update,
            (
                LocomotionSet::Input,
                LocomotionSet::Setup,
                LocomotionSet::Frame,
                LocomotionSet::Publish,
            )
                .chain(),
        );

        app.add_systems(
            Update,
            (
                systems::read_keyboard_input.in_set(LocomotionSet::Input),
                systems::initialize_controllers::<B>.in_set(LocomotionSet::Setup),
                systems::sync_state_markers.in_set(LocomotionSet::Publish),
            ),
        );

        // Add the physics backend plugin
        app.add_plugins(B::plugin());
    }
}
