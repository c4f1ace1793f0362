//! Backend-independent systems.
//!
//! Input collection, controller setup and state marker sync. The ticks
//! themselves need engine access and live in each backend's plugin.

use bevy::prelude::*;

use crate::backend::LocomotionBackend;
use crate::config::LocomotionConfig;
use crate::controller::LocomotionController;
use crate::error::ConfigError;
use crate::intent::{KeyboardControlled, LocomotionInput};
use crate::state::{
    Airborne, Crouching, Grounded, LedgeHanging, LocomotionDisabled, PullingUp, Sliding,
    WallRunning,
};
use crate::telemetry::LocomotionTelemetry;

/// Fill [`LocomotionInput`] from the keyboard for [`KeyboardControlled`] actors.
///
/// Yaw is left alone; the camera rig owns it.
pub fn read_keyboard_input(
    keys: Option<Res<ButtonInput<KeyCode>>>,
    mut q_inputs: Query<(&LocomotionConfig, &mut LocomotionInput), With<KeyboardControlled>>,
) {
    let Some(keys) = keys else {
        return;
    };

    for (config, mut input) in &mut q_inputs {
        let bindings = &config.keys;
        let axis = |positive: KeyCode, negative: KeyCode| {
            let mut value = 0.0;
            if keys.pressed(positive) {
                value += 1.0;
            }
            if keys.pressed(negative) {
                value -= 1.0;
            }
            value
        };

        input.set_movement(Vec2::new(
            axis(bindings.right, bindings.left),
            axis(bindings.forward, bindings.back),
        ));
        input.sprint = keys.pressed(bindings.sprint);
        input.jump = keys.pressed(bindings.jump);
        input.crouch = keys.pressed(bindings.crouch);
    }
}

/// Build a [`LocomotionController`] for every newly configured actor.
///
/// Actors without a usable capsule collider, or with an invalid
/// configuration, get [`LocomotionDisabled`] instead and are never ticked.
pub fn initialize_controllers<B: LocomotionBackend>(
    mut commands: Commands,
    q_new: Query<
        (
            Entity,
            &LocomotionConfig,
            Option<&B::Collider>,
            Has<LocomotionInput>,
            Has<LocomotionTelemetry>,
        ),
        (Without<LocomotionController>, Without<LocomotionDisabled>),
    >,
) {
    for (entity, config, collider, has_input, has_telemetry) in &q_new {
        let controller = collider
            .ok_or(ConfigError::MissingCollider)
            .and_then(|c| B::capsule_of(c).ok_or(ConfigError::UnsupportedCollider))
            .and_then(|capsule| LocomotionController::new(config, capsule));

        match controller {
            Ok(controller) => {
                debug!("{entity}: locomotion controller ready");
                let mut entity_commands = commands.entity(entity);
                entity_commands.insert(controller);
                if !has_input {
                    entity_commands.insert(LocomotionInput::default());
                }
                if !has_telemetry {
                    entity_commands.insert(LocomotionTelemetry::default());
                }
            }
            Err(err) => {
                error!("{entity}: locomotion disabled: {err}");
                commands.entity(entity).insert(LocomotionDisabled {
                    reason: err.to_string(),
                });
            }
        }
    }
}

/// Sync state marker components with the controller.
pub fn sync_state_markers(
    mut commands: Commands,
    q_controllers: Query<(
        Entity,
        &LocomotionController,
        Has<Grounded>,
        Has<Airborne>,
        Has<Crouching>,
        Has<Sliding>,
        Option<&WallRunning>,
        Has<LedgeHanging>,
        Has<PullingUp>,
    )>,
) {
    for (
        entity,
        controller,
        has_grounded,
        has_airborne,
        has_crouching,
        has_sliding,
        wall_running,
        has_hanging,
        has_pulling_up,
    ) in &q_controllers
    {
        let mut entity_commands = commands.entity(entity);

        // Grounded/Airborne
        let grounded = controller.is_grounded();
        if grounded && !has_grounded {
            entity_commands.insert(Grounded);
        } else if !grounded && has_grounded {
            entity_commands.remove::<Grounded>();
        }
        if !grounded && !has_airborne {
            entity_commands.insert(Airborne);
        } else if grounded && has_airborne {
            entity_commands.remove::<Airborne>();
        }

        toggle_marker(&mut entity_commands, controller.is_crouching(), has_crouching, Crouching);
        toggle_marker(&mut entity_commands, controller.is_sliding(), has_sliding, Sliding);
        toggle_marker(&mut entity_commands, controller.is_hanging(), has_hanging, LedgeHanging);
        toggle_marker(&mut entity_commands, controller.is_pulling_up(), has_pulling_up, PullingUp);

        // WallRunning carries the contact, so refresh it when the wall changes.
        match (controller.wall_contact(), wall_running) {
            (Some(contact), Some(marker)) if marker.contact == *contact => {}
            (Some(contact), _) => {
                entity_commands.insert(WallRunning { contact: *contact });
            }
            (None, Some(_)) => {
                entity_commands.remove::<WallRunning>();
            }
            (None, None) => {}
        }
    }
}

fn toggle_marker<M: Component>(
    entity_commands: &mut EntityCommands,
    active: bool,
    present: bool,
    marker: M,
) {
    if active && !present {
        entity_commands.insert(marker);
    } else if !active && present {
        entity_commands.remove::<M>();
    }
}
