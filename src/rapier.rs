//! Rapier3D physics backend implementation.
//!
//! This module provides the physics backend for Bevy Rapier3D.
//! Enable with the `rapier3d` feature (on by default).

use bevy::ecs::query::QueryData;
use bevy::prelude::*;
use bevy_rapier3d::geometry::Group;
use bevy_rapier3d::prelude::*;

use crate::backend::{
    CapsuleDimensions, ForceMode, LayerMask, LocomotionBackend, PhysicsBody, SpatialQuery,
};
use crate::collision::CollisionData;
use crate::config::LocomotionConfig;
use crate::controller::LocomotionController;
use crate::intent::LocomotionInput;
use crate::state::LocomotionDisabled;
use crate::telemetry::{CancelLedgeGrab, LocomotionTelemetry};
use crate::LocomotionSet;

/// Rapier3D physics backend for the locomotion controller.
///
/// Spatial queries go through the default `RapierContext`; the body is driven
/// through its `Velocity`, `ExternalForce`, `RigidBody`, `GravityScale`,
/// `Damping` and `Collider` components. See [`Rapier3dLocomotionBundle`].
pub struct Rapier3dBackend;

impl LocomotionBackend for Rapier3dBackend {
    type Collider = Collider;

    fn plugin() -> impl Plugin {
        Rapier3dBackendPlugin
    }

    fn capsule_of(collider: &Collider) -> Option<CapsuleDimensions> {
        capsule_dimensions(collider)
    }
}

/// Plugin that sets up Rapier3D-specific systems for the locomotion controller.
pub struct Rapier3dBackendPlugin;

impl Plugin for Rapier3dBackendPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(Update, rapier_frame_tick.in_set(LocomotionSet::Frame));

        // Forces are rebuilt from scratch every physics step.
        app.add_systems(
            FixedUpdate,
            (clear_locomotion_forces, rapier_simulation_tick)
                .chain()
                .in_set(LocomotionSet::Simulation),
        );
    }
}

/// Read capsule dimensions from a Rapier collider.
///
/// Returns `None` for anything that is not a capsule.
pub fn capsule_dimensions(collider: &Collider) -> Option<CapsuleDimensions> {
    let capsule = collider.as_capsule()?;
    let segment = capsule.segment();
    let (a, b) = (segment.a(), segment.b());
    let radius = capsule.radius();

    Some(CapsuleDimensions {
        height: a.distance(b) + radius * 2.0,
        radius,
        center: (a + b) * 0.5,
    })
}

/// Build the collider for `capsule`, upright around its center.
pub fn capsule_collider(capsule: CapsuleDimensions) -> Collider {
    let half = Vec3::Y * capsule.half_segment();
    Collider::capsule(capsule.center - half, capsule.center + half, capsule.radius)
}

/// Spatial queries against a `RapierContext`, excluding one actor's body.
pub struct RapierSpatialQuery<'a, 'w> {
    context: &'a RapierContext<'w>,
    exclude: Entity,
}

impl<'a, 'w> RapierSpatialQuery<'a, 'w> {
    pub fn new(context: &'a RapierContext<'w>, exclude: Entity) -> Self {
        Self { context, exclude }
    }

    fn filter(&self, layers: LayerMask) -> QueryFilter<'static> {
        QueryFilter::default()
            .exclude_rigid_body(self.exclude)
            .exclude_sensors()
            .groups(CollisionGroups::new(
                Group::ALL,
                Group::from_bits_truncate(layers.0),
            ))
    }
}

impl SpatialQuery for RapierSpatialQuery<'_, '_> {
    fn raycast(
        &self,
        origin: Vec3,
        direction: Vec3,
        max_distance: f32,
        layers: LayerMask,
    ) -> Option<CollisionData> {
        let direction = direction.normalize_or_zero();
        if direction == Vec3::ZERO {
            return None;
        }

        // Hollow shapes: a ray starting inside a collider reports where it leaves.
        self.context
            .cast_ray_and_get_normal(origin, direction, max_distance, false, self.filter(layers))
            .map(|(entity, hit)| {
                CollisionData::new(hit.time_of_impact, hit.normal, hit.point, Some(entity))
            })
    }

    fn sphere_cast(
        &self,
        origin: Vec3,
        radius: f32,
        direction: Vec3,
        max_distance: f32,
        layers: LayerMask,
    ) -> Option<CollisionData> {
        let direction = direction.normalize_or_zero();
        if direction == Vec3::ZERO {
            return None;
        }

        let ball = Collider::ball(radius);
        self.context
            .cast_shape(
                origin,
                Quat::IDENTITY,
                direction,
                &ball,
                ShapeCastOptions {
                    max_time_of_impact: max_distance,
                    stop_at_penetration: true,
                    ..default()
                },
                self.filter(layers),
            )
            .map(|(entity, hit)| {
                let toi = hit.time_of_impact;
                let (normal, point) = hit
                    .details
                    .map(|d| (d.normal1, d.witness1))
                    .unwrap_or((-direction, origin + direction * toi));
                CollisionData::new(toi, normal, point, Some(entity))
            })
    }

    fn sphere_overlap(&self, center: Vec3, radius: f32, layers: LayerMask) -> bool {
        let ball = Collider::ball(radius);
        self.context
            .query_pipeline
            .intersection_with_shape(
                self.context.colliders,
                self.context.rigidbody_set,
                center,
                Quat::IDENTITY,
                &ball,
                self.filter(layers),
            )
            .is_some()
    }
}

/// The Rapier components the controller drives.
#[derive(QueryData)]
#[query_data(mutable)]
pub struct RapierBody {
    pub transform: &'static mut Transform,
    pub velocity: &'static mut Velocity,
    pub external_force: &'static mut ExternalForce,
    pub rigid_body: &'static mut RigidBody,
    pub gravity_scale: &'static mut GravityScale,
    pub damping: &'static mut Damping,
    pub collider: &'static mut Collider,
    pub mass_properties: Option<&'static ReadMassProperties>,
}

impl RapierBodyItem<'_> {
    fn mass(&self) -> f32 {
        self.mass_properties
            .map(|props| props.mass)
            .filter(|mass| *mass > 0.0 && mass.is_finite())
            .unwrap_or(1.0)
    }
}

impl PhysicsBody for RapierBodyItem<'_> {
    fn velocity(&self) -> Vec3 {
        self.velocity.linvel
    }

    fn set_velocity(&mut self, velocity: Vec3) {
        self.velocity.linvel = velocity;
    }

    fn add_force(&mut self, force: Vec3, mode: ForceMode) {
        let mass = self.mass();
        match mode {
            ForceMode::Force => self.external_force.force += force,
            ForceMode::Acceleration => self.external_force.force += force * mass,
            ForceMode::Impulse => self.velocity.linvel += force / mass,
        }
    }

    fn set_kinematic(&mut self, kinematic: bool) {
        let body = if kinematic {
            RigidBody::KinematicPositionBased
        } else {
            RigidBody::Dynamic
        };
        self.rigid_body.set_if_neq(body);
    }

    fn is_kinematic(&self) -> bool {
        matches!(
            *self.rigid_body,
            RigidBody::KinematicPositionBased | RigidBody::KinematicVelocityBased
        )
    }

    fn set_gravity_enabled(&mut self, enabled: bool) {
        self.gravity_scale.0 = if enabled { 1.0 } else { 0.0 };
    }

    fn gravity_enabled(&self) -> bool {
        self.gravity_scale.0 != 0.0
    }

    fn set_linear_damping(&mut self, damping: f32) {
        // Avoid flagging the component changed every frame.
        if self.damping.linear_damping != damping {
            self.damping.linear_damping = damping;
        }
    }

    fn translation(&self) -> Vec3 {
        self.transform.translation
    }

    fn rotation(&self) -> Quat {
        self.transform.rotation
    }

    fn set_translation(&mut self, translation: Vec3) {
        self.transform.translation = translation;
    }

    fn set_rotation(&mut self, rotation: Quat) {
        self.transform.rotation = rotation;
    }

    fn set_capsule(&mut self, capsule: CapsuleDimensions) {
        *self.collider = capsule_collider(capsule);
    }
}

/// Frame tick: cancel requests, input sampling, the controller's frame tick
/// and telemetry.
fn rapier_frame_tick(
    time: Res<Time>,
    rapier_context: ReadRapierContext,
    mut cancels: EventReader<CancelLedgeGrab>,
    mut q_actors: Query<
        (
            Entity,
            &LocomotionConfig,
            &mut LocomotionInput,
            &mut LocomotionController,
            RapierBody,
            Option<&mut LocomotionTelemetry>,
        ),
        Without<LocomotionDisabled>,
    >,
) {
    let Ok(context) = rapier_context.single() else {
        return;
    };
    let dt = time.delta_secs();
    let cancelled: Vec<Entity> = cancels.read().map(|c| c.entity).collect();

    for (entity, config, mut input, mut controller, mut body, telemetry) in &mut q_actors {
        if cancelled.contains(&entity) {
            controller.cancel_ledge_grab(&mut body);
        }

        let query = RapierSpatialQuery::new(&context, entity);
        let frame = input.sample();
        controller.frame_tick(&frame, config, &query, &mut body, dt);

        if let Some(mut telemetry) = telemetry {
            telemetry.update(&controller, body.velocity(), config, dt);
        }
    }
}

/// Reset the force accumulator before the controller writes this step's forces.
pub fn clear_locomotion_forces(
    mut q_forces: Query<&mut ExternalForce, (With<LocomotionController>, Without<LocomotionDisabled>)>,
) {
    for mut external_force in &mut q_forces {
        external_force.force = Vec3::ZERO;
    }
}

fn rapier_simulation_tick(
    rapier_context: ReadRapierContext,
    mut q_actors: Query<
        (Entity, &LocomotionConfig, &mut LocomotionController, RapierBody),
        Without<LocomotionDisabled>,
    >,
) {
    let Ok(context) = rapier_context.single() else {
        return;
    };

    for (entity, config, mut controller, mut body) in &mut q_actors {
        let query = RapierSpatialQuery::new(&context, entity);
        controller.simulation_tick(config, &query, &mut body);
    }
}

/// Bundle for creating a parkour actor with Rapier3D physics.
///
/// Provides the rigid body, velocity tracking, force accumulator, axis locking,
/// damping, gravity scale, mass properties and the capsule collider the
/// controller resizes when crouching.
///
/// # Example
///
/// ```ignore
/// use bevy::prelude::*;
/// use parkour_controller::prelude::*;
/// use parkour_controller::rapier::Rapier3dLocomotionBundle;
///
/// fn spawn_player(mut commands: Commands) {
///     commands.spawn((
///         Transform::from_xyz(0.0, 1.0, 0.0),
///         LocomotionConfig::player(),
///         KeyboardControlled,
///         Rapier3dLocomotionBundle::capsule(2.0, 0.5),
///     ));
/// }
/// ```
///
/// # Defaults
///
/// - `rigid_body`: [`RigidBody::Dynamic`]
/// - `locked_axes`: [`LockedAxes::ROTATION_LOCKED`]; the controller sets the
///   facing directly while hanging.
/// - `friction` / `restitution`: zero with the `Min` combine rule, so walls
///   don't grab the capsule and landings don't bounce.
/// - `gravity_scale`: 1.0; the controller zeroes it while wall-running or
///   on a ledge.
/// - `ccd`: enabled, to avoid tunnelling at slide and wall-jump speeds.
#[derive(Bundle)]
pub struct Rapier3dLocomotionBundle {
    /// The rigid body type. Switched to kinematic during ledge transitions.
    pub rigid_body: RigidBody,
    /// Current linear and angular velocity. Updated by Rapier each physics step.
    pub velocity: Velocity,
    /// Forces applied this step. Rebuilt by the controller every step.
    pub external_force: ExternalForce,
    /// Which axes are locked.
    pub locked_axes: LockedAxes,
    /// Linear damping doubles as the controller's drag.
    pub damping: Damping,
    /// 1.0 while engine gravity applies, 0.0 while it is suspended.
    pub gravity_scale: GravityScale,
    /// Computed mass properties. Forces in acceleration mode scale by this mass.
    pub mass_properties: ReadMassProperties,
    pub friction: Friction,
    pub restitution: Restitution,
    pub ccd: Ccd,
    pub sleeping: Sleeping,
    /// Capsule standing on the actor origin.
    pub collider: Collider,
}

impl Rapier3dLocomotionBundle {
    /// A dynamic, rotation-locked actor with a capsule of the given total
    /// height and radius, its base on the actor origin.
    pub fn capsule(height: f32, radius: f32) -> Self {
        Self {
            rigid_body: RigidBody::Dynamic,
            velocity: Velocity::zero(),
            external_force: ExternalForce::default(),
            locked_axes: LockedAxes::ROTATION_LOCKED,
            damping: Damping {
                linear_damping: 0.0,
                angular_damping: 1.0,
            },
            gravity_scale: GravityScale(1.0),
            // Rapier will update this based on collider after first physics step
            mass_properties: ReadMassProperties::default(),
            friction: Friction {
                coefficient: 0.0,
                combine_rule: CoefficientCombineRule::Min,
            },
            restitution: Restitution {
                coefficient: 0.0,
                combine_rule: CoefficientCombineRule::Min,
            },
            ccd: Ccd::enabled(),
            sleeping: Sleeping::disabled(),
            collider: capsule_collider(CapsuleDimensions::standing(height, radius)),
        }
    }

    /// Bundle for the capsule described by `config`'s standing height.
    pub fn from_config(config: &LocomotionConfig, radius: f32) -> Self {
        Self::capsule(config.movement.standing_height, radius)
    }

    /// Set the rigid body type.
    ///
    /// The controller switches between [`RigidBody::Dynamic`] and
    /// [`RigidBody::KinematicPositionBased`] on its own; anything else is
    /// overwritten at the first ledge grab.
    pub fn with_body(mut self, body: RigidBody) -> Self {
        self.rigid_body = body;
        self
    }

    /// Set which axes should be locked for the rigid body.
    pub fn with_locked_axes(mut self, axes: LockedAxes) -> Self {
        self.locked_axes = axes;
        self
    }

    /// Set the friction coefficient against the environment.
    ///
    /// Non-zero values make walls "sticky" during wall-runs.
    pub fn with_friction(mut self, coefficient: f32) -> Self {
        self.friction.coefficient = coefficient;
        self
    }
}
