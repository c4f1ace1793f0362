//! Headless physics backend.
//!
//! A tiny analytic world of axis-aligned boxes and a semi-implicit Euler
//! rigid body. It answers the same queries as a real engine, deterministically
//! and without a renderer, which makes it the backend of choice for servers,
//! replays and tests.
//!
//! Simplifications: spheres are swept against radius-inflated boxes (square
//! corners) and the actor collides as the axis-aligned bounds of its capsule.

use bevy::prelude::*;

use crate::backend::{CapsuleDimensions, ForceMode, LayerMask, LocomotionBackend, PhysicsBody, SpatialQuery};
use crate::collision::CollisionData;
use crate::config::LocomotionConfig;
use crate::controller::LocomotionController;
use crate::error::ConfigError;
use crate::intent::LocomotionInput;
use crate::state::LocomotionDisabled;
use crate::telemetry::{CancelLedgeGrab, LocomotionTelemetry};
use crate::LocomotionSet;

/// An axis-aligned solid box.
#[derive(Reflect, Debug, Clone, Copy, PartialEq)]
pub struct SolidBox {
    pub min: Vec3,
    pub max: Vec3,
    pub layers: LayerMask,
}

impl SolidBox {
    /// Box spanning `min..max` on every layer.
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self {
            min: min.min(max),
            max: min.max(max),
            layers: LayerMask::ALL,
        }
    }

    pub fn from_center(center: Vec3, half_extents: Vec3) -> Self {
        Self::new(center - half_extents, center + half_extents)
    }

    /// Builder: restrict the box to `layers`.
    pub fn with_layers(mut self, layers: LayerMask) -> Self {
        self.layers = layers;
        self
    }

    /// This box grown by `amount` on every side.
    pub fn inflated(&self, amount: f32) -> Self {
        Self {
            min: self.min - Vec3::splat(amount),
            max: self.max + Vec3::splat(amount),
            layers: self.layers,
        }
    }

    pub fn closest_point(&self, point: Vec3) -> Vec3 {
        point.clamp(self.min, self.max)
    }

    /// Slab test. Returns the entry and exit parameters along the ray and the
    /// axes they were found on.
    fn ray_span(&self, origin: Vec3, direction: Vec3) -> Option<RaySpan> {
        let mut span = RaySpan {
            enter: f32::NEG_INFINITY,
            exit: f32::INFINITY,
            enter_axis: 0,
            exit_axis: 0,
        };

        for axis in 0..3 {
            let o = origin[axis];
            let d = direction[axis];
            let (lo, hi) = (self.min[axis], self.max[axis]);

            if d.abs() < 1.0e-8 {
                if o < lo || o > hi {
                    return None;
                }
                continue;
            }

            let (mut t0, mut t1) = ((lo - o) / d, (hi - o) / d);
            if t0 > t1 {
                std::mem::swap(&mut t0, &mut t1);
            }
            if t0 > span.enter {
                span.enter = t0;
                span.enter_axis = axis;
            }
            if t1 < span.exit {
                span.exit = t1;
                span.exit_axis = axis;
            }
            if span.enter > span.exit {
                return None;
            }
        }
        Some(span)
    }

    /// Outward normal of the face crossed along `axis` by a ray heading `direction`.
    fn face_normal(axis: usize, direction: Vec3, entering: bool) -> Vec3 {
        let mut normal = Vec3::ZERO;
        let sign = direction[axis].signum();
        normal[axis] = if entering { -sign } else { sign };
        normal
    }

    fn face_coordinate(&self, axis: usize, normal: Vec3) -> f32 {
        if normal[axis] > 0.0 {
            self.max[axis]
        } else {
            self.min[axis]
        }
    }
}

struct RaySpan {
    enter: f32,
    exit: f32,
    enter_axis: usize,
    exit_axis: usize,
}

/// Handle returned by [`BoxWorld::add`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BoxId(usize);

/// The static geometry of a headless world.
#[derive(Resource, Debug, Clone, Default)]
pub struct BoxWorld {
    boxes: Vec<Option<SolidBox>>,
}

impl BoxWorld {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: add a box.
    pub fn with(mut self, solid: SolidBox) -> Self {
        self.add(solid);
        self
    }

    pub fn add(&mut self, solid: SolidBox) -> BoxId {
        self.boxes.push(Some(solid));
        BoxId(self.boxes.len() - 1)
    }

    pub fn remove(&mut self, id: BoxId) -> Option<SolidBox> {
        self.boxes.get_mut(id.0).and_then(Option::take)
    }

    pub fn boxes(&self) -> impl Iterator<Item = &SolidBox> {
        self.boxes.iter().flatten()
    }

    fn in_layers(&self, layers: LayerMask) -> impl Iterator<Item = &SolidBox> {
        self.boxes().filter(move |b| b.layers.intersects(layers))
    }

    /// Push `bounds` (given as min/max) out of every box it overlaps.
    /// Returns the total correction and the axes that were corrected.
    fn resolve(&self, mut min: Vec3, mut max: Vec3) -> (Vec3, BVec3) {
        let mut correction = Vec3::ZERO;
        let mut touched = BVec3::FALSE;

        for solid in self.boxes() {
            let overlap = max.min(solid.max) - min.max(solid.min);
            if overlap.min_element() <= 0.0 {
                continue;
            }

            // Push out along the axis of least penetration.
            let axis = if overlap.x <= overlap.y && overlap.x <= overlap.z {
                0
            } else if overlap.y <= overlap.z {
                1
            } else {
                2
            };
            let mine = (min[axis] + max[axis]) * 0.5;
            let theirs = (solid.min[axis] + solid.max[axis]) * 0.5;
            let push = if mine >= theirs {
                solid.max[axis] - min[axis]
            } else {
                solid.min[axis] - max[axis]
            };

            let mut delta = Vec3::ZERO;
            delta[axis] = push;
            min += delta;
            max += delta;
            correction += delta;
            touched.set(axis, true);
        }
        (correction, touched)
    }
}

impl SpatialQuery for BoxWorld {
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

        let mut best: Option<CollisionData> = None;
        for solid in self.in_layers(layers) {
            let Some(span) = solid.ray_span(origin, direction) else {
                continue;
            };
            if span.exit < 0.0 {
                continue;
            }

            // Starting inside reports the exit boundary.
            let (distance, axis, entering) = if span.enter >= 0.0 {
                (span.enter, span.enter_axis, true)
            } else {
                (span.exit, span.exit_axis, false)
            };
            if distance > max_distance {
                continue;
            }
            if best.is_some_and(|b| b.distance <= distance) {
                continue;
            }

            let normal = SolidBox::face_normal(axis, direction, entering);
            let mut point = origin + direction * distance;
            point[axis] = solid.face_coordinate(axis, normal);
            best = Some(CollisionData::new(distance, normal, point, None));
        }
        best
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

        let mut best: Option<CollisionData> = None;
        for solid in self.in_layers(layers) {
            let grown = solid.inflated(radius);
            let Some(span) = grown.ray_span(origin, direction) else {
                continue;
            };
            if span.exit < 0.0 {
                continue;
            }

            let hit = if span.enter <= 0.0 {
                // Already overlapping.
                let contact = solid.closest_point(origin);
                let normal = (origin - contact).normalize_or(-direction);
                CollisionData::new(0.0, normal, contact, None)
            } else {
                if span.enter > max_distance {
                    continue;
                }
                let normal = SolidBox::face_normal(span.enter_axis, direction, true);
                let center = origin + direction * span.enter;
                let contact = solid.closest_point(center);
                CollisionData::new(span.enter, normal, contact, None)
            };
            if best.is_some_and(|b| b.distance <= hit.distance) {
                continue;
            }
            best = Some(hit);
        }
        best
    }

    fn sphere_overlap(&self, center: Vec3, radius: f32, layers: LayerMask) -> bool {
        self.in_layers(layers)
            .any(|solid| solid.closest_point(center).distance_squared(center) <= radius * radius)
    }
}

/// Simulated rigid body for the headless backend.
///
/// Also serves as the collider component: [`capsule`](Self::capsule) is what
/// the controller is initialised from.
#[derive(Component, Debug, Clone)]
pub struct HeadlessBody {
    pub translation: Vec3,
    pub rotation: Quat,
    pub velocity: Vec3,
    pub mass: f32,
    pub kinematic: bool,
    pub gravity_enabled: bool,
    pub linear_damping: f32,
    pub capsule: Option<CapsuleDimensions>,
    acceleration: Vec3,
}

impl Default for HeadlessBody {
    fn default() -> Self {
        Self {
            translation: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            velocity: Vec3::ZERO,
            mass: 1.0,
            kinematic: false,
            gravity_enabled: true,
            linear_damping: 0.0,
            capsule: None,
            acceleration: Vec3::ZERO,
        }
    }
}

impl HeadlessBody {
    /// A unit-mass body standing at `translation` with a capsule collider.
    pub fn capsule(translation: Vec3, height: f32, radius: f32) -> Self {
        Self {
            translation,
            capsule: Some(CapsuleDimensions::standing(height, radius)),
            ..default()
        }
    }

    /// Acceleration accumulated since the last step.
    pub fn pending_acceleration(&self) -> Vec3 {
        self.acceleration
    }

    /// Integrate one physics step and resolve collisions against `world`.
    pub fn step(&mut self, world: &BoxWorld, gravity: Vec3, dt: f32) {
        let acceleration = std::mem::take(&mut self.acceleration);
        if self.kinematic {
            return;
        }

        let mut velocity = self.velocity + acceleration * dt;
        if self.gravity_enabled {
            velocity += gravity * dt;
        }
        velocity /= 1.0 + self.linear_damping * dt;
        self.velocity = velocity;
        self.translation += velocity * dt;

        let Some(capsule) = self.capsule else {
            return;
        };
        let half = Vec3::new(capsule.radius, capsule.height * 0.5, capsule.radius);
        let center = self.translation + capsule.center;
        let (correction, touched) = world.resolve(center - half, center + half);
        self.translation += correction;

        for axis in 0..3 {
            // Stop moving into whatever pushed us out.
            if touched.test(axis) && self.velocity[axis] * correction[axis] < 0.0 {
                self.velocity[axis] = 0.0;
            }
        }
    }
}

impl PhysicsBody for HeadlessBody {
    fn velocity(&self) -> Vec3 {
        self.velocity
    }

    fn set_velocity(&mut self, velocity: Vec3) {
        self.velocity = velocity;
    }

    fn add_force(&mut self, force: Vec3, mode: ForceMode) {
        if self.kinematic {
            return;
        }
        let inverse_mass = if self.mass > 0.0 { 1.0 / self.mass } else { 1.0 };
        match mode {
            ForceMode::Force => self.acceleration += force * inverse_mass,
            ForceMode::Acceleration => self.acceleration += force,
            ForceMode::Impulse => self.velocity += force * inverse_mass,
        }
    }

    fn set_kinematic(&mut self, kinematic: bool) {
        self.kinematic = kinematic;
    }

    fn is_kinematic(&self) -> bool {
        self.kinematic
    }

    fn set_gravity_enabled(&mut self, enabled: bool) {
        self.gravity_enabled = enabled;
    }

    fn gravity_enabled(&self) -> bool {
        self.gravity_enabled
    }

    fn set_linear_damping(&mut self, damping: f32) {
        self.linear_damping = damping;
    }

    fn translation(&self) -> Vec3 {
        self.translation
    }

    fn rotation(&self) -> Quat {
        self.rotation
    }

    fn set_translation(&mut self, translation: Vec3) {
        self.translation = translation;
    }

    fn set_rotation(&mut self, rotation: Quat) {
        self.rotation = rotation;
    }

    fn set_capsule(&mut self, capsule: CapsuleDimensions) {
        self.capsule = Some(capsule);
    }
}

/// One actor in a [`BoxWorld`], stepped without an [`App`].
///
/// Each [`tick`](Self::tick) runs a frame tick, a simulation tick and one
/// physics step with the same `dt`.
///
/// # Example
///
/// ```rust
/// use bevy::prelude::*;
/// use parkour_controller::prelude::*;
///
/// let world = BoxWorld::new().with(SolidBox::new(Vec3::new(-50.0, -1.0, -50.0), Vec3::new(50.0, 0.0, 50.0)));
/// let mut sim = HeadlessSimulation::new(
///     world,
///     HeadlessBody::capsule(Vec3::ZERO, 2.0, 0.5),
///     LocomotionConfig::default(),
/// )
/// .unwrap();
///
/// sim.input.set_movement(Vec2::new(0.0, 1.0));
/// sim.run(60, 1.0 / 60.0);
/// assert!(sim.body.translation.z < -1.0);
/// ```
#[derive(Debug, Clone)]
pub struct HeadlessSimulation {
    pub world: BoxWorld,
    pub body: HeadlessBody,
    pub controller: LocomotionController,
    pub config: LocomotionConfig,
    pub input: LocomotionInput,
    pub telemetry: LocomotionTelemetry,
    pub gravity: Vec3,
}

impl HeadlessSimulation {
    pub fn new(world: BoxWorld, body: HeadlessBody, config: LocomotionConfig) -> Result<Self, ConfigError> {
        let capsule = HeadlessBackend::capsule_of(&body).ok_or(ConfigError::MissingCollider)?;
        let controller = LocomotionController::new(&config, capsule)?;
        Ok(Self {
            world,
            body,
            controller,
            config,
            input: LocomotionInput::default(),
            telemetry: LocomotionTelemetry::default(),
            gravity: HeadlessGravity::default().0,
        })
    }

    pub fn tick(&mut self, dt: f32) {
        let frame = self.input.sample();
        self.controller
            .frame_tick(&frame, &self.config, &self.world, &mut self.body, dt);
        self.controller
            .simulation_tick(&self.config, &self.world, &mut self.body);
        self.body.step(&self.world, self.gravity, dt);
        self.telemetry
            .update(&self.controller, self.body.velocity, &self.config, dt);
    }

    pub fn run(&mut self, ticks: usize, dt: f32) {
        for _ in 0..ticks {
            self.tick(dt);
        }
    }

    /// Forward to [`LocomotionController::cancel_ledge_grab`].
    pub fn cancel_ledge_grab(&mut self) -> bool {
        self.controller.cancel_ledge_grab(&mut self.body)
    }
}

/// Gravity applied by the headless backend.
#[derive(Resource, Debug, Clone, Copy)]
pub struct HeadlessGravity(pub Vec3);

impl Default for HeadlessGravity {
    fn default() -> Self {
        Self(Vec3::new(0.0, -9.81, 0.0))
    }
}

/// Headless backend for [`LocomotionPlugin`](crate::LocomotionPlugin).
pub struct HeadlessBackend;

impl LocomotionBackend for HeadlessBackend {
    type Collider = HeadlessBody;

    fn plugin() -> impl Plugin {
        HeadlessBackendPlugin
    }

    fn capsule_of(collider: &HeadlessBody) -> Option<CapsuleDimensions> {
        collider.capsule
    }
}

/// Plugin that runs the controller against [`BoxWorld`] and [`HeadlessBody`].
pub struct HeadlessBackendPlugin;

impl Plugin for HeadlessBackendPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<BoxWorld>();
        app.init_resource::<HeadlessGravity>();

        app.add_systems(Update, headless_frame_tick.in_set(LocomotionSet::Frame));
        app.add_systems(
            FixedUpdate,
            (headless_simulation_tick, headless_physics_step)
                .chain()
                .in_set(LocomotionSet::Simulation),
        );
    }
}

fn headless_frame_tick(
    time: Res<Time>,
    world: Res<BoxWorld>,
    mut cancels: EventReader<CancelLedgeGrab>,
    mut q_actors: Query<
        (
            Entity,
            &LocomotionConfig,
            &mut LocomotionInput,
            &mut LocomotionController,
            &mut HeadlessBody,
            Option<&mut LocomotionTelemetry>,
        ),
        Without<LocomotionDisabled>,
    >,
) {
    let dt = time.delta_secs();
    let cancelled: Vec<Entity> = cancels.read().map(|c| c.entity).collect();

    for (entity, config, mut input, mut controller, mut body, telemetry) in &mut q_actors {
        if cancelled.contains(&entity) {
            controller.cancel_ledge_grab(body.as_mut());
        }

        let frame = input.sample();
        controller.frame_tick(&frame, config, world.as_ref(), body.as_mut(), dt);

        if let Some(mut telemetry) = telemetry {
            telemetry.update(&controller, body.velocity, config, dt);
        }
    }
}

fn headless_simulation_tick(
    world: Res<BoxWorld>,
    mut q_actors: Query<
        (&LocomotionConfig, &mut LocomotionController, &mut HeadlessBody),
        Without<LocomotionDisabled>,
    >,
) {
    for (config, mut controller, mut body) in &mut q_actors {
        controller.simulation_tick(config, world.as_ref(), body.as_mut());
    }
}

fn headless_physics_step(
    time: Res<Time>,
    world: Res<BoxWorld>,
    gravity: Res<HeadlessGravity>,
    mut q_bodies: Query<&mut HeadlessBody>,
) {
    let dt = time.delta_secs();
    for mut body in &mut q_bodies {
        body.step(&world, gravity.0, dt);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn floor() -> SolidBox {
        SolidBox::new(Vec3::new(-50.0, -1.0, -50.0), Vec3::new(50.0, 0.0, 50.0))
    }

    // ==================== Query Tests ====================

    #[test]
    fn raycast_hits_top_face() {
        let world = BoxWorld::new().with(floor());
        let hit = world
            .raycast(Vec3::new(1.0, 2.0, 3.0), Vec3::NEG_Y, 5.0, LayerMask::ALL)
            .unwrap();

        assert!((hit.distance - 2.0).abs() < 1.0e-5);
        assert_eq!(hit.normal, Vec3::Y);
        assert_eq!(hit.point.y, 0.0);
    }

    #[test]
    fn raycast_respects_range_and_layers() {
        let world = BoxWorld::new().with(floor().with_layers(LayerMask::layer(2)));

        assert!(world
            .raycast(Vec3::new(0.0, 2.0, 0.0), Vec3::NEG_Y, 1.9, LayerMask::ALL)
            .is_none());
        assert!(world
            .raycast(Vec3::new(0.0, 2.0, 0.0), Vec3::NEG_Y, 5.0, LayerMask::layer(1))
            .is_none());
        assert!(world
            .raycast(Vec3::new(0.0, 2.0, 0.0), Vec3::NEG_Y, 5.0, LayerMask::layer(2))
            .is_some());
    }

    #[test]
    fn raycast_from_inside_reports_exit() {
        let wall = SolidBox::new(Vec3::new(-1.0, -5.0, -3.0), Vec3::new(1.0, 1.8, -0.6));
        let world = BoxWorld::new().with(wall);

        let hit = world
            .raycast(Vec3::new(0.0, 0.0, -0.65), Vec3::Y, 2.5, LayerMask::ALL)
            .unwrap();
        assert_eq!(hit.point.y, 1.8);
        assert!((hit.distance - 1.8).abs() < 1.0e-5);
    }

    #[test]
    fn raycast_picks_nearest_box() {
        let world = BoxWorld::new()
            .with(SolidBox::new(Vec3::new(-1.0, -1.0, -10.0), Vec3::new(1.0, 1.0, -9.0)))
            .with(SolidBox::new(Vec3::new(-1.0, -1.0, -4.0), Vec3::new(1.0, 1.0, -3.0)));

        let hit = world
            .raycast(Vec3::ZERO, Vec3::NEG_Z, 20.0, LayerMask::ALL)
            .unwrap();
        assert!((hit.distance - 3.0).abs() < 1.0e-5);
        assert_eq!(hit.normal, Vec3::Z);
    }

    #[test]
    fn sphere_cast_reports_face_normal() {
        let wall = SolidBox::new(Vec3::new(-1.0, -5.0, -3.0), Vec3::new(1.0, 1.8, -0.6));
        let world = BoxWorld::new().with(wall);

        let hit = world
            .sphere_cast(Vec3::new(0.0, 1.5, 0.0), 0.25, Vec3::NEG_Z, 0.7, LayerMask::ALL)
            .unwrap();
        assert!((hit.distance - 0.35).abs() < 1.0e-5);
        assert_eq!(hit.normal, Vec3::Z);
        assert!((hit.point - Vec3::new(0.0, 1.5, -0.6)).length() < 1.0e-5);
    }

    #[test]
    fn overlapping_sphere_cast_hits_at_zero() {
        let world = BoxWorld::new().with(floor());
        let hit = world
            .sphere_cast(Vec3::new(0.0, 0.1, 0.0), 0.5, Vec3::Y, 1.0, LayerMask::ALL)
            .unwrap();
        assert_eq!(hit.distance, 0.0);
    }

    #[test]
    fn sphere_overlap_touching_counts() {
        let world = BoxWorld::new().with(floor());
        assert!(world.sphere_overlap(Vec3::ZERO, 0.2, LayerMask::ALL));
        assert!(world.sphere_overlap(Vec3::new(0.0, 0.2, 0.0), 0.2, LayerMask::ALL));
        assert!(!world.sphere_overlap(Vec3::new(0.0, 0.25, 0.0), 0.2, LayerMask::ALL));
    }

    #[test]
    fn removed_box_stops_blocking() {
        let mut world = BoxWorld::new();
        let id = world.add(floor());
        assert!(world.sphere_overlap(Vec3::ZERO, 0.2, LayerMask::ALL));

        assert_eq!(world.remove(id), Some(floor()));
        assert!(!world.sphere_overlap(Vec3::ZERO, 0.2, LayerMask::ALL));
        assert_eq!(world.remove(id), None);
    }

    // ==================== Body Tests ====================

    #[test]
    fn body_lands_on_floor() {
        let world = BoxWorld::new().with(floor());
        let mut body = HeadlessBody::capsule(Vec3::new(0.0, 1.0, 0.0), 2.0, 0.5);

        for _ in 0..120 {
            body.step(&world, HeadlessGravity::default().0, 1.0 / 60.0);
        }

        assert!(body.translation.y.abs() < 1.0e-4);
        assert!(body.velocity.y.abs() < 1.0e-4);
    }

    #[test]
    fn kinematic_body_ignores_gravity_and_forces() {
        let world = BoxWorld::new();
        let mut body = HeadlessBody::capsule(Vec3::new(0.0, 5.0, 0.0), 2.0, 0.5);
        body.set_kinematic(true);
        body.add_force(Vec3::X * 10.0, ForceMode::Impulse);
        body.step(&world, HeadlessGravity::default().0, 1.0 / 60.0);

        assert_eq!(body.translation, Vec3::new(0.0, 5.0, 0.0));
        assert_eq!(body.velocity, Vec3::ZERO);
    }

    #[test]
    fn impulse_and_force_scale_with_mass() {
        let mut body = HeadlessBody {
            mass: 2.0,
            ..default()
        };
        body.add_force(Vec3::Y * 4.0, ForceMode::Impulse);
        assert_eq!(body.velocity, Vec3::Y * 2.0);

        body.add_force(Vec3::X * 4.0, ForceMode::Force);
        body.add_force(Vec3::X * 1.0, ForceMode::Acceleration);
        assert_eq!(body.pending_acceleration(), Vec3::X * 3.0);
    }

    #[test]
    fn damping_decays_velocity() {
        let world = BoxWorld::new();
        let mut body = HeadlessBody {
            velocity: Vec3::X * 10.0,
            gravity_enabled: false,
            linear_damping: 6.0,
            ..default()
        };
        body.step(&world, Vec3::ZERO, 0.1);
        assert!((body.velocity.x - 10.0 / 1.6).abs() < 1.0e-4);
    }
}
