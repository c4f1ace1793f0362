//! Movement core: walk/sprint speed, crouch, slide, jump and drag.
//!
//! The core owns the actor's [`Stance`] and current move speed. It runs in
//! two halves: [`MovementCore::frame`] once per frame tick (input, toggles,
//! easing) and [`MovementCore::simulation`] once per simulation tick
//! (steering force).

use bevy::prelude::*;

use crate::backend::{CapsuleDimensions, ForceMode, PhysicsBody, SpatialQuery};
use crate::config::MovementConfig;
use crate::detection::{project_on_slope, slope_normal};
use crate::intent::InputFrame;
use crate::state::{SlideSession, Stance};
use crate::transition::{blend_toward, blend_toward_vec3};

/// Capsule heights closer than this are considered settled.
const HEIGHT_EPSILON: f32 = 1.0e-4;

/// Below this the stand-up sweep has nowhere to go and always passes.
const MIN_STAND_SWEEP: f32 = 0.01;

/// Current (eased) collider and camera geometry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StanceGeometry {
    pub height: f32,
    pub center: Vec3,
    pub camera_offset: Vec3,
}

/// Horizontal (XZ) speed of a velocity.
#[inline]
pub fn horizontal_speed(velocity: Vec3) -> f32 {
    Vec2::new(velocity.x, velocity.z).length()
}

#[derive(Debug, Clone)]
pub struct MovementCore {
    stance: Stance,
    move_speed: f32,
    wish_direction: Vec3,
    slope: Option<Vec3>,
    geometry: StanceGeometry,
    radius: f32,
}

impl MovementCore {
    /// Start standing at walk speed, easing from the collider's current size.
    pub fn new(config: &MovementConfig, capsule: CapsuleDimensions) -> Self {
        Self {
            stance: Stance::Standing,
            move_speed: config.walk_speed,
            wish_direction: Vec3::ZERO,
            slope: None,
            geometry: StanceGeometry {
                height: capsule.height,
                center: capsule.center,
                camera_offset: config.standing_camera_offset,
            },
            radius: capsule.radius,
        }
    }

    pub fn stance(&self) -> Stance {
        self.stance
    }

    pub fn move_speed(&self) -> f32 {
        self.move_speed
    }

    pub fn wish_direction(&self) -> Vec3 {
        self.wish_direction
    }

    pub fn slope(&self) -> Option<Vec3> {
        self.slope
    }

    pub fn geometry(&self) -> StanceGeometry {
        self.geometry
    }

    pub fn radius(&self) -> f32 {
        self.radius
    }

    /// Frame tick: crouch/slide toggles, jump, stance easing and speed.
    ///
    /// Drag is left to the caller, see [`apply_drag`](Self::apply_drag).
    ///
    /// Returns `true` if a jump impulse was applied.
    pub fn frame(
        &mut self,
        input: &InputFrame,
        grounded: bool,
        config: &MovementConfig,
        query: &impl SpatialQuery,
        body: &mut impl PhysicsBody,
        dt: f32,
    ) -> bool {
        self.wish_direction = input.wish_direction();

        if input.crouch_pressed {
            self.toggle_crouch(input, grounded, config, query, body);
        }

        self.ease_stance(config, body, dt);
        self.control_speed(input, grounded, config, dt);
        self.update_slide(input, grounded, config, query, body, dt);

        let jumped = input.jump_pressed && grounded;
        if jumped {
            self.jump(input, config, query, body);
        }

        // Sprinting while crouched stands up as soon as there is room.
        if self.stance == Stance::Crouching
            && input.sprint_held
            && self.can_stand(query, body.translation(), config)
        {
            debug!("auto-stand while sprinting");
            self.stance = Stance::Standing;
        }

        self.slope = slope_normal(
            query,
            body.translation() + self.geometry.center,
            self.geometry.height,
            config,
        );

        jumped
    }

    /// Simulation tick: apply the steering acceleration. No force while sliding.
    pub fn simulation(&self, grounded: bool, config: &MovementConfig, body: &mut impl PhysicsBody) {
        if self.stance.is_sliding() {
            return;
        }

        let direction = match self.slope {
            Some(normal) if grounded => project_on_slope(self.wish_direction, normal),
            _ => self.wish_direction,
        };
        if direction == Vec3::ZERO {
            return;
        }

        let multiplier = if grounded {
            config.movement_multiplier
        } else {
            config.movement_multiplier * config.air_multiplier
        };
        body.add_force(direction * self.move_speed * multiplier, ForceMode::Acceleration);
    }

    /// True if the standing capsule would fit above the crouched one.
    pub fn can_stand(&self, query: &impl SpatialQuery, translation: Vec3, config: &MovementConfig) -> bool {
        let start = translation + Vec3::Y * (config.crouch_height + self.radius + config.stand_clearance);
        let distance = config.standing_height - config.crouch_height - self.radius;
        if distance <= MIN_STAND_SWEEP {
            return true;
        }
        query
            .sphere_cast(start, self.radius, Vec3::Y, distance, config.obstruction_layers)
            .is_none()
    }

    /// End a slide without standing, leaving the actor crouched.
    pub(crate) fn abort_slide(&mut self) {
        if self.stance.is_sliding() {
            self.stance = Stance::Crouching;
        }
    }

    /// Forget the last sampled wish direction until the next frame tick.
    pub(crate) fn clear_wish_direction(&mut self) {
        self.wish_direction = Vec3::ZERO;
    }

    fn toggle_crouch(
        &mut self,
        input: &InputFrame,
        grounded: bool,
        config: &MovementConfig,
        query: &impl SpatialQuery,
        body: &mut impl PhysicsBody,
    ) {
        match self.stance {
            Stance::Sliding(_) => {}
            Stance::Crouching => {
                if self.can_stand(query, body.translation(), config) {
                    debug!("standing up");
                    self.stance = Stance::Standing;
                } else {
                    debug!("cannot stand up: obstructed");
                }
            }
            Stance::Standing => {
                let sprinting = input.sprint_held
                    && horizontal_speed(body.velocity()) > config.slide_entry_speed();
                if sprinting && grounded {
                    self.start_slide(input, config, body);
                } else {
                    debug!("crouching");
                    self.stance = Stance::Crouching;
                }
            }
        }
    }

    fn start_slide(&mut self, input: &InputFrame, config: &MovementConfig, body: &mut impl PhysicsBody) {
        let direction = if input.movement.length() > 0.1 {
            self.wish_direction
        } else {
            input.forward()
        };
        self.stance = Stance::Sliding(SlideSession {
            remaining: config.slide_duration,
            direction,
        });
        body.add_force(direction * config.slide_force, ForceMode::Impulse);
        debug!("slide started");
    }

    fn update_slide(
        &mut self,
        input: &InputFrame,
        grounded: bool,
        config: &MovementConfig,
        query: &impl SpatialQuery,
        body: &mut impl PhysicsBody,
        dt: f32,
    ) {
        let Stance::Sliding(mut session) = self.stance else {
            return;
        };

        session.remaining -= dt;
        let exhausted = session.remaining <= 0.0
            || !input.crouch_held
            || horizontal_speed(body.velocity()) <= config.slide_exit_speed
            || !grounded;

        if exhausted {
            self.stop_slide(input, config, query, &*body);
        } else {
            self.stance = Stance::Sliding(session);
        }
    }

    fn stop_slide(
        &mut self,
        input: &InputFrame,
        config: &MovementConfig,
        query: &impl SpatialQuery,
        body: &impl PhysicsBody,
    ) {
        if !self.stance.is_sliding() {
            return;
        }
        self.stance = Stance::Crouching;
        debug!("slide stopped");

        if !input.crouch_held && self.can_stand(query, body.translation(), config) {
            self.stance = Stance::Standing;
        }
    }

    fn jump(
        &mut self,
        input: &InputFrame,
        config: &MovementConfig,
        query: &impl SpatialQuery,
        body: &mut impl PhysicsBody,
    ) {
        let mut velocity = body.velocity();
        velocity.y = 0.0;
        body.set_velocity(velocity);

        let mut force = config.jump_force;
        if self.stance.is_sliding() {
            force *= config.slide_jump_boost;
            self.stop_slide(input, config, query, &*body);
        }
        body.add_force(Vec3::Y * force, ForceMode::Impulse);
    }

    fn ease_stance(&mut self, config: &MovementConfig, body: &mut impl PhysicsBody, dt: f32) {
        let crouched = self.stance.is_crouching();
        let (target_height, target_camera) = if crouched {
            (config.crouch_height, config.crouching_camera_offset)
        } else {
            (config.standing_height, config.standing_camera_offset)
        };
        let rate = config.crouch_transition_speed;

        self.geometry.camera_offset =
            blend_toward_vec3(self.geometry.camera_offset, target_camera, rate, dt);

        let previous = self.geometry.height;
        let mut height = blend_toward(previous, target_height, rate, dt);
        if (height - target_height).abs() < HEIGHT_EPSILON {
            height = target_height;
        }
        let center = Vec3::Y * height * 0.5;
        if height == previous && center == self.geometry.center {
            return;
        }

        self.geometry.height = height;
        self.geometry.center = center;
        body.set_capsule(CapsuleDimensions {
            height,
            radius: self.radius,
            center,
        });
    }

    fn control_speed(&mut self, input: &InputFrame, grounded: bool, config: &MovementConfig, dt: f32) {
        let sliding = self.stance.is_sliding();
        let mut target = if input.sprint_held && grounded && !sliding {
            config.sprint_speed
        } else {
            config.walk_speed
        };
        if self.stance.is_crouching() && !sliding {
            target *= config.crouch_speed_multiplier;
        }
        self.move_speed = blend_toward(self.move_speed, target, config.acceleration_rate, dt);
    }

    /// Ground, air or slide drag. Only called while the core owns the body.
    pub fn apply_drag(&self, grounded: bool, config: &MovementConfig, body: &mut impl PhysicsBody) {
        let drag = if self.stance.is_sliding() {
            config.slide_drag
        } else if grounded {
            config.ground_drag
        } else {
            config.air_drag
        };
        body.set_linear_damping(drag);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::LayerMask;
    use crate::collision::CollisionData;

    /// Flat infinite floor at y = 0 plus an optional ceiling that blocks
    /// every stand-up sweep.
    struct Floor {
        ceiling: bool,
    }

    impl SpatialQuery for Floor {
        fn raycast(&self, origin: Vec3, direction: Vec3, max: f32, _: LayerMask) -> Option<CollisionData> {
            if direction.y >= 0.0 || origin.y < 0.0 {
                return None;
            }
            let distance = origin.y / -direction.y;
            (distance <= max).then(|| {
                CollisionData::new(distance, Vec3::Y, origin + direction * distance, None)
            })
        }

        fn sphere_cast(&self, origin: Vec3, _: f32, _: Vec3, _: f32, _: LayerMask) -> Option<CollisionData> {
            self.ceiling
                .then(|| CollisionData::new(0.0, Vec3::NEG_Y, origin, None))
        }

        fn sphere_overlap(&self, center: Vec3, radius: f32, _: LayerMask) -> bool {
            center.y <= radius
        }
    }

    /// Floor at y = 0 whose ray hits report a tilted normal.
    struct TiltedFloor(Vec3);

    impl SpatialQuery for TiltedFloor {
        fn raycast(&self, origin: Vec3, direction: Vec3, max: f32, layers: LayerMask) -> Option<CollisionData> {
            Floor { ceiling: false }
                .raycast(origin, direction, max, layers)
                .map(|hit| CollisionData { normal: self.0, ..hit })
        }

        fn sphere_cast(&self, _: Vec3, _: f32, _: Vec3, _: f32, _: LayerMask) -> Option<CollisionData> {
            None
        }

        fn sphere_overlap(&self, center: Vec3, radius: f32, _: LayerMask) -> bool {
            center.y <= radius
        }
    }

    #[derive(Default)]
    struct TestBody {
        velocity: Vec3,
        translation: Vec3,
        damping: f32,
        capsule: Option<CapsuleDimensions>,
        acceleration: Vec3,
    }

    impl PhysicsBody for TestBody {
        fn velocity(&self) -> Vec3 {
            self.velocity
        }
        fn set_velocity(&mut self, velocity: Vec3) {
            self.velocity = velocity;
        }
        fn add_force(&mut self, force: Vec3, mode: ForceMode) {
            match mode {
                ForceMode::Impulse => self.velocity += force,
                _ => self.acceleration += force,
            }
        }
        fn set_kinematic(&mut self, _: bool) {}
        fn is_kinematic(&self) -> bool {
            false
        }
        fn set_gravity_enabled(&mut self, _: bool) {}
        fn gravity_enabled(&self) -> bool {
            true
        }
        fn set_linear_damping(&mut self, damping: f32) {
            self.damping = damping;
        }
        fn translation(&self) -> Vec3 {
            self.translation
        }
        fn rotation(&self) -> Quat {
            Quat::IDENTITY
        }
        fn set_translation(&mut self, translation: Vec3) {
            self.translation = translation;
        }
        fn set_rotation(&mut self, _: Quat) {}
        fn set_capsule(&mut self, capsule: CapsuleDimensions) {
            self.capsule = Some(capsule);
        }
    }

    const DT: f32 = 1.0 / 60.0;

    fn core() -> (MovementCore, MovementConfig) {
        let config = MovementConfig::default();
        let core = MovementCore::new(&config, CapsuleDimensions::standing(2.0, 0.5));
        (core, config)
    }

    // ==================== Speed Tests ====================

    #[test]
    fn speed_blends_geometrically_toward_sprint() {
        let (mut core, config) = core();
        let floor = Floor { ceiling: false };
        let mut body = TestBody::default();
        let input = InputFrame {
            sprint_held: true,
            ..default()
        };

        for n in 1..=30 {
            core.frame(&input, true, &config, &floor, &mut body, DT);
            let expected = 15.0 - 7.0 * (1.0 - 10.0 * DT).powi(n);
            assert!(
                (core.move_speed() - expected).abs() < 1.0e-3,
                "tick {n}: {} vs {expected}",
                core.move_speed()
            );
        }
    }

    #[test]
    fn airborne_sprint_targets_walk_speed() {
        let (mut core, config) = core();
        let floor = Floor { ceiling: false };
        let mut body = TestBody::default();
        let input = InputFrame {
            sprint_held: true,
            ..default()
        };

        for _ in 0..120 {
            core.frame(&input, false, &config, &floor, &mut body, DT);
        }
        assert!((core.move_speed() - config.walk_speed).abs() < 0.01);
    }

    #[test]
    fn crouch_halves_target_speed() {
        let (mut core, config) = core();
        let floor = Floor { ceiling: false };
        let mut body = TestBody::default();

        core.frame(
            &InputFrame {
                crouch_pressed: true,
                crouch_held: true,
                ..default()
            },
            true,
            &config,
            &floor,
            &mut body,
            DT,
        );
        for _ in 0..120 {
            core.frame(&InputFrame::default(), true, &config, &floor, &mut body, DT);
        }
        assert_eq!(core.stance(), Stance::Crouching);
        assert!((core.move_speed() - 4.0).abs() < 0.01);
    }

    // ==================== Drag Tests ====================

    #[test]
    fn drag_follows_ground_state() {
        let (mut core, config) = core();
        let floor = Floor { ceiling: false };
        let mut body = TestBody::default();

        core.frame(&InputFrame::default(), true, &config, &floor, &mut body, DT);
        assert_eq!(body.damping, 0.0, "frame tick leaves drag alone");

        core.apply_drag(true, &config, &mut body);
        assert_eq!(body.damping, config.ground_drag);

        core.apply_drag(false, &config, &mut body);
        assert_eq!(body.damping, config.air_drag);
    }

    // ==================== Force Tests ====================

    #[test]
    fn grounded_force_uses_full_multiplier() {
        let (mut core, config) = core();
        let floor = Floor { ceiling: false };
        let mut body = TestBody::default();
        let input = InputFrame {
            movement: Vec2::Y,
            ..default()
        };

        core.frame(&input, true, &config, &floor, &mut body, DT);
        core.simulation(true, &config, &mut body);

        let expected = Vec3::NEG_Z * core.move_speed() * config.movement_multiplier;
        assert!((body.acceleration - expected).length() < 0.001);
    }

    #[test]
    fn airborne_force_is_scaled_down() {
        let (mut core, config) = core();
        let floor = Floor { ceiling: false };
        let mut body = TestBody::default();
        let input = InputFrame {
            movement: Vec2::Y,
            ..default()
        };

        core.frame(&input, false, &config, &floor, &mut body, DT);
        core.simulation(false, &config, &mut body);

        let expected = core.move_speed() * config.movement_multiplier * config.air_multiplier;
        assert!((body.acceleration.length() - expected).abs() < 0.001);
    }

    #[test]
    fn grounded_force_follows_the_slope() {
        let (mut core, config) = core();
        let normal = Vec3::new(0.0, 1.0, 1.0).normalize();
        let slope = TiltedFloor(normal);
        let mut body = TestBody::default();
        let input = InputFrame {
            movement: Vec2::Y,
            ..default()
        };

        core.frame(&input, true, &config, &slope, &mut body, DT);
        assert_eq!(core.slope(), Some(normal));
        core.simulation(true, &config, &mut body);

        let along = Vec3::new(0.0, 1.0, -1.0).normalize();
        let expected = along * core.move_speed() * config.movement_multiplier;
        assert!(
            (body.acceleration - expected).length() < 0.001,
            "{:?} vs {expected:?}",
            body.acceleration
        );
        assert!(body.acceleration.dot(normal).abs() < 0.001);
    }

    #[test]
    fn airborne_force_ignores_the_slope() {
        let (mut core, config) = core();
        let slope = TiltedFloor(Vec3::new(0.0, 1.0, 1.0).normalize());
        let mut body = TestBody::default();
        let input = InputFrame {
            movement: Vec2::Y,
            ..default()
        };

        core.frame(&input, false, &config, &slope, &mut body, DT);
        assert!(core.slope().is_some());
        core.simulation(false, &config, &mut body);

        let expected = Vec3::NEG_Z
            * core.move_speed()
            * config.movement_multiplier
            * config.air_multiplier;
        assert!((body.acceleration - expected).length() < 0.001);
    }

    #[test]
    fn no_input_no_force() {
        let (mut core, config) = core();
        let floor = Floor { ceiling: false };
        let mut body = TestBody::default();

        core.frame(&InputFrame::default(), true, &config, &floor, &mut body, DT);
        core.simulation(true, &config, &mut body);
        assert_eq!(body.acceleration, Vec3::ZERO);
    }

    // ==================== Crouch & Jump Tests ====================

    #[test]
    fn blocked_stand_keeps_crouch() {
        let (mut core, config) = core();
        let blocked = Floor { ceiling: true };
        let mut body = TestBody::default();
        let toggle = InputFrame {
            crouch_pressed: true,
            crouch_held: true,
            ..default()
        };

        core.frame(&toggle, true, &config, &blocked, &mut body, DT);
        assert_eq!(core.stance(), Stance::Crouching);

        core.frame(&toggle, true, &config, &blocked, &mut body, DT);
        assert_eq!(core.stance(), Stance::Crouching);

        let clear = Floor { ceiling: false };
        core.frame(&toggle, true, &config, &clear, &mut body, DT);
        assert_eq!(core.stance(), Stance::Standing);
    }

    #[test]
    fn stance_eases_capsule_height() {
        let (mut core, config) = core();
        let floor = Floor { ceiling: false };
        let mut body = TestBody::default();

        core.frame(
            &InputFrame {
                crouch_pressed: true,
                ..default()
            },
            true,
            &config,
            &floor,
            &mut body,
            DT,
        );

        let first = body.capsule.map(|c| c.height);
        assert!(first.is_some_and(|h| h < 2.0 && h > 1.0), "height must ease, not snap");

        for _ in 0..240 {
            core.frame(&InputFrame::default(), true, &config, &floor, &mut body, DT);
        }
        let settled = core.geometry();
        assert_eq!(settled.height, config.crouch_height);
        assert_eq!(settled.center, Vec3::Y * 0.5);
        assert!((settled.camera_offset - config.crouching_camera_offset).length() < 0.001);
    }

    #[test]
    fn jump_requires_ground() {
        let (mut core, config) = core();
        let floor = Floor { ceiling: false };
        let mut body = TestBody {
            velocity: Vec3::new(1.0, -3.0, 0.0),
            ..default()
        };
        let jump = InputFrame {
            jump_pressed: true,
            ..default()
        };

        assert!(!core.frame(&jump, false, &config, &floor, &mut body, DT));
        assert_eq!(body.velocity.y, -3.0);

        assert!(core.frame(&jump, true, &config, &floor, &mut body, DT));
        assert!((body.velocity.y - config.jump_force).abs() < 0.001);
        assert_eq!(body.velocity.x, 1.0);
    }

    #[test]
    fn slope_detected_from_capsule_center() {
        let (mut core, config) = core();
        let floor = Floor { ceiling: false };
        let mut body = TestBody::default();

        core.frame(&InputFrame::default(), true, &config, &floor, &mut body, DT);
        assert_eq!(core.slope(), None, "flat floor is not a slope");
    }
}
