//! Timed pose transitions and easing helpers.

use bevy::prelude::*;

/// Easing curve applied to a transition's normalised time.
#[derive(Reflect, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Easing {
    Linear,
    /// `t²(3 − 2t)`
    SmoothStep,
    /// `t(2 − t)`
    EaseOutQuad,
}

impl Easing {
    /// Map `t` (clamped to [0, 1]) through the curve.
    pub fn apply(self, t: f32) -> f32 {
        let t = t.clamp(0.0, 1.0);
        match self {
            Easing::Linear => t,
            Easing::SmoothStep => t * t * (3.0 - 2.0 * t),
            Easing::EaseOutQuad => t * (2.0 - t),
        }
    }
}

/// A pose interpolation advanced once per frame tick.
///
/// When the session finishes the pose equals `to` (and `to_rotation`)
/// exactly, regardless of how time was sliced.
#[derive(Reflect, Debug, Clone, Copy, PartialEq)]
pub struct TransitionSession {
    pub from: Vec3,
    pub to: Vec3,
    pub from_rotation: Quat,
    /// Target rotation. `None` leaves the rotation untouched.
    pub to_rotation: Option<Quat>,
    pub elapsed: f32,
    pub duration: f32,
    pub easing: Easing,
}

/// Pose produced by [`TransitionSession::advance`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransitionPose {
    pub translation: Vec3,
    pub rotation: Option<Quat>,
    pub finished: bool,
}

impl TransitionSession {
    /// Start a translation-only transition.
    pub fn new(from: Vec3, to: Vec3, duration: f32, easing: Easing) -> Self {
        Self {
            from,
            to,
            from_rotation: Quat::IDENTITY,
            to_rotation: None,
            elapsed: 0.0,
            duration,
            easing,
        }
    }

    /// Builder: also rotate from `from` to `to`.
    pub fn with_rotation(mut self, from: Quat, to: Quat) -> Self {
        self.from_rotation = from;
        self.to_rotation = Some(to);
        self
    }

    /// Fraction of the duration elapsed, in [0, 1].
    pub fn progress(&self) -> f32 {
        if self.duration <= 0.0 {
            1.0
        } else {
            (self.elapsed / self.duration).clamp(0.0, 1.0)
        }
    }

    pub fn is_finished(&self) -> bool {
        self.progress() >= 1.0
    }

    /// Advance by `dt` seconds and return the pose to apply.
    pub fn advance(&mut self, dt: f32) -> TransitionPose {
        self.elapsed += dt.max(0.0);
        if self.is_finished() {
            return TransitionPose {
                translation: self.to,
                rotation: self.to_rotation,
                finished: true,
            };
        }

        let t = self.easing.apply(self.progress());
        TransitionPose {
            translation: self.from.lerp(self.to, t),
            rotation: self.to_rotation.map(|to| self.from_rotation.slerp(to, t)),
            finished: false,
        }
    }
}

/// Frame-rate independent exponential approach toward `target`.
///
/// `x += (target − x)(1 − e^{−rate·dt})`
#[inline]
pub fn exp_approach(current: f32, target: f32, rate: f32, dt: f32) -> f32 {
    current + (target - current) * (1.0 - (-rate * dt).exp())
}

/// Clamped linear blend toward `target`: `x += (target − x) · min(rate·dt, 1)`.
#[inline]
pub fn blend_toward(current: f32, target: f32, rate: f32, dt: f32) -> f32 {
    current + (target - current) * (rate * dt).clamp(0.0, 1.0)
}

/// [`blend_toward`] for vectors.
#[inline]
pub fn blend_toward_vec3(current: Vec3, target: Vec3, rate: f32, dt: f32) -> Vec3 {
    current.lerp(target, (rate * dt).clamp(0.0, 1.0))
}
