use std::ops::Mul;

use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};

/// Translation + unit rotation. Scale is never animated by the pose database.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct RigidTransform {
    pub translation: Vec3,
    pub rotation: Quat,
}

impl Default for RigidTransform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl RigidTransform {
    pub const IDENTITY: Self = Self {
        translation: Vec3::ZERO,
        rotation: Quat::IDENTITY,
    };

    pub fn new(translation: Vec3, rotation: Quat) -> Self {
        Self {
            translation,
            rotation: rotation.normalize(),
        }
    }

    pub fn from_translation(translation: Vec3) -> Self {
        Self {
            translation,
            rotation: Quat::IDENTITY,
        }
    }

    pub fn from_rotation(rotation: Quat) -> Self {
        Self::new(Vec3::ZERO, rotation)
    }

    pub fn inverse(&self) -> Self {
        let rotation = self.rotation.inverse();
        Self {
            translation: rotation * -self.translation,
            rotation,
        }
    }

    pub fn transform_point(&self, point: Vec3) -> Vec3 {
        self.rotation * point + self.translation
    }

    /// Position lerp, rotation slerp. `t` is not clamped.
    pub fn interpolate(&self, other: &Self, t: f32) -> Self {
        Self {
            translation: self.translation.lerp(other.translation, t),
            rotation: self.rotation.slerp(other.rotation, t).normalize(),
        }
    }

    /// Reads `self` as the displacement covered in `dt` seconds and returns
    /// `(linear, angular)` velocity. Angular velocity is axis * radians / s.
    pub fn velocities(&self, dt: f32) -> (Vec3, Vec3) {
        if dt <= f32::EPSILON {
            return (Vec3::ZERO, Vec3::ZERO);
        }
        // shortest arc, so a half-turn never reads as 1.5 turns the other way
        let rotation = if self.rotation.w < 0.0 {
            -self.rotation
        } else {
            self.rotation
        };
        (self.translation / dt, rotation.to_scaled_axis() / dt)
    }

    /// Inverse of [`RigidTransform::velocities`].
    pub fn from_velocities(linear: Vec3, angular: Vec3, dt: f32) -> Self {
        Self::new(linear * dt, Quat::from_scaled_axis(angular * dt))
    }

    /// Angle between the two rotations in degrees, in `[0, 180]`.
    pub fn angle_to_degrees(&self, other: &Self) -> f32 {
        // atan2 stays accurate near zero where acos of the dot product does not
        let relative = self.rotation.conjugate() * other.rotation;
        (2.0 * relative.xyz().length().atan2(relative.w.abs())).to_degrees()
    }

    pub fn abs_diff_eq(&self, other: &Self, max_abs_diff: f32) -> bool {
        self.translation.abs_diff_eq(other.translation, max_abs_diff)
            && (self.rotation.abs_diff_eq(other.rotation, max_abs_diff)
                || self.rotation.abs_diff_eq(-other.rotation, max_abs_diff))
    }
}

impl Mul for RigidTransform {
    type Output = RigidTransform;

    /// `self * rhs` applies `rhs` first, then `self`.
    fn mul(self, rhs: RigidTransform) -> RigidTransform {
        RigidTransform {
            translation: self.rotation * rhs.translation + self.translation,
            rotation: (self.rotation * rhs.rotation).normalize(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, Rng, SeedableRng};
    use std::f32::consts::{FRAC_PI_2, PI};

    fn sample() -> RigidTransform {
        RigidTransform::new(
            Vec3::new(1.0, -2.0, 0.5),
            Quat::from_euler(glam::EulerRot::YXZ, 0.7, -0.3, 1.1),
        )
    }

    #[test]
    fn compose_with_inverse_is_identity() {
        let mut rng = StdRng::seed_from_u64(17);
        for _ in 0..200 {
            let t = RigidTransform::new(
                Vec3::new(rng.gen_range(-10.0..10.0), rng.gen_range(-10.0..10.0), rng.gen_range(-10.0..10.0)),
                Quat::from_euler(
                    glam::EulerRot::YXZ,
                    rng.gen_range(-PI..PI),
                    rng.gen_range(-PI..PI),
                    rng.gen_range(-PI..PI),
                ),
            );
            let a = t * t.inverse();
            let b = t.inverse() * t;
            assert!(a.abs_diff_eq(&RigidTransform::IDENTITY, 1e-4), "{t:?}");
            assert!(b.abs_diff_eq(&RigidTransform::IDENTITY, 1e-4), "{t:?}");
        }
    }

    #[test]
    fn composition_is_not_commutative() {
        let a = RigidTransform::new(Vec3::X, Quat::from_rotation_y(FRAC_PI_2));
        let b = RigidTransform::from_translation(Vec3::Z);
        assert!(!(a * b).abs_diff_eq(&(b * a), 1e-3));
        // b first, then a: Z rotated by 90deg about Y becomes X
        assert!((a * b).translation.abs_diff_eq(Vec3::new(2.0, 0.0, 0.0), 1e-5));
    }

    #[test]
    fn interpolate_endpoints() {
        let a = RigidTransform::IDENTITY;
        let b = sample();
        assert!(a.interpolate(&b, 0.0).abs_diff_eq(&a, 1e-6));
        assert!(a.interpolate(&b, 1.0).abs_diff_eq(&b, 1e-5));
        let mid = a.interpolate(&b, 0.5);
        assert!(mid.translation.abs_diff_eq(b.translation * 0.5, 1e-6));
    }

    #[test]
    fn velocities_round_trip_through_delta() {
        let linear = Vec3::new(1.5, 0.0, -0.25);
        let angular = Vec3::new(0.0, 2.0, 0.0);
        let dt = 1.0 / 60.0;
        let delta = RigidTransform::from_velocities(linear, angular, dt);
        let (l, a) = delta.velocities(dt);
        assert!(l.abs_diff_eq(linear, 1e-4));
        assert!(a.abs_diff_eq(angular, 1e-3));
    }

    #[test]
    fn zero_dt_reports_no_motion() {
        let (l, a) = sample().velocities(0.0);
        assert_eq!(l, Vec3::ZERO);
        assert_eq!(a, Vec3::ZERO);
    }

    #[test]
    fn angle_between_opposite_headings() {
        let a = RigidTransform::IDENTITY;
        let b = RigidTransform::from_rotation(Quat::from_rotation_y(PI));
        assert!((a.angle_to_degrees(&b) - 180.0).abs() < 1e-3);
    }
}
