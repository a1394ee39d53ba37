//! Stateless impulse, smoothing, and clamping helpers shared by the motors.
#![forbid(unsafe_code)]

use std::ops::{Add, Mul, Sub};

use engine_core::observability::invariant_violation;
use rapier3d::math::Vector;
use rapier3d::prelude::Real;

/// Squared length below which a vector is treated as having no direction.
pub const DIRECTION_EPS_SQ: Real = 1.0e-12;

pub fn check_mass(mass: Real) -> Result<(), String> {
    if !mass.is_finite() || mass <= 0.0 {
        return Err(format!("mass must be finite and > 0 (got {})", mass));
    }
    Ok(())
}

/// Instantaneous velocity change `direction * (force / mass)`.
///
/// Panics when `mass` is not strictly positive.
#[track_caller]
pub fn apply_impulse(direction: Vector<Real>, mass: Real, force: Real) -> Vector<Real> {
    if let Err(err) = check_mass(mass) {
        invariant_violation("apply_impulse", err);
    }
    direction * (force / mass)
}

/// Framerate-independent approach of `current` toward `target`.
///
/// Works component-wise for vectors; `dt == 0` returns `current`.
pub fn exponential_decay<T>(current: T, target: T, decay_rate: Real, dt: Real) -> T
where
    T: Copy + Add<Output = T> + Sub<Output = T> + Mul<Real, Output = T>,
{
    target + (current - target) * (-decay_rate * dt).exp()
}

pub fn normalize_or_zero(v: Vector<Real>) -> Vector<Real> {
    let len_sq = v.norm_squared();
    if len_sq <= DIRECTION_EPS_SQ || !len_sq.is_finite() {
        return Vector::zeros();
    }
    v / len_sq.sqrt()
}

pub fn clamp_magnitude(v: Vector<Real>, max_len: Real) -> Vector<Real> {
    let len_sq = v.norm_squared();
    if len_sq <= DIRECTION_EPS_SQ {
        return Vector::zeros();
    }
    let max_len = max_len.max(0.0);
    if len_sq > max_len * max_len {
        return v * (max_len / len_sq.sqrt());
    }
    v
}

/// Moves `value` toward `target` by at most `max_delta`, never overshooting.
#[track_caller]
pub fn move_towards(value: Real, target: Real, max_delta: Real) -> Real {
    if max_delta < 0.0 {
        invariant_violation("move_towards", format!("max_delta must be >= 0 (got {})", max_delta));
    }
    if value > target {
        (value - max_delta).max(target)
    } else if value < target {
        (value + max_delta).min(target)
    } else {
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: Real = 1.0e-5;

    fn approx(a: Real, b: Real) -> bool {
        (a - b).abs() <= EPS * (1.0 + a.abs().max(b.abs()))
    }

    #[test]
    fn impulse_magnitude_is_force_over_mass() {
        let dir = Vector::new(1.0, 2.0, -2.0).normalize();
        let impulse = apply_impulse(dir, 4.0, 10.0);
        assert!(approx(impulse.norm(), 2.5));
        assert!(approx(impulse.normalize().dot(&dir), 1.0));

        let up = apply_impulse(Vector::y(), 70.0, 490.0);
        assert_eq!(up, Vector::new(0.0, 7.0, 0.0));
    }

    #[test]
    #[should_panic(expected = "mass must be finite and > 0")]
    fn impulse_rejects_zero_mass() {
        apply_impulse(Vector::y(), 0.0, 1.0);
    }

    #[test]
    fn check_mass_reports_bad_values() {
        assert!(check_mass(1.0).is_ok());
        assert!(check_mass(0.0).is_err());
        assert!(check_mass(-3.0).is_err());
        assert!(check_mass(Real::NAN).is_err());
    }

    #[test]
    fn decay_is_identity_at_zero_dt() {
        assert_eq!(exponential_decay::<Real>(5.0, 1.0, 3.0, 0.0), 5.0);
        let v = Vector::new(1.0, -2.0, 3.0);
        assert_eq!(exponential_decay(v, Vector::zeros(), 3.0, 0.0), v);
    }

    #[test]
    fn decay_moves_monotonically_toward_target() {
        let target: Real = 2.0;
        let mut previous: Real = 10.0;
        for step in 1..20 {
            let dt = step as Real * 0.1;
            let value = exponential_decay::<Real>(10.0, target, 1.5, dt);
            assert!(value < previous);
            assert!(value > target);
            previous = value;
        }
        let settled = exponential_decay::<Real>(10.0, target, 1.5, 1.0e4);
        assert!(approx(settled, target));
    }

    #[test]
    fn decay_is_framerate_independent() {
        let one_step = exponential_decay::<Real>(8.0, 0.0, 2.0, 0.5);
        let mut stepped: Real = 8.0;
        for _ in 0..5 {
            stepped = exponential_decay(stepped, 0.0, 2.0, 0.1);
        }
        assert!(approx(one_step, stepped));
    }

    #[test]
    fn decay_applies_per_component() {
        let v = exponential_decay(
            Vector::new(4.0, -4.0, 0.0),
            Vector::zeros(),
            1.0,
            2.0_f32.ln(),
        );
        assert!(approx(v.x, 2.0));
        assert!(approx(v.y, -2.0));
        assert_eq!(v.z, 0.0);
    }

    #[test]
    fn clamp_preserves_direction() {
        let v = Vector::new(30.0, 40.0, 0.0);
        let clamped = clamp_magnitude(v, 10.0);
        assert!(approx(clamped.norm(), 10.0));
        assert!(approx(clamped.normalize().dot(&v.normalize()), 1.0));
        let short = Vector::new(1.0, 0.0, 0.0);
        assert_eq!(clamp_magnitude(short, 10.0), short);
        assert_eq!(clamp_magnitude(Vector::zeros(), 10.0), Vector::zeros());
    }

    #[test]
    fn normalize_zero_vector_is_zero_not_nan() {
        let n = normalize_or_zero(Vector::zeros());
        assert_eq!(n, Vector::zeros());
        assert!(n.iter().all(|c| c.is_finite()));
        let n = normalize_or_zero(Vector::new(0.0, 0.0, -3.0));
        assert_eq!(n, Vector::new(0.0, 0.0, -1.0));
    }

    #[test]
    fn move_towards_never_overshoots() {
        assert!(approx(move_towards(0.0, 10.0, 5.0), 5.0));
        assert!(approx(move_towards(-10.0, 10.0, 5.0), -5.0));
        assert!(approx(move_towards(10.0, -10.0, 5.0), 5.0));
        assert!(approx(move_towards(0.0, 10.0, 30.0), 10.0));
        assert!(approx(move_towards(-10.0, 10.0, 30.0), 10.0));
        assert!(approx(move_towards(10.0, -10.0, 30.0), -10.0));
    }
}
