use impulse_physics::normalize_or_zero;
use rapier3d::math::{Rotation, Vector};
use rapier3d::prelude::Real;

/// Ropes shorter than this are not attached.
pub const MIN_ROPE_LENGTH: Real = 1.0e-3;
const AXIS_EPS_SQ: Real = 1.0e-10;

/// Single-point distance constraint; `anchor` and `length` are meaningful only while active.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RopeConstraint {
    pub anchor: Vector<Real>,
    pub length: Real,
    pub active: bool,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RopeVisual {
    pub from: Vector<Real>,
    pub to: Vector<Real>,
}

impl Default for RopeConstraint {
    fn default() -> Self {
        Self {
            anchor: Vector::zeros(),
            length: 0.0,
            active: false,
        }
    }
}

impl RopeConstraint {
    /// Attaches at `anchor` with the current distance as the rope length.
    ///
    /// Returns false (and stays inactive) when the anchor is on top of `position`.
    pub fn attach(&mut self, anchor: Vector<Real>, position: Vector<Real>) -> bool {
        let length = (anchor - position).norm();
        if !length.is_finite() || length < MIN_ROPE_LENGTH {
            return false;
        }
        self.anchor = anchor;
        self.length = length;
        self.active = true;
        true
    }

    pub fn release(&mut self) {
        self.active = false;
    }

    /// Pulls `position` back onto the anchor sphere and strips the stretching
    /// part of `velocity`. Returns true when the rope was taut this tick.
    pub fn enforce(&self, position: &mut Vector<Real>, velocity: &mut Vector<Real>) -> bool {
        if !self.active {
            return false;
        }
        let offset = *position - self.anchor;
        let distance = offset.norm();
        if distance <= self.length {
            return false;
        }
        *position = self.anchor + offset * (self.length / distance);
        *velocity = redirect(*velocity, self.anchor - *position);
        true
    }

    pub fn visual(&self, position: Vector<Real>, attach_height: Real) -> Option<RopeVisual> {
        self.active.then(|| RopeVisual {
            from: position + Vector::y() * attach_height,
            to: self.anchor,
        })
    }
}

/// Removes the component of `velocity` along the rope, keeping both tangential
/// (swing) components. `rope_direction` points from the body toward the anchor.
///
/// The tangent in the rope's vertical plane is built by rotating the rope's
/// horizontal heading about `axis = rope x up` by minus the rope's angle from up.
/// A vertical rope has no such plane and falls back to a direct projection.
pub fn redirect(velocity: Vector<Real>, rope_direction: Vector<Real>) -> Vector<Real> {
    let rope = normalize_or_zero(rope_direction);
    if rope == Vector::zeros() {
        return velocity;
    }
    let up = Vector::y();
    let axis = rope.cross(&up);
    if axis.norm_squared() <= AXIS_EPS_SQ {
        return velocity - rope * rope.dot(&velocity);
    }
    let axis = axis.normalize();
    let horizontal = Vector::new(rope.x, 0.0, rope.z);
    let heading = normalize_or_zero(horizontal);
    let angle = horizontal.norm().atan2(rope.y);
    let tangent = Rotation::new(axis * -angle) * heading;
    tangent * tangent.dot(&velocity) + axis * axis.dot(&velocity)
}
