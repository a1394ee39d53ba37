//! Look rotation and camera pose derivation from the player body.
#![forbid(unsafe_code)]

use std::f32::consts::{FRAC_PI_2, PI, TAU};

use rapier3d::math::Vector;
use rapier3d::prelude::Real;

/// Accumulated yaw/pitch with pitch kept strictly inside `(-pi/2, pi/2)`.
///
/// Yaw 0 looks down -Z; positive yaw turns toward +X. Positive pitch looks up.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LookAngles {
    yaw: Real,
    pitch: Real,
    pitch_limit: Real,
}

impl LookAngles {
    pub fn new(pitch_epsilon: Real) -> Self {
        Self {
            yaw: 0.0,
            pitch: 0.0,
            pitch_limit: FRAC_PI_2 - pitch_epsilon.clamp(1.0e-6, FRAC_PI_2),
        }
    }

    pub fn yaw(&self) -> Real {
        self.yaw
    }

    pub fn pitch(&self) -> Real {
        self.pitch
    }

    pub fn pitch_limit(&self) -> Real {
        self.pitch_limit
    }

    pub fn set(&mut self, yaw: Real, pitch: Real) {
        self.yaw = wrap_angle(yaw);
        let pitch = if pitch.is_finite() { pitch } else { 0.0 };
        self.pitch = pitch.clamp(-self.pitch_limit, self.pitch_limit);
    }

    /// Applies a mouse-style delta: +x turns right, +y looks down.
    pub fn apply_delta(&mut self, delta: [Real; 2], sensitivity: Real) {
        self.set(
            self.yaw + delta[0] * sensitivity,
            self.pitch - delta[1] * sensitivity,
        );
    }

    /// Unit looking direction derived from yaw and pitch.
    pub fn direction(&self) -> Vector<Real> {
        let (sin_yaw, cos_yaw) = self.yaw.sin_cos();
        let (sin_pitch, cos_pitch) = self.pitch.sin_cos();
        Vector::new(sin_yaw * cos_pitch, sin_pitch, -cos_yaw * cos_pitch).normalize()
    }

    pub fn forward_flat(&self) -> Vector<Real> {
        Vector::new(self.yaw.sin(), 0.0, -self.yaw.cos())
    }

    pub fn right_flat(&self) -> Vector<Real> {
        Vector::new(self.yaw.cos(), 0.0, self.yaw.sin())
    }
}

fn wrap_angle(angle: Real) -> Real {
    if !angle.is_finite() {
        return 0.0;
    }
    let wrapped = (angle + PI).rem_euclid(TAU) - PI;
    if wrapped >= PI {
        wrapped - TAU
    } else {
        wrapped
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CameraPose {
    pub eye: Vector<Real>,
    pub target: Vector<Real>,
    /// Seconds since the last dash, for the consumer's field-of-view easing.
    pub since_dash: Option<Real>,
}

#[derive(Clone, Copy, Debug)]
pub struct PlayerCamera {
    eye_height: Real,
    far_plane: Real,
    pose: CameraPose,
}

impl PlayerCamera {
    pub fn new(eye_height: Real, far_plane: Real) -> Self {
        Self {
            eye_height,
            far_plane,
            pose: CameraPose {
                eye: Vector::new(0.0, eye_height, 0.0),
                target: Vector::new(0.0, eye_height, -far_plane),
                since_dash: None,
            },
        }
    }

    pub fn eye_height(&self) -> Real {
        self.eye_height
    }

    pub fn eye_position(&self, origin: Vector<Real>) -> Vector<Real> {
        origin + Vector::y() * self.eye_height
    }

    pub fn update(
        &mut self,
        origin: Vector<Real>,
        direction: Vector<Real>,
        since_dash: Option<Real>,
    ) -> CameraPose {
        let eye = self.eye_position(origin);
        self.pose = CameraPose {
            eye,
            target: eye + direction * self.far_plane,
            since_dash,
        };
        self.pose
    }

    pub fn pose(&self) -> CameraPose {
        self.pose
    }
}
