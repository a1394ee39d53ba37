use std::f32::consts::FRAC_PI_2;

use rapier3d::prelude::Real;
use serde::Deserialize;

/// Every constant the motor reads, fixed at construction.
#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TuningParameters {
    /// Kilograms; impulses are divided by this.
    pub mass: Real,
    /// Vertical acceleration in m/s^2 (negative is down).
    pub gravity: Real,
    /// Fixed horizontal walking speed in m/s.
    pub ground_speed: Real,
    /// Air-control acceleration in m/s^2.
    pub air_speed: Real,
    pub boost_multiplier: Real,
    pub jump_impulse_force: Real,
    pub dash_impulse_force: Real,
    /// Exponential decay rate toward zero velocity while airborne (1/s).
    pub velocity_decay_rate: Real,
    pub max_velocity: Real,
    /// Radians per unit of look delta.
    pub look_sensitivity: Real,
    pub pitch_epsilon: Real,
    pub eye_height: Real,
    pub far_plane: Real,
    /// Grapple reach along the look direction.
    pub probe_distance: Real,
    /// Minimum seconds between boost sound events.
    pub boost_sound_interval: Real,
    /// Height above the feet where the rope visually leaves the body.
    pub rope_attach_height: Real,
    pub dash_particle_count: u32,
    pub boost_particles_per_second: Real,
    pub particle_jitter: Real,
}

impl Default for TuningParameters {
    fn default() -> Self {
        Self {
            mass: 80.0,
            gravity: -20.0,
            ground_speed: 6.0,
            air_speed: 20.0,
            boost_multiplier: 2.5,
            jump_impulse_force: 560.0,
            dash_impulse_force: 1200.0,
            velocity_decay_rate: 0.15,
            max_velocity: 45.0,
            look_sensitivity: 0.0025,
            pitch_epsilon: 1.0e-3,
            eye_height: 1.7,
            far_plane: 200.0,
            probe_distance: 60.0,
            boost_sound_interval: 0.3,
            rope_attach_height: 1.2,
            dash_particle_count: 24,
            boost_particles_per_second: 60.0,
            particle_jitter: 1.5,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct TuningValidation {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl TuningValidation {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}

impl TuningParameters {
    pub fn parse_toml(text: &str) -> Result<Self, String> {
        toml::from_str(text).map_err(|err| err.to_string())
    }

    pub fn validate(&self) -> TuningValidation {
        let mut validation = TuningValidation::default();
        if let Err(err) = impulse_physics::check_mass(self.mass) {
            validation.errors.push(err);
        }
        if !self.gravity.is_finite() || self.gravity > 0.0 {
            validation
                .errors
                .push(format!("gravity must be finite and <= 0 (got {})", self.gravity));
        } else if self.gravity == 0.0 {
            validation
                .warnings
                .push("gravity is zero; airborne agents never land".to_string());
        }
        for (name, value) in [
            ("ground_speed", self.ground_speed),
            ("air_speed", self.air_speed),
            ("boost_multiplier", self.boost_multiplier),
            ("jump_impulse_force", self.jump_impulse_force),
            ("dash_impulse_force", self.dash_impulse_force),
            ("velocity_decay_rate", self.velocity_decay_rate),
            ("eye_height", self.eye_height),
            ("boost_sound_interval", self.boost_sound_interval),
            ("rope_attach_height", self.rope_attach_height),
            ("boost_particles_per_second", self.boost_particles_per_second),
            ("particle_jitter", self.particle_jitter),
        ] {
            if !value.is_finite() || value < 0.0 {
                validation
                    .errors
                    .push(format!("{} must be finite and >= 0 (got {})", name, value));
            }
        }
        for (name, value) in [
            ("max_velocity", self.max_velocity),
            ("look_sensitivity", self.look_sensitivity),
            ("far_plane", self.far_plane),
            ("probe_distance", self.probe_distance),
        ] {
            if !value.is_finite() || value <= 0.0 {
                validation
                    .errors
                    .push(format!("{} must be finite and > 0 (got {})", name, value));
            }
        }
        if !(self.pitch_epsilon > 0.0 && self.pitch_epsilon < FRAC_PI_2) {
            validation.errors.push(format!(
                "pitch_epsilon must be inside (0, pi/2) (got {})",
                self.pitch_epsilon
            ));
        }
        if self.boost_multiplier < 1.0 {
            validation.warnings.push(format!(
                "boost_multiplier {} slows the agent while boosting",
                self.boost_multiplier
            ));
        }
        if self.probe_distance > self.far_plane {
            validation.warnings.push(format!(
                "probe_distance {} reaches past far_plane {}",
                self.probe_distance, self.far_plane
            ));
        }
        validation
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate_cleanly() {
        let validation = TuningParameters::default().validate();
        assert!(validation.is_ok(), "{:?}", validation.errors);
        assert!(validation.warnings.is_empty());
    }

    #[test]
    fn missing_keys_fall_back_to_defaults() {
        let tuning = TuningParameters::parse_toml("mass = 60.0\ngravity = -9.81\n").expect("parse");
        assert_eq!(tuning.mass, 60.0);
        assert_eq!(tuning.gravity, -9.81);
        assert_eq!(tuning.max_velocity, TuningParameters::default().max_velocity);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(TuningParameters::parse_toml("jump_height = 3.0\n").is_err());
    }

    #[test]
    fn non_positive_mass_is_an_error() {
        let tuning = TuningParameters {
            mass: 0.0,
            ..Default::default()
        };
        let validation = tuning.validate();
        assert!(!validation.is_ok());
        assert!(validation.errors[0].contains("mass"));
    }

    #[test]
    fn upward_gravity_is_an_error() {
        let tuning = TuningParameters {
            gravity: 9.81,
            ..Default::default()
        };
        assert!(!tuning.validate().is_ok());
    }

    #[test]
    fn non_finite_boost_multiplier_is_an_error() {
        for value in [Real::NAN, Real::INFINITY, -2.0] {
            let tuning = TuningParameters {
                boost_multiplier: value,
                ..Default::default()
            };
            let validation = tuning.validate();
            assert!(!validation.is_ok(), "{} accepted", value);
            assert!(validation
                .errors
                .iter()
                .any(|err| err.contains("boost_multiplier")));
        }
    }
}
