use player_camera::LookAngles;
use rapier3d::math::Vector;
use rapier3d::prelude::Real;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PlayerBody {
    /// Feet position in world space.
    pub position: Vector<Real>,
    /// Position before the last integration step.
    pub previous_position: Vector<Real>,
    pub velocity: Vector<Real>,
    pub look: LookAngles,
    looking_direction: Vector<Real>,
}

impl PlayerBody {
    pub fn new(position: Vector<Real>, yaw: Real, pitch_epsilon: Real) -> Self {
        let mut look = LookAngles::new(pitch_epsilon);
        look.set(yaw, 0.0);
        Self {
            position,
            previous_position: position,
            velocity: Vector::zeros(),
            look,
            looking_direction: look.direction(),
        }
    }

    /// Unit vector, refreshed every time the look angles change.
    pub fn looking_direction(&self) -> Vector<Real> {
        self.looking_direction
    }

    pub fn rotate_look(&mut self, delta: [Real; 2], sensitivity: Real) {
        self.look.apply_delta(delta, sensitivity);
        self.looking_direction = self.look.direction();
    }

    pub fn set_look(&mut self, yaw: Real, pitch: Real) {
        self.look.set(yaw, pitch);
        self.looking_direction = self.look.direction();
    }

    pub fn integrate(&mut self, dt: Real) {
        self.previous_position = self.position;
        self.position += self.velocity * dt;
    }

    pub fn speed(&self) -> Real {
        self.velocity.norm()
    }
}
