use rapier3d::math::Vector;
use rapier3d::prelude::Real;

use crate::PlayerMode;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SoundKind {
    Jump,
    Dash,
    GrappleFire,
    GrappleRelease,
    Boost,
}

/// Fire-and-forget playback request.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SoundEvent {
    pub kind: SoundKind,
    pub volume: Real,
}

/// Request to spawn `count` particles around `origin`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ParticleBurst {
    pub origin: Vector<Real>,
    pub count: u32,
    pub base_velocity: Vector<Real>,
    pub jitter: Real,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ModeTransition {
    pub from: PlayerMode,
    pub to: PlayerMode,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LifecycleCall {
    Exit(PlayerMode),
    Enter(PlayerMode),
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct MotorEvents {
    pub sounds: Vec<SoundEvent>,
    pub particles: Vec<ParticleBurst>,
    pub transitions: Vec<ModeTransition>,
    pub lifecycle: Vec<LifecycleCall>,
}

impl MotorEvents {
    pub fn play(&mut self, kind: SoundKind, volume: Real) {
        self.sounds.push(SoundEvent { kind, volume });
    }

    pub fn count_sounds(&self, kind: SoundKind) -> usize {
        self.sounds.iter().filter(|sound| sound.kind == kind).count()
    }
}
