//! Grapple movement motor: grounded/airborne state machine, impulses, and rope swing.
#![forbid(unsafe_code)]

mod body;
mod events;
mod machine;
mod rope;
mod tuning;

pub use body::PlayerBody;
pub use events::{
    LifecycleCall, ModeTransition, MotorEvents, ParticleBurst, SoundEvent, SoundKind,
};
pub use machine::{MotorInput, MotorOutput, PlayerContext, PlayerMode, PlayerStateMachine};
pub use rope::{redirect, RopeConstraint, RopeVisual, MIN_ROPE_LENGTH};
pub use tuning::{TuningParameters, TuningValidation};
