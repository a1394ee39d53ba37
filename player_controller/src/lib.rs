//! Player controller composition (input + motor + aim probe + camera).
#![forbid(unsafe_code)]

use character_motor_grapple::{
    MotorEvents, MotorInput, PlayerBody, PlayerContext, PlayerMode, PlayerStateMachine,
    RopeVisual, TuningParameters,
};
use collision_world::{probe, AimTarget, ObstacleGeometry};
use engine_core::logging::{self, LogLevel};
use player_camera::{CameraPose, PlayerCamera};
use rapier3d::math::Vector;
use rapier3d::prelude::Real;

const LOG_TARGET: &str = "controller";

/// Device state as held this frame; buttons are levels, not edges.
#[derive(Clone, Copy, Debug, Default)]
pub struct RawInput {
    pub move_x: Real,
    pub move_y: Real,
    pub look_delta: [Real; 2],
    pub jump: bool,
    pub primary: bool,
    pub secondary: bool,
    pub boost: bool,
}

pub trait InputAdapter {
    fn sample(&mut self, raw: RawInput) -> MotorInput;
}

fn normalize_axis(axis: [Real; 2]) -> [Real; 2] {
    let len = (axis[0] * axis[0] + axis[1] * axis[1]).sqrt();
    if len > 1.0 {
        [axis[0] / len, axis[1] / len]
    } else {
        axis
    }
}

/// Passes buttons through unchanged; use when the source already reports edges.
#[derive(Default)]
pub struct DirectInputAdapter;

impl InputAdapter for DirectInputAdapter {
    fn sample(&mut self, raw: RawInput) -> MotorInput {
        MotorInput {
            look_delta: raw.look_delta,
            move_axis: normalize_axis([raw.move_x, raw.move_y]),
            jump: raw.jump,
            primary: raw.primary,
            secondary: raw.secondary,
            boost: raw.boost,
        }
    }
}

/// Turns held buttons into press edges. Boost stays a held level.
#[derive(Default)]
pub struct EdgeInputAdapter {
    jump: bool,
    primary: bool,
    secondary: bool,
}

impl InputAdapter for EdgeInputAdapter {
    fn sample(&mut self, raw: RawInput) -> MotorInput {
        let input = MotorInput {
            look_delta: raw.look_delta,
            move_axis: normalize_axis([raw.move_x, raw.move_y]),
            jump: raw.jump && !self.jump,
            primary: raw.primary && !self.primary,
            secondary: raw.secondary && !self.secondary,
            boost: raw.boost,
        };
        self.jump = raw.jump;
        self.primary = raw.primary;
        self.secondary = raw.secondary;
        input
    }
}

#[derive(Clone, Debug)]
pub struct PlayerFrame {
    pub tick: u64,
    pub body: PlayerBody,
    pub mode: PlayerMode,
    pub aim: AimTarget,
    pub camera: CameraPose,
    pub events: MotorEvents,
    pub rope: Option<RopeVisual>,
    pub rope_taut: bool,
    pub boost_volume: Option<Real>,
}

pub struct PlayerController<A: InputAdapter> {
    input: A,
    motor: PlayerStateMachine,
    camera: PlayerCamera,
    ctx: PlayerContext,
    tick: u64,
}

impl<A: InputAdapter> PlayerController<A> {
    pub fn new(
        input: A,
        tuning: TuningParameters,
        spawn: Vector<Real>,
        yaw: Real,
    ) -> Result<Self, String> {
        let motor = PlayerStateMachine::new(tuning)?;
        let ctx = motor.spawn(spawn, yaw);
        let mut camera = PlayerCamera::new(tuning.eye_height, tuning.far_plane);
        camera.update(ctx.body.position, ctx.body.looking_direction(), None);
        Ok(Self {
            input,
            motor,
            camera,
            ctx,
            tick: 0,
        })
    }

    pub fn context(&self) -> &PlayerContext {
        &self.ctx
    }

    pub fn context_mut(&mut self) -> &mut PlayerContext {
        &mut self.ctx
    }

    pub fn motor(&self) -> &PlayerStateMachine {
        &self.motor
    }

    pub fn camera(&self) -> &PlayerCamera {
        &self.camera
    }

    pub fn ticks(&self) -> u64 {
        self.tick
    }

    /// Runs one frame. The aim found here is what the next frame's grapple
    /// press attaches to.
    pub fn tick(&mut self, obstacles: &ObstacleGeometry, raw: RawInput, dt: Real) -> PlayerFrame {
        let input = self.input.sample(raw);
        let output = self.motor.update(&mut self.ctx, &input, dt);

        let tuning = self.motor.tuning();
        let direction = self.ctx.body.looking_direction();
        let eye = self.camera.eye_position(self.ctx.body.position);
        let aim = probe(eye, direction, tuning.probe_distance, obstacles);
        self.ctx.set_aim(aim);

        let camera = self
            .camera
            .update(self.ctx.body.position, direction, self.ctx.since_dash());
        self.tick += 1;

        if logging::enabled(LogLevel::Trace) {
            let p = self.ctx.body.position;
            logging::trace(
                LOG_TARGET,
                format!(
                    "tick {} {:?} pos=({:.3}, {:.3}, {:.3}) speed={:.3} aim={}",
                    self.tick,
                    self.ctx.mode(),
                    p.x,
                    p.y,
                    p.z,
                    self.ctx.body.speed(),
                    if aim.hit { "hit" } else { "miss" }
                ),
            );
        }

        PlayerFrame {
            tick: self.tick,
            body: self.ctx.body,
            mode: self.ctx.mode(),
            aim,
            camera,
            events: output.events,
            rope: self.ctx.rope_visual(tuning.rope_attach_height),
            rope_taut: output.rope_taut,
            boost_volume: output.boost_volume,
        }
    }
}
