use collision_world::AimTarget;
use engine_core::logging::{self, LogLevel};
use impulse_physics::{
    apply_impulse, clamp_magnitude, exponential_decay, move_towards, normalize_or_zero,
};
use rapier3d::math::Vector;
use rapier3d::prelude::Real;

use crate::{
    LifecycleCall, ModeTransition, MotorEvents, ParticleBurst, PlayerBody, RopeConstraint,
    RopeVisual, SoundKind, TuningParameters,
};

const LOG_TARGET: &str = "motor";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum PlayerMode {
    #[default]
    Grounded,
    Airborne,
}

/// One tick of already-sampled input. Button fields are press edges, except
/// `boost`, which is the held state.
#[derive(Clone, Copy, Debug, Default)]
pub struct MotorInput {
    pub look_delta: [Real; 2],
    /// `[strafe_right, forward]`, unit length or shorter.
    pub move_axis: [Real; 2],
    pub jump: bool,
    pub primary: bool,
    pub secondary: bool,
    pub boost: bool,
}

/// All mutable per-agent simulation state. Owned by the caller and handed to
/// [`PlayerStateMachine::update`] each tick.
#[derive(Clone, Debug)]
pub struct PlayerContext {
    pub body: PlayerBody,
    pub rope: RopeConstraint,
    /// Result of the previous tick's probe; read by the rope toggle.
    pub aim: AimTarget,
    mode: PlayerMode,
    time: f64,
    dash_time: Option<f64>,
    boost_sound_cooldown: Real,
    boost_particle_carry: Real,
}

impl PlayerContext {
    pub fn mode(&self) -> PlayerMode {
        self.mode
    }

    /// Simulated seconds since spawn.
    pub fn time(&self) -> f64 {
        self.time
    }

    pub fn dash_time(&self) -> Option<f64> {
        self.dash_time
    }

    pub fn since_dash(&self) -> Option<Real> {
        self.dash_time.map(|at| (self.time - at) as Real)
    }

    pub fn set_aim(&mut self, aim: AimTarget) {
        self.aim = aim;
    }

    pub fn rope_visual(&self, attach_height: Real) -> Option<RopeVisual> {
        self.rope.visual(self.body.position, attach_height)
    }
}

#[derive(Clone, Debug, Default)]
pub struct MotorOutput {
    pub events: MotorEvents,
    /// Boost loop volume, `|velocity| / max_velocity`; reported on airborne ticks only.
    pub boost_volume: Option<Real>,
    pub rope_taut: bool,
}

pub struct PlayerStateMachine {
    tuning: TuningParameters,
}

impl PlayerStateMachine {
    pub fn new(tuning: TuningParameters) -> Result<Self, String> {
        let validation = tuning.validate();
        for warning in &validation.warnings {
            logging::warn(LOG_TARGET, warning);
        }
        if !validation.is_ok() {
            return Err(validation.errors.join("; "));
        }
        Ok(Self { tuning })
    }

    pub fn tuning(&self) -> &TuningParameters {
        &self.tuning
    }

    /// Creates a grounded agent; the grounded enter hook has already run.
    pub fn spawn(&self, position: Vector<Real>, yaw: Real) -> PlayerContext {
        let mut ctx = PlayerContext {
            body: PlayerBody::new(position, yaw, self.tuning.pitch_epsilon),
            rope: RopeConstraint::default(),
            aim: AimTarget::miss(),
            mode: PlayerMode::Grounded,
            time: 0.0,
            dash_time: None,
            boost_sound_cooldown: 0.0,
            boost_particle_carry: 0.0,
        };
        self.on_enter(&mut ctx, PlayerMode::Grounded, &mut MotorEvents::default());
        ctx
    }

    pub fn update(&self, ctx: &mut PlayerContext, input: &MotorInput, dt: Real) -> MotorOutput {
        let mut output = MotorOutput::default();
        ctx.time += f64::from(dt);
        ctx.boost_sound_cooldown = move_towards(ctx.boost_sound_cooldown, 0.0, dt.max(0.0));
        match ctx.mode {
            PlayerMode::Grounded => self.update_grounded(ctx, input, dt, &mut output),
            PlayerMode::Airborne => self.update_airborne(ctx, input, dt, &mut output),
        }
        output
    }

    /// Runs the exit hook of the current mode, then the enter hook of `to`.
    pub fn switch_state(&self, ctx: &mut PlayerContext, to: PlayerMode, events: &mut MotorEvents) {
        let from = ctx.mode;
        self.on_exit(ctx, from, events);
        ctx.mode = to;
        self.on_enter(ctx, to, events);
        events.transitions.push(ModeTransition { from, to });
        if logging::enabled(LogLevel::Debug) {
            logging::debug(
                LOG_TARGET,
                format!(
                    "{:?} -> {:?} at t={:.3} pos={:?}",
                    from,
                    to,
                    ctx.time,
                    [ctx.body.position.x, ctx.body.position.y, ctx.body.position.z]
                ),
            );
        }
    }

    fn on_enter(&self, ctx: &mut PlayerContext, mode: PlayerMode, events: &mut MotorEvents) {
        events.lifecycle.push(LifecycleCall::Enter(mode));
        match mode {
            PlayerMode::Grounded => {
                if ctx.rope.active {
                    logging::debug(LOG_TARGET, "rope dropped on landing");
                }
                ctx.rope.release();
            }
            PlayerMode::Airborne => {
                ctx.boost_particle_carry = 0.0;
            }
        }
    }

    fn on_exit(&self, _ctx: &mut PlayerContext, mode: PlayerMode, events: &mut MotorEvents) {
        events.lifecycle.push(LifecycleCall::Exit(mode));
    }

    fn update_grounded(
        &self,
        ctx: &mut PlayerContext,
        input: &MotorInput,
        dt: Real,
        output: &mut MotorOutput,
    ) {
        let tuning = &self.tuning;
        ctx.body.rotate_look(input.look_delta, tuning.look_sensitivity);

        let look = ctx.body.look;
        let wish =
            look.right_flat() * input.move_axis[0] + look.forward_flat() * input.move_axis[1];
        let wish = normalize_or_zero(wish) * tuning.ground_speed;
        ctx.body.velocity.x = wish.x;
        ctx.body.velocity.z = wish.z;

        if input.jump {
            ctx.body.velocity +=
                apply_impulse(Vector::y(), tuning.mass, tuning.jump_impulse_force);
            self.switch_state(ctx, PlayerMode::Airborne, &mut output.events);
            output.events.play(SoundKind::Jump, 1.0);
        }

        ctx.body.integrate(dt);
    }

    fn update_airborne(
        &self,
        ctx: &mut PlayerContext,
        input: &MotorInput,
        dt: Real,
        output: &mut MotorOutput,
    ) {
        let tuning = &self.tuning;
        ctx.body.rotate_look(input.look_delta, tuning.look_sensitivity);
        let look_dir = ctx.body.looking_direction();

        // Air control adds to the current velocity; climbing needs boost.
        let mut control =
            look_dir * input.move_axis[1] + ctx.body.look.right_flat() * input.move_axis[0];
        if !input.boost {
            control.y = control.y.min(0.0);
        }
        let mut delta = control * (tuning.air_speed * dt);
        if input.boost {
            delta *= tuning.boost_multiplier;
            if ctx.boost_sound_cooldown <= 0.0 {
                let volume = self.boost_volume(ctx.body.velocity);
                output.events.play(SoundKind::Boost, volume);
                ctx.boost_sound_cooldown = tuning.boost_sound_interval;
            }
            self.emit_boost_particles(ctx, control, dt, &mut output.events);
        } else {
            ctx.boost_particle_carry = 0.0;
        }
        ctx.body.velocity += delta;
        ctx.body.velocity.y += tuning.gravity * dt;

        if input.secondary {
            self.dash(ctx, look_dir, &mut output.events);
        }
        if input.primary {
            self.toggle_rope(ctx, &mut output.events);
        }

        ctx.body.velocity = exponential_decay(
            ctx.body.velocity,
            Vector::zeros(),
            tuning.velocity_decay_rate,
            dt,
        );
        ctx.body.velocity = clamp_magnitude(ctx.body.velocity, tuning.max_velocity);

        ctx.body.integrate(dt);
        let body = &mut ctx.body;
        output.rope_taut = ctx.rope.enforce(&mut body.position, &mut body.velocity);

        output.boost_volume = Some(self.boost_volume(ctx.body.velocity));

        if ctx.body.position.y < 0.0 {
            ctx.body.position.y = 0.0;
            if ctx.body.velocity.y < 0.0 {
                ctx.body.velocity.y = 0.0;
            }
            self.switch_state(ctx, PlayerMode::Grounded, &mut output.events);
        }
    }

    fn dash(&self, ctx: &mut PlayerContext, look_dir: Vector<Real>, events: &mut MotorEvents) {
        let tuning = &self.tuning;
        let speed = ctx.body.velocity.norm();
        let impulse = apply_impulse(look_dir, tuning.mass, tuning.dash_impulse_force);
        ctx.body.velocity = look_dir * speed + impulse;
        ctx.dash_time = Some(ctx.time);
        events.play(SoundKind::Dash, 1.0);
        if tuning.dash_particle_count > 0 {
            events.particles.push(ParticleBurst {
                origin: ctx.body.position,
                count: tuning.dash_particle_count,
                base_velocity: -impulse,
                jitter: tuning.particle_jitter,
            });
        }
        logging::debug(
            LOG_TARGET,
            format!("dash at t={:.3} speed {:.2} -> {:.2}", ctx.time, speed, ctx.body.speed()),
        );
    }

    fn toggle_rope(&self, ctx: &mut PlayerContext, events: &mut MotorEvents) {
        if ctx.rope.active {
            ctx.rope.release();
            events.play(SoundKind::GrappleRelease, 1.0);
            logging::debug(LOG_TARGET, "rope released");
            return;
        }
        if !ctx.aim.hit {
            logging::trace(LOG_TARGET, "grapple pressed with nothing in reach");
            return;
        }
        if ctx.rope.attach(ctx.aim.point, ctx.body.position) {
            events.play(SoundKind::GrappleFire, 1.0);
            logging::debug(
                LOG_TARGET,
                format!(
                    "rope attached at {:?} length {:.2}",
                    [ctx.rope.anchor.x, ctx.rope.anchor.y, ctx.rope.anchor.z],
                    ctx.rope.length
                ),
            );
        }
    }

    fn emit_boost_particles(
        &self,
        ctx: &mut PlayerContext,
        control: Vector<Real>,
        dt: Real,
        events: &mut MotorEvents,
    ) {
        let tuning = &self.tuning;
        ctx.boost_particle_carry += tuning.boost_particles_per_second * dt.max(0.0);
        let count = ctx.boost_particle_carry.floor();
        if count < 1.0 {
            return;
        }
        ctx.boost_particle_carry -= count;
        events.particles.push(ParticleBurst {
            origin: ctx.body.position,
            count: count as u32,
            base_velocity: -normalize_or_zero(control) * tuning.air_speed,
            jitter: tuning.particle_jitter,
        });
    }

    fn boost_volume(&self, velocity: Vector<Real>) -> Real {
        (velocity.norm() / self.tuning.max_velocity).clamp(0.0, 1.0)
    }
}
