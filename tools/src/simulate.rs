use character_motor_grapple::{PlayerMode, SoundKind, TuningParameters};
use engine_core::logging;
use level_map::Level;
use player_controller::{EdgeInputAdapter, PlayerController};
use rapier3d::math::Vector;
use rapier3d::prelude::Real;

use crate::script::InputScript;

const LOG_TARGET: &str = "simulate";
const SOUND_KINDS: [SoundKind; 5] = [
    SoundKind::Jump,
    SoundKind::Dash,
    SoundKind::GrappleFire,
    SoundKind::GrappleRelease,
    SoundKind::Boost,
];

fn sound_slot(kind: SoundKind) -> usize {
    match kind {
        SoundKind::Jump => 0,
        SoundKind::Dash => 1,
        SoundKind::GrappleFire => 2,
        SoundKind::GrappleRelease => 3,
        SoundKind::Boost => 4,
    }
}

#[derive(Clone, Debug)]
pub struct RunSummary {
    pub level: String,
    pub ticks: u64,
    pub seconds: f64,
    pub mode: PlayerMode,
    pub position: Vector<Real>,
    pub velocity: Vector<Real>,
    pub rope: Option<(Vector<Real>, Real)>,
    pub sounds: [usize; 5],
    pub particles: u64,
    pub transitions: usize,
    pub landings: usize,
    pub taut_ticks: u64,
    pub max_speed: Real,
    pub max_height: Real,
}

impl RunSummary {
    pub fn sound_count(&self, kind: SoundKind) -> usize {
        self.sounds[sound_slot(kind)]
    }

    pub fn print(&self) {
        println!(
            "simulate '{}': {} ticks ({:.3}s)",
            self.level, self.ticks, self.seconds
        );
        println!("  mode:      {:?}", self.mode);
        println!(
            "  position:  ({:.3}, {:.3}, {:.3})",
            self.position.x, self.position.y, self.position.z
        );
        println!(
            "  velocity:  ({:.3}, {:.3}, {:.3}) |v|={:.3}",
            self.velocity.x,
            self.velocity.y,
            self.velocity.z,
            self.velocity.norm()
        );
        match self.rope {
            Some((anchor, length)) => println!(
                "  rope:      anchored at ({:.3}, {:.3}, {:.3}) length {:.3}",
                anchor.x, anchor.y, anchor.z, length
            ),
            None => println!("  rope:      inactive"),
        }
        println!(
            "  peaks:     speed {:.3} height {:.3}",
            self.max_speed, self.max_height
        );
        println!(
            "  events:    transitions={} landings={} taut_ticks={} particles={}",
            self.transitions, self.landings, self.taut_ticks, self.particles
        );
        for kind in SOUND_KINDS {
            println!("  sound {:<15} {}", format!("{:?}", kind), self.sound_count(kind));
        }
    }
}

/// Runs `ticks` fixed steps of `dt` on `level`, driving the player from `script`.
pub fn run(
    level: &Level,
    tuning: TuningParameters,
    script: &InputScript,
    ticks: u64,
    dt: Real,
) -> Result<RunSummary, String> {
    if !(dt.is_finite() && dt > 0.0) {
        return Err(format!("tick length must be finite and > 0 (got {})", dt));
    }
    let mut controller =
        PlayerController::new(EdgeInputAdapter::default(), tuning, level.spawn, level.spawn_yaw)?;
    let mut summary = RunSummary {
        level: level.name.clone(),
        ticks: 0,
        seconds: 0.0,
        mode: controller.context().mode(),
        position: level.spawn,
        velocity: Vector::zeros(),
        rope: None,
        sounds: [0; 5],
        particles: 0,
        transitions: 0,
        landings: 0,
        taut_ticks: 0,
        max_speed: 0.0,
        max_height: level.spawn.y,
    };

    for tick in 0..ticks {
        let frame = controller.tick(&level.geometry, script.raw_at(tick), dt);
        for sound in &frame.events.sounds {
            summary.sounds[sound_slot(sound.kind)] += 1;
        }
        summary.particles += frame
            .events
            .particles
            .iter()
            .map(|burst| u64::from(burst.count))
            .sum::<u64>();
        for transition in &frame.events.transitions {
            summary.transitions += 1;
            if transition.to == PlayerMode::Grounded {
                summary.landings += 1;
                logging::debug(
                    LOG_TARGET,
                    format!(
                        "landed on tick {} at x={:.3} z={:.3}",
                        frame.tick, frame.body.position.x, frame.body.position.z
                    ),
                );
            }
        }
        if frame.rope_taut {
            summary.taut_ticks += 1;
        }
        summary.max_speed = summary.max_speed.max(frame.body.speed());
        summary.max_height = summary.max_height.max(frame.body.position.y);
    }

    let ctx = controller.context();
    summary.ticks = controller.ticks();
    summary.seconds = ctx.time();
    summary.mode = ctx.mode();
    summary.position = ctx.body.position;
    summary.velocity = ctx.body.velocity;
    summary.rope = ctx.rope.active.then_some((ctx.rope.anchor, ctx.rope.length));
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use level_map::LevelMap;

    const LEVEL: &str = r#"
version = 1
name = "swing_test"
spawn = [0.0, 0.0, 0.0]

[[boxes]]
id = "beam"
pos = [0.0, 20.0, -15.0]
size = [40.0, 2.0, 2.0]
"#;

    const SCRIPT: &str = r#"
[[segments]]
ticks = 1
jump = true

[[segments]]
ticks = 5
look = [0.0, -72.0]

[[segments]]
ticks = 1
primary = true

[[segments]]
ticks = 20
"#;

    fn level() -> Level {
        LevelMap::parse_toml(LEVEL)
            .expect("parse level")
            .build()
            .expect("build level")
    }

    #[test]
    fn idle_run_stays_grounded() {
        let level = level();
        let summary = run(
            &level,
            TuningParameters::default(),
            &InputScript::default(),
            60,
            1.0 / 60.0,
        )
        .expect("run");
        assert_eq!(summary.ticks, 60);
        assert_eq!(summary.mode, PlayerMode::Grounded);
        assert_eq!(summary.position, Vector::zeros());
        assert_eq!(summary.transitions, 0);
        assert!((summary.seconds - 1.0).abs() < 1.0e-4);
    }

    #[test]
    fn scripted_grapple_attaches_to_beam() {
        let level = level();
        let script = InputScript::parse_toml(SCRIPT).expect("parse script");
        let summary = run(
            &level,
            TuningParameters::default(),
            &script,
            script.total_ticks(),
            1.0 / 60.0,
        )
        .expect("run");
        assert_eq!(summary.sound_count(SoundKind::Jump), 1);
        assert_eq!(summary.sound_count(SoundKind::GrappleFire), 1);
        let (anchor, length) = summary.rope.expect("rope still attached");
        assert!((anchor.z + 14.0).abs() < 1.0e-3);
        assert!((summary.position - anchor).norm() <= length + 1.0e-3);
        assert_eq!(summary.mode, PlayerMode::Airborne);
    }

    #[test]
    fn swing_ends_on_the_ground_with_rope_dropped() {
        let level = level();
        let script = InputScript::parse_toml(SCRIPT).expect("parse script");
        let summary = run(
            &level,
            TuningParameters::default(),
            &script,
            script.total_ticks() + 150,
            1.0 / 60.0,
        )
        .expect("run");
        assert_eq!(summary.mode, PlayerMode::Grounded);
        assert_eq!(summary.landings, 1);
        assert_eq!(summary.transitions, 2);
        assert!(summary.rope.is_none());
        assert_eq!(summary.sound_count(SoundKind::GrappleRelease), 0);
        assert_eq!(summary.position.y, 0.0);
    }

    #[test]
    fn rejects_bad_tick_length() {
        let level = level();
        let result = run(
            &level,
            TuningParameters::default(),
            &InputScript::default(),
            10,
            0.0,
        );
        assert!(result.is_err());
    }

    #[test]
    fn shipped_demos_load_and_run() {
        let courtyard = LevelMap::parse_toml(include_str!("../../demos/courtyard.toml"))
            .expect("parse courtyard")
            .build()
            .expect("build courtyard");
        assert!(courtyard.geometry.len() > 3);
        let arena = LevelMap::parse_plain("arena", include_str!("../../demos/arena.txt"))
            .expect("parse arena")
            .build()
            .expect("build arena");
        assert_eq!(arena.geometry.len(), 5);

        let tuning = TuningParameters::parse_toml(include_str!("../../demos/tuning.toml"))
            .expect("parse tuning");
        assert!(tuning.validate().is_ok());
        let script = InputScript::parse_toml(include_str!("../../demos/swing.toml"))
            .expect("parse script");
        let summary = run(&courtyard, tuning, &script, script.total_ticks(), 1.0 / 40.0)
            .expect("run");
        assert_eq!(summary.ticks, script.total_ticks());
        assert_eq!(summary.sound_count(SoundKind::Jump), 1);
        assert!(summary.position.y >= 0.0);
    }
}
