use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};

use character_motor_grapple::TuningParameters;
use clap::{Parser, Subcommand};
use collision_world::{check_ray_direction, probe, probe_linear, ObstacleGeometry};
use engine_core::logging::{self, LogLevel};
use engine_core::observability;
use level_map::{Level, LevelMap};
use rapier3d::math::Vector;
use rapier3d::prelude::Real;

mod script;
mod simulate;

use script::InputScript;

const EXIT_SUCCESS: i32 = 0;
const EXIT_USAGE: i32 = 2;
const EXIT_LEVEL: i32 = 10;
const EXIT_TUNING: i32 = 11;
const EXIT_SCRIPT: i32 = 12;
const EXIT_SIMULATION: i32 = 13;

const FPS_PRESETS: [Real; 3] = [60.0, 20.0, 40.0];

#[derive(Parser)]
#[command(name = "tools", version, about = "Grapple controller tools CLI")]
struct Cli {
    /// error, warn, info, debug, or trace.
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the controller headless and print a summary.
    Simulate(SimulateArgs),
    /// Cast one ray against a level.
    Probe(ProbeArgs),
    CheckLevel {
        #[arg(value_name = "PATH")]
        path: PathBuf,
    },
    CheckTuning {
        #[arg(value_name = "PATH")]
        path: PathBuf,
    },
}

#[derive(Parser)]
struct SimulateArgs {
    /// Level file (.toml or plain); an empty plane when omitted.
    #[arg(long, value_name = "PATH")]
    level: Option<PathBuf>,

    #[arg(long, value_name = "PATH")]
    tuning: Option<PathBuf>,

    #[arg(long, value_name = "PATH")]
    script: Option<PathBuf>,

    /// Defaults to the script length, or 600 without a script.
    #[arg(long)]
    ticks: Option<u64>,

    /// Fixed tick rate; 60, 20 and 40 are the shipped presets.
    #[arg(long, default_value_t = 60.0)]
    fps: Real,
}

#[derive(Parser)]
struct ProbeArgs {
    #[arg(long, value_name = "PATH")]
    level: PathBuf,

    #[arg(long, value_delimiter = ',', num_args = 3, allow_hyphen_values = true)]
    origin: Vec<Real>,

    #[arg(long, value_delimiter = ',', num_args = 3, allow_hyphen_values = true)]
    direction: Vec<Real>,

    #[arg(long, default_value_t = 60.0)]
    max_distance: Real,
}

fn main() {
    observability::install_panic_hook();
    let cli = Cli::parse();
    let Some(level) = LogLevel::parse(&cli.log_level) else {
        eprintln!("unknown log level: {}", cli.log_level);
        std::process::exit(EXIT_USAGE);
    };
    logging::set_max_level(level);
    let exit_code = match cli.command {
        Commands::Simulate(args) => run_simulate(args),
        Commands::Probe(args) => run_probe(args),
        Commands::CheckLevel { path } => check_level(&path),
        Commands::CheckTuning { path } => check_tuning(&path),
    };
    std::process::exit(exit_code);
}

fn run_simulate(args: SimulateArgs) -> i32 {
    if !(args.fps.is_finite() && args.fps > 0.0) {
        eprintln!("--fps must be > 0 (got {})", args.fps);
        return EXIT_USAGE;
    }
    if !FPS_PRESETS.contains(&args.fps) {
        logging::warn("tools", format!("running at non-preset rate {} fps", args.fps));
    }
    let level = match args.level.as_deref() {
        Some(path) => match load_level(path) {
            Ok(level) => level,
            Err(code) => return code,
        },
        None => match empty_level() {
            Ok(level) => level,
            Err(code) => return code,
        },
    };
    let tuning = match args.tuning.as_deref() {
        Some(path) => match load_tuning(path) {
            Ok(tuning) => tuning,
            Err(code) => return code,
        },
        None => TuningParameters::default(),
    };
    let script = match args.script.as_deref() {
        Some(path) => match InputScript::load(path) {
            Ok(script) => script,
            Err(err) => {
                eprintln!("input script: {}", err);
                return EXIT_SCRIPT;
            }
        },
        None => InputScript::default(),
    };
    let ticks = args.ticks.unwrap_or_else(|| match script.total_ticks() {
        0 => 600,
        total => total,
    });

    let dt = 1.0 / args.fps;
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        simulate::run(&level, tuning, &script, ticks, dt)
    }));
    match outcome {
        Ok(Ok(summary)) => {
            summary.print();
            EXIT_SUCCESS
        }
        Ok(Err(err)) => {
            eprintln!("simulation failed: {}", err);
            EXIT_SIMULATION
        }
        Err(_) => {
            match observability::last_failure() {
                Some(failure) => eprintln!("simulation aborted: {}", failure),
                None => eprintln!("simulation aborted"),
            }
            EXIT_SIMULATION
        }
    }
}

fn run_probe(args: ProbeArgs) -> i32 {
    let (Some(origin), Some(direction)) = (to_vector(&args.origin), to_vector(&args.direction))
    else {
        eprintln!("--origin and --direction take three comma-separated values");
        return EXIT_USAGE;
    };
    if let Err(err) = check_ray_direction(direction) {
        eprintln!("--direction: {}", err);
        return EXIT_USAGE;
    }
    let level = match load_level(&args.level) {
        Ok(level) => level,
        Err(code) => return code,
    };
    let aim = probe(origin, direction, args.max_distance, &level.geometry);
    let reference = probe_linear(origin, direction, args.max_distance, &level.geometry);
    if aim != reference {
        logging::error("tools", format!("bvh probe {:?} disagrees with scan {:?}", aim, reference));
    }
    match aim.obstacle {
        Some(index) if aim.hit => {
            let id = level.ids.get(index).map(String::as_str).unwrap_or("?");
            println!(
                "hit '{}' (#{}) at ({:.3}, {:.3}, {:.3}) distance {:.3}",
                id, index, aim.point.x, aim.point.y, aim.point.z, aim.distance
            );
        }
        _ => println!("miss (max distance {})", args.max_distance),
    }
    EXIT_SUCCESS
}

fn check_level(path: &Path) -> i32 {
    let map = match LevelMap::load(path) {
        Ok(map) => map,
        Err(err) => {
            eprintln!("level load failed: {}", err);
            return EXIT_LEVEL;
        }
    };
    let validation = map.validate();
    print_report(&validation.errors, &validation.warnings);
    if !validation.is_ok() {
        return EXIT_LEVEL;
    }
    match map.build() {
        Ok(level) => {
            println!("level '{}' ok: {} boxes", level.name, level.geometry.len());
            EXIT_SUCCESS
        }
        Err(err) => {
            eprintln!("level build failed: {}", err);
            EXIT_LEVEL
        }
    }
}

fn check_tuning(path: &Path) -> i32 {
    let tuning = match read_tuning(path) {
        Ok(tuning) => tuning,
        Err(err) => {
            eprintln!("{}", err);
            return EXIT_TUNING;
        }
    };
    let validation = tuning.validate();
    print_report(&validation.errors, &validation.warnings);
    if !validation.is_ok() {
        return EXIT_TUNING;
    }
    println!("tuning ok");
    EXIT_SUCCESS
}

fn print_report(errors: &[String], warnings: &[String]) {
    for error in errors {
        println!("error: {}", error);
    }
    for warning in warnings {
        println!("warning: {}", warning);
    }
}

fn load_level(path: &Path) -> Result<Level, i32> {
    LevelMap::load(path)
        .and_then(|map| map.build())
        .map_err(|err| {
            eprintln!("level {}: {}", path.display(), err);
            EXIT_LEVEL
        })
}

fn empty_level() -> Result<Level, i32> {
    let geometry = ObstacleGeometry::new(Vec::new()).map_err(|err| {
        eprintln!("empty level: {}", err);
        EXIT_LEVEL
    })?;
    Ok(Level {
        name: "empty".to_string(),
        spawn: Vector::zeros(),
        spawn_yaw: 0.0,
        ids: Vec::new(),
        geometry,
    })
}

fn read_tuning(path: &Path) -> Result<TuningParameters, String> {
    let text = std::fs::read_to_string(path)
        .map_err(|err| format!("failed to read {}: {}", path.display(), err))?;
    TuningParameters::parse_toml(&text).map_err(|err| format!("{}: {}", path.display(), err))
}

fn load_tuning(path: &Path) -> Result<TuningParameters, i32> {
    read_tuning(path).map_err(|err| {
        eprintln!("tuning: {}", err);
        EXIT_TUNING
    })
}

fn to_vector(values: &[Real]) -> Option<Vector<Real>> {
    match values {
        [x, y, z] => Some(Vector::new(*x, *y, *z)),
        _ => None,
    }
}
