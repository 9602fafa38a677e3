//! Headless runner: assembles a level, plays a command script against it and
//! prints every event.
//!
//! Usage:
//!   cryptweave [--seed N] [--config FILE] [--verbose] [SCRIPT]
//!
//! Without a script a short built-in tour runs: clear the start room, walk
//! into a neighbor with two hunters, take some pressure, then kill both.

use std::{env, process::ExitCode};

use bracket_geometry::prelude::Point;
use log::{LevelFilter, Log, Metadata, Record, error};
use thiserror::Error;

use cryptweave::{
    Archetype, ConfigError, DungeonConfig, DungeonEvent, DungeonRun, PathResult, SimContext,
    level::BuildError,
    scripted_input::{ScriptCommand, ScriptError, ScriptRunner, ScriptedInput, Target},
};

const DEFAULT_SEED: u64 = 0x51ec5ead;

struct StderrLogger;

impl Log for StderrLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            eprintln!("[{:<5} {}] {}", record.level(), record.target(), record.args());
        }
    }

    fn flush(&self) {}
}

static LOGGER: StderrLogger = StderrLogger;

#[derive(Debug, Error)]
enum AppError {
    #[error("{0}")]
    Usage(String),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Build(#[from] BuildError),
    #[error(transparent)]
    Script(#[from] ScriptError),
}

#[derive(Default)]
struct Options {
    seed: Option<u64>,
    config: Option<String>,
    script: Option<String>,
    verbose: bool,
}

fn parse_args(mut args: impl Iterator<Item = String>) -> Result<Options, AppError> {
    let mut options = Options::default();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--seed" => {
                let value = args
                    .next()
                    .ok_or_else(|| AppError::Usage("--seed needs a value".into()))?;
                let seed = value
                    .parse()
                    .map_err(|_| AppError::Usage(format!("invalid seed `{value}`")))?;
                options.seed = Some(seed);
            }
            "--config" => {
                options.config = Some(
                    args.next()
                        .ok_or_else(|| AppError::Usage("--config needs a path".into()))?,
                );
            }
            "--verbose" | "-v" => options.verbose = true,
            flag if flag.starts_with('-') => {
                return Err(AppError::Usage(format!("unknown flag `{flag}`")));
            }
            _ => options.script = Some(arg),
        }
    }
    Ok(options)
}

fn main() -> ExitCode {
    let options = match parse_args(env::args().skip(1)) {
        Ok(options) => options,
        Err(err) => {
            eprintln!("{err}");
            eprintln!("usage: cryptweave [--seed N] [--config FILE] [--verbose] [SCRIPT]");
            return ExitCode::FAILURE;
        }
    };

    let level = if options.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    if log::set_logger(&LOGGER).is_ok() {
        log::set_max_level(level);
    }

    match run(options) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err}");
            ExitCode::FAILURE
        }
    }
}

fn run(options: Options) -> Result<(), AppError> {
    let config = match &options.config {
        Some(path) => DungeonConfig::from_path(path)?,
        None => DungeonConfig::default(),
    };
    let seed = options.seed.unwrap_or(DEFAULT_SEED);
    let ctx = SimContext::new(config, seed)?;
    let mut run = DungeonRun::start(ctx)?;

    println!("=== cryptweave (seed {seed}) ===");
    print_lattice(&run);

    let mut script = match &options.script {
        Some(path) => ScriptedInput::from_file(path)?,
        None => demo_script(&run),
    };

    let mut runner = ScriptRunner::new();
    while let Some(command) = script.next_command() {
        println!("> {}", describe_command(command));
        let report = runner.execute(&mut run, command)?;
        for event in &report.events {
            println!("  [{:>6.2}s] {}", run.elapsed, describe_event(event));
        }
        match report.path {
            Some(PathResult::Found(path)) => println!("  path: {} waypoints", path.waypoints.len()),
            Some(PathResult::NoPath(reason)) => println!("  path: none ({reason:?})"),
            None => {}
        }
    }

    println!();
    run.with_level(|level| {
        for room in level.graph.rooms() {
            println!(
                "room {:>2} ({:>2},{:>2}) {:<8} {:<10} pressure {:>5.1}",
                room.id.0,
                room.coord.x,
                room.coord.y,
                room.archetype.as_str(),
                room.state().as_str(),
                room.pressure()
            );
        }
    });
    Ok(())
}

fn print_lattice(run: &DungeonRun) {
    run.with_level(|level| {
        let layout = &level.layout;
        for y in (0..layout.height).rev() {
            let row: String = (0..layout.width)
                .map(|x| match layout.room_at(Point::new(x, y)) {
                    Some(room) => match room.archetype {
                        Archetype::Start => 'S',
                        Archetype::Shop => '$',
                        Archetype::Boss => 'B',
                        Archetype::Generic => '#',
                    },
                    None => '.',
                })
                .collect();
            println!("  {row}");
        }
    });
}

/// Built-in tour: start room, then the first neighbor of Start.
fn demo_script(run: &DungeonRun) -> ScriptedInput {
    let (start, neighbor) = run.with_level(|level| {
        let start = level.layout.start;
        let neighbor = level
            .graph
            .room_at(start)
            .and_then(|id| level.graph.neighbors(id).first().map(|(_, n)| *n))
            .and_then(|id| level.graph.room(id))
            .map(|room| room.bounds.center());
        (start, neighbor)
    });

    let mut commands = vec![ScriptCommand::Move {
        target: Target::Room(start),
    }];
    if let Some(center) = neighbor {
        commands.extend([
            ScriptCommand::Spawn {
                name: "ghoul".into(),
                target: Target::World(center.offset(3.0, 2.0)),
                passive: false,
            },
            ScriptCommand::Spawn {
                name: "brute".into(),
                target: Target::World(center.offset(-3.0, -2.0)),
                passive: false,
            },
            ScriptCommand::Move {
                target: Target::World(center),
            },
            ScriptCommand::Tick {
                seconds: 3.0,
                step: 0.1,
            },
            ScriptCommand::Damage,
            ScriptCommand::Miss { amount: 4.0 },
            ScriptCommand::Path {
                target: Target::Room(start),
            },
            ScriptCommand::Kill {
                name: "ghoul".into(),
            },
            ScriptCommand::Kill {
                name: "brute".into(),
            },
            ScriptCommand::Path {
                target: Target::Room(start),
            },
        ]);
    }
    commands.push(ScriptCommand::Tick {
        seconds: 1.0,
        step: 0.1,
    });
    ScriptedInput::from_commands(commands)
}

fn describe_target(target: &Target) -> String {
    match target {
        Target::World(point) => format!("({:.1}, {:.1})", point.x, point.y),
        Target::Room(coord) => format!("room ({}, {})", coord.x, coord.y),
    }
}

fn describe_command(command: &ScriptCommand) -> String {
    match command {
        ScriptCommand::Move { target } => format!("move {}", describe_target(target)),
        ScriptCommand::Spawn {
            name,
            target,
            passive,
        } => format!(
            "spawn {name} at {}{}",
            describe_target(target),
            if *passive { " (passive)" } else { "" }
        ),
        ScriptCommand::Kill { name } => format!("kill {name}"),
        ScriptCommand::Damage => "damage".to_string(),
        ScriptCommand::Miss { amount } => format!("miss {amount}"),
        ScriptCommand::Tick { seconds, step } => format!("tick {seconds}s by {step}s"),
        ScriptCommand::Lock => "lock".to_string(),
        ScriptCommand::Release => "release".to_string(),
        ScriptCommand::Source { interval, count } => match count {
            Some(count) => format!("source every {interval}s x{count}"),
            None => format!("source every {interval}s"),
        },
        ScriptCommand::Path { target } => format!("path to {}", describe_target(target)),
    }
}

fn describe_event(event: &DungeonEvent) -> String {
    match event {
        DungeonEvent::RoomEntered { room } => format!("room {} entered", room.0),
        DungeonEvent::RoomLocked { room } => format!("room {} locked", room.0),
        DungeonEvent::RoomCleared { room } => format!("room {} cleared", room.0),
        DungeonEvent::RoomStabilized { room } => format!("room {} stabilized", room.0),
        DungeonEvent::PressureActivated { room } => format!("room {} pressure on", room.0),
        DungeonEvent::PressureChanged {
            room,
            from,
            to,
            pressure,
        } => format!(
            "room {} pressure {} -> {} ({pressure:.1})",
            room.0,
            from.as_str(),
            to.as_str()
        ),
        DungeonEvent::DoorChanged {
            room,
            direction,
            locked,
        } => format!(
            "room {} {} door {}",
            room.0,
            direction.as_str(),
            if *locked { "locked" } else { "open" }
        ),
        DungeonEvent::SpawnRequested { room, source } => {
            format!("room {} spawn from source {}", room.0, source.index)
        }
        DungeonEvent::TutorialReleased { room } => format!("room {} tutorial released", room.0),
    }
}
