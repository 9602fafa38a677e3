//! Line-oriented command scripts that drive a [`DungeonRun`] headlessly.
//!
//! ```text
//! # comment
//! move room 6 5          # teleport to the center of lattice room (6,5)
//! move 96.0 50.0         # or to a world position
//! spawn ghoul 99 52      # counting hunter; append `passive` for a bystander
//! tick 2.0 0.1           # advance 2s in 0.1s steps
//! damage
//! miss 4
//! kill ghoul
//! lock / release         # tutorial lock on the current room
//! source 1.5 3           # spawn source in the current room (count optional)
//! path room 5 5          # plan from the player, report the result
//! ```

use std::{
    collections::HashMap,
    fs,
    io,
    path::Path,
    str::FromStr,
};

use bracket_geometry::prelude::Point;
use specs::prelude::Entity;
use thiserror::Error;

use crate::{
    ecs::DungeonRun,
    events::DungeonEvent,
    geom::WorldPoint,
    nav::PathResult,
    rooms::{RoomError, SpawnSource},
};

const DEFAULT_TICK_STEP: f32 = 0.1;
/// Float leftovers below this are not worth another step.
const TICK_SLACK: f32 = 1e-4;

#[derive(Debug, Error)]
pub enum ScriptError {
    #[error("failed to read script: {0}")]
    Io(#[from] io::Error),
    #[error("line {line}: unknown command `{command}`")]
    UnknownCommand { line: usize, command: String },
    #[error("line {line}: {reason}")]
    BadArgument { line: usize, reason: String },
    #[error("no agent named `{0}`")]
    UnknownAgent(String),
    #[error("agent `{0}` already exists")]
    DuplicateAgent(String),
    #[error("({x}, {y}) is not inside any room")]
    OutsideRooms { x: f32, y: f32 },
    #[error("no room at lattice ({x}, {y})")]
    NoRoomAt { x: i32, y: i32 },
    #[error("tick of {seconds}s by {step}s steps would never finish")]
    InvalidTick { seconds: f32, step: f32 },
    #[error(transparent)]
    Room(#[from] RoomError),
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Target {
    World(WorldPoint),
    Room(Point),
}

#[derive(Clone, Debug, PartialEq)]
pub enum ScriptCommand {
    Move { target: Target },
    Spawn { name: String, target: Target, passive: bool },
    Kill { name: String },
    Damage,
    Miss { amount: f32 },
    Tick { seconds: f32, step: f32 },
    Lock,
    Release,
    Source { interval: f32, count: Option<u32> },
    Path { target: Target },
}

pub struct ScriptedInput {
    script_commands: Vec<ScriptCommand>,
    current_command_index: usize,
}

impl ScriptedInput {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ScriptError> {
        fs::read_to_string(path)?.parse()
    }

    pub fn from_commands(script_commands: Vec<ScriptCommand>) -> Self {
        Self {
            script_commands,
            current_command_index: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.script_commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.script_commands.is_empty()
    }

    pub fn next_command(&mut self) -> Option<&ScriptCommand> {
        let command = self.script_commands.get(self.current_command_index)?;
        self.current_command_index += 1;
        Some(command)
    }
}

impl FromStr for ScriptedInput {
    type Err = ScriptError;

    fn from_str(source: &str) -> Result<Self, Self::Err> {
        let mut script_commands = Vec::new();
        for (idx, line) in source.lines().enumerate() {
            let line_no = idx + 1;
            let trimmed = line.split('#').next().unwrap_or_default().trim();
            if trimmed.is_empty() {
                continue;
            }
            script_commands.push(parse_line(line_no, trimmed)?);
        }
        Ok(Self::from_commands(script_commands))
    }
}

fn parse_line(line: usize, text: &str) -> Result<ScriptCommand, ScriptError> {
    let mut args = Args {
        line,
        tokens: text.split_whitespace().collect(),
        cursor: 0,
    };
    let command = args.word("command")?;
    let parsed = match command.as_str() {
        "move" => ScriptCommand::Move {
            target: args.target()?,
        },
        "spawn" => {
            let name = args.word("agent name")?;
            let target = args.target()?;
            let passive = match args.optional() {
                None => false,
                Some("passive") => true,
                Some(other) => return Err(args.bad(format!("expected `passive`, got `{other}`"))),
            };
            ScriptCommand::Spawn {
                name,
                target,
                passive,
            }
        }
        "kill" => ScriptCommand::Kill {
            name: args.word("agent name")?,
        },
        "damage" => ScriptCommand::Damage,
        "miss" => ScriptCommand::Miss {
            amount: args.number("amount")?,
        },
        "tick" => {
            let seconds: f32 = args.number("seconds")?;
            let step = match args.optional() {
                Some(token) => args.parse_token(token, "step")?,
                None => DEFAULT_TICK_STEP,
            };
            if !tick_is_finite(seconds, step) {
                return Err(args.bad("tick needs a positive step and non-negative duration"));
            }
            ScriptCommand::Tick { seconds, step }
        }
        "lock" => ScriptCommand::Lock,
        "release" => ScriptCommand::Release,
        "source" => {
            let interval: f32 = args.number("interval")?;
            if !(interval > 0.0) || !interval.is_finite() {
                return Err(args.bad("source interval must be positive"));
            }
            let count = match args.optional() {
                Some(token) => Some(args.parse_token(token, "count")?),
                None => None,
            };
            ScriptCommand::Source { interval, count }
        }
        "path" => ScriptCommand::Path {
            target: args.target()?,
        },
        _ => return Err(ScriptError::UnknownCommand { line, command }),
    };
    if let Some(extra) = args.optional() {
        return Err(args.bad(format!("unexpected argument `{extra}`")));
    }
    Ok(parsed)
}

fn tick_is_finite(seconds: f32, step: f32) -> bool {
    step > 0.0 && step.is_finite() && seconds >= 0.0 && seconds.is_finite()
}

struct Args<'a> {
    line: usize,
    tokens: Vec<&'a str>,
    cursor: usize,
}

impl<'a> Args<'a> {
    fn bad(&self, reason: impl Into<String>) -> ScriptError {
        ScriptError::BadArgument {
            line: self.line,
            reason: reason.into(),
        }
    }

    fn optional(&mut self) -> Option<&'a str> {
        let token = self.tokens.get(self.cursor).copied()?;
        self.cursor += 1;
        Some(token)
    }

    fn word(&mut self, what: &str) -> Result<String, ScriptError> {
        self.optional()
            .map(str::to_string)
            .ok_or_else(|| self.bad(format!("missing {what}")))
    }

    fn parse_token<T: FromStr>(&self, token: &str, what: &str) -> Result<T, ScriptError> {
        token
            .parse()
            .map_err(|_| self.bad(format!("invalid {what} `{token}`")))
    }

    fn number<T: FromStr>(&mut self, what: &str) -> Result<T, ScriptError> {
        let token = self
            .optional()
            .ok_or_else(|| self.bad(format!("missing {what}")))?;
        self.parse_token(token, what)
    }

    fn target(&mut self) -> Result<Target, ScriptError> {
        if self.tokens.get(self.cursor) == Some(&"room") {
            self.cursor += 1;
            let x: i32 = self.number("lattice x")?;
            let y: i32 = self.number("lattice y")?;
            return Ok(Target::Room(Point::new(x, y)));
        }
        let x = self.number("x")?;
        let y = self.number("y")?;
        Ok(Target::World(WorldPoint::new(x, y)))
    }
}

/// What one command produced.
#[derive(Clone, Debug, Default)]
pub struct StepReport {
    pub events: Vec<DungeonEvent>,
    pub path: Option<PathResult>,
}

/// Executes commands against a run, tracking named agents. Spawn requests
/// raised while ticking are answered with anonymous hunters at the room
/// center.
#[derive(Default)]
pub struct ScriptRunner {
    agents: HashMap<String, Entity>,
    spawned: u32,
}

impl ScriptRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn agent(&self, name: &str) -> Option<Entity> {
        self.agents.get(name).copied()
    }

    pub fn run_all(
        &mut self,
        run: &mut DungeonRun,
        script: &mut ScriptedInput,
    ) -> Result<Vec<StepReport>, ScriptError> {
        let mut reports = Vec::with_capacity(script.len());
        while let Some(command) = script.next_command() {
            reports.push(self.execute(run, command)?);
        }
        Ok(reports)
    }

    pub fn execute(
        &mut self,
        run: &mut DungeonRun,
        command: &ScriptCommand,
    ) -> Result<StepReport, ScriptError> {
        let mut report = StepReport::default();
        match command {
            ScriptCommand::Move { target } => {
                let point = resolve(run, *target)?;
                run.move_player(point);
                run.advance(0.0);
            }
            ScriptCommand::Spawn {
                name,
                target,
                passive,
            } => {
                if self.agents.contains_key(name) {
                    return Err(ScriptError::DuplicateAgent(name.clone()));
                }
                let point = resolve(run, *target)?;
                let room = run
                    .with_level(|level| level.graph.room_containing(point))
                    .ok_or(ScriptError::OutsideRooms {
                        x: point.x,
                        y: point.y,
                    })?;
                let entity = run.spawn_occupant(room, point, !passive, !passive)?;
                self.agents.insert(name.clone(), entity);
            }
            ScriptCommand::Kill { name } => {
                let entity = self
                    .agents
                    .remove(name)
                    .ok_or_else(|| ScriptError::UnknownAgent(name.clone()))?;
                run.kill(entity)?;
            }
            ScriptCommand::Damage => {
                run.damage_player()?;
            }
            ScriptCommand::Miss { amount } => {
                run.missed(*amount)?;
            }
            ScriptCommand::Tick { seconds, step } => {
                if !tick_is_finite(*seconds, *step) {
                    return Err(ScriptError::InvalidTick {
                        seconds: *seconds,
                        step: *step,
                    });
                }
                let mut remaining = *seconds;
                while remaining > TICK_SLACK {
                    let dt = step.min(remaining);
                    run.advance(dt);
                    remaining -= dt;
                    let events = run.events().drain();
                    self.answer_spawns(run, &events)?;
                    report.events.extend(events);
                }
            }
            ScriptCommand::Lock => {
                if let Some(room) = run.current_room() {
                    run.set_tutorial_lock(room, true)?;
                }
            }
            ScriptCommand::Release => {
                if let Some(room) = run.current_room() {
                    run.release_tutorial_lock(room)?;
                }
            }
            ScriptCommand::Source { interval, count } => {
                if let Some(room) = run.current_room() {
                    let source = match count {
                        Some(count) => SpawnSource::limited(*interval, *count),
                        None => SpawnSource::endless(*interval),
                    };
                    run.add_spawn_source(room, source)?;
                }
            }
            ScriptCommand::Path { target } => {
                let goal = resolve(run, *target)?;
                report.path = Some(run.find_path(run.player_position(), goal));
            }
        }
        report.events.extend(run.events().drain());
        Ok(report)
    }

    fn answer_spawns(
        &mut self,
        run: &mut DungeonRun,
        events: &[DungeonEvent],
    ) -> Result<(), ScriptError> {
        for event in events {
            let DungeonEvent::SpawnRequested { room, .. } = event else {
                continue;
            };
            let Some(center) =
                run.with_level(|level| level.graph.room(*room).map(|node| node.bounds.center()))
            else {
                continue;
            };
            let entity = run.spawn_occupant(*room, center, true, true)?;
            self.spawned += 1;
            self.agents.insert(format!("spawn-{}", self.spawned), entity);
        }
        Ok(())
    }
}

fn resolve(run: &DungeonRun, target: Target) -> Result<WorldPoint, ScriptError> {
    match target {
        Target::World(point) => Ok(point),
        Target::Room(coord) => run
            .with_level(|level| {
                level
                    .graph
                    .room_at(coord)
                    .and_then(|id| level.graph.room(id))
                    .map(|room| room.bounds.center())
            })
            .ok_or(ScriptError::NoRoomAt {
                x: coord.x,
                y: coord.y,
            }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_every_command_and_skips_comments() {
        let source = "\
# warmup
move room 5 5
move 12.5 -3   # trailing comment
spawn ghoul 10 2
spawn bat room 6 5 passive

tick 2
tick 1.5 0.25
damage
miss 4.5
kill ghoul
lock
release
source 1.5
source 2 3
path room 4 5
";
        let mut script: ScriptedInput = source.parse().unwrap();
        assert_eq!(script.len(), 14);
        assert_eq!(
            script.next_command(),
            Some(&ScriptCommand::Move {
                target: Target::Room(Point::new(5, 5))
            })
        );
        assert_eq!(
            script.next_command(),
            Some(&ScriptCommand::Move {
                target: Target::World(WorldPoint::new(12.5, -3.0))
            })
        );
        script.next_command();
        assert_eq!(
            script.next_command(),
            Some(&ScriptCommand::Spawn {
                name: "bat".to_string(),
                target: Target::Room(Point::new(6, 5)),
                passive: true,
            })
        );
        assert_eq!(
            script.next_command(),
            Some(&ScriptCommand::Tick {
                seconds: 2.0,
                step: DEFAULT_TICK_STEP
            })
        );
        assert_eq!(
            script.next_command(),
            Some(&ScriptCommand::Tick {
                seconds: 1.5,
                step: 0.25
            })
        );
    }

    #[test]
    fn reports_line_numbers_for_bad_input() {
        let err = "move room 1 1\nteleport 3 4".parse::<ScriptedInput>().err().unwrap();
        assert!(matches!(err, ScriptError::UnknownCommand { line: 2, .. }));

        let err = "tick soon".parse::<ScriptedInput>().err().unwrap();
        assert!(matches!(err, ScriptError::BadArgument { line: 1, .. }));

        let err = "tick 1 0".parse::<ScriptedInput>().err().unwrap();
        assert!(matches!(err, ScriptError::BadArgument { line: 1, .. }));

        let err = "damage now".parse::<ScriptedInput>().err().unwrap();
        assert!(matches!(err, ScriptError::BadArgument { line: 1, .. }));

        let err = "spawn ghoul 1 2 angry".parse::<ScriptedInput>().err().unwrap();
        assert!(matches!(err, ScriptError::BadArgument { line: 1, .. }));

        let err = "tick inf".parse::<ScriptedInput>().err().unwrap();
        assert!(matches!(err, ScriptError::BadArgument { line: 1, .. }));

        let err = "source 0".parse::<ScriptedInput>().err().unwrap();
        assert!(matches!(err, ScriptError::BadArgument { line: 1, .. }));
    }
}
