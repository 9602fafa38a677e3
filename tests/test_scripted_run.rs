//! End-to-end runs: level assembly → DungeonRun → command scripts.
//!
//! The two-room fixture puts Start at lattice (0,0) and one generic room
//! at (1,0), centered at world (16,0).

use bracket_geometry::prelude::Point;
use bracket_random::prelude::RandomNumberGenerator;

use cryptweave::{
    config::{DungeonConfig, GenerationConfig},
    context::SimContext,
    ecs::DungeonRun,
    events::DungeonEvent,
    level::Level,
    map::{Archetype, Direction, LevelGraphGenerator, RoomId},
    nav::{NoPathReason, PathResult},
    rooms::RoomState,
    scripted_input::{ScriptCommand, ScriptError, ScriptRunner, ScriptedInput, StepReport},
};

// ── Helpers ────────────────────────────────────────────────────────────

fn two_room_config() -> DungeonConfig {
    DungeonConfig {
        generation: GenerationConfig {
            lattice_width: 2,
            lattice_height: 1,
            start_x: 0,
            start_y: 0,
            ..GenerationConfig::default()
        },
        ..DungeonConfig::default()
    }
}

fn two_room_run() -> (DungeonRun, RoomId) {
    let config = two_room_config();
    let mut rng = RandomNumberGenerator::seeded(1);
    let layout = LevelGraphGenerator::new(config.generation.clone())
        .place_deck(&[Archetype::Generic], &mut rng)
        .unwrap();
    let level = Level::from_layout(layout, &config).unwrap();
    let east = level.graph.room_at(Point::new(1, 0)).unwrap();
    (DungeonRun::new(SimContext::new(config, 1).unwrap(), level), east)
}

fn play(run: &mut DungeonRun, runner: &mut ScriptRunner, source: &str) -> Vec<StepReport> {
    let mut script: ScriptedInput = source.parse().unwrap();
    runner.run_all(run, &mut script).unwrap()
}

fn all_events(reports: &[StepReport]) -> Vec<DungeonEvent> {
    reports.iter().flat_map(|r| r.events.iter().cloned()).collect()
}

// ── Scenarios ──────────────────────────────────────────────────────────

#[test]
fn locked_room_blocks_paths_until_cleared() {
    let (mut run, east) = two_room_run();
    let mut runner = ScriptRunner::new();
    let reports = play(
        &mut run,
        &mut runner,
        "\
spawn ghoul 20 2
spawn bat 12 -2 passive
move room 1 0
tick 1
path room 0 0
damage
miss 3
kill ghoul
path room 0 0
",
    );

    let events = all_events(&reports);
    assert!(events.contains(&DungeonEvent::RoomLocked { room: east }));
    assert!(events.contains(&DungeonEvent::DoorChanged {
        room: east,
        direction: Direction::West,
        locked: true,
    }));
    assert!(events.contains(&DungeonEvent::RoomCleared { room: east }));

    assert_eq!(
        reports[4].path,
        Some(PathResult::NoPath(NoPathReason::Unreachable))
    );
    assert!(reports[8].path.as_ref().is_some_and(PathResult::is_found));
    assert_eq!(run.room_state(east), Ok(RoomState::Cleared));
    // The passive bystander never held the room.
    assert!(runner.agent("bat").is_some());
}

#[test]
fn spawn_requests_are_answered_and_must_be_cleared() {
    let (mut run, east) = two_room_run();
    let mut runner = ScriptRunner::new();
    play(
        &mut run,
        &mut runner,
        "\
spawn ghoul 20 2
move room 1 0
source 0.5 2
tick 2
kill ghoul
",
    );
    assert!(runner.agent("spawn-1").is_some());
    assert!(runner.agent("spawn-2").is_some());
    assert!(runner.agent("spawn-3").is_none());
    assert_eq!(run.room_state(east), Ok(RoomState::Locked));

    play(&mut run, &mut runner, "kill spawn-1\nkill spawn-2\n");
    assert_eq!(run.room_state(east), Ok(RoomState::Cleared));
}

#[test]
fn tutorial_lock_holds_a_cleared_room_shut() {
    let (mut run, east) = two_room_run();
    let mut runner = ScriptRunner::new();
    let reports = play(
        &mut run,
        &mut runner,
        "\
move room 1 0
lock
path room 0 0
release
path room 0 0
",
    );
    assert_eq!(run.room_state(east), Ok(RoomState::Cleared));
    assert!(!reports[2].path.as_ref().is_some_and(PathResult::is_found));
    assert!(reports[3]
        .events
        .contains(&DungeonEvent::TutorialReleased { room: east }));
    assert!(reports[4].path.as_ref().is_some_and(PathResult::is_found));
}

#[test]
fn script_errors_surface_without_panicking() {
    let (mut run, _) = two_room_run();
    let mut runner = ScriptRunner::new();

    let mut script: ScriptedInput = "kill nobody".parse().unwrap();
    assert!(runner.run_all(&mut run, &mut script).is_err());

    let mut script: ScriptedInput = "spawn ghoul 500 500".parse().unwrap();
    assert!(runner.run_all(&mut run, &mut script).is_err());

    let mut script: ScriptedInput = "move room 7 7".parse().unwrap();
    assert!(runner.run_all(&mut run, &mut script).is_err());

    let mut script: ScriptedInput = "spawn a 20 2\nspawn a 21 2".parse().unwrap();
    assert!(runner.run_all(&mut run, &mut script).is_err());
}

#[test]
fn hand_built_ticks_that_cannot_finish_are_rejected() {
    let (mut run, _) = two_room_run();
    let mut runner = ScriptRunner::new();

    for (seconds, step) in [(1.0, 0.0), (1.0, -0.1), (f32::INFINITY, 0.1), (-1.0, 0.1)] {
        let err = runner
            .execute(&mut run, &ScriptCommand::Tick { seconds, step })
            .unwrap_err();
        assert!(matches!(err, ScriptError::InvalidTick { .. }), "{seconds} by {step}");
    }
    assert_eq!(run.steps, 0);

    let report = runner
        .execute(&mut run, &ScriptCommand::Tick { seconds: 0.0, step: 0.1 })
        .unwrap();
    assert!(report.events.is_empty());
}

#[test]
fn tiny_spawn_interval_finishes_the_tick() {
    let (mut run, east) = two_room_run();
    let mut runner = ScriptRunner::new();
    play(
        &mut run,
        &mut runner,
        "\
spawn ghoul 20 2
move room 1 0
source 0.000000001 5
tick 0.2
",
    );
    assert!(runner.agent("spawn-5").is_some());
    assert!(runner.agent("spawn-6").is_none());
    assert_eq!(run.room_state(east), Ok(RoomState::Locked));
}

#[test]
fn default_level_assembles_and_runs_for_many_seeds() {
    for seed in 0..16 {
        let ctx = SimContext::new(DungeonConfig::default(), seed).unwrap();
        let mut run = DungeonRun::start(ctx).unwrap();
        let start = run.with_level(|level| level.graph.room_at(level.layout.start));
        run.advance(0.1);
        assert_eq!(run.current_room(), start, "seed {seed}");
        run.with_level(|level| {
            assert!(level.grid.is_built());
            for room in level.graph.rooms() {
                let cell = level.grid.cell_from_world(room.bounds.center()).unwrap();
                assert!(level.grid.is_walkable(cell), "seed {seed}: room {:?}", room.id);
            }
        });
    }
}

#[test]
fn config_json_overrides_only_named_fields() {
    let config = DungeonConfig::from_json_str(
        r#"{ "generation": { "lattice_width": 6, "lattice_height": 6, "start_x": 2, "start_y": 3 },
             "pressure": { "passive_rate": 4.0 } }"#,
    )
    .unwrap();
    assert_eq!(config.generation.lattice_width, 6);
    assert_eq!(config.generation.start_y, 3);
    assert_eq!(config.generation.generic_max, GenerationConfig::default().generic_max);
    assert_eq!(config.pressure.passive_rate, 4.0);

    let mut run = DungeonRun::start(SimContext::new(config, 9).unwrap()).unwrap();
    run.advance(0.1);
    assert!(run.current_room().is_some());
}
