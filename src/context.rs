use bracket_random::prelude::RandomNumberGenerator;

use crate::{
    config::{ConfigError, DungeonConfig},
    events::EventBus,
    map::LevelGraphGenerator,
    nav::{NavigationGrid, PathPlanner},
    pressure::PressureGate,
};

/// Everything a level needs that would otherwise be a global: validated
/// config, the seeded RNG and the event bus.
pub struct SimContext {
    pub config: DungeonConfig,
    pub rng: RandomNumberGenerator,
    pub events: EventBus,
    seed: u64,
}

impl SimContext {
    pub fn new(config: DungeonConfig, seed: u64) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            rng: RandomNumberGenerator::seeded(seed),
            events: EventBus::new(),
            seed,
        })
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn generator(&self) -> LevelGraphGenerator {
        LevelGraphGenerator::new(self.config.generation.clone())
    }

    pub fn planner(&self) -> PathPlanner {
        PathPlanner::new(self.config.search.clone())
    }

    pub fn pressure_gate(&self) -> PressureGate {
        PressureGate::new(self.config.pressure.clone())
    }

    pub fn navigation_grid(&self) -> NavigationGrid {
        NavigationGrid::new(self.config.grid.clone())
    }
}
