use std::{fs, path::Path};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{map::MAX_LATTICE_SLOTS, nav::collision::LayerMask};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid {section} config: {reason}")]
    Invalid {
        section: &'static str,
        reason: String,
    },
}

fn invalid(section: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        section,
        reason: reason.into(),
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DungeonConfig {
    pub generation: GenerationConfig,
    pub geometry: RoomGeometry,
    pub grid: GridConfig,
    pub pressure: PressureConfig,
    pub idle: IdleConfig,
    pub search: SearchLimits,
}

impl DungeonConfig {
    pub fn from_json_str(source: &str) -> Result<Self, ConfigError> {
        let config: DungeonConfig = serde_json::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let source = fs::read_to_string(path)?;
        Self::from_json_str(&source)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.generation.validate()?;
        self.geometry.validate()?;
        self.grid.validate()?;
        self.pressure.validate()?;
        self.idle.validate()?;
        self.search.validate()
    }
}

/// Lattice dimensions, start cell and room-count range for level generation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    pub lattice_width: i32,
    pub lattice_height: i32,
    pub start_x: i32,
    pub start_y: i32,
    pub generic_min: u32,
    pub generic_max: u32,
    /// Number of distinct generic room prefabs available.
    pub prefab_pool: u32,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            lattice_width: 10,
            lattice_height: 10,
            start_x: 5,
            start_y: 5,
            generic_min: 4,
            generic_max: 8,
            prefab_pool: 12,
        }
    }
}

impl GenerationConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.lattice_width <= 0 || self.lattice_height <= 0 {
            return Err(invalid("generation", "lattice dimensions must be positive"));
        }
        if self
            .lattice_width
            .checked_mul(self.lattice_height)
            .is_none_or(|slots| slots > MAX_LATTICE_SLOTS)
        {
            return Err(invalid(
                "generation",
                format!("lattice may hold at most {MAX_LATTICE_SLOTS} slots"),
            ));
        }
        if self.start_x < 0
            || self.start_x >= self.lattice_width
            || self.start_y < 0
            || self.start_y >= self.lattice_height
        {
            return Err(invalid(
                "generation",
                format!("start ({}, {}) lies outside the lattice", self.start_x, self.start_y),
            ));
        }
        if self.generic_min > self.generic_max {
            return Err(invalid(
                "generation",
                format!(
                    "generic room range {}..={} is inverted",
                    self.generic_min, self.generic_max
                ),
            ));
        }
        Ok(())
    }
}

/// World-space footprint of one lattice room.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoomGeometry {
    pub room_width: f32,
    pub room_height: f32,
    pub wall_thickness: f32,
    pub door_width: f32,
}

impl Default for RoomGeometry {
    fn default() -> Self {
        Self {
            room_width: 16.0,
            room_height: 10.0,
            wall_thickness: 0.5,
            door_width: 2.0,
        }
    }
}

impl RoomGeometry {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.room_width <= 0.0 || self.room_height <= 0.0 {
            return Err(invalid("geometry", "room size must be positive"));
        }
        if self.wall_thickness <= 0.0 {
            return Err(invalid("geometry", "wall thickness must be positive"));
        }
        let shortest = self.room_width.min(self.room_height);
        if self.door_width <= 0.0 || self.door_width >= shortest - 2.0 * self.wall_thickness {
            return Err(invalid(
                "geometry",
                format!("door width {} does not fit inside a room wall", self.door_width),
            ));
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridConfig {
    pub cell_diameter: f32,
    /// Extra radius added to the half-cell sampling disc.
    pub overlap_buffer: f32,
    pub unwalkable_mask: LayerMask,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            cell_diameter: 0.5,
            overlap_buffer: 0.05,
            unwalkable_mask: LayerMask::UNWALKABLE,
        }
    }
}

impl GridConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cell_diameter <= 0.0 {
            return Err(invalid("grid", "cell diameter must be positive"));
        }
        if self.overlap_buffer < 0.0 {
            return Err(invalid("grid", "overlap buffer cannot be negative"));
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PressureConfig {
    pub initial_pressure: f32,
    /// Pressure gained per second while the gate is active.
    pub passive_rate: f32,
    pub idle_multiplier: f32,
    pub kill_reduction: f32,
    pub damage_increase: f32,
    pub low_threshold: f32,
    pub mid_threshold: f32,
    pub high_threshold: f32,
    pub stabilization_time: f32,
    pub minimum_survival_time: f32,
    /// Spawn-rate multipliers for the Low, Mid and High levels.
    pub spawn_rate_multipliers: [f32; 3],
}

impl Default for PressureConfig {
    fn default() -> Self {
        Self {
            initial_pressure: 30.0,
            passive_rate: 2.0,
            idle_multiplier: 1.5,
            kill_reduction: 8.0,
            damage_increase: 5.0,
            low_threshold: 25.0,
            mid_threshold: 60.0,
            high_threshold: 85.0,
            stabilization_time: 8.0,
            minimum_survival_time: 20.0,
            spawn_rate_multipliers: [0.75, 1.0, 1.5],
        }
    }
}

impl PressureConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let in_range = |v: f32| (0.0..=100.0).contains(&v);
        if !(in_range(self.low_threshold)
            && in_range(self.mid_threshold)
            && in_range(self.high_threshold))
        {
            return Err(invalid("pressure", "thresholds must lie in [0, 100]"));
        }
        if !(self.low_threshold <= self.mid_threshold && self.mid_threshold <= self.high_threshold)
        {
            return Err(invalid("pressure", "thresholds must satisfy low <= mid <= high"));
        }
        if !in_range(self.initial_pressure) {
            return Err(invalid("pressure", "initial pressure must lie in [0, 100]"));
        }
        if self.passive_rate < 0.0 || self.idle_multiplier < 0.0 {
            return Err(invalid("pressure", "rates cannot be negative"));
        }
        if self.stabilization_time < 0.0 || self.minimum_survival_time < 0.0 {
            return Err(invalid("pressure", "durations cannot be negative"));
        }
        if self.spawn_rate_multipliers.iter().any(|m| *m <= 0.0) {
            return Err(invalid("pressure", "spawn multipliers must be positive"));
        }
        Ok(())
    }
}

/// How long the player must stay below `min_speed` before counting as idle.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IdleConfig {
    pub grace_seconds: f32,
    pub min_speed: f32,
}

impl Default for IdleConfig {
    fn default() -> Self {
        Self {
            grace_seconds: 1.5,
            min_speed: 0.25,
        }
    }
}

impl IdleConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.grace_seconds < 0.0 || self.min_speed < 0.0 {
            return Err(invalid("idle", "idle thresholds cannot be negative"));
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchLimits {
    pub max_expansions: usize,
    pub max_retrace: usize,
    pub goal_fallback_expansions: usize,
}

impl Default for SearchLimits {
    fn default() -> Self {
        Self {
            max_expansions: 10_000,
            max_retrace: 5_000,
            goal_fallback_expansions: 100,
        }
    }
}

impl SearchLimits {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_expansions == 0 || self.max_retrace == 0 {
            return Err(invalid("search", "search caps must be non-zero"));
        }
        Ok(())
    }
}
