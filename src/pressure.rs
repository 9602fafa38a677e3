//! Per-room escalation resource.
//!
//! A gate accumulates pressure while its room is locked. Holding pressure at
//! or below the low threshold long enough, after surviving a minimum time,
//! stabilizes the room as an alternative to killing every occupant.

use log::debug;
use serde::{Deserialize, Serialize};

use crate::config::PressureConfig;

pub const PRESSURE_MIN: f32 = 0.0;
pub const PRESSURE_MAX: f32 = 100.0;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PressureLevel {
    Low,
    Mid,
    High,
}

impl PressureLevel {
    pub fn index(self) -> usize {
        match self {
            PressureLevel::Low => 0,
            PressureLevel::Mid => 1,
            PressureLevel::High => 2,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PressureLevel::Low => "low",
            PressureLevel::Mid => "mid",
            PressureLevel::High => "high",
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub enum PressureSignal {
    LevelChanged {
        from: PressureLevel,
        to: PressureLevel,
        pressure: f32,
    },
    Stabilized,
}

#[derive(Clone, Debug)]
pub struct PressureGate {
    config: PressureConfig,
    pressure: f32,
    active_time: f32,
    low_dwell: f32,
    level: PressureLevel,
    active: bool,
    stabilized: bool,
}

impl PressureGate {
    pub fn new(config: PressureConfig) -> Self {
        let pressure = config.initial_pressure.clamp(PRESSURE_MIN, PRESSURE_MAX);
        let level = level_for(&config, pressure);
        Self {
            config,
            pressure,
            active_time: 0.0,
            low_dwell: 0.0,
            level,
            active: false,
            stabilized: false,
        }
    }

    pub fn activate(&mut self) {
        if !self.stabilized {
            self.active = true;
        }
    }

    pub fn deactivate(&mut self) {
        self.active = false;
    }

    pub fn is_running(&self) -> bool {
        self.active && !self.stabilized
    }

    pub fn pressure(&self) -> f32 {
        self.pressure
    }

    pub fn level(&self) -> PressureLevel {
        self.level
    }

    pub fn active_time(&self) -> f32 {
        self.active_time
    }

    pub fn low_dwell(&self) -> f32 {
        self.low_dwell
    }

    pub fn is_stabilized(&self) -> bool {
        self.stabilized
    }

    pub fn spawn_rate_multiplier(&self) -> f32 {
        self.config.spawn_rate_multipliers[self.level.index()]
    }

    /// Advances one tick. Signals are returned in the order they fired.
    pub fn update(&mut self, dt: f32, idle: bool) -> Vec<PressureSignal> {
        let mut signals = Vec::new();
        if !self.is_running() || dt <= 0.0 {
            return signals;
        }

        self.active_time += dt;
        let multiplier = if idle { self.config.idle_multiplier } else { 1.0 };
        let delta = self.config.passive_rate * dt * multiplier;
        signals.extend(self.set_pressure(self.pressure + delta));

        if self.pressure <= self.config.low_threshold {
            self.low_dwell += dt;
        }

        if self.low_dwell >= self.config.stabilization_time
            && self.active_time >= self.config.minimum_survival_time
        {
            self.stabilized = true;
            self.active = false;
            debug!(
                "pressure gate stabilized after {:.1}s ({:.1}s low)",
                self.active_time, self.low_dwell
            );
            signals.push(PressureSignal::Stabilized);
        }
        signals
    }

    pub fn on_occupant_removed(&mut self) -> Option<PressureSignal> {
        self.adjust(-self.config.kill_reduction)
    }

    pub fn on_agent_damaged(&mut self) -> Option<PressureSignal> {
        self.adjust(self.config.damage_increase)
    }

    pub fn on_missed(&mut self, amount: f32) -> Option<PressureSignal> {
        self.adjust(amount)
    }

    fn adjust(&mut self, delta: f32) -> Option<PressureSignal> {
        if !self.is_running() {
            return None;
        }
        self.set_pressure(self.pressure + delta)
    }

    fn set_pressure(&mut self, value: f32) -> Option<PressureSignal> {
        self.pressure = value.clamp(PRESSURE_MIN, PRESSURE_MAX);
        let next = level_for(&self.config, self.pressure);
        if next == self.level {
            return None;
        }
        let from = self.level;
        self.level = next;
        Some(PressureSignal::LevelChanged {
            from,
            to: next,
            pressure: self.pressure,
        })
    }
}

fn level_for(config: &PressureConfig, pressure: f32) -> PressureLevel {
    if pressure >= config.high_threshold {
        PressureLevel::High
    } else if pressure >= config.mid_threshold {
        PressureLevel::Mid
    } else {
        PressureLevel::Low
    }
}
