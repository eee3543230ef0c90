//! Tunable parameters for a simulation run
//!
//! Every section defaults to the stock junction timings, so an empty TOML
//! document (or `SimConfig::default()`) is a valid configuration.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

use super::error::SimError;
use super::types::{
    Approach, LaneId, LaneRole, ALL_RED_DURATION, HIGH_THRESHOLD, INTERSECTION_MARGIN,
    LOW_THRESHOLD, MAX_GREEN_DURATION, MAX_WAIT_TIME, MIN_DISTANCE, MIN_GREEN_DURATION,
    MOVING_SEPARATION_FACTOR, PER_VEHICLE_TIME,
};

pub trait Validate {
    fn validate(&self) -> Result<()>;
}

fn invalid(message: impl Into<String>) -> anyhow::Error {
    SimError::InvalidConfig(message.into()).into()
}

/// Full configuration, one table per concern
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct SimConfig {
    pub signal: SignalConfig,
    pub scheduler: SchedulerConfig,
    pub motion: MotionConfig,
    pub generator: GeneratorConfig,
}

/// Traffic light timing and priority-lane hysteresis
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct SignalConfig {
    pub all_red_duration: f32,
    pub per_vehicle_time: f32,
    pub min_green: f32,
    pub max_green: f32,
    pub high_threshold: usize,
    pub low_threshold: usize,
    /// Lane watched for priority mode. `None` disables priority handling.
    pub priority_lane: Option<LaneId>,
}

impl Default for SignalConfig {
    fn default() -> Self {
        Self {
            all_red_duration: ALL_RED_DURATION,
            per_vehicle_time: PER_VEHICLE_TIME,
            min_green: MIN_GREEN_DURATION,
            max_green: MAX_GREEN_DURATION,
            high_threshold: HIGH_THRESHOLD,
            low_threshold: LOW_THRESHOLD,
            priority_lane: Some(LaneId::new(Approach::North, LaneRole::Controlled)),
        }
    }
}

/// Admission policy and bookkeeping limits
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub max_wait_time: f32,
    /// Simulated seconds between metrics snapshots
    pub metrics_interval: f32,
    /// Snapshots kept before the oldest is dropped
    pub metrics_history: usize,
    /// Bound of the spawn channel
    pub spawn_capacity: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_wait_time: MAX_WAIT_TIME,
            metrics_interval: 1.0,
            metrics_history: 1000,
            spawn_capacity: 256,
        }
    }
}

/// Vehicle speeds and separation rules. Distances in pixels, speeds in px/s.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct MotionConfig {
    pub cruise_speed: f32,
    /// Relative spread of per-vehicle cruise speed
    pub speed_jitter: f32,
    /// Fraction of cruise speed a vehicle leaves the stop line with
    pub launch_factor: f32,
    pub approach_factor: f32,
    pub crossing_factor: f32,
    /// Rate (1/s) at which speed relaxes towards its target
    pub speed_response: f32,
    pub min_distance: f32,
    pub intersection_margin: f32,
    pub moving_factor: f32,
    /// Speed multiplier after a rejected move inside the box
    pub box_decay: f32,
    /// Speed multiplier after a rejected move on the open road
    pub road_decay: f32,
    pub min_turn_duration: f32,
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            cruise_speed: 120.0,
            speed_jitter: 0.1,
            launch_factor: 0.5,
            approach_factor: 0.6,
            crossing_factor: 1.25,
            speed_response: 3.0,
            min_distance: MIN_DISTANCE,
            intersection_margin: INTERSECTION_MARGIN,
            moving_factor: MOVING_SEPARATION_FACTOR,
            box_decay: 0.5,
            road_decay: 0.8,
            min_turn_duration: 0.5,
        }
    }
}

/// Random traffic generation
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct GeneratorConfig {
    /// Vehicles per simulated second
    pub spawn_rate: f32,
    pub emergency_probability: f64,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            spawn_rate: 1.5,
            emergency_probability: 0.02,
        }
    }
}

impl SimConfig {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: SimConfig = toml::from_str(content).context("Failed to parse config")?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_toml_str(&content)
            .with_context(|| format!("Invalid config file {}", path.display()))
    }
}

impl Validate for SimConfig {
    fn validate(&self) -> Result<()> {
        self.signal.validate()?;
        self.scheduler.validate()?;
        self.motion.validate()?;
        self.generator.validate()?;
        Ok(())
    }
}

impl Validate for SignalConfig {
    fn validate(&self) -> Result<()> {
        if self.all_red_duration <= 0.0 || self.per_vehicle_time <= 0.0 {
            return Err(invalid("signal durations must be positive"));
        }
        if self.min_green <= 0.0 || self.min_green > self.max_green {
            return Err(invalid(format!(
                "green window [{}, {}] is empty",
                self.min_green, self.max_green
            )));
        }
        if self.low_threshold > self.high_threshold {
            return Err(invalid(format!(
                "low_threshold {} exceeds high_threshold {}",
                self.low_threshold, self.high_threshold
            )));
        }
        if let Some(lane) = self.priority_lane {
            if lane.is_free_turn() {
                return Err(invalid(format!("priority lane {} ignores the light", lane)));
            }
        }
        Ok(())
    }
}

impl Validate for SchedulerConfig {
    fn validate(&self) -> Result<()> {
        if self.max_wait_time <= 0.0 {
            return Err(invalid("max_wait_time must be positive"));
        }
        if self.metrics_interval <= 0.0 {
            return Err(invalid("metrics_interval must be positive"));
        }
        if self.metrics_history == 0 || self.spawn_capacity == 0 {
            return Err(invalid("metrics_history and spawn_capacity must be non-zero"));
        }
        Ok(())
    }
}

impl Validate for MotionConfig {
    fn validate(&self) -> Result<()> {
        if self.cruise_speed <= 0.0 || self.speed_response <= 0.0 {
            return Err(invalid("cruise_speed and speed_response must be positive"));
        }
        if !(0.0..1.0).contains(&self.speed_jitter) {
            return Err(invalid("speed_jitter must be in [0, 1)"));
        }
        for (name, factor) in [
            ("launch_factor", self.launch_factor),
            ("approach_factor", self.approach_factor),
            ("crossing_factor", self.crossing_factor),
        ] {
            if factor <= 0.0 {
                return Err(invalid(format!("{} must be positive", name)));
            }
        }
        if self.min_distance <= 0.0 || self.intersection_margin < self.min_distance {
            return Err(invalid(
                "intersection_margin must be at least min_distance, both positive",
            ));
        }
        if self.moving_factor < 1.0 {
            return Err(invalid("moving_factor must be at least 1"));
        }
        for (name, decay) in [("box_decay", self.box_decay), ("road_decay", self.road_decay)] {
            if decay <= 0.0 || decay >= 1.0 {
                return Err(invalid(format!("{} must be in (0, 1)", name)));
            }
        }
        if self.min_turn_duration <= 0.0 {
            return Err(invalid("min_turn_duration must be positive"));
        }
        Ok(())
    }
}

impl Validate for GeneratorConfig {
    fn validate(&self) -> Result<()> {
        if self.spawn_rate <= 0.0 {
            return Err(invalid("spawn_rate must be positive"));
        }
        if !(0.0..=1.0).contains(&self.emergency_probability) {
            return Err(invalid("emergency_probability must be in [0, 1]"));
        }
        Ok(())
    }
}
