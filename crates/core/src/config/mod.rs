use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{BeatlineError, Result};

/// Top-level configuration structure for the engine.
///
/// Every section falls back to its defaults when omitted, so a config file only
/// needs to list the values it wants to change.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub detection: DetectionConfig,
    pub timing: TimingConfig,
    pub fallback: FallbackConfig,
}

impl EngineConfig {
    /// Parses a JSON document and validates the result.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads and validates a JSON config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn validate(&self) -> Result<()> {
        self.detection.validate()?;
        self.timing.validate()?;
        self.fallback.validate()?;
        if self.fallback.interval < self.detection.min_distance {
            return Err(BeatlineError::config(format!(
                "fallback interval of {:.3}s is shorter than the minimum beat spacing of {:.3}s",
                self.fallback.interval, self.detection.min_distance
            )));
        }
        Ok(())
    }
}

/// Parameters of the energy onset detector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// Analysis window length in samples.
    pub window_size: usize,
    /// Distance between consecutive window starts in samples.
    pub hop_size: usize,
    /// Absolute RMS level a window must exceed to count as an onset.
    pub noise_floor: f32,
    /// Required ratio between a window's RMS and the previous window's RMS.
    pub rise_ratio: f32,
    /// Minimum spacing between two kept onsets, in seconds.
    pub min_distance: f64,
    /// Upper bound on the number of beats handed to the timeline.
    pub max_beats: usize,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            window_size: 1024,
            hop_size: 512,
            noise_floor: 0.015,
            rise_ratio: 1.4,
            min_distance: 0.18,
            max_beats: 80,
        }
    }
}

impl DetectionConfig {
    pub fn validate(&self) -> Result<()> {
        if self.window_size == 0 || self.hop_size == 0 {
            return Err(BeatlineError::config(
                "window_size and hop_size must be greater than zero",
            ));
        }
        if !self.noise_floor.is_finite() || self.noise_floor < 0.0 {
            return Err(BeatlineError::config(
                "noise_floor must be a finite, non-negative level",
            ));
        }
        if !self.rise_ratio.is_finite() || self.rise_ratio < 1.0 {
            return Err(BeatlineError::config("rise_ratio must be at least 1.0"));
        }
        if !self.min_distance.is_finite() || self.min_distance < 0.0 {
            return Err(BeatlineError::config(
                "min_distance must be a finite, non-negative duration",
            ));
        }
        if self.max_beats == 0 {
            return Err(BeatlineError::config("max_beats must be greater than zero"));
        }
        Ok(())
    }
}

/// Timing windows and scheduling constants used during play.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// Seconds a note needs to travel from spawn to the judgement line.
    pub travel_time: f64,
    pub perfect_window: f64,
    pub good_window: f64,
    /// How far past the judgement line, as a fraction of `travel_time`, a note
    /// may travel before it is counted as missed.
    pub miss_margin: f64,
    /// Extra seconds after the track ends before the run is closed.
    pub grace_period: f64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            travel_time: 2.0,
            perfect_window: 0.07,
            good_window: 0.15,
            miss_margin: 0.1,
            grace_period: 1.0,
        }
    }
}

impl TimingConfig {
    /// Seconds after `hit_time` at which a pending note becomes a miss.
    pub fn miss_tolerance(&self) -> f64 {
        self.miss_margin * self.travel_time
    }

    pub fn validate(&self) -> Result<()> {
        let values = [
            self.travel_time,
            self.perfect_window,
            self.good_window,
            self.miss_margin,
            self.grace_period,
        ];
        if values.iter().any(|value| !value.is_finite() || *value < 0.0) {
            return Err(BeatlineError::config(
                "timing values must be finite and non-negative",
            ));
        }
        if self.travel_time <= 0.0 {
            return Err(BeatlineError::config("travel_time must be positive"));
        }
        if self.perfect_window <= 0.0 || self.perfect_window > self.good_window {
            return Err(BeatlineError::config(
                "perfect_window must be positive and no wider than good_window",
            ));
        }
        if self.miss_tolerance() < self.good_window {
            return Err(BeatlineError::config(format!(
                "miss tolerance of {:.3}s is shorter than the good window of {:.3}s",
                self.miss_tolerance(),
                self.good_window
            )));
        }
        Ok(())
    }
}

/// Fixed beat grid used when detection finds no onsets at all.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FallbackConfig {
    /// Time of the first fallback beat.
    pub offset: f64,
    /// Spacing between fallback beats.
    pub interval: f64,
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            offset: 1.0,
            interval: 0.6,
        }
    }
}

impl FallbackConfig {
    pub fn validate(&self) -> Result<()> {
        if !self.offset.is_finite() || self.offset < 0.0 {
            return Err(BeatlineError::config(
                "fallback offset must be finite and non-negative",
            ));
        }
        if !self.interval.is_finite() || self.interval <= 0.0 {
            return Err(BeatlineError::config("fallback interval must be positive"));
        }
        Ok(())
    }
}
