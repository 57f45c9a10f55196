use serde::{Deserialize, Serialize};

use crate::{DetectionConfig, FallbackConfig, Result, SampleBuffer};

/// Onset timestamp in seconds from the start of the track.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Beat(pub f64);

impl Beat {
    pub fn seconds(self) -> f64 {
        self.0
    }
}

/// Metadata describing how a track's beats were obtained.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisSummary {
    pub sample_rate: u32,
    pub duration_seconds: f64,
    pub beat_count: usize,
    pub tempo_bpm: Option<f64>,
    /// True when detection found nothing and the fixed grid was used instead.
    pub used_fallback: bool,
}

/// Beats plus summary, the unit written by the `analyze` command.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BeatMap {
    pub summary: AnalysisSummary,
    pub beats: Vec<Beat>,
}

impl BeatMap {
    /// Detects beats in `buffer`, substituting the fallback grid when the
    /// detector comes back empty.
    pub fn analyse(
        buffer: &SampleBuffer,
        detector: &OnsetDetector,
        fallback: &FallbackConfig,
    ) -> Self {
        let mut beats = detector.detect(buffer.samples(), buffer.sample_rate());
        let used_fallback = beats.is_empty();
        if used_fallback {
            tracing::warn!(
                duration = buffer.duration(),
                "no onsets detected, using fallback beat grid"
            );
            beats = fallback_beats(fallback, buffer.duration(), detector.config().max_beats);
        }

        let summary = AnalysisSummary {
            sample_rate: buffer.sample_rate(),
            duration_seconds: buffer.duration(),
            beat_count: beats.len(),
            tempo_bpm: estimate_tempo(&beats),
            used_fallback,
        };
        Self { summary, beats }
    }
}

/// Causal RMS-rise onset detector.
///
/// Each window of `window_size` samples, taken every `hop_size` samples, is
/// flagged when its RMS clears the noise floor and rises by `rise_ratio` over
/// the window before it. Flagged onsets are then debounced greedily (the first
/// of a cluster wins) and capped at `max_beats`.
#[derive(Debug, Clone)]
pub struct OnsetDetector {
    config: DetectionConfig,
}

impl OnsetDetector {
    pub fn new(config: DetectionConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &DetectionConfig {
        &self.config
    }

    pub fn detect(&self, samples: &[f32], sample_rate: u32) -> Vec<Beat> {
        let DetectionConfig {
            window_size,
            hop_size,
            noise_floor,
            rise_ratio,
            min_distance,
            max_beats,
        } = self.config;

        if sample_rate == 0 || samples.len() < window_size {
            return Vec::new();
        }

        let rate = sample_rate as f64;
        let mut beats: Vec<Beat> = Vec::new();
        let mut previous_rms = 0.0_f32;
        let mut start = 0;

        while start + window_size <= samples.len() && beats.len() < max_beats {
            let rms = compute_rms(&samples[start..start + window_size]);
            if rms > noise_floor && rms > previous_rms * rise_ratio {
                let time = start as f64 / rate;
                let clear = beats
                    .last()
                    .map(|last| time - last.0 > min_distance)
                    .unwrap_or(true);
                if clear {
                    beats.push(Beat(time));
                }
            }
            previous_rms = rms;
            start += hop_size;
        }

        tracing::debug!(
            beats = beats.len(),
            windows = (samples.len() - window_size) / hop_size + 1,
            "onset detection finished"
        );
        beats
    }
}

/// Fixed beat grid `offset + k * interval`, kept strictly inside the track.
pub fn fallback_beats(config: &FallbackConfig, duration: f64, max_beats: usize) -> Vec<Beat> {
    if !duration.is_finite() || config.interval <= 0.0 {
        return Vec::new();
    }

    (0..max_beats)
        .map(|index| config.offset + index as f64 * config.interval)
        .take_while(|time| *time < duration)
        .map(Beat)
        .collect()
}

/// Mean inter-beat interval expressed in beats per minute.
pub fn estimate_tempo(beats: &[Beat]) -> Option<f64> {
    let mut sum = 0.0;
    let mut count = 0;
    for window in beats.windows(2) {
        let interval = window[1].0 - window[0].0;
        if interval > f64::EPSILON {
            sum += interval;
            count += 1;
        }
    }

    if count == 0 {
        return None;
    }
    let average_interval = sum / count as f64;
    (average_interval > 0.0).then(|| 60.0 / average_interval)
}

fn compute_rms(samples: &[f32]) -> f32 {
    let sum: f32 = samples.iter().map(|sample| sample * sample).sum();
    (sum / samples.len() as f32).sqrt()
}
