use serde::{Deserialize, Serialize};

use crate::HitKind;

const PERFECT_POINTS: u64 = 300;
const GOOD_POINTS: u64 = 150;

/// Accuracy weight of each judgement, out of 100.
const PERFECT_WEIGHT: u64 = 100;
const GOOD_WEIGHT: u64 = 70;

/// Anything the score can be told about a note.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JudgementKind {
    Perfect,
    Good,
    Missed,
}

impl From<HitKind> for JudgementKind {
    fn from(kind: HitKind) -> Self {
        match kind {
            HitKind::Perfect => JudgementKind::Perfect,
            HitKind::Good => JudgementKind::Good,
        }
    }
}

/// Snapshot of the running score.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreState {
    pub score: u64,
    pub combo: u32,
    pub max_combo: u32,
    pub perfect_count: u32,
    pub good_count: u32,
    pub miss_count: u32,
}

impl ScoreState {
    pub fn judged_total(&self) -> u32 {
        self.perfect_count + self.good_count + self.miss_count
    }

    /// Weighted hit percentage rounded to one decimal; 100 before anything has
    /// been judged.
    pub fn accuracy(&self) -> f64 {
        let total = u64::from(self.judged_total());
        if total == 0 {
            return 100.0;
        }
        let earned = u64::from(self.perfect_count) * PERFECT_WEIGHT
            + u64::from(self.good_count) * GOOD_WEIGHT;
        let percent = earned as f64 / (total * PERFECT_WEIGHT) as f64 * 100.0;
        (percent * 10.0).round() / 10.0
    }
}

#[derive(Debug, Default, Clone)]
pub struct ScoreTracker {
    state: ScoreState,
}

impl ScoreTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_judgement(&mut self, kind: JudgementKind) {
        let state = &mut self.state;
        match kind {
            JudgementKind::Perfect => {
                state.score += PERFECT_POINTS;
                state.perfect_count += 1;
                state.combo += 1;
            }
            JudgementKind::Good => {
                state.score += GOOD_POINTS;
                state.good_count += 1;
                state.combo += 1;
            }
            JudgementKind::Missed => {
                state.miss_count += 1;
                state.combo = 0;
            }
        }
        state.max_combo = state.max_combo.max(state.combo);
    }

    pub fn accuracy(&self) -> f64 {
        self.state.accuracy()
    }

    pub fn state(&self) -> ScoreState {
        self.state
    }

    pub fn reset(&mut self) {
        self.state = ScoreState::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tracker_with(kinds: &[JudgementKind]) -> ScoreTracker {
        let mut tracker = ScoreTracker::new();
        for kind in kinds {
            tracker.on_judgement(*kind);
        }
        tracker
    }

    #[test]
    fn accumulates_points_and_combo() {
        use JudgementKind::*;
        let tracker = tracker_with(&[Perfect, Good, Perfect, Missed, Good]);
        let state = tracker.state();

        assert_eq!(state.score, 300 + 150 + 300 + 150);
        assert_eq!(state.combo, 1);
        assert_eq!(state.max_combo, 3);
        assert_eq!(
            (state.perfect_count, state.good_count, state.miss_count),
            (2, 2, 1)
        );
    }

    #[test]
    fn accuracy_weights_goods_at_seventy_percent() {
        use JudgementKind::*;
        assert_eq!(tracker_with(&[Perfect, Good]).accuracy(), 85.0);
        assert_eq!(tracker_with(&[Perfect, Missed]).accuracy(), 50.0);
        // 170 / 300 = 56.666...
        assert_eq!(tracker_with(&[Perfect, Good, Missed]).accuracy(), 56.7);
        assert_eq!(tracker_with(&[Missed, Missed]).accuracy(), 0.0);
    }

    #[test]
    fn empty_tracker_reports_full_accuracy() {
        assert_eq!(ScoreTracker::new().accuracy(), 100.0);
    }

    #[test]
    fn reset_clears_everything() {
        let mut tracker = tracker_with(&[JudgementKind::Perfect, JudgementKind::Missed]);
        tracker.reset();

        assert_eq!(tracker.state(), ScoreState::default());
        assert_eq!(tracker.state().score, 0);
        assert_eq!(tracker.accuracy(), 100.0);
    }
}
