use serde::{Deserialize, Serialize};

use crate::{HitKind, NoteId, NoteTimeline, TimingConfig};

/// Outcome of an input that landed inside a note's window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Judgement {
    pub note: NoteId,
    pub kind: HitKind,
    /// Signed `input_time - hit_time`; negative means early.
    pub offset: f64,
}

/// Matches hit inputs against the nearest pending note.
#[derive(Debug, Clone, Copy)]
pub struct JudgementEngine {
    perfect_window: f64,
    good_window: f64,
}

impl JudgementEngine {
    pub fn new(perfect_window: f64, good_window: f64) -> Self {
        Self {
            perfect_window,
            good_window,
        }
    }

    pub fn from_timing(timing: &TimingConfig) -> Self {
        Self::new(timing.perfect_window, timing.good_window)
    }

    /// Quality of a hit `distance` seconds away from the note, or `None` when
    /// it falls outside the good window.
    pub fn classify(&self, distance: f64) -> Option<HitKind> {
        if distance <= self.perfect_window {
            Some(HitKind::Perfect)
        } else if distance <= self.good_window {
            Some(HitKind::Good)
        } else {
            None
        }
    }

    /// Pending note closest to `input_time` and its signed offset. On a tie the
    /// earlier note wins.
    pub fn nearest(&self, timeline: &NoteTimeline, input_time: f64) -> Option<(NoteId, f64)> {
        let mut best: Option<(NoteId, f64)> = None;
        for note in timeline.active_notes() {
            if !note.state.is_pending() {
                continue;
            }
            let offset = input_time - note.hit_time;
            match best {
                // Distance to the input is unimodal over ascending hit times.
                Some((_, current)) if offset.abs() >= current.abs() => break,
                _ => best = Some((note.id, offset)),
            }
        }
        best
    }

    /// Judges one input. When it lands inside a window the note is marked hit
    /// and removed from the active set; otherwise nothing changes.
    pub fn judge(&self, timeline: &mut NoteTimeline, input_time: f64) -> Option<Judgement> {
        let (note, offset) = self.nearest(timeline, input_time)?;
        let kind = self.classify(offset.abs())?;

        if !timeline.mark_hit(note, kind) {
            return None;
        }
        timeline.remove_judged(note);

        Some(Judgement { note, kind, offset })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Beat, NoteState};

    fn timeline(beats: &[f64]) -> NoteTimeline {
        let beats: Vec<Beat> = beats.iter().copied().map(Beat).collect();
        NoteTimeline::new(&beats, &TimingConfig::default())
    }

    fn engine() -> JudgementEngine {
        JudgementEngine::from_timing(&TimingConfig::default())
    }

    #[test]
    fn classifies_by_absolute_offset() {
        let engine = engine();
        assert_eq!(engine.classify(0.0), Some(HitKind::Perfect));
        assert_eq!(engine.classify(0.05), Some(HitKind::Perfect));
        assert_eq!(engine.classify(0.1), Some(HitKind::Good));
        assert_eq!(engine.classify(0.2), None);
    }

    #[test]
    fn window_edges_are_inclusive() {
        let engine = engine();
        assert_eq!(engine.classify(0.07), Some(HitKind::Perfect));
        assert_eq!(engine.classify(0.15), Some(HitKind::Good));
        assert_eq!(engine.classify(0.1500001), None);
    }

    #[test]
    fn judges_the_worked_example() {
        let mut timeline = timeline(&[1.0, 2.0, 3.0]);
        let engine = engine();

        let first = engine.judge(&mut timeline, 1.02).unwrap();
        assert_eq!(first.note, NoteId(0));
        assert_eq!(first.kind, HitKind::Perfect);

        assert!(engine.judge(&mut timeline, 2.20).is_none());
        assert_eq!(timeline.get(NoteId(1)).unwrap().state, NoteState::Pending);

        // |2.98 - 3.0| = 0.02 is inside the perfect window.
        let third = engine.judge(&mut timeline, 2.98).unwrap();
        assert_eq!(third.note, NoteId(2));
        assert_eq!(third.kind, HitKind::Perfect);
        assert!(third.offset < 0.0);

        let active: Vec<NoteId> = timeline.active_notes().map(|n| n.id).collect();
        assert_eq!(active, vec![NoteId(1)]);
    }

    #[test]
    fn ties_go_to_the_earlier_note() {
        let timeline = timeline(&[1.0, 1.5]);
        let (note, _) = engine().nearest(&timeline, 1.25).unwrap();
        assert_eq!(note, NoteId(0));
    }

    #[test]
    fn skips_resolved_notes_when_searching() {
        let mut timeline = timeline(&[1.0, 1.1]);
        let engine = engine();

        assert_eq!(engine.judge(&mut timeline, 1.0).unwrap().note, NoteId(0));
        let second = engine.judge(&mut timeline, 1.0).unwrap();
        assert_eq!(second.note, NoteId(1));
        assert_eq!(second.kind, HitKind::Good);
    }

    #[test]
    fn missed_notes_cannot_be_hit() {
        let mut timeline = timeline(&[1.0]);
        timeline.tick_misses(2.0);
        assert!(engine().judge(&mut timeline, 1.0).is_none());
    }

    #[test]
    fn empty_timeline_is_a_no_op() {
        let mut timeline = timeline(&[]);
        assert!(engine().judge(&mut timeline, 1.0).is_none());
    }
}
