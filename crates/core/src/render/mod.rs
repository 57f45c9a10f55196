use serde::{Deserialize, Serialize};

use crate::{HitKind, NoteId, ScoreState};

/// Lifecycle notifications for a single note.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum NoteEvent {
    Spawned,
    PositionUpdated(f64),
    Hit(HitKind),
    Missed,
    Removed,
}

/// Presentation collaborator driven by the game loop. Every method has an
/// empty default so backends only implement what they draw.
pub trait Renderer {
    fn note_event(&mut self, _note: NoteId, _event: NoteEvent) {}

    fn score_changed(&mut self, _state: &ScoreState) {}

    /// Track progress in `[0, 1]`.
    fn progress(&mut self, _fraction: f64) {}

    fn run_ended(&mut self, _state: &ScoreState) {}
}

/// Renderer that discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullRenderer;

impl Renderer for NullRenderer {}

/// Everything an [`EventLog`] has been told, in order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RenderRecord {
    Note { note: NoteId, event: NoteEvent },
    Score(ScoreState),
    Progress(f64),
    Ended(ScoreState),
}

/// Renderer that keeps every call it receives.
#[derive(Debug, Default, Clone)]
pub struct EventLog {
    records: Vec<RenderRecord>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> &[RenderRecord] {
        &self.records
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }

    /// Events received for one note, in order.
    pub fn events_for(&self, note: NoteId) -> Vec<NoteEvent> {
        self.records
            .iter()
            .filter_map(|record| match record {
                RenderRecord::Note { note: id, event } if *id == note => Some(*event),
                _ => None,
            })
            .collect()
    }

    pub fn last_progress(&self) -> Option<f64> {
        self.records.iter().rev().find_map(|record| match record {
            RenderRecord::Progress(fraction) => Some(*fraction),
            _ => None,
        })
    }

    pub fn ended_count(&self) -> usize {
        self.records
            .iter()
            .filter(|record| matches!(record, RenderRecord::Ended(_)))
            .count()
    }
}

impl Renderer for EventLog {
    fn note_event(&mut self, note: NoteId, event: NoteEvent) {
        self.records.push(RenderRecord::Note { note, event });
    }

    fn score_changed(&mut self, state: &ScoreState) {
        self.records.push(RenderRecord::Score(*state));
    }

    fn progress(&mut self, fraction: f64) {
        self.records.push(RenderRecord::Progress(fraction));
    }

    fn run_ended(&mut self, state: &ScoreState) {
        self.records.push(RenderRecord::Ended(*state));
    }
}
