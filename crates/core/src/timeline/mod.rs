use serde::{Deserialize, Serialize};

use crate::{Beat, TimingConfig};

/// Source of elapsed playback time in seconds.
pub trait ClockSource {
    fn now(&self) -> f64;
}

/// Manually advanced playback clock used for headless runs and tests.
///
/// Time never moves backwards: negative or non-finite deltas are ignored.
#[derive(Debug, Default, Clone)]
pub struct PlaybackClock {
    time_seconds: f64,
}

impl PlaybackClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        self.time_seconds = 0.0;
    }

    pub fn advance(&mut self, delta: f64) {
        if delta.is_finite() && delta > 0.0 {
            self.time_seconds += delta;
        }
    }
}

impl ClockSource for PlaybackClock {
    fn now(&self) -> f64 {
        self.time_seconds
    }
}

/// Raw progress of a note towards the judgement line.
///
/// `0.0` is the moment the note spawns, `1.0` is the moment it reaches the
/// line (exactly at `hit_time`). Values outside `[0, 1]` are returned as-is so
/// callers can decide how to draw them.
pub fn progress(hit_time: f64, travel_time: f64, elapsed: f64) -> f64 {
    (elapsed - (hit_time - travel_time)) / travel_time
}

/// Stable handle of a note inside its timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NoteId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HitKind {
    Perfect,
    Good,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NoteState {
    Pending,
    Hit(HitKind),
    Missed,
}

impl NoteState {
    pub fn is_pending(self) -> bool {
        matches!(self, NoteState::Pending)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Note {
    pub id: NoteId,
    pub hit_time: f64,
    pub state: NoteState,
    spawned: bool,
    active: bool,
}

impl Note {
    pub fn is_active(&self) -> bool {
        self.active
    }
}

/// Ordered arena of the notes of one run.
///
/// Notes keep their slot for the whole run so a [`NoteId`] stays valid.
/// Resolved notes are tombstoned (marked inactive) instead of being removed,
/// and `head` skips past the resolved prefix so per-tick scans start at the
/// first note that can still change.
#[derive(Debug, Clone)]
pub struct NoteTimeline {
    notes: Vec<Note>,
    head: usize,
    pending: usize,
    travel_time: f64,
    miss_threshold: f64,
}

impl NoteTimeline {
    /// Builds one pending note per beat. Non-finite beats are dropped and the
    /// rest are sorted so hit times are ascending.
    pub fn new(beats: &[Beat], timing: &TimingConfig) -> Self {
        let mut times: Vec<f64> = beats
            .iter()
            .map(|beat| beat.seconds())
            .filter(|time| time.is_finite())
            .collect();
        times.sort_by(f64::total_cmp);

        let notes: Vec<Note> = times
            .into_iter()
            .enumerate()
            .map(|(index, hit_time)| Note {
                id: NoteId(index),
                hit_time,
                state: NoteState::Pending,
                spawned: false,
                active: true,
            })
            .collect();

        Self {
            pending: notes.len(),
            notes,
            head: 0,
            travel_time: timing.travel_time,
            miss_threshold: 1.0 + timing.miss_margin,
        }
    }

    /// Total number of notes created for the run.
    pub fn len(&self) -> usize {
        self.notes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }

    pub fn pending_count(&self) -> usize {
        self.pending
    }

    pub fn travel_time(&self) -> f64 {
        self.travel_time
    }

    pub fn get(&self, id: NoteId) -> Option<&Note> {
        self.notes.get(id.0)
    }

    pub fn notes(&self) -> &[Note] {
        &self.notes
    }

    /// Notes that have not been removed yet, in hit-time order.
    pub fn active_notes(&self) -> impl Iterator<Item = &Note> + '_ {
        self.notes[self.head..].iter().filter(|note| note.active)
    }

    pub fn position_of(&self, id: NoteId, elapsed: f64) -> Option<f64> {
        self.get(id)
            .map(|note| progress(note.hit_time, self.travel_time, elapsed))
    }

    /// Marks every active note that has reached the spawn point as spawned and
    /// returns the ones that just did.
    pub(crate) fn mark_spawned(&mut self, elapsed: f64) -> Vec<NoteId> {
        let mut spawned = Vec::new();
        for note in self.notes[self.head..].iter_mut() {
            if !note.active {
                continue;
            }
            if progress(note.hit_time, self.travel_time, elapsed) < 0.0 {
                break;
            }
            if !note.spawned {
                note.spawned = true;
                spawned.push(note.id);
            }
        }
        spawned
    }

    /// Moves every pending note that has travelled past the miss threshold to
    /// [`NoteState::Missed`] and returns them in hit-time order.
    ///
    /// The notes stay in the active set until [`NoteTimeline::remove_judged`]
    /// is called for them.
    pub fn tick_misses(&mut self, elapsed: f64) -> Vec<NoteId> {
        let mut missed = Vec::new();
        if !elapsed.is_finite() {
            return missed;
        }
        for note in self.notes[self.head..].iter_mut() {
            if !note.active || !note.state.is_pending() {
                continue;
            }
            if progress(note.hit_time, self.travel_time, elapsed) <= self.miss_threshold {
                break;
            }
            note.state = NoteState::Missed;
            missed.push(note.id);
        }
        self.pending -= missed.len();
        missed
    }

    /// Records a hit on a pending note. Returns `false` when the note does not
    /// exist or has already been resolved.
    pub fn mark_hit(&mut self, id: NoteId, kind: HitKind) -> bool {
        match self.notes.get_mut(id.0) {
            Some(note) if note.active && note.state.is_pending() => {
                note.state = NoteState::Hit(kind);
                self.pending -= 1;
                true
            }
            _ => false,
        }
    }

    /// Drops a resolved note from the active set. Pending notes are left alone.
    pub fn remove_judged(&mut self, id: NoteId) -> bool {
        let removed = match self.notes.get_mut(id.0) {
            Some(note) if note.active && !note.state.is_pending() => {
                note.active = false;
                true
            }
            _ => false,
        };

        while self
            .notes
            .get(self.head)
            .map(|note| !note.active)
            .unwrap_or(false)
        {
            self.head += 1;
        }
        removed
    }
}
