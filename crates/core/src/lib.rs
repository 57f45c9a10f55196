//! Core library for the Beatline rhythm game.
//!
//! The crate turns an audio recording into a playable run: onsets are detected
//! from waveform energy, turned into notes on a timeline, judged against
//! player input and accumulated into a score. Decoding, playback and drawing
//! are collaborators injected through the traits in [`audio`] and [`render`];
//! [`GameLoop`] owns everything else and is driven by the host's clock.

pub mod analysis;
pub mod audio;
pub mod config;
pub mod error;
pub mod game;
pub mod judge;
pub mod render;
pub mod score;
pub mod timeline;

pub use analysis::{
    estimate_tempo, fallback_beats, AnalysisSummary, Beat, BeatMap, OnsetDetector,
};
pub use audio::{AudioDecoder, Playback, SampleBuffer, SilentPlayback, WavDecoder};
pub use config::{DetectionConfig, EngineConfig, FallbackConfig, TimingConfig};
pub use error::{BeatlineError, Result};
pub use game::{GameLoop, GameState};
pub use judge::{Judgement, JudgementEngine};
pub use render::{EventLog, NoteEvent, NullRenderer, RenderRecord, Renderer};
pub use score::{JudgementKind, ScoreState, ScoreTracker};
pub use timeline::{
    progress, ClockSource, HitKind, Note, NoteId, NoteState, NoteTimeline, PlaybackClock,
};
