use std::{fmt, thread};

use crossbeam_channel::{Receiver, TryRecvError};

use crate::{
    progress, AnalysisSummary, AudioDecoder, BeatMap, BeatlineError, EngineConfig, Judgement,
    JudgementEngine, JudgementKind, NoteEvent, NoteTimeline, OnsetDetector, Playback, Renderer,
    Result, SampleBuffer, ScoreState, ScoreTracker,
};

/// Lifecycle of a single run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameState {
    Idle,
    Loading,
    Playing,
    Ended,
}

impl GameState {
    pub fn name(self) -> &'static str {
        match self {
            GameState::Idle => "idle",
            GameState::Loading => "loading",
            GameState::Playing => "playing",
            GameState::Ended => "ended",
        }
    }
}

impl fmt::Display for GameState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug)]
struct Run {
    timeline: NoteTimeline,
    duration: f64,
    summary: AnalysisSummary,
}

struct PendingLoad {
    receiver: Receiver<BeatMap>,
    worker: thread::JoinHandle<()>,
}

/// Owns every piece of state for one player: the detector, the current run's
/// timeline and score, and the injected playback and presentation backends.
///
/// The host drives it through [`GameLoop::tick`] and [`GameLoop::handle_hit`]
/// with times read from the playback clock; the loop never schedules anything
/// on its own.
pub struct GameLoop<P, R> {
    config: EngineConfig,
    detector: OnsetDetector,
    judge: JudgementEngine,
    score: ScoreTracker,
    playback: P,
    renderer: R,
    state: GameState,
    run: Option<Run>,
    pending: Option<PendingLoad>,
}

impl<P: Playback, R: Renderer> GameLoop<P, R> {
    pub fn new(config: EngineConfig, playback: P, renderer: R) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            detector: OnsetDetector::new(config.detection.clone())?,
            judge: JudgementEngine::from_timing(&config.timing),
            config,
            score: ScoreTracker::new(),
            playback,
            renderer,
            state: GameState::Idle,
            run: None,
            pending: None,
        })
    }

    pub fn state(&self) -> GameState {
        self.state
    }

    pub fn is_ended(&self) -> bool {
        self.state == GameState::Ended
    }

    pub fn current_score_state(&self) -> ScoreState {
        self.score.state()
    }

    pub fn accuracy(&self) -> f64 {
        self.score.accuracy()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn timeline(&self) -> Option<&NoteTimeline> {
        self.run.as_ref().map(|run| &run.timeline)
    }

    /// Analysis metadata of the current run.
    pub fn summary(&self) -> Option<&AnalysisSummary> {
        self.run.as_ref().map(|run| &run.summary)
    }

    pub fn playback(&self) -> &P {
        &self.playback
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn renderer_mut(&mut self) -> &mut R {
        &mut self.renderer
    }

    /// Analyses `buffer` on the calling thread and starts the run.
    pub fn load(&mut self, buffer: &SampleBuffer) -> Result<()> {
        self.expect_state(GameState::Idle, "load a track")?;
        self.state = GameState::Loading;

        let map = BeatMap::analyse(buffer, &self.detector, &self.config.fallback);
        self.finish_load(map)
    }

    /// Decodes `bytes` with `decoder`, then behaves like [`GameLoop::load`].
    pub fn load_bytes<D: AudioDecoder + ?Sized>(&mut self, bytes: &[u8], decoder: &D) -> Result<()> {
        self.expect_state(GameState::Idle, "load a track")?;
        self.state = GameState::Loading;

        let buffer = match decoder.decode(bytes) {
            Ok(buffer) => buffer,
            Err(err) => return Err(self.fail_load(err)),
        };
        let map = BeatMap::analyse(&buffer, &self.detector, &self.config.fallback);
        self.finish_load(map)
    }

    /// Starts a run from beats that were analysed earlier.
    pub fn load_beat_map(&mut self, map: BeatMap) -> Result<()> {
        self.expect_state(GameState::Idle, "load a beat map")?;
        self.state = GameState::Loading;
        self.finish_load(map)
    }

    /// Moves onset detection to a worker thread. The run starts once
    /// [`GameLoop::poll_load`] or [`GameLoop::wait_load`] picks up the result.
    pub fn begin_load(&mut self, buffer: SampleBuffer) -> Result<()> {
        self.expect_state(GameState::Idle, "load a track")?;

        let detector = self.detector.clone();
        let fallback = self.config.fallback.clone();
        let (tx, rx) = crossbeam_channel::bounded(1);

        let worker = thread::Builder::new()
            .name("beatline-onsets".into())
            .spawn(move || {
                let map = BeatMap::analyse(&buffer, &detector, &fallback);
                // The receiver is gone if the load was cancelled.
                let _ = tx.send(map);
            })?;

        tracing::debug!("onset detection moved to worker thread");
        self.pending = Some(PendingLoad {
            receiver: rx,
            worker,
        });
        self.state = GameState::Loading;
        Ok(())
    }

    /// Checks on a background load without blocking. Returns `true` once the
    /// run is playing.
    pub fn poll_load(&mut self) -> Result<bool> {
        match self.state {
            GameState::Playing => return Ok(true),
            GameState::Loading => {}
            state => {
                return Err(BeatlineError::InvalidState {
                    operation: "poll a load",
                    state: state.name(),
                })
            }
        }

        let received = match self.pending.as_ref() {
            Some(pending) => pending.receiver.try_recv(),
            None => Err(TryRecvError::Disconnected),
        };

        match received {
            Ok(map) => {
                self.join_worker();
                self.finish_load(map).map(|_| true)
            }
            Err(TryRecvError::Empty) => Ok(false),
            Err(TryRecvError::Disconnected) => Err(self.fail_load(BeatlineError::Worker(
                "detection finished without a result".to_string(),
            ))),
        }
    }

    /// Blocks until a background load has finished and the run is playing.
    pub fn wait_load(&mut self) -> Result<()> {
        self.expect_state(GameState::Loading, "wait for a load")?;

        let received = match self.pending.as_ref() {
            Some(pending) => pending.receiver.recv().ok(),
            None => None,
        };

        match received {
            Some(map) => {
                self.join_worker();
                self.finish_load(map)
            }
            None => Err(self.fail_load(BeatlineError::Worker(
                "detection finished without a result".to_string(),
            ))),
        }
    }

    /// Advances the run to `elapsed` seconds of playback.
    pub fn tick(&mut self, elapsed: f64) {
        if self.state != GameState::Playing {
            return;
        }
        if !elapsed.is_finite() {
            tracing::warn!(elapsed, "ignoring tick with non-finite time");
            return;
        }
        let elapsed = elapsed.max(0.0);

        let Some(run) = self.run.as_mut() else {
            return;
        };

        let fraction = if run.duration > 0.0 {
            (elapsed / run.duration).clamp(0.0, 1.0)
        } else {
            1.0
        };
        self.renderer.progress(fraction);

        for id in run.timeline.mark_spawned(elapsed) {
            self.renderer.note_event(id, NoteEvent::Spawned);
        }
        let travel_time = run.timeline.travel_time();
        for note in run.timeline.active_notes() {
            let position = progress(note.hit_time, travel_time, elapsed);
            if position < 0.0 {
                break;
            }
            self.renderer
                .note_event(note.id, NoteEvent::PositionUpdated(position));
        }

        let missed = run.timeline.tick_misses(elapsed);
        for &id in &missed {
            self.score.on_judgement(JudgementKind::Missed);
            self.renderer.note_event(id, NoteEvent::Missed);
            run.timeline.remove_judged(id);
            self.renderer.note_event(id, NoteEvent::Removed);
        }
        if !missed.is_empty() {
            tracing::debug!(count = missed.len(), elapsed, "notes missed");
            self.renderer.score_changed(&self.score.state());
        }

        if elapsed > run.duration + self.config.timing.grace_period {
            self.end_run();
        }
    }

    /// Judges a hit input made at `input_time`. Inputs outside every note's
    /// good window are ignored and return `None`.
    pub fn handle_hit(&mut self, input_time: f64) -> Option<Judgement> {
        if self.state != GameState::Playing {
            return None;
        }
        if !input_time.is_finite() {
            tracing::warn!(input_time, "ignoring hit with non-finite time");
            return None;
        }

        let run = self.run.as_mut()?;
        let judgement = self.judge.judge(&mut run.timeline, input_time)?;

        self.score.on_judgement(judgement.kind.into());
        self.renderer
            .note_event(judgement.note, NoteEvent::Hit(judgement.kind));
        self.renderer.note_event(judgement.note, NoteEvent::Removed);
        self.renderer.score_changed(&self.score.state());
        Some(judgement)
    }

    /// Leaves the current phase early: a pending load is abandoned and a run in
    /// progress ends immediately.
    pub fn exit(&mut self) {
        match self.state {
            GameState::Loading => {
                self.pending = None;
                self.state = GameState::Idle;
                tracing::info!("load cancelled");
            }
            GameState::Playing => self.end_run(),
            GameState::Idle | GameState::Ended => {}
        }
    }

    /// Returns to [`GameState::Idle`], dropping the run and its score.
    pub fn reset(&mut self) {
        if self.state == GameState::Playing {
            self.playback.stop();
        }
        self.pending = None;
        self.run = None;
        self.score.reset();
        self.state = GameState::Idle;
        tracing::debug!("game reset");
    }

    fn finish_load(&mut self, map: BeatMap) -> Result<()> {
        let duration = map.summary.duration_seconds;
        if !duration.is_finite() || duration < 0.0 {
            return Err(self.fail_load(BeatlineError::InvalidInput(format!(
                "track duration must be finite and non-negative, got {duration}"
            ))));
        }
        if map.beats.is_empty() {
            return Err(self.fail_load(BeatlineError::EmptyTimeline));
        }

        let timeline = NoteTimeline::new(&map.beats, &self.config.timing);
        if timeline.is_empty() {
            return Err(self.fail_load(BeatlineError::EmptyTimeline));
        }

        self.score.reset();
        if let Err(err) = self.playback.start() {
            return Err(self.fail_load(err));
        }

        tracing::info!(
            notes = timeline.len(),
            duration = map.summary.duration_seconds,
            tempo_bpm = map.summary.tempo_bpm,
            fallback = map.summary.used_fallback,
            "run started"
        );
        self.run = Some(Run {
            timeline,
            duration: map.summary.duration_seconds,
            summary: map.summary,
        });
        self.state = GameState::Playing;
        self.renderer.score_changed(&self.score.state());
        self.renderer.progress(0.0);
        Ok(())
    }

    fn fail_load(&mut self, err: BeatlineError) -> BeatlineError {
        tracing::warn!(error = %err, "load failed");
        self.pending = None;
        self.run = None;
        self.state = GameState::Idle;
        err
    }

    fn join_worker(&mut self) {
        if let Some(pending) = self.pending.take() {
            if pending.worker.join().is_err() {
                tracing::warn!("onset worker panicked after delivering its result");
            }
        }
    }

    fn end_run(&mut self) {
        self.playback.stop();
        self.state = GameState::Ended;
        let state = self.score.state();
        self.renderer.run_ended(&state);
        tracing::info!(
            score = state.score,
            max_combo = state.max_combo,
            accuracy = state.accuracy(),
            "run ended"
        );
    }

    fn expect_state(&self, expected: GameState, operation: &'static str) -> Result<()> {
        if self.state == expected {
            Ok(())
        } else {
            Err(BeatlineError::InvalidState {
                operation,
                state: self.state.name(),
            })
        }
    }
}

impl<P: fmt::Debug, R> fmt::Debug for GameLoop<P, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GameLoop")
            .field("state", &self.state)
            .field("score", &self.score.state())
            .field("playback", &self.playback)
            .field("notes", &self.run.as_ref().map(|run| run.timeline.len()))
            .field("loading_in_background", &self.pending.is_some())
            .finish()
    }
}
