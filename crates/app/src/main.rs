use std::path::{Path, PathBuf};

use beatline_core::{
    AudioDecoder, BeatMap, ClockSource, EngineConfig, GameLoop, NoteEvent, NoteId,
    OnsetDetector, PlaybackClock, Renderer, SampleBuffer, ScoreState, SilentPlayback, WavDecoder,
};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

fn main() -> beatline_core::Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Analyze { input, output } => run_analyze(&config, &input, output.as_deref()),
        Commands::Simulate {
            input,
            offset_ms,
            skip_every,
            fps,
        } => run_simulate(config, &input, offset_ms, skip_every, fps),
    }
}

fn load_config(path: Option<&Path>) -> beatline_core::Result<EngineConfig> {
    match path {
        Some(path) => {
            tracing::info!(?path, "loading engine config");
            EngineConfig::load(path)
        }
        None => Ok(EngineConfig::default()),
    }
}

fn decode(input: &Path) -> beatline_core::Result<SampleBuffer> {
    let bytes = std::fs::read(input)?;
    WavDecoder::new().decode(&bytes)
}

fn run_analyze(
    config: &EngineConfig,
    input: &Path,
    output: Option<&Path>,
) -> beatline_core::Result<()> {
    tracing::info!(?input, "analysing track");

    let buffer = decode(input)?;
    let detector = OnsetDetector::new(config.detection.clone())?;
    let map = BeatMap::analyse(&buffer, &detector, &config.fallback);
    let json = serde_json::to_string_pretty(&map)?;

    match output {
        Some(path) => {
            std::fs::write(path, json)?;
            tracing::info!(?path, beats = map.beats.len(), "beat map written");
        }
        None => println!("{json}"),
    }
    Ok(())
}

fn run_simulate(
    config: EngineConfig,
    input: &Path,
    offset_ms: f64,
    skip_every: Option<usize>,
    fps: u32,
) -> beatline_core::Result<()> {
    let buffer = decode(input)?;
    let mut game = GameLoop::new(config, SilentPlayback::new(), TraceRenderer)?;

    // Detection runs on the worker while this thread waits, like a loading screen.
    game.begin_load(buffer)?;
    game.wait_load()?;

    let hit_times: Vec<f64> = game
        .timeline()
        .map(|timeline| timeline.notes().iter().map(|note| note.hit_time).collect())
        .unwrap_or_default();
    let offset = offset_ms / 1_000.0;
    let mut inputs: Vec<f64> = hit_times
        .iter()
        .enumerate()
        .filter(|(index, _)| skip_every.map_or(true, |n| n == 0 || (index + 1) % n != 0))
        .map(|(_, time)| time + offset)
        .collect();
    inputs.sort_by(f64::total_cmp);
    tracing::info!(
        notes = hit_times.len(),
        inputs = inputs.len(),
        offset_ms,
        "simulating run"
    );

    let frame = 1.0 / f64::from(fps.max(1));
    let mut clock = PlaybackClock::new();
    let mut next_input = 0;
    while !game.is_ended() {
        clock.advance(frame);
        let now = clock.now();
        while next_input < inputs.len() && inputs[next_input] <= now {
            if let Some(judgement) = game.handle_hit(inputs[next_input]) {
                tracing::debug!(
                    note = judgement.note.0,
                    kind = ?judgement.kind,
                    offset = judgement.offset,
                    "hit"
                );
            }
            next_input += 1;
        }
        game.tick(now);
    }

    let summary = serde_json::json!({
        "score": game.current_score_state(),
        "accuracy": game.accuracy(),
        "track": game.summary(),
    });
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

/// Renderer that reports note lifecycle changes through `tracing`.
struct TraceRenderer;

impl Renderer for TraceRenderer {
    fn note_event(&mut self, note: NoteId, event: NoteEvent) {
        match event {
            NoteEvent::PositionUpdated(_) => {}
            NoteEvent::Missed => tracing::info!(note = note.0, "miss"),
            other => tracing::trace!(note = note.0, event = ?other, "note event"),
        }
    }

    fn run_ended(&mut self, state: &ScoreState) {
        tracing::info!(
            score = state.score,
            max_combo = state.max_combo,
            misses = state.miss_count,
            "run complete"
        );
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .try_init();
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Rhythm game timing engine", long_about = None)]
struct Cli {
    /// Optional JSON file overriding detection and timing parameters.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Detect the beats of a WAV file and write them as JSON.
    Analyze {
        /// Path to the audio file that should be analysed.
        input: PathBuf,
        /// Output path for the beat map. Printed to stdout when omitted.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Play a WAV file headlessly with an automatic player and print the score.
    Simulate {
        input: PathBuf,
        /// Constant offset applied to every input, in milliseconds.
        #[arg(long, default_value_t = 0.0, allow_hyphen_values = true)]
        offset_ms: f64,
        /// Leave every Nth note unplayed.
        #[arg(long)]
        skip_every: Option<usize>,
        /// Ticks per second of the simulated display.
        #[arg(long, default_value_t = 60)]
        fps: u32,
    },
}
