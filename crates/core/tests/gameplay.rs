use std::io::Cursor;

use beatline_core::{
    ClockSource, EngineConfig, EventLog, GameLoop, GameState, Playback, PlaybackClock,
    SilentPlayback, WavDecoder,
};

const SAMPLE_RATE: u32 = 22_050;
const CLICKS: [f64; 6] = [1.0, 1.5, 2.0, 2.5, 3.0, 3.5];

/// Five seconds of silence with a 30 ms square burst at every click.
fn click_track_wav() -> Vec<u8> {
    let total = SAMPLE_RATE as usize * 5;
    let burst = (0.03 * SAMPLE_RATE as f64) as usize;
    let mut samples = vec![0.0_f32; total];
    for click in CLICKS {
        let start = (click * SAMPLE_RATE as f64) as usize;
        for (i, sample) in samples[start..start + burst].iter_mut().enumerate() {
            *sample = if i % 2 == 0 { 0.6 } else { -0.6 };
        }
    }

    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: SAMPLE_RATE,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
        for sample in samples {
            writer
                .write_sample((sample * i16::MAX as f32) as i16)
                .unwrap();
        }
        writer.finalize().unwrap();
    }
    cursor.into_inner()
}

fn loaded_game() -> GameLoop<SilentPlayback, EventLog> {
    let mut game =
        GameLoop::new(EngineConfig::default(), SilentPlayback::new(), EventLog::new()).unwrap();
    game.load_bytes(&click_track_wav(), &WavDecoder::new())
        .unwrap();
    game
}

/// Drives the game at 60 fps, hitting each note whose index passes `should_hit`
/// exactly on its hit time.
fn play(game: &mut GameLoop<SilentPlayback, EventLog>, should_hit: impl Fn(usize) -> bool) {
    let targets: Vec<f64> = game
        .timeline()
        .unwrap()
        .notes()
        .iter()
        .map(|note| note.hit_time)
        .collect();

    let mut clock = PlaybackClock::new();
    let mut previous = 0.0;
    for _ in 0..60 * 30 {
        if game.is_ended() {
            break;
        }
        clock.advance(1.0 / 60.0);
        let now = clock.now();
        for (index, target) in targets.iter().enumerate() {
            if *target > previous && *target <= now && should_hit(index) {
                game.handle_hit(*target);
            }
        }
        game.tick(now);
        previous = now;
    }
}

#[test]
fn detects_every_click() {
    let game = loaded_game();
    let summary = game.summary().unwrap();
    assert!(!summary.used_fallback);
    assert_eq!(summary.beat_count, CLICKS.len());

    let notes = game.timeline().unwrap().notes();
    for (note, click) in notes.iter().zip(CLICKS) {
        assert!((note.hit_time - click).abs() < 0.05, "{note:?} vs {click}");
    }

    let tempo = summary.tempo_bpm.unwrap();
    assert!((tempo - 120.0).abs() < 5.0);
}

#[test]
fn perfect_run_from_wav() {
    let mut game = loaded_game();
    play(&mut game, |_| true);

    assert_eq!(game.state(), GameState::Ended);
    let state = game.current_score_state();
    assert_eq!(state.perfect_count as usize, CLICKS.len());
    assert_eq!(state.score, 300 * CLICKS.len() as u64);
    assert_eq!(state.max_combo as usize, CLICKS.len());
    assert_eq!(game.accuracy(), 100.0);
    assert_eq!(game.renderer().ended_count(), 1);
    assert!(!game.playback().is_playing());
}

#[test]
fn skipped_notes_become_misses() {
    let mut game = loaded_game();
    play(&mut game, |index| index % 2 == 0);

    let state = game.current_score_state();
    assert_eq!(state.perfect_count, 3);
    assert_eq!(state.miss_count, 3);
    assert_eq!(state.combo, 0);
    assert_eq!(state.max_combo, 1);
    assert_eq!(game.accuracy(), 50.0);

    game.reset();
    assert_eq!(game.state(), GameState::Idle);
    assert_eq!(game.accuracy(), 100.0);
}
