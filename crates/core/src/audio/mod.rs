use std::io::Cursor;

use crate::{BeatlineError, Result};

/// Decoded, mono audio ready for analysis.
///
/// The buffer is immutable once built; the detector and the game loop only
/// ever read from it.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleBuffer {
    samples: Vec<f32>,
    sample_rate: u32,
}

impl SampleBuffer {
    /// Wraps mono samples recorded at `sample_rate`.
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Result<Self> {
        if sample_rate == 0 {
            return Err(BeatlineError::Decode(
                "sample rate must be greater than zero".to_string(),
            ));
        }
        if samples.iter().any(|sample| !sample.is_finite()) {
            return Err(BeatlineError::Decode(
                "audio contains non-finite samples".to_string(),
            ));
        }
        Ok(Self {
            samples,
            sample_rate,
        })
    }

    /// Averages interleaved frames of `channels` samples down to mono.
    pub fn from_interleaved(
        interleaved: &[f32],
        channels: usize,
        sample_rate: u32,
    ) -> Result<Self> {
        if channels == 0 {
            return Err(BeatlineError::Decode(
                "audio must have at least one channel".to_string(),
            ));
        }
        let mono = interleaved
            .chunks_exact(channels)
            .map(|frame| frame.iter().sum::<f32>() / channels as f32)
            .collect();
        Self::new(mono, sample_rate)
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Track length in seconds.
    pub fn duration(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate as f64
    }
}

/// Capability that turns encoded audio bytes into a [`SampleBuffer`].
pub trait AudioDecoder {
    fn decode(&self, bytes: &[u8]) -> Result<SampleBuffer>;
}

/// Decoder for RIFF/WAVE files backed by `hound`.
#[derive(Debug, Default, Clone, Copy)]
pub struct WavDecoder;

impl WavDecoder {
    pub fn new() -> Self {
        Self
    }
}

impl AudioDecoder for WavDecoder {
    fn decode(&self, bytes: &[u8]) -> Result<SampleBuffer> {
        let reader = hound::WavReader::new(Cursor::new(bytes))?;
        let spec = reader.spec();

        let interleaved: Vec<f32> = match spec.sample_format {
            hound::SampleFormat::Float => reader
                .into_samples::<f32>()
                .collect::<std::result::Result<Vec<_>, _>>()?,
            hound::SampleFormat::Int => {
                if spec.bits_per_sample == 0 || spec.bits_per_sample > 32 {
                    return Err(BeatlineError::Decode(format!(
                        "unsupported bit depth {}",
                        spec.bits_per_sample
                    )));
                }
                let max_value = (1_i64 << (spec.bits_per_sample - 1)) as f32;
                reader
                    .into_samples::<i32>()
                    .map(|sample| sample.map(|value| value as f32 / max_value))
                    .collect::<std::result::Result<Vec<_>, _>>()?
            }
        };

        tracing::debug!(
            channels = spec.channels,
            sample_rate = spec.sample_rate,
            bits = spec.bits_per_sample,
            samples = interleaved.len(),
            "decoded wav data"
        );

        SampleBuffer::from_interleaved(&interleaved, spec.channels as usize, spec.sample_rate)
    }
}

/// Control surface of whatever is producing the audible output.
pub trait Playback {
    fn start(&mut self) -> Result<()>;
    fn stop(&mut self);
    fn is_playing(&self) -> bool;
}

/// Playback stand-in for headless runs. It only remembers whether it was told
/// to play.
#[derive(Debug, Default, Clone)]
pub struct SilentPlayback {
    playing: bool,
    starts: usize,
}

impl SilentPlayback {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of times `start` has been called.
    pub fn starts(&self) -> usize {
        self.starts
    }
}

impl Playback for SilentPlayback {
    fn start(&mut self) -> Result<()> {
        self.playing = true;
        self.starts += 1;
        Ok(())
    }

    fn stop(&mut self) {
        self.playing = false;
    }

    fn is_playing(&self) -> bool {
        self.playing
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type MemoryWriter<'a> = hound::WavWriter<&'a mut Cursor<Vec<u8>>>;

    fn wav_bytes(spec: hound::WavSpec, write: impl FnOnce(&mut MemoryWriter<'_>)) -> Vec<u8> {
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
            write(&mut writer);
            writer.finalize().unwrap();
        }
        cursor.into_inner()
    }

    #[test]
    fn decodes_stereo_int_wav_to_mono() {
        let spec = hound::WavSpec {
            channels: 2,
            sample_rate: 8_000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let bytes = wav_bytes(spec, |writer| {
            for _ in 0..100 {
                writer.write_sample(i16::MAX / 2).unwrap();
                writer.write_sample(0_i16).unwrap();
            }
        });

        let buffer = WavDecoder::new().decode(&bytes).unwrap();
        assert_eq!(buffer.sample_rate(), 8_000);
        assert_eq!(buffer.samples().len(), 100);
        assert!((buffer.samples()[0] - 0.25).abs() < 1e-3);
        assert!((buffer.duration() - 100.0 / 8_000.0).abs() < 1e-9);
    }

    #[test]
    fn decodes_float_wav() {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 100,
            bits_per_sample: 32,
            sample_format: hound::SampleFormat::Float,
        };
        let bytes = wav_bytes(spec, |writer| {
            for _ in 0..50 {
                writer.write_sample(0.5_f32).unwrap();
            }
        });

        let buffer = WavDecoder::new().decode(&bytes).unwrap();
        assert_eq!(buffer.samples(), &[0.5_f32; 50][..]);
    }

    #[test]
    fn corrupt_bytes_are_decode_errors() {
        let err = WavDecoder::new().decode(b"definitely not a wav").unwrap_err();
        assert!(matches!(err, BeatlineError::Decode(_)));
    }

    #[test]
    fn rejects_zero_sample_rate_and_nan() {
        assert!(SampleBuffer::new(vec![0.0; 4], 0).is_err());
        assert!(SampleBuffer::new(vec![0.0, f32::NAN], 44_100).is_err());
    }

    #[test]
    fn silent_playback_tracks_state() {
        let mut playback = SilentPlayback::new();
        playback.start().unwrap();
        assert!(playback.is_playing());
        playback.stop();
        assert!(!playback.is_playing());
        assert_eq!(playback.starts(), 1);
    }
}
