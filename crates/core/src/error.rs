/// Result alias that carries the custom [`BeatlineError`] type.
pub type Result<T> = std::result::Result<T, BeatlineError>;

/// Common error type for the core crate.
#[derive(Debug, thiserror::Error)]
pub enum BeatlineError {
    /// The audio capability could not turn the input into samples.
    #[error("failed to decode audio: {0}")]
    Decode(String),
    /// A configuration value is out of range or inconsistent.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// An operation was requested in a game state that does not accept it.
    #[error("cannot {operation} while the game is {state}")]
    InvalidState {
        operation: &'static str,
        state: &'static str,
    },
    /// Neither detection nor the fallback policy produced a single beat.
    #[error("no beats could be scheduled for this track")]
    EmptyTimeline,
    /// The playback collaborator refused to start.
    #[error("playback error: {0}")]
    Playback(String),
    /// The background detection worker went away without a result.
    #[error("detection worker failed: {0}")]
    Worker(String),
    /// A numeric value handed to the engine is out of range or not finite.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// Wrapper around standard IO errors.
    #[error("{0}")]
    Io(#[from] std::io::Error),
    /// Wrapper around JSON (de)serialisation errors.
    #[error("{0}")]
    Json(#[from] serde_json::Error),
}

impl BeatlineError {
    pub(crate) fn config<T: Into<String>>(msg: T) -> Self {
        Self::InvalidConfig(msg.into())
    }
}

impl From<hound::Error> for BeatlineError {
    fn from(value: hound::Error) -> Self {
        Self::Decode(value.to_string())
    }
}
