//! Error types for cantus-synth.

use thiserror::Error;

/// Result type alias for cantus-synth operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors returned by control-path operations.
///
/// The engine stays usable after any rejected call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// Out-of-range channel, parameter, mode, bank or program.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Missing preset, tuning or SoundFont.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Voice pool exhausted.
    #[error("Voice pool exhausted")]
    Busy,
}

impl Error {
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        Error::InvalidArgument(msg.into())
    }

    pub(crate) fn not_found(msg: impl Into<String>) -> Self {
        Error::NotFound(msg.into())
    }
}

impl From<cantus_midi::Error> for Error {
    fn from(e: cantus_midi::Error) -> Self {
        Error::InvalidArgument(e.to_string())
    }
}
