//! Error types for cantus-midi.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("Truncated MIDI message: status 0x{status:02X} needs {expected} data bytes")]
    Truncated { status: u8, expected: usize },

    #[error("Unterminated sysex message")]
    UnterminatedSysex,
}

pub type Result<T> = std::result::Result<T, Error>;
