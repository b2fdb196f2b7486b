//! Error type for the cantus umbrella crate.
//!
//! Wraps the subsystem errors so `?` propagates across crate boundaries.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("MIDI: {0}")]
    Midi(#[from] cantus_midi::Error),

    #[error("Synth: {0}")]
    Synth(#[from] cantus_synth::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
