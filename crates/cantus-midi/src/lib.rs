//! MIDI types for the Cantus synthesizer core.
//!
//! - **[`MidiEvent`]**: sample-offset timestamped channel-voice message
//! - **[`ChannelMessage`]**: flat 7-bit view of a channel message, the form
//!   the dispatch core consumes
//! - **[`RawMessages`]**: byte-stream parser with running status and sysex framing
//! - **[`cc`]**: controller, RPN/NRPN and channel-mode numbers
//!
//! # Example
//!
//! ```ignore
//! use cantus_midi::{MidiEvent, RawMessages, Parsed};
//!
//! let event = MidiEvent::note_on(0, 0, 60, 100);
//! for msg in event.channel_messages() {
//!     // route to the synth
//! }
//!
//! for parsed in RawMessages::new(&[0x90, 60, 100, 64, 100]) {
//!     match parsed? {
//!         Parsed::Channel { channel, msg } => { /* ... */ }
//!         Parsed::Sysex(data) => { /* ... */ }
//!         Parsed::SystemReset => { /* ... */ }
//!     }
//! }
//! ```

pub mod cc;

pub mod error;
pub use error::{Error, Result};

mod event;
pub use event::{ChannelMessage, MidiEvent};

mod raw;
pub use raw::{Parsed, RawMessages};

// Re-export upstream types used in MidiEvent so callers don't need midi-msg directly
pub use midi_msg::{Channel, ChannelVoiceMsg, ControlChange};

/// Number of MIDI keys / controllers.
pub const MIDI_KEYS: usize = 128;

/// Pitch bend centre value (14-bit).
pub const PITCH_BEND_CENTER: u16 = 0x2000;
