//! # Cantus - Synthesizer Control Plane
//!
//! MIDI-driven channel and voice dispatch for sample-based synthesizers.
//!
//! ## Architecture
//!
//! Cantus is an umbrella crate that coordinates:
//! - **cantus-midi** - MIDI types (timestamped events, raw byte parsing, controller numbers)
//! - **cantus-synth** - Dispatch core (channel modes, mono/legato, portamento,
//!   generators, tuning, voice pool interface, render entry points)
//!
//! ## Quick Start
//!
//! ```ignore
//! use cantus::prelude::*;
//!
//! let synth = Synth::new(SynthConfig::default(), SlotPool::new(SlotPoolConfig::default()))?;
//! synth.add_soundfont(font, true);
//!
//! // Channel 0 becomes an Omni Off / Mono zone of one channel
//! synth.reset_basic_channel(Some(0))?;
//! synth.set_basic_channel(BasicChannelInfo::new(0, ChannelMode::OmniOffMono, 1))?;
//!
//! synth.handle_midi_bytes(&[0x90, 60, 100, 62, 100])?;
//! ```

mod error;
pub use error::{Error, Result};

/// Re-export of cantus-midi for direct access
pub use cantus_midi as midi;

/// Re-export of cantus-synth for direct access
pub use cantus_synth as synth;

pub use cantus_midi::{cc, ChannelMessage, MidiEvent, Parsed, RawMessages, MIDI_KEYS};

pub use cantus_synth::{
    BasicChannelInfo, BreathMode, ChannelInfo, ChannelMode, ChannelType, GenParam,
    InterpolationMethod, LegatoMode, PartitionStatus, PortamentoMode, Preset, SlotPool,
    SlotPoolConfig, SoundFont, SoundFontId, StealStrategy, Synth, SynthConfig, SysexReply,
    Tuning, VoiceInfo, VoicePool, VoiceState,
};

/// Convenience prelude for common imports
pub mod prelude {
    pub use crate::{Error, Result};

    pub use cantus_midi::{cc, ChannelMessage, MidiEvent};

    pub use cantus_synth::{
        BasicChannelInfo, BreathMode, ChannelMode, GenParam, LegatoMode, PartitionStatus,
        PortamentoMode, Preset, SlotPool, SlotPoolConfig, SoundFont, Synth, SynthConfig,
        VoicePool,
    };
}
