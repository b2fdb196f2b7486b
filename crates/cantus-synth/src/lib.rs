//! Synthesizer control core for Cantus.
//!
//! Turns MIDI events into voice pool calls. Sample playback and DSP live
//! behind the [`VoicePool`] trait; this crate decides which voices start,
//! stop, retrigger, glide or get held by a pedal.
//!
//! - **[`Synth`]** - Channel array, event dispatch and render entry points
//! - **[`ChannelMode`] / [`BasicChannelInfo`]** - Omni/Poly/Mono basic-channel partition
//! - **[`MonoList`]** - Bounded note history for monophonic and legato play
//! - **[`LegatoMode`] / [`PortamentoMode`]** - Legato retrigger and glide policies
//! - **[`GenParam`] / [`GeneratorCache`]** - Per-channel generator overrides (NRPN)
//! - **[`Tuning`] / [`TuningTable`]** - Microtonal tunings and MIDI Tuning Standard
//! - **[`SoundFontRegistry`]** - Preset lookup across loaded fonts
//! - **[`SlotPool`]** - Bookkeeping voice pool with stealing strategies
//!
//! # Quick Start
//!
//! ```ignore
//! use cantus_synth::{SlotPool, SlotPoolConfig, Synth, SynthConfig};
//!
//! let synth = Synth::new(SynthConfig::default(), SlotPool::new(SlotPoolConfig::default()))?;
//! synth.add_soundfont(font, true);
//! synth.noteon(0, 60, 100)?;
//!
//! let (mut left, mut right) = ([0.0f32; 512], [0.0f32; 512]);
//! synth.write_f32(512, &mut left, 0, 1, &mut right, 0, 1);
//! ```

pub mod error;
pub use error::{Error, Result};

mod config;
pub use config::{InterpolationMethod, SynthConfig};

mod mode;
pub use mode::{BasicChannelInfo, BreathMode, ChannelMode, ModeAssignment, PartitionStatus};

pub mod partition;

mod mono_list;
pub use mono_list::{HeldNote, MonoList, Pushed, Removed, INVALID_NOTE, MONO_LIST_CAPACITY};

mod legato;
pub use legato::{LegatoAction, LegatoMode};

mod portamento;
pub use portamento::{glide_source, Glide, GlideState, PortamentoCurve, PortamentoMode};

mod generator;
pub use generator::{GenInfo, GenParam, GeneratorCache, GEN_COUNT};

mod nrpn;
pub use nrpn::{DataEntry, ParamParser};

pub mod tuning;
pub use tuning::{Tuning, TuningId, TuningTable};

mod soundfont;
pub use soundfont::{Preset, SoundFont, SoundFontId, SoundFontRegistry, ZoneId, ZoneList};

mod voice;
pub use voice::{
    ControlUpdate, Hold, ReleaseKind, Retrigger, RetriggerKind, VoiceHandle, VoiceInfo,
    VoicePool, VoiceRequest, VoiceState,
};

mod channel;
pub use channel::{
    ChannelInfo, ChannelType, DEFAULT_PITCH_WHEEL_SENSITIVITY, DRUM_BANK, DRUM_CHANNEL,
};

mod slot_pool;
pub use slot_pool::{SlotPool, SlotPoolConfig, StealStrategy, VoiceSlot};

mod synth;
pub use synth::{Synth, SysexReply, BLOCK_SIZE};

pub use cantus_midi::MIDI_KEYS;
