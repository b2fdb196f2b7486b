//! Voice pool interface.
//!
//! The dispatch core decides *which* voices start, stop, retrigger or get
//! held; a [`VoicePool`] owns the voices and does the DSP. Calls are made
//! with resolved parameters copied out of the channel. A channel lock may be
//! held across a pool call; a channel is never locked from inside one.

use crate::config::InterpolationMethod;
use crate::generator::{GenParam, GeneratorCache};
use crate::portamento::Glide;
use crate::soundfont::ZoneId;
use crate::Result;

/// Pool-assigned handle to one voice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VoiceHandle(pub u64);

/// Lifecycle state of a voice as seen by the dispatch core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VoiceState {
    /// Allocated but not started
    #[default]
    Idle,
    /// Key down
    Playing,
    /// Key up, held by the sustain pedal
    Sustained,
    /// Key up, held by the sostenuto pedal
    HeldBySostenuto,
    /// Release phase
    Releasing,
}

impl VoiceState {
    /// Still sounding and not yet released.
    #[inline]
    pub fn is_on(self) -> bool {
        matches!(
            self,
            VoiceState::Playing | VoiceState::Sustained | VoiceState::HeldBySostenuto
        )
    }
}

/// Snapshot of one voice, reported by [`VoicePool::for_each_voice`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoiceInfo {
    pub handle: VoiceHandle,
    /// Note id stamped at note-on.
    pub id: u32,
    pub channel: usize,
    pub key: u8,
    pub velocity: u8,
    pub state: VoiceState,
}

/// Release speed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseKind {
    /// Envelope release as programmed.
    Normal,
    /// Shortened release used when a new note takes over.
    Fast,
}

/// How an existing voice takes over a new note in legato play.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetriggerKind {
    /// Re-attack from the current envelope level with the new dynamics.
    MultiRetrigger,
    /// Change pitch and reshape the current envelope section.
    ShapeCurrentSection,
    /// Change pitch only; the envelope phase is untouched.
    PitchOnly,
}

/// Pedal holding a released key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hold {
    Sustain,
    Sostenuto,
}

/// Channel-level change forwarded to sounding voices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlUpdate {
    Controller { control: u8, value: u8 },
    PitchBend(u16),
    PitchWheelSensitivity(u8),
    ChannelPressure(u8),
    KeyPressure { key: u8, pressure: u8 },
}

/// Everything a pool needs to set up a voice.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VoiceRequest {
    pub zone: ZoneId,
    pub channel: usize,
    pub key: u8,
    pub velocity: u8,
    /// Note id shared by all voices of one note-on.
    pub id: u32,
    /// Channel generator overrides at note-on.
    pub generators: GeneratorCache,
    /// Tuned pitch of `key` in cents.
    pub pitch_cents: f32,
    pub glide: Option<Glide>,
    /// Apply the default breath modulator.
    pub breath_default: bool,
    pub interpolation: InterpolationMethod,
}

/// Legato takeover of a sounding voice.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Retrigger {
    pub key: u8,
    pub velocity: u8,
    pub kind: RetriggerKind,
    /// Tuned pitch of `key` in cents.
    pub pitch_cents: f32,
    pub glide: Option<Glide>,
}

/// Voice storage and synthesis.
///
/// Control-path methods never fail except [`allocate`](Self::allocate);
/// unknown handles are ignored.
pub trait VoicePool: Send {
    /// Reserve a voice. Returns [`Error::Busy`](crate::Error::Busy) when no
    /// voice can be freed.
    fn allocate(&mut self, request: &VoiceRequest) -> Result<VoiceHandle>;

    fn start(&mut self, voice: VoiceHandle);

    fn release(&mut self, voice: VoiceHandle, kind: ReleaseKind);

    /// Stop immediately.
    fn kill(&mut self, voice: VoiceHandle);

    fn retrigger(&mut self, voice: VoiceHandle, retrigger: &Retrigger);

    /// Keep a released key sounding.
    fn hold(&mut self, voice: VoiceHandle, hold: Hold);

    /// Retune in cents (tuning change with live apply).
    fn set_pitch(&mut self, voice: VoiceHandle, cents: f32);

    fn modulate(&mut self, voice: VoiceHandle, update: ControlUpdate);

    fn update_generator(&mut self, voice: VoiceHandle, param: GenParam, value: f32, absolute: bool);

    /// Visit every allocated voice.
    fn for_each_voice(&self, f: &mut dyn FnMut(&VoiceInfo));

    /// Mix one block into `left` / `right` (same length).
    fn render(&mut self, left: &mut [f32], right: &mut [f32]);

    fn active_count(&self) -> usize;

    fn set_sample_rate(&mut self, sample_rate: f32);

    fn set_polyphony(&mut self, voices: usize) -> Result<()>;
}
