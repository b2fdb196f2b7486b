//! Synth dispatch core.
//!
//! Owns the channels, the SoundFont registry, the tuning table and the
//! voice pool. Event methods lock one channel, resolve what should happen,
//! release the lock and then drive the pool with copied parameters.
//! Generator and tuning updates keep the channel locked while they reach
//! the voices. Lock order is partition, channel, pool.

mod dispatch;
mod generators;
mod modes;
mod mono;
mod program;
mod render;
mod sysex;
mod tuning;

pub use render::BLOCK_SIZE;
pub use sysex::SysexReply;

use core::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;

use atomic_float::AtomicF32;
use parking_lot::{Mutex, MutexGuard};
use smallvec::SmallVec;
use tracing::{debug, warn};

use crate::channel::{Channel, ChannelState, ChannelType, Pedals};
use crate::config::{InterpolationMethod, SynthConfig};
use crate::generator::GeneratorCache;
use crate::mode::ModeAssignment;
use crate::mono_list::HeldNote;
use crate::portamento::Glide;
use crate::soundfont::{Preset, SoundFontRegistry};
use crate::tuning::TuningTable;
use crate::voice::{Hold, ReleaseKind, VoiceInfo, VoicePool, VoiceRequest, VoiceState};
use crate::{Error, Result, MIDI_KEYS};

use render::RenderScratch;

/// Voices collected for one event; spills to the heap for big chords.
pub(crate) type VoiceList = SmallVec<[VoiceInfo; 16]>;

/// Voice requests of one note, one per preset zone.
pub(crate) type RequestList = SmallVec<[VoiceRequest; 4]>;

/// Copy of everything needed to start the voices of one note.
pub(crate) struct NoteStart {
    channel: usize,
    key: u8,
    velocity: u8,
    id: u32,
    preset: Arc<dyn Preset>,
    generators: GeneratorCache,
    pitch_cents: f32,
    glide: Option<Glide>,
    breath_default: bool,
    interpolation: InterpolationMethod,
}

impl NoteStart {
    /// `None` when the channel has no (live) preset.
    fn resolve(
        state: &ChannelState,
        channel: usize,
        key: u8,
        velocity: u8,
        id: u32,
        glide: Option<Glide>,
    ) -> Option<Self> {
        Some(Self {
            channel,
            key,
            velocity,
            id,
            preset: state.current_preset()?,
            generators: state.generators,
            pitch_cents: state.pitch(key),
            glide,
            breath_default: state.breath_default(),
            interpolation: state.interpolation,
        })
    }

    /// One voice request per preset zone. Calls into the preset; run it
    /// before locking the pool.
    fn requests(&self) -> RequestList {
        self.preset
            .zones(self.key, self.velocity)
            .into_iter()
            .map(|zone| VoiceRequest {
                zone,
                channel: self.channel,
                key: self.key,
                velocity: self.velocity,
                id: self.id,
                generators: self.generators,
                pitch_cents: self.pitch_cents,
                glide: self.glide,
                breath_default: self.breath_default,
                interpolation: self.interpolation,
            })
            .collect()
    }

    fn report_dropped(&self, dropped: usize) {
        if dropped > 0 {
            warn!(
                "Dropped {dropped} voice(s) of note {} on channel {}: no free voice",
                self.key, self.channel
            );
        }
    }
}

/// The synthesizer control plane.
pub struct Synth<P: VoicePool> {
    config: SynthConfig,
    channels: Box<[Channel]>,
    pool: Mutex<P>,
    soundfonts: SoundFontRegistry,
    tunings: TuningTable,
    /// Next note id; also stamped as sostenuto order id.
    note_id: AtomicU32,
    gain: AtomicF32,
    sample_rate: AtomicF32,
    polyphony: AtomicUsize,
    /// Serializes basic-channel partition changes.
    partition_lock: Mutex<()>,
    scratch: Mutex<RenderScratch>,
}

impl<P: VoicePool> Synth<P> {
    pub fn new(config: SynthConfig, mut pool: P) -> Result<Self> {
        config.validate()?;
        pool.set_sample_rate(config.sample_rate);
        pool.set_polyphony(config.polyphony)?;

        let channels = (0..config.midi_channels)
            .map(|index| Channel::new(index, &config))
            .collect();

        Ok(Self {
            channels,
            pool: Mutex::new(pool),
            soundfonts: SoundFontRegistry::new(),
            tunings: TuningTable::new(),
            note_id: AtomicU32::new(0),
            gain: AtomicF32::new(config.gain),
            sample_rate: AtomicF32::new(config.sample_rate),
            polyphony: AtomicUsize::new(config.polyphony),
            partition_lock: Mutex::new(()),
            scratch: Mutex::new(RenderScratch::new()),
            config,
        })
    }

    pub fn config(&self) -> &SynthConfig {
        &self.config
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    pub fn soundfonts(&self) -> &SoundFontRegistry {
        &self.soundfonts
    }

    pub fn tunings(&self) -> &TuningTable {
        &self.tunings
    }

    /// Lock the voice pool.
    ///
    /// Dispatch blocks while the guard is held; render outputs silence.
    pub fn pool(&self) -> MutexGuard<'_, P> {
        self.pool.lock()
    }

    // --- settings ---

    pub fn gain(&self) -> f32 {
        self.gain.load(Ordering::Relaxed)
    }

    /// Set the master gain, clamped to 0-10.
    pub fn set_gain(&self, gain: f32) {
        self.gain
            .store(gain.clamp(0.0, SynthConfig::MAX_GAIN), Ordering::Relaxed);
    }

    pub fn sample_rate(&self) -> f32 {
        self.sample_rate.load(Ordering::Relaxed)
    }

    pub fn set_sample_rate(&self, sample_rate: f32) -> Result<()> {
        SynthConfig {
            sample_rate,
            ..SynthConfig::default()
        }
        .validate()?;
        self.sample_rate.store(sample_rate, Ordering::Relaxed);
        self.pool.lock().set_sample_rate(sample_rate);
        Ok(())
    }

    pub fn polyphony(&self) -> usize {
        self.polyphony.load(Ordering::Relaxed)
    }

    pub fn set_polyphony(&self, voices: usize) -> Result<()> {
        if voices == 0 || voices > SynthConfig::MAX_POLYPHONY {
            return Err(Error::invalid(format!(
                "polyphony {voices} out of range (1-{})",
                SynthConfig::MAX_POLYPHONY
            )));
        }
        self.pool.lock().set_polyphony(voices)?;
        self.polyphony.store(voices, Ordering::Relaxed);
        Ok(())
    }

    /// Set the interpolation method of one channel, or all when `None`.
    pub fn set_interp_method(
        &self,
        channel: Option<usize>,
        method: InterpolationMethod,
    ) -> Result<()> {
        match channel {
            Some(ch) => self.channel(ch)?.lock().interpolation = method,
            None => {
                for channel in self.channels.iter() {
                    channel.lock().interpolation = method;
                }
            }
        }
        Ok(())
    }

    pub fn interp_method(&self, channel: usize) -> Result<InterpolationMethod> {
        Ok(self.channel(channel)?.lock().interpolation)
    }

    pub fn active_voice_count(&self) -> usize {
        self.pool.lock().active_count()
    }

    // --- channel queries ---

    pub fn get_cc(&self, channel: usize, control: u8) -> Result<u8> {
        check_data(control, "controller")?;
        Ok(self.channel(channel)?.lock().controllers[control as usize])
    }

    pub fn get_pitch_bend(&self, channel: usize) -> Result<u16> {
        Ok(self.channel(channel)?.lock().pitch_bend)
    }

    pub fn get_pitch_wheel_sens(&self, channel: usize) -> Result<u8> {
        Ok(self.channel(channel)?.lock().pitch_wheel_sensitivity)
    }

    pub fn get_channel_pressure(&self, channel: usize) -> Result<u8> {
        Ok(self.channel(channel)?.lock().channel_pressure)
    }

    pub fn get_key_pressure(&self, channel: usize, key: u8) -> Result<u8> {
        check_data(key, "key")?;
        Ok(self.channel(channel)?.lock().key_pressure[key as usize])
    }

    pub fn channel_type(&self, channel: usize) -> Result<ChannelType> {
        Ok(self.channel(channel)?.lock().channel_type)
    }

    /// Change melodic / drum type. Takes effect at the next program change.
    pub fn set_channel_type(&self, channel: usize, channel_type: ChannelType) -> Result<()> {
        self.channel(channel)?.lock().channel_type = channel_type;
        Ok(())
    }

    /// Notes in the channel's monophonic list, oldest first.
    pub fn mono_notes(&self, channel: usize) -> Result<Vec<HeldNote>> {
        Ok(self.channel(channel)?.lock().mono.iter().collect())
    }

    /// Note that was last before the most recent mono insertion.
    pub fn previous_note(&self, channel: usize) -> Result<Option<u8>> {
        Ok(self.channel(channel)?.lock().mono.previous_note())
    }

    /// Key still held by a pedal after the mono list emptied.
    pub fn key_sustained(&self, channel: usize) -> Result<Option<u8>> {
        Ok(self.channel(channel)?.lock().key_sustained)
    }

    /// Whether the last mono note-on was a legato transition.
    pub fn legato_playing(&self, channel: usize) -> Result<bool> {
        Ok(self.channel(channel)?.lock().legato_playing)
    }

    /// Voices started with note id `id`, or every voice when `None`.
    pub fn voice_list(&self, id: Option<u32>) -> Vec<VoiceInfo> {
        let pool = self.pool.lock();
        select(&*pool, |v| id.map_or(true, |id| v.id == id)).into_vec()
    }

    // --- resets ---

    /// Release every voice of every channel and clear held notes.
    pub fn all_notes_off(&self, channel: Option<usize>) -> Result<()> {
        for ch in self.channel_range(channel)? {
            self.channel_notes_off(ch);
        }
        Ok(())
    }

    /// Stop every voice immediately and clear held notes.
    pub fn all_sounds_off(&self, channel: Option<usize>) -> Result<()> {
        for ch in self.channel_range(channel)? {
            self.channel_sounds_off(ch);
        }
        Ok(())
    }

    /// Kill all voices and return every channel to its power-on state.
    ///
    /// Legato, portamento and breath modes are kept. The basic-channel
    /// partition returns to one Omni-On/Poly zone per channel.
    pub fn system_reset(&self) {
        let _partition = self.partition_lock.lock();
        {
            let mut pool = self.pool.lock();
            for voice in select(&*pool, |_| true) {
                pool.kill(voice.handle);
            }
        }
        for channel in self.channels.iter() {
            let mut state = channel.lock();
            state.reset(channel.index(), &self.config);
            state.assignment = ModeAssignment::own(channel.index());
        }
        self.program_reset();
        debug!("System reset");
    }

    // --- low-level voice control ---

    /// Start the voices of `preset` for `key` under note id `id`, bypassing
    /// mono and legato handling.
    pub fn start(
        &self,
        id: u32,
        preset: &Arc<dyn Preset>,
        channel: usize,
        key: u8,
        velocity: u8,
    ) -> Result<()> {
        check_data(key, "key")?;
        check_data(velocity, "velocity")?;
        let start = {
            let state = self.channel(channel)?.lock();
            NoteStart {
                channel,
                key,
                velocity,
                id,
                preset: Arc::clone(preset),
                generators: state.generators,
                pitch_cents: state.pitch(key),
                glide: None,
                breath_default: state.breath_default(),
                interpolation: state.interpolation,
            }
        };
        let requests = start.requests();
        let dropped = start_requests(&mut *self.pool.lock(), &requests);
        start.report_dropped(dropped);
        Ok(())
    }

    /// Note-off every voice started with note id `id`, respecting pedals.
    pub fn stop(&self, id: u32) {
        let voices = select(&*self.pool.lock(), |v| {
            v.id == id && v.state == VoiceState::Playing
        });
        for voice in voices {
            let pedals = self.channels[voice.channel].lock().pedals();
            release_with_pedals(&mut *self.pool.lock(), &[voice], pedals);
        }
    }

    // --- internals ---

    pub(crate) fn channel(&self, channel: usize) -> Result<&Channel> {
        self.channels.get(channel).ok_or_else(|| {
            Error::invalid(format!(
                "channel {channel} (have {} channels)",
                self.channels.len()
            ))
        })
    }

    fn channel_range(&self, channel: Option<usize>) -> Result<std::ops::Range<usize>> {
        match channel {
            Some(ch) => {
                self.channel(ch)?;
                Ok(ch..ch + 1)
            }
            None => Ok(0..self.channels.len()),
        }
    }

    pub(crate) fn next_note_id(&self) -> u32 {
        self.note_id.fetch_add(1, Ordering::Relaxed)
    }

    pub(crate) fn current_note_id(&self) -> u32 {
        self.note_id.load(Ordering::Relaxed)
    }

    /// Release everything sounding on `channel` and forget held notes.
    pub(crate) fn channel_notes_off(&self, channel: usize) {
        self.channels[channel].lock().reset_playing();
        let mut pool = self.pool.lock();
        for voice in select(&*pool, |v| v.channel == channel && v.state.is_on()) {
            pool.release(voice.handle, ReleaseKind::Normal);
        }
    }

    pub(crate) fn channel_sounds_off(&self, channel: usize) {
        self.channels[channel].lock().reset_playing();
        let mut pool = self.pool.lock();
        for voice in select(&*pool, |v| v.channel == channel) {
            pool.kill(voice.handle);
        }
    }
}

/// Voices matching `keep`.
pub(crate) fn select<P: VoicePool + ?Sized>(
    pool: &P,
    mut keep: impl FnMut(&VoiceInfo) -> bool,
) -> VoiceList {
    let mut voices = VoiceList::new();
    pool.for_each_voice(&mut |voice| {
        if keep(voice) {
            voices.push(*voice);
        }
    });
    voices
}

/// Allocate and start `requests`. Returns how many the pool refused.
pub(crate) fn start_requests<P: VoicePool + ?Sized>(
    pool: &mut P,
    requests: &[VoiceRequest],
) -> usize {
    let mut dropped = 0;
    for request in requests {
        match pool.allocate(request) {
            Ok(handle) => pool.start(handle),
            Err(_) => dropped += 1,
        }
    }
    dropped
}

/// Note-off for key-down voices: sostenuto hold, then sustain, then release.
///
/// Returns true if any voice was held by a pedal.
pub(crate) fn release_with_pedals<P: VoicePool + ?Sized>(
    pool: &mut P,
    voices: &[VoiceInfo],
    pedals: Pedals,
) -> bool {
    let mut held = false;
    for voice in voices.iter().filter(|v| v.state == VoiceState::Playing) {
        if pedals.sostenuto && voice.id < pedals.sostenuto_order_id {
            pool.hold(voice.handle, Hold::Sostenuto);
            held = true;
        } else if pedals.sustain {
            pool.hold(voice.handle, Hold::Sustain);
            held = true;
        } else {
            pool.release(voice.handle, ReleaseKind::Normal);
        }
    }
    held
}

#[inline]
pub(crate) fn check_data(value: u8, what: &str) -> Result<()> {
    if value as usize >= MIDI_KEYS {
        return Err(Error::invalid(format!("{what} {value} (expected 0-127)")));
    }
    Ok(())
}
