//! Per-channel state.
//!
//! Everything a channel knows lives in [`ChannelState`] behind one mutex.
//! The dispatch core locks it, updates it and copies out what the voice
//! pool needs before calling the pool.

use std::sync::{Arc, Weak};

use cantus_midi::{cc, MIDI_KEYS, PITCH_BEND_CENTER};
use parking_lot::{Mutex, MutexGuard};

use crate::config::{InterpolationMethod, SynthConfig};
use crate::generator::GeneratorCache;
use crate::legato::LegatoMode;
use crate::mode::{BreathMode, ModeAssignment};
use crate::mono_list::MonoList;
use crate::nrpn::ParamParser;
use crate::portamento::{Glide, PortamentoMode};
use crate::soundfont::{Preset, SoundFontId};
use crate::tuning::{equal_cents, Tuning, TuningId};

/// MIDI channel that defaults to percussion.
pub const DRUM_CHANNEL: usize = 9;

/// Bank used for percussion presets.
pub const DRUM_BANK: u32 = 128;

/// Default pitch wheel sensitivity in semitones.
pub const DEFAULT_PITCH_WHEEL_SENSITIVITY: u8 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChannelType {
    #[default]
    Melodic,
    Drum,
}

impl ChannelType {
    pub fn default_for(channel: usize) -> Self {
        if channel % 16 == DRUM_CHANNEL {
            ChannelType::Drum
        } else {
            ChannelType::Melodic
        }
    }
}

/// Preset selection reported by [`Synth::channel_info`](crate::Synth::channel_info).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelInfo {
    pub sfont: Option<SoundFontId>,
    pub bank: u32,
    pub program: u8,
    /// Name of the bound preset, empty when none.
    pub name: String,
}

/// Mutable state of one MIDI channel.
pub struct ChannelState {
    pub(crate) assignment: ModeAssignment,
    pub(crate) breath: BreathMode,
    /// Last mono note-on was a legato transition.
    pub(crate) legato_playing: bool,
    pub(crate) mono: MonoList,
    /// Key still held by a pedal after the mono list emptied.
    pub(crate) key_sustained: Option<u8>,
    pub(crate) legato_mode: LegatoMode,
    pub(crate) portamento_mode: PortamentoMode,
    /// Pending portamento-control key (CC84), consumed by the next note-on.
    pub(crate) portamento_control: Option<u8>,
    pub(crate) previous_breath: u8,

    pub(crate) controllers: [u8; MIDI_KEYS],
    pub(crate) key_pressure: [u8; MIDI_KEYS],
    pub(crate) channel_pressure: u8,
    pub(crate) pitch_bend: u16,
    pub(crate) pitch_wheel_sensitivity: u8,
    pub(crate) sostenuto_order_id: u32,
    pub(crate) interpolation: InterpolationMethod,

    pub(crate) sfont: Option<SoundFontId>,
    pub(crate) bank: u32,
    pub(crate) program: u8,
    pub(crate) preset: Option<Weak<dyn Preset>>,

    pub(crate) generators: GeneratorCache,
    pub(crate) params: ParamParser,

    pub(crate) tuning: Option<Arc<Tuning>>,
    /// Table id `tuning` was bound from.
    pub(crate) tuning_id: TuningId,
    /// Tuning bank / program selected by RPN.
    pub(crate) tuning_bank: u8,
    pub(crate) tuning_program: u8,

    pub(crate) channel_type: ChannelType,
}

impl ChannelState {
    pub(crate) fn new(index: usize, config: &SynthConfig) -> Self {
        let mut state = Self {
            assignment: ModeAssignment::own(index),
            breath: BreathMode::default(),
            legato_playing: false,
            mono: MonoList::new(),
            key_sustained: None,
            legato_mode: config.legato_mode,
            portamento_mode: config.portamento_mode,
            portamento_control: None,
            previous_breath: 0,
            controllers: [0; MIDI_KEYS],
            key_pressure: [0; MIDI_KEYS],
            channel_pressure: 0,
            pitch_bend: PITCH_BEND_CENTER,
            pitch_wheel_sensitivity: DEFAULT_PITCH_WHEEL_SENSITIVITY,
            sostenuto_order_id: 0,
            interpolation: config.interpolation,
            sfont: None,
            bank: 0,
            program: 0,
            preset: None,
            generators: GeneratorCache::default(),
            params: ParamParser::default(),
            tuning: None,
            tuning_id: (0, 0),
            tuning_bank: 0,
            tuning_program: 0,
            channel_type: ChannelType::default_for(index),
        };
        state.reset(index, config);
        state
    }

    /// Full reset (system reset). Legato, portamento and breath modes are
    /// kept; the partition is handled by the caller.
    pub(crate) fn reset(&mut self, index: usize, config: &SynthConfig) {
        self.channel_type = ChannelType::default_for(index);
        self.interpolation = config.interpolation;
        self.tuning = None;
        self.tuning_bank = 0;
        self.tuning_program = 0;
        self.sfont = None;
        self.bank = self.default_bank();
        self.program = 0;
        self.preset = None;
        self.previous_breath = 0;
        self.reset_playing();
        self.init_controllers(false);
    }

    /// Forget held notes: mono list, sustained key, pending portamento key.
    pub(crate) fn reset_playing(&mut self) {
        self.mono.reset();
        self.key_sustained = None;
        self.legato_playing = false;
        self.portamento_control = None;
    }

    /// Reset controllers, pressures, pitch bend and generator overrides.
    ///
    /// `all_ctrl_off` is the CC121 form: bank, volume, pan, sound
    /// controllers and effects depths keep their values and pitch wheel
    /// sensitivity is untouched.
    pub(crate) fn init_controllers(&mut self, all_ctrl_off: bool) {
        self.channel_pressure = 0;
        self.pitch_bend = PITCH_BEND_CENTER;
        self.key_pressure = [0; MIDI_KEYS];
        self.generators.reset();
        self.params.reset();
        self.portamento_control = None;

        if all_ctrl_off {
            for control in 0..cc::ALL_SOUND_OFF {
                if !keeps_value_on_all_ctrl_off(control) {
                    self.controllers[control as usize] = 0;
                }
            }
        } else {
            self.controllers = [0; MIDI_KEYS];
            self.pitch_wheel_sensitivity = DEFAULT_PITCH_WHEEL_SENSITIVITY;
            for control in cc::SOUND_CTRL1..=cc::SOUND_CTRL10 {
                self.controllers[control as usize] = 64;
            }
            self.controllers[cc::VOLUME_MSB as usize] = 100;
            self.controllers[cc::PAN_MSB as usize] = 64;
            self.controllers[cc::BALANCE_MSB as usize] = 64;
        }

        // Null RPN / NRPN
        for control in [cc::RPN_LSB, cc::RPN_MSB, cc::NRPN_LSB, cc::NRPN_MSB] {
            self.controllers[control as usize] = 127;
        }
        self.controllers[cc::EXPRESSION_MSB as usize] = 127;
        self.controllers[cc::EXPRESSION_LSB as usize] = 127;
    }

    pub(crate) fn default_bank(&self) -> u32 {
        match self.channel_type {
            ChannelType::Drum => DRUM_BANK,
            ChannelType::Melodic => 0,
        }
    }

    /// Bank from the bank select controllers.
    pub(crate) fn selected_bank(&self) -> u32 {
        match self.channel_type {
            ChannelType::Drum => DRUM_BANK,
            ChannelType::Melodic => {
                (self.controllers[cc::BANK_SELECT_MSB as usize] as u32) * 128
                    + self.controllers[cc::BANK_SELECT_LSB as usize] as u32
            }
        }
    }

    /// Bound preset, if it still exists.
    pub(crate) fn current_preset(&self) -> Option<Arc<dyn Preset>> {
        self.preset.as_ref().and_then(Weak::upgrade)
    }

    pub(crate) fn set_preset(&mut self, preset: Option<&Arc<dyn Preset>>) {
        self.preset = preset.map(Arc::downgrade);
    }

    /// Mono mode or legato pedal down.
    #[inline]
    pub(crate) fn is_playing_mono(&self) -> bool {
        self.assignment.is_mono() || cc::is_on(self.controllers[cc::LEGATO_SWITCH as usize])
    }

    #[inline]
    pub(crate) fn sustain_down(&self) -> bool {
        cc::is_on(self.controllers[cc::SUSTAIN_SWITCH as usize])
    }

    #[inline]
    pub(crate) fn sostenuto_down(&self) -> bool {
        cc::is_on(self.controllers[cc::SOSTENUTO_SWITCH as usize])
    }

    /// Breath sync is on and breath is at rest: mono notes don't sound.
    #[inline]
    pub(crate) fn breath_gated(&self) -> bool {
        self.breath.sync && self.controllers[cc::BREATH_MSB as usize] == 0
    }

    pub(crate) fn breath_default(&self) -> bool {
        if self.is_playing_mono() {
            self.breath.mono_default
        } else {
            self.breath.poly_default
        }
    }

    pub(crate) fn glide(&self, from_key: Option<u8>) -> Option<Glide> {
        from_key.map(|from_key| Glide {
            from_key,
            from_cents: self.pitch(from_key),
            time_ms: Glide::time_from_controllers(
                self.controllers[cc::PORTAMENTO_TIME_MSB as usize],
                self.controllers[cc::PORTAMENTO_TIME_LSB as usize],
            ),
        })
    }

    /// Tuned pitch of `key` in cents.
    #[inline]
    pub(crate) fn pitch(&self, key: u8) -> f32 {
        match &self.tuning {
            Some(tuning) => tuning.pitch(key),
            None => equal_cents(key),
        }
    }

    pub(crate) fn pedals(&self) -> Pedals {
        Pedals {
            sustain: self.sustain_down(),
            sostenuto: self.sostenuto_down(),
            sostenuto_order_id: self.sostenuto_order_id,
        }
    }
}

fn keeps_value_on_all_ctrl_off(control: u8) -> bool {
    (cc::EFFECTS_DEPTH1..=cc::EFFECTS_DEPTH5).contains(&control)
        || (cc::SOUND_CTRL1..=cc::SOUND_CTRL10).contains(&control)
        || matches!(
            control,
            cc::BANK_SELECT_MSB
                | cc::BANK_SELECT_LSB
                | cc::VOLUME_MSB
                | cc::VOLUME_LSB
                | cc::PAN_MSB
                | cc::PAN_LSB
        )
}

/// Pedal state copied out for note-off decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) struct Pedals {
    pub sustain: bool,
    pub sostenuto: bool,
    pub sostenuto_order_id: u32,
}

/// A MIDI channel: stable index plus locked state.
pub struct Channel {
    index: usize,
    state: Mutex<ChannelState>,
}

impl Channel {
    pub(crate) fn new(index: usize, config: &SynthConfig) -> Self {
        Self {
            index,
            state: Mutex::new(ChannelState::new(index, config)),
        }
    }

    #[inline]
    pub fn index(&self) -> usize {
        self.index
    }

    #[inline]
    pub(crate) fn lock(&self) -> MutexGuard<'_, ChannelState> {
        self.state.lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(index: usize) -> ChannelState {
        ChannelState::new(index, &SynthConfig::default())
    }

    #[test]
    fn test_initial_controllers() {
        let s = state(0);
        assert_eq!(s.controllers[cc::VOLUME_MSB as usize], 100);
        assert_eq!(s.controllers[cc::PAN_MSB as usize], 64);
        assert_eq!(s.controllers[cc::EXPRESSION_MSB as usize], 127);
        assert_eq!(s.controllers[cc::RPN_MSB as usize], 127);
        assert_eq!(s.controllers[cc::NRPN_LSB as usize], 127);
        assert_eq!(s.controllers[cc::SOUND_CTRL1 as usize + 3], 64);
        assert_eq!(s.pitch_bend, PITCH_BEND_CENTER);
        assert_eq!(s.pitch_wheel_sensitivity, 2);
    }

    #[test]
    fn test_all_ctrl_off_keeps_mix_controllers() {
        let mut s = state(0);
        s.controllers[cc::VOLUME_MSB as usize] = 20;
        s.controllers[cc::MODULATION_MSB as usize] = 90;
        s.controllers[cc::EFFECTS_DEPTH1 as usize] = 50;
        s.controllers[cc::BANK_SELECT_MSB as usize] = 1;
        s.pitch_wheel_sensitivity = 12;
        s.pitch_bend = 0;

        s.init_controllers(true);
        assert_eq!(s.controllers[cc::VOLUME_MSB as usize], 20);
        assert_eq!(s.controllers[cc::EFFECTS_DEPTH1 as usize], 50);
        assert_eq!(s.controllers[cc::BANK_SELECT_MSB as usize], 1);
        assert_eq!(s.controllers[cc::MODULATION_MSB as usize], 0);
        assert_eq!(s.pitch_wheel_sensitivity, 12);
        assert_eq!(s.pitch_bend, PITCH_BEND_CENTER);
    }

    #[test]
    fn test_drum_channel_defaults() {
        let drum = state(DRUM_CHANNEL);
        assert_eq!(drum.channel_type, ChannelType::Drum);
        assert_eq!(drum.bank, DRUM_BANK);
        assert_eq!(state(0).channel_type, ChannelType::Melodic);
    }

    #[test]
    fn test_playing_mono_via_legato_pedal() {
        let mut s = state(0);
        assert!(!s.is_playing_mono());
        s.controllers[cc::LEGATO_SWITCH as usize] = 127;
        assert!(s.is_playing_mono());
    }

    #[test]
    fn test_glide_time_from_controllers() {
        let mut s = state(0);
        s.controllers[cc::PORTAMENTO_TIME_MSB as usize] = 2;
        s.controllers[cc::PORTAMENTO_TIME_LSB as usize] = 10;
        assert_eq!(
            s.glide(Some(60)),
            Some(Glide {
                from_key: 60,
                from_cents: 6000.0,
                time_ms: 266
            })
        );
        assert_eq!(s.glide(None), None);
    }

    #[test]
    fn test_glide_source_pitch_follows_tuning() {
        let mut s = state(0);
        s.tuning = Some(Arc::new(Tuning::from_octave("sharp", &[25.0; 12])));
        let glide = s.glide(Some(60)).unwrap();
        assert_eq!(glide.from_key, 60);
        assert_eq!(glide.from_cents, 6025.0);
    }
}
