//! Channel-voice event dispatch.

use cantus_midi::{cc, ChannelMessage, MidiEvent, Parsed, RawMessages, PITCH_BEND_CENTER};
use parking_lot::MutexGuard;
use tracing::debug;

use crate::channel::ChannelState;
use crate::generator::GenParam;
use crate::nrpn::DataEntry;
use crate::portamento::glide_source;
use crate::voice::{ControlUpdate, Hold, ReleaseKind, VoicePool, VoiceState};
use crate::{Error, Result};

use super::{check_data, release_with_pedals, select, start_requests, NoteStart, Synth};

impl<P: VoicePool> Synth<P> {
    /// Dispatch every channel message carried by `event`.
    pub fn handle_midi_event(&self, event: &MidiEvent) -> Result<()> {
        let channel = event.channel_num() as usize;
        for msg in event.channel_messages() {
            self.handle_channel_message(channel, msg)?;
        }
        Ok(())
    }

    pub fn handle_channel_message(&self, channel: usize, msg: ChannelMessage) -> Result<()> {
        match msg {
            ChannelMessage::NoteOn { key, velocity } => self.noteon(channel, key, velocity),
            ChannelMessage::NoteOff { key, .. } => self.noteoff(channel, key),
            ChannelMessage::KeyPressure { key, pressure } => {
                self.key_pressure(channel, key, pressure)
            }
            ChannelMessage::ControlChange { control, value } => self.cc(channel, control, value),
            ChannelMessage::ProgramChange { program } => self.program_change(channel, program),
            ChannelMessage::ChannelPressure { pressure } => {
                self.channel_pressure(channel, pressure)
            }
            ChannelMessage::PitchBend { value } => self.pitch_bend(channel, value),
        }
    }

    /// Parse and dispatch a raw MIDI byte stream.
    ///
    /// Stops at the first malformed message or rejected event.
    pub fn handle_midi_bytes(&self, bytes: &[u8]) -> Result<()> {
        for parsed in RawMessages::new(bytes) {
            match parsed? {
                Parsed::Channel { channel, msg } => {
                    self.handle_channel_message(channel as usize, msg)?
                }
                Parsed::Sysex(data) => {
                    let reply = self.sysex(data, false)?;
                    if !reply.handled {
                        debug!("Ignored sysex message ({} bytes)", data.len());
                    }
                }
                Parsed::SystemReset => self.system_reset(),
            }
        }
        Ok(())
    }

    // --- notes ---

    pub fn noteon(&self, channel: usize, key: u8, velocity: u8) -> Result<()> {
        check_data(key, "key")?;
        check_data(velocity, "velocity")?;
        if velocity == 0 {
            return self.noteoff(channel, key);
        }

        let state = self.channel(channel)?.lock();
        if !state.assignment.enabled {
            debug!("Note-on {key} ignored on disabled channel {channel}");
            return Ok(());
        }
        if state.current_preset().is_none() {
            return Err(Error::not_found(format!("no preset on channel {channel}")));
        }

        if state.is_playing_mono() {
            self.mono_noteon(state, channel, key, velocity)
        } else {
            self.poly_noteon(state, channel, key, velocity)
        }
    }

    pub fn noteoff(&self, channel: usize, key: u8) -> Result<()> {
        check_data(key, "key")?;
        let mut state = self.channel(channel)?.lock();
        if !state.assignment.enabled {
            debug!("Note-off {key} ignored on disabled channel {channel}");
            return Ok(());
        }

        if state.is_playing_mono() {
            self.mono_noteoff(state, channel, key);
        } else {
            state.mono.remove(key);
            let pedals = state.pedals();
            drop(state);
            self.release_key(channel, key, pedals);
        }
        Ok(())
    }

    fn poly_noteon(
        &self,
        mut state: MutexGuard<'_, ChannelState>,
        channel: usize,
        key: u8,
        velocity: u8,
    ) -> Result<()> {
        let legato = !state.mono.is_empty();
        state.mono.keep_last_only();
        let pushed = state.mono.push(key, velocity);
        state.legato_playing = legato;

        let control = state.portamento_control.take();
        let from = glide_source(state.portamento_mode, legato, control, pushed.previous);
        let glide = state.glide(from);
        let id = self.next_note_id();
        let Some(start) = NoteStart::resolve(&state, channel, key, velocity, id, glide) else {
            return Err(Error::not_found(format!("no preset on channel {channel}")));
        };
        drop(state);

        let requests = start.requests();
        let dropped = {
            let mut pool = self.pool.lock();
            release_same_key(&mut *pool, channel, key);
            start_requests(&mut *pool, &requests)
        };
        start.report_dropped(dropped);
        Ok(())
    }

    /// Note-off for the key-down voices of `key`. Returns true if a pedal
    /// holds any of them.
    pub(crate) fn release_key(
        &self,
        channel: usize,
        key: u8,
        pedals: crate::channel::Pedals,
    ) -> bool {
        let mut pool = self.pool.lock();
        let voices = select(&*pool, |v| {
            v.channel == channel && v.key == key && v.state == VoiceState::Playing
        });
        release_with_pedals(&mut *pool, &voices, pedals)
    }

    // --- controllers ---

    /// Control change.
    pub fn cc(&self, channel: usize, control: u8, value: u8) -> Result<()> {
        check_data(control, "controller")?;
        check_data(value, "controller value")?;
        if (cc::OMNI_OFF..=cc::POLY_ON).contains(&control) {
            self.channel(channel)?;
            self.mode_message(channel, control, value);
            return Ok(());
        }

        let mut guard = self.channel(channel)?.lock();
        if !guard.assignment.enabled {
            debug!("CC{control} ignored on disabled channel {channel}");
            return Ok(());
        }
        let state = &mut *guard;
        let previous = state.controllers[control as usize];
        state.controllers[control as usize] = value;

        match control {
            cc::ALL_SOUND_OFF => {
                drop(guard);
                self.channel_sounds_off(channel);
            }
            cc::ALL_NOTES_OFF => {
                drop(guard);
                self.channel_notes_off(channel);
            }
            cc::ALL_CTRL_OFF => {
                let (sustain, sostenuto) = (state.sustain_down(), state.sostenuto_down());
                state.init_controllers(true);
                state.key_sustained = None;
                let mut updates: Vec<ControlUpdate> =
                    forwarded_controllers(&state.controllers).collect();
                updates.push(ControlUpdate::PitchBend(PITCH_BEND_CENTER));
                updates.push(ControlUpdate::ChannelPressure(0));
                drop(guard);
                if sustain {
                    self.release_held(channel, VoiceState::Sustained, None);
                }
                if sostenuto {
                    self.release_held(channel, VoiceState::HeldBySostenuto, None);
                }
                self.modulate_voices(channel, None, &updates);
            }
            cc::LOCAL_CONTROL => {}
            cc::SUSTAIN_SWITCH => {
                if !cc::is_on(value) && cc::is_on(previous) {
                    state.key_sustained = None;
                    drop(guard);
                    self.release_held(channel, VoiceState::Sustained, None);
                } else {
                    drop(guard);
                }
                self.modulate_voices(channel, None, &[ControlUpdate::Controller { control, value }]);
            }
            cc::SOSTENUTO_SWITCH => {
                if cc::is_on(value) && !cc::is_on(previous) {
                    state.sostenuto_order_id = self.current_note_id();
                    drop(guard);
                } else if !cc::is_on(value) && cc::is_on(previous) {
                    let sustain = state.sustain_down();
                    drop(guard);
                    let rehold = sustain.then_some(Hold::Sustain);
                    self.release_held(channel, VoiceState::HeldBySostenuto, rehold);
                } else {
                    drop(guard);
                }
                self.modulate_voices(channel, None, &[ControlUpdate::Controller { control, value }]);
            }
            cc::LEGATO_SWITCH => {
                if !cc::is_on(value) && cc::is_on(previous) && !state.assignment.is_mono() {
                    state.mono.keep_last_only();
                }
                drop(guard);
                self.modulate_voices(channel, None, &[ControlUpdate::Controller { control, value }]);
            }
            cc::PORTAMENTO_CTRL => {
                state.portamento_control = Some(value);
                drop(guard);
                self.modulate_voices(channel, None, &[ControlUpdate::Controller { control, value }]);
            }
            cc::BREATH_MSB => {
                self.breath_change(guard, channel, value);
                self.modulate_voices(channel, None, &[ControlUpdate::Controller { control, value }]);
            }
            cc::BANK_SELECT_MSB | cc::BANK_SELECT_LSB => state.bank = state.selected_bank(),
            cc::DATA_ENTRY_MSB
            | cc::DATA_ENTRY_LSB
            | cc::DATA_ENTRY_INCR
            | cc::DATA_ENTRY_DECR
            | cc::NRPN_LSB
            | cc::NRPN_MSB
            | cc::RPN_LSB
            | cc::RPN_MSB => {
                if let Some(entry) = state.params.control(control, value, &mut state.controllers) {
                    self.data_entry(guard, channel, entry);
                }
            }
            _ => {
                drop(guard);
                self.modulate_voices(channel, None, &[ControlUpdate::Controller { control, value }]);
            }
        }
        Ok(())
    }

    /// Reset controllers the way CC121 does.
    pub fn all_controllers_off(&self, channel: usize) -> Result<()> {
        self.cc(channel, cc::ALL_CTRL_OFF, 0)
    }

    pub fn pitch_bend(&self, channel: usize, value: u16) -> Result<()> {
        if value > 0x3FFF {
            return Err(Error::invalid(format!("pitch bend {value} (expected 0-16383)")));
        }
        let mut state = self.channel(channel)?.lock();
        if !state.assignment.enabled {
            debug!("Pitch bend ignored on disabled channel {channel}");
            return Ok(());
        }
        state.pitch_bend = value;
        drop(state);
        self.modulate_voices(channel, None, &[ControlUpdate::PitchBend(value)]);
        Ok(())
    }

    /// Pitch wheel sensitivity in semitones.
    pub fn pitch_wheel_sens(&self, channel: usize, semitones: u8) -> Result<()> {
        check_data(semitones, "pitch wheel sensitivity")?;
        self.channel(channel)?.lock().pitch_wheel_sensitivity = semitones;
        self.modulate_voices(
            channel,
            None,
            &[ControlUpdate::PitchWheelSensitivity(semitones)],
        );
        Ok(())
    }

    pub fn channel_pressure(&self, channel: usize, pressure: u8) -> Result<()> {
        check_data(pressure, "pressure")?;
        let mut state = self.channel(channel)?.lock();
        if !state.assignment.enabled {
            debug!("Channel pressure ignored on disabled channel {channel}");
            return Ok(());
        }
        state.channel_pressure = pressure;
        drop(state);
        self.modulate_voices(channel, None, &[ControlUpdate::ChannelPressure(pressure)]);
        Ok(())
    }

    pub fn key_pressure(&self, channel: usize, key: u8, pressure: u8) -> Result<()> {
        check_data(key, "key")?;
        check_data(pressure, "pressure")?;
        let mut state = self.channel(channel)?.lock();
        if !state.assignment.enabled {
            debug!("Key pressure ignored on disabled channel {channel}");
            return Ok(());
        }
        state.key_pressure[key as usize] = pressure;
        drop(state);
        self.modulate_voices(
            channel,
            Some(key),
            &[ControlUpdate::KeyPressure { key, pressure }],
        );
        Ok(())
    }

    /// Apply a completed RPN / NRPN data entry.
    fn data_entry(
        &self,
        mut state: MutexGuard<'_, ChannelState>,
        channel: usize,
        entry: DataEntry,
    ) {
        match entry {
            DataEntry::Generator { param, value } => {
                state.generators.set(param, value, false);
                self.update_generator_voices(channel, param, value, false);
            }
            DataEntry::PitchBendRange(semitones) => {
                state.pitch_wheel_sensitivity = semitones;
                drop(state);
                self.modulate_voices(
                    channel,
                    None,
                    &[ControlUpdate::PitchWheelSensitivity(semitones)],
                );
            }
            DataEntry::FineTune(cents) => {
                state.generators.set(GenParam::FineTune, cents, false);
                self.update_generator_voices(channel, GenParam::FineTune, cents, false);
            }
            DataEntry::CoarseTune(semitones) => {
                state.generators.set(GenParam::CoarseTune, semitones, false);
                self.update_generator_voices(channel, GenParam::CoarseTune, semitones, false);
            }
            DataEntry::TuningProgram(program) => {
                state.tuning_program = program;
                let bank = state.tuning_bank;
                drop(state);
                if let Err(e) = self.activate_tuning(channel, bank, program, true) {
                    debug!("Tuning program change on channel {channel}: {e}");
                }
            }
            DataEntry::TuningBank(bank) => state.tuning_bank = bank,
        }
    }

    /// Move pedal-held voices on: to `rehold` if given, else release them.
    fn release_held(&self, channel: usize, held: VoiceState, rehold: Option<Hold>) {
        let mut pool = self.pool.lock();
        for voice in select(&*pool, |v| v.channel == channel && v.state == held) {
            match rehold {
                Some(hold) => pool.hold(voice.handle, hold),
                None => pool.release(voice.handle, ReleaseKind::Normal),
            }
        }
    }

    /// Forward channel updates to the channel's sounding voices, or only
    /// those playing `key`.
    pub(crate) fn modulate_voices(
        &self,
        channel: usize,
        key: Option<u8>,
        updates: &[ControlUpdate],
    ) {
        let mut pool = self.pool.lock();
        let voices = select(&*pool, |v| {
            v.channel == channel
                && v.state != VoiceState::Idle
                && key.map_or(true, |key| v.key == key)
        });
        for voice in voices {
            for &update in updates {
                pool.modulate(voice.handle, update);
            }
        }
    }

    /// Called with the channel locked, so voices see generator writes in
    /// cache order.
    pub(crate) fn update_generator_voices(
        &self,
        channel: usize,
        param: GenParam,
        value: f32,
        absolute: bool,
    ) {
        let mut pool = self.pool.lock();
        for voice in select(&*pool, |v| v.channel == channel && v.state.is_on()) {
            pool.update_generator(voice.handle, param, value, absolute);
        }
    }
}

/// Release any voice still sounding `key` on `channel`.
pub(crate) fn release_same_key<P: VoicePool + ?Sized>(pool: &mut P, channel: usize, key: u8) {
    for voice in select(&*pool, |v| v.channel == channel && v.key == key && v.state.is_on()) {
        pool.release(voice.handle, ReleaseKind::Normal);
    }
}

/// Controllers voices care about; parameter-number and bank controllers
/// are consumed by the channel.
fn forwarded_controllers(controllers: &[u8; 128]) -> impl Iterator<Item = ControlUpdate> + '_ {
    (0..cc::ALL_SOUND_OFF)
        .filter(|&control| {
            !matches!(
                control,
                cc::BANK_SELECT_MSB
                    | cc::BANK_SELECT_LSB
                    | cc::DATA_ENTRY_MSB
                    | cc::DATA_ENTRY_LSB
                    | cc::DATA_ENTRY_INCR..=cc::RPN_MSB
            )
        })
        .map(|control| ControlUpdate::Controller {
            control,
            value: controllers[control as usize],
        })
}
