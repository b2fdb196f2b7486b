//! Tuning management and per-channel tuning binding.

use std::sync::Arc;

use tracing::debug;

use crate::tuning::{equal_cents, Tuning, TuningId};
use crate::voice::VoicePool;
use crate::{Error, Result, MIDI_KEYS};

use super::{check_data, select, Synth};

impl<P: VoicePool> Synth<P> {
    /// Create or replace a tuning with an explicit pitch (cents) per key.
    ///
    /// Channels bound to the replaced tuning are rebound; with `apply`
    /// their sounding voices are retuned.
    pub fn activate_key_tuning(
        &self,
        bank: u8,
        program: u8,
        name: &str,
        pitches: &[f32; MIDI_KEYS],
        apply: bool,
    ) -> Result<()> {
        self.register_tuning(bank, program, Tuning::from_keys(name, pitches), apply)
    }

    /// Create or replace an octave tuning from 12 deviations in cents.
    pub fn activate_octave_tuning(
        &self,
        bank: u8,
        program: u8,
        name: &str,
        deviations: &[f32; 12],
        apply: bool,
    ) -> Result<()> {
        self.register_tuning(bank, program, Tuning::from_octave(name, deviations), apply)
    }

    pub fn create_key_tuning(
        &self,
        bank: u8,
        program: u8,
        name: &str,
        pitches: &[f32; MIDI_KEYS],
    ) -> Result<()> {
        self.activate_key_tuning(bank, program, name, pitches, false)
    }

    pub fn create_octave_tuning(
        &self,
        bank: u8,
        program: u8,
        name: &str,
        deviations: &[f32; 12],
    ) -> Result<()> {
        self.activate_octave_tuning(bank, program, name, deviations, false)
    }

    /// Store `tuning` at (bank, program), e.g. one of the temperament
    /// presets, and rebind channels using the entry it replaces.
    pub fn register_tuning(&self, bank: u8, program: u8, tuning: Tuning, apply: bool) -> Result<()> {
        let (_, old) = self.tunings.insert(bank, program, tuning)?;
        if old.is_some() {
            self.rebind_tuning(bank, program, apply);
        }
        Ok(())
    }

    /// Set the pitch (cents) of some keys of an existing tuning.
    pub fn tune_notes(
        &self,
        bank: u8,
        program: u8,
        keys: &[u8],
        pitches: &[f32],
        apply: bool,
    ) -> Result<()> {
        if keys.len() != pitches.len() {
            return Err(Error::invalid(format!(
                "{} keys but {} pitches",
                keys.len(),
                pitches.len()
            )));
        }
        for &key in keys {
            check_data(key, "key")?;
        }
        self.tunings.update(bank, program, |tuning| {
            for (&key, &cents) in keys.iter().zip(pitches) {
                tuning.set_pitch(key, cents);
            }
        })?;
        self.rebind_tuning(bank, program, apply);
        Ok(())
    }

    /// Bind a registered tuning to `channel`.
    pub fn activate_tuning(&self, channel: usize, bank: u8, program: u8, apply: bool) -> Result<()> {
        let mut state = self.channel(channel)?.lock();
        let tuning = self.tunings.lookup(bank, program)?;
        state.tuning = Some(Arc::clone(&tuning));
        state.tuning_id = (bank, program);
        state.tuning_bank = bank;
        state.tuning_program = program;
        if apply {
            self.retune_voices(channel, Some(&tuning));
        }
        drop(state);
        debug!("Channel {channel} uses tuning {bank}/{program} '{}'", tuning.name());
        Ok(())
    }

    /// Return `channel` to equal temperament.
    pub fn deactivate_tuning(&self, channel: usize, apply: bool) -> Result<()> {
        let mut state = self.channel(channel)?.lock();
        state.tuning = None;
        if apply {
            self.retune_voices(channel, None);
        }
        Ok(())
    }

    /// Bind a tuning for future notes only.
    pub fn select_tuning(&self, channel: usize, bank: u8, program: u8) -> Result<()> {
        self.activate_tuning(channel, bank, program, false)
    }

    pub fn reset_tuning(&self, channel: usize) -> Result<()> {
        self.deactivate_tuning(channel, false)
    }

    /// Tuning bound to `channel`, `None` for equal temperament.
    pub fn channel_tuning(&self, channel: usize) -> Result<Option<Arc<Tuning>>> {
        Ok(self.channel(channel)?.lock().tuning.clone())
    }

    /// Snapshot of registered tuning ids in (bank, program) order.
    pub fn tuning_iter(&self) -> std::vec::IntoIter<TuningId> {
        self.tunings.ids()
    }

    /// Name and per-key pitches of a registered tuning.
    pub fn tuning_dump(&self, bank: u8, program: u8) -> Result<(String, [f32; MIDI_KEYS])> {
        let tuning = self.tunings.lookup(bank, program)?;
        Ok((tuning.name().to_string(), *tuning.pitches()))
    }

    /// Point every channel bound to (bank, program) at the table's
    /// current entry, read under that channel's lock.
    fn rebind_tuning(&self, bank: u8, program: u8, apply: bool) {
        for channel in self.channels.iter() {
            let mut state = channel.lock();
            if state.tuning.is_none() || state.tuning_id != (bank, program) {
                continue;
            }
            let Some(tuning) = self.tunings.get(bank, program) else {
                continue;
            };
            state.tuning = Some(Arc::clone(&tuning));
            if apply {
                self.retune_voices(channel.index(), Some(&tuning));
            }
        }
    }

    /// Called with the channel locked.
    fn retune_voices(&self, channel: usize, tuning: Option<&Arc<Tuning>>) {
        let mut pool = self.pool.lock();
        for voice in select(&*pool, |v| v.channel == channel && v.state.is_on()) {
            let cents = match tuning {
                Some(tuning) => tuning.pitch(voice.key),
                None => equal_cents(voice.key),
            };
            pool.set_pitch(voice.handle, cents);
        }
    }
}
