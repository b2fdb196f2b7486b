//! SoundFont registry access and preset selection.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::channel::{ChannelInfo, ChannelType, DRUM_BANK};
use crate::soundfont::{Preset, SoundFont, SoundFontId};
use crate::voice::VoicePool;
use crate::{Error, Result};

use super::{check_data, Synth};

/// Highest bank reachable with bank select MSB / LSB.
const MAX_BANK: u32 = 128 * 128 - 1;

impl<P: VoicePool> Synth<P> {
    /// Register a font at the front of the search order.
    ///
    /// With `reset_presets` every channel re-resolves its program.
    pub fn add_soundfont(&self, font: Arc<dyn SoundFont>, reset_presets: bool) -> SoundFontId {
        let id = self.soundfonts.add(font);
        debug!("Added soundfont {}", id.id());
        if reset_presets {
            self.program_reset();
        }
        id
    }

    /// Unregister a font. Channels bound to its presets fall silent unless
    /// `reset_presets` lets them re-resolve.
    pub fn remove_soundfont(
        &self,
        id: SoundFontId,
        reset_presets: bool,
    ) -> Result<Arc<dyn SoundFont>> {
        let font = self.soundfonts.remove(id)?;
        for channel in self.channels.iter() {
            let mut state = channel.lock();
            if state.sfont == Some(id) {
                state.sfont = None;
                state.set_preset(None);
            }
        }
        if reset_presets {
            self.program_reset();
        }
        Ok(font)
    }

    pub fn soundfont_count(&self) -> usize {
        self.soundfonts.count()
    }

    pub fn get_soundfont(&self, id: SoundFontId) -> Option<Arc<dyn SoundFont>> {
        self.soundfonts.get(id)
    }

    pub fn set_bank_offset(&self, id: SoundFontId, offset: i32) -> Result<()> {
        self.soundfonts.set_bank_offset(id, offset)
    }

    pub fn bank_offset(&self, id: SoundFontId) -> Option<i32> {
        self.soundfonts.bank_offset(id)
    }

    /// Program change with General MIDI fallback.
    ///
    /// Melodic channels try the selected bank, then bank 0 with the same
    /// program, then bank 0 program 0. Drum channels try the drum bank with
    /// the program, then program 0. If nothing matches the channel keeps
    /// the program number but has no preset.
    pub fn program_change(&self, channel: usize, program: u8) -> Result<()> {
        check_data(program, "program")?;
        let mut state = self.channel(channel)?.lock();
        if !state.assignment.enabled {
            debug!("Program change ignored on disabled channel {channel}");
            return Ok(());
        }

        let bank = state.bank;
        let candidates = match state.channel_type {
            ChannelType::Melodic => vec![(bank, program), (0, program), (0, 0)],
            ChannelType::Drum => vec![(DRUM_BANK, program), (DRUM_BANK, 0)],
        };
        let found = candidates.iter().enumerate().find_map(|(i, &(bank, prog))| {
            self.soundfonts
                .resolve(None, bank, prog)
                .map(|found| (i, bank, prog, found))
        });

        state.program = program;
        match found {
            Some((i, sub_bank, sub_prog, (sfont, preset))) => {
                if i > 0 {
                    debug!(
                        "No preset {bank}:{program} for channel {channel}, using {sub_bank}:{sub_prog}"
                    );
                }
                state.sfont = Some(sfont);
                state.set_preset(Some(&preset));
            }
            None => {
                warn!("No preset {bank}:{program} for channel {channel}");
                state.set_preset(None);
            }
        }
        Ok(())
    }

    /// Set the bank used by the next program change.
    pub fn bank_select(&self, channel: usize, bank: u32) -> Result<()> {
        if bank > MAX_BANK {
            return Err(Error::invalid(format!("bank {bank} (expected 0-{MAX_BANK})")));
        }
        self.channel(channel)?.lock().bank = bank;
        Ok(())
    }

    /// Set the font used by [`program_select`](Self::program_select)-style
    /// lookups and reported by [`channel_info`](Self::channel_info).
    pub fn sfont_select(&self, channel: usize, id: SoundFontId) -> Result<()> {
        if self.soundfonts.get(id).is_none() {
            return Err(Error::not_found(format!("soundfont {}", id.id())));
        }
        self.channel(channel)?.lock().sfont = Some(id);
        Ok(())
    }

    /// Bind an exact preset from one font. No fallback.
    pub fn program_select(
        &self,
        channel: usize,
        id: SoundFontId,
        bank: u32,
        program: u8,
    ) -> Result<()> {
        check_data(program, "program")?;
        let ch = self.channel(channel)?;
        let (_, preset) = self
            .soundfonts
            .resolve(Some(id), bank, program)
            .ok_or_else(|| {
                Error::not_found(format!("preset {bank}:{program} in soundfont {}", id.id()))
            })?;
        let mut state = ch.lock();
        state.sfont = Some(id);
        state.bank = bank;
        state.program = program;
        state.set_preset(Some(&preset));
        Ok(())
    }

    /// Leave the channel without a preset; note-ons fail until the next
    /// program change.
    pub fn unset_program(&self, channel: usize) -> Result<()> {
        self.channel(channel)?.lock().set_preset(None);
        Ok(())
    }

    /// Font, bank and program currently selected on the channel.
    pub fn get_program(&self, channel: usize) -> Result<(Option<SoundFontId>, u32, u8)> {
        let state = self.channel(channel)?.lock();
        Ok((state.sfont, state.bank, state.program))
    }

    /// Preset bound to the channel, if it still exists.
    pub fn channel_preset(&self, channel: usize) -> Result<Option<Arc<dyn Preset>>> {
        Ok(self.channel(channel)?.lock().current_preset())
    }

    pub fn channel_info(&self, channel: usize) -> Result<ChannelInfo> {
        let state = self.channel(channel)?.lock();
        Ok(ChannelInfo {
            sfont: state.sfont,
            bank: state.bank,
            program: state.program,
            name: state
                .current_preset()
                .map(|preset| preset.name().to_string())
                .unwrap_or_default(),
        })
    }

    /// Re-run the program change of every channel.
    pub fn program_reset(&self) {
        for channel in self.channels.iter() {
            let program = channel.lock().program;
            if let Err(e) = self.program_change(channel.index(), program) {
                debug!("Program reset on channel {}: {e}", channel.index());
            }
        }
    }
}
