//! Basic-channel partition and per-channel play modes.

use cantus_midi::cc;
use tracing::debug;

use crate::legato::LegatoMode;
use crate::mode::{BasicChannelInfo, BreathMode, ChannelMode, ModeAssignment, PartitionStatus};
use crate::partition;
use crate::portamento::PortamentoMode;
use crate::voice::VoicePool;
use crate::Result;

use super::Synth;

impl<P: VoicePool> Synth<P> {
    /// Make `info.basic_channel` head a zone in `info.mode`.
    pub fn set_basic_channel(&self, info: BasicChannelInfo) -> Result<()> {
        let _partition = self.partition_lock.lock();
        self.apply_basic_channel(&info)
    }

    /// Disable the zone headed by `channel`, or every zone when `None`.
    pub fn reset_basic_channel(&self, channel: Option<usize>) -> Result<()> {
        let _partition = self.partition_lock.lock();
        let mut assignments = self.assignments();
        partition::reset_basic_channel(&mut assignments, channel)?;
        self.commit_assignments(&assignments);
        Ok(())
    }

    /// Replace the whole partition. Nothing changes on `Err`.
    pub fn reset_basic_channels(&self, infos: &[BasicChannelInfo]) -> Result<PartitionStatus> {
        let _partition = self.partition_lock.lock();
        let mut assignments = self.assignments();
        let status = partition::reset_basic_channels(&mut assignments, infos)?;
        if let PartitionStatus::Ambiguous { unassigned } = &status {
            debug!("Basic channel partition leaves channels {unassigned:?} unassigned");
        }
        self.commit_assignments(&assignments);
        Ok(status)
    }

    /// Zone governing `channel`, `None` if the channel is disabled.
    pub fn get_channel_mode(&self, channel: usize) -> Result<Option<BasicChannelInfo>> {
        self.channel(channel)?;
        let _partition = self.partition_lock.lock();
        Ok(partition::governing(&self.assignments(), channel))
    }

    /// Enabled basic channels in channel order.
    pub fn get_basic_channels(&self) -> Vec<BasicChannelInfo> {
        let _partition = self.partition_lock.lock();
        partition::basic_channels(&self.assignments())
    }

    pub fn set_legato_mode(&self, channel: usize, mode: LegatoMode) -> Result<()> {
        self.channel(channel)?.lock().legato_mode = mode;
        Ok(())
    }

    pub fn legato_mode(&self, channel: usize) -> Result<LegatoMode> {
        Ok(self.channel(channel)?.lock().legato_mode)
    }

    pub fn set_portamento_mode(&self, channel: usize, mode: PortamentoMode) -> Result<()> {
        self.channel(channel)?.lock().portamento_mode = mode;
        Ok(())
    }

    pub fn portamento_mode(&self, channel: usize) -> Result<PortamentoMode> {
        Ok(self.channel(channel)?.lock().portamento_mode)
    }

    pub fn set_breath_mode(&self, channel: usize, mode: BreathMode) -> Result<()> {
        self.channel(channel)?.lock().breath = mode;
        Ok(())
    }

    pub fn breath_mode(&self, channel: usize) -> Result<BreathMode> {
        Ok(self.channel(channel)?.lock().breath)
    }

    /// Channel mode message (CC124-127).
    ///
    /// Honoured on a basic channel or a disabled channel, which then becomes
    /// a basic channel. Rejections are logged.
    pub(super) fn mode_message(&self, channel: usize, control: u8, value: u8) {
        let _partition = self.partition_lock.lock();
        let current = self.channels[channel].lock().assignment;
        if current.enabled && !current.basic {
            debug!("CC{control} ignored on channel {channel}: not a basic channel");
            return;
        }

        let mode = current.mode;
        let (mode, val) = match control {
            cc::OMNI_OFF => (ChannelMode::from_flags(true, mode.is_mono()), current.val),
            cc::OMNI_ON => (ChannelMode::from_flags(false, mode.is_mono()), current.val),
            cc::POLY_OFF => (ChannelMode::from_flags(mode.is_omni_off(), true), value as usize),
            _ => (ChannelMode::from_flags(mode.is_omni_off(), false), 1),
        };
        let info = BasicChannelInfo::new(channel, mode, val);
        if let Err(e) = self.apply_basic_channel(&info) {
            debug!("CC{control} on channel {channel} rejected: {e}");
        }
    }

    /// Caller holds the partition lock.
    fn apply_basic_channel(&self, info: &BasicChannelInfo) -> Result<()> {
        let mut assignments = self.assignments();
        let zone = partition::set_basic_channel(&mut assignments, info)?;
        debug!(
            "Basic channel {} set to {:?} over channels {}..{}",
            info.basic_channel, info.mode, zone.start, zone.end
        );
        self.commit_assignments(&assignments);
        Ok(())
    }

    fn assignments(&self) -> Vec<ModeAssignment> {
        self.channels
            .iter()
            .map(|channel| channel.lock().assignment)
            .collect()
    }

    /// Write back a partition snapshot. Channels whose assignment changed
    /// get all-notes-off.
    fn commit_assignments(&self, assignments: &[ModeAssignment]) {
        for (channel, assignment) in self.channels.iter().zip(assignments) {
            let changed = {
                let mut state = channel.lock();
                let changed = state.assignment != *assignment;
                state.assignment = *assignment;
                changed
            };
            if changed {
                self.channel_notes_off(channel.index());
            }
        }
    }
}
