//! Channel mode types: poly/mono/omni, basic-channel zones and breath modes.

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// MIDI channel mode (modes 1-4 of the MIDI spec, numbered 0-3 here).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum ChannelMode {
    #[default]
    OmniOnPoly = 0,
    OmniOnMono = 1,
    OmniOffPoly = 2,
    OmniOffMono = 3,
}

impl ChannelMode {
    #[inline]
    pub fn from_flags(omni_off: bool, mono: bool) -> Self {
        match (omni_off, mono) {
            (false, false) => ChannelMode::OmniOnPoly,
            (false, true) => ChannelMode::OmniOnMono,
            (true, false) => ChannelMode::OmniOffPoly,
            (true, true) => ChannelMode::OmniOffMono,
        }
    }

    #[inline]
    pub fn is_mono(self) -> bool {
        matches!(self, ChannelMode::OmniOnMono | ChannelMode::OmniOffMono)
    }

    #[inline]
    pub fn is_omni_off(self) -> bool {
        matches!(self, ChannelMode::OmniOffPoly | ChannelMode::OmniOffMono)
    }
}

impl TryFrom<u8> for ChannelMode {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(ChannelMode::OmniOnPoly),
            1 => Ok(ChannelMode::OmniOnMono),
            2 => Ok(ChannelMode::OmniOffPoly),
            3 => Ok(ChannelMode::OmniOffMono),
            other => Err(Error::invalid(format!("channel mode {other}"))),
        }
    }
}

/// A basic channel and the zone it governs.
///
/// `val` is the zone length. It only matters for [`ChannelMode::OmniOffMono`];
/// the other modes always govern a single channel. When configuring, a `val`
/// of 0 extends a mono zone up to the next basic channel (or the last
/// channel). When reported back, `val` is the resolved zone length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BasicChannelInfo {
    pub basic_channel: usize,
    pub mode: ChannelMode,
    pub val: usize,
}

impl BasicChannelInfo {
    pub fn new(basic_channel: usize, mode: ChannelMode, val: usize) -> Self {
        Self {
            basic_channel,
            mode,
            val,
        }
    }
}

/// Outcome of replacing the whole basic-channel partition.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use]
pub enum PartitionStatus {
    /// Every channel belongs to a zone.
    Applied,
    /// The partition was committed but the listed channels belong to no
    /// zone and will ignore events.
    Ambiguous { unassigned: Vec<usize> },
}

impl PartitionStatus {
    #[inline]
    pub fn is_ambiguous(&self) -> bool {
        matches!(self, PartitionStatus::Ambiguous { .. })
    }
}

/// Breath controller behaviour for a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BreathMode {
    /// Apply the default breath modulator to voices started in poly play.
    pub poly_default: bool,
    /// Apply the default breath modulator to voices started in mono play.
    pub mono_default: bool,
    /// Breath (CC2) gates note starts in mono play.
    pub sync: bool,
}

/// A channel's place in the basic-channel partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModeAssignment {
    pub mode: ChannelMode,
    /// This channel heads its zone.
    pub basic: bool,
    /// The channel belongs to some zone.
    pub enabled: bool,
    /// Basic channel governing this channel.
    pub head: usize,
    /// Zone length, meaningful on the head.
    pub val: usize,
}

impl ModeAssignment {
    /// Stand-alone Omni-On/Poly basic channel.
    pub fn own(channel: usize) -> Self {
        Self {
            mode: ChannelMode::OmniOnPoly,
            basic: true,
            enabled: true,
            head: channel,
            val: 1,
        }
    }

    pub fn disabled(channel: usize) -> Self {
        Self {
            mode: ChannelMode::OmniOnPoly,
            basic: false,
            enabled: false,
            head: channel,
            val: 0,
        }
    }

    #[inline]
    pub fn is_mono(&self) -> bool {
        self.mode.is_mono()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_numbering() {
        for raw in 0..4u8 {
            let mode = ChannelMode::try_from(raw).unwrap();
            assert_eq!(mode as u8, raw);
            assert_eq!(ChannelMode::from_flags(mode.is_omni_off(), mode.is_mono()), mode);
        }
        assert!(matches!(
            ChannelMode::try_from(4),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_partition_status() {
        assert!(!PartitionStatus::Applied.is_ambiguous());
        assert!(PartitionStatus::Ambiguous {
            unassigned: vec![3]
        }
        .is_ambiguous());
    }
}
