//! RT-friendly MIDI event types with sample-accurate timing.

use midi_msg::{Channel, ChannelVoiceMsg, ControlChange, MidiMsg};

use crate::raw::{Parsed, RawMessages};

/// Flat view of a channel message with plain 7/14-bit values.
///
/// This is the shape the synth dispatch core consumes: one variant per
/// status nibble, no high-resolution pairing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChannelMessage {
    NoteOff { key: u8, velocity: u8 },
    NoteOn { key: u8, velocity: u8 },
    KeyPressure { key: u8, pressure: u8 },
    ControlChange { control: u8, value: u8 },
    ProgramChange { program: u8 },
    ChannelPressure { pressure: u8 },
    /// 14-bit value, 0x2000 = centre.
    PitchBend { value: u16 },
}

impl ChannelMessage {
    /// Decode one channel message from a status byte and its data bytes.
    ///
    /// Returns `None` for status bytes outside 0x80-0xEF.
    pub(crate) fn from_status(status: u8, d1: u8, d2: u8) -> Option<Self> {
        let (d1, d2) = (d1 & 0x7F, d2 & 0x7F);
        let msg = match status & 0xF0 {
            0x80 => ChannelMessage::NoteOff {
                key: d1,
                velocity: d2,
            },
            0x90 => ChannelMessage::NoteOn {
                key: d1,
                velocity: d2,
            },
            0xA0 => ChannelMessage::KeyPressure {
                key: d1,
                pressure: d2,
            },
            0xB0 => ChannelMessage::ControlChange {
                control: d1,
                value: d2,
            },
            0xC0 => ChannelMessage::ProgramChange { program: d1 },
            0xD0 => ChannelMessage::ChannelPressure { pressure: d1 },
            0xE0 => ChannelMessage::PitchBend {
                value: ((d2 as u16) << 7) | d1 as u16,
            },
            _ => return None,
        };
        Some(msg)
    }

    /// Number of data bytes following a channel status byte.
    #[inline]
    pub(crate) fn data_len(status: u8) -> usize {
        match status & 0xF0 {
            0xC0 | 0xD0 => 1,
            _ => 2,
        }
    }
}

/// Channel-voice message stamped with its frame offset in the current
/// render block.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MidiEvent {
    /// Offset within the current buffer (0 = first sample).
    pub frame_offset: usize,
    pub channel: Channel,
    pub msg: ChannelVoiceMsg,
}

impl MidiEvent {
    #[inline]
    pub fn new(frame_offset: usize, channel: Channel, msg: ChannelVoiceMsg) -> Self {
        Self {
            frame_offset,
            channel,
            msg,
        }
    }

    /// Event on a channel given as 0-15.
    #[inline]
    fn on(frame_offset: usize, channel: u8, msg: ChannelVoiceMsg) -> Self {
        Self::new(frame_offset, Channel::from_u8(channel), msg)
    }

    pub fn note_on(frame_offset: usize, channel: u8, note: u8, velocity: u8) -> Self {
        Self::on(frame_offset, channel, ChannelVoiceMsg::NoteOn { note, velocity })
    }

    pub fn note_off(frame_offset: usize, channel: u8, note: u8, velocity: u8) -> Self {
        Self::on(frame_offset, channel, ChannelVoiceMsg::NoteOff { note, velocity })
    }

    pub fn control_change(frame_offset: usize, channel: u8, control: u8, value: u8) -> Self {
        let control = ControlChange::CC { control, value };
        Self::on(frame_offset, channel, ChannelVoiceMsg::ControlChange { control })
    }

    pub fn program_change(frame_offset: usize, channel: u8, program: u8) -> Self {
        Self::on(frame_offset, channel, ChannelVoiceMsg::ProgramChange { program })
    }

    pub fn pitch_bend(frame_offset: usize, channel: u8, bend: u16) -> Self {
        Self::on(frame_offset, channel, ChannelVoiceMsg::PitchBend { bend })
    }

    /// Channel pressure.
    pub fn aftertouch(frame_offset: usize, channel: u8, pressure: u8) -> Self {
        Self::on(frame_offset, channel, ChannelVoiceMsg::ChannelPressure { pressure })
    }

    /// Key pressure.
    pub fn poly_aftertouch(frame_offset: usize, channel: u8, note: u8, pressure: u8) -> Self {
        Self::on(
            frame_offset,
            channel,
            ChannelVoiceMsg::PolyPressure { note, pressure },
        )
    }

    #[inline]
    pub fn channel_num(&self) -> u8 {
        self.channel as u8
    }

    /// Flatten into the channel messages the dispatch core understands.
    ///
    /// Most messages map to exactly one [`ChannelMessage`]. High-resolution
    /// controller variants serialize to an MSB/LSB pair and yield two.
    pub fn channel_messages(&self) -> Vec<ChannelMessage> {
        let direct = match self.msg {
            ChannelVoiceMsg::NoteOn { note, velocity } => Some(ChannelMessage::NoteOn {
                key: note,
                velocity,
            }),
            ChannelVoiceMsg::NoteOff { note, velocity } => Some(ChannelMessage::NoteOff {
                key: note,
                velocity,
            }),
            ChannelVoiceMsg::PolyPressure { note, pressure } => {
                Some(ChannelMessage::KeyPressure {
                    key: note,
                    pressure,
                })
            }
            ChannelVoiceMsg::ChannelPressure { pressure } => {
                Some(ChannelMessage::ChannelPressure { pressure })
            }
            ChannelVoiceMsg::ProgramChange { program } => {
                Some(ChannelMessage::ProgramChange { program })
            }
            ChannelVoiceMsg::PitchBend { bend } => {
                Some(ChannelMessage::PitchBend { value: bend & 0x3FFF })
            }
            ChannelVoiceMsg::ControlChange {
                control: ControlChange::CC { control, value },
            } => Some(ChannelMessage::ControlChange { control, value }),
            _ => None,
        };

        if let Some(msg) = direct {
            return vec![msg];
        }

        // Everything else goes through the wire format
        RawMessages::new(&self.to_bytes())
            .filter_map(|parsed| match parsed {
                Ok(Parsed::Channel { msg, .. }) => Some(msg),
                _ => None,
            })
            .collect()
    }

    /// Wire bytes of the message, status first.
    pub fn to_bytes(&self) -> Vec<u8> {
        MidiMsg::ChannelVoice {
            channel: self.channel,
            msg: self.msg,
        }
        .to_midi()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_fields() {
        let event = MidiEvent::note_on(100, 3, 60, 100);
        assert_eq!(event.channel_num(), 3);
        assert_eq!(event.frame_offset, 100);
        assert_eq!(event.to_bytes(), vec![0x93, 60, 100]);
    }

    #[test]
    fn test_channel_messages_direct() {
        let event = MidiEvent::control_change(0, 5, 7, 127);
        assert_eq!(
            event.channel_messages(),
            vec![ChannelMessage::ControlChange {
                control: 7,
                value: 127
            }]
        );

        let event = MidiEvent::pitch_bend(0, 1, 0x2000);
        assert_eq!(
            event.channel_messages(),
            vec![ChannelMessage::PitchBend { value: 0x2000 }]
        );
    }

    #[test]
    fn test_high_res_controller_splits() {
        let event = MidiEvent::new(
            0,
            Channel::Ch1,
            ChannelVoiceMsg::ControlChange {
                control: ControlChange::Volume(0x3FFF),
            },
        );
        assert_eq!(
            event.channel_messages(),
            vec![
                ChannelMessage::ControlChange {
                    control: 7,
                    value: 0x7F
                },
                ChannelMessage::ControlChange {
                    control: 39,
                    value: 0x7F
                },
            ]
        );
    }

    #[test]
    fn test_from_status_pitch_bend_combines_bytes() {
        let msg = ChannelMessage::from_status(0xE3, 0x00, 0x40).unwrap();
        assert_eq!(msg, ChannelMessage::PitchBend { value: 0x2000 });
        assert!(ChannelMessage::from_status(0xF0, 0, 0).is_none());
    }
}
