//! Raw MIDI byte-stream parsing with running status.
//!
//! Real-time bytes (0xF8-0xFE) may appear anywhere and are skipped; 0xFF is
//! reported as [`Parsed::SystemReset`]. Sysex payloads are yielded without
//! the 0xF0/0xF7 framing bytes.

use crate::event::ChannelMessage;
use crate::{Error, Result};

const SYSEX_START: u8 = 0xF0;
const SYSEX_END: u8 = 0xF7;
const SYSTEM_RESET: u8 = 0xFF;

/// One item parsed from a raw byte stream.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Parsed<'a> {
    Channel { channel: u8, msg: ChannelMessage },
    /// Sysex payload between 0xF0 and 0xF7 (both excluded).
    Sysex(&'a [u8]),
    SystemReset,
}

/// Iterator over the messages in a raw MIDI byte buffer.
pub struct RawMessages<'a> {
    bytes: &'a [u8],
    pos: usize,
    running_status: Option<u8>,
}

impl<'a> RawMessages<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self {
            bytes,
            pos: 0,
            running_status: None,
        }
    }

    /// Next data byte, skipping interleaved real-time bytes.
    fn next_data(&mut self) -> Option<u8> {
        while self.pos < self.bytes.len() {
            let b = self.bytes[self.pos];
            self.pos += 1;
            if (0xF8..SYSTEM_RESET).contains(&b) {
                continue;
            }
            return Some(b);
        }
        None
    }

    fn parse_sysex(&mut self) -> Result<Parsed<'a>> {
        let start = self.pos;
        match self.bytes[start..].iter().position(|&b| b == SYSEX_END) {
            Some(len) => {
                self.pos = start + len + 1;
                Ok(Parsed::Sysex(&self.bytes[start..start + len]))
            }
            None => {
                self.pos = self.bytes.len();
                Err(Error::UnterminatedSysex)
            }
        }
    }
}

impl<'a> Iterator for RawMessages<'a> {
    type Item = Result<Parsed<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let byte = *self.bytes.get(self.pos)?;

            let status = if byte & 0x80 != 0 {
                self.pos += 1;
                match byte {
                    SYSEX_START => {
                        self.running_status = None;
                        return Some(self.parse_sysex());
                    }
                    SYSTEM_RESET => return Some(Ok(Parsed::SystemReset)),
                    0xF8..=0xFE => continue,
                    0xF1..=0xF7 => {
                        // System common cancels running status; payload is not needed here
                        self.running_status = None;
                        continue;
                    }
                    _ => {
                        self.running_status = Some(byte);
                        byte
                    }
                }
            } else {
                match self.running_status {
                    Some(status) => status,
                    None => {
                        // Stray data byte
                        self.pos += 1;
                        continue;
                    }
                }
            };

            let expected = ChannelMessage::data_len(status);
            let d1 = match self.next_data() {
                Some(b) => b,
                None => return Some(Err(Error::Truncated { status, expected })),
            };
            let d2 = if expected == 2 {
                match self.next_data() {
                    Some(b) => b,
                    None => return Some(Err(Error::Truncated { status, expected })),
                }
            } else {
                0
            };

            let msg = ChannelMessage::from_status(status, d1, d2)?;
            return Some(Ok(Parsed::Channel {
                channel: status & 0x0F,
                msg,
            }));
        }
    }
}
