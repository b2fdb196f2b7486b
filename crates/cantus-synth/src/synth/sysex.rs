//! Universal system exclusive messages: GM System On and the MIDI Tuning
//! Standard.
//!
//! Payloads exclude the 0xF0 / 0xF7 framing. A message addressed to another
//! device or of an unknown kind is reported as not handled; a recognised
//! message with a bad length is an error.

use tracing::debug;

use crate::tuning::{equal_cents, Tuning};
use crate::voice::VoicePool;
use crate::{Error, Result, MIDI_KEYS};

use super::Synth;

const NON_REALTIME: u8 = 0x7E;
const REALTIME: u8 = 0x7F;
const ALL_DEVICES: u8 = 0x7F;

const GENERAL_MIDI: u8 = 0x09;
const GM_ON: u8 = 0x01;
const GM2_ON: u8 = 0x03;

const TUNING: u8 = 0x08;
const BULK_DUMP_REQUEST: u8 = 0x00;
const BULK_DUMP: u8 = 0x01;
const NOTE_TUNE: u8 = 0x02;
const BULK_DUMP_REQUEST_BANK: u8 = 0x03;
const BULK_DUMP_BANK: u8 = 0x04;
const NOTE_TUNE_BANK: u8 = 0x07;
const OCTAVE_TUNE_1BYTE: u8 = 0x08;
const OCTAVE_TUNE_2BYTE: u8 = 0x09;

/// Header bytes before the message body: kind, device, sub-id 1 and 2.
const HEADER_LEN: usize = 4;
const NAME_LEN: usize = 16;
/// Pitch marker meaning "leave this key alone".
const NO_CHANGE: [u8; 3] = [0x7F, 0x7F, 0x7F];

/// Name given to tunings written by octave tuning messages.
const OCTAVE_TUNING_NAME: &str = "SYSEX";

/// Outcome of [`Synth::sysex`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SysexReply {
    /// The message was recognised and addressed to this device.
    pub handled: bool,
    /// Reply payload (no 0xF0 / 0xF7) for dump requests.
    pub response: Option<Vec<u8>>,
}

impl SysexReply {
    fn handled() -> Self {
        Self {
            handled: true,
            response: None,
        }
    }

    fn ignored() -> Self {
        Self::default()
    }
}

impl<P: VoicePool> Synth<P> {
    /// Process a system exclusive payload.
    ///
    /// With `dry_run` the message is validated and classified but nothing
    /// changes and no reply is built.
    pub fn sysex(&self, data: &[u8], dry_run: bool) -> Result<SysexReply> {
        let [kind, device, sub1, sub2, ..] = *data else {
            return Ok(SysexReply::ignored());
        };
        if kind != NON_REALTIME && kind != REALTIME {
            return Ok(SysexReply::ignored());
        }
        if device != ALL_DEVICES && device != self.config.device_id {
            return Ok(SysexReply::ignored());
        }

        match sub1 {
            GENERAL_MIDI if kind == NON_REALTIME && matches!(sub2, GM_ON | GM2_ON) => {
                if !dry_run {
                    self.system_reset();
                }
                Ok(SysexReply::handled())
            }
            TUNING => self.midi_tuning(data, dry_run),
            _ => Ok(SysexReply::ignored()),
        }
    }

    fn midi_tuning(&self, data: &[u8], dry_run: bool) -> Result<SysexReply> {
        let realtime = data[0] == REALTIME;
        let body = &data[HEADER_LEN..];

        match (data[3], realtime) {
            (BULK_DUMP_REQUEST, false) => {
                let [program] = *body else {
                    return Err(bad_length("bulk dump request", data.len()));
                };
                self.bulk_dump_reply(None, program, dry_run)
            }
            (BULK_DUMP_REQUEST_BANK, false) => {
                let [bank, program] = *body else {
                    return Err(bad_length("bulk dump request", data.len()));
                };
                self.bulk_dump_reply(Some(bank), program, dry_run)
            }
            (BULK_DUMP, false) => self.bulk_dump(data, false, dry_run),
            (BULK_DUMP_BANK, false) => self.bulk_dump(data, true, dry_run),
            (NOTE_TUNE, true) => self.note_tune(body, false, realtime, dry_run),
            (NOTE_TUNE_BANK, _) => self.note_tune(body, true, realtime, dry_run),
            (OCTAVE_TUNE_1BYTE, _) => self.octave_tune(body, false, realtime, dry_run),
            (OCTAVE_TUNE_2BYTE, _) => self.octave_tune(body, true, realtime, dry_run),
            _ => Ok(SysexReply::ignored()),
        }
    }

    /// Reply to a bulk dump request. A missing tuning is dumped as equal
    /// temperament with a blank name.
    fn bulk_dump_reply(&self, bank: Option<u8>, program: u8, dry_run: bool) -> Result<SysexReply> {
        let tuning = self
            .tunings
            .lookup(bank.unwrap_or(0), program)
            .ok()
            .map(|tuning| (*tuning).clone())
            .unwrap_or_else(|| {
                let mut equal = Tuning::equal_temperament();
                equal.set_name("");
                equal
            });
        if dry_run {
            return Ok(SysexReply::handled());
        }

        let mut reply = Vec::with_capacity(HEADER_LEN + 3 + NAME_LEN + MIDI_KEYS * 3);
        reply.extend_from_slice(&[NON_REALTIME, self.config.device_id, TUNING]);
        match bank {
            Some(bank) => reply.extend_from_slice(&[BULK_DUMP_BANK, bank, program]),
            None => reply.extend_from_slice(&[BULK_DUMP, program]),
        }
        reply.extend_from_slice(&encode_name(tuning.name()));
        for key in 0..MIDI_KEYS as u8 {
            reply.extend_from_slice(&encode_pitch(tuning.pitch(key)));
        }
        reply.push(checksum(&reply));

        Ok(SysexReply {
            handled: true,
            response: Some(reply),
        })
    }

    fn bulk_dump(&self, data: &[u8], with_bank: bool, dry_run: bool) -> Result<SysexReply> {
        let id_len = if with_bank { 2 } else { 1 };
        let expected = HEADER_LEN + id_len + NAME_LEN + MIDI_KEYS * 3 + 1;
        if data.len() != expected {
            return Err(bad_length("bulk tuning dump", data.len()));
        }
        let (message, sum) = data.split_at(data.len() - 1);
        if checksum(message) != sum[0] {
            debug!("Bulk tuning dump checksum mismatch");
            return Ok(SysexReply::ignored());
        }

        let body = &message[HEADER_LEN..];
        let (bank, program) = if with_bank {
            (body[0], body[1])
        } else {
            (0, body[0])
        };
        let body = &body[id_len..];
        let name = decode_name(&body[..NAME_LEN]);

        let base = self.tunings.get(bank, program);
        let mut pitches = [0.0; MIDI_KEYS];
        for (key, (pitch, encoded)) in pitches
            .iter_mut()
            .zip(body[NAME_LEN..].chunks_exact(3))
            .enumerate()
        {
            let key = key as u8;
            *pitch = decode_pitch(encoded).unwrap_or_else(|| match &base {
                Some(tuning) => tuning.pitch(key),
                None => equal_cents(key),
            });
        }
        if !dry_run {
            self.register_tuning(bank, program, Tuning::from_keys(name, &pitches), false)?;
        }
        Ok(SysexReply::handled())
    }

    /// Single note tuning change.
    fn note_tune(
        &self,
        body: &[u8],
        with_bank: bool,
        apply: bool,
        dry_run: bool,
    ) -> Result<SysexReply> {
        let id_len = if with_bank { 2 } else { 1 };
        let Some(&count) = body.get(id_len) else {
            return Err(bad_length("note tuning change", body.len() + HEADER_LEN));
        };
        let changes = &body[id_len + 1..];
        if changes.len() != count as usize * 4 {
            return Err(bad_length("note tuning change", body.len() + HEADER_LEN));
        }
        let (bank, program) = if with_bank {
            (body[0], body[1])
        } else {
            (0, body[0])
        };

        let mut keys = Vec::with_capacity(count as usize);
        let mut pitches = Vec::with_capacity(count as usize);
        for change in changes.chunks_exact(4) {
            if let Some(cents) = decode_pitch(&change[1..]) {
                keys.push(change[0] & 0x7F);
                pitches.push(cents);
            }
        }
        if dry_run {
            return Ok(SysexReply::handled());
        }

        if self.tunings.get(bank, program).is_none() {
            self.register_tuning(bank, program, Tuning::equal_temperament(), false)?;
        }
        self.tune_notes(bank, program, &keys, &pitches, apply)?;
        Ok(SysexReply::handled())
    }

    /// Scale / octave tuning for the channels in the bitmap.
    fn octave_tune(
        &self,
        body: &[u8],
        two_byte: bool,
        apply: bool,
        dry_run: bool,
    ) -> Result<SysexReply> {
        let per_degree = if two_byte { 2 } else { 1 };
        if body.len() != 3 + 12 * per_degree {
            return Err(bad_length("octave tuning", body.len() + HEADER_LEN));
        }
        let bitmap =
            (u32::from(body[0] & 0x03) << 14) | (u32::from(body[1]) << 7) | u32::from(body[2]);

        let mut deviations = [0.0f32; 12];
        for (deviation, degree) in deviations.iter_mut().zip(body[3..].chunks_exact(per_degree)) {
            *deviation = if two_byte {
                let value = (u32::from(degree[0] & 0x7F) << 7) | u32::from(degree[1] & 0x7F);
                (value as f32 - 8192.0) / 8192.0 * 100.0
            } else {
                f32::from(degree[0] & 0x7F) - 64.0
            };
        }
        if dry_run {
            return Ok(SysexReply::handled());
        }

        self.activate_octave_tuning(0, 0, OCTAVE_TUNING_NAME, &deviations, apply)?;
        let channels = (0..16usize).filter(|&ch| bitmap & (1u32 << ch) != 0);
        for channel in channels.take_while(|&ch| ch < self.channels.len()) {
            self.activate_tuning(channel, 0, 0, apply)?;
        }
        Ok(SysexReply::handled())
    }
}

fn bad_length(what: &str, len: usize) -> Error {
    Error::invalid(format!("{what}: unexpected length {len}"))
}

/// XOR of `bytes`, 7-bit.
fn checksum(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0, |sum, &b| sum ^ b) & 0x7F
}

/// Absolute cents as semitone plus 14-bit fraction.
fn encode_pitch(cents: f32) -> [u8; 3] {
    let cents = cents.clamp(0.0, 127.0 * 100.0 + 99.99);
    let semitone = (cents / 100.0).floor();
    let fraction = (((cents - semitone * 100.0) / 100.0) * 16384.0).round() as u32;
    let (semitone, fraction) = if fraction >= 16384 {
        (semitone as u32 + 1, 0)
    } else {
        (semitone as u32, fraction)
    };
    if semitone > 127 {
        // 7F 7F 7F is reserved
        return [0x7F, 0x7F, 0x7E];
    }
    [semitone as u8, (fraction >> 7) as u8, (fraction & 0x7F) as u8]
}

/// `None` for the no-change marker.
fn decode_pitch(bytes: &[u8]) -> Option<f32> {
    if bytes == NO_CHANGE {
        return None;
    }
    let fraction = (u32::from(bytes[1] & 0x7F) << 7) | u32::from(bytes[2] & 0x7F);
    Some(f32::from(bytes[0] & 0x7F) * 100.0 + fraction as f32 * 100.0 / 16384.0)
}

fn encode_name(name: &str) -> [u8; NAME_LEN] {
    let mut encoded = [b' '; NAME_LEN];
    for (slot, byte) in encoded.iter_mut().zip(name.bytes()) {
        *slot = byte & 0x7F;
    }
    encoded
}

fn decode_name(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|&b| char::from(b & 0x7F))
        .collect::<String>()
        .trim_end_matches([' ', '\0'])
        .to_string()
}
