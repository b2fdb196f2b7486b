//! Controller numbers used by the dispatch core.
//!
//! Values follow the MIDI 1.0 controller table; RPN numbers are the LSB
//! values sent after an RPN MSB of 0.

pub const BANK_SELECT_MSB: u8 = 0;
pub const MODULATION_MSB: u8 = 1;
pub const BREATH_MSB: u8 = 2;
pub const FOOT_MSB: u8 = 4;
pub const PORTAMENTO_TIME_MSB: u8 = 5;
pub const DATA_ENTRY_MSB: u8 = 6;
pub const VOLUME_MSB: u8 = 7;
pub const BALANCE_MSB: u8 = 8;
pub const PAN_MSB: u8 = 10;
pub const EXPRESSION_MSB: u8 = 11;

pub const BANK_SELECT_LSB: u8 = 32;
pub const MODULATION_LSB: u8 = 33;
pub const BREATH_LSB: u8 = 34;
pub const PORTAMENTO_TIME_LSB: u8 = 37;
pub const DATA_ENTRY_LSB: u8 = 38;
pub const VOLUME_LSB: u8 = 39;
pub const PAN_LSB: u8 = 42;
pub const EXPRESSION_LSB: u8 = 43;

pub const SUSTAIN_SWITCH: u8 = 64;
pub const PORTAMENTO_SWITCH: u8 = 65;
pub const SOSTENUTO_SWITCH: u8 = 66;
pub const SOFT_PEDAL_SWITCH: u8 = 67;
pub const LEGATO_SWITCH: u8 = 68;
pub const HOLD2_SWITCH: u8 = 69;

pub const SOUND_CTRL1: u8 = 70;
pub const SOUND_CTRL10: u8 = 79;

pub const PORTAMENTO_CTRL: u8 = 84;

pub const EFFECTS_DEPTH1: u8 = 91;
pub const EFFECTS_DEPTH5: u8 = 95;

pub const DATA_ENTRY_INCR: u8 = 96;
pub const DATA_ENTRY_DECR: u8 = 97;
pub const NRPN_LSB: u8 = 98;
pub const NRPN_MSB: u8 = 99;
pub const RPN_LSB: u8 = 100;
pub const RPN_MSB: u8 = 101;

// Channel mode messages
pub const ALL_SOUND_OFF: u8 = 120;
pub const ALL_CTRL_OFF: u8 = 121;
pub const LOCAL_CONTROL: u8 = 122;
pub const ALL_NOTES_OFF: u8 = 123;
pub const OMNI_OFF: u8 = 124;
pub const OMNI_ON: u8 = 125;
pub const POLY_OFF: u8 = 126;
pub const POLY_ON: u8 = 127;

/// NRPN MSB value that switches the NRPN LSB into SoundFont generator addressing.
pub const NRPN_SOUNDFONT_MSB: u8 = 120;

/// Registered parameter numbers (LSB with RPN MSB = 0).
pub mod rpn {
    pub const PITCH_BEND_RANGE: u8 = 0;
    pub const CHANNEL_FINE_TUNE: u8 = 1;
    pub const CHANNEL_COARSE_TUNE: u8 = 2;
    pub const TUNING_PROGRAM_CHANGE: u8 = 3;
    pub const TUNING_BANK_SELECT: u8 = 4;
    pub const MODULATION_DEPTH_RANGE: u8 = 5;
}

/// Controllers consulted as on/off switches read "on" at or above this value.
pub const SWITCH_ON: u8 = 64;

/// True if `value` reads as a pressed switch pedal.
#[inline]
pub fn is_on(value: u8) -> bool {
    value >= SWITCH_ON
}

/// True for controllers 120-127 (channel mode messages).
#[inline]
pub fn is_channel_mode(control: u8) -> bool {
    control >= ALL_SOUND_OFF
}
