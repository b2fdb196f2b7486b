//! Synthesizer configuration.

use serde::{Deserialize, Serialize};

use crate::legato::LegatoMode;
use crate::portamento::PortamentoMode;
use crate::{Error, Result};

/// Sample interpolation method requested for new voices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum InterpolationMethod {
    /// No interpolation: fastest, lowest quality
    None,
    /// Straight-line interpolation
    Linear,
    /// Fourth-order interpolation
    #[default]
    FourthOrder,
    /// Seventh-order interpolation
    SeventhOrder,
}

impl InterpolationMethod {
    /// Polynomial order of the method (0, 1, 4 or 7).
    pub fn order(self) -> u8 {
        match self {
            InterpolationMethod::None => 0,
            InterpolationMethod::Linear => 1,
            InterpolationMethod::FourthOrder => 4,
            InterpolationMethod::SeventhOrder => 7,
        }
    }
}

impl TryFrom<u8> for InterpolationMethod {
    type Error = Error;

    fn try_from(order: u8) -> Result<Self> {
        match order {
            0 => Ok(InterpolationMethod::None),
            1 => Ok(InterpolationMethod::Linear),
            4 => Ok(InterpolationMethod::FourthOrder),
            7 => Ok(InterpolationMethod::SeventhOrder),
            other => Err(Error::invalid(format!(
                "interpolation order {other} (expected 0, 1, 4 or 7)"
            ))),
        }
    }
}

/// Configuration for a [`Synth`](crate::Synth).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SynthConfig {
    pub sample_rate: f32,
    /// Master gain applied by the render entry points.
    pub gain: f32,
    /// Maximum simultaneous voices requested from the voice pool.
    pub polyphony: usize,
    /// Number of MIDI channels.
    pub midi_channels: usize,
    /// Stereo output groups written by `nwrite_f32` / `process`.
    pub audio_groups: usize,
    pub interpolation: InterpolationMethod,
    /// Sysex device id answered besides the 0x7F all-call id.
    pub device_id: u8,
    pub legato_mode: LegatoMode,
    pub portamento_mode: PortamentoMode,
}

impl Default for SynthConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44100.0,
            gain: 0.2,
            polyphony: 256,
            midi_channels: 16,
            audio_groups: 1,
            interpolation: InterpolationMethod::FourthOrder,
            device_id: 0x10,
            legato_mode: LegatoMode::MultiRetrigger,
            portamento_mode: PortamentoMode::LegatoOnly,
        }
    }
}

impl SynthConfig {
    pub const MAX_GAIN: f32 = 10.0;
    pub const MAX_POLYPHONY: usize = 65535;
    pub const MAX_MIDI_CHANNELS: usize = 256;

    pub fn validate(&self) -> Result<()> {
        if !(8000.0..=384000.0).contains(&self.sample_rate) {
            return Err(Error::invalid(format!(
                "sample_rate {} out of range (8000-384000 Hz)",
                self.sample_rate
            )));
        }
        if !(0.0..=Self::MAX_GAIN).contains(&self.gain) {
            return Err(Error::invalid(format!(
                "gain {} out of range (0-{})",
                self.gain,
                Self::MAX_GAIN
            )));
        }
        if self.polyphony == 0 || self.polyphony > Self::MAX_POLYPHONY {
            return Err(Error::invalid(format!(
                "polyphony {} out of range (1-{})",
                self.polyphony,
                Self::MAX_POLYPHONY
            )));
        }
        if self.midi_channels == 0 || self.midi_channels > Self::MAX_MIDI_CHANNELS {
            return Err(Error::invalid(format!(
                "midi_channels {} out of range (1-{})",
                self.midi_channels,
                Self::MAX_MIDI_CHANNELS
            )));
        }
        if self.audio_groups == 0 {
            return Err(Error::invalid("audio_groups must be at least 1"));
        }
        if self.device_id > 0x7F {
            return Err(Error::invalid(format!(
                "device_id 0x{:02X} is not a 7-bit value",
                self.device_id
            )));
        }
        Ok(())
    }
}
