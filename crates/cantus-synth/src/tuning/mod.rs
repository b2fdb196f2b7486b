//! Microtuning: per-key pitch tables and the shared tuning registry.
//!
//! A [`Tuning`] maps each of the 128 MIDI keys to an absolute pitch in
//! cents (key 60 = 6000 in equal temperament). Built-in temperaments are
//! octave-repeating and expressed as per-pitch-class deviations from equal
//! temperament.

mod table;

pub use table::{TuningId, TuningTable};

use crate::MIDI_KEYS;

/// Equal-temperament pitch of `key` in cents.
#[inline]
pub fn equal_cents(key: u8) -> f32 {
    key as f32 * 100.0
}

/// A scale degree in cents from the scale root.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScaleDegree {
    /// Cents from the scale root (0 = unison, 1200 = octave)
    pub cents: f32,
}

impl ScaleDegree {
    pub fn from_cents(cents: f32) -> Self {
        Self { cents }
    }

    pub fn from_ratio(ratio: f32) -> Self {
        Self {
            cents: 1200.0 * ratio.log2(),
        }
    }
}

/// Named 128-key pitch table.
#[derive(Debug, Clone, PartialEq)]
pub struct Tuning {
    name: String,
    /// Absolute pitch per key, in cents
    pitches: [f32; MIDI_KEYS],
}

impl Tuning {
    /// 12-tone equal temperament.
    pub fn equal_temperament() -> Self {
        Self::from_octave("12-TET", &[0.0; 12])
    }

    /// Tuning with an explicit pitch (cents) for every key.
    pub fn from_keys(name: impl Into<String>, pitches: &[f32; MIDI_KEYS]) -> Self {
        Self {
            name: name.into(),
            pitches: *pitches,
        }
    }

    /// Octave-repeating tuning from 12 deviations (cents) from equal
    /// temperament, indexed by pitch class (C = 0).
    pub fn from_octave(name: impl Into<String>, deviations: &[f32; 12]) -> Self {
        let mut pitches = [0.0; MIDI_KEYS];
        for (key, pitch) in pitches.iter_mut().enumerate() {
            *pitch = equal_cents(key as u8) + deviations[key % 12];
        }
        Self {
            name: name.into(),
            pitches,
        }
    }

    /// Octave-repeating tuning from 12 scale degrees measured from C.
    pub fn from_degrees(name: impl Into<String>, degrees: &[ScaleDegree; 12]) -> Self {
        let mut deviations = [0.0; 12];
        for (i, degree) in degrees.iter().enumerate() {
            deviations[i] = degree.cents - i as f32 * 100.0;
        }
        Self::from_octave(name, &deviations)
    }

    /// 5-limit just intonation on C.
    pub fn just_intonation() -> Self {
        let ratios = [
            1.0,         // Unison
            16.0 / 15.0, // Minor second
            9.0 / 8.0,   // Major second
            6.0 / 5.0,   // Minor third
            5.0 / 4.0,   // Major third
            4.0 / 3.0,   // Perfect fourth
            45.0 / 32.0, // Tritone
            3.0 / 2.0,   // Perfect fifth
            8.0 / 5.0,   // Minor sixth
            5.0 / 3.0,   // Major sixth
            9.0 / 5.0,   // Minor seventh
            15.0 / 8.0,  // Major seventh
        ];
        Self::from_degrees("Just Intonation", &ratios.map(ScaleDegree::from_ratio))
    }

    /// Pythagorean tuning (stacked 3:2 fifths) on C.
    pub fn pythagorean() -> Self {
        let ratios = [
            1.0,           // C
            256.0 / 243.0, // C#/Db
            9.0 / 8.0,     // D
            32.0 / 27.0,   // D#/Eb
            81.0 / 64.0,   // E
            4.0 / 3.0,     // F
            729.0 / 512.0, // F#/Gb
            3.0 / 2.0,     // G
            128.0 / 81.0,  // G#/Ab
            27.0 / 16.0,   // A
            16.0 / 9.0,    // A#/Bb
            243.0 / 128.0, // B
        ];
        Self::from_degrees("Pythagorean", &ratios.map(ScaleDegree::from_ratio))
    }

    /// Quarter-comma meantone on C.
    pub fn meantone() -> Self {
        let cents = [
            0.0, 76.0, 193.0, 310.0, 386.0, 503.0, 579.0, 697.0, 773.0, 890.0, 1007.0, 1083.0,
        ];
        Self::from_degrees("Meantone", &cents.map(ScaleDegree::from_cents))
    }

    /// Absolute pitch of `key` in cents.
    #[inline]
    pub fn pitch(&self, key: u8) -> f32 {
        self.pitches[key as usize & 0x7F]
    }

    /// Offset of `key` from equal temperament in cents.
    #[inline]
    pub fn deviation(&self, key: u8) -> f32 {
        self.pitch(key) - equal_cents(key & 0x7F)
    }

    pub fn pitches(&self) -> &[f32; MIDI_KEYS] {
        &self.pitches
    }

    pub fn set_pitch(&mut self, key: u8, cents: f32) {
        self.pitches[key as usize & 0x7F] = cents;
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }
}

impl Default for Tuning {
    fn default() -> Self {
        Self::equal_temperament()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_equal_temperament() {
        let tuning = Tuning::equal_temperament();
        assert_relative_eq!(tuning.pitch(60), 6000.0);
        assert_relative_eq!(tuning.deviation(61), 0.0);
        assert_relative_eq!(tuning.pitch(81) - tuning.pitch(69), 1200.0);
    }

    #[test]
    fn test_octave_tuning_repeats() {
        let deviations = [0.0, -10.0, 4.0, 16.0, -14.0, -2.0, -17.0, 2.0, 14.0, -16.0, 18.0, -12.0];
        let tuning = Tuning::from_octave("test", &deviations);
        for key in 0..128u8 {
            assert_relative_eq!(tuning.deviation(key), deviations[key as usize % 12]);
            assert_relative_eq!(
                tuning.pitch(key),
                key as f32 * 100.0 + deviations[key as usize % 12]
            );
        }
    }

    #[test]
    fn test_just_intonation_fifth() {
        let tuning = Tuning::just_intonation();
        // C to G is a pure 3:2
        let fifth = tuning.pitch(67) - tuning.pitch(60);
        assert_relative_eq!(fifth, 1200.0 * 1.5f32.log2(), epsilon = 0.01);
        assert_relative_eq!(tuning.deviation(60), 0.0, epsilon = 0.001);
    }

    #[test]
    fn test_meantone_major_third_is_pure() {
        let tuning = Tuning::meantone();
        assert_relative_eq!(tuning.pitch(64) - tuning.pitch(60), 386.0);
    }

    #[test]
    fn test_from_keys_and_set_pitch() {
        let mut pitches = [0.0; MIDI_KEYS];
        for (key, p) in pitches.iter_mut().enumerate() {
            *p = key as f32 * 50.0;
        }
        let mut tuning = Tuning::from_keys("quarter", &pitches);
        assert_relative_eq!(tuning.pitch(24), 1200.0);
        tuning.set_pitch(24, 2400.0);
        assert_relative_eq!(tuning.deviation(24), 0.0);
        assert_eq!(tuning.name(), "quarter");
    }
}
