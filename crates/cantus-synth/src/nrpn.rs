//! RPN / NRPN controller sequence parsing.
//!
//! NRPN uses the SoundFont 2.01 scheme: NRPN MSB 120 switches the NRPN LSB
//! into generator addressing, where LSB 100 / 101 / 102 add 100 / 1000 /
//! 10000 to the selected generator number and LSB < 100 adds its value and
//! completes the selection. RPN handles the standard registered parameters.
//!
//! The parser only tracks selection state. It reads the channel's
//! controller array (already updated with the incoming value) and reports
//! what a data entry means; the channel applies it.

use cantus_midi::cc;

use crate::generator::GenParam;

/// Effect of a data entry (CC6) message.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DataEntry {
    /// Relative generator override.
    Generator { param: GenParam, value: f32 },
    /// Pitch wheel sensitivity in semitones.
    PitchBendRange(u8),
    /// Channel fine tune in cents (-100..100).
    FineTune(f32),
    /// Channel coarse tune in semitones.
    CoarseTune(f32),
    /// Select and activate a tuning program in the current tuning bank.
    TuningProgram(u8),
    TuningBank(u8),
}

/// Per-channel parameter-number selection state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParamParser {
    nrpn_select: u32,
    nrpn_active: bool,
}

impl ParamParser {
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    #[inline]
    pub fn nrpn_active(&self) -> bool {
        self.nrpn_active
    }

    /// Generator number selected so far.
    #[inline]
    pub fn nrpn_select(&self) -> u32 {
        self.nrpn_select
    }

    /// Feed one controller. `controllers` already holds `value` at `control`.
    ///
    /// Selection controllers may rewrite `controllers` (NRPN MSB clears the
    /// NRPN LSB). Returns the parameter change a data entry MSB resolves to.
    pub fn control(
        &mut self,
        control: u8,
        value: u8,
        controllers: &mut [u8; 128],
    ) -> Option<DataEntry> {
        match control {
            cc::NRPN_MSB => {
                controllers[cc::NRPN_LSB as usize] = 0;
                self.nrpn_select = 0;
                self.nrpn_active = true;
                None
            }
            cc::NRPN_LSB => {
                if controllers[cc::NRPN_MSB as usize] == cc::NRPN_SOUNDFONT_MSB {
                    self.nrpn_select += match value {
                        100 => 100,
                        101 => 1000,
                        102 => 10000,
                        v if v < 100 => v as u32,
                        _ => 0,
                    };
                }
                self.nrpn_active = true;
                None
            }
            cc::RPN_MSB | cc::RPN_LSB => {
                self.nrpn_active = false;
                None
            }
            cc::DATA_ENTRY_MSB => self.data_entry(controllers),
            _ => None,
        }
    }

    fn data_entry(&mut self, controllers: &[u8; 128]) -> Option<DataEntry> {
        let msb = controllers[cc::DATA_ENTRY_MSB as usize];
        let lsb = controllers[cc::DATA_ENTRY_LSB as usize];
        let data = ((msb as u16) << 7) | lsb as u16;

        if self.nrpn_active {
            if controllers[cc::NRPN_MSB as usize] != cc::NRPN_SOUNDFONT_MSB
                || controllers[cc::NRPN_LSB as usize] >= 100
            {
                return None;
            }
            let selected = self.nrpn_select;
            self.nrpn_select = 0;
            let param = GenParam::try_from(selected as usize).ok()?;
            return Some(DataEntry::Generator {
                param,
                value: param.scale_nrpn(data),
            });
        }

        if controllers[cc::RPN_MSB as usize] != 0 {
            return None;
        }
        match controllers[cc::RPN_LSB as usize] {
            cc::rpn::PITCH_BEND_RANGE => Some(DataEntry::PitchBendRange(msb)),
            cc::rpn::CHANNEL_FINE_TUNE => Some(DataEntry::FineTune(
                (data as f32 - 8192.0) / 8192.0 * 100.0,
            )),
            cc::rpn::CHANNEL_COARSE_TUNE => Some(DataEntry::CoarseTune(msb as f32 - 64.0)),
            cc::rpn::TUNING_PROGRAM_CHANGE => Some(DataEntry::TuningProgram(msb)),
            cc::rpn::TUNING_BANK_SELECT => Some(DataEntry::TuningBank(msb)),
            _ => None,
        }
    }
}
