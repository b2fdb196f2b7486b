//! Synthesis generators and the per-channel override cache.
//!
//! The table follows the SoundFont 2.01 generator list, plus one custom
//! pitch generator at the end.

use crate::{Error, Result};

/// Number of generator slots.
pub const GEN_COUNT: usize = 60;

/// Synthesis generator, numbered as in SoundFont 2.01.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum GenParam {
    StartAddrOfs = 0,
    EndAddrOfs,
    StartLoopAddrOfs,
    EndLoopAddrOfs,
    StartAddrCoarseOfs,
    ModLfoToPitch,
    VibLfoToPitch,
    ModEnvToPitch,
    FilterFc,
    FilterQ,
    ModLfoToFilterFc,
    ModEnvToFilterFc,
    EndAddrCoarseOfs,
    ModLfoToVol,
    Unused1,
    ChorusSend,
    ReverbSend,
    Pan,
    Unused2,
    Unused3,
    Unused4,
    ModLfoDelay,
    ModLfoFreq,
    VibLfoDelay,
    VibLfoFreq,
    ModEnvDelay,
    ModEnvAttack,
    ModEnvHold,
    ModEnvDecay,
    ModEnvSustain,
    ModEnvRelease,
    KeyToModEnvHold,
    KeyToModEnvDecay,
    VolEnvDelay,
    VolEnvAttack,
    VolEnvHold,
    VolEnvDecay,
    VolEnvSustain,
    VolEnvRelease,
    KeyToVolEnvHold,
    KeyToVolEnvDecay,
    Instrument,
    Reserved1,
    KeyRange,
    VelRange,
    StartLoopAddrCoarseOfs,
    KeyNum,
    Velocity,
    Attenuation,
    Reserved2,
    EndLoopAddrCoarseOfs,
    CoarseTune,
    FineTune,
    SampleId,
    SampleMode,
    Reserved3,
    ScaleTune,
    ExclusiveClass,
    OverrideRootKey,
    /// Voice pitch in cents; not part of SoundFont 2.01.
    Pitch,
}

/// Static description of a generator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenInfo {
    pub param: GenParam,
    /// Set on voices at initialization.
    pub init: bool,
    /// Multiplier applied to NRPN data entry values.
    pub nrpn_scale: u16,
    pub min: f32,
    pub max: f32,
    pub default: f32,
}

const fn entry(
    param: GenParam,
    init: bool,
    nrpn_scale: u16,
    min: f32,
    max: f32,
    default: f32,
) -> GenInfo {
    GenInfo {
        param,
        init,
        nrpn_scale,
        min,
        max,
        default,
    }
}

use GenParam as G;

static GEN_INFO: [GenInfo; GEN_COUNT] = [
    entry(G::StartAddrOfs, true, 1, 0.0, 1e10, 0.0),
    entry(G::EndAddrOfs, true, 1, -1e10, 0.0, 0.0),
    entry(G::StartLoopAddrOfs, true, 1, -1e10, 1e10, 0.0),
    entry(G::EndLoopAddrOfs, true, 1, -1e10, 1e10, 0.0),
    entry(G::StartAddrCoarseOfs, false, 1, 0.0, 1e10, 0.0),
    entry(G::ModLfoToPitch, true, 2, -12000.0, 12000.0, 0.0),
    entry(G::VibLfoToPitch, true, 2, -12000.0, 12000.0, 0.0),
    entry(G::ModEnvToPitch, true, 2, -12000.0, 12000.0, 0.0),
    entry(G::FilterFc, true, 2, 1500.0, 13500.0, 13500.0),
    entry(G::FilterQ, true, 1, 0.0, 960.0, 0.0),
    entry(G::ModLfoToFilterFc, true, 2, -12000.0, 12000.0, 0.0),
    entry(G::ModEnvToFilterFc, true, 2, -12000.0, 12000.0, 0.0),
    entry(G::EndAddrCoarseOfs, false, 1, -1e10, 0.0, 0.0),
    entry(G::ModLfoToVol, true, 1, -960.0, 960.0, 0.0),
    entry(G::Unused1, false, 0, 0.0, 0.0, 0.0),
    entry(G::ChorusSend, true, 1, 0.0, 1000.0, 0.0),
    entry(G::ReverbSend, true, 1, 0.0, 1000.0, 0.0),
    entry(G::Pan, true, 1, -500.0, 500.0, 0.0),
    entry(G::Unused2, false, 0, 0.0, 0.0, 0.0),
    entry(G::Unused3, false, 0, 0.0, 0.0, 0.0),
    entry(G::Unused4, false, 0, 0.0, 0.0, 0.0),
    entry(G::ModLfoDelay, true, 2, -12000.0, 5000.0, -12000.0),
    entry(G::ModLfoFreq, true, 4, -16000.0, 4500.0, 0.0),
    entry(G::VibLfoDelay, true, 2, -12000.0, 5000.0, -12000.0),
    entry(G::VibLfoFreq, true, 4, -16000.0, 4500.0, 0.0),
    entry(G::ModEnvDelay, true, 2, -12000.0, 5000.0, -12000.0),
    entry(G::ModEnvAttack, true, 2, -12000.0, 8000.0, -12000.0),
    entry(G::ModEnvHold, true, 2, -12000.0, 5000.0, -12000.0),
    entry(G::ModEnvDecay, true, 2, -12000.0, 8000.0, -12000.0),
    entry(G::ModEnvSustain, false, 1, 0.0, 1000.0, 0.0),
    entry(G::ModEnvRelease, true, 2, -12000.0, 8000.0, -12000.0),
    entry(G::KeyToModEnvHold, false, 1, -1200.0, 1200.0, 0.0),
    entry(G::KeyToModEnvDecay, false, 1, -1200.0, 1200.0, 0.0),
    entry(G::VolEnvDelay, true, 2, -12000.0, 5000.0, -12000.0),
    entry(G::VolEnvAttack, true, 2, -12000.0, 8000.0, -12000.0),
    entry(G::VolEnvHold, true, 2, -12000.0, 5000.0, -12000.0),
    entry(G::VolEnvDecay, true, 2, -12000.0, 8000.0, -12000.0),
    entry(G::VolEnvSustain, false, 1, 0.0, 1440.0, 0.0),
    entry(G::VolEnvRelease, true, 2, -12000.0, 8000.0, -12000.0),
    entry(G::KeyToVolEnvHold, false, 1, -1200.0, 1200.0, 0.0),
    entry(G::KeyToVolEnvDecay, false, 1, -1200.0, 1200.0, 0.0),
    entry(G::Instrument, false, 0, 0.0, 0.0, 0.0),
    entry(G::Reserved1, false, 0, 0.0, 0.0, 0.0),
    entry(G::KeyRange, false, 0, 0.0, 127.0, 0.0),
    entry(G::VelRange, false, 0, 0.0, 127.0, 0.0),
    entry(G::StartLoopAddrCoarseOfs, false, 1, -1e10, 1e10, 0.0),
    entry(G::KeyNum, true, 0, 0.0, 127.0, -1.0),
    entry(G::Velocity, true, 1, 0.0, 127.0, -1.0),
    entry(G::Attenuation, true, 1, 0.0, 1440.0, 0.0),
    entry(G::Reserved2, false, 0, 0.0, 0.0, 0.0),
    entry(G::EndLoopAddrCoarseOfs, false, 1, -1e10, 1e10, 0.0),
    entry(G::CoarseTune, false, 1, -120.0, 120.0, 0.0),
    entry(G::FineTune, false, 1, -99.0, 99.0, 0.0),
    entry(G::SampleId, false, 0, 0.0, 0.0, 0.0),
    entry(G::SampleMode, false, 0, 0.0, 0.0, 0.0),
    entry(G::Reserved3, false, 0, 0.0, 0.0, 0.0),
    entry(G::ScaleTune, false, 1, 0.0, 1200.0, 100.0),
    entry(G::ExclusiveClass, false, 0, 0.0, 0.0, 0.0),
    entry(G::OverrideRootKey, true, 0, 0.0, 127.0, -1.0),
    entry(G::Pitch, true, 0, 0.0, 127.0, 0.0),
];

impl GenParam {
    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    #[inline]
    pub fn info(self) -> &'static GenInfo {
        &GEN_INFO[self.index()]
    }

    /// Map a normalized 0-1 value to the generator's native range.
    #[inline]
    pub fn denormalize(self, normalized: f32) -> f32 {
        let info = self.info();
        info.min + normalized.clamp(0.0, 1.0) * (info.max - info.min)
    }

    /// Scale a 14-bit NRPN data entry value (centre 8192).
    #[inline]
    pub fn scale_nrpn(self, data: u16) -> f32 {
        let value = (data as i32 - 8192).clamp(-8192, 8192);
        (value * self.info().nrpn_scale as i32) as f32
    }

    pub fn all() -> impl Iterator<Item = GenParam> {
        GEN_INFO.iter().map(|info| info.param)
    }
}

impl TryFrom<usize> for GenParam {
    type Error = Error;

    fn try_from(index: usize) -> Result<Self> {
        GEN_INFO
            .get(index)
            .map(|info| info.param)
            .ok_or_else(|| Error::invalid(format!("generator {index} (have {GEN_COUNT})")))
    }
}

/// Per-channel generator overrides.
///
/// Each slot holds a value and whether it replaces (absolute) or offsets
/// (relative) the value derived from the SoundFont and its modulators.
/// `Copy` so that voice requests carry a snapshot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeneratorCache {
    values: [f32; GEN_COUNT],
    absolute: [bool; GEN_COUNT],
}

impl Default for GeneratorCache {
    fn default() -> Self {
        Self {
            values: [0.0; GEN_COUNT],
            absolute: [false; GEN_COUNT],
        }
    }
}

impl GeneratorCache {
    #[inline]
    pub fn get(&self, param: GenParam) -> f32 {
        self.values[param.index()]
    }

    #[inline]
    pub fn is_absolute(&self, param: GenParam) -> bool {
        self.absolute[param.index()]
    }

    #[inline]
    pub fn set(&mut self, param: GenParam, value: f32, absolute: bool) {
        self.values[param.index()] = value;
        self.absolute[param.index()] = absolute;
    }

    /// Combine with a SoundFont-derived value.
    #[inline]
    pub fn apply(&self, param: GenParam, base: f32) -> f32 {
        if self.is_absolute(param) {
            self.get(param)
        } else {
            base + self.get(param)
        }
    }

    /// Slots holding a non-neutral override.
    pub fn overrides(&self) -> impl Iterator<Item = (GenParam, f32, bool)> + '_ {
        GenParam::all()
            .filter(|&p| self.is_absolute(p) || self.get(p) != 0.0)
            .map(|p| (p, self.get(p), self.is_absolute(p)))
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
