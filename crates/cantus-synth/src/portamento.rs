//! Portamento (pitch glide) between notes.
//!
//! [`PortamentoMode`] decides whether a note transition glides,
//! [`Glide`] is the request handed to the voice pool, and [`GlideState`]
//! is the per-voice pitch tracker a pool advances while rendering.
//!
//! Pitches are absolute cents (key 60 = 6000 in equal temperament), so
//! interpolation is already in log-frequency space.

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// When a note transition glides from the previous pitch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PortamentoMode {
    /// Glide on every note
    EachNote,
    /// Glide only on legato transitions (a key still held)
    #[default]
    LegatoOnly,
    /// Glide only on staccato transitions (no key held)
    StaccatoOnly,
}

impl PortamentoMode {
    /// Whether a transition of the given kind glides.
    #[inline]
    pub fn glides(self, legato: bool) -> bool {
        match self {
            PortamentoMode::EachNote => true,
            PortamentoMode::LegatoOnly => legato,
            PortamentoMode::StaccatoOnly => !legato,
        }
    }
}

impl TryFrom<u8> for PortamentoMode {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(PortamentoMode::EachNote),
            1 => Ok(PortamentoMode::LegatoOnly),
            2 => Ok(PortamentoMode::StaccatoOnly),
            other => Err(Error::invalid(format!("portamento mode {other}"))),
        }
    }
}

/// Glide requested for a voice start or retrigger.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Glide {
    /// Key the pitch glides from.
    pub from_key: u8,
    /// Pitch of `from_key` in cents under the channel's tuning.
    pub from_cents: f32,
    /// Glide duration in milliseconds.
    pub time_ms: u32,
}

impl Glide {
    /// Glide time from the portamento time controllers (CC5 / CC37).
    #[inline]
    pub fn time_from_controllers(msb: u8, lsb: u8) -> u32 {
        (msb as u32) * 128 + lsb as u32
    }
}

/// Pick the key a transition glides from.
///
/// A pending portamento-control key (CC84) wins regardless of mode.
/// Otherwise `previous` is used when `mode` allows gliding for this kind of
/// transition.
pub fn glide_source(
    mode: PortamentoMode,
    legato: bool,
    control_key: Option<u8>,
    previous: Option<u8>,
) -> Option<u8> {
    if control_key.is_some() {
        return control_key;
    }
    if mode.glides(legato) {
        previous
    } else {
        None
    }
}

/// Glide curve shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PortamentoCurve {
    /// Linear in cents
    #[default]
    Linear,
    /// Exponential curve (slow start, fast finish)
    Exponential,
    /// Logarithmic curve (fast start, slow finish)
    Logarithmic,
}

/// Per-voice glide tracker.
///
/// All methods are RT-safe.
#[derive(Debug, Clone)]
pub struct GlideState {
    curve: PortamentoCurve,
    start_cents: f32,
    target_cents: f32,
    current_cents: f32,
    /// Progress (0.0 to 1.0)
    progress: f32,
    /// Progress per frame
    rate: f32,
}

impl GlideState {
    /// Tracker resting at `cents`.
    pub fn new(cents: f32, curve: PortamentoCurve) -> Self {
        Self {
            curve,
            start_cents: cents,
            target_cents: cents,
            current_cents: cents,
            progress: 1.0,
            rate: 0.0,
        }
    }

    /// Glide from `from_cents` to `to_cents` over `time_ms`.
    ///
    /// A zero time jumps straight to the target.
    pub fn start(&mut self, from_cents: f32, to_cents: f32, time_ms: u32, sample_rate: f32) {
        let frames = time_ms as f32 * 0.001 * sample_rate;
        if frames < 1.0 {
            self.reset(to_cents);
            return;
        }
        self.start_cents = from_cents;
        self.current_cents = from_cents;
        self.target_cents = to_cents;
        self.rate = 1.0 / frames;
        self.progress = 0.0;
    }

    /// Change the destination without restarting the glide.
    ///
    /// Used when a tuning change retunes a gliding voice.
    pub fn retarget(&mut self, cents: f32) {
        if self.is_complete() {
            self.reset(cents);
        } else {
            self.target_cents = cents;
        }
    }

    /// Advance by `frames` and return the pitch reached.
    pub fn advance(&mut self, frames: usize) -> f32 {
        if self.progress >= 1.0 {
            return self.target_cents;
        }

        self.progress = (self.progress + self.rate * frames as f32).min(1.0);

        let t = match self.curve {
            PortamentoCurve::Linear => self.progress,
            PortamentoCurve::Exponential => self.progress * self.progress,
            PortamentoCurve::Logarithmic => self.progress.sqrt(),
        };
        self.current_cents = self.start_cents + (self.target_cents - self.start_cents) * t;
        self.current_cents
    }

    /// Jump to `cents` (no glide).
    pub fn reset(&mut self, cents: f32) {
        self.start_cents = cents;
        self.target_cents = cents;
        self.current_cents = cents;
        self.progress = 1.0;
    }

    #[inline]
    pub fn current(&self) -> f32 {
        self.current_cents
    }

    #[inline]
    pub fn target(&self) -> f32 {
        self.target_cents
    }

    #[inline]
    pub fn is_complete(&self) -> bool {
        self.progress >= 1.0
    }
}
