//! Bookkeeping voice pool with stealing strategies.
//!
//! [`SlotPool`] implements [`VoicePool`] without producing audio: it tracks
//! voice slots, pedal holds, per-voice portamento pitch and release tails.
//! Useful as a reference for pool implementors and for driving the
//! dispatch core without a DSP layer.
//!
//! No allocations after construction except in `set_polyphony`.

use crate::generator::GenParam;
use crate::portamento::{GlideState, PortamentoCurve};
use crate::voice::{
    ControlUpdate, Hold, ReleaseKind, Retrigger, RetriggerKind, VoiceHandle, VoiceInfo,
    VoicePool, VoiceRequest, VoiceState,
};
use crate::{Error, Result};

/// Which voice to steal when every slot is busy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StealStrategy {
    /// Steal the oldest playing voice (most common)
    #[default]
    Oldest,
    /// Steal the quietest voice (lowest envelope level)
    Quietest,
    /// Steal the highest pitched voice
    HighestNote,
    /// Steal the lowest pitched voice
    LowestNote,
    /// Steal the most recent voice
    Newest,
    /// Never steal; allocation fails with `Busy`
    NoSteal,
}

#[derive(Debug, Clone)]
pub struct SlotPoolConfig {
    pub max_voices: usize,
    pub strategy: StealStrategy,
    pub sample_rate: f32,
    /// Release tail in seconds.
    pub release_time: f32,
    /// Release tail for [`ReleaseKind::Fast`], in seconds.
    pub fast_release_time: f32,
    pub glide_curve: PortamentoCurve,
}

impl Default for SlotPoolConfig {
    fn default() -> Self {
        Self {
            max_voices: 64,
            strategy: StealStrategy::Oldest,
            sample_rate: 44100.0,
            release_time: 0.1,
            fast_release_time: 0.01,
            glide_curve: PortamentoCurve::Linear,
        }
    }
}

/// One voice slot.
#[derive(Debug, Clone)]
pub struct VoiceSlot {
    pub handle: VoiceHandle,
    pub id: u32,
    pub channel: usize,
    pub key: u8,
    pub velocity: u8,
    /// Envelope level (0.0-1.0): velocity at start, fading during release
    pub envelope_level: f32,
    /// Frame time the voice started
    pub start_time: u64,
    pub state: VoiceState,
    /// Allocated and not yet finished
    pub in_use: bool,
    /// Pitch in cents, gliding when portamento applies
    pub pitch: GlideState,
    /// Frames left in the release tail
    pub release_remaining: usize,
    /// Last retrigger applied, for inspection
    pub last_retrigger: Option<RetriggerKind>,
}

impl VoiceSlot {
    fn idle(curve: PortamentoCurve) -> Self {
        Self {
            handle: VoiceHandle(0),
            id: 0,
            channel: 0,
            key: 0,
            velocity: 0,
            envelope_level: 0.0,
            start_time: 0,
            state: VoiceState::Idle,
            in_use: false,
            pitch: GlideState::new(0.0, curve),
            release_remaining: 0,
            last_retrigger: None,
        }
    }
}

pub struct SlotPool {
    config: SlotPoolConfig,
    slots: Vec<VoiceSlot>,
    next_handle: u64,
    current_time: u64,
}

impl SlotPool {
    pub fn new(config: SlotPoolConfig) -> Self {
        let slots = (0..config.max_voices)
            .map(|_| VoiceSlot::idle(config.glide_curve))
            .collect();
        Self {
            config,
            slots,
            next_handle: 1,
            current_time: 0,
        }
    }

    pub fn slots(&self) -> &[VoiceSlot] {
        &self.slots
    }

    pub fn slot(&self, voice: VoiceHandle) -> Option<&VoiceSlot> {
        self.slots.iter().find(|s| s.in_use && s.handle == voice)
    }

    pub fn max_voices(&self) -> usize {
        self.slots.len()
    }

    fn slot_mut(&mut self, voice: VoiceHandle) -> Option<&mut VoiceSlot> {
        self.slots.iter_mut().find(|s| s.in_use && s.handle == voice)
    }

    fn find_free_slot(&self) -> Option<usize> {
        self.slots.iter().position(|s| !s.in_use)
    }

    fn find_slot_to_steal(&self) -> Option<usize> {
        // First, try to steal a releasing voice
        let releasing = self
            .slots
            .iter()
            .enumerate()
            .filter(|(_, s)| s.in_use && s.state == VoiceState::Releasing);

        if let Some((i, _)) = releasing.min_by_key(|(_, s)| s.release_remaining) {
            return Some(i);
        }

        let active = self
            .slots
            .iter()
            .enumerate()
            .filter(|(_, s)| s.in_use && s.state != VoiceState::Releasing);

        match self.config.strategy {
            StealStrategy::Oldest => active.min_by_key(|(_, s)| s.start_time).map(|(i, _)| i),
            StealStrategy::Quietest => active
                .min_by(|(_, a), (_, b)| a.envelope_level.total_cmp(&b.envelope_level))
                .map(|(i, _)| i),
            StealStrategy::HighestNote => active.max_by_key(|(_, s)| s.key).map(|(i, _)| i),
            StealStrategy::LowestNote => active.min_by_key(|(_, s)| s.key).map(|(i, _)| i),
            StealStrategy::Newest => active.max_by_key(|(_, s)| s.start_time).map(|(i, _)| i),
            StealStrategy::NoSteal => None,
        }
    }

    fn release_frames(&self, kind: ReleaseKind) -> usize {
        let seconds = match kind {
            ReleaseKind::Normal => self.config.release_time,
            ReleaseKind::Fast => self.config.fast_release_time,
        };
        (seconds * self.config.sample_rate).max(0.0) as usize
    }

    fn finish(slot: &mut VoiceSlot) {
        slot.in_use = false;
        slot.state = VoiceState::Idle;
        slot.release_remaining = 0;
    }
}

impl VoicePool for SlotPool {
    fn allocate(&mut self, request: &VoiceRequest) -> Result<VoiceHandle> {
        let index = match self.find_free_slot() {
            Some(index) => index,
            None => {
                if self.config.strategy == StealStrategy::NoSteal {
                    return Err(Error::Busy);
                }
                self.find_slot_to_steal().ok_or(Error::Busy)?
            }
        };

        let handle = VoiceHandle(self.next_handle);
        self.next_handle += 1;

        let mut pitch = GlideState::new(request.pitch_cents, self.config.glide_curve);
        if let Some(glide) = request.glide {
            pitch.start(
                glide.from_cents,
                request.pitch_cents,
                glide.time_ms,
                self.config.sample_rate,
            );
        }

        self.slots[index] = VoiceSlot {
            handle,
            id: request.id,
            channel: request.channel,
            key: request.key,
            velocity: request.velocity,
            envelope_level: 0.0,
            start_time: self.current_time,
            state: VoiceState::Idle,
            in_use: true,
            pitch,
            release_remaining: 0,
            last_retrigger: None,
        };
        Ok(handle)
    }

    fn start(&mut self, voice: VoiceHandle) {
        if let Some(slot) = self.slot_mut(voice) {
            if slot.state == VoiceState::Idle {
                slot.state = VoiceState::Playing;
                slot.envelope_level = slot.velocity as f32 / 127.0;
            }
        }
    }

    fn release(&mut self, voice: VoiceHandle, kind: ReleaseKind) {
        let frames = self.release_frames(kind);
        if let Some(slot) = self.slot_mut(voice) {
            match slot.state {
                VoiceState::Idle => Self::finish(slot),
                VoiceState::Releasing => {
                    slot.release_remaining = slot.release_remaining.min(frames);
                }
                _ => {
                    slot.state = VoiceState::Releasing;
                    slot.release_remaining = frames;
                }
            }
        }
    }

    fn kill(&mut self, voice: VoiceHandle) {
        if let Some(slot) = self.slot_mut(voice) {
            Self::finish(slot);
        }
    }

    fn retrigger(&mut self, voice: VoiceHandle, retrigger: &Retrigger) {
        let sample_rate = self.config.sample_rate;
        if let Some(slot) = self.slot_mut(voice) {
            let from = slot.pitch.current();
            slot.key = retrigger.key;
            slot.velocity = retrigger.velocity;
            slot.state = VoiceState::Playing;
            slot.last_retrigger = Some(retrigger.kind);
            match retrigger.glide {
                Some(glide) => slot
                    .pitch
                    .start(from, retrigger.pitch_cents, glide.time_ms, sample_rate),
                None => slot.pitch.reset(retrigger.pitch_cents),
            }
            if retrigger.kind == RetriggerKind::MultiRetrigger {
                slot.envelope_level = retrigger.velocity as f32 / 127.0;
            }
        }
    }

    fn hold(&mut self, voice: VoiceHandle, hold: Hold) {
        if let Some(slot) = self.slot_mut(voice) {
            if slot.state.is_on() {
                slot.state = match hold {
                    Hold::Sustain => VoiceState::Sustained,
                    Hold::Sostenuto => VoiceState::HeldBySostenuto,
                };
            }
        }
    }

    fn set_pitch(&mut self, voice: VoiceHandle, cents: f32) {
        if let Some(slot) = self.slot_mut(voice) {
            slot.pitch.retarget(cents);
        }
    }

    fn modulate(&mut self, _voice: VoiceHandle, _update: ControlUpdate) {}

    fn update_generator(
        &mut self,
        _voice: VoiceHandle,
        _param: GenParam,
        _value: f32,
        _absolute: bool,
    ) {
    }

    fn for_each_voice(&self, f: &mut dyn FnMut(&VoiceInfo)) {
        for slot in self.slots.iter().filter(|s| s.in_use) {
            f(&VoiceInfo {
                handle: slot.handle,
                id: slot.id,
                channel: slot.channel,
                key: slot.key,
                velocity: slot.velocity,
                state: slot.state,
            });
        }
    }

    fn render(&mut self, left: &mut [f32], right: &mut [f32]) {
        let frames = left.len().min(right.len());
        for slot in self.slots.iter_mut().filter(|s| s.in_use) {
            slot.pitch.advance(frames);
            if slot.state == VoiceState::Releasing {
                if slot.release_remaining <= frames {
                    Self::finish(slot);
                } else {
                    // Linear fade over what is left of the tail
                    let remaining = slot.release_remaining - frames;
                    slot.envelope_level *= remaining as f32 / slot.release_remaining as f32;
                    slot.release_remaining = remaining;
                }
            }
        }
        self.current_time = self.current_time.wrapping_add(frames as u64);
    }

    fn active_count(&self) -> usize {
        self.slots.iter().filter(|s| s.in_use).count()
    }

    fn set_sample_rate(&mut self, sample_rate: f32) {
        self.config.sample_rate = sample_rate;
    }

    fn set_polyphony(&mut self, voices: usize) -> Result<()> {
        if voices == 0 {
            return Err(Error::invalid("polyphony must be at least 1"));
        }
        if voices < self.slots.len() {
            // Drop the excess slots, oldest-allocated voices are kept
            let mut kept: Vec<VoiceSlot> = self.slots.drain(..).filter(|s| s.in_use).collect();
            kept.sort_by_key(|s| s.start_time);
            kept.truncate(voices);
            kept.resize_with(voices, || VoiceSlot::idle(self.config.glide_curve));
            self.slots = kept;
        } else {
            let curve = self.config.glide_curve;
            self.slots.resize_with(voices, || VoiceSlot::idle(curve));
        }
        self.config.max_voices = voices;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::InterpolationMethod;
    use crate::generator::GeneratorCache;
    use crate::portamento::Glide;
    use crate::tuning::equal_cents;
    use approx::assert_relative_eq;

    fn request(key: u8) -> VoiceRequest {
        VoiceRequest {
            zone: 0,
            channel: 0,
            key,
            velocity: 100,
            id: key as u32,
            generators: GeneratorCache::default(),
            pitch_cents: equal_cents(key),
            glide: None,
            breath_default: false,
            interpolation: InterpolationMethod::default(),
        }
    }

    fn pool(max_voices: usize, strategy: StealStrategy) -> SlotPool {
        SlotPool::new(SlotPoolConfig {
            max_voices,
            strategy,
            ..Default::default()
        })
    }

    fn play(pool: &mut SlotPool, key: u8) -> VoiceHandle {
        play_at(pool, key, 100)
    }

    fn play_at(pool: &mut SlotPool, key: u8, velocity: u8) -> VoiceHandle {
        let h = pool.allocate(&VoiceRequest {
            velocity,
            ..request(key)
        })
        .unwrap();
        pool.start(h);
        h
    }

    #[test]
    fn test_basic_allocation() {
        let mut pool = pool(4, StealStrategy::Oldest);
        let a = play(&mut pool, 60);
        let b = play(&mut pool, 64);
        assert_ne!(a, b);
        assert_eq!(pool.active_count(), 2);
        assert_eq!(pool.slot(a).map(|s| s.state), Some(VoiceState::Playing));
    }

    #[test]
    fn test_voice_stealing_oldest() {
        let mut pool = pool(2, StealStrategy::Oldest);
        let first = play(&mut pool, 60);
        pool.render(&mut [0.0; 64], &mut [0.0; 64]);
        play(&mut pool, 64);
        pool.render(&mut [0.0; 64], &mut [0.0; 64]);

        play(&mut pool, 67);
        assert!(pool.slot(first).is_none());
        assert_eq!(pool.active_count(), 2);
    }

    #[test]
    fn test_voice_stealing_quietest() {
        let mut pool = pool(3, StealStrategy::Quietest);
        let loud = play_at(&mut pool, 60, 120);
        let soft = play_at(&mut pool, 64, 30);
        let mid = play_at(&mut pool, 67, 80);

        play(&mut pool, 72);
        assert!(pool.slot(soft).is_none());
        assert!(pool.slot(loud).is_some());
        assert!(pool.slot(mid).is_some());
    }

    #[test]
    fn test_release_fades_envelope_level() {
        let mut pool = pool(4, StealStrategy::Quietest);
        let h = play_at(&mut pool, 60, 127);
        assert_relative_eq!(pool.slot(h).unwrap().envelope_level, 1.0);

        // 100ms at 44.1kHz = 4410 frames
        pool.release(h, ReleaseKind::Normal);
        pool.render(&mut [0.0; 64], &mut [0.0; 64]);
        assert_relative_eq!(
            pool.slot(h).unwrap().envelope_level,
            4346.0 / 4410.0,
            epsilon = 1e-6
        );
        pool.render(&mut [0.0; 64], &mut [0.0; 64]);
        assert_relative_eq!(
            pool.slot(h).unwrap().envelope_level,
            4282.0 / 4410.0,
            epsilon = 1e-5
        );
    }

    #[test]
    fn test_steal_prefers_releasing() {
        let mut pool = pool(2, StealStrategy::Oldest);
        let a = play(&mut pool, 60);
        let b = play(&mut pool, 64);
        pool.release(b, ReleaseKind::Normal);
        play(&mut pool, 67);
        assert!(pool.slot(a).is_some());
        assert!(pool.slot(b).is_none());
    }

    #[test]
    fn test_no_steal_is_busy() {
        let mut pool = pool(2, StealStrategy::NoSteal);
        play(&mut pool, 60);
        play(&mut pool, 64);
        assert_eq!(pool.allocate(&request(67)), Err(Error::Busy));
    }

    #[test]
    fn test_release_tail_frees_slot() {
        let mut pool = pool(4, StealStrategy::Oldest);
        let h = play(&mut pool, 60);
        pool.release(h, ReleaseKind::Fast);
        assert_eq!(pool.slot(h).map(|s| s.state), Some(VoiceState::Releasing));

        // 10ms at 44.1kHz = 441 frames
        for _ in 0..7 {
            pool.render(&mut [0.0; 64], &mut [0.0; 64]);
        }
        assert!(pool.slot(h).is_none());
        assert_eq!(pool.active_count(), 0);
    }

    #[test]
    fn test_hold_and_release() {
        let mut pool = pool(4, StealStrategy::Oldest);
        let h = play(&mut pool, 60);
        pool.hold(h, Hold::Sustain);
        assert_eq!(pool.slot(h).map(|s| s.state), Some(VoiceState::Sustained));
        pool.hold(h, Hold::Sostenuto);
        assert_eq!(
            pool.slot(h).map(|s| s.state),
            Some(VoiceState::HeldBySostenuto)
        );
        pool.release(h, ReleaseKind::Normal);
        assert_eq!(pool.slot(h).map(|s| s.state), Some(VoiceState::Releasing));
    }

    #[test]
    fn test_glide_on_allocate() {
        let mut pool = pool(4, StealStrategy::Oldest);
        let mut req = request(64);
        req.glide = Some(Glide {
            from_key: 60,
            from_cents: 6000.0,
            time_ms: 10,
        });
        let h = pool.allocate(&req).unwrap();
        pool.start(h);
        assert_relative_eq!(pool.slot(h).unwrap().pitch.current(), 6000.0);
        for _ in 0..8 {
            pool.render(&mut [0.0; 64], &mut [0.0; 64]);
        }
        assert_relative_eq!(pool.slot(h).unwrap().pitch.current(), 6400.0, epsilon = 0.01);
    }

    #[test]
    fn test_glide_from_tuned_source() {
        let mut pool = pool(4, StealStrategy::Oldest);
        let mut req = request(64);
        req.pitch_cents = 6414.0;
        req.glide = Some(Glide {
            from_key: 60,
            from_cents: 5970.0,
            time_ms: 10,
        });
        let h = pool.allocate(&req).unwrap();
        assert_relative_eq!(pool.slot(h).unwrap().pitch.current(), 5970.0);
        for _ in 0..8 {
            pool.render(&mut [0.0; 64], &mut [0.0; 64]);
        }
        assert_relative_eq!(pool.slot(h).unwrap().pitch.current(), 6414.0, epsilon = 0.01);
    }

    #[test]
    fn test_retrigger_pitch_only() {
        let mut pool = pool(4, StealStrategy::Oldest);
        let h = play(&mut pool, 60);
        pool.retrigger(
            h,
            &Retrigger {
                key: 67,
                velocity: 80,
                kind: RetriggerKind::PitchOnly,
                pitch_cents: 6700.0,
                glide: None,
            },
        );
        let slot = pool.slot(h).unwrap();
        assert_eq!(slot.key, 67);
        assert_eq!(slot.last_retrigger, Some(RetriggerKind::PitchOnly));
        assert_relative_eq!(slot.pitch.current(), 6700.0);
    }

    #[test]
    fn test_set_polyphony_shrinks() {
        let mut pool = pool(4, StealStrategy::Oldest);
        let a = play(&mut pool, 60);
        pool.render(&mut [0.0; 64], &mut [0.0; 64]);
        play(&mut pool, 62);
        play(&mut pool, 64);
        pool.set_polyphony(1).unwrap();
        assert_eq!(pool.max_voices(), 1);
        assert!(pool.slot(a).is_some());
        assert!(pool.set_polyphony(0).is_err());
    }
}
