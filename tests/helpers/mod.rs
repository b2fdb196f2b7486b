//! Test doubles for the cantus integration tests.
//!
//! [`RecordingPool`] keeps a log of every call the dispatch core makes, so
//! tests can assert on the exact voice traffic a MIDI sequence produces.

#![allow(dead_code)]

use std::sync::Arc;

use cantus::synth::{
    ControlUpdate, GenParam, Hold, Preset, ReleaseKind, Result, Retrigger, SoundFont, Synth,
    SynthConfig, VoiceHandle, VoiceInfo, VoicePool, VoiceRequest, VoiceState, ZoneList,
};

/// One call into the pool.
#[derive(Debug, Clone, PartialEq)]
pub enum PoolCall {
    Allocate(VoiceRequest),
    Start(VoiceHandle),
    Release(VoiceHandle, ReleaseKind),
    Kill(VoiceHandle),
    Retrigger(VoiceHandle, Retrigger),
    Hold(VoiceHandle, Hold),
    SetPitch(VoiceHandle, f32),
    Modulate(VoiceHandle, ControlUpdate),
    UpdateGenerator(VoiceHandle, GenParam, f32, bool),
}

/// Voice pool that records calls and tracks voice state, nothing else.
#[derive(Default)]
pub struct RecordingPool {
    pub calls: Vec<PoolCall>,
    voices: Vec<VoiceInfo>,
    next_handle: u64,
}

impl RecordingPool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn voice(&self, handle: VoiceHandle) -> Option<&VoiceInfo> {
        self.voices.iter().find(|v| v.handle == handle)
    }

    /// Requests of every voice started so far, in order.
    pub fn started(&self) -> Vec<VoiceRequest> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                PoolCall::Allocate(request) => Some(*request),
                _ => None,
            })
            .collect()
    }

    /// Calls reduced to start / release / retrigger, keyed by note.
    pub fn key_events(&self) -> Vec<(&'static str, u8)> {
        let mut keys = std::collections::HashMap::new();
        let mut events = Vec::new();
        let mut pending = None;
        for call in &self.calls {
            match call {
                PoolCall::Allocate(request) => pending = Some(request.key),
                PoolCall::Start(handle) => {
                    if let Some(key) = pending.take() {
                        keys.insert(*handle, key);
                        events.push(("start", key));
                    }
                }
                PoolCall::Release(handle, _) => {
                    events.push(("release", keys.get(handle).copied().unwrap_or(0)));
                }
                PoolCall::Retrigger(handle, retrigger) => {
                    keys.insert(*handle, retrigger.key);
                    events.push(("retrigger", retrigger.key));
                }
                _ => {}
            }
        }
        events
    }

    fn update(&mut self, handle: VoiceHandle, f: impl FnOnce(&mut VoiceInfo)) {
        if let Some(voice) = self.voices.iter_mut().find(|v| v.handle == handle) {
            f(voice);
        }
    }
}

impl VoicePool for RecordingPool {
    fn allocate(&mut self, request: &VoiceRequest) -> Result<VoiceHandle> {
        let handle = VoiceHandle(self.next_handle);
        self.next_handle += 1;
        self.calls.push(PoolCall::Allocate(*request));
        self.voices.push(VoiceInfo {
            handle,
            id: request.id,
            channel: request.channel,
            key: request.key,
            velocity: request.velocity,
            state: VoiceState::Idle,
        });
        Ok(handle)
    }

    fn start(&mut self, voice: VoiceHandle) {
        self.calls.push(PoolCall::Start(voice));
        self.update(voice, |v| v.state = VoiceState::Playing);
    }

    fn release(&mut self, voice: VoiceHandle, kind: ReleaseKind) {
        self.calls.push(PoolCall::Release(voice, kind));
        self.update(voice, |v| v.state = VoiceState::Releasing);
    }

    fn kill(&mut self, voice: VoiceHandle) {
        self.calls.push(PoolCall::Kill(voice));
        self.voices.retain(|v| v.handle != voice);
    }

    fn retrigger(&mut self, voice: VoiceHandle, retrigger: &Retrigger) {
        self.calls.push(PoolCall::Retrigger(voice, *retrigger));
        self.update(voice, |v| {
            v.key = retrigger.key;
            v.velocity = retrigger.velocity;
            v.state = VoiceState::Playing;
        });
    }

    fn hold(&mut self, voice: VoiceHandle, hold: Hold) {
        self.calls.push(PoolCall::Hold(voice, hold));
        self.update(voice, |v| {
            v.state = match hold {
                Hold::Sustain => VoiceState::Sustained,
                Hold::Sostenuto => VoiceState::HeldBySostenuto,
            }
        });
    }

    fn set_pitch(&mut self, voice: VoiceHandle, cents: f32) {
        self.calls.push(PoolCall::SetPitch(voice, cents));
    }

    fn modulate(&mut self, voice: VoiceHandle, update: ControlUpdate) {
        self.calls.push(PoolCall::Modulate(voice, update));
    }

    fn update_generator(&mut self, voice: VoiceHandle, param: GenParam, value: f32, absolute: bool) {
        self.calls
            .push(PoolCall::UpdateGenerator(voice, param, value, absolute));
    }

    fn for_each_voice(&self, f: &mut dyn FnMut(&VoiceInfo)) {
        for voice in &self.voices {
            f(voice);
        }
    }

    fn render(&mut self, left: &mut [f32], right: &mut [f32]) {
        left.fill(0.25);
        right.fill(-0.25);
    }

    fn active_count(&self) -> usize {
        self.voices.len()
    }

    fn set_sample_rate(&mut self, _sample_rate: f32) {}

    fn set_polyphony(&mut self, _voices: usize) -> Result<()> {
        Ok(())
    }
}

pub struct TestPreset {
    name: String,
    bank: u32,
    program: u8,
}

impl Preset for TestPreset {
    fn name(&self) -> &str {
        &self.name
    }

    fn bank(&self) -> u32 {
        self.bank
    }

    fn program(&self) -> u8 {
        self.program
    }

    /// One zone per preset.
    fn zones(&self, _key: u8, _velocity: u8) -> ZoneList {
        ZoneList::from_slice(&[self.program as u32])
    }
}

/// Font holding the given (bank, program) presets.
pub struct TestFont {
    name: String,
    presets: Vec<Arc<dyn Preset>>,
}

impl TestFont {
    pub fn new(name: &str, presets: &[(u32, u8)]) -> Self {
        Self {
            name: name.to_string(),
            presets: presets
                .iter()
                .map(|&(bank, program)| {
                    Arc::new(TestPreset {
                        name: format!("{name} {bank}:{program}"),
                        bank,
                        program,
                    }) as Arc<dyn Preset>
                })
                .collect(),
        }
    }
}

impl SoundFont for TestFont {
    fn name(&self) -> &str {
        &self.name
    }

    fn preset(&self, bank: u32, program: u8) -> Option<Arc<dyn Preset>> {
        self.presets
            .iter()
            .find(|p| p.bank() == bank && p.program() == program)
            .cloned()
    }
}

/// Route the synth's debug logs to the test output.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing_subscriber::filter::LevelFilter::DEBUG)
        .try_init();
}

/// Synth over a recording pool with a small GM-like font loaded.
pub fn test_synth() -> Synth<RecordingPool> {
    init_tracing();
    let synth = Synth::new(SynthConfig::default(), RecordingPool::new())
        .expect("default config is valid");
    synth.add_soundfont(
        Arc::new(TestFont::new("test", &[(0, 0), (0, 1), (128, 0)])),
        true,
    );
    synth
}
