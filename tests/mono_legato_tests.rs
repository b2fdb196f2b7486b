//! Monophonic play, legato and portamento against a recording voice pool.

mod helpers;

use cantus::cc;
use cantus::synth::{ReleaseKind, RetriggerKind, VoiceState, MONO_LIST_CAPACITY};
use cantus::{BasicChannelInfo, ChannelMode, LegatoMode, PortamentoMode, Synth};
use helpers::{test_synth, PoolCall, RecordingPool};

/// Channel 0 as a one-channel Omni Off / Mono zone.
fn mono_synth(legato: LegatoMode, portamento: PortamentoMode) -> Synth<RecordingPool> {
    let synth = test_synth();
    synth.reset_basic_channel(Some(0)).unwrap();
    synth
        .set_basic_channel(BasicChannelInfo::new(0, ChannelMode::OmniOffMono, 1))
        .unwrap();
    synth.set_legato_mode(0, legato).unwrap();
    synth.set_portamento_mode(0, portamento).unwrap();
    synth.pool().calls.clear();
    synth
}

#[test]
fn test_retrigger_normal_sequence() {
    for (mode, glides) in [
        (PortamentoMode::EachNote, true),
        (PortamentoMode::LegatoOnly, true),
        (PortamentoMode::StaccatoOnly, false),
    ] {
        let synth = mono_synth(LegatoMode::RetriggerNormal, mode);
        synth.noteon(0, 60, 100).unwrap();
        synth.noteon(0, 64, 100).unwrap();
        synth.noteoff(0, 60).unwrap();
        synth.noteoff(0, 64).unwrap();

        let pool = synth.pool();
        assert_eq!(
            pool.key_events(),
            vec![("start", 60), ("release", 60), ("start", 64), ("release", 64)],
            "{mode:?}"
        );
        let started = pool.started();
        assert_eq!(started[0].glide, None);
        match started[1].glide {
            Some(glide) => {
                assert!(glides, "{mode:?} should not glide");
                assert_eq!(glide.from_key, 60);
            }
            None => assert!(!glides, "{mode:?} should glide"),
        }
    }
}

#[test]
fn test_retrigger_fast_uses_fast_release() {
    let synth = mono_synth(LegatoMode::RetriggerFast, PortamentoMode::LegatoOnly);
    synth.noteon(0, 60, 100).unwrap();
    synth.noteon(0, 62, 100).unwrap();
    let pool = synth.pool();
    assert!(pool
        .calls
        .iter()
        .any(|call| matches!(call, PoolCall::Release(_, ReleaseKind::Fast))));
}

#[test]
fn test_single_trigger_retriggers_pitch_only() {
    let synth = mono_synth(LegatoMode::SingleTriggerNoAdsr, PortamentoMode::LegatoOnly);
    synth.noteon(0, 60, 100).unwrap();
    synth.noteon(0, 67, 80).unwrap();

    let pool = synth.pool();
    assert_eq!(pool.started().len(), 1);
    let retrigger = pool
        .calls
        .iter()
        .find_map(|call| match call {
            PoolCall::Retrigger(_, r) => Some(*r),
            _ => None,
        })
        .unwrap();
    assert_eq!(retrigger.kind, RetriggerKind::PitchOnly);
    assert_eq!(retrigger.key, 67);
    assert_eq!(retrigger.velocity, 80);
    assert_eq!(retrigger.glide.map(|g| g.from_key), Some(60));
}

#[test]
fn test_release_returns_to_held_note() {
    let synth = mono_synth(LegatoMode::MultiRetrigger, PortamentoMode::LegatoOnly);
    synth.noteon(0, 60, 100).unwrap();
    synth.noteon(0, 64, 100).unwrap();
    synth.noteoff(0, 64).unwrap();

    assert_eq!(synth.previous_note(0).unwrap(), Some(64));
    let pool = synth.pool();
    assert_eq!(
        pool.key_events(),
        vec![("start", 60), ("retrigger", 64), ("retrigger", 60)]
    );
    let voices: Vec<_> = synth_voices(&pool);
    assert_eq!(voices, vec![(60, VoiceState::Playing)]);
}

fn synth_voices(pool: &RecordingPool) -> Vec<(u8, VoiceState)> {
    let mut voices = Vec::new();
    cantus::VoicePool::for_each_voice(pool, &mut |v| voices.push((v.key, v.state)));
    voices
}

#[test]
fn test_mono_list_evicts_oldest() {
    let synth = mono_synth(LegatoMode::MultiRetrigger, PortamentoMode::LegatoOnly);
    for key in 60..60 + MONO_LIST_CAPACITY as u8 + 1 {
        synth.noteon(0, key, 100).unwrap();
    }
    let notes: Vec<u8> = synth.mono_notes(0).unwrap().iter().map(|n| n.note).collect();
    assert_eq!(notes.len(), MONO_LIST_CAPACITY);
    assert_eq!(notes[0], 61);
    assert_eq!(*notes.last().unwrap(), 60 + MONO_LIST_CAPACITY as u8);
}

#[test]
fn test_staccato_after_sustain_releases_held_key() {
    let synth = mono_synth(LegatoMode::RetriggerNormal, PortamentoMode::StaccatoOnly);
    synth.cc(0, cc::SUSTAIN_SWITCH, 127).unwrap();
    synth.noteon(0, 60, 100).unwrap();
    synth.noteoff(0, 60).unwrap();
    assert_eq!(synth.key_sustained(0).unwrap(), Some(60));

    synth.noteon(0, 62, 100).unwrap();
    assert_eq!(synth.key_sustained(0).unwrap(), None);
    let pool = synth.pool();
    assert_eq!(
        pool.key_events(),
        vec![("start", 60), ("release", 60), ("start", 62)]
    );
    assert_eq!(pool.started()[1].glide.map(|g| g.from_key), Some(60));
}

#[test]
fn test_portamento_control_overrides_source() {
    let synth = mono_synth(LegatoMode::RetriggerNormal, PortamentoMode::LegatoOnly);
    synth.cc(0, cc::PORTAMENTO_CTRL, 48).unwrap();
    synth.noteon(0, 60, 100).unwrap();
    synth.noteoff(0, 60).unwrap();
    synth.noteon(0, 62, 100).unwrap();

    let started = synth.pool().started();
    assert_eq!(started[0].glide.map(|g| g.from_key), Some(48));
    assert_eq!(started[1].glide, None);
}

#[test]
fn test_glide_starts_from_tuned_pitch() {
    let synth = mono_synth(LegatoMode::RetriggerNormal, PortamentoMode::EachNote);
    let mut deviations = [0.0f32; 12];
    deviations[0] = -30.0;
    deviations[4] = 14.0;
    synth.create_octave_tuning(0, 3, "skewed", &deviations).unwrap();
    synth.select_tuning(0, 0, 3).unwrap();

    synth.noteon(0, 60, 100).unwrap();
    synth.noteon(0, 64, 100).unwrap();

    let started = synth.pool().started();
    let glide = started[1].glide.unwrap();
    assert_eq!(glide.from_key, 60);
    assert_eq!(glide.from_cents, 5970.0);
    assert_eq!(started[1].pitch_cents, 6414.0);
}

#[test]
fn test_portamento_time_from_controllers() {
    let synth = mono_synth(LegatoMode::RetriggerNormal, PortamentoMode::LegatoOnly);
    synth.cc(0, cc::PORTAMENTO_TIME_MSB, 1).unwrap();
    synth.cc(0, cc::PORTAMENTO_TIME_LSB, 4).unwrap();
    synth.noteon(0, 60, 100).unwrap();
    synth.noteon(0, 62, 100).unwrap();
    let glide = synth.pool().started()[1].glide.unwrap();
    assert_eq!(glide.time_ms, 132);
}

#[test]
fn test_legato_switch_makes_poly_channel_mono() {
    let synth = test_synth();
    synth.set_legato_mode(1, LegatoMode::RetriggerNormal).unwrap();
    synth.cc(1, cc::LEGATO_SWITCH, 127).unwrap();
    synth.noteon(1, 60, 100).unwrap();
    synth.noteon(1, 62, 100).unwrap();
    assert!(synth.legato_playing(1).unwrap());

    synth.cc(1, cc::LEGATO_SWITCH, 0).unwrap();
    let notes: Vec<u8> = synth.mono_notes(1).unwrap().iter().map(|n| n.note).collect();
    assert_eq!(notes, vec![62]);
}

mod properties {
    use super::*;
    use proptest::prelude::*;

    fn playing(pool: &RecordingPool) -> Vec<u8> {
        let mut keys = Vec::new();
        cantus::VoicePool::for_each_voice(pool, &mut |v| {
            if v.channel == 0 && v.state == VoiceState::Playing {
                keys.push(v.key);
            }
        });
        keys
    }

    proptest! {
        #[test]
        fn test_one_voice_follows_last_held_note(
            events in prop::collection::vec((any::<bool>(), 60u8..72), 1..60)
        ) {
            let synth = mono_synth(LegatoMode::MultiRetrigger, PortamentoMode::LegatoOnly);
            for (on, key) in events {
                if on {
                    synth.noteon(0, key, 100).unwrap();
                } else {
                    synth.noteoff(0, key).unwrap();
                }

                let notes = synth.mono_notes(0).unwrap();
                prop_assert!(notes.len() <= MONO_LIST_CAPACITY);
                let sounding = playing(&synth.pool());
                match notes.last() {
                    Some(last) => prop_assert_eq!(sounding, vec![last.note]),
                    None => prop_assert!(sounding.is_empty()),
                }
            }
        }
    }
}
