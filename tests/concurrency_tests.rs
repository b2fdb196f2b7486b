//! Control and render threads sharing one synth.

mod helpers;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use cantus::cc;
use cantus::GenParam;
use helpers::{test_synth, PoolCall};

#[test]
fn test_generator_override_reads_are_consistent() {
    let synth = Arc::new(test_synth());
    let done = Arc::new(AtomicBool::new(false));

    let writers: Vec<_> = [(1.0f32, true), (2.0f32, false)]
        .into_iter()
        .map(|(value, absolute)| {
            let synth = Arc::clone(&synth);
            thread::spawn(move || {
                for _ in 0..2000 {
                    synth
                        .set_gen(0, GenParam::Pan, value, absolute, false)
                        .unwrap();
                }
            })
        })
        .collect();

    let reader = {
        let synth = Arc::clone(&synth);
        let done = Arc::clone(&done);
        thread::spawn(move || {
            while !done.load(Ordering::Relaxed) {
                let pair = synth.gen_override(0, GenParam::Pan).unwrap();
                assert!(
                    pair == (0.0, false) || pair == (1.0, true) || pair == (2.0, false),
                    "torn read {pair:?}"
                );
            }
        })
    };

    for writer in writers {
        writer.join().unwrap();
    }
    done.store(true, Ordering::Relaxed);
    reader.join().unwrap();
}

#[test]
fn test_render_while_playing() {
    let synth = Arc::new(test_synth());
    let done = Arc::new(AtomicBool::new(false));

    let render = {
        let synth = Arc::clone(&synth);
        let done = Arc::clone(&done);
        thread::spawn(move || {
            let mut left = vec![0.0f32; 256];
            let mut right = vec![0.0f32; 256];
            while !done.load(Ordering::Relaxed) {
                assert_eq!(synth.write_f32(256, &mut left, 0, 1, &mut right, 0, 1), 256);
            }
        })
    };

    for round in 0..200u32 {
        let channel = (round % 16) as usize;
        let key = 36 + (round % 48) as u8;
        synth.noteon(channel, key, 100).unwrap();
        synth.cc(channel, cc::MODULATION_MSB, (round % 128) as u8).unwrap();
        synth.noteoff(channel, key).unwrap();
    }
    done.store(true, Ordering::Relaxed);
    render.join().unwrap();
    assert_eq!(synth.active_voice_count(), 200);
}

#[test]
fn test_render_is_silent_while_pool_is_held() {
    let synth = test_synth();
    let mut left = vec![1.0f32; 128];
    let mut right = vec![1.0f32; 128];
    {
        let _held = synth.pool();
        assert_eq!(synth.write_f32(128, &mut left, 0, 1, &mut right, 0, 1), 128);
    }
    assert!(left.iter().chain(&right).all(|&s| s == 0.0));

    synth.write_f32(128, &mut left, 0, 1, &mut right, 0, 1);
    assert!(left.iter().all(|&s| s > 0.0));
}

#[test]
fn test_sounding_voices_end_with_cached_generator() {
    let synth = Arc::new(test_synth());
    synth.noteon(0, 60, 100).unwrap();

    let writers: Vec<_> = (0..2)
        .map(|writer| {
            let synth = Arc::clone(&synth);
            thread::spawn(move || {
                for round in 0..500 {
                    let value = (writer * 1000 + round) as f32;
                    synth
                        .set_gen(0, GenParam::FilterFc, value, writer == 0, false)
                        .unwrap();
                }
            })
        })
        .collect();
    for writer in writers {
        writer.join().unwrap();
    }

    let cached = synth.gen_override(0, GenParam::FilterFc).unwrap();
    let pool = synth.pool();
    let last = pool.calls.iter().rev().find_map(|call| match call {
        PoolCall::UpdateGenerator(_, GenParam::FilterFc, value, absolute) => {
            Some((*value, *absolute))
        }
        _ => None,
    });
    assert_eq!(last, Some(cached));
}

#[test]
fn test_bound_channels_follow_concurrent_tuning_updates() {
    let synth = Arc::new(test_synth());
    synth.create_octave_tuning(0, 5, "moving", &[0.0; 12]).unwrap();
    for channel in 0..4 {
        synth.select_tuning(channel, 0, 5).unwrap();
    }
    synth.noteon(0, 60, 100).unwrap();

    let binder = {
        let synth = Arc::clone(&synth);
        thread::spawn(move || {
            for round in 0..500 {
                synth.select_tuning(round % 4, 0, 5).unwrap();
            }
        })
    };
    let tuners: Vec<_> = (0..2)
        .map(|tuner| {
            let synth = Arc::clone(&synth);
            thread::spawn(move || {
                for round in 0..500 {
                    let cents = 6000.0 + (tuner * 1000 + round) as f32;
                    synth.tune_notes(0, 5, &[60], &[cents], true).unwrap();
                }
            })
        })
        .collect();
    binder.join().unwrap();
    for tuner in tuners {
        tuner.join().unwrap();
    }

    let (_, table) = synth.tuning_dump(0, 5).unwrap();
    for channel in 0..4 {
        let bound = synth.channel_tuning(channel).unwrap().unwrap();
        assert_eq!(bound.pitch(60), table[60], "channel {channel}");
    }
    let pool = synth.pool();
    let last_pitch = pool.calls.iter().rev().find_map(|call| match call {
        PoolCall::SetPitch(_, cents) => Some(*cents),
        _ => None,
    });
    assert_eq!(last_pitch, Some(table[60]));
}
