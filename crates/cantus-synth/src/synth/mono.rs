//! Monophonic and legato play.
//!
//! The channel's note list decides what sounds. A note-on while another
//! listed note is held is a legato transition and follows the channel's
//! [`LegatoMode`](crate::LegatoMode); otherwise it is staccato and starts
//! fresh voices.

use parking_lot::MutexGuard;
use tracing::debug;

use crate::channel::ChannelState;
use crate::legato::LegatoAction;
use crate::portamento::glide_source;
use crate::voice::{ReleaseKind, Retrigger, VoicePool, VoiceState};
use crate::Result;

use super::dispatch::release_same_key;
use super::{select, start_requests, NoteStart, Synth};

/// Voice work decided under the channel lock.
enum MonoPlan {
    /// Fresh note. `release` is a pedal-held key to let go first.
    Staccato {
        release: Option<u8>,
        start: NoteStart,
    },
    /// Hand over from `from` according to `action`.
    Legato {
        from: u8,
        action: LegatoAction,
        start: NoteStart,
    },
}

impl MonoPlan {
    fn start(&self) -> &NoteStart {
        match self {
            MonoPlan::Staccato { start, .. } | MonoPlan::Legato { start, .. } => start,
        }
    }
}

impl<P: VoicePool> Synth<P> {
    pub(super) fn mono_noteon(
        &self,
        mut state: MutexGuard<'_, ChannelState>,
        channel: usize,
        key: u8,
        velocity: u8,
    ) -> Result<()> {
        let pushed = state.mono.push(key, velocity);
        if let Some(evicted) = pushed.evicted {
            debug!("Mono list full on channel {channel}, dropped note {evicted}");
        }
        if state.breath_gated() {
            debug!("Note {key} on channel {channel} waits for breath");
            return Ok(());
        }

        let legato = pushed.previous.is_some();
        state.legato_playing = legato;
        let control = state.portamento_control.take();
        let id = self.next_note_id();

        let plan = match pushed.previous {
            Some(from) => {
                let source = glide_source(state.portamento_mode, true, control, Some(from));
                let glide = state.glide(source);
                NoteStart::resolve(&state, channel, key, velocity, id, glide).map(|start| {
                    MonoPlan::Legato {
                        from,
                        action: state.legato_mode.action(),
                        start,
                    }
                })
            }
            None => {
                let sustained = state.key_sustained.take();
                let source = glide_source(state.portamento_mode, false, control, sustained);
                let glide = state.glide(source);
                NoteStart::resolve(&state, channel, key, velocity, id, glide).map(|start| {
                    MonoPlan::Staccato {
                        release: sustained.filter(|&held| held != key),
                        start,
                    }
                })
            }
        };
        drop(state);

        match plan {
            Some(plan) => self.run_mono_plan(channel, plan),
            None => debug!("Preset on channel {channel} went away"),
        }
        Ok(())
    }

    pub(super) fn mono_noteoff(
        &self,
        mut state: MutexGuard<'_, ChannelState>,
        channel: usize,
        key: u8,
    ) {
        let Some(removed) = state.mono.remove(key) else {
            // Key pressed before mono play began.
            let pedals = state.pedals();
            drop(state);
            self.release_key(channel, key, pedals);
            return;
        };
        if !removed.was_last {
            return;
        }

        match removed.new_last {
            Some(next) if !state.breath_gated() => {
                // Fall back to the most recent note still held.
                state.mono.set_previous_note(Some(key));
                state.legato_playing = true;
                let control = state.portamento_control.take();
                let source = glide_source(state.portamento_mode, true, control, Some(key));
                let glide = state.glide(source);
                let id = self.next_note_id();
                let action = state.legato_mode.action();
                let start =
                    NoteStart::resolve(&state, channel, next.note, next.velocity, id, glide);
                drop(state);
                match start {
                    Some(start) => self.run_mono_plan(
                        channel,
                        MonoPlan::Legato {
                            from: key,
                            action,
                            start,
                        },
                    ),
                    None => {
                        let mut pool = self.pool.lock();
                        release_same_key(&mut *pool, channel, key);
                    }
                }
            }
            Some(_) => {}
            None => {
                state.legato_playing = false;
                let pedals = state.pedals();
                drop(state);
                if self.release_key(channel, key, pedals) {
                    self.channels[channel].lock().key_sustained = Some(key);
                }
            }
        }
    }

    /// Breath controller change on a channel already locked and updated.
    pub(super) fn breath_change(
        &self,
        mut state: MutexGuard<'_, ChannelState>,
        channel: usize,
        value: u8,
    ) {
        let previous = state.previous_breath;
        state.previous_breath = value;
        if !(state.breath.sync && state.is_playing_mono()) {
            return;
        }
        let Some(last) = state.mono.last() else {
            return;
        };

        if previous == 0 && value > 0 {
            let id = self.next_note_id();
            let start = NoteStart::resolve(&state, channel, last.note, last.velocity, id, None);
            drop(state);
            if let Some(start) = start {
                let requests = start.requests();
                let dropped = {
                    let mut pool = self.pool.lock();
                    release_same_key(&mut *pool, channel, last.note);
                    start_requests(&mut *pool, &requests)
                };
                start.report_dropped(dropped);
            }
        } else if previous > 0 && value == 0 {
            let pedals = state.pedals();
            drop(state);
            self.release_key(channel, last.note, pedals);
        }
    }

    fn run_mono_plan(&self, channel: usize, plan: MonoPlan) {
        let requests = plan.start().requests();
        let mut pool = self.pool.lock();
        let dropped = match &plan {
            MonoPlan::Staccato { release, start } => {
                if let Some(held) = *release {
                    release_same_key(&mut *pool, channel, held);
                }
                release_same_key(&mut *pool, channel, start.key);
                start_requests(&mut *pool, &requests)
            }
            MonoPlan::Legato {
                from,
                action: LegatoAction::Restart(kind),
                start,
            } => {
                release_from(&mut *pool, channel, *from, *kind);
                release_same_key(&mut *pool, channel, start.key);
                start_requests(&mut *pool, &requests)
            }
            MonoPlan::Legato {
                from,
                action: LegatoAction::Retrigger(kind),
                start,
            } => {
                let voices = select(&*pool, |v| {
                    v.channel == channel && v.key == *from && v.state == VoiceState::Playing
                });
                if voices.is_empty() {
                    release_same_key(&mut *pool, channel, start.key);
                    start_requests(&mut *pool, &requests)
                } else {
                    let retrigger = Retrigger {
                        key: start.key,
                        velocity: start.velocity,
                        kind: *kind,
                        pitch_cents: start.pitch_cents,
                        glide: start.glide,
                    };
                    for voice in voices {
                        pool.retrigger(voice.handle, &retrigger);
                    }
                    0
                }
            }
        };
        drop(pool);
        plan.start().report_dropped(dropped);
    }
}

/// Release the voices of the note being left, ignoring pedals.
fn release_from<P: VoicePool + ?Sized>(pool: &mut P, channel: usize, key: u8, kind: ReleaseKind) {
    for voice in select(&*pool, |v| v.channel == channel && v.key == key && v.state.is_on()) {
        pool.release(voice.handle, kind);
    }
}

