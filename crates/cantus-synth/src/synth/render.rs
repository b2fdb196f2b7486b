//! Render entry points.
//!
//! Audio is pulled from the voice pool in blocks of [`BLOCK_SIZE`] frames
//! into a preallocated scratch buffer, scaled by the master gain and copied
//! to the caller's layout. Destinations that are too short limit the frame
//! count; nothing here allocates, fails or waits on the voice pool.

use core::sync::atomic::Ordering;

use crate::voice::VoicePool;

use super::Synth;

/// Frames rendered per voice pool call.
pub const BLOCK_SIZE: usize = 64;

pub(crate) struct RenderScratch {
    left: [f32; BLOCK_SIZE],
    right: [f32; BLOCK_SIZE],
}

impl RenderScratch {
    pub(crate) fn new() -> Self {
        Self {
            left: [0.0; BLOCK_SIZE],
            right: [0.0; BLOCK_SIZE],
        }
    }
}

/// Frames that fit in `len` samples starting at `offset`, stepping `incr`.
#[inline]
fn strided_capacity(len: usize, offset: usize, incr: usize) -> usize {
    if incr == 0 || offset >= len {
        0
    } else {
        (len - offset - 1) / incr + 1
    }
}

impl<P: VoicePool> Synth<P> {
    /// Render `frames` frames, handing each scaled block to `write` with
    /// its starting frame.
    fn render_blocks(&self, frames: usize, mut write: impl FnMut(usize, &[f32], &[f32])) {
        let gain = self.gain.load(Ordering::Relaxed);
        let mut scratch = self.scratch.lock();
        let scratch = &mut *scratch;
        let mut done = 0;
        while done < frames {
            let n = (frames - done).min(BLOCK_SIZE);
            let (left, right) = (&mut scratch.left[..n], &mut scratch.right[..n]);
            left.fill(0.0);
            right.fill(0.0);
            // A block the control path holds the pool for stays silent.
            if let Some(mut pool) = self.pool.try_lock() {
                pool.render(left, right);
            }
            for (l, r) in left.iter_mut().zip(right.iter_mut()) {
                *l *= gain;
                *r *= gain;
            }
            write(done, left, right);
            done += n;
        }
    }

    /// Render into strided float buffers. Returns the frames written.
    #[allow(clippy::too_many_arguments)]
    pub fn write_f32(
        &self,
        len: usize,
        left: &mut [f32],
        loff: usize,
        lincr: usize,
        right: &mut [f32],
        roff: usize,
        rincr: usize,
    ) -> usize {
        let frames = len
            .min(strided_capacity(left.len(), loff, lincr))
            .min(strided_capacity(right.len(), roff, rincr));
        self.render_blocks(frames, |start, l, r| {
            for (i, (&l, &r)) in l.iter().zip(r).enumerate() {
                left[loff + (start + i) * lincr] = l;
                right[roff + (start + i) * rincr] = r;
            }
        });
        frames
    }

    /// Render into strided 16-bit buffers. Returns the frames written.
    #[allow(clippy::too_many_arguments)]
    pub fn write_s16(
        &self,
        len: usize,
        left: &mut [i16],
        loff: usize,
        lincr: usize,
        right: &mut [i16],
        roff: usize,
        rincr: usize,
    ) -> usize {
        let frames = len
            .min(strided_capacity(left.len(), loff, lincr))
            .min(strided_capacity(right.len(), roff, rincr));
        self.render_blocks(frames, |start, l, r| {
            for (i, (&l, &r)) in l.iter().zip(r).enumerate() {
                left[loff + (start + i) * lincr] = to_s16(l);
                right[roff + (start + i) * rincr] = to_s16(r);
            }
        });
        frames
    }

    /// Render non-interleaved per-group buffers.
    ///
    /// The mix goes to group 0; other groups and the effects buffers are
    /// silenced. Returns the frames written.
    pub fn nwrite_f32(
        &self,
        len: usize,
        left: &mut [&mut [f32]],
        right: &mut [&mut [f32]],
        fx_left: &mut [&mut [f32]],
        fx_right: &mut [&mut [f32]],
    ) -> usize {
        let frames = match (left.first(), right.first()) {
            (Some(l), Some(r)) => len.min(l.len()).min(r.len()),
            _ => return 0,
        };
        self.render_blocks(frames, |start, l, r| {
            left[0][start..start + l.len()].copy_from_slice(l);
            right[0][start..start + r.len()].copy_from_slice(r);
        });
        silence(&mut left[1..], frames);
        silence(&mut right[1..], frames);
        silence(fx_left, frames);
        silence(fx_right, frames);
        frames
    }

    /// Render into stereo pairs `out = [L0, R0, L1, R1, ...]`.
    ///
    /// The mix goes to the first pair; remaining outputs and `fx` are
    /// silenced. Returns the frames written.
    pub fn process(&self, len: usize, fx: &mut [&mut [f32]], out: &mut [&mut [f32]]) -> usize {
        let frames = match &*out {
            [l, r, ..] => len.min(l.len()).min(r.len()),
            _ => return 0,
        };
        self.render_blocks(frames, |start, l, r| {
            out[0][start..start + l.len()].copy_from_slice(l);
            out[1][start..start + r.len()].copy_from_slice(r);
        });
        silence(&mut out[2..], frames);
        silence(fx, frames);
        frames
    }
}

#[inline]
fn to_s16(sample: f32) -> i16 {
    (sample * 32767.0).round().clamp(-32768.0, 32767.0) as i16
}

fn silence(buffers: &mut [&mut [f32]], frames: usize) {
    for buffer in buffers.iter_mut() {
        let n = frames.min(buffer.len());
        buffer[..n].fill(0.0);
    }
}
