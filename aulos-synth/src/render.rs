// Aulos
// Copyright (c) 2026 The Project Aulos Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `render` module implements the per-block render kernel.
//!
//! The kernel is monomorphised over the interpolator so each of the four
//! `{linear, cubic} × {mono, stereo}` variants is a branch-free inner loop; the interpolator
//! and channel shape are never tested inside the per-sample step. The kernel performs no
//! checks and never fails: every bound it relies on was validated at voice setup.

use crate::voice::{Voice, VoiceSlot};

/// A per-block control input: a scalar held for the whole block, or one value per output
/// frame.
#[derive(Clone, Copy)]
pub enum Control<'a> {
    Scalar(f32),
    Frames(&'a [f32]),
}

/// A sample interpolator, evaluated at a fractional frame position of a sample table.
///
/// Implementations may read one frame past the integer position (linear) or from one frame
/// before to two frames past it (cubic); voice setup guarantees those frames are addressable
/// for every reachable phase.
pub trait Interpolate {
    fn at(tab: &[i16], phase: f64) -> f32;
}

/// Two-point linear interpolation.
pub struct Linear;

impl Interpolate for Linear {
    #[inline(always)]
    fn at(tab: &[i16], phase: f64) -> f32 {
        let i = phase as usize;
        let frac = (phase - i as f64) as f32;

        let s0 = f32::from(tab[i]);
        let s1 = f32::from(tab[i + 1]);

        s0 + (s1 - s0) * frac
    }
}

/// Four-point cubic interpolation with the index origin shifted one frame back, so the curve
/// is fitted over the frames at `⌊phase⌋ − 1 .. ⌊phase⌋ + 2`.
pub struct Cubic;

impl Interpolate for Cubic {
    #[inline(always)]
    fn at(tab: &[i16], phase: f64) -> f32 {
        let phase1 = phase - 1.0;
        // Truncation toward zero keeps the origin at frame zero for the first frame of the
        // sample; the fraction then runs negative and the curve extrapolates from the first
        // four frames.
        let x0 = (phase1 as isize).max(0) as usize;
        let frac = (phase1 - x0 as f64) as f32;

        let ym1 = f32::from(tab[x0]);
        let y0 = f32::from(tab[x0 + 1]);
        let y1 = f32::from(tab[x0 + 2]);
        let y2 = f32::from(tab[x0 + 3]);

        let frsq = frac * frac;
        let frcu = frsq * ym1;
        let t1 = y2 + 3.0 * y0;

        y0 + 0.5 * frcu
            + frac * (y1 - frcu / 6.0 - t1 / 6.0 - ym1 / 3.0)
            + frsq * frac * (t1 / 6.0 - 0.5 * y1)
            + frsq * (0.5 * y1 - y0)
    }
}

/// Advances a looping slot's phase. Wrap-around engages only after the phase has reached the
/// loop start once, so the attack region before the loop plays through unwrapped.
#[inline(always)]
fn advance_looped(slot: &mut VoiceSlot, si: f64, loop_len: f64) {
    slot.phase += si;

    if slot.phase >= slot.start_loop {
        slot.in_loop = true;
    }

    if slot.in_loop {
        while slot.phase >= slot.end_loop {
            slot.phase -= loop_len;
        }
        while slot.phase < slot.start_loop {
            slot.phase += loop_len;
        }
    }
}

fn mix_slot_stereo<I: Interpolate>(
    slot: &mut VoiceSlot,
    pool: &[i16],
    left: &mut [f32],
    right: &mut [f32],
    freq: &Control<'_>,
) {
    let tab = &pool[slot.base..];
    let frames = left.len();

    if slot.looping {
        let loop_len = slot.end_loop - slot.start_loop;

        // A zero-length loop yields silence.
        if loop_len <= 0.0 {
            return;
        }

        match *freq {
            Control::Scalar(f) => {
                let si = slot.si * f64::from(f);
                for n in 0..frames {
                    let value = I::at(tab, slot.phase);
                    left[n] += slot.left_level * value;
                    right[n] += slot.right_level * value;
                    advance_looped(slot, si, loop_len);
                }
            }
            Control::Frames(freqs) => {
                for n in 0..frames {
                    let si = slot.si * f64::from(freqs[n]);
                    let value = I::at(tab, slot.phase);
                    left[n] += slot.left_level * value;
                    right[n] += slot.right_level * value;
                    advance_looped(slot, si, loop_len);
                }
            }
        }
    }
    else {
        match *freq {
            Control::Scalar(f) => {
                let si = slot.si * f64::from(f);
                for n in 0..frames {
                    if slot.phase >= slot.end {
                        break;
                    }
                    let value = I::at(tab, slot.phase);
                    left[n] += slot.left_level * value;
                    right[n] += slot.right_level * value;
                    slot.phase += si;
                }
            }
            Control::Frames(freqs) => {
                for n in 0..frames {
                    if slot.phase >= slot.end {
                        break;
                    }
                    let value = I::at(tab, slot.phase);
                    left[n] += slot.left_level * value;
                    right[n] += slot.right_level * value;
                    slot.phase += slot.si * f64::from(freqs[n]);
                }
            }
        }
    }
}

fn mix_slot_mono<I: Interpolate>(
    slot: &mut VoiceSlot,
    pool: &[i16],
    out: &mut [f32],
    freq: &Control<'_>,
) {
    let tab = &pool[slot.base..];
    let frames = out.len();

    if slot.looping {
        let loop_len = slot.end_loop - slot.start_loop;

        if loop_len <= 0.0 {
            return;
        }

        match *freq {
            Control::Scalar(f) => {
                let si = slot.si * f64::from(f);
                for n in 0..frames {
                    let value = I::at(tab, slot.phase);
                    out[n] += slot.attenuation * value;
                    advance_looped(slot, si, loop_len);
                }
            }
            Control::Frames(freqs) => {
                for n in 0..frames {
                    let si = slot.si * f64::from(freqs[n]);
                    let value = I::at(tab, slot.phase);
                    out[n] += slot.attenuation * value;
                    advance_looped(slot, si, loop_len);
                }
            }
        }
    }
    else {
        match *freq {
            Control::Scalar(f) => {
                let si = slot.si * f64::from(f);
                for n in 0..frames {
                    if slot.phase >= slot.end {
                        break;
                    }
                    let value = I::at(tab, slot.phase);
                    out[n] += slot.attenuation * value;
                    slot.phase += si;
                }
            }
            Control::Frames(freqs) => {
                for n in 0..frames {
                    if slot.phase >= slot.end {
                        break;
                    }
                    let value = I::at(tab, slot.phase);
                    out[n] += slot.attenuation * value;
                    slot.phase += slot.si * f64::from(freqs[n]);
                }
            }
        }
    }
}

fn apply_amp(out: &mut [f32], amp: &Control<'_>) {
    match *amp {
        Control::Scalar(a) => {
            for value in out.iter_mut() {
                *value *= a;
            }
        }
        Control::Frames(amps) => {
            for (value, a) in out.iter_mut().zip(amps) {
                *value *= a;
            }
        }
    }
}

impl Voice {
    /// Renders one block into a pair of stereo buffers (the perf half of `sfplay` and
    /// `sfinstr`; with `Cubic`, of their `3` variants).
    ///
    /// The buffers are zeroed, every slot's contribution is summed in slot order, and the
    /// amplitude control scales the result. The block length is the shorter buffer's length;
    /// per-frame controls must cover it.
    pub fn render_stereo<I: Interpolate>(
        &mut self,
        left: &mut [f32],
        right: &mut [f32],
        freq: Control<'_>,
        amp: Control<'_>,
    ) {
        let frames = left.len().min(right.len());
        let (left, right) = (&mut left[..frames], &mut right[..frames]);

        left.fill(0.0);
        right.fill(0.0);

        let pool = &self.font.sample_data;
        for slot in self.slots.iter_mut() {
            mix_slot_stereo::<I>(slot, pool, left, right, &freq);
        }

        apply_amp(left, &amp);
        apply_amp(right, &amp);
    }

    /// Renders one block into a mono buffer with pan ignored (the perf half of `sfplaym` and
    /// `sfinstrm`; with `Cubic`, of their `3m` variants).
    pub fn render_mono<I: Interpolate>(
        &mut self,
        out: &mut [f32],
        freq: Control<'_>,
        amp: Control<'_>,
    ) {
        out.fill(0.0);

        let pool = &self.font.sample_data;
        for slot in self.slots.iter_mut() {
            mix_slot_mono::<I>(slot, pool, out, &freq);
        }

        apply_amp(out, &amp);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_interpolators_agree_at_integer_phase() {
        let tab: Vec<i16> = vec![0, 100, -200, 300, -400, 500, 0, 0, 0];

        for i in 1..5 {
            let phase = i as f64;
            let linear = Linear::at(&tab, phase);
            let cubic = Cubic::at(&tab, phase);

            assert_eq!(linear, f32::from(tab[i]));
            assert!((cubic - linear).abs() < 1e-3, "phase {}: {} vs {}", phase, cubic, linear);
        }
    }

    #[test]
    fn verify_cubic_start_of_table() {
        let tab: Vec<i16> = vec![1000, 0, 0, 0, 0];

        // At phase zero the shifted origin clamps to the first frame and the extrapolated
        // curve still passes through it.
        assert!((Cubic::at(&tab, 0.0) - 1000.0).abs() < 1e-3);
    }

    #[test]
    fn verify_linear_midpoint() {
        let tab: Vec<i16> = vec![0, 100, 0];

        assert_eq!(Linear::at(&tab, 0.5), 50.0);
    }
}
