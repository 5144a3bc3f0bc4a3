// Aulos
// Copyright (c) 2026 The Project Aulos Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `voice` module implements voice setup: selecting the splits that accept a triggered
//! note and computing each one's playback state (sample increment, levels, window and loop
//! positions).

use std::sync::Arc;

use arrayvec::ArrayVec;

use aulos_core::errors::{Error, Result};
use aulos_core::units::{centibel_gain, semitone_ratio, PITCHES};
use aulos_format_sf2::{Layer, SoundFont, Split};

/// The fixed capacity of a voice's split array. A note matching more zones than this is
/// reported as an error rather than silently dropped.
pub const MAX_VOICE_SPLITS: usize = 64;

/// The process-wide headroom multiplier folded into every voice's levels.
const GLOBAL_ATTENUATION: f64 = 0.3;

/// One triggered note.
#[derive(Clone, Copy, Debug)]
pub struct NoteEvent {
    /// MIDI note number, 0 to 127.
    pub note: u8,
    /// MIDI velocity, 0 to 127.
    pub velocity: u8,
    /// When set, the sample increment is normalised against the root frequency a second time
    /// so that a later multiplication by a caller-supplied absolute frequency reaches the
    /// expected pitch. Scale tuning is bypassed.
    pub ignore_scale: bool,
    /// Initial playback position offset in frames.
    pub phase_offset: f64,
}

impl Default for NoteEvent {
    fn default() -> Self {
        NoteEvent { note: 60, velocity: 127, ignore_scale: false, phase_offset: 0.0 }
    }
}

/// Per-split playback state. The phase accumulator and the loop latch are the only fields that
/// mutate while the voice renders.
pub(crate) struct VoiceSlot {
    /// Pool index of the sample's first frame.
    pub base: usize,
    /// Playback position in frames relative to `base`.
    pub phase: f64,
    /// One past the last playable frame, relative to `base`.
    pub end: f64,
    pub start_loop: f64,
    pub end_loop: f64,
    /// Sample increment per output frame at a pitch multiplier of 1.
    pub si: f64,
    pub looping: bool,
    /// Set once the phase first reaches the loop start; wrap-around applies only after that,
    /// so the pre-loop attack region plays through unwrapped.
    pub in_loop: bool,
    pub attenuation: f32,
    pub left_level: f32,
    pub right_level: f32,
}

/// A sounding note: every accepting split's playback state plus a reference to the owning
/// font's data. Rendering mutates only the slots.
pub struct Voice {
    pub(crate) font: Arc<SoundFont>,
    pub(crate) slots: ArrayVec<VoiceSlot, MAX_VOICE_SPLITS>,
}

impl Voice {
    /// The number of splits sounding in this voice.
    pub fn split_count(&self) -> usize {
        self.slots.len()
    }

    /// Returns true once every non-looping slot has played past its end. Looping voices never
    /// finish on their own.
    pub fn is_finished(&self) -> bool {
        self.slots.iter().all(|slot| !slot.looping && slot.phase >= slot.end)
    }
}

/// The stereo spreading law applied at setup time. The preset path uses the constant-power law;
/// the instrument-direct path keeps its historical linear law.
#[derive(Clone, Copy)]
enum PanLaw {
    ConstantPower,
    Linear,
}

fn build_slot(
    font: &SoundFont,
    split: &Split,
    layer: Option<&Layer>,
    event: &NoteEvent,
    output_rate: u32,
    pan_law: PanLaw,
) -> VoiceSlot {
    let sample = &font.samples[split.sample];

    let (layer_coarse, layer_fine, layer_attenuation, layer_pan) = match layer {
        Some(layer) => {
            (layer.coarse_tune, layer.fine_tune, layer.initial_attenuation, layer.pan)
        }
        None => (0, 0, 0, 0),
    };

    // An original key of 128..255 is reserved by the format; fall back to middle C.
    let org_key = match split.root_key {
        Some(root) => usize::from(root),
        None if sample.original_key <= 127 => usize::from(sample.original_key),
        None => 60,
    };
    let org_freq = PITCHES[org_key];

    let tune = f64::from(split.coarse_tune) + f64::from(layer_coarse)
        + (f64::from(split.fine_tune) + f64::from(layer_fine)) / 100.0;

    let rate_ratio = f64::from(sample.sample_rate) / f64::from(output_rate);

    let si = if event.ignore_scale {
        let freq = org_freq * semitone_ratio(tune);
        freq / (org_freq * org_freq) * rate_ratio
    }
    else {
        let key_distance = f64::from(i32::from(event.note) - org_key as i32);
        let freq = org_freq
            * semitone_ratio(tune)
            * semitone_ratio(f64::from(split.scale_tuning) / 100.0 * key_distance);
        freq / org_freq * rate_ratio
    };

    let attenuation = centibel_gain(f64::from(
        i32::from(layer_attenuation) + i32::from(split.initial_attenuation),
    )) * GLOBAL_ATTENUATION;

    let pan = (f64::from(i32::from(split.pan) + i32::from(layer_pan)) / 1000.0 + 0.5)
        .clamp(0.0, 1.0);

    let (left_level, right_level) = match pan_law {
        PanLaw::ConstantPower => {
            ((1.0 - pan).sqrt() * attenuation, pan.sqrt() * attenuation)
        }
        PanLaw::Linear => ((1.0 - pan) * attenuation, pan * attenuation),
    };

    // The playable window, relative to the sample's first frame. The end is pulled in so the
    // cubic interpolator's guard frames stay addressable, and the loop points are pinned
    // inside the window after the address offsets are applied.
    let pool_len = font.sample_data.len() as i64;
    let base = i64::from(sample.start);
    let window_max = (pool_len - base - 3).max(0);

    let end =
        (i64::from(sample.end) + i64::from(split.end_offset) - base).clamp(0, window_max);
    let start_loop = (i64::from(sample.start_loop) + i64::from(split.start_loop_offset) - base)
        .clamp(0, end);
    let end_loop = (i64::from(sample.end_loop) + i64::from(split.end_loop_offset) - base)
        .clamp(start_loop, end);

    // The initial phase is pinned inside the window; the kernel itself never range-checks.
    let phase = (f64::from(split.start_offset) + event.phase_offset).clamp(0.0, end as f64);

    VoiceSlot {
        base: base as usize,
        phase,
        end: end as f64,
        start_loop: start_loop as f64,
        end_loop: end_loop as f64,
        si,
        looping: split.sample_mode.loops(),
        in_loop: false,
        attenuation: attenuation as f32,
        left_level: left_level as f32,
        right_level: right_level as f32,
    }
}

fn accepts(split: &Split, event: &NoteEvent) -> bool {
    split.key_range.contains(event.note) && split.vel_range.contains(event.velocity)
}

/// Builds a voice from a preset: walk the layers, and inside every accepting layer walk the
/// referenced instrument's splits.
pub(crate) fn preset_voice(
    font: Arc<SoundFont>,
    preset: usize,
    event: &NoteEvent,
    output_rate: u32,
) -> Result<Voice> {
    let mut slots: ArrayVec<VoiceSlot, MAX_VOICE_SPLITS> = ArrayVec::new();

    for layer in &font.presets[preset].layers {
        if !(layer.key_range.contains(event.note) && layer.vel_range.contains(event.velocity)) {
            continue;
        }

        for split in &font.instruments[layer.instrument].splits {
            if !accepts(split, event) {
                continue;
            }

            let slot = build_slot(
                &font,
                split,
                Some(layer),
                event,
                output_rate,
                PanLaw::ConstantPower,
            );

            if slots.try_push(slot).is_err() {
                return Err(Error::TooManyZones(MAX_VOICE_SPLITS));
            }
        }
    }

    Ok(Voice { font, slots })
}

/// Builds a voice directly from an instrument, skipping the layer walk. The historical linear
/// pan law of this path is preserved.
pub(crate) fn instrument_voice(
    font: Arc<SoundFont>,
    instrument: usize,
    event: &NoteEvent,
    output_rate: u32,
) -> Result<Voice> {
    let mut slots: ArrayVec<VoiceSlot, MAX_VOICE_SPLITS> = ArrayVec::new();

    for split in &font.instruments[instrument].splits {
        if !accepts(split, event) {
            continue;
        }

        let slot = build_slot(&font, split, None, event, output_rate, PanLaw::Linear);

        if slots.try_push(slot).is_err() {
            return Err(Error::TooManyZones(MAX_VOICE_SPLITS));
        }
    }

    Ok(Voice { font, slots })
}

#[cfg(test)]
mod tests {
    use aulos_core::units::MidiRange;
    use aulos_format_sf2::{Instrument, Layer, Preset, SampleInfo, SampleType, Split};

    use super::*;

    fn test_sample(len: u32, original_key: u8, sample_rate: u32) -> SampleInfo {
        SampleInfo {
            name: "s".to_string(),
            start: 0,
            end: len,
            start_loop: 0,
            end_loop: len,
            sample_rate,
            original_key,
            correction: 0,
            sample_type: SampleType::MONO,
        }
    }

    fn one_split_font(split: Split, layer: Layer) -> Arc<SoundFont> {
        Arc::new(SoundFont {
            samples: vec![test_sample(64, 60, 44100)],
            sample_data: vec![0; 72],
            presets: vec![Preset {
                name: "p".to_string(),
                program: 0,
                bank: 0,
                layers: vec![layer],
            }],
            instruments: vec![Instrument { name: "i".to_string(), splits: vec![split] }],
        })
    }

    #[test]
    fn verify_si_is_unity_at_root_key_and_matched_rates() {
        let font = one_split_font(Split::default(), Layer::default());
        let event = NoteEvent { note: 60, ..Default::default() };

        let voice = preset_voice(font, 0, &event, 44100).unwrap();

        assert_eq!(voice.split_count(), 1);
        assert!((voice.slots[0].si - 1.0).abs() < 1e-12);
    }

    #[test]
    fn verify_si_doubles_one_octave_up() {
        let font = one_split_font(Split::default(), Layer::default());
        let event = NoteEvent { note: 72, ..Default::default() };

        let voice = preset_voice(font, 0, &event, 44100).unwrap();

        assert!((voice.slots[0].si - 2.0).abs() < 1e-9);
    }

    #[test]
    fn verify_coarse_and_fine_tune_fold_together() {
        let split = Split { coarse_tune: 1, fine_tune: 50, ..Default::default() };
        let layer = Layer { coarse_tune: -1, fine_tune: 50, ..Default::default() };
        let font = one_split_font(split, layer);

        let voice = preset_voice(font, 0, &NoteEvent { note: 60, ..Default::default() }, 44100)
            .unwrap();

        // 1 − 1 semitones plus 100 cents is exactly one semitone up.
        let expected = semitone_ratio(1.0);
        assert!((voice.slots[0].si - expected).abs() < 1e-9);
    }

    #[test]
    fn verify_ignore_scale_normalises_against_root_frequency() {
        let font = one_split_font(Split::default(), Layer::default());
        let event = NoteEvent { note: 72, ignore_scale: true, ..Default::default() };

        let voice = preset_voice(font, 0, &event, 44100).unwrap();

        // With the pitch multiplier deferred to the caller, si is 1/orgFreq regardless of the
        // note number.
        let expected = 1.0 / PITCHES[60];
        assert!((voice.slots[0].si - expected).abs() < 1e-12);
    }

    #[test]
    fn verify_key_range_filters_splits() {
        let low = Split { key_range: MidiRange::new(0, 59), ..Default::default() };
        let high = Split { key_range: MidiRange::new(60, 127), ..Default::default() };

        let font = Arc::new(SoundFont {
            samples: vec![test_sample(64, 60, 44100)],
            sample_data: vec![0; 72],
            presets: vec![Preset {
                name: "p".to_string(),
                program: 0,
                bank: 0,
                layers: vec![
                    Layer { key_range: MidiRange::new(0, 59), ..Default::default() },
                    Layer { key_range: MidiRange::new(60, 127), ..Default::default() },
                ],
            }],
            instruments: vec![Instrument {
                name: "i".to_string(),
                splits: vec![low, high],
            }],
        });

        let event = NoteEvent { note: 60, velocity: 100, ..Default::default() };
        let voice = preset_voice(font, 0, &event, 44100).unwrap();

        // Only the second layer accepts, and inside it only the high split.
        assert_eq!(voice.split_count(), 1);
    }

    #[test]
    fn verify_velocity_range_is_closed() {
        let split = Split { vel_range: MidiRange::new(40, 80), ..Default::default() };
        let font = one_split_font(split, Layer::default());

        for (velocity, expected) in [(39, 0), (40, 1), (80, 1), (81, 0)] {
            let event = NoteEvent { velocity, ..Default::default() };
            let voice = preset_voice(font.clone(), 0, &event, 44100).unwrap();
            assert_eq!(voice.split_count(), expected, "velocity {}", velocity);
        }
    }

    #[test]
    fn verify_constant_power_pan_preserves_level() {
        let split = Split { pan: 180, ..Default::default() };
        let font = one_split_font(split, Layer::default());

        let voice = preset_voice(font, 0, &NoteEvent::default(), 44100).unwrap();
        let slot = &voice.slots[0];

        let squares = slot.left_level * slot.left_level + slot.right_level * slot.right_level;
        let attenuation_sq = slot.attenuation * slot.attenuation;
        assert!((squares - attenuation_sq).abs() < 1e-9);
    }

    #[test]
    fn verify_attenuation_law() {
        let split = Split { initial_attenuation: 60, ..Default::default() };
        let layer = Layer { initial_attenuation: 60, ..Default::default() };
        let font = one_split_font(split, layer);

        let voice = preset_voice(font, 0, &NoteEvent::default(), 44100).unwrap();

        // 120 centibels of attenuation under the 2^(−cB/60) law is a quarter amplitude, times
        // the global headroom factor.
        let expected = 0.25 * 0.3;
        assert!((f64::from(voice.slots[0].attenuation) - expected).abs() < 1e-6);
    }

    #[test]
    fn verify_window_offsets_and_phase_clamp() {
        let split = Split {
            start_offset: -8,
            end_offset: -4,
            start_loop_offset: 2,
            end_loop_offset: -2,
            ..Default::default()
        };
        let font = one_split_font(split, Layer::default());

        let voice = preset_voice(font, 0, &NoteEvent::default(), 44100).unwrap();
        let slot = &voice.slots[0];

        // A negative start offset cannot move the phase before the sample.
        assert_eq!(slot.phase, 0.0);
        assert_eq!(slot.end, 60.0);
        assert_eq!(slot.start_loop, 2.0);
        assert_eq!(slot.end_loop, 60.0);
    }

    #[test]
    fn verify_zone_overflow_is_reported() {
        let splits: Vec<Split> = (0..MAX_VOICE_SPLITS + 1).map(|_| Split::default()).collect();
        let font = Arc::new(SoundFont {
            samples: vec![test_sample(64, 60, 44100)],
            sample_data: vec![0; 72],
            presets: vec![Preset {
                name: "p".to_string(),
                program: 0,
                bank: 0,
                layers: vec![Layer::default()],
            }],
            instruments: vec![Instrument { name: "i".to_string(), splits }],
        });

        match preset_voice(font, 0, &NoteEvent::default(), 44100) {
            Err(Error::TooManyZones(limit)) => assert_eq!(limit, MAX_VOICE_SPLITS),
            other => panic!("expected TooManyZones, got {:?}", other.map(|_| ())),
        }
    }
}
