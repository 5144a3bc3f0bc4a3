// Aulos
// Copyright (c) 2026 The Project Aulos Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `bank` module defines the resolved, directly playable form of a SoundFont: flat presets,
//! instruments, and splits with every generator folded in, plus the shared PCM pool.
//!
//! Cross-references are indices into the owning [`SoundFont`]'s tables, never pointers, so the
//! whole bank is a plain owned value.

use aulos_core::units::MidiRange;

use crate::records::SampleType;

/// The playback-relevant fields of one sample header.
#[derive(Clone, Debug, PartialEq)]
pub struct SampleInfo {
    pub name: String,
    /// First frame of the sample in the PCM pool.
    pub start: u32,
    /// Frame one past the last playable frame.
    pub end: u32,
    pub start_loop: u32,
    pub end_loop: u32,
    /// The rate the sample was recorded at, in Hz.
    pub sample_rate: u32,
    /// The MIDI key the sample plays at its recorded pitch.
    pub original_key: u8,
    /// Pitch correction in cents.
    pub correction: i8,
    pub sample_type: SampleType,
}

/// The SoundFont loop discipline of a split.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SampleMode {
    /// Play the sample window once.
    NoLoop,
    /// Loop between the loop points indefinitely.
    Continuous,
    /// Reserved by the format; plays unlooped.
    Reserved,
    /// Loop while the key is held, then play the tail. Without envelope support this loops
    /// indefinitely, exactly like [`SampleMode::Continuous`].
    LoopWithTail,
}

impl SampleMode {
    pub fn from_raw(raw: u16) -> SampleMode {
        match raw & 0x3 {
            1 => SampleMode::Continuous,
            2 => SampleMode::Reserved,
            3 => SampleMode::LoopWithTail,
            _ => SampleMode::NoLoop,
        }
    }

    /// Returns true if the render kernel should run the looped inner loop.
    #[inline]
    pub fn loops(&self) -> bool {
        matches!(self, SampleMode::Continuous | SampleMode::LoopWithTail)
    }
}

impl Default for SampleMode {
    fn default() -> Self {
        SampleMode::NoLoop
    }
}

/// A split: the leaf playback zone binding one sample with its acceptance ranges and folded
/// generator values.
#[derive(Clone, Debug, PartialEq)]
pub struct Split {
    /// Index of the referenced sample in [`SoundFont::samples`].
    pub sample: usize,
    pub key_range: MidiRange,
    pub vel_range: MidiRange,
    /// Overriding root key; `None` inherits the sample's original key at play time.
    pub root_key: Option<u8>,
    /// Coarse tune in semitones.
    pub coarse_tune: i8,
    /// Fine tune in cents.
    pub fine_tune: i8,
    /// Scale tuning in cents per semitone of key distance; 100 is standard tuning.
    pub scale_tuning: i16,
    /// Initial attenuation in centibels.
    pub initial_attenuation: i16,
    /// Pan, −500 (full left) to +500 (full right).
    pub pan: i16,
    pub sample_mode: SampleMode,
    /// Accumulated sample-address offsets in frames, fine plus coarse · 32768.
    pub start_offset: i32,
    pub end_offset: i32,
    pub start_loop_offset: i32,
    pub end_loop_offset: i32,
}

impl Default for Split {
    fn default() -> Self {
        Split {
            sample: 0,
            key_range: MidiRange::default(),
            vel_range: MidiRange::default(),
            root_key: None,
            coarse_tune: 0,
            fine_tune: 0,
            scale_tuning: 100,
            initial_attenuation: 0,
            pan: 0,
            sample_mode: SampleMode::NoLoop,
            start_offset: 0,
            end_offset: 0,
            start_loop_offset: 0,
            end_loop_offset: 0,
        }
    }
}

/// A preset zone: selects one instrument and carries range and tuning fields that apply on top
/// of the instrument's splits at play time.
#[derive(Clone, Debug, PartialEq)]
pub struct Layer {
    /// Index of the referenced instrument in [`SoundFont::instruments`].
    pub instrument: usize,
    pub key_range: MidiRange,
    pub vel_range: MidiRange,
    pub coarse_tune: i8,
    pub fine_tune: i8,
    pub scale_tuning: i16,
    pub initial_attenuation: i16,
    pub pan: i16,
}

impl Default for Layer {
    fn default() -> Self {
        Layer {
            instrument: 0,
            key_range: MidiRange::default(),
            vel_range: MidiRange::default(),
            coarse_tune: 0,
            fine_tune: 0,
            scale_tuning: 0,
            initial_attenuation: 0,
            pan: 0,
        }
    }
}

/// A MIDI-addressable patch: an ordered list of layers.
#[derive(Clone, Debug, PartialEq)]
pub struct Preset {
    pub name: String,
    /// MIDI program number, 0 to 127.
    pub program: u16,
    /// MIDI bank number, 0 to 128 where 128 is the percussion bank.
    pub bank: u16,
    pub layers: Vec<Layer>,
}

impl Preset {
    /// The sort key of the per-font preset list.
    #[inline]
    pub fn midi_index(&self) -> u32 {
        u32::from(self.bank) * 128 + u32::from(self.program)
    }
}

/// An instrument: an ordered list of splits.
#[derive(Clone, Debug, PartialEq)]
pub struct Instrument {
    pub name: String,
    pub splits: Vec<Split>,
}

/// A fully resolved SoundFont: the owned PCM pool plus the preset, instrument, and sample tables
/// in directly playable form.
///
/// Presets are sorted by `bank · 128 + program` ascending; the declaration order of layers
/// within a preset and of splits within an instrument is preserved.
#[derive(Clone, Debug, PartialEq)]
pub struct SoundFont {
    pub samples: Vec<SampleInfo>,
    /// The shared pool of 16-bit PCM frames.
    pub sample_data: Vec<i16>,
    pub presets: Vec<Preset>,
    pub instruments: Vec<Instrument>,
}

impl SoundFont {
    /// Finds the first preset matching the program and bank numbers.
    pub fn find_preset(&self, program: u16, bank: u16) -> Option<usize> {
        self.presets.iter().position(|p| p.program == program && p.bank == bank)
    }
}
