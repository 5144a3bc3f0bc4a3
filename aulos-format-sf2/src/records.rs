// Aulos
// Copyright (c) 2026 The Project Aulos Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `records` module provides typed, read-only views over the raw `pdta` record tables (the
//! SoundFont "hydra").
//!
//! Every table ends with a terminator record whose bag or generator index bounds the range of
//! the record before it; the terminators are kept in the parsed vectors because the resolver
//! relies on indexing one record past the last real entry.

use aulos_core::errors::{format_error, Result};
use aulos_core::io::ReadBytes;

use bitflags::bitflags;
use log::warn;

/// The length in bytes of the fixed ASCII name field carried by header records.
const RECORD_NAME_LEN: usize = 20;

/// Reads a fixed 20-byte record name and decodes it up to the NUL terminator.
fn read_record_name<B: ReadBytes>(reader: &mut B) -> Result<String> {
    let mut raw = [0u8; RECORD_NAME_LEN];
    reader.read_buf_exact(&mut raw)?;

    let end = raw.iter().position(|&b| b == 0).unwrap_or(RECORD_NAME_LEN);
    Ok(String::from_utf8_lossy(&raw[..end]).into_owned())
}

/// A fixed-size record of one of the hydra tables.
pub(crate) trait Record: Sized {
    /// The on-disk size of one record in bytes.
    const SIZE: u32;

    fn parse<B: ReadBytes>(reader: &mut B) -> Result<Self>;
}

/// Parses a whole record table from a chunk payload of `len` bytes. The table must divide evenly
/// into records and contain at least the terminator record.
pub(crate) fn parse_record_table<B: ReadBytes, R: Record>(
    reader: &mut B,
    len: u32,
    what: &'static str,
) -> Result<Vec<R>> {
    if len % R::SIZE != 0 {
        warn!("{}: chunk length {} is not a multiple of the record size", what, len);
        return format_error("record table length is not a multiple of its record size");
    }

    let count = (len / R::SIZE) as usize;

    if count == 0 {
        warn!("{}: table is missing its terminator record", what);
        return format_error("record table is missing its terminator");
    }

    let mut records = Vec::with_capacity(count);
    for _ in 0..count {
        records.push(R::parse(reader)?);
    }

    Ok(records)
}

/// A `phdr` record: one preset header.
#[derive(Clone, Debug)]
pub struct PresetHeader {
    pub name: String,
    pub program: u16,
    pub bank: u16,
    pub bag_ndx: u16,
    pub library: u32,
    pub genre: u32,
    pub morphology: u32,
}

impl Record for PresetHeader {
    const SIZE: u32 = 38;

    fn parse<B: ReadBytes>(reader: &mut B) -> Result<Self> {
        Ok(PresetHeader {
            name: read_record_name(reader)?,
            program: reader.read_u16()?,
            bank: reader.read_u16()?,
            bag_ndx: reader.read_u16()?,
            library: reader.read_u32()?,
            genre: reader.read_u32()?,
            morphology: reader.read_u32()?,
        })
    }
}

/// A `pbag` or `ibag` record: the start of a zone's generator and modulator ranges.
#[derive(Clone, Copy, Debug)]
pub struct Bag {
    pub gen_ndx: u16,
    pub mod_ndx: u16,
}

impl Record for Bag {
    const SIZE: u32 = 4;

    fn parse<B: ReadBytes>(reader: &mut B) -> Result<Self> {
        Ok(Bag { gen_ndx: reader.read_u16()?, mod_ndx: reader.read_u16()? })
    }
}

/// A `pgen` or `igen` record: one generator, an (operator, amount) pair. The amount is a union
/// on disk; the accessors below reinterpret the raw 16-bit word.
#[derive(Clone, Copy, Debug)]
pub struct GeneratorRecord {
    pub oper: u16,
    pub amount: u16,
}

impl GeneratorRecord {
    #[inline]
    pub fn amount_u16(&self) -> u16 {
        self.amount
    }

    #[inline]
    pub fn amount_i16(&self) -> i16 {
        self.amount as i16
    }

    /// The amount as a range pair: low byte first, high byte second.
    #[inline]
    pub fn amount_range(&self) -> (u8, u8) {
        ((self.amount & 0xff) as u8, (self.amount >> 8) as u8)
    }

    /// The recognized operator, if any.
    #[inline]
    pub fn op(&self) -> Option<GeneratorOp> {
        GeneratorOp::from_raw(self.oper)
    }
}

impl Record for GeneratorRecord {
    const SIZE: u32 = 4;

    fn parse<B: ReadBytes>(reader: &mut B) -> Result<Self> {
        Ok(GeneratorRecord { oper: reader.read_u16()?, amount: reader.read_u16()? })
    }
}

/// An `inst` record: one instrument header.
#[derive(Clone, Debug)]
pub struct InstrumentHeader {
    pub name: String,
    pub bag_ndx: u16,
}

impl Record for InstrumentHeader {
    const SIZE: u32 = 22;

    fn parse<B: ReadBytes>(reader: &mut B) -> Result<Self> {
        Ok(InstrumentHeader { name: read_record_name(reader)?, bag_ndx: reader.read_u16()? })
    }
}

bitflags! {
    /// The `shdr` sample-type word.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct SampleType: u16 {
        const MONO      = 0x0001;
        const RIGHT     = 0x0002;
        const LEFT      = 0x0004;
        const LINKED    = 0x0008;
        /// The sample lives in ROM on the original hardware; it carries no playable data.
        const ROM       = 0x8000;
    }
}

/// An `shdr` record: one sample header. The start, end, and loop positions index frames of the
/// shared PCM pool.
#[derive(Clone, Debug)]
pub struct SampleHeader {
    pub name: String,
    pub start: u32,
    pub end: u32,
    pub start_loop: u32,
    pub end_loop: u32,
    pub sample_rate: u32,
    pub original_key: u8,
    pub correction: i8,
    pub sample_link: u16,
    pub sample_type: SampleType,
}

impl Record for SampleHeader {
    const SIZE: u32 = 46;

    fn parse<B: ReadBytes>(reader: &mut B) -> Result<Self> {
        Ok(SampleHeader {
            name: read_record_name(reader)?,
            start: reader.read_u32()?,
            end: reader.read_u32()?,
            start_loop: reader.read_u32()?,
            end_loop: reader.read_u32()?,
            sample_rate: reader.read_u32()?,
            original_key: reader.read_u8()?,
            correction: reader.read_i8()?,
            sample_link: reader.read_u16()?,
            sample_type: SampleType::from_bits_retain(reader.read_u16()?),
        })
    }
}

/// The generator operators the playback path acts on. Everything else (modulator routing,
/// envelopes, LFOs, filtering, effect sends) is deliberately left unmapped and ignored.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GeneratorOp {
    StartAddrsOffset,
    EndAddrsOffset,
    StartLoopAddrsOffset,
    EndLoopAddrsOffset,
    StartAddrsCoarseOffset,
    EndAddrsCoarseOffset,
    Pan,
    Instrument,
    KeyRange,
    VelRange,
    StartLoopAddrsCoarseOffset,
    KeyNum,
    Velocity,
    InitialAttenuation,
    EndLoopAddrsCoarseOffset,
    CoarseTune,
    FineTune,
    SampleId,
    SampleModes,
    ScaleTuning,
    ExclusiveClass,
    OverridingRootKey,
}

impl GeneratorOp {
    pub fn from_raw(raw: u16) -> Option<GeneratorOp> {
        match raw {
            0 => Some(GeneratorOp::StartAddrsOffset),
            1 => Some(GeneratorOp::EndAddrsOffset),
            2 => Some(GeneratorOp::StartLoopAddrsOffset),
            3 => Some(GeneratorOp::EndLoopAddrsOffset),
            4 => Some(GeneratorOp::StartAddrsCoarseOffset),
            12 => Some(GeneratorOp::EndAddrsCoarseOffset),
            17 => Some(GeneratorOp::Pan),
            41 => Some(GeneratorOp::Instrument),
            43 => Some(GeneratorOp::KeyRange),
            44 => Some(GeneratorOp::VelRange),
            45 => Some(GeneratorOp::StartLoopAddrsCoarseOffset),
            46 => Some(GeneratorOp::KeyNum),
            47 => Some(GeneratorOp::Velocity),
            48 => Some(GeneratorOp::InitialAttenuation),
            50 => Some(GeneratorOp::EndLoopAddrsCoarseOffset),
            51 => Some(GeneratorOp::CoarseTune),
            52 => Some(GeneratorOp::FineTune),
            53 => Some(GeneratorOp::SampleId),
            54 => Some(GeneratorOp::SampleModes),
            56 => Some(GeneratorOp::ScaleTuning),
            57 => Some(GeneratorOp::ExclusiveClass),
            58 => Some(GeneratorOp::OverridingRootKey),
            _ => None,
        }
    }
}

/// The raw hydra: every record table of the `pdta` list needed by the resolver.
#[derive(Default)]
pub(crate) struct Hydra {
    pub phdr: Option<Vec<PresetHeader>>,
    pub pbag: Option<Vec<Bag>>,
    pub pgen: Option<Vec<GeneratorRecord>>,
    pub inst: Option<Vec<InstrumentHeader>>,
    pub ibag: Option<Vec<Bag>>,
    pub igen: Option<Vec<GeneratorRecord>>,
    pub shdr: Option<Vec<SampleHeader>>,
}

pub(crate) struct CompleteHydra {
    pub phdr: Vec<PresetHeader>,
    pub pbag: Vec<Bag>,
    pub pgen: Vec<GeneratorRecord>,
    pub inst: Vec<InstrumentHeader>,
    pub ibag: Vec<Bag>,
    pub igen: Vec<GeneratorRecord>,
    pub shdr: Vec<SampleHeader>,
}

impl Hydra {
    /// Checks that every required table was present and unwraps them.
    pub fn complete(self) -> Result<CompleteHydra> {
        match self {
            Hydra {
                phdr: Some(phdr),
                pbag: Some(pbag),
                pgen: Some(pgen),
                inst: Some(inst),
                ibag: Some(ibag),
                igen: Some(igen),
                shdr: Some(shdr),
            } => Ok(CompleteHydra { phdr, pbag, pgen, inst, ibag, igen, shdr }),
            _ => format_error("pdta list is missing one or more record tables"),
        }
    }
}
