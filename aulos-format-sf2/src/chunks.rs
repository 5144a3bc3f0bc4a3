// Aulos
// Copyright (c) 2026 The Project Aulos Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::marker::PhantomData;

use aulos_core::errors::{format_error, Result};
use aulos_core::io::ReadBytes;

use log::debug;

use crate::records::{
    parse_record_table, Bag, GeneratorRecord, InstrumentHeader, PresetHeader, SampleHeader,
};

/// `ParseChunkTag` implements `parse_tag` to map between the 4-byte chunk identifier and the
/// enumeration.
pub trait ParseChunkTag: Sized {
    fn parse_tag(tag: [u8; 4], len: u32) -> Option<Self>;
}

/// `ChunksReader` reads chunks from a `ReadBytes` stream. It is generic across a type, usually an
/// enum, implementing the `ParseChunkTag` trait. When a new chunk is encountered in the stream,
/// `parse_tag` on T is called to return an object capable of parsing/reading that chunk or `None`.
/// This makes reading the actual chunk data lazy in that the chunk is not read until the object is
/// consumed.
pub struct ChunksReader<T: ParseChunkTag> {
    len: u32,
    consumed: u32,
    phantom: PhantomData<T>,
}

impl<T: ParseChunkTag> ChunksReader<T> {
    pub fn new(len: u32) -> Self {
        ChunksReader { len, consumed: 0, phantom: PhantomData }
    }

    pub fn next<B: ReadBytes>(&mut self, reader: &mut B) -> Result<Option<T>> {
        // Loop until a chunk is recognized and returned, or the end of stream is reached.
        loop {
            // Align to the next 2-byte boundary if not currently aligned.
            if self.consumed & 0x1 == 1 {
                reader.read_u8()?;
                self.consumed += 1;
            }

            // Check if there are enough bytes for another chunk, if not, there are no more chunks.
            if self.consumed + 8 > self.len {
                return Ok(None);
            }

            // Read tag and len, the chunk header.
            let tag = reader.read_quad_bytes()?;
            let len = reader.read_u32()?;
            self.consumed += 8;

            // Check if the ChunksReader has enough unread bytes to fully read the chunk.
            //
            // Warning: the formulation of this conditional is critical because len is untrusted
            // input, it may overflow when added to anything.
            if self.len - self.consumed < len {
                return format_error("chunk length exceeds parent (list) chunk length");
            }

            // The length of the chunk has been validated, so "consume" the chunk.
            self.consumed = self.consumed.saturating_add(len);

            match T::parse_tag(tag, len) {
                Some(chunk) => return Ok(Some(chunk)),
                None => {
                    // As per the RIFF spec, unknown chunks are to be ignored.
                    debug!(
                        "ignoring unknown chunk: tag={}, len={}.",
                        String::from_utf8_lossy(&tag),
                        len
                    );

                    reader.ignore_bytes(u64::from(len))?
                }
            }
        }
    }

    pub fn finish<B: ReadBytes>(&mut self, reader: &mut B) -> Result<()> {
        // If data is remaining in this chunk, skip it.
        if self.consumed < self.len {
            let remaining = self.len - self.consumed;
            reader.ignore_bytes(u64::from(remaining))?;
            self.consumed += remaining;
        }

        // Pad the chunk to the next 2-byte boundary.
        if self.len & 0x1 == 1 {
            reader.read_u8()?;
        }

        Ok(())
    }
}

/// Common trait implemented for all chunks that are parsed by a `ChunkParser`.
pub trait ParseChunk: Sized {
    fn parse<B: ReadBytes>(reader: &mut B, tag: [u8; 4], len: u32) -> Result<Self>;
}

/// `ChunkParser` is a utility struct for unifying the parsing of chunks.
pub struct ChunkParser<P: ParseChunk> {
    tag: [u8; 4],
    len: u32,
    phantom: PhantomData<P>,
}

impl<P: ParseChunk> ChunkParser<P> {
    fn new(tag: [u8; 4], len: u32) -> Self {
        ChunkParser { tag, len, phantom: PhantomData }
    }

    pub fn parse<B: ReadBytes>(&self, reader: &mut B) -> Result<P> {
        P::parse(reader, self.tag, self.len)
    }
}

enum NullChunks {}

impl ParseChunkTag for NullChunks {
    fn parse_tag(_tag: [u8; 4], _len: u32) -> Option<Self> {
        None
    }
}

/// A RIFF `LIST` chunk; the first four payload bytes name the list form.
pub struct ListChunk {
    pub form: [u8; 4],
    pub len: u32,
}

impl ListChunk {
    pub fn skip<B: ReadBytes>(&self, reader: &mut B) -> Result<()> {
        ChunksReader::<NullChunks>::new(self.len).finish(reader)
    }
}

impl ParseChunk for ListChunk {
    fn parse<B: ReadBytes>(reader: &mut B, _tag: [u8; 4], len: u32) -> Result<Self> {
        // A List chunk must contain atleast the list/form identifier. However, an empty list
        // (len == 4) is permissible.
        if len < 4 {
            return format_error("malformed list chunk");
        }

        Ok(ListChunk { form: reader.read_quad_bytes()?, len: len - 4 })
    }
}

/// The `smpl` sub-chunk of the `sdta` list: the shared pool of 16-bit little-endian PCM frames.
pub struct SampleDataChunk {
    pub pcm: Vec<i16>,
}

impl ParseChunk for SampleDataChunk {
    fn parse<B: ReadBytes>(reader: &mut B, _tag: [u8; 4], len: u32) -> Result<Self> {
        let n_frames = (len / 2) as usize;

        let mut raw = vec![0u8; n_frames * 2];
        reader.read_buf_exact(&mut raw)?;

        let pcm = raw.chunks_exact(2).map(|b| i16::from_le_bytes([b[0], b[1]])).collect();

        // A stray trailing byte in an odd-length chunk carries no frame.
        if len & 0x1 == 1 {
            reader.ignore_bytes(1)?;
        }

        Ok(SampleDataChunk { pcm })
    }
}

/// A chunk whose contents are known but unused; parsing skips the payload by its declared size.
pub struct IgnoredChunk;

impl ParseChunk for IgnoredChunk {
    fn parse<B: ReadBytes>(reader: &mut B, tag: [u8; 4], len: u32) -> Result<Self> {
        debug!("skipping chunk: tag={}, len={}.", String::from_utf8_lossy(&tag), len);

        reader.ignore_bytes(u64::from(len))?;
        Ok(IgnoredChunk)
    }
}

macro_rules! record_table_chunk {
    ($name:ident, $record:ty, $what:expr) => {
        pub struct $name(pub Vec<$record>);

        impl ParseChunk for $name {
            fn parse<B: ReadBytes>(reader: &mut B, _tag: [u8; 4], len: u32) -> Result<Self> {
                Ok($name(parse_record_table(reader, len, $what)?))
            }
        }
    };
}

record_table_chunk!(PresetHeadersChunk, PresetHeader, "phdr");
record_table_chunk!(PresetBagsChunk, Bag, "pbag");
record_table_chunk!(PresetGeneratorsChunk, GeneratorRecord, "pgen");
record_table_chunk!(InstrumentHeadersChunk, InstrumentHeader, "inst");
record_table_chunk!(InstrumentBagsChunk, Bag, "ibag");
record_table_chunk!(InstrumentGeneratorsChunk, GeneratorRecord, "igen");
record_table_chunk!(SampleHeadersChunk, SampleHeader, "shdr");

macro_rules! parser {
    ($class:expr, $result:ty, $tag:expr, $len:expr) => {
        Some($class(ChunkParser::<$result>::new($tag, $len)))
    };
}

/// The chunks expected directly below the `RIFF`/`sfbk` container. Everything at this level is a
/// `LIST`.
pub enum SfbkChunks {
    List(ChunkParser<ListChunk>),
}

impl ParseChunkTag for SfbkChunks {
    fn parse_tag(tag: [u8; 4], len: u32) -> Option<Self> {
        match &tag {
            b"LIST" => parser!(SfbkChunks::List, ListChunk, tag, len),
            _ => None,
        }
    }
}

/// The sub-chunks of the `sdta` list. The 24-bit `sm24` extension is ignored.
pub enum SdtaChunks {
    SampleData(ChunkParser<SampleDataChunk>),
}

impl ParseChunkTag for SdtaChunks {
    fn parse_tag(tag: [u8; 4], len: u32) -> Option<Self> {
        match &tag {
            b"smpl" => parser!(SdtaChunks::SampleData, SampleDataChunk, tag, len),
            _ => None,
        }
    }
}

/// The sub-chunks of the `pdta` list: the nine hydra record tables, in any order. Modulator
/// tables are recognised only to be skipped; the playback path never evaluates them.
pub enum PdtaChunks {
    PresetHeaders(ChunkParser<PresetHeadersChunk>),
    PresetBags(ChunkParser<PresetBagsChunk>),
    PresetModulators(ChunkParser<IgnoredChunk>),
    PresetGenerators(ChunkParser<PresetGeneratorsChunk>),
    InstrumentHeaders(ChunkParser<InstrumentHeadersChunk>),
    InstrumentBags(ChunkParser<InstrumentBagsChunk>),
    InstrumentModulators(ChunkParser<IgnoredChunk>),
    InstrumentGenerators(ChunkParser<InstrumentGeneratorsChunk>),
    SampleHeaders(ChunkParser<SampleHeadersChunk>),
}

impl ParseChunkTag for PdtaChunks {
    fn parse_tag(tag: [u8; 4], len: u32) -> Option<Self> {
        match &tag {
            b"phdr" => parser!(PdtaChunks::PresetHeaders, PresetHeadersChunk, tag, len),
            b"pbag" => parser!(PdtaChunks::PresetBags, PresetBagsChunk, tag, len),
            b"pmod" => parser!(PdtaChunks::PresetModulators, IgnoredChunk, tag, len),
            b"pgen" => parser!(PdtaChunks::PresetGenerators, PresetGeneratorsChunk, tag, len),
            b"inst" => parser!(PdtaChunks::InstrumentHeaders, InstrumentHeadersChunk, tag, len),
            b"ibag" => parser!(PdtaChunks::InstrumentBags, InstrumentBagsChunk, tag, len),
            b"imod" => parser!(PdtaChunks::InstrumentModulators, IgnoredChunk, tag, len),
            b"igen" => parser!(PdtaChunks::InstrumentGenerators, InstrumentGeneratorsChunk, tag, len),
            b"shdr" => parser!(PdtaChunks::SampleHeaders, SampleHeadersChunk, tag, len),
            _ => None,
        }
    }
}
