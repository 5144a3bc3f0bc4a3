// Aulos
// Copyright (c) 2026 The Project Aulos Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! SoundFont 2 (`sfbk`) reader for Project Aulos.
//!
//! An SF2 file is one large RIFF chunk holding three lists: `INFO` (metadata, skipped), `sdta`
//! (the shared PCM sample pool), and `pdta` (the nine "hydra" record tables describing presets,
//! instruments, and samples). [`read_font`] parses the tree, hydrates the record tables, and
//! folds the two-level generator hierarchy into a flat, directly playable [`SoundFont`].

#![warn(rust_2018_idioms)]
#![forbid(unsafe_code)]

use aulos_core::errors::{format_error, Result};
use aulos_core::io::ReadBytes;

use log::debug;

mod bank;
mod chunks;
mod records;
mod resolve;

pub use bank::{Instrument, Layer, Preset, SampleInfo, SampleMode, SoundFont, Split};
pub use records::{GeneratorOp, SampleType};

use chunks::{ChunksReader, PdtaChunks, SdtaChunks, SfbkChunks};
use records::Hydra;

/// An SF2 file is a RIFF stream, with a "RIFF" ASCII stream marker.
const SF2_STREAM_MARKER: [u8; 4] = *b"RIFF";

/// The RIFF form is "sfbk".
const SF2_RIFF_FORM: [u8; 4] = *b"sfbk";

/// Reads a complete SoundFont from the stream and resolves it into playable form.
///
/// The whole sample pool is held in memory; nothing streams from disk after this returns.
pub fn read_font<B: ReadBytes>(reader: &mut B) -> Result<SoundFont> {
    // The RIFF marker should be present.
    let marker = reader.read_quad_bytes()?;

    if marker != SF2_STREAM_MARKER {
        return format_error("missing riff stream marker");
    }

    let riff_len = reader.read_u32()?;
    let riff_form = reader.read_quad_bytes()?;

    if riff_form != SF2_RIFF_FORM {
        return format_error("riff form is not sfbk");
    }

    if riff_len < 4 {
        return format_error("riff chunk too short");
    }

    let mut sample_data: Option<Vec<i16>> = None;
    let mut hydra = Hydra::default();

    // The form identifier was part of the RIFF chunk's payload.
    let mut riff_chunks = ChunksReader::<SfbkChunks>::new(riff_len - 4);

    loop {
        let chunk = riff_chunks.next(reader)?;

        let Some(SfbkChunks::List(list)) = chunk else { break };

        let list = list.parse(reader)?;

        match &list.form {
            b"sdta" => read_sample_data(reader, list.len, &mut sample_data)?,
            b"pdta" => read_hydra(reader, list.len, &mut hydra)?,
            // INFO metadata and any other list is skipped whole.
            _ => {
                debug!("skipping list: form={}.", String::from_utf8_lossy(&list.form));
                list.skip(reader)?;
            }
        }
    }

    let Some(sample_data) = sample_data else {
        return format_error("missing sdta sample data");
    };

    resolve::resolve(hydra.complete()?, sample_data)
}

/// Walks the `sdta` list for its `smpl` sub-chunk. Other sub-chunks, notably the 24-bit `sm24`
/// extension, are skipped.
fn read_sample_data<B: ReadBytes>(
    reader: &mut B,
    len: u32,
    sample_data: &mut Option<Vec<i16>>,
) -> Result<()> {
    let mut sdta_chunks = ChunksReader::<SdtaChunks>::new(len);

    while let Some(chunk) = sdta_chunks.next(reader)? {
        match chunk {
            SdtaChunks::SampleData(smpl) => {
                let smpl = smpl.parse(reader)?;
                debug!("sample pool holds {} frames.", smpl.pcm.len());
                sample_data.replace(smpl.pcm);
            }
        }
    }

    sdta_chunks.finish(reader)
}

/// Walks the `pdta` list and hydrates every record table. The sub-chunks may appear in any
/// order; modulator tables are skipped by their declared size.
fn read_hydra<B: ReadBytes>(reader: &mut B, len: u32, hydra: &mut Hydra) -> Result<()> {
    let mut pdta_chunks = ChunksReader::<PdtaChunks>::new(len);

    while let Some(chunk) = pdta_chunks.next(reader)? {
        match chunk {
            PdtaChunks::PresetHeaders(c) => hydra.phdr = Some(c.parse(reader)?.0),
            PdtaChunks::PresetBags(c) => hydra.pbag = Some(c.parse(reader)?.0),
            PdtaChunks::PresetModulators(c) => {
                c.parse(reader)?;
            }
            PdtaChunks::PresetGenerators(c) => hydra.pgen = Some(c.parse(reader)?.0),
            PdtaChunks::InstrumentHeaders(c) => hydra.inst = Some(c.parse(reader)?.0),
            PdtaChunks::InstrumentBags(c) => hydra.ibag = Some(c.parse(reader)?.0),
            PdtaChunks::InstrumentModulators(c) => {
                c.parse(reader)?;
            }
            PdtaChunks::InstrumentGenerators(c) => hydra.igen = Some(c.parse(reader)?.0),
            PdtaChunks::SampleHeaders(c) => hydra.shdr = Some(c.parse(reader)?.0),
        }
    }

    pdta_chunks.finish(reader)
}

#[cfg(test)]
mod tests {
    use aulos_core::io::BufReader;
    use aulos_core::units::MidiRange;

    use super::*;

    // ---- A small in-memory SF2 image builder --------------------------------------------

    pub(crate) struct ZoneSpec {
        pub gens: Vec<(u16, u16)>,
    }

    pub(crate) struct SampleSpec {
        pub name: &'static str,
        pub start: u32,
        pub end: u32,
        pub start_loop: u32,
        pub end_loop: u32,
        pub sample_rate: u32,
        pub original_key: u8,
        pub sample_type: u16,
    }

    pub(crate) struct FontSpec {
        pub pcm: Vec<i16>,
        pub samples: Vec<SampleSpec>,
        /// (name, zones)
        pub instruments: Vec<(&'static str, Vec<ZoneSpec>)>,
        /// (name, program, bank, zones)
        pub presets: Vec<(&'static str, u16, u16, Vec<ZoneSpec>)>,
    }

    fn name20(name: &str) -> [u8; 20] {
        let mut out = [0u8; 20];
        out[..name.len()].copy_from_slice(name.as_bytes());
        out
    }

    fn chunk(tag: &[u8; 4], payload: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(tag);
        out.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        out.extend_from_slice(payload);
        if payload.len() & 1 == 1 {
            out.push(0);
        }
        out
    }

    fn list(form: &[u8; 4], chunks: &[Vec<u8>]) -> Vec<u8> {
        let mut payload = Vec::new();
        payload.extend_from_slice(form);
        for c in chunks {
            payload.extend_from_slice(c);
        }
        chunk(b"LIST", &payload)
    }

    fn phdr_record(name: &str, program: u16, bank: u16, bag_ndx: u16) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&name20(name));
        out.extend_from_slice(&program.to_le_bytes());
        out.extend_from_slice(&bank.to_le_bytes());
        out.extend_from_slice(&bag_ndx.to_le_bytes());
        out.extend_from_slice(&[0u8; 12]);
        out
    }

    fn build_image(spec: &FontSpec) -> Vec<u8> {
        // Sample pool.
        let mut smpl = Vec::new();
        for frame in &spec.pcm {
            smpl.extend_from_slice(&frame.to_le_bytes());
        }

        // Preset side of the hydra.
        let mut phdr = Vec::new();
        let mut pbag = Vec::new();
        let mut pgen = Vec::new();
        let mut pbag_count: u16 = 0;
        for (name, program, bank, zones) in &spec.presets {
            phdr.extend_from_slice(&phdr_record(name, *program, *bank, pbag_count));
            for zone in zones {
                pbag.extend_from_slice(&((pgen.len() / 4) as u16).to_le_bytes());
                pbag.extend_from_slice(&0u16.to_le_bytes());
                pbag_count += 1;
                for (oper, amount) in &zone.gens {
                    pgen.extend_from_slice(&oper.to_le_bytes());
                    pgen.extend_from_slice(&amount.to_le_bytes());
                }
            }
        }
        phdr.extend_from_slice(&phdr_record("EOP", 0, 0, pbag_count));
        pbag.extend_from_slice(&((pgen.len() / 4) as u16).to_le_bytes());
        pbag.extend_from_slice(&0u16.to_le_bytes());
        pgen.extend_from_slice(&[0u8; 4]);

        // Instrument side of the hydra.
        let mut inst = Vec::new();
        let mut ibag = Vec::new();
        let mut igen = Vec::new();
        let mut ibag_count: u16 = 0;
        for (name, zones) in &spec.instruments {
            inst.extend_from_slice(&name20(name));
            inst.extend_from_slice(&ibag_count.to_le_bytes());
            for zone in zones {
                ibag.extend_from_slice(&((igen.len() / 4) as u16).to_le_bytes());
                ibag.extend_from_slice(&0u16.to_le_bytes());
                ibag_count += 1;
                for (oper, amount) in &zone.gens {
                    igen.extend_from_slice(&oper.to_le_bytes());
                    igen.extend_from_slice(&amount.to_le_bytes());
                }
            }
        }
        inst.extend_from_slice(&name20("EOI"));
        inst.extend_from_slice(&ibag_count.to_le_bytes());
        ibag.extend_from_slice(&((igen.len() / 4) as u16).to_le_bytes());
        ibag.extend_from_slice(&0u16.to_le_bytes());
        igen.extend_from_slice(&[0u8; 4]);

        // Sample headers.
        let mut shdr = Vec::new();
        for sample in &spec.samples {
            shdr.extend_from_slice(&name20(sample.name));
            shdr.extend_from_slice(&sample.start.to_le_bytes());
            shdr.extend_from_slice(&sample.end.to_le_bytes());
            shdr.extend_from_slice(&sample.start_loop.to_le_bytes());
            shdr.extend_from_slice(&sample.end_loop.to_le_bytes());
            shdr.extend_from_slice(&sample.sample_rate.to_le_bytes());
            shdr.push(sample.original_key);
            shdr.push(0);
            shdr.extend_from_slice(&0u16.to_le_bytes());
            shdr.extend_from_slice(&sample.sample_type.to_le_bytes());
        }
        shdr.extend_from_slice(&name20("EOS"));
        shdr.extend_from_slice(&[0u8; 26]);

        // Empty modulator tables: one terminator record each.
        let pmod = vec![0u8; 10];
        let imod = vec![0u8; 10];

        let mut payload = Vec::new();
        payload.extend_from_slice(b"sfbk");
        payload.extend_from_slice(&list(b"INFO", &[chunk(b"isng", b"EMU8000\0")]));
        payload.extend_from_slice(&list(b"sdta", &[chunk(b"smpl", &smpl)]));
        payload.extend_from_slice(&list(
            b"pdta",
            &[
                chunk(b"phdr", &phdr),
                chunk(b"pbag", &pbag),
                chunk(b"pmod", &pmod),
                chunk(b"pgen", &pgen),
                chunk(b"inst", &inst),
                chunk(b"ibag", &ibag),
                chunk(b"imod", &imod),
                chunk(b"igen", &igen),
                chunk(b"shdr", &shdr),
            ],
        ));

        let mut image = Vec::new();
        image.extend_from_slice(b"RIFF");
        image.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        image.extend_from_slice(&payload);
        image
    }

    fn one_sample_spec() -> FontSpec {
        FontSpec {
            pcm: (0..64).map(|n| n as i16).chain([0; 8]).collect(),
            samples: vec![SampleSpec {
                name: "ramp",
                start: 0,
                end: 64,
                start_loop: 4,
                end_loop: 12,
                sample_rate: 44100,
                original_key: 60,
                sample_type: 1,
            }],
            instruments: vec![(
                "Ramp",
                vec![ZoneSpec { gens: vec![(43, 0x7f00), (53, 0)] }],
            )],
            presets: vec![("Rampy", 0, 0, vec![ZoneSpec { gens: vec![(41, 0)] }])],
        }
    }

    // ---- Tests ---------------------------------------------------------------------------

    #[test]
    fn verify_non_riff_stream_is_rejected() {
        let data = b"OggS\0\0\0\0".to_vec();
        let mut reader = BufReader::new(&data);

        assert!(read_font(&mut reader).is_err());
    }

    #[test]
    fn verify_wrong_riff_form_is_rejected() {
        let mut data = Vec::new();
        data.extend_from_slice(b"RIFF");
        data.extend_from_slice(&4u32.to_le_bytes());
        data.extend_from_slice(b"WAVE");

        let mut reader = BufReader::new(&data);

        assert!(read_font(&mut reader).is_err());
    }

    #[test]
    fn verify_full_image_reads() {
        let image = build_image(&one_sample_spec());
        let mut reader = BufReader::new(&image);

        let font = read_font(&mut reader).unwrap();

        assert_eq!(font.sample_data.len(), 72);
        assert_eq!(font.samples.len(), 1);
        assert_eq!(font.samples[0].name, "ramp");
        assert_eq!(font.samples[0].start_loop, 4);
        assert_eq!(font.samples[0].end_loop, 12);

        assert_eq!(font.instruments.len(), 1);
        assert_eq!(font.instruments[0].name, "Ramp");
        assert_eq!(font.instruments[0].splits.len(), 1);
        assert_eq!(font.instruments[0].splits[0].key_range, MidiRange::new(0, 127));

        assert_eq!(font.presets.len(), 1);
        assert_eq!(font.presets[0].name, "Rampy");
        assert_eq!(font.presets[0].layers.len(), 1);
        assert_eq!(font.presets[0].layers[0].instrument, 0);
    }

    #[test]
    fn verify_missing_sample_data_is_rejected() {
        let spec = one_sample_spec();
        let mut image = build_image(&spec);

        // Rename the smpl chunk so that no sample data is found.
        let pos = image.windows(4).position(|w| w == b"smpl").unwrap();
        image[pos..pos + 4].copy_from_slice(b"zmpl");

        let mut reader = BufReader::new(&image);
        assert!(read_font(&mut reader).is_err());
    }

    #[test]
    fn verify_reading_twice_is_idempotent() {
        let image = build_image(&one_sample_spec());

        let font_a = read_font(&mut BufReader::new(&image)).unwrap();
        let font_b = read_font(&mut BufReader::new(&image)).unwrap();

        assert_eq!(font_a, font_b);
    }

    #[test]
    fn verify_multi_preset_image_sorts_by_midi_index() {
        let mut spec = one_sample_spec();
        spec.presets = vec![
            ("Drums", 0, 128, vec![ZoneSpec { gens: vec![(41, 0)] }]),
            ("B", 1, 0, vec![ZoneSpec { gens: vec![(41, 0)] }]),
            ("A", 0, 0, vec![ZoneSpec { gens: vec![(41, 0)] }]),
        ];

        let image = build_image(&spec);
        let font = read_font(&mut BufReader::new(&image)).unwrap();

        let order: Vec<(u16, u16)> =
            font.presets.iter().map(|p| (p.bank, p.program)).collect();
        assert_eq!(order, vec![(0, 0), (0, 1), (128, 0)]);
    }
}
