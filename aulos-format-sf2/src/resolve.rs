// Aulos
// Copyright (c) 2026 The Project Aulos Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `resolve` module folds the two-level generator hierarchy of the hydra (preset zones over
//! instrument zones) into the flat, directly playable tables of a [`SoundFont`].

use aulos_core::errors::{format_error, Error, Result};
use aulos_core::units::MidiRange;

use log::warn;

use crate::bank::{Instrument, Layer, Preset, SampleInfo, SampleMode, SoundFont, Split};
use crate::records::{Bag, CompleteHydra, GeneratorOp, GeneratorRecord, SampleType};

/// The name of the terminator record of the preset header table.
const PRESET_TERMINATOR: &str = "EOP";

/// The name of the terminator record of the instrument header table.
const INSTRUMENT_TERMINATOR: &str = "EOI";

/// Resolves a complete hydra and the PCM pool into a playable bank.
pub(crate) fn resolve(hydra: CompleteHydra, sample_data: Vec<i16>) -> Result<SoundFont> {
    let samples = build_samples(&hydra, sample_data.len())?;
    let instruments = resolve_instruments(&hydra, &samples)?;
    let mut presets = resolve_presets(&hydra, &instruments)?;

    // The per-font preset list is ordered by MIDI address. The sort is stable so duplicate
    // bank/program pairs keep their declaration order.
    presets.sort_by_key(Preset::midi_index);

    Ok(SoundFont { samples, sample_data, presets, instruments })
}

/// Builds the sample table, clamping each header's window and loop points into the PCM pool so
/// that everything downstream can rely on them.
fn build_samples(hydra: &CompleteHydra, pool_len: usize) -> Result<Vec<SampleInfo>> {
    let pool_len = u32::try_from(pool_len).unwrap_or(u32::MAX);

    // The final record is the terminator.
    let headers = &hydra.shdr[..hydra.shdr.len() - 1];

    let mut samples = Vec::with_capacity(headers.len());

    for shdr in headers {
        let mut start = shdr.start;
        let mut end = shdr.end;

        if start > pool_len {
            warn!("sample {}: start {} lies past the sample pool", shdr.name, start);
            start = pool_len;
        }
        if end < start || end > pool_len {
            warn!("sample {}: end {} lies outside the sample pool", shdr.name, end);
            end = end.clamp(start, pool_len);
        }

        let start_loop = shdr.start_loop.clamp(start, end);
        let end_loop = shdr.end_loop.clamp(start_loop, end);

        samples.push(SampleInfo {
            name: shdr.name.clone(),
            start,
            end,
            start_loop,
            end_loop,
            sample_rate: shdr.sample_rate,
            original_key: shdr.original_key,
            correction: shdr.correction,
            sample_type: shdr.sample_type,
        });
    }

    Ok(samples)
}

/// Returns the generator range of bag `k`. The terminator record makes `bags[k + 1]` valid for
/// every real bag.
fn gen_slice<'a>(
    gens: &'a [GeneratorRecord],
    bags: &[Bag],
    k: usize,
) -> Result<&'a [GeneratorRecord]> {
    let start = bags[k].gen_ndx as usize;
    let end = bags[k + 1].gen_ndx as usize;

    if start > end || end > gens.len() {
        return format_error("bag generator indices out of range");
    }

    Ok(&gens[start..end])
}

/// Validates the bag range `[first, last)` of a preset or instrument header against its bag
/// table. `last` itself must be indexable because it bounds the final bag's generator range.
fn check_bag_range(first: usize, last: usize, bags: &[Bag]) -> Result<()> {
    if first > last || last >= bags.len() {
        return format_error("zone bag indices out of range");
    }

    Ok(())
}

/// Interprets a root-key amount. The distinguished value −1 (and, defensively, anything outside
/// the MIDI key range) means "inherit the sample's original key".
fn root_key_of(amount: i16) -> Option<u8> {
    if (0..=127).contains(&amount) {
        Some(amount as u8)
    }
    else {
        if amount != -1 {
            warn!("ignoring out-of-range overriding root key {}", amount);
        }
        None
    }
}

/// Instrument-global generator state: the values captured from zones that carry no `sampleID`
/// generator. `None` marks "not present".
#[derive(Default)]
struct InstrumentGlobals {
    root_key: Option<i16>,
    coarse_tune: Option<i16>,
    fine_tune: Option<i16>,
    scale_tuning: Option<i16>,
    pan: Option<i16>,
    sample_modes: Option<u16>,
    initial_attenuation: Option<i16>,
}

impl InstrumentGlobals {
    fn absorb(&mut self, gens: &[GeneratorRecord]) {
        for gen in gens {
            match gen.op() {
                Some(GeneratorOp::OverridingRootKey) => self.root_key = Some(gen.amount_i16()),
                Some(GeneratorOp::CoarseTune) => self.coarse_tune = Some(gen.amount_i16()),
                Some(GeneratorOp::FineTune) => self.fine_tune = Some(gen.amount_i16()),
                Some(GeneratorOp::ScaleTuning) => self.scale_tuning = Some(gen.amount_i16()),
                Some(GeneratorOp::Pan) => self.pan = Some(gen.amount_i16()),
                Some(GeneratorOp::SampleModes) => self.sample_modes = Some(gen.amount_u16()),
                Some(GeneratorOp::InitialAttenuation) => {
                    self.initial_attenuation = Some(gen.amount_i16())
                }
                // Key and velocity ranges in a global zone are recognized but not inherited.
                Some(GeneratorOp::KeyRange) | Some(GeneratorOp::VelRange) => (),
                _ => (),
            }
        }
    }

    fn seed(&self, split: &mut Split) {
        if let Some(root) = self.root_key {
            split.root_key = root_key_of(root);
        }
        if let Some(coarse) = self.coarse_tune {
            split.coarse_tune = coarse as i8;
        }
        if let Some(fine) = self.fine_tune {
            split.fine_tune = fine as i8;
        }
        if let Some(scale) = self.scale_tuning {
            split.scale_tuning = scale;
        }
        if let Some(pan) = self.pan {
            split.pan = pan;
        }
        if let Some(modes) = self.sample_modes {
            split.sample_mode = SampleMode::from_raw(modes);
        }
        if let Some(attenuation) = self.initial_attenuation {
            split.initial_attenuation = attenuation;
        }
    }
}

/// Applies one instrument-zone generator to a split. The terminal `sampleID` generator binds the
/// sample reference and rejects ROM samples.
fn apply_instrument_gen(
    split: &mut Split,
    gen: &GeneratorRecord,
    samples: &[SampleInfo],
) -> Result<()> {
    let Some(op) = gen.op() else { return Ok(()) };

    match op {
        GeneratorOp::SampleId => {
            let index = gen.amount_u16() as usize;

            let Some(sample) = samples.get(index) else {
                return format_error("split references sample out of range");
            };

            if sample.sample_type.contains(SampleType::ROM) {
                return Err(Error::RomSampleUnsupported(sample.name.clone()));
            }

            split.sample = index;
        }
        GeneratorOp::OverridingRootKey => split.root_key = root_key_of(gen.amount_i16()),
        GeneratorOp::CoarseTune => split.coarse_tune = gen.amount_i16() as i8,
        GeneratorOp::FineTune => split.fine_tune = gen.amount_i16() as i8,
        GeneratorOp::ScaleTuning => split.scale_tuning = gen.amount_i16(),
        GeneratorOp::Pan => split.pan = gen.amount_i16(),
        GeneratorOp::SampleModes => split.sample_mode = SampleMode::from_raw(gen.amount_u16()),
        GeneratorOp::InitialAttenuation => split.initial_attenuation = gen.amount_i16(),
        GeneratorOp::KeyRange => {
            let (lo, hi) = gen.amount_range();
            split.key_range = MidiRange::new(lo, hi);
        }
        GeneratorOp::VelRange => {
            let (lo, hi) = gen.amount_range();
            split.vel_range = MidiRange::new(lo, hi);
        }
        // Address offsets are additive, fine plus coarse at 32768 frames per unit.
        GeneratorOp::StartAddrsOffset => split.start_offset += i32::from(gen.amount_i16()),
        GeneratorOp::EndAddrsOffset => split.end_offset += i32::from(gen.amount_i16()),
        GeneratorOp::StartLoopAddrsOffset => {
            split.start_loop_offset += i32::from(gen.amount_i16())
        }
        GeneratorOp::EndLoopAddrsOffset => split.end_loop_offset += i32::from(gen.amount_i16()),
        GeneratorOp::StartAddrsCoarseOffset => {
            split.start_offset += i32::from(gen.amount_i16()) * 32768
        }
        GeneratorOp::EndAddrsCoarseOffset => {
            split.end_offset += i32::from(gen.amount_i16()) * 32768
        }
        GeneratorOp::StartLoopAddrsCoarseOffset => {
            split.start_loop_offset += i32::from(gen.amount_i16()) * 32768
        }
        GeneratorOp::EndLoopAddrsCoarseOffset => {
            split.end_loop_offset += i32::from(gen.amount_i16()) * 32768
        }
        // Recognized, unimplemented.
        GeneratorOp::KeyNum | GeneratorOp::Velocity | GeneratorOp::ExclusiveClass => (),
        GeneratorOp::Instrument => (),
    }

    Ok(())
}

/// Resolves the zones of instrument `j` into splits.
fn resolve_instrument_zones(
    hydra: &CompleteHydra,
    samples: &[SampleInfo],
    j: usize,
) -> Result<Vec<Split>> {
    let first = hydra.inst[j].bag_ndx as usize;
    let last = hydra.inst[j + 1].bag_ndx as usize;
    check_bag_range(first, last, &hydra.ibag)?;

    let mut globals = InstrumentGlobals::default();
    let mut splits = Vec::new();

    for k in first..last {
        let gens = gen_slice(&hydra.igen, &hydra.ibag, k)?;

        let is_global = !gens.iter().any(|g| g.op() == Some(GeneratorOp::SampleId));

        if is_global {
            globals.absorb(gens);
        }
        else {
            let mut split = Split::default();
            globals.seed(&mut split);

            for gen in gens {
                apply_instrument_gen(&mut split, gen, samples)?;
            }

            splits.push(split);
        }
    }

    Ok(splits)
}

/// Builds the standalone instrument list. A terminator named `EOI` ends the table.
fn resolve_instruments(
    hydra: &CompleteHydra,
    samples: &[SampleInfo],
) -> Result<Vec<Instrument>> {
    let mut instruments = Vec::new();

    for j in 0..hydra.inst.len() - 1 {
        let header = &hydra.inst[j];

        if header.name == INSTRUMENT_TERMINATOR {
            break;
        }

        let splits = resolve_instrument_zones(hydra, samples, j)?;
        instruments.push(Instrument { name: header.name.clone(), splits });
    }

    Ok(instruments)
}

/// Preset-global generator state. Unlike the instrument globals, key and velocity ranges seen in
/// a global preset zone are recognized but deliberately not inherited by the layers that follow.
#[derive(Default)]
struct PresetGlobals {
    coarse_tune: Option<i16>,
    fine_tune: Option<i16>,
    scale_tuning: Option<i16>,
    initial_attenuation: Option<i16>,
    pan: Option<i16>,
}

impl PresetGlobals {
    fn absorb(&mut self, gens: &[GeneratorRecord]) {
        for gen in gens {
            match gen.op() {
                Some(GeneratorOp::CoarseTune) => self.coarse_tune = Some(gen.amount_i16()),
                Some(GeneratorOp::FineTune) => self.fine_tune = Some(gen.amount_i16()),
                Some(GeneratorOp::ScaleTuning) => self.scale_tuning = Some(gen.amount_i16()),
                Some(GeneratorOp::InitialAttenuation) => {
                    self.initial_attenuation = Some(gen.amount_i16())
                }
                Some(GeneratorOp::Pan) => self.pan = Some(gen.amount_i16()),
                Some(GeneratorOp::KeyRange) | Some(GeneratorOp::VelRange) => (),
                _ => (),
            }
        }
    }

    fn seed(&self, layer: &mut Layer) {
        if let Some(coarse) = self.coarse_tune {
            layer.coarse_tune = coarse as i8;
        }
        if let Some(fine) = self.fine_tune {
            layer.fine_tune = fine as i8;
        }
        if let Some(scale) = self.scale_tuning {
            layer.scale_tuning = scale;
        }
        if let Some(attenuation) = self.initial_attenuation {
            layer.initial_attenuation = attenuation;
        }
        if let Some(pan) = self.pan {
            layer.pan = pan;
        }
    }
}

/// Builds the preset list. A terminator named `EOP` ends the table. Every bag that carries an
/// `instrument` generator produces one layer; a bag without one is a preset-global zone.
fn resolve_presets(hydra: &CompleteHydra, instruments: &[Instrument]) -> Result<Vec<Preset>> {
    let mut presets = Vec::new();

    for j in 0..hydra.phdr.len() - 1 {
        let header = &hydra.phdr[j];

        if header.name == PRESET_TERMINATOR {
            break;
        }

        let first = header.bag_ndx as usize;
        let last = hydra.phdr[j + 1].bag_ndx as usize;
        check_bag_range(first, last, &hydra.pbag)?;

        let mut globals = PresetGlobals::default();
        let mut layers = Vec::new();

        for k in first..last {
            let gens = gen_slice(&hydra.pgen, &hydra.pbag, k)?;

            let is_global = !gens.iter().any(|g| g.op() == Some(GeneratorOp::Instrument));

            if is_global {
                globals.absorb(gens);
                continue;
            }

            let mut layer = Layer::default();
            globals.seed(&mut layer);

            for gen in gens {
                match gen.op() {
                    Some(GeneratorOp::Instrument) => {
                        let index = gen.amount_u16() as usize;

                        if index >= instruments.len() {
                            return format_error("layer references instrument out of range");
                        }

                        layer.instrument = index;
                    }
                    Some(GeneratorOp::KeyRange) => {
                        let (lo, hi) = gen.amount_range();
                        layer.key_range = MidiRange::new(lo, hi);
                    }
                    Some(GeneratorOp::VelRange) => {
                        let (lo, hi) = gen.amount_range();
                        layer.vel_range = MidiRange::new(lo, hi);
                    }
                    Some(GeneratorOp::CoarseTune) => layer.coarse_tune = gen.amount_i16() as i8,
                    Some(GeneratorOp::FineTune) => layer.fine_tune = gen.amount_i16() as i8,
                    Some(GeneratorOp::ScaleTuning) => layer.scale_tuning = gen.amount_i16(),
                    Some(GeneratorOp::InitialAttenuation) => {
                        layer.initial_attenuation = gen.amount_i16()
                    }
                    Some(GeneratorOp::Pan) => layer.pan = gen.amount_i16(),
                    // Everything else at the preset level is ignored.
                    _ => (),
                }
            }

            layers.push(layer);
        }

        presets.push(Preset {
            name: header.name.clone(),
            program: header.program,
            bank: header.bank,
            layers,
        });
    }

    Ok(presets)
}

#[cfg(test)]
mod tests {
    use crate::records::{
        Bag, GeneratorRecord, InstrumentHeader, PresetHeader, SampleHeader, SampleType,
    };

    use super::*;

    fn gen(oper: u16, amount: u16) -> GeneratorRecord {
        GeneratorRecord { oper, amount }
    }

    fn gen_i(oper: u16, amount: i16) -> GeneratorRecord {
        GeneratorRecord { oper, amount: amount as u16 }
    }

    fn range_amount(lo: u8, hi: u8) -> u16 {
        u16::from(lo) | (u16::from(hi) << 8)
    }

    fn sample_header(name: &str, end: u32) -> SampleHeader {
        SampleHeader {
            name: name.to_string(),
            start: 0,
            end,
            start_loop: 0,
            end_loop: end,
            sample_rate: 44100,
            original_key: 60,
            correction: 0,
            sample_link: 0,
            sample_type: SampleType::MONO,
        }
    }

    fn terminator_sample() -> SampleHeader {
        sample_header("EOS", 0)
    }

    /// A hydra with one preset ("Only") over one instrument ("Solo"), whose zones are given by
    /// the caller as generator lists.
    fn hydra_with_zones(
        preset_zones: Vec<Vec<GeneratorRecord>>,
        instrument_zones: Vec<Vec<GeneratorRecord>>,
        shdr: Vec<SampleHeader>,
    ) -> CompleteHydra {
        let mut pbag = Vec::new();
        let mut pgen = Vec::new();
        for zone in &preset_zones {
            pbag.push(Bag { gen_ndx: pgen.len() as u16, mod_ndx: 0 });
            pgen.extend_from_slice(zone);
        }
        pbag.push(Bag { gen_ndx: pgen.len() as u16, mod_ndx: 0 });
        pgen.push(gen(0, 0));

        let mut ibag = Vec::new();
        let mut igen = Vec::new();
        for zone in &instrument_zones {
            ibag.push(Bag { gen_ndx: igen.len() as u16, mod_ndx: 0 });
            igen.extend_from_slice(zone);
        }
        ibag.push(Bag { gen_ndx: igen.len() as u16, mod_ndx: 0 });
        igen.push(gen(0, 0));

        CompleteHydra {
            phdr: vec![
                PresetHeader {
                    name: "Only".to_string(),
                    program: 0,
                    bank: 0,
                    bag_ndx: 0,
                    library: 0,
                    genre: 0,
                    morphology: 0,
                },
                PresetHeader {
                    name: "EOP".to_string(),
                    program: 0,
                    bank: 0,
                    bag_ndx: preset_zones.len() as u16,
                    library: 0,
                    genre: 0,
                    morphology: 0,
                },
            ],
            pbag,
            pgen,
            inst: vec![
                InstrumentHeader { name: "Solo".to_string(), bag_ndx: 0 },
                InstrumentHeader {
                    name: "EOI".to_string(),
                    bag_ndx: instrument_zones.len() as u16,
                },
            ],
            ibag,
            igen,
            shdr,
        }
    }

    #[test]
    fn verify_basic_resolution() {
        let hydra = hydra_with_zones(
            vec![vec![gen(41, 0)]],
            vec![vec![
                gen(43, range_amount(60, 72)),
                gen(44, range_amount(10, 100)),
                gen(54, 1),
                gen(53, 0),
            ]],
            vec![sample_header("A", 64), terminator_sample()],
        );

        let font = resolve(hydra, vec![0; 64]).unwrap();

        assert_eq!(font.presets.len(), 1);
        assert_eq!(font.instruments.len(), 1);

        let split = &font.instruments[0].splits[0];
        assert_eq!(split.key_range, MidiRange::new(60, 72));
        assert_eq!(split.vel_range, MidiRange::new(10, 100));
        assert_eq!(split.sample_mode, SampleMode::Continuous);
        assert_eq!(split.sample, 0);
        assert_eq!(split.scale_tuning, 100);
        assert_eq!(split.root_key, None);
    }

    #[test]
    fn verify_instrument_global_zone_seeds_splits() {
        // The first zone has no sampleID, so its generators become defaults; the second zone
        // overrides fine tune only.
        let hydra = hydra_with_zones(
            vec![vec![gen(41, 0)]],
            vec![
                vec![gen_i(51, -2), gen_i(52, 30), gen_i(17, 250), gen(58, 61)],
                vec![gen_i(52, -45), gen(53, 0)],
            ],
            vec![sample_header("A", 64), terminator_sample()],
        );

        let font = resolve(hydra, vec![0; 64]).unwrap();

        let split = &font.instruments[0].splits[0];
        assert_eq!(split.coarse_tune, -2);
        assert_eq!(split.fine_tune, -45);
        assert_eq!(split.pan, 250);
        assert_eq!(split.root_key, Some(61));
    }

    #[test]
    fn verify_address_offsets_accumulate() {
        let hydra = hydra_with_zones(
            vec![vec![gen(41, 0)]],
            vec![vec![
                gen_i(0, 5),
                gen_i(4, 1),
                gen_i(1, -3),
                gen_i(2, 7),
                gen_i(3, -1),
                gen_i(45, 1),
                gen_i(50, -1),
                gen(53, 0),
            ]],
            vec![sample_header("A", 64), terminator_sample()],
        );

        let font = resolve(hydra, vec![0; 64]).unwrap();

        let split = &font.instruments[0].splits[0];
        assert_eq!(split.start_offset, 5 + 32768);
        assert_eq!(split.end_offset, -3);
        assert_eq!(split.start_loop_offset, 7 + 32768);
        assert_eq!(split.end_loop_offset, -1 - 32768);
    }

    #[test]
    fn verify_preset_global_zone_seeds_layers_without_ranges() {
        // Preset zone 0 has no instrument generator: its tuning becomes a layer default but its
        // key range must not be inherited.
        let hydra = hydra_with_zones(
            vec![
                vec![gen(43, range_amount(0, 10)), gen_i(51, 3), gen_i(48, 100)],
                vec![gen(44, range_amount(20, 40)), gen(41, 0)],
            ],
            vec![vec![gen(53, 0)]],
            vec![sample_header("A", 64), terminator_sample()],
        );

        let font = resolve(hydra, vec![0; 64]).unwrap();

        assert_eq!(font.presets[0].layers.len(), 1);

        let layer = &font.presets[0].layers[0];
        assert_eq!(layer.coarse_tune, 3);
        assert_eq!(layer.initial_attenuation, 100);
        assert_eq!(layer.vel_range, MidiRange::new(20, 40));
        // The global zone's key range is recognized but not inherited.
        assert_eq!(layer.key_range, MidiRange::default());
    }

    #[test]
    fn verify_rom_sample_aborts_resolution() {
        let mut rom = sample_header("RomKit", 64);
        rom.sample_type = SampleType::MONO | SampleType::ROM;

        let hydra = hydra_with_zones(
            vec![vec![gen(41, 0)]],
            vec![vec![gen(53, 0)]],
            vec![rom, terminator_sample()],
        );

        match resolve(hydra, vec![0; 64]) {
            Err(Error::RomSampleUnsupported(name)) => assert_eq!(name, "RomKit"),
            other => panic!("expected rom sample rejection, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn verify_presets_sort_by_bank_and_program() {
        let mut hydra = hydra_with_zones(
            vec![vec![gen(41, 0)]],
            vec![vec![gen(53, 0)]],
            vec![sample_header("A", 64), terminator_sample()],
        );

        // Rebuild the preset headers out of order: (0,1), (128,0), (0,0).
        let terminator_bag = hydra.phdr[1].bag_ndx;
        let mk = |name: &str, program: u16, bank: u16, bag_ndx: u16| PresetHeader {
            name: name.to_string(),
            program,
            bank,
            bag_ndx,
            library: 0,
            genre: 0,
            morphology: 0,
        };
        hydra.phdr = vec![
            mk("B", 1, 0, 0),
            mk("Drums", 0, 128, terminator_bag),
            mk("A", 0, 0, terminator_bag),
            mk("EOP", 0, 0, terminator_bag),
        ];

        let font = resolve(hydra, vec![0; 64]).unwrap();

        let order: Vec<(u16, u16)> =
            font.presets.iter().map(|p| (p.bank, p.program)).collect();
        assert_eq!(order, vec![(0, 0), (0, 1), (128, 0)]);
        assert_eq!(font.find_preset(1, 0), Some(1));
    }

    #[test]
    fn verify_sample_windows_are_clamped_to_pool() {
        let mut shdr = sample_header("Runaway", 64);
        shdr.end = 500;
        shdr.end_loop = 400;

        let hydra = hydra_with_zones(
            vec![vec![gen(41, 0)]],
            vec![vec![gen(53, 0)]],
            vec![shdr, terminator_sample()],
        );

        let font = resolve(hydra, vec![0; 64]).unwrap();

        let sample = &font.samples[0];
        assert_eq!(sample.end, 64);
        assert!(sample.end_loop <= sample.end);
        assert!(sample.start_loop <= sample.end_loop);
    }
}
