// Aulos
// Copyright (c) 2026 The Project Aulos Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `engine` module provides the per-host engine context: the font registry, the preset
//! handle table, and the init-time operations of the opcode surface.

use std::env;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use aulos_core::errors::{handle_error, Error, Result};
use aulos_core::io::MediaSourceStream;
use aulos_format_sf2::{read_font, SoundFont};

use log::info;

use crate::voice::{self, NoteEvent, Voice};

/// The fixed capacity of the font registry.
pub const MAX_FONTS: usize = 10;

/// The fixed capacity of the preset handle table.
pub const MAX_PRESET_HANDLES: usize = 512;

/// A small integer handle naming a loaded font. The first loaded font is handle 0.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FontHandle(pub usize);

/// A small integer handle naming an assigned preset.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PresetHandle(pub usize);

/// `EngineOptions` carries the host audio parameters and the font search path.
pub struct EngineOptions {
    /// The host output sample rate in Hz.
    pub sample_rate: u32,
    /// Directories searched, in order, when a font name is not a path to an existing file.
    pub search_paths: Vec<PathBuf>,
}

impl EngineOptions {
    /// Appends the directories named by the `SFDIR` and `SSDIR` environment variables
    /// (semicolon-separated) to the search path, matching the host's `"SFDIR;SSDIR"`
    /// convention.
    pub fn with_env_search_paths(mut self) -> Self {
        for var in ["SFDIR", "SSDIR"] {
            if let Ok(value) = env::var(var) {
                self.search_paths.extend(
                    value.split(';').filter(|dir| !dir.is_empty()).map(PathBuf::from),
                );
            }
        }
        self
    }
}

impl Default for EngineOptions {
    fn default() -> Self {
        EngineOptions { sample_rate: 44100, search_paths: Vec::new() }
    }
}

struct LoadedFont {
    name: String,
    data: Arc<SoundFont>,
}

#[derive(Clone, Copy)]
struct PresetSlot {
    font: usize,
    preset: usize,
}

/// The engine context.
///
/// All registry and handle state lives here rather than in process-wide tables, so several
/// engines can coexist in one host.
pub struct Engine {
    opts: EngineOptions,
    fonts: Vec<LoadedFont>,
    presets: Vec<Option<PresetSlot>>,
}

impl Engine {
    pub fn new(opts: EngineOptions) -> Engine {
        Engine { opts, fonts: Vec::new(), presets: vec![None; MAX_PRESET_HANDLES] }
    }

    /// Implements `sfload`: locates the font file, reads and resolves it, and appends it to
    /// the registry. Returns the new font's handle.
    pub fn load(&mut self, name: &str) -> Result<FontHandle> {
        let path = self.find_font_file(name)?;

        let file = File::open(&path)?;
        let source = MediaSourceStream::new(Box::new(file), Default::default());

        self.load_from(&path.to_string_lossy(), source)
    }

    /// Reads and resolves a font from an already-open source. This is the back half of
    /// [`Engine::load`], split out for hosts with their own I/O.
    pub fn load_from(&mut self, name: &str, mut source: MediaSourceStream) -> Result<FontHandle> {
        if self.fonts.len() >= MAX_FONTS {
            return handle_error("font registry is full");
        }

        info!("loading soundfont \"{}\"", name);

        let font = read_font(&mut source)?;

        info!(
            "loaded {} presets, {} instruments, {} samples",
            font.presets.len(),
            font.instruments.len(),
            font.samples.len()
        );

        let handle = FontHandle(self.fonts.len());
        self.fonts.push(LoadedFont { name: name.to_string(), data: Arc::new(font) });

        Ok(handle)
    }

    /// Implements `sfpreset`: binds the preset with the given program and bank numbers to a
    /// preset handle. The handle is chosen by the caller and echoed back on success.
    pub fn assign_preset(
        &mut self,
        program: u16,
        bank: u16,
        font: FontHandle,
        handle: PresetHandle,
    ) -> Result<PresetHandle> {
        if handle.0 >= MAX_PRESET_HANDLES {
            return handle_error("preset handle too big");
        }

        let loaded = self.font(font)?;

        let Some(preset) = loaded.data.find_preset(program, bank) else {
            return Err(Error::PresetNotFound { program, bank });
        };

        self.presets[handle.0] = Some(PresetSlot { font: font.0, preset });

        Ok(handle)
    }

    /// Implements `sfpassign`: assigns every preset of the font, in sorted order, to
    /// consecutive handles starting at `start`.
    pub fn assign_all_presets(&mut self, start: PresetHandle, font: FontHandle) -> Result<()> {
        let loaded = self.font(font)?;
        let count = loaded.data.presets.len();
        let name = loaded.name.clone();

        if start.0 >= MAX_PRESET_HANDLES || count > MAX_PRESET_HANDLES - start.0 {
            return handle_error("assigning all presets would overflow the handle table");
        }

        info!("assigning all presets of \"{}\" starting from handle {}", name, start.0);

        for j in 0..count {
            let loaded = &self.fonts[font.0];
            let preset = &loaded.data.presets[j];

            info!(
                "{:3}<--{:<20}\t(prog:{:<3} bank:{})",
                start.0 + j,
                preset.name,
                preset.program,
                preset.bank
            );

            self.presets[start.0 + j] = Some(PresetSlot { font: font.0, preset: j });
        }

        if count > 0 {
            info!(
                "all presets have been assigned to preset handles from {} to {}",
                start.0,
                start.0 + count - 1
            );
        }

        Ok(())
    }

    /// Implements `sfplist`: writes the font's preset list to the logging channel.
    pub fn log_preset_list(&self, font: FontHandle) -> Result<()> {
        let loaded = self.font(font)?;

        info!("preset list of \"{}\"", loaded.name);
        for (j, preset) in loaded.data.presets.iter().enumerate() {
            info!(
                "{:3}) {:<20}\tprog:{:<3} bank:{}",
                j,
                filter_name(&preset.name),
                preset.program,
                preset.bank
            );
        }

        Ok(())
    }

    /// Implements `sfilist`: writes the font's instrument list to the logging channel.
    pub fn log_instrument_list(&self, font: FontHandle) -> Result<()> {
        let loaded = self.font(font)?;

        info!("instrument list of \"{}\"", loaded.name);
        for (j, instrument) in loaded.data.instruments.iter().enumerate() {
            info!("{:3}) {:<20}", j, instrument.name);
        }

        Ok(())
    }

    /// Builds a voice for a note triggered against an assigned preset handle (the init half of
    /// `sfplay` and its variants).
    pub fn preset_voice(&self, handle: PresetHandle, event: &NoteEvent) -> Result<Voice> {
        if handle.0 >= MAX_PRESET_HANDLES {
            return handle_error("preset handle too big");
        }

        let Some(slot) = self.presets[handle.0] else {
            return Err(Error::InvalidPresetHandle(handle.0));
        };

        let loaded = &self.fonts[slot.font];

        voice::preset_voice(loaded.data.clone(), slot.preset, event, self.opts.sample_rate)
    }

    /// Builds a voice for a note triggered directly against an instrument of a font (the init
    /// half of `sfinstr` and its variants).
    pub fn instrument_voice(
        &self,
        font: FontHandle,
        instrument: usize,
        event: &NoteEvent,
    ) -> Result<Voice> {
        let loaded = self.font(font)?;
        let count = loaded.data.instruments.len();

        if instrument >= count {
            return Err(Error::InstrumentOutOfRange { index: instrument, count });
        }

        voice::instrument_voice(loaded.data.clone(), instrument, event, self.opts.sample_rate)
    }

    fn font(&self, handle: FontHandle) -> Result<&LoadedFont> {
        match self.fonts.get(handle.0) {
            Some(loaded) => Ok(loaded),
            None => handle_error("font handle"),
        }
    }

    fn find_font_file(&self, name: &str) -> Result<PathBuf> {
        let direct = Path::new(name);
        if direct.is_file() {
            return Ok(direct.to_path_buf());
        }

        for dir in &self.opts.search_paths {
            let candidate = dir.join(name);
            if candidate.is_file() {
                return Ok(candidate);
            }
        }

        Err(Error::FileNotFound(name.to_string()))
    }
}

/// Sanitises a preset name for the `sfplist` listing: printable ASCII passes through, control
/// characters become caret escapes, anything else becomes `?`. Output is capped at 22
/// characters. The other diagnostics log names raw.
fn filter_name(name: &str) -> String {
    let mut out = String::new();

    for ch in name.chars() {
        if out.len() >= 22 {
            break;
        }

        if ch.is_ascii_graphic() || ch == ' ' {
            out.push(ch);
        }
        else if (ch as u32) < 32 {
            out.push('^');
            out.push(char::from(b'@' + ch as u8));
        }
        else {
            out.push('?');
        }
    }

    out
}
