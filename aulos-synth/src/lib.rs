// Aulos
// Copyright (c) 2026 The Project Aulos Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The SoundFont 2 voice engine of Project Aulos.
//!
//! [`Engine`] is the per-host context: it owns the font registry and the preset handle table,
//! and exposes the init-time operations of the opcode surface (`sfload`, `sfpreset`,
//! `sfpassign`, and the diagnostic listings). Triggering a note builds a [`Voice`], which is
//! then rendered block by block with a linear or cubic interpolator into caller-supplied
//! output buffers.
//!
//! The engine is single-threaded and cooperative: all allocation and file I/O happens at init
//! time, and the render path neither blocks, allocates, nor takes locks.

#![warn(rust_2018_idioms)]
#![forbid(unsafe_code)]

pub mod engine;
pub mod opcodes;
pub mod render;
pub mod voice;

pub use engine::{Engine, EngineOptions, FontHandle, PresetHandle};
pub use render::{Control, Cubic, Interpolate, Linear};
pub use voice::{NoteEvent, Voice};
