// Aulos
// Copyright (c) 2026 The Project Aulos Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Aulos is a SoundFont 2 playback engine for audio-synthesis hosts.
//!
//! The `aulos-core` crate provides the shared structs, traits, and features used across all
//! Project Aulos crates: the common error type, byte-level I/O over files and in-memory
//! buffers, and the tuning/unit conversions of the MIDI and SoundFont domains.

#![warn(rust_2018_idioms)]
#![forbid(unsafe_code)]

pub mod errors;
pub mod io;
pub mod units;
