// Aulos
// Copyright (c) 2026 The Project Aulos Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `errors` module defines the common error type.

use std::error;
use std::fmt;
use std::io;
use std::result;

/// `Error` provides an enumeration of all possible errors reported by Aulos.
#[derive(Debug)]
pub enum Error {
    /// An IO error occurred while reading or seeking the stream.
    IoError(io::Error),
    /// The font file could not be located on the configured search path.
    FileNotFound(String),
    /// The stream does not contain a well-formed RIFF/sfbk payload.
    FormatIncompatible(&'static str),
    /// A resolved split references a sample with the ROM type bit set. Only RAM samples are
    /// playable.
    RomSampleUnsupported(String),
    /// No preset with the requested program and bank numbers exists in the font.
    PresetNotFound { program: u16, bank: u16 },
    /// A font, preset, or start handle exceeds its table's fixed capacity.
    HandleOutOfRange(&'static str),
    /// A voice was requested against a preset handle that was never assigned.
    InvalidPresetHandle(usize),
    /// An instrument index exceeds the font's instrument count.
    InstrumentOutOfRange { index: usize, count: usize },
    /// A note matched more splits than a voice can hold.
    TooManyZones(usize),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Error::IoError(ref err) => {
                write!(f, "io error: {}", err)
            }
            Error::FileNotFound(ref name) => {
                write!(f, "cannot find font file: {}", name)
            }
            Error::FormatIncompatible(msg) => {
                write!(f, "font format not compatible: {}", msg)
            }
            Error::RomSampleUnsupported(ref name) => {
                write!(f, "font contains rom sample: {}", name)
            }
            Error::PresetNotFound { program, bank } => {
                write!(f, "no preset with program {} and bank {}", program, bank)
            }
            Error::HandleOutOfRange(what) => {
                write!(f, "handle out of range: {}", what)
            }
            Error::InvalidPresetHandle(handle) => {
                write!(f, "preset handle {} was never assigned", handle)
            }
            Error::InstrumentOutOfRange { index, count } => {
                write!(f, "instrument {} out of range (font holds {})", index, count)
            }
            Error::TooManyZones(limit) => {
                write!(f, "note matches more than {} zones", limit)
            }
        }
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match *self {
            Error::IoError(ref err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Error {
        Error::IoError(err)
    }
}

pub type Result<T> = result::Result<T, Error>;

/// Convenience function to create a format-incompatible error.
pub fn format_error<T>(msg: &'static str) -> Result<T> {
    Err(Error::FormatIncompatible(msg))
}

/// Convenience function to create a handle-out-of-range error.
pub fn handle_error<T>(what: &'static str) -> Result<T> {
    Err(Error::HandleOutOfRange(what))
}

/// Convenience function to create an end-of-stream error.
pub fn end_of_stream_error<T>() -> Result<T> {
    Err(Error::IoError(io::Error::new(io::ErrorKind::UnexpectedEof, "end of stream")))
}
