// Aulos
// Copyright (c) 2026 The Project Aulos Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::cmp;
use std::io::{Read, Seek, SeekFrom};

use crate::errors::{end_of_stream_error, Result};

use super::{MediaSource, ReadBytes};

/// `MediaSourceStreamOptions` specifies the buffering behaviour of a `MediaSourceStream`.
pub struct MediaSourceStreamOptions {
    /// The read-ahead buffer size in bytes.
    pub buffer_len: usize,
}

impl Default for MediaSourceStreamOptions {
    fn default() -> Self {
        MediaSourceStreamOptions { buffer_len: 32 * 1024 }
    }
}

/// A `MediaSourceStream` is the common reader type for Aulos. By using type erasure and dynamic
/// dispatch, `MediaSourceStream` wraps and hides the inner reader from the consumer, allowing any
/// typical source to be used in a generic way, selectable at runtime.
///
/// To minimize system call and dynamic dispatch overhead on the inner reader, and to amortize
/// that overhead over many bytes, `MediaSourceStream` implements a read-ahead buffer that is
/// replenished in blocks whenever it is exhausted.
pub struct MediaSourceStream {
    /// The source reader.
    inner: Box<dyn MediaSource>,
    /// The read-ahead buffer.
    buf: Box<[u8]>,
    /// The read position within the buffer.
    read_pos: usize,
    /// The end of the valid (fetched) region of the buffer.
    end_pos: usize,
    /// Absolute position of the next byte to be read.
    pos: u64,
}

impl MediaSourceStream {
    pub fn new(source: Box<dyn MediaSource>, options: MediaSourceStreamOptions) -> Self {
        assert!(options.buffer_len > 0);

        MediaSourceStream {
            inner: source,
            buf: vec![0; options.buffer_len].into_boxed_slice(),
            read_pos: 0,
            end_pos: 0,
            pos: 0,
        }
    }

    /// Returns if the underlying source is seekable.
    pub fn is_seekable(&self) -> bool {
        self.inner.is_seekable()
    }

    /// Returns the length in bytes of the underlying source, if available.
    pub fn byte_len(&self) -> Option<u64> {
        self.inner.byte_len()
    }

    /// Seeks the underlying source to an absolute position and invalidates the read-ahead
    /// buffer.
    pub fn seek(&mut self, pos: u64) -> Result<u64> {
        let new_pos = self.inner.seek(SeekFrom::Start(pos))?;
        self.read_pos = 0;
        self.end_pos = 0;
        self.pos = new_pos;
        Ok(new_pos)
    }

    #[inline(always)]
    fn is_buffer_exhausted(&self) -> bool {
        self.read_pos == self.end_pos
    }

    /// If the buffer has been exhausted, fetch a new block of data to replenish it.
    fn fetch(&mut self) -> Result<()> {
        if self.is_buffer_exhausted() {
            let len = self.inner.read(&mut self.buf)?;
            self.read_pos = 0;
            self.end_pos = len;
        }
        Ok(())
    }

    /// If the buffer has been exhausted, fetch a new block of data to replenish it. If no more
    /// data could be fetched, return an end-of-stream error.
    fn fetch_or_eof(&mut self) -> Result<()> {
        self.fetch()?;

        if self.is_buffer_exhausted() {
            return end_of_stream_error();
        }

        Ok(())
    }

    #[inline(always)]
    fn consume(&mut self, len: usize) {
        self.read_pos += len;
        self.pos += len as u64;
    }
}

impl ReadBytes for MediaSourceStream {
    #[inline(always)]
    fn read_byte(&mut self) -> Result<u8> {
        self.fetch_or_eof()?;

        let byte = self.buf[self.read_pos];
        self.consume(1);

        Ok(byte)
    }

    fn read_double_bytes(&mut self) -> Result<[u8; 2]> {
        let mut bytes = [0u8; 2];
        self.read_buf_exact(&mut bytes)?;
        Ok(bytes)
    }

    fn read_quad_bytes(&mut self) -> Result<[u8; 4]> {
        let mut bytes = [0u8; 4];
        self.read_buf_exact(&mut bytes)?;
        Ok(bytes)
    }

    fn read_buf_exact(&mut self, buf: &mut [u8]) -> Result<()> {
        let mut written = 0;

        while written < buf.len() {
            self.fetch_or_eof()?;

            let available = self.end_pos - self.read_pos;
            let len = cmp::min(available, buf.len() - written);

            buf[written..written + len]
                .copy_from_slice(&self.buf[self.read_pos..self.read_pos + len]);

            self.consume(len);
            written += len;
        }

        Ok(())
    }

    fn ignore_bytes(&mut self, mut count: u64) -> Result<()> {
        // Consume from the read-ahead buffer first.
        let buffered = cmp::min((self.end_pos - self.read_pos) as u64, count);
        self.consume(buffered as usize);
        count -= buffered;

        if count == 0 {
            return Ok(());
        }

        // A seekable source can skip the remainder in one hop, otherwise read and discard.
        if self.inner.is_seekable() {
            self.seek(self.pos + count)?;
        }
        else {
            while count > 0 {
                self.fetch_or_eof()?;

                let len = cmp::min((self.end_pos - self.read_pos) as u64, count);
                self.consume(len as usize);
                count -= len;
            }
        }

        Ok(())
    }

    #[inline(always)]
    fn pos(&self) -> u64 {
        self.pos
    }
}
