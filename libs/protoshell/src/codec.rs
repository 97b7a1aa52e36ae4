// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Length-delimited protobuf framing.
//!
//! A frame is a base-128 varint byte count followed by exactly that many
//! bytes of encoded message, the same layout protobuf runtimes produce with
//! `writeDelimitedTo` / `parseDelimitedFrom`. Neither side buffers more than
//! one message.

use std::io::{ErrorKind, Read, Write};

use prost::Message;

use crate::error::{Result, ShellError};

/// Upper bound on a single frame. Anything larger is treated as a corrupt
/// length prefix rather than allocated.
pub const MAX_FRAME_LEN: u64 = 64 * 1024 * 1024;

/// Longest legal varint encoding of a `u64`.
const MAX_VARINT_LEN: usize = 10;

/// Writes one frame per call. Not synchronized: a stream must have exactly
/// one `FrameWriter` owner.
pub struct FrameWriter<W: Write> {
    inner: W,
    buf: Vec<u8>,
}

impl<W: Write> FrameWriter<W> {
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            buf: Vec::new(),
        }
    }

    /// Encode `message`, write prefix and body, and flush.
    pub fn write_frame<M: Message>(&mut self, message: &M) -> Result<()> {
        self.buf.clear();
        message.encode_length_delimited(&mut self.buf)?;
        self.inner.write_all(&self.buf)?;
        self.inner.flush()?;
        Ok(())
    }

    pub fn get_ref(&self) -> &W {
        &self.inner
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

/// Reads one frame per call.
pub struct FrameReader<R: Read> {
    inner: R,
    buf: Vec<u8>,
}

impl<R: Read> FrameReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            buf: Vec::new(),
        }
    }

    /// Block until a whole frame has arrived and decode it as `M`.
    ///
    /// Returns [`ShellError::StreamClosed`] when the stream ends cleanly
    /// before a new frame starts. End of stream inside a frame is an
    /// `UnexpectedEof` I/O error.
    pub fn read_frame<M: Message + Default>(&mut self) -> Result<M> {
        let len = match self.read_length_prefix()? {
            Some(len) => len,
            None => return Err(ShellError::StreamClosed),
        };
        if len > MAX_FRAME_LEN {
            return Err(ShellError::FrameTooLarge {
                len,
                max: MAX_FRAME_LEN,
            });
        }

        self.buf.clear();
        self.buf.resize(len as usize, 0);
        self.inner.read_exact(&mut self.buf)?;
        Ok(M::decode(self.buf.as_slice())?)
    }

    /// `Ok(None)` only when EOF is hit before the first prefix byte.
    fn read_length_prefix(&mut self) -> Result<Option<u64>> {
        let mut value: u64 = 0;
        for i in 0..MAX_VARINT_LEN {
            let byte = match self.read_byte()? {
                Some(byte) => byte,
                None if i == 0 => return Ok(None),
                None => {
                    return Err(std::io::Error::new(
                        ErrorKind::UnexpectedEof,
                        "stream ended inside a frame length prefix",
                    )
                    .into());
                }
            };
            value |= u64::from(byte & 0x7f) << (7 * i);
            if byte & 0x80 == 0 {
                return Ok(Some(value));
            }
        }
        Err(ShellError::Protocol(
            "frame length prefix is longer than 10 bytes".to_string(),
        ))
    }

    fn read_byte(&mut self) -> Result<Option<u8>> {
        let mut byte = [0u8; 1];
        loop {
            match self.inner.read(&mut byte) {
                Ok(0) => return Ok(None),
                Ok(_) => return Ok(Some(byte[0])),
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
    }
}
