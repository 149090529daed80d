//! Bounds-checked read cursor over a request buffer.
//!
//! Every read either succeeds and advances the position, or fails and
//! leaves the cursor where it was. Nothing is allocated on failure.

use std::ffi::OsString;
use std::os::unix::ffi::OsStringExt;

/// Read position into an immutable byte buffer.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Cursor<'a> {
    /// The whole message.
    buf: &'a [u8],
    /// Offset of the next unread byte.
    pos: usize,
}

impl<'a> Cursor<'a> {
    /// Creates a cursor positioned at `pos`.
    pub(crate) const fn new(buf: &'a [u8], pos: usize) -> Self {
        Self { buf, pos }
    }

    /// Offset of the next unread byte.
    pub(crate) const fn position(&self) -> usize {
        self.pos
    }

    /// Number of unread bytes.
    pub(crate) const fn remaining(&self) -> usize {
        self.buf.len().saturating_sub(self.pos)
    }

    /// Returns `true` once every byte has been consumed.
    pub(crate) const fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    /// Takes the next `n` bytes.
    fn take(&mut self, n: usize) -> Option<&'a [u8]> {
        if self.remaining() < n {
            return None;
        }
        let bytes = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Some(bytes)
    }

    /// Reads one byte.
    pub(crate) fn read_u8(&mut self) -> Option<u8> {
        self.take(1).map(|b| b[0])
    }

    /// Reads a big-endian `u16`.
    pub(crate) fn read_u16(&mut self) -> Option<u16> {
        self.take(2).map(|b| u16::from_be_bytes([b[0], b[1]]))
    }

    /// Reads a length-prefixed string: a big-endian `u16` length followed
    /// by that many bytes.
    ///
    /// A declared length of zero or a length running past the buffer yields
    /// `None` without moving the cursor. Otherwise exactly that many bytes
    /// are copied, NUL included.
    pub(crate) fn read_string(&mut self) -> Option<OsString> {
        let mut probe = *self;
        let len = usize::from(probe.read_u16()?);
        if len == 0 {
            return None;
        }
        let bytes = probe.take(len)?;
        *self = probe;
        Some(OsString::from_vec(bytes.to_vec()))
    }
}
