//! Fixed-capacity byte buffer shared by header transmission and body streaming.

use std::fmt;

/// Capacity of every connection buffer.
pub const BUFFER_SIZE: usize = 8192;

/// Returned when an append would not fit into the remaining capacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Overflow;

/// A bounded byte buffer.
///
/// The backing storage is allocated once when the owning connection slot is
/// created. `len() <= capacity()` holds at all times, and appends are
/// all-or-nothing: a failed append leaves the previous contents untouched.
pub struct Buffer {
    data: Box<[u8; BUFFER_SIZE]>,
    len: usize,
}

impl Buffer {
    pub fn new() -> Self {
        Self {
            data: Box::new([0u8; BUFFER_SIZE]),
            len: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_full(&self) -> bool {
        self.len == BUFFER_SIZE
    }

    pub fn capacity(&self) -> usize {
        BUFFER_SIZE
    }

    pub fn remaining(&self) -> usize {
        BUFFER_SIZE - self.len
    }

    pub fn clear(&mut self) {
        self.len = 0;
    }

    /// The filled part of the buffer.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data[..self.len]
    }

    /// The unfilled tail, for reading directly into the buffer.
    /// Call [`Buffer::advance`] with the number of bytes written.
    pub fn spare_mut(&mut self) -> &mut [u8] {
        &mut self.data[self.len..]
    }

    pub fn advance(&mut self, n: usize) {
        debug_assert!(self.len + n <= BUFFER_SIZE);
        self.len = (self.len + n).min(BUFFER_SIZE);
    }

    /// Drops the last `n` bytes.
    pub fn truncate_tail(&mut self, n: usize) {
        self.len = self.len.saturating_sub(n);
    }

    /// Discards the first `n` bytes and moves the leftover to offset 0.
    pub fn consume(&mut self, n: usize) {
        let n = n.min(self.len);
        self.data.copy_within(n..self.len, 0);
        self.len -= n;
    }

    pub fn ends_with(&self, suffix: &[u8]) -> bool {
        self.as_bytes().ends_with(suffix)
    }

    pub fn append(&mut self, bytes: &[u8]) -> Result<(), Overflow> {
        if bytes.len() > self.remaining() {
            return Err(Overflow);
        }
        self.data[self.len..self.len + bytes.len()].copy_from_slice(bytes);
        self.len += bytes.len();
        Ok(())
    }

    /// Appends formatted text, e.g. `buf.append_fmt(format_args!("{}", x))`.
    ///
    /// Nothing is kept if the complete output does not fit.
    pub fn append_fmt(&mut self, args: fmt::Arguments<'_>) -> Result<(), Overflow> {
        let start = self.len;
        let mut writer = BufferWriter { buf: self };
        if fmt::Write::write_fmt(&mut writer, args).is_err() {
            self.len = start;
            return Err(Overflow);
        }
        Ok(())
    }
}

impl Default for Buffer {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Buffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Buffer")
            .field("len", &self.len)
            .field("capacity", &BUFFER_SIZE)
            .finish()
    }
}

struct BufferWriter<'a> {
    buf: &'a mut Buffer,
}

impl fmt::Write for BufferWriter<'_> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.buf.append(s.as_bytes()).map_err(|_| fmt::Error)
    }
}
