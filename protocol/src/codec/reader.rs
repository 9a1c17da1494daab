//! Cursor-based decoder, the inverse of [`Writer`](super::Writer).

use super::CodecError;

/// Reads LEB128 integers and length-prefixed byte strings from a slice.
#[derive(Debug, Clone)]
pub struct Reader<'a> {
    buf: &'a [u8],
    cursor: usize,
    bookmarks: Vec<usize>,
}

impl<'a> Reader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self {
            buf,
            cursor: 0,
            bookmarks: Vec::new(),
        }
    }

    /// Current offset into the buffer.
    pub fn position(&self) -> usize {
        self.cursor
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.cursor
    }

    pub fn is_exhausted(&self) -> bool {
        self.remaining() == 0
    }

    /// Remember the current position so a later [`restore`](Self::restore)
    /// can rewind to it.
    pub fn bookmark(&mut self) {
        self.bookmarks.push(self.cursor);
    }

    /// Rewind to the most recent bookmark. A restore without a matching
    /// bookmark is a no-op.
    pub fn restore(&mut self) {
        if let Some(position) = self.bookmarks.pop() {
            self.cursor = position;
        }
    }

    fn ensure(&self, len: usize) -> Result<(), CodecError> {
        if len > self.remaining() {
            return Err(CodecError::OutOfBounds {
                offset: self.cursor,
                requested: len,
                available: self.remaining(),
            });
        }
        Ok(())
    }

    /// Borrow the next `len` bytes and advance past them.
    pub fn read(&mut self, len: usize) -> Result<&'a [u8], CodecError> {
        self.ensure(len)?;
        let bytes = &self.buf[self.cursor..self.cursor + len];
        self.cursor += len;
        Ok(bytes)
    }

    /// Advance past `len` bytes.
    pub fn skip(&mut self, len: usize) -> Result<(), CodecError> {
        self.ensure(len)?;
        self.cursor += len;
        Ok(())
    }

    pub fn read_uint8(&mut self) -> Result<u8, CodecError> {
        Ok(self.read(1)?[0])
    }

    /// Decode one unsigned LEB128 integer.
    ///
    /// A multi-byte encoding whose last byte is zero carries redundant
    /// high-order groups and is rejected as overlong.
    pub fn read_var_uint(&mut self) -> Result<u64, CodecError> {
        let start = self.cursor;
        let mut value: u64 = 0;
        let mut shift = 0u32;
        loop {
            let byte = self.read_uint8()?;
            let low = u64::from(byte & 0x7f);
            if (shift == 63 && low > 1) || shift > 63 {
                return Err(CodecError::VarUintOverflow(start));
            }
            value |= low << shift;
            if byte & 0x80 == 0 {
                if byte == 0 && shift > 0 {
                    return Err(CodecError::Overlong(start));
                }
                return Ok(value);
            }
            shift += 7;
        }
    }

    /// Decode a var_uint that must fit in `usize`.
    pub fn read_length(&mut self) -> Result<usize, CodecError> {
        let start = self.cursor;
        let value = self.read_var_uint()?;
        usize::try_from(value).map_err(|_| CodecError::VarUintOverflow(start))
    }

    /// Decode a length-prefixed byte string.
    pub fn read_var_bytes(&mut self) -> Result<&'a [u8], CodecError> {
        let len = self.read_length()?;
        self.read(len)
    }

    /// Decode a var_uint without consuming it.
    pub fn peek_var_uint(&mut self) -> Result<u64, CodecError> {
        self.bookmark();
        let value = self.read_var_uint();
        self.restore();
        value
    }
}
