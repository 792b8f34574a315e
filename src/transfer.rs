//! Chunked transfers for bulk peeks.
//!
//! libvirt caps a single block or memory peek at 64 KiB, so larger reads are
//! split into consecutive chunks written straight into the caller's buffer.

use crate::error::{Error, Result};

/// Largest number of bytes libvirt returns from one peek call.
pub const MAX_PEEK_CHUNK: usize = 65536;

/// Write position inside a caller-supplied buffer.
#[derive(Debug)]
pub struct BufferCursor<'a> {
    buf: &'a mut [u8],
    position: usize,
    limit: usize,
}

impl<'a> BufferCursor<'a> {
    /// Cursor over the whole buffer.
    pub fn new(buf: &'a mut [u8]) -> Self {
        let limit = buf.len();
        Self {
            buf,
            position: 0,
            limit,
        }
    }

    /// Cursor that stops at `limit` bytes, clamped to the buffer length.
    pub fn with_limit(buf: &'a mut [u8], limit: usize) -> Self {
        let limit = limit.min(buf.len());
        Self {
            buf,
            position: 0,
            limit,
        }
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn remaining(&self) -> usize {
        self.limit - self.position
    }

    pub fn is_full(&self) -> bool {
        self.position == self.limit
    }

    fn window(&mut self, len: usize) -> &mut [u8] {
        &mut self.buf[self.position..self.position + len]
    }

    fn advance(&mut self, len: usize) {
        self.position += len;
    }
}

/// Fill `cursor` by repeated calls to `chunk`, at most `max_chunk` bytes each.
///
/// `chunk` receives the number of bytes already transferred and a window of
/// exactly the requested size. The first error aborts the transfer; bytes
/// already written stay in the buffer.
pub fn transfer<F>(cursor: &mut BufferCursor<'_>, max_chunk: usize, mut chunk: F) -> Result<()>
where
    F: FnMut(usize, &mut [u8]) -> Result<()>,
{
    if max_chunk == 0 {
        return Err(Error::InvalidArgument("chunk size must be non-zero".to_string()));
    }

    while !cursor.is_full() {
        let len = cursor.remaining().min(max_chunk);
        let done = cursor.position();
        chunk(done, cursor.window(len))?;
        cursor.advance(len);
    }
    Ok(())
}

/// Chunk size for a connection, capped at what libvirt accepts.
pub(crate) fn effective_chunk(requested: usize) -> usize {
    requested.min(MAX_PEEK_CHUNK)
}
