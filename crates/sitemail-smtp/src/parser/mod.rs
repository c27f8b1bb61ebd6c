//! SMTP reply parser.
//!
//! Replies arrive as CRLF-terminated lines, possibly split across any number
//! of socket reads. [`ReplyBuffer`] accumulates raw bytes, hands out complete
//! lines, and keeps the trailing partial fragment for the next read:
//!
//! - Single: `250 OK\r\n`
//! - Multi: `250-First line\r\n250-Second line\r\n250 Last line\r\n`
//!
//! A reply is complete only at a line whose fourth character is not `-`.

use bytes::{Buf, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::error::{Error, Result};
use crate::types::Reply;

/// Longest line accepted before the peer is considered misbehaving.
pub const MAX_LINE_LENGTH: usize = 64 * 1024;

const READ_CHUNK: usize = 4096;

/// Accumulates reply bytes and splits them into lines.
#[derive(Debug, Default)]
pub struct ReplyBuffer {
    buf: BytesMut,
}

impl ReplyBuffer {
    /// Creates an empty buffer.
    #[must_use]
    pub fn new() -> Self {
        Self {
            buf: BytesMut::with_capacity(READ_CHUNK),
        }
    }

    /// Appends raw bytes received from the server.
    pub fn extend(&mut self, chunk: &[u8]) {
        self.buf.extend_from_slice(chunk);
    }

    /// Returns true if no unconsumed bytes are buffered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Pops the next complete, non-empty line.
    ///
    /// Returns `Ok(None)` when only a partial fragment (or nothing) remains.
    ///
    /// # Errors
    ///
    /// Returns [`Error::LineTooLong`] if the pending fragment exceeds
    /// [`MAX_LINE_LENGTH`].
    pub fn next_line(&mut self) -> Result<Option<Reply>> {
        while let Some(pos) = find_crlf(&self.buf) {
            let line = self.buf.split_to(pos);
            self.buf.advance(2);
            if line.is_empty() {
                continue;
            }
            return Ok(Some(Reply::parse(String::from_utf8_lossy(&line))));
        }

        if self.buf.len() > MAX_LINE_LENGTH {
            return Err(Error::LineTooLong(MAX_LINE_LENGTH));
        }
        Ok(None)
    }

    /// Pops lines until the final line of a reply is found.
    ///
    /// Continuation lines are consumed and dropped; only the closing line is
    /// returned. Returns `Ok(None)` if the reply is not complete yet.
    ///
    /// # Errors
    ///
    /// Returns [`Error::LineTooLong`] on an oversized line.
    pub fn next_reply(&mut self) -> Result<Option<Reply>> {
        while let Some(line) = self.next_line()? {
            if line.is_last() {
                return Ok(Some(line));
            }
            tracing::trace!(line = %line.text, "reply continues");
        }
        Ok(None)
    }

    /// Reads from `reader` until a complete reply is buffered and returns its
    /// final line.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConnectionClosed`] if the peer closes first, or an I/O
    /// error from the reader.
    pub async fn read_reply<R>(&mut self, reader: &mut R) -> Result<Reply>
    where
        R: AsyncRead + Unpin,
    {
        loop {
            if let Some(reply) = self.next_reply()? {
                return Ok(reply);
            }

            self.buf.reserve(READ_CHUNK);
            let n = reader.read_buf(&mut self.buf).await?;
            if n == 0 {
                return Err(Error::ConnectionClosed);
            }
        }
    }
}

/// Finds the position of CRLF in a buffer.
fn find_crlf(buf: &[u8]) -> Option<usize> {
    buf.windows(2).position(|w| w == b"\r\n")
}
