use bytes::{Bytes, BytesMut};
use futures_util::stream::{BoxStream, StreamExt};

use crate::constants;

pub(crate) struct StreamBuffer<'r> {
    pub(crate) eof: bool,
    pub(crate) buf: BytesMut,
    pub(crate) stream: BoxStream<'r, crate::Result<Bytes>>,
}

/// What follows a `--boundary` delimiter in the buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DelimiterTail {
    /// `--`: the close delimiter.
    Close,
    /// Optional spaces or tabs then CRLF; holds the number of bytes to consume.
    Open(usize),
    /// Not enough input to decide.
    Partial,
    /// Anything else: the delimiter text belongs to the data.
    Content,
}

pub(crate) fn delimiter_tail(after: &[u8]) -> DelimiterTail {
    if after.starts_with(constants::BOUNDARY_EXT.as_bytes()) {
        return DelimiterTail::Close;
    }
    if after.is_empty() || after == b"-" {
        return DelimiterTail::Partial;
    }

    let padding = after.iter().take_while(|&&b| b == b' ' || b == b'\t').count();
    let tail = &after[padding..];

    if tail.starts_with(constants::CRLF.as_bytes()) {
        DelimiterTail::Open(padding + constants::CRLF.len())
    } else if tail.is_empty() || tail == constants::CR.as_bytes() {
        DelimiterTail::Partial
    } else {
        DelimiterTail::Content
    }
}

impl<'r> StreamBuffer<'r> {
    pub fn new(stream: BoxStream<'r, crate::Result<Bytes>>) -> Self {
        StreamBuffer {
            eof: false,
            buf: BytesMut::new(),
            stream,
        }
    }

    /// Pulls one more chunk from the underlying stream into the buffer.
    ///
    /// Returns `false` once the stream is exhausted.
    pub async fn fill(&mut self) -> crate::Result<bool> {
        if self.eof {
            return Ok(false);
        }

        match self.stream.next().await {
            Some(Ok(data)) => {
                self.buf.extend_from_slice(&data);
                Ok(true)
            }
            Some(Err(err)) => Err(err),
            None => {
                self.eof = true;
                Ok(false)
            }
        }
    }

    pub fn read_exact(&mut self, size: usize) -> Option<Bytes> {
        if size <= self.buf.len() {
            Some(self.buf.split_to(size).freeze())
        } else {
            None
        }
    }

    pub fn peek_exact(&self, size: usize) -> Option<&[u8]> {
        self.buf.get(..size)
    }

    pub fn read_until(&mut self, pattern: &[u8]) -> Option<Bytes> {
        memchr::memmem::find(&self.buf, pattern).map(|idx| self.buf.split_to(idx + pattern.len()).freeze())
    }

    /// Reads as much field data as can be safely released.
    ///
    /// Returns `(true, bytes)` when the closing boundary of the field was found,
    /// `(false, bytes)` for an intermediate chunk and `None` when more input is
    /// needed before anything can be released.
    pub fn read_field_data(
        &mut self,
        boundary: &str,
        field_name: Option<&str>,
    ) -> crate::Result<Option<(bool, Bytes)>> {
        if self.buf.is_empty() && self.eof {
            return Err(crate::Error::IncompleteFieldData {
                field_name: field_name.map(|s| s.to_owned()),
            });
        }

        let boundary_deriv = format!("{}{}{}", constants::CRLF, constants::BOUNDARY_EXT, boundary);
        let b_len = boundary_deriv.len();

        let mut from = 0;
        while let Some(rel_idx) = memchr::memmem::find(&self.buf[from..], boundary_deriv.as_bytes()) {
            let idx = from + rel_idx;

            match delimiter_tail(&self.buf[idx + b_len..]) {
                DelimiterTail::Close | DelimiterTail::Open(_) => {
                    let bytes = self.buf.split_to(idx).freeze();

                    // discard \r\n.
                    drop(self.buf.split_to(constants::CRLF.len()));

                    return Ok(Some((true, bytes)));
                }
                DelimiterTail::Partial if self.eof => {
                    return Err(crate::Error::IncompleteFieldData {
                        field_name: field_name.map(|s| s.to_owned()),
                    });
                }
                DelimiterTail::Partial if idx == 0 => return Ok(None),
                DelimiterTail::Partial => return Ok(Some((false, self.buf.split_to(idx).freeze()))),
                // The boundary text is part of the data.
                DelimiterTail::Content => from = idx + 1,
            }
        }

        if self.eof {
            return Err(crate::Error::IncompleteFieldData {
                field_name: field_name.map(|s| s.to_owned()),
            });
        }

        let buf_len = self.buf.len();
        let rem_boundary_part_max_len = b_len - 1;
        let rem_boundary_part_idx = buf_len.saturating_sub(rem_boundary_part_max_len);

        // A trailing `\r` may be the start of a boundary split across chunks.
        let held_back = memchr::memrchr(constants::CR.as_bytes()[0], &self.buf[rem_boundary_part_idx..])
            .map(|rel_idx| rel_idx + rem_boundary_part_idx)
            .filter(|&idx| boundary_deriv.as_bytes().starts_with(&self.buf[idx..]));

        let release = held_back.unwrap_or(buf_len);
        if release == 0 {
            return Ok(None);
        }

        Ok(Some((false, self.buf.split_to(release).freeze())))
    }
}
