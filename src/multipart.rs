use bytes::Bytes;
use futures_util::stream::{BoxStream, Stream, StreamExt, TryStreamExt};
use tokio::io::AsyncRead;
use tokio_util::io::ReaderStream;

use crate::buffer::{delimiter_tail, DelimiterTail, StreamBuffer};
use crate::constants;
use crate::content_disposition::ContentDisposition;
use crate::helpers;
use crate::state::{MultipartState, StreamingStage};
use crate::Field;

/// Reads `multipart/form-data` formatted data one [`Field`] at a time.
///
/// A `Field` borrows the `Multipart` it came from, so only one field can be
/// read at a time. Dropping a field before reading all of its data is fine:
/// the remainder is skipped by the next call to
/// [`next_field`](Multipart::next_field).
///
/// # Examples
///
/// ```
/// use bytes::Bytes;
/// use formstore::Multipart;
/// use futures_util::stream::once;
/// use std::convert::Infallible;
///
/// # async fn run() {
/// let data = "--X-BOUNDARY\r\nContent-Disposition: form-data; name=\"my_text_field\"\r\n\r\nabcd\r\n--X-BOUNDARY--\r\n";
/// let stream = once(async move { Result::<Bytes, Infallible>::Ok(Bytes::from(data)) });
/// let mut multipart = Multipart::new(stream, "X-BOUNDARY");
///
/// while let Some(field) = multipart.next_field().await.unwrap() {
///     println!("Field: {:?}", field.text().await)
/// }
/// # }
/// # tokio::runtime::Runtime::new().unwrap().block_on(run());
/// ```
pub struct Multipart<'r> {
    state: MultipartState<'r>,
}

impl<'r> Multipart<'r> {
    /// Construct a new `Multipart` instance with the given [`Bytes`] stream and the boundary.
    pub fn new<S, O, E, B>(stream: S, boundary: B) -> Self
    where
        S: Stream<Item = Result<O, E>> + Send + 'r,
        O: Into<Bytes> + 'r,
        E: Into<Box<dyn std::error::Error + Send + Sync>> + 'r,
        B: Into<String>,
    {
        let stream = stream
            .map_ok(|b| b.into())
            .map_err(|err| crate::Error::StreamReadFailed(err.into()))
            .boxed();

        Multipart::from_boxed(stream, boundary)
    }

    pub(crate) fn from_boxed<B: Into<String>>(stream: BoxStream<'r, crate::Result<Bytes>>, boundary: B) -> Self {
        let state = MultipartState {
            buffer: StreamBuffer::new(stream),
            boundary: boundary.into(),
            stage: StreamingStage::FindingFirstBoundary,
            next_field_idx: 0,
            curr_field_name: None,
        };

        Multipart { state }
    }

    /// Construct a new `Multipart` instance with the given [`AsyncRead`] reader and the boundary.
    ///
    /// # Examples
    ///
    /// ```
    /// use formstore::Multipart;
    ///
    /// # async fn run() {
    /// let data = "--X-BOUNDARY\r\nContent-Disposition: form-data; name=\"my_text_field\"\r\n\r\nabcd\r\n--X-BOUNDARY--\r\n";
    /// let reader = data.as_bytes();
    /// let mut multipart = Multipart::with_reader(reader, "X-BOUNDARY");
    ///
    /// while let Some(mut field) = multipart.next_field().await.unwrap() {
    ///     while let Some(chunk) = field.chunk().await.unwrap() {
    ///         println!("Chunk: {:?}", chunk);
    ///     }
    /// }
    /// # }
    /// # tokio::runtime::Runtime::new().unwrap().block_on(run());
    /// ```
    pub fn with_reader<R, B>(reader: R, boundary: B) -> Self
    where
        R: AsyncRead + Send + 'r,
        B: Into<String>,
    {
        let stream = ReaderStream::new(reader);
        Multipart::new(stream, boundary)
    }

    /// Yields the next [`Field`] if available.
    pub async fn next_field(&mut self) -> crate::Result<Option<Field<'_, 'r>>> {
        let state = &mut self.state;

        loop {
            match state.stage {
                StreamingStage::Eof => return Ok(None),

                StreamingStage::ReadingFieldData => {
                    // The previous field was dropped before its end.
                    match state
                        .buffer
                        .read_field_data(state.boundary.as_str(), state.curr_field_name.as_deref())?
                    {
                        Some((true, _)) => state.stage = StreamingStage::ReadingBoundary,
                        Some((false, _)) => {}
                        None => {
                            state.buffer.fill().await?;
                        }
                    }
                }

                StreamingStage::FindingFirstBoundary => {
                    let boundary = format!("{}{}", constants::BOUNDARY_EXT, state.boundary);

                    match memchr::memmem::find(&state.buffer.buf, boundary.as_bytes()) {
                        Some(idx) => {
                            // discard the preamble.
                            drop(state.buffer.buf.split_to(idx));
                            state.stage = StreamingStage::ReadingBoundary;
                        }
                        None => {
                            let keep = boundary.len().saturating_sub(1);
                            let len = state.buffer.buf.len();
                            if len > keep {
                                drop(state.buffer.buf.split_to(len - keep));
                            }

                            if !state.buffer.fill().await? {
                                return Err(crate::Error::IncompleteStream);
                            }
                        }
                    }
                }

                StreamingStage::ReadingBoundary => {
                    let delimiter = format!("{}{}", constants::BOUNDARY_EXT, state.boundary);
                    let delimiter_len = delimiter.len();
                    let buf = &state.buffer.buf;

                    // Padding may follow the boundary before its CRLF.
                    let tail = if buf.len() < delimiter_len {
                        DelimiterTail::Partial
                    } else if !buf.starts_with(delimiter.as_bytes()) {
                        return Err(crate::Error::IncompleteStream);
                    } else {
                        delimiter_tail(&buf[delimiter_len..])
                    };

                    match tail {
                        DelimiterTail::Close => {
                            state.stage = StreamingStage::Eof;
                            return Ok(None);
                        }
                        DelimiterTail::Open(len) => {
                            drop(state.buffer.read_exact(delimiter_len + len));
                            state.stage = StreamingStage::ReadingFieldHeaders;
                        }
                        DelimiterTail::Partial => {
                            if !state.buffer.fill().await? {
                                return Err(crate::Error::IncompleteStream);
                            }
                        }
                        DelimiterTail::Content => return Err(crate::Error::IncompleteStream),
                    }
                }

                StreamingStage::ReadingFieldHeaders => {
                    let header_bytes = match state.buffer.read_until(constants::CRLF_CRLF.as_bytes()) {
                        Some(bytes) => bytes,
                        None => {
                            if !state.buffer.fill().await? {
                                return Err(crate::Error::IncompleteStream);
                            }
                            continue;
                        }
                    };

                    let mut headers = [httparse::EMPTY_HEADER; constants::MAX_HEADERS];

                    let headers = match httparse::parse_headers(&header_bytes, &mut headers) {
                        Ok(httparse::Status::Complete((_, raw_headers))) => {
                            helpers::convert_raw_headers_to_header_map(raw_headers)?
                        }
                        Ok(httparse::Status::Partial) => return Err(crate::Error::IncompleteHeaders),
                        Err(err) => return Err(crate::Error::ReadHeaderFailed(err)),
                    };

                    state.stage = StreamingStage::ReadingFieldData;

                    let field_idx = state.next_field_idx;
                    state.next_field_idx += 1;

                    let content_disposition = ContentDisposition::parse(&headers);
                    state.curr_field_name = content_disposition.field_name.clone();

                    return Ok(Some(Field::new(state, headers, field_idx, content_disposition)));
                }
            }
        }
    }

    /// Yields the next [`Field`] with their positioning index as a tuple `(usize, Field)`.
    pub async fn next_field_with_idx(&mut self) -> crate::Result<Option<(usize, Field<'_, 'r>)>> {
        self.next_field().await.map(|f| f.map(|field| (field.index(), field)))
    }
}
