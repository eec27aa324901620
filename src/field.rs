use std::borrow::Cow;

use bytes::{Bytes, BytesMut};
use encoding_rs::{Encoding, UTF_8};
use http::header::{self, HeaderMap};
#[cfg(feature = "json")]
use serde::de::DeserializeOwned;

use crate::content_disposition::ContentDisposition;
use crate::state::{MultipartState, StreamingStage};

/// A single part of a `multipart/form-data` body.
///
/// The data is read chunk by chunk with [`chunk`](Field::chunk), or all at once
/// with [`bytes`](Field::bytes) and [`text`](Field::text).
pub struct Field<'a, 'r> {
    state: &'a mut MultipartState<'r>,
    headers: HeaderMap,
    done: bool,
    meta: FieldMeta,
}

struct FieldMeta {
    name: Option<String>,
    file_name: Option<String>,
    content_type: Option<mime::Mime>,
    idx: usize,
}

impl<'a, 'r> Field<'a, 'r> {
    pub(crate) fn new(
        state: &'a mut MultipartState<'r>,
        headers: HeaderMap,
        idx: usize,
        content_disposition: ContentDisposition,
    ) -> Self {
        let content_type = headers
            .get(header::CONTENT_TYPE)
            .and_then(|val| val.to_str().ok())
            .and_then(|val| val.parse::<mime::Mime>().ok());

        Field {
            state,
            headers,
            done: false,
            meta: FieldMeta {
                name: content_disposition.field_name,
                file_name: content_disposition.file_name,
                content_type,
                idx,
            },
        }
    }

    /// The field name found in the `Content-Disposition` header.
    pub fn name(&self) -> Option<&str> {
        self.meta.name.as_deref()
    }

    /// The file name found in the `Content-Disposition` header.
    pub fn file_name(&self) -> Option<&str> {
        self.meta.file_name.as_deref()
    }

    /// The `Content-Type` header of this part, if it parses as a [`mime::Mime`].
    pub fn content_type(&self) -> Option<&mime::Mime> {
        self.meta.content_type.as_ref()
    }

    /// All headers of this part.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// The position of this field in the multipart body.
    pub fn index(&self) -> usize {
        self.meta.idx
    }

    /// Hands the headers over without reading the data.
    pub(crate) fn take_headers(&mut self) -> HeaderMap {
        std::mem::take(&mut self.headers)
    }

    /// Reads the next chunk of this field's data, `None` at the end of the field.
    pub async fn chunk(&mut self) -> crate::Result<Option<Bytes>> {
        loop {
            if self.done {
                return Ok(None);
            }

            let state = &mut *self.state;

            match state
                .buffer
                .read_field_data(state.boundary.as_str(), self.meta.name.as_deref())?
            {
                Some((true, bytes)) => {
                    self.done = true;
                    state.stage = StreamingStage::ReadingBoundary;

                    if !bytes.is_empty() {
                        return Ok(Some(bytes));
                    }
                }
                Some((false, bytes)) => return Ok(Some(bytes)),
                None => {
                    state.buffer.fill().await?;
                }
            }
        }
    }

    /// Reads the whole field data into memory.
    pub async fn bytes(mut self) -> crate::Result<Bytes> {
        let mut buf = BytesMut::new();

        while let Some(bytes) = self.chunk().await? {
            buf.extend_from_slice(&bytes);
        }

        Ok(buf.freeze())
    }

    /// Reads the field data as `JSON`.
    #[cfg(feature = "json")]
    #[cfg_attr(nightly, doc(cfg(feature = "json")))]
    pub async fn json<T: DeserializeOwned>(self) -> crate::Result<T> {
        let bytes = self.bytes().await?;
        serde_json::from_slice(&bytes).map_err(crate::Error::DecodeJson)
    }

    /// Reads the field data as text, decoded with the charset from its
    /// `Content-Type` or UTF-8.
    pub async fn text(self) -> crate::Result<String> {
        self.text_with_charset("utf-8").await
    }

    /// Reads the field data as text, falling back to `default_encoding` when the
    /// part does not declare a charset.
    pub async fn text_with_charset(self, default_encoding: &str) -> crate::Result<String> {
        let encoding_name = self
            .content_type()
            .and_then(|mime| mime.get_param(mime::CHARSET))
            .map(|charset| charset.as_str().to_owned())
            .unwrap_or_else(|| default_encoding.to_owned());

        let bytes = self.bytes().await?;

        Ok(decode_text(&encoding_name, &bytes))
    }
}

pub(crate) fn decode_text(encoding_name: &str, bytes: &[u8]) -> String {
    let encoding = Encoding::for_label(encoding_name.as_bytes()).unwrap_or(UTF_8);

    let (text, _, _) = encoding.decode(bytes);

    match text {
        Cow::Owned(s) => s,
        Cow::Borrowed(s) => String::from(s),
    }
}
