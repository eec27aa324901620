use std::collections::HashMap;
use std::future::Future;
use std::mem;
use std::path::Path;
use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use futures_util::stream::{BoxStream, Stream, StreamExt, TryStreamExt};
use http::header::HeaderValue;
use http::Response;
use tokio::io::AsyncWriteExt;

use crate::constants;
use crate::field::decode_text;
use crate::options::{ContentTypePolicy, Options};
use crate::serve::{self, Body, Source};
use crate::{Field, File, Multipart};

/// The uploads of a single request.
///
/// Nothing is read from the body until the first lookup; after that the
/// parsed files are cached for the lifetime of the `Store`. Files still owned
/// by the `Store` when it is dropped have their temporary files deleted, so
/// [`take`](Store::take) a file and [`move_to`](File::move_to) it somewhere to
/// keep it.
///
/// # Examples
///
/// ```
/// use bytes::Bytes;
/// use formstore::FileStore;
/// use http::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
/// use std::convert::Infallible;
///
/// # async fn run() {
/// let data = "--X-BOUNDARY\r\nContent-Disposition: form-data; name=\"avatar\"; filename=\"pic.png\"\r\n\r\n0123456789\r\n--X-BOUNDARY--\r\n";
/// let mut headers = HeaderMap::new();
/// headers.insert(CONTENT_TYPE, HeaderValue::from_static("multipart/form-data; boundary=X-BOUNDARY"));
///
/// let body = futures_util::stream::once(async move { Result::<Bytes, Infallible>::Ok(Bytes::from(data)) });
/// let mut store = FileStore::default().store(&headers, body);
///
/// let file = store.get("avatar").await.unwrap();
/// assert_eq!(file.name(), "pic");
/// assert_eq!(file.extension(), "png");
/// assert_eq!(file.size(), 10);
/// # }
/// # tokio::runtime::Runtime::new().unwrap().block_on(run());
/// ```
pub struct Store {
    options: Arc<Options>,
    request_content_type: Option<HeaderValue>,
    state: State,
}

enum State {
    Unparsed(BoxStream<'static, crate::Result<Bytes>>),
    Parsed(Entries),
    Consumed,
}

#[derive(Default)]
struct Entries {
    files: HashMap<String, Vec<File>>,
    values: HashMap<String, Vec<String>>,
}

impl Store {
    /// Creates a `Store` over a request body.
    ///
    /// `content_type` is the request's `Content-Type` header; it carries the
    /// multipart boundary.
    pub fn new<S, O, E>(content_type: Option<HeaderValue>, stream: S, options: Arc<Options>) -> Store
    where
        S: Stream<Item = Result<O, E>> + Send + 'static,
        O: Into<Bytes> + 'static,
        E: Into<Box<dyn std::error::Error + Send + Sync>> + 'static,
    {
        let stream = stream
            .map_ok(|b| b.into())
            .map_err(|err| crate::Error::StreamReadFailed(err.into()))
            .boxed();

        Store {
            options,
            request_content_type: content_type,
            state: State::Unparsed(stream),
        }
    }

    /// Whether the body has been parsed successfully.
    pub fn is_parsed(&self) -> bool {
        matches!(self.state, State::Parsed(_))
    }

    /// Names of the fields that carried at least one file, sorted.
    pub async fn field_names(&mut self) -> crate::Result<Vec<&str>> {
        let mut names: Vec<&str> = self
            .parsed()
            .await?
            .files
            .iter()
            .filter(|(_, files)| !files.is_empty())
            .map(|(name, _)| name.as_str())
            .collect();
        names.sort_unstable();
        Ok(names)
    }

    /// Returns the first file uploaded under `field`.
    pub async fn get(&mut self, field: &str) -> crate::Result<&File> {
        self.get_multi(field).await?.first().ok_or_else(|| not_found(field))
    }

    /// Like [`get`](Store::get), for attaching values with [`File::set`].
    pub async fn get_mut(&mut self, field: &str) -> crate::Result<&mut File> {
        self.parsed()
            .await?
            .files
            .get_mut(field)
            .and_then(|files| files.first_mut())
            .ok_or_else(|| not_found(field))
    }

    /// Returns every file uploaded under `field`, in upload order.
    pub async fn get_multi(&mut self, field: &str) -> crate::Result<&[File]> {
        self.parsed()
            .await?
            .files
            .get(field)
            .filter(|files| !files.is_empty())
            .map(|files| files.as_slice())
            .ok_or_else(|| not_found(field))
    }

    /// Removes the first file uploaded under `field` from the store and hands
    /// it over.
    pub async fn take(&mut self, field: &str) -> crate::Result<File> {
        let files = &mut self.parsed().await?.files;

        let file = match files.get_mut(field) {
            Some(list) if !list.is_empty() => list.remove(0),
            _ => return Err(not_found(field)),
        };

        if files.get(field).map_or(false, |list| list.is_empty()) {
            files.remove(field);
        }

        Ok(file)
    }

    /// Removes every file uploaded under `field` from the store and hands them over.
    pub async fn take_multi(&mut self, field: &str) -> crate::Result<Vec<File>> {
        self.parsed()
            .await?
            .files
            .remove(field)
            .filter(|files| !files.is_empty())
            .ok_or_else(|| not_found(field))
    }

    /// Returns the first text value submitted under `field`.
    pub async fn value(&mut self, field: &str) -> crate::Result<&str> {
        self.values(field).await?.first().map(|v| v.as_str()).ok_or_else(|| not_found(field))
    }

    /// Returns every text value submitted under `field`, in order.
    pub async fn values(&mut self, field: &str) -> crate::Result<&[String]> {
        self.parsed()
            .await?
            .values
            .get(field)
            .map(|values| values.as_slice())
            .ok_or_else(|| not_found(field))
    }

    /// Builds a response which makes the client download `source` as `filename`.
    ///
    /// The `Content-Type` follows the [`ContentTypePolicy`] of the store's options.
    pub fn serve<T: Into<Source>>(
        &self,
        filename: &str,
        source: T,
    ) -> impl Future<Output = crate::Result<Response<Body>>> + Send + 'static {
        serve::attachment(filename.to_owned(), self.served_content_type(), source.into())
    }

    fn served_content_type(&self) -> HeaderValue {
        match &self.options.content_type {
            ContentTypePolicy::EchoRequest => self
                .request_content_type
                .clone()
                .unwrap_or_else(|| HeaderValue::from_static(constants::OCTET_STREAM)),
            ContentTypePolicy::OctetStream => HeaderValue::from_static(constants::OCTET_STREAM),
            ContentTypePolicy::Fixed(mime) => HeaderValue::from_str(mime.as_ref())
                .unwrap_or_else(|_| HeaderValue::from_static(constants::OCTET_STREAM)),
        }
    }

    async fn parsed(&mut self) -> crate::Result<&mut Entries> {
        match mem::replace(&mut self.state, State::Consumed) {
            State::Unparsed(body) => {
                debug!("parsing multipart body");

                match read_entries(self.request_content_type.as_ref(), body, &self.options).await {
                    Ok(entries) => {
                        debug!(
                            "parsed {} file(s) and {} value(s)",
                            entries.files.values().map(Vec::len).sum::<usize>(),
                            entries.values.values().map(Vec::len).sum::<usize>()
                        );
                        self.state = State::Parsed(entries);
                    }
                    Err(err) => {
                        warn!("failed to parse multipart body: {}", err);
                        return Err(err);
                    }
                }
            }
            State::Parsed(entries) => self.state = State::Parsed(entries),
            State::Consumed => return Err(crate::Error::BodyConsumed),
        }

        match &mut self.state {
            State::Parsed(entries) => Ok(entries),
            _ => Err(crate::Error::BodyConsumed),
        }
    }
}

fn not_found(field: &str) -> crate::Error {
    crate::Error::NotFound {
        field: field.to_owned(),
    }
}

async fn read_entries(
    content_type: Option<&HeaderValue>,
    body: BoxStream<'static, crate::Result<Bytes>>,
    options: &Options,
) -> crate::Result<Entries> {
    let content_type = content_type
        .and_then(|val| val.to_str().ok())
        .ok_or(crate::Error::NoMultipart)?;
    let boundary = crate::parse_boundary(content_type)?;

    let mut multipart = Multipart::from_boxed(body, boundary);
    let mut entries = Entries::default();

    let mut remaining = options.max_memory;
    let text_limit = options.text_value_limit();
    let mut text_size = 0u64;

    while let Some(mut field) = multipart.next_field().await? {
        let name = match field.name() {
            Some(name) => name.to_owned(),
            None => {
                trace!("skipping part {} without a field name", field.index());
                continue;
            }
        };

        // An empty filename is what browsers send for an unused file input.
        match field.file_name().filter(|name| !name.is_empty()).map(|s| s.to_owned()) {
            Some(file_name) => {
                let file = spool(&mut field, &file_name, options.temp_dir.as_deref(), &mut remaining).await?;
                trace!("field '{}': saved {:?} ({} bytes) to {:?}", name, file_name, file.size(), file.path());
                entries.files.entry(name).or_default().push(file);
            }
            None => {
                let charset = field
                    .content_type()
                    .and_then(|mime| mime.get_param(mime::CHARSET))
                    .map(|charset| charset.as_str().to_owned())
                    .unwrap_or_else(|| "utf-8".to_owned());

                let mut buf = BytesMut::new();
                while let Some(chunk) = field.chunk().await? {
                    text_size += chunk.len() as u64;
                    if text_size > text_limit {
                        return Err(crate::Error::FormTooLarge { limit: text_limit });
                    }
                    remaining = remaining.saturating_sub(chunk.len() as u64);
                    buf.extend_from_slice(&chunk);
                }

                entries.values.entry(name).or_default().push(decode_text(&charset, &buf));
            }
        }
    }

    Ok(entries)
}

/// Copies a file part into a new temporary file.
///
/// The part stays in memory while it fits in `remaining`; once it doesn't,
/// everything read so far is spilled and the rest goes straight to disk.
async fn spool(
    field: &mut Field<'_, '_>,
    file_name: &str,
    dir: Option<&Path>,
    remaining: &mut u64,
) -> crate::Result<File> {
    let headers = field.take_headers();
    let mut builder = tempfile::Builder::new();
    builder.prefix(constants::TEMP_FILE_PREFIX);
    let temp = match dir {
        Some(dir) => builder.tempfile_in(dir)?,
        None => builder.tempfile()?,
    };
    let (file, path) = temp.into_parts();
    let mut file = tokio::fs::File::from_std(file);

    let mut buf = BytesMut::new();
    let mut spilled = false;
    let mut size = 0u64;

    while let Some(chunk) = field.chunk().await? {
        size += chunk.len() as u64;

        if spilled {
            file.write_all(&chunk).await?;
        } else if (buf.len() + chunk.len()) as u64 > *remaining {
            trace!("spilling {:?} to {:?} after {} bytes", file_name, &*path, buf.len());
            spilled = true;
            file.write_all(&buf).await?;
            file.write_all(&chunk).await?;
            buf = BytesMut::new();
        } else {
            buf.extend_from_slice(&chunk);
        }
    }

    if !spilled {
        *remaining -= buf.len() as u64;
        file.write_all(&buf).await?;
    }
    file.flush().await?;

    Ok(File::from_temp(file_name, size, headers, path))
}
