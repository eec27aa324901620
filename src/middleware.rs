use std::sync::Arc;

use bytes::Bytes;
use futures_util::future;
use futures_util::stream::{Stream, TryStreamExt};
use http::header::{self, HeaderMap};
use http::request::{Parts, Request};
use http_body_util::BodyStream;

use crate::{Options, Store};

/// Creates a fresh [`Store`] for every request.
///
/// Build one at startup and hand each incoming request to
/// [`install`](FileStore::install); the handler then owns the `Store` for the
/// rest of the request.
///
/// # Examples
///
/// ```no_run
/// use formstore::{FileStore, Options, MB};
/// use http_body_util::Full;
/// use bytes::Bytes;
///
/// # async fn run(req: http::Request<Full<Bytes>>) -> formstore::Result<()> {
/// let files = FileStore::new(Options::new().max_memory(8 * MB));
///
/// let (_parts, mut store) = files.install(req);
/// let upload = store.get("file").await?;
/// println!("{} bytes at {:?}", upload.size(), upload.path());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct FileStore {
    options: Arc<Options>,
}

impl FileStore {
    /// Creates a factory whose stores all use `options`.
    pub fn new(options: Options) -> FileStore {
        FileStore {
            options: Arc::new(options),
        }
    }

    /// The options handed to every `Store`.
    pub fn options(&self) -> &Options {
        &self.options
    }

    /// Creates a `Store` from the request headers and a stream over the request body.
    pub fn store<S, O, E>(&self, headers: &HeaderMap, body: S) -> Store
    where
        S: Stream<Item = Result<O, E>> + Send + 'static,
        O: Into<Bytes> + 'static,
        E: Into<Box<dyn std::error::Error + Send + Sync>> + 'static,
    {
        let content_type = headers.get(header::CONTENT_TYPE).cloned();
        Store::new(content_type, body, Arc::clone(&self.options))
    }

    /// Splits `req` into its head and a `Store` owning its body.
    pub fn install<B>(&self, req: Request<B>) -> (Parts, Store)
    where
        B: http_body::Body + Send + 'static,
        B::Data: Into<Bytes> + Send + 'static,
        B::Error: Into<Box<dyn std::error::Error + Send + Sync>> + Send + 'static,
    {
        let (parts, body) = req.into_parts();

        // Only data frames carry the multipart body; trailers are dropped.
        let body = BodyStream::new(body).try_filter_map(|frame| future::ready(Ok(frame.into_data().ok())));

        let store = self.store(&parts.headers, body);
        (parts, store)
    }
}
