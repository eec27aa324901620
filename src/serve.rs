use std::io;
use std::path::{Path, PathBuf};

use bytes::Bytes;
use futures_util::stream::TryStreamExt;
use http::header::{self, HeaderValue};
use http::Response;
use http_body::Frame;
use http_body_util::combinators::UnsyncBoxBody;
use http_body_util::{BodyExt, Full, StreamBody};
use tokio_util::io::ReaderStream;

/// The body of a download built by [`Store::serve`](crate::Store::serve).
pub type Body = UnsyncBoxBody<Bytes, io::Error>;

/// Where the bytes of a download come from.
///
/// Most callers pass something convertible instead of naming a variant:
///
/// ```
/// use formstore::Source;
/// use std::path::Path;
///
/// let _ = Source::from(vec![1, 2, 3]);
/// let _ = Source::from(Path::new("./example.png"));
/// ```
#[derive(Debug)]
pub enum Source {
    /// An open file; its remaining bytes are streamed.
    Handle(tokio::fs::File),
    /// Bytes already in memory, written as they are.
    Bytes(Bytes),
    /// A file on disk, read into memory in full before the response is built.
    Path(PathBuf),
}

impl From<tokio::fs::File> for Source {
    fn from(file: tokio::fs::File) -> Self {
        Source::Handle(file)
    }
}

impl From<std::fs::File> for Source {
    fn from(file: std::fs::File) -> Self {
        Source::Handle(tokio::fs::File::from_std(file))
    }
}

impl From<Bytes> for Source {
    fn from(bytes: Bytes) -> Self {
        Source::Bytes(bytes)
    }
}

impl From<Vec<u8>> for Source {
    fn from(bytes: Vec<u8>) -> Self {
        Source::Bytes(bytes.into())
    }
}

impl From<&'static [u8]> for Source {
    fn from(bytes: &'static [u8]) -> Self {
        Source::Bytes(Bytes::from_static(bytes))
    }
}

impl From<&'static str> for Source {
    fn from(text: &'static str) -> Self {
        Source::Bytes(Bytes::from_static(text.as_bytes()))
    }
}

impl From<String> for Source {
    fn from(text: String) -> Self {
        Source::Bytes(text.into())
    }
}

impl From<PathBuf> for Source {
    fn from(path: PathBuf) -> Self {
        Source::Path(path)
    }
}

impl From<&Path> for Source {
    fn from(path: &Path) -> Self {
        Source::Path(path.to_path_buf())
    }
}

/// Builds an `attachment` response named `filename` from `source`.
pub(crate) async fn attachment(filename: String, content_type: HeaderValue, source: Source) -> crate::Result<Response<Body>> {
    let disposition = HeaderValue::try_from(format!("attachment; filename={}", filename))
        .map_err(|_| crate::Error::InvalidFilename { filename })?;

    let body = match source {
        Source::Handle(file) => StreamBody::new(ReaderStream::new(file).map_ok(Frame::data)).boxed_unsync(),
        Source::Bytes(bytes) => full(bytes),
        Source::Path(path) => full(tokio::fs::read(&path).await?.into()),
    };

    let mut res = Response::new(body);
    res.headers_mut().insert(header::CONTENT_DISPOSITION, disposition);
    res.headers_mut().insert(header::CONTENT_TYPE, content_type);

    Ok(res)
}

fn full(bytes: Bytes) -> Body {
    Full::new(bytes).map_err(|never| match never {}).boxed_unsync()
}
