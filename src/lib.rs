//! Request-scoped `multipart/form-data` uploads and attachment downloads for
//! `http`-based servers.
//!
//! A [`FileStore`] is created once with the [`Options`] shared by every
//! request. For each request it produces a [`Store`], which parses the
//! multipart body on first use, saves every uploaded file to its own temporary
//! file and hands the uploads out as [`File`]s. The same `Store` builds
//! download responses with [`Store::serve`].
//!
//! Temporary files belong to their `File`: they are deleted when the `File`
//! (or the `Store` holding it) is dropped, unless the file is moved with
//! [`File::move_to`] or kept with [`File::keep`].
//!
//! # Examples
//!
//! ```
//! use bytes::Bytes;
//! use formstore::FileStore;
//! use http_body_util::Full;
//!
//! # async fn run() {
//! let body = "--X-BOUNDARY\r\nContent-Disposition: form-data; name=\"file\"; filename=\"notes.txt\"\r\n\r\nhello\r\n--X-BOUNDARY--\r\n";
//! let req = http::Request::builder()
//!     .header("Content-Type", "multipart/form-data; boundary=X-BOUNDARY")
//!     .body(Full::new(Bytes::from(body)))
//!     .unwrap();
//!
//! let (_parts, mut store) = FileStore::default().install(req);
//!
//! let file = store.take("file").await.unwrap();
//! assert_eq!(file.name(), "notes");
//! assert_eq!(std::fs::read(file.path()).unwrap(), b"hello");
//!
//! let download = store.serve("notes.txt", Bytes::from_static(b"hello")).await.unwrap();
//! assert_eq!(download.headers()["content-disposition"], "attachment; filename=notes.txt");
//! # }
//! # tokio::runtime::Runtime::new().unwrap().block_on(run());
//! ```
//!
//! # Optional features
//!
//! * `json`: [`Field::json`] and a `serde::Serialize` implementation for [`File`].
//! * `log` (default): parse progress and failures through the `log` facade.

#![cfg_attr(nightly, feature(doc_cfg))]

#[cfg(feature = "log")]
macro_rules! trace {
    ($($arg:tt)+) => { log::trace!($($arg)+) };
}

#[cfg(not(feature = "log"))]
macro_rules! trace {
    ($($arg:tt)+) => {{ let _ = format_args!($($arg)+); }};
}

#[cfg(feature = "log")]
macro_rules! debug {
    ($($arg:tt)+) => { log::debug!($($arg)+) };
}

#[cfg(not(feature = "log"))]
macro_rules! debug {
    ($($arg:tt)+) => {{ let _ = format_args!($($arg)+); }};
}

#[cfg(feature = "log")]
macro_rules! warn {
    ($($arg:tt)+) => { log::warn!($($arg)+) };
}

#[cfg(not(feature = "log"))]
macro_rules! warn {
    ($($arg:tt)+) => {{ let _ = format_args!($($arg)+); }};
}

pub use bytes;
pub use constants::{B, GB, KB, MB, TB};
pub use error::Error;
pub use field::Field;
pub use file::{File, MoveError};
pub use middleware::FileStore;
pub use multipart::Multipart;
pub use options::{ContentTypePolicy, Options};
pub use serve::{Body, Source};
pub use store::Store;

mod buffer;
mod constants;
mod content_disposition;
mod error;
mod field;
mod file;
mod helpers;
mod middleware;
mod multipart;
mod options;
mod serve;
mod state;
mod store;

/// A Result type often returned from methods that can have `formstore` errors.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Parses the `Content-Type` header to extract the boundary value.
///
/// # Examples
///
/// ```
/// # fn run(){
/// let content_type = "multipart/form-data; boundary=ABCDEFG";
///
/// assert_eq!(formstore::parse_boundary(content_type), Ok("ABCDEFG".to_owned()));
/// # }
/// # run();
/// ```
pub fn parse_boundary<T: AsRef<str>>(content_type: T) -> Result<String> {
    let m = content_type
        .as_ref()
        .parse::<mime::Mime>()
        .map_err(Error::DecodeContentType)?;

    if !(m.type_() == mime::MULTIPART && m.subtype() == mime::FORM_DATA) {
        return Err(Error::NoMultipart);
    }

    m.get_param(mime::BOUNDARY)
        .map(|name| name.as_str().to_owned())
        .ok_or(Error::NoBoundary)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_boundary() {
        let content_type = "multipart/form-data; boundary=ABCDEFG";
        assert_eq!(parse_boundary(content_type), Ok("ABCDEFG".to_owned()));

        let content_type = "multipart/form-data; boundary=------ABCDEFG";
        assert_eq!(parse_boundary(content_type), Ok("------ABCDEFG".to_owned()));

        let content_type = "boundary=------ABCDEFG";
        assert!(parse_boundary(content_type).is_err());

        let content_type = "text/plain";
        assert_eq!(parse_boundary(content_type), Err(Error::NoMultipart));

        let content_type = "text/plain; boundary=------ABCDEFG";
        assert_eq!(parse_boundary(content_type), Err(Error::NoMultipart));

        let content_type = "multipart/form-data";
        assert_eq!(parse_boundary(content_type), Err(Error::NoBoundary));
    }
}
