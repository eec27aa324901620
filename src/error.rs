use std::fmt::{self, Debug, Display, Formatter};
use std::io;

use derive_more::Display;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// A set of errors that can occur while parsing an upload, looking up its
/// files or building a download response.
#[derive(Display)]
#[non_exhaustive]
pub enum Error {
    /// No file (or text value) was uploaded under the requested field name.
    #[display(fmt = "no upload found for field '{}'", field)]
    NotFound { field: String },

    /// A previous parse attempt failed and the request body is gone.
    #[display(fmt = "request body was consumed by a failed parse")]
    BodyConsumed,

    /// The text values of the form exceeded the in-memory budget.
    #[display(fmt = "form values exceeded the maximum memory limit: {} bytes", limit)]
    FormTooLarge { limit: u64 },

    /// The field data is found incomplete.
    #[display(
        fmt = "field '{}' received with incomplete data",
        "field_name.as_deref().unwrap_or(\"<unknown>\")"
    )]
    IncompleteFieldData { field_name: Option<String> },

    /// Couldn't read the field headers completely.
    #[display(fmt = "failed to read field complete headers")]
    IncompleteHeaders,

    /// Failed to read headers.
    #[display(fmt = "failed to read headers: {}", _0)]
    ReadHeaderFailed(httparse::Error),

    /// Failed to decode the field's raw header name to
    /// [`HeaderName`](http::header::HeaderName) type.
    #[display(fmt = "failed to decode field's raw header name: {:?} {}", name, cause)]
    DecodeHeaderName { name: String, cause: BoxError },

    /// Failed to decode the field's raw header value to
    /// [`HeaderValue`](http::header::HeaderValue) type.
    #[display(fmt = "failed to decode field's raw header value: {}", cause)]
    DecodeHeaderValue { value: Vec<u8>, cause: BoxError },

    /// Multipart stream is incomplete.
    #[display(fmt = "incomplete multipart stream")]
    IncompleteStream,

    /// Stream read failed.
    #[display(fmt = "stream read failed: {}", _0)]
    StreamReadFailed(BoxError),

    /// The `Content-Type` header is not `multipart/form-data`.
    #[display(fmt = "Content-Type is not multipart/form-data")]
    NoMultipart,

    /// Failed to convert the `Content-Type` to [`mime::Mime`] type.
    #[display(fmt = "Failed to convert Content-Type to `mime::Mime` type: {}", _0)]
    DecodeContentType(mime::FromStrError),

    /// No boundary found in `Content-Type` header.
    #[display(fmt = "multipart boundary not found in Content-Type")]
    NoBoundary,

    /// The download filename can't be used in a `Content-Disposition` header.
    #[display(fmt = "filename can't be sent as a header value: {:?}", filename)]
    InvalidFilename { filename: String },

    /// A temporary file or a served file couldn't be read or written.
    #[display(fmt = "file system operation failed: {}", _0)]
    Io(io::Error),

    /// Failed to decode the field data as `JSON` in
    /// [`field.json()`](crate::Field::json) method.
    #[cfg(feature = "json")]
    #[cfg_attr(nightly, doc(cfg(feature = "json")))]
    #[display(fmt = "failed to decode field data as JSON: {}", _0)]
    DecodeJson(serde_json::Error),
}

impl Debug for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(self, f)
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(err) => Some(err),
            Error::ReadHeaderFailed(err) => Some(err),
            Error::DecodeContentType(err) => Some(err),
            Error::StreamReadFailed(cause)
            | Error::DecodeHeaderName { cause, .. }
            | Error::DecodeHeaderValue { cause, .. } => Some(&**cause),
            #[cfg(feature = "json")]
            Error::DecodeJson(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::Io(err)
    }
}

impl PartialEq for Error {
    fn eq(&self, other: &Self) -> bool {
        self.to_string().eq(&other.to_string())
    }
}

impl Eq for Error {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_display_messages() {
        assert_eq!(
            Error::NotFound { field: "avatar".into() }.to_string(),
            "no upload found for field 'avatar'"
        );
        assert_eq!(
            Error::IncompleteFieldData { field_name: None }.to_string(),
            "field '<unknown>' received with incomplete data"
        );
        assert_eq!(format!("{:?}", Error::IncompleteStream), "incomplete multipart stream");
    }

    #[test]
    fn test_source_exposes_cause() {
        let err = Error::StreamReadFailed(io::Error::new(io::ErrorKind::Other, "reset").into());
        assert_eq!(err.source().map(|e| e.to_string()), Some("reset".to_owned()));

        let err = Error::from(io::Error::new(io::ErrorKind::NotFound, "gone"));
        assert_eq!(err.source().map(|e| e.to_string()), Some("gone".to_owned()));

        assert!(Error::NoBoundary.source().is_none());
    }
}
