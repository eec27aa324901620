use std::path::{Path, PathBuf};

use crate::constants;

/// Configuration shared by every [`Store`](crate::Store) a
/// [`FileStore`](crate::FileStore) creates.
///
/// # Examples
///
/// ```
/// use formstore::{ContentTypePolicy, Options, MB};
///
/// let options = Options::new()
///     .max_memory(2 * MB)
///     .content_type(ContentTypePolicy::OctetStream);
///
/// assert_eq!(options.get_max_memory(), 2 * 1024 * 1024);
/// ```
#[derive(Debug, Clone)]
pub struct Options {
    pub(crate) max_memory: u64,
    pub(crate) content_type: ContentTypePolicy,
    pub(crate) temp_dir: Option<PathBuf>,
}

impl Options {
    /// Creates the default options: 24 KiB of in-memory buffering and
    /// [`ContentTypePolicy::EchoRequest`].
    pub fn new() -> Options {
        Options::default()
    }

    /// Sets how many bytes of the form may be buffered in memory before file
    /// data is spilled to temporary files.
    pub fn max_memory(mut self, limit: u64) -> Options {
        self.max_memory = limit;
        self
    }

    /// Sets how [`Store::serve`](crate::Store::serve) fills the `Content-Type` header.
    pub fn content_type(mut self, policy: ContentTypePolicy) -> Options {
        self.content_type = policy;
        self
    }

    /// Sets the directory uploads are saved in. Defaults to
    /// [`std::env::temp_dir`].
    pub fn temp_dir<P: Into<PathBuf>>(mut self, dir: P) -> Options {
        self.temp_dir = Some(dir.into());
        self
    }

    pub fn get_max_memory(&self) -> u64 {
        self.max_memory
    }

    pub fn get_content_type(&self) -> &ContentTypePolicy {
        &self.content_type
    }

    pub fn get_temp_dir(&self) -> Option<&Path> {
        self.temp_dir.as_deref()
    }

    pub(crate) fn text_value_limit(&self) -> u64 {
        self.max_memory.saturating_add(constants::TEXT_VALUE_SLACK)
    }
}

impl Default for Options {
    fn default() -> Self {
        Options {
            max_memory: constants::DEFAULT_MAX_MEMORY,
            content_type: ContentTypePolicy::default(),
            temp_dir: None,
        }
    }
}

/// The `Content-Type` sent with a download.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ContentTypePolicy {
    /// Copy the `Content-Type` of the inbound request, as the served file's
    /// own type is not known. Falls back to `application/octet-stream`.
    #[default]
    EchoRequest,
    /// Always `application/octet-stream`.
    OctetStream,
    /// Always the given type.
    Fixed(mime::Mime),
}
