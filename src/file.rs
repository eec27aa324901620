use std::any::Any;
use std::collections::HashMap;
use std::fmt::{self, Debug, Display, Formatter};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use http::header::{self, HeaderMap};
use tempfile::TempPath;

use crate::helpers;

/// An uploaded file, materialized on the local filesystem.
///
/// A `File` straight out of a [`Store`](crate::Store) is backed by a temporary
/// file which is deleted when the `File` is dropped. Use
/// [`move_to`](File::move_to) or [`keep`](File::keep) to hold on to the data.
pub struct File {
    name: String,
    extension: String,
    size: u64,
    path: Backing,
    headers: HeaderMap,
    keys: HashMap<String, Box<dyn Any + Send + Sync>>,
}

enum Backing {
    Temp(TempPath),
    Kept(PathBuf),
}

impl Backing {
    fn as_path(&self) -> &Path {
        match self {
            Backing::Temp(path) => &**path,
            Backing::Kept(path) => path.as_path(),
        }
    }
}

impl File {
    pub(crate) fn from_temp(file_name: &str, size: u64, headers: HeaderMap, path: TempPath) -> File {
        let (name, extension) = helpers::split_file_name(file_name);

        File {
            name,
            extension,
            size,
            path: Backing::Temp(path),
            headers,
            keys: HashMap::new(),
        }
    }

    /// The original file name without its extension.
    ///
    /// ### Warning: Client Provided / Untrustworthy
    /// Do not build filesystem paths from this value without sanitizing it.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The extension of the original file name without the leading dot; empty
    /// if there was none.
    pub fn extension(&self) -> &str {
        &self.extension
    }

    /// The original file name, reassembled from [`name`](File::name) and
    /// [`extension`](File::extension).
    pub fn file_name(&self) -> String {
        if self.extension.is_empty() {
            self.name.clone()
        } else {
            format!("{}.{}", self.name, self.extension)
        }
    }

    /// The number of bytes written to the backing file.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Where the data of this file lives.
    pub fn path(&self) -> &Path {
        self.path.as_path()
    }

    /// The raw headers of the part this file was uploaded in.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// The `Content-Type` declared by the client for this part.
    pub fn content_type(&self) -> Option<mime::Mime> {
        self.headers
            .get(header::CONTENT_TYPE)
            .and_then(|val| val.to_str().ok())
            .and_then(|val| val.parse().ok())
    }

    /// Whether the backing file is deleted when this `File` is dropped.
    pub fn is_temporary(&self) -> bool {
        matches!(self.path, Backing::Temp(_))
    }

    /// Attaches a value to this file under `key`, replacing any previous one.
    pub fn set<K, T>(&mut self, key: K, value: T)
    where
        K: Into<String>,
        T: Any + Send + Sync,
    {
        self.keys.insert(key.into(), Box::new(value));
    }

    /// Returns the value stored under `key` if there is one of type `T`.
    pub fn get<T: Any>(&self, key: &str) -> Option<&T> {
        self.keys.get(key).and_then(|val| val.downcast_ref::<T>())
    }

    /// Like [`get`](File::get), for values updated in place.
    pub fn get_mut<T: Any>(&mut self, key: &str) -> Option<&mut T> {
        self.keys.get_mut(key).and_then(|val| val.downcast_mut::<T>())
    }

    /// Removes and returns the value stored under `key` if it is of type `T`.
    pub fn unset<T: Any>(&mut self, key: &str) -> Option<T> {
        if !self.keys.get(key)?.is::<T>() {
            return None;
        }

        self.keys
            .remove(key)
            .and_then(|val| val.downcast::<T>().ok())
            .map(|val| *val)
    }

    /// Deletes the backing file.
    ///
    /// Fails if the file does not exist anymore or can't be deleted.
    pub fn remove(self) -> io::Result<()> {
        match self.path {
            Backing::Temp(path) => path.close(),
            Backing::Kept(path) => fs::remove_file(path),
        }
    }

    /// Renames the backing file to `dest` and returns the relocated `File`.
    ///
    /// The returned file is no longer temporary. This is a plain rename, so it
    /// fails when `dest` is on another filesystem; the untouched `File` is
    /// handed back in the error.
    pub fn move_to<P: AsRef<Path>>(self, dest: P) -> Result<File, MoveError> {
        let dest = dest.as_ref();
        let File {
            name,
            extension,
            size,
            path,
            headers,
            keys,
        } = self;

        let (path, error) = match path {
            Backing::Temp(path) => match path.persist(dest) {
                Ok(()) => (Backing::Kept(dest.to_path_buf()), None),
                Err(err) => (Backing::Temp(err.path), Some(err.error)),
            },
            Backing::Kept(path) => match fs::rename(&path, dest) {
                Ok(()) => (Backing::Kept(dest.to_path_buf()), None),
                Err(err) => (Backing::Kept(path), Some(err)),
            },
        };

        let file = File {
            name,
            extension,
            size,
            path,
            headers,
            keys,
        };

        match error {
            None => Ok(file),
            Some(error) => Err(MoveError { error, file }),
        }
    }

    /// Stops deleting the backing file on drop and returns its path.
    pub fn keep(self) -> io::Result<PathBuf> {
        match self.path {
            Backing::Temp(path) => path.keep().map_err(|err| err.error),
            Backing::Kept(path) => Ok(path),
        }
    }
}

impl Debug for File {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("File")
            .field("name", &self.name)
            .field("extension", &self.extension)
            .field("size", &self.size)
            .field("path", &self.path())
            .field("temporary", &self.is_temporary())
            .field("headers", &self.headers)
            .field("keys", &self.keys.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(feature = "json")]
#[cfg_attr(nightly, doc(cfg(feature = "json")))]
impl serde::Serialize for File {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeStruct;
        use std::collections::BTreeMap;

        let mut headers: BTreeMap<&str, Vec<String>> = BTreeMap::new();
        for (name, value) in self.headers.iter() {
            headers
                .entry(name.as_str())
                .or_default()
                .push(String::from_utf8_lossy(value.as_bytes()).into_owned());
        }

        let mut state = serializer.serialize_struct("File", 5)?;
        state.serialize_field("name", &self.name)?;
        state.serialize_field("size", &self.size)?;
        state.serialize_field("extension", &self.extension)?;
        state.serialize_field("path", &self.path())?;
        state.serialize_field("headers", &headers)?;
        state.end()
    }
}

/// The error returned by [`File::move_to`], carrying the file that was not moved.
pub struct MoveError {
    pub error: io::Error,
    pub file: File,
}

impl Debug for MoveError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(self, f)
    }
}

impl Display for MoveError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "failed to move {:?}: {}", self.file.path(), self.error)
    }
}

impl std::error::Error for MoveError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

impl From<MoveError> for io::Error {
    fn from(err: MoveError) -> Self {
        err.error
    }
}
