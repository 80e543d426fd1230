//! Directory-backed storage backend.

use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;

use super::{Storage, StorageError};

/// Extension of the files holding stored values.
const FILE_EXTENSION: &str = "json";

/// Durable storage keeping one file per key in a directory.
///
/// File names are the URL-encoded key, so identity-scoped keys such as
/// `cart_a@x.com` map to `cart_a%40x.com.json`. Writes land in a temporary
/// sibling file first and are renamed into place.
#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    /// Open storage rooted at `dir`, creating the directory if needed.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Io` if the directory cannot be created.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|source| StorageError::Io {
            key: String::new(),
            source,
        })?;
        tracing::debug!(dir = %dir.display(), "Opened file storage");
        Ok(Self { dir })
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StorageError> {
        if key.is_empty() {
            return Err(StorageError::InvalidKey(key.to_owned()));
        }
        let file_name = format!("{}.{FILE_EXTENSION}", urlencoding::encode(key));
        Ok(self.dir.join(file_name))
    }
}

impl Storage for FileStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        let path = self.path_for(key)?;
        match fs::read_to_string(&path) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(source) => Err(StorageError::Io {
                key: key.to_owned(),
                source,
            }),
        }
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let path = self.path_for(key)?;
        let tmp_path = path.with_extension(format!("{FILE_EXTENSION}.tmp"));
        let io_err = |source| StorageError::Io {
            key: key.to_owned(),
            source,
        };

        fs::write(&tmp_path, value).map_err(io_err)?;
        fs::rename(&tmp_path, &path).map_err(io_err)
    }

    fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        let path = self.path_for(key)?;
        match fs::remove_file(&path) {
            Err(e) if e.kind() != ErrorKind::NotFound => Err(StorageError::Io {
                key: key.to_owned(),
                source: e,
            }),
            _ => Ok(()),
        }
    }
}
