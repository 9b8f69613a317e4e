use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::error::Result;

/// Flat file storage addressed by file name.
pub trait BlobStore: Send + Sync {
    /// `None` when no blob of that name exists.
    fn get(&self, file: &str) -> Result<Option<Vec<u8>>>;

    fn put(&self, file: &str, bytes: &[u8]) -> Result<()>;
}

/// Blobs are files directly under `root`.
#[derive(Debug, Clone)]
pub struct DirectoryStore {
    root: PathBuf,
}

impl DirectoryStore {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        DirectoryStore { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl BlobStore for DirectoryStore {
    fn get(&self, file: &str) -> Result<Option<Vec<u8>>> {
        match fs::read(self.root.join(file)) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn put(&self, file: &str, bytes: &[u8]) -> Result<()> {
        fs::create_dir_all(&self.root)?;
        fs::write(self.root.join(file), bytes)?;
        Ok(())
    }
}
