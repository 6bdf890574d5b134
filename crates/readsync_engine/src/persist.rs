//! State files kept under the client's data directory.
//!
//! Each file is small and rewritten whole (the award ledger is one), so a
//! replace goes through a sibling temp file and a rename.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use engine_logging::engine_debug;
use tempfile::NamedTempFile;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("data directory {path:?} is unusable: {reason}")]
    DataDir { path: PathBuf, reason: String },
    #[error("could not read {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("could not replace {path:?}: {source}")]
    Replace {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("could not remove {path:?}: {source}")]
    Remove {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// One directory of named state files.
#[derive(Debug, Clone)]
pub struct StateDir {
    root: PathBuf,
}

impl StateDir {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    /// Create the directory if needed and check a temp file can be made in it.
    pub fn ensure(&self) -> Result<(), PersistError> {
        let unusable = |reason: String| PersistError::DataDir {
            path: self.root.clone(),
            reason,
        };
        match fs::metadata(&self.root) {
            Ok(meta) if !meta.is_dir() => return Err(unusable("not a directory".into())),
            Ok(_) => {}
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                fs::create_dir_all(&self.root).map_err(|e| unusable(e.to_string()))?;
                engine_debug!("Created data directory {:?}", self.root);
            }
            Err(err) => return Err(unusable(err.to_string())),
        }
        NamedTempFile::new_in(&self.root).map_err(|e| unusable(e.to_string()))?;
        Ok(())
    }

    /// Contents of `name`, or `None` when no such file has been written yet.
    pub fn read(&self, name: &str) -> Result<Option<String>, PersistError> {
        let path = self.path(name);
        match fs::read_to_string(&path) {
            Ok(text) => Ok(Some(text)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(PersistError::Read { path, source }),
        }
    }

    /// Replace `name` with `content`. Readers see the old file or the new one,
    /// never a torn write.
    pub fn replace(&self, name: &str, content: &str) -> Result<PathBuf, PersistError> {
        self.ensure()?;
        let target = self.path(name);
        let failed = |source: io::Error| PersistError::Replace {
            path: target.clone(),
            source,
        };
        let mut tmp = NamedTempFile::new_in(&self.root).map_err(failed)?;
        tmp.write_all(content.as_bytes()).map_err(failed)?;
        tmp.as_file_mut().sync_all().map_err(failed)?;
        tmp.persist(&target).map_err(|e| failed(e.error))?;
        Ok(target)
    }

    /// Delete `name`. Returns `false` when it was already gone.
    pub fn remove(&self, name: &str) -> Result<bool, PersistError> {
        let path = self.path(name);
        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(source) => Err(PersistError::Remove { path, source }),
        }
    }
}
