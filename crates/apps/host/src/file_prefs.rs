//! Filesystem-backed preference storage: one file per key.

use std::io::ErrorKind;
use std::path::PathBuf;

use viewport::{PrefsError, PrefsStore};

#[derive(Debug)]
pub struct FilePrefsStore {
    dir: PathBuf,
}

impl FilePrefsStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(key)
    }
}

impl PrefsStore for FilePrefsStore {
    fn get(&self, key: &str) -> Result<Option<String>, PrefsError> {
        match std::fs::read_to_string(self.path_for(key)) {
            Ok(value) => Ok(Some(value)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(PrefsError::Io(err.to_string())),
        }
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), PrefsError> {
        std::fs::create_dir_all(&self.dir).map_err(|e| PrefsError::Io(e.to_string()))?;
        std::fs::write(self.path_for(key), value).map_err(|e| PrefsError::Io(e.to_string()))
    }

    fn remove(&mut self, key: &str) -> Result<(), PrefsError> {
        match std::fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(PrefsError::Io(err.to_string())),
        }
    }
}
