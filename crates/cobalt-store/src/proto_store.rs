//! A single-message persistent store with crash-safe update, for small
//! long-lived configuration snapshots. Three file names are used:
//! `primary`, `primary.tmp`, `primary.override`.

use std::marker::PhantomData;
use std::path::PathBuf;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::StoreError;
use crate::fs::FileSystem;

pub struct ConsistentProtoStore<M> {
    fs: Arc<dyn FileSystem>,
    primary: PathBuf,
    tmp: PathBuf,
    override_path: PathBuf,
    _message: PhantomData<fn() -> M>,
}

impl<M: Serialize + DeserializeOwned> ConsistentProtoStore<M> {
    #[must_use]
    pub fn new(fs: Arc<dyn FileSystem>, root_directory: PathBuf) -> Self {
        Self {
            primary: root_directory.join("primary"),
            tmp: root_directory.join("primary.tmp"),
            override_path: root_directory.join("primary.override"),
            fs,
            _message: PhantomData,
        }
    }

    /// Persists `message`, surviving a crash at any single step.
    ///
    /// # Errors
    /// Returns [`StoreError::WriteFailed`] on I/O errors.
    pub fn write(&self, message: &M) -> Result<(), StoreError> {
        self.finish_interrupted_write()?;

        let bytes = serde_json::to_vec(message)?;
        self.fs.write(&self.tmp, &bytes)?;
        self.fs.rename(&self.tmp, &self.override_path)?;
        self.fs.delete(&self.primary)?;
        self.fs.rename(&self.override_path, &self.primary)?;
        Ok(())
    }

    /// Finishes a write interrupted after step 3 (`tmp -> override`
    /// succeeded, but `primary` was never replaced).
    fn finish_interrupted_write(&self) -> Result<(), StoreError> {
        if self.fs.exists(&self.override_path) {
            self.fs.delete(&self.primary)?;
            self.fs.rename(&self.override_path, &self.primary)?;
        }
        Ok(())
    }

    /// # Errors
    /// - [`StoreError::NotFound`] if neither `override` nor `primary` exist.
    /// - [`StoreError::InvalidArguments`] if `primary` exists but is not
    ///   valid data for `M`.
    /// - [`StoreError::DataLoss`] if `primary` is present but truncated.
    pub fn read(&self) -> Result<M, StoreError> {
        if self.fs.exists(&self.override_path) {
            if let Ok(bytes) = self.fs.read(&self.override_path) {
                if let Ok(message) = serde_json::from_slice(&bytes) {
                    return Ok(message);
                }
            }
        }

        if !self.fs.exists(&self.primary) {
            return Err(StoreError::NotFound);
        }

        let bytes = self.fs.read(&self.primary)?;
        serde_json::from_slice(&bytes).map_err(|err| {
            if err.classify() == serde_json::error::Category::Eof {
                StoreError::DataLoss(err.to_string())
            } else {
                StoreError::InvalidArguments(err.to_string())
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::PosixFileSystem;
    use serde::Deserialize;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Snapshot {
        value: u32,
    }

    fn store(root: PathBuf) -> ConsistentProtoStore<Snapshot> {
        ConsistentProtoStore::new(Arc::new(PosixFileSystem), root)
    }

    #[test]
    fn write_then_read_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path().to_path_buf());
        let message = Snapshot { value: 7 };
        store.write(&message).unwrap();
        assert_eq!(store.read().unwrap(), message);
    }

    #[test]
    fn missing_primary_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path().to_path_buf());
        assert!(matches!(store.read().unwrap_err(), StoreError::NotFound));
    }

    #[test]
    fn stray_override_finishes_on_next_write() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path().to_path_buf());
        store.write(&Snapshot { value: 1 }).unwrap();

        // Simulate a crash right after `tmp -> override` for a second write.
        let fs = PosixFileSystem;
        let bytes = serde_json::to_vec(&Snapshot { value: 2 }).unwrap();
        fs.write(&dir.path().join("primary.override"), &bytes).unwrap();

        // A stray override still parses, so read() prefers it immediately.
        assert_eq!(store.read().unwrap(), Snapshot { value: 2 });

        store.write(&Snapshot { value: 3 }).unwrap();
        assert_eq!(store.read().unwrap(), Snapshot { value: 3 });
        assert!(!dir.path().join("primary.override").exists());
    }

    #[test]
    fn truncated_primary_is_data_loss() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path().to_path_buf());
        store.write(&Snapshot { value: 1 }).unwrap();

        let fs = PosixFileSystem;
        fs.write(&dir.path().join("primary"), b"{\"value\":").unwrap();

        assert!(matches!(store.read().unwrap_err(), StoreError::DataLoss(_)));
    }
}
