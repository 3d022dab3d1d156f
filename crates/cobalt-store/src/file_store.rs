//! A crash-safe, byte-bounded queue of encrypted observations, persisted as
//! length-delimited records inside data files.

use std::collections::{BTreeSet, HashMap};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use cobalt_common::{EncryptedMessage, ObservationMetadata};
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};

use crate::error::StoreError;
use crate::fs::FileSystem;
use crate::holder::EnvelopeHolder;
use crate::naming;
use crate::record;

/// Byte budgets governing one store instance.
#[derive(Debug, Clone, Copy)]
pub struct FileObservationStoreConfig {
    pub max_bytes_per_observation: u64,
    pub max_bytes_per_envelope: u64,
    pub max_bytes_total: u64,
}

struct StoreState {
    active_bytes: u64,
    last_metadata_bytes: Option<Vec<u8>>,
    available: BTreeSet<String>,
    available_sizes: HashMap<String, u64>,
    available_bytes: u64,
}

pub struct FileObservationStore {
    fs: Arc<dyn FileSystem>,
    root_directory: PathBuf,
    config: FileObservationStoreConfig,
    rng: Mutex<Box<dyn RngCore + Send>>,
    state: Mutex<StoreState>,
}

impl FileObservationStore {
    /// # Errors
    /// Returns [`StoreError::WriteFailed`] if the root directory or
    /// existing files cannot be inspected.
    pub fn new(
        fs: Arc<dyn FileSystem>,
        root_directory: PathBuf,
        config: FileObservationStoreConfig,
    ) -> Result<Self, StoreError> {
        Self::new_with_rng(fs, root_directory, config, Box::new(StdRng::from_entropy()))
    }

    /// As [`Self::new`], but with an injected RNG for deterministic file
    /// naming in tests.
    ///
    /// # Errors
    /// See [`Self::new`].
    pub fn new_with_rng(
        fs: Arc<dyn FileSystem>,
        root_directory: PathBuf,
        config: FileObservationStoreConfig,
        rng: Box<dyn RngCore + Send>,
    ) -> Result<Self, StoreError> {
        fs.make_directory(&root_directory)?;

        let mut available = BTreeSet::new();
        let mut available_sizes = HashMap::new();
        let mut available_bytes = 0u64;

        for name in fs.list_files(&root_directory)? {
            if naming::is_finalized_name(&name) {
                let size = fs.file_size(&root_directory.join(&name))?;
                available.insert(name.clone());
                available_sizes.insert(name, size);
                available_bytes += size;
            }
        }

        let store = Self {
            fs,
            root_directory,
            config,
            rng: Mutex::new(rng),
            state: Mutex::new(StoreState {
                active_bytes: 0,
                last_metadata_bytes: None,
                available,
                available_sizes,
                available_bytes,
            }),
        };

        // Crash recovery: at most one active file may exist at a time.
        let in_progress = store.root_directory.join(naming::IN_PROGRESS_NAME);
        if store.fs.exists(&in_progress) {
            let size = store.fs.file_size(&in_progress)?;
            store.state.lock().unwrap().active_bytes = size;
            store.finalize_active()?;
        }

        Ok(store)
    }

    /// Sum of on-disk bytes of files the store currently owns: the active
    /// file plus finalized files not currently held by an
    /// [`EnvelopeHolder`].
    #[must_use]
    pub fn size_bytes(&self) -> u64 {
        let state = self.state.lock().unwrap();
        state.active_bytes + state.available_bytes
    }

    /// # Errors
    /// - [`StoreError::ObservationTooBig`] if the serialized observation
    ///   exceeds `max_bytes_per_observation`.
    /// - [`StoreError::StoreFull`] if appending would push the active
    ///   file's size past `max_bytes_total`.
    /// - [`StoreError::WriteFailed`] on any underlying I/O error.
    #[tracing::instrument(skip(self, metadata, observation))]
    pub fn add_encrypted_observation(
        &self,
        metadata: &ObservationMetadata,
        observation: &EncryptedMessage,
    ) -> Result<(), StoreError> {
        let metadata_bytes = metadata.canonical_bytes()?;
        let observation_bytes = serde_json::to_vec(observation)?;

        if observation_bytes.len() as u64 > self.config.max_bytes_per_observation {
            return Err(StoreError::ObservationTooBig);
        }

        let mut state = self.state.lock().unwrap();

        let dirty = state.last_metadata_bytes.as_deref() != Some(metadata_bytes.as_slice());
        let metadata_record_size = if dirty {
            record::FRAME_OVERHEAD + metadata_bytes.len() as u64
        } else {
            0
        };
        let observation_record_size = record::FRAME_OVERHEAD + observation_bytes.len() as u64;
        let pending = metadata_record_size + observation_record_size;

        if state.active_bytes + pending > self.config.max_bytes_total {
            return Err(StoreError::StoreFull);
        }

        let in_progress = self.root_directory.join(naming::IN_PROGRESS_NAME);

        if dirty {
            let frame = record::encode(record::METADATA_KIND, &metadata_bytes);
            self.fs.append(&in_progress, &frame)?;
            state.active_bytes += frame.len() as u64;
            state.last_metadata_bytes = Some(metadata_bytes);
        }

        let frame = record::encode(record::OBSERVATION_KIND, &observation_bytes);
        self.fs.append(&in_progress, &frame)?;
        state.active_bytes += frame.len() as u64;

        let should_finalize = state.active_bytes >= self.config.max_bytes_per_envelope;
        drop(state);

        if should_finalize {
            self.finalize_active()?;
        }

        Ok(())
    }

    /// Finalizes the active file if non-empty (renaming it to a finalized
    /// name) or deletes it if empty.
    fn finalize_active(&self) -> Result<(), StoreError> {
        let in_progress = self.root_directory.join(naming::IN_PROGRESS_NAME);
        let mut state = self.state.lock().unwrap();

        if state.active_bytes == 0 {
            if self.fs.exists(&in_progress) {
                self.fs.delete(&in_progress)?;
            }
            state.last_metadata_bytes = None;
            return Ok(());
        }

        let name = {
            let mut rng = self.rng.lock().unwrap();
            naming::generate_finalized_name(&mut **rng)
        };
        let finalized_path = self.root_directory.join(&name);
        self.fs.rename(&in_progress, &finalized_path)?;

        let size = state.active_bytes;
        state.available.insert(name.clone());
        state.available_sizes.insert(name, size);
        state.available_bytes += size;
        state.active_bytes = 0;
        state.last_metadata_bytes = None;

        Ok(())
    }

    /// Returns the oldest finalized envelope (lexicographic order on name,
    /// which sorts chronologically by construction), finalizing the
    /// active file first if nothing else is available.
    ///
    /// # Errors
    /// Propagates I/O errors from finalizing the active file.
    pub fn take_next_envelope_holder(&self) -> Result<Option<EnvelopeHolder>, StoreError> {
        let needs_finalize = {
            let state = self.state.lock().unwrap();
            state.available.is_empty() && state.active_bytes > 0
        };
        if needs_finalize {
            self.finalize_active()?;
        }

        let mut state = self.state.lock().unwrap();
        let Some(name) = state.available.iter().next().cloned() else {
            return Ok(None);
        };
        state.available.remove(&name);
        let size = state.available_sizes.remove(&name).unwrap_or(0);
        state.available_bytes -= size;
        drop(state);

        Ok(Some(EnvelopeHolder::new(
            Arc::clone(&self.fs),
            self.root_directory.clone(),
            vec![(name, size)],
        )))
    }

    /// Reinstates a holder's file names into the available pool. The
    /// holder is consumed without deleting its files.
    pub fn return_envelope_holder(&self, holder: EnvelopeHolder) {
        let files = holder.release();
        let mut state = self.state.lock().unwrap();
        for (name, size) in files {
            state.available.insert(name.clone());
            state.available_sizes.insert(name, size);
            state.available_bytes += size;
        }
    }
}
