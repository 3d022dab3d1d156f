//! `EnvelopeHolder`: exclusive ownership of a set of finalized data files.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use cobalt_common::{EncryptedMessage, Envelope, EnvelopeBatch, ObservationMetadata};

use crate::fs::FileSystem;
use crate::record::{self, METADATA_KIND, OBSERVATION_KIND};

/// Owns a set of file names exclusively. Dropping it deletes the
/// underlying files; the store never retains a pointer to a holder once
/// one has been taken, so returning ownership (`FileObservationStore::
/// return_envelope_holder`) is the only way those names re-enter the
/// available pool.
pub struct EnvelopeHolder {
    fs: Arc<dyn FileSystem>,
    root: PathBuf,
    files: Vec<(String, u64)>,
    released: bool,
}

impl EnvelopeHolder {
    pub(crate) fn new(fs: Arc<dyn FileSystem>, root: PathBuf, files: Vec<(String, u64)>) -> Self {
        Self {
            fs,
            root,
            files,
            released: false,
        }
    }

    #[must_use]
    pub fn file_names(&self) -> Vec<&str> {
        self.files.iter().map(|(name, _)| name.as_str()).collect()
    }

    #[must_use]
    pub fn total_bytes(&self) -> u64 {
        self.files.iter().map(|(_, size)| size).sum()
    }

    /// Unions this holder's file-name set with `other`'s, consuming both.
    #[must_use]
    pub fn merge(mut self, mut other: Self) -> Self {
        self.files.append(&mut other.files);
        other.released = true;
        self
    }

    /// Parses every owned file and groups observations into batches keyed
    /// by serialized metadata. A parse failure truncates that file's
    /// contribution at the last complete record; subsequent files in this
    /// holder are still read. Batches with byte-identical metadata merge
    /// regardless of which file, or what order, they were read in.
    #[must_use]
    pub fn envelope(&self) -> Envelope {
        let mut batches: Vec<EnvelopeBatch> = Vec::new();
        let mut index_by_metadata: HashMap<Vec<u8>, usize> = HashMap::new();

        for (name, _) in &self.files {
            let path = self.root.join(name);
            let Ok(bytes) = self.fs.read(&path) else {
                continue;
            };

            let mut current: Option<(Vec<u8>, ObservationMetadata)> = None;
            for (kind, payload) in record::decode_all(&bytes) {
                match kind {
                    METADATA_KIND => match serde_json::from_slice::<ObservationMetadata>(&payload) {
                        Ok(metadata) => current = Some((payload, metadata)),
                        Err(_) => break,
                    },
                    OBSERVATION_KIND => {
                        let Some((metadata_bytes, metadata)) = current.clone() else {
                            break;
                        };
                        match serde_json::from_slice::<EncryptedMessage>(&payload) {
                            Ok(observation) => {
                                let index = *index_by_metadata.entry(metadata_bytes).or_insert_with(|| {
                                    batches.push(EnvelopeBatch {
                                        metadata: metadata.clone(),
                                        observations: Vec::new(),
                                    });
                                    batches.len() - 1
                                });
                                batches[index].observations.push(observation);
                            }
                            Err(_) => break,
                        }
                    }
                    _ => break,
                }
            }
        }

        Envelope { batches }
    }

    pub(crate) fn release(mut self) -> Vec<(String, u64)> {
        self.released = true;
        std::mem::take(&mut self.files)
    }
}

impl Drop for EnvelopeHolder {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        for (name, _) in &self.files {
            let _ = self.fs.delete(&self.root.join(name));
        }
    }
}
