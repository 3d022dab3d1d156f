//! A thin adapter between the encoder and the observation store: serialize,
//! encrypt, append, notify. All failures propagate as `Other`.

use std::sync::Arc;

use cobalt_common::{Observation, ObservationMetadata};
use cobalt_crypto::EncryptedMessageMaker;
use cobalt_store::FileObservationStore;

use crate::error::EncoderError;

/// Notified once an observation has been durably appended to the store.
pub trait UpdateRecipient: Send + Sync {
    fn on_observation_added(&self);
}

pub struct ObservationWriter {
    encrypter: Box<dyn EncryptedMessageMaker>,
    store: Arc<FileObservationStore>,
    update_recipient: Option<Arc<dyn UpdateRecipient>>,
}

impl ObservationWriter {
    #[must_use]
    pub fn new(
        encrypter: Box<dyn EncryptedMessageMaker>,
        store: Arc<FileObservationStore>,
        update_recipient: Option<Arc<dyn UpdateRecipient>>,
    ) -> Self {
        Self {
            encrypter,
            store,
            update_recipient,
        }
    }

    /// # Errors
    /// Returns [`EncoderError::Other`] wrapping whatever step failed:
    /// serialization, encryption, or the store append.
    #[tracing::instrument(skip(self, observation))]
    pub fn write(
        &self,
        observation: &Observation,
        metadata: &ObservationMetadata,
    ) -> Result<(), EncoderError> {
        let plaintext = serde_json::to_vec(observation)
            .map_err(|e| EncoderError::Other(format!("failed to serialize observation: {e}")))?;

        let encrypted = self
            .encrypter
            .encrypt(&plaintext)
            .map_err(|e| EncoderError::Other(format!("failed to encrypt observation: {e}")))?;

        self.store
            .add_encrypted_observation(metadata, &encrypted)
            .map_err(|e| EncoderError::Other(format!("failed to append observation: {e}")))?;

        if let Some(recipient) = &self.update_recipient {
            recipient.on_observation_added();
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cobalt_common::SystemProfile;
    use cobalt_crypto::NoOpEncrypter;
    use cobalt_store::{FileObservationStoreConfig, PosixFileSystem};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingRecipient(AtomicUsize);

    impl UpdateRecipient for CountingRecipient {
        fn on_observation_added(&self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn write_appends_and_notifies() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(
            FileObservationStore::new(
                Arc::new(PosixFileSystem),
                dir.path().to_path_buf(),
                FileObservationStoreConfig {
                    max_bytes_per_observation: 10_000,
                    max_bytes_per_envelope: 10_000,
                    max_bytes_total: 10_000,
                },
            )
            .unwrap(),
        );
        let recipient = Arc::new(CountingRecipient(AtomicUsize::new(0)));
        let writer = ObservationWriter::new(Box::new(NoOpEncrypter), Arc::clone(&store), Some(recipient.clone()));

        let observation = Observation {
            random_id: [1; 8],
            payload: cobalt_common::ObservationPayload::CustomObservation(cobalt_common::CustomObservation {
                values: std::collections::BTreeMap::new(),
            }),
        };
        let metadata = ObservationMetadata {
            customer_id: 1,
            project_id: 1,
            metric_id: 1,
            report_id: 1,
            day_index: 1,
            system_profile: SystemProfile::default(),
        };

        writer.write(&observation, &metadata).unwrap();
        assert_eq!(recipient.0.load(Ordering::SeqCst), 1);
        assert!(store.size_bytes() > 0);
    }
}
