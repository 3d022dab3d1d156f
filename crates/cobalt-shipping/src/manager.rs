//! Drains the observation store on a timer or on demand, shipping each
//! envelope over HTTP with retry.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use cobalt_crypto::EncryptedMessageMaker;
use cobalt_store::{EnvelopeHolder, FileObservationStore};
use tokio::sync::Notify;
use tracing::{error, info, warn};

use crate::http_client::HttpClient;
use crate::scheduler::UploadScheduler;

/// Outcome of the most recently attempted envelope upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShipStatus {
    Success,
    Failed(String),
    DeadlineExceeded,
}

pub struct ShippingManager {
    store: Arc<FileObservationStore>,
    http: Arc<dyn HttpClient>,
    encrypter: Arc<dyn EncryptedMessageMaker>,
    endpoint: String,
    per_attempt_deadline: Duration,
    scheduler: Mutex<UploadScheduler>,
    notify: Notify,
    idle_notify: Notify,
    shutdown: AtomicBool,
    busy: AtomicBool,
    last_sent: Mutex<Option<Instant>>,
    last_status: Mutex<Option<ShipStatus>>,
    /// An envelope returned to the store failed to merge with a later
    /// retry target on a previous pass; held here so the next retry
    /// attempt for the same data can fold it in before trying again.
    retained: Mutex<Option<EnvelopeHolder>>,
}

impl ShippingManager {
    #[must_use]
    pub fn new(
        store: Arc<FileObservationStore>,
        http: Arc<dyn HttpClient>,
        encrypter: Arc<dyn EncryptedMessageMaker>,
        endpoint: String,
        per_attempt_deadline: Duration,
        scheduler: UploadScheduler,
    ) -> Self {
        Self {
            store,
            http,
            encrypter,
            endpoint,
            per_attempt_deadline,
            scheduler: Mutex::new(scheduler),
            notify: Notify::new(),
            idle_notify: Notify::new(),
            shutdown: AtomicBool::new(false),
            busy: AtomicBool::new(false),
            last_sent: Mutex::new(None),
            last_status: Mutex::new(None),
            retained: Mutex::new(None),
        }
    }

    /// Wakes the worker immediately instead of waiting for the next
    /// scheduled interval. The `min_interval` floor still applies.
    pub fn request_send_soon(&self) {
        self.notify.notify_one();
    }

    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
        self.notify.notify_one();
    }

    #[must_use]
    pub fn last_status(&self) -> Option<ShipStatus> {
        self.last_status.lock().unwrap().clone()
    }

    /// Suspends the caller until the worker has no outstanding work, or
    /// `deadline` elapses; returns whether idle was actually observed.
    pub async fn wait_until_idle(&self, deadline: Duration) -> bool {
        if !self.busy.load(Ordering::SeqCst) {
            return true;
        }
        let notified = self.idle_notify.notified();
        tokio::select! {
            () = notified => true,
            () = tokio::time::sleep(deadline) => !self.busy.load(Ordering::SeqCst),
        }
    }

    /// The main worker loop: sleeps until the sooner of the scheduler's
    /// next interval or an explicit `request_send_soon`, then drains the
    /// store.
    pub async fn run(self: Arc<Self>) {
        info!("shipping manager started");
        loop {
            if self.shutdown.load(Ordering::SeqCst) {
                break;
            }

            let interval = self.scheduler.lock().unwrap().interval();

            tokio::select! {
                () = tokio::time::sleep(interval) => {}
                () = self.notify.notified() => {
                    let floor_wait = self.time_until_floor();
                    if !floor_wait.is_zero() {
                        tokio::time::sleep(floor_wait).await;
                    }
                }
            }

            if self.shutdown.load(Ordering::SeqCst) {
                break;
            }

            self.drain().await;
        }
        info!("shipping manager stopped");
    }

    fn time_until_floor(&self) -> Duration {
        let min_interval = self.scheduler.lock().unwrap().min_interval();
        let last_sent = *self.last_sent.lock().unwrap();
        match last_sent {
            Some(at) => min_interval.saturating_sub(at.elapsed()),
            None => Duration::ZERO,
        }
    }

    async fn drain(&self) {
        self.busy.store(true, Ordering::SeqCst);
        loop {
            if self.shutdown.load(Ordering::SeqCst) {
                break;
            }
            match self.store.take_next_envelope_holder() {
                Ok(Some(holder)) => {
                    *self.last_sent.lock().unwrap() = Some(Instant::now());
                    self.ship_one(holder).await;
                }
                Ok(None) => break,
                Err(e) => {
                    error!(error = %e, "failed to take envelope holder");
                    break;
                }
            }
        }
        self.busy.store(false, Ordering::SeqCst);
        self.idle_notify.notify_waiters();
    }

    #[tracing::instrument(skip(self, holder))]
    async fn ship_one(&self, holder: EnvelopeHolder) {
        let envelope = holder.envelope();
        let plaintext = match serde_json::to_vec(&envelope) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(error = %e, "failed to serialize envelope, retrying later");
                *self.last_status.lock().unwrap() = Some(ShipStatus::Failed(e.to_string()));
                self.retry(holder);
                return;
            }
        };

        let encrypted = match self.encrypter.encrypt(&plaintext) {
            Ok(message) => message,
            Err(e) => {
                warn!(error = %e, "failed to encrypt envelope, retrying later");
                *self.last_status.lock().unwrap() = Some(ShipStatus::Failed(e.to_string()));
                self.retry(holder);
                return;
            }
        };

        match self
            .http
            .post(&self.endpoint, encrypted.ciphertext, self.per_attempt_deadline)
            .await
        {
            Ok(response) if response.http_code == 200 => {
                *self.last_status.lock().unwrap() = Some(ShipStatus::Success);
                drop(holder);
            }
            Ok(response) => {
                warn!(http_code = response.http_code, "envelope upload rejected, retrying");
                *self.last_status.lock().unwrap() =
                    Some(ShipStatus::Failed(format!("http {}", response.http_code)));
                self.retry(holder);
            }
            Err(crate::error::ShippingError::DeadlineExceeded) => {
                warn!("envelope upload timed out, retrying");
                *self.last_status.lock().unwrap() = Some(ShipStatus::DeadlineExceeded);
                self.retry(holder);
            }
            Err(e) => {
                warn!(error = %e, "envelope upload failed, retrying");
                *self.last_status.lock().unwrap() = Some(ShipStatus::Failed(e.to_string()));
                self.retry(holder);
            }
        }
    }

    fn retry(&self, holder: EnvelopeHolder) {
        let mut retained = self.retained.lock().unwrap();
        let merged = match retained.take() {
            Some(previous) => previous.merge(holder),
            None => holder,
        };
        drop(retained);
        self.store.return_envelope_holder(merged);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use cobalt_common::{ObservationMetadata, SystemProfile};
    use cobalt_crypto::NoOpEncrypter;
    use cobalt_store::{FileObservationStoreConfig, PosixFileSystem};
    use crate::error::ShippingError;
    use crate::http_client::UploadResponse;
    use std::sync::atomic::AtomicUsize;

    struct CountingHttpClient {
        calls: AtomicUsize,
        fail_first: usize,
    }

    #[async_trait]
    impl HttpClient for CountingHttpClient {
        async fn post(&self, _endpoint: &str, _body: Vec<u8>, _deadline: Duration) -> Result<UploadResponse, ShippingError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.fail_first {
                Ok(UploadResponse {
                    http_code: 500,
                    next_request_wait: None,
                })
            } else {
                Ok(UploadResponse {
                    http_code: 200,
                    next_request_wait: None,
                })
            }
        }
    }

    fn build_store(root: std::path::PathBuf) -> Arc<FileObservationStore> {
        Arc::new(
            FileObservationStore::new(
                Arc::new(PosixFileSystem),
                root,
                FileObservationStoreConfig {
                    max_bytes_per_observation: 1_000,
                    max_bytes_per_envelope: 10_000,
                    max_bytes_total: 100_000,
                },
            )
            .unwrap(),
        )
    }

    fn scheduler() -> UploadScheduler {
        UploadScheduler::new(
            Duration::ZERO,
            Duration::from_millis(50),
            Duration::from_millis(10),
            Duration::from_secs(1),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn drain_ships_a_finalized_envelope() {
        let dir = tempfile::tempdir().unwrap();
        let store = build_store(dir.path().to_path_buf());
        store
            .add_encrypted_observation(
                &ObservationMetadata {
                    customer_id: 1,
                    project_id: 1,
                    metric_id: 1,
                    report_id: 1,
                    day_index: 19000,
                    system_profile: SystemProfile::default(),
                },
                &cobalt_common::EncryptedMessage {
                    ciphertext: vec![1, 2, 3],
                },
            )
            .unwrap();
        store.take_next_envelope_holder().unwrap(); // force finalize via side effect, then return
        let holder = store.take_next_envelope_holder().unwrap();
        assert!(holder.is_none(), "only one finalized envelope exists");

        // Re-add so the manager itself can observe and drain a finalized file.
        store
            .add_encrypted_observation(
                &ObservationMetadata {
                    customer_id: 1,
                    project_id: 1,
                    metric_id: 2,
                    report_id: 1,
                    day_index: 19000,
                    system_profile: SystemProfile::default(),
                },
                &cobalt_common::EncryptedMessage {
                    ciphertext: vec![4, 5, 6],
                },
            )
            .unwrap();

        let http = Arc::new(CountingHttpClient {
            calls: AtomicUsize::new(0),
            fail_first: 0,
        });
        let manager = Arc::new(ShippingManager::new(
            Arc::clone(&store),
            http.clone(),
            Arc::new(NoOpEncrypter),
            "https://example.invalid/upload".into(),
            Duration::from_secs(1),
            scheduler(),
        ));

        manager.drain().await;
        assert!(http.calls.load(Ordering::SeqCst) >= 1);
        assert_eq!(manager.last_status(), Some(ShipStatus::Success));
    }

    #[tokio::test]
    async fn failed_upload_returns_envelope_for_retry() {
        let dir = tempfile::tempdir().unwrap();
        let store = build_store(dir.path().to_path_buf());
        store
            .add_encrypted_observation(
                &ObservationMetadata {
                    customer_id: 1,
                    project_id: 1,
                    metric_id: 1,
                    report_id: 1,
                    day_index: 19000,
                    system_profile: SystemProfile::default(),
                },
                &cobalt_common::EncryptedMessage {
                    ciphertext: vec![1, 2, 3],
                },
            )
            .unwrap();

        let http = Arc::new(CountingHttpClient {
            calls: AtomicUsize::new(0),
            fail_first: 100,
        });
        let manager = Arc::new(ShippingManager::new(
            Arc::clone(&store),
            http.clone(),
            Arc::new(NoOpEncrypter),
            "https://example.invalid/upload".into(),
            Duration::from_secs(1),
            scheduler(),
        ));

        manager.drain().await;
        assert!(matches!(manager.last_status(), Some(ShipStatus::Failed(_))));
        // The envelope was returned to the store rather than deleted.
        assert!(store.size_bytes() > 0);
    }
}
