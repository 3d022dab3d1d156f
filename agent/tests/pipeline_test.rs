//! End-to-end integration test: encoder -> writer -> store -> shipping
//! manager, wired the same way `main.rs` wires them, against a fake HTTP
//! transport instead of a real endpoint.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use cobalt_common::{
    CustomerId, Event, EventPayload, MetricDefinition, MetricId, MetricRef, MetricType,
    NoiseLevel, ProjectId, ReportDefinition, ReportId, ReportType, SystemProfile,
};
use cobalt_crypto::NoOpEncrypter;
use cobalt_encoder::{EncodeContext, Encoder, ObservationWriter};
use cobalt_shipping::{HttpClient, ShippingError, ShippingManager, UploadResponse, UploadScheduler};
use cobalt_store::{FileObservationStore, FileObservationStoreConfig, PosixFileSystem};
use rand::rngs::mock::StepRng;

struct RecordingHttpClient {
    posts: AtomicUsize,
}

#[async_trait]
impl HttpClient for RecordingHttpClient {
    async fn post(&self, _endpoint: &str, _body: Vec<u8>, _deadline: Duration) -> Result<UploadResponse, ShippingError> {
        self.posts.fetch_add(1, Ordering::SeqCst);
        Ok(UploadResponse {
            http_code: 200,
            next_request_wait: None,
        })
    }
}

/// Exercises basic RAPPOR encoding, noiseless, but carries the
/// observation all the way through the store and a shipping drain, which
/// is the path `main.rs` wires together.
#[tokio::test]
async fn encoded_observation_is_shipped_end_to_end() {
    let mut metric = MetricDefinition::new("ErrorOccurred", MetricType::EventOccurred, Some(100), None);
    let mut report = ReportDefinition::new("ErrorCountsByType", ReportType::SimpleOccurrenceCount);
    report.local_privacy_noise_level = Some(NoiseLevel::Small);
    metric.add_report(ReportId(123), report);

    let event = Event {
        day_index: 19_000,
        payload: EventPayload::EventOccurred { event_code: 42 },
    };

    let mut encoder = Encoder::new(Box::new(StepRng::new(0, 1)));
    let ctx = EncodeContext {
        metric_ref: MetricRef {
            customer_id: CustomerId(1),
            project_id: ProjectId(1),
            metric_id: MetricId(1),
        },
        report_id: ReportId(123),
        metric: &metric,
        report: metric.report(ReportId(123)).unwrap(),
        event: &event,
        client_secret: b"device-secret",
        system_profile: &SystemProfile::default(),
    };
    let (observation, metadata) = encoder.encode(&ctx).expect("encode succeeds");

    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(
        FileObservationStore::new(
            Arc::new(PosixFileSystem),
            dir.path().to_path_buf(),
            FileObservationStoreConfig {
                max_bytes_per_observation: 10_000,
                max_bytes_per_envelope: 10_000,
                max_bytes_total: 100_000,
            },
        )
        .unwrap(),
    );

    let writer = ObservationWriter::new(Box::new(NoOpEncrypter), Arc::clone(&store), None);
    writer.write(&observation, &metadata).expect("write succeeds");
    assert!(store.size_bytes() > 0, "observation is durably queued before any shipping happens");

    let http = Arc::new(RecordingHttpClient { posts: AtomicUsize::new(0) });
    let scheduler = UploadScheduler::new(
        Duration::ZERO,
        Duration::from_secs(3600),
        Duration::from_millis(10),
        Duration::from_secs(3600),
    )
    .unwrap();
    let manager = Arc::new(ShippingManager::new(
        Arc::clone(&store),
        http.clone(),
        Arc::new(NoOpEncrypter),
        "https://example.invalid/upload".into(),
        Duration::from_secs(5),
        scheduler,
    ));

    let worker = tokio::spawn(Arc::clone(&manager).run());
    manager.request_send_soon();

    for _ in 0..100 {
        if http.posts.load(Ordering::SeqCst) >= 1 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    manager.shutdown();
    let _ = worker.await;

    assert_eq!(http.posts.load(Ordering::SeqCst), 1);
    assert_eq!(manager.last_status(), Some(cobalt_shipping::ShipStatus::Success));
    assert_eq!(store.size_bytes(), 0, "shipped envelope is freed from the store");
}

/// Two loggers writing concurrently under the same store mutex
/// "The ObservationStore serializes writes ... behind a single mutex") must
/// not lose or interleave either logger's records.
#[tokio::test]
async fn concurrent_loggers_do_not_lose_observations() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(
        FileObservationStore::new(
            Arc::new(PosixFileSystem),
            dir.path().to_path_buf(),
            FileObservationStoreConfig {
                max_bytes_per_observation: 10_000,
                max_bytes_per_envelope: 1_000_000,
                max_bytes_total: 10_000_000,
            },
        )
        .unwrap(),
    );

    let mut handles = Vec::new();
    for logger_id in 0..4u32 {
        let store = Arc::clone(&store);
        handles.push(tokio::task::spawn_blocking(move || {
            let writer = ObservationWriter::new(Box::new(NoOpEncrypter), store, None);
            for i in 0..25u32 {
                let metadata = cobalt_common::ObservationMetadata {
                    customer_id: 1,
                    project_id: 1,
                    metric_id: logger_id,
                    report_id: 1,
                    day_index: 19_000,
                    system_profile: SystemProfile::default(),
                };
                let observation = cobalt_common::Observation {
                    random_id: [logger_id as u8; 8],
                    payload: cobalt_common::ObservationPayload::IntegerEventObservation {
                        event_code: i,
                        component_name_hash: Vec::new(),
                        value: i as i64,
                    },
                };
                writer.write(&observation, &metadata).unwrap();
            }
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    let holder = store.take_next_envelope_holder().unwrap().expect("all writes finalized into one active file or more");
    let total: usize = holder.envelope().batches.iter().map(|b| b.observations.len()).sum();
    assert_eq!(total, 100, "every logger's 25 observations survived concurrent writes");
}
