use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use cobalt_common::{CobaltConfig, CobaltConfigFile, Event, EventPayload, MetricRef, SystemProfile};
use cobalt_crypto::{EncryptedMessageMaker, HybridEncrypter, NoOpEncrypter, PublicKey};
use cobalt_encoder::{EncodeContext, Encoder, ObservationWriter};
use cobalt_shipping::{ReqwestHttpClient, ShippingManager, UploadScheduler};
use cobalt_store::{FileObservationStore, FileObservationStoreConfig, PosixFileSystem};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::info;

mod config;

use config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "cobalt_agent=info".into()))
        .json()
        .init();

    dotenvy::dotenv().ok();
    let config = Config::from_env()?;

    info!(version = env!("CARGO_PKG_VERSION"), "starting cobalt agent");

    let registry_json = std::fs::read_to_string(&config.registry_path)
        .with_context(|| format!("reading registry file {}", config.registry_path.display()))?;
    let registry_file: CobaltConfigFile = serde_json::from_str(&registry_json).context("parsing registry file")?;
    let registry = Arc::new(CobaltConfig::from_file(registry_file));

    let store = Arc::new(FileObservationStore::new(
        Arc::new(PosixFileSystem),
        config.root_directory.clone(),
        FileObservationStoreConfig {
            max_bytes_per_observation: config.max_bytes_per_observation,
            max_bytes_per_envelope: config.max_bytes_per_envelope,
            max_bytes_total: config.max_bytes_total,
        },
    )?);
    info!(bytes = store.size_bytes(), "observation store recovered");

    log_agent_started(&registry, &store);

    let encrypter: Arc<dyn EncryptedMessageMaker> = match &config.recipient_key_hex {
        Some(hex_key) => {
            let bytes = hex::decode(hex_key).context("COBALT_RECIPIENT_KEY is not valid hex")?;
            let key: [u8; 32] = bytes.try_into().map_err(|_| anyhow::anyhow!("COBALT_RECIPIENT_KEY must decode to 32 bytes"))?;
            Arc::new(HybridEncrypter::new(PublicKey(key)))
        }
        None => {
            tracing::warn!("no COBALT_RECIPIENT_KEY configured, shipping envelopes unencrypted");
            Arc::new(NoOpEncrypter)
        }
    };

    let scheduler = UploadScheduler::new(config.min_interval, config.target_interval, config.initial_interval, config.max_interval)
        .context("invalid upload scheduler configuration")?;

    let manager = Arc::new(ShippingManager::new(
        Arc::clone(&store),
        Arc::new(ReqwestHttpClient::new()),
        encrypter,
        config.upload_endpoint.clone(),
        config.per_attempt_deadline,
        scheduler,
    ));

    let worker = tokio::spawn(Arc::clone(&manager).run());

    tokio::signal::ctrl_c().await.context("failed to install CTRL+C handler")?;
    info!("shutdown signal received, draining shipping manager");

    manager.shutdown();
    manager.wait_until_idle(Duration::from_secs(10)).await;
    worker.abort();

    info!("cobalt agent shutdown complete");
    Ok(())
}

/// Exercises the full encoder -> writer -> store path once at startup, if
/// the registry defines a `cobalt_agent/cobalt_agent/AgentStarted` metric
/// with an `AgentStartedCount` report. Registries that don't define it
/// simply skip this; the agent's actual event traffic comes from
/// in-process loggers sharing this store directory, not from this binary.
fn log_agent_started(registry: &CobaltConfig, store: &Arc<FileObservationStore>) {
    let Ok((customer_id, project_id, metric_id, report_id, metric, report)) =
        registry.report_by_name("cobalt_agent", "cobalt_agent", "AgentStarted", "AgentStartedCount")
    else {
        return;
    };

    let ctx = EncodeContext {
        metric_ref: MetricRef {
            customer_id,
            project_id,
            metric_id,
        },
        report_id,
        metric,
        report,
        event: &Event {
            day_index: days_since_epoch(),
            payload: EventPayload::EventOccurred { event_code: 0 },
        },
        client_secret: &[],
        system_profile: &SystemProfile::default(),
    };

    let mut encoder = Encoder::new(Box::new(StdRng::from_entropy()));
    match encoder.encode(&ctx) {
        Ok((observation, metadata)) => {
            let writer = ObservationWriter::new(Box::new(NoOpEncrypter), Arc::clone(store), None);
            if let Err(e) = writer.write(&observation, &metadata) {
                tracing::warn!(error = %e, "failed to record agent-started observation");
            }
        }
        Err(e) => tracing::warn!(error = %e, "failed to encode agent-started observation"),
    }
}

fn days_since_epoch() -> u32 {
    let secs = std::time::SystemTime::now().duration_since(std::time::UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or(0);
    (secs / 86_400) as u32
}
