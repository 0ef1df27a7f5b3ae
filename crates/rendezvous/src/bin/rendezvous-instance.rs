//! Standalone instance process.
//!
//! Start `TEST_INSTANCE_COUNT` copies of this binary pointing at the same
//! `RENDEZVOUS_SYNC_DB`. They rendezvous through SQLite and connect over TCP.

use std::sync::Arc;

use anyhow::{anyhow, Context};
use tracing_subscriber::EnvFilter;

use rendezvous::net::{TcpConfig, TcpEndpointFactory};
use rendezvous::sync::{SqliteSyncConfig, SqliteSyncService, SyncClient};
use rendezvous::{Instance, InstanceConfig, RunEnv, RunParams, TracingSink};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let params = RunParams::from_env().context("reading run parameters")?;
    tracing::info!(
        n = params.participant_count.get(),
        run = %params.run_id,
        db = %params.sync_db.display(),
        "starting instance"
    );

    let backend = SqliteSyncService::open(
        &params.sync_db,
        SqliteSyncConfig {
            run_id: params.run_id.clone(),
            ..SqliteSyncConfig::default()
        },
    )
    .with_context(|| format!("opening sync database {}", params.sync_db.display()))?;

    let factory = TcpEndpointFactory::new(TcpConfig {
        listen_ip: params.listen_ip,
        ..TcpConfig::default()
    });

    let mut config = InstanceConfig::default();
    if let Some(delay) = params.settle_delay {
        config = config.with_settle_delay(delay);
    }

    let instance = Instance::new(
        SyncClient::new(Arc::new(backend)),
        factory,
        RunEnv::new(params.participant_count, Arc::new(TracingSink)),
        config,
    );

    // Dropping the run on timeout hands teardown to a spawned task.
    let outcome = tokio::time::timeout(params.timeout, instance.run())
        .await
        .map_err(|_| anyhow!("run did not finish within {:?}", params.timeout))?;

    if let Some(status) = &outcome.teardown {
        if !status.is_clean() {
            tracing::warn!(%status, "teardown did not complete cleanly");
        }
    }

    let report = outcome.into_result().context("instance run failed")?;
    tracing::info!(
        seq = report.seq.get(),
        role = %report.role,
        peer_id = %report.peer_id,
        "instance finished"
    );
    Ok(())
}
