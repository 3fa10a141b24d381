//! Serve mode
//!
//! Opens storage (restoring a snapshot first when configured), hands the
//! repository ports to the business layer and waits for Ctrl+C.

use anyhow::{Context, Result};
use tracing::info;

use crate::analytics::EventRecorder;
use crate::config::StaticConfig;
use crate::runtime::lifetime::{listen_for_shutdown, prepare_storage, shutdown_storage};

pub async fn run_serve(config: &StaticConfig) -> Result<()> {
    let ctx = prepare_storage(config).await?;

    let repositories = ctx.storage.repositories();
    let recorder = EventRecorder::from_config(repositories.analytics.clone(), &config.analytics);

    let users = repositories
        .users
        .list_all()
        .await
        .context("Storage readiness check failed")?;
    info!(
        "driplnk ready: {} backend, {} users",
        ctx.storage.kind().name(),
        users.len()
    );

    listen_for_shutdown().await;

    drop(recorder);
    drop(repositories);
    shutdown_storage(ctx).await
}
