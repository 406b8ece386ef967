//! Scheduled deadline-sweep job.
//!
//! Loads the engine state snapshot, runs the semester deadline sweep (once,
//! or on an interval when configured), persists the snapshot again and logs
//! the events that would go out to the notification service.

use std::sync::Arc;
use std::time::Duration;

use thesis_supervision_config::{get_config, Config, ConfigError};
use thesis_supervision_core::event::ChannelSink;
use thesis_supervision_core::lifecycle::{ArtifactStore, Lifecycle};
use thesis_supervision_core::store::Store;
use thesis_supervision_core::{CoreError, FileId, RequestId};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(thiserror::Error, Debug)]
enum SweeperError {
    #[error("{0}")]
    Config(#[from] ConfigError),
    #[error("{0}")]
    Core(#[from] CoreError),
}

/// The sweep never completes requests, so the file-storage collaborator is
/// not wired up here.
struct NoArtifacts;

impl ArtifactStore for NoArtifacts {
    fn archivable_files(&self, _request: RequestId) -> Vec<FileId> {
        Vec::new()
    }

    fn mark_archived(&self, _request: RequestId, _files: &[FileId]) {}
}

fn sweep_once(config: &Config) -> Result<(), SweeperError> {
    let store = Store::load(&config.sweep.snapshot)?;
    let (sink, mut events) = ChannelSink::new();
    let lifecycle =
        Lifecycle::new(store.clone(), Arc::new(NoArtifacts)).with_sink(Arc::new(sink));

    let report = lifecycle.run_deadline_sweep();
    store.save(&config.sweep.snapshot)?;

    // Hand-off point for the notification service; until it consumes the
    // channel directly, the events land in the operational log.
    while let Ok(event) = events.try_recv() {
        info!(?event, "notification event");
    }

    for row in report.failures() {
        error!(semester = %row.key, error = row.error.as_deref().unwrap_or(""), "sweep row failed");
    }
    info!(
        rejected = report.total_rejected(),
        locked = report.total_locked(),
        "sweep done"
    );
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), SweeperError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = get_config()?;

    let Some(interval_secs) = config.sweep.interval_secs else {
        return sweep_once(&config);
    };

    let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));
    loop {
        tokio::select! {
            _ = interval.tick() => {
                if let Err(cause) = sweep_once(&config) {
                    // Keep the schedule alive; the next tick retries.
                    error!(%cause, "sweep run failed");
                }
            }
            () = shutdown_signal() => {
                info!("shutting down");
                return Ok(());
            }
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(cause) = tokio::signal::ctrl_c().await {
            error!(%cause, "failed to install Ctrl+C handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(cause) => error!(%cause, "failed to install signal handler"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}
