//! Subscriber setup: stderr always, plus an optional log file for `serve`.

use anyhow::{Context, Result};
use chrono::Utc;
use std::path::Path;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Non-blocking writer for `{log_dir}/rota-{timestamp}.log`.
///
/// The guard must outlive every log event, or buffered lines are lost.
pub(crate) fn create_log_writer(log_dir: &Path) -> Result<(NonBlocking, WorkerGuard)> {
    std::fs::create_dir_all(log_dir)
        .with_context(|| format!("Failed to create log dir: {}", log_dir.display()))?;

    let file_name = format!("rota-{}.log", Utc::now().format("%Y%m%d-%H%M%S"));
    let file_appender = tracing_appender::rolling::never(log_dir, file_name);
    Ok(tracing_appender::non_blocking(file_appender))
}

fn env_filter(default_directive: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive))
}

/// Initialize tracing once. `RUST_LOG` overrides `default_directive`.
pub(crate) fn init(default_directive: &str, log_dir: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let stderr_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    let Some(log_dir) = log_dir else {
        tracing_subscriber::registry()
            .with(env_filter(default_directive))
            .with(stderr_layer)
            .try_init()
            .ok();
        return Ok(None);
    };

    let (writer, guard) = create_log_writer(log_dir)?;
    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(writer)
        .with_ansi(false);
    tracing_subscriber::registry()
        .with(env_filter(default_directive))
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .ok();
    Ok(Some(guard))
}
