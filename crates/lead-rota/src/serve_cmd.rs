use anyhow::{Context, Result};
use tracing::info;

use rota_core::AppError;
use rota_scheduler::StartOutcome;

use crate::app::App;

/// Start the trigger and keep it running until Ctrl-C.
pub(crate) async fn handle_serve(app: &App) -> Result<()> {
    let trigger = app.trigger()?;
    match trigger.start().await {
        StartOutcome::Started | StartOutcome::AlreadyStarted => {}
        StartOutcome::Disabled => {
            return Err(AppError::StorageUnavailable(format!(
                "document store at {} cannot be written; scheduler disabled",
                app.config.data_dir().display()
            ))
            .into());
        }
    }

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;
    info!("Interrupt received, stopping");
    trigger.shutdown().await;
    Ok(())
}
