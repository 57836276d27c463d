//! Long-running desk service with config hot-reload.

use anyhow::Result;
use tracing::{error, info};

use optdesk_core::ConfigWatcher;
use optdesk_options_manager::service;

use super::context::DeskContext;

/// Runs the desk until Ctrl+C or a store failure.
///
/// # Errors
/// Returns an error if the service stops on a store failure.
pub async fn run_serve(ctx: DeskContext) -> Result<()> {
    let (watcher, config_rx) = ConfigWatcher::new(ctx.config.clone());
    let config_path = ctx.config_path.clone();
    let watcher_handle = tokio::spawn(async move {
        if let Err(e) = watcher.watch(&config_path).await {
            error!(error = %e, "Config watcher stopped");
        }
    });

    let parts = ctx.parts();
    let result = tokio::select! {
        result = service::run(parts, config_rx) => result,
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
            Ok(())
        }
    };

    watcher_handle.abort();
    info!("Desk service stopped");
    result
}
