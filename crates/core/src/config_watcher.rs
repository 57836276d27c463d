use crate::config::AppConfig;
use crate::config_loader::ConfigLoader;
use anyhow::Result;
use notify::{Event, RecursiveMode, Watcher};
use std::path::Path;
use tokio::sync::watch;

/// Hot-reloads the desk configuration for long-running services.
pub struct ConfigWatcher {
    tx: watch::Sender<AppConfig>,
}

impl ConfigWatcher {
    /// Creates a watcher seeded with the current configuration.
    ///
    /// Returns the watcher and a receiver that observes every successful reload.
    #[must_use]
    pub fn new(initial_config: AppConfig) -> (Self, watch::Receiver<AppConfig>) {
        let (tx, rx) = watch::channel(initial_config);
        (Self { tx }, rx)
    }

    /// Watches `config_path` and broadcasts a freshly loaded configuration on each modification.
    ///
    /// A file that fails to parse keeps the previous configuration in effect.
    ///
    /// # Errors
    ///
    /// Returns an error if the file watcher cannot be started.
    pub async fn watch(&self, config_path: &str) -> Result<()> {
        let tx = self.tx.clone();
        let config_path = config_path.to_string();

        tokio::task::spawn_blocking(move || {
            let (notify_tx, notify_rx) = std::sync::mpsc::channel();

            let mut watcher = notify::recommended_watcher(move |res: Result<Event, _>| {
                if let Ok(event) = res {
                    let _ = notify_tx.send(event);
                }
            })?;

            watcher.watch(Path::new(&config_path), RecursiveMode::NonRecursive)?;

            for event in notify_rx {
                if !event.kind.is_modify() {
                    continue;
                }
                match ConfigLoader::load_from(&config_path) {
                    Ok(new_config) => {
                        let _ = tx.send(new_config);
                        tracing::info!(path = %config_path, "Desk config reloaded");
                    }
                    Err(e) => {
                        tracing::error!(
                            path = %config_path,
                            error = %e,
                            "Config reload failed, keeping previous"
                        );
                    }
                }
            }

            Ok::<_, anyhow::Error>(())
        })
        .await??;

        Ok(())
    }
}
