//! Configuration file watcher for hot-reload support
//!
//! A reload reconfigures the bridge, which rebuilds the executor table. Writes
//! that leave the parsed configuration unchanged are therefore swallowed here.

use anyhow::{Context, Result};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use parking_lot::Mutex;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use super::AppConfig;

/// Delay before re-reading so editors can finish writing
const RELOAD_DEBOUNCE: Duration = Duration::from_millis(100);

/// At most one reload waits for the debounce delay at any time
#[derive(Debug, Default)]
struct PendingReload(AtomicBool);

impl PendingReload {
    /// Claim the pending slot, `false` when a reload is already scheduled
    fn schedule(&self) -> bool {
        !self.0.swap(true, Ordering::AcqRel)
    }

    /// Release the slot; events from here on schedule a new reload
    fn release(&self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Config watcher that monitors file changes and sends reload notifications
pub struct ConfigWatcher {
    _watcher: RecommendedWatcher,
    rx: mpsc::Receiver<AppConfig>,
}

impl ConfigWatcher {
    /// Load the config at `config_path` and start watching it
    pub async fn new(config_path: String) -> Result<(Self, Arc<AppConfig>)> {
        let (tx, rx) = mpsc::channel(10);

        let initial_config = AppConfig::load(&config_path)
            .await
            .context("Failed to load initial config")?;
        let last_applied = Arc::new(Mutex::new(initial_config.clone()));
        let initial_config = Arc::new(initial_config);

        let path = config_path.clone();
        let pending = Arc::new(PendingReload::default());

        // notify callbacks run on their own OS thread, not in Tokio context
        let runtime_handle = tokio::runtime::Handle::current();

        let mut watcher = notify::recommended_watcher(move |res: Result<Event, notify::Error>| {
            let event = match res {
                Ok(event) => event,
                Err(e) => {
                    error!("Watch error: {}", e);
                    return;
                }
            };

            if !matches!(event.kind, EventKind::Modify(_)) {
                return;
            }
            if !pending.schedule() {
                return;
            }
            debug!("Config file modified: {:?}", event.paths);

            runtime_handle.spawn(reload(
                path.clone(),
                tx.clone(),
                last_applied.clone(),
                pending.clone(),
            ));
        })?;

        watcher
            .watch(Path::new(&config_path), RecursiveMode::NonRecursive)
            .with_context(|| format!("Failed to watch config file: {}", config_path))?;

        info!("Config file watcher started for: {}", config_path);

        Ok((
            Self {
                _watcher: watcher,
                rx,
            },
            initial_config,
        ))
    }

    /// Wait for the next config update
    /// Returns None if the watcher has been closed
    pub async fn next_config(&mut self) -> Option<AppConfig> {
        self.rx.recv().await
    }
}

async fn reload(
    path: String,
    tx: mpsc::Sender<AppConfig>,
    last_applied: Arc<Mutex<AppConfig>>,
    pending: Arc<PendingReload>,
) {
    tokio::time::sleep(RELOAD_DEBOUNCE).await;
    pending.release();

    let new_config = match AppConfig::load(&path).await {
        Ok(config) => config,
        Err(e) => {
            warn!("Failed to reload config (keeping old config): {:#}", e);
            return;
        }
    };

    {
        let mut last = last_applied.lock();
        if *last == new_config {
            debug!("Config file rewritten without changes, skipping reload");
            return;
        }
        *last = new_config.clone();
    }

    info!("Configuration reloaded successfully");
    if let Err(e) = tx.send(new_config).await {
        error!("Failed to send config update: {}", e);
    }
}
