//! Hot reload of the service table.
//!
//! Only `services` is applied live. Editor saves that leave the table
//! unchanged are dropped, and changes to listener or proxy settings are
//! logged as needing a restart.

use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::config::loader::load_config;
use crate::config::schema::ProxyConfig;

/// Watches a config file and publishes service-table changes.
pub struct ConfigWatcher {
    path: PathBuf,
    filter: ReloadFilter,
    update_tx: mpsc::UnboundedSender<ProxyConfig>,
}

impl ConfigWatcher {
    /// `running` is the config the server was started with.
    pub fn new(
        path: &Path,
        running: &ProxyConfig,
    ) -> (Self, mpsc::UnboundedReceiver<ProxyConfig>) {
        let (update_tx, update_rx) = mpsc::unbounded_channel();
        let watcher = Self {
            path: path.to_path_buf(),
            filter: ReloadFilter::new(running.clone()),
            update_tx,
        };
        (watcher, update_rx)
    }

    /// Start watching on notify's background thread.
    ///
    /// Reloads stop when the returned watcher is dropped.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let Self {
            path,
            mut filter,
            update_tx,
        } = self;
        let watched = path.clone();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) if event.kind.is_modify() || event.kind.is_create() => {
                    match load_config(&path) {
                        Ok(loaded) => {
                            if let Some(update) = filter.accept(loaded) {
                                let _ = update_tx.send(update);
                            }
                        }
                        Err(e) => tracing::error!(
                            path = ?path,
                            error = %e,
                            "Config reload rejected, keeping current service table"
                        ),
                    }
                }
                Ok(_) => {}
                Err(e) => tracing::error!(error = ?e, "Config watch error"),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;

        watcher.watch(&watched, RecursiveMode::NonRecursive)?;
        tracing::info!(path = ?watched, "Config watcher started");
        Ok(watcher)
    }
}

/// Decides which reloaded configs reach the server.
struct ReloadFilter {
    current: ProxyConfig,
}

impl ReloadFilter {
    fn new(current: ProxyConfig) -> Self {
        Self { current }
    }

    fn accept(&mut self, loaded: ProxyConfig) -> Option<ProxyConfig> {
        if loaded.listener != self.current.listener || loaded.proxy != self.current.proxy {
            tracing::warn!("Listener or proxy settings changed; restart to apply them");
        }

        if loaded.services == self.current.services {
            tracing::debug!("Config file touched, service table unchanged");
            return None;
        }

        tracing::info!(
            before = self.current.services.len(),
            after = loaded.services.len(),
            "Service table changed"
        );
        self.current.services = loaded.services.clone();
        Some(loaded)
    }
}
