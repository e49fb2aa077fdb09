//! File watcher for hot reload of the daemon config and the manifest directory.

use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::config::loader::load_config;
use crate::config::schema::DaemonConfig;

/// Something on disk changed that the controller should react to.
#[derive(Debug, Clone)]
pub enum WatchEvent {
    /// The daemon config file changed and the new version validated.
    ConfigReloaded(Box<DaemonConfig>),
    /// A mirror rule manifest was added, changed or removed.
    SourcesChanged,
}

/// Watches the config file and the manifest directory.
pub struct SourceWatcher {
    config_path: PathBuf,
    manifests_dir: PathBuf,
    event_tx: mpsc::UnboundedSender<WatchEvent>,
}

impl SourceWatcher {
    /// Create a new SourceWatcher.
    ///
    /// Returns the watcher and a receiver for change events.
    pub fn new(config_path: &Path, manifests_dir: &Path) -> (Self, mpsc::UnboundedReceiver<WatchEvent>) {
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        (
            Self {
                config_path: absolute(config_path),
                manifests_dir: absolute(manifests_dir),
                event_tx,
            },
            event_rx,
        )
    }

    /// Start watching in a background thread. Dropping the returned watcher stops it.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let tx = self.event_tx.clone();
        let config_path = self.config_path.clone();
        let manifests_dir = self.manifests_dir.clone();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    if let Some(watch_event) = classify(&event, &config_path, &manifests_dir) {
                        let _ = tx.send(watch_event);
                    }
                }
                Err(e) => tracing::error!("Watch error: {:?}", e),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;

        watcher.watch(&self.config_path, RecursiveMode::NonRecursive)?;
        match watcher.watch(&self.manifests_dir, RecursiveMode::NonRecursive) {
            Ok(()) => {}
            Err(e) => tracing::warn!(
                path = ?self.manifests_dir,
                error = %e,
                "Cannot watch manifest directory; relying on periodic resync"
            ),
        }

        tracing::info!(config = ?self.config_path, manifests = ?self.manifests_dir, "Source watcher started");
        Ok(watcher)
    }
}

fn classify(event: &Event, config_path: &Path, manifests_dir: &Path) -> Option<WatchEvent> {
    let relevant = matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_));
    if !relevant {
        return None;
    }

    if event.paths.iter().any(|p| p == config_path) {
        if event.kind.is_remove() {
            return None;
        }
        tracing::info!("Config file change detected, reloading...");
        return match load_config(config_path) {
            Ok(config) => Some(WatchEvent::ConfigReloaded(Box::new(config))),
            Err(e) => {
                tracing::error!("Failed to reload config: {}. Keeping current configuration.", e);
                None
            }
        };
    }

    if event.paths.iter().any(|p| p.starts_with(manifests_dir)) {
        tracing::debug!(paths = ?event.paths, "Manifest change detected");
        return Some(WatchEvent::SourcesChanged);
    }

    None
}

fn absolute(path: &Path) -> PathBuf {
    std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{CreateKind, ModifyKind, RemoveKind};

    fn event(kind: EventKind, path: &Path) -> Event {
        Event::new(kind).add_path(path.to_path_buf())
    }

    #[test]
    fn test_manifest_changes_trigger_a_pass() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("daemon.toml");
        let manifests = dir.path().join("manifests");

        for kind in [
            EventKind::Create(CreateKind::File),
            EventKind::Modify(ModifyKind::Any),
            EventKind::Remove(RemoveKind::File),
        ] {
            let got = classify(&event(kind, &manifests.join("idms.yaml")), &config_path, &manifests);
            assert!(matches!(got, Some(WatchEvent::SourcesChanged)));
        }
    }

    #[test]
    fn test_config_change_reloads_valid_config() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("daemon.toml");
        let manifests = dir.path().join("manifests");
        std::fs::write(&config_path, "[[fleet.nodes]]\nname = \"win-a\"\n").unwrap();

        let got = classify(&event(EventKind::Modify(ModifyKind::Any), &config_path), &config_path, &manifests);
        match got {
            Some(WatchEvent::ConfigReloaded(config)) => assert_eq!(config.fleet.nodes[0].name, "win-a"),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn test_invalid_config_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("daemon.toml");
        std::fs::write(&config_path, "[distribution]\nmax_concurrency = 0\n").unwrap();

        let got = classify(&event(EventKind::Modify(ModifyKind::Any), &config_path), &config_path, dir.path());
        assert!(got.is_none());
    }

    #[test]
    fn test_access_events_are_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("idms.yaml");
        let got = classify(&event(EventKind::Access(notify::event::AccessKind::Any), &path), Path::new("/x"), dir.path());
        assert!(got.is_none());
    }
}
