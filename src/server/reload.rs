//! Reloading the snapshot file when it changes

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, SystemTime};

use tracing::{info, warn};

use crate::error::Result;
use crate::monitoring::{LiveCore, Snapshot, TriggerKind};

fn modified(path: &Path) -> Option<SystemTime> {
    std::fs::metadata(path).and_then(|m| m.modified()).ok()
}

/// Watches a snapshot file and publishes every new version
pub struct SnapshotWatcher {
    core: Arc<LiveCore>,
    path: PathBuf,
    last_modified: Option<SystemTime>,
}

impl SnapshotWatcher {
    pub fn new(core: Arc<LiveCore>, path: PathBuf) -> Self {
        let last_modified = modified(&path);
        Self {
            core,
            path,
            last_modified,
        }
    }

    /// Publish the file if it changed since the last look
    ///
    /// Returns whether a new snapshot was published. A broken file leaves
    /// the current snapshot in place.
    pub fn poll(&mut self) -> Result<bool> {
        let current = modified(&self.path);
        if current.is_none() || current == self.last_modified {
            return Ok(false);
        }
        self.last_modified = current;
        let snapshot = Snapshot::load(&self.path)?;
        info!(
            hosts = snapshot.hosts.len(),
            services = snapshot.services.len(),
            "reloaded snapshot {}",
            self.path.display()
        );
        self.core.publish(snapshot, TriggerKind::All);
        Ok(true)
    }

    /// Poll every `interval` on a background thread until shutdown
    pub fn spawn(mut self, interval: Duration, shutdown: Arc<AtomicBool>) -> Result<JoinHandle<()>> {
        let handle = thread::Builder::new()
            .name("lql-reload".to_string())
            .spawn(move || {
                while !shutdown.load(Ordering::SeqCst) {
                    if let Err(e) = self.poll() {
                        warn!("keeping the current snapshot: {}", e);
                    }
                    thread::sleep(interval);
                }
            })?;
        Ok(handle)
    }
}
