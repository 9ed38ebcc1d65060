//! Folder watchers.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use cmdreg_core::bus::MessageBus;
use cmdreg_core::message::{Message, MessageId};
use cmdreg_core::watch::{FolderWatcher, WatchError};

/// Bursts of file events closer together than this collapse into one notification.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(300);
const CHANNEL_CAPACITY: usize = 1024;

#[derive(Debug, Clone)]
struct WatchedFolder {
    /// Canonical directory used to match event paths
    root: PathBuf,
    /// Path exactly as registered; this is the notification payload
    path: String,
    message_id: MessageId,
}

/// FolderWatcher publishing debounced `FolderChanged` messages on a bus.
///
/// Must be created inside a tokio runtime; the debouncer runs as a spawned task
/// and stops when the watcher is dropped.
pub struct NotifyFolderWatcher {
    watcher: Mutex<RecommendedWatcher>,
    folders: Arc<RwLock<Vec<WatchedFolder>>>,
}

impl NotifyFolderWatcher {
    pub fn new(bus: Arc<dyn MessageBus>, debounce: Duration) -> Result<Self, WatchError> {
        let (tx, rx) = mpsc::channel::<notify::Event>(CHANNEL_CAPACITY);
        let watcher =
            notify::recommended_watcher(move |res: Result<notify::Event, notify::Error>| {
                if let Ok(event) = res {
                    // One signal per burst is enough; a full channel may drop extras.
                    let _ = tx.try_send(event);
                }
            })
            .map_err(|e| WatchError::Notify(e.to_string()))?;

        let folders = Arc::new(RwLock::new(Vec::new()));
        tokio::spawn(run_debouncer(rx, Arc::clone(&folders), bus, debounce));

        Ok(Self {
            watcher: Mutex::new(watcher),
            folders,
        })
    }

    /// Paths currently watched, as registered.
    pub fn watched(&self) -> Vec<String> {
        self.folders
            .read()
            .map(|folders| folders.iter().map(|f| f.path.clone()).collect())
            .unwrap_or_default()
    }
}

impl FolderWatcher for NotifyFolderWatcher {
    fn watch_folder(&self, path: &Path, message_id: MessageId) -> Result<(), WatchError> {
        let root = path
            .canonicalize()
            .map_err(|e| WatchError::InvalidFolder(format!("{}: {}", path.display(), e)))?;
        if !root.is_dir() {
            return Err(WatchError::InvalidFolder(format!(
                "{} is not a directory",
                path.display()
            )));
        }
        let registered = path.to_string_lossy().to_string();

        let mut folders = self
            .folders
            .write()
            .map_err(|e| WatchError::Internal(e.to_string()))?;
        if folders
            .iter()
            .any(|f| f.path == registered && f.message_id == message_id)
        {
            return Ok(());
        }

        let mut watcher = self
            .watcher
            .lock()
            .map_err(|e| WatchError::Internal(e.to_string()))?;
        watcher
            .watch(&root, RecursiveMode::Recursive)
            .map_err(|e| WatchError::Notify(e.to_string()))?;

        tracing::info!(folder = %registered, id = %message_id, "watching folder");
        folders.push(WatchedFolder {
            root,
            path: registered,
            message_id,
        });
        Ok(())
    }
}

async fn run_debouncer(
    mut rx: mpsc::Receiver<notify::Event>,
    folders: Arc<RwLock<Vec<WatchedFolder>>>,
    bus: Arc<dyn MessageBus>,
    debounce: Duration,
) {
    let mut pending: Vec<(String, MessageId)> = Vec::new();
    let timer = tokio::time::sleep(Duration::from_secs(3600));
    tokio::pin!(timer);

    loop {
        tokio::select! {
            event = rx.recv() => {
                let Some(event) = event else { break };
                if !matches!(
                    event.kind,
                    EventKind::Modify(_) | EventKind::Create(_) | EventKind::Remove(_)
                ) {
                    continue;
                }
                let mut touched = false;
                if let Ok(folders) = folders.read() {
                    for folder in folders.iter() {
                        if !event.paths.iter().any(|p| p.starts_with(&folder.root)) {
                            continue;
                        }
                        touched = true;
                        let key = (folder.path.clone(), folder.message_id);
                        if !pending.contains(&key) {
                            pending.push(key);
                        }
                    }
                }
                if touched {
                    timer
                        .as_mut()
                        .reset(tokio::time::Instant::now() + debounce);
                }
            }
            _ = &mut timer, if !pending.is_empty() => {
                for (path, message_id) in pending.drain(..) {
                    tracing::debug!(folder = %path, "folder changed");
                    if let Err(e) = bus.publish(Message::folder_changed(message_id, path)).await {
                        tracing::error!("Failed to publish folder change: {}", e);
                    }
                }
            }
        }
    }
    tracing::debug!("folder watcher stopped");
}

/// FolderWatcher that accepts every folder and never emits.
#[derive(Debug, Default)]
pub struct NoopFolderWatcher;

impl FolderWatcher for NoopFolderWatcher {
    fn watch_folder(&self, path: &Path, message_id: MessageId) -> Result<(), WatchError> {
        tracing::debug!(folder = %path.display(), id = %message_id, "watch skipped (noop watcher)");
        Ok(())
    }
}
