//! FolderWatcher - folder observation abstraction.

use std::path::Path;

use thiserror::Error;

use crate::message::MessageId;

/// Folder watch error types
#[derive(Debug, Error)]
pub enum WatchError {
    #[error("Invalid folder: {0}")]
    InvalidFolder(String),

    #[error("Notify error: {0}")]
    Notify(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// FolderWatcher trait.
///
/// After `watch_folder(path, id)`, any burst of changes below `path` produces one
/// `FolderChanged` message with id `id` whose payload is `path` exactly as given.
pub trait FolderWatcher: Send + Sync {
    fn watch_folder(&self, path: &Path, message_id: MessageId) -> Result<(), WatchError>;
}
