//! # cmdreg Stores
//!
//! Collaborator implementations for the cmdreg registry.
//!
//! This crate provides:
//! - JSON file TableStore (atomic writes) and folder-definitions loader
//! - InMemory TableStore
//! - In-process MessageBus
//! - notify-based debounced FolderWatcher

mod event_bus;
mod folder_watcher;
mod json_store;
mod memory_store;

pub use event_bus::BroadcastMessageBus;
pub use folder_watcher::{NoopFolderWatcher, NotifyFolderWatcher, DEFAULT_DEBOUNCE};
pub use json_store::{load_folder_definitions, JsonFileStore};
pub use memory_store::InMemoryTableStore;

// Re-export core traits for convenience
pub use cmdreg_core::{
    BusError, FolderWatcher, Message, MessageBus, MessageId, StoreError, Subscription, TableStore,
    WatchError,
};
