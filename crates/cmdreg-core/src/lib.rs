//! # cmdreg Core
//!
//! Core abstractions for the cmdreg command registry.
//!
//! This crate contains:
//! - CommandInfo / CommandTable / FolderDefinition definitions
//! - Message envelope and reserved message ids
//! - TableStore / MessageBus / FolderWatcher collaborator traits
//! - Mirrored: in-memory table kept equal to its persisted copy
//!
//! This crate does NOT care about:
//! - Where tables are persisted
//! - How messages are transported
//! - How folders are observed

pub mod bus;
pub mod message;
pub mod store;
pub mod types;
pub mod watch;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::bus::{BusError, Delivery, MessageBus, Subscription};
    pub use crate::message::{CommandRequest, InputMessage, Message, MessageBody, MessageId};
    pub use crate::store::{Mirrored, StoreError, TableStore};
    pub use crate::types::{CommandInfo, CommandTable, FolderDefinition, InputType};
    pub use crate::watch::{FolderWatcher, WatchError};
}

// Re-export key types at crate root
pub use bus::{BusError, Delivery, MessageBus, Subscription};
pub use message::{Message, MessageBody, MessageId};
pub use store::{Mirrored, StoreError, TableStore};
pub use types::{CommandInfo, CommandTable, FolderDefinition, InputType};
pub use watch::{FolderWatcher, WatchError};
