//! Store module
//!
//! This module provides storage abstractions:
//! - TableStore: load/save of one structured document
//! - Mirrored: in-memory value kept equal to its TableStore after every mutation
//!
//! Note: Implementations are in cmdreg-stores crate

mod mirrored;

pub use mirrored::Mirrored;

use thiserror::Error;

/// Store error types
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// TableStore trait - persistence backend for one structured document.
///
/// `load` on a store that has never been saved returns `T::default()`.
pub trait TableStore<T>: Send + Sync {
    /// Read the persisted document.
    fn load(&self) -> Result<T, StoreError>;

    /// Replace the persisted document with `value`.
    fn save(&self, value: &T) -> Result<(), StoreError>;

    /// Human-readable location, used in logs and for folder-file identity.
    fn location(&self) -> String;
}
