//! # cmdreg Runtime
//!
//! Command registries and the wiring that runs them.
//!
//! - CommandRegistry: command table CRUD, folder synchronization, dispatch
//! - RegistryDirectory: cross-registry lookup over every live registry
//! - RuntimeApp: bootstrap from a single `cmdreg.yaml`

mod bootstrap;
mod directory;
mod registry;
mod telemetry;

pub use bootstrap::{BootstrapError, RuntimeApp, WatchMode};
pub use directory::RegistryDirectory;
pub use registry::{CommandRegistry, FolderSet, RegistryContext, RegistryError};
pub use telemetry::init_tracing;
