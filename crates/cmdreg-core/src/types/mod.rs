//! Types module
//!
//! - CommandInfo / CommandTable: dispatch metadata keyed by type then name
//! - FolderDefinition: a watched folder whose files become commands
//! - InputType: tag describing the expected payload shape

mod command;
mod folder;

pub use command::{CommandInfo, CommandTable, InputType};
pub use folder::FolderDefinition;
