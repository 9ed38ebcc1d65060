//! # cmdreg Config
//!
//! Single-file configuration for cmdreg.
//! One `cmdreg.yaml` configures the reserved message ids, the bus, the folder
//! watcher, every registry domain and observability settings.

mod loader;

pub use loader::{load_config, validate_config, ConfigError};

use std::path::{Path, PathBuf};

use cmdreg_core::MessageId;
use serde::Deserialize;

/// Top-level configuration schema for cmdreg.
#[derive(Debug, Clone, Deserialize)]
pub struct CmdregConfig {
    /// Config schema version.
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub app: AppConfig,
    #[serde(default)]
    pub messages: MessagesConfig,
    #[serde(default)]
    pub bus: BusConfig,
    #[serde(default)]
    pub watcher: WatcherConfig,
    #[serde(default = "default_registries")]
    pub registries: Vec<RegistrySpec>,
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

fn default_version() -> u32 {
    1
}

impl Default for CmdregConfig {
    fn default() -> Self {
        Self {
            version: default_version(),
            app: AppConfig::default(),
            messages: MessagesConfig::default(),
            bus: BusConfig::default(),
            watcher: WatcherConfig::default(),
            registries: default_registries(),
            observability: ObservabilityConfig::default(),
        }
    }
}

impl CmdregConfig {
    pub fn registry(&self, name: &str) -> Option<&RegistrySpec> {
        self.registries.iter().find(|r| r.name == name)
    }

    /// Rebase relative registry file paths onto `base`.
    pub fn resolve_relative_to(&mut self, base: &Path) {
        for spec in &mut self.registries {
            spec.commands_file = rebase(base, &spec.commands_file);
            spec.folders_file = spec.folders_file.as_ref().map(|p| rebase(base, p));
        }
    }
}

fn rebase(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() || base.as_os_str().is_empty() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_app_name")]
    pub name: String,
    #[serde(default = "default_env")]
    pub environment: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            name: default_app_name(),
            environment: default_env(),
        }
    }
}

fn default_app_name() -> String {
    "cmdreg".to_string()
}

fn default_env() -> String {
    "development".to_string()
}

/// Reserved (negative) ids the registries listen on.
#[derive(Debug, Clone, Deserialize)]
pub struct MessagesConfig {
    #[serde(default = "default_command_id")]
    pub command_id: i64,
    #[serde(default = "default_folder_id")]
    pub folder_id: i64,
}

impl MessagesConfig {
    pub fn command(&self) -> MessageId {
        MessageId(self.command_id)
    }

    pub fn folder_changed(&self) -> MessageId {
        MessageId(self.folder_id)
    }
}

impl Default for MessagesConfig {
    fn default() -> Self {
        Self {
            command_id: default_command_id(),
            folder_id: default_folder_id(),
        }
    }
}

fn default_command_id() -> i64 {
    MessageId::COMMAND.0
}

fn default_folder_id() -> i64 {
    MessageId::FOLDER_CHANGED.0
}

#[derive(Debug, Clone, Deserialize)]
pub struct BusConfig {
    #[serde(default = "default_bus_capacity")]
    pub capacity: usize,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            capacity: default_bus_capacity(),
        }
    }
}

fn default_bus_capacity() -> usize {
    1024
}

#[derive(Debug, Clone, Deserialize)]
pub struct WatcherConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            debounce_ms: default_debounce_ms(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_debounce_ms() -> u64 {
    300
}

/// One registry domain.
#[derive(Debug, Clone, Deserialize)]
pub struct RegistrySpec {
    pub name: String,
    /// Persisted command table (JSON).
    pub commands_file: PathBuf,
    /// Optional folder definitions (JSON array).
    #[serde(default)]
    pub folders_file: Option<PathBuf>,
}

fn default_registries() -> Vec<RegistrySpec> {
    vec![RegistrySpec {
        name: "default".to_string(),
        commands_file: PathBuf::from("commands.json"),
        folders_file: None,
    }]
}

#[derive(Debug, Clone, Deserialize)]
pub struct ObservabilityConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub log_file: Option<String>,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_file: None,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}
