//! Bootstrap helpers for starting every registry from a single YAML config.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::task::JoinHandle;

use cmdreg_config::{load_config, CmdregConfig, ConfigError, RegistrySpec};
use cmdreg_core::bus::MessageBus;
use cmdreg_core::store::{StoreError, TableStore};
use cmdreg_core::types::CommandTable;
use cmdreg_core::watch::{FolderWatcher, WatchError};
use cmdreg_stores::{
    load_folder_definitions, BroadcastMessageBus, JsonFileStore, NoopFolderWatcher,
    NotifyFolderWatcher,
};

use crate::directory::RegistryDirectory;
use crate::registry::{CommandRegistry, FolderSet, RegistryContext, RegistryError};
use crate::telemetry::init_tracing;

/// Runtime bootstrap errors.
#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("registry error: {0}")]
    Registry(#[from] RegistryError),
    #[error("watch error: {0}")]
    Watch(#[from] WatchError),
    #[error("registry '{0}' not found")]
    UnknownRegistry(String),
}

/// Whether folders get a live filesystem watcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchMode {
    /// Watch folders and rescan on change.
    Live,
    /// Rescan folders at startup only; used by one-shot admin commands.
    Offline,
}

/// Running app bundle created from unified config.
pub struct RuntimeApp {
    pub config: CmdregConfig,
    pub bus: Arc<dyn MessageBus>,
    pub directory: Arc<RegistryDirectory>,
    pub watcher: Arc<dyn FolderWatcher>,
    handles: Vec<JoinHandle<()>>,
}

impl RuntimeApp {
    /// Create a runnable app from a single `cmdreg.yaml`.
    pub async fn from_config_path(path: &Path, mode: WatchMode) -> Result<Self, BootstrapError> {
        let config = load_config(path)?;
        init_tracing(&config.observability);
        tracing::info!(config = %path.display(), app = %config.app.name, "bootstrapping cmdreg");
        Self::from_config(config, mode).await
    }

    /// Open every configured registry in declaration order.
    ///
    /// Must run inside a tokio runtime when `mode` is [`WatchMode::Live`].
    pub async fn from_config(config: CmdregConfig, mode: WatchMode) -> Result<Self, BootstrapError> {
        let bus: Arc<dyn MessageBus> = Arc::new(BroadcastMessageBus::new(config.bus.capacity));
        let watcher: Arc<dyn FolderWatcher> = if mode == WatchMode::Live && config.watcher.enabled {
            Arc::new(NotifyFolderWatcher::new(
                Arc::clone(&bus),
                Duration::from_millis(config.watcher.debounce_ms),
            )?)
        } else {
            Arc::new(NoopFolderWatcher)
        };
        let directory = Arc::new(RegistryDirectory::new());
        let ctx = RegistryContext::new(Arc::clone(&bus), Arc::clone(&watcher))
            .with_directory(Arc::clone(&directory))
            .with_message_ids(config.messages.command(), config.messages.folder_changed());

        for spec in &config.registries {
            open_registry(spec, &ctx).await?;
        }

        Ok(Self {
            config,
            bus,
            directory,
            watcher,
            handles: Vec::new(),
        })
    }

    /// Registry by name, or the first configured one.
    pub fn registry(&self, name: Option<&str>) -> Result<Arc<CommandRegistry>, BootstrapError> {
        match name {
            Some(name) => self
                .directory
                .get(name)
                .ok_or_else(|| BootstrapError::UnknownRegistry(name.to_string())),
            None => self
                .directory
                .registries()
                .into_iter()
                .next()
                .ok_or_else(|| BootstrapError::UnknownRegistry("<default>".to_string())),
        }
    }

    /// Start the consume loop of every registry.
    pub fn start(&mut self) -> Result<(), BootstrapError> {
        for registry in self.directory.registries() {
            self.handles.push(registry.start()?);
        }
        tracing::info!(registries = self.handles.len(), "registries serving");
        Ok(())
    }

    /// Serve until Ctrl-C, then stop every registry loop.
    pub async fn run_until_shutdown(&mut self) -> Result<(), BootstrapError> {
        self.start()?;
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for shutdown signal: {}", e);
        }
        tracing::info!("shutting down");
        self.shutdown();
        Ok(())
    }

    /// Close the bus and stop every registry loop.
    pub fn shutdown(&mut self) {
        self.bus.close();
        for handle in self.handles.drain(..) {
            handle.abort();
        }
    }
}

async fn open_registry(
    spec: &RegistrySpec,
    ctx: &RegistryContext,
) -> Result<Arc<CommandRegistry>, BootstrapError> {
    let store: Arc<dyn TableStore<CommandTable>> =
        Arc::new(JsonFileStore::<CommandTable>::new(spec.commands_file.clone()));
    let folders = match &spec.folders_file {
        Some(path) => Some(FolderSet::new(
            path.to_string_lossy(),
            load_folder_definitions(path)?,
        )),
        None => None,
    };
    Ok(CommandRegistry::open(spec.name.clone(), store, folders, ctx).await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cmdreg_core::message::{Message, MessageBody, MessageId};
    use serde_json::json;
    use std::fs;
    use std::path::PathBuf;

    fn temp_root() -> PathBuf {
        let root = std::env::temp_dir().join(format!("cmdreg-boot-{}", uuid::Uuid::new_v4()));
        fs::create_dir_all(&root).expect("mkdir");
        root
    }

    fn config_for(root: &Path) -> CmdregConfig {
        let pads = root.join("pads");
        fs::create_dir_all(&pads).unwrap();
        fs::write(pads.join("kick"), b"").unwrap();
        let folders_file = root.join("folders.json");
        fs::write(
            &folders_file,
            serde_json::to_string(&json!([{
                "path": pads.to_string_lossy(),
                "id": 12,
                "type": "pads",
                "input_type": "button",
                "name": "Pads"
            }]))
            .unwrap(),
        )
        .unwrap();

        let mut config = CmdregConfig::default();
        config.registries = vec![
            RegistrySpec {
                name: "main".to_string(),
                commands_file: root.join("main.json"),
                folders_file: Some(folders_file),
            },
            RegistrySpec {
                name: "extra".to_string(),
                commands_file: root.join("extra.json"),
                folders_file: None,
            },
        ];
        config
    }

    #[tokio::test]
    async fn test_offline_app_opens_registries_and_dispatches() {
        let root = temp_root();
        let mut app = RuntimeApp::from_config(config_for(&root), WatchMode::Offline)
            .await
            .expect("bootstrap");

        let main = app.registry(None).expect("default registry");
        assert_eq!(main.name(), "main");
        assert_eq!(main.get_command("kick").map(|c| c.id), Some(12));
        assert!(app.registry(Some("extra")).is_ok());
        assert!(matches!(
            app.registry(Some("missing")),
            Err(BootstrapError::UnknownRegistry(_))
        ));
        let folder = app
            .directory
            .get_folder(&root.join("folders.json").to_string_lossy(), "Pads")
            .expect("folder definition");
        assert_eq!(folder.id, 12);

        let mut out = app.bus.subscribe(&[MessageId(12)]);
        app.start().expect("start");
        app.bus
            .publish(Message::command(MessageId::COMMAND, "kick", json!("down"), "button"))
            .await
            .unwrap();

        let message = tokio::time::timeout(Duration::from_secs(5), out.recv())
            .await
            .expect("timely dispatch")
            .expect("message");
        assert!(matches!(message.body, MessageBody::Input(ref input) if input.name == "kick"));

        app.shutdown();
        assert!(app
            .bus
            .publish(Message::command(MessageId::COMMAND, "kick", json!("up"), "button"))
            .await
            .is_err());
        let _ = fs::remove_dir_all(root);
    }

    #[tokio::test]
    async fn test_malformed_folders_file_fails_bootstrap() {
        let root = temp_root();
        let mut config = config_for(&root);
        fs::write(root.join("folders.json"), b"{ not json").unwrap();
        config.registries.truncate(1);

        let result = RuntimeApp::from_config(config, WatchMode::Offline).await;

        assert!(matches!(result, Err(BootstrapError::Store(_))));
        let _ = fs::remove_dir_all(root);
    }
}
