//! CommandRegistry - command table kept in sync with its file and watched folders.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use serde_json::Value;
use thiserror::Error;
use tokio::task::JoinHandle;
use walkdir::WalkDir;

use cmdreg_core::bus::{BusError, Delivery, MessageBus, Subscription};
use cmdreg_core::message::{Message, MessageBody, MessageId};
use cmdreg_core::store::{Mirrored, StoreError, TableStore};
use cmdreg_core::types::{CommandInfo, CommandTable, FolderDefinition, InputType};
use cmdreg_core::watch::FolderWatcher;

use crate::directory::RegistryDirectory;

/// Pause after creating a missing folder so the filesystem settles before watching.
const FOLDER_SETTLE_DELAY: Duration = Duration::from_millis(100);

/// Registry error types
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("type '{0}' not found")]
    TypeNotFound(String),

    #[error("command '{name}' not found in type '{kind}'")]
    CommandNotFound { kind: String, name: String },

    #[error("registry '{0}' is already started")]
    AlreadyStarted(String),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("bus error: {0}")]
    Bus(#[from] BusError),
}

/// Shared collaborators handed to every registry at construction.
#[derive(Clone)]
pub struct RegistryContext {
    pub bus: Arc<dyn MessageBus>,
    pub watcher: Arc<dyn FolderWatcher>,
    pub directory: Arc<RegistryDirectory>,
    /// Id of inbound command-dispatch messages
    pub command_id: MessageId,
    /// Id of folder-change notifications
    pub folder_id: MessageId,
}

impl RegistryContext {
    pub fn new(bus: Arc<dyn MessageBus>, watcher: Arc<dyn FolderWatcher>) -> Self {
        Self {
            bus,
            watcher,
            directory: Arc::new(RegistryDirectory::new()),
            command_id: MessageId::COMMAND,
            folder_id: MessageId::FOLDER_CHANGED,
        }
    }

    pub fn with_directory(mut self, directory: Arc<RegistryDirectory>) -> Self {
        self.directory = directory;
        self
    }

    pub fn with_message_ids(mut self, command_id: MessageId, folder_id: MessageId) -> Self {
        self.command_id = command_id;
        self.folder_id = folder_id;
        self
    }
}

/// Folder definitions together with the file they were read from.
#[derive(Debug, Clone)]
pub struct FolderSet {
    /// Identity of the definitions file, used by [`RegistryDirectory::get_folder`]
    pub file: String,
    pub definitions: Vec<FolderDefinition>,
}

impl FolderSet {
    pub fn new(file: impl Into<String>, definitions: Vec<FolderDefinition>) -> Self {
        Self {
            file: file.into(),
            definitions,
        }
    }
}

/// Registry of every command of one domain.
///
/// The table lives in memory and in its [`TableStore`]; every mutating call saves
/// before it returns. Foldered commands (those with a `path`) are rebuilt from
/// the watched folders at construction and on every folder-change notification.
pub struct CommandRegistry {
    name: String,
    commands: RwLock<Mirrored<CommandTable>>,
    folders: Option<FolderSet>,
    bus: Arc<dyn MessageBus>,
    watcher: Arc<dyn FolderWatcher>,
    folder_id: MessageId,
    subscription: Mutex<Option<Subscription>>,
}

impl CommandRegistry {
    /// Load the command table, synchronize the folders and add the registry to
    /// the context's directory.
    ///
    /// With folders: watch every folder, drop all foldered commands, then rescan
    /// every folder in definition order.
    pub async fn open(
        name: impl Into<String>,
        commands: Arc<dyn TableStore<CommandTable>>,
        folders: Option<FolderSet>,
        ctx: &RegistryContext,
    ) -> Result<Arc<Self>, RegistryError> {
        let name = name.into();
        let table = Mirrored::open(commands)?;

        let mut ids = vec![ctx.command_id];
        if folders.is_some() {
            ids.push(ctx.folder_id);
        }
        let subscription = ctx.bus.subscribe(&ids);

        let registry = Arc::new(Self {
            name,
            commands: RwLock::new(table),
            folders,
            bus: Arc::clone(&ctx.bus),
            watcher: Arc::clone(&ctx.watcher),
            folder_id: ctx.folder_id,
            subscription: Mutex::new(Some(subscription)),
        });

        if registry.folders.is_some() {
            registry.init_folders_for_commands().await;
            registry.clean_all_folder_commands()?;
            for folder in registry.folder_definitions() {
                registry.reload_folder(&folder.path)?;
            }
        }

        ctx.directory.register(Arc::clone(&registry));
        tracing::info!(
            registry = %registry.name,
            file = %registry.location(),
            commands = registry.get_all_commands().len(),
            "command registry opened"
        );
        Ok(registry)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Location of the persisted command table.
    pub fn location(&self) -> String {
        self.table().location()
    }

    pub fn folder_definitions(&self) -> &[FolderDefinition] {
        self.folders
            .as_ref()
            .map(|f| f.definitions.as_slice())
            .unwrap_or(&[])
    }

    pub fn folders_file(&self) -> Option<&str> {
        self.folders.as_ref().map(|f| f.file.as_str())
    }

    // Mirrored::transact swaps whole values, so a poisoned lock never guards a
    // half-applied mutation and the inner value is safe to keep using.
    fn table(&self) -> RwLockReadGuard<'_, Mirrored<CommandTable>> {
        self.commands.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn table_mut(&self) -> RwLockWriteGuard<'_, Mirrored<CommandTable>> {
        self.commands.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add a hand-registered command.
    ///
    /// Returns `Ok(false)` without touching the table if `name` already exists in
    /// any type of this registry.
    pub fn add_command(
        &self,
        name: &str,
        id: i64,
        kind: &str,
        input_type: impl Into<InputType>,
    ) -> Result<bool, RegistryError> {
        let mut table = self.table_mut();
        if find_command(table.value(), name).is_some() {
            tracing::info!(registry = %self.name, command = name, "Cannot add '{}', duplicate name", name);
            return Ok(false);
        }
        if MessageId(id).is_reserved() {
            tracing::warn!(
                registry = %self.name,
                command = name,
                id,
                "command uses a negative id, negative ids are reserved"
            );
        }
        let info = CommandInfo::new(id, input_type);
        table.transact(|t| {
            t.entry(kind.to_string())
                .or_default()
                .insert(name.to_string(), info)
        })?;
        Ok(true)
    }

    /// Remove one command; missing type or name is a lookup error.
    pub fn remove_command(&self, kind: &str, name: &str) -> Result<CommandInfo, RegistryError> {
        let mut table = self.table_mut();
        let bucket = table
            .value()
            .get(kind)
            .ok_or_else(|| RegistryError::TypeNotFound(kind.to_string()))?;
        if !bucket.contains_key(name) {
            return Err(RegistryError::CommandNotFound {
                kind: kind.to_string(),
                name: name.to_string(),
            });
        }
        let removed = table.transact(|t| t.get_mut(kind).and_then(|b| b.remove(name)))?;
        removed.ok_or_else(|| RegistryError::CommandNotFound {
            kind: kind.to_string(),
            name: name.to_string(),
        })
    }

    /// Empty one type bucket; absent types are left alone.
    pub fn clear_type(&self, kind: &str) -> Result<(), RegistryError> {
        let mut table = self.table_mut();
        if !table.value().contains_key(kind) {
            return Ok(());
        }
        table.transact(|t| t.insert(kind.to_string(), BTreeMap::new()))?;
        Ok(())
    }

    /// Look a command up in this registry only.
    pub fn get_command(&self, name: &str) -> Option<CommandInfo> {
        find_command(self.table().value(), name).cloned()
    }

    /// Every command of this registry keyed by name.
    ///
    /// A name present in several types resolves to the last type in key order.
    pub fn get_all_commands(&self) -> BTreeMap<String, CommandInfo> {
        let table = self.table();
        let mut out = BTreeMap::new();
        for bucket in table.value().values() {
            for (name, info) in bucket {
                out.insert(name.clone(), info.clone());
            }
        }
        out
    }

    pub fn get_commands(&self, kind: &str) -> Result<BTreeMap<String, CommandInfo>, RegistryError> {
        self.table()
            .value()
            .get(kind)
            .cloned()
            .ok_or_else(|| RegistryError::TypeNotFound(kind.to_string()))
    }

    pub fn get_types(&self) -> Vec<String> {
        self.table().value().keys().cloned().collect()
    }

    /// Snapshot of the whole table.
    pub fn snapshot(&self) -> CommandTable {
        self.table().value().clone()
    }

    /// Persist the current table as is.
    pub fn save(&self) -> Result<(), RegistryError> {
        self.table().save()?;
        Ok(())
    }

    /// Replace the in-memory table with the persisted one.
    pub fn update_from_file(&self) -> Result<(), RegistryError> {
        self.table_mut().load()?;
        Ok(())
    }

    /// Create missing folders and watch every folder with a valid id.
    ///
    /// Failures are logged per folder; the remaining folders are still processed.
    pub async fn init_folders_for_commands(&self) {
        for folder in self.folder_definitions() {
            let dir = Path::new(&folder.path);
            if !dir.is_dir() {
                tracing::info!(registry = %self.name, folder = %folder.path, "Did not find dir '{}' creating...", folder.path);
                if let Err(e) = fs::create_dir_all(dir) {
                    tracing::warn!(folder = %folder.path, "Failed to create folder: {}", e);
                }
                tokio::time::sleep(FOLDER_SETTLE_DELAY).await;
            }

            if folder.has_reserved_id() {
                tracing::warn!(
                    registry = %self.name,
                    folder = %folder.path,
                    id = folder.id,
                    "Message ID below zero for '{}', negative ids are reserved; folder not watched",
                    folder.path
                );
                continue;
            }

            if let Err(e) = self.watcher.watch_folder(dir, self.folder_id) {
                tracing::error!(
                    registry = %self.name,
                    folder = %folder.path,
                    id = folder.id,
                    "Invalid folder message id '{}': {}",
                    folder.id,
                    e
                );
            }
        }
    }

    /// Drop every foldered command from the folders' types, keeping hand-added ones.
    pub fn clean_all_folder_commands(&self) -> Result<(), RegistryError> {
        let kinds: Vec<String> = self
            .folder_definitions()
            .iter()
            .map(|f| f.kind.clone())
            .collect();
        let mut table = self.table_mut();
        table.transact(|t| {
            for kind in &kinds {
                if let Some(bucket) = t.get_mut(kind) {
                    bucket.retain(|_, info| !info.is_foldered());
                }
            }
        })?;
        Ok(())
    }

    /// Rebuild the type bucket of the folder registered under `path`.
    ///
    /// The whole bucket is purged before the rescan, including commands of any
    /// other folder sharing the same type. Unknown paths are ignored.
    pub fn reload_folder(&self, path: &str) -> Result<(), RegistryError> {
        let Some(folder) = self.folder_definitions().iter().find(|f| f.path == path) else {
            tracing::debug!(registry = %self.name, folder = path, "no folder definition, reload skipped");
            return Ok(());
        };

        let mut table = self.table_mut();
        let files = scan_folder(Path::new(&folder.path));
        table.transact(|t| {
            if let Some(bucket) = t.get_mut(&folder.kind) {
                bucket.clear();
            }
            for file in files {
                t.entry(folder.kind.clone()).or_default().insert(
                    file,
                    CommandInfo::foldered(folder.id, folder.input_type.clone(), folder.path.clone()),
                );
            }
        })?;
        tracing::debug!(
            registry = %self.name,
            folder = %folder.path,
            kind = %folder.kind,
            commands = table.value().get(&folder.kind).map(|b| b.len()).unwrap_or(0),
            "folder reloaded"
        );
        Ok(())
    }

    /// Rescan every folder, for when change notifications may have been dropped.
    pub fn resync_folders(&self) {
        for folder in self.folder_definitions() {
            if let Err(e) = self.reload_folder(&folder.path) {
                tracing::error!(registry = %self.name, folder = %folder.path, "folder reload failed: {}", e);
            }
        }
    }

    /// Handle one bus message. Never fails; errors are logged here.
    pub async fn consume(&self, message: Message) {
        match message.body {
            MessageBody::Command(request) => {
                if let Err(e) = self
                    .send(&request.name, request.event, &request.input_type)
                    .await
                {
                    tracing::error!(registry = %self.name, command = %request.name, "dispatch failed: {}", e);
                }
            }
            MessageBody::FolderChanged { path } => {
                if let Err(e) = self.reload_folder(&path) {
                    tracing::error!(registry = %self.name, folder = %path, "folder reload failed: {}", e);
                }
            }
            MessageBody::Input(input) => {
                tracing::debug!(registry = %self.name, command = %input.name, "ignoring dispatched input");
            }
        }
    }

    /// Forward a command to its destination id.
    ///
    /// Returns `Ok(false)` without publishing when this registry does not know
    /// `name`; another registry may own it.
    pub async fn send(
        &self,
        name: &str,
        event: Value,
        input_type: &InputType,
    ) -> Result<bool, RegistryError> {
        let Some(info) = self.get_command(name) else {
            return Ok(false);
        };
        if info.input_type != *input_type {
            tracing::warn!(
                registry = %self.name,
                command = name,
                expected = %info.input_type,
                received = %input_type,
                "Mismatched input_type for command '{}'",
                name
            );
        }
        self.bus.publish(Message::input(name, event, info)).await?;
        Ok(true)
    }

    /// Spawn the loop draining this registry's subscription.
    pub fn start(self: &Arc<Self>) -> Result<JoinHandle<()>, RegistryError> {
        let subscription = self
            .subscription
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(mut subscription) = subscription else {
            return Err(RegistryError::AlreadyStarted(self.name.clone()));
        };

        let registry = Arc::clone(self);
        Ok(tokio::spawn(async move {
            tracing::debug!(registry = %registry.name, ids = ?subscription.ids(), "registry serving");
            while let Some(delivery) = subscription.next().await {
                match delivery {
                    Delivery::Message(message) => registry.consume(message).await,
                    Delivery::Lagged(skipped) => {
                        tracing::warn!(registry = %registry.name, skipped, "bus lagged, rescanning folders");
                        registry.resync_folders();
                    }
                }
            }
            tracing::debug!(registry = %registry.name, "registry stopped");
        }))
    }
}

fn find_command<'a>(table: &'a CommandTable, name: &str) -> Option<&'a CommandInfo> {
    table.values().find_map(|bucket| bucket.get(name))
}

/// Base names of every file below `root`, nested entries before their directory.
///
/// Directory identity is dropped: same-named files in different subdirectories
/// collapse into one name. Unreadable entries are logged and skipped.
fn scan_folder(root: &Path) -> Vec<String> {
    WalkDir::new(root)
        .contents_first(true)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                tracing::warn!(folder = %root.display(), "Failed to read folder entry: {}", e);
                None
            }
        })
        .filter(|entry| {
            entry.file_type().is_file() || (entry.path_is_symlink() && entry.path().is_file())
        })
        .map(|entry| entry.file_name().to_string_lossy().to_string())
        .collect()
}
