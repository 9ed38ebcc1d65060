use std::sync::{Arc, PoisonError, RwLock};

use cmdreg_core::types::{CommandInfo, CommandTable, FolderDefinition};

use crate::registry::CommandRegistry;

/// Every live registry of a process, in registration order.
///
/// Registries add themselves on construction and are never removed.
#[derive(Default)]
pub struct RegistryDirectory {
    registries: RwLock<Vec<Arc<CommandRegistry>>>,
}

impl RegistryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, registry: Arc<CommandRegistry>) {
        tracing::debug!(registry = %registry.name(), "registry added to directory");
        self.registries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(registry);
    }

    pub fn registries(&self) -> Vec<Arc<CommandRegistry>> {
        self.registries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn get(&self, name: &str) -> Option<Arc<CommandRegistry>> {
        self.registries().into_iter().find(|r| r.name() == name)
    }

    /// First match across all registries; earlier registrations win ties.
    pub fn get_command(&self, name: &str) -> Option<CommandInfo> {
        self.registries()
            .iter()
            .find_map(|registry| registry.get_command(name))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get_command(name).is_some()
    }

    /// Union of every registry's table by type. A later registry's bucket
    /// replaces an earlier one of the same type.
    pub fn get_all_commands_global(&self) -> CommandTable {
        let mut out = CommandTable::new();
        for registry in self.registries() {
            out.extend(registry.snapshot());
        }
        out
    }

    /// Folder definition `name` among registries bound to `folders_file`.
    pub fn get_folder(&self, folders_file: &str, name: &str) -> Option<FolderDefinition> {
        self.registries()
            .iter()
            .filter(|r| r.folders_file() == Some(folders_file))
            .find_map(|r| {
                r.folder_definitions()
                    .iter()
                    .find(|f| f.name == name)
                    .cloned()
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{FolderSet, RegistryContext};
    use cmdreg_core::types::InputType;
    use cmdreg_stores::{BroadcastMessageBus, InMemoryTableStore, NoopFolderWatcher};

    fn context() -> RegistryContext {
        RegistryContext::new(
            Arc::new(BroadcastMessageBus::new(16)),
            Arc::new(NoopFolderWatcher),
        )
    }

    async fn open(ctx: &RegistryContext, name: &str, folders: Option<FolderSet>) -> Arc<CommandRegistry> {
        CommandRegistry::open(
            name,
            Arc::new(InMemoryTableStore::<CommandTable>::new(name)),
            folders,
            ctx,
        )
        .await
        .expect("open registry")
    }

    #[test]
    fn test_cross_registry_lookup_prefers_first_registered() {
        tokio_test::block_on(async {
            let ctx = context();
            let first = open(&ctx, "first", None).await;
            let second = open(&ctx, "second", None).await;
            first.add_command("shared", 1, "t", "button").unwrap();
            second.add_command("shared", 2, "t", "button").unwrap();
            second.add_command("only", 3, "u", "key").unwrap();

            assert_eq!(ctx.directory.get_command("shared").map(|c| c.id), Some(1));
            assert!(ctx.directory.contains("only"));
            assert!(!ctx.directory.contains("nowhere"));
            assert_eq!(ctx.directory.registries().len(), 2);
            assert!(ctx.directory.get("second").is_some());
        });
    }

    #[test]
    fn test_global_listing_later_registry_replaces_bucket() {
        tokio_test::block_on(async {
            let ctx = context();
            let first = open(&ctx, "first", None).await;
            let second = open(&ctx, "second", None).await;
            first.add_command("a", 1, "t", "button").unwrap();
            first.add_command("k", 4, "keys", "key").unwrap();
            second.add_command("b", 2, "t", "button").unwrap();

            let global = ctx.directory.get_all_commands_global();

            assert_eq!(global["t"].keys().collect::<Vec<_>>(), vec!["b"]);
            assert!(global["keys"].contains_key("k"));
        });
    }

    #[test]
    fn test_get_folder_matches_file_and_name() {
        tokio_test::block_on(async {
            let ctx = context();
            let root = std::env::temp_dir().join(format!("cmdreg-dir-{}", uuid::Uuid::new_v4()));
            let folder = FolderDefinition {
                path: root.join("pads").to_string_lossy().to_string(),
                id: 7,
                kind: "pads".to_string(),
                input_type: InputType::from(InputType::BUTTON),
                name: "Pads".to_string(),
            };
            open(&ctx, "no-folders", None).await;
            open(
                &ctx,
                "with-folders",
                Some(FolderSet::new("folders.json", vec![folder.clone()])),
            )
            .await;

            assert_eq!(ctx.directory.get_folder("folders.json", "Pads"), Some(folder));
            assert!(ctx.directory.get_folder("other.json", "Pads").is_none());
            assert!(ctx.directory.get_folder("folders.json", "Missing").is_none());
            let _ = std::fs::remove_dir_all(root);
        });
    }
}
