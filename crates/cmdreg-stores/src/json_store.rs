//! JSON file persistence.

use std::fs;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use cmdreg_core::store::{StoreError, TableStore};
use cmdreg_core::types::FolderDefinition;

/// TableStore backed by one pretty-printed JSON file.
///
/// Saves write a sibling temp file and rename it over the target, so a reader
/// never observes a half-written document.
pub struct JsonFileStore<T> {
    path: PathBuf,
    _marker: PhantomData<fn() -> T>,
}

impl<T> JsonFileStore<T> {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            _marker: PhantomData,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let file_name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "table".to_string());
        self.path
            .with_file_name(format!(".{}.{}.tmp", file_name, uuid::Uuid::new_v4()))
    }
}

impl<T> TableStore<T> for JsonFileStore<T>
where
    T: Serialize + DeserializeOwned + Default,
{
    fn load(&self) -> Result<T, StoreError> {
        if !self.path.exists() {
            return Ok(T::default());
        }
        let content = fs::read_to_string(&self.path)
            .map_err(|e| StoreError::Io(format!("{}: {}", self.path.display(), e)))?;
        if content.trim().is_empty() {
            return Ok(T::default());
        }
        serde_json::from_str(&content)
            .map_err(|e| StoreError::Serialization(format!("{}: {}", self.path.display(), e)))
    }

    fn save(&self, value: &T) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .map_err(|e| StoreError::Io(format!("{}: {}", parent.display(), e)))?;
        }
        let payload = serde_json::to_string_pretty(value)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;

        let temp = self.temp_path();
        if let Err(e) = fs::write(&temp, payload) {
            return Err(StoreError::Io(format!("{}: {}", temp.display(), e)));
        }
        if let Err(e) = fs::rename(&temp, &self.path) {
            let _ = fs::remove_file(&temp);
            return Err(StoreError::Io(format!("{}: {}", self.path.display(), e)));
        }
        Ok(())
    }

    fn location(&self) -> String {
        self.path.display().to_string()
    }
}

/// Load folder definitions from a JSON array file.
///
/// A missing file yields no folders. Records that do not parse (for example a
/// non-integer id) are logged and skipped so their siblings still load.
pub fn load_folder_definitions(path: &Path) -> Result<Vec<FolderDefinition>, StoreError> {
    if !path.exists() {
        tracing::warn!(file = %path.display(), "folder definitions file not found, no folders loaded");
        return Ok(Vec::new());
    }
    let content = fs::read_to_string(path)
        .map_err(|e| StoreError::Io(format!("{}: {}", path.display(), e)))?;
    if content.trim().is_empty() {
        return Ok(Vec::new());
    }
    let records: Vec<Value> = serde_json::from_str(&content)
        .map_err(|e| StoreError::Serialization(format!("{}: {}", path.display(), e)))?;

    let mut folders = Vec::with_capacity(records.len());
    for (index, record) in records.into_iter().enumerate() {
        if record.is_null() {
            continue;
        }
        match serde_json::from_value::<FolderDefinition>(record) {
            Ok(folder) => folders.push(folder),
            Err(e) => {
                tracing::error!(
                    file = %path.display(),
                    index,
                    "invalid folder definition, skipped: {}",
                    e
                );
            }
        }
    }
    Ok(folders)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cmdreg_core::types::{CommandInfo, CommandTable};

    fn temp_root(tag: &str) -> PathBuf {
        let root = std::env::temp_dir().join(format!("cmdreg-{}-{}", tag, uuid::Uuid::new_v4()));
        fs::create_dir_all(&root).expect("mkdir");
        root
    }

    #[test]
    fn test_json_store_missing_file_loads_default() {
        let root = temp_root("json-missing");
        let store: JsonFileStore<CommandTable> = JsonFileStore::new(root.join("commands.json"));
        assert!(store.load().expect("load").is_empty());
        let _ = fs::remove_dir_all(root);
    }

    #[test]
    fn test_json_store_save_creates_parent_and_reloads() {
        let root = temp_root("json-save");
        let path = root.join("nested").join("commands.json");
        let store: JsonFileStore<CommandTable> = JsonFileStore::new(&path);

        let mut table = CommandTable::new();
        table
            .entry("buttons".to_string())
            .or_default()
            .insert("fire".to_string(), CommandInfo::new(42, "button"));
        store.save(&table).expect("save");

        assert!(path.exists());
        assert_eq!(store.load().expect("load"), table);

        let leftovers: Vec<_> = fs::read_dir(path.parent().unwrap())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
        let _ = fs::remove_dir_all(root);
    }

    #[test]
    fn test_json_store_rejects_malformed_document() {
        let root = temp_root("json-bad");
        let path = root.join("commands.json");
        fs::write(&path, "{not json").unwrap();
        let store: JsonFileStore<CommandTable> = JsonFileStore::new(&path);
        assert!(matches!(store.load(), Err(StoreError::Serialization(_))));
        let _ = fs::remove_dir_all(root);
    }

    #[test]
    fn test_folder_definitions_skip_malformed_records() {
        let root = temp_root("folders");
        let path = root.join("folders.json");
        fs::write(
            &path,
            r#"[
                {"path": "a", "id": 1, "type": "ta", "input_type": "button", "name": "A"},
                {"path": "b", "id": "oops", "type": "tb", "input_type": "button", "name": "B"},
                {"path": "c", "id": -4, "type": "tc", "input_type": "key", "name": "C"}
            ]"#,
        )
        .unwrap();

        let folders = load_folder_definitions(&path).expect("load");

        assert_eq!(folders.len(), 2);
        assert_eq!(folders[0].name, "A");
        assert_eq!(folders[1].id, -4);
        let _ = fs::remove_dir_all(root);
    }

    #[test]
    fn test_folder_definitions_missing_file_is_empty() {
        let root = temp_root("folders-missing");
        let folders = load_folder_definitions(&root.join("none.json")).expect("load");
        assert!(folders.is_empty());
        let _ = fs::remove_dir_all(root);
    }
}
