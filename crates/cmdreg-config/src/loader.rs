//! Configuration loading and validation.

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::CmdregConfig;

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML parse error: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Load full cmdreg configuration from YAML file.
///
/// Relative registry paths are resolved against the config file's directory.
pub fn load_config(path: &Path) -> Result<CmdregConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    let mut config: CmdregConfig = serde_yaml::from_str(&content)?;
    validate_config(&config)?;
    if let Some(base) = path.parent() {
        config.resolve_relative_to(base);
    }
    Ok(config)
}

pub fn validate_config(config: &CmdregConfig) -> Result<(), ConfigError> {
    if config.version == 0 {
        return Err(ConfigError::Invalid(
            "version must be greater than 0".to_string(),
        ));
    }

    if config.app.name.trim().is_empty() {
        return Err(ConfigError::Invalid(
            "app.name must not be empty".to_string(),
        ));
    }

    if config.bus.capacity == 0 {
        return Err(ConfigError::Invalid(
            "bus.capacity must be > 0".to_string(),
        ));
    }

    validate_messages(config)?;
    validate_registries(config)?;

    Ok(())
}

fn validate_messages(config: &CmdregConfig) -> Result<(), ConfigError> {
    let messages = &config.messages;
    if messages.command_id >= 0 {
        return Err(ConfigError::Invalid(format!(
            "messages.command_id must be negative (reserved), got {}",
            messages.command_id
        )));
    }
    if messages.folder_id >= 0 {
        return Err(ConfigError::Invalid(format!(
            "messages.folder_id must be negative (reserved), got {}",
            messages.folder_id
        )));
    }
    if messages.command_id == messages.folder_id {
        return Err(ConfigError::Invalid(
            "messages.command_id and messages.folder_id must differ".to_string(),
        ));
    }
    Ok(())
}

fn validate_registries(config: &CmdregConfig) -> Result<(), ConfigError> {
    if config.registries.is_empty() {
        return Err(ConfigError::Invalid(
            "at least one registry must be configured".to_string(),
        ));
    }

    let mut seen = HashSet::new();
    for spec in &config.registries {
        if spec.name.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "registries[].name must not be empty".to_string(),
            ));
        }
        if !seen.insert(spec.name.as_str()) {
            return Err(ConfigError::Invalid(format!(
                "registry '{}' is defined more than once",
                spec.name
            )));
        }
        if spec.commands_file.as_os_str().is_empty() {
            return Err(ConfigError::Invalid(format!(
                "registries[{}].commands_file must not be empty",
                spec.name
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RegistrySpec;
    use std::path::PathBuf;

    #[test]
    fn test_validate_config_accepts_defaults() {
        let config = CmdregConfig::default();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_validate_config_rejects_non_negative_reserved_id() {
        let mut config = CmdregConfig::default();
        config.messages.command_id = 4;
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn test_validate_config_rejects_colliding_reserved_ids() {
        let mut config = CmdregConfig::default();
        config.messages.folder_id = config.messages.command_id;
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn test_validate_config_rejects_duplicate_registry_names() {
        let mut config = CmdregConfig::default();
        config.registries.push(RegistrySpec {
            name: "default".to_string(),
            commands_file: PathBuf::from("other.json"),
            folders_file: None,
        });
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn test_validate_config_rejects_zero_bus_capacity() {
        let mut config = CmdregConfig::default();
        config.bus.capacity = 0;
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn test_load_config_resolves_relative_paths() {
        let root = std::env::temp_dir().join(format!("cmdreg-config-{}", uuid::Uuid::new_v4()));
        fs::create_dir_all(&root).expect("mkdir");
        let path = root.join("cmdreg.yaml");
        fs::write(
            &path,
            r#"
version: 1
messages:
  command_id: -10
  folder_id: -11
watcher:
  debounce_ms: 50
registries:
  - name: buttons
    commands_file: data/commands.json
    folders_file: /abs/folders.json
"#,
        )
        .expect("write");

        let config = load_config(&path).expect("load");

        assert_eq!(config.messages.command().0, -10);
        assert_eq!(config.watcher.debounce_ms, 50);
        assert!(config.watcher.enabled);
        let spec = config.registry("buttons").expect("registry");
        assert_eq!(spec.commands_file, root.join("data/commands.json"));
        assert_eq!(spec.folders_file, Some(PathBuf::from("/abs/folders.json")));
        let _ = fs::remove_dir_all(root);
    }
}
