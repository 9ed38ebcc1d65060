use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Mapping `type -> (command name -> CommandInfo)`.
///
/// Ordered by key so that every scan over the table is deterministic.
pub type CommandTable = BTreeMap<String, BTreeMap<String, CommandInfo>>;

/// Tag describing the payload shape a command expects (`button`, `encoder`, ...).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct InputType(pub String);

impl InputType {
    pub const BUTTON: &'static str = "button";
    pub const ENCODER: &'static str = "encoder";
    pub const KEY: &'static str = "key";

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for InputType {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for InputType {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<&InputType> for InputType {
    fn from(value: &InputType) -> Self {
        value.clone()
    }
}

impl fmt::Display for InputType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl AsRef<str> for InputType {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl PartialEq<&str> for InputType {
    fn eq(&self, other: &&str) -> bool {
        self.as_str() == *other
    }
}

/// One entry of the command table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandInfo {
    /// Destination message id the command is forwarded to
    pub id: i64,
    /// Expected payload shape
    pub input_type: InputType,
    /// Folder the command was derived from; `None` for hand-added commands
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

impl CommandInfo {
    /// Create a hand-added command entry
    pub fn new(id: i64, input_type: impl Into<InputType>) -> Self {
        Self {
            id,
            input_type: input_type.into(),
            path: None,
        }
    }

    /// Create an entry derived from a watched folder
    pub fn foldered(id: i64, input_type: impl Into<InputType>, path: impl Into<String>) -> Self {
        Self {
            id,
            input_type: input_type.into(),
            path: Some(path.into()),
        }
    }

    /// Whether this entry was auto-registered from a folder
    pub fn is_foldered(&self) -> bool {
        self.path.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_hand_added_command_omits_path() {
        let info = CommandInfo::new(7, InputType::BUTTON);
        let value = serde_json::to_value(&info).unwrap();
        assert_eq!(value, json!({"id": 7, "input_type": "button"}));
        assert!(!info.is_foldered());
    }

    #[test]
    fn test_foldered_command_round_trips_path() {
        let raw = json!({"id": 3, "input_type": "key", "path": "/tmp/cmds"});
        let info: CommandInfo = serde_json::from_value(raw).unwrap();
        assert_eq!(info, CommandInfo::foldered(3, "key", "/tmp/cmds"));
        assert!(info.is_foldered());
    }

    #[test]
    fn test_table_serializes_as_nested_objects() {
        let mut table = CommandTable::new();
        table
            .entry("buttons".to_string())
            .or_default()
            .insert("fire".to_string(), CommandInfo::new(42, "button"));
        let value = serde_json::to_value(&table).unwrap();
        assert_eq!(
            value,
            json!({"buttons": {"fire": {"id": 42, "input_type": "button"}}})
        );
    }
}
