use serde::{Deserialize, Serialize};

use super::InputType;
use crate::message::MessageId;

/// A watched folder whose files are auto-registered as commands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FolderDefinition {
    /// Directory to scan
    pub path: String,
    /// Destination id given to every command found here
    pub id: i64,
    /// Table bucket this folder populates
    #[serde(rename = "type")]
    pub kind: String,
    /// Input type given to every command found here
    pub input_type: InputType,
    /// Human label used for folder lookup
    pub name: String,
}

impl FolderDefinition {
    /// Negative ids are reserved and never watched.
    pub fn has_reserved_id(&self) -> bool {
        MessageId(self.id).is_reserved()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_folder_definition_uses_type_key() {
        let raw = json!({
            "path": "cmds/lights",
            "id": 5,
            "type": "lights",
            "input_type": "button",
            "name": "Lights"
        });
        let folder: FolderDefinition = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(folder.kind, "lights");
        assert!(!folder.has_reserved_id());
        assert_eq!(serde_json::to_value(&folder).unwrap(), raw);
    }
}
