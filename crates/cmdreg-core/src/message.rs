//! Bus message envelope.
//!
//! Every message carries a [`MessageId`]. Non-negative ids address downstream
//! consumers; negative ids are reserved for the registry itself.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use crate::types::{CommandInfo, InputType};

/// Message identifier used for bus routing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(pub i64);

impl MessageId {
    /// Default id of inbound command-dispatch messages.
    pub const COMMAND: MessageId = MessageId(-2);
    /// Default id of folder-change notifications.
    pub const FOLDER_CHANGED: MessageId = MessageId(-3);

    pub fn is_reserved(&self) -> bool {
        self.0 < 0
    }
}

impl From<i64> for MessageId {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Inbound user action naming a command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandRequest {
    /// Command name to look up
    pub name: String,
    /// Action payload (e.g. `"down"`, `"left"`)
    pub event: Value,
    /// Input type declared by the sender
    pub input_type: InputType,
}

/// Outbound dispatch of a resolved command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputMessage {
    pub name: String,
    pub event: Value,
    /// Full table entry the command resolved to
    pub info: CommandInfo,
}

/// Message payload variants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MessageBody {
    /// Inbound command to be resolved and forwarded
    Command(CommandRequest),
    /// A watched folder changed on disk
    FolderChanged { path: String },
    /// Resolved command on its way to the destination consumer
    Input(InputMessage),
}

/// Message envelope carried by the bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub body: MessageBody,
    pub timestamp: DateTime<Utc>,
}

impl Message {
    pub fn new(id: impl Into<MessageId>, body: MessageBody) -> Self {
        Self {
            id: id.into(),
            body,
            timestamp: Utc::now(),
        }
    }

    /// Create an inbound command-dispatch message
    pub fn command(
        id: impl Into<MessageId>,
        name: impl Into<String>,
        event: Value,
        input_type: impl Into<InputType>,
    ) -> Self {
        Self::new(
            id,
            MessageBody::Command(CommandRequest {
                name: name.into(),
                event,
                input_type: input_type.into(),
            }),
        )
    }

    /// Create a folder-change notification
    pub fn folder_changed(id: impl Into<MessageId>, path: impl Into<String>) -> Self {
        Self::new(id, MessageBody::FolderChanged { path: path.into() })
    }

    /// Create an outbound dispatch addressed to `info.id`
    pub fn input(name: impl Into<String>, event: Value, info: CommandInfo) -> Self {
        let id = MessageId(info.id);
        Self::new(
            id,
            MessageBody::Input(InputMessage {
                name: name.into(),
                event,
                info,
            }),
        )
    }
}
