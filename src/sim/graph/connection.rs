use serde::{Deserialize, Serialize};

use crate::EntityId;

/// Directed signal edge: `receiver.receiver_property ← sender.sender_property`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Connection {
    pub receiver: EntityId,
    pub sender: EntityId,
    pub receiver_property: String,
    pub sender_property: String,
}

impl Connection {
    pub fn new(
        receiver: impl Into<EntityId>,
        receiver_property: impl Into<String>,
        sender: impl Into<EntityId>,
        sender_property: impl Into<String>,
    ) -> Self {
        Self {
            receiver: receiver.into(),
            sender: sender.into(),
            receiver_property: receiver_property.into(),
            sender_property: sender_property.into(),
        }
    }
}
