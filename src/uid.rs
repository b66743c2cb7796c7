use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier of a simulation entity (zone, damper, controller, ...).
///
/// Identifiers come from the configuration source and are used verbatim in
/// result column names (`"<entityId>: <propertyName>"`).
#[derive(Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(String);

impl From<&str> for EntityId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for EntityId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl EntityId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Derives the id of an entity owned by this one, e.g. `"<zone> occupancy"`.
    pub fn derived(&self, suffix: &str) -> Self {
        Self(format!("{} {suffix}", self.0))
    }
}
