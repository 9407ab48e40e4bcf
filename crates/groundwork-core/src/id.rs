//! Node and run identifiers.

use derive_more::Display;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Logical identity of a declared resource node: `stack-name/node-name`.
///
/// Identity is name-based rather than random so that a node keeps the same
/// id across runs and can be matched against the last applied snapshot.
/// Serializes as the `stack/name` string so it can key JSON maps.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Display)]
#[display("{stack}/{name}")]
pub struct NodeId {
    stack: String,
    name: String,
}

impl NodeId {
    pub fn new(stack: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            stack: stack.into(),
            name: name.into(),
        }
    }

    /// Name of the stack that owns this node.
    pub fn stack(&self) -> &str {
        &self.stack
    }

    /// Node name, unique within its stack.
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl std::str::FromStr for NodeId {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.split_once('/') {
            Some((stack, name)) if !stack.is_empty() && !name.is_empty() => {
                Ok(Self::new(stack, name))
            }
            _ => Err(format!("invalid node id '{s}', expected 'stack/name'")),
        }
    }
}

impl Serialize for NodeId {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for NodeId {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// A unique identifier for a pipeline run.
/// Uses UUIDv7 for time-ordered, sortable IDs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[display("{_0}")]
pub struct RunId(Uuid);

impl RunId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for RunId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}
