//! Stack declarations.
//!
//! A stack is the ownership boundary for a group of resource nodes. It also
//! carries the declared access intents and network tuples that the resolvers
//! turn into derived grant and rule nodes.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::{NodeId, ResourceNode};

/// An action a principal may perform on a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessAction {
    Read,
    Write,
    Put,
}

impl std::fmt::Display for AccessAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AccessAction::Read => write!(f, "read"),
            AccessAction::Write => write!(f, "write"),
            AccessAction::Put => write!(f, "put"),
        }
    }
}

impl std::str::FromStr for AccessAction {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "read" => Ok(AccessAction::Read),
            "write" => Ok(AccessAction::Write),
            "put" => Ok(AccessAction::Put),
            other => Err(format!("unknown access action '{other}'")),
        }
    }
}

/// Declared intent: principal P may perform action-set A on resource R.
///
/// Intents are authored; the grant nodes derived from them are not.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AccessIntent {
    pub principal: NodeId,
    pub resource: NodeId,
    pub actions: BTreeSet<AccessAction>,
}

impl AccessIntent {
    pub fn new(
        principal: NodeId,
        resource: NodeId,
        actions: impl IntoIterator<Item = AccessAction>,
    ) -> Self {
        Self {
            principal,
            resource,
            actions: actions.into_iter().collect(),
        }
    }
}

/// Network protocol for a reachability tuple.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Tcp,
    Udp,
}

impl std::fmt::Display for Protocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Protocol::Tcp => write!(f, "tcp"),
            Protocol::Udp => write!(f, "udp"),
        }
    }
}

impl std::str::FromStr for Protocol {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "tcp" => Ok(Protocol::Tcp),
            "udp" => Ok(Protocol::Udp),
            other => Err(format!("unknown protocol '{other}'")),
        }
    }
}

/// Declared reachability: from security context S, allow protocol/port to
/// context D. Directional; a bidirectional need is two tuples.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NetworkTuple {
    pub source: NodeId,
    pub dest: NodeId,
    pub protocol: Protocol,
    pub port: u16,
}

impl NetworkTuple {
    pub fn new(source: NodeId, dest: NodeId, protocol: Protocol, port: u16) -> Self {
        Self {
            source,
            dest,
            protocol,
            port,
        }
    }
}

/// A named, independently deployable grouping of resource nodes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Stack {
    /// Stack name; prefixes every owned node id.
    pub name: String,
    /// Nodes this stack owns exclusively.
    pub nodes: Vec<ResourceNode>,
    /// Declared access intents to resolve into grants.
    pub access_intents: Vec<AccessIntent>,
    /// Declared reachability tuples to resolve into rules.
    pub network_tuples: Vec<NetworkTuple>,
}

impl Stack {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Read-only references this stack makes into other stacks. These force
    /// a deploy-order dependency between the stacks as a whole.
    pub fn cross_stack_references(&self) -> BTreeSet<&str> {
        self.nodes
            .iter()
            .flat_map(|n| n.references())
            .map(|id| id.stack())
            .filter(|stack| *stack != self.name)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::NodeKind;

    #[test]
    fn cross_stack_references_exclude_own_stack() {
        let mut stack = Stack::new("pipeline");
        stack.nodes.push(
            ResourceNode::new(NodeId::new("pipeline", "deploy"), NodeKind::Compute)
                .with_dependency(NodeId::new("warehouse", "db"))
                .with_dependency(NodeId::new("pipeline", "source")),
        );

        let refs = stack.cross_stack_references();
        assert_eq!(refs, BTreeSet::from(["warehouse"]));
    }
}
