//! Applied-state snapshots.
//!
//! After a successful deploy, the attribute map and content hash of every
//! applied node are persisted per stack. The next run diffs against this
//! snapshot so an unchanged node triggers no provisioning call.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

use crate::node::AttrValue;
use crate::{NodeId, ResourceNode};

/// Last-applied record for one node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppliedNode {
    pub kind: crate::NodeKind,
    pub attrs: BTreeMap<String, AttrValue>,
    /// Hex-encoded sha256 over the node's kind and canonicalized attributes.
    pub content_hash: String,
}

/// The last successfully applied graph snapshot for one stack.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppliedSnapshot {
    pub nodes: BTreeMap<NodeId, AppliedNode>,
}

impl AppliedSnapshot {
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Record a node as applied, replacing any previous record.
    pub fn record(&mut self, node: &ResourceNode) {
        self.nodes.insert(
            node.id.clone(),
            AppliedNode {
                kind: node.kind,
                attrs: node.attrs.clone(),
                content_hash: content_hash(node),
            },
        );
    }

    /// Forget a node after it has been destroyed.
    pub fn remove(&mut self, id: &NodeId) {
        self.nodes.remove(id);
    }

    /// True when the declared node matches the applied record exactly.
    pub fn is_unchanged(&self, node: &ResourceNode) -> bool {
        self.nodes
            .get(&node.id)
            .is_some_and(|applied| applied.content_hash == content_hash(node))
    }
}

/// Deterministic content hash over a node's kind and attributes.
///
/// BTreeMap iteration gives a canonical attribute order, so the same declared
/// node always hashes the same.
pub fn content_hash(node: &ResourceNode) -> String {
    let mut hasher = Sha256::new();
    hasher.update(node.kind.to_string().as_bytes());
    for (key, value) in &node.attrs {
        hasher.update(key.as_bytes());
        hasher.update(b"=");
        // serde_json over AttrValue is stable for a canonical map order
        hasher.update(serde_json::to_string(value).unwrap_or_default().as_bytes());
        hasher.update(b";");
    }
    hex::encode(hasher.finalize())
}
