//! Resource node model.
//!
//! A node is the smallest unit of declared infrastructure. Kinds are a flat
//! tagged enum plus a capability set rather than an inheritance hierarchy;
//! anything that varies per kind lives in the attribute map.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::NodeId;

/// What kind of infrastructure a node declares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NodeKind {
    /// Object storage (bucket).
    Storage,
    /// Network boundary (VPC, subnet, gateway endpoint).
    Network,
    /// Compute (function, bastion instance, build project).
    Compute,
    /// Relational or other managed data store.
    DataStore,
    /// Security context / derived ingress rule.
    SecurityRule,
    /// Derived permission grant.
    PermissionGrant,
    /// An action owned by a pipeline stage.
    PipelineStageAction,
}

impl std::fmt::Display for NodeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            NodeKind::Storage => "storage",
            NodeKind::Network => "network",
            NodeKind::Compute => "compute",
            NodeKind::DataStore => "data-store",
            NodeKind::SecurityRule => "security-rule",
            NodeKind::PermissionGrant => "permission-grant",
            NodeKind::PipelineStageAction => "pipeline-stage-action",
        };
        f.write_str(s)
    }
}

/// Capability flags a node carries instead of subclassing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    /// Node can attach to a network (has a security context).
    pub owns_network_attachment: bool,
    /// Node's data can be granted for reading.
    pub grants_readable: bool,
    /// Node's data can be granted for writing.
    pub grants_writable: bool,
}

impl Capabilities {
    pub fn none() -> Self {
        Self::default()
    }
}

/// A configuration attribute value.
///
/// `Ref` values point at another node's identity and become implicit
/// dependency edges when the graph is built. Node ids serialize as plain
/// strings, so `Ref` carries a `{"ref": ...}` wrapper to stay
/// distinguishable from `Str` under untagged deserialization.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttrValue {
    Str(String),
    Int(i64),
    Bool(bool),
    List(Vec<AttrValue>),
    Ref(#[serde(with = "ref_attr")] NodeId),
}

mod ref_attr {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    use crate::NodeId;

    #[derive(Serialize, Deserialize)]
    struct Tagged {
        #[serde(rename = "ref")]
        target: NodeId,
    }

    pub fn serialize<S: Serializer>(id: &NodeId, serializer: S) -> Result<S::Ok, S::Error> {
        Tagged { target: id.clone() }.serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NodeId, D::Error> {
        Ok(Tagged::deserialize(deserializer)?.target)
    }
}

impl AttrValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttrValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_ref_id(&self) -> Option<&NodeId> {
        match self {
            AttrValue::Ref(id) => Some(id),
            _ => None,
        }
    }

    /// All node references inside this value, including nested lists.
    pub fn references(&self) -> Vec<&NodeId> {
        match self {
            AttrValue::Ref(id) => vec![id],
            AttrValue::List(items) => items.iter().flat_map(|v| v.references()).collect(),
            _ => vec![],
        }
    }
}

impl From<&str> for AttrValue {
    fn from(s: &str) -> Self {
        AttrValue::Str(s.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(s: String) -> Self {
        AttrValue::Str(s)
    }
}

impl From<i64> for AttrValue {
    fn from(i: i64) -> Self {
        AttrValue::Int(i)
    }
}

impl From<bool> for AttrValue {
    fn from(b: bool) -> Self {
        AttrValue::Bool(b)
    }
}

impl From<NodeId> for AttrValue {
    fn from(id: NodeId) -> Self {
        AttrValue::Ref(id)
    }
}

/// Smallest unit of declared infrastructure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceNode {
    /// Identity, unique within the build.
    pub id: NodeId,
    /// Kind tag.
    pub kind: NodeKind,
    /// Semantic configuration attributes (retention policy, instance size, ...).
    pub attrs: BTreeMap<String, AttrValue>,
    /// Explicit author-declared dependencies.
    pub depends_on: BTreeSet<NodeId>,
    /// Capability flags.
    pub capabilities: Capabilities,
}

impl ResourceNode {
    pub fn new(id: NodeId, kind: NodeKind) -> Self {
        Self {
            id,
            kind,
            attrs: BTreeMap::new(),
            depends_on: BTreeSet::new(),
            capabilities: Capabilities::none(),
        }
    }

    pub fn with_attr(mut self, key: impl Into<String>, value: impl Into<AttrValue>) -> Self {
        self.attrs.insert(key.into(), value.into());
        self
    }

    pub fn with_dependency(mut self, target: NodeId) -> Self {
        self.depends_on.insert(target);
        self
    }

    pub fn with_capabilities(mut self, capabilities: Capabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Every node this one references: explicit `depends_on` plus implicit
    /// `Ref` attribute values.
    pub fn references(&self) -> BTreeSet<&NodeId> {
        self.depends_on
            .iter()
            .chain(self.attrs.values().flat_map(|v| v.references()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ref_attrs_count_as_references() {
        let bucket = NodeId::new("warehouse", "data-lake");
        let node = ResourceNode::new(NodeId::new("warehouse", "ingest"), NodeKind::Compute)
            .with_attr("memory-mb", 3008)
            .with_attr("data-bucket", bucket.clone());

        let refs = node.references();
        assert!(refs.contains(&bucket));
        assert_eq!(refs.len(), 1);
    }

    #[test]
    fn explicit_and_implicit_references_merge() {
        let a = NodeId::new("s", "a");
        let b = NodeId::new("s", "b");
        let node = ResourceNode::new(NodeId::new("s", "c"), NodeKind::Compute)
            .with_dependency(a.clone())
            .with_attr("target", b.clone());

        let refs = node.references();
        assert!(refs.contains(&a));
        assert!(refs.contains(&b));
    }

    #[test]
    fn ref_and_str_attrs_stay_distinct_through_json() {
        let id = NodeId::new("warehouse", "data-lake");
        let reference = AttrValue::Ref(id.clone());
        let plain = AttrValue::Str("warehouse/data-lake".to_string());

        let reference_json = serde_json::to_string(&reference).unwrap();
        assert_eq!(reference_json, "{\"ref\":\"warehouse/data-lake\"}");
        assert_eq!(
            serde_json::from_str::<AttrValue>(&reference_json).unwrap(),
            reference
        );

        let plain_json = serde_json::to_string(&plain).unwrap();
        assert_eq!(
            serde_json::from_str::<AttrValue>(&plain_json).unwrap(),
            plain
        );
    }
}
