//! Stack declaration parsing.
//!
//! ```kdl
//! stack "warehouse" {
//!     node "data-lake" kind="storage" {
//!         attr "retention" "destroy"
//!         capabilities readable=#true writable=#true
//!     }
//!     node "ingest" kind="compute" {
//!         attr "memory-mb" 3008
//!         ref "data-bucket" "data-lake"
//!         depends-on "vpc"
//!     }
//!     allow principal="ingest" resource="data-lake" actions="put,write"
//!     ingress from="build-sg" to="rds-sg" protocol="tcp" port=5432
//! }
//! ```
//!
//! Bare node names resolve within the declaring stack; `other-stack/name`
//! declares a read-only cross-stack reference.

use kdl::{KdlDocument, KdlNode};
use std::collections::BTreeSet;

use groundwork_core::stack::{AccessIntent, NetworkTuple, Stack};
use groundwork_core::{AttrValue, Capabilities, NodeId, NodeKind, ResourceNode};

use crate::{ConfigError, ConfigResult};

/// Parse one or more stack declarations from KDL text.
pub fn parse_stacks(kdl: &str) -> ConfigResult<Vec<Stack>> {
    let doc: KdlDocument = kdl.parse()?;

    let mut stacks = Vec::new();
    for node in doc.nodes() {
        match node.name().value() {
            "stack" => stacks.push(parse_stack(node)?),
            _ => {} // Ignore unknown nodes
        }
    }

    if stacks.is_empty() {
        return Err(ConfigError::MissingField("stack declaration".to_string()));
    }

    let mut seen = BTreeSet::new();
    for stack in &stacks {
        if !seen.insert(stack.name.clone()) {
            return Err(ConfigError::Duplicate(format!("stack '{}'", stack.name)));
        }
    }

    Ok(stacks)
}

fn parse_stack(node: &KdlNode) -> ConfigResult<Stack> {
    let name = get_first_string_arg(node)
        .ok_or_else(|| ConfigError::MissingField("stack name".to_string()))?;

    let mut stack = Stack::new(name.clone());

    if let Some(children) = node.children() {
        for child in children.nodes() {
            match child.name().value() {
                "node" => {
                    let resource = parse_node(&name, child)?;
                    if stack.nodes.iter().any(|n| n.id == resource.id) {
                        return Err(ConfigError::Duplicate(format!("node '{}'", resource.id)));
                    }
                    stack.nodes.push(resource);
                }
                "allow" => stack.access_intents.push(parse_allow(&name, child)?),
                "ingress" => stack.network_tuples.push(parse_ingress(&name, child)?),
                _ => {}
            }
        }
    }

    Ok(stack)
}

fn parse_node(stack: &str, node: &KdlNode) -> ConfigResult<ResourceNode> {
    let name = get_first_string_arg(node)
        .ok_or_else(|| ConfigError::MissingField("node name".to_string()))?;

    let kind_str = get_string_prop(node, "kind")
        .ok_or_else(|| ConfigError::MissingField(format!("kind for node '{name}'")))?;
    let kind = parse_kind(&kind_str)?;

    let mut resource = ResourceNode::new(NodeId::new(stack, &name), kind);

    if let Some(children) = node.children() {
        for child in children.nodes() {
            match child.name().value() {
                "attr" => {
                    let (key, value) = parse_attr(child)?;
                    resource.attrs.insert(key, value);
                }
                "ref" => {
                    let (key, target) = parse_ref(stack, child)?;
                    resource.attrs.insert(key, AttrValue::Ref(target));
                }
                "depends-on" => {
                    for target in get_all_string_args(child) {
                        resource.depends_on.insert(node_ref(stack, &target));
                    }
                }
                "capabilities" => {
                    resource.capabilities = Capabilities {
                        owns_network_attachment: get_bool_prop(child, "attached")
                            .unwrap_or(false),
                        grants_readable: get_bool_prop(child, "readable").unwrap_or(false),
                        grants_writable: get_bool_prop(child, "writable").unwrap_or(false),
                    };
                }
                _ => {}
            }
        }
    }

    // Security contexts belong to a network; express that as a ref so the
    // edge is derived like any other.
    if kind == NodeKind::SecurityRule {
        if let Some(network) = get_string_prop(node, "network") {
            resource
                .attrs
                .insert("network".to_string(), AttrValue::Ref(node_ref(stack, &network)));
        }
    }

    Ok(resource)
}

fn parse_kind(s: &str) -> ConfigResult<NodeKind> {
    match s {
        "storage" => Ok(NodeKind::Storage),
        "network" => Ok(NodeKind::Network),
        "compute" => Ok(NodeKind::Compute),
        "data-store" => Ok(NodeKind::DataStore),
        "security-rule" => Ok(NodeKind::SecurityRule),
        other => Err(ConfigError::InvalidValue {
            field: "kind".to_string(),
            message: format!(
                "unknown node kind '{other}' (grants and stage actions are derived, not declared)"
            ),
        }),
    }
}

/// `attr "key" <string|int|bool>`
fn parse_attr(node: &KdlNode) -> ConfigResult<(String, AttrValue)> {
    let mut positional = node.entries().iter().filter(|e| e.name().is_none());
    let key = positional
        .next()
        .and_then(|e| e.value().as_string())
        .ok_or_else(|| ConfigError::MissingField("attr key".to_string()))?
        .to_string();
    let entry = positional
        .next()
        .ok_or_else(|| ConfigError::MissingField(format!("value for attr '{key}'")))?;

    let value = if let Some(s) = entry.value().as_string() {
        AttrValue::Str(s.to_string())
    } else if let Some(i) = entry.value().as_integer() {
        let i = i64::try_from(i).map_err(|_| ConfigError::InvalidValue {
            field: key.clone(),
            message: format!("{i} is out of range"),
        })?;
        AttrValue::Int(i)
    } else if let Some(b) = entry.value().as_bool() {
        AttrValue::Bool(b)
    } else {
        return Err(ConfigError::InvalidValue {
            field: key,
            message: "expected string, integer or boolean".to_string(),
        });
    };

    Ok((key, value))
}

/// `ref "key" "target-node"`
fn parse_ref(stack: &str, node: &KdlNode) -> ConfigResult<(String, NodeId)> {
    let args = get_all_string_args(node);
    match args.as_slice() {
        [key, target] => Ok((key.clone(), node_ref(stack, target))),
        _ => Err(ConfigError::MissingField(
            "ref expects a key and a target".to_string(),
        )),
    }
}

fn parse_allow(stack: &str, node: &KdlNode) -> ConfigResult<AccessIntent> {
    let principal = get_string_prop(node, "principal")
        .ok_or_else(|| ConfigError::MissingField("allow principal".to_string()))?;
    let resource = get_string_prop(node, "resource")
        .ok_or_else(|| ConfigError::MissingField("allow resource".to_string()))?;
    let actions_str = get_string_prop(node, "actions")
        .ok_or_else(|| ConfigError::MissingField("allow actions".to_string()))?;

    let mut actions = BTreeSet::new();
    for action in actions_str.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let parsed = action.parse().map_err(|message| ConfigError::InvalidValue {
            field: "actions".to_string(),
            message,
        })?;
        actions.insert(parsed);
    }
    if actions.is_empty() {
        return Err(ConfigError::MissingField("allow actions".to_string()));
    }

    Ok(AccessIntent {
        principal: node_ref(stack, &principal),
        resource: node_ref(stack, &resource),
        actions,
    })
}

fn parse_ingress(stack: &str, node: &KdlNode) -> ConfigResult<NetworkTuple> {
    let from = get_string_prop(node, "from")
        .ok_or_else(|| ConfigError::MissingField("ingress from".to_string()))?;
    let to = get_string_prop(node, "to")
        .ok_or_else(|| ConfigError::MissingField("ingress to".to_string()))?;
    let protocol = get_string_prop(node, "protocol")
        .ok_or_else(|| ConfigError::MissingField("ingress protocol".to_string()))?
        .parse()
        .map_err(|message| ConfigError::InvalidValue {
            field: "protocol".to_string(),
            message,
        })?;
    let port = get_int_prop(node, "port")
        .ok_or_else(|| ConfigError::MissingField("ingress port".to_string()))?;
    let port = u16::try_from(port).map_err(|_| ConfigError::InvalidValue {
        field: "port".to_string(),
        message: format!("{port} is out of range"),
    })?;

    Ok(NetworkTuple::new(
        node_ref(stack, &from),
        node_ref(stack, &to),
        protocol,
        port,
    ))
}

/// Resolve a declared reference: bare names are stack-local, `stack/name`
/// crosses stacks.
fn node_ref(stack: &str, target: &str) -> NodeId {
    match target.split_once('/') {
        Some((other, name)) => NodeId::new(other, name),
        None => NodeId::new(stack, target),
    }
}

// Helper functions for extracting values from KDL nodes

fn get_first_string_arg(node: &KdlNode) -> Option<String> {
    node.entries()
        .iter()
        .find(|e| e.name().is_none())
        .and_then(|e| e.value().as_string())
        .map(|s| s.to_string())
}

fn get_all_string_args(node: &KdlNode) -> Vec<String> {
    node.entries()
        .iter()
        .filter(|e| e.name().is_none())
        .filter_map(|e| e.value().as_string())
        .map(|s| s.to_string())
        .collect()
}

fn get_string_prop(node: &KdlNode, name: &str) -> Option<String> {
    node.get(name)
        .and_then(|v| v.as_string())
        .map(|s| s.to_string())
}

fn get_bool_prop(node: &KdlNode, name: &str) -> Option<bool> {
    node.get(name).and_then(|v| v.as_bool())
}

fn get_int_prop(node: &KdlNode, name: &str) -> Option<i128> {
    node.get(name).and_then(|v| v.as_integer())
}

#[cfg(test)]
mod tests {
    use super::*;
    use groundwork_core::stack::{AccessAction, Protocol};

    #[test]
    fn parses_nodes_with_attrs_and_refs() {
        let kdl = r#"
            stack "warehouse" {
                node "data-lake" kind="storage" {
                    attr "retention" "destroy"
                    capabilities readable=#true writable=#true
                }
                node "ingest" kind="compute" {
                    attr "memory-mb" 3008
                    ref "data-bucket" "data-lake"
                }
            }
        "#;

        let stacks = parse_stacks(kdl).unwrap();
        assert_eq!(stacks.len(), 1);
        let stack = &stacks[0];
        assert_eq!(stack.nodes.len(), 2);

        let lake = &stack.nodes[0];
        assert_eq!(lake.id, NodeId::new("warehouse", "data-lake"));
        assert_eq!(lake.kind, NodeKind::Storage);
        assert!(lake.capabilities.grants_writable);

        let ingest = &stack.nodes[1];
        assert_eq!(
            ingest.attrs.get("memory-mb"),
            Some(&AttrValue::Int(3008))
        );
        assert_eq!(
            ingest.attrs.get("data-bucket"),
            Some(&AttrValue::Ref(NodeId::new("warehouse", "data-lake")))
        );
    }

    #[test]
    fn parses_allow_and_ingress() {
        let kdl = r#"
            stack "warehouse" {
                node "vpc" kind="network"
                node "rds-sg" kind="security-rule" network="vpc"
                node "build-sg" kind="security-rule" network="vpc"
                node "lake" kind="storage"
                node "ingest" kind="compute"
                allow principal="ingest" resource="lake" actions="put,write"
                ingress from="build-sg" to="rds-sg" protocol="tcp" port=5432
            }
        "#;

        let stacks = parse_stacks(kdl).unwrap();
        let stack = &stacks[0];

        assert_eq!(stack.access_intents.len(), 1);
        let intent = &stack.access_intents[0];
        assert_eq!(intent.principal, NodeId::new("warehouse", "ingest"));
        assert!(intent.actions.contains(&AccessAction::Put));
        assert!(intent.actions.contains(&AccessAction::Write));

        assert_eq!(stack.network_tuples.len(), 1);
        let tuple = &stack.network_tuples[0];
        assert_eq!(tuple.protocol, Protocol::Tcp);
        assert_eq!(tuple.port, 5432);

        let sg = stack
            .nodes
            .iter()
            .find(|n| n.id.name() == "rds-sg")
            .unwrap();
        assert_eq!(
            sg.attrs.get("network"),
            Some(&AttrValue::Ref(NodeId::new("warehouse", "vpc")))
        );
    }

    #[test]
    fn cross_stack_reference_parses() {
        let kdl = r#"
            stack "pipeline" {
                node "deploy" kind="compute" {
                    depends-on "warehouse/db"
                }
            }
        "#;

        let stacks = parse_stacks(kdl).unwrap();
        let deploy = &stacks[0].nodes[0];
        assert!(deploy.depends_on.contains(&NodeId::new("warehouse", "db")));
    }

    #[test]
    fn derived_kinds_cannot_be_declared() {
        let kdl = r#"
            stack "warehouse" {
                node "sneaky" kind="permission-grant"
            }
        "#;
        assert!(matches!(
            parse_stacks(kdl),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn duplicate_node_names_rejected() {
        let kdl = r#"
            stack "warehouse" {
                node "lake" kind="storage"
                node "lake" kind="storage"
            }
        "#;
        assert!(matches!(parse_stacks(kdl), Err(ConfigError::Duplicate(_))));
    }

    #[test]
    fn attr_integer_overflow_rejected() {
        let kdl = r#"
            stack "warehouse" {
                node "ingest" kind="compute" {
                    attr "memory-mb" 9223372036854775808
                }
            }
        "#;
        assert!(matches!(
            parse_stacks(kdl),
            Err(ConfigError::InvalidValue { ref field, .. }) if field == "memory-mb"
        ));
    }

    #[test]
    fn unknown_access_action_rejected() {
        let kdl = r#"
            stack "warehouse" {
                node "lake" kind="storage"
                node "ingest" kind="compute"
                allow principal="ingest" resource="lake" actions="admin"
            }
        "#;
        assert!(matches!(
            parse_stacks(kdl),
            Err(ConfigError::InvalidValue { .. })
        ));
    }
}
