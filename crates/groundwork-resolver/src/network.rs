//! Network reachability resolution.

use std::collections::BTreeSet;
use tracing::debug;

use groundwork_core::stack::NetworkTuple;
use groundwork_core::{AttrValue, Error, NodeId, NodeKind, ResourceNode, Result};
use groundwork_graph::{Graph, GraphBuilder};

/// Derive ingress rule nodes from declared reachability tuples.
///
/// Tuples are deduplicated by value; each unique tuple becomes one rule node
/// depending on both referenced security contexts, so a rule is applied only
/// after the contexts exist. Rules are directional: (S, D) and (D, S) are
/// distinct. There is no rule-to-rule ordering.
pub fn resolve_network(graph: &Graph, tuples: &[NetworkTuple]) -> Result<Graph> {
    let mut builder = GraphBuilder::from_graph(graph);

    let unique: BTreeSet<&NetworkTuple> = tuples.iter().collect();
    for tuple in unique {
        let source_net = context_network(graph, &tuple.source)?;
        let dest_net = context_network(graph, &tuple.dest)?;
        if source_net != dest_net {
            return Err(Error::UnknownContext {
                context: tuple.source.clone(),
                network: dest_net,
            });
        }

        let rule_id = rule_id(tuple);
        if builder.contains(&rule_id) {
            continue;
        }

        debug!(rule = %rule_id, "deriving ingress rule");

        // Ref attrs to both contexts double as ordering edges: the rule is
        // applied only after source and destination exist.
        let node = ResourceNode::new(rule_id, NodeKind::SecurityRule)
            .with_attr("source", tuple.source.clone())
            .with_attr("dest", tuple.dest.clone())
            .with_attr("protocol", tuple.protocol.to_string())
            .with_attr("port", i64::from(tuple.port));
        builder.add_node(node)?;
    }

    builder.build()
}

/// A context must be a declared security context and sit inside a network.
fn context_network(graph: &Graph, context: &NodeId) -> Result<String> {
    let unknown = || Error::UnknownContext {
        context: context.clone(),
        network: String::new(),
    };
    let node = graph.get(context).ok_or_else(unknown)?;
    if node.kind != NodeKind::SecurityRule {
        return Err(unknown());
    }
    node.attrs
        .get("network")
        .and_then(AttrValue::as_ref_id)
        .map(|net| net.to_string())
        .ok_or_else(unknown)
}

/// Deterministic rule identity: owned by the destination's stack. Duplicate
/// (S, P, D) tuples collapse to the same id; reversed tuples do not. The
/// source context's stack is part of the name so same-named contexts in
/// different stacks get distinct rules.
fn rule_id(tuple: &NetworkTuple) -> NodeId {
    NodeId::new(
        tuple.dest.stack(),
        format!(
            "ingress-{}-{}-{}-from-{}-{}",
            tuple.dest.name(),
            tuple.protocol,
            tuple.port,
            tuple.source.stack(),
            tuple.source.name()
        ),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use groundwork_core::Capabilities;
    use groundwork_core::stack::Protocol;

    fn id(name: &str) -> NodeId {
        NodeId::new("warehouse", name)
    }

    fn context(name: &str) -> ResourceNode {
        ResourceNode::new(id(name), NodeKind::SecurityRule)
            .with_attr("network", id("vpc"))
            .with_capabilities(Capabilities {
                owns_network_attachment: true,
                ..Capabilities::none()
            })
    }

    fn base_graph() -> Graph {
        let mut builder = GraphBuilder::new();
        builder
            .add_node(ResourceNode::new(id("vpc"), NodeKind::Network))
            .unwrap();
        builder.add_node(context("rds-sg")).unwrap();
        builder.add_node(context("ec2-sg")).unwrap();
        builder.build().unwrap()
    }

    fn pg_tuple() -> NetworkTuple {
        NetworkTuple::new(id("ec2-sg"), id("rds-sg"), Protocol::Tcp, 5432)
    }

    #[test]
    fn duplicate_tuples_collapse_to_one_rule() {
        let graph = resolve_network(&base_graph(), &[pg_tuple(), pg_tuple()]).unwrap();
        let rules: Vec<_> = graph
            .nodes()
            .filter(|n| n.id.name().starts_with("ingress-"))
            .collect();
        assert_eq!(rules.len(), 1);
        assert_eq!(
            rules[0].id.name(),
            "ingress-rds-sg-tcp-5432-from-warehouse-ec2-sg"
        );
    }

    #[test]
    fn same_named_contexts_in_different_stacks_stay_distinct() {
        let mut builder = GraphBuilder::from_graph(&base_graph());
        builder
            .add_node(
                ResourceNode::new(NodeId::new("build", "ec2-sg"), NodeKind::SecurityRule)
                    .with_attr("network", id("vpc")),
            )
            .unwrap();
        let graph = builder.build().unwrap();

        let tuples = [
            pg_tuple(),
            NetworkTuple::new(NodeId::new("build", "ec2-sg"), id("rds-sg"), Protocol::Tcp, 5432),
        ];
        let resolved = resolve_network(&graph, &tuples).unwrap();
        let count = resolved
            .nodes()
            .filter(|n| n.id.name().starts_with("ingress-"))
            .count();
        assert_eq!(count, 2);
    }

    #[test]
    fn reversed_direction_never_collapses() {
        let reversed = NetworkTuple::new(id("rds-sg"), id("ec2-sg"), Protocol::Tcp, 5432);
        let graph = resolve_network(&base_graph(), &[pg_tuple(), reversed]).unwrap();
        let count = graph
            .nodes()
            .filter(|n| n.id.name().starts_with("ingress-"))
            .count();
        assert_eq!(count, 2);
    }

    #[test]
    fn rule_depends_on_both_contexts() {
        let graph = resolve_network(&base_graph(), &[pg_tuple()]).unwrap();
        let rule = graph
            .nodes()
            .find(|n| n.id.name().starts_with("ingress-"))
            .unwrap();
        let deps: BTreeSet<_> = graph.dependencies_of(&rule.id).collect();
        assert!(deps.contains(&id("rds-sg")));
        assert!(deps.contains(&id("ec2-sg")));
    }

    #[test]
    fn unknown_context_fails() {
        let bad = NetworkTuple::new(id("ghost"), id("rds-sg"), Protocol::Tcp, 5432);
        assert!(matches!(
            resolve_network(&base_graph(), &[bad]),
            Err(Error::UnknownContext { .. })
        ));
    }

    #[test]
    fn contexts_in_different_networks_fail() {
        let mut builder = GraphBuilder::from_graph(&base_graph());
        builder
            .add_node(ResourceNode::new(id("other-vpc"), NodeKind::Network))
            .unwrap();
        builder
            .add_node(
                ResourceNode::new(id("stray-sg"), NodeKind::SecurityRule)
                    .with_attr("network", id("other-vpc")),
            )
            .unwrap();
        let graph = builder.build().unwrap();

        let cross = NetworkTuple::new(id("stray-sg"), id("rds-sg"), Protocol::Tcp, 5432);
        assert!(matches!(
            resolve_network(&graph, &[cross]),
            Err(Error::UnknownContext { .. })
        ));
    }
}
