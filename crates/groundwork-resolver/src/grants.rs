//! Permission grant resolution.

use tracing::debug;

use groundwork_core::stack::AccessIntent;
use groundwork_core::{AttrValue, Error, NodeId, NodeKind, ResourceNode, Result};
use groundwork_graph::{Graph, GraphBuilder};

/// Derive permission grant nodes from declared access intents.
///
/// For each intent (principal, resource, action-set), synthesizes one grant
/// node unless a grant with the identical value already exists. Edges: the
/// grant depends on the resource it protects; the principal depends on the
/// grant. Grant identity is a pure function of the intent value, so
/// resolving the same intent set twice yields byte-identical output.
pub fn resolve_grants(graph: &Graph, intents: &[AccessIntent]) -> Result<Graph> {
    let mut builder = GraphBuilder::from_graph(graph);

    for intent in intents {
        if !builder.contains(&intent.principal) {
            return Err(Error::UnresolvedPrincipal(intent.principal.clone()));
        }
        if !builder.contains(&intent.resource) {
            return Err(Error::UnresolvedResource(intent.resource.clone()));
        }

        let grant_id = grant_id(intent);
        if builder.contains(&grant_id) {
            // Deduplicated by value equality: same intent, same grant.
            continue;
        }

        debug!(grant = %grant_id, "deriving permission grant");

        // The principal is stored by name, not as a Ref: the principal
        // depends on the grant, so a Ref back to the principal would close a
        // cycle.
        let actions: Vec<AttrValue> = intent
            .actions
            .iter()
            .map(|a| AttrValue::Str(a.to_string()))
            .collect();
        let node = ResourceNode::new(grant_id.clone(), NodeKind::PermissionGrant)
            .with_attr("principal", intent.principal.to_string())
            .with_attr("resource", intent.resource.clone())
            .with_attr("actions", AttrValue::List(actions));

        builder.add_node(node)?;
        builder.add_edge(&intent.principal, &grant_id)?;
    }

    builder.build()
}

/// Deterministic grant identity: owned by the resource's stack, named after
/// the full (principal, actions, resource) value. The principal's stack is
/// part of the name so same-named principals in different stacks get
/// distinct grants.
fn grant_id(intent: &AccessIntent) -> NodeId {
    let actions = intent
        .actions
        .iter()
        .map(|a| a.to_string())
        .collect::<Vec<_>>()
        .join("+");
    NodeId::new(
        intent.resource.stack(),
        format!(
            "grant-{}-{}-{}-{}",
            intent.principal.stack(),
            intent.principal.name(),
            actions,
            intent.resource.name()
        ),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use groundwork_core::stack::AccessAction;

    fn id(name: &str) -> NodeId {
        NodeId::new("warehouse", name)
    }

    fn base_graph() -> Graph {
        let mut builder = GraphBuilder::new();
        builder
            .add_node(ResourceNode::new(id("data-lake"), NodeKind::Storage))
            .unwrap();
        builder
            .add_node(ResourceNode::new(id("ingest"), NodeKind::Compute))
            .unwrap();
        builder.build().unwrap()
    }

    fn write_intent() -> AccessIntent {
        AccessIntent::new(id("ingest"), id("data-lake"), [AccessAction::Write])
    }

    #[test]
    fn emits_one_grant_with_correct_edges() {
        let graph = resolve_grants(&base_graph(), &[write_intent()]).unwrap();

        let grants: Vec<_> = graph
            .nodes()
            .filter(|n| n.kind == NodeKind::PermissionGrant)
            .collect();
        assert_eq!(grants.len(), 1);

        let grant = grants[0];
        // Grant depends on the resource it protects.
        assert!(graph.dependencies_of(&grant.id).any(|d| *d == id("data-lake")));
        // Principal depends on the grant.
        assert!(graph.dependencies_of(&id("ingest")).any(|d| *d == grant.id));
    }

    #[test]
    fn identical_intents_deduplicate() {
        let graph = resolve_grants(&base_graph(), &[write_intent(), write_intent()]).unwrap();
        let count = graph
            .nodes()
            .filter(|n| n.kind == NodeKind::PermissionGrant)
            .count();
        assert_eq!(count, 1);
    }

    #[test]
    fn resolution_is_idempotent() {
        let once = resolve_grants(&base_graph(), &[write_intent()]).unwrap();
        let twice = resolve_grants(&once, &[write_intent()]).unwrap();

        let ids = |g: &Graph| -> Vec<NodeId> {
            g.nodes()
                .filter(|n| n.kind == NodeKind::PermissionGrant)
                .map(|n| n.id.clone())
                .collect()
        };
        assert_eq!(ids(&once), ids(&twice));
        assert_eq!(once.len(), twice.len());
    }

    #[test]
    fn differing_action_sets_stay_distinct() {
        let intents = [
            write_intent(),
            AccessIntent::new(id("ingest"), id("data-lake"), [AccessAction::Read]),
        ];
        let graph = resolve_grants(&base_graph(), &intents).unwrap();
        let count = graph
            .nodes()
            .filter(|n| n.kind == NodeKind::PermissionGrant)
            .count();
        assert_eq!(count, 2);
    }

    #[test]
    fn same_named_principals_in_different_stacks_stay_distinct() {
        let mut builder = GraphBuilder::from_graph(&base_graph());
        builder
            .add_node(ResourceNode::new(
                NodeId::new("alpha", "ingest"),
                NodeKind::Compute,
            ))
            .unwrap();
        builder
            .add_node(ResourceNode::new(
                NodeId::new("beta", "ingest"),
                NodeKind::Compute,
            ))
            .unwrap();
        let graph = builder.build().unwrap();

        let intents = [
            AccessIntent::new(
                NodeId::new("alpha", "ingest"),
                id("data-lake"),
                [AccessAction::Write],
            ),
            AccessIntent::new(
                NodeId::new("beta", "ingest"),
                id("data-lake"),
                [AccessAction::Write],
            ),
        ];
        let resolved = resolve_grants(&graph, &intents).unwrap();

        let grants: Vec<_> = resolved
            .nodes()
            .filter(|n| n.kind == NodeKind::PermissionGrant)
            .collect();
        assert_eq!(grants.len(), 2);
        // Each principal is ordered after its own grant.
        for stack in ["alpha", "beta"] {
            let principal = NodeId::new(stack, "ingest");
            assert!(
                resolved
                    .dependencies_of(&principal)
                    .any(|d| resolved.get(d).is_some_and(|n| n.kind
                        == NodeKind::PermissionGrant)),
                "{principal} has no grant edge"
            );
        }
    }

    #[test]
    fn unresolved_endpoints_fail() {
        let missing = AccessIntent::new(id("ghost"), id("data-lake"), [AccessAction::Read]);
        assert!(matches!(
            resolve_grants(&base_graph(), &[missing]),
            Err(Error::UnresolvedPrincipal(_))
        ));

        let missing = AccessIntent::new(id("ingest"), id("ghost"), [AccessAction::Read]);
        assert!(matches!(
            resolve_grants(&base_graph(), &[missing]),
            Err(Error::UnresolvedResource(_))
        ));
    }
}
