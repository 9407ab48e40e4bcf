//! CLI command implementations.

pub mod run;
pub mod stacks;

use anyhow::{Context, Result};

use groundwork_core::snapshot::AppliedSnapshot;
use groundwork_core::stack::Stack;
use groundwork_deployer::StateStore;
use groundwork_graph::{Graph, GraphBuilder};
use groundwork_resolver::{resolve_grants, resolve_network};

/// Parse a declaration file and resolve it into the full derived graph.
pub fn synthesize(path: &str) -> Result<(Vec<Stack>, Graph)> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read declaration file: {path}"))?;
    let stacks = groundwork_config::parse_stacks(&content)
        .with_context(|| format!("failed to parse declarations: {path}"))?;

    let graph = resolve(&stacks)?;
    Ok((stacks, graph))
}

/// Build and resolve the graph for a set of declared stacks.
pub fn resolve(stacks: &[Stack]) -> Result<Graph> {
    let mut builder = GraphBuilder::new();
    for stack in stacks {
        for node in &stack.nodes {
            builder.add_node(node.clone())?;
        }
    }
    let graph = builder.build()?;

    let intents: Vec<_> = stacks.iter().flat_map(|s| s.access_intents.clone()).collect();
    let graph = resolve_grants(&graph, &intents)?;

    let tuples: Vec<_> = stacks.iter().flat_map(|s| s.network_tuples.clone()).collect();
    let graph = resolve_network(&graph, &tuples)?;

    Ok(graph)
}

/// Load every declared stack's snapshot into one combined view for diffing.
pub fn load_combined_snapshot(store: &StateStore, stacks: &[Stack]) -> Result<AppliedSnapshot> {
    let mut combined = AppliedSnapshot::default();
    for stack in stacks {
        let snapshot = store
            .load(&stack.name)
            .with_context(|| format!("failed to load state for stack '{}'", stack.name))?;
        combined.nodes.extend(snapshot.nodes);
    }
    Ok(combined)
}

/// Split a combined snapshot back out and persist it per stack.
pub fn save_combined_snapshot(
    store: &StateStore,
    stacks: &[Stack],
    combined: &AppliedSnapshot,
) -> Result<()> {
    for stack in stacks {
        let mut snapshot = AppliedSnapshot::default();
        for (id, applied) in &combined.nodes {
            if id.stack() == stack.name {
                snapshot.nodes.insert(id.clone(), applied.clone());
            }
        }
        store
            .save(&stack.name, &snapshot)
            .with_context(|| format!("failed to save state for stack '{}'", stack.name))?;
    }
    Ok(())
}
