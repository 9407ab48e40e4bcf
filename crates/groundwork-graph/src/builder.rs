//! Append-only graph builder with cycle detection.

use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

use groundwork_core::{Error, NodeId, ResourceNode, Result};

use crate::Graph;

/// Collects resource nodes and edges, then validates them into an immutable
/// [`Graph`].
///
/// Edges are directed: `add_edge(from, to)` declares that `from` depends on
/// `to`. Implicit edges from `depends_on` sets and `Ref` attribute values are
/// added during `build()`. The builder is append-only; nothing is removed or
/// rewritten before `build()`.
#[derive(Debug, Default)]
pub struct GraphBuilder {
    nodes: BTreeMap<NodeId, ResourceNode>,
    edges: BTreeMap<NodeId, BTreeSet<NodeId>>,
}

impl GraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a builder with an existing graph's nodes and edges. Resolvers use
    /// this to derive a new graph without mutating the input.
    pub fn from_graph(graph: &Graph) -> Self {
        let mut builder = Self::new();
        for node in graph.nodes() {
            builder.nodes.insert(node.id.clone(), node.clone());
        }
        for node in graph.nodes() {
            let deps: BTreeSet<NodeId> = graph.dependencies_of(&node.id).cloned().collect();
            if !deps.is_empty() {
                builder.edges.insert(node.id.clone(), deps);
            }
        }
        builder
    }

    /// Add a node. Fails if the identity already exists within the build.
    pub fn add_node(&mut self, node: ResourceNode) -> Result<()> {
        if self.nodes.contains_key(&node.id) {
            return Err(Error::DuplicateNode(node.id));
        }
        debug!(node = %node.id, kind = %node.kind, "adding node");
        self.nodes.insert(node.id.clone(), node);
        Ok(())
    }

    pub fn contains(&self, id: &NodeId) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn get(&self, id: &NodeId) -> Option<&ResourceNode> {
        self.nodes.get(id)
    }

    /// Declare that `from` depends on `to`. Both endpoints must already be
    /// known.
    pub fn add_edge(&mut self, from: &NodeId, to: &NodeId) -> Result<()> {
        if !self.nodes.contains_key(from) {
            return Err(Error::UnknownNode(from.clone()));
        }
        if !self.nodes.contains_key(to) {
            return Err(Error::UnknownNode(to.clone()));
        }
        self.edges
            .entry(from.clone())
            .or_default()
            .insert(to.clone());
        Ok(())
    }

    /// Validate and freeze into an immutable [`Graph`].
    ///
    /// Resolves implicit edges from each node's reference set, rejects
    /// dangling references, and runs a depth-first cycle check that reports
    /// the full cycle path.
    pub fn build(mut self) -> Result<Graph> {
        // Materialize implicit edges from node references.
        let implicit: Vec<(NodeId, NodeId)> = self
            .nodes
            .values()
            .flat_map(|node| {
                node.references()
                    .into_iter()
                    .map(|target| (node.id.clone(), target.clone()))
                    .collect::<Vec<_>>()
            })
            .collect();
        for (from, to) in implicit {
            if !self.nodes.contains_key(&to) {
                return Err(Error::DanglingReference { node: from, target: to });
            }
            self.edges.entry(from).or_default().insert(to);
        }

        // Edges added via add_edge are already endpoint-checked; only cycles
        // remain to be ruled out.
        self.detect_cycle()?;

        debug!(nodes = self.nodes.len(), "graph built");
        Ok(Graph::new(self.nodes, self.edges))
    }

    /// Depth-first traversal with a recursion-stack marker. Returns
    /// `Error::Cycle` with the full path on the first cycle found.
    fn detect_cycle(&self) -> Result<()> {
        #[derive(Clone, Copy, PartialEq)]
        enum Mark {
            Visiting,
            Done,
        }

        let mut marks: BTreeMap<&NodeId, Mark> = BTreeMap::new();
        let mut stack: Vec<&NodeId> = Vec::new();

        fn visit<'a>(
            id: &'a NodeId,
            edges: &'a BTreeMap<NodeId, BTreeSet<NodeId>>,
            marks: &mut BTreeMap<&'a NodeId, Mark>,
            stack: &mut Vec<&'a NodeId>,
        ) -> Result<()> {
            match marks.get(id) {
                Some(Mark::Done) => return Ok(()),
                Some(Mark::Visiting) => {
                    // Slice the stack from the first occurrence to close the
                    // reported loop.
                    let start = stack.iter().position(|n| *n == id).unwrap_or(0);
                    let mut path: Vec<NodeId> = stack[start..].iter().map(|n| (*n).clone()).collect();
                    path.push(id.clone());
                    return Err(Error::Cycle { path });
                }
                None => {}
            }

            marks.insert(id, Mark::Visiting);
            stack.push(id);
            for dep in edges.get(id).into_iter().flatten() {
                visit(dep, edges, marks, stack)?;
            }
            stack.pop();
            marks.insert(id, Mark::Done);
            Ok(())
        }

        for id in self.nodes.keys() {
            visit(id, &self.edges, &mut marks, &mut stack)?;
        }
        Ok(())
    }
}
