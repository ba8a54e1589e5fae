use petgraph::algo::{has_path_connecting, is_cyclic_directed};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::{Bfs, Reversed};
use pipecore::{Edge, Flow, Node};
use std::collections::HashMap;

/// One edge leaving a node, as seen from its source
#[derive(Debug, Clone, Copy)]
pub struct OutgoingEdge<'a> {
    pub edge: &'a Edge,
    pub target: &'a str,
    pub guard: Option<&'a str>,
}

/// Read-only adjacency view over a flow definition.
///
/// Outgoing edges keep the order in which they were declared in the flow;
/// branch selection depends on it.
pub struct FlowGraph<'a> {
    flow: &'a Flow,
    nodes: HashMap<&'a str, &'a Node>,
    adjacency: HashMap<&'a str, Vec<OutgoingEdge<'a>>>,
    incoming: HashMap<&'a str, usize>,
    graph: DiGraph<&'a str, ()>,
    index: HashMap<&'a str, NodeIndex>,
}

impl<'a> FlowGraph<'a> {
    pub fn new(flow: &'a Flow) -> Self {
        let mut graph = DiGraph::new();
        let mut index = HashMap::new();
        let mut nodes = HashMap::new();

        for node in &flow.nodes {
            nodes.entry(node.id.as_str()).or_insert(node);
            index
                .entry(node.id.as_str())
                .or_insert_with(|| graph.add_node(node.id.as_str()));
        }

        let mut adjacency: HashMap<&'a str, Vec<OutgoingEdge<'a>>> = HashMap::new();
        let mut incoming: HashMap<&'a str, usize> = HashMap::new();
        for edge in &flow.edges {
            adjacency
                .entry(edge.source.as_str())
                .or_default()
                .push(OutgoingEdge {
                    edge,
                    target: edge.target.as_str(),
                    guard: edge.label.as_deref(),
                });
            *incoming.entry(edge.target.as_str()).or_default() += 1;

            if let (Some(from), Some(to)) = (
                index.get(edge.source.as_str()),
                index.get(edge.target.as_str()),
            ) {
                graph.add_edge(*from, *to, ());
            }
        }

        Self {
            flow,
            nodes,
            adjacency,
            incoming,
            graph,
            index,
        }
    }

    pub fn flow(&self) -> &'a Flow {
        self.flow
    }

    pub fn node(&self, id: &str) -> Option<&'a Node> {
        self.nodes.get(id).copied()
    }

    /// Edges leaving `id`, in declaration order.
    pub fn outgoing(&self, id: &str) -> &[OutgoingEdge<'a>] {
        self.adjacency.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn has_outgoing(&self, id: &str) -> bool {
        !self.outgoing(id).is_empty()
    }

    pub fn has_incoming(&self, id: &str) -> bool {
        self.incoming.get(id).copied().unwrap_or(0) > 0
    }

    /// Nodes without incoming edges, in declaration order.
    pub fn start_nodes(&self) -> Vec<&'a Node> {
        self.flow
            .nodes
            .iter()
            .filter(|n| !self.has_incoming(&n.id))
            .collect()
    }

    /// Nodes without outgoing edges, in declaration order.
    pub fn end_nodes(&self) -> Vec<&'a Node> {
        self.flow
            .nodes
            .iter()
            .filter(|n| !self.has_outgoing(&n.id))
            .collect()
    }

    pub fn has_path(&self, from: &str, to: &str) -> bool {
        match (self.index.get(from), self.index.get(to)) {
            (Some(a), Some(b)) => has_path_connecting(&self.graph, *a, *b, None),
            _ => false,
        }
    }

    pub fn is_cyclic(&self) -> bool {
        is_cyclic_directed(&self.graph)
    }

    /// Every node that can reach `target`, nearest first. `target` itself is
    /// excluded even when it sits on a cycle.
    pub fn predecessors(&self, target: &str) -> Vec<&'a Node> {
        let Some(start) = self.index.get(target) else {
            return Vec::new();
        };
        let reversed = Reversed(&self.graph);
        let mut bfs = Bfs::new(reversed, *start);
        let mut found = Vec::new();
        while let Some(idx) = bfs.next(reversed) {
            let id = self.graph[idx];
            if id == target {
                continue;
            }
            if let Some(node) = self.node(id) {
                found.push(node);
            }
        }
        found
    }
}
