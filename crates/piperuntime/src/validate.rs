//! Structural checks performed before a flow is handed to the executor.

use crate::graph::FlowGraph;
use pipecore::{Flow, FlowDefError, InstructionSource, NodeId, ProcessResults, Value};
use serde::Serialize;
use std::collections::HashSet;

/// Where a validated flow starts and where it may end
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowPlan {
    pub start: NodeId,
    pub end_nodes: Vec<NodeId>,
}

/// Validate `flow` and compute its start node and end-node set.
///
/// Multi-node flows must have exactly one start node with outgoing edges,
/// end nodes with incoming edges, no isolated nodes and a path from the
/// start to at least one end. Every node must reference a known instruction
/// and set all required parameters.
pub fn validate_flow(
    flow: &Flow,
    instructions: &dyn InstructionSource,
) -> Result<FlowPlan, FlowDefError> {
    if flow.nodes.is_empty() {
        return Err(FlowDefError::Empty);
    }

    let node_ids: HashSet<&str> = flow.nodes.iter().map(|n| n.id.as_str()).collect();
    let mut connections = HashSet::new();
    for edge in &flow.edges {
        if edge.source == edge.target {
            return Err(FlowDefError::SelfLoop(edge.source.clone()));
        }
        for endpoint in [&edge.source, &edge.target] {
            if !node_ids.contains(endpoint.as_str()) {
                return Err(FlowDefError::DanglingEdge {
                    edge_id: edge.id.clone(),
                    node_id: endpoint.clone(),
                });
            }
        }
        if !connections.insert((edge.source.as_str(), edge.target.as_str())) {
            return Err(FlowDefError::DuplicateEdge {
                from: edge.source.clone(),
                to: edge.target.clone(),
            });
        }
    }

    let graph = FlowGraph::new(flow);

    let start = match graph.start_nodes().as_slice() {
        [] => return Err(FlowDefError::NoStartNode),
        [only] => only.id.clone(),
        many => {
            return Err(FlowDefError::MultipleStartNodes(
                many.iter().map(|n| n.id.clone()).collect(),
            ))
        }
    };

    let end_nodes: Vec<NodeId> = graph.end_nodes().iter().map(|n| n.id.clone()).collect();
    if end_nodes.is_empty() {
        return Err(FlowDefError::NoEndNode);
    }

    if flow.nodes.len() > 1 {
        if !graph.has_outgoing(&start) {
            return Err(FlowDefError::StartWithoutOutgoing(start));
        }
        if let Some(end) = end_nodes.iter().find(|id| !graph.has_incoming(id)) {
            return Err(FlowDefError::EndWithoutIncoming(end.clone()));
        }

        let isolated: Vec<NodeId> = flow
            .nodes
            .iter()
            .filter(|n| !graph.has_incoming(&n.id) && !graph.has_outgoing(&n.id))
            .map(|n| n.id.clone())
            .collect();
        if !isolated.is_empty() {
            return Err(FlowDefError::IsolatedNodes(isolated));
        }

        if !end_nodes.iter().any(|end| graph.has_path(&start, end)) {
            return Err(FlowDefError::NoPathToEnd);
        }
    }

    for node in &flow.nodes {
        let instruction = instructions
            .get_instruction_by_id(&node.instruction_id)
            .ok_or_else(|| FlowDefError::UnknownInstruction {
                node_id: node.id.clone(),
                instruction_id: node.instruction_id.clone(),
            })?;
        if let Some(missing) = instruction
            .parameters
            .iter()
            .find(|p| p.required && !node.params.contains_key(&p.name))
        {
            return Err(FlowDefError::MissingRequiredParam {
                node_id: node.id.clone(),
                param: missing.label.clone(),
            });
        }
    }

    if graph.is_cyclic() {
        tracing::warn!(
            "Flow {} contains a cycle; revisits will stop the run",
            flow.id
        );
    }

    Ok(FlowPlan { start, end_nodes })
}

/// A value an upstream node makes available to later nodes
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Variable {
    /// Placeholder text, e.g. `{{n1.text}}`
    pub name: String,
    pub label: String,
    pub value: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpstreamNode {
    pub node_id: NodeId,
    pub instruction_id: String,
    pub node_name: String,
    pub variables: Vec<Variable>,
}

/// Every node that can reach `target`, nearest first, with the variables
/// its params expose. Labels come from the instruction schema when known.
pub fn upstream_variables(
    flow: &Flow,
    target: &str,
    instructions: &dyn InstructionSource,
) -> Result<Vec<UpstreamNode>, FlowDefError> {
    if flow.find_node(target).is_none() {
        return Err(FlowDefError::NodeNotFound(target.to_string()));
    }

    let graph = FlowGraph::new(flow);
    let nodes = graph
        .predecessors(target)
        .into_iter()
        .map(|node| {
            let instruction = instructions.get_instruction_by_id(&node.instruction_id);
            let mut names: Vec<&String> = node.params.keys().collect();
            names.sort();
            let variables = names
                .into_iter()
                .map(|param| {
                    let label = instruction
                        .as_ref()
                        .and_then(|i| i.find_parameter(param))
                        .map(|p| p.label.clone())
                        .unwrap_or_else(|| param.clone());
                    Variable {
                        name: format!("{{{{{}}}}}", ProcessResults::key(&node.id, param)),
                        label,
                        value: node.params[param].clone(),
                    }
                })
                .collect();
            UpstreamNode {
                node_id: node.id.clone(),
                instruction_id: node.instruction_id.clone(),
                node_name: node.display_name().to_string(),
                variables,
            }
        })
        .collect();

    Ok(nodes)
}
