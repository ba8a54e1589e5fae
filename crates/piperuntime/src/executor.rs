use crate::condition;
use crate::dispatcher::dispatch;
use crate::graph::{FlowGraph, OutgoingEdge};
use crate::resolver::{reference_key, resolve_params, resolve_text};
use chrono::Utc;
use pipecore::{
    duration_millis, Direction, EventBus, ExecutionEvent, ExecutionReport, FileRecord, Flow,
    Instruction, InstructionSource, Node, NodeId, ParamKind, Parameter, ProcessResults,
    RunContext, RunFailure, RunOutcome, RunReport, TaskContext, TaskError, Value, ValueType,
};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::time::Instant;

/// Message used as the final result when the last node produced nothing.
pub const EMPTY_RESULT_MESSAGE: &str = "execution succeeded with no data";

/// Runs a flow one node at a time, following the first edge whose guard is
/// satisfied, until an end node is reached or no edge qualifies.
pub struct FlowExecutor<'a> {
    instructions: &'a dyn InstructionSource,
    event_bus: &'a EventBus,
}

/// Mutable state of a single run. Never shared between runs.
#[derive(Default)]
struct RunState {
    results: ProcessResults,
    executed: HashSet<NodeId>,
    order: Vec<NodeId>,
    reached_end: bool,
    last_result: Option<Value>,
    last_output_key: Option<String>,
}

enum Halt {
    Failed(RunFailure),
    Terminated(Option<NodeId>),
}

impl<'a> FlowExecutor<'a> {
    pub fn new(instructions: &'a dyn InstructionSource, event_bus: &'a EventBus) -> Self {
        Self {
            instructions,
            event_bus,
        }
    }

    /// Execute `flow` from `start`. The start node and end-node set are
    /// computed by the caller. Every terminal state, including failures,
    /// comes back as a report.
    pub async fn execute(
        &self,
        flow: &Flow,
        start: &str,
        end_nodes: &[NodeId],
        ctx: &RunContext,
    ) -> RunReport {
        let started = Instant::now();
        tracing::info!("Starting flow run {} for flow {} ({})", ctx.run_id, flow.id, flow.name);

        self.event_bus.emit(ExecutionEvent::FlowStarted {
            run_id: ctx.run_id,
            flow_id: flow.id.clone(),
            start_node: start.to_string(),
            timestamp: Utc::now(),
        });

        let graph = FlowGraph::new(flow);
        let end_nodes: HashSet<&str> = end_nodes.iter().map(String::as_str).collect();
        let mut state = RunState::default();

        let outcome = match self.run(&graph, start, &end_nodes, ctx, &mut state).await {
            Ok(()) => RunOutcome::Completed,
            Err(Halt::Failed(failure)) => RunOutcome::Failed { failure },
            Err(Halt::Terminated(at_node)) => RunOutcome::Terminated { at_node },
        };

        let final_result = match (&outcome, state.last_result.take()) {
            (RunOutcome::Failed { failure: failure @ RunFailure::Node { .. } }, _) => {
                Value::String(format!("flow run failed: {}", failure))
            }
            (RunOutcome::Completed, last) => finalize_result(last),
            (_, None) => Value::String(outcome.error_message().unwrap_or_default()),
            (_, last) => finalize_result(last),
        };

        let report = ExecutionReport {
            flow_id: flow.id.clone(),
            flow_name: flow.name.clone(),
            final_result,
            total_nodes_executed: state.executed.len(),
            execution_order: state.order,
            process_results: state.results,
            reached_end_node: state.reached_end,
        };

        let duration = started.elapsed();
        match &outcome {
            RunOutcome::Completed => tracing::info!(
                "Flow run {} completed in {}ms",
                ctx.run_id,
                duration.as_millis()
            ),
            other => tracing::warn!(
                "Flow run {} ended early: {}",
                ctx.run_id,
                other.error_message().unwrap_or_default()
            ),
        }

        self.event_bus.emit(ExecutionEvent::FlowFinished {
            run_id: ctx.run_id,
            flow_id: flow.id.clone(),
            status: outcome.status(),
            duration_ms: duration_millis(duration),
            timestamp: Utc::now(),
        });

        RunReport {
            run_id: ctx.run_id,
            outcome,
            report,
            duration,
        }
    }

    async fn run(
        &self,
        graph: &FlowGraph<'_>,
        start: &str,
        end_nodes: &HashSet<&str>,
        ctx: &RunContext,
        state: &mut RunState,
    ) -> Result<(), Halt> {
        self.execute_node(graph, start, end_nodes, ctx, state).await?;
        let mut current = start.to_string();

        while !state.reached_end {
            if ctx.is_terminated() {
                tracing::info!("Run {} terminated after node {}", ctx.run_id, current);
                return Err(Halt::Terminated(Some(current)));
            }

            let (next, revisited) = self.select_edge(graph, &current, state);
            match next {
                Some(edge) => {
                    tracing::debug!("Taking edge {} -> {}", current, edge.target);
                    self.event_bus.emit(ExecutionEvent::EdgeTaken {
                        run_id: ctx.run_id,
                        source: current.clone(),
                        target: edge.target.to_string(),
                        guard: edge.guard.map(str::to_string),
                        timestamp: Utc::now(),
                    });
                    self.execute_node(graph, edge.target, end_nodes, ctx, state)
                        .await?;
                    current = edge.target.to_string();
                }
                None if !revisited.is_empty() => {
                    tracing::warn!(
                        "Cycle detected at {}: remaining edges lead back to {:?}",
                        current,
                        revisited
                    );
                    return Err(Halt::Failed(RunFailure::CycleDetected {
                        node_id: current,
                        revisited,
                    }));
                }
                None => {
                    tracing::info!("No eligible edge after node {}, stopping", current);
                    return Err(Halt::Failed(RunFailure::EndNotReached { last_node: current }));
                }
            }
        }

        Ok(())
    }

    /// First outgoing edge, in declaration order, whose target has not run
    /// yet and whose guard is satisfied. Also returns the already executed
    /// targets that were skipped.
    fn select_edge<'g>(
        &self,
        graph: &'g FlowGraph<'_>,
        current: &str,
        state: &RunState,
    ) -> (Option<OutgoingEdge<'g>>, Vec<NodeId>) {
        let output = state
            .last_output_key
            .as_deref()
            .and_then(|key| state.results.get(key));
        let mut revisited = Vec::new();

        for edge in graph.outgoing(current) {
            if state.executed.contains(edge.target) {
                revisited.push(edge.target.to_string());
                continue;
            }
            let satisfied = match edge.guard {
                None => true,
                Some(guard) => {
                    let resolved = resolve_text(guard, &state.results);
                    condition::satisfied(&resolved, output)
                }
            };
            if satisfied {
                return (Some(*edge), revisited);
            }
            tracing::debug!(
                "Guard {:?} on {} -> {} not satisfied",
                edge.guard,
                current,
                edge.target
            );
        }

        (None, revisited)
    }

    async fn execute_node(
        &self,
        graph: &FlowGraph<'_>,
        node_id: &str,
        end_nodes: &HashSet<&str>,
        ctx: &RunContext,
        state: &mut RunState,
    ) -> Result<(), Halt> {
        if ctx.is_terminated() {
            tracing::info!("Run {} terminated before node {}", ctx.run_id, node_id);
            return Err(Halt::Terminated(Some(node_id.to_string())));
        }

        let Some(node) = graph.node(node_id) else {
            tracing::error!("Node {} not found in flow", node_id);
            return Err(Halt::Failed(RunFailure::UnknownNode {
                node_id: node_id.to_string(),
            }));
        };

        tracing::info!(
            "Executing node {} (instruction {})",
            node.id,
            node.instruction_id
        );
        self.event_bus.emit(ExecutionEvent::NodeStarted {
            run_id: ctx.run_id,
            node_id: node.id.clone(),
            instruction_id: node.instruction_id.clone(),
            timestamp: Utc::now(),
        });

        let started = Instant::now();
        match self.run_instruction(node, ctx, state).await {
            Ok((output_key, result)) => {
                let duration_ms = duration_millis(started.elapsed());
                tracing::info!("Node {} completed in {}ms", node.id, duration_ms);
                self.event_bus.emit(ExecutionEvent::NodeCompleted {
                    run_id: ctx.run_id,
                    node_id: node.id.clone(),
                    output: Some(result.clone()),
                    duration_ms,
                    timestamp: Utc::now(),
                });

                state.executed.insert(node.id.clone());
                state.order.push(node.id.clone());
                state.last_result = Some(result);
                state.last_output_key = output_key;

                if end_nodes.contains(node.id.as_str()) {
                    tracing::info!("Reached end node {}", node.id);
                    state.reached_end = true;
                }
                Ok(())
            }
            Err(TaskError::Cancelled) => {
                tracing::info!("Node {} cancelled", node.id);
                Err(Halt::Terminated(Some(node.id.clone())))
            }
            Err(e) => {
                tracing::error!("Node {} failed: {}", node.id, e);
                self.event_bus.emit(ExecutionEvent::NodeFailed {
                    run_id: ctx.run_id,
                    node_id: node.id.clone(),
                    error: e.to_string(),
                    timestamp: Utc::now(),
                });
                Err(Halt::Failed(RunFailure::Node {
                    node_id: node.id.clone(),
                    instruction_id: node.instruction_id.clone(),
                    error_message: e.to_string(),
                }))
            }
        }
    }

    /// Resolve params, record inputs, dispatch, record the result. Returns
    /// the process-results key of the node's output, if it has one.
    async fn run_instruction(
        &self,
        node: &Node,
        ctx: &RunContext,
        state: &mut RunState,
    ) -> Result<(Option<String>, Value), TaskError> {
        let resolved = resolve_params(&node.params, &state.results);
        let instruction = self
            .instructions
            .get_instruction_by_id(&node.instruction_id)
            .ok_or_else(|| TaskError::InstructionNotFound(node.instruction_id.clone()))?;

        let inputs = collect_inputs(&instruction, &resolved)?;
        for (name, value) in &inputs {
            state
                .results
                .insert(ProcessResults::key(&node.id, name), value.clone());
        }

        let task_ctx = TaskContext {
            run_id: ctx.run_id,
            node_id: node.id.clone(),
            events: self.event_bus.create_emitter(ctx.run_id, node.id.clone()),
            cancellation: ctx.cancellation.clone(),
        };
        let result = dispatch(instruction.body.as_ref(), task_ctx, inputs).await?;

        let Some(param) = instruction.result_parameter() else {
            return Ok((None, result));
        };

        let output_key = ProcessResults::key(&node.id, &param.name);
        state.results.insert(output_key.clone(), result.clone());

        if param.direction == Direction::Writeback {
            write_back(node, param, &result, &mut state.results);
        }

        Ok((Some(output_key), result))
    }
}

/// Overwrite the value the writeback param points at (`{{node.param}}`)
/// with `result`. Targets that were never produced are left alone.
fn write_back(node: &Node, param: &Parameter, result: &Value, results: &mut ProcessResults) {
    let Some(target) = node
        .params
        .get(&param.name)
        .and_then(Value::as_str)
        .and_then(reference_key)
    else {
        return;
    };

    if results.overwrite(&target, result.clone()) {
        tracing::debug!("Node {} wrote back into {}", node.id, target);
    } else {
        tracing::warn!(
            "Node {} cannot write back into {}: no value has been produced there",
            node.id,
            target
        );
    }
}

/// Pick the instruction's input params out of the resolved node params,
/// fill defaults and coerce each value to its schema type.
pub fn collect_inputs(
    instruction: &Instruction,
    resolved: &HashMap<String, Value>,
) -> Result<HashMap<String, Value>, TaskError> {
    let mut inputs = HashMap::new();
    for param in instruction.inputs() {
        let value = match (resolved.get(&param.name), &param.default_value) {
            (Some(value), _) => value.clone(),
            (None, Some(default)) => default.clone(),
            (None, None) => continue,
        };
        inputs.insert(param.name.clone(), coerce_to_kind(param, value)?);
    }
    Ok(inputs)
}

fn coerce_to_kind(param: &Parameter, value: Value) -> Result<Value, TaskError> {
    match param.kind {
        ParamKind::Any => Ok(value),
        ParamKind::String => Ok(match value {
            Value::String(_) => value,
            other => Value::String(other.to_string()),
        }),
        ParamKind::Boolean => Ok(value.coerce(ValueType::Bool).unwrap_or(value)),
        ParamKind::Number => match &value {
            Value::Int(_) | Value::Float(_) => Ok(value),
            Value::Bool(b) => Ok(Value::Int(*b as i64)),
            Value::String(text) => value
                .coerce(ValueType::Int)
                .or_else(|| text.trim().parse::<f64>().ok().map(Value::Float))
                .ok_or_else(|| TaskError::InvalidInputType {
                    field: param.name.clone(),
                    expected: "number".to_string(),
                    actual: format!("'{}'", text),
                }),
            other => Err(TaskError::InvalidInputType {
                field: param.name.clone(),
                expected: "number".to_string(),
                actual: other.type_name().to_string(),
            }),
        },
    }
}

/// Shape the last node's result for the report: raw bytes become a file
/// record, file and error records pass through, empty results become a
/// placeholder message.
pub fn finalize_result(result: Option<Value>) -> Value {
    match result {
        Some(Value::Bytes(bytes)) => FileRecord::from_bytes(&bytes).into_value(),
        Some(value) if FileRecord::is_file_record(&value) => value,
        Some(value) if is_error_record(&value) => value,
        Some(value) if !value.is_empty() => value,
        _ => {
            let mut map = BTreeMap::new();
            map.insert(
                "message".to_string(),
                Value::String(EMPTY_RESULT_MESSAGE.to_string()),
            );
            Value::Object(map)
        }
    }
}

fn is_error_record(value: &Value) -> bool {
    value
        .as_object()
        .map(|map| map.contains_key("error"))
        .unwrap_or(false)
}
