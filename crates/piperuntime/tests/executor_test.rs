mod common;

use common::*;
use pipecore::{EventBus, Flow, Node, RunContext, RunFailure, RunOutcome, RunReport, Value};
use piperuntime::{FlowExecutor, InstructionRegistry, EMPTY_RESULT_MESSAGE};

async fn run(registry: &InstructionRegistry, flow: &Flow, start: &str, ends: &[&str]) -> RunReport {
    let bus = EventBus::new(100);
    let ctx = RunContext::new(flow.id.clone());
    let ends: Vec<String> = ends.iter().map(|s| s.to_string()).collect();
    FlowExecutor::new(registry, &bus)
        .execute(flow, start, &ends, &ctx)
        .await
}

/// n1 -> n2 (echo x=5 as y) -> n3, with `==5` on the second edge
fn echo_flow(middle: &str) -> Flow {
    let mut flow = Flow::new("echo");
    flow.add_node(Node::new("n1", START));
    flow.add_node(Node::new("n2", middle).with_param("x", 5));
    flow.add_node(Node::new("n3", START));
    flow.connect("n1", "n2", None);
    flow.connect("n2", "n3", Some("==5"));
    flow
}

#[tokio::test]
async fn test_end_to_end_guarded_flow() {
    init_tracing();
    let registry = registry();
    let flow = echo_flow(ECHO);

    let run = run(&registry, &flow, "n1", &["n3"]).await;

    assert_eq!(run.outcome, RunOutcome::Completed);
    assert!(run.report.reached_end_node);
    assert_eq!(run.report.execution_order, vec!["n1", "n2", "n3"]);
    assert_eq!(run.report.total_nodes_executed, 3);
    assert_eq!(run.report.process_results.get("n2.y"), Some(&Value::Int(5)));
    assert_eq!(run.report.process_results.get("n2.x"), Some(&Value::Int(5)));
}

#[tokio::test]
async fn test_failure_keeps_partial_results() {
    let registry = registry();
    let flow = echo_flow(FAIL);

    let run = run(&registry, &flow, "n1", &["n3"]).await;

    match &run.outcome {
        RunOutcome::Failed {
            failure:
                RunFailure::Node {
                    node_id,
                    instruction_id,
                    error_message,
                },
        } => {
            assert_eq!(node_id, "n2");
            assert_eq!(instruction_id, FAIL);
            assert!(error_message.contains("boom"), "got {}", error_message);
        }
        other => panic!("expected node failure, got {:?}", other),
    }
    assert_eq!(run.report.execution_order, vec!["n1"]);
    assert!(!run.report.reached_end_node);
    assert_eq!(run.report.process_results.len(), 1);
    assert_eq!(run.report.process_results.get("n2.x"), Some(&Value::Int(5)));
    assert!(run
        .report
        .final_result
        .as_str()
        .is_some_and(|s| s.starts_with("flow run failed")));
}

#[tokio::test]
async fn test_guard_not_satisfied_stops_without_end() {
    let registry = registry();
    let mut flow = echo_flow(ECHO);
    flow.edges[1].label = Some(">10".to_string());

    let run = run(&registry, &flow, "n1", &["n3"]).await;

    assert_eq!(
        run.outcome,
        RunOutcome::Failed {
            failure: RunFailure::EndNotReached {
                last_node: "n2".to_string()
            }
        }
    );
    assert_eq!(run.report.execution_order, vec!["n1", "n2"]);
    // partial results survive and the last result becomes the final one
    assert_eq!(run.report.final_result, Value::Int(5));
}

#[tokio::test]
async fn test_single_node_flow() {
    let registry = registry();
    let mut flow = Flow::new("single");
    flow.add_node(Node::new("only", START));

    let reached = run(&registry, &flow, "only", &["only"]).await;
    assert!(reached.report.reached_end_node);
    assert_eq!(reached.report.execution_order, vec!["only"]);
    assert_eq!(reached.outcome, RunOutcome::Completed);

    let unreached = run(&registry, &flow, "only", &[]).await;
    assert!(!unreached.report.reached_end_node);
    assert_eq!(unreached.report.execution_order, vec!["only"]);
    assert!(!unreached.outcome.is_success());
}

#[tokio::test]
async fn test_first_satisfied_edge_wins() {
    let registry = registry();
    let mut flow = Flow::new("branch");
    flow.add_node(Node::new("n1", ECHO).with_param("x", 7));
    flow.add_node(Node::new("small", START));
    flow.add_node(Node::new("big", START));
    flow.add_node(Node::new("other", START));
    flow.connect("n1", "small", Some("<5"));
    flow.connect("n1", "big", Some(">= 5"));
    flow.connect("n1", "other", None);

    let run = run(&registry, &flow, "n1", &["small", "big", "other"]).await;

    assert_eq!(run.report.execution_order, vec!["n1", "big"]);
    assert!(run.outcome.is_success());
}

#[tokio::test]
async fn test_guard_resolves_references() {
    let registry = registry();
    let mut flow = Flow::new("refs");
    flow.add_node(Node::new("n1", ECHO).with_param("x", "go"));
    flow.add_node(Node::new("n2", START));
    flow.connect("n1", "n2", Some("'{{n1.y}}' == 'go'"));

    let run = run(&registry, &flow, "n1", &["n2"]).await;

    assert!(run.outcome.is_success());
}

#[tokio::test]
async fn test_params_resolve_from_earlier_nodes() {
    let registry = registry();
    let mut flow = Flow::new("chain");
    flow.add_node(Node::new("n1", ECHO).with_param("x", "hello"));
    flow.add_node(Node::new("n2", ECHO).with_param("x", "{{n1.y}} world {{nx.missing}}"));
    flow.connect("n1", "n2", None);

    let run = run(&registry, &flow, "n1", &["n2"]).await;

    assert_eq!(
        run.report.process_results.get("n2.y"),
        Some(&Value::from("hello world {{nx.missing}}"))
    );
}

#[tokio::test]
async fn test_cycle_is_reported() {
    let registry = registry();
    let mut flow = Flow::new("cycle");
    flow.add_node(Node::new("n1", START));
    flow.add_node(Node::new("n2", START));
    flow.connect("n1", "n2", None);
    flow.connect("n2", "n1", None);

    let run = run(&registry, &flow, "n1", &[]).await;

    assert_eq!(
        run.outcome,
        RunOutcome::Failed {
            failure: RunFailure::CycleDetected {
                node_id: "n2".to_string(),
                revisited: vec!["n1".to_string()],
            }
        }
    );
    assert_eq!(run.report.execution_order, vec!["n1", "n2"]);
}

#[tokio::test]
async fn test_terminated_before_start() {
    let registry = registry();
    let flow = echo_flow(ECHO);
    let bus = EventBus::new(100);
    let ctx = RunContext::new(flow.id.clone());
    ctx.cancellation.cancel();

    let run = FlowExecutor::new(&registry, &bus)
        .execute(&flow, "n1", &["n3".to_string()], &ctx)
        .await;

    assert_eq!(
        run.outcome,
        RunOutcome::Terminated {
            at_node: Some("n1".to_string())
        }
    );
    assert!(run.report.execution_order.is_empty());
    assert!(!run.report.final_result.is_empty());
}

#[tokio::test]
async fn test_cancelled_task_terminates_run() {
    let registry = registry();
    let mut flow = Flow::new("wait");
    flow.add_node(Node::new("n1", START));
    flow.add_node(Node::new("n2", WAIT));
    flow.connect("n1", "n2", None);

    let bus = EventBus::new(100);
    let ctx = RunContext::new(flow.id.clone());
    let token = ctx.cancellation.clone();
    tokio::spawn(async move {
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        token.cancel();
    });

    let run = FlowExecutor::new(&registry, &bus)
        .execute(&flow, "n1", &["n2".to_string()], &ctx)
        .await;

    assert_eq!(
        run.outcome,
        RunOutcome::Terminated {
            at_node: Some("n2".to_string())
        }
    );
    assert_eq!(run.report.execution_order, vec!["n1"]);
}

#[tokio::test]
async fn test_writeback_overwrites_referenced_value() {
    let registry = registry();
    let mut flow = Flow::new("writeback");
    flow.add_node(Node::new("n1", ECHO).with_param("x", "draft"));
    flow.add_node(
        Node::new("n2", APPEND)
            .with_param("text", "{{n1.y}}")
            .with_param("suffix", " v2")
            .with_param("target", "{{n1.y}}"),
    );
    flow.connect("n1", "n2", None);

    let run = run(&registry, &flow, "n1", &["n2"]).await;

    let results = &run.report.process_results;
    assert_eq!(results.get("n1.y"), Some(&Value::from("draft v2")));
    assert_eq!(results.get("n2.target"), Some(&Value::from("draft v2")));
    assert_eq!(results.get("n1.x"), Some(&Value::from("draft")));
}

#[tokio::test]
async fn test_writeback_to_unknown_key_is_ignored() {
    let registry = registry();
    let mut flow = Flow::new("writeback");
    flow.add_node(
        Node::new("n1", APPEND)
            .with_param("text", "a")
            .with_param("suffix", "b")
            .with_param("target", "{{nowhere.value}}"),
    );

    let run = run(&registry, &flow, "n1", &["n1"]).await;

    assert!(run.outcome.is_success());
    assert!(!run.report.process_results.contains("nowhere.value"));
    assert_eq!(run.report.final_result, Value::from("ab"));
}

#[tokio::test]
async fn test_bytes_result_becomes_file_record() {
    let registry = registry();
    let mut flow = Flow::new("download");
    flow.add_node(Node::new("n1", BYTES));

    let run = run(&registry, &flow, "n1", &["n1"]).await;

    let record = run
        .report
        .final_result
        .as_object()
        .expect("bytes should be wrapped in a file record");
    assert_eq!(record.get("fileName"), Some(&Value::from("downloaded_file.bin")));
    assert_eq!(record.get("fileData"), Some(&Value::from("YWJj")));
    assert_eq!(
        record.get("contentType"),
        Some(&Value::from("application/octet-stream"))
    );
    assert_eq!(record.get("fileSize"), Some(&Value::Int(3)));
}

#[tokio::test]
async fn test_empty_result_gets_placeholder() {
    let registry = registry();
    let mut flow = Flow::new("empty");
    flow.add_node(Node::new("n1", START));

    let run = run(&registry, &flow, "n1", &["n1"]).await;

    let message = run
        .report
        .final_result
        .as_object()
        .and_then(|m| m.get("message"))
        .cloned();
    assert_eq!(message, Some(Value::from(EMPTY_RESULT_MESSAGE)));
}

#[tokio::test]
async fn test_unknown_node_fails_run() {
    let registry = registry();
    let mut flow = Flow::new("dangling");
    flow.add_node(Node::new("n1", START));
    flow.connect("n1", "ghost", None);

    let run = run(&registry, &flow, "n1", &["ghost"]).await;

    assert_eq!(
        run.outcome,
        RunOutcome::Failed {
            failure: RunFailure::UnknownNode {
                node_id: "ghost".to_string()
            }
        }
    );
}

#[tokio::test]
async fn test_number_schema_coercion() {
    let registry = registry();
    let mut flow = Flow::new("numbers");
    flow.add_node(Node::new("int", NUMBER).with_param("x", "42"));
    flow.add_node(Node::new("float", NUMBER).with_param("x", "2.5"));
    flow.add_node(Node::new("default", NUMBER));
    flow.add_node(Node::new("bad", NUMBER).with_param("x", "many"));
    flow.connect("int", "float", None);
    flow.connect("float", "default", None);
    flow.connect("default", "bad", None);

    let run = run(&registry, &flow, "int", &["bad"]).await;

    let results = &run.report.process_results;
    assert_eq!(results.get("int.n"), Some(&Value::Int(42)));
    assert_eq!(results.get("float.n"), Some(&Value::Float(2.5)));
    assert_eq!(results.get("default.n"), Some(&Value::Int(1)));
    assert!(matches!(
        run.outcome,
        RunOutcome::Failed {
            failure: RunFailure::Node { ref node_id, .. }
        } if node_id == "bad"
    ));
}

#[tokio::test]
async fn test_events_are_emitted_in_order() {
    let registry = registry();
    let flow = echo_flow(ECHO);
    let bus = EventBus::new(100);
    let mut events = bus.subscribe();
    let ctx = RunContext::new(flow.id.clone());

    FlowExecutor::new(&registry, &bus)
        .execute(&flow, "n1", &["n3".to_string()], &ctx)
        .await;

    let mut kinds = Vec::new();
    while let Ok(event) = events.try_recv() {
        assert_eq!(event.run_id(), ctx.run_id);
        kinds.push(event.kind());
    }

    assert_eq!(kinds.first(), Some(&"flow_started"));
    assert_eq!(kinds.last(), Some(&"flow_finished"));
    assert_eq!(kinds.iter().filter(|k| **k == "node_completed").count(), 3);
    assert_eq!(kinds.iter().filter(|k| **k == "edge_taken").count(), 2);
}
