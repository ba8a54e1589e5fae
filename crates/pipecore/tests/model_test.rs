use pipecore::{
    duration_millis, Callable, FileRecord, Flow, FnBody, ProcessResults, RunFailure, RunOutcome,
    RunStatus, Signature, TaskArgs, TaskBody, TaskContext, TaskError, Value, ValueType,
};
use std::collections::HashMap;
use std::time::Duration;

#[test]
fn test_flow_deserializes_from_editor_json() {
    let json = r#"{
        "id": "f1",
        "name": "Demo",
        "nodes": [
            {"id": "n1", "instructionId": "math.add", "params": {"a": 1, "b": "2"}},
            {"id": "n2", "instructionId": "debug.log", "name": "Log"}
        ],
        "edges": [
            {"id": "e1", "source": "n1", "target": "n2", "label": "> 2"}
        ]
    }"#;

    let flow: Flow = serde_json::from_str(json).unwrap();

    assert_eq!(flow.id, "f1");
    assert_eq!(flow.nodes.len(), 2);
    assert_eq!(flow.nodes[0].params["a"], Value::Int(1));
    assert_eq!(flow.nodes[0].params["b"], Value::from("2"));
    assert_eq!(flow.nodes[1].display_name(), "Log");
    assert_eq!(flow.nodes[0].display_name(), "n1");
    assert_eq!(flow.edges[0].label.as_deref(), Some("> 2"));
}

#[test]
fn test_connect_builds_edge_ids() {
    let mut flow = Flow::new("demo");
    let id = flow.connect("a", "b", Some("==1"));
    assert_eq!(id, "a->b");
    assert_eq!(flow.edges[0].label.as_deref(), Some("==1"));
    assert!(flow.find_node("a").is_none());
}

#[test]
fn test_value_json_round_trip_keeps_numbers_apart() {
    let value: Value = serde_json::from_str(r#"{"i": 3, "f": 2.5, "list": [true, null]}"#).unwrap();
    let object = value.as_object().unwrap();
    assert_eq!(object["i"], Value::Int(3));
    assert_eq!(object["f"], Value::Float(2.5));
    assert_eq!(
        object["list"],
        Value::Array(vec![Value::Bool(true), Value::Null])
    );
}

#[test]
fn test_bytes_serialize_as_base64() {
    let json = serde_json::to_string(&Value::Bytes(b"abc".to_vec())).unwrap();
    assert_eq!(json, "\"YWJj\"");
}

#[test]
fn test_display_forms() {
    assert_eq!(Value::Float(5.0).to_string(), "5.0");
    assert_eq!(Value::Float(2.5).to_string(), "2.5");
    assert_eq!(Value::Int(5).to_string(), "5");
    assert_eq!(Value::Null.to_string(), "null");
    assert_eq!(
        Value::Array(vec![Value::Int(1), Value::from("a")]).to_string(),
        r#"[1,"a"]"#
    );
}

#[test]
fn test_coercion() {
    assert_eq!(Value::from(" 42 ").coerce(ValueType::Int), Some(Value::Int(42)));
    assert_eq!(Value::from("x").coerce(ValueType::Int), None);
    assert_eq!(Value::Float(2.9).coerce(ValueType::Int), Some(Value::Int(2)));
    assert_eq!(Value::Int(2).coerce(ValueType::Float), Some(Value::Float(2.0)));
    assert_eq!(Value::from("Yes").coerce(ValueType::Bool), Some(Value::Bool(true)));
    assert_eq!(Value::from("no").coerce(ValueType::Bool), Some(Value::Bool(false)));
    assert_eq!(Value::Int(0).coerce(ValueType::Bool), Some(Value::Bool(false)));
    assert_eq!(
        Value::Bool(true).coerce(ValueType::String),
        Some(Value::from("true"))
    );
}

#[test]
fn test_emptiness() {
    assert!(Value::Null.is_empty());
    assert!(Value::from("").is_empty());
    assert!(Value::Array(vec![]).is_empty());
    assert!(!Value::Int(0).is_empty());
    assert!(!Value::Bool(false).is_empty());
}

#[test]
fn test_process_results_are_write_once() {
    let mut results = ProcessResults::new();
    assert!(results.insert(ProcessResults::key("n1", "out"), Value::Int(1)));
    assert!(!results.insert("n1.out", Value::Int(2)));
    assert_eq!(results.get_param("n1", "out"), Some(&Value::Int(1)));

    assert!(results.overwrite("n1.out", Value::Int(3)));
    assert!(!results.overwrite("n2.out", Value::Int(3)));
    assert_eq!(results.get("n1.out"), Some(&Value::Int(3)));
    assert!(!results.contains("n2.out"));
}

#[test]
fn test_file_record_shape() {
    let value = FileRecord::from_bytes(&[0, 1, 2, 3]).into_value();
    assert!(FileRecord::is_file_record(&value));
    let map = value.as_object().unwrap();
    assert_eq!(map["fileSize"], Value::Int(4));
    assert_eq!(map["fileData"], Value::from("AAECAw=="));
    assert!(!FileRecord::is_file_record(&Value::from("text")));
}

#[test]
fn test_outcome_serialization() {
    let outcome = RunOutcome::Failed {
        failure: RunFailure::EndNotReached {
            last_node: "n2".to_string(),
        },
    };
    let json = serde_json::to_value(&outcome).unwrap();
    assert_eq!(json["status"], "failed");
    assert_eq!(json["failure"]["kind"], "endNotReached");
    assert_eq!(json["failure"]["lastNode"], "n2");

    assert_eq!(outcome.status(), RunStatus::Failed);
    assert_eq!(RunStatus::Terminated.to_string(), "terminated");
    assert_eq!(
        RunOutcome::Terminated { at_node: None }.error_message(),
        Some("run terminated".to_string())
    );
}

struct Constant(i64);

#[async_trait::async_trait]
impl Callable for Constant {
    async fn call(&self, _ctx: TaskContext, _args: TaskArgs) -> Result<Value, TaskError> {
        Ok(Value::Int(self.0))
    }
}

#[test]
fn test_fn_body_signatures_and_shadowing() {
    let body = FnBody::new()
        .entry(Signature::new("one").param("a", ValueType::Int), || Constant(1))
        .entry(Signature::new("one").untyped("b"), || Constant(2))
        .into_body();

    let names: Vec<String> = body.signatures().into_iter().map(|s| s.name).collect();
    assert_eq!(names, vec!["one", "one"]);

    let callables = body.materialize().unwrap();
    assert_eq!(callables.len(), 1);
}

#[test]
fn test_task_args_accessors() {
    let mut values = HashMap::new();
    values.insert("text".to_string(), Value::from("hi"));
    values.insert("n".to_string(), Value::Int(4));
    let args = TaskArgs::new(values);

    assert_eq!(args.require_str("text").unwrap(), "hi");
    assert_eq!(args.require_i64("n").unwrap(), 4);
    assert_eq!(args.require_f64("n").unwrap(), 4.0);
    assert!(matches!(args.require("missing"), Err(TaskError::MissingInput(_))));
    assert!(matches!(
        args.require_str("n"),
        Err(TaskError::InvalidInputType { .. })
    ));
}

#[test]
fn test_duration_millis_saturates() {
    assert_eq!(duration_millis(Duration::from_millis(1500)), 1500);
    assert_eq!(duration_millis(Duration::from_micros(999)), 0);
    assert_eq!(duration_millis(Duration::MAX), u64::MAX);
}
