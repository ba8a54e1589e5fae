use async_trait::async_trait;
use pipecore::{
    Callable, FnBody, Instruction, ParamKind, Parameter, Signature, TaskArgs, TaskContext,
    TaskError, Value, ValueType,
};

pub const PARSE_ID: &str = "transform.json_parse";
pub const STRINGIFY_ID: &str = "transform.json_stringify";

/// Parse JSON string to Value
pub struct JsonParse;

#[async_trait]
impl Callable for JsonParse {
    async fn call(&self, _ctx: TaskContext, args: TaskArgs) -> Result<Value, TaskError> {
        let input = args.require_str("json")?;

        let parsed: serde_json::Value = serde_json::from_str(input)
            .map_err(|e| TaskError::ExecutionFailed(format!("JSON parse error: {}", e)))?;

        Ok(Value::from(parsed))
    }
}

pub fn json_parse() -> Instruction {
    let body = FnBody::new()
        .entry(Signature::new("parse").param("json", ValueType::String), || JsonParse)
        .into_body();

    Instruction::new(PARSE_ID, body)
        .with_description("Parse JSON string")
        .with_category("transform")
        .with_parameter(Parameter::input("json", ParamKind::String).required().with_label("JSON"))
        .with_parameter(Parameter::output("parsed", ParamKind::Any).with_label("Parsed value"))
}

/// Stringify Value to JSON
pub struct JsonStringify;

#[async_trait]
impl Callable for JsonStringify {
    async fn call(&self, _ctx: TaskContext, args: TaskArgs) -> Result<Value, TaskError> {
        let value = serde_json::Value::from(args.require("value")?.clone());

        let json_str = serde_json::to_string_pretty(&value)
            .map_err(|e| TaskError::ExecutionFailed(format!("JSON stringify error: {}", e)))?;

        Ok(Value::String(json_str))
    }
}

pub fn json_stringify() -> Instruction {
    let body = FnBody::new()
        .entry(Signature::new("stringify").untyped("value"), || JsonStringify)
        .into_body();

    Instruction::new(STRINGIFY_ID, body)
        .with_description("Convert value to JSON string")
        .with_category("transform")
        .with_parameter(Parameter::input("value", ParamKind::Any).required().with_label("Value"))
        .with_parameter(Parameter::output("json", ParamKind::String).with_label("JSON"))
}
