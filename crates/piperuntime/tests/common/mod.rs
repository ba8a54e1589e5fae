#![allow(dead_code)]

use pipecore::{
    FnBody, Instruction, ParamKind, Parameter, Signature, TaskArgs, TaskContext, TaskError, Value,
    ValueType,
};
use piperuntime::InstructionRegistry;
use std::sync::Arc;

pub const START: &str = "test.start";
pub const ECHO: &str = "test.echo";
pub const FAIL: &str = "test.fail";
pub const BYTES: &str = "test.bytes";
pub const APPEND: &str = "test.append";
pub const WAIT: &str = "test.wait";
pub const NUMBER: &str = "test.number";

async fn nothing(_ctx: TaskContext, _args: TaskArgs) -> Result<Value, TaskError> {
    Ok(Value::Null)
}

async fn echo(_ctx: TaskContext, args: TaskArgs) -> Result<Value, TaskError> {
    Ok(args.require("x")?.clone())
}

async fn fail(_ctx: TaskContext, _args: TaskArgs) -> Result<Value, TaskError> {
    Err(TaskError::ExecutionFailed("boom".to_string()))
}

async fn bytes(_ctx: TaskContext, _args: TaskArgs) -> Result<Value, TaskError> {
    Ok(Value::Bytes(b"abc".to_vec()))
}

async fn append(_ctx: TaskContext, args: TaskArgs) -> Result<Value, TaskError> {
    Ok(Value::String(format!(
        "{}{}",
        args.require_str("text")?,
        args.require_str("suffix")?
    )))
}

/// Blocks until the run is terminated
async fn wait(ctx: TaskContext, _args: TaskArgs) -> Result<Value, TaskError> {
    ctx.cancellation.cancelled().await;
    Err(TaskError::Cancelled)
}

pub fn start_instruction() -> Instruction {
    Instruction::new(START, FnBody::new().func(Signature::new("run"), nothing).into_body())
}

/// Returns its `x` input as output `y`
pub fn echo_instruction() -> Instruction {
    Instruction::new(
        ECHO,
        FnBody::new()
            .func(Signature::new("echo").untyped("x"), echo)
            .into_body(),
    )
    .with_parameter(Parameter::input("x", ParamKind::Any).required())
    .with_parameter(Parameter::output("y", ParamKind::Any))
}

pub fn fail_instruction() -> Instruction {
    Instruction::new(
        FAIL,
        FnBody::new()
            .func(Signature::new("fail").untyped("x"), fail)
            .into_body(),
    )
    .with_parameter(Parameter::input("x", ParamKind::Any).required())
    .with_parameter(Parameter::output("y", ParamKind::Any))
}

pub fn bytes_instruction() -> Instruction {
    Instruction::new(BYTES, FnBody::new().func(Signature::new("download"), bytes).into_body())
        .with_parameter(Parameter::output("file", ParamKind::Any))
}

pub fn append_instruction() -> Instruction {
    Instruction::new(
        APPEND,
        FnBody::new()
            .func(
                Signature::new("append")
                    .param("text", ValueType::String)
                    .param("suffix", ValueType::String),
                append,
            )
            .into_body(),
    )
    .with_parameter(Parameter::input("text", ParamKind::String).required())
    .with_parameter(Parameter::input("suffix", ParamKind::String).required())
    .with_parameter(Parameter::writeback("target").required())
}

pub fn wait_instruction() -> Instruction {
    Instruction::new(WAIT, FnBody::new().func(Signature::new("wait"), wait).into_body())
}

/// Echo with a numeric schema type
pub fn number_instruction() -> Instruction {
    Instruction::new(
        NUMBER,
        FnBody::new()
            .func(Signature::new("echo").untyped("x"), echo)
            .into_body(),
    )
    .with_parameter(Parameter::input("x", ParamKind::Number).with_default(1))
    .with_parameter(Parameter::output("n", ParamKind::Number))
}

pub fn registry() -> InstructionRegistry {
    let mut registry = InstructionRegistry::new();
    registry.register(start_instruction());
    registry.register(echo_instruction());
    registry.register(fail_instruction());
    registry.register(bytes_instruction());
    registry.register(append_instruction());
    registry.register(wait_instruction());
    registry.register(number_instruction());
    registry
}

pub fn shared_registry() -> Arc<InstructionRegistry> {
    Arc::new(registry())
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("debug")
        .with_test_writer()
        .try_init();
}
