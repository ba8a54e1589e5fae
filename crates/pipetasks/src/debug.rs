use async_trait::async_trait;
use pipecore::{
    Callable, FnBody, Instruction, ParamKind, Parameter, Signature, TaskArgs, TaskContext,
    TaskError, Value, ValueType,
};

pub const ID: &str = "debug.log";

/// Logs its message and passes it on
pub struct DebugLog;

#[async_trait]
impl Callable for DebugLog {
    async fn call(&self, ctx: TaskContext, args: TaskArgs) -> Result<Value, TaskError> {
        let message = args
            .get("message")
            .map(|v| v.to_string())
            .unwrap_or_else(|| "(no message)".to_string());

        tracing::info!("[{}] DEBUG: {}", ctx.node_id, message);
        ctx.events.info(format!("DEBUG: {}", message));

        Ok(Value::String(message))
    }
}

pub fn instruction() -> Instruction {
    let body = FnBody::new()
        .entry(
            Signature::new("log").param("message", ValueType::String),
            || DebugLog,
        )
        .into_body();

    Instruction::new(ID, body)
        .with_description("Logs input values for debugging")
        .with_category("debug")
        .with_parameter(
            Parameter::input("message", ParamKind::String)
                .with_label("Message")
                .with_default("(no message)"),
        )
        .with_parameter(Parameter::output("logged", ParamKind::String).with_label("Logged message"))
}
