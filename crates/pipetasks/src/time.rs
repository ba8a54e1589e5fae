use pipecore::{
    FnBody, Instruction, ParamKind, Parameter, Signature, TaskArgs, TaskContext, TaskError, Value,
    ValueType,
};
use tokio::time::{sleep, Duration};

pub const DELAY_ID: &str = "time.delay";

const DEFAULT_DELAY_MS: i64 = 1000;

/// Sleep for `delay_ms`, returning `value` unchanged. Termination of the
/// run interrupts the sleep.
async fn delay(ctx: TaskContext, args: TaskArgs) -> Result<Value, TaskError> {
    let delay_ms = args.require_i64("delay_ms")?.max(0) as u64;

    ctx.events.info(format!("Delaying for {}ms", delay_ms));

    tokio::select! {
        _ = sleep(Duration::from_millis(delay_ms)) => {}
        _ = ctx.cancellation.cancelled() => {
            tracing::info!("Delay at node {} cancelled", ctx.node_id);
            return Err(TaskError::Cancelled);
        }
    }

    Ok(args.get("value").cloned().unwrap_or(Value::Null))
}

pub fn delay_instruction() -> Instruction {
    let body = FnBody::new()
        .func(
            Signature::new("delay")
                .param("delay_ms", ValueType::Int)
                .untyped("value"),
            delay,
        )
        .func(Signature::new("wait").param("delay_ms", ValueType::Int), delay)
        .into_body();

    Instruction::new(DELAY_ID, body)
        .with_description("Delay execution for specified milliseconds")
        .with_category("time")
        .with_parameter(
            Parameter::input("delay_ms", ParamKind::Number)
                .with_label("Delay (ms)")
                .with_default(DEFAULT_DELAY_MS),
        )
        .with_parameter(Parameter::input("value", ParamKind::Any).with_label("Value"))
        .with_parameter(Parameter::output("result", ParamKind::Any).with_label("Result"))
}
