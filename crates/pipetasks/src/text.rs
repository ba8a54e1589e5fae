use pipecore::{
    FnBody, Instruction, ParamKind, Parameter, Signature, TaskArgs, TaskContext, TaskError, Value,
    ValueType,
};

pub const CONCAT_ID: &str = "text.concat";
pub const APPEND_ID: &str = "text.append";

const MAX_TEXT_LEN: usize = 1 << 20;

/// Joins `left` and `right`, with `separator` between them when given
pub fn concat() -> Instruction {
    let body = FnBody::new()
        .func(
            Signature::new("concat")
                .param("left", ValueType::String)
                .param("right", ValueType::String),
            |_ctx, args| join(args, ""),
        )
        .func(
            Signature::new("join")
                .param("left", ValueType::String)
                .param("right", ValueType::String)
                .param("separator", ValueType::String),
            |_ctx, args| async move {
                let separator = args.require_str("separator")?.to_string();
                join(args, &separator).await
            },
        )
        .into_body();

    Instruction::new(CONCAT_ID, body)
        .with_description("Concatenate two strings")
        .with_category("text")
        .with_parameter(Parameter::input("left", ParamKind::String).required().with_label("Left"))
        .with_parameter(Parameter::input("right", ParamKind::String).required().with_label("Right"))
        .with_parameter(Parameter::input("separator", ParamKind::String).with_label("Separator"))
        .with_parameter(Parameter::output("text", ParamKind::String).with_label("Text"))
}

async fn join(args: TaskArgs, separator: &str) -> Result<Value, TaskError> {
    let left = args.require_str("left")?;
    let right = args.require_str("right")?;
    check_len(left.len() + separator.len() + right.len())?;
    Ok(Value::String(format!("{}{}{}", left, separator, right)))
}

/// Appends `suffix` to `text` and writes the result back into the value
/// `target` points at.
pub fn append() -> Instruction {
    let body = FnBody::new()
        .func(
            Signature::new("append")
                .param("text", ValueType::String)
                .param("suffix", ValueType::String),
            append_suffix,
        )
        .into_body();

    Instruction::new(APPEND_ID, body)
        .with_description("Append a suffix and write the result back to an earlier value")
        .with_category("text")
        .with_parameter(Parameter::input("text", ParamKind::String).required().with_label("Text"))
        .with_parameter(Parameter::input("suffix", ParamKind::String).required().with_label("Suffix"))
        .with_parameter(Parameter::writeback("target").required().with_label("Target"))
}

async fn append_suffix(ctx: TaskContext, args: TaskArgs) -> Result<Value, TaskError> {
    let text = args.require_str("text")?;
    let suffix = args.require_str("suffix")?;
    check_len(text.len() + suffix.len())?;
    ctx.events.info(format!("Appending {} bytes", suffix.len()));
    Ok(Value::String(format!("{}{}", text, suffix)))
}

fn check_len(len: usize) -> Result<(), TaskError> {
    if len > MAX_TEXT_LEN {
        return Err(TaskError::ExecutionFailed(format!(
            "text would exceed {} bytes",
            MAX_TEXT_LEN
        )));
    }
    Ok(())
}
