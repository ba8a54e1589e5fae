use async_trait::async_trait;
use pipecore::{
    Callable, FnBody, Instruction, ParamKind, Parameter, Signature, TaskArgs, TaskContext,
    TaskError, Value,
};

pub const ADD_ID: &str = "math.add";

/// `a + b`
pub struct Add;

/// `a + 1`
pub struct Increment;

#[async_trait]
impl Callable for Add {
    async fn call(&self, _ctx: TaskContext, args: TaskArgs) -> Result<Value, TaskError> {
        sum(args.require("a")?, args.require("b")?)
    }
}

#[async_trait]
impl Callable for Increment {
    async fn call(&self, _ctx: TaskContext, args: TaskArgs) -> Result<Value, TaskError> {
        sum(args.require("a")?, &Value::Int(1))
    }
}

/// Integer addition while both sides are integers, float otherwise
fn sum(a: &Value, b: &Value) -> Result<Value, TaskError> {
    match (a, b) {
        (Value::Int(x), Value::Int(y)) => x
            .checked_add(*y)
            .map(Value::Int)
            .ok_or_else(|| TaskError::ExecutionFailed(format!("{} + {} overflows", x, y))),
        _ => {
            let x = number(a, "a")?;
            let y = number(b, "b")?;
            Ok(Value::Float(x + y))
        }
    }
}

fn number(value: &Value, field: &str) -> Result<f64, TaskError> {
    value.as_f64().ok_or_else(|| TaskError::InvalidInputType {
        field: field.to_string(),
        expected: "number".to_string(),
        actual: value.type_name().to_string(),
    })
}

/// Two entry points share one instruction: which one runs depends on
/// whether the node sets `b`.
pub fn add() -> Instruction {
    let body = FnBody::new()
        .entry(Signature::new("add").untyped("a").untyped("b"), || Add)
        .entry(Signature::new("increment").untyped("a"), || Increment)
        .into_body();

    Instruction::new(ADD_ID, body)
        .with_description("Add two numbers, or increment one")
        .with_category("math")
        .with_parameter(Parameter::input("a", ParamKind::Number).required().with_label("A"))
        .with_parameter(Parameter::input("b", ParamKind::Number).with_label("B"))
        .with_parameter(Parameter::output("sum", ParamKind::Number).with_label("Sum"))
}
