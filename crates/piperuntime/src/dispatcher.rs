use pipecore::{Signature, TaskArgs, TaskBody, TaskContext, TaskError, Value};
use std::collections::{HashMap, HashSet};

/// Locate the entry point of `body` whose parameter names are exactly the
/// keys of `inputs`, convert the arguments to its declared types and call it.
///
/// When several entry points match, the first one in declaration order wins.
pub async fn dispatch(
    body: &dyn TaskBody,
    ctx: TaskContext,
    inputs: HashMap<String, Value>,
) -> Result<Value, TaskError> {
    let signatures = body.signatures();
    if signatures.is_empty() {
        return Err(TaskError::NoCallable);
    }

    let mut callables = body.materialize()?;
    if callables.is_empty() {
        return Err(TaskError::NoCallable);
    }

    let signature = signatures
        .iter()
        .filter(|sig| callables.contains_key(&sig.name))
        .find(|sig| matches_inputs(sig, &inputs))
        .ok_or_else(|| {
            let mut requested: Vec<String> = inputs.keys().cloned().collect();
            requested.sort();
            TaskError::NoSignatureMatch { requested }
        })?;

    let callable = callables
        .remove(&signature.name)
        .ok_or(TaskError::NoCallable)?;

    tracing::debug!(
        "Dispatching node {} to entry point {}",
        ctx.node_id,
        signature.name
    );

    let args = convert_arguments(signature, inputs);
    callable
        .call(ctx, args)
        .await
        .map_err(|e| match e {
            TaskError::Cancelled => TaskError::Cancelled,
            other => TaskError::Invocation {
                callable: signature.name.clone(),
                message: other.to_string(),
            },
        })
}

/// Same cardinality and same names.
pub fn matches_inputs(signature: &Signature, inputs: &HashMap<String, Value>) -> bool {
    let names: HashSet<&str> = signature.param_names().collect();
    names.len() == signature.params.len()
        && names.len() == inputs.len()
        && inputs.keys().all(|k| names.contains(k.as_str()))
}

/// Convert each argument to its declared type. A failed conversion keeps the
/// original value.
pub fn convert_arguments(signature: &Signature, mut inputs: HashMap<String, Value>) -> TaskArgs {
    for param in &signature.params {
        let Some(target) = param.ty else {
            continue;
        };
        let Some(value) = inputs.get_mut(&param.name) else {
            continue;
        };
        if value.value_type() == Some(target) {
            continue;
        }
        match value.coerce(target) {
            Some(converted) => *value = converted,
            None => tracing::debug!(
                "Could not convert '{}' from {} to {}, keeping original",
                param.name,
                value.type_name(),
                target
            ),
        }
    }
    TaskArgs::new(inputs)
}
