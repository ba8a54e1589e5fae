use crate::{events::EventEmitter, NodeId, RunId, TaskError, Value, ValueType};
use async_trait::async_trait;
use futures::future::BoxFuture;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Core trait that every task entry point implements
#[async_trait]
pub trait Callable: Send + Sync {
    async fn call(&self, ctx: TaskContext, args: TaskArgs) -> Result<Value, TaskError>;
}

/// Executable body of an instruction: a set of named entry points.
pub trait TaskBody: Send + Sync {
    /// Declared entry points, in declaration order. Must not run any task logic.
    fn signatures(&self) -> Vec<Signature>;

    /// Create the callables for a single dispatch. Nothing created here may
    /// outlive the call it was created for.
    fn materialize(&self) -> Result<HashMap<String, Box<dyn Callable>>, TaskError>;
}

/// Name and parameter list of one entry point
#[derive(Debug, Clone, PartialEq)]
pub struct Signature {
    pub name: String,
    pub params: Vec<ParamDecl>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParamDecl {
    pub name: String,
    /// `None` accepts any value without conversion
    pub ty: Option<ValueType>,
}

impl Signature {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: Vec::new(),
        }
    }

    pub fn param(mut self, name: impl Into<String>, ty: ValueType) -> Self {
        self.params.push(ParamDecl {
            name: name.into(),
            ty: Some(ty),
        });
        self
    }

    pub fn untyped(mut self, name: impl Into<String>) -> Self {
        self.params.push(ParamDecl {
            name: name.into(),
            ty: None,
        });
        self
    }

    pub fn param_names(&self) -> impl Iterator<Item = &str> {
        self.params.iter().map(|p| p.name.as_str())
    }
}

/// Execution context passed to each callable
#[derive(Clone)]
pub struct TaskContext {
    pub run_id: RunId,

    pub node_id: NodeId,

    /// Event emitter for real-time updates
    pub events: EventEmitter,

    /// Cancelled when the run is asked to terminate
    pub cancellation: CancellationToken,
}

/// Named arguments handed to a callable
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskArgs {
    values: HashMap<String, Value>,
}

impl TaskArgs {
    pub fn new(values: HashMap<String, Value>) -> Self {
        Self { values }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    /// Get required argument or return error
    pub fn require(&self, name: &str) -> Result<&Value, TaskError> {
        self.values
            .get(name)
            .ok_or_else(|| TaskError::MissingInput(name.to_string()))
    }

    pub fn require_str(&self, name: &str) -> Result<&str, TaskError> {
        let value = self.require(name)?;
        value.as_str().ok_or_else(|| invalid_type(name, "string", value))
    }

    pub fn require_i64(&self, name: &str) -> Result<i64, TaskError> {
        let value = self.require(name)?;
        value.as_i64().ok_or_else(|| invalid_type(name, "int", value))
    }

    pub fn require_f64(&self, name: &str) -> Result<f64, TaskError> {
        let value = self.require(name)?;
        value.as_f64().ok_or_else(|| invalid_type(name, "number", value))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.values.iter()
    }

    pub fn into_inner(self) -> HashMap<String, Value> {
        self.values
    }
}

fn invalid_type(field: &str, expected: &str, actual: &Value) -> TaskError {
    TaskError::InvalidInputType {
        field: field.to_string(),
        expected: expected.to_string(),
        actual: actual.type_name().to_string(),
    }
}

type Constructor = Arc<dyn Fn() -> Box<dyn Callable> + Send + Sync>;
type TaskFn = Arc<dyn Fn(TaskContext, TaskArgs) -> BoxFuture<'static, Result<Value, TaskError>> + Send + Sync>;

/// Task body assembled from closures and `Callable` constructors.
#[derive(Clone, Default)]
pub struct FnBody {
    entries: Vec<(Signature, Constructor)>,
}

impl FnBody {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an entry point backed by a `Callable` type. `constructor`
    /// runs once per dispatch.
    pub fn entry<C, F>(mut self, signature: Signature, constructor: F) -> Self
    where
        C: Callable + 'static,
        F: Fn() -> C + Send + Sync + 'static,
    {
        let constructor: Constructor = Arc::new(move || Box::new(constructor()) as Box<dyn Callable>);
        self.entries.push((signature, constructor));
        self
    }

    /// Register an entry point backed by an async closure.
    pub fn func<F, Fut>(self, signature: Signature, f: F) -> Self
    where
        F: Fn(TaskContext, TaskArgs) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, TaskError>> + Send + 'static,
    {
        let f: TaskFn = Arc::new(move |ctx, args| Box::pin(f(ctx, args)));
        self.entry(signature, move || FnCallable { f: f.clone() })
    }

    pub fn into_body(self) -> Arc<dyn TaskBody> {
        Arc::new(self)
    }
}

impl TaskBody for FnBody {
    fn signatures(&self) -> Vec<Signature> {
        self.entries.iter().map(|(sig, _)| sig.clone()).collect()
    }

    fn materialize(&self) -> Result<HashMap<String, Box<dyn Callable>>, TaskError> {
        // Later definitions shadow earlier ones with the same name.
        Ok(self
            .entries
            .iter()
            .map(|(sig, constructor)| (sig.name.clone(), constructor()))
            .collect())
    }
}

struct FnCallable {
    f: TaskFn,
}

#[async_trait]
impl Callable for FnCallable {
    async fn call(&self, ctx: TaskContext, args: TaskArgs) -> Result<Value, TaskError> {
        (self.f)(ctx, args).await
    }
}
