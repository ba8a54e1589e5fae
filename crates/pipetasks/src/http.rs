use async_trait::async_trait;
use pipecore::{
    Callable, FnBody, Instruction, ParamKind, Parameter, Signature, TaskArgs, TaskContext,
    TaskError, Value, ValueType,
};

pub const FETCH_ID: &str = "http.fetch";

/// HTTP request returning the raw response body
pub struct HttpFetch {
    client: reqwest::Client,
}

impl HttpFetch {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for HttpFetch {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Callable for HttpFetch {
    async fn call(&self, ctx: TaskContext, args: TaskArgs) -> Result<Value, TaskError> {
        let url = args.require_str("url")?;
        let method = args.require_str("method")?;

        ctx.events.info(format!("{} {}", method, url));

        let request = match method.to_uppercase().as_str() {
            "GET" => self.client.get(url),
            "DELETE" => self.client.delete(url),
            "POST" | "PUT" => {
                let req = if method.eq_ignore_ascii_case("POST") {
                    self.client.post(url)
                } else {
                    self.client.put(url)
                };
                match args.get("body") {
                    Some(Value::String(text)) => req.body(text.clone()),
                    Some(Value::Bytes(bytes)) => req.body(bytes.clone()),
                    Some(Value::Null) | None => req,
                    Some(other) => req.json(&serde_json::Value::from(other.clone())),
                }
            }
            _ => {
                return Err(TaskError::ExecutionFailed(format!(
                    "Unsupported method: {}",
                    method
                )))
            }
        };

        let response = tokio::select! {
            response = request.send() => response
                .map_err(|e| TaskError::ExecutionFailed(format!("HTTP request failed: {}", e)))?,
            _ = ctx.cancellation.cancelled() => return Err(TaskError::Cancelled),
        };

        let status = response.status();
        ctx.events.info(format!("Response status: {}", status.as_u16()));
        if !status.is_success() {
            return Err(TaskError::ExecutionFailed(format!(
                "{} {} returned {}",
                method, url, status
            )));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| TaskError::ExecutionFailed(format!("Failed to read response: {}", e)))?;

        tracing::debug!("Fetched {} bytes from {}", body.len(), url);
        Ok(Value::Bytes(body.to_vec()))
    }
}

pub fn fetch() -> Instruction {
    let body = FnBody::new()
        .entry(
            Signature::new("fetch")
                .param("url", ValueType::String)
                .param("method", ValueType::String),
            HttpFetch::new,
        )
        .entry(
            Signature::new("send")
                .param("url", ValueType::String)
                .param("method", ValueType::String)
                .untyped("body"),
            HttpFetch::new,
        )
        .into_body();

    Instruction::new(FETCH_ID, body)
        .with_description("Make an HTTP request and return the response body as bytes")
        .with_category("http")
        .with_parameter(Parameter::input("url", ParamKind::String).required().with_label("URL"))
        .with_parameter(
            Parameter::input("method", ParamKind::String)
                .with_label("Method")
                .with_default("GET"),
        )
        .with_parameter(Parameter::input("body", ParamKind::Any).with_label("Body"))
        .with_parameter(Parameter::output("content", ParamKind::Any).with_label("Content"))
}
