use crate::task::TaskBody;
use crate::Value;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Whether a parameter feeds the task, receives its result, or writes the
/// result back into a value produced by an earlier node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Input,
    Output,
    Writeback,
}

/// Declared schema type of an instruction parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamKind {
    String,
    Number,
    Boolean,
    #[serde(other)]
    Any,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Parameter {
    pub name: String,
    pub label: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub kind: ParamKind,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub default_value: Option<Value>,
    pub direction: Direction,
}

impl Parameter {
    fn with_direction(name: &str, kind: ParamKind, direction: Direction) -> Self {
        Self {
            name: name.to_string(),
            label: name.to_string(),
            description: None,
            kind,
            required: false,
            default_value: None,
            direction,
        }
    }

    pub fn input(name: &str, kind: ParamKind) -> Self {
        Self::with_direction(name, kind, Direction::Input)
    }

    pub fn output(name: &str, kind: ParamKind) -> Self {
        Self::with_direction(name, kind, Direction::Output)
    }

    pub fn writeback(name: &str) -> Self {
        Self::with_direction(name, ParamKind::Any, Direction::Writeback)
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn with_default(mut self, value: impl Into<Value>) -> Self {
        self.default_value = Some(value.into());
        self
    }
}

/// Reusable unit of task logic with a declared parameter schema
#[derive(Clone)]
pub struct Instruction {
    pub id: String,
    pub name: String,
    pub description: String,
    pub category: String,
    pub parameters: Vec<Parameter>,
    pub body: Arc<dyn TaskBody>,
}

impl Instruction {
    pub fn new(id: impl Into<String>, body: Arc<dyn TaskBody>) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            description: String::new(),
            category: "general".to_string(),
            parameters: Vec::new(),
            body,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    pub fn with_parameter(mut self, parameter: Parameter) -> Self {
        self.parameters.push(parameter);
        self
    }

    pub fn inputs(&self) -> impl Iterator<Item = &Parameter> {
        self.parameters
            .iter()
            .filter(|p| p.direction == Direction::Input)
    }

    /// The output or writeback parameter. Only the last one is honoured when
    /// an instruction declares several.
    pub fn result_parameter(&self) -> Option<&Parameter> {
        self.parameters
            .iter()
            .filter(|p| p.direction != Direction::Input)
            .last()
    }

    pub fn find_parameter(&self, name: &str) -> Option<&Parameter> {
        self.parameters.iter().find(|p| p.name == name)
    }
}

impl fmt::Debug for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instruction")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("category", &self.category)
            .field("parameters", &self.parameters)
            .finish_non_exhaustive()
    }
}

/// Lookup of instructions by id. Read-only for the duration of a run.
pub trait InstructionSource: Send + Sync {
    fn get_instruction_by_id(&self, id: &str) -> Option<Arc<Instruction>>;
}
