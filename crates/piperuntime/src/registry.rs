use pipecore::{Instruction, InstructionSource, Parameter};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;

/// Serializable description of a registered instruction
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InstructionMetadata {
    pub id: String,
    pub name: String,
    pub description: String,
    pub category: String,
    pub parameters: Vec<Parameter>,
    pub entry_points: Vec<String>,
}

/// Registry of available instructions
pub struct InstructionRegistry {
    instructions: HashMap<String, Arc<Instruction>>,
}

impl InstructionRegistry {
    pub fn new() -> Self {
        Self {
            instructions: HashMap::new(),
        }
    }

    /// Register an instruction, replacing any previous one with the same id
    pub fn register(&mut self, instruction: Instruction) {
        tracing::info!("Registering instruction: {}", instruction.id);
        self.instructions
            .insert(instruction.id.clone(), Arc::new(instruction));
    }

    pub fn get(&self, id: &str) -> Option<Arc<Instruction>> {
        self.instructions.get(id).cloned()
    }

    /// Get all registered instruction ids, sorted
    pub fn list_instruction_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.instructions.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn get_metadata(&self, id: &str) -> Option<InstructionMetadata> {
        self.instructions.get(id).map(|instruction| InstructionMetadata {
            id: instruction.id.clone(),
            name: instruction.name.clone(),
            description: instruction.description.clone(),
            category: instruction.category.clone(),
            parameters: instruction.parameters.clone(),
            entry_points: instruction
                .body
                .signatures()
                .into_iter()
                .map(|sig| sig.name)
                .collect(),
        })
    }

    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }
}

impl InstructionSource for InstructionRegistry {
    fn get_instruction_by_id(&self, id: &str) -> Option<Arc<Instruction>> {
        self.get(id)
    }
}

impl Default for InstructionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
