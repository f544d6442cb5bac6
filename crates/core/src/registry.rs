use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelCategory {
    General,
    Code,
    Vision,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelEntry {
    /// Identifier clients send, e.g. `ai4all/llama3`
    pub public_id: String,
    /// Identifier the inference backend understands, e.g. `llama3`
    pub backend_id: String,
    pub category: ModelCategory,
    pub description: String,
}

impl ModelEntry {
    pub fn new(
        public_id: impl Into<String>,
        backend_id: impl Into<String>,
        category: ModelCategory,
        description: impl Into<String>,
    ) -> Self {
        Self {
            public_id: public_id.into(),
            backend_id: backend_id.into(),
            category,
            description: description.into(),
        }
    }
}

/// Public model ids mapped to backend ids. Read-only once built.
#[derive(Debug, Clone, Default)]
pub struct ModelRegistry {
    entries: Vec<ModelEntry>,
    index: HashMap<String, usize>,
}

impl ModelRegistry {
    pub fn new(entries: impl IntoIterator<Item = ModelEntry>) -> Self {
        let mut registry = Self::default();
        for entry in entries {
            match registry.index.get(&entry.public_id) {
                Some(&pos) => registry.entries[pos] = entry,
                None => {
                    registry
                        .index
                        .insert(entry.public_id.clone(), registry.entries.len());
                    registry.entries.push(entry);
                }
            }
        }
        registry
    }

    /// The models shipped with the gateway
    pub fn builtin() -> Self {
        use ModelCategory::*;
        Self::new([
            ModelEntry::new("ai4all/llama3", "llama3", General, "General purpose - LLaMA 3 8B"),
            ModelEntry::new("ai4all/llama3:70b", "llama3:70b", General, "General purpose - LLaMA 3 70B"),
            ModelEntry::new("ai4all/codellama", "codellama", Code, "Code generation - CodeLlama 7B"),
            ModelEntry::new("ai4all/codellama:34b", "codellama:34b", Code, "Code generation - CodeLlama 34B"),
            ModelEntry::new("ai4all/mistral", "mistral", General, "Mistral 7B - fast and capable"),
            ModelEntry::new("ai4all/moondream", "moondream", Vision, "Vision - image analysis"),
            ModelEntry::new("ai4all/phi3", "phi3", General, "Microsoft Phi-3 - efficient reasoning"),
            ModelEntry::new("ai4all/gemma2", "gemma2", General, "Google Gemma 2 9B"),
        ])
    }

    pub fn get(&self, public_id: &str) -> Option<&ModelEntry> {
        self.index.get(public_id).map(|&pos| &self.entries[pos])
    }

    /// Unknown ids pass through untouched; they are assumed to already be
    /// backend ids.
    pub fn resolve<'a>(&'a self, public_id: &'a str) -> &'a str {
        self.get(public_id)
            .map(|entry| entry.backend_id.as_str())
            .unwrap_or(public_id)
    }

    /// Entries in insertion order
    pub fn list(&self) -> &[ModelEntry] {
        &self.entries
    }
}
