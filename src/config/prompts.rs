//! Prompt templates for Svar.
//!
//! Prompts can be customized by placing TOML files in the custom prompts directory.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// Collection of all prompt templates.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct Prompts {
    pub rag: RagPrompts,
    /// Custom variables from config, available in all prompts.
    #[serde(skip)]
    pub variables: HashMap<String, String>,
}

/// Prompts for grounded answer generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RagPrompts {
    pub system: String,
    /// Template with `{{title}}`, `{{context}}`, `{{history}}` and `{{question}}`.
    pub user: String,
    /// Substituted for `{{context}}` when nothing was retrieved.
    pub no_context: String,
    /// Substituted for `{{history}}` in a fresh session.
    pub no_history: String,
    /// Answer returned without calling the generator when retrieval found nothing.
    pub no_grounding_answer: String,
}

impl Default for RagPrompts {
    fn default() -> Self {
        Self {
            system: r#"You are an expert, concise, and helpful tutoring assistant. You answer questions about a single video using excerpts from its transcript."#.to_string(),

            user: r#"Video title: "{{title}}"

Relevant context (from the video's transcript):
---
{{context}}
---

Conversation history:
{{history}}

User's current question:
"""{{question}}"""

Instructions for the assistant:
- Prefer facts from the "Relevant context" above. If the answer is not present, say you don't know.
- If you must infer, label it as an inference.
- Keep responses clear and step-by-step when appropriate.
- If the user asks for follow-up steps, give 2-4 concise steps.

Answer now:"#.to_string(),

            no_context: "No relevant context available.".to_string(),

            no_history: "No previous messages.".to_string(),

            no_grounding_answer: "I couldn't find anything in this video's transcript that relates to your question."
                .to_string(),
        }
    }
}

impl Prompts {
    /// Load prompts from the default location, with optional custom directory and variables.
    pub fn load(
        custom_dir: Option<&str>,
        custom_variables: Option<&HashMap<String, String>>,
    ) -> crate::error::Result<Self> {
        let mut prompts = Prompts::default();

        if let Some(vars) = custom_variables {
            prompts.variables = vars.clone();
        }

        if let Some(dir) = custom_dir {
            let custom_path = PathBuf::from(shellexpand::tilde(dir).to_string());

            let rag_path = custom_path.join("rag.toml");
            if rag_path.exists() {
                let content = std::fs::read_to_string(&rag_path)?;
                prompts.rag = toml::from_str(&content)?;
            }
        }

        Ok(prompts)
    }

    /// Render a prompt template with the given variables.
    pub fn render(template: &str, vars: &HashMap<String, String>) -> String {
        let mut result = template.to_string();
        for (key, value) in vars {
            result = result.replace(&format!("{{{{{}}}}}", key), value);
        }
        result
    }

    /// Render a prompt template with both provided variables and custom config variables.
    /// Provided variables take precedence over custom config variables.
    pub fn render_with_custom(&self, template: &str, vars: &HashMap<String, String>) -> String {
        let mut merged = self.variables.clone();
        for (key, value) in vars {
            merged.insert(key.clone(), value.clone());
        }
        Self::render(template, &merged)
    }
}
