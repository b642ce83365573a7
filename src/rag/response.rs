//! RAG response generation.

use super::{AssembledContext, ContextAssembler, MmrRetriever, RetrievalConfig, Source};
use crate::config::Prompts;
use crate::document::DocumentKey;
use crate::error::Result;
use crate::generation::{generate_with_retry, GenerationPrompt, Generator, RetryPolicy};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, instrument};
use uuid::Uuid;

/// Whether an answer was produced from retrieved transcript text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Grounding {
    Grounded,
    /// The collection exists but nothing usable was retrieved.
    NoRelevantContext,
}

/// A RAG response with answer and sources.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RagResponse {
    /// The generated answer.
    pub answer: String,
    /// Transcript spans the context was built from, in selection order.
    pub sources: Vec<Source>,
    pub grounding: Grounding,
}

impl RagResponse {
    pub fn is_grounded(&self) -> bool {
        self.grounding == Grounding::Grounded
    }

    /// Format the response for display.
    pub fn format_for_display(&self) -> String {
        let mut output = self.answer.clone();

        if !self.sources.is_empty() {
            output.push_str("\n\n--- Sources ---\n");
            for source in &self.sources {
                output.push_str(&format!(
                    "\n{} chars {}-{} (score: {:.2})",
                    source.chunk_id, source.start_offset, source.end_offset, source.relevance
                ));
            }
        }

        output
    }
}

/// One exchange in a chat session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub user: String,
    pub assistant: String,
}

/// In-memory conversation state for one chat session.
#[derive(Debug, Clone)]
pub struct ChatSession {
    pub id: Uuid,
    turns: Vec<ChatTurn>,
    max_turns: usize,
}

impl ChatSession {
    /// Start an empty session keeping at most `max_turns` exchanges.
    pub fn new(max_turns: usize) -> Self {
        Self {
            id: Uuid::new_v4(),
            turns: Vec::new(),
            max_turns: max_turns.max(1),
        }
    }

    pub fn turns(&self) -> &[ChatTurn] {
        &self.turns
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Record an exchange, dropping the oldest ones beyond the limit.
    pub fn push(&mut self, user: impl Into<String>, assistant: impl Into<String>) {
        self.turns.push(ChatTurn {
            user: user.into(),
            assistant: assistant.into(),
        });
        if self.turns.len() > self.max_turns {
            let excess = self.turns.len() - self.max_turns;
            self.turns.drain(..excess);
        }
    }

    /// Clear conversation history.
    pub fn clear(&mut self) {
        self.turns.clear();
    }

    /// Numbered transcript of the session, or `empty` when there is none.
    pub fn format_history(&self, empty: &str) -> String {
        if self.turns.is_empty() {
            return empty.to_string();
        }
        self.turns
            .iter()
            .enumerate()
            .map(|(i, turn)| format!("{}. User: {}\n   Assistant: {}", i + 1, turn.user, turn.assistant))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// RAG engine for question answering over one document at a time.
pub struct RagEngine {
    retriever: MmrRetriever,
    generator: Arc<dyn Generator>,
    assembler: ContextAssembler,
    prompts: Prompts,
    retry_policy: RetryPolicy,
}

impl RagEngine {
    /// Create a new RAG engine.
    pub fn new(retriever: MmrRetriever, generator: Arc<dyn Generator>) -> Self {
        Self {
            retriever,
            generator,
            assembler: ContextAssembler::new(),
            prompts: Prompts::default(),
            retry_policy: RetryPolicy::default(),
        }
    }

    /// Set custom prompts (with user-defined variables).
    pub fn with_prompts(mut self, prompts: Prompts) -> Self {
        self.prompts = prompts;
        self
    }

    pub fn with_retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.retry_policy = retry_policy;
        self
    }

    pub fn with_assembler(mut self, assembler: ContextAssembler) -> Self {
        self.assembler = assembler;
        self
    }

    pub fn retriever(&self) -> &MmrRetriever {
        &self.retriever
    }

    /// Answer a single question from the document's transcript.
    ///
    /// When nothing fits into the context the configured "no grounding"
    /// answer is returned and the generator is not called.
    #[instrument(skip(self, title, question, config), fields(document_key = %document_key))]
    pub async fn answer_query(
        &self,
        document_key: &DocumentKey,
        title: &str,
        question: &str,
        config: &RetrievalConfig,
    ) -> Result<RagResponse> {
        info!("Processing question: {}", question);

        let context = self.build_context(document_key, question, config).await?;
        if context.is_empty() {
            return Ok(self.no_grounding());
        }

        let prompt = self.build_prompt(title, &context, None, question);
        let answer = generate_with_retry(self.generator.as_ref(), &prompt, &self.retry_policy).await?;

        debug!("Generated response with {} sources", context.sources.len());
        Ok(RagResponse {
            answer,
            sources: context.sources,
            grounding: Grounding::Grounded,
        })
    }

    /// Continue a chat session.
    ///
    /// A first message without context gets the "no grounding" answer. Later
    /// messages still reach the generator so follow-ups can lean on history.
    #[instrument(skip(self, session, title, message, config), fields(document_key = %document_key, session = %session.id))]
    pub async fn chat(
        &self,
        session: &mut ChatSession,
        document_key: &DocumentKey,
        title: &str,
        message: &str,
        config: &RetrievalConfig,
    ) -> Result<RagResponse> {
        info!("Chat message: {}", message);

        let context = self.build_context(document_key, message, config).await?;

        let response = if context.is_empty() && session.is_empty() {
            self.no_grounding()
        } else {
            let prompt = self.build_prompt(title, &context, Some(session), message);
            let answer = generate_with_retry(self.generator.as_ref(), &prompt, &self.retry_policy).await?;
            let grounding = if context.is_empty() {
                Grounding::NoRelevantContext
            } else {
                Grounding::Grounded
            };
            RagResponse {
                answer,
                sources: context.sources,
                grounding,
            }
        };

        session.push(message, response.answer.clone());
        Ok(response)
    }

    async fn build_context(
        &self,
        document_key: &DocumentKey,
        question: &str,
        config: &RetrievalConfig,
    ) -> Result<AssembledContext> {
        let retrieval = self.retriever.retrieve(document_key, question, config).await?;
        let context = self.assembler.assemble(&retrieval, config.max_context_length);
        debug!(
            "Assembled {} of {} chunks ({} chars)",
            context.included,
            retrieval.len(),
            context.char_len()
        );
        Ok(context)
    }

    fn build_prompt(
        &self,
        title: &str,
        context: &AssembledContext,
        session: Option<&ChatSession>,
        question: &str,
    ) -> GenerationPrompt {
        let rag = &self.prompts.rag;
        let context_text = if context.is_empty() {
            rag.no_context.clone()
        } else {
            context.text.clone()
        };
        let history = match session {
            Some(session) => session.format_history(&rag.no_history),
            None => rag.no_history.clone(),
        };

        let mut vars = HashMap::new();
        vars.insert("title".to_string(), title.to_string());
        vars.insert("context".to_string(), context_text);
        vars.insert("history".to_string(), history);
        vars.insert("question".to_string(), question.to_string());

        GenerationPrompt {
            system: self.prompts.render_with_custom(&rag.system, &vars),
            user: self.prompts.render_with_custom(&rag.user, &vars),
        }
    }

    fn no_grounding(&self) -> RagResponse {
        RagResponse {
            answer: self.prompts.rag.no_grounding_answer.clone(),
            sources: Vec::new(),
            grounding: Grounding::NoRelevantContext,
        }
    }
}
