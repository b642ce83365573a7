//! Deterministic stand-ins for the embedding and generation providers.

use crate::embedding::Embedder;
use crate::error::{Result, SvarError};
use crate::generation::{GenerationPrompt, Generator};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// Embeds text as keyword counts over a fixed vocabulary, plus a small bias
/// dimension so that no vector is all zeros.
pub(crate) struct KeywordEmbedder {
    vocabulary: Vec<String>,
    delay: Option<Duration>,
    slow_word: Option<(String, Duration)>,
    fail: bool,
    calls: AtomicUsize,
}

impl KeywordEmbedder {
    pub(crate) fn new(vocabulary: &[&str]) -> Self {
        Self {
            vocabulary: vocabulary.iter().map(|w| w.to_lowercase()).collect(),
            delay: None,
            slow_word: None,
            fail: false,
            calls: AtomicUsize::new(0),
        }
    }

    pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Sleep only for batches containing `word`.
    pub(crate) fn with_slow_word(mut self, word: &str, delay: Duration) -> Self {
        self.slow_word = Some((word.to_string(), delay));
        self
    }

    pub(crate) fn failing(mut self) -> Self {
        self.fail = true;
        self
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub(crate) fn vector(&self, text: &str) -> Vec<f32> {
        let lowered = text.to_lowercase();
        let mut vector: Vec<f32> = self
            .vocabulary
            .iter()
            .map(|word| lowered.matches(word.as_str()).count() as f32)
            .collect();
        vector.push(0.1);
        vector
    }
}

#[async_trait]
impl Embedder for KeywordEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut vectors = self.embed_batch(&[text.to_string()]).await?;
        vectors
            .pop()
            .ok_or_else(|| SvarError::Embedding("no vector".to_string()))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if let Some((word, delay)) = &self.slow_word {
            if texts.iter().any(|t| t.contains(word.as_str())) {
                tokio::time::sleep(*delay).await;
            }
        }
        if self.fail {
            return Err(SvarError::OpenAI("embedding service unavailable".to_string()));
        }
        Ok(texts.iter().map(|t| self.vector(t)).collect())
    }

    fn dimensions(&self) -> usize {
        self.vocabulary.len() + 1
    }
}

/// Replays a fixed list of responses, then repeats a fallback answer if one is set.
pub(crate) struct ScriptedGenerator {
    responses: Mutex<VecDeque<Result<String>>>,
    fallback: Option<String>,
    first_delay: Option<Duration>,
    calls: AtomicUsize,
    prompts: Mutex<Vec<GenerationPrompt>>,
}

impl ScriptedGenerator {
    pub(crate) fn new(responses: Vec<Result<String>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            fallback: None,
            first_delay: None,
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Always answer with `answer`.
    pub(crate) fn always(answer: &str) -> Self {
        let mut generator = Self::new(Vec::new());
        generator.fallback = Some(answer.to_string());
        generator
    }

    /// Sleep before answering the first call.
    pub(crate) fn with_first_delay(mut self, delay: Duration) -> Self {
        self.first_delay = Some(delay);
        self
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub(crate) fn prompts(&self) -> Vec<GenerationPrompt> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl Generator for ScriptedGenerator {
    async fn generate(&self, prompt: &GenerationPrompt) -> Result<String> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(prompt.clone());
        let response = self.responses.lock().unwrap().pop_front();

        if call == 0 {
            if let Some(delay) = self.first_delay {
                tokio::time::sleep(delay).await;
            }
        }

        match (response, &self.fallback) {
            (Some(response), _) => response,
            (None, Some(answer)) => Ok(answer.clone()),
            (None, None) => Err(SvarError::InvalidInput("script exhausted".to_string())),
        }
    }
}
