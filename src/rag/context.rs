//! Context assembly for RAG responses.

use super::{RetrievalResult, Source};

/// Delimiter placed between chunk texts.
pub const DEFAULT_DELIMITER: &str = "\n\n";

/// A bounded block of transcript text handed to the generator.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AssembledContext {
    /// Concatenated chunk texts.
    pub text: String,
    /// Number of chunks that fit.
    pub included: usize,
    /// Spans of the included chunks, in selection order.
    pub sources: Vec<Source>,
}

impl AssembledContext {
    pub fn is_empty(&self) -> bool {
        self.included == 0
    }

    /// Length in characters, delimiters included.
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}

/// Packs selected chunks into a length-bounded block.
#[derive(Debug, Clone)]
pub struct ContextAssembler {
    delimiter: String,
}

impl Default for ContextAssembler {
    fn default() -> Self {
        Self::new()
    }
}

impl ContextAssembler {
    pub fn new() -> Self {
        Self {
            delimiter: DEFAULT_DELIMITER.to_string(),
        }
    }

    /// Use a different delimiter between chunks.
    pub fn with_delimiter(mut self, delimiter: impl Into<String>) -> Self {
        self.delimiter = delimiter.into();
        self
    }

    pub fn delimiter(&self) -> &str {
        &self.delimiter
    }

    /// Concatenate chunk texts in selection order.
    ///
    /// Whole chunks are kept until the first one that would push the running
    /// length past `max_context_length`; it and everything after it are dropped.
    pub fn assemble(&self, result: &RetrievalResult, max_context_length: usize) -> AssembledContext {
        let delimiter_len = self.delimiter.chars().count();
        let mut context = AssembledContext::default();
        let mut length = 0;

        for chunk in &result.chunks {
            let separator = if context.included == 0 { 0 } else { delimiter_len };
            let added = separator + chunk.entry.content.chars().count();
            if length + added > max_context_length {
                break;
            }

            if context.included > 0 {
                context.text.push_str(&self.delimiter);
            }
            context.text.push_str(&chunk.entry.content);
            context.sources.push(Source::from(chunk));
            context.included += 1;
            length += added;
        }

        context
    }
}
