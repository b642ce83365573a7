//! Documents: one per video, owning the raw transcript and its approval state.

use crate::error::{Result, SvarError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;
use uuid::Uuid;

static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("Invalid regex"));

/// Stable key identifying a video and its index collection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentKey(String);

impl DocumentKey {
    /// Use `key` as-is. It must be non-empty and free of whitespace and control characters.
    pub fn new(key: impl Into<String>) -> Result<Self> {
        let key = key.into();
        if key.is_empty() {
            return Err(SvarError::InvalidInput("Document key must not be empty".to_string()));
        }
        if key.chars().any(|c| c.is_whitespace() || c.is_control()) {
            return Err(SvarError::InvalidInput(format!(
                "Document key '{}' contains whitespace or control characters",
                key.escape_debug()
            )));
        }
        Ok(Self(key))
    }

    /// Derive a key from a video title by joining its words with underscores.
    pub fn from_title(title: &str) -> Result<Self> {
        let normalized = WHITESPACE.replace_all(title.trim(), "_");
        let normalized: String = normalized.chars().filter(|c| !c.is_control()).collect();
        Self::new(normalized)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for DocumentKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for DocumentKey {
    type Err = SvarError;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

/// Review state of a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApprovalState {
    #[default]
    Draft,
    Approved,
}

impl std::str::FromStr for ApprovalState {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "draft" => Ok(ApprovalState::Draft),
            "approved" => Ok(ApprovalState::Approved),
            _ => Err(format!("Unknown approval state: {}", s)),
        }
    }
}

impl std::fmt::Display for ApprovalState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApprovalState::Draft => write!(f, "draft"),
            ApprovalState::Approved => write!(f, "approved"),
        }
    }
}

/// A video transcript.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: Uuid,
    pub key: DocumentKey,
    pub title: String,
    /// Raw transcript text. Chunk offsets point into this string.
    pub transcript: String,
    pub approval: ApprovalState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Document {
    /// Create a new draft document.
    pub fn new(key: DocumentKey, title: String, transcript: String) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            key,
            title,
            transcript,
            approval: ApprovalState::Draft,
            created_at: now,
            updated_at: now,
        }
    }

    /// Move a draft to approved. Returns false if it was already approved.
    pub fn approve(&mut self) -> bool {
        if self.approval == ApprovalState::Approved {
            return false;
        }
        self.approval = ApprovalState::Approved;
        self.updated_at = Utc::now();
        true
    }

    /// Number of characters in the transcript.
    pub fn char_len(&self) -> usize {
        self.transcript.chars().count()
    }
}

/// Persistence for documents.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Insert or replace a document by key.
    async fn save_document(&self, doc: &Document) -> Result<()>;

    /// Look up a document by key.
    async fn get_document(&self, key: &DocumentKey) -> Result<Option<Document>>;

    /// List documents, most recently updated first.
    async fn list_documents(&self) -> Result<Vec<Document>>;

    /// Remove a document. Returns whether it existed.
    async fn delete_document(&self, key: &DocumentKey) -> Result<bool>;
}
