//! Pipeline orchestrator for Svar.
//!
//! Coordinates ingestion (chunk, embed, replace the collection) and the query
//! path (retrieve, assemble, generate) for each document key.

use crate::chunking::{ChunkingConfig, ContentChunk, TextSplitter};
use crate::config::{Prompts, Settings};
use crate::document::{ApprovalState, Document, DocumentKey, DocumentStore};
use crate::embedding::{Embedder, OpenAIEmbedder};
use crate::error::{Result, SvarError};
use crate::generation::{with_timeout, Generator, OpenAIGenerator};
use crate::rag::{ChatSession, MmrRetriever, RagEngine, RagResponse, RetrievalConfig, RetrievalResult};
use crate::vector_store::{IndexEntry, MemoryVectorStore, SqliteVectorStore, VectorIndex};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

/// Serializes collection replacement for one key.
///
/// Every ingestion takes a ticket before embedding. Commits run one at a time,
/// and a ticket older than the last committed one is dropped.
#[derive(Default)]
struct KeyGate {
    issued: AtomicU64,
    committed: tokio::sync::Mutex<u64>,
}

impl KeyGate {
    fn issue(&self) -> u64 {
        self.issued.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Run `upsert` unless a newer ticket has already committed.
    /// Returns `None` when the ticket was superseded.
    async fn commit<F, Fut>(&self, ticket: u64, upsert: F) -> Result<Option<usize>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<usize>>,
    {
        let mut committed = self.committed.lock().await;
        if *committed > ticket {
            return Ok(None);
        }
        let count = upsert().await?;
        *committed = ticket;
        Ok(Some(count))
    }
}

/// Gates for keys with an ingestion in flight.
///
/// A gate held only by the map has no outstanding tickets, so it is pruned
/// the next time any gate is requested.
#[derive(Default)]
struct IngestGates {
    gates: Mutex<HashMap<DocumentKey, Arc<KeyGate>>>,
}

impl IngestGates {
    fn gate(&self, document_key: &DocumentKey) -> Result<Arc<KeyGate>> {
        let mut gates = self
            .gates
            .lock()
            .map_err(|e| SvarError::Ingestion(format!("Failed to acquire lock: {}", e)))?;
        gates.retain(|_, gate| Arc::strong_count(gate) > 1);
        Ok(gates.entry(document_key.clone()).or_default().clone())
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.gates.lock().map(|gates| gates.len()).unwrap_or(0)
    }
}

/// The main orchestrator for the Svar pipeline.
pub struct Orchestrator {
    settings: Settings,
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn VectorIndex>,
    documents: Arc<dyn DocumentStore>,
    engine: RagEngine,
    gates: IngestGates,
    embed_timeout: Duration,
}

impl Orchestrator {
    /// Create an orchestrator with OpenAI providers and the configured vector store.
    pub fn new(settings: Settings) -> Result<Self> {
        settings.validate()?;

        // Load prompts (with optional custom directory and variables)
        let prompts = Prompts::load(
            settings.prompts.custom_dir.as_deref(),
            Some(&settings.prompts.variables),
        )?;

        let embedder: Arc<dyn Embedder> = Arc::new(OpenAIEmbedder::from_settings(&settings.embedding)?);
        let generator: Arc<dyn Generator> = Arc::new(OpenAIGenerator::from_settings(&settings.generation)?);
        let metric = settings.vector_store.metric()?;

        match settings.vector_store.provider.as_str() {
            "sqlite" => {
                let store = Arc::new(SqliteVectorStore::new(&settings.sqlite_path(), metric)?);
                Ok(Self::with_components(settings, prompts, embedder, generator, store))
            }
            "memory" => {
                warn!("Using the in-memory vector store; nothing will be persisted");
                let store = Arc::new(MemoryVectorStore::with_metric(metric));
                Ok(Self::with_components(settings, prompts, embedder, generator, store))
            }
            other => Err(SvarError::Config(format!("Unknown vector store provider: {}", other))),
        }
    }

    /// Create an orchestrator with custom components.
    pub fn with_components<S>(
        settings: Settings,
        prompts: Prompts,
        embedder: Arc<dyn Embedder>,
        generator: Arc<dyn Generator>,
        store: Arc<S>,
    ) -> Self
    where
        S: VectorIndex + DocumentStore + 'static,
    {
        let index: Arc<dyn VectorIndex> = store.clone();
        let documents: Arc<dyn DocumentStore> = store;
        let embed_timeout = settings.embedding.timeout();

        let retriever = MmrRetriever::new(index.clone(), embedder.clone()).with_embed_timeout(embed_timeout);
        let engine = RagEngine::new(retriever, generator)
            .with_prompts(prompts)
            .with_retry_policy(settings.generation.retry_policy());

        Self {
            settings,
            embedder,
            index,
            documents,
            engine,
            gates: IngestGates::default(),
            embed_timeout,
        }
    }

    /// Get the settings.
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Get a reference to the vector index.
    pub fn index(&self) -> Arc<dyn VectorIndex> {
        self.index.clone()
    }

    /// Store a transcript as a draft document and index it with the configured chunking.
    ///
    /// Re-ingesting an existing key replaces its transcript and resets it to draft.
    /// The document is stored together with its collection, so a failed
    /// ingestion leaves the previous document and chunks in place.
    #[instrument(skip(self, title, transcript), fields(document_key = %document_key))]
    pub async fn ingest_document(&self, document_key: &DocumentKey, title: &str, transcript: &str) -> Result<IngestResult> {
        if transcript.trim().is_empty() {
            return Err(SvarError::InvalidInput(format!("Transcript for '{}' is empty", document_key)));
        }
        let chunking = self.settings.chunking.to_config()?;

        let document = match self.documents.get_document(document_key).await? {
            Some(mut existing) => {
                existing.title = title.to_string();
                existing.transcript = transcript.to_string();
                existing.approval = ApprovalState::Draft;
                existing.updated_at = Utc::now();
                existing
            }
            None => Document::new(document_key.clone(), title.to_string(), transcript.to_string()),
        };

        let result = self.index_with(document_key, transcript, &chunking, Some(&document)).await?;
        if !result.superseded {
            info!("Stored draft '{}' ({} characters)", document.title, document.char_len());
        }
        Ok(result)
    }

    /// Chunk, embed and index `text` as the whole collection of `document_key`.
    ///
    /// Parameters are validated before any embedding call. On failure the
    /// previous collection is left untouched.
    pub async fn index_transcript(
        &self,
        document_key: &DocumentKey,
        text: &str,
        chunk_size: usize,
        overlap: usize,
    ) -> Result<IngestResult> {
        let chunking = ChunkingConfig::new(chunk_size, overlap)?.with_unit(self.settings.chunking.unit()?);
        self.index_with(document_key, text, &chunking, None).await
    }

    /// Replace the collection and, when given, save `document` under the same gate commit.
    #[instrument(skip(self, text, chunking, document), fields(document_key = %document_key))]
    async fn index_with(
        &self,
        document_key: &DocumentKey,
        text: &str,
        chunking: &ChunkingConfig,
        document: Option<&Document>,
    ) -> Result<IngestResult> {
        let gate = self.gates.gate(document_key)?;
        let ticket = gate.issue();

        let chunks: Vec<ContentChunk> = TextSplitter::new(*chunking).split(text).collect();
        info!("Split transcript into {} chunks", chunks.len());

        let entries = self
            .embed_chunks(document_key, chunks)
            .await
            .map_err(SvarError::into_ingestion)?;

        let index = self.index.clone();
        let documents = self.documents.clone();
        let committed = gate
            .commit(ticket, || async move {
                let count = index.upsert_collection(document_key, entries).await?;
                if let Some(document) = document {
                    documents.save_document(document).await?;
                }
                Ok(count)
            })
            .await
            .map_err(SvarError::into_ingestion)?;

        match committed {
            Some(count) => {
                info!("Indexed {} chunks", count);
                Ok(IngestResult {
                    document_key: document_key.clone(),
                    chunks_indexed: count,
                    superseded: false,
                })
            }
            None => {
                warn!("Ingestion superseded by a newer one, discarding");
                Ok(IngestResult {
                    document_key: document_key.clone(),
                    chunks_indexed: 0,
                    superseded: true,
                })
            }
        }
    }

    async fn embed_chunks(&self, document_key: &DocumentKey, chunks: Vec<ContentChunk>) -> Result<Vec<IndexEntry>> {
        if chunks.is_empty() {
            return Ok(Vec::new());
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
        let embeddings = with_timeout(self.embed_timeout, self.embedder.embed_batch(&texts)).await?;

        if embeddings.len() != chunks.len() {
            return Err(SvarError::Embedding(format!(
                "Expected {} embeddings, got {}",
                chunks.len(),
                embeddings.len()
            )));
        }

        Ok(chunks
            .into_iter()
            .zip(embeddings)
            .map(|(chunk, embedding)| IndexEntry::new(document_key, chunk, embedding))
            .collect())
    }

    /// Move a draft to approved and re-index its stored transcript.
    ///
    /// Approving an already approved document re-indexes it again. The
    /// approval is only stored once re-indexing has committed.
    #[instrument(skip(self), fields(document_key = %document_key))]
    pub async fn approve(&self, document_key: &DocumentKey) -> Result<ApproveResult> {
        let mut document = self
            .documents
            .get_document(document_key)
            .await?
            .ok_or_else(|| SvarError::NotFound(document_key.to_string()))?;

        let newly_approved = document.approve();
        let chunking = self.settings.chunking.to_config()?;
        let ingest = self
            .index_with(document_key, &document.transcript, &chunking, Some(&document))
            .await?;

        if ingest.superseded {
            warn!("Approval of '{}' superseded by a newer ingestion", document.title);
        } else if newly_approved {
            info!("Approved '{}'", document.title);
        } else {
            debug!("'{}' was already approved", document.title);
        }

        Ok(ApproveResult {
            document,
            newly_approved,
            ingest,
        })
    }

    /// Re-chunk and re-embed a stored transcript with the current settings.
    pub async fn reindex(&self, document_key: &DocumentKey) -> Result<IngestResult> {
        let document = self
            .documents
            .get_document(document_key)
            .await?
            .ok_or_else(|| SvarError::NotFound(document_key.to_string()))?;
        let chunking = self.settings.chunking.to_config()?;
        self.index_with(document_key, &document.transcript, &chunking, None).await
    }

    /// Answer a question about one document.
    #[allow(clippy::too_many_arguments)]
    pub async fn answer_query(
        &self,
        document_key: &DocumentKey,
        query: &str,
        k: usize,
        pool_size: usize,
        lambda: f32,
        max_context_length: usize,
    ) -> Result<RagResponse> {
        let config = RetrievalConfig::new(k, pool_size, lambda, max_context_length)?;
        self.answer_with(document_key, query, &config).await
    }

    /// Answer a question using the configured retrieval parameters.
    pub async fn ask(&self, document_key: &DocumentKey, question: &str) -> Result<RagResponse> {
        let config = self.settings.retrieval.to_config()?;
        self.answer_with(document_key, question, &config).await
    }

    async fn answer_with(&self, document_key: &DocumentKey, query: &str, config: &RetrievalConfig) -> Result<RagResponse> {
        let title = self.title_of(document_key).await?;
        self.engine.answer_query(document_key, &title, query, config).await
    }

    /// Run retrieval only, without generating an answer.
    pub async fn retrieve(
        &self,
        document_key: &DocumentKey,
        query: &str,
        config: Option<RetrievalConfig>,
    ) -> Result<RetrievalResult> {
        let config = match config {
            Some(config) => config,
            None => self.settings.retrieval.to_config()?,
        };
        self.engine.retriever().retrieve(document_key, query, &config).await
    }

    /// Start a chat session bounded by the configured history length.
    pub fn new_session(&self) -> ChatSession {
        ChatSession::new(self.settings.generation.history_turns)
    }

    /// Continue a chat session about one document.
    pub async fn chat(&self, session: &mut ChatSession, document_key: &DocumentKey, message: &str) -> Result<RagResponse> {
        let config = self.settings.retrieval.to_config()?;
        let title = self.title_of(document_key).await?;
        self.engine.chat(session, document_key, &title, message, &config).await
    }

    /// Remove a document and its collection.
    #[instrument(skip(self), fields(document_key = %document_key))]
    pub async fn delete(&self, document_key: &DocumentKey) -> Result<DeleteResult> {
        let indexed = self.index.has_collection(document_key).await?;
        let chunks_removed = self.index.delete_collection(document_key).await?;
        let document_removed = self.documents.delete_document(document_key).await?;

        if !indexed && !document_removed {
            return Err(SvarError::NotFound(document_key.to_string()));
        }

        info!("Deleted {} ({} chunks)", document_key, chunks_removed);
        Ok(DeleteResult {
            document_removed,
            chunks_removed,
        })
    }

    /// Every known document or collection, most recently indexed first.
    pub async fn list(&self) -> Result<Vec<DocumentSummary>> {
        let documents = self.documents.list_documents().await?;
        let mut collections: HashMap<DocumentKey, _> = self
            .index
            .list_collections()
            .await?
            .into_iter()
            .map(|c| (c.document_key.clone(), c))
            .collect();

        let mut summaries: Vec<DocumentSummary> = documents
            .into_iter()
            .map(|doc| {
                let collection = collections.remove(&doc.key);
                DocumentSummary {
                    title: doc.title,
                    approval: Some(doc.approval),
                    chunk_count: collection.as_ref().map(|c| c.chunk_count),
                    indexed_at: collection.map(|c| c.indexed_at),
                    document_key: doc.key,
                }
            })
            .collect();

        // Collections indexed directly, without a stored document
        summaries.extend(collections.into_values().map(|c| DocumentSummary {
            title: c.document_key.to_string(),
            approval: None,
            chunk_count: Some(c.chunk_count),
            indexed_at: Some(c.indexed_at),
            document_key: c.document_key,
        }));

        summaries.sort_by(|a, b| {
            b.indexed_at
                .cmp(&a.indexed_at)
                .then_with(|| a.document_key.as_str().cmp(b.document_key.as_str()))
        });
        Ok(summaries)
    }

    async fn title_of(&self, document_key: &DocumentKey) -> Result<String> {
        Ok(self
            .documents
            .get_document(document_key)
            .await?
            .map(|doc| doc.title)
            .unwrap_or_else(|| document_key.to_string()))
    }
}

/// Result of indexing a transcript.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestResult {
    pub document_key: DocumentKey,
    /// Number of chunks indexed.
    pub chunks_indexed: usize,
    /// A newer ingestion for the same key committed first; nothing was written,
    /// neither chunks nor the document.
    pub superseded: bool,
}

/// Result of an approval.
#[derive(Debug, Clone)]
pub struct ApproveResult {
    pub document: Document,
    /// False when the document was already approved.
    pub newly_approved: bool,
    pub ingest: IngestResult,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeleteResult {
    pub document_removed: bool,
    pub chunks_removed: usize,
}

/// One row of the document listing.
#[derive(Debug, Clone)]
pub struct DocumentSummary {
    pub document_key: DocumentKey,
    pub title: String,
    /// `None` for collections indexed without a stored document.
    pub approval: Option<ApprovalState>,
    pub chunk_count: Option<usize>,
    pub indexed_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rag::Grounding;
    use crate::testing::{KeywordEmbedder, ScriptedGenerator};
    use std::collections::HashSet;

    const TOPICS: [&str; 10] = [
        "ownership", "borrowing", "lifetimes", "traits", "generics", "closures", "iterators", "async",
        "macros", "unsafe",
    ];

    fn key(name: &str) -> DocumentKey {
        DocumentKey::new(name).unwrap()
    }

    fn test_settings() -> Settings {
        let mut settings = Settings::default();
        settings.chunking.chunk_size = 200;
        settings.chunking.overlap = 50;
        settings.generation.max_retries = 1;
        settings.generation.retry_backoff_ms = 1;
        settings
    }

    fn orchestrator_with(
        embedder: KeywordEmbedder,
        generator: Arc<ScriptedGenerator>,
    ) -> (Orchestrator, Arc<MemoryVectorStore>) {
        let store = Arc::new(MemoryVectorStore::new());
        let orchestrator =
            Orchestrator::with_components(test_settings(), Prompts::default(), Arc::new(embedder), generator, store.clone());
        (orchestrator, store)
    }

    fn orchestrator() -> (Orchestrator, Arc<MemoryVectorStore>) {
        orchestrator_with(KeywordEmbedder::new(&TOPICS), Arc::new(ScriptedGenerator::always("answer")))
    }

    /// Ten 100-character sections, one topic each.
    fn lecture() -> String {
        TOPICS
            .iter()
            .enumerate()
            .map(|(i, topic)| format!("{:<100}", format!("Section {} is about {} in depth.", i, topic)))
            .collect()
    }

    #[tokio::test]
    async fn test_thousand_char_scenario() {
        let (orchestrator, store) = orchestrator();
        let text = lecture();
        assert_eq!(text.chars().count(), 1000);

        let result = orchestrator.index_transcript(&key("lecture"), &text, 200, 50).await.unwrap();
        assert_eq!(result.chunks_indexed, 7);
        assert!(!result.superseded);

        let config = RetrievalConfig::new(3, 10, 0.7, 10_000).unwrap();
        let retrieval = orchestrator
            .retrieve(&key("lecture"), "tell me about macros", Some(config))
            .await
            .unwrap();

        let ids: HashSet<&str> = retrieval.chunk_ids().into_iter().collect();
        assert_eq!(retrieval.len(), 3);
        assert_eq!(ids.len(), 3);

        let query = KeywordEmbedder::new(&TOPICS).vector("tell me about macros");
        let ranked = store.query(&key("lecture"), &query, 10).await.unwrap();
        assert_eq!(retrieval.chunks[0].entry.chunk_id, ranked[0].entry.chunk_id);
    }

    #[tokio::test]
    async fn test_invalid_chunking_rejected_before_embedding() {
        let embedder = Arc::new(KeywordEmbedder::new(&TOPICS));
        let store = Arc::new(MemoryVectorStore::new());
        let orchestrator = Orchestrator::with_components(
            test_settings(),
            Prompts::default(),
            embedder.clone(),
            Arc::new(ScriptedGenerator::always("answer")),
            store.clone(),
        );

        let err = orchestrator.index_transcript(&key("lecture"), "text", 100, 100).await.unwrap_err();
        assert!(matches!(err, SvarError::Config(_)));
        assert_eq!(embedder.calls(), 0);
        assert!(!store.has_collection(&key("lecture")).await.unwrap());
    }

    #[tokio::test]
    async fn test_concurrent_ingestion_keeps_keys_isolated() {
        let (orchestrator, _) = orchestrator();
        let shared = lecture();
        let (a, b) = (key("video_a"), key("video_b"));

        let (ra, rb) = tokio::join!(
            orchestrator.index_transcript(&a, &shared, 200, 50),
            orchestrator.index_transcript(&b, &shared[..500], 200, 50),
        );
        assert_eq!(ra.unwrap().chunks_indexed, 7);
        assert_eq!(rb.unwrap().chunks_indexed, 3);

        let config = RetrievalConfig::new(10, 20, 0.5, 10_000).unwrap();
        let hits = orchestrator.retrieve(&a, "ownership and macros", Some(config)).await.unwrap();
        assert_eq!(hits.len(), 7);
        assert!(hits.chunks.iter().all(|c| c.entry.document_key == a));
        assert!(hits.chunk_ids().iter().all(|id| id.starts_with("video_a_")));

        let hits = orchestrator.retrieve(&b, "ownership and macros", Some(config)).await.unwrap();
        assert_eq!(hits.len(), 3);
        assert!(hits.chunks.iter().all(|c| c.entry.document_key == b));
    }

    #[tokio::test]
    async fn test_readers_never_see_mixed_collections() {
        let (orchestrator, _) = orchestrator();
        let document_key = key("lecture");
        let old = "ownership ".repeat(100);
        let new = "async ".repeat(200);
        orchestrator.index_transcript(&document_key, &old, 200, 50).await.unwrap();

        let writer = async {
            for i in 0..20 {
                let text = if i % 2 == 0 { &new } else { &old };
                orchestrator.index_transcript(&document_key, text, 200, 50).await.unwrap();
                tokio::task::yield_now().await;
            }
        };
        let reader = async {
            let config = RetrievalConfig::new(20, 20, 1.0, 100_000).unwrap();
            for _ in 0..50 {
                let result = orchestrator.retrieve(&document_key, "ownership async", Some(config)).await.unwrap();
                let old_version = result.chunks.iter().all(|c| c.entry.content.contains("ownership"));
                let new_version = result.chunks.iter().all(|c| c.entry.content.contains("async"));
                assert!(old_version || new_version, "observed a mixed collection");
                tokio::task::yield_now().await;
            }
        };
        tokio::join!(writer, reader);
    }

    #[tokio::test]
    async fn test_stale_ingestion_is_superseded() {
        let embedder = KeywordEmbedder::new(&TOPICS).with_slow_word("stale", Duration::from_millis(300));
        let (orchestrator, store) = orchestrator_with(embedder, Arc::new(ScriptedGenerator::always("answer")));
        let document_key = key("lecture");

        let (stale, fresh) = tokio::join!(
            orchestrator.index_transcript(&document_key, "stale ownership notes", 200, 50),
            async {
                tokio::time::sleep(Duration::from_millis(30)).await;
                orchestrator.index_transcript(&document_key, "fresh async notes", 200, 50).await
            },
        );

        let stale = stale.unwrap();
        assert!(stale.superseded);
        assert_eq!(stale.chunks_indexed, 0);
        assert!(!fresh.unwrap().superseded);

        let entries = store.get_collection(&document_key).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].content, "fresh async notes");
    }

    #[tokio::test]
    async fn test_gate_commits_in_ticket_order() {
        let gate = KeyGate::default();
        let first = gate.issue();
        let second = gate.issue();

        assert_eq!(gate.commit(second, || async { Ok(2) }).await.unwrap(), Some(2));
        assert_eq!(gate.commit(first, || async { Ok(1) }).await.unwrap(), None);

        let third = gate.issue();
        assert_eq!(gate.commit(third, || async { Ok(3) }).await.unwrap(), Some(3));
    }

    #[tokio::test]
    async fn test_embedding_failure_leaves_collection_intact() {
        let (orchestrator, store) = orchestrator_with(
            KeywordEmbedder::new(&TOPICS).failing(),
            Arc::new(ScriptedGenerator::always("answer")),
        );
        let document_key = key("lecture");
        let chunk = ContentChunk {
            ordinal: 0,
            content: "original".to_string(),
            start_offset: 0,
            end_offset: 8,
        };
        store
            .upsert_collection(&document_key, vec![IndexEntry::new(&document_key, chunk, vec![1.0; 11])])
            .await
            .unwrap();

        let err = orchestrator
            .index_transcript(&document_key, &lecture(), 200, 50)
            .await
            .unwrap_err();
        assert!(matches!(err, SvarError::Ingestion(_)));

        let entries = store.get_collection(&document_key).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].content, "original");
    }

    #[tokio::test]
    async fn test_failed_reingestion_keeps_stored_document() {
        let store = Arc::new(MemoryVectorStore::new());
        let healthy = Orchestrator::with_components(
            test_settings(),
            Prompts::default(),
            Arc::new(KeywordEmbedder::new(&TOPICS)),
            Arc::new(ScriptedGenerator::always("answer")),
            store.clone(),
        );
        let broken = Orchestrator::with_components(
            test_settings(),
            Prompts::default(),
            Arc::new(KeywordEmbedder::new(&TOPICS).failing()),
            Arc::new(ScriptedGenerator::always("answer")),
            store.clone(),
        );
        let document_key = key("lecture");

        healthy
            .ingest_document(&document_key, "Lecture", "ownership old transcript")
            .await
            .unwrap();
        healthy.approve(&document_key).await.unwrap();

        let err = broken
            .ingest_document(&document_key, "Renamed", "brand new transcript")
            .await
            .unwrap_err();
        assert!(matches!(err, SvarError::Ingestion(_)));

        let document = store.get_document(&document_key).await.unwrap().unwrap();
        assert_eq!(document.transcript, "ownership old transcript");
        assert_eq!(document.title, "Lecture");
        assert_eq!(document.approval, ApprovalState::Approved);
        let entries = store.get_collection(&document_key).await.unwrap();
        assert_eq!(entries[0].content, "ownership old transcript");
    }

    #[tokio::test]
    async fn test_failed_approval_stays_draft() {
        let store = Arc::new(MemoryVectorStore::new());
        let healthy = Orchestrator::with_components(
            test_settings(),
            Prompts::default(),
            Arc::new(KeywordEmbedder::new(&TOPICS)),
            Arc::new(ScriptedGenerator::always("answer")),
            store.clone(),
        );
        let broken = Orchestrator::with_components(
            test_settings(),
            Prompts::default(),
            Arc::new(KeywordEmbedder::new(&TOPICS).failing()),
            Arc::new(ScriptedGenerator::always("answer")),
            store.clone(),
        );
        let document_key = key("lecture");
        healthy.ingest_document(&document_key, "Lecture", &lecture()).await.unwrap();

        let err = broken.approve(&document_key).await.unwrap_err();
        assert!(matches!(err, SvarError::Ingestion(_)));

        let document = store.get_document(&document_key).await.unwrap().unwrap();
        assert_eq!(document.approval, ApprovalState::Draft);
    }

    #[test]
    fn test_idle_gates_are_pruned() {
        let gates = IngestGates::default();
        let held = gates.gate(&key("held")).unwrap();
        drop(gates.gate(&key("finished")).unwrap());
        assert_eq!(gates.len(), 2);

        let _current = gates.gate(&key("current")).unwrap();
        assert_eq!(gates.len(), 2);
        assert!(Arc::ptr_eq(&held, &gates.gate(&key("held")).unwrap()));
    }

    #[tokio::test]
    async fn test_embedding_timeout_aborts_ingestion() {
        let store = Arc::new(MemoryVectorStore::new());
        let mut settings = test_settings();
        settings.embedding.timeout_secs = 1;
        let orchestrator = Orchestrator::with_components(
            settings,
            Prompts::default(),
            Arc::new(KeywordEmbedder::new(&TOPICS).with_delay(Duration::from_secs(10))),
            Arc::new(ScriptedGenerator::always("answer")),
            store.clone(),
        );

        let err = orchestrator
            .index_transcript(&key("lecture"), "ownership", 200, 50)
            .await
            .unwrap_err();
        assert!(matches!(err, SvarError::Ingestion(_)));
        assert!(!store.has_collection(&key("lecture")).await.unwrap());
    }

    #[tokio::test]
    async fn test_answer_query_unknown_key() {
        let (orchestrator, _) = orchestrator();
        let err = orchestrator
            .answer_query(&key("missing"), "anything?", 3, 10, 0.5, 1000)
            .await
            .unwrap_err();
        assert!(matches!(err, SvarError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_answer_query_returns_sources_in_selection_order() {
        let generator = Arc::new(ScriptedGenerator::always("Macros generate code."));
        let (orchestrator, _) = orchestrator_with(KeywordEmbedder::new(&TOPICS), generator.clone());
        let document_key = key("lecture");
        orchestrator.index_transcript(&document_key, &lecture(), 200, 50).await.unwrap();

        let response = orchestrator
            .answer_query(&document_key, "what about macros?", 3, 10, 0.7, 10_000)
            .await
            .unwrap();

        assert_eq!(response.grounding, Grounding::Grounded);
        assert_eq!(response.answer, "Macros generate code.");
        assert_eq!(response.sources.len(), 3);
        assert!(response.sources.iter().all(|s| s.start_offset < s.end_offset));
        assert_eq!(generator.calls(), 1);
    }

    #[tokio::test]
    async fn test_empty_collection_gives_soft_answer() {
        let generator = Arc::new(ScriptedGenerator::always("unused"));
        let (orchestrator, _) = orchestrator_with(KeywordEmbedder::new(&TOPICS), generator.clone());
        let document_key = key("silent_video");

        let result = orchestrator.index_transcript(&document_key, "", 200, 50).await.unwrap();
        assert_eq!(result.chunks_indexed, 0);

        let response = orchestrator.ask(&document_key, "what was said?").await.unwrap();
        assert_eq!(response.grounding, Grounding::NoRelevantContext);
        assert!(response.sources.is_empty());
        assert_eq!(generator.calls(), 0);
    }

    #[tokio::test]
    async fn test_generation_error_after_retries() {
        let generator = Arc::new(ScriptedGenerator::new(vec![
            Err(SvarError::OpenAI("overloaded".to_string())),
            Err(SvarError::OpenAI("overloaded".to_string())),
        ]));
        let (orchestrator, _) = orchestrator_with(KeywordEmbedder::new(&TOPICS), generator.clone());
        let document_key = key("lecture");
        orchestrator.index_transcript(&document_key, &lecture(), 200, 50).await.unwrap();

        let err = orchestrator.ask(&document_key, "ownership?").await.unwrap_err();
        assert!(matches!(err, SvarError::Generation(_)));
        // One attempt plus the single configured retry
        assert_eq!(generator.calls(), 2);

        // Retrieval is unaffected by the generator
        assert!(orchestrator.retrieve(&document_key, "ownership?", None).await.is_ok());
    }

    #[tokio::test]
    async fn test_ingest_approve_delete_lifecycle() {
        let generator = Arc::new(ScriptedGenerator::always("It covers ownership."));
        let (orchestrator, _) = orchestrator_with(KeywordEmbedder::new(&TOPICS), generator.clone());
        let document_key = DocumentKey::from_title("Rust Basics").unwrap();

        let ingest = orchestrator
            .ingest_document(&document_key, "Rust Basics", &lecture())
            .await
            .unwrap();
        assert_eq!(ingest.chunks_indexed, 7);

        let listed = orchestrator.list().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].approval, Some(ApprovalState::Draft));
        assert_eq!(listed[0].chunk_count, Some(7));

        let approved = orchestrator.approve(&document_key).await.unwrap();
        assert!(approved.newly_approved);
        assert_eq!(approved.document.approval, ApprovalState::Approved);
        assert_eq!(approved.ingest.chunks_indexed, 7);

        let again = orchestrator.approve(&document_key).await.unwrap();
        assert!(!again.newly_approved);

        orchestrator.ask(&document_key, "what is ownership?").await.unwrap();
        assert!(generator.prompts()[0].user.contains("Video title: \"Rust Basics\""));

        let deleted = orchestrator.delete(&document_key).await.unwrap();
        assert!(deleted.document_removed);
        assert_eq!(deleted.chunks_removed, 7);

        let err = orchestrator.ask(&document_key, "still there?").await.unwrap_err();
        assert!(matches!(err, SvarError::NotFound(_)));
        assert!(matches!(orchestrator.delete(&document_key).await, Err(SvarError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_approve_unknown_document() {
        let (orchestrator, _) = orchestrator();
        let err = orchestrator.approve(&key("nothing_here")).await.unwrap_err();
        assert!(matches!(err, SvarError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_chat_session_accumulates_history() {
        let generator = Arc::new(ScriptedGenerator::always("Noted."));
        let (orchestrator, _) = orchestrator_with(KeywordEmbedder::new(&TOPICS), generator.clone());
        let document_key = key("lecture");
        orchestrator.index_transcript(&document_key, &lecture(), 200, 50).await.unwrap();

        let mut session = orchestrator.new_session();
        orchestrator.chat(&mut session, &document_key, "traits?").await.unwrap();
        orchestrator.chat(&mut session, &document_key, "generics?").await.unwrap();

        assert_eq!(session.turns().len(), 2);
        assert!(generator.prompts()[1].user.contains("1. User: traits?"));
    }
}
