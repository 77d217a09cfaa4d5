//! In-memory vector store: ephemeral similarity search for a single process.

use async_trait::async_trait;
use crewloop_core::error::MemoryError;
use crewloop_core::memory::{MemoryBackend, MemoryEntry, MemoryQuery};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use crate::vector::{DEFAULT_DIMENSIONS, embed_text, vector_search};

/// Stores entries in a Vec and ranks them by cosine similarity of hashed
/// bag-of-words embeddings.
///
/// Entries stored with an embedding keep it; the rest are embedded on store.
/// Clones share the same storage.
#[derive(Clone)]
pub struct InMemoryVectorStore {
    entries: Arc<RwLock<Vec<MemoryEntry>>>,
    dimensions: usize,
}

impl InMemoryVectorStore {
    pub fn new() -> Self {
        Self::with_dimensions(DEFAULT_DIMENSIONS)
    }

    pub fn with_dimensions(dimensions: usize) -> Self {
        Self {
            entries: Arc::new(RwLock::new(Vec::new())),
            dimensions: dimensions.max(1),
        }
    }
}

impl Default for InMemoryVectorStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MemoryBackend for InMemoryVectorStore {
    fn name(&self) -> &str {
        "in_memory"
    }

    async fn store(&self, mut entry: MemoryEntry) -> Result<String, MemoryError> {
        if entry.id.is_empty() {
            entry.id = Uuid::new_v4().to_string();
        }
        match &entry.embedding {
            Some(emb) if emb.len() != self.dimensions => {
                return Err(MemoryError::Storage(format!(
                    "embedding has {} dimensions, store expects {}",
                    emb.len(),
                    self.dimensions
                )));
            }
            Some(_) => {}
            None => entry.embedding = Some(embed_text(&entry.content, self.dimensions)),
        }
        let id = entry.id.clone();
        self.entries.write().await.push(entry);
        Ok(id)
    }

    async fn query(&self, query: MemoryQuery) -> Result<Vec<MemoryEntry>, MemoryError> {
        let query_embedding = embed_text(&query.text, self.dimensions);
        let entries = self.entries.read().await;
        let results = vector_search(
            &entries,
            &query_embedding,
            query.top_k,
            query.score_threshold,
        );
        debug!(
            query = %query.text,
            candidates = entries.len(),
            hits = results.len(),
            "Memory query"
        );
        Ok(results)
    }

    async fn count(&self) -> Result<usize, MemoryError> {
        Ok(self.entries.read().await.len())
    }

    async fn clear(&self) -> Result<(), MemoryError> {
        self.entries.write().await.clear();
        Ok(())
    }
}
