//! In-memory implementation of the IndexApi trait.
//!
//! This is primarily for testing. It has the same semantics as SQLite
//! but keeps everything in memory with no persistence.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use docstream_core::StreamId;

use crate::error::Result;
use crate::traits::{IndexApi, IndexedDocument};

/// In-memory index implementation.
///
/// All data is lost when the index is dropped. Thread-safe via RwLock.
pub struct MemoryIndexApi {
    documents: RwLock<HashMap<StreamId, IndexedDocument>>,
}

impl MemoryIndexApi {
    /// Create a new empty in-memory index.
    pub fn new() -> Self {
        Self {
            documents: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for MemoryIndexApi {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl IndexApi for MemoryIndexApi {
    async fn index_document(&self, doc: &IndexedDocument) -> Result<()> {
        let mut documents = self.documents.write().unwrap();

        match documents.get_mut(&doc.stream_id) {
            Some(existing) => {
                // Upsert: content and anchor info move, created_at stays.
                existing.content = doc.content.clone();
                existing.last_anchored_at = doc.last_anchored_at;
                existing.updated_at = doc.updated_at;
            }
            None => {
                documents.insert(doc.stream_id, doc.clone());
            }
        }

        Ok(())
    }

    async fn get_document(&self, stream_id: &StreamId) -> Result<Option<IndexedDocument>> {
        let documents = self.documents.read().unwrap();
        Ok(documents.get(stream_id).cloned())
    }

    async fn list_by_model(&self, model: &StreamId) -> Result<Vec<IndexedDocument>> {
        let documents = self.documents.read().unwrap();
        let mut docs: Vec<IndexedDocument> = documents
            .values()
            .filter(|doc| doc.model == *model)
            .cloned()
            .collect();
        docs.sort_by_key(|doc| (doc.created_at, doc.stream_id.to_bytes()));
        Ok(docs)
    }

    async fn count_by_model(&self, model: &StreamId) -> Result<u64> {
        let documents = self.documents.read().unwrap();
        Ok(documents.values().filter(|doc| doc.model == *model).count() as u64)
    }
}
