//! The IndexApi trait: what an index backend must provide.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use docstream_core::{DocumentState, StreamId};

use crate::error::Result;

/// The indexed projection of a document stream.
///
/// This is a flattened snapshot taken from a [`DocumentState`] at index
/// time; it carries the committed content only, never pending updates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexedDocument {
    /// The document's stream identifier.
    pub stream_id: StreamId,

    /// The model stream the document conforms to.
    pub model: StreamId,

    /// The document's controller.
    pub controller: String,

    /// The committed content value.
    pub content: Value,

    /// Block timestamp of the latest anchor, if the tip is anchored.
    pub last_anchored_at: Option<i64>,

    /// When the document was first indexed (Unix ms).
    pub created_at: i64,

    /// When the indexed row was last updated (Unix ms).
    pub updated_at: i64,
}

impl IndexedDocument {
    /// Project a document state into its indexed form.
    pub fn from_state(state: &DocumentState, now: i64) -> Self {
        Self {
            stream_id: state.stream_id,
            model: state.metadata.model,
            controller: state.metadata.controller().to_string(),
            content: state.content.clone(),
            last_anchored_at: state
                .anchor_proof
                .as_ref()
                .map(|proof| proof.block_timestamp),
            created_at: now,
            updated_at: now,
        }
    }
}

/// Async interface for all index backends.
#[async_trait]
pub trait IndexApi: Send + Sync {
    /// Insert or update the indexed row for a document.
    ///
    /// Upserts keyed by stream id: a re-index of a known document replaces
    /// its content and bumps `updated_at`, keeping the original `created_at`.
    async fn index_document(&self, doc: &IndexedDocument) -> Result<()>;

    /// Fetch the indexed row for a document, if present.
    async fn get_document(&self, stream_id: &StreamId) -> Result<Option<IndexedDocument>>;

    /// List all indexed documents for a model, ordered by creation time.
    async fn list_by_model(&self, model: &StreamId) -> Result<Vec<IndexedDocument>>;

    /// Count indexed documents for a model.
    async fn count_by_model(&self, model: &StreamId) -> Result<u64>;
}
