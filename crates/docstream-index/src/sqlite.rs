//! SQLite implementation of the IndexApi trait.
//!
//! This is the primary index backend. It uses rusqlite with bundled SQLite,
//! wrapped in async via tokio::spawn_blocking.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};

use docstream_core::StreamId;

use crate::error::{IndexError, Result};
use crate::migration;
use crate::traits::{IndexApi, IndexedDocument};

/// SQLite-based index implementation.
///
/// Thread-safe via internal Mutex. All operations use spawn_blocking
/// to avoid blocking the async runtime.
pub struct SqliteIndexApi {
    /// The SQLite connection, protected by a mutex.
    conn: Arc<Mutex<Connection>>,
}

impl SqliteIndexApi {
    /// Open a SQLite database at the given path.
    ///
    /// Creates the file and runs migrations if it doesn't exist.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let mut conn = Connection::open(path)?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open an in-memory SQLite database.
    ///
    /// Useful for testing.
    pub fn open_memory() -> Result<Self> {
        let mut conn = Connection::open_in_memory()?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }
}

fn lock_error(e: impl std::fmt::Display) -> IndexError {
    IndexError::Database(rusqlite::Error::SqliteFailure(
        rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_LOCKED),
        Some(format!("mutex poisoned: {}", e)),
    ))
}

fn join_error(e: impl std::fmt::Display) -> IndexError {
    IndexError::Database(rusqlite::Error::SqliteFailure(
        rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_ERROR),
        Some(format!("spawn_blocking failed: {}", e)),
    ))
}

// Helper to convert a row to IndexedDocument
fn row_to_document(row: &rusqlite::Row<'_>) -> rusqlite::Result<IndexedDocument> {
    let stream_id_bytes: Vec<u8> = row.get("stream_id")?;
    let model_bytes: Vec<u8> = row.get("model")?;
    let content_json: String = row.get("content")?;

    let stream_id = StreamId::from_bytes(&stream_id_bytes).ok_or_else(|| {
        rusqlite::Error::InvalidColumnType(0, "stream_id".into(), rusqlite::types::Type::Blob)
    })?;
    let model = StreamId::from_bytes(&model_bytes).ok_or_else(|| {
        rusqlite::Error::InvalidColumnType(1, "model".into(), rusqlite::types::Type::Blob)
    })?;
    let content = serde_json::from_str(&content_json).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(
            3,
            rusqlite::types::Type::Text,
            Box::new(e),
        )
    })?;

    Ok(IndexedDocument {
        stream_id,
        model,
        controller: row.get("controller")?,
        content,
        last_anchored_at: row.get("last_anchored_at")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

const DOCUMENT_COLUMNS: &str =
    "stream_id, model, controller, content, last_anchored_at, created_at, updated_at";

#[async_trait]
impl IndexApi for SqliteIndexApi {
    async fn index_document(&self, doc: &IndexedDocument) -> Result<()> {
        let doc = doc.clone();
        let conn = self.conn.clone();

        tokio::task::spawn_blocking(move || {
            let conn = conn.lock().map_err(lock_error)?;

            let content = serde_json::to_string(&doc.content)?;

            conn.execute(
                "INSERT INTO documents (
                    stream_id, model, controller, content,
                    last_anchored_at, created_at, updated_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                ON CONFLICT(stream_id) DO UPDATE SET
                    content = excluded.content,
                    last_anchored_at = excluded.last_anchored_at,
                    updated_at = excluded.updated_at",
                params![
                    doc.stream_id.to_bytes().as_slice(),
                    doc.model.to_bytes().as_slice(),
                    &doc.controller,
                    content,
                    doc.last_anchored_at,
                    doc.created_at,
                    doc.updated_at,
                ],
            )?;

            Ok(())
        })
        .await
        .map_err(join_error)?
    }

    async fn get_document(&self, stream_id: &StreamId) -> Result<Option<IndexedDocument>> {
        let stream_id = *stream_id;
        let conn = self.conn.clone();

        tokio::task::spawn_blocking(move || {
            let conn = conn.lock().map_err(lock_error)?;

            conn.query_row(
                &format!(
                    "SELECT {DOCUMENT_COLUMNS} FROM documents WHERE stream_id = ?1"
                ),
                params![stream_id.to_bytes().as_slice()],
                row_to_document,
            )
            .optional()
            .map_err(IndexError::from)
        })
        .await
        .map_err(join_error)?
    }

    async fn list_by_model(&self, model: &StreamId) -> Result<Vec<IndexedDocument>> {
        let model = *model;
        let conn = self.conn.clone();

        tokio::task::spawn_blocking(move || {
            let conn = conn.lock().map_err(lock_error)?;

            let mut stmt = conn.prepare(&format!(
                "SELECT {DOCUMENT_COLUMNS} FROM documents
                 WHERE model = ?1 ORDER BY created_at, stream_id"
            ))?;

            let docs = stmt
                .query_map(params![model.to_bytes().as_slice()], row_to_document)?
                .collect::<rusqlite::Result<Vec<_>>>()?;

            Ok(docs)
        })
        .await
        .map_err(join_error)?
    }

    async fn count_by_model(&self, model: &StreamId) -> Result<u64> {
        let model = *model;
        let conn = self.conn.clone();

        tokio::task::spawn_blocking(move || {
            let conn = conn.lock().map_err(lock_error)?;

            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM documents WHERE model = ?1",
                params![model.to_bytes().as_slice()],
                |row| row.get(0),
            )?;

            Ok(count as u64)
        })
        .await
        .map_err(join_error)?
    }
}
