//! # Docstream Index
//!
//! Indexing for document streams: a queryable projection of committed
//! document states, kept behind the [`IndexApi`] trait so the rest of the
//! system stays backend-agnostic.
//!
//! ## Key Types
//!
//! - [`IndexApi`] - The async trait for all index operations
//! - [`IndexedDocument`] - The flattened projection of a document state
//! - [`SqliteIndexApi`] - SQLite-based persistent index
//! - [`MemoryIndexApi`] - In-memory index for tests
//! - [`build_indexing`] - Factory selecting a backend from a connection string
//!
//! ## Usage
//!
//! ```rust,no_run
//! use docstream_index::{build_indexing, IndexingConfig};
//!
//! let index = build_indexing(&IndexingConfig {
//!     db_connection_string: "sqlite:///var/lib/docstream/index.db".to_string(),
//! }).unwrap();
//! ```

pub mod error;
pub mod memory;
pub mod migration;
pub mod sqlite;
pub mod traits;

use std::sync::Arc;

use tracing::info;
use url::Url;

pub use error::{IndexError, Result};
pub use memory::MemoryIndexApi;
pub use sqlite::SqliteIndexApi;
pub use traits::{IndexApi, IndexedDocument};

/// Configuration for the indexing subsystem.
#[derive(Debug, Clone)]
pub struct IndexingConfig {
    /// Backend selection, e.g. `sqlite:///path/to/index.db`.
    pub db_connection_string: String,
}

/// Build an index backend from a connection string.
///
/// Backend selection happens here and only here. `sqlite` and `sqlite3`
/// URLs yield a [`SqliteIndexApi`]; any other protocol is rejected with
/// [`IndexError::UnsupportedProtocol`], and a string that does not parse as
/// a URL at all with [`IndexError::InvalidConnectionString`].
pub fn build_indexing(config: &IndexingConfig) -> Result<Arc<dyn IndexApi>> {
    let url = Url::parse(&config.db_connection_string)
        .map_err(|_| IndexError::InvalidConnectionString(config.db_connection_string.clone()))?;

    match url.scheme() {
        "sqlite" | "sqlite3" => {
            let path = url.path();
            let api = if path.is_empty() || path == ":memory:" {
                info!("building in-memory sqlite index");
                SqliteIndexApi::open_memory()?
            } else {
                info!(path, "building sqlite index");
                SqliteIndexApi::open(path)?
            };
            Ok(Arc::new(api))
        }
        other => Err(IndexError::UnsupportedProtocol(other.to_string())),
    }
}
