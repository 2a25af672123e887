//! Capability interfaces consumed by the state machine.
//!
//! The original system bundled identity and stream loading into one ad hoc
//! context object; here they are explicit traits, injected at construction
//! and independently substitutable for testing. The state machine only
//! consumes success/failure from each contract.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::commit::Commit;
use crate::error::{LoadError, SchemaError, SignatureError};
use crate::types::StreamId;

/// Authenticates a commit against a claimed signer and binding context.
///
/// Implementations resolve the signer's current key material (possibly
/// rotated), confirm the payload signature, and confirm the signature's
/// scope covers `(stream, model)` when capability-scoped signing is used.
#[async_trait]
pub trait IdentityVerifier: Send + Sync {
    async fn verify(
        &self,
        commit: &Commit,
        signer: &str,
        model: &StreamId,
        stream: &StreamId,
    ) -> Result<(), SignatureError>;
}

/// Resolves an identity to its current Ed25519 key material.
///
/// Returning more than one key covers key rotation: a signature verifies if
/// any resolved key matches.
#[async_trait]
pub trait KeyResolver: Send + Sync {
    async fn resolve(&self, signer: &str) -> Result<Vec<crate::crypto::Ed25519PublicKey>, SignatureError>;
}

/// A stream materialized by the generic stream loader.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedStream {
    /// The loaded stream's identifier (carries its type tag).
    pub stream_id: StreamId,

    /// The stream's current content value.
    pub content: Value,
}

impl LoadedStream {
    /// Extract the model's declared schema, if it has one.
    pub fn schema(&self) -> Option<&Value> {
        self.content.get("schema")
    }
}

/// Loads the current state of another stream by identifier.
#[async_trait]
pub trait StreamLoader: Send + Sync {
    async fn load_stream(&self, stream_id: &StreamId) -> Result<LoadedStream, LoadError>;
}

/// Checks content against a model-declared schema.
///
/// Schema semantics are outside this core; the state machine forwards
/// `(content, schema)` and consumes the outcome.
pub trait SchemaValidator: Send + Sync {
    fn validate(&self, content: &Value, schema: &Value) -> Result<(), SchemaError>;
}

/// The capabilities a caller presents alongside a commit.
#[derive(Clone)]
pub struct Context {
    /// Identity and signature verification.
    pub verifier: Arc<dyn IdentityVerifier>,

    /// Generic stream loading (used to fetch model streams).
    pub loader: Arc<dyn StreamLoader>,
}

impl Context {
    pub fn new(verifier: Arc<dyn IdentityVerifier>, loader: Arc<dyn StreamLoader>) -> Self {
        Self { verifier, loader }
    }
}
