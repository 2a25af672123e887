//! Error types for the docstream core.
//!
//! Every error here is terminal for a single `apply_commit` invocation: the
//! state machine never retries, and no partial state escapes a failed
//! transition.

use thiserror::Error;

use crate::types::{CommitId, StreamId};

/// Errors produced by the commit state machine.
#[derive(Debug, Error)]
pub enum CommitError {
    #[error("genesis commit must carry a signature envelope")]
    UnsignedGenesis,

    #[error("exactly one controller must be specified, got {0}")]
    InvalidControllerCount(usize),

    #[error("model reference {model} does not point to a model stream")]
    InvalidModelReference { model: StreamId },

    #[error("commit does not link to the log tip: expected {expected}, got {got:?}")]
    Linkage {
        expected: CommitId,
        got: Option<CommitId>,
    },

    #[error("metadata is immutable after genesis: tried to change {current} to {attempted}")]
    ImmutableMetadata {
        current: serde_json::Value,
        attempted: serde_json::Value,
    },

    #[error("signature verification failed: {0}")]
    Signature(#[from] SignatureError),

    #[error("schema validation failed: {0}")]
    SchemaValidation(#[from] SchemaError),

    #[error("patch application failed: {0}")]
    PatchApplication(#[from] PatchError),

    #[error("stream load failed: {0}")]
    StreamLoad(#[from] LoadError),

    #[error("no handler registered for stream type {0}")]
    UnknownStreamType(u8),
}

/// Failures from the signature verification contract.
#[derive(Debug, Error)]
pub enum SignatureError {
    #[error("commit carries no signature envelope")]
    MissingEnvelope,

    #[error("signer {0} could not be resolved to key material")]
    UnknownSigner(String),

    #[error("envelope signer {actual} does not match expected controller {expected}")]
    WrongSigner { expected: String, actual: String },

    #[error("signature does not verify against any resolved key")]
    VerificationFailed,

    #[error("resolved key material is invalid")]
    InvalidKeyMaterial,

    #[error("signature scope does not cover stream {stream} under model {model}")]
    ScopeMismatch { stream: StreamId, model: StreamId },
}

/// Failures from the schema validation contract.
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("model {model} does not declare a schema")]
    MissingSchema { model: StreamId },

    #[error("content does not conform to schema: {0}")]
    NonConformant(String),
}

/// Failures from the generic stream loader capability.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("stream {0} not found")]
    NotFound(StreamId),

    #[error("stream load failed: {0}")]
    Unavailable(String),
}

/// Failures from the content patch engine.
///
/// Any single failing operation aborts the whole patch application.
#[derive(Debug, Error, PartialEq)]
pub enum PatchError {
    #[error("malformed patch document: {0}")]
    MalformedPatch(String),

    #[error("invalid JSON pointer: {0:?}")]
    InvalidPointer(String),

    #[error("path {0:?} does not exist")]
    PathNotFound(String),

    #[error("invalid array index {index:?} at {path:?}")]
    InvalidIndex { path: String, index: String },

    #[error("test failed at {path:?}: expected {expected}, found {actual}")]
    TestFailed {
        path: String,
        expected: serde_json::Value,
        actual: serde_json::Value,
    },

    #[error("move source {from:?} is a prefix of target {path:?}")]
    MoveIntoSelf { from: String, path: String },
}
