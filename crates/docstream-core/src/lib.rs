//! # Docstream Core
//!
//! The commit-application state machine for versioned, schema-constrained
//! document streams.
//!
//! A document stream is an append-only log of commits. Applying a commit is
//! a pure, all-or-nothing transition: given an optional prior state and a
//! [`Context`] of capability contracts, it yields either a fresh
//! [`DocumentState`] or a typed [`CommitError`]. This crate contains no I/O
//! of its own; identity verification, stream loading, and schema validation
//! are injected through traits.
//!
//! ## Key Types
//!
//! - [`Commit`] - A genesis, signed, or anchor entry in the log
//! - [`CommitId`] / [`StreamId`] - Content-addressed identifiers (Blake3)
//! - [`DocumentState`] - The immutable materialized state of a stream
//! - [`DocumentHandler`] - The state machine for document streams
//! - [`HandlerRegistry`] - Dispatch by stream type tag
//!
//! ## Canonicalization
//!
//! Identifiers and signing messages derive from deterministic CBOR. See the
//! [`canonical`] module.

pub mod canonical;
pub mod commit;
pub mod context;
pub mod crypto;
pub mod error;
pub mod handler;
pub mod patch;
pub mod state;
pub mod types;
pub mod verifier;

pub use canonical::{canonical_commit_bytes, canonical_payload_bytes, signed_message};
pub use commit::{
    AnchorProof, Commit, CommitBuilder, CommitHeader, CommitKind, CommitPayload, LogEntry,
    SignatureEnvelope, SignatureScope,
};
pub use context::{Context, IdentityVerifier, KeyResolver, LoadedStream, SchemaValidator, StreamLoader};
pub use crypto::{Blake3Hash, Ed25519PublicKey, Ed25519Signature, Keypair};
pub use error::{CommitError, LoadError, PatchError, SchemaError, SignatureError};
pub use handler::{DocumentHandler, HandlerRegistry, StreamHandler};
pub use patch::{apply_patch, parse_patch, PatchOp};
pub use state::{
    AnchorStatus, DocumentMetadata, DocumentState, PendingUpdate, SignatureStatus,
};
pub use types::{CommitId, StreamId, StreamType};
pub use verifier::EnvelopeVerifier;
