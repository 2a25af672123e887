//! Document state: the materialized value of a stream after replaying its
//! log.
//!
//! A `DocumentState` is an immutable value. Transitions never mutate a prior
//! state in place; each application constructs a fresh value via structural
//! copy with targeted field replacement, so multiple callers can hold the
//! same prior state safely.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::commit::{AnchorProof, CommitHeader, LogEntry};
use crate::types::{CommitId, StreamId};

/// Whether the latest applied commit carried a valid signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SignatureStatus {
    Unsigned,
    Signed,
}

/// Anchoring progress of the stream tip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AnchorStatus {
    /// No anchor has been requested for the current tip.
    NotRequested,
    /// The tip is confirmed by an anchor proof.
    Anchored,
}

/// Stream metadata, fixed at genesis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    /// The identity authorized to sign commits. Exactly one.
    pub controllers: Vec<String>,

    /// The model stream constraining content shape.
    pub model: StreamId,

    /// Instance salt from the genesis header, if any.
    pub unique: Option<Bytes>,
}

impl DocumentMetadata {
    /// Build metadata from a genesis header.
    pub fn from_header(header: &CommitHeader) -> Self {
        Self {
            controllers: header.controllers.clone(),
            model: header.model,
            unique: header.unique.clone(),
        }
    }

    /// The single controller.
    pub fn controller(&self) -> &str {
        &self.controllers[0]
    }
}

/// A signed-but-unanchored content update, promoted to `content` when the
/// next anchor commit lands.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingUpdate {
    /// The patched content, already schema-validated.
    pub content: serde_json::Value,

    /// Metadata snapshot (unchanged from genesis).
    pub metadata: DocumentMetadata,
}

/// The materialized state of a document stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentState {
    /// The stream's content address, derived at genesis.
    pub stream_id: StreamId,

    /// The committed content value.
    pub content: serde_json::Value,

    /// Metadata fixed at genesis.
    pub metadata: DocumentMetadata,

    /// Signature status of the latest applied commit.
    pub signature_status: SignatureStatus,

    /// Anchoring progress of the tip.
    pub anchor_status: AnchorStatus,

    /// The append-only, content-addressed log.
    pub log: Vec<LogEntry>,

    /// Signed content awaiting anchoring, if any.
    pub next: Option<PendingUpdate>,

    /// Proof from the most recent anchor transition.
    pub anchor_proof: Option<AnchorProof>,

    /// When an anchor was scheduled for the tip, if the surrounding system
    /// recorded one. Cleared on anchor.
    pub anchor_scheduled_for: Option<i64>,
}

impl DocumentState {
    /// The current log tip.
    ///
    /// The log is never empty: every state starts from a genesis entry.
    pub fn tip(&self) -> CommitId {
        self.log
            .last()
            .map(|entry| entry.commit_id)
            .unwrap_or_else(|| CommitId::from_bytes([0; 32]))
    }

    /// The content a new patch applies on top of: the pending update when
    /// one exists, the committed content otherwise.
    pub fn base_content(&self) -> &serde_json::Value {
        self.next
            .as_ref()
            .map(|pending| &pending.content)
            .unwrap_or(&self.content)
    }

    /// Whether the tip is anchored.
    pub fn is_anchored(&self) -> bool {
        self.anchor_status == AnchorStatus::Anchored
    }

    /// Whether a signed update is awaiting anchoring.
    pub fn has_pending(&self) -> bool {
        self.next.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commit::CommitKind;
    use crate::types::StreamType;
    use serde_json::json;

    fn sample_state() -> DocumentState {
        let model = StreamId::from_genesis(StreamType::Model, b"model");
        DocumentState {
            stream_id: StreamId::from_genesis(StreamType::Document, b"doc"),
            content: json!({"a": 1}),
            metadata: DocumentMetadata {
                controllers: vec!["did:x".into()],
                model,
                unique: None,
            },
            signature_status: SignatureStatus::Signed,
            anchor_status: AnchorStatus::NotRequested,
            log: vec![LogEntry {
                commit_id: CommitId::from_bytes([0x01; 32]),
                kind: CommitKind::Genesis,
                timestamp: None,
            }],
            next: None,
            anchor_proof: None,
            anchor_scheduled_for: None,
        }
    }

    #[test]
    fn test_tip_is_last_log_entry() {
        let mut state = sample_state();
        assert_eq!(state.tip(), CommitId::from_bytes([0x01; 32]));

        state.log.push(LogEntry {
            commit_id: CommitId::from_bytes([0x02; 32]),
            kind: CommitKind::Signed,
            timestamp: None,
        });
        assert_eq!(state.tip(), CommitId::from_bytes([0x02; 32]));
    }

    #[test]
    fn test_base_content_prefers_pending() {
        let mut state = sample_state();
        assert_eq!(state.base_content(), &json!({"a": 1}));

        state.next = Some(PendingUpdate {
            content: json!({"a": 2}),
            metadata: state.metadata.clone(),
        });
        assert_eq!(state.base_content(), &json!({"a": 2}));
    }

    #[test]
    fn test_controller_accessor() {
        let state = sample_state();
        assert_eq!(state.metadata.controller(), "did:x");
    }
}
