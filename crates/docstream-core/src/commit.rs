//! Commit: the unit of input to a state transition.
//!
//! A commit is immutable once created. A stream's history is the ordered,
//! content-addressed chain of its commits: one genesis commit, then signed
//! commits carrying patches, interleaved with anchor commits carrying
//! blockchain proofs.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::canonical::{canonical_commit_bytes, commit_id_from_bytes, signed_message};
use crate::crypto::{Blake3Hash, Ed25519Signature, Keypair};
use crate::types::{CommitId, StreamId};

/// The kind of commit, determining which transition applies it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum CommitKind {
    /// First commit in a stream; establishes controller and model binding.
    Genesis = 0,
    /// A signed content update carrying a patch.
    Signed = 1,
    /// An anchor checkpoint carrying a blockchain proof.
    Anchor = 2,
}

impl CommitKind {
    /// Convert to the wire tag.
    pub fn to_u8(self) -> u8 {
        self as u8
    }

    /// Try to parse from the wire tag.
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Genesis),
            1 => Some(Self::Signed),
            2 => Some(Self::Anchor),
            _ => None,
        }
    }
}

/// Header fields, present only on genesis commits.
///
/// Metadata is immutable after genesis: a signed commit carrying a header is
/// rejected outright.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitHeader {
    /// The identities authorized to sign commits. Exactly one is required.
    pub controllers: Vec<String>,

    /// Reference to the model stream constraining this document's content.
    pub model: StreamId,

    /// Optional instance salt, distinguishing documents with equal genesis
    /// content under the same model.
    pub unique: Option<Bytes>,
}

/// The signed portion of a commit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommitPayload {
    /// Header fields (genesis only).
    pub header: Option<CommitHeader>,

    /// Genesis content, or the patch operation list for signed commits.
    pub data: Option<serde_json::Value>,

    /// The commit this one extends. None for genesis.
    pub prev: Option<CommitId>,
}

/// Capability scope limiting what a signature authorizes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureScope {
    /// The model the signature is scoped to.
    pub model: StreamId,

    /// A specific stream, or None for any stream under the model.
    pub stream: Option<StreamId>,
}

/// A signature envelope binding a payload to a signer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignatureEnvelope {
    /// The claimed signer identity (e.g. a DID).
    pub signer: String,

    /// Ed25519 signature over the domain-prefixed canonical payload bytes.
    pub signature: Ed25519Signature,

    /// Optional capability scope, enforced at verification time.
    pub scope: Option<SignatureScope>,
}

/// Proof that a commit was anchored on an external ledger.
///
/// Opaque to the state machine beyond `block_timestamp` and presence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnchorProof {
    /// Identifier of the anchoring chain.
    pub chain_id: String,

    /// Block height of the anchoring transaction.
    pub block_number: u64,

    /// Block timestamp (Unix seconds), copied into the anchor log entry.
    pub block_timestamp: i64,

    /// Hash of the anchoring transaction.
    pub tx_hash: Blake3Hash,
}

/// A complete commit: payload plus signature envelope and/or anchor proof.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Commit {
    /// The signed portion.
    pub payload: CommitPayload,

    /// Content address of this commit.
    pub commit_id: CommitId,

    /// Signature envelope (genesis and signed commits).
    pub envelope: Option<SignatureEnvelope>,

    /// Anchor proof (anchor commits only).
    pub proof: Option<AnchorProof>,
}

impl Commit {
    /// Compute the content address from canonical bytes.
    pub fn compute_id(&self) -> CommitId {
        commit_id_from_bytes(&canonical_commit_bytes(self))
    }

    /// The commit this one extends, if any.
    pub fn prev(&self) -> Option<&CommitId> {
        self.payload.prev.as_ref()
    }

    /// Classify the commit for dispatch.
    pub fn kind(&self) -> CommitKind {
        if self.proof.is_some() {
            CommitKind::Anchor
        } else if self.payload.prev.is_none() {
            CommitKind::Genesis
        } else {
            CommitKind::Signed
        }
    }

    /// Whether this commit carries an anchor proof.
    pub fn is_anchor(&self) -> bool {
        self.proof.is_some()
    }

    /// Construct an anchor commit extending `prev` with the given proof.
    pub fn anchor(prev: CommitId, proof: AnchorProof) -> Self {
        let payload = CommitPayload {
            header: None,
            data: None,
            prev: Some(prev),
        };
        let mut commit = Commit {
            payload,
            commit_id: CommitId::from_bytes([0; 32]),
            envelope: None,
            proof: Some(proof),
        };
        commit.commit_id = commit.compute_id();
        commit
    }
}

/// One entry in a document's append-only log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Content address of the applied commit.
    pub commit_id: CommitId,

    /// Which transition produced the entry.
    pub kind: CommitKind,

    /// Anchor block timestamp (anchor entries only).
    pub timestamp: Option<i64>,
}

/// Builder for signed commits (genesis and updates).
pub struct CommitBuilder {
    header: Option<CommitHeader>,
    data: Option<serde_json::Value>,
    prev: Option<CommitId>,
    scope: Option<SignatureScope>,
}

impl CommitBuilder {
    /// Start a genesis commit for `controller` under `model`.
    pub fn genesis(controller: impl Into<String>, model: StreamId) -> Self {
        Self {
            header: Some(CommitHeader {
                controllers: vec![controller.into()],
                model,
                unique: None,
            }),
            data: None,
            prev: None,
            scope: None,
        }
    }

    /// Start a signed update commit extending `prev`.
    pub fn signed(prev: CommitId) -> Self {
        Self {
            header: None,
            data: None,
            prev: Some(prev),
            scope: None,
        }
    }

    /// Set the payload data (genesis content or patch operations).
    pub fn data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }

    /// Set the instance salt on the genesis header.
    pub fn unique(mut self, unique: impl Into<Bytes>) -> Self {
        if let Some(header) = &mut self.header {
            header.unique = Some(unique.into());
        }
        self
    }

    /// Override the controllers list. Used by tests exercising the
    /// controller-count invariant.
    pub fn controllers(mut self, controllers: Vec<String>) -> Self {
        if let Some(header) = &mut self.header {
            header.controllers = controllers;
        }
        self
    }

    /// Attach a header to a non-genesis commit. Used by tests exercising
    /// metadata immutability.
    pub fn header(mut self, header: CommitHeader) -> Self {
        self.header = Some(header);
        self
    }

    /// Restrict the signature to a capability scope.
    pub fn scope(mut self, scope: SignatureScope) -> Self {
        self.scope = Some(scope);
        self
    }

    /// Sign the payload as `signer` and produce the commit.
    pub fn sign(self, keypair: &Keypair, signer: impl Into<String>) -> Commit {
        let payload = CommitPayload {
            header: self.header,
            data: self.data,
            prev: self.prev,
        };

        let signature = keypair.sign(&signed_message(&payload));
        let envelope = SignatureEnvelope {
            signer: signer.into(),
            signature,
            scope: self.scope,
        };

        let mut commit = Commit {
            payload,
            commit_id: CommitId::from_bytes([0; 32]),
            envelope: Some(envelope),
            proof: None,
        };
        commit.commit_id = commit.compute_id();
        commit
    }

    /// Produce the commit without a signature envelope. Used by tests
    /// exercising the unsigned-genesis invariant.
    pub fn build_unsigned(self) -> Commit {
        let payload = CommitPayload {
            header: self.header,
            data: self.data,
            prev: self.prev,
        };
        let mut commit = Commit {
            payload,
            commit_id: CommitId::from_bytes([0; 32]),
            envelope: None,
            proof: None,
        };
        commit.commit_id = commit.compute_id();
        commit
    }
}
