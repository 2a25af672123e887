//! The commit state machine: genesis, signed, and anchor transitions.
//!
//! `apply_commit` is a pure function of `(prior state, commit, context)`.
//! Every transition either returns a freshly constructed state or a typed
//! error; a failed application leaves nothing behind and callers must treat
//! it as a no-op. Per-document ordering is enforced structurally: a commit
//! is rejected unless it extends the exact log tip it was built against.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use crate::canonical::canonical_payload_bytes;
use crate::commit::{AnchorProof, Commit, CommitKind, LogEntry};
use crate::context::{Context, SchemaValidator};
use crate::error::{CommitError, SchemaError};
use crate::patch::{apply_patch, parse_patch};
use crate::state::{
    AnchorStatus, DocumentState, DocumentMetadata, PendingUpdate, SignatureStatus,
};
use crate::types::{StreamId, StreamType};

/// A stream-type capability: one handler per stream type, selected through
/// the [`HandlerRegistry`] by wire tag.
#[async_trait]
pub trait StreamHandler: Send + Sync {
    /// The stream-type tag this handler serves.
    fn type_tag(&self) -> StreamType;

    /// Human-readable stream-type name.
    fn display_name(&self) -> &'static str;

    /// Apply one commit on top of an optional prior state.
    async fn apply_commit(
        &self,
        commit: &Commit,
        context: &Context,
        prior: Option<&DocumentState>,
    ) -> Result<DocumentState, CommitError>;
}

/// Registry of stream handlers keyed by type tag.
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: HashMap<u8, Arc<dyn StreamHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler under its own type tag.
    pub fn register(&mut self, handler: Arc<dyn StreamHandler>) {
        self.handlers.insert(handler.type_tag().to_u8(), handler);
    }

    /// Look up the handler for a stream type tag.
    pub fn handler_for(&self, tag: u8) -> Result<&Arc<dyn StreamHandler>, CommitError> {
        self.handlers
            .get(&tag)
            .ok_or(CommitError::UnknownStreamType(tag))
    }

    /// Dispatch a commit to the handler for the given stream type.
    pub async fn apply_commit(
        &self,
        tag: u8,
        commit: &Commit,
        context: &Context,
        prior: Option<&DocumentState>,
    ) -> Result<DocumentState, CommitError> {
        self.handler_for(tag)?
            .apply_commit(commit, context, prior)
            .await
    }
}

/// Handler for schema-constrained document streams.
pub struct DocumentHandler {
    validator: Arc<dyn SchemaValidator>,
}

impl DocumentHandler {
    pub fn new(validator: Arc<dyn SchemaValidator>) -> Self {
        Self { validator }
    }

    /// Apply a genesis commit, producing the stream's first state.
    async fn apply_genesis(
        &self,
        commit: &Commit,
        context: &Context,
    ) -> Result<DocumentState, CommitError> {
        if commit.envelope.is_none() {
            return Err(CommitError::UnsignedGenesis);
        }

        let stream_id = StreamId::from_genesis(
            StreamType::Document,
            &canonical_payload_bytes(&commit.payload),
        );

        // A missing header carries zero controllers.
        let header = match &commit.payload.header {
            Some(header) if header.controllers.len() == 1 => header,
            Some(header) => {
                return Err(CommitError::InvalidControllerCount(header.controllers.len()))
            }
            None => return Err(CommitError::InvalidControllerCount(0)),
        };

        let model = header.model;
        if model.stream_type() != StreamType::Model {
            return Err(CommitError::InvalidModelReference { model });
        }

        context
            .verifier
            .verify(commit, &header.controllers[0], &model, &stream_id)
            .await?;

        let content = commit
            .payload
            .data
            .clone()
            .unwrap_or_else(|| Value::Object(Default::default()));

        let state = DocumentState {
            stream_id,
            content,
            metadata: DocumentMetadata::from_header(header),
            signature_status: SignatureStatus::Signed,
            anchor_status: AnchorStatus::NotRequested,
            log: vec![LogEntry {
                commit_id: commit.commit_id,
                kind: CommitKind::Genesis,
                timestamp: None,
            }],
            next: None,
            anchor_proof: None,
            anchor_scheduled_for: None,
        };

        // Only a schema-conformant state is ever returned.
        self.validate_content(context, &model, &state.content)
            .await?;

        debug!(stream = %stream_id, "applied genesis commit");
        Ok(state)
    }

    /// Apply a signed update commit on top of a prior state.
    async fn apply_signed(
        &self,
        commit: &Commit,
        prior: &DocumentState,
        context: &Context,
    ) -> Result<DocumentState, CommitError> {
        let tip = prior.tip();
        if commit.prev() != Some(&tip) {
            return Err(CommitError::Linkage {
                expected: tip,
                got: commit.payload.prev,
            });
        }

        if let Some(header) = &commit.payload.header {
            return Err(CommitError::ImmutableMetadata {
                current: serde_json::to_value(&prior.metadata).unwrap_or(Value::Null),
                attempted: serde_json::to_value(header).unwrap_or(Value::Null),
            });
        }

        // Always verify against the existing metadata, never against
        // anything the incoming payload claims.
        let metadata = &prior.metadata;
        context
            .verifier
            .verify(
                commit,
                metadata.controller(),
                &metadata.model,
                &prior.stream_id,
            )
            .await?;

        let patch_data = commit.payload.data.as_ref().ok_or_else(|| {
            CommitError::PatchApplication(crate::error::PatchError::MalformedPatch(
                "signed commit carries no patch".into(),
            ))
        })?;
        let ops = parse_patch(patch_data)?;
        let new_content = apply_patch(prior.base_content(), &ops)?;

        self.validate_content(context, &metadata.model, &new_content)
            .await?;

        let mut state = prior.clone();
        state.signature_status = SignatureStatus::Signed;
        state.anchor_status = AnchorStatus::NotRequested;
        state.log.push(LogEntry {
            commit_id: commit.commit_id,
            kind: CommitKind::Signed,
            timestamp: None,
        });
        state.next = Some(PendingUpdate {
            content: new_content,
            metadata: metadata.clone(),
        });

        debug!(stream = %prior.stream_id, log_len = state.log.len(), "applied signed commit");
        Ok(state)
    }

    /// Apply an anchor commit, promoting any pending update.
    ///
    /// Promoted content is not re-validated here: it was validated when it
    /// became `next`, and anchoring must depend on the log alone.
    fn apply_anchor(
        &self,
        commit: &Commit,
        proof: &AnchorProof,
        prior: &DocumentState,
    ) -> Result<DocumentState, CommitError> {
        let tip = prior.tip();
        if commit.prev() != Some(&tip) {
            return Err(CommitError::Linkage {
                expected: tip,
                got: commit.payload.prev,
            });
        }

        let mut state = prior.clone();
        state.log.push(LogEntry {
            commit_id: commit.commit_id,
            kind: CommitKind::Anchor,
            timestamp: Some(proof.block_timestamp),
        });

        if let Some(pending) = state.next.take() {
            state.content = pending.content;
        }
        state.anchor_scheduled_for = None;
        state.anchor_status = AnchorStatus::Anchored;
        state.anchor_proof = Some(proof.clone());

        debug!(
            stream = %prior.stream_id,
            block_timestamp = proof.block_timestamp,
            "applied anchor commit"
        );
        Ok(state)
    }

    /// Load the model stream, extract its schema, and forward both to the
    /// schema validation contract.
    async fn validate_content(
        &self,
        context: &Context,
        model: &StreamId,
        content: &Value,
    ) -> Result<(), CommitError> {
        let loaded = context.loader.load_stream(model).await?;
        let schema = loaded
            .schema()
            .ok_or(SchemaError::MissingSchema { model: *model })?;
        self.validator.validate(content, schema)?;
        Ok(())
    }
}

#[async_trait]
impl StreamHandler for DocumentHandler {
    fn type_tag(&self) -> StreamType {
        StreamType::Document
    }

    fn display_name(&self) -> &'static str {
        "document"
    }

    async fn apply_commit(
        &self,
        commit: &Commit,
        context: &Context,
        prior: Option<&DocumentState>,
    ) -> Result<DocumentState, CommitError> {
        match prior {
            None => self.apply_genesis(commit, context).await,
            Some(state) => match &commit.proof {
                Some(proof) => self.apply_anchor(commit, proof, state),
                None => self.apply_signed(commit, state, context).await,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commit::{CommitBuilder, CommitHeader};
    use crate::context::{KeyResolver, LoadedStream, StreamLoader};
    use crate::crypto::{Ed25519PublicKey, Keypair};
    use crate::error::{LoadError, SignatureError};
    use crate::verifier::EnvelopeVerifier;
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::RwLock;

    struct SingleKeyResolver {
        signer: String,
        key: Ed25519PublicKey,
    }

    #[async_trait]
    impl KeyResolver for SingleKeyResolver {
        async fn resolve(&self, signer: &str) -> Result<Vec<Ed25519PublicKey>, SignatureError> {
            if signer == self.signer {
                Ok(vec![self.key])
            } else {
                Err(SignatureError::UnknownSigner(signer.to_string()))
            }
        }
    }

    struct FixedLoader {
        streams: RwLock<HashMap<StreamId, Value>>,
    }

    #[async_trait]
    impl StreamLoader for FixedLoader {
        async fn load_stream(&self, stream_id: &StreamId) -> Result<LoadedStream, LoadError> {
            self.streams
                .read()
                .unwrap()
                .get(stream_id)
                .map(|content| LoadedStream {
                    stream_id: *stream_id,
                    content: content.clone(),
                })
                .ok_or(LoadError::NotFound(*stream_id))
        }
    }

    struct AcceptAll;

    impl SchemaValidator for AcceptAll {
        fn validate(&self, _content: &Value, _schema: &Value) -> Result<(), SchemaError> {
            Ok(())
        }
    }

    struct RejectAll;

    impl SchemaValidator for RejectAll {
        fn validate(&self, _content: &Value, _schema: &Value) -> Result<(), SchemaError> {
            Err(SchemaError::NonConformant("rejected by test".into()))
        }
    }

    struct Fixture {
        keypair: Keypair,
        model: StreamId,
        context: Context,
    }

    fn fixture() -> Fixture {
        fixture_with_validator(Arc::new(AcceptAll)).0
    }

    fn fixture_with_validator(
        validator: Arc<dyn SchemaValidator>,
    ) -> (Fixture, DocumentHandler) {
        let keypair = Keypair::from_seed(&[0x42; 32]);
        let model = StreamId::from_genesis(StreamType::Model, b"model-genesis");

        let mut streams = HashMap::new();
        streams.insert(model, json!({"name": "TestModel", "schema": {"type": "object"}}));

        let resolver = SingleKeyResolver {
            signer: "did:x".into(),
            key: keypair.public_key(),
        };
        let context = Context::new(
            Arc::new(EnvelopeVerifier::new(Arc::new(resolver))),
            Arc::new(FixedLoader {
                streams: RwLock::new(streams),
            }),
        );

        (
            Fixture {
                keypair,
                model,
                context,
            },
            DocumentHandler::new(validator),
        )
    }

    fn handler() -> DocumentHandler {
        DocumentHandler::new(Arc::new(AcceptAll))
    }

    async fn genesis_state(fx: &Fixture, h: &DocumentHandler) -> DocumentState {
        let commit = CommitBuilder::genesis("did:x", fx.model)
            .data(json!({"a": 1}))
            .sign(&fx.keypair, "did:x");
        h.apply_commit(&commit, &fx.context, None).await.unwrap()
    }

    #[tokio::test]
    async fn test_genesis_builds_initial_state() {
        let fx = fixture();
        let h = handler();
        let state = genesis_state(&fx, &h).await;

        assert_eq!(state.content, json!({"a": 1}));
        assert_eq!(state.anchor_status, AnchorStatus::NotRequested);
        assert_eq!(state.signature_status, SignatureStatus::Signed);
        assert_eq!(state.log.len(), 1);
        assert_eq!(state.log[0].kind, CommitKind::Genesis);
        assert_eq!(state.metadata.controller(), "did:x");
        assert!(state.next.is_none());
    }

    #[tokio::test]
    async fn test_unsigned_genesis_rejected() {
        let fx = fixture();
        let commit = CommitBuilder::genesis("did:x", fx.model)
            .data(json!({"a": 1}))
            .build_unsigned();

        let result = handler().apply_commit(&commit, &fx.context, None).await;
        assert!(matches!(result, Err(CommitError::UnsignedGenesis)));
    }

    #[tokio::test]
    async fn test_genesis_controller_count_enforced() {
        let fx = fixture();

        let zero = CommitBuilder::genesis("did:x", fx.model)
            .controllers(vec![])
            .data(json!({"a": 1}))
            .sign(&fx.keypair, "did:x");
        let result = handler().apply_commit(&zero, &fx.context, None).await;
        assert!(matches!(result, Err(CommitError::InvalidControllerCount(0))));

        let two = CommitBuilder::genesis("did:x", fx.model)
            .controllers(vec!["did:x".into(), "did:y".into()])
            .data(json!({"a": 1}))
            .sign(&fx.keypair, "did:x");
        let result = handler().apply_commit(&two, &fx.context, None).await;
        assert!(matches!(result, Err(CommitError::InvalidControllerCount(2))));
    }

    #[tokio::test]
    async fn test_genesis_model_must_be_model_stream() {
        let fx = fixture();
        let not_a_model = StreamId::from_genesis(StreamType::Document, b"not-a-model");
        let commit = CommitBuilder::genesis("did:x", not_a_model)
            .data(json!({"a": 1}))
            .sign(&fx.keypair, "did:x");

        let result = handler().apply_commit(&commit, &fx.context, None).await;
        assert!(matches!(
            result,
            Err(CommitError::InvalidModelReference { .. })
        ));
    }

    #[tokio::test]
    async fn test_genesis_defaults_to_empty_content() {
        let fx = fixture();
        let commit = CommitBuilder::genesis("did:x", fx.model).sign(&fx.keypair, "did:x");
        let state = handler()
            .apply_commit(&commit, &fx.context, None)
            .await
            .unwrap();
        assert_eq!(state.content, json!({}));
    }

    #[tokio::test]
    async fn test_genesis_schema_failure_yields_no_state() {
        let (fx, h) = fixture_with_validator(Arc::new(RejectAll));
        let commit = CommitBuilder::genesis("did:x", fx.model)
            .data(json!({"a": 1}))
            .sign(&fx.keypair, "did:x");

        let result = h.apply_commit(&commit, &fx.context, None).await;
        assert!(matches!(result, Err(CommitError::SchemaValidation(_))));
    }

    #[tokio::test]
    async fn test_signed_commit_stages_pending_update() {
        let fx = fixture();
        let h = handler();
        let state = genesis_state(&fx, &h).await;

        let commit = CommitBuilder::signed(state.tip())
            .data(json!([{"op": "replace", "path": "/a", "value": 2}]))
            .sign(&fx.keypair, "did:x");
        let next = h
            .apply_commit(&commit, &fx.context, Some(&state))
            .await
            .unwrap();

        // Committed content unchanged; the update is staged in `next`.
        assert_eq!(next.content, json!({"a": 1}));
        assert_eq!(next.next.as_ref().unwrap().content, json!({"a": 2}));
        assert_eq!(next.log.len(), 2);
        assert_eq!(next.log[1].kind, CommitKind::Signed);
        assert_eq!(next.anchor_status, AnchorStatus::NotRequested);

        // Prior state untouched.
        assert_eq!(state.log.len(), 1);
        assert!(state.next.is_none());
    }

    #[tokio::test]
    async fn test_signed_commit_header_rejected() {
        let fx = fixture();
        let h = handler();
        let state = genesis_state(&fx, &h).await;

        let commit = CommitBuilder::signed(state.tip())
            .header(CommitHeader {
                controllers: vec!["did:x".into()],
                model: fx.model,
                unique: None,
            })
            .data(json!([{"op": "replace", "path": "/a", "value": 2}]))
            .sign(&fx.keypair, "did:x");

        let result = h.apply_commit(&commit, &fx.context, Some(&state)).await;
        assert!(matches!(result, Err(CommitError::ImmutableMetadata { .. })));
    }

    #[tokio::test]
    async fn test_signed_commit_linkage_enforced() {
        let fx = fixture();
        let h = handler();
        let state = genesis_state(&fx, &h).await;

        let stale = crate::types::CommitId::from_bytes([0xee; 32]);
        let commit = CommitBuilder::signed(stale)
            .data(json!([{"op": "replace", "path": "/a", "value": 2}]))
            .sign(&fx.keypair, "did:x");

        let result = h.apply_commit(&commit, &fx.context, Some(&state)).await;
        assert!(matches!(result, Err(CommitError::Linkage { .. })));
    }

    #[tokio::test]
    async fn test_signed_commit_wrong_key_rejected() {
        let fx = fixture();
        let h = handler();
        let state = genesis_state(&fx, &h).await;

        let intruder = Keypair::from_seed(&[0x99; 32]);
        let commit = CommitBuilder::signed(state.tip())
            .data(json!([{"op": "replace", "path": "/a", "value": 2}]))
            .sign(&intruder, "did:x");

        let result = h.apply_commit(&commit, &fx.context, Some(&state)).await;
        assert!(matches!(result, Err(CommitError::Signature(_))));
    }

    #[tokio::test]
    async fn test_signed_commit_patch_failure_is_atomic() {
        let fx = fixture();
        let h = handler();
        let state = genesis_state(&fx, &h).await;

        let commit = CommitBuilder::signed(state.tip())
            .data(json!([{"op": "remove", "path": "/missing"}]))
            .sign(&fx.keypair, "did:x");

        let result = h.apply_commit(&commit, &fx.context, Some(&state)).await;
        assert!(matches!(result, Err(CommitError::PatchApplication(_))));
        assert_eq!(state.content, json!({"a": 1}));
        assert!(state.next.is_none());
    }

    #[tokio::test]
    async fn test_anchor_promotes_pending_content() {
        let fx = fixture();
        let h = handler();
        let state = genesis_state(&fx, &h).await;

        let signed = CommitBuilder::signed(state.tip())
            .data(json!([{"op": "replace", "path": "/a", "value": 2}]))
            .sign(&fx.keypair, "did:x");
        let pending = h
            .apply_commit(&signed, &fx.context, Some(&state))
            .await
            .unwrap();

        let proof = AnchorProof {
            chain_id: "eip155:1".into(),
            block_number: 77,
            block_timestamp: 1_700_000_000,
            tx_hash: crate::crypto::Blake3Hash::hash(b"tx"),
        };
        let anchor = Commit::anchor(pending.tip(), proof);
        let anchored = h
            .apply_commit(&anchor, &fx.context, Some(&pending))
            .await
            .unwrap();

        assert_eq!(anchored.content, json!({"a": 2}));
        assert!(anchored.next.is_none());
        assert_eq!(anchored.anchor_status, AnchorStatus::Anchored);
        assert_eq!(
            anchored.anchor_proof.as_ref().unwrap().block_timestamp,
            1_700_000_000
        );
        assert_eq!(anchored.log.len(), 3);
        assert_eq!(anchored.log[2].kind, CommitKind::Anchor);
        assert_eq!(anchored.log[2].timestamp, Some(1_700_000_000));
    }

    #[tokio::test]
    async fn test_anchor_without_pending_keeps_content() {
        let fx = fixture();
        let h = handler();
        let state = genesis_state(&fx, &h).await;

        let proof = AnchorProof {
            chain_id: "eip155:1".into(),
            block_number: 78,
            block_timestamp: 1_700_000_100,
            tx_hash: crate::crypto::Blake3Hash::hash(b"tx2"),
        };
        let anchor = Commit::anchor(state.tip(), proof);
        let anchored = h
            .apply_commit(&anchor, &fx.context, Some(&state))
            .await
            .unwrap();

        assert_eq!(anchored.content, json!({"a": 1}));
        assert_eq!(anchored.anchor_status, AnchorStatus::Anchored);
        assert!(anchored.next.is_none());
    }

    #[tokio::test]
    async fn test_anchor_linkage_enforced() {
        let fx = fixture();
        let h = handler();
        let state = genesis_state(&fx, &h).await;

        let proof = AnchorProof {
            chain_id: "eip155:1".into(),
            block_number: 79,
            block_timestamp: 1_700_000_200,
            tx_hash: crate::crypto::Blake3Hash::hash(b"tx3"),
        };
        let anchor = Commit::anchor(crate::types::CommitId::from_bytes([0xdd; 32]), proof);

        let result = h.apply_commit(&anchor, &fx.context, Some(&state)).await;
        assert!(matches!(result, Err(CommitError::Linkage { .. })));
    }

    #[tokio::test]
    async fn test_anchored_stream_accepts_new_signed_commits() {
        let fx = fixture();
        let h = handler();
        let state = genesis_state(&fx, &h).await;

        let proof = AnchorProof {
            chain_id: "eip155:1".into(),
            block_number: 80,
            block_timestamp: 1_700_000_300,
            tx_hash: crate::crypto::Blake3Hash::hash(b"tx4"),
        };
        let anchored = h
            .apply_commit(&Commit::anchor(state.tip(), proof), &fx.context, Some(&state))
            .await
            .unwrap();

        let signed = CommitBuilder::signed(anchored.tip())
            .data(json!([{"op": "replace", "path": "/a", "value": 3}]))
            .sign(&fx.keypair, "did:x");
        let next = h
            .apply_commit(&signed, &fx.context, Some(&anchored))
            .await
            .unwrap();

        assert_eq!(next.anchor_status, AnchorStatus::NotRequested);
        assert_eq!(next.next.as_ref().unwrap().content, json!({"a": 3}));
        assert_eq!(next.log.len(), 3);
    }

    #[tokio::test]
    async fn test_registry_dispatch() {
        let fx = fixture();
        let mut registry = HandlerRegistry::new();
        registry.register(Arc::new(handler()));

        let commit = CommitBuilder::genesis("did:x", fx.model)
            .data(json!({"a": 1}))
            .sign(&fx.keypair, "did:x");

        let state = registry
            .apply_commit(StreamType::Document.to_u8(), &commit, &fx.context, None)
            .await
            .unwrap();
        assert_eq!(state.content, json!({"a": 1}));

        let result = registry
            .apply_commit(9, &commit, &fx.context, None)
            .await;
        assert!(matches!(result, Err(CommitError::UnknownStreamType(9))));
    }

    #[tokio::test]
    async fn test_model_load_failure_surfaces() {
        let fx = fixture();
        // Model id that the loader does not know.
        let unknown_model = StreamId::from_genesis(StreamType::Model, b"unknown");
        let commit = CommitBuilder::genesis("did:x", unknown_model)
            .data(json!({"a": 1}))
            .sign(&fx.keypair, "did:x");

        let result = handler().apply_commit(&commit, &fx.context, None).await;
        assert!(matches!(result, Err(CommitError::StreamLoad(_))));
    }
}
