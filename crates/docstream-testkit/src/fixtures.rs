//! Test fixtures and helpers.
//!
//! Common setup code for integration tests.

use std::sync::Arc;

use serde_json::{json, Value};

use docstream_core::{
    AnchorProof, Blake3Hash, Commit, CommitBuilder, CommitId, Context, DocumentHandler,
    EnvelopeVerifier, Keypair, StreamId, StreamType,
};

use crate::collaborators::{BasicSchemaValidator, StaticKeyResolver, StaticStreamLoader};

/// The controller identity used by default in fixtures.
pub const TEST_CONTROLLER: &str = "did:x";

/// A document-stream fixture: one controller with a registered key, one
/// model stream with a permissive object schema, and a context wired up
/// with the provided verifier and loader.
pub struct TestFixture {
    pub keypair: Keypair,
    pub model: StreamId,
    pub loader: Arc<StaticStreamLoader>,
    pub context: Context,
}

impl TestFixture {
    /// Create a fixture with a deterministic keypair.
    pub fn new() -> Self {
        Self::with_seed([0x42; 32])
    }

    /// Create with a deterministic keypair from seed.
    pub fn with_seed(seed: [u8; 32]) -> Self {
        let keypair = Keypair::from_seed(&seed);
        let model = StreamId::from_genesis(StreamType::Model, b"fixture-model-genesis");

        let loader = Arc::new(StaticStreamLoader::new());
        loader.insert(
            model,
            json!({
                "name": "FixtureModel",
                "schema": {"type": "object"}
            }),
        );

        let resolver = StaticKeyResolver::new().with_key(TEST_CONTROLLER, keypair.public_key());
        let context = Context::new(
            Arc::new(EnvelopeVerifier::new(Arc::new(resolver))),
            loader.clone(),
        );

        Self {
            keypair,
            model,
            loader,
            context,
        }
    }

    /// A handler wired to the structural schema validator.
    pub fn handler(&self) -> DocumentHandler {
        DocumentHandler::new(Arc::new(BasicSchemaValidator))
    }

    /// Register another model stream with the given content.
    pub fn add_model(&self, seed: &[u8], content: Value) -> StreamId {
        let model = StreamId::from_genesis(StreamType::Model, seed);
        self.loader.insert(model, content);
        model
    }

    /// Create a signed genesis commit with the given content.
    pub fn make_genesis(&self, content: Value) -> Commit {
        CommitBuilder::genesis(TEST_CONTROLLER, self.model)
            .data(content)
            .sign(&self.keypair, TEST_CONTROLLER)
    }

    /// Create a signed update commit carrying the given patch.
    pub fn make_signed(&self, prev: CommitId, patch: Value) -> Commit {
        CommitBuilder::signed(prev)
            .data(patch)
            .sign(&self.keypair, TEST_CONTROLLER)
    }

    /// Create an anchor commit at the given block timestamp.
    pub fn make_anchor(&self, prev: CommitId, block_timestamp: i64) -> Commit {
        Commit::anchor(
            prev,
            AnchorProof {
                chain_id: "eip155:1".to_string(),
                block_number: 1,
                block_timestamp,
                tx_hash: Blake3Hash::hash(&block_timestamp.to_be_bytes()),
            },
        )
    }
}

impl Default for TestFixture {
    fn default() -> Self {
        Self::new()
    }
}

/// Create multiple fixtures with distinct keys for multi-party tests.
pub fn multi_party_fixtures(count: usize) -> Vec<TestFixture> {
    (0..count)
        .map(|i| {
            let mut seed = [0u8; 32];
            seed[0] = i as u8;
            TestFixture::with_seed(seed)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use docstream_core::CommitKind;

    #[test]
    fn test_fixture_genesis_commit() {
        let fixture = TestFixture::new();
        let commit = fixture.make_genesis(json!({"a": 1}));

        assert_eq!(commit.kind(), CommitKind::Genesis);
        assert!(commit.envelope.is_some());
    }

    #[test]
    fn test_fixture_chain() {
        let fixture = TestFixture::new();

        let genesis = fixture.make_genesis(json!({"a": 1}));
        let signed = fixture.make_signed(
            genesis.commit_id,
            json!([{"op": "replace", "path": "/a", "value": 2}]),
        );
        let anchor = fixture.make_anchor(signed.commit_id, 1_700_000_000);

        assert_eq!(signed.prev(), Some(&genesis.commit_id));
        assert_eq!(anchor.prev(), Some(&signed.commit_id));
        assert!(anchor.is_anchor());
    }

    #[test]
    fn test_multi_party_distinct_keys() {
        let parties = multi_party_fixtures(3);
        let pks: Vec<_> = parties.iter().map(|p| p.keypair.public_key()).collect();
        assert_ne!(pks[0], pks[1]);
        assert_ne!(pks[1], pks[2]);
        assert_ne!(pks[0], pks[2]);
    }
}
