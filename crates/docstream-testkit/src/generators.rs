//! Proptest generators for property-based testing.

use proptest::prelude::*;
use serde_json::{Map, Value};

use docstream_core::{Blake3Hash, CommitId, Keypair, StreamId, StreamType};

/// Generate a random keypair.
pub fn keypair() -> impl Strategy<Value = Keypair> {
    any::<[u8; 32]>().prop_map(|seed| Keypair::from_seed(&seed))
}

/// Generate a random CommitId.
pub fn commit_id() -> impl Strategy<Value = CommitId> {
    any::<[u8; 32]>().prop_map(CommitId::from_bytes)
}

/// Generate a random Blake3Hash.
pub fn blake3_hash() -> impl Strategy<Value = Blake3Hash> {
    any::<[u8; 32]>().prop_map(Blake3Hash)
}

/// Generate a random StreamType.
pub fn stream_type() -> impl Strategy<Value = StreamType> {
    prop_oneof![Just(StreamType::Model), Just(StreamType::Document)]
}

/// Generate a random StreamId.
pub fn stream_id() -> impl Strategy<Value = StreamId> {
    (stream_type(), any::<[u8; 32]>())
        .prop_map(|(ty, hash)| StreamId::new(ty, Blake3Hash(hash)))
}

/// Generate a controller identity.
pub fn controller() -> impl Strategy<Value = String> {
    "did:key:[a-z0-9]{8,16}".prop_map(String::from)
}

/// Generate a JSON scalar.
pub fn json_scalar() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(|n| Value::Number(n.into())),
        "[a-zA-Z0-9 ]{0,20}".prop_map(Value::String),
    ]
}

/// Generate a flat JSON object suitable as document content.
pub fn json_content() -> impl Strategy<Value = Value> {
    prop::collection::btree_map("[a-z]{1,8}", json_scalar(), 0..8).prop_map(|fields| {
        Value::Object(fields.into_iter().collect::<Map<String, Value>>())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use docstream_core::{canonical_payload_bytes, CommitBuilder};

    proptest! {
        #[test]
        fn test_commit_id_deterministic(seed in any::<[u8; 32]>(), content in json_content()) {
            let kp = Keypair::from_seed(&seed);
            let model = StreamId::from_genesis(StreamType::Model, b"model");

            let c1 = CommitBuilder::genesis("did:x", model)
                .data(content.clone())
                .sign(&kp, "did:x");
            let c2 = CommitBuilder::genesis("did:x", model)
                .data(content)
                .sign(&kp, "did:x");

            prop_assert_eq!(c1.commit_id, c2.commit_id);
        }

        #[test]
        fn test_payload_bytes_deterministic(content in json_content(), signer in controller()) {
            let kp = Keypair::from_seed(&[7u8; 32]);
            let model = StreamId::from_genesis(StreamType::Model, b"model");

            let c1 = CommitBuilder::genesis(signer.clone(), model)
                .data(content.clone())
                .sign(&kp, signer.clone());
            let c2 = CommitBuilder::genesis(signer.clone(), model)
                .data(content)
                .sign(&kp, signer);

            prop_assert_eq!(
                canonical_payload_bytes(&c1.payload),
                canonical_payload_bytes(&c2.payload)
            );
        }

        #[test]
        fn test_stream_id_bytes_roundtrip(id in stream_id()) {
            let bytes = id.to_bytes();
            prop_assert_eq!(StreamId::from_bytes(&bytes), Some(id));
        }
    }
}
