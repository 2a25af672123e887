//! Canonical CBOR encoding for deterministic content addressing.
//!
//! Implements RFC 8949 Core Deterministic Encoding:
//! - Map keys sorted by encoded byte comparison
//! - Integers use smallest valid encoding
//! - Definite lengths only
//!
//! Commit payloads use integer map keys; JSON content values are converted
//! to CBOR with their text keys sorted the same way. The canonical encoding
//! is critical: the same commit must produce identical bytes (and thus
//! identical commit and stream identifiers) on every node replaying the log.

use ciborium::value::Value;

use crate::commit::{AnchorProof, Commit, CommitHeader, CommitPayload, SignatureEnvelope};
use crate::types::CommitId;

/// Domain prefix for the signed message over a commit payload.
pub const SIGN_DOMAIN: &[u8] = b"docstream/commit-sig/v0:";

/// Payload field keys (0-23 encode as single bytes in CBOR).
mod payload_keys {
    pub const HEADER: u64 = 0;
    pub const DATA: u64 = 1;
    pub const PREV: u64 = 2;
}

/// Header field keys.
mod header_keys {
    pub const CONTROLLERS: u64 = 0;
    pub const MODEL: u64 = 1;
    pub const UNIQUE: u64 = 2;
}

/// Envelope field keys.
mod envelope_keys {
    pub const SIGNER: u64 = 0;
    pub const SIGNATURE: u64 = 1;
    pub const SCOPE_MODEL: u64 = 2;
    pub const SCOPE_STREAM: u64 = 3;
}

/// Anchor proof field keys.
mod proof_keys {
    pub const CHAIN_ID: u64 = 0;
    pub const BLOCK_NUMBER: u64 = 1;
    pub const BLOCK_TIMESTAMP: u64 = 2;
    pub const TX_HASH: u64 = 3;
}

/// Encode a commit payload to canonical CBOR bytes.
///
/// These bytes are what a genesis stream identifier is derived from, and
/// what the signature envelope signs over (domain-prefixed).
pub fn canonical_payload_bytes(payload: &CommitPayload) -> Vec<u8> {
    let value = payload_to_cbor(payload);
    let mut buf = Vec::new();
    encode_value_to(&mut buf, &value);
    buf
}

/// Encode an entire commit to canonical bytes.
///
/// Format: canonical_payload || envelope (if any) || proof (if any).
pub fn canonical_commit_bytes(commit: &Commit) -> Vec<u8> {
    let mut buf = canonical_payload_bytes(&commit.payload);
    if let Some(envelope) = &commit.envelope {
        let value = envelope_to_cbor(envelope);
        encode_value_to(&mut buf, &value);
    }
    if let Some(proof) = &commit.proof {
        let value = proof_to_cbor(proof);
        encode_value_to(&mut buf, &value);
    }
    buf
}

/// Construct the message the signature envelope signs over.
pub fn signed_message(payload: &CommitPayload) -> Vec<u8> {
    let mut buf = Vec::with_capacity(SIGN_DOMAIN.len() + 64);
    buf.extend_from_slice(SIGN_DOMAIN);
    buf.extend_from_slice(&canonical_payload_bytes(payload));
    buf
}

fn payload_to_cbor(payload: &CommitPayload) -> Value {
    let mut entries = Vec::with_capacity(3);

    if let Some(header) = &payload.header {
        entries.push((
            Value::Integer(payload_keys::HEADER.into()),
            header_to_cbor(header),
        ));
    }
    if let Some(data) = &payload.data {
        entries.push((Value::Integer(payload_keys::DATA.into()), json_to_cbor(data)));
    }
    if let Some(prev) = &payload.prev {
        entries.push((
            Value::Integer(payload_keys::PREV.into()),
            Value::Bytes(prev.0.to_vec()),
        ));
    }

    Value::Map(entries)
}

fn header_to_cbor(header: &CommitHeader) -> Value {
    let mut entries = Vec::with_capacity(3);

    let controllers: Vec<Value> = header
        .controllers
        .iter()
        .map(|c| Value::Text(c.clone()))
        .collect();
    entries.push((
        Value::Integer(header_keys::CONTROLLERS.into()),
        Value::Array(controllers),
    ));

    entries.push((
        Value::Integer(header_keys::MODEL.into()),
        Value::Bytes(stream_id_bytes(&header.model)),
    ));

    if let Some(unique) = &header.unique {
        entries.push((
            Value::Integer(header_keys::UNIQUE.into()),
            Value::Bytes(unique.to_vec()),
        ));
    }

    Value::Map(entries)
}

fn envelope_to_cbor(envelope: &SignatureEnvelope) -> Value {
    let mut entries = vec![
        (
            Value::Integer(envelope_keys::SIGNER.into()),
            Value::Text(envelope.signer.clone()),
        ),
        (
            Value::Integer(envelope_keys::SIGNATURE.into()),
            Value::Bytes(envelope.signature.0.to_vec()),
        ),
    ];

    if let Some(scope) = &envelope.scope {
        entries.push((
            Value::Integer(envelope_keys::SCOPE_MODEL.into()),
            Value::Bytes(stream_id_bytes(&scope.model)),
        ));
        if let Some(stream) = &scope.stream {
            entries.push((
                Value::Integer(envelope_keys::SCOPE_STREAM.into()),
                Value::Bytes(stream_id_bytes(stream)),
            ));
        }
    }

    Value::Map(entries)
}

fn proof_to_cbor(proof: &AnchorProof) -> Value {
    Value::Map(vec![
        (
            Value::Integer(proof_keys::CHAIN_ID.into()),
            Value::Text(proof.chain_id.clone()),
        ),
        (
            Value::Integer(proof_keys::BLOCK_NUMBER.into()),
            Value::Integer(proof.block_number.into()),
        ),
        (
            Value::Integer(proof_keys::BLOCK_TIMESTAMP.into()),
            Value::Integer(proof.block_timestamp.into()),
        ),
        (
            Value::Integer(proof_keys::TX_HASH.into()),
            Value::Bytes(proof.tx_hash.0.to_vec()),
        ),
    ])
}

/// Encode a stream ID as a 33-byte tag-prefixed byte string.
fn stream_id_bytes(id: &crate::types::StreamId) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(33);
    bytes.push(id.stream_type.to_u8());
    bytes.extend_from_slice(&id.hash.0);
    bytes
}

/// Convert a JSON content value to a CBOR value.
///
/// Integers stay integers; non-integral numbers always encode as 64-bit
/// floats, so the same JSON value yields the same bytes everywhere.
pub fn json_to_cbor(value: &serde_json::Value) -> Value {
    match value {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Bool(*b),
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::Integer(i.into())
            } else if let Some(u) = n.as_u64() {
                Value::Integer(u.into())
            } else {
                // as_f64 is total for serde_json numbers
                Value::Float(n.as_f64().unwrap_or(f64::NAN))
            }
        }
        serde_json::Value::String(s) => Value::Text(s.clone()),
        serde_json::Value::Array(arr) => Value::Array(arr.iter().map(json_to_cbor).collect()),
        serde_json::Value::Object(map) => Value::Map(
            map.iter()
                .map(|(k, v)| (Value::Text(k.clone()), json_to_cbor(v)))
                .collect(),
        ),
    }
}

/// Recursively encode a CBOR value.
fn encode_value_to(buf: &mut Vec<u8>, value: &Value) {
    match value {
        Value::Integer(i) => encode_integer(buf, *i),
        Value::Bytes(b) => encode_bytes(buf, b),
        Value::Text(s) => encode_text(buf, s),
        Value::Array(arr) => encode_array(buf, arr),
        Value::Map(entries) => encode_map_canonical(buf, entries),
        Value::Bool(b) => buf.push(if *b { 0xf5 } else { 0xf4 }),
        Value::Null => buf.push(0xf6),
        Value::Float(f) => encode_f64(buf, *f),
        // json_to_cbor and the *_to_cbor constructors never produce tags
        // or simple values
        _ => unreachable!("unsupported CBOR value type"),
    }
}

/// Encode a CBOR integer (major types 0 and 1).
fn encode_integer(buf: &mut Vec<u8>, i: ciborium::value::Integer) {
    let n: i128 = i.into();

    if n >= 0 {
        encode_uint(buf, 0, n as u64);
    } else {
        // CBOR encodes -1 as 0, -2 as 1, etc.
        let abs = (-1 - n) as u64;
        encode_uint(buf, 1, abs);
    }
}

/// Encode an unsigned integer with the given major type.
fn encode_uint(buf: &mut Vec<u8>, major: u8, n: u64) {
    let mt = major << 5;
    if n < 24 {
        buf.push(mt | (n as u8));
    } else if n <= 0xff {
        buf.push(mt | 24);
        buf.push(n as u8);
    } else if n <= 0xffff {
        buf.push(mt | 25);
        buf.extend_from_slice(&(n as u16).to_be_bytes());
    } else if n <= 0xffffffff {
        buf.push(mt | 26);
        buf.extend_from_slice(&(n as u32).to_be_bytes());
    } else {
        buf.push(mt | 27);
        buf.extend_from_slice(&n.to_be_bytes());
    }
}

/// Encode a byte string (major type 2).
fn encode_bytes(buf: &mut Vec<u8>, bytes: &[u8]) {
    encode_uint(buf, 2, bytes.len() as u64);
    buf.extend_from_slice(bytes);
}

/// Encode a text string (major type 3).
fn encode_text(buf: &mut Vec<u8>, s: &str) {
    encode_uint(buf, 3, s.len() as u64);
    buf.extend_from_slice(s.as_bytes());
}

/// Encode an array (major type 4).
fn encode_array(buf: &mut Vec<u8>, arr: &[Value]) {
    encode_uint(buf, 4, arr.len() as u64);
    for item in arr {
        encode_value_to(buf, item);
    }
}

/// Encode a 64-bit float (major type 7, additional info 27).
fn encode_f64(buf: &mut Vec<u8>, f: f64) {
    buf.push(0xfb);
    buf.extend_from_slice(&f.to_be_bytes());
}

/// Encode a map canonically (major type 5).
///
/// Keys are sorted by their encoded byte comparison.
fn encode_map_canonical(buf: &mut Vec<u8>, entries: &[(Value, Value)]) {
    let mut key_value_pairs: Vec<(Vec<u8>, &Value)> = entries
        .iter()
        .map(|(k, v)| {
            let mut key_buf = Vec::new();
            encode_value_to(&mut key_buf, k);
            (key_buf, v)
        })
        .collect();

    key_value_pairs.sort_by(|a, b| a.0.cmp(&b.0));

    encode_uint(buf, 5, key_value_pairs.len() as u64);

    for (key_bytes, value) in key_value_pairs {
        buf.extend_from_slice(&key_bytes);
        encode_value_to(buf, value);
    }
}

/// Compute a commit identifier from canonical commit bytes.
pub fn commit_id_from_bytes(canonical: &[u8]) -> CommitId {
    CommitId(
        crate::crypto::Blake3Hash::hash_with_domain(crate::types::COMMIT_ID_DOMAIN, canonical).0,
    )
}
