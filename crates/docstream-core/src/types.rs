//! Identifier types for streams and commits.
//!
//! All identifiers are newtypes to prevent misuse at compile time. Streams
//! and commits are content-addressed: their identifiers are derived from the
//! canonical bytes of the genesis payload and the commit respectively.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::crypto::Blake3Hash;

/// Domain prefix for deriving stream identifiers from genesis bytes.
pub const STREAM_ID_DOMAIN: &[u8] = b"docstream/stream-id/v0:";

/// Domain prefix for deriving commit identifiers from canonical bytes.
pub const COMMIT_ID_DOMAIN: &[u8] = b"docstream/commit-id/v0:";

/// The closed set of stream types, tagged with fixed wire integers.
///
/// Genesis validation depends on the model reference carrying the
/// [`StreamType::Model`] tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum StreamType {
    /// A schema-bearing model stream.
    Model = 2,
    /// A schema-constrained document stream.
    Document = 3,
}

impl StreamType {
    /// Convert to the wire tag.
    pub fn to_u8(self) -> u8 {
        self as u8
    }

    /// Try to parse from the wire tag.
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            2 => Some(Self::Model),
            3 => Some(Self::Document),
            _ => None,
        }
    }

    /// Human-readable name of the stream type.
    pub fn name(self) -> &'static str {
        match self {
            Self::Model => "model",
            Self::Document => "document",
        }
    }
}

impl fmt::Display for StreamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A stream identifier: a type tag plus the content address of the stream's
/// genesis commit payload.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StreamId {
    /// The stream type tag.
    pub stream_type: StreamType,
    /// Blake3 of the canonical genesis payload bytes (domain-prefixed).
    pub hash: Blake3Hash,
}

impl StreamId {
    /// Derive a stream ID from the canonical bytes of a genesis payload.
    pub fn from_genesis(stream_type: StreamType, genesis_payload_bytes: &[u8]) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(STREAM_ID_DOMAIN);
        hasher.update(&[stream_type.to_u8()]);
        hasher.update(genesis_payload_bytes);
        Self {
            stream_type,
            hash: Blake3Hash(*hasher.finalize().as_bytes()),
        }
    }

    /// Construct from parts.
    pub const fn new(stream_type: StreamType, hash: Blake3Hash) -> Self {
        Self { stream_type, hash }
    }

    /// The stream type tag.
    pub fn stream_type(&self) -> StreamType {
        self.stream_type
    }

    /// Convert to a `<type>-<hex>` string.
    pub fn to_hex(&self) -> String {
        format!("{}-{}", self.stream_type.to_u8(), self.hash.to_hex())
    }

    /// Encode as 33 bytes: the type tag followed by the hash.
    pub fn to_bytes(&self) -> [u8; 33] {
        let mut out = [0u8; 33];
        out[0] = self.stream_type.to_u8();
        out[1..].copy_from_slice(&self.hash.0);
        out
    }

    /// Decode from the 33-byte form.
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() != 33 {
            return None;
        }
        let stream_type = StreamType::from_u8(bytes[0])?;
        let mut hash = [0u8; 32];
        hash.copy_from_slice(&bytes[1..]);
        Some(Self {
            stream_type,
            hash: Blake3Hash(hash),
        })
    }
}

impl fmt::Debug for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "StreamId({}:{})",
            self.stream_type,
            &self.hash.to_hex()[..16]
        )
    }
}

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.stream_type, &self.hash.to_hex()[..16])
    }
}

/// A 32-byte commit identifier, computed as the domain-prefixed Blake3 hash
/// of the canonical commit bytes.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CommitId(pub [u8; 32]);

impl CommitId {
    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes.
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Convert to hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse from hex string.
    pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
        let bytes = hex::decode(s)?;
        if bytes.len() != 32 {
            return Err(hex::FromHexError::InvalidStringLength);
        }
        let mut arr = [0u8; 32];
        arr.copy_from_slice(&bytes);
        Ok(Self(arr))
    }
}

impl fmt::Debug for CommitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CommitId({})", &self.to_hex()[..16])
    }
}

impl fmt::Display for CommitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", &self.to_hex()[..16])
    }
}

impl AsRef<[u8]> for CommitId {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<[u8; 32]> for CommitId {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_type_tags() {
        assert_eq!(StreamType::Model.to_u8(), 2);
        assert_eq!(StreamType::Document.to_u8(), 3);
        assert_eq!(StreamType::from_u8(2), Some(StreamType::Model));
        assert_eq!(StreamType::from_u8(3), Some(StreamType::Document));
        assert_eq!(StreamType::from_u8(7), None);
    }

    #[test]
    fn test_stream_id_derivation_deterministic() {
        let id1 = StreamId::from_genesis(StreamType::Document, b"genesis bytes");
        let id2 = StreamId::from_genesis(StreamType::Document, b"genesis bytes");
        assert_eq!(id1, id2);

        let id3 = StreamId::from_genesis(StreamType::Document, b"other bytes");
        assert_ne!(id1, id3);
    }

    #[test]
    fn test_stream_id_type_distinguishes() {
        let doc = StreamId::from_genesis(StreamType::Document, b"same bytes");
        let model = StreamId::from_genesis(StreamType::Model, b"same bytes");
        assert_ne!(doc, model);
        assert_eq!(doc.stream_type(), StreamType::Document);
        assert_eq!(model.stream_type(), StreamType::Model);
    }

    #[test]
    fn test_stream_id_bytes_roundtrip() {
        let id = StreamId::from_genesis(StreamType::Model, b"genesis");
        let bytes = id.to_bytes();
        assert_eq!(bytes[0], 2);
        assert_eq!(StreamId::from_bytes(&bytes), Some(id));
        assert_eq!(StreamId::from_bytes(&bytes[..32]), None);
        let mut bad_tag = bytes;
        bad_tag[0] = 9;
        assert_eq!(StreamId::from_bytes(&bad_tag), None);
    }

    #[test]
    fn test_commit_id_hex_roundtrip() {
        let id = CommitId::from_bytes([0x42; 32]);
        let recovered = CommitId::from_hex(&id.to_hex()).unwrap();
        assert_eq!(id, recovered);
    }
}
