//! Stand-in implementations of the capability contracts.
//!
//! These back the fixtures and are usable directly in tests that need
//! finer control over resolver or loader contents.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use serde_json::Value;

use docstream_core::{
    Ed25519PublicKey, KeyResolver, LoadError, LoadedStream, SchemaError, SchemaValidator,
    SignatureError, StreamId, StreamLoader,
};

/// A key resolver backed by a fixed map of signer -> keys.
#[derive(Default)]
pub struct StaticKeyResolver {
    keys: HashMap<String, Vec<Ed25519PublicKey>>,
}

impl StaticKeyResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attribute a key to a signer. Repeated calls add rotation candidates.
    pub fn with_key(mut self, signer: &str, key: Ed25519PublicKey) -> Self {
        self.keys.entry(signer.to_string()).or_default().push(key);
        self
    }
}

#[async_trait]
impl KeyResolver for StaticKeyResolver {
    async fn resolve(&self, signer: &str) -> Result<Vec<Ed25519PublicKey>, SignatureError> {
        self.keys
            .get(signer)
            .cloned()
            .ok_or_else(|| SignatureError::UnknownSigner(signer.to_string()))
    }
}

/// A stream loader backed by a map of stream id -> content.
#[derive(Default)]
pub struct StaticStreamLoader {
    streams: RwLock<HashMap<StreamId, Value>>,
}

impl StaticStreamLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_stream(self, stream_id: StreamId, content: Value) -> Self {
        self.insert(stream_id, content);
        self
    }

    pub fn insert(&self, stream_id: StreamId, content: Value) {
        self.streams.write().unwrap().insert(stream_id, content);
    }
}

#[async_trait]
impl StreamLoader for StaticStreamLoader {
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

/// A structural schema validator covering the subset tests need:
/// `type`, `required`, and per-property `type` checks.
pub struct BasicSchemaValidator;

impl BasicSchemaValidator {
    fn type_name(value: &Value) -> &'static str {
        match value {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
        }
    }

    fn check(content: &Value, schema: &Value) -> Result<(), SchemaError> {
        if let Some(Value::String(expected)) = schema.get("type") {
            let actual = Self::type_name(content);
            // "integer" narrows "number"
            let matches = actual == expected || (expected == "integer" && actual == "number");
            if !matches {
                return Err(SchemaError::NonConformant(format!(
                    "expected type {}, got {}",
                    expected, actual
                )));
            }
        }

        if let Some(Value::Array(required)) = schema.get("required") {
            for key in required {
                if let Value::String(key) = key {
                    if content.get(key).is_none() {
                        return Err(SchemaError::NonConformant(format!(
                            "missing required property {}",
                            key
                        )));
                    }
                }
            }
        }

        if let (Some(Value::Object(properties)), Some(fields)) =
            (schema.get("properties"), content.as_object())
        {
            for (name, sub_schema) in properties {
                if let Some(field) = fields.get(name) {
                    Self::check(field, sub_schema)?;
                }
            }
        }

        Ok(())
    }
}

impl SchemaValidator for BasicSchemaValidator {
    fn validate(&self, content: &Value, schema: &Value) -> Result<(), SchemaError> {
        Self::check(content, schema)
    }
}

/// A validator that rejects everything, for failure-path tests.
pub struct RejectAllValidator;

impl SchemaValidator for RejectAllValidator {
    fn validate(&self, _content: &Value, _schema: &Value) -> Result<(), SchemaError> {
        Err(SchemaError::NonConformant("rejected by test".into()))
    }
}

/// A validator that accepts everything.
pub struct AcceptAllValidator;

impl SchemaValidator for AcceptAllValidator {
    fn validate(&self, _content: &Value, _schema: &Value) -> Result<(), SchemaError> {
        Ok(())
    }
}
