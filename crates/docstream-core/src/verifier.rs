//! Envelope verification: the provided implementation of the
//! [`IdentityVerifier`] contract.
//!
//! Verification binds a commit payload to the expected controller: the
//! envelope must name the controller as signer, the Ed25519 signature must
//! verify over the domain-prefixed canonical payload bytes against a key the
//! resolver currently attributes to that signer, and any capability scope on
//! the envelope must cover the `(stream, model)` pair.

use std::sync::Arc;

use async_trait::async_trait;

use crate::canonical::signed_message;
use crate::commit::Commit;
use crate::context::{IdentityVerifier, KeyResolver};
use crate::error::SignatureError;
use crate::types::StreamId;

/// Verifies signature envelopes against keys from a [`KeyResolver`].
pub struct EnvelopeVerifier {
    resolver: Arc<dyn KeyResolver>,
}

impl EnvelopeVerifier {
    pub fn new(resolver: Arc<dyn KeyResolver>) -> Self {
        Self { resolver }
    }
}

#[async_trait]
impl IdentityVerifier for EnvelopeVerifier {
    async fn verify(
        &self,
        commit: &Commit,
        signer: &str,
        model: &StreamId,
        stream: &StreamId,
    ) -> Result<(), SignatureError> {
        let envelope = commit
            .envelope
            .as_ref()
            .ok_or(SignatureError::MissingEnvelope)?;

        if envelope.signer != signer {
            return Err(SignatureError::WrongSigner {
                expected: signer.to_string(),
                actual: envelope.signer.clone(),
            });
        }

        let keys = self.resolver.resolve(signer).await?;
        if keys.is_empty() {
            return Err(SignatureError::UnknownSigner(signer.to_string()));
        }

        let message = signed_message(&commit.payload);
        let verified = keys
            .iter()
            .any(|key| key.verify(&message, &envelope.signature).is_ok());
        if !verified {
            return Err(SignatureError::VerificationFailed);
        }

        if let Some(scope) = &envelope.scope {
            let model_covered = scope.model == *model;
            let stream_covered = scope.stream.map_or(true, |s| s == *stream);
            if !model_covered || !stream_covered {
                return Err(SignatureError::ScopeMismatch {
                    stream: *stream,
                    model: *model,
                });
            }
        }

        Ok(())
    }
}
