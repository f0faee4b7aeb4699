//! Inbound payment callbacks: signature schemes and payload normalisation per rail.
mod payloads;
mod signature;

pub use payloads::{CallbackEvent, CallbackStatus};
pub use signature::{
    hmac_digest,
    hmac_sha512_hex,
    sign_payload,
    DigestAlgorithm,
    SignatureEncoding,
    SignatureError,
    SignatureScheme,
    SignatureVerifier,
    Verification,
    WebhookSecrets,
};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IngestError {
    #[error("Signature check failed. {0}")]
    Signature(#[from] SignatureError),
    #[error("Malformed callback payload. {0}")]
    Malformed(String),
}
