//! Error taxonomy and result envelope for the verification engine.
//!
//! Every call into [`crate::orchestrator`] returns exactly one of
//! [`VerificationSuccess`] or [`VerificationFailure`] — nothing ever panics
//! or propagates an exception across the public boundary.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt::{Display, Formatter};

use crate::normalize::NormalizedRecord;
use crate::scheme::ProviderTag;

/// Closed set of ways a verification attempt can fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationErrorKind {
    /// The scheme's signature header was absent from the request.
    MissingSignature,
    /// The recomputed signature did not match the one on the request.
    InvalidSignature,
    /// A timestamp was present but outside the freshness window.
    TimestampExpired,
    /// A timestamp was present but could not be parsed, or was required
    /// by the payload template and absent.
    TimestampMalformed,
    /// A token-equality scheme's header was absent.
    MissingToken,
    /// A token-equality scheme's header did not match the configured secret.
    InvalidToken,
    /// No scheme is registered for the requested provider and none was supplied.
    PlatformNotSupported,
    /// JWKS fetch or key parsing failed, or yielded zero usable keys.
    KeyResolutionFailed,
    /// The payload could not be reconstructed (e.g. a template referenced
    /// a header that was not present).
    PayloadMalformed,
    /// Catch-all for unexpected internal failures.
    VerificationError,
}

impl Display for VerificationErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let json = serde_json::to_string(self).map_err(|_| std::fmt::Error)?;
        write!(f, "{}", json.trim_matches('"'))
    }
}

impl VerificationErrorKind {
    /// A non-binding suggestion for the HTTP status a caller might answer
    /// with. The engine itself never touches HTTP — this exists purely so
    /// thin framework adapters don't each have to re-derive the mapping.
    pub fn status_code_hint(&self) -> u16 {
        match self {
            VerificationErrorKind::MissingSignature
            | VerificationErrorKind::InvalidSignature
            | VerificationErrorKind::TimestampExpired
            | VerificationErrorKind::TimestampMalformed
            | VerificationErrorKind::MissingToken
            | VerificationErrorKind::InvalidToken
            | VerificationErrorKind::KeyResolutionFailed => 401,
            VerificationErrorKind::PlatformNotSupported => 404,
            VerificationErrorKind::PayloadMalformed => 400,
            VerificationErrorKind::VerificationError => 500,
        }
    }
}

/// A single failed attempt, recorded by [`crate::orchestrator::verify_any`]
/// when trying several providers in turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttemptFailure {
    pub provider: ProviderTag,
    pub kind: VerificationErrorKind,
    pub message: String,
}

/// A failed verification. Carries enough context for a caller to log or
/// respond appropriately without inspecting the engine's internals.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationFailure {
    pub kind: VerificationErrorKind,
    pub message: String,
    pub provider: ProviderTag,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attempts: Vec<AttemptFailure>,
}

impl VerificationFailure {
    pub fn new(kind: VerificationErrorKind, provider: ProviderTag, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            provider,
            attempts: Vec::new(),
        }
    }

    pub fn with_attempts(mut self, attempts: Vec<AttemptFailure>) -> Self {
        self.attempts = attempts;
        self
    }
}

impl Display for VerificationFailure {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({}): {}", self.kind, self.provider, self.message)
    }
}

impl std::error::Error for VerificationFailure {}

/// The parsed body of a verified webhook: structured JSON if the raw bytes
/// parsed as JSON, otherwise the original bytes (never re-serialized —
/// re-serialization would invalidate a caller's ability to re-check the
/// signature against what was actually sent).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParsedBody {
    Json(serde_json::Value),
    Raw(#[serde(with = "serde_bytes_as_base64")] Vec<u8>),
}

impl ParsedBody {
    pub fn from_raw(body: &[u8]) -> Self {
        match serde_json::from_slice::<serde_json::Value>(body) {
            Ok(value) => ParsedBody::Json(value),
            Err(_) => ParsedBody::Raw(body.to_vec()),
        }
    }

    pub fn as_json(&self) -> Option<&serde_json::Value> {
        match self {
            ParsedBody::Json(value) => Some(value),
            ParsedBody::Raw(_) => None,
        }
    }
}

mod serde_bytes_as_base64 {
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD as B64;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&B64.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        B64.decode(s.as_bytes()).map_err(serde::de::Error::custom)
    }
}

/// A successfully verified webhook.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationSuccess {
    pub provider: ProviderTag,
    pub body: ParsedBody,
    pub metadata: HashMap<String, String>,
    /// `"{provider}_{raw-id}"`, stable for downstream idempotency.
    pub event_id: String,
    /// Present only when the caller requested normalization (spec §4.11,
    /// §6 `options.normalize`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub normalized: Option<NormalizedRecord>,
}

/// The outcome of a verification attempt.
pub type VerificationResult = Result<VerificationSuccess, VerificationFailure>;
