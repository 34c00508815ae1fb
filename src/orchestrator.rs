//! Verification orchestrator (spec §4.8/§9): the top-level pipeline
//! composing the scheme registry, extractors, payload formatter, algorithm
//! verifiers, and JWKS cache behind the four public entry points.

use std::collections::HashMap;

use tracing::instrument;

use crate::config::EngineConfig;
use crate::detect::detect_provider;
use crate::error::{AttemptFailure, ParsedBody, VerificationErrorKind, VerificationFailure, VerificationResult, VerificationSuccess};
use crate::event_id::canonical_event_id;
use crate::extract::{check_freshness, extract_signature, extract_timestamp, now_unix};
use crate::jwks::JwksCache;
use crate::normalize::{self, NormalizeOptions};
use crate::payload::build_candidates;
use crate::request::VerificationRequest;
use crate::scheme::{Algorithm, Keying, ProviderTag, SignatureScheme, scheme_for};
use crate::verify::{KeyMaterial, verify_signature};

/// Per-call overrides (spec §6 `options`).
#[derive(Debug, Clone, Default)]
pub struct VerificationOptions {
    /// Overrides the engine's configured tolerance (see
    /// [`EngineConfig::default_tolerance_seconds`]) for this call only.
    pub tolerance_seconds: Option<u64>,
    /// `None` = normalization not requested. `Some(opts)` runs the
    /// normalizer with `opts` (spec §6: `normalize?: bool | {category?, include_raw?}` —
    /// the boolean-true case is `Some(NormalizeOptions::default())`).
    pub normalize: Option<NormalizeOptions>,
}

/// Owns the process-wide mutable state (the JWKS cache) and exposes the
/// engine's public entry points. The scheme registry itself needs no
/// instance state — it's a free-standing static (spec §5: "the scheme
/// registry is build-time immutable").
pub struct VerificationEngine {
    jwks: JwksCache,
    config: EngineConfig,
}

impl VerificationEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            jwks: JwksCache::new(
                std::time::Duration::from_secs(config.jwks_ttl_seconds),
                std::time::Duration::from_secs(config.jwks_timeout_seconds),
            ),
            config,
        }
    }

    /// `verify(request, provider, secret, options) -> Result` (spec §6).
    /// Also serves as the component table's `verify_with_provider` — a
    /// provider tag is required either way; there is no separate code path.
    #[instrument(skip(self, req, secret), fields(provider = %provider))]
    pub async fn verify(
        &self,
        req: &VerificationRequest,
        provider: ProviderTag,
        secret: &[u8],
        options: &VerificationOptions,
    ) -> VerificationResult {
        let scheme = scheme_for(provider);
        self.verify_core(req, provider, &scheme, secret, options).await
    }

    /// `verify_with_signature_scheme(request, scheme, secret, options) -> Result`
    /// (spec §6): verifies against a caller-supplied scheme rather than a
    /// registered one. The result's provider tag is `custom` — per spec §9's
    /// open question, `custom`'s *default* scheme is unobservable, but a
    /// caller naming one explicitly always gets it applied here.
    #[instrument(skip(self, req, scheme, secret))]
    pub async fn verify_with_signature_scheme(
        &self,
        req: &VerificationRequest,
        scheme: &SignatureScheme,
        secret: &[u8],
        options: &VerificationOptions,
    ) -> VerificationResult {
        self.verify_core(req, ProviderTag::Custom, scheme, secret, options).await
    }

    /// `verify_any(request, secrets_map, options) -> Result` (spec §6):
    /// detector fast-path first, then a linear scan of `secrets_map`
    /// providers. Returns `VerificationError` with an `attempts` list on
    /// total failure.
    #[instrument(skip(self, req, secrets_map))]
    pub async fn verify_any(
        &self,
        req: &VerificationRequest,
        secrets_map: &HashMap<ProviderTag, Vec<u8>>,
        options: &VerificationOptions,
    ) -> VerificationResult {
        let detected = detect_provider(req);
        if detected != ProviderTag::Unknown {
            if let Some(secret) = secrets_map.get(&detected) {
                if let Ok(success) = self.verify(req, detected, secret, options).await {
                    return Ok(success);
                }
            }
        }

        let mut attempts = Vec::new();
        for (&provider, secret) in secrets_map {
            if provider == detected {
                continue; // already tried on the fast path
            }
            match self.verify(req, provider, secret, options).await {
                Ok(success) => return Ok(success),
                Err(failure) => attempts.push(AttemptFailure {
                    provider,
                    kind: failure.kind,
                    message: failure.message,
                }),
            }
        }

        Err(VerificationFailure::new(
            VerificationErrorKind::VerificationError,
            detected,
            "no registered provider's secret verified this request",
        )
        .with_attempts(attempts))
    }

    async fn verify_core(
        &self,
        req: &VerificationRequest,
        provider: ProviderTag,
        scheme: &SignatureScheme,
        secret: &[u8],
        options: &VerificationOptions,
    ) -> VerificationResult {
        self.verify_core_inner(req, provider, scheme, secret, options)
            .await
            .map_err(|kind| {
                let message = describe_failure(kind, scheme);
                VerificationFailure::new(kind, provider, message)
            })
    }

    async fn verify_core_inner(
        &self,
        req: &VerificationRequest,
        provider: ProviderTag,
        scheme: &SignatureScheme,
        secret: &[u8],
        options: &VerificationOptions,
    ) -> Result<VerificationSuccess, VerificationErrorKind> {
        // Precedence: an explicit per-call override wins; otherwise the
        // engine's own configured tolerance applies (spec §6's
        // `tolerance_seconds` default of 300, overridable via the demo's
        // `--tolerance-seconds`/`TOLERANCE_SECONDS` knob).
        let tolerance = options
            .tolerance_seconds
            .unwrap_or(self.config.default_tolerance_seconds);

        let mut metadata = HashMap::new();
        metadata.insert("algorithm".to_string(), algorithm_tag(scheme.algorithm).to_string());

        if scheme.algorithm == Algorithm::TokenEquality {
            verify_signature(scheme, &KeyMaterial::Shared(secret), &[], None, req)?;
        } else {
            let extracted = extract_signature(scheme, req)?;
            let timestamp = extract_timestamp(scheme, req)?;
            if let Some(ts) = timestamp {
                check_freshness(ts, tolerance, now_unix())?;
                metadata.insert("timestamp".to_string(), ts.to_string());
            }

            let payload_candidates = build_candidates(scheme, req, timestamp)?;

            let key_material = match scheme.keying {
                Keying::SharedSecret => KeyMaterial::Shared(secret),
                Keying::StaticPublicKey(pem) => {
                    return self
                        .finish_ed25519(
                            scheme,
                            req,
                            provider,
                            &payload_candidates,
                            &extracted,
                            &[pem.to_string()],
                            metadata,
                            options,
                        )
                        .await;
                }
                Keying::Jwks(url) => {
                    let pems = self.jwks.resolve_keys(url).await?;
                    return self
                        .finish_ed25519(
                            scheme,
                            req,
                            provider,
                            &payload_candidates,
                            &extracted,
                            &pems,
                            metadata,
                            options,
                        )
                        .await;
                }
            };

            verify_signature(scheme, &key_material, &payload_candidates, Some(&extracted), req)?;
        }

        if let Some(id_header) = scheme.id_header {
            if let Some(id) = req.header(id_header) {
                metadata.insert("id".to_string(), id.to_string());
            }
        }
        for (key, header) in scheme.extra_metadata_headers {
            if let Some(value) = req.header(header) {
                metadata.insert((*key).to_string(), value.to_string());
            }
        }

        let body = ParsedBody::from_raw(&req.body);
        let event_id = canonical_event_id(provider, &body, &metadata, &req.body);
        let normalized = options
            .normalize
            .map(|normalize_options| normalize::normalize(provider, &body, normalize_options));

        Ok(VerificationSuccess {
            provider,
            body,
            metadata,
            event_id,
            normalized,
        })
    }

    /// Finishes an Ed25519 verification given already-resolved public keys,
    /// then falls through to the shared metadata/event-id/normalize tail.
    /// Kept separate from `verify_core_inner` because key resolution is the
    /// pipeline's only `await` point (spec §5).
    #[allow(clippy::too_many_arguments)]
    async fn finish_ed25519(
        &self,
        scheme: &SignatureScheme,
        req: &VerificationRequest,
        provider: ProviderTag,
        payload_candidates: &[Vec<u8>],
        extracted: &crate::extract::ExtractedSignature,
        pems: &[String],
        mut metadata: HashMap<String, String>,
        options: &VerificationOptions,
    ) -> Result<VerificationSuccess, VerificationErrorKind> {
        verify_signature(
            scheme,
            &KeyMaterial::PublicKeys(pems),
            payload_candidates,
            Some(extracted),
            req,
        )?;

        if let Some(id_header) = scheme.id_header {
            if let Some(id) = req.header(id_header) {
                metadata.insert("id".to_string(), id.to_string());
            }
        }
        for (key, header) in scheme.extra_metadata_headers {
            if let Some(value) = req.header(header) {
                metadata.insert((*key).to_string(), value.to_string());
            }
        }

        let body = ParsedBody::from_raw(&req.body);
        let event_id = canonical_event_id(provider, &body, &metadata, &req.body);
        let normalized = options
            .normalize
            .map(|normalize_options| normalize::normalize(provider, &body, normalize_options));

        Ok(VerificationSuccess {
            provider,
            body,
            metadata,
            event_id,
            normalized,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }
}

fn algorithm_tag(algorithm: Algorithm) -> &'static str {
    match algorithm {
        Algorithm::HmacSha1 => "hmac-sha1",
        Algorithm::HmacSha256 => "hmac-sha256",
        Algorithm::HmacSha512 => "hmac-sha512",
        Algorithm::Ed25519 => "ed25519",
        Algorithm::TokenEquality => "token-equality",
    }
}

fn describe_failure(kind: VerificationErrorKind, scheme: &SignatureScheme) -> String {
    match kind {
        VerificationErrorKind::MissingSignature => {
            format!("missing signature header '{}'", scheme.signature_header)
        }
        VerificationErrorKind::InvalidSignature => "signature did not match recomputed value".to_string(),
        VerificationErrorKind::TimestampExpired => "timestamp is outside the freshness window".to_string(),
        VerificationErrorKind::TimestampMalformed => "timestamp header missing or unparsable".to_string(),
        VerificationErrorKind::MissingToken => {
            format!("missing token header '{}'", scheme.signature_header)
        }
        VerificationErrorKind::InvalidToken => "token did not match configured secret".to_string(),
        VerificationErrorKind::PlatformNotSupported => "no scheme registered for this provider".to_string(),
        VerificationErrorKind::KeyResolutionFailed => "failed to resolve a usable public key".to_string(),
        VerificationErrorKind::PayloadMalformed => "payload template referenced an unavailable field".to_string(),
        VerificationErrorKind::VerificationError => "unexpected internal verification failure".to_string(),
    }
}
