//! The signature-scheme registry (spec §4.3): a static, process-wide,
//! immutable mapping from [`ProviderTag`] to [`SignatureScheme`].
//!
//! Scheme fields are modeled as a closed sum per provider-algorithm shape
//! rather than a bag of optional fields, so an invariant violation (an HMAC
//! scheme declaring a JWKS URL, say) is unrepresentable at the type level.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt::{Display, Formatter};

use crate::ct::Encoding;

/// A closed identifier for a known webhook sender, plus `custom` and `unknown`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderTag {
    Stripe,
    Github,
    Clerk,
    Shopify,
    Vercel,
    Polar,
    #[serde(rename = "dodopayments")]
    DodoPayments,
    Gitlab,
    Paddle,
    Razorpay,
    #[serde(rename = "lemonsqueezy")]
    LemonSqueezy,
    #[serde(rename = "workos")]
    WorkOs,
    #[serde(rename = "woocommerce")]
    WooCommerce,
    Replicate,
    Fal,
    Sentry,
    Grafana,
    Doppler,
    Sanity,
    Supabase,
    Custom,
    Unknown,
}

impl Display for ProviderTag {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let json = serde_json::to_string(self).map_err(|_| std::fmt::Error)?;
        write!(f, "{}", json.trim_matches('"'))
    }
}

/// Parses the same lowercase wire strings [`Display`] produces (e.g. the
/// path segment in the demo binary's `POST /webhooks/:provider` route).
impl std::str::FromStr for ProviderTag {
    type Err = serde_json::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        serde_json::from_value(serde_json::Value::String(s.to_string()))
    }
}

/// The signature/MAC algorithm a scheme verifies with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Algorithm {
    HmacSha1,
    HmacSha256,
    HmacSha512,
    Ed25519,
    TokenEquality,
}

/// How the signature value is laid out inside its header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderFormat {
    /// The header value *is* the signature (after trimming).
    Raw,
    /// The header value is the signature with a fixed literal prefix; the
    /// prefix is part of what gets compared, not stripped before decoding.
    Prefixed(&'static str),
    /// `k=v` pairs joined by `,` or `;`, e.g. `t=123,v1=abcd` or `ts=1;h1=2`.
    Delimited {
        separator: char,
        sig_key: &'static str,
        ts_key: &'static str,
    },
    /// The standard-webhooks (svix) convention: `v1,<sig>`, optionally
    /// several space-separated `v<n>,<sig>` tokens.
    SvixStyle,
}

/// The unit a `header`-sourced timestamp is expressed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimestampUnit {
    UnixSeconds,
    UnixMilliseconds,
    Iso8601,
}

/// Where a scheme's freshness timestamp comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimestampSource {
    None,
    Header {
        name: &'static str,
        unit: TimestampUnit,
    },
    /// Read from the same delimited signature header, e.g. Stripe's `t=`.
    EmbeddedInSignature { key: &'static str },
}

/// How the exact signed bytes are reconstructed from the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadForm {
    /// The body, unchanged.
    Raw,
    /// `"<timestamp><separator><body>"`.
    Timestamped { separator: char },
    /// Re-serialize the parsed JSON body with no whitespace; fall back to
    /// `Raw` if the body doesn't parse as JSON.
    JsonCanonical,
    /// Substitute `{id}`, `{timestamp}`, `{body}` into a fixed template.
    /// A referenced placeholder with no value is a hard error
    /// ([`crate::error::VerificationErrorKind::PayloadMalformed`]), never a
    /// silent empty-string substitution.
    Templated { template: &'static str },
    /// Sentry's multi-candidate policy (spec §4.5): try
    /// `json-canonical(body)`, then raw body, then
    /// `json-canonical(body.data.issue_alert)` if present.
    SentryCandidates,
    /// fal.ai's payload: `"<request-id>\n<user-id>\n<timestamp>\n<sha256_hex(body)>"`.
    FalTemplate {
        request_id_header: &'static str,
        user_id_header: &'static str,
    },
}

/// How the caller-supplied secret is transformed into HMAC key material.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecretEncoding {
    /// Use the secret's bytes directly.
    Utf8,
    /// Strip everything up to and including the first `_` (e.g. `whsec_`),
    /// then base64-decode the remainder.
    Base64WhsecPrefixed,
}

/// How public-key material is obtained for an Ed25519 scheme, or marks a
/// shared-secret (HMAC/token) scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keying {
    SharedSecret,
    /// A fixed SPKI-PEM-encoded public key.
    StaticPublicKey(&'static str),
    /// A JWKS URL to resolve (and cache/rotate) public keys from.
    Jwks(&'static str),
}

/// The immutable, per-provider record describing how a sender signs its
/// webhooks (spec §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignatureScheme {
    pub algorithm: Algorithm,
    pub signature_header: &'static str,
    pub signature_encoding: Encoding,
    pub header_format: HeaderFormat,
    pub timestamp_source: TimestampSource,
    pub payload_form: PayloadForm,
    pub secret_encoding: SecretEncoding,
    pub id_header: Option<&'static str>,
    pub keying: Keying,
    /// The provider's documented freshness window. `VerificationEngine`
    /// falls back to its own configured tolerance when a call doesn't
    /// override one (see [`crate::orchestrator::VerificationOptions`]);
    /// this field is exposed for callers that want to inspect or display a
    /// provider's documented default directly.
    pub tolerance_seconds: u64,
    /// Additional `(metadata_key, header_name)` pairs copied verbatim into
    /// [`crate::error::VerificationSuccess::metadata`] on success, e.g.
    /// GitHub's `event` from `x-github-event`.
    pub extra_metadata_headers: &'static [(&'static str, &'static str)],
    pub notes: &'static str,
}

impl SignatureScheme {
    /// The permissive fallback used for `custom` and `unknown` providers
    /// (spec §4.3): HMAC-SHA256 over the raw body, signature in
    /// `x-webhook-signature` as hex. Which exact default a `custom` tag
    /// resolves to is explicitly not observable by callers (spec §9, open
    /// question) because any caller relying on `custom` supplies its own
    /// scheme via [`crate::orchestrator::verify_with_signature_scheme`].
    pub const fn permissive_default() -> Self {
        SignatureScheme {
            algorithm: Algorithm::HmacSha256,
            signature_header: "x-webhook-signature",
            signature_encoding: Encoding::Hex,
            header_format: HeaderFormat::Raw,
            timestamp_source: TimestampSource::None,
            payload_form: PayloadForm::Raw,
            secret_encoding: SecretEncoding::Utf8,
            id_header: None,
            keying: Keying::SharedSecret,
            tolerance_seconds: 300,
            extra_metadata_headers: &[],
            notes: "permissive default for unregistered or custom providers",
        }
    }
}

const STRIPE: SignatureScheme = SignatureScheme {
    algorithm: Algorithm::HmacSha256,
    signature_header: "stripe-signature",
    signature_encoding: Encoding::Hex,
    header_format: HeaderFormat::Delimited {
        separator: ',',
        sig_key: "v1",
        ts_key: "t",
    },
    timestamp_source: TimestampSource::EmbeddedInSignature { key: "t" },
    payload_form: PayloadForm::Timestamped { separator: '.' },
    secret_encoding: SecretEncoding::Utf8,
    id_header: None,
    keying: Keying::SharedSecret,
    tolerance_seconds: 300,
    extra_metadata_headers: &[],
    notes: "t=<unix-seconds>,v1=<hex-hmac-sha256> over \"<t>.<body>\"",
};

const GITHUB: SignatureScheme = SignatureScheme {
    algorithm: Algorithm::HmacSha256,
    signature_header: "x-hub-signature-256",
    signature_encoding: Encoding::Hex,
    header_format: HeaderFormat::Prefixed("sha256="),
    timestamp_source: TimestampSource::None,
    payload_form: PayloadForm::Raw,
    secret_encoding: SecretEncoding::Utf8,
    id_header: Some("x-github-delivery"),
    keying: Keying::SharedSecret,
    tolerance_seconds: 300,
    extra_metadata_headers: &[("event", "x-github-event")],
    notes: "x-hub-signature-256: sha256=<hex> over the raw body",
};

const fn svix_style(signature_header: &'static str, notes: &'static str) -> SignatureScheme {
    SignatureScheme {
        algorithm: Algorithm::HmacSha256,
        signature_header,
        signature_encoding: Encoding::Base64,
        header_format: HeaderFormat::SvixStyle,
        timestamp_source: TimestampSource::Header {
            name: "webhook-timestamp",
            unit: TimestampUnit::UnixSeconds,
        },
        payload_form: PayloadForm::Templated {
            template: "{id}.{timestamp}.{body}",
        },
        secret_encoding: SecretEncoding::Base64WhsecPrefixed,
        id_header: Some("webhook-id"),
        keying: Keying::SharedSecret,
        tolerance_seconds: 300,
        extra_metadata_headers: &[],
        notes,
    }
}

const CLERK: SignatureScheme = svix_style(
    "svix-signature",
    "standard-webhooks: v1,<base64> over \"<webhook-id>.<webhook-timestamp>.<body>\"",
);

const POLAR: SignatureScheme = svix_style(
    "webhook-signature",
    "standard-webhooks form, disambiguated from dodopayments/replicate by user-agent",
);

const DODOPAYMENTS: SignatureScheme = svix_style(
    "webhook-signature",
    "standard-webhooks form, the default when user-agent names neither polar nor replicate",
);

const REPLICATE: SignatureScheme = svix_style(
    "webhook-signature",
    "standard-webhooks form, disambiguated from polar/dodopayments by user-agent",
);

const SHOPIFY: SignatureScheme = SignatureScheme {
    algorithm: Algorithm::HmacSha256,
    signature_header: "x-shopify-hmac-sha256",
    signature_encoding: Encoding::Base64,
    header_format: HeaderFormat::Raw,
    timestamp_source: TimestampSource::None,
    payload_form: PayloadForm::Raw,
    secret_encoding: SecretEncoding::Utf8,
    id_header: Some("x-shopify-webhook-id"),
    keying: Keying::SharedSecret,
    tolerance_seconds: 300,
    extra_metadata_headers: &[],
    notes: "base64 HMAC-SHA256 over raw body, UTF-8 secret (Shopify's documented behavior)",
};

const VERCEL: SignatureScheme = SignatureScheme {
    algorithm: Algorithm::HmacSha256,
    signature_header: "x-vercel-signature",
    signature_encoding: Encoding::Hex,
    header_format: HeaderFormat::Raw,
    timestamp_source: TimestampSource::None,
    payload_form: PayloadForm::Raw,
    secret_encoding: SecretEncoding::Utf8,
    id_header: None,
    keying: Keying::SharedSecret,
    tolerance_seconds: 300,
    extra_metadata_headers: &[],
    notes: "hex HMAC-SHA256 over raw body",
};

const GITLAB: SignatureScheme = SignatureScheme {
    algorithm: Algorithm::TokenEquality,
    signature_header: "x-gitlab-token",
    signature_encoding: Encoding::Hex,
    header_format: HeaderFormat::Raw,
    timestamp_source: TimestampSource::None,
    payload_form: PayloadForm::Raw,
    secret_encoding: SecretEncoding::Utf8,
    id_header: None,
    keying: Keying::SharedSecret,
    tolerance_seconds: 300,
    extra_metadata_headers: &[],
    notes: "token equality on x-gitlab-token, no HMAC involved",
};

const PADDLE: SignatureScheme = SignatureScheme {
    algorithm: Algorithm::HmacSha256,
    signature_header: "paddle-signature",
    signature_encoding: Encoding::Hex,
    header_format: HeaderFormat::Delimited {
        separator: ';',
        sig_key: "h1",
        ts_key: "ts",
    },
    timestamp_source: TimestampSource::EmbeddedInSignature { key: "ts" },
    payload_form: PayloadForm::Timestamped { separator: ':' },
    secret_encoding: SecretEncoding::Utf8,
    id_header: None,
    keying: Keying::SharedSecret,
    tolerance_seconds: 300,
    extra_metadata_headers: &[],
    notes: "ts=<t>;h1=<hex> over \"<t>:<body>\" (Paddle uses ':' not '.')",
};

const RAZORPAY: SignatureScheme = SignatureScheme {
    algorithm: Algorithm::HmacSha256,
    signature_header: "x-razorpay-signature",
    signature_encoding: Encoding::Hex,
    header_format: HeaderFormat::Raw,
    timestamp_source: TimestampSource::None,
    payload_form: PayloadForm::Raw,
    secret_encoding: SecretEncoding::Utf8,
    id_header: None,
    keying: Keying::SharedSecret,
    tolerance_seconds: 300,
    extra_metadata_headers: &[],
    notes: "hex HMAC-SHA256 over raw body",
};

const LEMONSQUEEZY: SignatureScheme = SignatureScheme {
    algorithm: Algorithm::HmacSha256,
    signature_header: "x-signature",
    signature_encoding: Encoding::Hex,
    header_format: HeaderFormat::Raw,
    timestamp_source: TimestampSource::None,
    payload_form: PayloadForm::Raw,
    secret_encoding: SecretEncoding::Utf8,
    id_header: None,
    keying: Keying::SharedSecret,
    tolerance_seconds: 300,
    extra_metadata_headers: &[],
    notes: "hex HMAC-SHA256 over raw body",
};

const WORKOS: SignatureScheme = SignatureScheme {
    algorithm: Algorithm::HmacSha256,
    signature_header: "workos-signature",
    signature_encoding: Encoding::Hex,
    header_format: HeaderFormat::Delimited {
        separator: ',',
        sig_key: "v1",
        ts_key: "t",
    },
    timestamp_source: TimestampSource::EmbeddedInSignature { key: "t" },
    payload_form: PayloadForm::Timestamped { separator: '.' },
    secret_encoding: SecretEncoding::Utf8,
    id_header: None,
    keying: Keying::SharedSecret,
    tolerance_seconds: 300,
    extra_metadata_headers: &[],
    notes: "t=<t>,v1=<hex> over \"<t>.<body>\"",
};

const WOOCOMMERCE: SignatureScheme = SignatureScheme {
    algorithm: Algorithm::HmacSha256,
    signature_header: "x-wc-webhook-signature",
    signature_encoding: Encoding::Base64,
    header_format: HeaderFormat::Raw,
    timestamp_source: TimestampSource::None,
    payload_form: PayloadForm::Raw,
    secret_encoding: SecretEncoding::Utf8,
    id_header: None,
    keying: Keying::SharedSecret,
    tolerance_seconds: 300,
    extra_metadata_headers: &[],
    notes: "base64 HMAC-SHA256 over raw body",
};

const SENTRY: SignatureScheme = SignatureScheme {
    algorithm: Algorithm::HmacSha256,
    signature_header: "sentry-hook-signature",
    signature_encoding: Encoding::Hex,
    header_format: HeaderFormat::Raw,
    timestamp_source: TimestampSource::None,
    payload_form: PayloadForm::SentryCandidates,
    secret_encoding: SecretEncoding::Utf8,
    id_header: Some("request-id"),
    keying: Keying::SharedSecret,
    tolerance_seconds: 300,
    extra_metadata_headers: &[],
    notes: "hex HMAC-SHA256 over json-canonical(body), raw body, or json-canonical(body.data.issue_alert)",
};

const GRAFANA: SignatureScheme = SignatureScheme {
    algorithm: Algorithm::HmacSha256,
    signature_header: "x-grafana-alerting-signature",
    signature_encoding: Encoding::Hex,
    header_format: HeaderFormat::Raw,
    timestamp_source: TimestampSource::None,
    payload_form: PayloadForm::Raw,
    secret_encoding: SecretEncoding::Utf8,
    id_header: None,
    keying: Keying::SharedSecret,
    tolerance_seconds: 300,
    extra_metadata_headers: &[],
    notes: "hex HMAC-SHA256 over raw body (no dedicated timestamp header is registered)",
};

const DOPPLER: SignatureScheme = SignatureScheme {
    algorithm: Algorithm::HmacSha256,
    signature_header: "x-doppler-signature",
    signature_encoding: Encoding::Hex,
    header_format: HeaderFormat::Prefixed("sha256="),
    timestamp_source: TimestampSource::None,
    payload_form: PayloadForm::Raw,
    secret_encoding: SecretEncoding::Utf8,
    id_header: None,
    keying: Keying::SharedSecret,
    tolerance_seconds: 300,
    extra_metadata_headers: &[],
    notes: "x-doppler-signature: sha256=<hex> over raw body",
};

const SANITY: SignatureScheme = SignatureScheme {
    algorithm: Algorithm::HmacSha256,
    signature_header: "sanity-webhook-signature",
    signature_encoding: Encoding::Hex,
    header_format: HeaderFormat::Delimited {
        separator: ',',
        sig_key: "v1",
        ts_key: "t",
    },
    timestamp_source: TimestampSource::EmbeddedInSignature { key: "t" },
    payload_form: PayloadForm::Timestamped { separator: '.' },
    secret_encoding: SecretEncoding::Utf8,
    id_header: Some("idempotency-key"),
    keying: Keying::SharedSecret,
    tolerance_seconds: 300,
    extra_metadata_headers: &[],
    notes: "t=<t>,v1=<hex> over \"<t>.<body>\"",
};

const FAL: SignatureScheme = SignatureScheme {
    algorithm: Algorithm::Ed25519,
    signature_header: "x-fal-webhook-signature",
    signature_encoding: Encoding::Hex,
    header_format: HeaderFormat::Raw,
    timestamp_source: TimestampSource::Header {
        name: "x-fal-webhook-timestamp",
        unit: TimestampUnit::UnixSeconds,
    },
    payload_form: PayloadForm::FalTemplate {
        request_id_header: "x-fal-webhook-request-id",
        user_id_header: "x-fal-webhook-user-id",
    },
    secret_encoding: SecretEncoding::Utf8,
    id_header: Some("x-fal-webhook-request-id"),
    keying: Keying::Jwks("https://rest.alpha.fal.ai/.well-known/jwks.json"),
    tolerance_seconds: 300,
    extra_metadata_headers: &[],
    notes: "Ed25519, hex signature, \"<request-id>\\n<user-id>\\n<timestamp>\\n<sha256_hex(body)>\"",
};

/// `(provider, scheme)` pairs making up the registry. Exposed mainly for
/// tests; prefer [`scheme_for`]/[`SchemeRegistry`] in application code.
pub static KNOWN_SCHEMES: &[(ProviderTag, SignatureScheme)] = &[
    (ProviderTag::Stripe, STRIPE),
    (ProviderTag::Github, GITHUB),
    (ProviderTag::Clerk, CLERK),
    (ProviderTag::Shopify, SHOPIFY),
    (ProviderTag::Vercel, VERCEL),
    (ProviderTag::Polar, POLAR),
    (ProviderTag::DodoPayments, DODOPAYMENTS),
    (ProviderTag::Gitlab, GITLAB),
    (ProviderTag::Paddle, PADDLE),
    (ProviderTag::Razorpay, RAZORPAY),
    (ProviderTag::LemonSqueezy, LEMONSQUEEZY),
    (ProviderTag::WorkOs, WORKOS),
    (ProviderTag::WooCommerce, WOOCOMMERCE),
    (ProviderTag::Replicate, REPLICATE),
    (ProviderTag::Fal, FAL),
    (ProviderTag::Sentry, SENTRY),
    (ProviderTag::Grafana, GRAFANA),
    (ProviderTag::Doppler, DOPPLER),
    (ProviderTag::Sanity, SANITY),
];

static SCHEME_MAP: Lazy<HashMap<ProviderTag, SignatureScheme>> =
    Lazy::new(|| KNOWN_SCHEMES.iter().copied().collect());

/// Total lookup: unknown or unregistered providers (`custom`, `unknown`,
/// `supabase` — which has no wire scheme of its own, only a normalization
/// category) resolve to [`SignatureScheme::permissive_default`].
pub fn scheme_for(provider: ProviderTag) -> SignatureScheme {
    SCHEME_MAP
        .get(&provider)
        .copied()
        .unwrap_or_else(SignatureScheme::permissive_default)
}

/// Validates a scheme's invariants (spec §4.3). A scheme failing validation
/// should never be registered or handed to the orchestrator.
pub fn validate(scheme: &SignatureScheme) -> bool {
    match scheme.algorithm {
        Algorithm::HmacSha1 | Algorithm::HmacSha256 | Algorithm::HmacSha512 => {
            !scheme.signature_header.is_empty()
        }
        Algorithm::Ed25519 => matches!(
            scheme.keying,
            Keying::StaticPublicKey(_) | Keying::Jwks(_)
        ),
        Algorithm::TokenEquality => !scheme.signature_header.is_empty(),
    }
}

/// All providers registered under the given algorithm.
pub fn providers_using(algorithm: Algorithm) -> Vec<ProviderTag> {
    KNOWN_SCHEMES
        .iter()
        .filter(|(_, scheme)| scheme.algorithm == algorithm)
        .map(|(provider, _)| *provider)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_registered_scheme_validates() {
        for (provider, scheme) in KNOWN_SCHEMES {
            assert!(validate(scheme), "{provider} scheme failed validation");
        }
    }

    #[test]
    fn unknown_and_custom_resolve_to_permissive_default() {
        let unknown = scheme_for(ProviderTag::Unknown);
        let custom = scheme_for(ProviderTag::Custom);
        assert_eq!(unknown, custom);
        assert_eq!(unknown.signature_header, "x-webhook-signature");
    }

    #[test]
    fn providers_using_ed25519_is_exactly_fal() {
        assert_eq!(providers_using(Algorithm::Ed25519), vec![ProviderTag::Fal]);
    }

    #[test]
    fn providers_using_token_equality_is_exactly_gitlab() {
        assert_eq!(
            providers_using(Algorithm::TokenEquality),
            vec![ProviderTag::Gitlab]
        );
    }

    #[test]
    fn provider_tag_display_matches_wire_strings() {
        assert_eq!(ProviderTag::DodoPayments.to_string(), "dodopayments");
        assert_eq!(ProviderTag::LemonSqueezy.to_string(), "lemonsqueezy");
        assert_eq!(ProviderTag::WorkOs.to_string(), "workos");
        assert_eq!(ProviderTag::WooCommerce.to_string(), "woocommerce");
        assert_eq!(ProviderTag::Stripe.to_string(), "stripe");
    }

    #[test]
    fn invalid_ed25519_scheme_fails_validation() {
        let mut bad = FAL;
        bad.keying = Keying::SharedSecret;
        assert!(!validate(&bad));
    }
}
