//! Canonical event-ID resolution (spec §4.10): extracting a provider's
//! idempotency-key-equivalent from the parsed payload or metadata, and
//! assembling the stable `"{provider}_{raw-id}"` form downstream consumers
//! use for at-most-once processing.

use std::collections::HashMap;

use serde_json::Value;

use crate::ct::sha256_hex;
use crate::error::ParsedBody;
use crate::scheme::ProviderTag;

/// Walks a dotted JSON path with optional `[index]` segments, e.g.
/// `"payload.alerts[0].fingerprint"`. Returns `None` on any missing or
/// type-mismatched segment.
fn json_path<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = value;
    for segment in path.split('.') {
        let (key, index) = match segment.split_once('[') {
            Some((key, rest)) => {
                let idx_str = rest.strip_suffix(']')?;
                (key, Some(idx_str.parse::<usize>().ok()?))
            }
            None => (segment, None),
        };
        current = if key.is_empty() {
            current
        } else {
            current.as_object()?.get(key)?
        };
        if let Some(idx) = index {
            current = current.as_array()?.get(idx)?;
        }
    }
    Some(current)
}

/// A JSON value counts as present for id resolution when it's a non-empty
/// string (spec §4.10: "first non-empty, non-undefined/null string wins").
/// Numbers are also accepted and stringified — several providers (GitLab's
/// `project.id`, Paddle's numeric ids) carry ids as JSON numbers.
fn stringify_present(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn from_body(body: &ParsedBody, path: &str) -> Option<String> {
    let json = body.as_json()?;
    stringify_present(json_path(json, path)?)
}

fn from_metadata(metadata: &HashMap<String, String>, key: &str) -> Option<String> {
    metadata.get(key).filter(|v| !v.is_empty()).cloned()
}

/// Per-provider priority-ordered extraction (spec §4.10 table). Returns the
/// raw id string, not yet prefixed with the provider tag.
fn resolve_raw_id(provider: ProviderTag, body: &ParsedBody, metadata: &HashMap<String, String>, raw_body: &[u8]) -> Option<String> {
    match provider {
        ProviderTag::Stripe => from_body(body, "request.idempotency_key")
            .or_else(|| from_body(body, "id"))
            .or_else(|| from_metadata(metadata, "id")),
        ProviderTag::Github => from_metadata(metadata, "delivery")
            .or_else(|| from_metadata(metadata, "id"))
            .or_else(|| from_body(body, "id")),
        ProviderTag::Clerk | ProviderTag::Shopify => {
            from_metadata(metadata, "id").or_else(|| from_body(body, "id"))
        }
        ProviderTag::Polar => from_body(body, "data.id")
            .or_else(|| from_body(body, "id"))
            .or_else(|| from_metadata(metadata, "id")),
        ProviderTag::DodoPayments => from_body(body, "data.payment_id")
            .or_else(|| from_body(body, "data.subscription_id"))
            .or_else(|| from_body(body, "data.id"))
            .or_else(|| from_metadata(metadata, "id")),
        ProviderTag::Gitlab => from_body(body, "object_attributes.id")
            .or_else(|| from_body(body, "project.id"))
            .or_else(|| from_metadata(metadata, "id")),
        ProviderTag::Paddle => from_body(body, "event_id")
            .or_else(|| from_body(body, "data.id"))
            .or_else(|| from_metadata(metadata, "id")),
        ProviderTag::Razorpay => from_body(body, "payload.payment.entity.id")
            .or_else(|| from_body(body, "payload.order.entity.id"))
            .or_else(|| from_body(body, "payload.subscription.entity.id"))
            .or_else(|| from_body(body, "id"))
            .or_else(|| from_metadata(metadata, "id")),
        ProviderTag::LemonSqueezy => {
            let event_name = from_body(body, "meta.event_name");
            let data_id = from_body(body, "data.id");
            match (event_name, data_id) {
                (Some(name), Some(id)) => Some(format!("{name}{id}")),
                (None, Some(id)) => Some(id),
                _ => from_body(body, "id").or_else(|| from_metadata(metadata, "id")),
            }
        }
        ProviderTag::WorkOs | ProviderTag::Vercel | ProviderTag::Replicate | ProviderTag::Sentry => {
            from_body(body, "id").or_else(|| from_metadata(metadata, "id"))
        }
        ProviderTag::Fal => from_body(body, "request_id").or_else(|| from_metadata(metadata, "id")),
        ProviderTag::Grafana => from_body(body, "groupKey")
            .or_else(|| from_body(body, "alerts[0].fingerprint"))
            .or_else(|| from_metadata(metadata, "id")),
        ProviderTag::Doppler => from_body(body, "event.id")
            .or_else(|| from_metadata(metadata, "id"))
            .or_else(|| {
                let timestamp = metadata.get("timestamp").map(String::as_str).unwrap_or("");
                Some(sha256_hex(
                    format!("{timestamp}:{}", String::from_utf8_lossy(raw_body)).as_bytes(),
                ))
            }),
        ProviderTag::Sanity => from_body(body, "transactionId")
            .or_else(|| from_body(body, "_id"))
            .or_else(|| from_metadata(metadata, "id")),
        ProviderTag::WooCommerce | ProviderTag::Supabase | ProviderTag::Custom | ProviderTag::Unknown => {
            default_resolution(body, metadata)
        }
    }
}

/// The fallback chain for providers (or `custom`/`unknown`) with no
/// dedicated priority order (spec §4.10 "default" row).
fn default_resolution(body: &ParsedBody, metadata: &HashMap<String, String>) -> Option<String> {
    for field in ["idempotency_key", "event_id", "webhook_id", "request_id", "id"] {
        if let Some(id) = from_body(body, field) {
            return Some(id);
        }
    }
    from_body(body, "data.id")
        .or_else(|| from_metadata(metadata, "id"))
        .or_else(|| from_metadata(metadata, "delivery"))
        .or_else(|| from_metadata(metadata, "requestId"))
}

/// Computes `"{provider}_{raw-id}"` (spec §4.10), or
/// `"{provider}_generated-missing-{provider}"` when nothing resolves —
/// callers may treat the latter form as non-idempotent.
pub fn canonical_event_id(
    provider: ProviderTag,
    body: &ParsedBody,
    metadata: &HashMap<String, String>,
    raw_body: &[u8],
) -> String {
    match resolve_raw_id(provider, body, metadata, raw_body) {
        Some(raw_id) => format!("{provider}_{raw_id}"),
        None => format!("{provider}_generated-missing-{provider}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn body_of(value: Value) -> ParsedBody {
        ParsedBody::Json(value)
    }

    #[test]
    fn stripe_prefers_idempotency_key() {
        let body = body_of(json!({"request": {"idempotency_key": "idem_1"}, "id": "evt_1"}));
        let metadata = HashMap::new();
        assert_eq!(
            canonical_event_id(ProviderTag::Stripe, &body, &metadata, b""),
            "stripe_idem_1"
        );
    }

    #[test]
    fn stripe_falls_back_to_payload_id() {
        let body = body_of(json!({"id": "evt_1"}));
        let metadata = HashMap::new();
        assert_eq!(
            canonical_event_id(ProviderTag::Stripe, &body, &metadata, b""),
            "stripe_evt_1"
        );
    }

    #[test]
    fn github_prefers_metadata_delivery() {
        let body = body_of(json!({"id": "ignored"}));
        let mut metadata = HashMap::new();
        metadata.insert("delivery".to_string(), "test-delivery-id".to_string());
        assert_eq!(
            canonical_event_id(ProviderTag::Github, &body, &metadata, b""),
            "github_test-delivery-id"
        );
    }

    #[test]
    fn grafana_reads_first_alert_fingerprint() {
        let body = body_of(json!({"alerts": [{"fingerprint": "fp1"}, {"fingerprint": "fp2"}]}));
        let metadata = HashMap::new();
        assert_eq!(
            canonical_event_id(ProviderTag::Grafana, &body, &metadata, b""),
            "grafana_fp1"
        );
    }

    #[test]
    fn lemonsqueezy_concatenates_event_name_and_data_id() {
        let body = body_of(json!({"meta": {"event_name": "order_created"}, "data": {"id": "1"}}));
        let metadata = HashMap::new();
        assert_eq!(
            canonical_event_id(ProviderTag::LemonSqueezy, &body, &metadata, b""),
            "lemonsqueezy_order_created1"
        );
    }

    #[test]
    fn doppler_synthesizes_hash_when_absent() {
        let body = body_of(json!({}));
        let mut metadata = HashMap::new();
        metadata.insert("timestamp".to_string(), "1700000000".to_string());
        let id = canonical_event_id(ProviderTag::Doppler, &body, &metadata, b"raw-body");
        assert!(id.starts_with("doppler_"));
        assert_eq!(id.len(), "doppler_".len() + 64);
    }

    #[test]
    fn nothing_resolves_yields_generated_missing() {
        let body = body_of(json!({}));
        let metadata = HashMap::new();
        assert_eq!(
            canonical_event_id(ProviderTag::Vercel, &body, &metadata, b""),
            "vercel_generated-missing-vercel"
        );
    }

    #[test]
    fn raw_body_yields_no_json_path_match() {
        let body = ParsedBody::Raw(b"not json".to_vec());
        let metadata = HashMap::new();
        assert_eq!(
            canonical_event_id(ProviderTag::Shopify, &body, &metadata, b""),
            "shopify_generated-missing-shopify"
        );
    }
}
