//! Normalizer (spec §4.11): a pure, synchronous, best-effort map from
//! `(provider, parsed body)` to one of three category-shaped records. This
//! is the only post-verification transform in the engine's scope — it never
//! touches headers, signatures, or timestamps, and a failure here never
//! overturns a verification [`crate::error::VerificationSuccess`].

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ParsedBody;
use crate::scheme::ProviderTag;

/// The three normalization categories (spec §4.11), plus `unknown` for
/// providers with no category mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Payment,
    Auth,
    Infrastructure,
    Unknown,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentRecord {
    pub event: Option<String>,
    pub amount: Option<String>,
    /// Uppercased per spec §4.11 (`currency` (uppercased)).
    pub currency: Option<String>,
    pub customer_id: Option<String>,
    pub transaction_id: Option<String>,
    pub metadata: HashMap<String, Value>,
    pub occurred_at: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthRecord {
    pub event: Option<String>,
    pub user_id: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub metadata: HashMap<String, Value>,
    pub occurred_at: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InfrastructureRecord {
    pub event: Option<String>,
    pub project_id: Option<String>,
    pub deployment_id: Option<String>,
    pub status: Option<String>,
    pub metadata: HashMap<String, Value>,
    pub occurred_at: Option<String>,
}

/// Returned for a provider with no category mapping, or when normalization
/// is requested but the body doesn't parse as JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnknownRecord {
    pub warning: String,
}

/// The category-tagged normalized record. Every variant carries `_platform`
/// and, when requested, `_raw` (spec §4.11).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "category", rename_all = "snake_case")]
pub enum NormalizedRecord {
    Payment {
        #[serde(rename = "_platform")]
        platform: ProviderTag,
        #[serde(flatten)]
        record: PaymentRecord,
        #[serde(rename = "_raw", skip_serializing_if = "Option::is_none")]
        raw: Option<Value>,
    },
    Auth {
        #[serde(rename = "_platform")]
        platform: ProviderTag,
        #[serde(flatten)]
        record: AuthRecord,
        #[serde(rename = "_raw", skip_serializing_if = "Option::is_none")]
        raw: Option<Value>,
    },
    Infrastructure {
        #[serde(rename = "_platform")]
        platform: ProviderTag,
        #[serde(flatten)]
        record: InfrastructureRecord,
        #[serde(rename = "_raw", skip_serializing_if = "Option::is_none")]
        raw: Option<Value>,
    },
    Unknown {
        #[serde(rename = "_platform")]
        platform: ProviderTag,
        #[serde(flatten)]
        record: UnknownRecord,
        #[serde(rename = "_raw", skip_serializing_if = "Option::is_none")]
        raw: Option<Value>,
    },
}

/// Caller-supplied normalization options (spec §6 `options.normalize`).
#[derive(Debug, Clone, Copy, Default)]
pub struct NormalizeOptions {
    /// Forces a category rather than using the provider's default mapping.
    pub category: Option<Category>,
    pub include_raw: bool,
}

/// The provider → category table (spec §4.11: "subset"). Payment processors
/// and billing platforms map to `payment`; identity/auth providers to
/// `auth`; deployment, VCS, observability, and ML-serving platforms to
/// `infrastructure`. Providers with no natural category (token-equality
/// VCS webhooks aside) fall through to `unknown`.
fn category_for(provider: ProviderTag) -> Option<Category> {
    use ProviderTag::*;
    match provider {
        Stripe | Polar | DodoPayments | Paddle | Razorpay | LemonSqueezy | Shopify | WooCommerce => {
            Some(Category::Payment)
        }
        Clerk | Supabase | WorkOs => Some(Category::Auth),
        Vercel | Gitlab | Github | Sentry | Grafana | Doppler | Sanity | Replicate | Fal => {
            Some(Category::Infrastructure)
        }
        Custom | Unknown => None,
    }
}

/// Walks a dotted JSON path with optional `[index]` segments, e.g.
/// `"data.email_addresses[0].email_address"`. Mirrors
/// [`crate::event_id::json_path`]'s segment grammar so both modules resolve
/// the same shape of provider payload the same way.
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

fn get_str(body: &Value, paths: &[&str]) -> Option<String> {
    for path in paths {
        match json_path(body, path) {
            Some(Value::String(s)) if !s.is_empty() => return Some(s.clone()),
            Some(Value::Number(n)) => return Some(n.to_string()),
            _ => {}
        }
    }
    None
}

fn metadata_object(body: &Value) -> HashMap<String, Value> {
    body.get("metadata")
        .and_then(Value::as_object)
        .map(|m| m.clone().into_iter().collect())
        .unwrap_or_default()
}

fn to_payment(body: &Value) -> PaymentRecord {
    PaymentRecord {
        event: get_str(body, &["event", "type", "event_type"]),
        amount: get_str(body, &["amount", "data.amount", "data.object.amount"]),
        currency: get_str(body, &["currency", "data.currency", "data.object.currency"])
            .map(|c| c.to_ascii_uppercase()),
        customer_id: get_str(body, &["customer_id", "customer", "data.customer_id", "data.object.customer"]),
        transaction_id: get_str(body, &["transaction_id", "id", "data.id", "data.object.id"]),
        metadata: metadata_object(body),
        occurred_at: get_str(body, &["occurred_at", "created_at", "created", "timestamp"]),
    }
}

fn to_auth(body: &Value) -> AuthRecord {
    AuthRecord {
        event: get_str(body, &["event", "type", "event_type"]),
        user_id: get_str(body, &["user_id", "id", "data.id", "data.user_id"]),
        email: get_str(body, &["email", "data.email", "data.email_addresses[0].email_address"]),
        phone: get_str(body, &["phone", "data.phone", "data.phone_numbers[0].phone_number"]),
        metadata: metadata_object(body),
        occurred_at: get_str(body, &["occurred_at", "created_at", "created", "timestamp"]),
    }
}

fn to_infrastructure(body: &Value) -> InfrastructureRecord {
    InfrastructureRecord {
        event: get_str(body, &["event", "type", "event_type"]),
        project_id: get_str(body, &["project_id", "project.id", "data.project_id"]),
        deployment_id: get_str(body, &["deployment_id", "deployment.id", "data.id"]),
        status: get_str(body, &["status", "state", "data.status"]),
        metadata: metadata_object(body),
        occurred_at: get_str(body, &["occurred_at", "created_at", "created", "timestamp"]),
    }
}

/// Normalizes a verified payload into a category-shaped record. Pure and
/// synchronous: never fails the surrounding verification. A provider with
/// no mapping, or a non-JSON body, yields `NormalizedRecord::Unknown` with
/// a warning string, preserving `_raw` if requested.
pub fn normalize(provider: ProviderTag, body: &ParsedBody, options: NormalizeOptions) -> NormalizedRecord {
    let raw = options.include_raw.then(|| match body {
        ParsedBody::Json(v) => v.clone(),
        ParsedBody::Raw(bytes) => Value::String(String::from_utf8_lossy(bytes).into_owned()),
    });

    let Some(json) = body.as_json() else {
        return NormalizedRecord::Unknown {
            platform: provider,
            record: UnknownRecord {
                warning: "payload did not parse as JSON; normalization skipped".to_string(),
            },
            raw,
        };
    };

    let category = options.category.or_else(|| category_for(provider));
    match category {
        Some(Category::Payment) => NormalizedRecord::Payment {
            platform: provider,
            record: to_payment(json),
            raw,
        },
        Some(Category::Auth) => NormalizedRecord::Auth {
            platform: provider,
            record: to_auth(json),
            raw,
        },
        Some(Category::Infrastructure) => NormalizedRecord::Infrastructure {
            platform: provider,
            record: to_infrastructure(json),
            raw,
        },
        Some(Category::Unknown) | None => NormalizedRecord::Unknown {
            platform: provider,
            record: UnknownRecord {
                warning: format!("no normalization category registered for provider {provider}"),
            },
            raw,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn stripe_normalizes_to_payment() {
        let body = ParsedBody::Json(json!({
            "event": "charge.succeeded",
            "amount": 1000,
            "currency": "usd",
            "customer_id": "cus_1",
            "id": "evt_1",
        }));
        let result = normalize(ProviderTag::Stripe, &body, NormalizeOptions::default());
        match result {
            NormalizedRecord::Payment { platform, record, raw } => {
                assert_eq!(platform, ProviderTag::Stripe);
                assert_eq!(record.currency.as_deref(), Some("USD"));
                assert_eq!(record.transaction_id.as_deref(), Some("evt_1"));
                assert!(raw.is_none());
            }
            other => panic!("expected Payment, got {other:?}"),
        }
    }

    #[test]
    fn clerk_normalizes_to_auth() {
        let body = ParsedBody::Json(json!({"type": "user.created", "data": {"id": "user_1", "email": "a@b.com"}}));
        let result = normalize(ProviderTag::Clerk, &body, NormalizeOptions::default());
        assert!(matches!(result, NormalizedRecord::Auth { .. }));
    }

    #[test]
    fn clerk_resolves_email_and_phone_from_nested_arrays() {
        let body = ParsedBody::Json(json!({
            "type": "user.created",
            "data": {
                "id": "user_1",
                "email_addresses": [{"email_address": "a@b.com"}],
                "phone_numbers": [{"phone_number": "+15551234567"}],
            },
        }));
        let result = normalize(ProviderTag::Clerk, &body, NormalizeOptions::default());
        match result {
            NormalizedRecord::Auth { record, .. } => {
                assert_eq!(record.email.as_deref(), Some("a@b.com"));
                assert_eq!(record.phone.as_deref(), Some("+15551234567"));
            }
            other => panic!("expected Auth, got {other:?}"),
        }
    }

    #[test]
    fn vercel_normalizes_to_infrastructure() {
        let body = ParsedBody::Json(json!({"type": "deployment.created", "status": "READY"}));
        let result = normalize(ProviderTag::Vercel, &body, NormalizeOptions::default());
        match result {
            NormalizedRecord::Infrastructure { record, .. } => {
                assert_eq!(record.status.as_deref(), Some("READY"));
            }
            other => panic!("expected Infrastructure, got {other:?}"),
        }
    }

    #[test]
    fn unmapped_provider_yields_unknown_with_warning() {
        let body = ParsedBody::Json(json!({"foo": "bar"}));
        let result = normalize(ProviderTag::Unknown, &body, NormalizeOptions::default());
        match result {
            NormalizedRecord::Unknown { record, .. } => assert!(record.warning.contains("no normalization category")),
            other => panic!("expected Unknown, got {other:?}"),
        }
    }

    #[test]
    fn include_raw_preserves_original_body() {
        let body = ParsedBody::Json(json!({"event": "x"}));
        let result = normalize(
            ProviderTag::Stripe,
            &body,
            NormalizeOptions {
                category: None,
                include_raw: true,
            },
        );
        match result {
            NormalizedRecord::Payment { raw, .. } => assert!(raw.is_some()),
            other => panic!("expected Payment, got {other:?}"),
        }
    }

    #[test]
    fn non_json_body_yields_unknown_even_for_mapped_provider() {
        let body = ParsedBody::Raw(b"not json".to_vec());
        let result = normalize(ProviderTag::Stripe, &body, NormalizeOptions::default());
        assert!(matches!(result, NormalizedRecord::Unknown { .. }));
    }

    #[test]
    fn explicit_category_override_wins_over_provider_mapping() {
        let body = ParsedBody::Json(json!({"event": "x"}));
        let result = normalize(
            ProviderTag::Stripe,
            &body,
            NormalizeOptions {
                category: Some(Category::Auth),
                include_raw: false,
            },
        );
        assert!(matches!(result, NormalizedRecord::Auth { .. }));
    }
}
