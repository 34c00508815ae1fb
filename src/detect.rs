//! Provider detector (spec §4.9): a deterministic, header-driven classifier
//! used when a caller doesn't name a provider up front ([`crate::orchestrator::verify_any`]'s
//! fast path).
//!
//! Rules are evaluated in a fixed order; the first match wins. `webhook-signature`
//! is ambiguous between three standard-webhooks senders and is disambiguated
//! by a `user-agent` substring (spec §9, open question).

use crate::request::VerificationRequest;
use crate::scheme::ProviderTag;

/// Fixed-order `(header name, provider)` rules. Header names are matched
/// case-insensitively via [`VerificationRequest::header`].
const HEADER_RULES: &[(&str, ProviderTag)] = &[
    ("stripe-signature", ProviderTag::Stripe),
    ("x-hub-signature-256", ProviderTag::Github),
    ("svix-signature", ProviderTag::Clerk),
    ("workos-signature", ProviderTag::WorkOs),
    ("paddle-signature", ProviderTag::Paddle),
    ("x-razorpay-signature", ProviderTag::Razorpay),
    ("x-signature", ProviderTag::LemonSqueezy),
    ("x-wc-webhook-signature", ProviderTag::WooCommerce),
    ("x-fal-webhook-signature", ProviderTag::Fal),
    ("x-fal-signature", ProviderTag::Fal),
    ("sentry-hook-signature", ProviderTag::Sentry),
    ("x-grafana-alerting-signature", ProviderTag::Grafana),
    ("x-doppler-signature", ProviderTag::Doppler),
    ("sanity-webhook-signature", ProviderTag::Sanity),
    ("x-shopify-hmac-sha256", ProviderTag::Shopify),
    ("x-vercel-signature", ProviderTag::Vercel),
    ("x-gitlab-token", ProviderTag::Gitlab),
    // Some Polar source variants sign with a provider-specific header
    // instead of the standard-webhooks `webhook-signature` form (spec §9,
    // open question); detecting it directly means a request carrying it
    // is still recognized as Polar even though the registered scheme
    // verifies the standard-webhooks form.
    ("x-polar-signature", ProviderTag::Polar),
];

/// Disambiguates the ambiguous `webhook-signature` standard-webhooks header
/// by a `user-agent` substring.
fn disambiguate_standard_webhooks(req: &VerificationRequest) -> ProviderTag {
    let user_agent = req.header("user-agent").unwrap_or_default().to_ascii_lowercase();
    if user_agent.contains("polar") {
        ProviderTag::Polar
    } else if user_agent.contains("replicate") {
        ProviderTag::Replicate
    } else {
        ProviderTag::DodoPayments
    }
}

/// Classifies a request's provider by inspecting its headers. Returns
/// [`ProviderTag::Unknown`] when nothing matches.
pub fn detect_provider(req: &VerificationRequest) -> ProviderTag {
    for (header, provider) in HEADER_RULES {
        if req.header(header).is_some() {
            return *provider;
        }
    }
    if req.header("webhook-signature").is_some() {
        return disambiguate_standard_webhooks(req);
    }
    ProviderTag::Unknown
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_stripe_by_header() {
        let req = VerificationRequest::new(b"{}".to_vec()).with_header("stripe-signature", "t=1,v1=a");
        assert_eq!(detect_provider(&req), ProviderTag::Stripe);
    }

    #[test]
    fn detects_github_by_header() {
        let req = VerificationRequest::new(b"{}".to_vec()).with_header("x-hub-signature-256", "sha256=a");
        assert_eq!(detect_provider(&req), ProviderTag::Github);
    }

    #[test]
    fn webhook_signature_disambiguates_via_user_agent() {
        let polar = VerificationRequest::new(b"{}".to_vec())
            .with_header("webhook-signature", "v1,abc")
            .with_header("user-agent", "Polar-Webhook/1.0");
        assert_eq!(detect_provider(&polar), ProviderTag::Polar);

        let replicate = VerificationRequest::new(b"{}".to_vec())
            .with_header("webhook-signature", "v1,abc")
            .with_header("user-agent", "Replicate/1.0");
        assert_eq!(detect_provider(&replicate), ProviderTag::Replicate);

        let dodo = VerificationRequest::new(b"{}".to_vec())
            .with_header("webhook-signature", "v1,abc")
            .with_header("user-agent", "some-other-agent");
        assert_eq!(detect_provider(&dodo), ProviderTag::DodoPayments);
    }

    #[test]
    fn no_match_is_unknown() {
        let req = VerificationRequest::new(b"{}".to_vec());
        assert_eq!(detect_provider(&req), ProviderTag::Unknown);
    }

    #[test]
    fn gitlab_token_header_wins_over_no_signature() {
        let req = VerificationRequest::new(b"{}".to_vec()).with_header("x-gitlab-token", "secret");
        assert_eq!(detect_provider(&req), ProviderTag::Gitlab);
    }

    #[test]
    fn detects_polar_by_provider_specific_header() {
        let req = VerificationRequest::new(b"{}".to_vec()).with_header("x-polar-signature", "abc");
        assert_eq!(detect_provider(&req), ProviderTag::Polar);
    }
}
