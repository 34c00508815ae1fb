//! Payload reconstruction (spec §4.6): building the exact byte string a
//! scheme's algorithm signs, from the raw request and an already-extracted
//! timestamp.

use crate::ct::sha256_hex;
use crate::error::VerificationErrorKind;
use crate::request::VerificationRequest;
use crate::scheme::{PayloadForm, SignatureScheme};

/// Builds every candidate payload a scheme's algorithm should be checked
/// against. Most schemes produce exactly one candidate; Sentry's
/// multi-candidate policy (spec §4.5) is the only scheme that produces more
/// than one, and acceptance only requires one candidate to verify.
pub fn build_candidates(
    scheme: &SignatureScheme,
    req: &VerificationRequest,
    timestamp: Option<i64>,
) -> Result<Vec<Vec<u8>>, VerificationErrorKind> {
    match scheme.payload_form {
        PayloadForm::Raw => Ok(vec![req.body.clone()]),
        PayloadForm::Timestamped { separator } => {
            let ts = timestamp.ok_or(VerificationErrorKind::TimestampMalformed)?;
            let mut payload = ts.to_string().into_bytes();
            payload.push(separator as u8);
            payload.extend_from_slice(&req.body);
            Ok(vec![payload])
        }
        PayloadForm::JsonCanonical => Ok(vec![json_canonical_or_raw(&req.body)]),
        PayloadForm::Templated { template } => {
            let id = scheme.id_header.and_then(|name| req.header(name));
            Ok(vec![render_template(template, id, timestamp, &req.body)?])
        }
        PayloadForm::SentryCandidates => Ok(sentry_candidates(&req.body)),
        PayloadForm::FalTemplate {
            request_id_header,
            user_id_header,
        } => {
            let request_id = req
                .header(request_id_header)
                .ok_or(VerificationErrorKind::PayloadMalformed)?;
            let user_id = req
                .header(user_id_header)
                .ok_or(VerificationErrorKind::PayloadMalformed)?;
            let ts = timestamp.ok_or(VerificationErrorKind::TimestampMalformed)?;
            let payload = format!(
                "{request_id}\n{user_id}\n{ts}\n{}",
                sha256_hex(&req.body)
            );
            Ok(vec![payload.into_bytes()])
        }
    }
}

fn json_canonical_or_raw(body: &[u8]) -> Vec<u8> {
    match serde_json::from_slice::<serde_json::Value>(body) {
        Ok(value) => serde_json::to_vec(&value).unwrap_or_else(|_| body.to_vec()),
        Err(_) => body.to_vec(),
    }
}

/// Substitutes `{id}`, `{timestamp}`, `{body}` placeholders in `template`.
/// A placeholder whose value isn't available is a hard
/// [`VerificationErrorKind::PayloadMalformed`], never a silent empty string.
fn render_template(
    template: &str,
    id: Option<&str>,
    timestamp: Option<i64>,
    body: &[u8],
) -> Result<Vec<u8>, VerificationErrorKind> {
    let mut result = Vec::new();
    let mut rest = template;
    while let Some(start) = rest.find('{') {
        result.extend_from_slice(rest[..start].as_bytes());
        let after = &rest[start + 1..];
        let end = after
            .find('}')
            .ok_or(VerificationErrorKind::PayloadMalformed)?;
        let key = &after[..end];
        match key {
            "id" => {
                let id = id.ok_or(VerificationErrorKind::PayloadMalformed)?;
                result.extend_from_slice(id.as_bytes());
            }
            "timestamp" => {
                let ts = timestamp.ok_or(VerificationErrorKind::PayloadMalformed)?;
                result.extend_from_slice(ts.to_string().as_bytes());
            }
            "body" => result.extend_from_slice(body),
            _ => return Err(VerificationErrorKind::PayloadMalformed),
        }
        rest = &after[end + 1..];
    }
    result.extend_from_slice(rest.as_bytes());
    Ok(result)
}

/// Sentry signs one of three shapes depending on delivery type: the
/// canonical JSON body, the raw body, or (for issue alerts) the nested
/// `data.issue_alert` object re-serialized on its own.
fn sentry_candidates(body: &[u8]) -> Vec<Vec<u8>> {
    let mut candidates = vec![json_canonical_or_raw(body), body.to_vec()];
    if let Ok(serde_json::Value::Object(map)) = serde_json::from_slice::<serde_json::Value>(body) {
        if let Some(issue_alert) = map.get("data").and_then(|d| d.get("issue_alert")) {
            if let Ok(bytes) = serde_json::to_vec(issue_alert) {
                candidates.push(bytes);
            }
        }
    }
    candidates
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::VerificationRequest;

    #[test]
    fn timestamped_payload_joins_with_configured_separator() {
        let scheme = crate::scheme::scheme_for(crate::scheme::ProviderTag::Paddle);
        let req = VerificationRequest::new(b"{\"a\":1}".to_vec());
        let candidates = build_candidates(&scheme, &req, Some(1700000000)).unwrap();
        assert_eq!(candidates, vec![b"1700000000:{\"a\":1}".to_vec()]);
    }

    #[test]
    fn templated_payload_substitutes_id_timestamp_body() {
        let scheme = crate::scheme::scheme_for(crate::scheme::ProviderTag::Clerk);
        let req = VerificationRequest::new(b"payload".to_vec()).with_header("webhook-id", "msg_1");
        let candidates = build_candidates(&scheme, &req, Some(42)).unwrap();
        assert_eq!(candidates, vec![b"msg_1.42.payload".to_vec()]);
    }

    #[test]
    fn templated_payload_without_id_header_is_malformed() {
        let scheme = crate::scheme::scheme_for(crate::scheme::ProviderTag::Clerk);
        let req = VerificationRequest::new(b"payload".to_vec());
        assert_eq!(
            build_candidates(&scheme, &req, Some(42)).unwrap_err(),
            VerificationErrorKind::PayloadMalformed
        );
    }

    #[test]
    fn sentry_produces_multiple_candidates_for_issue_alert() {
        let scheme = crate::scheme::scheme_for(crate::scheme::ProviderTag::Sentry);
        let body = br#"{"data":{"issue_alert":{"id":"1"}}}"#.to_vec();
        let req = VerificationRequest::new(body);
        let candidates = build_candidates(&scheme, &req, None).unwrap();
        assert_eq!(candidates.len(), 3);
    }

    #[test]
    fn fal_template_joins_request_id_user_id_timestamp_and_body_hash() {
        let scheme = crate::scheme::scheme_for(crate::scheme::ProviderTag::Fal);
        let req = VerificationRequest::new(b"hello".to_vec())
            .with_header("x-fal-webhook-request-id", "req_1")
            .with_header("x-fal-webhook-user-id", "user_1");
        let candidates = build_candidates(&scheme, &req, Some(99)).unwrap();
        let expected = format!("req_1\nuser_1\n99\n{}", sha256_hex(b"hello"));
        assert_eq!(candidates, vec![expected.into_bytes()]);
    }
}
