//! The inbound request shape the engine verifies against.

use std::collections::HashMap;

/// A case-insensitive, raw-body view of an inbound webhook HTTP request.
///
/// `method`/`url` are optional: most schemes only need headers and body, and
/// a caller that already stripped routing information shouldn't have to
/// fabricate it. `body` must be the exact bytes as received — re-serializing
/// a parsed JSON body before constructing this would silently break every
/// HMAC/Ed25519 check that signs the raw bytes.
#[derive(Debug, Clone)]
pub struct VerificationRequest {
    pub method: Option<String>,
    pub url: Option<String>,
    headers: HashMap<String, String>,
    pub body: Vec<u8>,
}

impl VerificationRequest {
    pub fn new(body: impl Into<Vec<u8>>) -> Self {
        Self {
            method: None,
            url: None,
            headers: HashMap::new(),
            body: body.into(),
        }
    }

    pub fn with_method(mut self, method: impl Into<String>) -> Self {
        self.method = Some(method.into());
        self
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Inserts a header. A repeated header name is joined with `", "`,
    /// matching how most HTTP stacks present multi-valued headers.
    pub fn with_header(mut self, name: impl AsRef<str>, value: impl Into<String>) -> Self {
        self.insert_header(name, value);
        self
    }

    pub fn insert_header(&mut self, name: impl AsRef<str>, value: impl Into<String>) {
        let key = name.as_ref().to_ascii_lowercase();
        let value = value.into();
        self.headers
            .entry(key)
            .and_modify(|existing| {
                existing.push_str(", ");
                existing.push_str(&value);
            })
            .or_insert(value);
    }

    /// Looks up a header by name, case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    pub fn headers(&self) -> impl Iterator<Item = (&str, &str)> {
        self.headers.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_lookup_is_case_insensitive() {
        let req = VerificationRequest::new(b"{}".to_vec())
            .with_header("Stripe-Signature", "t=1,v1=abc");
        assert_eq!(req.header("stripe-signature"), Some("t=1,v1=abc"));
        assert_eq!(req.header("STRIPE-SIGNATURE"), Some("t=1,v1=abc"));
    }

    #[test]
    fn repeated_header_is_comma_joined() {
        let mut req = VerificationRequest::new(Vec::new());
        req.insert_header("x-signature", "v1");
        req.insert_header("x-signature", "v2");
        assert_eq!(req.header("x-signature"), Some("v1, v2"));
    }
}
