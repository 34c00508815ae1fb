//! JWKS key cache (spec §4.7): fetches, parses, caches, and rotates Ed25519
//! public keys from a provider's JWKS URL.
//!
//! Single-flight: concurrent callers that miss the cache for the same URL
//! await the one in-flight fetch rather than issuing their own (spec §5,
//! "no thundering herd"). Cache reads on a hit take no lock beyond the
//! initial map lookup's critical section.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use ed25519_dalek::VerifyingKey;
use ed25519_dalek::pkcs8::EncodePublicKey;
use serde::Deserialize;
use tokio::sync::{Mutex, Notify};

use crate::error::VerificationErrorKind;

/// A resolved set of PEM-encoded Ed25519 public keys, plus the wall-clock
/// deadline at which the cache entry must be refreshed.
#[derive(Debug, Clone)]
pub struct JwksCacheEntry {
    pub pems: Vec<String>,
    pub expires_at: Instant,
}

enum CacheState {
    Ready(JwksCacheEntry),
    Fetching(Arc<Notify>),
}

/// Shared, mutex-guarded cache from JWKS URL to its resolved key set.
pub struct JwksCache {
    client: reqwest::Client,
    ttl: Duration,
    fetch_timeout: Duration,
    entries: Mutex<HashMap<String, CacheState>>,
}

#[derive(Debug, Deserialize)]
struct JwkSet {
    keys: Vec<serde_json::Value>,
}

/// A single JWK. Fields beyond `kty`/`crv`/`x` are ignored; anything that
/// isn't a well-formed Ed25519 `OKP` key is skipped rather than rejected
/// (spec §4.7: "malformed individual JWKs are skipped silently").
#[derive(Debug, Deserialize)]
struct Jwk {
    kty: String,
    #[serde(default)]
    crv: Option<String>,
    #[serde(default)]
    x: Option<String>,
}

fn jwk_to_pem(jwk: &Jwk) -> Option<String> {
    if jwk.kty != "OKP" || jwk.crv.as_deref() != Some("Ed25519") {
        return None;
    }
    let x = jwk.x.as_deref()?;
    let raw = URL_SAFE_NO_PAD.decode(x).ok()?;
    let bytes: [u8; 32] = raw.try_into().ok()?;
    let verifying_key = VerifyingKey::from_bytes(&bytes).ok()?;
    verifying_key.to_public_key_pem(Default::default()).ok()
}

impl JwksCache {
    pub fn new(ttl: Duration, fetch_timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            ttl,
            fetch_timeout,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Resolves the PEM-encoded public keys for `url`, serving from cache
    /// when unexpired. Network or parse failure, or a key set with zero
    /// usable keys, yields [`VerificationErrorKind::KeyResolutionFailed`].
    pub async fn resolve_keys(&self, url: &str) -> Result<Vec<String>, VerificationErrorKind> {
        loop {
            let notify = {
                let mut entries = self.entries.lock().await;
                match entries.get(url) {
                    Some(CacheState::Ready(entry)) if entry.expires_at > Instant::now() => {
                        return Ok(entry.pems.clone());
                    }
                    Some(CacheState::Fetching(notify)) => Some(notify.clone()),
                    _ => {
                        let notify = Arc::new(Notify::new());
                        entries.insert(url.to_string(), CacheState::Fetching(notify.clone()));
                        None
                    }
                }
            };

            let Some(notify) = notify else {
                // We are the single flight. Fetch outside the lock, then
                // publish the result and wake any waiters.
                let result = self.fetch_and_parse(url).await;
                let mut entries = self.entries.lock().await;
                match &result {
                    Ok(pems) => {
                        entries.insert(
                            url.to_string(),
                            CacheState::Ready(JwksCacheEntry {
                                pems: pems.clone(),
                                expires_at: Instant::now() + self.ttl,
                            }),
                        );
                    }
                    Err(_) => {
                        // No negative caching (spec §7): remove the
                        // in-flight marker so the next call retries.
                        entries.remove(url);
                    }
                }
                drop(entries);
                return result;
            };

            notify.notified().await;
            // Loop back around: the winner has published Ready (or removed
            // the entry on failure, in which case we become the new flight).
        }
    }

    async fn fetch_and_parse(&self, url: &str) -> Result<Vec<String>, VerificationErrorKind> {
        let response = self
            .client
            .get(url)
            .timeout(self.fetch_timeout)
            .send()
            .await
            .map_err(|_| VerificationErrorKind::KeyResolutionFailed)?;
        let set: JwkSet = response
            .json()
            .await
            .map_err(|_| VerificationErrorKind::KeyResolutionFailed)?;

        let pems: Vec<String> = set
            .keys
            .iter()
            .filter_map(|raw| serde_json::from_value::<Jwk>(raw.clone()).ok())
            .filter_map(|jwk| jwk_to_pem(&jwk))
            .collect();

        if pems.is_empty() {
            return Err(VerificationErrorKind::KeyResolutionFailed);
        }
        Ok(pems)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malformed_jwk_is_skipped_not_rejected() {
        let good = Jwk {
            kty: "OKP".into(),
            crv: Some("Ed25519".into()),
            x: Some(URL_SAFE_NO_PAD.encode([1u8; 32])),
        };
        let bad_kty = Jwk {
            kty: "RSA".into(),
            crv: None,
            x: None,
        };
        assert!(jwk_to_pem(&good).is_some());
        assert!(jwk_to_pem(&bad_kty).is_none());
    }

    #[test]
    fn malformed_x_is_skipped() {
        let bad = Jwk {
            kty: "OKP".into(),
            crv: Some("Ed25519".into()),
            x: Some("not-valid-base64url!!".into()),
        };
        assert!(jwk_to_pem(&bad).is_none());
    }

    #[tokio::test]
    async fn cache_hit_within_ttl_serves_without_refetch() {
        let cache = JwksCache::new(Duration::from_secs(3600), Duration::from_secs(5));
        {
            let mut entries = cache.entries.lock().await;
            entries.insert(
                "https://example.test/jwks.json".to_string(),
                CacheState::Ready(JwksCacheEntry {
                    pems: vec!["pem-data".to_string()],
                    expires_at: Instant::now() + Duration::from_secs(60),
                }),
            );
        }
        let pems = cache
            .resolve_keys("https://example.test/jwks.json")
            .await
            .unwrap();
        assert_eq!(pems, vec!["pem-data".to_string()]);
    }
}
