//! Algorithm verifiers (spec §4.6): dispatches a scheme's [`Algorithm`] to
//! the HMAC family, Ed25519, or token-equality check. Every comparison of a
//! candidate signature/token against the expected value routes through
//! [`crate::ct::ct_eq`].

use crate::ct::{self, Encoding, HmacAlg};
use crate::error::VerificationErrorKind;
use crate::extract::ExtractedSignature;
use crate::request::VerificationRequest;
use crate::scheme::{Algorithm, HeaderFormat, Keying, SecretEncoding, SignatureScheme};

/// Public keys that passed §4.7 resolution, handed in by the orchestrator so
/// this module stays free of any I/O concern.
pub enum KeyMaterial<'a> {
    /// HMAC/token schemes: the caller-supplied shared secret, as given.
    Shared(&'a [u8]),
    /// Ed25519 schemes: one or more candidate SPKI-PEM public keys (key
    /// rotation support — any one verifying is accepted).
    PublicKeys(&'a [String]),
}

fn hmac_alg_for(algorithm: Algorithm) -> Option<HmacAlg> {
    match algorithm {
        Algorithm::HmacSha1 => Some(HmacAlg::Sha1),
        Algorithm::HmacSha256 => Some(HmacAlg::Sha256),
        Algorithm::HmacSha512 => Some(HmacAlg::Sha512),
        _ => None,
    }
}

/// Applies a scheme's `secret_encoding` transform to the caller-supplied
/// secret, producing the raw bytes actually fed into HMAC.
fn resolve_key_material(scheme: &SignatureScheme, secret: &[u8]) -> Result<Vec<u8>, VerificationErrorKind> {
    match scheme.secret_encoding {
        SecretEncoding::Utf8 => Ok(secret.to_vec()),
        SecretEncoding::Base64WhsecPrefixed => {
            let secret_str =
                std::str::from_utf8(secret).map_err(|_| VerificationErrorKind::VerificationError)?;
            let after_prefix = match secret_str.find('_') {
                Some(idx) => &secret_str[idx + 1..],
                None => secret_str,
            };
            ct::decode(Encoding::Base64, after_prefix).map_err(|_| VerificationErrorKind::VerificationError)
        }
    }
}

/// Verifies an HMAC-family scheme against one or more reconstructed payload
/// candidates (Sentry is the only scheme that produces more than one).
fn verify_hmac(
    scheme: &SignatureScheme,
    alg: HmacAlg,
    secret: &[u8],
    payload_candidates: &[Vec<u8>],
    extracted: &ExtractedSignature,
    req: &VerificationRequest,
) -> Result<(), VerificationErrorKind> {
    let key = resolve_key_material(scheme, secret)?;

    for payload in payload_candidates {
        let mac = ct::hmac(alg, &key, payload);

        let matched = match extracted {
            ExtractedSignature::PrefixedHeader { full_value } => {
                let HeaderFormat::Prefixed(prefix) = scheme.header_format else {
                    return Err(VerificationErrorKind::VerificationError);
                };
                let expected = format!("{prefix}{}", hex::encode(&mac));
                ct::ct_eq(expected.as_bytes(), full_value.as_bytes())
            }
            ExtractedSignature::Candidates(candidates) => candidates
                .iter()
                .any(|candidate| ct::ct_eq(&mac, candidate)),
        };

        if matched {
            return Ok(());
        }
    }

    // Doppler and similar `prefixed` schemes compare the raw header string
    // against the encoded signature rather than decoded bytes for
    // `signature_encoding = base64`; `ExtractedSignature::Candidates` already
    // holds decoded bytes in every other case, so nothing further to try.
    let _ = req;
    Err(VerificationErrorKind::InvalidSignature)
}

/// Verifies an Ed25519 scheme: any candidate public key that verifies the
/// signature against the reconstructed payload is accepted (key rotation).
fn verify_ed25519(
    payload_candidates: &[Vec<u8>],
    candidate_sigs: &[Vec<u8>],
    public_keys: &[String],
) -> Result<(), VerificationErrorKind> {
    for payload in payload_candidates {
        for sig in candidate_sigs {
            for pem in public_keys {
                if ct::ed25519_verify(pem, payload, sig) {
                    return Ok(());
                }
            }
        }
    }
    Err(VerificationErrorKind::InvalidSignature)
}

/// Verifies a token-equality scheme: the raw header value compared directly
/// against the configured secret.
fn verify_token(
    scheme: &SignatureScheme,
    secret: &[u8],
    req: &VerificationRequest,
) -> Result<(), VerificationErrorKind> {
    let token = req
        .header(scheme.signature_header)
        .ok_or(VerificationErrorKind::MissingToken)?;
    if ct::ct_eq(token.trim().as_bytes(), secret) {
        Ok(())
    } else {
        Err(VerificationErrorKind::InvalidToken)
    }
}

/// Dispatches to the algorithm verifier named by `scheme.algorithm` (spec
/// §4.6). `payload_candidates` must already be reconstructed per §4.5;
/// `extracted` must already be pulled per §4.4. Token-equality schemes read
/// the header directly and ignore both.
pub fn verify_signature(
    scheme: &SignatureScheme,
    key: &KeyMaterial,
    payload_candidates: &[Vec<u8>],
    extracted: Option<&ExtractedSignature>,
    req: &VerificationRequest,
) -> Result<(), VerificationErrorKind> {
    match scheme.algorithm {
        Algorithm::HmacSha1 | Algorithm::HmacSha256 | Algorithm::HmacSha512 => {
            let alg = hmac_alg_for(scheme.algorithm).expect("hmac algorithm");
            let KeyMaterial::Shared(secret) = key else {
                return Err(VerificationErrorKind::VerificationError);
            };
            let extracted = extracted.ok_or(VerificationErrorKind::MissingSignature)?;
            verify_hmac(scheme, alg, secret, payload_candidates, extracted, req)
        }
        Algorithm::Ed25519 => {
            let KeyMaterial::PublicKeys(pems) = key else {
                return Err(VerificationErrorKind::VerificationError);
            };
            if pems.is_empty() {
                return Err(VerificationErrorKind::KeyResolutionFailed);
            }
            let extracted = extracted.ok_or(VerificationErrorKind::MissingSignature)?;
            let candidate_sigs = match extracted {
                ExtractedSignature::Candidates(sigs) => sigs.as_slice(),
                ExtractedSignature::PrefixedHeader { .. } => {
                    return Err(VerificationErrorKind::VerificationError);
                }
            };
            verify_ed25519(payload_candidates, candidate_sigs, pems)
        }
        Algorithm::TokenEquality => {
            let KeyMaterial::Shared(secret) = key else {
                return Err(VerificationErrorKind::VerificationError);
            };
            verify_token(scheme, secret, req)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::ExtractedSignature;
    use crate::scheme::{ProviderTag, scheme_for};
    use ed25519_dalek::pkcs8::EncodePublicKey;
    use ed25519_dalek::{Signer, SigningKey};

    #[test]
    fn hmac_rejects_wrong_secret() {
        let scheme = scheme_for(ProviderTag::Stripe);
        let payload = b"1700000000.{}".to_vec();
        let mac = ct::hmac(HmacAlg::Sha256, b"right-secret", &payload);
        let extracted = ExtractedSignature::Candidates(vec![mac]);
        let req = VerificationRequest::new(b"{}".to_vec());
        let result = verify_signature(
            &scheme,
            &KeyMaterial::Shared(b"wrong-secret"),
            &[payload],
            Some(&extracted),
            &req,
        );
        assert_eq!(result, Err(VerificationErrorKind::InvalidSignature));
    }

    #[test]
    fn hmac_accepts_correct_secret() {
        let scheme = scheme_for(ProviderTag::Stripe);
        let payload = b"1700000000.{}".to_vec();
        let mac = ct::hmac(HmacAlg::Sha256, b"secret", &payload);
        let extracted = ExtractedSignature::Candidates(vec![mac]);
        let req = VerificationRequest::new(b"{}".to_vec());
        let result = verify_signature(
            &scheme,
            &KeyMaterial::Shared(b"secret"),
            &[payload],
            Some(&extracted),
            &req,
        );
        assert!(result.is_ok());
    }

    #[test]
    fn prefixed_scheme_compares_full_header_value() {
        let scheme = scheme_for(ProviderTag::Github);
        let payload = b"{}".to_vec();
        let mac = ct::hmac(HmacAlg::Sha256, b"secret", &payload);
        let full_value = format!("sha256={}", hex::encode(&mac));
        let extracted = ExtractedSignature::PrefixedHeader { full_value };
        let req = VerificationRequest::new(b"{}".to_vec());
        let result = verify_signature(
            &scheme,
            &KeyMaterial::Shared(b"secret"),
            &[payload],
            Some(&extracted),
            &req,
        );
        assert!(result.is_ok());
    }

    #[test]
    fn token_equality_matches_gitlab_secret() {
        let scheme = scheme_for(ProviderTag::Gitlab);
        let req = VerificationRequest::new(b"{}".to_vec()).with_header("x-gitlab-token", "sekret");
        let result = verify_signature(&scheme, &KeyMaterial::Shared(b"sekret"), &[], None, &req);
        assert!(result.is_ok());
    }

    #[test]
    fn token_equality_rejects_wrong_token() {
        let scheme = scheme_for(ProviderTag::Gitlab);
        let req = VerificationRequest::new(b"{}".to_vec()).with_header("x-gitlab-token", "wrong");
        let result = verify_signature(&scheme, &KeyMaterial::Shared(b"sekret"), &[], None, &req);
        assert_eq!(result, Err(VerificationErrorKind::InvalidToken));
    }

    #[test]
    fn token_equality_missing_header_is_missing_token() {
        let scheme = scheme_for(ProviderTag::Gitlab);
        let req = VerificationRequest::new(b"{}".to_vec());
        let result = verify_signature(&scheme, &KeyMaterial::Shared(b"sekret"), &[], None, &req);
        assert_eq!(result, Err(VerificationErrorKind::MissingToken));
    }

    #[test]
    fn ed25519_accepts_second_key_after_rotation() {
        let old_key = SigningKey::from_bytes(&[1u8; 32]);
        let new_key = SigningKey::from_bytes(&[2u8; 32]);
        let payload = b"request\nuser\n1700000000\nabc".to_vec();
        let sig = new_key.sign(&payload).to_bytes().to_vec();

        let old_pem = old_key
            .verifying_key()
            .to_public_key_pem(Default::default())
            .unwrap();
        let new_pem = new_key
            .verifying_key()
            .to_public_key_pem(Default::default())
            .unwrap();

        let extracted = ExtractedSignature::Candidates(vec![sig]);
        let req = VerificationRequest::new(b"body".to_vec());
        let scheme = scheme_for(ProviderTag::Fal);
        let result = verify_signature(
            &scheme,
            &KeyMaterial::PublicKeys(&[old_pem, new_pem]),
            &[payload],
            Some(&extracted),
            &req,
        );
        assert!(result.is_ok());
    }

    #[test]
    fn ed25519_empty_key_set_is_key_resolution_failure() {
        let scheme = scheme_for(ProviderTag::Fal);
        let req = VerificationRequest::new(b"body".to_vec());
        let extracted = ExtractedSignature::Candidates(vec![vec![0u8; 64]]);
        let result = verify_signature(
            &scheme,
            &KeyMaterial::PublicKeys(&[]),
            &[b"payload".to_vec()],
            Some(&extracted),
            &req,
        );
        assert_eq!(result, Err(VerificationErrorKind::KeyResolutionFailed));
    }
}
