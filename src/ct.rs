//! Constant-time comparison and the signature/digest primitives built on it.
//!
//! Every byte comparison of a candidate signature or token in [`crate::verify`]
//! routes through [`ct_eq`]. Nothing here throws: structural failures (bad
//! hex, a malformed key) collapse to `false` or an `Err` the caller maps to
//! [`crate::error::VerificationErrorKind::VerificationError`].

use base64::Engine;
use base64::engine::general_purpose::STANDARD as B64;
use ed25519_dalek::{Signature, Verifier, VerifyingKey, pkcs8::DecodePublicKey};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

/// Compares two byte strings in constant time. Returns `false` immediately
/// on a length mismatch (a length leak is considered acceptable — the
/// property under test is that comparison time does not depend on *where*
/// two equal-length strings first diverge).
pub fn ct_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.ct_eq(b).into()
}

/// HMAC algorithms supported by [`crate::scheme::Algorithm`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HmacAlg {
    Sha1,
    Sha256,
    Sha512,
}

/// Computes `HMAC(alg, key, msg)`. `key` is used as raw key material —
/// callers apply any secret-encoding transform (§`secret_encoding` in
/// [`crate::scheme::SignatureScheme`]) before calling this.
pub fn hmac(alg: HmacAlg, key: &[u8], msg: &[u8]) -> Vec<u8> {
    match alg {
        HmacAlg::Sha1 => {
            let mut mac = Hmac::<sha1::Sha1>::new_from_slice(key)
                .expect("HMAC accepts keys of any length");
            mac.update(msg);
            mac.finalize().into_bytes().to_vec()
        }
        HmacAlg::Sha256 => {
            let mut mac = Hmac::<Sha256>::new_from_slice(key)
                .expect("HMAC accepts keys of any length");
            mac.update(msg);
            mac.finalize().into_bytes().to_vec()
        }
        HmacAlg::Sha512 => {
            let mut mac = Hmac::<sha2::Sha512>::new_from_slice(key)
                .expect("HMAC accepts keys of any length");
            mac.update(msg);
            mac.finalize().into_bytes().to_vec()
        }
    }
}

/// Verifies an Ed25519 signature against a SPKI-PEM-encoded public key.
/// Returns `false` on any structural failure (malformed PEM, malformed
/// signature) rather than propagating an error — callers iterate over
/// several candidate keys (key rotation) and must not abort on the first
/// bad one.
pub fn ed25519_verify(pubkey_pem: &str, msg: &[u8], sig: &[u8]) -> bool {
    let Ok(verifying_key) = VerifyingKey::from_public_key_pem(pubkey_pem) else {
        return false;
    };
    let Ok(sig_bytes): Result<[u8; 64], _> = sig.try_into() else {
        return false;
    };
    let signature = Signature::from_bytes(&sig_bytes);
    verifying_key.verify(msg, &signature).is_ok()
}

/// `sha256_hex(bytes)` — used to fold the body into the fal.ai Ed25519
/// payload template (spec §4.5).
pub fn sha256_hex(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    hex::encode(digest)
}

/// The two signature/secret encodings a [`crate::scheme::SignatureScheme`] can declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    Hex,
    Base64,
}

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("invalid hex: {0}")]
    Hex(#[from] hex::FromHexError),
    #[error("invalid base64: {0}")]
    Base64(#[from] base64::DecodeError),
}

/// Decodes a signature/secret string per its declared [`Encoding`].
pub fn decode(enc: Encoding, s: &str) -> Result<Vec<u8>, DecodeError> {
    match enc {
        Encoding::Hex => Ok(hex::decode(s)?),
        Encoding::Base64 => Ok(B64.decode(s)?),
    }
}

/// Encodes raw bytes per the given [`Encoding`], the inverse of [`decode`].
pub fn encode(enc: Encoding, bytes: &[u8]) -> String {
    match enc {
        Encoding::Hex => hex::encode(bytes),
        Encoding::Base64 => B64.encode(bytes),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ct_eq_rejects_length_mismatch() {
        assert!(!ct_eq(b"short", b"longerstring"));
    }

    #[test]
    fn ct_eq_accepts_equal_strings() {
        assert!(ct_eq(b"same-bytes", b"same-bytes"));
    }

    #[test]
    fn ct_eq_rejects_single_bit_flip() {
        assert!(!ct_eq(b"abcdefgh", b"abcdefgi"));
    }

    #[test]
    fn hmac_sha256_matches_known_vector() {
        // RFC 4231 test case 1 (truncated key/data), spot-checking wiring only.
        let key = b"key";
        let data = b"The quick brown fox jumps over the lazy dog";
        let mac = hmac(HmacAlg::Sha256, key, data);
        assert_eq!(
            hex::encode(mac),
            "f7bc83f430538424b13298e6aa6fb143ef4d59a14946175997479dbc2d1a3cd"
        );
    }

    #[test]
    fn ed25519_verify_rejects_garbage_key() {
        assert!(!ed25519_verify("not a pem", b"msg", &[0u8; 64]));
    }

    #[test]
    fn decode_roundtrips_hex_and_base64() {
        let bytes = b"hello world";
        let hex_enc = encode(Encoding::Hex, bytes);
        assert_eq!(decode(Encoding::Hex, &hex_enc).unwrap(), bytes);
        let b64_enc = encode(Encoding::Base64, bytes);
        assert_eq!(decode(Encoding::Base64, &b64_enc).unwrap(), bytes);
    }

    #[test]
    fn sha256_hex_matches_known_vector() {
        assert_eq!(
            sha256_hex(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
