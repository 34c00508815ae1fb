//! Signature and timestamp extraction (spec §4.4/§4.5): pulling the
//! candidate signature bytes and the freshness timestamp out of a request,
//! per a scheme's declared [`HeaderFormat`]/[`TimestampSource`].

use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::VerificationErrorKind;
use crate::request::VerificationRequest;
use crate::scheme::{HeaderFormat, SignatureScheme, TimestampSource, TimestampUnit};

/// A millisecond timestamp is any value `>= 10^12`; floor it to whole seconds.
/// Applies uniformly regardless of where the timestamp came from (spec §4.5).
const MILLISECOND_THRESHOLD: i64 = 1_000_000_000_000;

pub fn coerce_timestamp(raw: i64) -> i64 {
    if raw >= MILLISECOND_THRESHOLD {
        raw / 1000
    } else {
        raw
    }
}

/// The decoded signature(s) a request actually carries, ready to be compared
/// against a recomputed MAC/signature by [`crate::verify`].
#[derive(Debug, Clone)]
pub enum ExtractedSignature {
    /// One or more decoded candidate signatures — any match is accepted
    /// (key rotation, or a standard-webhooks multi-version header).
    Candidates(Vec<Vec<u8>>),
    /// A `prefixed` scheme's raw header value, compared as an opaque string
    /// against `"{prefix}{hex(mac)}"` rather than decoded up front.
    PrefixedHeader { full_value: String },
}

/// Splits a `k=v` token list joined by `separator` into a lookup map.
/// Tokens without an `=` are ignored.
fn parse_delimited(value: &str, separator: char) -> HashMap<&str, &str> {
    value
        .split(separator)
        .filter_map(|token| {
            let token = token.trim();
            let (k, v) = token.split_once('=')?;
            Some((k.trim(), v.trim()))
        })
        .collect()
}

/// Parses the standard-webhooks signature header: one or more
/// space-separated `"<version>,<base64-signature>"` tokens. Only `v1`
/// tokens are returned — the only version this engine verifies.
fn parse_svix_style(value: &str) -> Vec<&str> {
    value
        .split_whitespace()
        .filter_map(|token| {
            let (version, sig) = token.split_once(',')?;
            (version == "v1").then_some(sig)
        })
        .collect()
}

/// Extracts the candidate signature(s) from a request per the scheme's
/// [`HeaderFormat`]. Returns `MissingSignature` if the header is absent,
/// `InvalidSignature` if it's present but structurally unparseable
/// (not found for `delimited`/svix, or fails to decode).
pub fn extract_signature(
    scheme: &SignatureScheme,
    req: &VerificationRequest,
) -> Result<ExtractedSignature, VerificationErrorKind> {
    let header_value = req
        .header(scheme.signature_header)
        .ok_or(VerificationErrorKind::MissingSignature)?;

    match scheme.header_format {
        HeaderFormat::Raw => {
            let decoded = crate::ct::decode(scheme.signature_encoding, header_value.trim())
                .map_err(|_| VerificationErrorKind::InvalidSignature)?;
            Ok(ExtractedSignature::Candidates(vec![decoded]))
        }
        HeaderFormat::Prefixed(_) => Ok(ExtractedSignature::PrefixedHeader {
            full_value: header_value.to_string(),
        }),
        HeaderFormat::Delimited { separator, sig_key, .. } => {
            let tokens = parse_delimited(header_value, separator);
            let raw_sig = tokens
                .get(sig_key)
                .ok_or(VerificationErrorKind::InvalidSignature)?;
            let decoded = crate::ct::decode(scheme.signature_encoding, raw_sig)
                .map_err(|_| VerificationErrorKind::InvalidSignature)?;
            Ok(ExtractedSignature::Candidates(vec![decoded]))
        }
        HeaderFormat::SvixStyle => {
            let candidates = parse_svix_style(header_value);
            if candidates.is_empty() {
                return Err(VerificationErrorKind::InvalidSignature);
            }
            let decoded = candidates
                .into_iter()
                .map(|sig| crate::ct::decode(scheme.signature_encoding, sig))
                .collect::<Result<Vec<_>, _>>()
                .map_err(|_| VerificationErrorKind::InvalidSignature)?;
            Ok(ExtractedSignature::Candidates(decoded))
        }
    }
}

/// Extracts and range-checks the freshness timestamp per the scheme's
/// [`TimestampSource`]. Returns `Ok(None)` for schemes with no timestamp
/// concept (`TimestampSource::None`) — freshness is simply not checked.
pub fn extract_timestamp(
    scheme: &SignatureScheme,
    req: &VerificationRequest,
) -> Result<Option<i64>, VerificationErrorKind> {
    let raw = match scheme.timestamp_source {
        TimestampSource::None => return Ok(None),
        TimestampSource::Header { name, unit } => {
            let value = req
                .header(name)
                .ok_or(VerificationErrorKind::TimestampMalformed)?;
            parse_timestamp(value, unit)?
        }
        TimestampSource::EmbeddedInSignature { key } => {
            let HeaderFormat::Delimited { separator, .. } = scheme.header_format else {
                return Err(VerificationErrorKind::TimestampMalformed);
            };
            let header_value = req
                .header(scheme.signature_header)
                .ok_or(VerificationErrorKind::MissingSignature)?;
            let tokens = parse_delimited(header_value, separator);
            let value = tokens
                .get(key)
                .ok_or(VerificationErrorKind::TimestampMalformed)?;
            parse_timestamp(value, TimestampUnit::UnixSeconds)?
        }
    };
    Ok(Some(coerce_timestamp(raw)))
}

fn parse_timestamp(value: &str, unit: TimestampUnit) -> Result<i64, VerificationErrorKind> {
    match unit {
        TimestampUnit::UnixSeconds => value
            .trim()
            .parse::<i64>()
            .map_err(|_| VerificationErrorKind::TimestampMalformed),
        TimestampUnit::UnixMilliseconds => value
            .trim()
            .parse::<i64>()
            .map(|ms| ms / 1000)
            .map_err(|_| VerificationErrorKind::TimestampMalformed),
        TimestampUnit::Iso8601 => {
            parse_iso8601_to_unix(value.trim()).ok_or(VerificationErrorKind::TimestampMalformed)
        }
    }
}

/// Parses a UTC `YYYY-MM-DDTHH:MM:SS[.fff]Z` timestamp into Unix seconds
/// without pulling in a date/time crate for the one scheme field that
/// needs it. No timezone offsets other than `Z` are supported.
fn parse_iso8601_to_unix(value: &str) -> Option<i64> {
    let value = value.strip_suffix('Z')?;
    let (date, time) = value.split_once('T')?;
    let mut date_parts = date.split('-');
    let year: i64 = date_parts.next()?.parse().ok()?;
    let month: i64 = date_parts.next()?.parse().ok()?;
    let day: i64 = date_parts.next()?.parse().ok()?;

    let time = time.split('.').next().unwrap_or(time);
    let mut time_parts = time.split(':');
    let hour: i64 = time_parts.next()?.parse().ok()?;
    let minute: i64 = time_parts.next()?.parse().ok()?;
    let second: i64 = time_parts.next()?.parse().ok()?;

    let days = days_since_epoch(year, month, day)?;
    Some(days * 86_400 + hour * 3600 + minute * 60 + second)
}

/// Days between `1970-01-01` and the given proleptic-Gregorian date.
fn days_since_epoch(year: i64, month: i64, day: i64) -> Option<i64> {
    if !(1..=12).contains(&month) || !(1..=31).contains(&day) {
        return None;
    }
    // Howard Hinnant's civil-days algorithm.
    let y = if month <= 2 { year - 1 } else { year };
    let era = if y >= 0 { y } else { y - 399 } / 400;
    let yoe = (y - era * 400) as i64;
    let mp = (month + 9) % 12;
    let doy = (153 * mp + 2) / 5 + day - 1;
    let doe = yoe * 365 + yoe / 4 - yoe / 100 + doy;
    Some(era * 146_097 + doe - 719_468)
}

pub fn now_unix() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

/// Checks `|now - timestamp| <= tolerance_seconds`.
pub fn check_freshness(timestamp: i64, tolerance_seconds: u64, now: i64) -> Result<(), VerificationErrorKind> {
    let delta = (now - timestamp).unsigned_abs();
    if delta > tolerance_seconds {
        Err(VerificationErrorKind::TimestampExpired)
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheme::{scheme_for, ProviderTag};

    #[test]
    fn millisecond_timestamps_are_floored_to_seconds() {
        assert_eq!(coerce_timestamp(1_700_000_000), 1_700_000_000);
        assert_eq!(coerce_timestamp(1_700_000_000_000), 1_700_000_000);
    }

    #[test]
    fn stripe_signature_extraction_reads_v1_token() {
        let scheme = scheme_for(ProviderTag::Stripe);
        let req = crate::request::VerificationRequest::new(b"{}".to_vec())
            .with_header("stripe-signature", "t=1700000000,v1=deadbeef");
        let extracted = extract_signature(&scheme, &req).unwrap();
        match extracted {
            ExtractedSignature::Candidates(candidates) => {
                assert_eq!(candidates, vec![hex::decode("deadbeef").unwrap()]);
            }
            _ => panic!("expected decoded candidates"),
        }
        let ts = extract_timestamp(&scheme, &req).unwrap();
        assert_eq!(ts, Some(1_700_000_000));
    }

    #[test]
    fn missing_signature_header_is_reported() {
        let scheme = scheme_for(ProviderTag::Github);
        let req = crate::request::VerificationRequest::new(b"{}".to_vec());
        assert_eq!(
            extract_signature(&scheme, &req).unwrap_err(),
            VerificationErrorKind::MissingSignature
        );
    }

    #[test]
    fn svix_style_multi_version_header_keeps_only_v1() {
        let scheme = scheme_for(ProviderTag::Clerk);
        let req = crate::request::VerificationRequest::new(b"{}".to_vec()).with_header(
            "svix-signature",
            "v1,AQID v2,BAUG",
        );
        let extracted = extract_signature(&scheme, &req).unwrap();
        match extracted {
            ExtractedSignature::Candidates(candidates) => assert_eq!(candidates.len(), 1),
            _ => panic!("expected decoded candidates"),
        }
    }

    #[test]
    fn iso8601_parses_to_unix_seconds() {
        assert_eq!(parse_iso8601_to_unix("1970-01-01T00:00:00Z"), Some(0));
        assert_eq!(parse_iso8601_to_unix("2023-11-14T22:13:20Z"), Some(1_700_000_000));
    }

    #[test]
    fn freshness_rejects_stale_timestamp() {
        assert!(check_freshness(1000, 300, 1000).is_ok());
        assert!(check_freshness(1000, 300, 2000).is_err());
    }
}
