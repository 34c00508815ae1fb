//! Runtime configuration for the verification engine and its demo binary.

#[cfg(feature = "demo")]
use std::net::IpAddr;

/// CLI/env configuration for the demo binary (`demo` feature only).
///
/// Every field can be set via a flag or the matching environment variable,
/// following the teacher's `CliArgs` layering (flag wins, then env, then the
/// field's own default).
#[cfg(feature = "demo")]
#[derive(clap::Parser, Debug, Clone)]
#[command(name = "webhook-verify-demo")]
#[command(about = "Reference HTTP endpoint exercising the webhook-verify engine")]
pub struct CliArgs {
    /// Address to bind the demo HTTP server to.
    #[arg(long, env = "HOST", default_value = "127.0.0.1")]
    pub host: IpAddr,

    /// Port to bind the demo HTTP server to.
    #[arg(long, env = "PORT", default_value_t = 8089)]
    pub port: u16,

    /// Default timestamp freshness tolerance, in seconds, applied to every
    /// verification that doesn't pass its own `tolerance_seconds` override.
    #[arg(long, env = "TOLERANCE_SECONDS", default_value_t = EngineConfig::DEFAULT_TOLERANCE_SECONDS)]
    pub tolerance_seconds: u64,

    /// How long a resolved JWKS key set is cached before being re-fetched.
    #[arg(long, env = "JWKS_TTL_SECONDS", default_value_t = EngineConfig::DEFAULT_JWKS_TTL_SECONDS)]
    pub jwks_ttl_seconds: u64,

    /// Timeout for a single JWKS HTTP fetch.
    #[arg(long, env = "JWKS_TIMEOUT_SECONDS", default_value_t = EngineConfig::DEFAULT_JWKS_TIMEOUT_SECONDS)]
    pub jwks_timeout_seconds: u64,
}

/// The engine's own tunables, independent of the demo binary's HTTP concerns.
///
/// Library callers construct this directly; the demo binary derives it from
/// [`CliArgs`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    /// Freshness tolerance, in seconds, used when a call doesn't pass its
    /// own `VerificationOptions::tolerance_seconds` override.
    pub default_tolerance_seconds: u64,
    pub jwks_ttl_seconds: u64,
    pub jwks_timeout_seconds: u64,
}

impl EngineConfig {
    pub const DEFAULT_TOLERANCE_SECONDS: u64 = 300;
    pub const DEFAULT_JWKS_TTL_SECONDS: u64 = 24 * 60 * 60;
    pub const DEFAULT_JWKS_TIMEOUT_SECONDS: u64 = 5;

    pub const fn new() -> Self {
        Self {
            default_tolerance_seconds: Self::DEFAULT_TOLERANCE_SECONDS,
            jwks_ttl_seconds: Self::DEFAULT_JWKS_TTL_SECONDS,
            jwks_timeout_seconds: Self::DEFAULT_JWKS_TIMEOUT_SECONDS,
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "demo")]
impl From<&CliArgs> for EngineConfig {
    fn from(args: &CliArgs) -> Self {
        Self {
            default_tolerance_seconds: args.tolerance_seconds,
            jwks_ttl_seconds: args.jwks_ttl_seconds,
            jwks_timeout_seconds: args.jwks_timeout_seconds,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec_tolerances() {
        let cfg = EngineConfig::default();
        assert_eq!(cfg.default_tolerance_seconds, 300);
        assert_eq!(cfg.jwks_ttl_seconds, 24 * 60 * 60);
        assert_eq!(cfg.jwks_timeout_seconds, 5);
    }
}
