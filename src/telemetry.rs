//! Structured logging init for the demo binary.
//!
//! The library itself never initializes a subscriber — only the binary that
//! embeds it does, so library use inside a larger application composes with
//! whatever subscriber that application already has installed.

use tracing_subscriber::EnvFilter;

/// Installs a `tracing_subscriber::fmt` layer driven by `RUST_LOG`
/// (defaulting to `info` for this crate, `warn` elsewhere).
pub fn init() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn,webhook_verify=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();
}
