//! A webhook verification engine for third-party HTTP webhooks.
//!
//! This crate cryptographically authenticates the origin of an inbound
//! webhook request, validates its freshness, and returns either a typed
//! success carrying the parsed body and a canonical event id, or a typed
//! failure — never a panic or an exception across the boundary.
//!
//! # Overview
//!
//! A per-provider [`scheme`] registry declares how each known sender signs
//! its webhooks: which header carries the signature, how the signed bytes
//! are reconstructed, and which algorithm verifies them (HMAC-SHA1/256/512,
//! Ed25519 with optional JWKS key resolution, or plain token equality). The
//! [`orchestrator::VerificationEngine`] composes scheme lookup, extraction,
//! payload reconstruction, and algorithm verification into the engine's
//! four public entry points.
//!
//! A secondary, optional responsibility is best-effort
//! [`normalize`]ation: mapping a provider's verified payload into one of a
//! small set of category-shaped records (payment, auth, infrastructure) for
//! callers that don't want to learn every provider's event vocabulary.
//!
//! # Modules
//!
//! - [`error`] — the closed error taxonomy and `Success`/`Failure` result envelope.
//! - [`ct`] — constant-time comparison, HMAC, Ed25519 verification, SHA-256, codecs.
//! - [`scheme`] — the signature-scheme registry.
//! - [`extract`] — signature and timestamp extraction, freshness checks.
//! - [`payload`] — payload reconstruction per a scheme's payload form.
//! - [`verify`] — algorithm verifier dispatch (HMAC family, Ed25519, token equality).
//! - [`jwks`] — the JWKS public-key cache backing Ed25519-over-JWKS schemes.
//! - [`orchestrator`] — the top-level pipeline and its public entry points.
//! - [`detect`] — best-effort provider detection from request headers.
//! - [`event_id`] — canonical, per-provider event-id derivation.
//! - [`normalize`] — the optional post-verification normalizer.
//! - [`request`] — the inbound request shape the engine verifies against.
//! - [`config`] — engine tunables and the demo binary's CLI/env configuration.
//! - [`telemetry`] — `tracing-subscriber` initialization for the demo binary.
//!
//! # Example
//!
//! ```no_run
//! use webhook_verify::config::EngineConfig;
//! use webhook_verify::orchestrator::{VerificationEngine, VerificationOptions};
//! use webhook_verify::request::VerificationRequest;
//! use webhook_verify::scheme::ProviderTag;
//!
//! # async fn run() {
//! let engine = VerificationEngine::new(EngineConfig::default());
//! let request = VerificationRequest::new(br#"{"id":"evt_1"}"#.to_vec())
//!     .with_header("stripe-signature", "t=1700000000,v1=deadbeef");
//! let result = engine
//!     .verify(&request, ProviderTag::Stripe, b"whsec_...", &VerificationOptions::default())
//!     .await;
//! # }
//! ```

pub mod config;
pub mod ct;
pub mod detect;
pub mod error;
pub mod event_id;
pub mod extract;
pub mod jwks;
pub mod normalize;
pub mod orchestrator;
pub mod payload;
pub mod request;
pub mod scheme;
#[cfg(feature = "demo")]
pub mod shutdown;
pub mod telemetry;
pub mod verify;
