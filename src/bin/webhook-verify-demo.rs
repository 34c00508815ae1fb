//! A minimal Axum HTTP entrypoint exercising `webhook_verify` end to end.
//!
//! `POST /webhooks/:provider` extracts the raw body and headers from an
//! inbound request, looks up the provider's configured secret from the
//! environment, and calls into [`VerificationEngine::verify`]. This binary
//! is ambient plumbing — the engine itself never touches HTTP (spec.md §1).

use std::collections::HashMap;
use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::Arc;

use axum::Router;
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Json};
use axum::routing::{get, post};
use clap::Parser;
use dotenvy::dotenv;
use serde_json::json;

use webhook_verify::config::{CliArgs, EngineConfig};
use webhook_verify::orchestrator::{VerificationEngine, VerificationOptions};
use webhook_verify::request::VerificationRequest;
use webhook_verify::scheme::ProviderTag;
use webhook_verify::shutdown::Shutdown;

struct AppState {
    engine: VerificationEngine,
    /// Secrets loaded once at startup from `WEBHOOK_SECRET_<PROVIDER>` env
    /// vars, e.g. `WEBHOOK_SECRET_STRIPE`.
    secrets: HashMap<ProviderTag, Vec<u8>>,
}

fn load_secrets() -> HashMap<ProviderTag, Vec<u8>> {
    let providers = [
        ("STRIPE", ProviderTag::Stripe),
        ("GITHUB", ProviderTag::Github),
        ("CLERK", ProviderTag::Clerk),
        ("SHOPIFY", ProviderTag::Shopify),
        ("VERCEL", ProviderTag::Vercel),
        ("POLAR", ProviderTag::Polar),
        ("DODOPAYMENTS", ProviderTag::DodoPayments),
        ("GITLAB", ProviderTag::Gitlab),
        ("PADDLE", ProviderTag::Paddle),
        ("RAZORPAY", ProviderTag::Razorpay),
        ("LEMONSQUEEZY", ProviderTag::LemonSqueezy),
        ("WORKOS", ProviderTag::WorkOs),
        ("WOOCOMMERCE", ProviderTag::WooCommerce),
        ("REPLICATE", ProviderTag::Replicate),
        ("SENTRY", ProviderTag::Sentry),
        ("GRAFANA", ProviderTag::Grafana),
        ("DOPPLER", ProviderTag::Doppler),
        ("SANITY", ProviderTag::Sanity),
    ];
    providers
        .into_iter()
        .filter_map(|(env_suffix, tag)| {
            std::env::var(format!("WEBHOOK_SECRET_{env_suffix}"))
                .ok()
                .map(|secret| (tag, secret.into_bytes()))
        })
        .collect()
}

fn request_from_parts(headers: &HeaderMap, body: &[u8]) -> VerificationRequest {
    let mut req = VerificationRequest::new(body.to_vec());
    for (name, value) in headers.iter() {
        if let Ok(value) = value.to_str() {
            req.insert_header(name.as_str(), value);
        }
    }
    req
}

#[tracing::instrument(skip_all)]
async fn get_root() -> impl IntoResponse {
    (StatusCode::OK, format!("Hello from {}!", env!("CARGO_PKG_NAME")))
}

/// `POST /webhooks/:provider`: verifies the request against the named
/// provider's registered scheme, using the secret loaded for that provider
/// at startup.
#[tracing::instrument(skip(state, headers, body))]
async fn post_webhook(
    State(state): State<Arc<AppState>>,
    Path(provider): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    let Ok(provider_tag) = ProviderTag::from_str(&provider) else {
        return (StatusCode::NOT_FOUND, Json(json!({"error": "unknown provider"}))).into_response();
    };
    let Some(secret) = state.secrets.get(&provider_tag) else {
        return (
            StatusCode::NOT_FOUND,
            Json(json!({"error": format!("no secret configured for {provider_tag}")})),
        )
            .into_response();
    };

    let req = request_from_parts(&headers, &body);

    match state
        .engine
        .verify(&req, provider_tag, secret, &VerificationOptions::default())
        .await
    {
        Ok(success) => (StatusCode::OK, Json(success)).into_response(),
        Err(failure) => {
            tracing::warn!(error = ?failure, provider = %provider_tag, "webhook verification failed");
            let status = StatusCode::from_u16(failure.kind.status_code_hint()).unwrap_or(StatusCode::BAD_REQUEST);
            (status, Json(failure)).into_response()
        }
    }
}

fn routes(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(get_root))
        .route("/webhooks/{provider}", post(post_webhook))
        .with_state(state)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();
    webhook_verify::telemetry::init();

    let args = CliArgs::parse();
    let config = EngineConfig::from(&args);
    let engine = VerificationEngine::new(config);
    let secrets = load_secrets();
    let state = Arc::new(AppState { engine, secrets });

    let addr = SocketAddr::new(args.host, args.port);
    tracing::info!("Starting webhook-verify-demo at http://{addr}");

    let listener = tokio::net::TcpListener::bind(addr).await.unwrap_or_else(|e| {
        tracing::error!("Failed to bind to {addr}: {e}");
        std::process::exit(1);
    });

    let shutdown = Shutdown::try_new()?;
    axum::serve(listener, routes(state))
        .with_graceful_shutdown(async move { shutdown.recv().await })
        .await?;

    Ok(())
}
