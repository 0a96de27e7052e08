//! Basic Scalus sign-in server example
//!
//! Demonstrates:
//! - Configuration loading (`scalus.toml` plus `SCALUS_*` environment variables)
//! - Observability initialization
//! - Mounting `ScalusAuthLayer` behind a session layer
//! - Reading the `AuthResult` in the callback handler
//!
//! The session layer here shares one `SharedSession` between all visitors,
//! which is only good enough for trying the flow locally.
//!
//! Run with: `SCALUS_CLIENT_ID=... SCALUS_CLIENT_SECRET=... cargo run --example basic_server`
//! then open <http://127.0.0.1:3000/auth/scalus?organization=your-org>.

use axum::{
    extract::{Query, Request},
    middleware::{self, Next},
    routing::get,
    Extension, Router,
};
use scalus_oauth2::{observability, prelude::*};
use std::collections::HashMap;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize observability (logging)
    observability::init()?;

    tracing::info!("Starting Scalus sign-in example");

    let config = StrategyConfig::load_from("scalus.toml")?
        .with_full_host("http://127.0.0.1:3000");
    let strategy = ScalusStrategy::new(config, HttpOAuth2Client::new()?)?;

    tracing::info!(
        request_path = %strategy.config().request_path(),
        callback_path = %strategy.config().callback_path,
        "Strategy registered"
    );

    let session = SharedSession::new();

    // Layers run bottom-up: the session must be in place before the auth layer
    let app = Router::new()
        .route("/", get(index))
        .route("/auth/scalus/callback", get(callback))
        .route("/auth/failure", get(failure))
        .layer(ScalusAuthLayer::new(strategy))
        .layer(middleware::from_fn(move |mut req: Request, next: Next| {
            let session = session.clone();
            async move {
                req.extensions_mut().insert(session);
                next.run(req).await
            }
        }));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:3000").await?;
    tracing::info!("Server listening on http://127.0.0.1:3000");

    axum::serve(listener, app).await?;

    Ok(())
}

async fn index() -> &'static str {
    "Sign in at /auth/scalus?organization=your-org"
}

/// Callback handler - runs only after the layer verified the callback
async fn callback(Extension(auth): Extension<AuthResult>) -> String {
    tracing::info!(uid = %auth.uid, "Signed in");
    format!("Signed in to {} with scope {:?}", auth.uid, auth.extra.scope)
}

async fn failure(Query(params): Query<HashMap<String, String>>) -> String {
    format!(
        "Sign-in failed: {}",
        params.get("message").map_or("unknown", String::as_str)
    )
}
