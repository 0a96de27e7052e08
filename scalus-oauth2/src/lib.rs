//! scalus-oauth2: OAuth2 authentication strategy for Scalus organizations
//!
//! Every Scalus organization lives on its own host (`{name}.scalus.com`), so
//! the strategy resolves and validates the provider site per request, and the
//! provider signs its callbacks with HMAC-SHA256 on top of the usual OAuth2
//! `state` check.
//!
//! # Design Principles
//!
//! 1. **Reject before contacting the provider**: CSRF state, signature,
//!    timestamp and site are all checked locally before any code exchange
//! 2. **Uniform failures**: a forged signature, an expired timestamp and a
//!    missing field all report `invalid_signature`
//! 3. **Collaborators behind traits**: session storage ([`session::SessionStore`])
//!    and the OAuth2 client ([`oauth2::OAuth2Client`]) are injected
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use axum::{routing::get, Extension, Router};
//! use scalus_oauth2::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     scalus_oauth2::observability::init()?;
//!
//!     let config = StrategyConfig::load_from("scalus.toml")?;
//!     let strategy = ScalusStrategy::new(config, HttpOAuth2Client::new()?)?;
//!
//!     // The host's session layer must insert a `SharedSession` into request
//!     // extensions before ScalusAuthLayer runs
//!     let app = Router::new()
//!         .route("/auth/scalus/callback", get(callback))
//!         .route("/auth/failure", get(|| async { "Authentication failed" }))
//!         .layer(ScalusAuthLayer::new(strategy));
//!
//!     let listener = tokio::net::TcpListener::bind("127.0.0.1:3000").await?;
//!     axum::serve(listener, app).await?;
//!     Ok(())
//! }
//!
//! async fn callback(Extension(auth): Extension<AuthResult>) -> String {
//!     format!("Signed in to {}", auth.uid)
//! }
//! ```

// Lint configuration is handled at the workspace level in Cargo.toml
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod csrf;
pub mod error;
pub mod middleware;
pub mod oauth2;
pub mod observability;
pub mod session;
pub mod signature;
pub mod site;
pub mod strategy;

/// Prelude module for convenient imports
///
/// ```rust
/// use scalus_oauth2::prelude::*;
/// ```
pub mod prelude {
    pub use crate::config::StrategyConfig;
    pub use crate::error::{AuthFailure, ConfigError};
    pub use crate::middleware::ScalusAuthLayer;
    pub use crate::oauth2::{
        AccessToken, AuthorizeParams, HttpOAuth2Client, OAuth2Client, OAuthError,
        ProviderEndpoints,
    };
    pub use crate::session::{SessionStore, SharedSession};
    pub use crate::strategy::{AuthResult, AuthorizeRedirect, ScalusStrategy};
}
