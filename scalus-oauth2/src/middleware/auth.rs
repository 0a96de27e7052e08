//! Tower layer mounting the strategy on a host application
//!
//! [`ScalusAuthLayer`] intercepts two paths and lets everything else through:
//!
//! - `{path_prefix}/{provider_name}` (default `/auth/scalus`): runs the
//!   request phase and answers `302` to the provider.
//! - `{callback_path}` (default `/auth/scalus/callback`): runs the callback
//!   phase. On success the [`AuthResult`] is inserted into request extensions
//!   and the request continues to the host's own callback handler.
//!
//! Any failure answers `302` to
//! `{failure_path}?message={reason}&strategy={provider_name}`.
//!
//! The layer needs a [`SharedSession`] in request extensions, normally put
//! there by the host's session layer.
//!
//! # Example
//!
//! ```rust,no_run
//! use axum::{routing::get, Extension, Router};
//! use scalus_oauth2::prelude::*;
//!
//! async fn callback(Extension(auth): Extension<AuthResult>) -> String {
//!     format!("Welcome, {}", auth.uid)
//! }
//!
//! # fn example() -> anyhow::Result<()> {
//! let strategy = ScalusStrategy::new(
//!     StrategyConfig::new("123", "53cr3tz"),
//!     HttpOAuth2Client::new()?,
//! )?;
//!
//! let app: Router = Router::new()
//!     .route("/auth/scalus/callback", get(callback))
//!     .layer(ScalusAuthLayer::new(strategy));
//! # Ok(())
//! # }
//! ```

use axum::{
    body::Body,
    extract::Request,
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use std::task::{Context, Poll};
use tower::{Layer, Service};

use crate::error::AuthFailure;
use crate::oauth2::OAuth2Client;
use crate::session::SharedSession;
use crate::strategy::{AuthResult, ScalusStrategy};

/// Header carrying the client-facing scheme behind a reverse proxy
const FORWARDED_PROTO_HEADER: &str = "x-forwarded-proto";

/// Layer that adds Scalus authentication to a service
pub struct ScalusAuthLayer<C> {
    strategy: Arc<ScalusStrategy<C>>,
}

impl<C> Clone for ScalusAuthLayer<C> {
    fn clone(&self) -> Self {
        Self {
            strategy: Arc::clone(&self.strategy),
        }
    }
}

impl<C> std::fmt::Debug for ScalusAuthLayer<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScalusAuthLayer")
            .field("strategy", &self.strategy)
            .finish()
    }
}

impl<C: OAuth2Client> ScalusAuthLayer<C> {
    /// Create a layer for `strategy`
    #[must_use]
    pub fn new(strategy: ScalusStrategy<C>) -> Self {
        Self::from_arc(Arc::new(strategy))
    }

    /// Create a layer sharing an existing strategy
    #[must_use]
    pub const fn from_arc(strategy: Arc<ScalusStrategy<C>>) -> Self {
        Self { strategy }
    }
}

impl<S, C> Layer<S> for ScalusAuthLayer<C> {
    type Service = ScalusAuthMiddleware<S, C>;

    fn layer(&self, inner: S) -> Self::Service {
        ScalusAuthMiddleware {
            inner,
            strategy: Arc::clone(&self.strategy),
        }
    }
}

/// Service created by [`ScalusAuthLayer`]
pub struct ScalusAuthMiddleware<S, C> {
    inner: S,
    strategy: Arc<ScalusStrategy<C>>,
}

impl<S: Clone, C> Clone for ScalusAuthMiddleware<S, C> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            strategy: Arc::clone(&self.strategy),
        }
    }
}

impl<S: std::fmt::Debug, C> std::fmt::Debug for ScalusAuthMiddleware<S, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScalusAuthMiddleware")
            .field("inner", &self.inner)
            .field("strategy", &self.strategy)
            .finish()
    }
}

impl<S, C> Service<Request> for ScalusAuthMiddleware<S, C>
where
    S: Service<Request, Response = Response<Body>> + Clone + Send + 'static,
    S::Future: Send + 'static,
    C: OAuth2Client + 'static,
{
    type Response = Response<Body>;
    type Error = S::Error;
    type Future = std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>> + Send>,
    >;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request) -> Self::Future {
        let strategy = Arc::clone(&self.strategy);
        let mut inner = self.inner.clone();
        let config = strategy.config();

        let path = req.uri().path();
        let is_request = path == config.request_path();
        let is_callback = path == config.callback_path;
        if !is_request && !is_callback {
            return Box::pin(inner.call(req));
        }

        let Some(mut session) = req.extensions().get::<SharedSession>().cloned() else {
            tracing::error!("Scalus auth layer requires a SharedSession in request extensions");
            return Box::pin(async move { Ok(session_missing()) });
        };

        // Only the query string is read, never the body
        let query = req.uri().query().unwrap_or_default().to_string();
        let full_host = full_host(&req);

        if is_request {
            let response = match strategy.request_phase(&query, &full_host, &mut session) {
                Ok(redirect) => found(&redirect.location),
                Err(failure) => failure_redirect(&*strategy, &failure),
            };
            return Box::pin(async move { Ok(response) });
        }

        Box::pin(async move {
            match strategy
                .callback_phase(&query, &full_host, &mut session)
                .await
            {
                Ok(result) => {
                    req.extensions_mut().insert::<AuthResult>(result);
                    inner.call(req).await
                }
                Err(failure) => Ok(failure_redirect(&*strategy, &failure)),
            }
        })
    }
}

/// Scheme and authority the host is reachable at, as seen by the client
fn full_host(req: &Request) -> String {
    let uri = req.uri();
    if let (Some(scheme), Some(authority)) = (uri.scheme_str(), uri.authority()) {
        return format!("{scheme}://{authority}");
    }

    let headers = req.headers();
    let host = headers
        .get(header::HOST)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("localhost");
    let scheme = headers
        .get(FORWARDED_PROTO_HEADER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map_or("http", str::trim);

    format!("{scheme}://{host}")
}

/// Location of the host's failure page for `failure`
fn failure_location<C>(strategy: &ScalusStrategy<C>, failure: &AuthFailure) -> String
where
    C: OAuth2Client,
{
    let query = url::form_urlencoded::Serializer::new(String::new())
        .append_pair("message", failure.reason())
        .append_pair("strategy", strategy.provider_name())
        .finish();
    format!("{}?{query}", strategy.config().failure_path)
}

fn failure_redirect<C>(strategy: &ScalusStrategy<C>, failure: &AuthFailure) -> Response<Body>
where
    C: OAuth2Client,
{
    tracing::debug!(reason = failure.reason(), error = %failure, "Authentication failed");
    found(&failure_location(strategy, failure))
}

/// `302 Found` to `location`
fn found(location: &str) -> Response<Body> {
    match HeaderValue::from_str(location) {
        Ok(value) => (StatusCode::FOUND, [(header::LOCATION, value)]).into_response(),
        Err(_) => {
            tracing::error!("Redirect location is not a valid header value");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

fn session_missing() -> Response<Body> {
    let body = if cfg!(debug_assertions) {
        "Session not initialized - ensure a SharedSession is inserted before ScalusAuthLayer"
    } else {
        "Internal Server Error"
    };
    (StatusCode::INTERNAL_SERVER_ERROR, body).into_response()
}
