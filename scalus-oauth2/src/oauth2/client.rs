//! OAuth2 client collaborator
//!
//! The strategy never talks HTTP itself. It hands configured
//! [`ProviderEndpoints`] to an [`OAuth2Client`], which builds the authorize URL
//! and exchanges the authorization code. [`HttpOAuth2Client`] is the default
//! implementation; hosts and tests can supply their own.

use async_trait::async_trait;
use oauth2::{basic::BasicClient, AuthUrl, ClientId, ClientSecret, CsrfToken, RedirectUrl, Scope};
use reqwest::header::ACCEPT;

use super::types::{AccessToken, AuthorizeParams, ConfiguredClient, OAuthError, ProviderEndpoints};

/// Extra authorize parameter that requests an online access token
const PER_USER_GRANT_OPTION: (&str, &str) = ("grant_options[]", "per-user");

/// Builds authorize URLs and exchanges authorization codes
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait OAuth2Client: Send + Sync {
    /// Build the provider authorize URL the user is redirected to
    ///
    /// Must not perform any network I/O.
    ///
    /// # Errors
    ///
    /// Returns error if the redirect URI or endpoint is not a valid URL
    fn authorize_url(
        &self,
        endpoints: &ProviderEndpoints,
        params: &AuthorizeParams,
    ) -> Result<String, OAuthError>;

    /// Exchange an authorization code for an access token
    ///
    /// # Errors
    ///
    /// Returns error if the provider cannot be reached or rejects the code
    async fn exchange_code(
        &self,
        endpoints: &ProviderEndpoints,
        code: &str,
    ) -> Result<AccessToken, OAuthError>;
}

/// Default [`OAuth2Client`] backed by the `oauth2` crate and `reqwest`
#[derive(Debug, Clone)]
pub struct HttpOAuth2Client {
    /// Reusable HTTP client for token requests
    http_client: reqwest::Client,
}

impl HttpOAuth2Client {
    /// Create a client with redirects disabled
    ///
    /// # Errors
    ///
    /// Returns error if the underlying HTTP client cannot be built
    pub fn new() -> Result<Self, OAuthError> {
        let http_client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| OAuthError::Transport(e.to_string()))?;

        Ok(Self { http_client })
    }

    /// Wrap an existing HTTP client (timeouts, proxies, TLS are the caller's choice)
    #[must_use]
    pub const fn with_http_client(http_client: reqwest::Client) -> Self {
        Self { http_client }
    }

    fn configured_client(endpoints: &ProviderEndpoints) -> ConfiguredClient {
        BasicClient::new(ClientId::new(endpoints.client_id.clone()))
            .set_client_secret(ClientSecret::new(endpoints.client_secret().to_string()))
            .set_auth_uri(AuthUrl::from_url(endpoints.authorize_url.clone()))
    }
}

#[async_trait]
impl OAuth2Client for HttpOAuth2Client {
    fn authorize_url(
        &self,
        endpoints: &ProviderEndpoints,
        params: &AuthorizeParams,
    ) -> Result<String, OAuthError> {
        let redirect_uri = RedirectUrl::new(params.redirect_uri.clone())
            .map_err(|e| OAuthError::InvalidEndpoint(format!("Invalid redirect URI: {e}")))?;
        let client = Self::configured_client(endpoints).set_redirect_uri(redirect_uri);

        let state = params.state.clone();
        let mut auth_url_builder = client.authorize_url(move || CsrfToken::new(state));

        if !params.scope.is_empty() {
            auth_url_builder = auth_url_builder.add_scope(Scope::new(params.scope.clone()));
        }
        if params.per_user {
            auth_url_builder =
                auth_url_builder.add_extra_param(PER_USER_GRANT_OPTION.0, PER_USER_GRANT_OPTION.1);
        }

        let (auth_url, _csrf_state) = auth_url_builder.url();
        Ok(auth_url.to_string())
    }

    async fn exchange_code(
        &self,
        endpoints: &ProviderEndpoints,
        code: &str,
    ) -> Result<AccessToken, OAuthError> {
        let form = [
            ("grant_type", "authorization_code"),
            ("client_id", endpoints.client_id.as_str()),
            ("client_secret", endpoints.client_secret()),
            ("code", code),
        ];

        let response = self
            .http_client
            .post(endpoints.token_url.clone())
            .header(ACCEPT, "application/json")
            .form(&form)
            .send()
            .await
            .map_err(|e| OAuthError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            return Err(OAuthError::TokenRejected(format!(
                "HTTP {}",
                response.status()
            )));
        }

        let token: AccessToken = response
            .json()
            .await
            .map_err(|e| OAuthError::InvalidResponse(format!("Failed to parse JSON: {e}")))?;

        if token.access_token.is_empty() {
            return Err(OAuthError::InvalidResponse(
                "Empty access_token".to_string(),
            ));
        }

        Ok(token)
    }
}
