//! Core OAuth2 types shared by the strategy and its client collaborator

use oauth2::basic::BasicClient;
use oauth2::{EndpointNotSet, EndpointSet};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::config::StrategyConfig;
use crate::site::Site;

/// Type alias for an OAuth2 client with only the authorization endpoint set
///
/// The token exchange goes through [`super::HttpOAuth2Client`] directly because
/// the provider's token response carries no `token_type`.
/// - `EndpointSet` for `HasAuthUrl` - Authorization endpoint is configured
/// - `EndpointNotSet` for every other endpoint
pub type ConfiguredClient = BasicClient<
    EndpointSet,    // HasAuthUrl
    EndpointNotSet, // HasDeviceAuthUrl
    EndpointNotSet, // HasIntrospectionUrl
    EndpointNotSet, // HasRevocationUrl
    EndpointNotSet, // HasTokenUrl
>;

/// OAuth2 endpoints and credentials for one organization's site
#[derive(Clone)]
pub struct ProviderEndpoints {
    /// Provider base URL, always `https://{organization}`
    pub site: Url,
    /// Authorization endpoint
    pub authorize_url: Url,
    /// Token endpoint
    pub token_url: Url,
    /// OAuth2 client ID
    pub client_id: String,
    client_secret: String,
}

impl ProviderEndpoints {
    /// Point the client at a resolved organization site
    ///
    /// # Errors
    ///
    /// Returns error if the endpoint paths cannot be joined onto the site
    pub fn configure(site: &Site, config: &StrategyConfig) -> Result<Self, OAuthError> {
        let base = Url::parse(&site.url())
            .map_err(|e| OAuthError::InvalidEndpoint(format!("Invalid site URL: {e}")))?;

        Self::new(
            base,
            config.client_id.clone(),
            config.client_secret.clone(),
            &config.authorize_path,
            &config.token_path,
        )
    }

    /// Build endpoints from an arbitrary base URL
    ///
    /// # Errors
    ///
    /// Returns error if either path cannot be joined onto `site`
    pub fn new(
        site: Url,
        client_id: String,
        client_secret: String,
        authorize_path: &str,
        token_path: &str,
    ) -> Result<Self, OAuthError> {
        let authorize_url = site
            .join(authorize_path)
            .map_err(|e| OAuthError::InvalidEndpoint(format!("Invalid auth URL: {e}")))?;
        let token_url = site
            .join(token_path)
            .map_err(|e| OAuthError::InvalidEndpoint(format!("Invalid token URL: {e}")))?;

        Ok(Self {
            site,
            authorize_url,
            token_url,
            client_id,
            client_secret,
        })
    }

    /// Client secret sent to the token endpoint
    #[must_use]
    pub fn client_secret(&self) -> &str {
        &self.client_secret
    }
}

impl std::fmt::Debug for ProviderEndpoints {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderEndpoints")
            .field("site", &self.site.as_str())
            .field("authorize_url", &self.authorize_url.as_str())
            .field("token_url", &self.token_url.as_str())
            .field("client_id", &self.client_id)
            .field("client_secret", &"[redacted]")
            .finish()
    }
}

/// Parameters embedded in the authorize redirect
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizeParams {
    /// Absolute callback URL
    pub redirect_uri: String,
    /// Requested scope, as configured
    pub scope: String,
    /// CSRF state token
    pub state: String,
    /// Ask for an online, per-user token
    pub per_user: bool,
}

/// Token endpoint response
#[derive(Clone, Serialize, Deserialize)]
pub struct AccessToken {
    /// Access token
    pub access_token: String,
    /// Granted scopes, comma separated
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    /// Lifetime in seconds (online tokens only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<u64>,
    /// User the token acts for (online tokens only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub associated_user: Option<serde_json::Value>,
}

impl AccessToken {
    /// Token without any of the optional fields
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            scope: None,
            expires_in: None,
            associated_user: None,
        }
    }
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessToken")
            .field("access_token", &"[redacted]")
            .field("scope", &self.scope)
            .field("expires_in", &self.expires_in)
            .field("associated_user", &self.associated_user.is_some())
            .finish()
    }
}

/// OAuth2 client errors
#[derive(Debug, thiserror::Error)]
pub enum OAuthError {
    /// Endpoint URL could not be built
    #[error("Invalid OAuth2 endpoint: {0}")]
    InvalidEndpoint(String),

    /// Network failure talking to the provider
    #[error("Failed to reach OAuth2 provider: {0}")]
    Transport(String),

    /// Provider refused the authorization code
    #[error("Failed to exchange authorization code for token: {0}")]
    TokenRejected(String),

    /// Provider answered with something that is not a token
    #[error("Invalid token response: {0}")]
    InvalidResponse(String),
}

impl OAuthError {
    /// Reason code for the host's failure handler
    #[must_use]
    pub const fn reason(&self) -> &'static str {
        match self {
            Self::Transport(_) => "timeout",
            Self::InvalidEndpoint(_) | Self::TokenRejected(_) | Self::InvalidResponse(_) => {
                "invalid_credentials"
            }
        }
    }
}
