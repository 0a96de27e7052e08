//! Two-phase Scalus authentication
//!
//! [`ScalusStrategy`] ties the pieces together:
//!
//! - **Request phase**: validate the organization, store a fresh CSRF state in
//!   session and build the provider's authorize URL. No network I/O.
//! - **Callback phase**: check the CSRF state, the HMAC signature and its
//!   timestamp, validate the organization again, exchange the code and check
//!   the granted scope.
//!
//! Every rejection is an [`AuthFailure`] whose [`AuthFailure::reason`] the host
//! forwards to its failure page. The OAuth2 client is only ever called once
//! all local checks have passed.

pub mod auth_result;
pub mod scope;

pub use auth_result::{AuthResult, Credentials, Extra};
pub use scope::{normalize_scope, scopes_match};

use chrono::Utc;

use crate::config::StrategyConfig;
use crate::csrf::{check_state, generate_state, STATE_SESSION_KEY};
use crate::error::{AuthFailure, ConfigError};
use crate::oauth2::{AuthorizeParams, OAuth2Client, OAuthError, ProviderEndpoints};
use crate::session::SessionStore;
use crate::signature::{parse_query, CallbackParams, SignatureVerifier};
use crate::site::{Site, SiteResolver};

const ORGANIZATION_PARAM: &str = "organization";
const STATE_PARAM: &str = "state";
const CODE_PARAM: &str = "code";

/// Redirect produced by the request phase
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizeRedirect {
    /// Absolute provider authorize URL
    pub location: String,
}

/// Scalus OAuth2 strategy
///
/// Built once at registration time and shared across requests.
///
/// # Example
///
/// ```rust
/// use scalus_oauth2::config::StrategyConfig;
/// use scalus_oauth2::oauth2::HttpOAuth2Client;
/// use scalus_oauth2::session::SharedSession;
/// use scalus_oauth2::strategy::ScalusStrategy;
///
/// # fn example() -> anyhow::Result<()> {
/// let strategy = ScalusStrategy::new(
///     StrategyConfig::new("123", "53cr3tz"),
///     HttpOAuth2Client::new()?,
/// )?;
///
/// let mut session = SharedSession::new();
/// let redirect = strategy.request_phase(
///     "organization=snowdevil",
///     "https://app.example.com",
///     &mut session,
/// )?;
/// assert!(redirect
///     .location
///     .starts_with("https://snowdevil.scalus.com/admin/oauth/authorize?"));
/// # Ok(())
/// # }
/// # example().unwrap();
/// ```
pub struct ScalusStrategy<C> {
    config: StrategyConfig,
    sites: SiteResolver,
    verifier: SignatureVerifier,
    client: C,
}

impl<C: OAuth2Client> ScalusStrategy<C> {
    /// Validate `config` and build the strategy
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the configuration is unusable.
    pub fn new(config: StrategyConfig, client: C) -> Result<Self, ConfigError> {
        config.validate()?;
        let sites = SiteResolver::new(&config.provider_domain_suffix)?;
        let verifier =
            SignatureVerifier::new(config.signing_secrets(), config.code_expires_after_secs);

        tracing::debug!(
            provider = %config.provider_name,
            suffix = %sites.suffix(),
            "Registered OAuth2 strategy"
        );

        Ok(Self {
            config,
            sites,
            verifier,
            client,
        })
    }

    /// Validated configuration
    #[must_use]
    pub const fn config(&self) -> &StrategyConfig {
        &self.config
    }

    /// Provider name used in results and failure redirects
    #[must_use]
    pub fn provider_name(&self) -> &str {
        &self.config.provider_name
    }

    /// Absolute callback URL for a host reachable at `full_host`
    ///
    /// A configured `callback_url` or `full_host` wins over the request's.
    #[must_use]
    pub fn callback_url(&self, full_host: &str) -> String {
        if let Some(url) = &self.config.callback_url {
            return url.clone();
        }
        let host = self.config.full_host.as_deref().unwrap_or(full_host);
        format!("{}{}", host.trim_end_matches('/'), self.config.callback_path)
    }

    /// Start authentication for the organization named in `query`
    ///
    /// # Errors
    ///
    /// Returns [`AuthFailure::InvalidSite`] if the organization is missing or
    /// invalid, or [`AuthFailure::Upstream`] if no authorize URL can be built.
    pub fn request_phase<S>(
        &self,
        query: &str,
        full_host: &str,
        session: &mut S,
    ) -> Result<AuthorizeRedirect, AuthFailure>
    where
        S: SessionStore + ?Sized,
    {
        let params = parse_query(query);
        let site = self.resolve_site(&params)?;
        let endpoints = ProviderEndpoints::configure(&site, &self.config)?;

        let state = generate_state();
        session.insert(STATE_SESSION_KEY, state.clone());

        let authorize = AuthorizeParams {
            redirect_uri: self.callback_url(full_host),
            scope: self.config.scope.clone(),
            state,
            per_user: self.config.per_user_permissions,
        };
        let location = self.client.authorize_url(&endpoints, &authorize)?;

        tracing::debug!(site = %site, redirect_uri = %authorize.redirect_uri, "Redirecting to provider");
        Ok(AuthorizeRedirect { location })
    }

    /// Complete authentication from the provider's callback `query`
    ///
    /// Only the query string is read; body parameters are never signed and
    /// never considered.
    ///
    /// # Errors
    ///
    /// Returns the first failing check as an [`AuthFailure`].
    pub async fn callback_phase<S>(
        &self,
        query: &str,
        full_host: &str,
        session: &mut S,
    ) -> Result<AuthResult, AuthFailure>
    where
        S: SessionStore + ?Sized,
    {
        self.callback_phase_at(query, full_host, session, Utc::now().timestamp())
            .await
    }

    pub(crate) async fn callback_phase_at<S>(
        &self,
        query: &str,
        full_host: &str,
        session: &mut S,
        now: i64,
    ) -> Result<AuthResult, AuthFailure>
    where
        S: SessionStore + ?Sized,
    {
        let params = parse_query(query);
        tracing::debug!(callback_url = %self.callback_url(full_host), "Handling callback");

        let stored_state = session.remove(STATE_SESSION_KEY);
        if !check_state(
            params.get(STATE_PARAM).map(String::as_str),
            stored_state.as_deref(),
        ) {
            tracing::warn!(
                has_stored_state = stored_state.is_some(),
                "OAuth2 state mismatch (potential CSRF attack)"
            );
            return Err(AuthFailure::CsrfDetected);
        }

        if let Err(failure) = self.verifier.verify(&params, now) {
            tracing::warn!(
                organization = params.get(ORGANIZATION_PARAM).map(String::as_str),
                "Rejected callback with invalid signature"
            );
            return Err(failure);
        }

        let site = self.resolve_site(&params)?;
        let endpoints = ProviderEndpoints::configure(&site, &self.config)?;

        let code = params
            .get(CODE_PARAM)
            .filter(|code| !code.is_empty())
            .ok_or_else(|| OAuthError::TokenRejected("Missing authorization code".to_string()))?;

        let token = self
            .client
            .exchange_code(&endpoints, code)
            .await
            .inspect_err(|e| tracing::warn!(site = %site, error = %e, "Code exchange failed"))?;

        if let Some(granted) = token.scope.as_deref() {
            if !scopes_match(&self.config.scope, granted) {
                tracing::warn!(
                    site = %site,
                    requested = %self.config.scope,
                    granted = %granted,
                    "Granted scope does not match request"
                );
                return Err(AuthFailure::InvalidScope);
            }
        }

        if self.config.per_user_permissions && token.associated_user.is_none() {
            tracing::warn!(site = %site, "Per-user token without associated user");
            return Err(AuthFailure::InvalidPermissions);
        }

        tracing::info!(provider = %self.config.provider_name, uid = %site.host(), "Authenticated");
        Ok(AuthResult::from_token(
            &self.config.provider_name,
            &site,
            token,
        ))
    }

    fn resolve_site(&self, params: &CallbackParams) -> Result<Site, AuthFailure> {
        let organization = params
            .get(ORGANIZATION_PARAM)
            .map(String::as_str)
            .unwrap_or_default();
        self.sites.resolve(organization)
    }
}

impl<C> std::fmt::Debug for ScalusStrategy<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScalusStrategy")
            .field("config", &self.config)
            .field("sites", &self.sites)
            .field("verifier", &self.verifier)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oauth2::{AccessToken, HttpOAuth2Client, MockOAuth2Client};
    use crate::session::SharedSession;
    use crate::signature::{encoded_params_for_signature, sign};
    use std::collections::HashMap;

    const SECRET: &str = "53cr3tz";
    const FULL_HOST: &str = "https://app.example.com";
    const NOW: i64 = 1_700_000_000;
    const STATE: &str = "0123456789abcdef0123456789abcdef";

    fn config() -> StrategyConfig {
        StrategyConfig::new("123", SECRET)
    }

    fn session_with_state() -> SharedSession {
        let mut session = SharedSession::new();
        session.insert(STATE_SESSION_KEY, STATE.to_string());
        session
    }

    fn signed_query(pairs: &[(&str, &str)], secret: &str) -> String {
        let signature = sign(&encoded_params_for_signature(pairs.iter().copied()), secret);
        url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(pairs.iter().copied())
            .append_pair("hmac", &signature)
            .finish()
    }

    fn callback_query(organization: &str) -> String {
        let timestamp = NOW.to_string();
        signed_query(
            &[
                ("organization", organization),
                ("code", "the-code"),
                ("timestamp", &timestamp),
                ("state", STATE),
            ],
            SECRET,
        )
    }

    fn rejecting_client() -> MockOAuth2Client {
        let mut client = MockOAuth2Client::new();
        client.expect_authorize_url().times(0);
        client.expect_exchange_code().times(0);
        client
    }

    fn token_client(token: AccessToken) -> MockOAuth2Client {
        let mut client = MockOAuth2Client::new();
        client
            .expect_exchange_code()
            .withf(|endpoints, code| {
                endpoints.token_url.as_str()
                    == "https://snowdevil.scalus.com/admin/oauth/access_token"
                    && code == "the-code"
            })
            .times(1)
            .returning(move |_, _| Ok(token.clone()));
        client
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        let result = ScalusStrategy::new(StrategyConfig::default(), rejecting_client());
        assert!(matches!(result, Err(ConfigError::Missing("client_id"))));
    }

    #[test]
    fn test_callback_url() {
        let strategy = ScalusStrategy::new(config(), rejecting_client()).unwrap();
        assert_eq!(
            strategy.callback_url("https://app.example.com/"),
            "https://app.example.com/auth/scalus/callback"
        );

        let strategy = ScalusStrategy::new(
            config().with_full_host("https://proxy.example.com"),
            rejecting_client(),
        )
        .unwrap();
        assert_eq!(
            strategy.callback_url(FULL_HOST),
            "https://proxy.example.com/auth/scalus/callback"
        );
    }

    #[test]
    fn test_request_phase_builds_redirect() {
        let strategy = ScalusStrategy::new(config(), HttpOAuth2Client::new().unwrap()).unwrap();
        let mut session = SharedSession::new();

        let redirect = strategy
            .request_phase("organization=snowdevil.scalus.com", FULL_HOST, &mut session)
            .unwrap();

        assert!(redirect
            .location
            .starts_with("https://snowdevil.scalus.com/admin/oauth/authorize?"));
        let url = url::Url::parse(&redirect.location).unwrap();
        let query: HashMap<_, _> = url.query_pairs().into_owned().collect();
        assert_eq!(query["client_id"], "123");
        assert_eq!(
            query["redirect_uri"],
            "https://app.example.com/auth/scalus/callback"
        );
        assert_eq!(query["scope"], "read_products");

        let stored = session.get(STATE_SESSION_KEY).unwrap();
        assert_eq!(stored.len(), 64);
        assert_eq!(query["state"], stored);
    }

    #[test]
    fn test_request_phase_passes_per_user_option() {
        let mut client = MockOAuth2Client::new();
        client
            .expect_authorize_url()
            .withf(|_, params| params.per_user)
            .times(1)
            .returning(|endpoints, _| Ok(endpoints.authorize_url.to_string()));

        let strategy =
            ScalusStrategy::new(config().with_per_user_permissions(), client).unwrap();
        let mut session = SharedSession::new();
        assert!(strategy
            .request_phase("organization=snowdevil", FULL_HOST, &mut session)
            .is_ok());
    }

    #[test]
    fn test_request_phase_rejects_invalid_sites() {
        let strategy = ScalusStrategy::new(config(), rejecting_client()).unwrap();

        for query in [
            "organization=foo.example.com",
            "organization=http%3A%2F%2Fsnowdevil.scalus.com",
            "organization=snowdevil.scalus.com%2Fpath",
            "organization=user%40snowdevil.scalus.com",
            "organization=snowdevil.scalus.com%3A22",
            "",
        ] {
            let mut session = SharedSession::new();
            let failure = strategy
                .request_phase(query, FULL_HOST, &mut session)
                .unwrap_err();
            assert_eq!(failure.reason(), "invalid_site", "{query}");
            assert!(session.get(STATE_SESSION_KEY).is_none());
        }
    }

    #[tokio::test]
    async fn test_callback_success() {
        let strategy =
            ScalusStrategy::new(config(), token_client(AccessToken::new("token"))).unwrap();
        let mut session = session_with_state();

        let result = strategy
            .callback_phase_at(&callback_query("snowdevil.scalus.com"), FULL_HOST, &mut session, NOW)
            .await
            .unwrap();

        assert_eq!(result.provider, "scalus");
        assert_eq!(result.uid, "snowdevil.scalus.com");
        assert_eq!(result.credentials.token, "token");
        assert!(!result.credentials.expires);
        assert!(session.get(STATE_SESSION_KEY).is_none());
    }

    #[tokio::test]
    async fn test_callback_accepts_current_time() {
        let strategy =
            ScalusStrategy::new(config(), token_client(AccessToken::new("token"))).unwrap();
        let mut session = session_with_state();
        let timestamp = Utc::now().timestamp().to_string();
        let query = signed_query(
            &[
                ("organization", "snowdevil.scalus.com"),
                ("code", "the-code"),
                ("timestamp", &timestamp),
                ("state", STATE),
            ],
            SECRET,
        );

        assert!(strategy
            .callback_phase(&query, FULL_HOST, &mut session)
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_callback_rejects_state_mismatch() {
        let strategy = ScalusStrategy::new(config(), rejecting_client()).unwrap();
        let mut session = SharedSession::new();
        session.insert(STATE_SESSION_KEY, "different".to_string());

        let failure = strategy
            .callback_phase_at(&callback_query("snowdevil.scalus.com"), FULL_HOST, &mut session, NOW)
            .await
            .unwrap_err();

        assert_eq!(failure.reason(), "csrf_detected");
        assert!(session.get(STATE_SESSION_KEY).is_none());
    }

    #[tokio::test]
    async fn test_callback_rejects_missing_session_state() {
        let strategy = ScalusStrategy::new(config(), rejecting_client()).unwrap();
        let mut session = SharedSession::new();

        let failure = strategy
            .callback_phase_at(&callback_query("snowdevil.scalus.com"), FULL_HOST, &mut session, NOW)
            .await
            .unwrap_err();

        assert_eq!(failure.reason(), "csrf_detected");
    }

    #[tokio::test]
    async fn test_callback_state_is_single_use() {
        let strategy =
            ScalusStrategy::new(config(), token_client(AccessToken::new("token"))).unwrap();
        let mut session = session_with_state();
        let query = callback_query("snowdevil.scalus.com");

        assert!(strategy
            .callback_phase_at(&query, FULL_HOST, &mut session, NOW)
            .await
            .is_ok());
        let replay = strategy
            .callback_phase_at(&query, FULL_HOST, &mut session, NOW)
            .await
            .unwrap_err();
        assert_eq!(replay.reason(), "csrf_detected");
    }

    #[tokio::test]
    async fn test_callback_rejects_bad_signature() {
        let strategy = ScalusStrategy::new(config(), rejecting_client()).unwrap();
        let timestamp = NOW.to_string();
        let query = signed_query(
            &[
                ("organization", "snowdevil.scalus.com"),
                ("code", "the-code"),
                ("timestamp", &timestamp),
                ("state", STATE),
            ],
            "wrong-secret",
        );

        let failure = strategy
            .callback_phase_at(&query, FULL_HOST, &mut session_with_state(), NOW)
            .await
            .unwrap_err();
        assert_eq!(failure.reason(), "invalid_signature");
    }

    #[tokio::test]
    async fn test_callback_rejects_old_timestamp() {
        let strategy = ScalusStrategy::new(config(), rejecting_client()).unwrap();

        let failure = strategy
            .callback_phase_at(
                &callback_query("snowdevil.scalus.com"),
                FULL_HOST,
                &mut session_with_state(),
                NOW + 301,
            )
            .await
            .unwrap_err();
        assert_eq!(failure.reason(), "invalid_signature");
    }

    #[tokio::test]
    async fn test_callback_accepts_old_client_secret() {
        let strategy = ScalusStrategy::new(
            StrategyConfig::new("123", "rotated").with_old_client_secret(SECRET),
            token_client(AccessToken::new("token")),
        )
        .unwrap();

        assert!(strategy
            .callback_phase_at(
                &callback_query("snowdevil.scalus.com"),
                FULL_HOST,
                &mut session_with_state(),
                NOW
            )
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_callback_rejects_invalid_sites() {
        let strategy = ScalusStrategy::new(config(), rejecting_client()).unwrap();

        for organization in [
            "foo.example.com",
            "http://snowdevil.scalus.com",
            "snowdevil.scalus.com/path",
            "user@snowdevil.scalus.com",
            "snowdevil.scalus.com:22",
        ] {
            let failure = strategy
                .callback_phase_at(
                    &callback_query(organization),
                    FULL_HOST,
                    &mut session_with_state(),
                    NOW,
                )
                .await
                .unwrap_err();
            assert_eq!(failure.reason(), "invalid_site", "{organization}");
        }
    }

    #[tokio::test]
    async fn test_callback_rejects_missing_code() {
        let strategy = ScalusStrategy::new(config(), rejecting_client()).unwrap();
        let timestamp = NOW.to_string();
        let query = signed_query(
            &[
                ("organization", "snowdevil.scalus.com"),
                ("timestamp", &timestamp),
                ("state", STATE),
            ],
            SECRET,
        );

        let failure = strategy
            .callback_phase_at(&query, FULL_HOST, &mut session_with_state(), NOW)
            .await
            .unwrap_err();
        assert_eq!(failure.reason(), "invalid_credentials");
    }

    #[tokio::test]
    async fn test_callback_passes_upstream_failure_through() {
        let mut client = MockOAuth2Client::new();
        client
            .expect_exchange_code()
            .times(1)
            .returning(|_, _| Err(OAuthError::Transport("connection reset".to_string())));
        let strategy = ScalusStrategy::new(config(), client).unwrap();

        let failure = strategy
            .callback_phase_at(
                &callback_query("snowdevil.scalus.com"),
                FULL_HOST,
                &mut session_with_state(),
                NOW,
            )
            .await
            .unwrap_err();
        assert!(matches!(failure, AuthFailure::Upstream(OAuthError::Transport(_))));
        assert_eq!(failure.reason(), "timeout");
    }

    #[tokio::test]
    async fn test_callback_checks_granted_scope() {
        let mut token = AccessToken::new("token");
        token.scope = Some("read_orders".to_string());
        let strategy = ScalusStrategy::new(config(), token_client(token)).unwrap();

        let failure = strategy
            .callback_phase_at(
                &callback_query("snowdevil.scalus.com"),
                FULL_HOST,
                &mut session_with_state(),
                NOW,
            )
            .await
            .unwrap_err();
        assert_eq!(failure.reason(), "invalid_scope");
    }

    #[tokio::test]
    async fn test_callback_accepts_implied_scope() {
        let mut token = AccessToken::new("token");
        token.scope = Some("write_products".to_string());
        let strategy = ScalusStrategy::new(
            config().with_scope("read_products,write_products"),
            token_client(token),
        )
        .unwrap();

        let result = strategy
            .callback_phase_at(
                &callback_query("snowdevil.scalus.com"),
                FULL_HOST,
                &mut session_with_state(),
                NOW,
            )
            .await
            .unwrap();
        assert_eq!(result.extra.scope.as_deref(), Some("write_products"));
    }

    #[tokio::test]
    async fn test_callback_per_user_requires_associated_user() {
        let strategy = ScalusStrategy::new(
            config().with_per_user_permissions(),
            token_client(AccessToken::new("token")),
        )
        .unwrap();

        let failure = strategy
            .callback_phase_at(
                &callback_query("snowdevil.scalus.com"),
                FULL_HOST,
                &mut session_with_state(),
                NOW,
            )
            .await
            .unwrap_err();
        assert_eq!(failure.reason(), "invalid_permissions");
    }

    #[tokio::test]
    async fn test_callback_per_user_success() {
        let mut token = AccessToken::new("token");
        token.associated_user = Some(serde_json::json!({"id": 902_541_635}));
        let strategy =
            ScalusStrategy::new(config().with_per_user_permissions(), token_client(token))
                .unwrap();

        let result = strategy
            .callback_phase_at(
                &callback_query("snowdevil.scalus.com"),
                FULL_HOST,
                &mut session_with_state(),
                NOW,
            )
            .await
            .unwrap();
        assert_eq!(result.extra.associated_user.unwrap()["id"], 902_541_635);
    }
}
