//! Strategy configuration
//!
//! Configuration is supplied once, when the strategy is registered, and never
//! changes afterwards. It can be built in code or loaded from several sources
//! with clear precedence:
//!
//! 1. Environment variables (highest priority, `SCALUS_` prefix)
//! 2. A TOML file
//! 3. Hardcoded defaults (fallback)
//!
//! # Example Configuration
//!
//! ```toml
//! # scalus.toml
//! client_id = "123"
//! client_secret = "53cr3tz"
//! scope = "read_products,read_orders"
//! callback_path = "/auth/scalus/callback"
//! provider_domain_suffix = "scalus.com"
//! code_expires_after_secs = 300
//! ```
//!
//! # Usage
//!
//! ```rust
//! use scalus_oauth2::config::StrategyConfig;
//!
//! let config = StrategyConfig::new("123", "53cr3tz")
//!     .with_scope("read_products,write_content");
//!
//! assert_eq!(config.provider_domain_suffix, "scalus.com");
//! ```

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use url::Url;

use crate::error::ConfigError;

/// Scope requested when none is configured
pub const DEFAULT_SCOPE: &str = "read_products";

/// Domain suffix every organization site must live under by default
pub const DEFAULT_DOMAIN_SUFFIX: &str = "scalus.com";

/// Seconds a signed callback stays valid
pub const DEFAULT_CODE_EXPIRES_AFTER_SECS: i64 = 300;

/// Scalus OAuth2 strategy configuration
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StrategyConfig {
    /// OAuth2 client ID
    pub client_id: String,

    /// OAuth2 client secret, also the HMAC key for callbacks
    pub client_secret: String,

    /// Previous client secret, accepted for callbacks during key rotation
    pub old_client_secret: Option<String>,

    /// Comma separated scopes to request
    pub scope: String,

    /// Name used in routes and failure redirects
    pub provider_name: String,

    /// Prefix under which the request phase is mounted
    pub path_prefix: String,

    /// Path of the callback phase
    pub callback_path: String,

    /// Absolute callback URL; overrides `full_host` + `callback_path`
    pub callback_url: Option<String>,

    /// Scheme and authority of the host application, e.g. `https://app.example.com`
    pub full_host: Option<String>,

    /// Path the host renders failures on
    pub failure_path: String,

    /// Domain suffix organizations must live under; may include a port
    pub provider_domain_suffix: String,

    /// Authorize endpoint path on the provider site
    pub authorize_path: String,

    /// Token endpoint path on the provider site
    pub token_path: String,

    /// Replay window for signed callbacks, in seconds
    pub code_expires_after_secs: i64,

    /// Request online (per-user) access tokens
    pub per_user_permissions: bool,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: String::new(),
            old_client_secret: None,
            scope: DEFAULT_SCOPE.to_string(),
            provider_name: "scalus".to_string(),
            path_prefix: "/auth".to_string(),
            callback_path: "/auth/scalus/callback".to_string(),
            callback_url: None,
            full_host: None,
            failure_path: "/auth/failure".to_string(),
            provider_domain_suffix: DEFAULT_DOMAIN_SUFFIX.to_string(),
            authorize_path: "/admin/oauth/authorize".to_string(),
            token_path: "/admin/oauth/access_token".to_string(),
            code_expires_after_secs: DEFAULT_CODE_EXPIRES_AFTER_SECS,
            per_user_permissions: false,
        }
    }
}

// Secrets stay out of logs and panic messages
impl std::fmt::Debug for StrategyConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StrategyConfig")
            .field("client_id", &self.client_id)
            .field("client_secret", &"[redacted]")
            .field(
                "old_client_secret",
                &self.old_client_secret.as_ref().map(|_| "[redacted]"),
            )
            .field("scope", &self.scope)
            .field("provider_name", &self.provider_name)
            .field("path_prefix", &self.path_prefix)
            .field("callback_path", &self.callback_path)
            .field("callback_url", &self.callback_url)
            .field("full_host", &self.full_host)
            .field("failure_path", &self.failure_path)
            .field("provider_domain_suffix", &self.provider_domain_suffix)
            .field("authorize_path", &self.authorize_path)
            .field("token_path", &self.token_path)
            .field("code_expires_after_secs", &self.code_expires_after_secs)
            .field("per_user_permissions", &self.per_user_permissions)
            .finish()
    }
}

impl StrategyConfig {
    /// Create a configuration with the given credentials and defaults elsewhere
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            ..Default::default()
        }
    }

    /// Set the requested scope
    #[must_use]
    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = scope.into();
        self
    }

    /// Set the callback path
    #[must_use]
    pub fn with_callback_path(mut self, path: impl Into<String>) -> Self {
        self.callback_path = path.into();
        self
    }

    /// Set the host application's scheme and authority
    #[must_use]
    pub fn with_full_host(mut self, full_host: impl Into<String>) -> Self {
        self.full_host = Some(full_host.into());
        self
    }

    /// Set the domain suffix organizations must live under
    #[must_use]
    pub fn with_domain_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.provider_domain_suffix = suffix.into();
        self
    }

    /// Accept callbacks signed with a previous secret
    #[must_use]
    pub fn with_old_client_secret(mut self, secret: impl Into<String>) -> Self {
        self.old_client_secret = Some(secret.into());
        self
    }

    /// Set the replay window in seconds
    #[must_use]
    pub const fn with_code_expiry(mut self, seconds: i64) -> Self {
        self.code_expires_after_secs = seconds;
        self
    }

    /// Request per-user (online) access tokens
    #[must_use]
    pub const fn with_per_user_permissions(mut self) -> Self {
        self.per_user_permissions = true;
        self
    }

    /// Path that starts the request phase, e.g. `/auth/scalus`
    #[must_use]
    pub fn request_path(&self) -> String {
        format!(
            "{}/{}",
            self.path_prefix.trim_end_matches('/'),
            self.provider_name
        )
    }

    /// Secrets accepted when verifying callbacks, primary first
    #[must_use]
    pub fn signing_secrets(&self) -> Vec<&str> {
        std::iter::once(self.client_secret.as_str())
            .chain(self.old_client_secret.as_deref())
            .collect()
    }

    /// Check the configuration for values that would make the strategy unusable
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if credentials are empty, paths are relative,
    /// the replay window is not positive or `callback_url` is not absolute.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.client_id.is_empty() {
            return Err(ConfigError::Missing("client_id"));
        }
        if self.client_secret.is_empty() {
            return Err(ConfigError::Missing("client_secret"));
        }
        if self.provider_name.is_empty() {
            return Err(ConfigError::Missing("provider_name"));
        }
        if self.provider_domain_suffix.is_empty() {
            return Err(ConfigError::Missing("provider_domain_suffix"));
        }
        for (field, value) in [
            ("path_prefix", &self.path_prefix),
            ("callback_path", &self.callback_path),
            ("failure_path", &self.failure_path),
            ("authorize_path", &self.authorize_path),
            ("token_path", &self.token_path),
        ] {
            if !value.starts_with('/') {
                return Err(ConfigError::RelativePath {
                    field,
                    value: value.clone(),
                });
            }
        }
        if self.code_expires_after_secs <= 0 {
            return Err(ConfigError::ExpiryWindow);
        }
        if let Some(callback_url) = &self.callback_url {
            Url::parse(callback_url)?;
        }
        Ok(())
    }

    /// Load configuration from defaults and `SCALUS_*` environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if an environment value cannot be converted to the
    /// field's type.
    pub fn load() -> anyhow::Result<Self> {
        let config = Figment::new()
            .merge(Serialized::defaults(Self::default()))
            .merge(Env::prefixed("SCALUS_"))
            .extract()?;
        Ok(config)
    }

    /// Load configuration from a TOML file, with `SCALUS_*` environment
    /// variables taking precedence
    ///
    /// # Errors
    ///
    /// Returns an error if the file contains invalid TOML or values of the
    /// wrong type.
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// use scalus_oauth2::config::StrategyConfig;
    ///
    /// # fn example() -> anyhow::Result<()> {
    /// let config = StrategyConfig::load_from("./scalus.toml")?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn load_from(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let config = Figment::new()
            .merge(Toml::string(&toml::to_string(&Self::default())?))
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed("SCALUS_"))
            .extract()?;
        Ok(config)
    }
}
