//! Error types and failure reasons
//!
//! Two families live here:
//!
//! - [`AuthFailure`]: expected, per-request rejections. Each one maps to a
//!   stable reason code that the host's failure redirect carries in its
//!   `message` parameter.
//! - [`ConfigError`]: problems detected once, when the strategy is registered.

use thiserror::Error;

use crate::oauth2::OAuthError;

/// A rejected authorize or callback request
///
/// Signature, timestamp and missing-field problems all collapse into
/// [`AuthFailure::InvalidSignature`] so that a forged request cannot learn
/// which check it tripped.
#[derive(Debug, Error)]
pub enum AuthFailure {
    /// Organization is not a bare host under the configured domain suffix
    #[error("Organization does not resolve to a valid provider site")]
    InvalidSite,

    /// HMAC missing, wrong, or timestamp outside the replay window
    #[error("Callback signature is missing, invalid or expired")]
    InvalidSignature,

    /// `state` parameter does not match the value stored in session
    #[error("OAuth2 state mismatch (potential CSRF attack)")]
    CsrfDetected,

    /// Granted scope differs from the requested scope
    #[error("Granted scope does not match requested scope")]
    InvalidScope,

    /// Per-user permissions were requested but no associated user came back
    #[error("Token response is missing the associated user")]
    InvalidPermissions,

    /// Failure reported by the OAuth2 client collaborator
    #[error(transparent)]
    Upstream(#[from] OAuthError),
}

impl AuthFailure {
    /// Reason code consumed by the host's failure handler
    #[must_use]
    pub const fn reason(&self) -> &'static str {
        match self {
            Self::InvalidSite => "invalid_site",
            Self::InvalidSignature => "invalid_signature",
            Self::CsrfDetected => "csrf_detected",
            Self::InvalidScope => "invalid_scope",
            Self::InvalidPermissions => "invalid_permissions",
            Self::Upstream(err) => err.reason(),
        }
    }
}

/// Invalid strategy configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required field is empty
    #[error("Missing required configuration value: {0}")]
    Missing(&'static str),

    /// A path option does not start with `/`
    #[error("Configuration value {field} must be an absolute path, got {value:?}")]
    RelativePath {
        /// Name of the offending field
        field: &'static str,
        /// Value that was supplied
        value: String,
    },

    /// Domain suffix cannot be turned into a site pattern
    #[error("Invalid provider domain suffix {suffix:?}: {source}")]
    DomainSuffix {
        /// Suffix that was supplied
        suffix: String,
        /// Underlying regex error
        #[source]
        source: regex::Error,
    },

    /// Replay window must be positive
    #[error("code_expires_after_secs must be greater than zero")]
    ExpiryWindow,

    /// Callback URL override is not an absolute URL
    #[error("Invalid callback_url: {0}")]
    CallbackUrl(#[from] url::ParseError),
}
