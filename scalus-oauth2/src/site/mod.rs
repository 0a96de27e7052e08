//! Organization site resolution and validation
//!
//! Each organization has its own provider host. The `organization` parameter
//! is attacker controlled in both phases, so it is only trusted once it is a
//! bare host of the form `{label}.{suffix}`:
//!
//! - a bare label such as `snowdevil` gets `.{suffix}` appended,
//! - a scheme, userinfo, path, query or port is rejected,
//! - the suffix must match on a dot boundary (`evil-scalus.com` is not under
//!   `scalus.com`).
//!
//! A port is only accepted when the configured suffix itself carries one
//! (e.g. `scalus.dev:3000` for local development).

use regex::Regex;

use crate::error::{AuthFailure, ConfigError};

/// A validated organization host
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Site {
    host: String,
}

impl Site {
    pub(crate) fn new(host: impl Into<String>) -> Self {
        Self { host: host.into() }
    }

    /// Host (and suffix port, if any), e.g. `snowdevil.scalus.com`
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Provider base URL, always HTTPS
    #[must_use]
    pub fn url(&self) -> String {
        format!("https://{}", self.host)
    }
}

impl std::fmt::Display for Site {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.host)
    }
}

/// Turns raw `organization` values into validated [`Site`]s
#[derive(Debug, Clone)]
pub struct SiteResolver {
    suffix: String,
    pattern: Regex,
}

impl SiteResolver {
    /// Build a resolver for organizations under `suffix`
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::DomainSuffix`] if no pattern can be built from
    /// the suffix.
    pub fn new(suffix: &str) -> Result<Self, ConfigError> {
        let suffix = suffix.trim_start_matches('.');
        let pattern = Regex::new(&format!(
            r"\A[a-zA-Z0-9][a-zA-Z0-9\-]*\.{}\z",
            regex::escape(suffix)
        ))
        .map_err(|source| ConfigError::DomainSuffix {
            suffix: suffix.to_string(),
            source,
        })?;

        Ok(Self {
            suffix: suffix.to_string(),
            pattern,
        })
    }

    /// Domain suffix organizations must live under
    #[must_use]
    pub fn suffix(&self) -> &str {
        &self.suffix
    }

    /// Resolve and validate an organization
    ///
    /// # Errors
    ///
    /// Returns [`AuthFailure::InvalidSite`] if the organization is not a bare
    /// host under the configured suffix.
    ///
    /// # Example
    ///
    /// ```rust
    /// use scalus_oauth2::site::SiteResolver;
    ///
    /// let resolver = SiteResolver::new("scalus.com").unwrap();
    /// let site = resolver.resolve("snowdevil").unwrap();
    /// assert_eq!(site.url(), "https://snowdevil.scalus.com");
    ///
    /// assert!(resolver.resolve("snowdevil.scalus.com:22").is_err());
    /// ```
    pub fn resolve(&self, organization: &str) -> Result<Site, AuthFailure> {
        let host = if organization.contains('.') {
            organization.to_string()
        } else {
            format!("{organization}.{}", self.suffix)
        };

        if self.pattern.is_match(&host) {
            Ok(Site::new(host))
        } else {
            tracing::warn!(organization = %organization, "Rejected organization site");
            Err(AuthFailure::InvalidSite)
        }
    }
}
