//! Successful authentication outcome handed to the host

use serde::{Deserialize, Serialize};

use crate::oauth2::AccessToken;
use crate::site::Site;

/// Authentication result for a verified callback
///
/// Inserted into request extensions by the middleware, so the host's callback
/// handler can pick it up with `Extension<AuthResult>`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthResult {
    /// Provider name, e.g. `scalus`
    pub provider: String,
    /// Validated organization host, e.g. `snowdevil.scalus.com`
    pub uid: String,
    /// Token credentials
    pub credentials: Credentials,
    /// Provider-specific data from the token response
    pub extra: Extra,
}

/// Access credentials
#[derive(Clone, Serialize, Deserialize)]
pub struct Credentials {
    /// Access token
    pub token: String,
    /// Whether the token expires
    pub expires: bool,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("token", &"[redacted]")
            .field("expires", &self.expires)
            .finish()
    }
}

/// Extra data reported by the token endpoint
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Extra {
    /// Granted scope, if reported
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    /// User the token acts for (per-user tokens only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub associated_user: Option<serde_json::Value>,
}

impl AuthResult {
    pub(crate) fn from_token(provider: &str, site: &Site, token: AccessToken) -> Self {
        Self {
            provider: provider.to_string(),
            uid: site.host().to_string(),
            credentials: Credentials {
                token: token.access_token,
                // Always false, even for per-user tokens with expires_in
                expires: false,
            },
            extra: Extra {
                scope: token.scope,
                associated_user: token.associated_user,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_token() {
        let mut token = AccessToken::new("abc");
        token.scope = Some("read_products".to_string());

        let result = AuthResult::from_token("scalus", &Site::new("snowdevil.scalus.com"), token);

        assert_eq!(result.provider, "scalus");
        assert_eq!(result.uid, "snowdevil.scalus.com");
        assert_eq!(result.credentials.token, "abc");
        assert!(!result.credentials.expires);
        assert_eq!(result.extra.scope.as_deref(), Some("read_products"));
        assert!(result.extra.associated_user.is_none());
    }

    #[test]
    fn test_debug_hides_token() {
        let result = AuthResult::from_token(
            "scalus",
            &Site::new("snowdevil.scalus.com"),
            AccessToken::new("very-secret-token"),
        );
        assert!(!format!("{result:?}").contains("very-secret-token"));
    }

    #[test]
    fn test_serializes_to_json() {
        let result = AuthResult::from_token(
            "scalus",
            &Site::new("snowdevil.scalus.com"),
            AccessToken::new("abc"),
        );
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["uid"], "snowdevil.scalus.com");
        assert_eq!(json["credentials"]["expires"], false);
        assert!(json["extra"].get("scope").is_none());
    }
}
