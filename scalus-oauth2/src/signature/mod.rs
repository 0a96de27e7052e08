//! Callback signature verification
//!
//! The provider signs every callback with HMAC-SHA256 over a canonical
//! encoding of its query parameters, keyed with the client secret, and embeds
//! the signing time. A callback is authentic when:
//!
//! - it carries a signature (`hmac`, or legacy `signature`),
//! - the signature matches the canonical encoding under one of the configured
//!   secrets, and
//! - its `timestamp` is no older than the replay window.
//!
//! Callers only ever learn "invalid signature", never which of those failed.

pub mod canonical;
pub mod hmac;
pub mod timestamp;

pub use canonical::{encoded_params_for_signature, parse_query, CallbackParams};
pub use self::hmac::{constant_time_eq, sign, verify, verify_with_secrets, SignatureContext};
pub use timestamp::is_expired;

use crate::error::AuthFailure;
use timestamp::TIMESTAMP_FIELD;

/// Checks signature and freshness of callback parameters
#[derive(Clone)]
pub struct SignatureVerifier {
    secrets: Vec<String>,
    max_age_secs: i64,
}

impl SignatureVerifier {
    /// Create a verifier accepting any of `secrets`, primary first
    pub fn new<I, S>(secrets: I, max_age_secs: i64) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            secrets: secrets.into_iter().map(Into::into).collect(),
            max_age_secs,
        }
    }

    /// Replay window in seconds
    #[must_use]
    pub const fn max_age_secs(&self) -> i64 {
        self.max_age_secs
    }

    /// Verify `params` as of `now` (Unix seconds)
    ///
    /// # Errors
    ///
    /// Returns [`AuthFailure::InvalidSignature`] if the signature is missing
    /// or wrong, or the timestamp is missing, malformed or too old.
    pub fn verify(&self, params: &CallbackParams, now: i64) -> Result<(), AuthFailure> {
        // Both checks always run
        let expired = is_expired(
            params.get(TIMESTAMP_FIELD).map(String::as_str),
            now,
            self.max_age_secs,
        );
        let secrets: Vec<&str> = self.secrets.iter().map(String::as_str).collect();
        let signed = verify_with_secrets(params, &secrets);

        if signed && !expired {
            return Ok(());
        }

        tracing::debug!(signed, expired, "Callback signature rejected");
        Err(AuthFailure::InvalidSignature)
    }
}

impl std::fmt::Debug for SignatureVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignatureVerifier")
            .field("secrets", &self.secrets.len())
            .field("max_age_secs", &self.max_age_secs)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: i64 = 1_700_000_000;

    fn signed_params(timestamp: Option<i64>, secret: &str) -> CallbackParams {
        let mut params = CallbackParams::new();
        params.insert("organization".to_string(), "snowdevil.scalus.com".to_string());
        params.insert("code".to_string(), "abc".to_string());
        if let Some(ts) = timestamp {
            params.insert("timestamp".to_string(), ts.to_string());
        }
        let signature = sign(&encoded_params_for_signature(&params), secret);
        params.insert("hmac".to_string(), signature);
        params
    }

    #[test]
    fn test_accepts_fresh_signed_callback() {
        let verifier = SignatureVerifier::new(["53cr3tz"], 300);
        assert!(verifier
            .verify(&signed_params(Some(NOW - 5), "53cr3tz"), NOW)
            .is_ok());
    }

    #[test]
    fn test_expired_and_forged_look_the_same() {
        let verifier = SignatureVerifier::new(["53cr3tz"], 300);

        let expired = verifier
            .verify(&signed_params(Some(NOW - 301), "53cr3tz"), NOW)
            .unwrap_err();
        let forged = verifier
            .verify(&signed_params(Some(NOW), "wrong_secret"), NOW)
            .unwrap_err();
        let no_timestamp = verifier
            .verify(&signed_params(None, "53cr3tz"), NOW)
            .unwrap_err();

        assert_eq!(expired.reason(), "invalid_signature");
        assert_eq!(forged.reason(), expired.reason());
        assert_eq!(no_timestamp.reason(), expired.reason());
    }

    #[test]
    fn test_timestamp_is_covered_by_signature() {
        let verifier = SignatureVerifier::new(["53cr3tz"], 300);
        let mut params = signed_params(Some(NOW - 1000), "53cr3tz");
        // Refreshing the timestamp without re-signing must not help
        params.insert("timestamp".to_string(), NOW.to_string());
        assert!(verifier.verify(&params, NOW).is_err());
    }

    #[test]
    fn test_accepts_old_secret() {
        let verifier = SignatureVerifier::new(["new", "old"], 300);
        assert!(verifier.verify(&signed_params(Some(NOW), "old"), NOW).is_ok());
    }

    #[test]
    fn test_debug_hides_secrets() {
        let verifier = SignatureVerifier::new(["53cr3tz"], 300);
        assert!(!format!("{verifier:?}").contains("53cr3tz"));
    }
}
