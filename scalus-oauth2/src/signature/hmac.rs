//! HMAC-SHA256 signing and verification of callback parameters
//!
//! All signature comparisons are constant-time. A callback may carry its
//! signature as `hmac` or, from older provider versions, as `signature`.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use super::canonical::{
    encoded_params_for_signature, CallbackParams, HMAC_FIELD, LEGACY_SIGNATURE_FIELD,
};

type HmacSha256 = Hmac<Sha256>;

/// HMAC-SHA256 of `message` keyed with `secret`, as lowercase hex
///
/// # Example
///
/// ```rust
/// use scalus_oauth2::signature::hmac::sign;
///
/// let sig = sign("message", "key");
/// assert_eq!(
///     sig,
///     "6e9ef29b75fffc5b7abae527d58fdadb2fe42e7219011976917343065f58ed4a"
/// );
/// ```
#[must_use]
#[allow(clippy::missing_panics_doc)] // HMAC accepts any key size, so this never panics
pub fn sign(message: &str, secret: &str) -> String {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC can take key of any size");
    mac.update(message.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// Compare two strings without leaking where they differ
#[must_use]
pub fn constant_time_eq(a: &str, b: &str) -> bool {
    a.as_bytes().ct_eq(b.as_bytes()).into()
}

/// Signature supplied with the callback, preferring `hmac` over `signature`
#[must_use]
pub fn provided_signature(params: &CallbackParams) -> Option<&str> {
    params
        .get(HMAC_FIELD)
        .or_else(|| params.get(LEGACY_SIGNATURE_FIELD))
        .map(String::as_str)
}

/// Everything needed to decide whether one callback is authentic
#[derive(Clone)]
pub struct SignatureContext<'a> {
    /// Canonical encoding of the signed parameters
    pub canonical: String,
    /// Signature that came with the request
    pub provided: &'a str,
    expected: String,
}

impl<'a> SignatureContext<'a> {
    /// Derive the context for `params` under `secret`
    ///
    /// Returns `None` when the callback carries no signature at all.
    #[must_use]
    pub fn derive(params: &'a CallbackParams, secret: &str) -> Option<Self> {
        let provided = provided_signature(params)?;
        let canonical = encoded_params_for_signature(params);
        let expected = sign(&canonical, secret);

        Some(Self {
            canonical,
            provided,
            expected,
        })
    }

    /// Whether the provided signature matches the expected one
    #[must_use]
    pub fn is_valid(&self) -> bool {
        constant_time_eq(&self.expected, self.provided)
    }
}

/// Verify the callback signature against one secret
#[must_use]
pub fn verify(params: &CallbackParams, secret: &str) -> bool {
    verify_with_secrets(params, &[secret])
}

/// Verify the callback signature against any of `secrets`
///
/// Used during secret rotation, where callbacks signed with the previous
/// secret are still in flight.
#[must_use]
pub fn verify_with_secrets(params: &CallbackParams, secrets: &[&str]) -> bool {
    secrets.iter().any(|secret| {
        SignatureContext::derive(params, secret).is_some_and(|context| context.is_valid())
    })
}
