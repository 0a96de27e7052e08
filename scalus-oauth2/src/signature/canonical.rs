//! Canonical encoding of callback parameters for HMAC signing
//!
//! Every parameter except the signature itself is rendered as `name=value`,
//! the rendered pairs are sorted lexically and joined with `&`. Only the
//! characters that would make the result ambiguous are escaped, so
//! `next=/products?page=2&q=red%20shirt` becomes
//! `next=/products?page=2%26q=red%2520shirt`.

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt::Write as _;

/// Current name of the signature parameter
pub const HMAC_FIELD: &str = "hmac";

/// Name of the signature parameter used by older provider versions
pub const LEGACY_SIGNATURE_FIELD: &str = "signature";

/// Characters escaped in parameter names
const NAME_RESERVED: &[char] = &['%', '&', '=', ' '];

/// Characters escaped in parameter values
const VALUE_RESERVED: &[char] = &['%', '&', ' '];

/// Callback parameters, keyed by name
pub type CallbackParams = BTreeMap<String, String>;

/// Parse a raw query string into [`CallbackParams`]
///
/// Names and values are percent-decoded. When a name repeats, the last value
/// wins.
#[must_use]
pub fn parse_query(query: &str) -> CallbackParams {
    url::form_urlencoded::parse(query.as_bytes())
        .into_owned()
        .collect()
}

/// Whether `name` carries a signature rather than signed data
#[must_use]
pub fn is_signature_field(name: &str) -> bool {
    name == HMAC_FIELD || name == LEGACY_SIGNATURE_FIELD
}

/// Build the string that is fed to HMAC
///
/// The result does not depend on the iteration order of `params`.
///
/// # Example
///
/// ```rust
/// use scalus_oauth2::signature::canonical::encoded_params_for_signature;
///
/// let encoded = encoded_params_for_signature([
///     ("timestamp", "1337178173"),
///     ("code", "0907a61c"),
///     ("hmac", "ignored"),
/// ]);
/// assert_eq!(encoded, "code=0907a61c&timestamp=1337178173");
/// ```
pub fn encoded_params_for_signature<I, K, V>(params: I) -> String
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: AsRef<str>,
{
    let mut pairs: Vec<String> = params
        .into_iter()
        .filter(|(name, _)| !is_signature_field(name.as_ref()))
        .map(|(name, value)| {
            format!(
                "{}={}",
                escape(name.as_ref(), NAME_RESERVED),
                escape(value.as_ref(), VALUE_RESERVED)
            )
        })
        .collect();

    pairs.sort_unstable();
    pairs.join("&")
}

fn escape<'a>(input: &'a str, reserved: &[char]) -> Cow<'a, str> {
    if !input.contains(reserved) {
        return Cow::Borrowed(input);
    }

    let mut escaped = String::with_capacity(input.len() + 8);
    for c in input.chars() {
        if reserved.contains(&c) {
            // Reserved characters are all ASCII, so one byte each
            let _ = write!(escaped, "%{:02X}", u32::from(c));
        } else {
            escaped.push(c);
        }
    }
    Cow::Owned(escaped)
}
