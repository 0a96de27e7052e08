//! OAuth2 `state` handling
//!
//! The request phase stores a fresh random state in the session and sends it
//! to the provider. The callback must echo it back unchanged. The stored value
//! is single use: it is removed on every callback, matched or not.

use rand::RngCore;

use crate::signature::constant_time_eq;

/// Session key holding the pending state
pub const STATE_SESSION_KEY: &str = "omniauth.state";

/// Random bytes per state value
const STATE_BYTES: usize = 32;

/// Generate a new unguessable state value (64 hex characters)
#[must_use]
pub fn generate_state() -> String {
    let mut bytes = [0u8; STATE_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Whether the callback `state` matches the one stored in session
///
/// Missing or empty values on either side never match.
#[must_use]
pub fn check_state(provided: Option<&str>, stored: Option<&str>) -> bool {
    match (provided, stored) {
        (Some(provided), Some(stored)) if !provided.is_empty() && !stored.is_empty() => {
            constant_time_eq(provided, stored)
        }
        _ => false,
    }
}
