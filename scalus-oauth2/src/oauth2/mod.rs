//! OAuth2 client collaborator
//!
//! Everything the strategy needs from a generic OAuth2 client:
//! - [`ProviderEndpoints`]: the site, authorize and token URLs for one
//!   organization, plus client credentials
//! - [`OAuth2Client`]: builds authorize URLs and exchanges codes
//! - [`HttpOAuth2Client`]: default implementation on top of `oauth2` and
//!   `reqwest`
//!
//! Exchange failures surface as [`OAuthError`] and are passed to the host
//! unchanged; there is no retry at this layer.

pub mod client;
pub mod types;

pub use client::{HttpOAuth2Client, OAuth2Client};
pub use types::{AccessToken, AuthorizeParams, ConfiguredClient, OAuthError, ProviderEndpoints};

#[cfg(test)]
pub use client::MockOAuth2Client;
