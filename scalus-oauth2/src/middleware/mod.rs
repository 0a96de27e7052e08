//! Middleware layers for scalus-oauth2
//!
//! Provides the tower layer that mounts the strategy's request and callback
//! paths on a host application.

pub mod auth;

pub use auth::{ScalusAuthLayer, ScalusAuthMiddleware};
