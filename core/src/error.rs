//! Error types for the T3/SmartCare client.
//!
//! # Design
//! Caller mistakes (`Validation`, `Precondition`) are detected before any
//! request is built. `Protocol` and `Authentication` carry the fixed messages
//! callers match on; the status code is logged, not embedded. Transport
//! failures are passed through untouched.

use thiserror::Error;

use crate::http::TransportError;

pub const CHALLENGE_NOT_FOUND: &str = "Challenge not found";
pub const AUTHENTICATION_FAILED: &str = "Authentication failed";
pub const TOUCHMAP_REFRESH_FAILED: &str = "Touchmap refresh failed";
pub const SEARCH_FAILED: &str = "Search failed";
pub const ACCOUNT_LOOKUP_FAILED: &str = "Account lookup failed";
pub const STATEMENT_LOOKUP_FAILED: &str = "Statement lookup failed";
pub const DASHBOARD_REFRESH_FAILED: &str = "Dashboard refresh failed";
pub const LOGIN_REQUIRED: &str = "login required";

/// Errors returned by the client.
#[derive(Debug, Error)]
pub enum T3Error {
    /// Bad caller input or missing endpoint configuration.
    #[error("invalid argument: {0}")]
    Validation(String),

    /// The server answered, but not in the way the protocol requires.
    #[error("{0}")]
    Protocol(&'static str),

    /// The second handshake round was rejected.
    #[error("{0}")]
    Authentication(&'static str),

    /// The call needs a token and no login has succeeded yet.
    #[error("{0}")]
    Precondition(&'static str),

    /// The transport could not produce a response.
    #[error(transparent)]
    Transport(TransportError),

    /// The response body could not be deserialized into the expected type.
    #[error("deserialization failed: {0}")]
    Deserialization(String),

    /// The request payload could not be serialized to JSON.
    #[error("serialization failed: {0}")]
    Serialization(String),
}

impl T3Error {
    pub(crate) fn validation(msg: impl Into<String>) -> Self {
        T3Error::Validation(msg.into())
    }
}
