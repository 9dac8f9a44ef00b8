//! T3Auth challenge/response primitives.
//!
//! # Design
//! The token is a pure function of static configuration and the session id:
//! `base64(SHA1(secret + " " + app + ":" + customer + ":" + session))`. No
//! server-supplied nonce enters it, so replay protection is session-scoped.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use sha1::{Digest, Sha1};

/// Scheme name that opens every challenge value.
pub const CHALLENGE_SCHEME: &str = "T3Auth";

/// Where a login attempt currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginState {
    Unauthenticated,
    AwaitingChallenge,
    AwaitingFinalToken,
    Authenticated,
}

/// The exact string that gets hashed. Exposed for verbose diagnostics.
pub fn token_input(secret: &str, app: &str, customer: &str, session_id: &str) -> String {
    format!("{secret} {app}:{customer}:{session_id}")
}

pub fn derive_token(secret: &str, app: &str, customer: &str, session_id: &str) -> String {
    let digest = Sha1::digest(token_input(secret, app, customer, session_id).as_bytes());
    BASE64.encode(digest)
}

/// Returns the challenge if `value` is a `T3Auth` challenge.
///
/// The scheme is matched case-insensitively and must be followed by
/// whitespace and realm data; surrounding whitespace is dropped.
pub fn parse_challenge(value: &str) -> Option<&str> {
    let value = value.trim();
    let (scheme, rest) = value.split_once(char::is_whitespace)?;
    if !scheme.eq_ignore_ascii_case(CHALLENGE_SCHEME) || rest.trim().is_empty() {
        return None;
    }
    Some(value)
}

/// Value of the second-round `Authorization` header.
pub fn authorization_value(challenge: &str, token: &str) -> String {
    format!("{challenge}, token=\"{token}\"")
}
