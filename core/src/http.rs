//! HTTP transport types for the host-does-IO pattern.
//!
//! # Design
//! Requests and responses are plain data. `SmartCareRequests` builds
//! `HttpRequest` values and parses `HttpResponse` values without touching the
//! network; whoever implements `Transport` performs the actual I/O. Pooling,
//! retries and TLS all live on that side of the boundary.
//!
//! All fields use owned types (`String`, `Vec`) so values can be handed to any
//! HTTP stack without lifetime concerns.

use async_trait::async_trait;

/// HTTP method for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
        }
    }
}

/// An HTTP request described as plain data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
}

impl HttpRequest {
    /// First value of the named request header, compared case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }
}

/// An HTTP response described as plain data.
///
/// Constructed by the transport after executing an `HttpRequest`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl HttpResponse {
    /// First value of the named response header. Header names are
    /// case-insensitive, so `WWW-Authenticate` matches `www-authenticate`.
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }
}

fn find_header<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(name))
        .map(|(_, value)| value.as_str())
}

/// Error type produced by a `Transport`. Passed to callers unchanged.
pub type TransportError = Box<dyn std::error::Error + Send + Sync>;

/// The I/O collaborator that executes requests built by the core.
///
/// Implementations must return non-2xx responses as `Ok(HttpResponse)`;
/// only failures to obtain a response at all belong in `Err`.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, TransportError>;
}
