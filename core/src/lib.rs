//! Client core for the T3/SmartCare speech-services API.
//!
//! # Overview
//! Performs the two-round `T3Auth` challenge/response login, derives the
//! per-session token, and resolves search results against a cached touchmap
//! of named actions. Account, statement and dashboard lookups ride on the
//! stored login token.
//!
//! # Design
//! - `SmartCareRequests` is stateless: `build_*` produces an `HttpRequest`,
//!   `parse_*` consumes an `HttpResponse`. No I/O happens there.
//! - `T3Client` owns the login token and touchmap snapshot and executes
//!   requests through a caller-supplied `Transport`.
//! - DTOs are defined independently from the mock-server crate; the
//!   end-to-end test catches schema drift.

pub mod client;
pub mod config;
pub mod error;
pub mod handshake;
pub mod http;
pub mod requests;
pub mod touchmap;
pub mod types;

pub use client::T3Client;
pub use config::{ClientConfig, Endpoints};
pub use error::T3Error;
pub use handshake::{derive_token, LoginState};
pub use http::{HttpMethod, HttpRequest, HttpResponse, Transport, TransportError};
pub use requests::SmartCareRequests;
pub use touchmap::TouchmapCache;
pub use types::{
    Action, ActionRef, AdditionalValue, AuthToken, MenuItem, SearchResult, SearchResultEntry,
    ServiceItem, TouchmapResponse,
};
