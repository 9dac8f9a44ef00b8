//! Async client that owns the session state and drives the protocol.
//!
//! # Design
//! `T3Client` pairs a `SmartCareRequests` builder with a `Transport`. The
//! stored `AuthToken`, the current `TouchmapCache` snapshot and the handshake
//! `LoginState` each sit behind their own `RwLock` and are only ever replaced
//! whole. Cold-cache refreshes go through `refresh_gate`, so
//! concurrent searches on a cold cache share one fetch.

use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::config::ClientConfig;
use crate::error::{T3Error, LOGIN_REQUIRED};
use crate::handshake::{self, LoginState};
use crate::http::{HttpRequest, HttpResponse, Transport};
use crate::requests::{validate_query, SmartCareRequests};
use crate::touchmap::TouchmapCache;
use crate::types::{AuthToken, MenuItem, SearchResult};

const VERBOSE: &str = "t3_core::verbose";

pub struct T3Client<T> {
    requests: SmartCareRequests,
    transport: T,
    token: RwLock<Option<AuthToken>>,
    touchmap: RwLock<Option<Arc<TouchmapCache>>>,
    state: RwLock<LoginState>,
    refresh_gate: Mutex<()>,
}

impl<T: Transport> T3Client<T> {
    pub fn new(config: ClientConfig, transport: T) -> Result<Self, T3Error> {
        let requests = SmartCareRequests::new(config)?;
        debug!(session_id = requests.session_id(), "client created");
        Ok(Self {
            requests,
            transport,
            token: RwLock::new(None),
            touchmap: RwLock::new(None),
            state: RwLock::new(LoginState::Unauthenticated),
            refresh_gate: Mutex::new(()),
        })
    }

    pub fn requests(&self) -> &SmartCareRequests {
        &self.requests
    }

    pub fn session_id(&self) -> &str {
        self.requests.session_id()
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, T3Error> {
        debug!(method = request.method.as_str(), url = %request.url, "sending request");
        self.transport
            .execute(request)
            .await
            .map_err(T3Error::Transport)
    }

    // -----------------------------------------------------------------------
    // Authentication
    // -----------------------------------------------------------------------

    /// Run the two-round T3Auth handshake and store the resulting token.
    ///
    /// On any failure the previously stored token, if there was one, is kept.
    pub async fn login(&self, username: &str, password: &str) -> Result<AuthToken, T3Error> {
        let first = self.requests.build_login(username, password, None)?;
        let result = self.handshake(username, password, first).await;
        if let Err(e) = &result {
            let stage = self.login_state().await;
            let state = self.settle_state().await;
            warn!(?stage, ?state, "login aborted: {e}");
        }
        result
    }

    async fn handshake(
        &self,
        username: &str,
        password: &str,
        first: HttpRequest,
    ) -> Result<AuthToken, T3Error> {
        self.set_state(LoginState::AwaitingChallenge).await;
        debug!("login round one");
        let response = self.send(first).await?;
        let challenge = self.requests.parse_challenge(&response)?;

        let token = self.requests.session_token();
        if self.requests.config().verbose {
            let config = self.requests.config();
            info!(
                target: VERBOSE,
                input = %handshake::token_input(
                    &config.secret,
                    &config.app_id,
                    &config.customer_id,
                    self.session_id(),
                ),
                token = %token,
                "derived session token"
            );
        }

        self.set_state(LoginState::AwaitingFinalToken).await;
        debug!("login round two");
        let authorization = handshake::authorization_value(&challenge, &token);
        let second = self
            .requests
            .build_login(username, password, Some(&authorization))?;
        let response = self.send(second).await?;
        if self.requests.config().verbose {
            info!(target: VERBOSE, status = response.status, body = %response.body, "login response");
        }
        let auth = self.requests.parse_login(response)?;

        *self.token.write().await = Some(auth.clone());
        self.set_state(LoginState::Authenticated).await;
        info!(user = %auth.id, "login succeeded");
        Ok(auth)
    }

    async fn set_state(&self, state: LoginState) {
        *self.state.write().await = state;
    }

    /// Fall back to whatever the stored token supports.
    async fn settle_state(&self) -> LoginState {
        let state = if self.is_authenticated().await {
            LoginState::Authenticated
        } else {
            LoginState::Unauthenticated
        };
        self.set_state(state).await;
        state
    }

    pub async fn is_authenticated(&self) -> bool {
        self.token.read().await.is_some()
    }

    /// Where the client is in the handshake. Reports the awaiting states only
    /// while a `login` call is in flight.
    pub async fn login_state(&self) -> LoginState {
        *self.state.read().await
    }

    pub async fn auth_token(&self) -> Option<AuthToken> {
        self.token.read().await.clone()
    }

    /// Forget the stored token. No request is sent.
    pub async fn logout(&self) {
        if self.token.write().await.take().is_some() {
            self.set_state(LoginState::Unauthenticated).await;
            debug!("logged out");
        }
    }

    async fn require_token(&self) -> Result<AuthToken, T3Error> {
        self.token
            .read()
            .await
            .clone()
            .ok_or(T3Error::Precondition(LOGIN_REQUIRED))
    }

    // -----------------------------------------------------------------------
    // Touchmap
    // -----------------------------------------------------------------------

    /// Fetch the touchmap and swap in the new snapshot.
    pub async fn refresh(&self) -> Result<Arc<TouchmapCache>, T3Error> {
        let token = self.auth_token().await;
        let request = self.requests.build_touchmap(token.as_ref())?;
        let response = self.send(request).await?;
        let payload = self.requests.parse_touchmap(response)?;

        let cache = Arc::new(TouchmapCache::from_response(payload, Utc::now()));
        *self.touchmap.write().await = Some(Arc::clone(&cache));
        info!(actions = cache.len(), menu = cache.menu().len(), "touchmap refreshed");
        Ok(cache)
    }

    /// The current snapshot, if one has been fetched.
    pub async fn touchmap(&self) -> Option<Arc<TouchmapCache>> {
        self.touchmap.read().await.clone()
    }

    /// Resolved service items from the current snapshot.
    pub async fn menu(&self) -> Vec<MenuItem> {
        self.touchmap()
            .await
            .map(|cache| cache.menu().to_vec())
            .unwrap_or_default()
    }

    async fn fresh_touchmap(&self) -> Option<Arc<TouchmapCache>> {
        let ttl = self.requests.config().touchmap_ttl();
        self.touchmap()
            .await
            .filter(|cache| !cache.is_stale(ttl, Utc::now()))
    }

    /// Return a usable snapshot, fetching one if the cache is cold or stale.
    async fn ensure_touchmap(&self) -> Result<Arc<TouchmapCache>, T3Error> {
        if let Some(cache) = self.fresh_touchmap().await {
            return Ok(cache);
        }
        let _gate = self.refresh_gate.lock().await;
        // Another caller may have refreshed while this one waited.
        if let Some(cache) = self.fresh_touchmap().await {
            return Ok(cache);
        }
        debug!("touchmap cold, refreshing before search");
        self.refresh().await
    }

    // -----------------------------------------------------------------------
    // Search
    // -----------------------------------------------------------------------

    /// Run a search and resolve each result's action name against the
    /// touchmap. Names missing from the touchmap stay as strings.
    pub async fn search(&self, query: &str) -> Result<SearchResult, T3Error> {
        validate_query(query)?;
        let cache = self.ensure_touchmap().await?;

        let token = self.auth_token().await;
        let request = self.requests.build_search(query, token.as_ref())?;
        let response = self.send(request).await?;
        let mut result = self.requests.parse_search(response)?;

        let resolved = cache.resolve(&mut result);
        debug!(results = result.results.len(), resolved, "search completed");
        Ok(result)
    }

    // -----------------------------------------------------------------------
    // Account data
    // -----------------------------------------------------------------------

    pub async fn get_account(&self) -> Result<Value, T3Error> {
        let token = self.require_token().await?;
        let request = self.requests.build_account(&token)?;
        let response = self.send(request).await?;
        self.requests.parse_account(response)
    }

    pub async fn get_statements(&self) -> Result<Value, T3Error> {
        let token = self.require_token().await?;
        let request = self.requests.build_statements(&token)?;
        let response = self.send(request).await?;
        self.requests.parse_statements(response)
    }

    pub async fn refresh_dashboard(&self) -> Result<Value, T3Error> {
        let token = self.require_token().await?;
        let request = self.requests.build_dashboard(&token)?;
        let response = self.send(request).await?;
        self.requests.parse_dashboard(response)
    }
}
