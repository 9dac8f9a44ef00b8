//! Stateless request builder and response parser for the SmartCare API.
//!
//! # Design
//! `SmartCareRequests` holds the validated configuration and the session id
//! and nothing else. Each call is split into a `build_*` method that produces
//! an `HttpRequest` and a `parse_*` method that consumes an `HttpResponse`,
//! so a host can drive the protocol with any HTTP stack. `T3Client` is the
//! async driver built on top of it.

use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::warn;

use crate::config::ClientConfig;
use crate::error::{
    T3Error, ACCOUNT_LOOKUP_FAILED, AUTHENTICATION_FAILED, CHALLENGE_NOT_FOUND,
    DASHBOARD_REFRESH_FAILED, SEARCH_FAILED, STATEMENT_LOOKUP_FAILED, TOUCHMAP_REFRESH_FAILED,
};
use crate::handshake;
use crate::http::{HttpMethod, HttpRequest, HttpResponse};
use crate::types::{AuthToken, LoginRequest, SearchRequest, SearchResult, TouchmapResponse};

const ADDITIONAL_VALUES_VERSION: &str = "2";

#[derive(Debug, Clone)]
pub struct SmartCareRequests {
    config: ClientConfig,
    session_id: String,
}

impl SmartCareRequests {
    /// Validates `config`. The session id comes from the config when set,
    /// otherwise a random v4 UUID.
    pub fn new(config: ClientConfig) -> Result<Self, T3Error> {
        config.validate()?;
        let session_id = config
            .session_id
            .clone()
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        Ok(Self { config, session_id })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    fn header_name(&self, suffix: &str) -> String {
        format!("X-{}-{suffix}", self.config.header_prefix)
    }

    /// Customer, application, platform, culture and session headers sent on
    /// every request.
    pub fn base_headers(&self) -> Vec<(String, String)> {
        vec![
            (self.header_name("CustomerID"), self.config.customer_id.clone()),
            (self.header_name("AppID"), self.config.app_id.clone()),
            (self.header_name("Platform"), self.config.platform.clone()),
            (self.header_name("Culture"), self.config.culture.clone()),
            (self.header_name("SessionID"), self.session_id.clone()),
        ]
    }

    /// Headers carried by every call made on behalf of a logged-in user.
    pub fn auth_headers(&self, token: &AuthToken) -> Vec<(String, String)> {
        let mut headers = vec![
            (self.header_name("UserID"), token.id.clone()),
            (self.header_name("UserName"), token.id.clone()),
            (self.header_name("T3Token"), token.t3_token.clone()),
        ];
        if !token.additional_values.is_empty() {
            let joined = token
                .additional_values
                .iter()
                .map(|kv| kv.value.as_str())
                .collect::<Vec<_>>()
                .join(",");
            headers.push((self.header_name("AdditionalValues"), joined));
        }
        headers
    }

    fn endpoint(&self, name: &str, value: &Option<String>) -> Result<String, T3Error> {
        value
            .clone()
            .ok_or_else(|| T3Error::validation(format!("{name} endpoint is not configured")))
    }

    fn json_headers(&self) -> Vec<(String, String)> {
        let mut headers = vec![("Content-Type".to_string(), "application/json".to_string())];
        headers.extend(self.base_headers());
        headers
    }

    /// The current session token for this configuration.
    pub fn session_token(&self) -> String {
        handshake::derive_token(
            &self.config.secret,
            &self.config.app_id,
            &self.config.customer_id,
            &self.session_id,
        )
    }

    // -----------------------------------------------------------------------
    // Login
    // -----------------------------------------------------------------------

    /// Build a login request. Round one passes `authorization: None`; round
    /// two passes the value from `handshake::authorization_value`.
    pub fn build_login(
        &self,
        username: &str,
        password: &str,
        authorization: Option<&str>,
    ) -> Result<HttpRequest, T3Error> {
        // Blank credentials are rejected, but the values go out exactly as given.
        if username.trim().is_empty() {
            return Err(T3Error::validation("username must not be empty"));
        }
        if password.trim().is_empty() {
            return Err(T3Error::validation("password must not be empty"));
        }
        let url = self.endpoint("login", &self.config.endpoints.login)?;

        let body = serde_json::to_string(&LoginRequest {
            id: username.to_string(),
            password: password.to_string(),
            additional_values_version: ADDITIONAL_VALUES_VERSION.to_string(),
        })
        .map_err(|e| T3Error::Serialization(e.to_string()))?;

        let mut headers = self.json_headers();
        if let Some(value) = authorization {
            headers.push(("Authorization".to_string(), value.to_string()));
        }

        Ok(HttpRequest {
            method: HttpMethod::Post,
            url,
            headers,
            body: Some(body),
        })
    }

    /// Extract the `T3Auth` challenge from a first-round response.
    pub fn parse_challenge(&self, response: &HttpResponse) -> Result<String, T3Error> {
        response
            .header("WWW-Authenticate")
            .and_then(handshake::parse_challenge)
            .map(str::to_string)
            .ok_or(T3Error::Protocol(CHALLENGE_NOT_FOUND))
    }

    pub fn parse_login(&self, response: HttpResponse) -> Result<AuthToken, T3Error> {
        if response.status != 200 {
            warn!(status = response.status, "login rejected");
            return Err(T3Error::Authentication(AUTHENTICATION_FAILED));
        }
        let token: AuthToken = parse_body(&response)?;
        if token.t3_token.trim().is_empty() {
            warn!("login response carried an empty T3Token");
            return Err(T3Error::Authentication(AUTHENTICATION_FAILED));
        }
        Ok(token)
    }

    // -----------------------------------------------------------------------
    // Touchmap and search
    // -----------------------------------------------------------------------

    /// The touchmap is fetched with auth headers when a token is available.
    pub fn build_touchmap(&self, token: Option<&AuthToken>) -> Result<HttpRequest, T3Error> {
        let url = self.endpoint("touchmap", &self.config.endpoints.touchmap)?;
        let mut headers = self.base_headers();
        if let Some(token) = token {
            headers.extend(self.auth_headers(token));
        }
        Ok(HttpRequest {
            method: HttpMethod::Get,
            url,
            headers,
            body: None,
        })
    }

    pub fn parse_touchmap(&self, response: HttpResponse) -> Result<TouchmapResponse, T3Error> {
        check_status(&response, TOUCHMAP_REFRESH_FAILED)?;
        parse_body(&response)
    }

    pub fn build_search(
        &self,
        query: &str,
        token: Option<&AuthToken>,
    ) -> Result<HttpRequest, T3Error> {
        let query = validate_query(query)?;
        let url = self.endpoint("search", &self.config.endpoints.search)?;
        let body = serde_json::to_string(&SearchRequest {
            query: query.to_string(),
        })
        .map_err(|e| T3Error::Serialization(e.to_string()))?;

        let mut headers = self.json_headers();
        if let Some(token) = token {
            headers.extend(self.auth_headers(token));
        }
        Ok(HttpRequest {
            method: HttpMethod::Post,
            url,
            headers,
            body: Some(body),
        })
    }

    pub fn parse_search(&self, response: HttpResponse) -> Result<SearchResult, T3Error> {
        check_status(&response, SEARCH_FAILED)?;
        parse_body(&response)
    }

    // -----------------------------------------------------------------------
    // Account, statements, dashboard
    // -----------------------------------------------------------------------

    fn build_authenticated_get(
        &self,
        name: &str,
        endpoint: &Option<String>,
        token: &AuthToken,
    ) -> Result<HttpRequest, T3Error> {
        let url = self.endpoint(name, endpoint)?;
        let mut headers = self.base_headers();
        headers.extend(self.auth_headers(token));
        Ok(HttpRequest {
            method: HttpMethod::Get,
            url,
            headers,
            body: None,
        })
    }

    pub fn build_account(&self, token: &AuthToken) -> Result<HttpRequest, T3Error> {
        self.build_authenticated_get("account", &self.config.endpoints.account, token)
    }

    pub fn parse_account(&self, response: HttpResponse) -> Result<Value, T3Error> {
        check_status(&response, ACCOUNT_LOOKUP_FAILED)?;
        parse_body(&response)
    }

    pub fn build_statements(&self, token: &AuthToken) -> Result<HttpRequest, T3Error> {
        self.build_authenticated_get("statements", &self.config.endpoints.statements, token)
    }

    pub fn parse_statements(&self, response: HttpResponse) -> Result<Value, T3Error> {
        check_status(&response, STATEMENT_LOOKUP_FAILED)?;
        parse_body(&response)
    }

    pub fn build_dashboard(&self, token: &AuthToken) -> Result<HttpRequest, T3Error> {
        self.build_authenticated_get("dashboard", &self.config.endpoints.dashboard, token)
    }

    pub fn parse_dashboard(&self, response: HttpResponse) -> Result<Value, T3Error> {
        check_status(&response, DASHBOARD_REFRESH_FAILED)?;
        parse_body(&response)
    }
}

pub(crate) fn validate_query(query: &str) -> Result<&str, T3Error> {
    let query = query.trim();
    if query.is_empty() {
        return Err(T3Error::validation("query must not be empty"));
    }
    Ok(query)
}

/// Anything but 200 maps to `Protocol(message)`.
fn check_status(response: &HttpResponse, message: &'static str) -> Result<(), T3Error> {
    if response.status == 200 {
        return Ok(());
    }
    warn!(status = response.status, "{message}");
    Err(T3Error::Protocol(message))
}

fn parse_body<T: DeserializeOwned>(response: &HttpResponse) -> Result<T, T3Error> {
    serde_json::from_str(&response.body).map_err(|e| T3Error::Deserialization(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::AdditionalValue;
    use serde_json::json;

    const SESSION: &str = "15344b6f-2131-2fa9-994e-c69103be9859";

    fn requests() -> SmartCareRequests {
        let config = ClientConfig::new("Tester", "Mocha", "secret")
            .with_base_url("http://localhost:3000")
            .with_session_id(SESSION);
        SmartCareRequests::new(config).unwrap()
    }

    fn token(additional: &[&str]) -> AuthToken {
        AuthToken {
            id: "jdoe".to_string(),
            t3_token: "t3-abc".to_string(),
            additional_values: additional
                .iter()
                .enumerate()
                .map(|(i, v)| AdditionalValue {
                    key: format!("k{i}"),
                    value: v.to_string(),
                })
                .collect(),
            first_name: None,
            last_name: None,
            email: None,
            extra: Default::default(),
        }
    }

    fn response(status: u16, body: &str) -> HttpResponse {
        HttpResponse {
            status,
            headers: Vec::new(),
            body: body.to_string(),
        }
    }

    #[test]
    fn random_session_id_when_not_configured() {
        let config = ClientConfig::new("Tester", "Mocha", "secret");
        let a = SmartCareRequests::new(config.clone()).unwrap();
        let b = SmartCareRequests::new(config).unwrap();
        assert_ne!(a.session_id(), b.session_id());
        assert!(uuid::Uuid::parse_str(a.session_id()).is_ok());
    }

    #[test]
    fn session_token_uses_configured_session() {
        assert_eq!(requests().session_token(), "0OyW0ObuyVmHzSAcOQt9dzjF4w8=");
    }

    #[test]
    fn build_login_first_round() {
        let req = requests().build_login("jdoe", "pw", None).unwrap();
        assert_eq!(req.method, HttpMethod::Post);
        assert_eq!(req.url, "http://localhost:3000/login");
        assert_eq!(req.header("x-smartcare-customerid"), Some("Tester"));
        assert_eq!(req.header("X-SmartCare-AppID"), Some("Mocha"));
        assert_eq!(req.header("X-SmartCare-Platform"), Some("Rust"));
        assert_eq!(req.header("X-SmartCare-Culture"), Some("en-US"));
        assert_eq!(req.header("X-SmartCare-SessionID"), Some(SESSION));
        assert!(req.header("Authorization").is_none());

        let body: serde_json::Value = serde_json::from_str(req.body.as_deref().unwrap()).unwrap();
        assert_eq!(
            body,
            json!({"ID": "jdoe", "Password": "pw", "AdditionalValuesVersion": "2"})
        );
    }

    #[test]
    fn build_login_sends_credentials_verbatim() {
        let req = requests().build_login(" jdoe ", " pass word ", None).unwrap();
        let body: serde_json::Value = serde_json::from_str(req.body.as_deref().unwrap()).unwrap();
        assert_eq!(body["ID"], " jdoe ");
        assert_eq!(body["Password"], " pass word ");
    }

    #[test]
    fn build_login_second_round_adds_authorization() {
        let req = requests()
            .build_login("jdoe", "pw", Some("T3Auth realm=\"x\", token=\"abc\""))
            .unwrap();
        assert_eq!(
            req.header("Authorization"),
            Some("T3Auth realm=\"x\", token=\"abc\"")
        );
    }

    #[test]
    fn build_login_rejects_blank_credentials() {
        let err = requests().build_login("   ", "pw", None).unwrap_err();
        assert!(matches!(err, T3Error::Validation(_)));
        let err = requests().build_login("jdoe", "", None).unwrap_err();
        assert!(matches!(err, T3Error::Validation(_)));
    }

    #[test]
    fn build_login_requires_endpoint() {
        let requests = SmartCareRequests::new(ClientConfig::new("Tester", "Mocha", "secret")).unwrap();
        let err = requests.build_login("jdoe", "pw", None).unwrap_err();
        assert!(matches!(err, T3Error::Validation(msg) if msg.contains("login")));
    }

    #[test]
    fn parse_challenge_is_case_insensitive() {
        let resp = HttpResponse {
            status: 401,
            headers: vec![("www-AUTHENTICATE".to_string(), "T3Auth realm=\"x\"".to_string())],
            body: String::new(),
        };
        assert_eq!(requests().parse_challenge(&resp).unwrap(), "T3Auth realm=\"x\"");
    }

    #[test]
    fn parse_challenge_missing_header() {
        let err = requests().parse_challenge(&response(401, "")).unwrap_err();
        assert!(matches!(err, T3Error::Protocol(CHALLENGE_NOT_FOUND)));
    }

    #[test]
    fn parse_challenge_wrong_scheme() {
        let resp = HttpResponse {
            status: 401,
            headers: vec![("WWW-Authenticate".to_string(), "Bearer realm=\"x\"".to_string())],
            body: String::new(),
        };
        let err = requests().parse_challenge(&resp).unwrap_err();
        assert_eq!(err.to_string(), "Challenge not found");
    }

    #[test]
    fn parse_login_success() {
        let token = requests()
            .parse_login(response(200, r#"{"ID":"jdoe","T3Token":"t3-abc"}"#))
            .unwrap();
        assert_eq!(token.id, "jdoe");
        assert_eq!(token.t3_token, "t3-abc");
    }

    #[test]
    fn parse_login_non_200() {
        let err = requests().parse_login(response(403, "denied")).unwrap_err();
        assert_eq!(err.to_string(), "Authentication failed");
    }

    #[test]
    fn parse_login_empty_token() {
        let err = requests()
            .parse_login(response(200, r#"{"ID":"jdoe","T3Token":""}"#))
            .unwrap_err();
        assert!(matches!(err, T3Error::Authentication(_)));
    }

    #[test]
    fn auth_headers_without_additional_values() {
        let headers = requests().auth_headers(&token(&[]));
        assert_eq!(
            headers,
            vec![
                ("X-SmartCare-UserID".to_string(), "jdoe".to_string()),
                ("X-SmartCare-UserName".to_string(), "jdoe".to_string()),
                ("X-SmartCare-T3Token".to_string(), "t3-abc".to_string()),
            ]
        );
    }

    #[test]
    fn auth_headers_join_additional_values() {
        let headers = requests().auth_headers(&token(&["EU", "gold"]));
        assert_eq!(
            headers.last(),
            Some(&("X-SmartCare-AdditionalValues".to_string(), "EU,gold".to_string()))
        );
    }

    #[test]
    fn header_prefix_is_configurable() {
        let mut config = ClientConfig::new("Tester", "Mocha", "secret");
        config.header_prefix = "T3".to_string();
        let requests = SmartCareRequests::new(config).unwrap();
        assert_eq!(requests.base_headers()[0].0, "X-T3-CustomerID");
    }

    #[test]
    fn build_search_validates_query() {
        let err = requests().build_search("  ", None).unwrap_err();
        assert!(matches!(err, T3Error::Validation(_)));
    }

    #[test]
    fn build_search_body_and_auth() {
        let req = requests().build_search(" pay my bill ", Some(&token(&[]))).unwrap();
        assert_eq!(req.method, HttpMethod::Post);
        assert_eq!(req.url, "http://localhost:3000/search");
        assert_eq!(req.header("X-SmartCare-T3Token"), Some("t3-abc"));
        let body: serde_json::Value = serde_json::from_str(req.body.as_deref().unwrap()).unwrap();
        assert_eq!(body, json!({"Query": "pay my bill"}));
    }

    #[test]
    fn build_touchmap_is_get() {
        let req = requests().build_touchmap(None).unwrap();
        assert_eq!(req.method, HttpMethod::Get);
        assert_eq!(req.url, "http://localhost:3000/touchmap");
        assert!(req.body.is_none());
        assert!(req.header("X-SmartCare-T3Token").is_none());
    }

    #[test]
    fn non_200_maps_to_literal_messages() {
        let r = requests();
        assert_eq!(
            r.parse_touchmap(response(500, "")).unwrap_err().to_string(),
            "Touchmap refresh failed"
        );
        assert_eq!(
            r.parse_search(response(502, "")).unwrap_err().to_string(),
            "Search failed"
        );
        assert_eq!(
            r.parse_account(response(404, "")).unwrap_err().to_string(),
            "Account lookup failed"
        );
        assert_eq!(
            r.parse_statements(response(500, "")).unwrap_err().to_string(),
            "Statement lookup failed"
        );
        assert_eq!(
            r.parse_dashboard(response(503, "")).unwrap_err().to_string(),
            "Dashboard refresh failed"
        );
    }

    #[test]
    fn authenticated_gets_carry_token() {
        let r = requests();
        let t = token(&["EU"]);
        for req in [
            r.build_account(&t).unwrap(),
            r.build_statements(&t).unwrap(),
            r.build_dashboard(&t).unwrap(),
        ] {
            assert_eq!(req.method, HttpMethod::Get);
            assert_eq!(req.header("X-SmartCare-UserID"), Some("jdoe"));
            assert_eq!(req.header("X-SmartCare-AdditionalValues"), Some("EU"));
        }
    }

    #[test]
    fn parse_bad_json() {
        let err = requests().parse_search(response(200, "not json")).unwrap_err();
        assert!(matches!(err, T3Error::Deserialization(_)));
    }
}
