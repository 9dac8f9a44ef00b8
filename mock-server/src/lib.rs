use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};

use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sha1::{Digest, Sha1};
use tokio::{net::TcpListener, sync::RwLock};
use tracing::{debug, info};
use uuid::Uuid;

pub const CHALLENGE: &str = "T3Auth realm=\"SmartCare\"";
pub const DEFAULT_SECRET: &str = "mock-secret";
pub const DEFAULT_USER: &str = "jdoe";
pub const DEFAULT_PASSWORD: &str = "password";

const CUSTOMER_HEADER: &str = "x-smartcare-customerid";
const APP_HEADER: &str = "x-smartcare-appid";
const SESSION_HEADER: &str = "x-smartcare-sessionid";
const T3TOKEN_HEADER: &str = "x-smartcare-t3token";

#[derive(Deserialize)]
pub struct LoginBody {
    #[serde(rename = "ID")]
    pub id: String,
    #[serde(rename = "Password")]
    pub password: String,
    #[serde(rename = "AdditionalValuesVersion")]
    pub additional_values_version: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TokenPayload {
    #[serde(rename = "ID")]
    pub id: String,
    #[serde(rename = "T3Token")]
    pub t3_token: String,
    #[serde(rename = "AdditionalValues")]
    pub additional_values: Vec<Value>,
    #[serde(rename = "FirstName")]
    pub first_name: String,
}

#[derive(Deserialize)]
pub struct SearchBody {
    #[serde(rename = "Query")]
    pub query: String,
}

pub struct MockState {
    secret: String,
    users: HashMap<String, String>,
    issued: RwLock<HashSet<String>>,
}

pub type Shared = Arc<MockState>;

impl MockState {
    pub fn new(secret: &str) -> Self {
        Self {
            secret: secret.to_string(),
            users: HashMap::new(),
            issued: RwLock::new(HashSet::new()),
        }
    }

    pub fn with_user(mut self, id: &str, password: &str) -> Self {
        self.users.insert(id.to_string(), password.to_string());
        self
    }
}

impl Default for MockState {
    fn default() -> Self {
        MockState::new(DEFAULT_SECRET).with_user(DEFAULT_USER, DEFAULT_PASSWORD)
    }
}

pub fn app() -> Router {
    app_with(MockState::default())
}

pub fn app_with(state: MockState) -> Router {
    Router::new()
        .route("/login", post(login))
        .route("/touchmap", get(touchmap))
        .route("/search", post(search))
        .route("/account", get(account))
        .route("/statements", get(statements))
        .route("/dashboard", get(dashboard))
        .with_state(Arc::new(state))
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

/// `base64(SHA1(secret + " " + app + ":" + customer + ":" + session))`.
pub fn expected_token(secret: &str, app: &str, customer: &str, session: &str) -> String {
    let input = format!("{secret} {app}:{customer}:{session}");
    BASE64.encode(Sha1::digest(input.as_bytes()))
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

/// Pull the quoted `token="..."` parameter out of an Authorization value.
fn token_param(authorization: &str) -> Option<&str> {
    let start = authorization.find("token=\"")? + "token=\"".len();
    let rest = &authorization[start..];
    let end = rest.find('"')?;
    Some(&rest[..end])
}

fn challenge() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        [(header::WWW_AUTHENTICATE, CHALLENGE)],
    )
        .into_response()
}

async fn login(
    State(state): State<Shared>,
    headers: HeaderMap,
    Json(body): Json<LoginBody>,
) -> Response {
    let (Some(customer), Some(app), Some(session)) = (
        header_str(&headers, CUSTOMER_HEADER),
        header_str(&headers, APP_HEADER),
        header_str(&headers, SESSION_HEADER),
    ) else {
        return StatusCode::BAD_REQUEST.into_response();
    };
    if body.additional_values_version != "2" {
        return StatusCode::BAD_REQUEST.into_response();
    }

    let Some(authorization) = header_str(&headers, header::AUTHORIZATION.as_str()) else {
        debug!(session, "issuing challenge");
        return challenge();
    };

    let expected = expected_token(&state.secret, app, customer, session);
    let token_ok = token_param(authorization) == Some(expected.as_str());
    if !authorization.starts_with(CHALLENGE) || !token_ok {
        debug!(session, "bad handshake token");
        return StatusCode::UNAUTHORIZED.into_response();
    }
    if state.users.get(&body.id) != Some(&body.password) {
        debug!(user = %body.id, "bad credentials");
        return StatusCode::UNAUTHORIZED.into_response();
    }

    let t3_token = Uuid::new_v4().to_string();
    state.issued.write().await.insert(t3_token.clone());
    info!(user = %body.id, "login accepted");
    Json(TokenPayload {
        id: body.id,
        t3_token,
        additional_values: vec![json!({"Key": "Region", "Value": "EU"})],
        first_name: "Jane".to_string(),
    })
    .into_response()
}

async fn touchmap() -> Json<Value> {
    Json(json!({
        "Actions": [
            {"Name": "Home_Dashboard", "DisplayText": "Home", "Confidence": 0.9},
            {"Name": "Pay_Bill", "DisplayText": "Pay my bill", "ConfirmationText": "Pay now?"},
            {"Name": "View_Statements", "DisplayText": "Statements"}
        ],
        "ServiceItems": [
            {"Action": "Pay_Bill", "Title": "Billing"},
            {"Action": "View_Statements", "Title": "History"},
            {"Action": "Retired_Feature", "Title": "Old"}
        ]
    }))
}

async fn search(Json(body): Json<SearchBody>) -> Result<Json<Value>, StatusCode> {
    let query = body.query.trim().to_lowercase();
    if query.is_empty() {
        return Err(StatusCode::BAD_REQUEST);
    }
    let mut results = vec![json!({"Action": "Home_Dashboard", "Text": "home"})];
    if query.contains("bill") {
        results.push(json!({"Action": "Pay_Bill", "Text": "pay bill"}));
    }
    results.push(json!({"Action": "Legacy_Action", "Text": "legacy"}));
    Ok(Json(json!({ "Results": results })))
}

async fn authorized(state: &MockState, headers: &HeaderMap) -> Result<(), StatusCode> {
    let token = header_str(headers, T3TOKEN_HEADER).ok_or(StatusCode::UNAUTHORIZED)?;
    if state.issued.read().await.contains(token) {
        Ok(())
    } else {
        Err(StatusCode::UNAUTHORIZED)
    }
}

async fn account(
    State(state): State<Shared>,
    headers: HeaderMap,
) -> Result<Json<Value>, StatusCode> {
    authorized(&state, &headers).await?;
    Ok(Json(json!({"AccountNumber": "0042", "Balance": 12.5})))
}

async fn statements(
    State(state): State<Shared>,
    headers: HeaderMap,
) -> Result<Json<Value>, StatusCode> {
    authorized(&state, &headers).await?;
    Ok(Json(json!({
        "Statements": [
            {"Period": "2026-08", "Amount": 40.0},
            {"Period": "2026-09", "Amount": 42.5}
        ]
    })))
}

async fn dashboard(
    State(state): State<Shared>,
    headers: HeaderMap,
) -> Result<Json<Value>, StatusCode> {
    authorized(&state, &headers).await?;
    Ok(Json(json!({"Tiles": [{"Name": "Usage", "Value": "3.2 GB"}]})))
}
