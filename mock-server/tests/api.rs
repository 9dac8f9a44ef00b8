use axum::http::{self, Request, StatusCode};
use http_body_util::BodyExt;
use mock_server::{app, expected_token, TokenPayload, CHALLENGE, DEFAULT_SECRET};
use serde_json::Value;
use tower::ServiceExt;

const SESSION: &str = "11111111-2222-3333-4444-555555555555";
const LOGIN_BODY: &str = r#"{"ID":"jdoe","Password":"password","AdditionalValuesVersion":"2"}"#;

async fn body_json<T: serde::de::DeserializeOwned>(response: axum::response::Response) -> T {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

fn login_request(authorization: Option<&str>, body: &str) -> Request<String> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/login")
        .header(http::header::CONTENT_TYPE, "application/json")
        .header("X-SmartCare-CustomerID", "MockCustomer")
        .header("X-SmartCare-AppID", "MockApp")
        .header("X-SmartCare-SessionID", SESSION);
    if let Some(value) = authorization {
        builder = builder.header(http::header::AUTHORIZATION, value);
    }
    builder.body(body.to_string()).unwrap()
}

fn authorization() -> String {
    let token = expected_token(DEFAULT_SECRET, "MockApp", "MockCustomer", SESSION);
    format!("{CHALLENGE}, token=\"{token}\"")
}

fn get_with_token(uri: &str, token: Option<&str>) -> Request<String> {
    let mut builder = Request::builder().uri(uri);
    if let Some(token) = token {
        builder = builder.header("X-SmartCare-T3Token", token);
    }
    builder.body(String::new()).unwrap()
}

// --- login ---

#[tokio::test]
async fn first_round_returns_challenge() {
    let resp = app()
        .oneshot(login_request(None, LOGIN_BODY))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        resp.headers().get(http::header::WWW_AUTHENTICATE).unwrap(),
        CHALLENGE
    );
}

#[tokio::test]
async fn second_round_with_valid_token_succeeds() {
    let resp = app()
        .oneshot(login_request(Some(&authorization()), LOGIN_BODY))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let token: TokenPayload = body_json(resp).await;
    assert_eq!(token.id, "jdoe");
    assert!(!token.t3_token.is_empty());
}

#[tokio::test]
async fn second_round_with_wrong_token_is_rejected() {
    let value = format!("{CHALLENGE}, token=\"bogus\"");
    let resp = app()
        .oneshot(login_request(Some(&value), LOGIN_BODY))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert!(resp.headers().get(http::header::WWW_AUTHENTICATE).is_none());
}

#[tokio::test]
async fn wrong_password_is_rejected() {
    let body = r#"{"ID":"jdoe","Password":"nope","AdditionalValuesVersion":"2"}"#;
    let resp = app()
        .oneshot(login_request(Some(&authorization()), body))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn missing_session_header_is_bad_request() {
    let req = Request::builder()
        .method("POST")
        .uri("/login")
        .header(http::header::CONTENT_TYPE, "application/json")
        .body(LOGIN_BODY.to_string())
        .unwrap();
    let resp = app().oneshot(req).await.unwrap();

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

// --- touchmap / search ---

#[tokio::test]
async fn touchmap_lists_actions_and_items() {
    let resp = app().oneshot(get_with_token("/touchmap", None)).await.unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = body_json(resp).await;
    assert_eq!(body["Actions"].as_array().unwrap().len(), 3);
    assert_eq!(body["ServiceItems"][2]["Action"], "Retired_Feature");
}

#[tokio::test]
async fn search_returns_action_names() {
    let req = Request::builder()
        .method("POST")
        .uri("/search")
        .header(http::header::CONTENT_TYPE, "application/json")
        .body(r#"{"Query":"pay my bill"}"#.to_string())
        .unwrap();
    let resp = app().oneshot(req).await.unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = body_json(resp).await;
    let names: Vec<&str> = body["Results"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["Action"].as_str().unwrap())
        .collect();
    assert_eq!(names, ["Home_Dashboard", "Pay_Bill", "Legacy_Action"]);
}

// --- authenticated endpoints ---

#[tokio::test]
async fn account_requires_issued_token() {
    let resp = app()
        .oneshot(get_with_token("/account", Some("never-issued")))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let resp = app().oneshot(get_with_token("/dashboard", None)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn login_then_statements() {
    use tower::Service;

    let mut app = app().into_service();

    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(login_request(Some(&authorization()), LOGIN_BODY))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let token: TokenPayload = body_json(resp).await;

    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(get_with_token("/statements", Some(&token.t3_token)))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = body_json(resp).await;
    assert_eq!(body["Statements"].as_array().unwrap().len(), 2);
}
