//! Stateful fake downstream systems for adapter tests
//!
//! Each fake is a small axum app bound to an ephemeral local port. It keeps
//! its user table in memory so that lookups see earlier creations.

#![allow(dead_code)]

use axum::extract::{Query, State};
use axum::http::{header, HeaderMap, HeaderName, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use hmac::{Hmac, Mac};
use serde_json::{json, Value};
use sha2::Sha256;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const ADMIN_EMAIL: &str = "owner@example.com";
pub const ADMIN_PASSWORD: &str = "owner-password-123";
pub const SHARED_SECRET: &[u8] = b"integration-shared-secret";

#[derive(Default)]
pub struct FakeState {
    pub users: Vec<Value>,
    pub creations: usize,
    pub login_calls: usize,
    pub listing_calls: usize,
    pub passwords: HashMap<String, String>,
    /// Status and body returned by the create/invite endpoint instead of success
    pub reject_create: Option<(u16, String)>,
    /// Delay applied to the user listing
    pub listing_delay: Option<Duration>,
    /// Email written into created records instead of the requested one
    pub echo_email: Option<String>,
}

#[derive(Clone)]
pub struct FakeDownstream {
    pub base_url: String,
    pub state: Arc<Mutex<FakeState>>,
}

impl FakeDownstream {
    pub fn creations(&self) -> usize {
        self.state.lock().unwrap().creations
    }

    pub fn login_calls(&self) -> usize {
        self.state.lock().unwrap().login_calls
    }

    pub fn listing_calls(&self) -> usize {
        self.state.lock().unwrap().listing_calls
    }

    pub fn users(&self) -> Vec<Value> {
        self.state.lock().unwrap().users.clone()
    }

    pub fn seed_user(&self, record: Value) {
        self.state.lock().unwrap().users.push(record);
    }

    pub fn set_password(&self, email: &str, password: &str) {
        self.state
            .lock()
            .unwrap()
            .passwords
            .insert(email.to_string(), password.to_string());
    }

    pub fn reject_create(&self, status: u16, body: &str) {
        self.state.lock().unwrap().reject_create = Some((status, body.to_string()));
    }

    pub fn delay_listing(&self, delay: Duration) {
        self.state.lock().unwrap().listing_delay = Some(delay);
    }

    pub fn echo_email(&self, email: &str) {
        self.state.lock().unwrap().echo_email = Some(email.to_string());
    }
}

type Shared = Arc<Mutex<FakeState>>;

async fn serve(router: Router<Shared>) -> FakeDownstream {
    let state: Shared = Arc::new(Mutex::new(FakeState::default()));
    state
        .lock()
        .unwrap()
        .passwords
        .insert(ADMIN_EMAIL.to_string(), ADMIN_PASSWORD.to_string());

    let app = router.with_state(state.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    FakeDownstream {
        base_url: format!("http://{}", addr),
        state,
    }
}

fn check_password(state: &Shared, email: &str, password: &str) -> bool {
    let mut state = state.lock().unwrap();
    state.login_calls += 1;
    state.passwords.get(email).map(String::as_str) == Some(password)
}

// =============================================================================
// Workflow engine fake
// =============================================================================

pub async fn spawn_workflow() -> FakeDownstream {
    serve(
        Router::new()
            .route("/rest/login", post(workflow_login))
            .route("/rest/users", get(workflow_users))
            .route("/rest/invitations", post(workflow_invite)),
    )
    .await
}

async fn workflow_login(State(state): State<Shared>, Json(body): Json<Value>) -> Response {
    let email = body["email"].as_str().unwrap_or_default();
    let password = body["password"].as_str().unwrap_or_default();
    if !check_password(&state, email, password) {
        return (StatusCode::UNAUTHORIZED, Json(json!({"message": "Wrong username or password"})))
            .into_response();
    }
    (
        StatusCode::OK,
        [(header::SET_COOKIE, format!("n8n-auth=tok-{}; Path=/; HttpOnly", email))],
        Json(json!({"data": {"email": email}})),
    )
        .into_response()
}

fn has_cookie(headers: &HeaderMap) -> bool {
    headers
        .get(header::COOKIE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("n8n-auth=tok-"))
}

async fn workflow_users(State(state): State<Shared>, headers: HeaderMap) -> Response {
    if !has_cookie(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    let delay = state.lock().unwrap().listing_delay;
    if let Some(delay) = delay {
        tokio::time::sleep(delay).await;
    }
    let users = state.lock().unwrap().users.clone();
    Json(json!({ "data": users })).into_response()
}

async fn workflow_invite(
    State(state): State<Shared>,
    headers: HeaderMap,
    Json(body): Json<Vec<Value>>,
) -> Response {
    if !has_cookie(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    let mut state = state.lock().unwrap();
    if let Some((status, message)) = state.reject_create.clone() {
        let status = StatusCode::from_u16(status).unwrap();
        return (status, message).into_response();
    }

    let mut entries = Vec::new();
    for pending in body {
        state.creations += 1;
        let mut record = pending.clone();
        record["id"] = json!(format!("wf-{}", state.creations));
        if let Some(email) = &state.echo_email {
            record["email"] = json!(email);
        }
        record["isPending"] = json!(true);
        state.users.push(record.clone());
        entries.push(json!({ "user": record, "error": "" }));
    }
    Json(json!({ "data": entries })).into_response()
}

// =============================================================================
// Chat system fake
// =============================================================================

pub async fn spawn_chat() -> FakeDownstream {
    serve(
        Router::new()
            .route("/api/v4/users/login", post(chat_login))
            .route("/api/v4/users", get(chat_users).post(chat_create)),
    )
    .await
}

async fn chat_login(State(state): State<Shared>, Json(body): Json<Value>) -> Response {
    let login_id = body["login_id"].as_str().unwrap_or_default();
    let password = body["password"].as_str().unwrap_or_default();
    if !check_password(&state, login_id, password) {
        return (StatusCode::UNAUTHORIZED, Json(json!({"id": "api.user.login.invalid"})))
            .into_response();
    }
    (
        StatusCode::OK,
        [(HeaderName::from_static("token"), format!("chat-{}", login_id))],
        Json(json!({"id": "admin", "email": login_id})),
    )
        .into_response()
}

fn has_bearer(headers: &HeaderMap) -> bool {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("Bearer chat-"))
}

async fn chat_users(
    State(state): State<Shared>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    if !has_bearer(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    let mut state = state.lock().unwrap();
    state.listing_calls += 1;

    let page: usize = query.get("page").and_then(|v| v.parse().ok()).unwrap_or(0);
    let per_page: usize = query
        .get("per_page")
        .and_then(|v| v.parse().ok())
        .unwrap_or(60);
    let users: Vec<Value> = state
        .users
        .iter()
        .skip(page * per_page)
        .take(per_page)
        .cloned()
        .collect();
    Json(Value::Array(users)).into_response()
}

async fn chat_create(
    State(state): State<Shared>,
    headers: HeaderMap,
    Json(body): Json<Vec<Value>>,
) -> Response {
    if !has_bearer(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    let mut state = state.lock().unwrap();
    if let Some((status, message)) = state.reject_create.clone() {
        let status = StatusCode::from_u16(status).unwrap();
        return (status, message).into_response();
    }

    let mut created = Vec::new();
    for pending in body {
        state.creations += 1;
        let mut record = pending;
        record["id"] = json!(format!("chat-user-{}", state.creations));
        if let Some(email) = &state.echo_email {
            record["email"] = json!(email);
        }
        state.users.push(record.clone());
        created.push(record);
    }
    (StatusCode::CREATED, Json(Value::Array(created))).into_response()
}

// =============================================================================
// Assertions
// =============================================================================

pub fn sign_assertion(claims: &Value) -> String {
    let header = URL_SAFE_NO_PAD.encode(r#"{"alg":"HS256","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(claims.to_string());
    let mut mac = Hmac::<Sha256>::new_from_slice(SHARED_SECRET).unwrap();
    mac.update(format!("{}.{}", header, payload).as_bytes());
    let signature = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());
    format!("{}.{}.{}", header, payload, signature)
}
