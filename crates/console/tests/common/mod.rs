//! Fake backend for black-box tests: anti-forgery cookie issuing, form login,
//! enveloped endpoints and a few failure modes.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use axum::Router;
use axum::extract::{Form, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Json;
use serde_json::{Value, json};

pub const PASSWORD: &str = "pw";

#[derive(Debug, Default)]
pub struct BackendState {
    pub issued: u32,
    pub valid_token: Option<String>,
    pub csrf_fetches: usize,
    pub user: Option<String>,
    pub logins: usize,
    pub logouts: usize,
    pub item_attempts: usize,
    pub stale_attempts: usize,
}

pub type Shared = Arc<Mutex<BackendState>>;

pub struct TestServer {
    pub base_url: String,
    pub state: Shared,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    pub async fn spawn() -> Self {
        let state: Shared = Arc::new(Mutex::new(BackendState::default()));
        let app = router(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url,
            state,
            handle,
        }
    }

    /// Server-side token expiry: the cookie the client holds stops matching.
    pub fn expire_token(&self) {
        self.state.lock().unwrap().valid_token = Some("expired-on-server".to_string());
    }

    pub fn csrf_fetches(&self) -> usize {
        self.state.lock().unwrap().csrf_fetches
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn router(state: Shared) -> Router {
    Router::new()
        .route("/api/user/csrf", get(csrf))
        .route("/api/user/login", post(login))
        .route("/api/user/logout", post(logout))
        .route("/api/user/me", get(me))
        .route("/api/menus", get(menus))
        .route("/api/items", post(create_item))
        .route("/api/always-stale", post(always_stale))
        .route("/api/forbidden", get(forbidden))
        .route("/api/invalid", get(invalid))
        .route("/api/files/report", get(report))
        .route("/api/boom", get(boom))
        .with_state(state)
}

fn ok(data: Value) -> Response {
    Json(json!({ "success": true, "code": "OK", "message": "", "data": data })).into_response()
}

fn fail(status: StatusCode, code: &str, message: &str) -> Response {
    (
        status,
        Json(json!({ "success": false, "code": code, "message": message })),
    )
        .into_response()
}

fn csrf_rejection() -> Response {
    fail(StatusCode::FORBIDDEN, "CSRF", "Invalid CSRF token")
}

fn token_ok(state: &BackendState, headers: &HeaderMap) -> bool {
    let sent = headers.get("x-xsrf-token").and_then(|v| v.to_str().ok());
    sent.is_some() && sent == state.valid_token.as_deref()
}

async fn csrf(State(state): State<Shared>) -> Response {
    let mut st = state.lock().unwrap();
    st.issued += 1;
    st.csrf_fetches += 1;
    let token = format!("tok-{}", st.issued);
    st.valid_token = Some(token.clone());
    (
        StatusCode::OK,
        [(header::SET_COOKIE, format!("XSRF-TOKEN={token}; Path=/"))],
    )
        .into_response()
}

async fn login(
    State(state): State<Shared>,
    headers: HeaderMap,
    Form(form): Form<HashMap<String, String>>,
) -> Response {
    let mut st = state.lock().unwrap();
    if !token_ok(&st, &headers) {
        return csrf_rejection();
    }
    st.logins += 1;
    if form.get("password").map(String::as_str) != Some(PASSWORD) {
        return fail(StatusCode::UNAUTHORIZED, "AUTH-002", "bad credentials");
    }
    st.user = form.get("empId").cloned();
    (StatusCode::FOUND, [(header::LOCATION, "/")]).into_response()
}

async fn logout(State(state): State<Shared>) -> Response {
    let mut st = state.lock().unwrap();
    st.user = None;
    st.logouts += 1;
    StatusCode::OK.into_response()
}

async fn me(State(state): State<Shared>) -> Response {
    let st = state.lock().unwrap();
    match &st.user {
        Some(user) => ok(json!({
            "empId": user,
            "empNm": "Kim Operator",
            "cmpCd": "C01",
            "deptCd": "D10",
            "deptNm": "Platform",
            "authorities": [{ "authority": "ROLE_USER" }, { "authority": "ROLE_ADMIN" }]
        })),
        None => fail(StatusCode::UNAUTHORIZED, "AUTH-001", "authentication required"),
    }
}

async fn menus(State(state): State<Shared>) -> Response {
    if state.lock().unwrap().user.is_none() {
        return fail(StatusCode::UNAUTHORIZED, "AUTH-001", "authentication required");
    }
    ok(json!([
        {
            "menuId": "GRP_FW", "menuNm": "Framework", "menuLev": 1, "menuOrd": 1,
            "hrnMenuId": null, "menuIcon": "folder",
            "children": [
                { "menuId": "FW1101", "menuNm": "Sample", "menuLev": 2, "menuOrd": 1,
                  "hrnMenuId": "GRP_FW", "menuIcon": "document", "children": [] },
                { "menuId": "FW1102", "menuNm": "Not built yet", "menuLev": 2, "menuOrd": 2,
                  "hrnMenuId": "GRP_FW", "menuIcon": null, "children": [] }
            ]
        },
        { "menuId": "SY1001", "menuNm": "Users", "menuLev": 1, "menuOrd": 2,
          "hrnMenuId": null, "menuIcon": "user" }
    ]))
}

async fn create_item(
    State(state): State<Shared>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let mut st = state.lock().unwrap();
    st.item_attempts += 1;
    if !token_ok(&st, &headers) {
        return csrf_rejection();
    }
    ok(json!({ "id": 7, "name": body["name"] }))
}

async fn always_stale(State(state): State<Shared>) -> Response {
    state.lock().unwrap().stale_attempts += 1;
    csrf_rejection()
}

async fn forbidden() -> Response {
    fail(StatusCode::FORBIDDEN, "AUTH-403", "Access denied")
}

async fn invalid() -> Response {
    fail(StatusCode::OK, "E100", "Validation failed")
}

async fn report() -> Response {
    ([(header::CONTENT_TYPE, "text/csv")], "a,b\n1,2\n").into_response()
}

async fn boom() -> Response {
    (StatusCode::INTERNAL_SERVER_ERROR, "kaboom").into_response()
}
