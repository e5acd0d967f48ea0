mod common;

use opsdesk_console::transport::RawResponse;
use opsdesk_console::{ApiError, ApiRequest, ConsoleConfig, Reply, Transport};
use serde_json::{Value, json};

use common::TestServer;

fn transport(srv: &TestServer) -> Transport {
    let config = ConsoleConfig::new(&srv.base_url).expect("valid test url");
    Transport::new(&config).expect("client builds")
}

#[tokio::test]
async fn bootstrap_stores_token_in_jar() {
    let srv = TestServer::spawn().await;
    let t = transport(&srv);
    assert!(t.csrf_token().is_none());

    t.bootstrap_csrf().await.unwrap();
    assert_eq!(t.csrf_token().as_deref(), Some("tok-1"));
    assert_eq!(srv.csrf_fetches(), 1);
}

#[tokio::test]
async fn mutating_request_carries_token() {
    let srv = TestServer::spawn().await;
    let t = transport(&srv);
    t.bootstrap_csrf().await.unwrap();

    let created: Option<Value> = t
        .enveloped(&ApiRequest::post("/api/items").json(json!({ "name": "bolt" })))
        .await
        .unwrap();
    assert_eq!(created, Some(json!({ "id": 7, "name": "bolt" })));
    assert_eq!(srv.state.lock().unwrap().item_attempts, 1);
    assert_eq!(srv.csrf_fetches(), 1);
}

#[tokio::test]
async fn expired_token_is_refreshed_and_retried_once() {
    let srv = TestServer::spawn().await;
    let t = transport(&srv);
    t.bootstrap_csrf().await.unwrap();
    srv.expire_token();

    let reply = t
        .request(&ApiRequest::post("/api/items").json(json!({ "name": "nut" })))
        .await
        .unwrap();
    assert_eq!(reply, Reply::Envelope(Some(json!({ "id": 7, "name": "nut" }))));

    assert_eq!(srv.state.lock().unwrap().item_attempts, 2);
    assert_eq!(srv.csrf_fetches(), 2);
    assert_eq!(t.csrf_token().as_deref(), Some("tok-2"));
}

#[tokio::test]
async fn missing_token_is_recovered_too() {
    let srv = TestServer::spawn().await;
    let t = transport(&srv);

    let created: Option<Value> = t
        .enveloped(&ApiRequest::post("/api/items").json(json!({ "name": "washer" })))
        .await
        .unwrap();
    assert!(created.is_some());
    assert_eq!(srv.csrf_fetches(), 1);
}

#[tokio::test]
async fn second_anti_forgery_failure_is_surfaced() {
    let srv = TestServer::spawn().await;
    let t = transport(&srv);
    t.bootstrap_csrf().await.unwrap();

    let err = t
        .request(&ApiRequest::post("/api/always-stale"))
        .await
        .unwrap_err();
    match err {
        ApiError::Auth { status, code, .. } => {
            assert_eq!(status, 403);
            assert_eq!(code.as_deref(), Some("CSRF"));
        }
        other => panic!("expected auth error, got {other:?}"),
    }
    assert_eq!(srv.state.lock().unwrap().stale_attempts, 2);
    assert_eq!(srv.csrf_fetches(), 2);
}

#[tokio::test]
async fn plain_forbidden_is_not_retried() {
    let srv = TestServer::spawn().await;
    let t = transport(&srv);

    let err = t.request(&ApiRequest::get("/api/forbidden")).await.unwrap_err();
    assert_eq!(
        err,
        ApiError::Auth {
            status: 403,
            code: Some("AUTH-403".to_string()),
            message: "Access denied".to_string(),
        }
    );
    assert_eq!(srv.csrf_fetches(), 0);
}

#[tokio::test]
async fn envelope_failure_is_typed() {
    let srv = TestServer::spawn().await;
    let t = transport(&srv);

    let err = t.request(&ApiRequest::get("/api/invalid")).await.unwrap_err();
    assert_eq!(
        err,
        ApiError::Envelope {
            code: "E100".to_string(),
            message: "Validation failed".to_string(),
        }
    );
}

#[tokio::test]
async fn raw_shape_passes_body_through() {
    let srv = TestServer::spawn().await;
    let t = transport(&srv);

    let reply = t
        .request(&ApiRequest::get("/api/files/report").raw())
        .await
        .unwrap();
    let Reply::Raw(RawResponse {
        status,
        content_type,
        body,
    }) = reply
    else {
        panic!("expected raw reply");
    };
    assert_eq!(status, 200);
    assert_eq!(content_type.as_deref(), Some("text/csv"));
    assert_eq!(body, b"a,b\n1,2\n".to_vec());
}

#[tokio::test]
async fn server_errors_and_bad_envelopes() {
    let srv = TestServer::spawn().await;
    let t = transport(&srv);

    assert_eq!(
        t.request(&ApiRequest::get("/api/boom")).await.unwrap_err(),
        ApiError::Status {
            status: 500,
            message: "kaboom".to_string(),
        }
    );
    // a raw endpoint read as an envelope
    assert!(matches!(
        t.request(&ApiRequest::get("/api/files/report")).await,
        Err(ApiError::Decode(_))
    ));
}

#[tokio::test]
async fn unreachable_server_is_a_transport_error() {
    let srv = TestServer::spawn().await;
    let base = srv.base_url.clone();
    drop(srv);
    tokio::time::sleep(std::time::Duration::from_millis(20)).await;

    let config = ConsoleConfig::new(&base).unwrap();
    let t = Transport::new(&config).unwrap();
    let err = t.request(&ApiRequest::get("/api/user/me")).await.unwrap_err();
    assert!(matches!(err, ApiError::Transport(_) | ApiError::Timeout), "{err:?}");
}
