//! HeyGen client tests against a local mock of the streaming API

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use avatar_gateway::avatar::{AvatarService, HeyGenClient, StartAvatarRequest};
use axum::{Json, Router, extract::State, http::StatusCode, routing::post};
use secrecy::SecretString;
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio_test::{assert_err, assert_ok};

#[derive(Default)]
struct Calls {
    new: AtomicUsize,
    start: AtomicUsize,
    stop: AtomicUsize,
    start_fails: bool,
}

async fn new_session(State(calls): State<Arc<Calls>>) -> Json<Value> {
    calls.new.fetch_add(1, Ordering::SeqCst);
    Json(json!({ "data": { "session_id": "s1", "url": "wss://media.test" } }))
}

async fn start_session(State(calls): State<Arc<Calls>>) -> (StatusCode, String) {
    calls.start.fetch_add(1, Ordering::SeqCst);
    if calls.start_fails {
        (StatusCode::INTERNAL_SERVER_ERROR, "boom".to_string())
    } else {
        (StatusCode::OK, r#"{"data":null}"#.to_string())
    }
}

async fn stop_session(State(calls): State<Arc<Calls>>) -> Json<Value> {
    calls.stop.fetch_add(1, Ordering::SeqCst);
    Json(json!({ "data": null }))
}

/// Serve the streaming endpoints on an ephemeral port, returning the base URL
async fn serve(calls: Arc<Calls>) -> String {
    let app = Router::new()
        .route("/v1/streaming.new", post(new_session))
        .route("/v1/streaming.start", post(start_session))
        .route("/v1/streaming.stop", post(stop_session))
        .with_state(calls);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

#[tokio::test]
async fn test_open_starts_session() {
    let calls = Arc::new(Calls::default());
    let client = HeyGenClient::new(serve(Arc::clone(&calls)).await, None);

    let session = assert_ok!(
        client
            .open(
                &SecretString::from("tok".to_string()),
                &StartAvatarRequest::default()
            )
            .await
    );
    assert_eq!(session.session_id, "s1");
    assert_eq!(session.url.as_deref(), Some("wss://media.test"));
    assert_eq!(calls.start.load(Ordering::SeqCst), 1);
    assert_eq!(calls.stop.load(Ordering::SeqCst), 0);

    assert_ok!(client.close(&session).await);
    assert_eq!(calls.stop.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_failed_start_stops_created_session() {
    let calls = Arc::new(Calls {
        start_fails: true,
        ..Calls::default()
    });
    let client = HeyGenClient::new(serve(Arc::clone(&calls)).await, None);

    let error = assert_err!(
        client
            .open(
                &SecretString::from("tok".to_string()),
                &StartAvatarRequest::default()
            )
            .await
    );
    assert!(error.to_string().contains("streaming.start"));
    assert_eq!(calls.new.load(Ordering::SeqCst), 1);
    assert_eq!(calls.stop.load(Ordering::SeqCst), 1);
}
