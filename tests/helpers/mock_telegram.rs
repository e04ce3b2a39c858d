//! A mock Telegram Bot API built on `wiremock`.

use serde_json::{json, Value};
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub fn ok_response() -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({ "ok": true, "result": {} }))
}

pub fn error_response(description: &str) -> ResponseTemplate {
    ResponseTemplate::new(403).set_body_json(json!({
        "ok": false,
        "error_code": 403,
        "description": description,
    }))
}

/// Starts a server that accepts every `sendMessage` call for `token`.
pub async fn start_bot(token: &str) -> MockServer {
    let server = MockServer::start().await;
    accept_all(&server, token).await;
    server
}

pub async fn accept_all(server: &MockServer, token: &str) {
    Mock::given(method("POST"))
        .and(path(format!("/bot{}/sendMessage", token)))
        .respond_with(ok_response())
        .mount(server)
        .await;
}

/// Rejects messages for `chat_id`. Mount before `accept_all`; the first
/// matching mock wins.
pub async fn reject_chat(server: &MockServer, token: &str, chat_id: Value, description: &str) {
    Mock::given(method("POST"))
        .and(path(format!("/bot{}/sendMessage", token)))
        .and(body_partial_json(json!({ "chat_id": chat_id })))
        .respond_with(error_response(description))
        .mount(server)
        .await;
}

/// The JSON bodies of every request the server received, in arrival order.
pub async fn sent_messages(server: &MockServer) -> Vec<Value> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .map(|r| serde_json::from_slice(&r.body).unwrap())
        .collect()
}
