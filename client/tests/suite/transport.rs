#![allow(clippy::expect_used, clippy::unwrap_used)]

use defsync_client::HttpTransport;
use defsync_client::ReqwestTransport;
use defsync_client::Request;
use defsync_client::TransportError;
use pretty_assertions::assert_eq;
use std::time::Duration;
use wiremock::Mock;
use wiremock::MockServer;
use wiremock::ResponseTemplate;
use wiremock::matchers::body_string;
use wiremock::matchers::header;
use wiremock::matchers::method;
use wiremock::matchers::path;

#[tokio::test]
async fn execute_returns_body_on_success() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/blob.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"ok": true})))
        .mount(&server)
        .await;

    let transport = ReqwestTransport::new(reqwest::Client::new());
    let resp = transport
        .execute(Request::get(format!("{}/blob.json", server.uri())))
        .await
        .expect("request should succeed");

    let value: serde_json::Value = resp.json().expect("json body");
    assert_eq!(value, serde_json::json!({"ok": true}));
}

#[tokio::test]
async fn non_success_status_maps_to_http_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404).set_body_string("missing"))
        .mount(&server)
        .await;

    let transport = ReqwestTransport::new(reqwest::Client::new());
    let err = transport
        .execute(Request::get(format!("{}/nope", server.uri())))
        .await
        .expect_err("404 should be an error");

    match err {
        TransportError::Http { status, body, .. } => {
            assert_eq!(status.as_u16(), 404);
            assert_eq!(body.as_deref(), Some("missing"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn text_body_is_sent_as_plain_text() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/definitions"))
        .and(header("content-type", "text/plain; charset=utf-8"))
        .and(body_string("a/b\nc/d"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let transport = ReqwestTransport::new(reqwest::Client::new());
    transport
        .execute(Request::post(format!("{}/definitions", server.uri())).with_text("a/b\nc/d"))
        .await
        .expect("post should succeed");
}

#[tokio::test]
async fn slow_response_maps_to_timeout() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
        .mount(&server)
        .await;

    let transport = ReqwestTransport::new(reqwest::Client::new());
    let err = transport
        .execute(
            Request::get(format!("{}/slow", server.uri()))
                .with_timeout(Duration::from_millis(50)),
        )
        .await
        .expect_err("should time out");

    assert!(matches!(err, TransportError::Timeout), "got {err:?}");
}
