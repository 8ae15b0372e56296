//! Webhook notifier tests against an in-process robot mock

use std::collections::HashMap;

use axum::extract::Query;
use axum::routing::post;
use axum::{Json, Router};
use base64::prelude::*;

use bondfeed_config::NotifyConfig;

use crate::notify::{sign, Notifier};
use crate::ExportError;

const SECRET: &str = "SEC-test-secret";

async fn serve(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

fn config(server: String) -> NotifyConfig {
    NotifyConfig {
        server,
        access_token: "tok-abc".into(),
        secret: SECRET.into(),
        timeout_secs: 5,
    }
}

/// The mock validates the signature the way the robot does: recompute from
/// the query timestamp and compare.
async fn robot_ok(
    Query(params): Query<HashMap<String, String>>,
    Json(body): Json<serde_json::Value>,
) -> Json<serde_json::Value> {
    assert_eq!(params.get("access_token").map(String::as_str), Some("tok-abc"));
    let timestamp: i64 = params
        .get("timestamp")
        .expect("timestamp param")
        .parse()
        .expect("millisecond timestamp");
    assert_eq!(params.get("sign"), Some(&sign(SECRET, timestamp)));

    match body["msgtype"].as_str() {
        Some("text") => {
            assert!(body["text"]["content"].as_str().unwrap().contains("download"));
        }
        Some("markdown") => {
            assert_eq!(body["markdown"]["title"], "snapshot");
        }
        other => panic!("unexpected msgtype {other:?}"),
    }
    Json(serde_json::json!({ "errcode": 0, "errmsg": "ok" }))
}

#[tokio::test]
async fn test_send_text_signs_and_posts() {
    let base = serve(Router::new().route("/robot/send", post(robot_ok))).await;
    let notifier = Notifier::new(config(base)).expect("notifier");

    notifier
        .send_text("2025-07-04 13:00:00 download: https://files/x")
        .await
        .expect("send");
}

#[tokio::test]
async fn test_send_markdown() {
    let base = serve(Router::new().route("/robot/send", post(robot_ok))).await;
    let notifier = Notifier::new(config(base)).expect("notifier");

    notifier
        .send_markdown("snapshot", "**done**")
        .await
        .expect("send");
}

#[tokio::test]
async fn test_robot_error_code_is_surfaced() {
    async fn robot_err() -> Json<serde_json::Value> {
        Json(serde_json::json!({ "errcode": 310000, "errmsg": "sign not match" }))
    }
    let base = serve(Router::new().route("/robot/send", post(robot_err))).await;
    let notifier = Notifier::new(config(base)).expect("notifier");

    match notifier.send_text("x").await {
        Err(ExportError::Notify(msg)) => {
            assert!(msg.contains("310000"));
            assert!(msg.contains("sign not match"));
        }
        other => panic!("expected notify error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_unconfigured_webhook_refuses_to_send() {
    let notifier = Notifier::new(NotifyConfig::default()).expect("notifier");
    assert!(matches!(
        notifier.send_text("x").await,
        Err(ExportError::Notify(_))
    ));
}

#[test]
fn test_sign_is_deterministic() {
    assert_eq!(sign(SECRET, 1751607140494), sign(SECRET, 1751607140494));
    assert_ne!(sign(SECRET, 1), sign(SECRET, 2));
    assert_ne!(sign("other-secret", 1), sign(SECRET, 1));
}

#[test]
fn test_sign_is_base64_of_sha256_mac() {
    let raw = BASE64_STANDARD.decode(sign(SECRET, 1751607140494)).unwrap();
    assert_eq!(raw.len(), 32);
}
