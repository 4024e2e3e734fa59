//! Live stream lifecycle over HTTP, including provider webhooks.
//!
//! Run with: `cargo test -p sportisode-api --test streams_test`

mod helpers;

use bytes::Bytes;
use helpers::{api_path, setup_test_app, TestApp, HOST, WEBHOOK_SECRET};
use serde_json::{json, Value};
use sportisode_infra::webhook::signature_header;

async fn create_stream(app: &TestApp, body: Value) -> Value {
    let response = app
        .client()
        .post(&api_path("/streams"))
        .add_header("X-User-Id", HOST)
        .json(&body)
        .await;
    response.assert_status(axum::http::StatusCode::CREATED);
    response.json::<Value>()
}

async fn host_action(app: &TestApp, id: &str, action: &str, caller: &str) -> axum_test::TestResponse {
    app.client()
        .post(&api_path(&format!("/streams/{}/{}", id, action)))
        .add_header("X-User-Id", caller)
        .await
}

async fn send_webhook(app: &TestApp, body: &Value) -> axum_test::TestResponse {
    let raw = serde_json::to_vec(body).expect("serialize event");
    let now = chrono::Utc::now().timestamp();
    let header = signature_header(WEBHOOK_SECRET, now, &raw).expect("sign");
    app.client()
        .post(&api_path("/webhooks/broadcast"))
        .add_header("Provider-Signature", header)
        .content_type("application/json")
        .bytes(Bytes::from(raw))
        .await
}

#[tokio::test]
async fn test_host_drives_stream_through_lifecycle() {
    let app = setup_test_app().await;

    let created = create_stream(&app, json!({"title": "Derby day", "tags": ["football"]})).await;
    assert_eq!(created["stream"]["status"], "scheduled");
    assert_eq!(created["stream"]["host_id"], HOST);
    assert!(created["stream_key"].as_str().is_some_and(|k| !k.is_empty()));
    assert!(created["stream"].get("stream_key").is_none());
    let id = created["stream"]["id"].as_str().expect("id").to_string();

    let prepared = host_action(&app, &id, "prepare", HOST).await.json::<Value>();
    assert_eq!(prepared["stream"]["status"], "starting");
    assert_eq!(prepared["transition"]["to"], "starting");

    let started = host_action(&app, &id, "start", HOST).await.json::<Value>();
    assert_eq!(started["stream"]["status"], "live");
    assert!(started["stream"]["actual_start"].is_string());

    let ended = host_action(&app, &id, "end", HOST).await.json::<Value>();
    assert_eq!(ended["stream"]["status"], "ended");

    // Ending again is a no-op
    let again = host_action(&app, &id, "end", HOST).await;
    again.assert_status_ok();
    assert!(again.json::<Value>()["transition"].is_null());
}

#[tokio::test]
async fn test_only_host_can_act() {
    let app = setup_test_app().await;
    let created = create_stream(&app, json!({"title": "Training"})).await;
    let id = created["stream"]["id"].as_str().expect("id").to_string();

    host_action(&app, &id, "start", "someone-else")
        .await
        .assert_status_forbidden();

    app.client()
        .post(&api_path(&format!("/streams/{}/start", id)))
        .await
        .assert_status_unauthorized();
}

#[tokio::test]
async fn test_create_requires_title() {
    let app = setup_test_app().await;

    app.client()
        .post(&api_path("/streams"))
        .add_header("X-User-Id", HOST)
        .json(&json!({"title": ""}))
        .await
        .assert_status_bad_request();
}

#[tokio::test]
async fn test_private_stream_visibility() {
    let app = setup_test_app().await;
    let created = create_stream(
        &app,
        json!({"title": "Team talk", "is_private": true, "allowed_viewers": ["coach"]}),
    )
    .await;
    let id = created["stream"]["id"].as_str().expect("id").to_string();
    let path = api_path(&format!("/streams/{}", id));

    app.client().get(&path).await.assert_status_forbidden();
    app.client()
        .get(&path)
        .add_header("X-User-Id", "fan")
        .await
        .assert_status_forbidden();
    app.client()
        .get(&path)
        .add_header("X-User-Id", "coach")
        .await
        .assert_status_ok();
    app.client()
        .get(&path)
        .add_header("X-User-Id", HOST)
        .await
        .assert_status_ok();
}

#[tokio::test]
async fn test_viewers_counted_only_while_live() {
    let app = setup_test_app().await;
    let created = create_stream(&app, json!({"title": "Cup final"})).await;
    let id = created["stream"]["id"].as_str().expect("id").to_string();
    let join = api_path(&format!("/streams/{}/viewers/join", id));
    let leave = api_path(&format!("/streams/{}/viewers/leave", id));

    let early = app.client().post(&join).await.json::<Value>();
    assert_eq!(early["counted"], false);
    assert_eq!(early["viewer_count"], 0);

    host_action(&app, &id, "start", HOST).await.assert_status_ok();

    app.client().post(&join).add_header("X-User-Id", "a").await;
    let second = app
        .client()
        .post(&join)
        .add_header("X-User-Id", "b")
        .await
        .json::<Value>();
    assert_eq!(second["counted"], true);
    assert_eq!(second["viewer_count"], 2);

    let left = app.client().post(&leave).await.json::<Value>();
    assert_eq!(left["viewer_count"], 1);

    let stream = app
        .client()
        .get(&api_path(&format!("/streams/{}", id)))
        .await
        .json::<Value>();
    assert_eq!(stream["peak_viewers"], 2);
}

#[tokio::test]
async fn test_webhook_connect_and_disconnect() {
    let app = setup_test_app().await;
    let created = create_stream(&app, json!({"title": "Away match"})).await;
    let id = created["stream"]["id"].as_str().expect("id").to_string();
    let provider_id = format!("fake-ls-{}", app.broadcast.created());

    let response = send_webhook(
        &app,
        &json!({
            "type": "video.live_stream.connected",
            "data": {"id": provider_id, "playback_ids": [{"id": "pb-live"}]}
        }),
    )
    .await;
    response.assert_status_ok();
    assert_eq!(response.json::<Value>()["status"], "ok");

    let stream = app
        .client()
        .get(&api_path(&format!("/streams/{}", id)))
        .await
        .json::<Value>();
    assert_eq!(stream["status"], "live");
    assert_eq!(stream["playback_url"], "https://playback.test/pb-live.m3u8");

    send_webhook(
        &app,
        &json!({"type": "video.live_stream.disconnected", "data": {"id": provider_id}}),
    )
    .await
    .assert_status_ok();

    let stream = app
        .client()
        .get(&api_path(&format!("/streams/{}", id)))
        .await
        .json::<Value>();
    assert_eq!(stream["status"], "ended");
}

#[tokio::test]
async fn test_webhook_unknown_stream_and_event_are_acknowledged() {
    let app = setup_test_app().await;

    send_webhook(
        &app,
        &json!({"type": "video.live_stream.connected", "data": {"id": "nobody"}}),
    )
    .await
    .assert_status_ok();

    send_webhook(&app, &json!({"type": "video.asset.ready", "data": {}}))
        .await
        .assert_status_ok();
}

#[tokio::test]
async fn test_webhook_rejects_bad_signature() {
    let app = setup_test_app().await;
    let raw = br#"{"type":"video.live_stream.connected","data":{"id":"x"}}"#.to_vec();
    let header = signature_header(WEBHOOK_SECRET, chrono::Utc::now().timestamp(), &raw)
        .expect("sign");

    let mut tampered = raw.clone();
    tampered[10] ^= 0x01;

    app.client()
        .post(&api_path("/webhooks/broadcast"))
        .add_header("Provider-Signature", header)
        .bytes(Bytes::from(tampered))
        .await
        .assert_status_unauthorized();

    app.client()
        .post(&api_path("/webhooks/broadcast"))
        .bytes(Bytes::from(raw))
        .await
        .assert_status_unauthorized();
}

#[tokio::test]
async fn test_webhook_rejects_malformed_json() {
    let app = setup_test_app().await;
    let raw = b"{not json".to_vec();
    let header = signature_header(WEBHOOK_SECRET, chrono::Utc::now().timestamp(), &raw)
        .expect("sign");

    app.client()
        .post(&api_path("/webhooks/broadcast"))
        .add_header("Provider-Signature", header)
        .bytes(Bytes::from(raw))
        .await
        .assert_status_bad_request();
}
