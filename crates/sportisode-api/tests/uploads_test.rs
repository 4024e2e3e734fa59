//! Direct upload flow: presign, PUT to storage, complete, transcode, read back.
//!
//! Run with: `cargo test -p sportisode-api --test uploads_test`

mod helpers;

use bytes::Bytes;
use helpers::{api_path, local_path, setup_test_app, TestApp};
use serde_json::{json, Value};
use sportisode_core::models::{
    MediaAsset, MediaKind, NewMediaVariant, ProcessingStatus, VariantType,
};
use sportisode_db::MediaJobStore;
use sportisode_processing::testing::png_bytes;
use uuid::Uuid;

async fn presign(app: &TestApp, filename: &str, content_type: &str, size: usize) -> Value {
    let response = app
        .client()
        .post(&api_path("/uploads/presigned"))
        .json(&json!({
            "filename": filename,
            "content_type": content_type,
            "file_size": size,
        }))
        .await;
    response.assert_status_ok();
    response.json::<Value>()
}

async fn put_object(app: &TestApp, presigned: &Value, content_type: &str, body: Vec<u8>) {
    let url = presigned["presigned_url"].as_str().expect("presigned_url");
    app.client()
        .put(&local_path(url))
        .content_type(content_type)
        .bytes(Bytes::from(body))
        .await
        .assert_status_ok();
}

fn complete_body(presigned: &Value, filename: &str, content_type: &str, size: usize) -> Value {
    json!({
        "upload_id": presigned["upload_id"],
        "storage_key": presigned["storage_key"],
        "filename": filename,
        "content_type": content_type,
        "file_size": size,
    })
}

#[tokio::test]
async fn test_image_upload_is_processed_and_served() {
    let mut app = setup_test_app().await;
    let png = png_bytes(1600, 900);
    let size = png.len();

    let presigned = presign(&app, "kickoff.png", "image/png", size).await;
    put_object(&app, &presigned, "image/png", png).await;

    let response = app
        .client()
        .post(&api_path("/uploads/complete"))
        .json(&complete_body(&presigned, "kickoff.png", "image/png", size))
        .await;
    response.assert_status(axum::http::StatusCode::ACCEPTED);
    let completed = response.json::<Value>();
    assert_eq!(completed["processing_status"], "pending");

    let id: Uuid = completed["id"].as_str().expect("id").parse().expect("uuid");
    assert_eq!(id.to_string(), presigned["upload_id"].as_str().expect("upload_id"));
    assert_eq!(app.wait_for_processing(id).await, ProcessingStatus::Completed);

    for rendition in ["thumbnail", "preview", "full"] {
        let response = app
            .client()
            .get(&api_path(&format!("/media/{}/url", id)))
            .add_query_param("rendition", rendition)
            .await;
        response.assert_status_ok();
        let signed = response.json::<Value>();
        assert_eq!(signed["rendition"], rendition);

        let file = app
            .client()
            .get(&local_path(signed["url"].as_str().expect("url")))
            .await;
        file.assert_status_ok();
        assert!(!file.as_bytes().is_empty());
    }

    let asset = app
        .client()
        .get(&api_path(&format!("/media/{}", id)))
        .await
        .json::<Value>();
    assert_eq!(asset["kind"], "image");
    assert_eq!(asset["processing_status"], "completed");
}

#[tokio::test]
async fn test_video_upload_produces_manifest() {
    let mut app = setup_test_app().await;
    let body = b"not really an mp4, the toolkit is faked".to_vec();
    let size = body.len();

    let presigned = presign(&app, "goal.mp4", "video/mp4", size).await;
    put_object(&app, &presigned, "video/mp4", body).await;

    let completed = app
        .client()
        .post(&api_path("/uploads/complete"))
        .json(&complete_body(&presigned, "goal.mp4", "video/mp4", size))
        .await
        .json::<Value>();
    let id: Uuid = completed["id"].as_str().expect("id").parse().expect("uuid");
    assert_eq!(app.wait_for_processing(id).await, ProcessingStatus::Completed);

    // Videos default to the master playlist
    let signed = app
        .client()
        .get(&api_path(&format!("/media/{}/url", id)))
        .await
        .json::<Value>();
    assert_eq!(signed["rendition"], "hls_manifest");

    let manifest = app
        .client()
        .get(&local_path(signed["url"].as_str().expect("url")))
        .await;
    manifest.assert_status_ok();
    assert!(manifest.text().starts_with("#EXTM3U"));
}

#[tokio::test]
async fn test_presign_rejects_unsupported_content_type() {
    let app = setup_test_app().await;

    let response = app
        .client()
        .post(&api_path("/uploads/presigned"))
        .json(&json!({
            "filename": "notes.pdf",
            "content_type": "application/pdf",
            "file_size": 1024,
        }))
        .await;

    response.assert_status_bad_request();
    let body = response.json::<Value>();
    assert!(body["error"].as_str().unwrap_or_default().contains("application/pdf"));
}

#[tokio::test]
async fn test_presign_rejects_oversized_image() {
    let app = setup_test_app().await;
    let too_big = app.state.media.limits.max_image_size + 1;

    let response = app
        .client()
        .post(&api_path("/uploads/presigned"))
        .json(&json!({
            "filename": "huge.jpg",
            "content_type": "image/jpeg",
            "file_size": too_big,
        }))
        .await;

    response.assert_status(axum::http::StatusCode::PAYLOAD_TOO_LARGE);
}

#[tokio::test]
async fn test_complete_without_object_is_rejected() {
    let app = setup_test_app().await;
    let presigned = presign(&app, "ghost.png", "image/png", 100).await;

    let response = app
        .client()
        .post(&api_path("/uploads/complete"))
        .json(&complete_body(&presigned, "ghost.png", "image/png", 100))
        .await;

    response.assert_status_bad_request();
}

#[tokio::test]
async fn test_complete_rejects_foreign_storage_key() {
    let app = setup_test_app().await;
    let presigned = presign(&app, "a.png", "image/png", 100).await;

    let mut body = complete_body(&presigned, "a.png", "image/png", 100);
    body["upload_id"] = json!(Uuid::new_v4());

    let response = app
        .client()
        .post(&api_path("/uploads/complete"))
        .json(&body)
        .await;

    response.assert_status_bad_request();
}

#[tokio::test]
async fn test_complete_twice_returns_same_asset() {
    let mut app = setup_test_app().await;
    let png = png_bytes(64, 64);
    let size = png.len();

    let presigned = presign(&app, "twice.png", "image/png", size).await;
    put_object(&app, &presigned, "image/png", png).await;
    let body = complete_body(&presigned, "twice.png", "image/png", size);

    let first = app
        .client()
        .post(&api_path("/uploads/complete"))
        .json(&body)
        .await
        .json::<Value>();
    let id: Uuid = first["id"].as_str().expect("id").parse().expect("uuid");
    app.wait_for_processing(id).await;

    let second = app
        .client()
        .post(&api_path("/uploads/complete"))
        .json(&body)
        .await;
    second.assert_status(axum::http::StatusCode::ACCEPTED);
    let second = second.json::<Value>();
    assert_eq!(second["id"], first["id"]);
    assert_eq!(second["processing_status"], "completed");
}

#[tokio::test]
async fn test_signed_file_url_rejects_tampering() {
    let app = setup_test_app().await;
    let presigned = presign(&app, "x.png", "image/png", 10).await;
    let url = local_path(presigned["presigned_url"].as_str().expect("presigned_url"));

    // A PUT signature does not authorize a GET
    let response = app
        .client()
        .get(&url.replace("method=PUT", "method=GET"))
        .await;
    response.assert_status_forbidden();

    let response = app
        .client()
        .put(&url.replace("signature=", "signature=00"))
        .bytes(Bytes::from_static(b"payload"))
        .await;
    response.assert_status_forbidden();
}

#[tokio::test]
async fn test_unknown_media_is_not_found() {
    let app = setup_test_app().await;

    app.client()
        .get(&api_path(&format!("/media/{}/url", Uuid::new_v4())))
        .await
        .assert_status_not_found();
}

#[tokio::test]
async fn test_failed_media_does_not_serve_partial_renditions() {
    let app = setup_test_app().await;
    let store = &app.state.media.store;

    let id = Uuid::new_v4();
    let key = format!("uploads/{}/crowd.png", id);
    let asset = MediaAsset::new_pending(id, "crowd.png", 10, "image/png", MediaKind::Image, key);
    store.create_asset(&asset).await.unwrap();
    assert!(store
        .compare_and_set_status(id, ProcessingStatus::Pending, ProcessingStatus::Processing, None)
        .await
        .unwrap());

    // Thumbnail lands, then a later rendition fails
    let thumb_key = format!("media/{}/thumbnail.webp", id);
    store
        .insert_variant(NewMediaVariant {
            asset_id: id,
            variant_type: VariantType::Thumbnail,
            segment_index: None,
            storage_key: thumb_key.clone(),
            url: format!("http://localhost:4000/files/{}", thumb_key),
            width: Some(150),
            height: Some(150),
            file_size: 42,
            format: "webp".to_string(),
            bitrate_kbps: None,
        })
        .await
        .unwrap();
    assert!(store
        .compare_and_set_status(
            id,
            ProcessingStatus::Processing,
            ProcessingStatus::Failed,
            Some("preview encode failed"),
        )
        .await
        .unwrap());

    app.client()
        .get(&api_path(&format!("/media/{}/url", id)))
        .add_query_param("rendition", "thumbnail")
        .await
        .assert_status_not_found();
}
