//! Integration tests for the FormPilot API.
//!
//! Each test builds its own router over a fresh session registry and drives
//! it with `tower::ServiceExt::oneshot`.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::Value;
use tower::ServiceExt;
use uuid::Uuid;

use formpilot_api::handlers::HealthResponse;
use formpilot_api::{create_router, AppState};
use formpilot_chat::{DialogueController, ServiceCatalog, SessionRegistry};
use formpilot_core::config::{DialogueConfig, FormPilotConfig, VisionConfig};
use formpilot_llm::LanguageModelAdapter;
use formpilot_vision::{ImageClassifierAdapter, MockImageClassifier};

// =============================================================================
// Helpers
// =============================================================================

fn make_state(image_classifier: ImageClassifierAdapter) -> AppState {
    let controller = DialogueController::new(
        ServiceCatalog::standard(),
        LanguageModelAdapter::Disabled,
        image_classifier,
        DialogueConfig::default(),
        &VisionConfig::default(),
    );
    AppState::new(
        FormPilotConfig::default(),
        Arc::new(SessionRegistry::new(controller, 30)),
    )
}

fn make_app() -> axum::Router {
    create_router(make_state(ImageClassifierAdapter::Disabled))
}

fn post_json(uri: &str, json: &str) -> Request<Body> {
    Request::post(uri)
        .header("content-type", "application/json")
        .body(Body::from(json.to_string()))
        .unwrap()
}

fn post_empty(uri: &str) -> Request<Body> {
    Request::post(uri).body(Body::empty()).unwrap()
}

async fn body_json(resp: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(resp.into_body(), 1024 * 1024)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn create_session(app: &axum::Router) -> String {
    let resp = app.clone().oneshot(post_empty("/sessions")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);
    let json = body_json(resp).await;
    json["session"]["id"].as_str().unwrap().to_string()
}

// =============================================================================
// Health and catalog
// =============================================================================

#[tokio::test]
async fn test_health() {
    let resp = make_app()
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(resp.into_body(), 1024).await.unwrap();
    let health: HealthResponse = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(health.status, "healthy");
    assert_eq!(health.active_sessions, 0);
}

#[tokio::test]
async fn test_list_services() {
    let resp = make_app()
        .oneshot(Request::get("/services").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let json = body_json(resp).await;
    let services = json["services"].as_array().unwrap();
    assert_eq!(services.len(), 4);
    assert_eq!(services[0]["id"], "renew_license");
    assert_eq!(services[3]["id"], "transfer_title");
}

// =============================================================================
// Sessions
// =============================================================================

#[tokio::test]
async fn test_create_session_returns_greeting_and_empty_transcript() {
    let resp = make_app().oneshot(post_empty("/sessions")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);
    let json = body_json(resp).await;
    assert_eq!(json["session"]["stage"], "service_selection");
    assert_eq!(json["session"]["transcript"].as_array().unwrap().len(), 0);
    assert!(json["greeting"].as_str().unwrap().contains("1. **Renew Driver's License**"));
}

#[tokio::test]
async fn test_full_text_flow() {
    let app = make_app();
    let id = create_session(&app).await;

    let resp = app
        .clone()
        .oneshot(post_json(
            &format!("/sessions/{}/messages", id),
            r#"{"text": "I need to renew my driver's license"}"#,
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let json = body_json(resp).await;
    assert_eq!(json["stage"], "document_check");
    assert_eq!(json["selected_service"], "renew_license");
    assert_eq!(json["turns"].as_array().unwrap().len(), 2);
    assert_eq!(json["turns"][0]["role"], "user");
    assert_eq!(json["turns"][1]["role"], "assistant");

    let resp = app
        .clone()
        .oneshot(post_json(
            &format!("/sessions/{}/messages", id),
            r#"{"text": "Yes, I have all the documents"}"#,
        ))
        .await
        .unwrap();
    let json = body_json(resp).await;
    assert_eq!(json["stage"], "ready_to_book");

    let resp = app
        .clone()
        .oneshot(Request::get(format!("/sessions/{}", id)).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let json = body_json(resp).await;
    assert_eq!(json["transcript"].as_array().unwrap().len(), 4);
    assert_eq!(json["ready"], true);
}

#[tokio::test]
async fn test_empty_message_is_bad_request() {
    let app = make_app();
    let id = create_session(&app).await;
    let resp = app
        .oneshot(post_json(&format!("/sessions/{}/messages", id), r#"{"text": "  "}"#))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let json = body_json(resp).await;
    assert_eq!(json["error"], "bad_request");
}

#[tokio::test]
async fn test_unknown_session_is_not_found() {
    let app = make_app();
    let uri = format!("/sessions/{}/messages", Uuid::new_v4());
    let resp = app.oneshot(post_json(&uri, r#"{"text": "hi"}"#)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(resp).await["error"], "not_found");
}

#[tokio::test]
async fn test_reset_session() {
    let app = make_app();
    let id = create_session(&app).await;
    app.clone()
        .oneshot(post_json(&format!("/sessions/{}/messages", id), r#"{"text": "3"}"#))
        .await
        .unwrap();

    let resp = app
        .oneshot(post_empty(&format!("/sessions/{}/reset", id)))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let json = body_json(resp).await;
    assert_eq!(json["id"], id.as_str());
    assert_eq!(json["stage"], "service_selection");
    assert_eq!(json["transcript"].as_array().unwrap().len(), 1);
    assert_eq!(json["transcript"][0]["role"], "assistant");
}

#[tokio::test]
async fn test_delete_session() {
    let app = make_app();
    let id = create_session(&app).await;

    let resp = app
        .clone()
        .oneshot(Request::delete(format!("/sessions/{}", id)).body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);

    let resp = app
        .oneshot(Request::get(format!("/sessions/{}", id)).body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

// =============================================================================
// Images
// =============================================================================

#[tokio::test]
async fn test_image_upload_classifies() {
    let classifier = MockImageClassifier::for_category(
        "new_license",
        0.75,
        &["renew_license", "register_vehicle", "transfer_title"],
    );
    let app = create_router(make_state(ImageClassifierAdapter::ready(
        Arc::new(classifier),
        Duration::from_secs(5),
    )));
    let id = create_session(&app).await;

    let resp = app
        .oneshot(
            Request::post(format!("/sessions/{}/images", id))
                .header("content-type", "application/octet-stream")
                .body(Body::from(vec![0x89, b'P', b'N', b'G']))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let json = body_json(resp).await;
    assert_eq!(json["stage"], "document_check");
    assert_eq!(json["prediction"]["category"], "new_license");
    assert_eq!(json["turns"][0]["content"], "[uploaded form image]");
}

#[tokio::test]
async fn test_image_upload_without_classifier_still_ok() {
    let app = make_app();
    let id = create_session(&app).await;
    let resp = app
        .oneshot(
            Request::post(format!("/sessions/{}/images", id))
                .body(Body::from(vec![1u8, 2, 3]))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let json = body_json(resp).await;
    assert_eq!(json["outcome"], "failed");
    assert_eq!(json["stage"], "service_selection");
}

#[tokio::test]
async fn test_empty_image_is_bad_request() {
    let app = make_app();
    let id = create_session(&app).await;
    let resp = app
        .oneshot(post_empty(&format!("/sessions/{}/images", id)))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}
