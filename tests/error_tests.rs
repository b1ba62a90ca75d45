// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Error-to-response mapping.

mod common;

use axum::http::StatusCode;
use axum::response::IntoResponse;
use common::{fake_upstreams, json_request, send, ScriptedClassifier};
use std::sync::Arc;
use tripdude::config::Config;
use tripdude::db::FirestoreDb;
use tripdude::error::AppError;
use tripdude::routes::create_router;
use tripdude::AppState;

async fn render(err: AppError) -> (StatusCode, serde_json::Value) {
    let response = err.into_response();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn test_client_errors_carry_details() {
    let (status, body) = render(AppError::BadRequest("email is required".to_string())).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "bad_request");
    assert_eq!(body["details"], "email is required");

    let (status, body) = render(AppError::Conflict("user already exists".to_string())).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "conflict");

    let (status, body) = render(AppError::NotFound("activity x".to_string())).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "not_found");
}

#[tokio::test]
async fn test_auth_errors() {
    let (status, body) = render(AppError::Unauthorized).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "unauthorized");

    let (status, body) = render(AppError::InvalidToken).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "invalid_token");
    assert!(body.get("details").is_none());
}

#[tokio::test]
async fn test_server_errors_hide_details() {
    let cases = [
        AppError::Upstream("classifier key abc123 rejected".to_string()),
        AppError::Database("connection to 10.0.0.3 refused".to_string()),
        AppError::Internal(anyhow::anyhow!("argon2 params invalid")),
    ];

    for err in cases {
        let (status, body) = render(err).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body.get("details").is_none(), "{body}");
    }
}

#[tokio::test]
async fn test_store_outage_is_opaque_500() {
    let config = Config::test_default();
    let classifier = Arc::new(ScriptedClassifier::new(|_| Ok(String::new())));
    let upstreams = fake_upstreams(&config, vec![], vec![], classifier);
    let state = AppState::new(config, FirestoreDb::new_mock(), upstreams).unwrap();
    let app = create_router(Arc::new(state));

    let response = send(
        &app,
        json_request(
            "POST",
            "/auth/register",
            serde_json::json!({ "email": "x@example.com", "password": "pw" }),
        ),
    )
    .await;

    assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(response.body["error"], "database_error");
    assert!(response.body.get("details").is_none());
}

#[tokio::test]
async fn test_unparseable_body_is_client_error() {
    let (app, _state) = common::create_test_app();

    let request = axum::http::Request::builder()
        .method("POST")
        .uri("/auth/login")
        .header(axum::http::header::CONTENT_TYPE, "application/json")
        .body(axum::body::Body::from("{not json"))
        .unwrap();
    let response = send(&app, request).await;

    assert!(response.status.is_client_error());
}
