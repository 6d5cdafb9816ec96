// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! API input validation tests.

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};
use serde_json::json;
use tower::ServiceExt;

mod common;

#[tokio::test]
async fn test_install_empty_app() {
    let (app, state) = common::create_test_app();
    let token = common::session_token(&state, 12345);

    let response =
        common::post_json(&app, "/api/v1/receipts/install", json!({"app": ""}), Some(&token))
            .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = common::body_json(response).await;
    assert_eq!(body["error"], "bad_request");
}

#[tokio::test]
async fn test_install_app_too_long() {
    let (app, state) = common::create_test_app();
    let token = common::session_token(&state, 12345);

    let response = common::post_json(
        &app,
        "/api/v1/receipts/install",
        json!({"app": "a".repeat(256)}),
        Some(&token),
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_install_malformed_json() {
    let (app, state) = common::create_test_app();
    let token = common::session_token(&state, 12345);

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/v1/receipts/install")
                .header(header::CONTENT_TYPE, "application/json")
                .header(header::AUTHORIZATION, format!("Bearer {}", token))
                .body(Body::from("{\"app\": "))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_install_missing_content_type() {
    let (app, state) = common::create_test_app();
    let token = common::session_token(&state, 12345);

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/v1/receipts/install")
                .header(header::AUTHORIZATION, format!("Bearer {}", token))
                .body(Body::from(json!({"app": "1"}).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_record_unknown_app() {
    let (app, _) = common::create_test_app();

    let response = common::post_json(&app, "/api/v1/apps/nope/record", json!({}), None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_verify_unknown_app() {
    let (app, _) = common::create_test_app();

    let response =
        common::post_raw(&app, "/api/v1/receipts/verify/nobody@example.com", "x.y.z").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_debug_ids_must_be_numeric() {
    let (app, state) = common::create_test_app();
    state
        .db
        .upsert_user(&common::user(1, &["Admin:Tools"]))
        .await
        .unwrap();
    let token = common::session_token(&state, 1);

    let response = common::get(
        &app,
        "/api/v1/discovery/recommendations/debug?ids=x",
        Some(&token),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = common::get(&app, "/api/v1/discovery/recommendations/debug", Some(&token)).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_security_headers_present() {
    let (app, _) = common::create_test_app();

    let response = common::get(&app, "/health", None).await;
    let headers = response.headers();
    assert_eq!(headers.get("x-content-type-options").unwrap(), "nosniff");
    assert_eq!(headers.get("x-frame-options").unwrap(), "DENY");
}
