// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Install, record and issue endpoint tests.

use axum::http::StatusCode;
use marketplace_receipts::models::{
    AddonPurchase, AddonStatus, InstallType, LogAction, PremiumType, PurchaseType,
};
use marketplace_receipts::time_utils::now_rfc3339;
use serde_json::json;

mod common;

/// Directed identifier carried by a receipt.
fn receipt_uuid(state: &marketplace_receipts::AppState, receipt: &str) -> String {
    let claims = state.verifier.decode(receipt).expect("Receipt should decode");
    claims.user.expect("Receipt should have a user").value
}

#[tokio::test]
async fn test_repeated_installs_reuse_directed_identifier() {
    let (app, state) = common::create_test_app();
    state.db.upsert_addon(&common::webapp(337141)).await.unwrap();
    let token = common::session_token(&state, 55);

    let mut uuids = Vec::new();
    for _ in 0..3 {
        let response = common::post_json(
            &app,
            "/api/v1/receipts/install",
            json!({"app": "337141"}),
            Some(&token),
        )
        .await;
        assert_eq!(response.status(), StatusCode::CREATED);

        let body = common::body_json(response).await;
        uuids.push(receipt_uuid(&state, body["receipt"].as_str().unwrap()));
    }

    assert!(uuids[0].starts_with("337141-"));
    assert!(uuids.iter().all(|u| *u == uuids[0]));

    let (installed, created) = state
        .db
        .get_or_create_installed(337141, 55, InstallType::User)
        .await
        .unwrap();
    assert!(!created);
    assert_eq!(installed.uuid, uuids[0]);
}

#[tokio::test]
async fn test_install_by_slug() {
    let (app, state) = common::create_test_app();
    state.db.upsert_addon(&common::webapp(7)).await.unwrap();
    let token = common::session_token(&state, 55);

    let response =
        common::post_json(&app, "/api/v1/receipts/install", json!({"app": "app-7"}), Some(&token))
            .await;
    assert_eq!(response.status(), StatusCode::CREATED);
}

#[tokio::test]
async fn test_install_writes_app_log() {
    let (app, state) = common::create_test_app();
    state.db.upsert_addon(&common::webapp(1)).await.unwrap();
    let token = common::session_token(&state, 55);
    assert!(!state.db.has_app_log(1, LogAction::InstallAddon).await.unwrap());

    let response =
        common::post_json(&app, "/api/v1/receipts/install", json!({"app": "1"}), Some(&token))
            .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    assert!(state.db.has_app_log(1, LogAction::InstallAddon).await.unwrap());
}

#[tokio::test]
async fn test_install_unknown_app() {
    let (app, state) = common::create_test_app();
    let token = common::session_token(&state, 55);

    let response =
        common::post_json(&app, "/api/v1/receipts/install", json!({"app": "404"}), Some(&token))
            .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_install_not_public() {
    let (app, state) = common::create_test_app();
    let mut addon = common::webapp(1);
    addon.status = AddonStatus::Pending;
    state.db.upsert_addon(&addon).await.unwrap();

    let token = common::session_token(&state, 55);
    let response =
        common::post_json(&app, "/api/v1/receipts/install", json!({"app": "1"}), Some(&token))
            .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let body = common::body_json(response).await;
    assert_eq!(body["details"], "App not public.");

    // The author can still install it, with a developer install record.
    let token = common::session_token(&state, 1000);
    let response =
        common::post_json(&app, "/api/v1/receipts/install", json!({"app": "1"}), Some(&token))
            .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let (_, created) = state
        .db
        .get_or_create_installed(1, 1000, InstallType::Developer)
        .await
        .unwrap();
    assert!(!created);
}

#[tokio::test]
async fn test_install_premium_not_purchased() {
    let (app, state) = common::create_test_app();
    let mut addon = common::webapp(1);
    addon.premium_type = PremiumType::Premium;
    addon.price_cents = Some(199);
    state.db.upsert_addon(&addon).await.unwrap();
    let token = common::session_token(&state, 55);

    let response =
        common::post_json(&app, "/api/v1/receipts/install", json!({"app": "1"}), Some(&token))
            .await;
    assert_eq!(response.status(), StatusCode::PAYMENT_REQUIRED);
    let body = common::body_json(response).await;
    assert_eq!(body["details"], "You have not purchased this app.");

    state
        .db
        .upsert_purchase(&AddonPurchase {
            app_id: 1,
            user_id: 55,
            purchase_type: PurchaseType::Purchase,
            created: now_rfc3339(),
        })
        .await
        .unwrap();

    let response =
        common::post_json(&app, "/api/v1/receipts/install", json!({"app": "1"}), Some(&token))
            .await;
    assert_eq!(response.status(), StatusCode::CREATED);
}

#[tokio::test]
async fn test_install_zero_price_premium_gets_no_charge_purchase() {
    let (app, state) = common::create_test_app();
    let mut addon = common::webapp(1);
    addon.premium_type = PremiumType::Premium;
    addon.price_cents = Some(0);
    state.db.upsert_addon(&addon).await.unwrap();
    let token = common::session_token(&state, 55);

    for _ in 0..2 {
        let response =
            common::post_json(&app, "/api/v1/receipts/install", json!({"app": "1"}), Some(&token))
                .await;
        assert_eq!(response.status(), StatusCode::CREATED);
    }

    let purchase = state.db.get_purchase(1, 55).await.unwrap().unwrap();
    assert_eq!(purchase.purchase_type, PurchaseType::NoCharge);
}

#[tokio::test]
async fn test_record_logged_in_gets_receipt() {
    let (app, state) = common::create_test_app();
    state.db.upsert_addon(&common::webapp(1)).await.unwrap();
    state.db.add_download_source("mkt-home").await.unwrap();
    let token = common::session_token(&state, 55);

    let response = common::post_json(
        &app,
        "/api/v1/apps/1/record",
        json!({"src": "mkt-home", "device_type": "desktop"}),
        Some(&token),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = common::body_json(response).await;
    assert_eq!(body["addon"], 1);
    let receipt = body["receipt"].as_str().unwrap();
    assert!(body.get("error").is_none());

    let claims = state.verifier.decode(receipt).unwrap();
    assert_eq!(claims.typ, "purchase-receipt");

    let (installed, _) = state
        .db
        .get_or_create_installed(1, 55, InstallType::User)
        .await
        .unwrap();
    let client = installed.client_data.unwrap();
    assert_eq!(client.download_source.as_deref(), Some("mkt-home"));
    assert_eq!(client.device_type, "desktop");

    assert!(state.db.has_app_log(1, LogAction::InstallAddon).await.unwrap());
}

#[tokio::test]
async fn test_record_anonymous_premium_requires_login() {
    let (app, state) = common::create_test_app();
    let mut addon = common::webapp(1);
    addon.premium_type = PremiumType::Premium;
    state.db.upsert_addon(&addon).await.unwrap();

    let response = common::post_json(&app, "/api/v1/apps/1/record", json!({}), None).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_record_premium_not_purchased_forbidden() {
    let (app, state) = common::create_test_app();
    let mut addon = common::webapp(1);
    addon.premium_type = PremiumType::Premium;
    state.db.upsert_addon(&addon).await.unwrap();

    let token = common::session_token(&state, 55);
    let response = common::post_json(&app, "/api/v1/apps/1/record", json!({}), Some(&token)).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    // Reviewers may install without buying.
    state
        .db
        .upsert_user(&common::user(56, &["Apps:Review"]))
        .await
        .unwrap();
    let token = common::session_token(&state, 56);
    let response = common::post_json(&app, "/api/v1/apps/1/record", json!({}), Some(&token)).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_record_non_webapp_not_found() {
    let (app, state) = common::create_test_app();
    state.db.upsert_addon(&common::extension(1)).await.unwrap();

    let response = common::post_json(&app, "/api/v1/apps/1/record", json!({}), None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let token = common::session_token(&state, 55);
    let response = common::post_json(&app, "/api/v1/apps/1/record", json!({}), Some(&token)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_issue_reviewer_receipt() {
    let (app, state) = common::create_test_app();
    state.db.upsert_addon(&common::webapp(1)).await.unwrap();
    state
        .db
        .upsert_user(&common::user(56, &["Apps:Review"]))
        .await
        .unwrap();

    let token = common::session_token(&state, 56);
    let response = common::post_json(&app, "/api/v1/receipts/issue/1", json!({}), Some(&token)).await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = common::body_json(response).await;
    let claims = state
        .verifier
        .decode(body["receipt"].as_str().unwrap())
        .unwrap();
    assert_eq!(claims.typ, "reviewer-receipt");
    assert_eq!(
        claims.verify,
        "http://testserver/api/v1/receipts/verify/app-1%40example.com"
    );
}

#[tokio::test]
async fn test_issue_developer_receipt() {
    let (app, state) = common::create_test_app();
    state.db.upsert_addon(&common::webapp(1)).await.unwrap();

    let token = common::session_token(&state, 1000);
    let response = common::post_json(&app, "/api/v1/receipts/issue/1", json!({}), Some(&token)).await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = common::body_json(response).await;
    let claims = state
        .verifier
        .decode(body["receipt"].as_str().unwrap())
        .unwrap();
    assert_eq!(claims.typ, "developer-receipt");
}

#[tokio::test]
async fn test_issue_forbidden_for_other_users() {
    let (app, state) = common::create_test_app();
    state.db.upsert_addon(&common::webapp(1)).await.unwrap();

    let token = common::session_token(&state, 55);
    let response = common::post_json(&app, "/api/v1/receipts/issue/1", json!({}), Some(&token)).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}
