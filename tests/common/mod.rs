// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use axum::body::Body;
use axum::http::{header, Request};
use axum::response::Response;
use marketplace_receipts::config::Config;
use marketplace_receipts::db::{Db, FirestoreDb, MemoryDb};
use marketplace_receipts::middleware::auth::create_jwt;
use marketplace_receipts::models::{
    Addon, AddonStatus, AddonType, Compat, PremiumType, UserProfile,
};
use marketplace_receipts::routes::create_router;
use marketplace_receipts::AppState;
use std::sync::Arc;
use tower::ServiceExt;

/// Check if emulator is available via environment variable.
#[allow(dead_code)]
pub fn emulator_available() -> bool {
    std::env::var("FIRESTORE_EMULATOR_HOST").is_ok()
}

/// Skip test with message if emulator not available.
#[macro_export]
macro_rules! require_emulator {
    () => {
        if !crate::common::emulator_available() {
            eprintln!("⚠️  Skipping: FIRESTORE_EMULATOR_HOST not set");
            return;
        }
    };
}

/// Create a test database connection.
#[allow(dead_code)]
pub async fn test_db() -> FirestoreDb {
    FirestoreDb::new("test-project")
        .await
        .expect("Failed to connect to Firestore emulator")
}

/// Create a test app over an empty in-memory store.
/// Returns the router and the shared state.
#[allow(dead_code)]
pub fn create_test_app() -> (axum::Router, Arc<AppState>) {
    create_test_app_with_config(Config::test_default())
}

#[allow(dead_code)]
pub fn create_test_app_with_config(config: Config) -> (axum::Router, Arc<AppState>) {
    let db = Db::Memory(MemoryDb::new());
    let state = Arc::new(AppState::new(config, db).expect("Failed to build app state"));
    (create_router(state.clone()), state)
}

/// Session token for a user, signed with the test config's key.
#[allow(dead_code)]
pub fn session_token(state: &AppState, user_id: u64) -> String {
    create_jwt(user_id, &state.config.jwt_signing_key).expect("Failed to create JWT")
}

/// A public, free web app authored by user 1000.
#[allow(dead_code)]
pub fn webapp(id: u64) -> Addon {
    Addon {
        id,
        guid: format!("app-{}@example.com", id),
        slug: format!("app-{}", id),
        name: format!("App {}", id),
        addon_type: AddonType::Webapp,
        status: AddonStatus::Public,
        premium_type: PremiumType::Free,
        price_cents: None,
        origin: Some(format!("https://app{}.example.com", id)),
        authors: vec![1000],
        compat: None,
    }
}

/// A public extension compatible with Firefox 3.0 - 4.0.* on every platform.
#[allow(dead_code)]
pub fn extension(id: u64) -> Addon {
    Addon {
        id,
        guid: format!("ext-{}@example.com", id),
        slug: format!("ext-{}", id),
        name: format!("Extension {}", id),
        addon_type: AddonType::Extension,
        status: AddonStatus::Public,
        premium_type: PremiumType::Free,
        price_cents: None,
        origin: None,
        authors: vec![2000],
        compat: Some(Compat {
            min_version: "3.0".to_string(),
            max_version: "4.0.*".to_string(),
            platforms: vec!["all".to_string()],
        }),
    }
}

#[allow(dead_code)]
pub fn user(id: u64, groups: &[&str]) -> UserProfile {
    UserProfile {
        id,
        email: Some(format!("user{}@example.com", id)),
        display_name: format!("User {}", id),
        groups: groups.iter().map(|g| g.to_string()).collect(),
    }
}

/// POST a JSON body, optionally as a logged-in user.
#[allow(dead_code)]
pub async fn post_json(
    app: &axum::Router,
    uri: &str,
    body: serde_json::Value,
    token: Option<&str>,
) -> Response {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }

    app.clone()
        .oneshot(builder.body(Body::from(body.to_string())).unwrap())
        .await
        .unwrap()
}

/// POST a raw body (receipts are posted as plain text).
#[allow(dead_code)]
pub async fn post_raw(app: &axum::Router, uri: &str, body: &str) -> Response {
    app.clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(uri)
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap()
}

/// GET, optionally as a logged-in user.
#[allow(dead_code)]
pub async fn get(app: &axum::Router, uri: &str, token: Option<&str>) -> Response {
    let mut builder = Request::builder().uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    app.clone()
        .oneshot(builder.body(Body::empty()).unwrap())
        .await
        .unwrap()
}

#[allow(dead_code)]
pub async fn body_json(response: Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).expect("Response body is not JSON")
}
