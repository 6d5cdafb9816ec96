// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Receipt routes: install recording, issuing and verification.

use crate::error::{AppError, Result};
use crate::middleware::auth::{AuthUser, MaybeUser};
use crate::models::{Addon, AppLogEntry, ClientData, LogAction};
use crate::services::access::{is_developer, is_reviewer};
use crate::services::verify::InvalidReason;
use crate::services::{
    InstallOutcome, InstallService, TestReceiptStatus, VerifyOutput, VerifyStatus,
};
use crate::time_utils::now_rfc3339;
use crate::AppState;
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Extension, Json, Router,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::sync::Arc;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;
use validator::Validate;

/// Region recorded when the client doesn't say.
const DEFAULT_REGION: &str = "restofworld";

/// Routes called by apps and receipt verifiers on other origins.
pub fn verify_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/v1/receipts/verify/{guid}", post(verify))
        .route("/api/v1/receipts/test", post(test_receipt))
        .route("/api/v1/receipts/test/verify/{status}", post(test_verify))
        .route("/api/v1/receipts/reissue", post(reissue))
}

/// Public routes.
pub fn public_routes() -> Router<Arc<AppState>> {
    Router::new().route("/api/v1/receipts/key", get(public_key))
}

/// Routes where logging in is optional.
/// The optional auth middleware is applied in routes/mod.rs.
pub fn optional_auth_routes() -> Router<Arc<AppState>> {
    Router::new().route("/api/v1/apps/{app}/record", post(record))
}

/// Routes that require authentication.
/// The auth middleware is applied in routes/mod.rs.
pub fn protected_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/v1/receipts/install", post(install))
        .route("/api/v1/receipts/issue/{app}", post(issue))
        .route("/api/v1/receipts/check/{guid}", get(check))
}

/// Unwrap a JSON body, turning rejections into 400s.
pub(crate) fn json_body<T: DeserializeOwned>(
    body: std::result::Result<Json<T>, JsonRejection>,
) -> Result<T> {
    body.map(|Json(value)| value)
        .map_err(|e| AppError::BadRequest(e.body_text()))
}

async fn load_app(state: &AppState, key: &str) -> Result<Addon> {
    state
        .db
        .get_addon_by_id_or_slug(key)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("App {} not found", key)))
}

async fn load_app_by_guid(state: &AppState, guid: &str) -> Result<Addon> {
    state
        .db
        .get_addon_by_guid(guid)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("App {} not found", guid)))
}

// ─── Signing Key ─────────────────────────────────────────────

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct KeyResponse {
    pub kid: String,
    pub alg: String,
    /// Raw Ed25519 public key, base64
    pub public_key: String,
}

/// Public key receipts are verified against.
async fn public_key(State(state): State<Arc<AppState>>) -> Json<KeyResponse> {
    Json(KeyResponse {
        kid: state.verifier.key_id().to_string(),
        alg: "EdDSA".to_string(),
        public_key: STANDARD.encode(state.verifier.public_key()),
    })
}

// ─── Install ─────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub struct RecordRequest {
    /// Download source
    pub src: Option<String>,
    pub device_type: Option<String>,
    #[serde(default)]
    pub chromeless: bool,
    pub region: Option<String>,
}

/// Record an install from the web install button.
async fn record(
    State(state): State<Arc<AppState>>,
    Extension(MaybeUser(user)): Extension<MaybeUser>,
    Path(app): Path<String>,
    headers: HeaderMap,
    body: Option<Json<RecordRequest>>,
) -> Result<Json<InstallOutcome>> {
    let app = load_app(&state, &app).await?;
    let request = body.map(|Json(b)| b).unwrap_or_default();
    let client = client_data(&headers, request);

    let outcome = InstallService::new(&state.db, &state.issuer)
        .record(&app, user.map(|u| u.user_id), client)
        .await?;
    Ok(Json(outcome))
}

fn header_str(headers: &HeaderMap, name: header::HeaderName) -> &str {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
}

fn client_data(headers: &HeaderMap, request: RecordRequest) -> ClientData {
    let language = header_str(headers, header::ACCEPT_LANGUAGE)
        .split(',')
        .next()
        .and_then(|tag| tag.split(';').next())
        .map(str::trim)
        .filter(|tag| !tag.is_empty())
        .unwrap_or("en-US")
        .to_string();

    ClientData {
        download_source: request.src,
        device_type: request.device_type.unwrap_or_default(),
        user_agent: header_str(headers, header::USER_AGENT).to_string(),
        is_chromeless: request.chromeless,
        language,
        region: request
            .region
            .unwrap_or_else(|| DEFAULT_REGION.to_string()),
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct InstallRequest {
    /// App ID or slug
    #[validate(length(min = 1, max = 255))]
    pub app: String,
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct ReceiptResponse {
    pub receipt: String,
}

/// REST install: creates (or reuses) the install record and signs a receipt.
async fn install(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    body: std::result::Result<Json<InstallRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ReceiptResponse>)> {
    let request = json_body(body)?;
    request
        .validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let app = load_app(&state, &request.app).await?;
    let receipt = InstallService::new(&state.db, &state.issuer)
        .install(&app, user.user_id)
        .await?;

    Ok((StatusCode::CREATED, Json(ReceiptResponse { receipt })))
}

/// Reviewer tools: issue a reviewer or developer receipt.
async fn issue(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(app): Path<String>,
) -> Result<Json<InstallOutcome>> {
    let app = load_app(&state, &app).await?;
    let outcome = InstallService::new(&state.db, &state.issuer)
        .issue(&app, user.user_id)
        .await?;
    Ok(Json(outcome))
}

// ─── Verification ────────────────────────────────────────────

/// Verify a developer or reviewer receipt.
///
/// Only receipts belonging to a reviewer or one of the app's authors pass.
async fn verify(
    State(state): State<Arc<AppState>>,
    Path(guid): Path<String>,
    body: String,
) -> Result<Json<VerifyOutput>> {
    let app = load_app_by_guid(&state, &guid).await?;
    let verified = state
        .verifier
        .check_without_purchase(&body, &state.db)
        .await?;

    if let Some(user_id) = verified.user_id {
        let profile = state.db.get_user(user_id).await?;
        if is_reviewer(profile.as_ref()) || is_developer(&app, user_id, profile.as_ref()) {
            state
                .db
                .add_app_log(&AppLogEntry {
                    app_id: app.id,
                    user_id: Some(user_id),
                    action: LogAction::ReceiptChecked,
                    created: now_rfc3339(),
                })
                .await?;
            return Ok(Json(verified.output));
        }
    }

    Ok(Json(VerifyOutput::invalid(InvalidReason::NoUser)))
}

#[derive(Serialize)]
pub struct CheckResponse {
    pub status: bool,
}

/// Has a reviewer or developer receipt been verified for this app?
async fn check(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(guid): Path<String>,
) -> Result<Json<CheckResponse>> {
    let profile = state.db.get_user(user.user_id).await?;
    if !is_reviewer(profile.as_ref()) {
        return Err(AppError::Forbidden("Reviewers only".to_string()));
    }

    let app = load_app_by_guid(&state, &guid).await?;
    let status = state
        .db
        .has_app_log(app.id, LogAction::ReceiptChecked)
        .await?;
    Ok(Json(CheckResponse { status }))
}

// ─── Test Receipts ───────────────────────────────────────────

#[derive(Debug, Deserialize, Validate)]
pub struct TestReceiptRequest {
    /// Root URL of the app under test
    #[validate(url)]
    pub root: String,
    pub receipt_type: TestReceiptStatus,
}

/// Sign a test receipt that verifies as the requested status.
async fn test_receipt(
    State(state): State<Arc<AppState>>,
    body: std::result::Result<Json<TestReceiptRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ReceiptResponse>)> {
    let request = json_body(body)?;
    request
        .validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    if request.receipt_type == TestReceiptStatus::None {
        return Ok((
            StatusCode::CREATED,
            Json(ReceiptResponse {
                receipt: String::new(),
            }),
        ));
    }

    tracing::info!(target: "cef", root = %request.root, "Test receipt signing");
    let receipt = state
        .issuer
        .create_test_receipt(&request.root, request.receipt_type)
        .await?;
    Ok((StatusCode::CREATED, Json(ReceiptResponse { receipt })))
}

async fn test_verify(
    State(state): State<Arc<AppState>>,
    Path(status): Path<String>,
    body: String,
) -> Json<VerifyOutput> {
    Json(state.verifier.check_without_db(&body, &status))
}

// ─── Reissue ─────────────────────────────────────────────────

#[derive(Serialize)]
pub struct ReissueResponse {
    #[serde(flatten)]
    pub output: VerifyOutput,
    pub receipt: String,
}

/// Re-sign an expired purchase receipt. Anything not expired is refused.
async fn reissue(State(state): State<Arc<AppState>>, body: String) -> Result<impl IntoResponse> {
    let output = state.verifier.check_full(&body, &state.db).await?;

    if output.status != VerifyStatus::Expired {
        tracing::info!(target: "cef", status = ?output.status, "Receipt reissue failed");
        return Ok((
            StatusCode::BAD_REQUEST,
            Json(ReissueResponse {
                output,
                receipt: String::new(),
            }),
        ));
    }

    // check_full only reports expired for receipts that decoded.
    let claims = state
        .verifier
        .decode(&body)
        .map_err(|reason| AppError::BadRequest(reason.to_string()))?;
    let receipt = state.issuer.reissue(claims).await?;

    Ok((
        StatusCode::OK,
        Json(ReissueResponse {
            output: VerifyOutput::expired(),
            receipt,
        }),
    ))
}
