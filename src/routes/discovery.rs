// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Discovery pane recommendation routes.

use crate::error::{AppError, Result};
use crate::middleware::auth::AuthUser;
use crate::services::access::is_admin;
use crate::services::recommendations::{RecsDebug, DEFAULT_LIMIT};
use crate::services::{RecommendationResponse, RecommendationService};
use crate::AppState;
use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    routing::{get, post},
    Extension, Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;

/// Public routes.
pub fn public_routes() -> Router<Arc<AppState>> {
    Router::new().route(
        "/api/v1/discovery/recommendations/{version}/{platform}",
        post(recommendations),
    )
}

/// Admin routes (auth applied in routes/mod.rs).
pub fn protected_routes() -> Router<Arc<AppState>> {
    Router::new().route("/api/v1/discovery/recommendations/debug", get(recs_debug))
}

#[derive(Debug, Deserialize)]
pub struct SyncRequest {
    pub guids: Vec<String>,
    pub token: Option<String>,
}

/// Recommended add-ons for the posted add-on GUIDs.
///
/// The body is parsed by hand so that every malformed body, including a
/// missing content type, is a plain 400.
async fn recommendations(
    State(state): State<Arc<AppState>>,
    Path((version, platform)): Path<(String, String)>,
    body: Bytes,
) -> Result<Json<RecommendationResponse>> {
    let request: SyncRequest = serde_json::from_slice(&body)
        .map_err(|e| AppError::BadRequest(format!("Invalid sync request: {}", e)))?;

    let response = RecommendationService::new(&state.db)
        .recommendations(
            &request.guids,
            request.token,
            &version,
            &platform,
            DEFAULT_LIMIT,
        )
        .await?;
    Ok(Json(response))
}

#[derive(Deserialize)]
struct DebugQuery {
    /// Comma-separated add-on IDs
    ids: String,
}

/// Scores behind the recommendations for a set of add-ons.
async fn recs_debug(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Query(params): Query<DebugQuery>,
) -> Result<Json<RecsDebug>> {
    let profile = state.db.get_user(user.user_id).await?;
    if !is_admin(profile.as_ref()) {
        return Err(AppError::Forbidden("Admins only".to_string()));
    }

    let ids = parse_ids(&params.ids)?;
    let debug = RecommendationService::new(&state.db)
        .recs_debug(&ids)
        .await?;
    Ok(Json(debug))
}

fn parse_ids(ids: &str) -> Result<Vec<u64>> {
    ids.split(',')
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(|id| {
            id.parse()
                .map_err(|_| AppError::BadRequest(format!("Invalid add-on ID: {}", id)))
        })
        .collect()
}
