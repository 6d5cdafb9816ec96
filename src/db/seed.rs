// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! JSON fixture loading for the in-memory store.

use crate::db::MemoryDb;
use crate::models::{Addon, AddonPurchase, RecommendationSet, UserProfile};
use serde::Deserialize;
use std::fs;
use std::path::Path;

/// Contents of a seed file. Every section is optional.
#[derive(Debug, Default, Deserialize)]
pub struct SeedData {
    #[serde(default)]
    pub addons: Vec<Addon>,
    #[serde(default)]
    pub users: Vec<UserProfile>,
    #[serde(default)]
    pub purchases: Vec<AddonPurchase>,
    #[serde(default)]
    pub download_sources: Vec<String>,
    #[serde(default)]
    pub recommendations: Vec<RecommendationSet>,
}

impl SeedData {
    /// Load seed data from a JSON file.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, SeedError> {
        let json_data =
            fs::read_to_string(path.as_ref()).map_err(|e| SeedError::IoError(e.to_string()))?;
        Self::load_from_json(&json_data)
    }

    /// Load seed data from a JSON string.
    pub fn load_from_json(json_data: &str) -> Result<Self, SeedError> {
        serde_json::from_str(json_data).map_err(|e| SeedError::ParseError(e.to_string()))
    }

    /// Write everything into the store.
    pub async fn apply(&self, db: &MemoryDb) -> Result<(), SeedError> {
        for addon in &self.addons {
            db.upsert_addon(addon).await.map_err(SeedError::from_db)?;
        }
        for user in &self.users {
            db.upsert_user(user).await.map_err(SeedError::from_db)?;
        }
        for purchase in &self.purchases {
            db.upsert_purchase(purchase)
                .await
                .map_err(SeedError::from_db)?;
        }
        for source in &self.download_sources {
            db.add_download_source(source)
                .await
                .map_err(SeedError::from_db)?;
        }
        for set in &self.recommendations {
            db.upsert_recommendation_set(set)
                .await
                .map_err(SeedError::from_db)?;
        }

        tracing::info!(
            addons = self.addons.len(),
            users = self.users.len(),
            purchases = self.purchases.len(),
            recommendations = self.recommendations.len(),
            "Seed data loaded"
        );
        Ok(())
    }
}

/// Errors from seed loading.
#[derive(Debug, thiserror::Error)]
pub enum SeedError {
    #[error("Failed to read file: {0}")]
    IoError(String),

    #[error("Failed to parse seed JSON: {0}")]
    ParseError(String),

    #[error("Failed to store seed data: {0}")]
    Store(String),
}

impl SeedError {
    fn from_db(err: crate::error::AppError) -> Self {
        SeedError::Store(err.to_string())
    }
}
