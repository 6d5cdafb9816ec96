// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Synced collections: the add-on sets posted by discovery clients.
//!
//! Clients with an identical set of add-ons share one collection, found by
//! its `addon_index`. Each client is tracked by a token pointing at the
//! collection it last synced.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Collection of add-ons synced from one or more clients.
///
/// Stored at: `synced_collections/{addon_index}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncedCollection {
    pub addon_index: String,
    /// Sorted, de-duplicated add-on IDs
    pub addon_ids: Vec<u64>,
    /// Cached recommendations, best first
    #[serde(default)]
    pub recommended: Option<Vec<ScoredAddon>>,
    pub created: String,
}

impl SyncedCollection {
    pub fn new(addon_ids: &[u64], created: String) -> Self {
        let addon_ids = normalize_ids(addon_ids);
        Self {
            addon_index: make_index(&addon_ids),
            addon_ids,
            recommended: None,
            created,
        }
    }
}

/// Client token pointing at a synced collection.
///
/// Stored at: `collection_tokens/{token}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionToken {
    pub token: String,
    pub addon_index: String,
}

/// Recommendation score of another add-on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredAddon {
    pub addon_id: u64,
    pub score: f64,
}

/// Precomputed "users of this add-on also use" scores.
///
/// Stored at: `recommendations/{addon_id}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendationSet {
    pub addon_id: u64,
    #[serde(default)]
    pub scores: Vec<ScoredAddon>,
}

/// Index identifying a set of add-ons regardless of order or duplicates.
pub fn make_index(addon_ids: &[u64]) -> String {
    let joined = normalize_ids(addon_ids)
        .iter()
        .map(u64::to_string)
        .collect::<Vec<_>>()
        .join(":");
    hex::encode(Sha256::digest(joined.as_bytes()))
}

fn normalize_ids(addon_ids: &[u64]) -> Vec<u64> {
    let mut ids = addon_ids.to_vec();
    ids.sort_unstable();
    ids.dedup();
    ids
}
