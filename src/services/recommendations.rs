// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Discovery recommendations for anonymous clients.
//!
//! A client posts the GUIDs of its installed add-ons and, after the first
//! visit, the token it was handed. Clients with the same add-on set share a
//! synced collection, and recommendations are cached on that collection.

use crate::db::Db;
use crate::error::Result;
use crate::models::{
    make_index, Addon, AddonType, RecommendationSet, ScoredAddon, SyncedCollection,
};
use serde::Serialize;
use std::collections::HashMap;
use uuid::Uuid;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Maximum number of add-ons returned.
pub const DEFAULT_LIMIT: usize = 9;

#[derive(Debug, Clone, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct RecommendedAddon {
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub id: u64,
    pub guid: String,
    pub name: String,
    pub slug: String,
    pub score: f64,
}

#[derive(Debug, Clone, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct RecommendationResponse {
    pub token: String,
    pub addons: Vec<RecommendedAddon>,
}

/// Add-on summary in the debug output.
#[derive(Debug, Clone, Serialize)]
pub struct DebugAddon {
    pub id: u64,
    pub guid: String,
    pub name: String,
    pub addon_type: AddonType,
}

/// Everything that went into the recommendations for a set of add-ons.
#[derive(Debug, Clone, Serialize)]
pub struct RecsDebug {
    pub addon_index: String,
    pub addons: Vec<DebugAddon>,
    /// Cached recommendations of the synced collection, best first
    pub recommended: Vec<ScoredAddon>,
    /// Raw scores per posted add-on
    pub recs: HashMap<u64, Vec<ScoredAddon>>,
    /// Scores summed across the set, best first
    pub all_recs: Vec<ScoredAddon>,
}

/// Sum the scores of every other add-on across the set.
///
/// Add-ons already in the set are dropped. The result is sorted by score,
/// best first, with ties broken by ascending ID.
pub fn build_recommendations(addon_ids: &[u64], sets: &[RecommendationSet]) -> Vec<ScoredAddon> {
    let mut totals = sum_scores(sets);
    totals.retain(|id, _| !addon_ids.contains(id));
    sorted(totals)
}

fn sum_scores(sets: &[RecommendationSet]) -> HashMap<u64, f64> {
    let mut totals: HashMap<u64, f64> = HashMap::new();
    for set in sets {
        for scored in &set.scores {
            *totals.entry(scored.addon_id).or_default() += scored.score;
        }
    }
    totals
}

fn sorted(totals: HashMap<u64, f64>) -> Vec<ScoredAddon> {
    let mut recs: Vec<ScoredAddon> = totals
        .into_iter()
        .map(|(addon_id, score)| ScoredAddon { addon_id, score })
        .collect();
    recs.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| a.addon_id.cmp(&b.addon_id))
    });
    recs
}

/// Can this add-on be shown to the client?
fn is_recommendable(addon: &Addon, app_version: &str, platform: &str) -> bool {
    addon.addon_type == AddonType::Extension
        && addon.is_public()
        && addon.is_compatible(app_version, platform)
}

pub struct RecommendationService<'a> {
    db: &'a Db,
}

impl<'a> RecommendationService<'a> {
    pub fn new(db: &'a Db) -> Self {
        Self { db }
    }

    /// Sync the client's add-on set and return recommendations for it.
    pub async fn recommendations(
        &self,
        guids: &[String],
        token: Option<String>,
        app_version: &str,
        platform: &str,
        limit: usize,
    ) -> Result<RecommendationResponse> {
        let addon_ids: Vec<u64> = self
            .db
            .get_addons_by_guids(guids)
            .await?
            .into_iter()
            .map(|a| a.id)
            .collect();

        let (token, collection) = match token {
            Some(token) => {
                let collection = self.sync_with_token(&addon_ids, &token).await?;
                (token, collection)
            }
            None => {
                let token = self.random_token().await?;
                let collection = self.sync(&addon_ids, &token).await?;
                (token, collection)
            }
        };

        let recommended = self.collection_recommendations(&collection).await?;
        let addons = self
            .filter_addons(&recommended, app_version, platform, limit)
            .await?;

        tracing::debug!(
            addon_index = %collection.addon_index,
            posted = guids.len(),
            known = addon_ids.len(),
            returned = addons.len(),
            "Recommendations served"
        );

        Ok(RecommendationResponse { token, addons })
    }

    /// Returning client: reuse its collection if the set is unchanged.
    async fn sync_with_token(&self, addon_ids: &[u64], token: &str) -> Result<SyncedCollection> {
        if let Some(existing) = self.db.get_collection_token(token).await? {
            if existing.addon_index == make_index(addon_ids) {
                if let Some(collection) =
                    self.db.get_synced_collection(&existing.addon_index).await?
                {
                    return Ok(collection);
                }
            }
            tracing::debug!(old_index = %existing.addon_index, "Add-on set changed, moving token");
            self.db.remove_token(token).await?;
        }
        self.sync(addon_ids, token).await
    }

    async fn sync(&self, addon_ids: &[u64], token: &str) -> Result<SyncedCollection> {
        let collection = self.db.get_or_create_synced_collection(addon_ids).await?;
        self.db.attach_token(token, &collection.addon_index).await?;
        Ok(collection)
    }

    /// Fresh token not already in use.
    async fn random_token(&self) -> Result<String> {
        loop {
            let token = Uuid::new_v4().to_string();
            if self.db.get_collection_token(&token).await?.is_none() {
                return Ok(token);
            }
        }
    }

    /// Cached recommendations, building and caching them on first use.
    async fn collection_recommendations(
        &self,
        collection: &SyncedCollection,
    ) -> Result<Vec<ScoredAddon>> {
        if let Some(recommended) = &collection.recommended {
            return Ok(recommended.clone());
        }

        let sets = self
            .db
            .get_recommendation_sets(&collection.addon_ids)
            .await?;
        let recommended = build_recommendations(&collection.addon_ids, &sets);
        self.db
            .set_collection_recommendations(&collection.addon_index, &recommended)
            .await?;
        Ok(recommended)
    }

    async fn filter_addons(
        &self,
        recommended: &[ScoredAddon],
        app_version: &str,
        platform: &str,
        limit: usize,
    ) -> Result<Vec<RecommendedAddon>> {
        let ids: Vec<u64> = recommended.iter().map(|r| r.addon_id).collect();
        let addons: HashMap<u64, Addon> = self
            .db
            .get_addons(&ids)
            .await?
            .into_iter()
            .map(|a| (a.id, a))
            .collect();

        Ok(recommended
            .iter()
            .filter_map(|rec| {
                let addon = addons.get(&rec.addon_id)?;
                is_recommendable(addon, app_version, platform).then(|| RecommendedAddon {
                    id: addon.id,
                    guid: addon.guid.clone(),
                    name: addon.name.clone(),
                    slug: addon.slug.clone(),
                    score: rec.score,
                })
            })
            .take(limit)
            .collect())
    }

    /// Inspect the recommendations for a set of add-on IDs.
    pub async fn recs_debug(&self, addon_ids: &[u64]) -> Result<RecsDebug> {
        let collection = self.db.get_or_create_synced_collection(addon_ids).await?;
        let recommended = self.collection_recommendations(&collection).await?;

        let mut addons: Vec<DebugAddon> = self
            .db
            .get_addons(addon_ids)
            .await?
            .into_iter()
            .map(|a| DebugAddon {
                id: a.id,
                guid: a.guid,
                name: a.name,
                addon_type: a.addon_type,
            })
            .collect();
        addons.sort_by_key(|a| a.id);

        let sets = self.db.get_recommendation_sets(addon_ids).await?;
        let all_recs = sorted(sum_scores(&sets));
        let recs = sets
            .into_iter()
            .map(|set| (set.addon_id, set.scores))
            .collect();

        Ok(RecsDebug {
            addon_index: collection.addon_index,
            addons,
            recommended,
            recs,
            all_recs,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(addon_id: u64, scores: &[(u64, f64)]) -> RecommendationSet {
        RecommendationSet {
            addon_id,
            scores: scores
                .iter()
                .map(|&(addon_id, score)| ScoredAddon { addon_id, score })
                .collect(),
        }
    }

    #[test]
    fn test_scores_are_summed_and_sorted() {
        let sets = vec![
            set(1, &[(10, 0.5), (11, 0.2)]),
            set(2, &[(10, 0.1), (12, 0.9)]),
        ];
        let recs = build_recommendations(&[1, 2], &sets);
        let ids: Vec<u64> = recs.iter().map(|r| r.addon_id).collect();
        assert_eq!(ids, vec![12, 10, 11]);
        assert!((recs[1].score - 0.6).abs() < 1e-9);
    }

    #[test]
    fn test_installed_addons_are_excluded() {
        let sets = vec![set(1, &[(2, 5.0), (3, 1.0)]), set(2, &[(1, 5.0)])];
        let recs = build_recommendations(&[1, 2], &sets);
        assert_eq!(recs, vec![ScoredAddon { addon_id: 3, score: 1.0 }]);
    }

    #[test]
    fn test_ties_break_by_id() {
        let sets = vec![set(1, &[(30, 1.0), (20, 1.0), (25, 2.0)])];
        let ids: Vec<u64> = build_recommendations(&[1], &sets)
            .iter()
            .map(|r| r.addon_id)
            .collect();
        assert_eq!(ids, vec![25, 20, 30]);
    }

    #[test]
    fn test_empty_input() {
        assert!(build_recommendations(&[], &[]).is_empty());
    }
}
