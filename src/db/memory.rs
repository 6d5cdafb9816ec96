// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! In-process store for local development and tests.
//!
//! Get-or-create operations go through the DashMap entry API, so concurrent
//! callers racing on the same key observe a single record.

use crate::error::AppError;
use crate::models::install::install_doc_id;
use crate::models::purchase::purchase_doc_id;
use crate::models::{
    make_index, Addon, AddonPurchase, AppLogEntry, CollectionToken, InstallType, Installed,
    LogAction, PurchaseType, RecommendationSet, ScoredAddon, SyncedCollection, UserProfile,
};
use crate::time_utils::now_rfc3339;
use dashmap::{DashMap, DashSet};
use std::sync::Arc;

#[derive(Default)]
struct Tables {
    addons: DashMap<u64, Addon>,
    users: DashMap<u64, UserProfile>,
    installs: DashMap<String, Installed>,
    purchases: DashMap<String, AddonPurchase>,
    download_sources: DashSet<String>,
    app_log: DashMap<u64, Vec<AppLogEntry>>,
    synced_collections: DashMap<String, SyncedCollection>,
    collection_tokens: DashMap<String, CollectionToken>,
    recommendations: DashMap<u64, RecommendationSet>,
}

/// In-memory database. Clones share the same tables.
#[derive(Clone, Default)]
pub struct MemoryDb {
    tables: Arc<Tables>,
}

impl MemoryDb {
    pub fn new() -> Self {
        Self::default()
    }

    // ─── Add-ons ─────────────────────────────────────────────────

    pub async fn get_addon(&self, id: u64) -> Result<Option<Addon>, AppError> {
        Ok(self.tables.addons.get(&id).map(|a| a.value().clone()))
    }

    pub async fn get_addon_by_slug(&self, slug: &str) -> Result<Option<Addon>, AppError> {
        Ok(self
            .tables
            .addons
            .iter()
            .find(|a| a.slug == slug)
            .map(|a| a.value().clone()))
    }

    pub async fn get_addon_by_guid(&self, guid: &str) -> Result<Option<Addon>, AppError> {
        Ok(self
            .tables
            .addons
            .iter()
            .find(|a| a.guid == guid)
            .map(|a| a.value().clone()))
    }

    pub async fn get_addons(&self, ids: &[u64]) -> Result<Vec<Addon>, AppError> {
        Ok(ids
            .iter()
            .filter_map(|id| self.tables.addons.get(id).map(|a| a.value().clone()))
            .collect())
    }

    pub async fn get_addons_by_guids(&self, guids: &[String]) -> Result<Vec<Addon>, AppError> {
        Ok(self
            .tables
            .addons
            .iter()
            .filter(|a| guids.contains(&a.guid))
            .map(|a| a.value().clone())
            .collect())
    }

    pub async fn upsert_addon(&self, addon: &Addon) -> Result<(), AppError> {
        self.tables.addons.insert(addon.id, addon.clone());
        Ok(())
    }

    // ─── Users ───────────────────────────────────────────────────

    pub async fn get_user(&self, id: u64) -> Result<Option<UserProfile>, AppError> {
        Ok(self.tables.users.get(&id).map(|u| u.value().clone()))
    }

    pub async fn upsert_user(&self, user: &UserProfile) -> Result<(), AppError> {
        self.tables.users.insert(user.id, user.clone());
        Ok(())
    }

    // ─── Installs ────────────────────────────────────────────────

    pub async fn get_or_create_installed(
        &self,
        app_id: u64,
        user_id: u64,
        install_type: InstallType,
    ) -> Result<(Installed, bool), AppError> {
        let mut created = false;
        let installed = self
            .tables
            .installs
            .entry(install_doc_id(app_id, user_id, install_type))
            .or_insert_with(|| {
                created = true;
                Installed::new(app_id, user_id, install_type, now_rfc3339())
            })
            .value()
            .clone();
        Ok((installed, created))
    }

    pub async fn get_installed_by_uuid(&self, uuid: &str) -> Result<Option<Installed>, AppError> {
        Ok(self
            .tables
            .installs
            .iter()
            .find(|i| i.uuid == uuid)
            .map(|i| i.value().clone()))
    }

    pub async fn upsert_installed(&self, installed: &Installed) -> Result<(), AppError> {
        self.tables
            .installs
            .insert(installed.doc_id(), installed.clone());
        Ok(())
    }

    // ─── Purchases ───────────────────────────────────────────────

    pub async fn get_purchase(
        &self,
        app_id: u64,
        user_id: u64,
    ) -> Result<Option<AddonPurchase>, AppError> {
        Ok(self
            .tables
            .purchases
            .get(&purchase_doc_id(app_id, user_id))
            .map(|p| p.value().clone()))
    }

    pub async fn get_or_create_purchase(
        &self,
        app_id: u64,
        user_id: u64,
        purchase_type: PurchaseType,
    ) -> Result<(AddonPurchase, bool), AppError> {
        let mut created = false;
        let purchase = self
            .tables
            .purchases
            .entry(purchase_doc_id(app_id, user_id))
            .or_insert_with(|| {
                created = true;
                AddonPurchase {
                    app_id,
                    user_id,
                    purchase_type,
                    created: now_rfc3339(),
                }
            })
            .value()
            .clone();
        Ok((purchase, created))
    }

    pub async fn upsert_purchase(&self, purchase: &AddonPurchase) -> Result<(), AppError> {
        self.tables
            .purchases
            .insert(purchase.doc_id(), purchase.clone());
        Ok(())
    }

    // ─── Download sources ────────────────────────────────────────

    pub async fn is_download_source(&self, name: &str) -> Result<bool, AppError> {
        Ok(self.tables.download_sources.contains(name))
    }

    pub async fn add_download_source(&self, name: &str) -> Result<(), AppError> {
        self.tables.download_sources.insert(name.to_string());
        Ok(())
    }

    // ─── App activity log ────────────────────────────────────────

    pub async fn add_app_log(&self, entry: &AppLogEntry) -> Result<(), AppError> {
        self.tables
            .app_log
            .entry(entry.app_id)
            .or_default()
            .push(entry.clone());
        Ok(())
    }

    pub async fn has_app_log(&self, app_id: u64, action: LogAction) -> Result<bool, AppError> {
        Ok(self
            .tables
            .app_log
            .get(&app_id)
            .is_some_and(|entries| entries.iter().any(|e| e.action == action)))
    }

    // ─── Synced collections ──────────────────────────────────────

    pub async fn get_synced_collection(
        &self,
        addon_index: &str,
    ) -> Result<Option<SyncedCollection>, AppError> {
        Ok(self
            .tables
            .synced_collections
            .get(addon_index)
            .map(|c| c.value().clone()))
    }

    pub async fn get_or_create_synced_collection(
        &self,
        addon_ids: &[u64],
    ) -> Result<SyncedCollection, AppError> {
        Ok(self
            .tables
            .synced_collections
            .entry(make_index(addon_ids))
            .or_insert_with(|| SyncedCollection::new(addon_ids, now_rfc3339()))
            .value()
            .clone())
    }

    pub async fn set_collection_recommendations(
        &self,
        addon_index: &str,
        recommended: &[ScoredAddon],
    ) -> Result<(), AppError> {
        match self.tables.synced_collections.get_mut(addon_index) {
            Some(mut collection) => {
                collection.recommended = Some(recommended.to_vec());
                Ok(())
            }
            None => Err(AppError::NotFound(format!(
                "Synced collection {} not found",
                addon_index
            ))),
        }
    }

    pub async fn get_collection_token(
        &self,
        token: &str,
    ) -> Result<Option<CollectionToken>, AppError> {
        Ok(self
            .tables
            .collection_tokens
            .get(token)
            .map(|t| t.value().clone()))
    }

    pub async fn attach_token(&self, token: &str, addon_index: &str) -> Result<(), AppError> {
        self.tables.collection_tokens.insert(
            token.to_string(),
            CollectionToken {
                token: token.to_string(),
                addon_index: addon_index.to_string(),
            },
        );
        Ok(())
    }

    pub async fn remove_token(&self, token: &str) -> Result<(), AppError> {
        self.tables.collection_tokens.remove(token);
        Ok(())
    }

    // ─── Recommendation scores ───────────────────────────────────

    pub async fn get_recommendation_sets(
        &self,
        addon_ids: &[u64],
    ) -> Result<Vec<RecommendationSet>, AppError> {
        Ok(addon_ids
            .iter()
            .filter_map(|id| {
                self.tables
                    .recommendations
                    .get(id)
                    .map(|s| s.value().clone())
            })
            .collect())
    }

    pub async fn upsert_recommendation_set(&self, set: &RecommendationSet) -> Result<(), AppError> {
        self.tables.recommendations.insert(set.addon_id, set.clone());
        Ok(())
    }

    /// Number of install records, for tests and diagnostics.
    pub fn install_count(&self) -> usize {
        self.tables.installs.len()
    }

    /// Number of synced collections, for tests and diagnostics.
    pub fn synced_collection_count(&self) -> usize {
        self.tables.synced_collections.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_get_or_create_installed_is_idempotent() {
        let db = MemoryDb::new();

        let (first, created) = db
            .get_or_create_installed(1, 2, InstallType::User)
            .await
            .unwrap();
        assert!(created);

        let (second, created) = db
            .get_or_create_installed(1, 2, InstallType::User)
            .await
            .unwrap();
        assert!(!created);
        assert_eq!(first.uuid, second.uuid);

        let (dev, created) = db
            .get_or_create_installed(1, 2, InstallType::Developer)
            .await
            .unwrap();
        assert!(created);
        assert_ne!(dev.uuid, first.uuid);
        assert_eq!(db.install_count(), 2);
    }

    #[tokio::test]
    async fn test_lookup_install_by_uuid() {
        let db = MemoryDb::new();
        let (installed, _) = db
            .get_or_create_installed(7, 8, InstallType::User)
            .await
            .unwrap();

        let found = db.get_installed_by_uuid(&installed.uuid).await.unwrap();
        assert_eq!(found.map(|i| i.user_id), Some(8));
        assert!(db.get_installed_by_uuid("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_purchase_get_or_create_keeps_existing_type() {
        let db = MemoryDb::new();
        db.upsert_purchase(&AddonPurchase {
            app_id: 1,
            user_id: 2,
            purchase_type: PurchaseType::Refund,
            created: now_rfc3339(),
        })
        .await
        .unwrap();

        let (purchase, created) = db
            .get_or_create_purchase(1, 2, PurchaseType::NoCharge)
            .await
            .unwrap();
        assert!(!created);
        assert_eq!(purchase.purchase_type, PurchaseType::Refund);
    }

    #[tokio::test]
    async fn test_app_log_by_action() {
        let db = MemoryDb::new();
        db.add_app_log(&AppLogEntry {
            app_id: 3,
            user_id: Some(1),
            action: LogAction::InstallAddon,
            created: now_rfc3339(),
        })
        .await
        .unwrap();

        assert!(db.has_app_log(3, LogAction::InstallAddon).await.unwrap());
        assert!(!db.has_app_log(3, LogAction::ReceiptChecked).await.unwrap());
        assert!(!db.has_app_log(4, LogAction::InstallAddon).await.unwrap());
    }

    #[tokio::test]
    async fn test_synced_collection_shared_by_index() {
        let db = MemoryDb::new();
        let a = db.get_or_create_synced_collection(&[2, 1]).await.unwrap();
        let b = db.get_or_create_synced_collection(&[1, 2]).await.unwrap();
        assert_eq!(a.addon_index, b.addon_index);
        assert_eq!(db.synced_collection_count(), 1);

        db.set_collection_recommendations(
            &a.addon_index,
            &[ScoredAddon {
                addon_id: 9,
                score: 1.0,
            }],
        )
        .await
        .unwrap();
        let cached = db.get_synced_collection(&a.addon_index).await.unwrap();
        assert_eq!(cached.and_then(|c| c.recommended).map(|r| r.len()), Some(1));
    }
}
