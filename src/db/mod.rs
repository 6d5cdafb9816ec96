// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Database layer.
//!
//! `Db` dispatches to Firestore in production or to an in-process store for
//! local development and tests. Both backends expose the same operations.

pub mod firestore;
pub mod memory;
pub mod seed;

pub use firestore::FirestoreDb;
pub use memory::MemoryDb;

use crate::error::AppError;
use crate::models::{
    Addon, AddonPurchase, AppLogEntry, CollectionToken, InstallType, Installed, LogAction,
    PurchaseType, RecommendationSet, ScoredAddon, SyncedCollection, UserProfile,
};

/// Collection names as constants.
pub mod collections {
    pub const ADDONS: &str = "addons";
    pub const USERS: &str = "users";
    /// Keyed by `{app_id}_{user_id}_{install_type}`
    pub const INSTALLS: &str = "installs";
    /// Keyed by `{app_id}_{user_id}`
    pub const PURCHASES: &str = "purchases";
    pub const DOWNLOAD_SOURCES: &str = "download_sources";
    pub const APP_LOG: &str = "app_log";
    /// Keyed by addon index
    pub const SYNCED_COLLECTIONS: &str = "synced_collections";
    /// Keyed by client token
    pub const COLLECTION_TOKENS: &str = "collection_tokens";
    /// Keyed by addon_id
    pub const RECOMMENDATIONS: &str = "recommendations";
}

/// Database handle.
#[derive(Clone)]
pub enum Db {
    Memory(MemoryDb),
    Firestore(FirestoreDb),
}

macro_rules! dispatch {
    ($self:ident, $method:ident($($arg:expr),*)) => {
        match $self {
            Db::Memory(db) => db.$method($($arg),*).await,
            Db::Firestore(db) => db.$method($($arg),*).await,
        }
    };
}

impl Db {
    // ─── Add-ons ─────────────────────────────────────────────────

    pub async fn get_addon(&self, id: u64) -> Result<Option<Addon>, AppError> {
        dispatch!(self, get_addon(id))
    }

    pub async fn get_addon_by_slug(&self, slug: &str) -> Result<Option<Addon>, AppError> {
        dispatch!(self, get_addon_by_slug(slug))
    }

    pub async fn get_addon_by_guid(&self, guid: &str) -> Result<Option<Addon>, AppError> {
        dispatch!(self, get_addon_by_guid(guid))
    }

    /// Fetch several add-ons. Missing IDs are skipped; order is not preserved.
    pub async fn get_addons(&self, ids: &[u64]) -> Result<Vec<Addon>, AppError> {
        dispatch!(self, get_addons(ids))
    }

    /// Fetch add-ons by GUID. Unknown GUIDs are skipped.
    pub async fn get_addons_by_guids(&self, guids: &[String]) -> Result<Vec<Addon>, AppError> {
        dispatch!(self, get_addons_by_guids(guids))
    }

    pub async fn upsert_addon(&self, addon: &Addon) -> Result<(), AppError> {
        dispatch!(self, upsert_addon(addon))
    }

    /// Look up an app by numeric ID, falling back to slug.
    pub async fn get_addon_by_id_or_slug(&self, key: &str) -> Result<Option<Addon>, AppError> {
        if let Ok(id) = key.parse::<u64>() {
            if let Some(addon) = self.get_addon(id).await? {
                return Ok(Some(addon));
            }
        }
        self.get_addon_by_slug(key).await
    }

    // ─── Users ───────────────────────────────────────────────────

    pub async fn get_user(&self, id: u64) -> Result<Option<UserProfile>, AppError> {
        dispatch!(self, get_user(id))
    }

    pub async fn upsert_user(&self, user: &UserProfile) -> Result<(), AppError> {
        dispatch!(self, upsert_user(user))
    }

    // ─── Installs ────────────────────────────────────────────────

    /// Get the install record for (app, user, type), creating it if needed.
    ///
    /// Returns the record and whether it was created by this call.
    pub async fn get_or_create_installed(
        &self,
        app_id: u64,
        user_id: u64,
        install_type: InstallType,
    ) -> Result<(Installed, bool), AppError> {
        dispatch!(self, get_or_create_installed(app_id, user_id, install_type))
    }

    pub async fn get_installed_by_uuid(&self, uuid: &str) -> Result<Option<Installed>, AppError> {
        dispatch!(self, get_installed_by_uuid(uuid))
    }

    pub async fn upsert_installed(&self, installed: &Installed) -> Result<(), AppError> {
        dispatch!(self, upsert_installed(installed))
    }

    // ─── Purchases ───────────────────────────────────────────────

    pub async fn get_purchase(
        &self,
        app_id: u64,
        user_id: u64,
    ) -> Result<Option<AddonPurchase>, AppError> {
        dispatch!(self, get_purchase(app_id, user_id))
    }

    /// Get the purchase record for (app, user), creating one of `purchase_type` if absent.
    pub async fn get_or_create_purchase(
        &self,
        app_id: u64,
        user_id: u64,
        purchase_type: PurchaseType,
    ) -> Result<(AddonPurchase, bool), AppError> {
        dispatch!(self, get_or_create_purchase(app_id, user_id, purchase_type))
    }

    pub async fn upsert_purchase(&self, purchase: &AddonPurchase) -> Result<(), AppError> {
        dispatch!(self, upsert_purchase(purchase))
    }

    // ─── Download sources ────────────────────────────────────────

    pub async fn is_download_source(&self, name: &str) -> Result<bool, AppError> {
        dispatch!(self, is_download_source(name))
    }

    pub async fn add_download_source(&self, name: &str) -> Result<(), AppError> {
        dispatch!(self, add_download_source(name))
    }

    // ─── App activity log ────────────────────────────────────────

    pub async fn add_app_log(&self, entry: &AppLogEntry) -> Result<(), AppError> {
        dispatch!(self, add_app_log(entry))
    }

    pub async fn has_app_log(&self, app_id: u64, action: LogAction) -> Result<bool, AppError> {
        dispatch!(self, has_app_log(app_id, action))
    }

    // ─── Synced collections ──────────────────────────────────────

    pub async fn get_synced_collection(
        &self,
        addon_index: &str,
    ) -> Result<Option<SyncedCollection>, AppError> {
        dispatch!(self, get_synced_collection(addon_index))
    }

    /// Get the collection for this add-on set, creating it if none exists.
    pub async fn get_or_create_synced_collection(
        &self,
        addon_ids: &[u64],
    ) -> Result<SyncedCollection, AppError> {
        dispatch!(self, get_or_create_synced_collection(addon_ids))
    }

    /// Cache computed recommendations on a collection.
    pub async fn set_collection_recommendations(
        &self,
        addon_index: &str,
        recommended: &[ScoredAddon],
    ) -> Result<(), AppError> {
        dispatch!(self, set_collection_recommendations(addon_index, recommended))
    }

    pub async fn get_collection_token(
        &self,
        token: &str,
    ) -> Result<Option<CollectionToken>, AppError> {
        dispatch!(self, get_collection_token(token))
    }

    /// Point a token at a collection. Re-attaching an existing token is not an error.
    pub async fn attach_token(&self, token: &str, addon_index: &str) -> Result<(), AppError> {
        dispatch!(self, attach_token(token, addon_index))
    }

    pub async fn remove_token(&self, token: &str) -> Result<(), AppError> {
        dispatch!(self, remove_token(token))
    }

    // ─── Recommendation scores ───────────────────────────────────

    pub async fn get_recommendation_sets(
        &self,
        addon_ids: &[u64],
    ) -> Result<Vec<RecommendationSet>, AppError> {
        dispatch!(self, get_recommendation_sets(addon_ids))
    }

    pub async fn upsert_recommendation_set(&self, set: &RecommendationSet) -> Result<(), AppError> {
        dispatch!(self, upsert_recommendation_set(set))
    }
}
