// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore client wrapper with typed operations.
//!
//! Document IDs are deterministic where uniqueness matters:
//! - Installs: `{app_id}_{user_id}_{install_type}`
//! - Purchases: `{app_id}_{user_id}`
//! - Synced collections: the add-on index
//! - Collection tokens: the token itself

use crate::db::collections;
use crate::error::AppError;
use crate::models::install::install_doc_id;
use crate::models::purchase::purchase_doc_id;
use crate::models::{
    make_index, Addon, AddonPurchase, AppLogEntry, CollectionToken, InstallType, Installed,
    LogAction, PurchaseType, RecommendationSet, ScoredAddon, SyncedCollection, UserProfile,
};
use crate::time_utils::now_rfc3339;
use futures_util::{stream, StreamExt};
use serde::{Deserialize, Serialize};

const MAX_CONCURRENT_DB_OPS: usize = 50;

/// Marker document for a known download source.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct DownloadSourceDoc {
    name: String,
}

/// Firestore database client.
#[derive(Clone)]
pub struct FirestoreDb {
    client: Option<firestore::FirestoreDb>,
}

impl FirestoreDb {
    /// Create a new Firestore client.
    ///
    /// For local development with emulator, set FIRESTORE_EMULATOR_HOST.
    pub async fn new(project_id: &str) -> Result<Self, AppError> {
        // If the emulator environment variable is set, use unauthenticated connection
        // to avoid local credential warnings and leakage.
        if std::env::var("FIRESTORE_EMULATOR_HOST").is_ok() {
            return Self::create_emulator_client(project_id).await;
        }

        let client = firestore::FirestoreDb::new(project_id)
            .await
            .map_err(|e| AppError::Database(format!("Failed to connect to Firestore: {}", e)))?;

        tracing::info!(project = project_id, "Connected to Firestore");

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a Firestore client for the emulator with unauthenticated access.
    async fn create_emulator_client(project_id: &str) -> Result<Self, AppError> {
        tracing::info!("Using unauthenticated connection for Firestore Emulator");

        let token_source = gcloud_sdk::ExternalJwtFunctionSource::new(|| async {
            Ok(gcloud_sdk::Token {
                token_type: "Bearer".to_string(),
                token: gcloud_sdk::SecretValue::new(
                    "eyJhbGciOiJub25lIn0.eyJ1aWQiOiJ0ZXN0In0."
                        .to_string()
                        .into(),
                ),
                expiry: chrono::Utc::now() + chrono::Duration::hours(1),
            })
        });

        let options = firestore::FirestoreDbOptions::new(project_id.to_string());

        let client = firestore::FirestoreDb::with_options_token_source(
            options,
            gcloud_sdk::GCP_DEFAULT_SCOPES.clone(),
            gcloud_sdk::TokenSourceType::ExternalSource(Box::new(token_source)),
        )
        .await
        .map_err(|e| {
            AppError::Database(format!("Failed to connect to Firestore Emulator: {}", e))
        })?;

        tracing::info!(
            project = project_id,
            "Connected to Firestore (Emulator/Unauthenticated)"
        );

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create an offline client. All database operations return an error.
    pub fn new_mock() -> Self {
        Self { client: None }
    }

    /// Helper to get the client or return an error if offline.
    fn get_client(&self) -> Result<&firestore::FirestoreDb, AppError> {
        self.client
            .as_ref()
            .ok_or_else(|| AppError::Database("Database not connected (offline mode)".to_string()))
    }

    /// Write a whole document.
    async fn put<T>(&self, collection: &str, doc_id: &str, object: &T) -> Result<(), AppError>
    where
        T: Serialize + Sync + Send + for<'de> Deserialize<'de>,
    {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collection)
            .document_id(doc_id)
            .object(object)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// Return the document at `doc_id`, creating it from `make` if missing.
    ///
    /// The bool is true only for the caller whose insert created the document.
    async fn insert_or_get<T, F>(
        &self,
        collection: &str,
        doc_id: &str,
        make: F,
    ) -> Result<(T, bool), AppError>
    where
        T: Serialize + Sync + Send + for<'de> Deserialize<'de>,
        F: FnOnce() -> T,
    {
        let client = self.get_client()?;
        let read = move || async move {
            client
                .fluent()
                .select()
                .by_id_in(collection)
                .obj::<T>()
                .one(doc_id)
                .await
                .map_err(|e| AppError::Database(e.to_string()))
        };

        if let Some(existing) = read().await? {
            return Ok((existing, false));
        }

        let object = make();
        let inserted: Result<T, _> = client
            .fluent()
            .insert()
            .into(collection)
            .document_id(doc_id)
            .object(&object)
            .execute()
            .await;

        match inserted {
            Ok(_) => Ok((object, true)),
            Err(err) => match read().await? {
                Some(existing) => Ok((existing, false)),
                None => Err(AppError::Database(format!(
                    "Failed to create {}/{}: {}",
                    collection, doc_id, err
                ))),
            },
        }
    }

    // ─── Add-ons ─────────────────────────────────────────────────

    pub async fn get_addon(&self, id: u64) -> Result<Option<Addon>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::ADDONS)
            .obj()
            .one(&id.to_string())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    pub async fn get_addon_by_slug(&self, slug: &str) -> Result<Option<Addon>, AppError> {
        let results: Vec<Addon> = self
            .get_client()?
            .fluent()
            .select()
            .from(collections::ADDONS)
            .filter(|q| q.for_all([q.field("slug").eq(slug)]))
            .limit(1)
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(results.into_iter().next())
    }

    pub async fn get_addon_by_guid(&self, guid: &str) -> Result<Option<Addon>, AppError> {
        let results: Vec<Addon> = self
            .get_client()?
            .fluent()
            .select()
            .from(collections::ADDONS)
            .filter(|q| q.for_all([q.field("guid").eq(guid)]))
            .limit(1)
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(results.into_iter().next())
    }

    /// Fetch add-ons by ID with bounded concurrency.
    pub async fn get_addons(&self, ids: &[u64]) -> Result<Vec<Addon>, AppError> {
        let client = self.get_client()?;

        let results = stream::iter(ids.to_vec())
            .map(|id| async move {
                client
                    .fluent()
                    .select()
                    .by_id_in(collections::ADDONS)
                    .obj::<Addon>()
                    .one(&id.to_string())
                    .await
                    .map_err(|e| AppError::Database(e.to_string()))
            })
            .buffer_unordered(MAX_CONCURRENT_DB_OPS)
            .collect::<Vec<Result<Option<Addon>, AppError>>>()
            .await
            .into_iter()
            .collect::<Result<Vec<Option<Addon>>, AppError>>()?;

        Ok(results.into_iter().flatten().collect())
    }

    pub async fn get_addons_by_guids(&self, guids: &[String]) -> Result<Vec<Addon>, AppError> {
        let results = stream::iter(guids.to_vec())
            .map(|guid| async move { self.get_addon_by_guid(&guid).await })
            .buffer_unordered(MAX_CONCURRENT_DB_OPS)
            .collect::<Vec<Result<Option<Addon>, AppError>>>()
            .await
            .into_iter()
            .collect::<Result<Vec<Option<Addon>>, AppError>>()?;

        Ok(results.into_iter().flatten().collect())
    }

    pub async fn upsert_addon(&self, addon: &Addon) -> Result<(), AppError> {
        self.put(collections::ADDONS, &addon.id.to_string(), addon)
            .await
    }

    // ─── Users ───────────────────────────────────────────────────

    pub async fn get_user(&self, id: u64) -> Result<Option<UserProfile>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::USERS)
            .obj()
            .one(&id.to_string())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    pub async fn upsert_user(&self, user: &UserProfile) -> Result<(), AppError> {
        self.put(collections::USERS, &user.id.to_string(), user).await
    }

    // ─── Installs ────────────────────────────────────────────────

    /// Get or create an install record.
    ///
    /// The create is an `insert` on the deterministic document ID, which
    /// fails if the document already exists. A caller that loses the race
    /// re-reads and returns the winner's record.
    pub async fn get_or_create_installed(
        &self,
        app_id: u64,
        user_id: u64,
        install_type: InstallType,
    ) -> Result<(Installed, bool), AppError> {
        let doc_id = install_doc_id(app_id, user_id, install_type);
        let (installed, created) = self
            .insert_or_get(collections::INSTALLS, &doc_id, || {
                Installed::new(app_id, user_id, install_type, now_rfc3339())
            })
            .await?;

        if created {
            tracing::debug!(app_id, user_id, ?install_type, "Install record created");
        }

        Ok((installed, created))
    }

    pub async fn get_installed_by_uuid(&self, uuid: &str) -> Result<Option<Installed>, AppError> {
        let results: Vec<Installed> = self
            .get_client()?
            .fluent()
            .select()
            .from(collections::INSTALLS)
            .filter(|q| q.for_all([q.field("uuid").eq(uuid)]))
            .limit(1)
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(results.into_iter().next())
    }

    pub async fn upsert_installed(&self, installed: &Installed) -> Result<(), AppError> {
        self.put(collections::INSTALLS, &installed.doc_id(), installed)
            .await
    }

    // ─── Purchases ───────────────────────────────────────────────

    pub async fn get_purchase(
        &self,
        app_id: u64,
        user_id: u64,
    ) -> Result<Option<AddonPurchase>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::PURCHASES)
            .obj()
            .one(&purchase_doc_id(app_id, user_id))
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    pub async fn get_or_create_purchase(
        &self,
        app_id: u64,
        user_id: u64,
        purchase_type: PurchaseType,
    ) -> Result<(AddonPurchase, bool), AppError> {
        let doc_id = purchase_doc_id(app_id, user_id);
        self.insert_or_get(collections::PURCHASES, &doc_id, || AddonPurchase {
            app_id,
            user_id,
            purchase_type,
            created: now_rfc3339(),
        })
        .await
    }

    pub async fn upsert_purchase(&self, purchase: &AddonPurchase) -> Result<(), AppError> {
        self.put(collections::PURCHASES, &purchase.doc_id(), purchase)
            .await
    }

    // ─── Download sources ────────────────────────────────────────

    pub async fn is_download_source(&self, name: &str) -> Result<bool, AppError> {
        let doc: Option<DownloadSourceDoc> = self
            .get_client()?
            .fluent()
            .select()
            .by_id_in(collections::DOWNLOAD_SOURCES)
            .obj()
            .one(&urlencoding::encode(name).into_owned())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(doc.is_some())
    }

    pub async fn add_download_source(&self, name: &str) -> Result<(), AppError> {
        let doc = DownloadSourceDoc {
            name: name.to_string(),
        };
        self.put(
            collections::DOWNLOAD_SOURCES,
            &urlencoding::encode(name),
            &doc,
        )
        .await
    }

    // ─── App activity log ────────────────────────────────────────

    pub async fn add_app_log(&self, entry: &AppLogEntry) -> Result<(), AppError> {
        let doc_id = format!(
            "{}_{}_{}",
            entry.app_id,
            entry.action.as_str(),
            uuid::Uuid::new_v4()
        );
        self.put(collections::APP_LOG, &doc_id, entry).await
    }

    pub async fn has_app_log(&self, app_id: u64, action: LogAction) -> Result<bool, AppError> {
        let results: Vec<AppLogEntry> = self
            .get_client()?
            .fluent()
            .select()
            .from(collections::APP_LOG)
            .filter(move |q| {
                q.for_all([
                    q.field("app_id").eq(app_id),
                    q.field("action").eq(action.as_str()),
                ])
            })
            .limit(1)
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(!results.is_empty())
    }

    // ─── Synced collections ──────────────────────────────────────

    pub async fn get_synced_collection(
        &self,
        addon_index: &str,
    ) -> Result<Option<SyncedCollection>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::SYNCED_COLLECTIONS)
            .obj()
            .one(addon_index)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    pub async fn get_or_create_synced_collection(
        &self,
        addon_ids: &[u64],
    ) -> Result<SyncedCollection, AppError> {
        let index = make_index(addon_ids);
        if let Some(existing) = self.get_synced_collection(&index).await? {
            return Ok(existing);
        }

        // Two clients creating the same set write identical documents.
        let collection = SyncedCollection::new(addon_ids, now_rfc3339());
        self.put(collections::SYNCED_COLLECTIONS, &index, &collection)
            .await?;
        tracing::debug!(addon_index = %index, count = collection.addon_ids.len(), "Synced collection created");
        Ok(collection)
    }

    pub async fn set_collection_recommendations(
        &self,
        addon_index: &str,
        recommended: &[ScoredAddon],
    ) -> Result<(), AppError> {
        let mut collection = self
            .get_synced_collection(addon_index)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!("Synced collection {} not found", addon_index))
            })?;
        collection.recommended = Some(recommended.to_vec());
        self.put(collections::SYNCED_COLLECTIONS, addon_index, &collection)
            .await
    }

    pub async fn get_collection_token(
        &self,
        token: &str,
    ) -> Result<Option<CollectionToken>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::COLLECTION_TOKENS)
            .obj()
            .one(token)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    pub async fn attach_token(&self, token: &str, addon_index: &str) -> Result<(), AppError> {
        let doc = CollectionToken {
            token: token.to_string(),
            addon_index: addon_index.to_string(),
        };
        self.put(collections::COLLECTION_TOKENS, token, &doc).await
    }

    pub async fn remove_token(&self, token: &str) -> Result<(), AppError> {
        self.get_client()?
            .fluent()
            .delete()
            .from(collections::COLLECTION_TOKENS)
            .document_id(token)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    // ─── Recommendation scores ───────────────────────────────────

    pub async fn get_recommendation_sets(
        &self,
        addon_ids: &[u64],
    ) -> Result<Vec<RecommendationSet>, AppError> {
        let client = self.get_client()?;

        let results = stream::iter(addon_ids.to_vec())
            .map(|id| async move {
                client
                    .fluent()
                    .select()
                    .by_id_in(collections::RECOMMENDATIONS)
                    .obj::<RecommendationSet>()
                    .one(&id.to_string())
                    .await
                    .map_err(|e| AppError::Database(e.to_string()))
            })
            .buffer_unordered(MAX_CONCURRENT_DB_OPS)
            .collect::<Vec<Result<Option<RecommendationSet>, AppError>>>()
            .await
            .into_iter()
            .collect::<Result<Vec<Option<RecommendationSet>>, AppError>>()?;

        Ok(results.into_iter().flatten().collect())
    }

    pub async fn upsert_recommendation_set(&self, set: &RecommendationSet) -> Result<(), AppError> {
        self.put(collections::RECOMMENDATIONS, &set.addon_id.to_string(), set)
            .await
    }
}
