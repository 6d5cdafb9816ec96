// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Install recording.
//!
//! Three entry points hand out receipts:
//! 1. `record` - the web install button, anonymous or logged in
//! 2. `install` - the REST install endpoint
//! 3. `issue` - reviewer tools, for reviewer and developer receipts

use crate::db::Db;
use crate::error::{AppError, Result};
use crate::models::{Addon, AppLogEntry, ClientData, InstallType, LogAction, PurchaseType};
use crate::services::access::{is_developer, is_reviewer};
use crate::services::receipt::{ReceiptFlavour, ReceiptIssuer};
use crate::time_utils::now_rfc3339;
use serde::Serialize;

/// Shown to the user when the receipt could not be signed.
pub const INSTALL_ERROR_MESSAGE: &str = "There was a problem installing the app.";

/// Result of a web install or a receipt issue.
#[derive(Debug, Clone, Serialize)]
pub struct InstallOutcome {
    /// App ID
    pub addon: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub receipt: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl InstallOutcome {
    fn without_receipt(app: &Addon) -> Self {
        Self {
            addon: app.id,
            receipt: None,
            error: None,
        }
    }
}

pub struct InstallService<'a> {
    db: &'a Db,
    issuer: &'a ReceiptIssuer,
}

impl<'a> InstallService<'a> {
    pub fn new(db: &'a Db, issuer: &'a ReceiptIssuer) -> Self {
        Self { db, issuer }
    }

    /// Record an install from the web install button.
    ///
    /// Logged-out installs are allowed for free public apps, but get no receipt.
    pub async fn record(
        &self,
        app: &Addon,
        user_id: Option<u64>,
        client: ClientData,
    ) -> Result<InstallOutcome> {
        let outcome = match user_id {
            None => {
                if app.is_premium() {
                    return Err(AppError::Unauthorized);
                }
                if !app.is_public() || !app.is_webapp() {
                    return Err(AppError::NotFound(format!("App {} not found", app.id)));
                }
                InstallOutcome::without_receipt(app)
            }
            Some(user_id) => self.record_for_user(app, user_id, client).await?,
        };

        self.db
            .add_app_log(&AppLogEntry {
                app_id: app.id,
                user_id,
                action: LogAction::InstallAddon,
                created: now_rfc3339(),
            })
            .await?;

        tracing::info!(
            target: "metrics",
            event = "install",
            app_id = app.id,
            app_domain = app.domain().as_deref().unwrap_or(""),
            anonymous = user_id.is_none(),
            "App install"
        );

        Ok(outcome)
    }

    async fn record_for_user(
        &self,
        app: &Addon,
        user_id: u64,
        client: ClientData,
    ) -> Result<InstallOutcome> {
        let profile = self.db.get_user(user_id).await?;
        let developer = is_developer(app, user_id, profile.as_ref());
        let reviewer = is_reviewer(profile.as_ref());

        if !app.is_webapp() || (!app.is_public() && !(reviewer || developer)) {
            return Err(AppError::NotFound(format!("App {} not found", app.id)));
        }

        if app.is_premium() && !self.has_purchased(app, user_id).await? && !(reviewer || developer)
        {
            return Err(AppError::Forbidden(format!(
                "App {} has not been purchased",
                app.id
            )));
        }

        // Reviewers get a user receipt here; the reviewer tools issue reviewer receipts.
        let install_type = if developer {
            InstallType::Developer
        } else {
            InstallType::User
        };

        let (mut installed, _) = self
            .db
            .get_or_create_installed(app.id, user_id, install_type)
            .await?;

        installed.client_data = Some(self.known_client_data(client).await?);
        self.db.upsert_installed(&installed).await?;

        tracing::info!(target: "cef", app_id = app.id, user_id, "Receipt requested");

        let (receipt, error) = match self.issuer.create_receipt(app, &installed.uuid, None).await {
            Ok(receipt) => (Some(receipt), None),
            Err(e) => {
                tracing::error!(target: "cef", app_id = app.id, error = %e, "Receipt signing failed");
                (None, Some(INSTALL_ERROR_MESSAGE.to_string()))
            }
        };

        Ok(InstallOutcome {
            addon: app.id,
            receipt,
            error,
        })
    }

    /// REST install: returns a receipt or fails.
    pub async fn install(&self, app: &Addon, user_id: u64) -> Result<String> {
        let profile = self.db.get_user(user_id).await?;

        let receipt = if is_developer(app, user_id, profile.as_ref()) {
            self.install_record(app, user_id, InstallType::Developer)
                .await?
        } else {
            if !app.is_public() {
                tracing::info!(app_id = app.id, "App not public");
                return Err(AppError::Forbidden("App not public.".to_string()));
            }

            if app.is_premium() && !self.has_purchased(app, user_id).await? {
                // Keep receipts for zero-price apps valid if the price changes later.
                if app.is_free_premium() {
                    tracing::info!(app_id = app.id, user_id, "Creating no-charge purchase record");
                    self.db
                        .get_or_create_purchase(app.id, user_id, PurchaseType::NoCharge)
                        .await?;
                } else {
                    tracing::info!(app_id = app.id, user_id, "App not purchased");
                    return Err(AppError::PaymentRequired(
                        "You have not purchased this app.".to_string(),
                    ));
                }
            }

            self.install_record(app, user_id, InstallType::User).await?
        };

        self.db
            .add_app_log(&AppLogEntry {
                app_id: app.id,
                user_id: Some(user_id),
                action: LogAction::InstallAddon,
                created: now_rfc3339(),
            })
            .await?;

        tracing::info!(
            target: "metrics",
            event = "install",
            app_id = app.id,
            app_domain = app.domain().as_deref().unwrap_or(""),
            anonymous = false,
            "App install"
        );

        Ok(receipt)
    }

    async fn install_record(
        &self,
        app: &Addon,
        user_id: u64,
        install_type: InstallType,
    ) -> Result<String> {
        let (installed, created) = self
            .db
            .get_or_create_installed(app.id, user_id, install_type)
            .await?;

        tracing::info!(
            app_id = app.id,
            user_id,
            created,
            "Install record {}",
            if created { "created" } else { "re-used" }
        );

        tracing::info!(target: "cef", app_id = app.id, user_id, "Receipt signing");
        Ok(self.issuer.create_receipt(app, &installed.uuid, None).await?)
    }

    /// Issue a reviewer receipt (reviewers) or developer receipt (authors).
    pub async fn issue(&self, app: &Addon, user_id: u64) -> Result<InstallOutcome> {
        let profile = self.db.get_user(user_id).await?;
        let reviewer = is_reviewer(profile.as_ref());

        let (install_type, flavour) = if reviewer {
            (InstallType::Reviewer, ReceiptFlavour::Reviewer)
        } else if app.has_author(user_id) {
            (InstallType::Developer, ReceiptFlavour::Developer)
        } else {
            return Err(AppError::Forbidden(
                "Only reviewers and developers may issue receipts".to_string(),
            ));
        };

        let (installed, _) = self
            .db
            .get_or_create_installed(app.id, user_id, install_type)
            .await?;

        tracing::info!(
            target: "cef",
            app_id = app.id,
            user_id,
            flavour = flavour.as_str(),
            "Receipt signing for {}",
            flavour.as_str()
        );

        let (receipt, error) = match self
            .issuer
            .create_receipt(app, &installed.uuid, Some(flavour))
            .await
        {
            Ok(receipt) => (Some(receipt), None),
            Err(e) => {
                tracing::error!(target: "cef", app_id = app.id, error = %e, "Receipt signing failed");
                (None, Some(INSTALL_ERROR_MESSAGE.to_string()))
            }
        };

        Ok(InstallOutcome {
            addon: app.id,
            receipt,
            error,
        })
    }

    async fn has_purchased(&self, app: &Addon, user_id: u64) -> Result<bool> {
        Ok(self
            .db
            .get_purchase(app.id, user_id)
            .await?
            .is_some_and(|p| p.is_valid()))
    }

    /// Drop download sources we don't know about.
    async fn known_client_data(&self, mut client: ClientData) -> Result<ClientData> {
        if let Some(source) = client.download_source.take() {
            if self.db.is_download_source(&source).await? {
                client.download_source = Some(source);
            }
        }
        Ok(client)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::db::MemoryDb;
    use crate::models::{AddonPurchase, AddonStatus, AddonType, PremiumType, UserProfile};
    use crate::services::receipt::ReceiptIssuer;
    use crate::services::signing::ReceiptSigner;

    fn issuer() -> ReceiptIssuer {
        let config = Config::test_default();
        let signer = ReceiptSigner::from_config(&config).unwrap();
        ReceiptIssuer::new(&config, signer)
    }

    fn app(premium: PremiumType, price_cents: Option<u64>) -> Addon {
        Addon {
            id: 42,
            guid: "app-guid".to_string(),
            slug: "app".to_string(),
            name: "App".to_string(),
            addon_type: AddonType::Webapp,
            status: AddonStatus::Public,
            premium_type: premium,
            price_cents,
            origin: Some("https://app.example.com".to_string()),
            authors: vec![99],
            compat: None,
        }
    }

    #[tokio::test]
    async fn test_install_reuses_record() {
        let db = Db::Memory(MemoryDb::new());
        let issuer = issuer();
        let service = InstallService::new(&db, &issuer);
        let app = app(PremiumType::Free, None);

        service.install(&app, 1).await.unwrap();
        service.install(&app, 1).await.unwrap();

        let (installed, created) = db
            .get_or_create_installed(42, 1, InstallType::User)
            .await
            .unwrap();
        assert!(!created);
        assert!(installed.uuid.starts_with("42-"));
    }

    #[tokio::test]
    async fn test_install_premium_requires_purchase() {
        let db = Db::Memory(MemoryDb::new());
        let issuer = issuer();
        let service = InstallService::new(&db, &issuer);
        let app = app(PremiumType::Premium, Some(99));

        let err = service.install(&app, 1).await.unwrap_err();
        assert!(matches!(err, AppError::PaymentRequired(_)));

        db.upsert_purchase(&AddonPurchase {
            app_id: 42,
            user_id: 1,
            purchase_type: PurchaseType::Purchase,
            created: now_rfc3339(),
        })
        .await
        .unwrap();
        assert!(service.install(&app, 1).await.is_ok());
    }

    #[tokio::test]
    async fn test_install_zero_price_creates_no_charge_purchase() {
        let db = Db::Memory(MemoryDb::new());
        let issuer = issuer();
        let service = InstallService::new(&db, &issuer);
        let app = app(PremiumType::Premium, Some(0));

        service.install(&app, 1).await.unwrap();

        let purchase = db.get_purchase(42, 1).await.unwrap().unwrap();
        assert_eq!(purchase.purchase_type, PurchaseType::NoCharge);
    }

    #[tokio::test]
    async fn test_install_non_public_allowed_for_author() {
        let db = Db::Memory(MemoryDb::new());
        let issuer = issuer();
        let service = InstallService::new(&db, &issuer);
        let mut app = app(PremiumType::Free, None);
        app.status = AddonStatus::Pending;

        assert!(matches!(
            service.install(&app, 1).await,
            Err(AppError::Forbidden(_))
        ));
        assert!(service.install(&app, 99).await.is_ok());

        let (_, created) = db
            .get_or_create_installed(42, 99, InstallType::Developer)
            .await
            .unwrap();
        assert!(!created);
    }

    #[tokio::test]
    async fn test_record_anonymous() {
        let db = Db::Memory(MemoryDb::new());
        let issuer = issuer();
        let service = InstallService::new(&db, &issuer);

        let outcome = service
            .record(&app(PremiumType::Free, None), None, ClientData::default())
            .await
            .unwrap();
        assert!(outcome.receipt.is_none());
        assert!(db.has_app_log(42, LogAction::InstallAddon).await.unwrap());

        let err = service
            .record(&app(PremiumType::Premium, Some(99)), None, ClientData::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Unauthorized));
    }

    #[tokio::test]
    async fn test_record_drops_unknown_download_source() {
        let db = Db::Memory(MemoryDb::new());
        db.add_download_source("mkt-home").await.unwrap();
        let issuer = issuer();
        let service = InstallService::new(&db, &issuer);
        let app = app(PremiumType::Free, None);

        let client = ClientData {
            download_source: Some("bogus".to_string()),
            ..Default::default()
        };
        let outcome = service.record(&app, Some(1), client).await.unwrap();
        assert!(outcome.receipt.is_some());
        assert!(outcome.error.is_none());

        let (installed, _) = db
            .get_or_create_installed(42, 1, InstallType::User)
            .await
            .unwrap();
        assert_eq!(installed.client_data.unwrap().download_source, None);

        let client = ClientData {
            download_source: Some("mkt-home".to_string()),
            ..Default::default()
        };
        service.record(&app, Some(1), client).await.unwrap();
        let (installed, _) = db
            .get_or_create_installed(42, 1, InstallType::User)
            .await
            .unwrap();
        assert_eq!(
            installed.client_data.unwrap().download_source.as_deref(),
            Some("mkt-home")
        );
    }

    #[tokio::test]
    async fn test_issue_requires_reviewer_or_author() {
        let db = Db::Memory(MemoryDb::new());
        db.upsert_user(&UserProfile {
            id: 5,
            email: None,
            display_name: "Reviewer".to_string(),
            groups: vec!["Apps:Review".to_string()],
        })
        .await
        .unwrap();
        let issuer = issuer();
        let service = InstallService::new(&db, &issuer);
        let app = app(PremiumType::Free, None);

        assert!(matches!(
            service.issue(&app, 1).await,
            Err(AppError::Forbidden(_))
        ));

        let outcome = service.issue(&app, 5).await.unwrap();
        assert!(outcome.receipt.is_some());
        let (_, created) = db
            .get_or_create_installed(42, 5, InstallType::Reviewer)
            .await
            .unwrap();
        assert!(!created);

        assert!(service.issue(&app, 99).await.unwrap().receipt.is_some());
    }
}
