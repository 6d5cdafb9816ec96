// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Receipt issuance.
//!
//! Builds receipt claims for purchases, developer/reviewer installs and
//! developer test receipts, and re-signs expired receipts.

use crate::config::Config;
use crate::models::Addon;
use crate::services::signing::{ReceiptSigner, SigningError};
use crate::time_utils::now_unix;
use serde::{Deserialize, Serialize};

/// Developer and reviewer receipts are short lived.
pub const SHORT_RECEIPT_LIFETIME_SECS: i64 = 60 * 60 * 24;
/// Expired test receipts are backdated by this much.
const EXPIRED_TEST_RECEIPT_AGE_SECS: i64 = 10;

pub const DIRECTED_IDENTIFIER: &str = "directed-identifier";

/// Receipt `typ` claim values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiptType {
    Purchase,
    Developer,
    Reviewer,
    Test,
}

impl ReceiptType {
    pub fn as_str(self) -> &'static str {
        match self {
            ReceiptType::Purchase => "purchase-receipt",
            ReceiptType::Developer => "developer-receipt",
            ReceiptType::Reviewer => "reviewer-receipt",
            ReceiptType::Test => "test-receipt",
        }
    }

    pub fn parse(typ: &str) -> Option<Self> {
        match typ {
            "purchase-receipt" => Some(ReceiptType::Purchase),
            "developer-receipt" => Some(ReceiptType::Developer),
            "reviewer-receipt" => Some(ReceiptType::Reviewer),
            "test-receipt" => Some(ReceiptType::Test),
            _ => None,
        }
    }
}

/// Special receipts handed out by the reviewer tools and to app developers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiptFlavour {
    Developer,
    Reviewer,
}

impl ReceiptFlavour {
    pub fn as_str(self) -> &'static str {
        match self {
            ReceiptFlavour::Developer => "developer",
            ReceiptFlavour::Reviewer => "reviewer",
        }
    }

    fn receipt_type(self) -> ReceiptType {
        match self {
            ReceiptFlavour::Developer => ReceiptType::Developer,
            ReceiptFlavour::Reviewer => ReceiptType::Reviewer,
        }
    }
}

/// Outcome a developer wants a test receipt to verify as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestReceiptStatus {
    Ok,
    Expired,
    Invalid,
    Refunded,
    /// No receipt at all
    None,
}

impl TestReceiptStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            TestReceiptStatus::Ok => "ok",
            TestReceiptStatus::Expired => "expired",
            TestReceiptStatus::Invalid => "invalid",
            TestReceiptStatus::Refunded => "refunded",
            TestReceiptStatus::None => "none",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReceiptProduct {
    /// App origin
    pub url: String,
    /// Form-encoded store data, "id=<app id>"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storedata: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReceiptUser {
    #[serde(rename = "type")]
    pub kind: String,
    pub value: String,
}

/// Receipt claims.
///
/// `product` and `user` are optional on decode so that malformed receipts
/// can be reported with a specific reason rather than a parse failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReceiptClaims {
    pub typ: String,
    pub iss: String,
    pub iat: i64,
    pub nbf: i64,
    pub exp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product: Option<ReceiptProduct>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<ReceiptUser>,
    #[serde(default)]
    pub verify: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reissue: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Builds and signs receipts.
pub struct ReceiptIssuer {
    signer: ReceiptSigner,
    site_url: String,
    receipt_verify_url: String,
    receipt_expiry_seconds: i64,
}

impl ReceiptIssuer {
    pub fn new(config: &Config, signer: ReceiptSigner) -> Self {
        Self {
            signer,
            site_url: config.site_url.clone(),
            receipt_verify_url: config.receipt_verify_url.clone(),
            receipt_expiry_seconds: config.receipt_expiry_seconds,
        }
    }

    pub fn signer(&self) -> &ReceiptSigner {
        &self.signer
    }

    /// Lifetime of a freshly signed receipt of this type.
    pub fn lifetime(&self, typ: ReceiptType) -> i64 {
        match typ {
            ReceiptType::Purchase => self.receipt_expiry_seconds,
            _ => SHORT_RECEIPT_LIFETIME_SECS,
        }
    }

    pub fn reissue_url(&self) -> String {
        format!("{}/api/v1/receipts/reissue", self.site_url)
    }

    pub fn app_verify_url(&self, guid: &str) -> String {
        format!(
            "{}/api/v1/receipts/verify/{}",
            self.site_url,
            urlencoding::encode(guid)
        )
    }

    pub fn test_verify_url(&self, status: TestReceiptStatus) -> String {
        format!(
            "{}/api/v1/receipts/test/verify/{}",
            self.site_url,
            status.as_str()
        )
    }

    fn test_details_url(&self) -> String {
        format!("{}/receipts/test/details", self.site_url)
    }

    /// Claims for an app receipt issued at `now`.
    ///
    /// Without a flavour this is a purchase receipt checked against the
    /// receipt verify service; developer and reviewer receipts are checked
    /// against the per-app verify URL and expire after a day.
    pub fn app_claims(
        &self,
        app: &Addon,
        uuid: &str,
        flavour: Option<ReceiptFlavour>,
        now: i64,
    ) -> ReceiptClaims {
        let (typ, verify) = match flavour {
            Some(flavour) => (flavour.receipt_type(), self.app_verify_url(&app.guid)),
            None => (ReceiptType::Purchase, self.receipt_verify_url.clone()),
        };

        let url = app
            .origin
            .clone()
            .unwrap_or_else(|| format!("{}/app/{}", self.site_url, app.slug));

        ReceiptClaims {
            typ: typ.as_str().to_string(),
            iss: self.site_url.clone(),
            iat: now,
            nbf: now,
            exp: now + self.lifetime(typ),
            product: Some(ReceiptProduct {
                url,
                storedata: Some(format!("id={}", app.id)),
            }),
            user: Some(ReceiptUser {
                kind: DIRECTED_IDENTIFIER.to_string(),
                value: uuid.to_string(),
            }),
            verify,
            reissue: Some(self.reissue_url()),
            detail: Some(format!("{}/purchases/{}", self.site_url, app.id)),
        }
    }

    /// Sign a receipt for an install.
    pub async fn create_receipt(
        &self,
        app: &Addon,
        uuid: &str,
        flavour: Option<ReceiptFlavour>,
    ) -> Result<String, SigningError> {
        let claims = self.app_claims(app, uuid, flavour, now_unix());
        self.signer.sign(&claims).await
    }

    /// Claims for a developer test receipt rooted at `root`.
    pub fn test_claims(&self, root: &str, status: TestReceiptStatus, now: i64) -> ReceiptClaims {
        let exp = if status == TestReceiptStatus::Expired {
            now - EXPIRED_TEST_RECEIPT_AGE_SECS
        } else {
            now + SHORT_RECEIPT_LIFETIME_SECS
        };

        ReceiptClaims {
            typ: ReceiptType::Test.as_str().to_string(),
            iss: self.site_url.clone(),
            iat: now,
            nbf: now,
            exp,
            product: Some(ReceiptProduct {
                url: root.to_string(),
                storedata: Some("id=0".to_string()),
            }),
            user: Some(ReceiptUser {
                kind: DIRECTED_IDENTIFIER.to_string(),
                value: "none".to_string(),
            }),
            verify: self.test_verify_url(status),
            reissue: Some(self.test_details_url()),
            detail: Some(self.test_details_url()),
        }
    }

    pub async fn create_test_receipt(
        &self,
        root: &str,
        status: TestReceiptStatus,
    ) -> Result<String, SigningError> {
        let claims = self.test_claims(root, status, now_unix());
        self.signer.sign(&claims).await
    }

    /// Re-sign previously verified claims with fresh issue and expiry times.
    pub async fn reissue(&self, mut claims: ReceiptClaims) -> Result<String, SigningError> {
        let now = now_unix();
        let lifetime = ReceiptType::parse(&claims.typ)
            .map(|typ| self.lifetime(typ))
            .unwrap_or(self.receipt_expiry_seconds);

        claims.iat = now;
        claims.nbf = now;
        claims.exp = now + lifetime;

        tracing::info!(target: "cef", typ = %claims.typ, "Receipt reissue signing");
        self.signer.sign(&claims).await
    }

    /// Sign arbitrary claims.
    pub async fn sign(&self, claims: &ReceiptClaims) -> Result<String, SigningError> {
        self.signer.sign(claims).await
    }
}
