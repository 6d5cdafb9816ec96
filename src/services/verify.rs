// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Receipt verification.
//!
//! Verification never fails the request: every problem with the receipt is
//! reported as a `VerifyOutput` with a status and, for invalid receipts, a
//! reason code. Only storage failures surface as errors.

use crate::config::{host_of, Config};
use crate::db::Db;
use crate::error::AppError;
use crate::services::receipt::{ReceiptClaims, ReceiptType, DIRECTED_IDENTIFIER};
use crate::services::signing::{verify_key_from_config, SigningError};
use crate::time_utils::now_unix;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerifyStatus {
    Ok,
    Invalid,
    Expired,
    Refunded,
}

/// Why a receipt is invalid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum InvalidReason {
    /// Undecodable or bad signature
    #[error("INVALID")]
    Invalid,
    #[error("WRONG_TYPE")]
    WrongType,
    #[error("WRONG_DOMAIN")]
    WrongDomain,
    #[error("NO_STOREDATA")]
    NoStoredata,
    #[error("WRONG_STOREDATA")]
    WrongStoredata,
    #[error("NO_DIRECTED_IDENTIFIER")]
    NoDirectedIdentifier,
    #[error("NO_USER")]
    NoUser,
    #[error("NO_PURCHASE")]
    NoPurchase,
    #[error("WRONG_PURCHASE")]
    WrongPurchase,
}

/// Verification result returned to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerifyOutput {
    pub status: VerifyStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl VerifyOutput {
    pub fn ok() -> Self {
        Self {
            status: VerifyStatus::Ok,
            reason: None,
        }
    }

    pub fn expired() -> Self {
        Self {
            status: VerifyStatus::Expired,
            reason: None,
        }
    }

    pub fn refunded() -> Self {
        Self {
            status: VerifyStatus::Refunded,
            reason: None,
        }
    }

    pub fn invalid(reason: InvalidReason) -> Self {
        Self {
            status: VerifyStatus::Invalid,
            reason: Some(reason.to_string()),
        }
    }
}

/// Result of checking a developer or reviewer receipt.
#[derive(Debug, Clone)]
pub struct Verified {
    pub output: VerifyOutput,
    /// Owner of the install the receipt was issued for, if known
    pub user_id: Option<u64>,
}

enum CheckFailure {
    Invalid(InvalidReason),
    Refunded,
    Db(AppError),
}

impl From<InvalidReason> for CheckFailure {
    fn from(reason: InvalidReason) -> Self {
        CheckFailure::Invalid(reason)
    }
}

impl From<AppError> for CheckFailure {
    fn from(err: AppError) -> Self {
        CheckFailure::Db(err)
    }
}

/// Verifies receipts signed by the configured key.
pub struct ReceiptVerifier {
    decoding_key: DecodingKey,
    public_key: Vec<u8>,
    key_id: String,
    receipt_domain: Option<String>,
    site_domain: Option<String>,
}

impl ReceiptVerifier {
    pub fn new(
        public_key: Vec<u8>,
        key_id: &str,
        receipt_domain: Option<String>,
        site_domain: Option<String>,
    ) -> Self {
        Self {
            decoding_key: DecodingKey::from_ed_der(&public_key),
            public_key,
            key_id: key_id.to_string(),
            receipt_domain,
            site_domain,
        }
    }

    pub fn from_config(config: &Config) -> Result<Self, SigningError> {
        Ok(Self::new(
            verify_key_from_config(config)?,
            &config.receipt_key_id,
            config.receipt_domain(),
            config.site_domain(),
        ))
    }

    /// Raw Ed25519 public key.
    pub fn public_key(&self) -> &[u8] {
        &self.public_key
    }

    pub fn key_id(&self) -> &str {
        &self.key_id
    }

    /// Check the signature and parse the claims. Expiry is not checked here.
    ///
    /// Receipts may carry a certificate prefix ("cert~receipt"); only the
    /// last segment is the receipt.
    pub fn decode(&self, raw: &str) -> Result<ReceiptClaims, InvalidReason> {
        let token = raw.trim().rsplit('~').next().unwrap_or_default();

        let mut validation = Validation::new(Algorithm::EdDSA);
        validation.validate_exp = false;
        validation.validate_aud = false;
        validation.required_spec_claims.clear();

        decode::<ReceiptClaims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| {
                tracing::info!(error = %e, "Receipt failed to decode");
                InvalidReason::Invalid
            })
    }

    /// Full check for purchase receipts, including the purchase state.
    pub async fn check_full(&self, raw: &str, db: &Db) -> Result<VerifyOutput, AppError> {
        self.check_full_at(raw, db, now_unix()).await
    }

    pub async fn check_full_at(
        &self,
        raw: &str,
        db: &Db,
        now: i64,
    ) -> Result<VerifyOutput, AppError> {
        match self.check_purchase_receipt(raw, db).await {
            Ok(claims) => Ok(ok_or_expired(&claims, now)),
            Err(CheckFailure::Invalid(reason)) => {
                tracing::info!(reason = %reason, "Invalid receipt");
                Ok(VerifyOutput::invalid(reason))
            }
            Err(CheckFailure::Refunded) => {
                tracing::info!("Valid receipt, but refunded");
                Ok(VerifyOutput::refunded())
            }
            Err(CheckFailure::Db(err)) => Err(err),
        }
    }

    async fn check_purchase_receipt(
        &self,
        raw: &str,
        db: &Db,
    ) -> Result<ReceiptClaims, CheckFailure> {
        let claims = self.decode(raw)?;
        check_type(&claims, &[ReceiptType::Purchase])?;
        check_url(&claims, self.receipt_domain.as_deref())?;

        let app_id = app_id_from_storedata(&claims)?;
        let uuid = directed_identifier(&claims)?;

        let app = db
            .get_addon(app_id)
            .await?
            .ok_or(InvalidReason::WrongStoredata)?;

        let installed = db
            .get_installed_by_uuid(uuid)
            .await?
            .filter(|i| i.app_id == app_id)
            .ok_or(InvalidReason::NoUser)?;

        if !app.is_premium() {
            return Ok(claims);
        }

        let purchase = db
            .get_purchase(app_id, installed.user_id)
            .await?
            .ok_or(InvalidReason::NoPurchase)?;

        if purchase.is_refunded() {
            return Err(CheckFailure::Refunded);
        }
        if !purchase.is_valid() {
            return Err(InvalidReason::WrongPurchase.into());
        }

        Ok(claims)
    }

    /// Check a developer or reviewer receipt. No purchase is required.
    pub async fn check_without_purchase(&self, raw: &str, db: &Db) -> Result<Verified, AppError> {
        let claims = match self.decode(raw).and_then(|claims| {
            check_type(&claims, &[ReceiptType::Developer, ReceiptType::Reviewer])?;
            check_url(&claims, self.site_domain.as_deref())?;
            Ok(claims)
        }) {
            Ok(claims) => claims,
            Err(reason) => {
                tracing::info!(reason = %reason, "Invalid developer/reviewer receipt");
                return Ok(Verified {
                    output: VerifyOutput::invalid(reason),
                    user_id: None,
                });
            }
        };

        let user_id = match directed_identifier(&claims) {
            Ok(uuid) => db.get_installed_by_uuid(uuid).await?.map(|i| i.user_id),
            Err(_) => None,
        };

        Ok(Verified {
            output: ok_or_expired(&claims, now_unix()),
            user_id,
        })
    }

    /// Check a test receipt, answering with the status the developer asked for.
    ///
    /// Only `invalid`, `refunded` and `expired` force an answer; any other
    /// status reports the receipt as it stands.
    pub fn check_without_db(&self, raw: &str, status: &str) -> VerifyOutput {
        let claims = match self.decode(raw).and_then(|claims| {
            check_type(&claims, &[ReceiptType::Test])?;
            check_url(&claims, self.site_domain.as_deref())?;
            Ok(claims)
        }) {
            Ok(claims) => claims,
            Err(reason) => return VerifyOutput::invalid(reason),
        };

        match status {
            "invalid" => VerifyOutput::invalid(InvalidReason::Invalid),
            "refunded" => VerifyOutput::refunded(),
            "expired" => VerifyOutput::expired(),
            _ => ok_or_expired(&claims, now_unix()),
        }
    }
}

fn ok_or_expired(claims: &ReceiptClaims, now: i64) -> VerifyOutput {
    if claims.exp < now {
        VerifyOutput::expired()
    } else {
        VerifyOutput::ok()
    }
}

fn check_type(claims: &ReceiptClaims, allowed: &[ReceiptType]) -> Result<(), InvalidReason> {
    match ReceiptType::parse(&claims.typ) {
        Some(typ) if allowed.contains(&typ) => Ok(()),
        _ => Err(InvalidReason::WrongType),
    }
}

fn check_url(claims: &ReceiptClaims, expected_domain: Option<&str>) -> Result<(), InvalidReason> {
    match (host_of(&claims.verify), expected_domain) {
        (Some(host), Some(expected)) if host == expected => Ok(()),
        _ => Err(InvalidReason::WrongDomain),
    }
}

/// App ID from the form-encoded product store data.
fn app_id_from_storedata(claims: &ReceiptClaims) -> Result<u64, InvalidReason> {
    let storedata = claims
        .product
        .as_ref()
        .and_then(|p| p.storedata.as_deref())
        .ok_or(InvalidReason::NoStoredata)?;

    storedata
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(key, _)| *key == "id")
        .and_then(|(_, value)| urlencoding::decode(value).ok())
        .and_then(|value| value.parse().ok())
        .ok_or(InvalidReason::WrongStoredata)
}

fn directed_identifier(claims: &ReceiptClaims) -> Result<&str, InvalidReason> {
    match &claims.user {
        Some(user) if user.kind == DIRECTED_IDENTIFIER => Ok(&user.value),
        _ => Err(InvalidReason::NoDirectedIdentifier),
    }
}
