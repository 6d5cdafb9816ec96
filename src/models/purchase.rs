// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Purchase records for premium apps.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PurchaseType {
    Purchase,
    /// Created automatically when a zero-price premium app is installed
    NoCharge,
    Refund,
    Chargeback,
    Pending,
}

/// Purchase of an app by a user. Unique per (app, user).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddonPurchase {
    pub app_id: u64,
    pub user_id: u64,
    pub purchase_type: PurchaseType,
    pub created: String,
}

impl AddonPurchase {
    pub fn doc_id(&self) -> String {
        purchase_doc_id(self.app_id, self.user_id)
    }

    /// Whether this record entitles the user to the app.
    pub fn is_valid(&self) -> bool {
        matches!(
            self.purchase_type,
            PurchaseType::Purchase | PurchaseType::NoCharge
        )
    }

    pub fn is_refunded(&self) -> bool {
        matches!(
            self.purchase_type,
            PurchaseType::Refund | PurchaseType::Chargeback
        )
    }
}

pub fn purchase_doc_id(app_id: u64, user_id: u64) -> String {
    format!("{}_{}", app_id, user_id)
}
