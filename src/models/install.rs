// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Install records. One per (app, user, install type).

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Who an install (and its receipt) is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstallType {
    User,
    Reviewer,
    Developer,
}

impl InstallType {
    pub fn as_u8(self) -> u8 {
        match self {
            InstallType::User => 0,
            InstallType::Reviewer => 1,
            InstallType::Developer => 2,
        }
    }
}

/// Client details captured when an app is installed from the web.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClientData {
    /// Known download source name (unknown sources are dropped)
    pub download_source: Option<String>,
    pub device_type: String,
    pub user_agent: String,
    pub is_chromeless: bool,
    pub language: String,
    pub region: String,
}

/// An install record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Installed {
    pub app_id: u64,
    pub user_id: u64,
    pub install_type: InstallType,
    /// Directed identifier placed in receipts. Fixed at creation.
    pub uuid: String,
    /// When the record was created (ISO 8601)
    pub created: String,
    #[serde(default)]
    pub client_data: Option<ClientData>,
}

impl Installed {
    pub fn new(app_id: u64, user_id: u64, install_type: InstallType, created: String) -> Self {
        Self {
            app_id,
            user_id,
            install_type,
            uuid: format!("{}-{}", app_id, Uuid::new_v4()),
            created,
            client_data: None,
        }
    }

    /// Document ID: unique per (app, user, install type).
    pub fn doc_id(&self) -> String {
        install_doc_id(self.app_id, self.user_id, self.install_type)
    }
}

pub fn install_doc_id(app_id: u64, user_id: u64, install_type: InstallType) -> String {
    format!("{}_{}_{}", app_id, user_id, install_type.as_u8())
}
