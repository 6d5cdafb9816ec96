// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Data models for the application.

pub mod addon;
pub mod app_log;
pub mod collection;
pub mod install;
pub mod purchase;
pub mod user;

pub use addon::{Addon, AddonStatus, AddonType, Compat, PremiumType};
pub use app_log::{AppLogEntry, LogAction};
pub use collection::{
    make_index, CollectionToken, RecommendationSet, ScoredAddon, SyncedCollection,
};
pub use install::{ClientData, InstallType, Installed};
pub use purchase::{AddonPurchase, PurchaseType};
pub use user::UserProfile;
