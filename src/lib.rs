// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Marketplace receipts: install receipts and discovery recommendations
//!
//! This crate provides the backend API that records app installs, signs
//! and verifies install receipts, and recommends add-ons to discovery
//! clients based on the add-ons they already have.

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod time_utils;

use config::Config;
use db::Db;
use services::{ReceiptIssuer, ReceiptSigner, ReceiptVerifier, SigningError};

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub db: Db,
    pub issuer: ReceiptIssuer,
    pub verifier: ReceiptVerifier,
}

impl AppState {
    /// Build the receipt signer and verifier from configuration.
    pub fn new(config: Config, db: Db) -> Result<Self, SigningError> {
        let signer = ReceiptSigner::from_config(&config)?;
        let issuer = ReceiptIssuer::new(&config, signer);
        let verifier = ReceiptVerifier::from_config(&config)?;

        Ok(Self {
            config,
            db,
            issuer,
            verifier,
        })
    }
}
