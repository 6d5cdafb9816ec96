// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod access;
pub mod install;
pub mod receipt;
pub mod recommendations;
pub mod signing;
pub mod verify;

pub use install::{InstallOutcome, InstallService};
pub use receipt::{ReceiptIssuer, TestReceiptStatus};
pub use recommendations::{RecommendationResponse, RecommendationService};
pub use signing::{ReceiptSigner, SigningError};
pub use verify::{ReceiptVerifier, VerifyOutput, VerifyStatus};
