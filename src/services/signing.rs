// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Receipt signing.
//!
//! Receipts are EdDSA (Ed25519) JWS tokens. They are either signed locally
//! with a configured PKCS#8 key or sent to a remote signing server, which
//! answers with `{"receipt": "..."}`.

use crate::config::Config;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use ring::signature::{Ed25519KeyPair, KeyPair};
use serde::{Deserialize, Serialize};

/// Signing failures. Callers decide whether this fails the request.
#[derive(Debug, thiserror::Error)]
pub enum SigningError {
    #[error("Invalid signing key: {0}")]
    Key(String),

    #[error("Failed to encode receipt: {0}")]
    Encode(String),

    #[error("Signing server error: {0}")]
    Remote(String),
}

enum SignerMode {
    Local { key: EncodingKey },
    Remote { http: reqwest::Client, sign_url: String },
}

/// Signs receipt claims.
pub struct ReceiptSigner {
    mode: SignerMode,
    key_id: String,
}

#[derive(Deserialize)]
struct RemoteSignResponse {
    receipt: String,
}

impl ReceiptSigner {
    /// Build a signer from configuration: remote if `SIGNING_SERVER` is set, else local.
    pub fn from_config(config: &Config) -> Result<Self, SigningError> {
        if let Some(server) = &config.signing_server {
            return Self::remote(server, config);
        }

        let pkcs8 = config
            .receipt_signing_key
            .as_deref()
            .ok_or_else(|| SigningError::Key("no receipt signing key configured".to_string()))?;
        Self::local(pkcs8, &config.receipt_key_id)
    }

    /// Sign with a local Ed25519 PKCS#8 key.
    pub fn local(pkcs8: &[u8], key_id: &str) -> Result<Self, SigningError> {
        // Parse once up front so a bad key fails at startup, not on first install.
        Ed25519KeyPair::from_pkcs8_maybe_unchecked(pkcs8)
            .map_err(|e| SigningError::Key(e.to_string()))?;

        Ok(Self {
            mode: SignerMode::Local {
                key: EncodingKey::from_ed_der(pkcs8),
            },
            key_id: key_id.to_string(),
        })
    }

    fn remote(server: &str, config: &Config) -> Result<Self, SigningError> {
        let http = reqwest::Client::builder()
            .timeout(config.signing_server_timeout)
            .build()
            .map_err(|e| SigningError::Remote(format!("failed building HTTP client: {}", e)))?;

        tracing::info!(server = %server, "Using remote receipt signing server");

        Ok(Self {
            mode: SignerMode::Remote {
                http,
                sign_url: format!("{}/1.0/sign", server),
            },
            key_id: config.receipt_key_id.clone(),
        })
    }

    pub fn key_id(&self) -> &str {
        &self.key_id
    }

    pub fn is_remote(&self) -> bool {
        matches!(self.mode, SignerMode::Remote { .. })
    }

    /// Sign a set of claims, returning the encoded receipt.
    pub async fn sign<T: Serialize>(&self, claims: &T) -> Result<String, SigningError> {
        match &self.mode {
            SignerMode::Local { key } => {
                let mut header = Header::new(Algorithm::EdDSA);
                header.kid = Some(self.key_id.clone());
                encode(&header, claims, key).map_err(|e| SigningError::Encode(e.to_string()))
            }
            SignerMode::Remote { http, sign_url } => {
                let response = http
                    .post(sign_url)
                    .json(claims)
                    .send()
                    .await
                    .map_err(|e| SigningError::Remote(e.to_string()))?;

                let status = response.status();
                if !status.is_success() {
                    tracing::error!(status = %status, "Signing server rejected receipt");
                    return Err(SigningError::Remote(format!(
                        "signing server returned {}",
                        status
                    )));
                }

                let body: RemoteSignResponse = response
                    .json()
                    .await
                    .map_err(|e| SigningError::Remote(format!("invalid response: {}", e)))?;
                Ok(body.receipt)
            }
        }
    }
}

/// Raw Ed25519 public key used to verify receipts.
///
/// `RECEIPT_VERIFY_KEY` wins; otherwise it is derived from the local signing key.
pub fn verify_key_from_config(config: &Config) -> Result<Vec<u8>, SigningError> {
    if let Some(key) = &config.receipt_verify_key {
        if key.len() != 32 {
            return Err(SigningError::Key(format!(
                "verify key must be 32 bytes, got {}",
                key.len()
            )));
        }
        return Ok(key.clone());
    }

    let pkcs8 = config
        .receipt_signing_key
        .as_deref()
        .ok_or_else(|| SigningError::Key("no receipt verify key configured".to_string()))?;
    public_key_from_pkcs8(pkcs8)
}

/// Extract the raw public key from an Ed25519 PKCS#8 document.
pub fn public_key_from_pkcs8(pkcs8: &[u8]) -> Result<Vec<u8>, SigningError> {
    let pair = Ed25519KeyPair::from_pkcs8_maybe_unchecked(pkcs8)
        .map_err(|e| SigningError::Key(e.to_string()))?;
    Ok(pair.public_key().as_ref().to_vec())
}
