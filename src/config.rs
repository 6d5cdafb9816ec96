// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application configuration loaded from environment variables.
//!
//! Keys are decoded once at startup and kept in memory.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use std::env;
use std::time::Duration;

/// Purchase receipts stay valid for roughly six months.
pub const DEFAULT_RECEIPT_EXPIRY_SECONDS: i64 = 60 * 60 * 24 * 182;
const DEFAULT_SIGNING_TIMEOUT_SECS: u64 = 10;

/// Where persistent state lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DbBackend {
    /// In-process store, optionally seeded from a JSON fixture
    Memory,
    Firestore,
}

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    // --- Environment Variables (non-sensitive) ---
    /// Public site URL, used as receipt issuer and for verify/reissue URLs
    pub site_url: String,
    /// Frontend URL allowed by CORS
    pub frontend_url: String,
    /// Server port
    pub port: u16,
    pub db_backend: DbBackend,
    /// GCP project ID (Firestore backend)
    pub gcp_project_id: String,
    /// JSON fixture loaded into the memory backend at startup
    pub seed_data_path: Option<String>,
    /// Verify URL placed in purchase receipts
    pub receipt_verify_url: String,
    /// Lifetime of purchase receipts
    pub receipt_expiry_seconds: i64,
    /// Key ID placed in the JWS header
    pub receipt_key_id: String,
    /// Remote signing server base URL; local signing when unset
    pub signing_server: Option<String>,
    pub signing_server_timeout: Duration,

    // --- Secrets ---
    /// JWT signing key for session tokens (raw bytes)
    pub jwt_signing_key: Vec<u8>,
    /// Ed25519 PKCS#8 document used for local receipt signing
    pub receipt_signing_key: Option<Vec<u8>>,
    /// Raw Ed25519 public key for receipt verification
    pub receipt_verify_key: Option<Vec<u8>>,
}

impl Config {
    /// Config for tests: memory backend and a freshly generated receipt key.
    pub fn test_default() -> Self {
        use ring::rand::SystemRandom;
        use ring::signature::Ed25519KeyPair;

        let pkcs8 = Ed25519KeyPair::generate_pkcs8(&SystemRandom::new())
            .expect("Failed to generate test receipt key");

        Self {
            site_url: "http://testserver".to_string(),
            frontend_url: "http://localhost:5173".to_string(),
            port: 8080,
            db_backend: DbBackend::Memory,
            gcp_project_id: "test-project".to_string(),
            seed_data_path: None,
            receipt_verify_url: "http://testserver/verify/".to_string(),
            receipt_expiry_seconds: DEFAULT_RECEIPT_EXPIRY_SECONDS,
            receipt_key_id: "test-key".to_string(),
            signing_server: None,
            signing_server_timeout: Duration::from_secs(DEFAULT_SIGNING_TIMEOUT_SECS),
            jwt_signing_key: b"test_jwt_key_32_bytes_minimum!!".to_vec(),
            receipt_signing_key: Some(pkcs8.as_ref().to_vec()),
            receipt_verify_key: None,
        }
    }

    /// Load configuration from environment variables.
    ///
    /// For local development, a `.env` file is read if present.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        let site_url = env::var("SITE_URL")
            .map(|v| v.trim_end_matches('/').to_string())
            .unwrap_or_else(|_| "http://localhost:8080".to_string());

        let db_backend = match env::var("DB_BACKEND").as_deref() {
            Ok("firestore") => DbBackend::Firestore,
            Ok("memory") | Err(_) => DbBackend::Memory,
            Ok(_) => return Err(ConfigError::Invalid("DB_BACKEND")),
        };

        let signing_server = env::var("SIGNING_SERVER")
            .ok()
            .map(|v| v.trim().trim_end_matches('/').to_string())
            .filter(|v| !v.is_empty());

        let receipt_signing_key = optional_base64("RECEIPT_SIGNING_KEY")?;
        let receipt_verify_key = optional_base64("RECEIPT_VERIFY_KEY")?;

        // Remote signing needs a public key to verify against.
        if signing_server.is_some() && receipt_verify_key.is_none() {
            return Err(ConfigError::Missing("RECEIPT_VERIFY_KEY"));
        }
        if signing_server.is_none() && receipt_signing_key.is_none() {
            return Err(ConfigError::Missing("RECEIPT_SIGNING_KEY"));
        }

        Ok(Self {
            receipt_verify_url: env::var("RECEIPT_VERIFY_URL")
                .unwrap_or_else(|_| format!("{}/verify/", site_url)),
            site_url,
            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:5173".to_string()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .unwrap_or(8080),
            db_backend,
            gcp_project_id: env::var("GCP_PROJECT_ID").unwrap_or_else(|_| "local-dev".to_string()),
            seed_data_path: env::var("SEED_DATA_PATH").ok(),
            receipt_expiry_seconds: env::var("RECEIPT_EXPIRY_SECONDS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_RECEIPT_EXPIRY_SECONDS),
            receipt_key_id: env::var("RECEIPT_KEY_ID")
                .unwrap_or_else(|_| "marketplace-receipts".to_string()),
            signing_server,
            signing_server_timeout: Duration::from_secs(
                env::var("SIGNING_SERVER_TIMEOUT_SECS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(DEFAULT_SIGNING_TIMEOUT_SECS),
            ),

            jwt_signing_key: env::var("JWT_SIGNING_KEY")
                .map_err(|_| ConfigError::Missing("JWT_SIGNING_KEY"))?
                .into_bytes(),
            receipt_signing_key,
            receipt_verify_key,
        })
    }

    /// Host of the purchase receipt verify URL.
    pub fn receipt_domain(&self) -> Option<String> {
        host_of(&self.receipt_verify_url)
    }

    /// Host of the site URL.
    pub fn site_domain(&self) -> Option<String> {
        host_of(&self.site_url)
    }
}

/// Host (and explicit port) of a URL.
pub fn host_of(url: &str) -> Option<String> {
    reqwest::Url::parse(url).ok().and_then(|u| {
        u.host_str().map(|host| match u.port() {
            Some(port) => format!("{}:{}", host, port),
            None => host.to_string(),
        })
    })
}

fn optional_base64(name: &'static str) -> Result<Option<Vec<u8>>, ConfigError> {
    match env::var(name) {
        Ok(value) if !value.trim().is_empty() => STANDARD
            .decode(value.trim())
            .map(Some)
            .map_err(|_| ConfigError::Invalid(name)),
        _ => Ok(None),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for environment variable: {0}")]
    Invalid(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_from_env() {
        let key = Config::test_default().receipt_signing_key.unwrap();

        // Set required env vars for test
        env::set_var("JWT_SIGNING_KEY", "test_jwt_key_32_bytes_minimum!!");
        env::set_var("RECEIPT_SIGNING_KEY", STANDARD.encode(&key));
        env::set_var("SITE_URL", "https://marketplace.example.com/");

        let config = Config::from_env().expect("Config should load");

        assert_eq!(config.site_url, "https://marketplace.example.com");
        assert_eq!(
            config.receipt_verify_url,
            "https://marketplace.example.com/verify/"
        );
        assert_eq!(config.receipt_signing_key, Some(key));
        assert_eq!(config.db_backend, DbBackend::Memory);
        assert_eq!(config.port, 8080);
    }

    #[test]
    fn test_domains() {
        let mut config = Config::test_default();
        assert_eq!(config.site_domain().as_deref(), Some("testserver"));

        config.receipt_verify_url = "https://receiptcheck.example.com:8443/verify/".to_string();
        assert_eq!(
            config.receipt_domain().as_deref(),
            Some("receiptcheck.example.com:8443")
        );
    }
}
