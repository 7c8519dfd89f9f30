//! Client configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `MARKETLANE_API_BASE_URL` - Base URL of the marketplace API
//!
//! ## Optional
//! - `MARKETLANE_API_TOKEN` - Bearer token for the signed-in user
//! - `MARKETLANE_REQUEST_TIMEOUT_SECS` - Timeout for reads (default: 30)
//! - `MARKETLANE_SUBMIT_TIMEOUT_SECS` - Timeout for refund submission (default: 20)
//! - `MARKETLANE_KEEP_ITEM_CAP_PERCENT` - Keep-item refund cap (default: 70)
//! - `MARKETLANE_FEE_BANK` - Bank transfer fee (default: 50)
//! - `MARKETLANE_FEE_REMITTANCE` - Remittance fee (default: 50)
//! - `MARKETLANE_FEE_WALLET` - E-wallet fee (default: 10)

use std::time::Duration;

use marketlane_core::RefundPolicy;
use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;
use url::Url;

const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
const DEFAULT_SUBMIT_TIMEOUT_SECS: u64 = 20;

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "placeholder",
    "example",
    "xxx",
    "todo",
    "insert",
    "put-your",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Marketplace API client configuration.
///
/// Implements `Debug` manually to redact the token.
#[derive(Clone)]
pub struct ClientConfig {
    /// API base URL, always ending in `/`
    pub base_url: Url,
    /// Bearer token for the signed-in user
    pub api_token: Option<SecretString>,
    /// Timeout for order and refund reads
    pub request_timeout: Duration,
    /// Timeout for a refund submission, after which the workflow fails
    pub submit_timeout: Duration,
    /// Refund cap and fee schedule
    pub refund_policy: RefundPolicy,
}

impl std::fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConfig")
            .field("base_url", &self.base_url.as_str())
            .field("api_token", &self.api_token.as_ref().map(|_| "[REDACTED]"))
            .field("request_timeout", &self.request_timeout)
            .field("submit_timeout", &self.submit_timeout)
            .field("refund_policy", &self.refund_policy)
            .finish()
    }
}

impl ClientConfig {
    /// Configuration with defaults for everything but the base URL.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidEnvVar` if `base_url` is not an absolute
    /// http(s) URL.
    pub fn new(base_url: &str) -> Result<Self, ConfigError> {
        Ok(Self {
            base_url: parse_base_url("MARKETLANE_API_BASE_URL", base_url)?,
            api_token: None,
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            submit_timeout: Duration::from_secs(DEFAULT_SUBMIT_TIMEOUT_SECS),
            refund_policy: RefundPolicy::default(),
        })
    }

    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the base URL is missing or any variable is
    /// malformed.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Same as [`ClientConfig::from_env`].
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let env = Env(lookup);

        let base_url = env.required("MARKETLANE_API_BASE_URL")?;
        let mut config = Self::new(&base_url)?;

        config.api_token = env.secret("MARKETLANE_API_TOKEN")?;
        config.request_timeout = Duration::from_secs(
            env.parsed("MARKETLANE_REQUEST_TIMEOUT_SECS", DEFAULT_REQUEST_TIMEOUT_SECS)?,
        );
        config.submit_timeout = Duration::from_secs(
            env.parsed("MARKETLANE_SUBMIT_TIMEOUT_SECS", DEFAULT_SUBMIT_TIMEOUT_SECS)?,
        );

        let defaults = RefundPolicy::default();
        let cap_percent = env.parsed(
            "MARKETLANE_KEEP_ITEM_CAP_PERCENT",
            defaults.keep_item_cap * Decimal::ONE_HUNDRED,
        )?;
        if cap_percent < Decimal::ZERO || cap_percent > Decimal::ONE_HUNDRED {
            return Err(ConfigError::InvalidEnvVar(
                "MARKETLANE_KEEP_ITEM_CAP_PERCENT".to_string(),
                format!("must be between 0 and 100 (got {cap_percent})"),
            ));
        }
        config.refund_policy = RefundPolicy {
            keep_item_cap: cap_percent / Decimal::ONE_HUNDRED,
            bank_fee: env.fee("MARKETLANE_FEE_BANK", defaults.bank_fee)?,
            remittance_fee: env.fee("MARKETLANE_FEE_REMITTANCE", defaults.remittance_fee)?,
            wallet_fee: env.fee("MARKETLANE_FEE_WALLET", defaults.wallet_fee)?,
        };

        Ok(config)
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

struct Env<F>(F);

impl<F: Fn(&str) -> Option<String>> Env<F> {
    /// Get an optional variable, treating blank as unset.
    fn optional(&self, key: &str) -> Option<String> {
        (self.0)(key)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    }

    /// Get a required variable.
    fn required(&self, key: &str) -> Result<String, ConfigError> {
        self.optional(key)
            .ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))
    }

    /// Get an optional secret, rejecting obvious placeholders.
    fn secret(&self, key: &str) -> Result<Option<SecretString>, ConfigError> {
        let Some(value) = self.optional(key) else {
            return Ok(None);
        };
        let secret = SecretString::from(value);
        validate_not_placeholder(&secret, key)?;
        Ok(Some(secret))
    }

    /// Parse a variable, falling back to `default` when unset.
    fn parsed<T>(&self, key: &str, default: T) -> Result<T, ConfigError>
    where
        T: std::str::FromStr,
        T::Err: std::fmt::Display,
    {
        self.optional(key).map_or(Ok(default), |raw| {
            raw.parse::<T>()
                .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
        })
    }

    /// Parse a non-negative fee.
    fn fee(&self, key: &str, default: Decimal) -> Result<Decimal, ConfigError> {
        let fee: Decimal = self.parsed(key, default)?;
        if fee.is_sign_negative() {
            return Err(ConfigError::InvalidEnvVar(
                key.to_string(),
                format!("must not be negative (got {fee})"),
            ));
        }
        Ok(fee)
    }
}

/// Parse and normalise the API base URL so relative joins keep its path.
fn parse_base_url(key: &str, raw: &str) -> Result<Url, ConfigError> {
    let mut url =
        Url::parse(raw.trim()).map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidEnvVar(
            key.to_string(),
            format!("unsupported scheme '{}'", url.scheme()),
        ));
    }
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

/// Reject tokens that were obviously never filled in.
fn validate_not_placeholder(secret: &SecretString, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.expose_secret().to_lowercase();
    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InvalidEnvVar(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }
    Ok(())
}
