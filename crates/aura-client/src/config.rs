//! # Client Configuration
//!
//! Configuration for the API client, payment widget, pricing rules and
//! local storage.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     AURA_API_URL=https://shop.example.com/api                          │
//! │     AURA_PAYMENT_PUBLIC_KEY=pk_live_...                                │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/aura-storefront/client.toml (Linux)                      │
//! │     ~/Library/Application Support/com.aura.storefront/client.toml      │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! [api]
//! base_url = "https://shop.example.com/api"
//! timeout_secs = 30
//! login_route = "/login"
//!
//! [payment]
//! public_key = "pk_test_xxx"
//! currency = "NGN"
//!
//! [pricing]
//! bundle_fee = 3000
//!
//! [pricing.consumer]
//! max_bottles = 10
//! max_bundles = 2
//!
//! [storage]
//! data_dir = "/var/lib/aura"
//! ```

use std::path::PathBuf;

use aura_core::PricingRules;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use url::Url;

use crate::error::{ClientError, ClientResult};

// =============================================================================
// API Settings
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiSettings {
    /// Base URL including the `/api` prefix.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Per-request timeout (seconds).
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Route the UI is sent to when the session cannot be refreshed.
    #[serde(default = "default_login_route")]
    pub login_route: String,
}

fn default_base_url() -> String {
    "http://localhost:5000/api".to_string()
}

fn default_timeout() -> u64 {
    30
}

fn default_login_route() -> String {
    "/login".to_string()
}

impl Default for ApiSettings {
    fn default() -> Self {
        ApiSettings {
            base_url: default_base_url(),
            timeout_secs: default_timeout(),
            login_route: default_login_route(),
        }
    }
}

// =============================================================================
// Payment Settings
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentSettings {
    /// Public key handed to the payment widget. Not a secret.
    #[serde(default)]
    pub public_key: String,

    #[serde(default = "default_currency")]
    pub currency: String,
}

fn default_currency() -> String {
    "NGN".to_string()
}

impl Default for PaymentSettings {
    fn default() -> Self {
        PaymentSettings {
            public_key: String::new(),
            currency: default_currency(),
        }
    }
}

// =============================================================================
// Storage Settings
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageSettings {
    /// Overrides the platform data directory.
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
}

// =============================================================================
// Main Configuration
// =============================================================================

/// Complete client configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClientConfig {
    #[serde(default)]
    pub api: ApiSettings,

    #[serde(default)]
    pub payment: PaymentSettings,

    #[serde(default)]
    pub pricing: PricingRules,

    #[serde(default)]
    pub storage: StorageSettings,
}

impl ClientConfig {
    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (client.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> ClientResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading client config from file");
                let contents = std::fs::read_to_string(&path).map_err(|e| {
                    ClientError::Config(format!("cannot read {}: {}", path.display(), e))
                })?;
                config = toml::from_str(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Loads config or returns default if load fails.
    pub fn load_or_default(config_path: Option<PathBuf>) -> Self {
        Self::load(config_path).unwrap_or_else(|e| {
            warn!("Failed to load client config: {}. Using defaults.", e);
            Self::default()
        })
    }

    /// Saves configuration to file.
    pub fn save(&self, config_path: Option<PathBuf>) -> ClientResult<()> {
        let path = config_path
            .or_else(Self::default_config_path)
            .ok_or_else(|| ClientError::Config("no config path available".into()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| ClientError::Config(format!("cannot create {}: {}", parent.display(), e)))?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&path, contents)
            .map_err(|e| ClientError::Config(format!("cannot write {}: {}", path.display(), e)))?;

        info!(?path, "Client config saved");
        Ok(())
    }

    /// Validates the configuration.
    pub fn validate(&self) -> ClientResult<()> {
        let url = Url::parse(&self.api.base_url)?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ClientError::Config(format!(
                "API URL must start with http:// or https://, got: {}",
                self.api.base_url
            )));
        }

        if self.api.timeout_secs == 0 {
            return Err(ClientError::Config("timeout_secs must be greater than 0".into()));
        }

        if !self.api.login_route.starts_with('/') {
            return Err(ClientError::Config("login_route must start with '/'".into()));
        }

        if self.pricing.bundle_fee.is_negative()
            || self.pricing.one_bottle_fee.is_negative()
            || self.pricing.two_bottle_fee.is_negative()
            || self.pricing.few_bottle_fee.is_negative()
        {
            return Err(ClientError::Config("delivery fees cannot be negative".into()));
        }

        Ok(())
    }

    /// Applies `AURA_*` environment variable overrides.
    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup("AURA_API_URL") {
            debug!(url = %url, "Overriding API URL from environment");
            self.api.base_url = url;
        }

        if let Some(timeout) = lookup("AURA_API_TIMEOUT_SECS") {
            match timeout.parse::<u64>() {
                Ok(secs) => self.api.timeout_secs = secs,
                Err(_) => warn!(value = %timeout, "Ignoring invalid AURA_API_TIMEOUT_SECS"),
            }
        }

        if let Some(key) = lookup("AURA_PAYMENT_PUBLIC_KEY") {
            self.payment.public_key = key;
        }

        if let Some(dir) = lookup("AURA_DATA_DIR") {
            debug!(dir = %dir, "Overriding data directory from environment");
            self.storage.data_dir = Some(PathBuf::from(dir));
        }
    }

    /// Returns the default config file path.
    fn default_config_path() -> Option<PathBuf> {
        project_dirs().map(|dirs| dirs.config_dir().join("client.toml"))
    }

    /// Directory for the file store: the configured override, else the
    /// platform data directory.
    pub fn data_dir(&self) -> ClientResult<PathBuf> {
        if let Some(dir) = &self.storage.data_dir {
            return Ok(dir.clone());
        }
        project_dirs()
            .map(|dirs| dirs.data_dir().to_path_buf())
            .ok_or_else(|| ClientError::Config("could not determine app data directory".into()))
    }
}

fn project_dirs() -> Option<directories::ProjectDirs> {
    directories::ProjectDirs::from("com", "aura", "storefront")
}

#[cfg(test)]
mod tests {
    use super::*;
    use aura_core::Money;
    use std::collections::HashMap;

    #[test]
    fn test_default_config() {
        let config = ClientConfig::default();
        assert_eq!(config.api.timeout_secs, 30);
        assert_eq!(config.api.login_route, "/login");
        assert_eq!(config.pricing.bundle_fee, Money::from_major(3_000));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config: ClientConfig = toml::from_str(
            r#"
            [api]
            base_url = "https://shop.example.com/api"

            [pricing]
            bundle_fee = 3500

            [pricing.consumer]
            max_bottles = 12
            max_bundles = 3
            "#,
        )
        .unwrap();

        assert_eq!(config.api.base_url, "https://shop.example.com/api");
        assert_eq!(config.api.timeout_secs, 30);
        assert_eq!(config.pricing.bundle_fee, Money::from_major(3_500));
        assert_eq!(config.pricing.one_bottle_fee, Money::from_major(1_500));
        assert_eq!(config.pricing.consumer.max_bottles, 12);
        assert_eq!(config.pricing.distributor.max_bottles, 100);
    }

    #[test]
    fn test_config_validation() {
        let mut config = ClientConfig::default();
        config.api.base_url = "ftp://example.com".to_string();
        assert!(config.validate().is_err());

        config.api.base_url = "not a url".to_string();
        assert!(config.validate().is_err());

        config.api.base_url = "https://example.com/api".to_string();
        config.api.timeout_secs = 0;
        assert!(config.validate().is_err());

        config.api.timeout_secs = 10;
        config.api.login_route = "login".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_overrides() {
        let env: HashMap<&str, &str> = [
            ("AURA_API_URL", "https://staging.example.com/api"),
            ("AURA_API_TIMEOUT_SECS", "nope"),
            ("AURA_DATA_DIR", "/tmp/aura"),
        ]
        .into_iter()
        .collect();

        let mut config = ClientConfig::default();
        config.apply_overrides(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.api.base_url, "https://staging.example.com/api");
        assert_eq!(config.api.timeout_secs, 30);
        assert_eq!(config.data_dir().unwrap(), PathBuf::from("/tmp/aura"));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("client.toml");
        let mut config = ClientConfig::default();
        config.payment.public_key = "pk_test_123".to_string();
        config.save(Some(path.clone())).unwrap();

        let loaded = ClientConfig::load(Some(path)).unwrap();
        assert_eq!(loaded.payment.public_key, "pk_test_123");
        assert_eq!(loaded.pricing, config.pricing);
    }
}
