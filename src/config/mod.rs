//! Configuration management for the account monitor.
//!
//! Application settings come from an optional `config` file and `BAM__`
//! environment variables. Account credentials live in a separate JSON file
//! mapping each account's display name to its API key pair.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use tracing::warn;

/// Main application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Exchange endpoints and HTTP settings
    #[serde(default)]
    pub exchange: ExchangeConfig,
    /// Polling loop settings
    #[serde(default)]
    pub monitor: MonitorConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExchangeConfig {
    /// Base URL for spot endpoints
    #[serde(default = "default_spot_base_url")]
    pub spot_base_url: String,
    /// Base URL for USD-M futures endpoints
    #[serde(default = "default_futures_base_url")]
    pub futures_base_url: String,
    /// Per-request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    /// Proxy applied to accounts that do not set their own
    #[serde(default)]
    pub default_proxy: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Path of the accounts JSON file
    #[serde(default = "default_accounts_file")]
    pub accounts_file: String,
    /// Seconds to sleep between poll cycles
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
}

// Default value functions
fn default_spot_base_url() -> String {
    "https://api.binance.com".to_string()
}

fn default_futures_base_url() -> String {
    "https://fapi.binance.com".to_string()
}

fn default_request_timeout() -> u64 {
    10
}

fn default_accounts_file() -> String {
    "accounts.json".to_string()
}

fn default_poll_interval() -> u64 {
    5
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self {
            spot_base_url: default_spot_base_url(),
            futures_base_url: default_futures_base_url(),
            request_timeout_secs: default_request_timeout(),
            default_proxy: None,
        }
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            accounts_file: default_accounts_file(),
            poll_interval_secs: default_poll_interval(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables and config files.
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(config::File::with_name("config").required(false))
            .add_source(config::Environment::default().separator("__").prefix("BAM"))
            .build()
            .context("Failed to build configuration")?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(
            self.monitor.poll_interval_secs > 0,
            "poll_interval_secs must be greater than 0"
        );

        anyhow::ensure!(
            self.exchange.request_timeout_secs > 0,
            "request_timeout_secs must be greater than 0"
        );

        anyhow::ensure!(
            !self.exchange.spot_base_url.is_empty() && !self.exchange.futures_base_url.is_empty(),
            "exchange base URLs must not be empty"
        );

        Ok(())
    }
}

/// API credentials for one monitored account.
#[derive(Clone, PartialEq, Eq)]
pub struct AccountCredential {
    /// Display name, unique across the accounts file
    pub name: String,
    pub api_key: String,
    pub api_secret: String,
    /// HTTP(S) proxy URL used for every request of this account
    pub proxy: Option<String>,
}

impl fmt::Debug for AccountCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccountCredential")
            .field("name", &self.name)
            .field("api_key", &self.api_key)
            .field("api_secret", &"<redacted>")
            .field("proxy", &self.proxy)
            .finish()
    }
}

/// One entry of the accounts file, keyed by account name.
#[derive(Debug, Deserialize)]
struct AccountEntry {
    api_key: String,
    api_secret: String,
    #[serde(default)]
    proxy: Option<String>,
}

/// Parse the accounts file contents, keeping the file's account order.
pub fn parse_accounts(json: &str) -> Result<Vec<AccountCredential>> {
    let entries: serde_json::Map<String, serde_json::Value> =
        serde_json::from_str(json).context("Accounts file must be a JSON object")?;

    entries
        .into_iter()
        .map(|(name, value)| -> Result<AccountCredential> {
            let entry: AccountEntry = serde_json::from_value(value)
                .with_context(|| format!("Invalid entry for account '{}'", name))?;
            Ok(AccountCredential {
                name,
                api_key: entry.api_key,
                api_secret: entry.api_secret,
                proxy: entry.proxy.filter(|p| !p.is_empty()),
            })
        })
        .collect()
}

/// Load accounts from `path`, falling back to placeholders when it is absent.
pub fn load_accounts(path: impl AsRef<Path>) -> Result<Vec<AccountCredential>> {
    let path = path.as_ref();

    match std::fs::read_to_string(path) {
        Ok(contents) => parse_accounts(&contents)
            .with_context(|| format!("Failed to parse accounts file {}", path.display())),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            warn!(
                "Accounts file {} not found, using placeholder accounts",
                path.display()
            );
            Ok(placeholder_accounts())
        }
        Err(e) => Err(e).with_context(|| format!("Failed to read accounts file {}", path.display())),
    }
}

/// Placeholder accounts shown when no accounts file exists.
pub fn placeholder_accounts() -> Vec<AccountCredential> {
    (1..=5)
        .map(|i| AccountCredential {
            name: format!("Account {}", i),
            api_key: format!("your_api_key{}", i),
            api_secret: format!("your_secret{}", i),
            proxy: None,
        })
        .collect()
}
