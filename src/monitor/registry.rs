//! Registry of monitored accounts.

use crate::config::{AccountCredential, ExchangeConfig};
use crate::exchange::{AccountDataSource, BinanceClient};
use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::info;

/// One monitored account and the source its data is read from.
pub struct RegisteredAccount {
    name: String,
    source: Arc<dyn AccountDataSource>,
}

impl RegisteredAccount {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn source(&self) -> &dyn AccountDataSource {
        self.source.as_ref()
    }
}

/// Accounts to poll, in display order.
///
/// Built once at startup and shared read-only with the poller.
#[derive(Default)]
pub struct AccountRegistry {
    accounts: Vec<RegisteredAccount>,
}

impl AccountRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry with one REST client per credential.
    pub fn from_credentials(
        config: &ExchangeConfig,
        credentials: &[AccountCredential],
    ) -> Result<Self> {
        let mut registry = Self::new();

        for credential in credentials {
            let client = BinanceClient::new(config, credential)
                .with_context(|| format!("Failed to create client for '{}'", credential.name))?;
            registry.register(&credential.name, Arc::new(client))?;

            info!(
                account = %credential.name,
                proxy = credential.proxy.as_deref().or(config.default_proxy.as_deref()).unwrap_or("none"),
                "Registered account"
            );
        }

        Ok(registry)
    }

    /// Add an account. Names must be unique.
    pub fn register(&mut self, name: &str, source: Arc<dyn AccountDataSource>) -> Result<()> {
        anyhow::ensure!(
            !self.accounts.iter().any(|a| a.name == name),
            "account '{}' is already registered",
            name
        );

        self.accounts.push(RegisteredAccount {
            name: name.to_string(),
            source,
        });
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &RegisteredAccount> {
        self.accounts.iter()
    }

    /// Account names in registration order.
    pub fn names(&self) -> Vec<String> {
        self.accounts.iter().map(|a| a.name.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::placeholder_accounts;
    use crate::exchange::MockAccountSource;

    #[test]
    fn test_duplicate_names_rejected() {
        let mut registry = AccountRegistry::new();
        registry
            .register("main", Arc::new(MockAccountSource::new()))
            .unwrap();

        assert!(registry
            .register("main", Arc::new(MockAccountSource::new()))
            .is_err());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_from_credentials_keeps_order() {
        let accounts = placeholder_accounts();
        let registry =
            AccountRegistry::from_credentials(&ExchangeConfig::default(), &accounts).unwrap();

        assert_eq!(registry.len(), 5);
        assert_eq!(registry.names()[0], "Account 1");
        assert_eq!(registry.names()[4], "Account 5");
    }
}
