//! Resolved credentials plus connection settings

use std::time::Duration;

use super::Provider;
use crate::error::{Error, Result};

/// Everything needed to sign and address one exchange.
///
/// Immutable once built. Each request takes its own clone, so no state is
/// shared between concurrent transfers.
#[derive(Debug, Clone)]
pub struct SigningContext {
    account: String,
    secret_key: String,
    provider: Provider,
    auth_host: String,
    ssl: bool,
    port: u16,
    timeout: Duration,
}

impl SigningContext {
    /// Build a context, failing fast on missing credentials
    pub fn new(provider: Provider, account: &str, secret_key: &str) -> Result<Self> {
        if account.is_empty() {
            return Err(Error::usage("No account name."));
        }
        if secret_key.is_empty() {
            return Err(Error::usage("No secret key."));
        }
        Ok(Self {
            account: account.to_string(),
            secret_key: secret_key.to_string(),
            auth_host: provider.default_auth_host.clone(),
            provider,
            ssl: false,
            port: 80,
            timeout: Duration::from_secs(5),
        })
    }

    pub fn with_auth_host(mut self, host: &str) -> Result<Self> {
        if host.is_empty() {
            return Err(Error::usage("No authentication URL."));
        }
        self.auth_host = host.to_string();
        Ok(self)
    }

    /// Enable or disable TLS; resets the port to the scheme default
    pub fn with_ssl(mut self, ssl: bool) -> Self {
        self.ssl = ssl;
        self.port = if ssl { 443 } else { 80 };
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn account(&self) -> &str {
        &self.account
    }

    pub(crate) fn secret_key(&self) -> &str {
        &self.secret_key
    }

    pub fn provider(&self) -> &Provider {
        &self.provider
    }

    pub fn ssl(&self) -> bool {
        self.ssl
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Authentication host, or the virtual host of a named container
    pub fn auth_host(&self, container: Option<&str>) -> String {
        match container {
            Some(name) => format!("{}.{}", name, self.auth_host),
            None => self.auth_host.clone(),
        }
    }
}
