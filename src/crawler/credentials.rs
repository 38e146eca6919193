//! Search API credentials
//!
//! Secrets are resolved at most once per `CredentialCache` and kept for the
//! lifetime of the cache. The cache is owned by the search client that uses
//! it; there is no process-wide state.

use async_trait::async_trait;
use std::fmt;
use thiserror::Error;
use tokio::sync::OnceCell;

/// Errors raised while resolving credentials
#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("Secret {0} is not set")]
    Missing(String),

    #[error("Secret {0} is empty")]
    Empty(String),
}

/// Somewhere a named secret can be read from
#[async_trait]
pub trait SecretSource: Send + Sync {
    async fn resolve(&self, name: &str) -> Result<String, CredentialError>;
}

/// Reads secrets from process environment variables
#[derive(Debug, Default, Clone)]
pub struct EnvSecretSource;

#[async_trait]
impl SecretSource for EnvSecretSource {
    async fn resolve(&self, name: &str) -> Result<String, CredentialError> {
        std::env::var(name).map_err(|_| CredentialError::Missing(name.to_string()))
    }
}

/// A fixed secret, mostly useful in tests
#[derive(Clone)]
pub struct StaticSecretSource {
    value: String,
}

impl StaticSecretSource {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
        }
    }
}

#[async_trait]
impl SecretSource for StaticSecretSource {
    async fn resolve(&self, _name: &str) -> Result<String, CredentialError> {
        Ok(self.value.clone())
    }
}

/// Resolved API credentials
#[derive(Clone)]
pub struct Credentials {
    bearer_token: String,
}

impl Credentials {
    pub fn bearer_token(&self) -> &str {
        &self.bearer_token
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("bearer_token", &"<redacted>")
            .finish()
    }
}

/// Lazily resolves and then holds the credentials for one client
pub struct CredentialCache {
    source: Box<dyn SecretSource>,
    token_name: String,
    resolved: OnceCell<Credentials>,
}

impl CredentialCache {
    /// Creates an empty cache
    ///
    /// # Arguments
    ///
    /// * `source` - Where the bearer token is read from on first use
    /// * `token_name` - Name of the secret holding the bearer token
    pub fn new(source: Box<dyn SecretSource>, token_name: impl Into<String>) -> Self {
        Self {
            source,
            token_name: token_name.into(),
            resolved: OnceCell::new(),
        }
    }

    /// Returns the credentials, resolving them on the first call
    ///
    /// A failed resolution is not cached; the next call tries again.
    pub async fn get(&self) -> Result<&Credentials, CredentialError> {
        self.resolved
            .get_or_try_init(|| async move {
                let token = self.source.resolve(&self.token_name).await?;
                let token = token.trim().to_string();
                if token.is_empty() {
                    return Err(CredentialError::Empty(self.token_name.clone()));
                }
                tracing::debug!("Resolved credentials from {}", self.token_name);
                Ok(Credentials {
                    bearer_token: token,
                })
            })
            .await
    }
}
