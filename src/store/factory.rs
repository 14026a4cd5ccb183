use super::{CoordinationStore, EtcdStore, MemoryStore};
use crate::config::{StoreBackend, StoreConfig};
use crate::error::{Result, SyncError};
use crate::retry::RetryPolicy;
use std::sync::Arc;

#[derive(Debug, Clone, Default)]
pub struct StoreBuilder {
    config: StoreConfig,
    retry: RetryPolicy,
}

impl StoreBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &StoreConfig, retry: &RetryPolicy) -> Self {
        Self {
            config: config.clone(),
            retry: retry.clone(),
        }
    }

    pub fn backend(mut self, backend: StoreBackend) -> Self {
        self.config.backend = backend;
        self
    }

    pub fn endpoints(mut self, endpoints: Vec<String>) -> Self {
        self.config.endpoints = endpoints;
        self
    }

    pub fn credentials(mut self, user: impl Into<String>, password: impl Into<String>) -> Self {
        self.config.user = Some(user.into());
        self.config.password = Some(password.into());
        self
    }

    pub fn retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    fn resolve_endpoints(&self) -> Result<Vec<String>> {
        let endpoints: Vec<String> = self
            .config
            .endpoints
            .iter()
            .map(|endpoint| endpoint.trim().to_string())
            .filter(|endpoint| !endpoint.is_empty())
            .collect();

        if endpoints.is_empty() {
            return Err(SyncError::Config(
                "etcd endpoints cannot be empty for etcd backend".to_string(),
            ));
        }

        Ok(endpoints)
    }

    pub async fn build(&self) -> Result<Arc<dyn CoordinationStore>> {
        match self.config.backend {
            StoreBackend::Etcd => {
                let config = StoreConfig {
                    endpoints: self.resolve_endpoints()?,
                    ..self.config.clone()
                };

                let store = EtcdStore::connect(&config, &self.retry)
                    .await
                    .map_err(SyncError::Connection)?;
                Ok(Arc::new(store))
            }
            StoreBackend::Memory => Ok(Arc::new(MemoryStore::new())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn etcd_backend_requires_endpoints() {
        let result = StoreBuilder::new()
            .endpoints(vec!["  ".to_string()])
            .build()
            .await;
        assert!(matches!(result, Err(SyncError::Config(_))));
    }

    #[tokio::test]
    async fn builds_memory_backend() {
        let store = StoreBuilder::new()
            .backend(StoreBackend::Memory)
            .build()
            .await
            .unwrap();
        let path = crate::path::StorePath::parse("/config/a/b/c").unwrap();
        assert!(!store.exists(&path).await.unwrap());
    }
}
