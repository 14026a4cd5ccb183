use crate::config::StoreConfig;
use crate::error::StoreError;
use crate::path::StorePath;
use crate::retry::{retry, RetryPolicy};
use crate::store::CoordinationStore;
use async_trait::async_trait;
use etcd_client::{Client, Compare, CompareOp, ConnectOptions, GetOptions, Txn, TxnOp};
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// etcd-backed store. Every node of the path hierarchy is stored as its own
/// key, so `/config/dev0/dmp` exists only once it has been created.
pub struct EtcdStore {
    client: RwLock<Option<Client>>,
    endpoints: Vec<String>,
}

impl EtcdStore {
    /// Connect and probe the cluster, retrying transient failures per `policy`.
    pub async fn connect(config: &StoreConfig, policy: &RetryPolicy) -> Result<Self, StoreError> {
        let endpoints = config.endpoints.clone();
        if endpoints.is_empty() {
            return Err(StoreError::Rejected("no etcd endpoints configured".to_string()));
        }

        let mut options = ConnectOptions::new()
            .with_connect_timeout(Duration::from_millis(config.connect_timeout_ms))
            .with_timeout(Duration::from_millis(config.request_timeout_ms));
        if let Some(user) = config.user.as_deref() {
            options = options.with_user(user, config.password.clone().unwrap_or_default());
        }

        info!("Creating etcd client for {:?}", endpoints);
        let client = retry("etcd connect", policy, || {
            let endpoints = endpoints.clone();
            let options = options.clone();
            async move {
                let mut client = Client::connect(&endpoints, Some(options)).await?;
                client.status().await?;
                Ok(client)
            }
        })
        .await?;

        Ok(Self {
            client: RwLock::new(Some(client)),
            endpoints,
        })
    }

    pub fn endpoints(&self) -> &[String] {
        &self.endpoints
    }

    async fn client(&self) -> Result<Client, StoreError> {
        self.client.read().await.clone().ok_or(StoreError::Closed)
    }

    async fn create_if_absent(client: &mut Client, key: &str) -> Result<bool, StoreError> {
        let txn = Txn::new()
            .when(vec![Compare::create_revision(key, CompareOp::Equal, 0)])
            .and_then(vec![TxnOp::put(key, Vec::<u8>::new(), None)]);

        let resp = client.txn(txn).await?;
        Ok(resp.succeeded())
    }
}

#[async_trait]
impl CoordinationStore for EtcdStore {
    async fn exists(&self, path: &StorePath) -> Result<bool, StoreError> {
        let mut client = self.client().await?;
        let resp = client
            .get(path.as_str(), Some(GetOptions::new().with_count_only()))
            .await?;

        Ok(resp.count() > 0)
    }

    async fn create_path(&self, path: &StorePath) -> Result<(), StoreError> {
        let mut client = self.client().await?;

        for key in path.ancestors().into_iter().chain([path.as_str()]) {
            if Self::create_if_absent(&mut client, key).await? {
                debug!("Created node {}", key);
            }
        }

        Ok(())
    }

    async fn read(&self, path: &StorePath) -> Result<Vec<u8>, StoreError> {
        let mut client = self.client().await?;
        let resp = client.get(path.as_str(), None).await?;

        match resp.kvs().first() {
            Some(kv) => Ok(kv.value().to_vec()),
            None => Err(StoreError::NotFound(path.to_string())),
        }
    }

    async fn write(&self, path: &StorePath, data: &[u8]) -> Result<(), StoreError> {
        let mut client = self.client().await?;

        // Only existing nodes may be overwritten; the put itself is unconditional.
        let txn = Txn::new()
            .when(vec![Compare::create_revision(
                path.as_str(),
                CompareOp::Greater,
                0,
            )])
            .and_then(vec![TxnOp::put(path.as_str(), data.to_vec(), None)]);

        let resp = client.txn(txn).await?;
        if !resp.succeeded() {
            return Err(StoreError::NotFound(path.to_string()));
        }

        Ok(())
    }

    async fn close(&self) {
        if self.client.write().await.take().is_some() {
            info!("Closed etcd client for {:?}", self.endpoints);
        }
    }
}
