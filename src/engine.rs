//! Sync engine: publishes property sets to store paths and loads them back.
//!
//! The engine owns the single store handle of the process and a small private
//! runtime, so `publish` and `load` block the caller until the store round
//! trip finishes. Do not call them from inside an async runtime.

use crate::config::{Config, StoreConfig};
use crate::error::{LoadFailure, Result, StoreError, SyncError, SyncStage};
use crate::path::{Identity, PathResolver, StorePath, Target};
use crate::properties::{decode, encode, PropertySet};
use crate::retry::RetryPolicy;
use crate::store::{CoordinationStore, DynStore, NodeState, StoreBuilder};
use std::sync::Arc;
use tokio::runtime::Runtime;
use tracing::{debug, error, info, trace};

pub struct SyncEngine {
    runtime: Runtime,
    resolver: PathResolver,
    store: Option<Arc<dyn CoordinationStore>>,
}

impl SyncEngine {
    /// An engine with no store handle yet; every operation reports
    /// `NotInitialized` until [`connect`](Self::connect) or [`attach`](Self::attach).
    pub fn new(resolver: PathResolver) -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .thread_name("propsync-io")
            .enable_all()
            .build()?;

        Ok(Self {
            runtime,
            resolver,
            store: None,
        })
    }

    /// Build from configuration, connecting only when a store is configured.
    pub fn from_config(config: &Config) -> Result<Self> {
        config.validate()?;
        let mut engine = Self::new(PathResolver::new(&config.root)?)?;

        info!(
            "Store endpoints: {:?}, environment: {:?}",
            config.store.endpoints, config.identity.environment
        );
        if !config.store.is_configured() {
            info!("No store configured, will not act as a property source");
            return Ok(engine);
        }

        engine.connect(&config.store, &config.retry)?;
        Ok(engine)
    }

    /// Open a store session, replacing (and closing) any current one.
    pub fn connect(&mut self, config: &StoreConfig, retry: &RetryPolicy) -> Result<()> {
        self.shutdown();

        info!("Connecting to {:?} store", config.backend);
        let builder = StoreBuilder::from_config(config, retry);
        let store = self.runtime.block_on(builder.build())?;
        self.store = Some(store);
        Ok(())
    }

    /// Use an already-open store as this engine's handle.
    pub fn attach(&mut self, store: Arc<dyn CoordinationStore>) {
        self.shutdown();
        self.store = Some(store);
    }

    pub fn is_connected(&self) -> bool {
        self.store.is_some()
    }

    pub fn resolver(&self) -> &PathResolver {
        &self.resolver
    }

    /// Release the store handle. Safe to call repeatedly.
    pub fn shutdown(&mut self) {
        if let Some(store) = self.store.take() {
            self.runtime.block_on(store.close());
            info!("Store session closed");
        }
    }

    /// Write `properties` to `path`, creating the node and its ancestors if
    /// needed. Overwrites whatever was there before.
    pub fn publish(&self, properties: &PropertySet, path: &str) -> Result<()> {
        let store = self.store()?;
        let path = self.resolver.resolve_explicit(path)?;
        self.publish_resolved(store, properties, &path)
    }

    pub fn publish_for_identity(&self, properties: &PropertySet, identity: &Identity) -> Result<()> {
        self.publish_target(properties, &Target::Identity(identity.clone()))
    }

    pub fn publish_target(&self, properties: &PropertySet, target: &Target) -> Result<()> {
        let store = self.store()?;
        let path = self.resolver.resolve(target)?;
        self.publish_resolved(store, properties, &path)
    }

    /// Read the property set at `path`. A missing node is created empty and
    /// an empty set is returned.
    pub fn load(&self, path: &str) -> Result<PropertySet> {
        let store = self.store()?;
        let path = self.resolver.resolve_explicit(path)?;
        self.load_resolved(store, &path, true)
    }

    pub fn load_for_identity(&self, identity: &Identity) -> Result<PropertySet> {
        self.load_target(&Target::Identity(identity.clone()))
    }

    /// Resolve `target` to a path and load from it. Failures are reported,
    /// never replaced by an empty set.
    pub fn load_target(&self, target: &Target) -> Result<PropertySet> {
        let store = self.store()?;
        let path = self.resolver.resolve(target)?;
        self.load_resolved(store, &path, true)
    }

    /// Like [`load`](Self::load) but read-only: a missing node is a
    /// `LoadFailed` error and nothing is created.
    pub fn load_existing(&self, path: &str) -> Result<PropertySet> {
        let store = self.store()?;
        let path = self.resolver.resolve_explicit(path)?;
        self.load_resolved(store, &path, false)
    }

    fn store(&self) -> Result<&DynStore> {
        self.store.as_deref().ok_or(SyncError::NotInitialized)
    }

    fn publish_resolved(
        &self,
        store: &DynStore,
        properties: &PropertySet,
        path: &StorePath,
    ) -> Result<()> {
        let result = self.runtime.block_on(publish_to(store, properties, path));
        if let Err(err) = &result {
            error!("Could not publish properties to {}: {}", path, err);
        }
        result
    }

    fn load_resolved(&self, store: &DynStore, path: &StorePath, provision: bool) -> Result<PropertySet> {
        let result = self.runtime.block_on(load_from(store, path, provision));
        if let Err(err) = &result {
            error!("Error attempting to load properties from {}: {}", path, err);
        }
        result
    }
}

impl Drop for SyncEngine {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn publish_failed(path: &StorePath, stage: SyncStage) -> impl FnOnce(StoreError) -> SyncError + '_ {
    move |source| SyncError::PublishFailed {
        path: path.to_string(),
        stage,
        source,
    }
}

fn load_failed<E: Into<LoadFailure>>(path: &StorePath, stage: SyncStage) -> impl FnOnce(E) -> SyncError + '_ {
    move |source| SyncError::LoadFailed {
        path: path.to_string(),
        stage,
        source: source.into(),
    }
}

async fn publish_to(store: &DynStore, properties: &PropertySet, path: &StorePath) -> Result<()> {
    // A concurrent creator between the check and the create is harmless:
    // create_path leaves existing nodes alone.
    let exists = store
        .exists(path)
        .await
        .map_err(publish_failed(path, SyncStage::EnsureNode))?;
    if !exists {
        store
            .create_path(path)
            .await
            .map_err(publish_failed(path, SyncStage::EnsureNode))?;
        debug!("Created node {}", path);
    }

    let payload = encode(properties);
    store
        .write(path, &payload)
        .await
        .map_err(publish_failed(path, SyncStage::Write))?;

    info!("Published {} properties to {}", properties.len(), path);
    Ok(())
}

async fn fetch(store: &DynStore, path: &StorePath) -> Result<NodeState> {
    let exists = store
        .exists(path)
        .await
        .map_err(load_failed(path, SyncStage::Check))?;
    if !exists {
        return Ok(NodeState::Absent);
    }

    // The node may vanish between the check and the read; that surfaces
    // as a NotFound store error and is reported as LoadFailed.
    let data = store
        .read(path)
        .await
        .map_err(load_failed(path, SyncStage::Read))?;
    Ok(NodeState::Found(data))
}

async fn load_from(store: &DynStore, path: &StorePath, provision: bool) -> Result<PropertySet> {
    trace!("Attempting to fetch properties from {}", path);

    let data = match fetch(store, path).await? {
        NodeState::Found(data) => data,
        NodeState::Absent if provision => {
            store
                .create_path(path)
                .await
                .map_err(load_failed(path, SyncStage::EnsureNode))?;

            // A concurrent publisher may have created and filled the node
            // since the check; its payload wins over the empty default.
            let data = store
                .read(path)
                .await
                .map_err(load_failed(path, SyncStage::Read))?;
            if data.is_empty() {
                info!("No node at {}, created an empty one", path);
                return Ok(PropertySet::new());
            }
            data
        }
        NodeState::Absent => {
            return Err(load_failed(path, SyncStage::Check)(StoreError::NotFound(
                path.to_string(),
            )));
        }
    };

    let properties = decode(&data).map_err(load_failed(path, SyncStage::Decode))?;
    for (key, value) in properties.iter() {
        debug!("Loaded property [{} = {}]", key, value);
    }
    Ok(properties)
}
