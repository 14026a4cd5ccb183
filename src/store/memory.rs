use crate::error::StoreError;
use crate::path::StorePath;
use crate::store::CoordinationStore;
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, Ordering};

/// In-process node tree with the same semantics as the etcd store.
pub struct MemoryStore {
    nodes: DashMap<String, Vec<u8>>,
    closed: AtomicBool,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self {
            nodes: DashMap::new(),
            closed: AtomicBool::new(false),
        }
    }

    /// Number of nodes, ancestors included
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn ensure_open(&self) -> Result<(), StoreError> {
        if self.is_closed() {
            return Err(StoreError::Closed);
        }
        Ok(())
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CoordinationStore for MemoryStore {
    async fn exists(&self, path: &StorePath) -> Result<bool, StoreError> {
        self.ensure_open()?;
        Ok(self.nodes.contains_key(path.as_str()))
    }

    async fn create_path(&self, path: &StorePath) -> Result<(), StoreError> {
        self.ensure_open()?;
        for key in path.ancestors().into_iter().chain([path.as_str()]) {
            self.nodes.entry(key.to_string()).or_default();
        }
        Ok(())
    }

    async fn read(&self, path: &StorePath) -> Result<Vec<u8>, StoreError> {
        self.ensure_open()?;
        self.nodes
            .get(path.as_str())
            .map(|node| node.value().clone())
            .ok_or_else(|| StoreError::NotFound(path.to_string()))
    }

    async fn write(&self, path: &StorePath, data: &[u8]) -> Result<(), StoreError> {
        self.ensure_open()?;
        match self.nodes.get_mut(path.as_str()) {
            Some(mut node) => {
                *node = data.to_vec();
                Ok(())
            }
            None => Err(StoreError::NotFound(path.to_string())),
        }
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}
