//! Store Client abstraction over a hierarchical coordination store
//!
//! Provides a trait-based abstraction for different backend implementations
//! (etcd, in-process memory)

pub mod etcd;
pub mod factory;
pub mod memory;

use crate::error::StoreError;
use crate::path::StorePath;
use async_trait::async_trait;

pub use etcd::EtcdStore;
pub use factory::StoreBuilder;
pub use memory::MemoryStore;

/// Node-level primitives the sync engine needs from a coordination store.
#[async_trait]
pub trait CoordinationStore: Send + Sync {
    /// Whether a node exists at `path`
    async fn exists(&self, path: &StorePath) -> Result<bool, StoreError>;

    /// Create the node and any missing ancestors with empty payloads.
    /// Nodes that already exist are left untouched.
    async fn create_path(&self, path: &StorePath) -> Result<(), StoreError>;

    /// Read the node payload, `StoreError::NotFound` if there is no node
    async fn read(&self, path: &StorePath) -> Result<Vec<u8>, StoreError>;

    /// Overwrite the payload of an existing node, no version check
    async fn write(&self, path: &StorePath, data: &[u8]) -> Result<(), StoreError>;

    /// Release the session. Idempotent; later calls fail with `StoreError::Closed`.
    async fn close(&self);
}

/// Type alias for a dynamic store
pub type DynStore = dyn CoordinationStore;

/// Outcome of checking a node and reading it if present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeState {
    Absent,
    Found(Vec<u8>),
}
