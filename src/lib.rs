//! propsync - publish and load flat property sets in a coordination store
//!
//! A process publishes `key=value` configuration to a well-known path such as
//! `/config/<environment>/<component>/<version>`; any process can load it back:
//! - etcd (or an in-process tree) as the hierarchical store
//! - Java-properties compatible payloads
//! - bounded exponential backoff when connecting

pub mod config;
pub mod engine;
pub mod error;
pub mod path;
pub mod properties;
pub mod retry;
pub mod store;

pub use config::{Config, StoreBackend, StoreConfig};
pub use engine::SyncEngine;
pub use error::{FormatError, LoadFailure, Result, StoreError, SyncError, SyncStage};
pub use path::{Identity, PathResolver, StorePath, Target, DEFAULT_ROOT};
pub use properties::{decode, encode, PropertySet};
pub use retry::RetryPolicy;
pub use store::{CoordinationStore, DynStore, EtcdStore, MemoryStore, NodeState, StoreBuilder};
