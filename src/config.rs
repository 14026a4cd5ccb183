use crate::error::{Result, SyncError};
use crate::path::{Identity, Target, DEFAULT_ROOT};
use crate::retry::RetryPolicy;
use serde::{Deserialize, Deserializer, Serialize};

const ENV_PREFIX: &str = "PROPSYNC";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub retry: RetryPolicy,
    #[serde(default = "default_root")]
    pub root: String,
    #[serde(default)]
    pub identity: Identity,
    /// Explicit path; takes precedence over `identity`.
    #[serde(default)]
    pub path: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            store: StoreConfig::default(),
            retry: RetryPolicy::default(),
            root: default_root(),
            identity: Identity::default(),
            path: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: StoreBackend,
    #[serde(default, deserialize_with = "endpoint_list")]
    pub endpoints: Vec<String>,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            endpoints: Vec::new(),
            user: None,
            password: None,
            connect_timeout_ms: default_connect_timeout_ms(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

impl StoreConfig {
    /// Whether enough is configured to open a connection.
    pub fn is_configured(&self) -> bool {
        match self.backend {
            StoreBackend::Etcd => self.endpoints.iter().any(|e| !e.trim().is_empty()),
            StoreBackend::Memory => true,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Etcd,
    Memory,
}

/// A YAML list, or one comma-separated string as environment variables give it.
fn endpoint_list<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Vec<String>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Endpoints {
        List(Vec<String>),
        Joined(String),
    }

    Ok(match Endpoints::deserialize(deserializer)? {
        Endpoints::List(list) => list,
        Endpoints::Joined(joined) => joined
            .split(',')
            .map(str::trim)
            .filter(|e| !e.is_empty())
            .map(str::to_string)
            .collect(),
    })
}

fn default_root() -> String {
    DEFAULT_ROOT.to_string()
}

fn default_connect_timeout_ms() -> u64 {
    5_000
}

fn default_request_timeout_ms() -> u64 {
    10_000
}

impl Config {
    /// File source overlaid with `PROPSYNC_*` environment variables,
    /// e.g. `PROPSYNC_IDENTITY__ENVIRONMENT=dev0`.
    pub fn from_file(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path))
            .add_source(environment())
            .build()?;

        Ok(settings.try_deserialize()?)
    }

    pub fn from_env() -> Result<Self> {
        let settings = config::Config::builder().add_source(environment()).build()?;

        Ok(settings.try_deserialize()?)
    }

    /// The configured load target: the explicit path if set, else the identity.
    pub fn target(&self) -> Target {
        match self.path.as_deref().map(str::trim) {
            Some(path) if !path.is_empty() => Target::Path(path.to_string()),
            _ => Target::Identity(self.identity.clone()),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.retry.factor < 1.0 {
            return Err(SyncError::Config(
                "retry factor must be at least 1.0".to_string(),
            ));
        }
        if self.store.connect_timeout_ms == 0 || self.store.request_timeout_ms == 0 {
            return Err(SyncError::Config(
                "store timeouts must be greater than zero".to_string(),
            ));
        }
        if self.store.password.is_some() && self.store.user.is_none() {
            return Err(SyncError::Config(
                "store password given without a user".to_string(),
            ));
        }
        Ok(())
    }
}

fn environment() -> config::Environment {
    // Values stay strings so a version such as `1.0` is not read as a float;
    // numeric fields are converted on deserialize.
    config::Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("_")
        .separator("__")
}
