//! Store paths and the resolver that derives them from deployment identity.

use crate::error::{Result, SyncError};
use serde::{Deserialize, Serialize};
use std::fmt;

pub const DEFAULT_ROOT: &str = "/config";

/// Validated, slash-delimited node path inside the coordination store.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StorePath(String);

impl StorePath {
    /// Checks the shape of `path` only: absolute, no empty, `.` or `..`
    /// segments, no trailing slash.
    pub fn parse(path: &str) -> Result<Self> {
        let invalid = |reason: &str| SyncError::InvalidPath {
            path: path.to_string(),
            reason: reason.to_string(),
        };

        if path.is_empty() {
            return Err(invalid("path is empty"));
        }
        if !path.starts_with('/') {
            return Err(invalid("path must start with '/'"));
        }
        if path == "/" {
            return Err(invalid("the store root cannot hold properties"));
        }
        if path.ends_with('/') {
            return Err(invalid("path must not end with '/'"));
        }
        for segment in path[1..].split('/') {
            match segment {
                "" => return Err(invalid("path contains an empty segment")),
                "." | ".." => return Err(invalid("relative segments are not allowed")),
                s if s.contains('\0') => return Err(invalid("path contains a null byte")),
                _ => {}
            }
        }

        Ok(Self(path.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Proper ancestors from the top down, e.g. `/config`, `/config/dev0` for `/config/dev0/dmp`.
    pub fn ancestors(&self) -> Vec<&str> {
        self.0
            .match_indices('/')
            .skip(1)
            .map(|(pos, _)| &self.0[..pos])
            .collect()
    }

    fn is_under(&self, root: &StorePath) -> bool {
        self.0
            .strip_prefix(root.as_str())
            .is_some_and(|rest| rest.starts_with('/'))
    }
}

impl fmt::Display for StorePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for StorePath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Deployment identity a canonical path is derived from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    #[serde(default)]
    pub environment: Option<String>,
    #[serde(default)]
    pub component: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
}

impl Identity {
    pub fn new(
        environment: impl Into<String>,
        component: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            environment: Some(environment.into()),
            component: Some(component.into()),
            version: Some(version.into()),
        }
    }
}

/// Where a load or publish is aimed: an explicit path or a deployment identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Path(String),
    Identity(Identity),
}

#[derive(Debug, Clone)]
pub struct PathResolver {
    root: StorePath,
}

impl Default for PathResolver {
    fn default() -> Self {
        Self {
            root: StorePath(DEFAULT_ROOT.to_string()),
        }
    }
}

impl PathResolver {
    pub fn new(root: &str) -> Result<Self> {
        Ok(Self {
            root: StorePath::parse(root)?,
        })
    }

    pub fn root(&self) -> &StorePath {
        &self.root
    }

    /// Accepts a caller-supplied path only when it lies strictly below the root.
    pub fn resolve_explicit(&self, path: &str) -> Result<StorePath> {
        let resolved = StorePath::parse(path)?;
        if !resolved.is_under(&self.root) {
            return Err(SyncError::InvalidPath {
                path: path.to_string(),
                reason: format!("path must be below {}", self.root),
            });
        }
        Ok(resolved)
    }

    /// `<root>/<environment>/<component>/<version>`.
    pub fn resolve_from_identity(&self, identity: &Identity) -> Result<StorePath> {
        let environment = required(identity.environment.as_deref(), "environment")?;
        let component = required(identity.component.as_deref(), "component")?;
        let version = required(identity.version.as_deref(), "version")?;

        StorePath::parse(&format!(
            "{}/{}/{}/{}",
            self.root, environment, component, version
        ))
    }

    pub fn resolve(&self, target: &Target) -> Result<StorePath> {
        match target {
            Target::Path(path) => self.resolve_explicit(path),
            Target::Identity(identity) => self.resolve_from_identity(identity),
        }
    }
}

fn required<'a>(value: Option<&'a str>, field: &'static str) -> Result<&'a str> {
    let value = value
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or(SyncError::IdentityUnresolved(field))?;

    if value.contains('/') {
        return Err(SyncError::InvalidPath {
            path: value.to_string(),
            reason: format!("{} must not contain '/'", field),
        });
    }

    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_maps_to_canonical_path() {
        let resolver = PathResolver::default();
        let path = resolver
            .resolve_from_identity(&Identity::new("dev0", "dmp", "0.4-SNAPSHOT"))
            .unwrap();
        assert_eq!(path.as_str(), "/config/dev0/dmp/0.4-SNAPSHOT");
    }

    #[test]
    fn identity_honours_custom_root() {
        let resolver = PathResolver::new("/apps/settings").unwrap();
        let path = resolver
            .resolve_from_identity(&Identity::new("prod", "api", "2.1"))
            .unwrap();
        assert_eq!(path.as_str(), "/apps/settings/prod/api/2.1");
    }

    #[test]
    fn missing_or_empty_identity_fields_are_unresolved() {
        let resolver = PathResolver::default();

        let mut identity = Identity::new("dev0", "dmp", "0.4");
        identity.environment = None;
        assert!(matches!(
            resolver.resolve_from_identity(&identity),
            Err(SyncError::IdentityUnresolved("environment"))
        ));

        let identity = Identity::new("dev0", "", "0.4");
        assert!(matches!(
            resolver.resolve_from_identity(&identity),
            Err(SyncError::IdentityUnresolved("component"))
        ));

        let identity = Identity::new("dev0", "dmp", "  ");
        assert!(matches!(
            resolver.resolve_from_identity(&identity),
            Err(SyncError::IdentityUnresolved("version"))
        ));
    }

    #[test]
    fn identity_fields_cannot_escape_their_segment() {
        let resolver = PathResolver::default();
        let identity = Identity::new("dev0", "dmp/../other", "0.4");
        assert!(matches!(
            resolver.resolve_from_identity(&identity),
            Err(SyncError::InvalidPath { .. })
        ));
    }

    #[test]
    fn explicit_path_must_be_non_empty_and_under_root() {
        let resolver = PathResolver::default();

        assert!(matches!(
            resolver.resolve_explicit(""),
            Err(SyncError::InvalidPath { .. })
        ));
        assert!(resolver.resolve_explicit("/other/dev0/dmp").is_err());
        assert!(resolver.resolve_explicit("/configuration/dev0").is_err());
        assert!(resolver.resolve_explicit("/config").is_err());
        assert!(resolver.resolve_explicit("/config/dev0//dmp").is_err());
        assert!(resolver.resolve_explicit("/config/dev0/../x").is_err());
        assert!(resolver.resolve_explicit("/config/dev0/").is_err());

        let path = resolver.resolve_explicit("/config/dev0/dmp/0.4").unwrap();
        assert_eq!(path.to_string(), "/config/dev0/dmp/0.4");
    }

    #[test]
    fn ancestors_run_top_down() {
        let path = StorePath::parse("/config/dev0/dmp/0.4").unwrap();
        assert_eq!(
            path.ancestors(),
            vec!["/config", "/config/dev0", "/config/dev0/dmp"]
        );
        assert!(StorePath::parse("/config").unwrap().ancestors().is_empty());
    }

    #[test]
    fn resolve_dispatches_on_target() {
        let resolver = PathResolver::default();
        let by_path = resolver
            .resolve(&Target::Path("/config/a/b/c".to_string()))
            .unwrap();
        let by_identity = resolver
            .resolve(&Target::Identity(Identity::new("a", "b", "c")))
            .unwrap();
        assert_eq!(by_path, by_identity);
    }
}
