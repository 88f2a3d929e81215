//! Error types for the reconciler crate.

use pkgctl_core::ObjectKey;
use thiserror::Error;

/// Result type alias for reconciler operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Reconciler error types.
///
/// Every variant asks for a requeue. Pacing of retries is left to the
/// caller's scheduler.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// No catalog entry matches the requested name/version.
    #[error("could not find package with name '{name}' and version '{version}'")]
    PackageNotFound { name: String, version: String },

    /// More than one catalog entry claims the same name/version.
    #[error("found {count} packages with name '{name}' and version '{version}', expected one")]
    DuplicatePackage {
        name: String,
        version: String,
        count: usize,
    },

    /// A list/get/create/update call against the store failed.
    #[error("store operation '{operation}' failed: {reason}")]
    Store { operation: String, reason: String },

    /// Create raced with another writer.
    #[error("{kind} '{key}' already exists")]
    AlreadyExists { kind: &'static str, key: ObjectKey },

    /// Update was rejected, e.g. against a stale resource version.
    #[error("conflict writing {kind} '{key}': {reason}")]
    Conflict {
        kind: &'static str,
        key: ObjectKey,
        reason: String,
    },

    /// Update targeted an object the store does not have.
    #[error("{kind} '{key}' not found")]
    NotFound { kind: &'static str, key: ObjectKey },

    /// The desired App could not be built.
    #[error("failed to build desired app: {reason}")]
    Merge { reason: String },

    /// Invalid configuration.
    #[error("invalid configuration: {reason}")]
    InvalidConfig { reason: String },
}

impl Error {
    /// Create a package not found error.
    pub fn package_not_found(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self::PackageNotFound {
            name: name.into(),
            version: version.into(),
        }
    }

    /// Create a duplicate package error.
    pub fn duplicate_package(
        name: impl Into<String>,
        version: impl Into<String>,
        count: usize,
    ) -> Self {
        Self::DuplicatePackage {
            name: name.into(),
            version: version.into(),
            count,
        }
    }

    /// Create a store error.
    pub fn store(operation: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Store {
            operation: operation.into(),
            reason: reason.into(),
        }
    }

    /// Create an already exists error.
    pub const fn already_exists(kind: &'static str, key: ObjectKey) -> Self {
        Self::AlreadyExists { kind, key }
    }

    /// Create a conflict error.
    pub fn conflict(kind: &'static str, key: ObjectKey, reason: impl Into<String>) -> Self {
        Self::Conflict {
            kind,
            key,
            reason: reason.into(),
        }
    }

    /// Create a not found error.
    pub const fn not_found(kind: &'static str, key: ObjectKey) -> Self {
        Self::NotFound { kind, key }
    }

    /// Create a merge error.
    pub fn merge(reason: impl Into<String>) -> Self {
        Self::Merge {
            reason: reason.into(),
        }
    }

    /// Create an invalid config error.
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }

    /// Whether the caller should schedule another attempt. Always true.
    pub const fn requeue(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_package_not_found_names_both() {
        let err = Error::package_not_found("foo", "9.9.9");
        let msg = err.to_string();
        assert!(msg.contains("'foo'"));
        assert!(msg.contains("'9.9.9'"));
        assert!(err.requeue());
    }

    #[test]
    fn test_conflict_names_object() {
        let err = Error::conflict("App", ObjectKey::new("apps", "web"), "stale resource version");
        assert_eq!(
            err.to_string(),
            "conflict writing App 'apps/web': stale resource version"
        );
    }

    #[test]
    fn test_store_error() {
        let err = Error::store("list_pkgs", "connection reset");
        assert!(err.to_string().contains("list_pkgs"));
        assert!(err.to_string().contains("connection reset"));
    }
}
