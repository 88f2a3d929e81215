//! Store capability traits and implementations.
//!
//! The reconciler consumes three narrow capabilities: reading intents,
//! listing catalog entries, and reading/writing Apps. Absence is reported as
//! `Ok(None)`, never as an error.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use pkgctl_core::{App, InstalledPkg, ObjectKey, Pkg};
use tokio::sync::RwLock;

use crate::error::{Error, Result};

/// Read access to installed-package intents.
#[async_trait]
pub trait InstalledPkgStore: Send + Sync {
    /// Fetch an intent by namespace/name.
    async fn get_installed_pkg(&self, key: &ObjectKey) -> Result<Option<InstalledPkg>>;
}

/// Read access to the package catalog.
#[async_trait]
pub trait PkgStore: Send + Sync {
    /// List every catalog entry, in store order.
    async fn list_pkgs(&self) -> Result<Vec<Pkg>>;
}

/// Read/write access to Apps.
#[async_trait]
pub trait AppStore: Send + Sync {
    /// Fetch an App by namespace/name.
    async fn get_app(&self, key: &ObjectKey) -> Result<Option<App>>;

    /// Create an App. Fails if one already exists under the same key.
    async fn create_app(&self, app: App) -> Result<App>;

    /// Replace an existing App.
    async fn update_app(&self, app: App) -> Result<App>;
}

/// A store call, as recorded by `InMemoryStore`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    GetInstalledPkg,
    ListPkgs,
    GetApp,
    CreateApp,
    UpdateApp,
}

impl Operation {
    /// Whether the call mutates the store.
    pub const fn is_write(self) -> bool {
        matches!(self, Self::CreateApp | Self::UpdateApp)
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::GetInstalledPkg => "get_installed_pkg",
            Self::ListPkgs => "list_pkgs",
            Self::GetApp => "get_app",
            Self::CreateApp => "create_app",
            Self::UpdateApp => "update_app",
        };
        write!(f, "{s}")
    }
}

#[derive(Default)]
struct Objects {
    installed_pkgs: BTreeMap<ObjectKey, InstalledPkg>,
    pkgs: Vec<Pkg>,
    apps: BTreeMap<ObjectKey, App>,
    last_resource_version: u64,
}

impl Objects {
    fn next_resource_version(&mut self) -> String {
        self.last_resource_version = self.last_resource_version.saturating_add(1);
        self.last_resource_version.to_string()
    }
}

/// In-memory store implementing every capability.
///
/// Writes enforce create-once and resource-version checks. Every trait call
/// is appended to an operation log, and a failure can be armed for the next
/// call of a given operation.
#[derive(Default)]
pub struct InMemoryStore {
    objects: RwLock<Objects>,
    calls: RwLock<Vec<Operation>>,
    failures: RwLock<HashMap<Operation, String>>,
}

impl InMemoryStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new empty store wrapped in an Arc.
    pub fn new_arc() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Seed an intent, assigning a uid if it has none.
    pub async fn insert_installed_pkg(&self, mut intent: InstalledPkg) {
        let mut objects = self.objects.write().await;
        let version = objects.next_resource_version();
        if intent.metadata.uid.is_none() {
            intent.metadata.uid = Some(format!("uid-{version}"));
        }
        intent.metadata.resource_version = Some(version);
        objects
            .installed_pkgs
            .insert(intent.metadata.key(), intent);
    }

    /// Seed a catalog entry. Entries list in insertion order.
    pub async fn insert_pkg(&self, pkg: Pkg) {
        self.objects.write().await.pkgs.push(pkg);
    }

    /// Seed an App, bypassing write checks.
    pub async fn insert_app(&self, mut app: App) {
        let mut objects = self.objects.write().await;
        let version = objects.next_resource_version();
        if app.metadata.uid.is_none() {
            app.metadata.uid = Some(format!("uid-{version}"));
        }
        app.metadata.resource_version = Some(version);
        objects.apps.insert(app.metadata.key(), app);
    }

    /// Peek at an App without recording a call.
    pub async fn app(&self, key: &ObjectKey) -> Option<App> {
        self.objects.read().await.apps.get(key).cloned()
    }

    /// Every stored App, ordered by key.
    pub async fn apps(&self) -> Vec<App> {
        self.objects.read().await.apps.values().cloned().collect()
    }

    /// Keys of every stored intent, ordered by key.
    pub async fn installed_pkg_keys(&self) -> Vec<ObjectKey> {
        self.objects
            .read()
            .await
            .installed_pkgs
            .keys()
            .cloned()
            .collect()
    }

    /// Make the next call of `operation` fail with `reason`.
    pub async fn fail_next(&self, operation: Operation, reason: impl Into<String>) {
        self.failures.write().await.insert(operation, reason.into());
    }

    /// Calls recorded so far.
    pub async fn calls(&self) -> Vec<Operation> {
        self.calls.read().await.clone()
    }

    /// Number of recorded calls of `operation`.
    pub async fn call_count(&self, operation: Operation) -> usize {
        self.calls
            .read()
            .await
            .iter()
            .filter(|op| **op == operation)
            .count()
    }

    /// Number of recorded writes.
    pub async fn write_count(&self) -> usize {
        self.calls
            .read()
            .await
            .iter()
            .filter(|op| op.is_write())
            .count()
    }

    /// Forget recorded calls.
    pub async fn clear_calls(&self) {
        self.calls.write().await.clear();
    }

    async fn record(&self, operation: Operation) -> Result<()> {
        self.calls.write().await.push(operation);
        match self.failures.write().await.remove(&operation) {
            Some(reason) => Err(Error::store(operation.to_string(), reason)),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl InstalledPkgStore for InMemoryStore {
    async fn get_installed_pkg(&self, key: &ObjectKey) -> Result<Option<InstalledPkg>> {
        self.record(Operation::GetInstalledPkg).await?;
        Ok(self.objects.read().await.installed_pkgs.get(key).cloned())
    }
}

#[async_trait]
impl PkgStore for InMemoryStore {
    async fn list_pkgs(&self) -> Result<Vec<Pkg>> {
        self.record(Operation::ListPkgs).await?;
        Ok(self.objects.read().await.pkgs.clone())
    }
}

#[async_trait]
impl AppStore for InMemoryStore {
    async fn get_app(&self, key: &ObjectKey) -> Result<Option<App>> {
        self.record(Operation::GetApp).await?;
        Ok(self.objects.read().await.apps.get(key).cloned())
    }

    async fn create_app(&self, mut app: App) -> Result<App> {
        self.record(Operation::CreateApp).await?;

        let key = app.metadata.key();
        let mut objects = self.objects.write().await;
        if objects.apps.contains_key(&key) {
            return Err(Error::already_exists(App::KIND, key));
        }

        let version = objects.next_resource_version();
        app.metadata.uid = Some(format!("uid-{version}"));
        app.metadata.resource_version = Some(version);
        app.metadata.generation = 1;
        app.metadata.creation_timestamp = Some(Utc::now());

        objects.apps.insert(key, app.clone());
        Ok(app)
    }

    async fn update_app(&self, mut app: App) -> Result<App> {
        self.record(Operation::UpdateApp).await?;

        let key = app.metadata.key();
        let mut objects = self.objects.write().await;
        let Some(stored) = objects.apps.get(&key).cloned() else {
            return Err(Error::not_found(App::KIND, key));
        };

        if let Some(expected) = app.metadata.resource_version.as_ref() {
            if stored.metadata.resource_version.as_ref() != Some(expected) {
                return Err(Error::conflict(
                    App::KIND,
                    key,
                    format!(
                        "resource version {expected} is stale (stored {})",
                        stored.metadata.resource_version.as_deref().unwrap_or("none")
                    ),
                ));
            }
        }

        app.metadata.uid = stored.metadata.uid.clone();
        app.metadata.creation_timestamp = stored.metadata.creation_timestamp;
        app.metadata.generation = if app.spec == stored.spec {
            stored.metadata.generation
        } else {
            stored.metadata.generation.saturating_add(1)
        };
        app.metadata.resource_version = Some(objects.next_resource_version());

        objects.apps.insert(key, app.clone());
        Ok(app)
    }
}

/// A wrapper that adds tracing to a store.
pub struct TracingStore<S> {
    inner: S,
}

impl<S> TracingStore<S> {
    /// Create a new tracing store.
    pub const fn new(inner: S) -> Self {
        Self { inner }
    }

    /// The wrapped store.
    pub const fn inner(&self) -> &S {
        &self.inner
    }
}

#[async_trait]
impl<S: InstalledPkgStore> InstalledPkgStore for TracingStore<S> {
    async fn get_installed_pkg(&self, key: &ObjectKey) -> Result<Option<InstalledPkg>> {
        tracing::debug!(key = %key, "Getting InstalledPkg");
        let result = self.inner.get_installed_pkg(key).await;
        if let Ok(None) = result {
            tracing::trace!(key = %key, "InstalledPkg absent");
        }
        result
    }
}

#[async_trait]
impl<S: PkgStore> PkgStore for TracingStore<S> {
    async fn list_pkgs(&self) -> Result<Vec<Pkg>> {
        tracing::debug!("Listing Pkgs");
        let result = self.inner.list_pkgs().await;
        if let Ok(ref pkgs) = result {
            tracing::trace!(count = pkgs.len(), "Pkgs listed");
        }
        result
    }
}

#[async_trait]
impl<S: AppStore> AppStore for TracingStore<S> {
    async fn get_app(&self, key: &ObjectKey) -> Result<Option<App>> {
        tracing::debug!(key = %key, "Getting App");
        self.inner.get_app(key).await
    }

    async fn create_app(&self, app: App) -> Result<App> {
        tracing::debug!(key = %app.metadata.key(), "Creating App");
        let result = self.inner.create_app(app).await;
        if let Ok(ref created) = result {
            tracing::trace!(
                resource_version = ?created.metadata.resource_version,
                "App created"
            );
        }
        result
    }

    async fn update_app(&self, app: App) -> Result<App> {
        tracing::debug!(
            key = %app.metadata.key(),
            resource_version = ?app.metadata.resource_version,
            "Updating App"
        );
        let result = self.inner.update_app(app).await;
        if let Ok(ref updated) = result {
            tracing::trace!(
                resource_version = ?updated.metadata.resource_version,
                "App updated"
            );
        }
        result
    }
}
