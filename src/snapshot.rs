//! Cluster snapshots and dry-run reconcile passes.
//!
//! A snapshot is a plain document of intents, catalog entries and Apps.
//! It is loaded into an `InMemoryStore`, every intent is reconciled once, and
//! the outcome of each request is collected into a `PassReport`.

use std::path::Path;
use std::sync::Arc;

use pkgctl_core::{manifest, App, Error, InstalledPkg, Pkg};
use pkgctl_reconciler::{ControllerConfig, InMemoryStore, InstalledPkgReconciler, Requeue};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Objects a dry-run pass starts from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterSnapshot {
    #[serde(default)]
    pub installed_pkgs: Vec<InstalledPkg>,
    #[serde(default)]
    pub pkgs: Vec<Pkg>,
    #[serde(default)]
    pub apps: Vec<App>,
}

impl ClusterSnapshot {
    /// Load a snapshot from a YAML or JSON file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or decoded, or an object
    /// in it is missing its identity.
    pub fn load(path: &Path) -> pkgctl_core::Result<Self> {
        let snapshot: Self = manifest::from_file(path)?;
        snapshot.validate()?;
        Ok(snapshot)
    }

    /// Check that every intent and App is addressable and every catalog
    /// entry names a package.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidObject` for the first offending object.
    pub fn validate(&self) -> pkgctl_core::Result<()> {
        let unaddressable = self
            .installed_pkgs
            .iter()
            .map(|intent| (InstalledPkg::KIND, &intent.metadata))
            .chain(self.apps.iter().map(|app| (App::KIND, &app.metadata)))
            .find(|(_, meta)| meta.name.is_empty() || meta.namespace.is_empty());
        if let Some((kind, meta)) = unaddressable {
            return Err(Error::invalid_object(format!(
                "{kind} '{}' needs both a namespace and a name",
                meta.key()
            )));
        }

        if let Some(pkg) = self
            .pkgs
            .iter()
            .find(|pkg| pkg.spec.public_name.is_empty() || pkg.spec.version.is_empty())
        {
            return Err(Error::invalid_object(format!(
                "Pkg '{}' needs both a publicName and a version",
                pkg.metadata.name
            )));
        }

        Ok(())
    }

    /// Seed a fresh in-memory store with every object in the snapshot.
    pub async fn into_store(self) -> Arc<InMemoryStore> {
        let store = InMemoryStore::new_arc();
        for pkg in self.pkgs {
            store.insert_pkg(pkg).await;
        }
        for intent in self.installed_pkgs {
            store.insert_installed_pkg(intent).await;
        }
        for app in self.apps {
            store.insert_app(app).await;
        }
        store
    }
}

/// Result of reconciling one request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PassEntry {
    pub request: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Whether the request created or updated an App.
    pub changed: bool,
    pub requeue: bool,
}

/// Everything one pass did.
#[derive(Debug, Clone, Serialize)]
pub struct PassReport {
    pub entries: Vec<PassEntry>,
    /// Apps as stored after the pass, ordered by key.
    pub apps: Vec<App>,
    pub writes: usize,
}

impl PassReport {
    /// Number of requests that asked for a retry.
    pub fn retries(&self) -> usize {
        self.entries.iter().filter(|e| e.requeue).count()
    }
}

/// Reconcile every intent in `snapshot` once, in key order.
///
/// # Errors
///
/// Returns `Error::InvalidConfig` if `config` is invalid. Per-request
/// failures are reported in the `PassReport`, not here.
pub async fn run_pass(
    snapshot: ClusterSnapshot,
    config: ControllerConfig,
) -> pkgctl_reconciler::Result<PassReport> {
    let store = snapshot.into_store().await;
    let reconciler = InstalledPkgReconciler::with_store(store.clone(), config)?;

    let mut entries = Vec::new();
    for request in store.installed_pkg_keys().await {
        let result = reconciler.reconcile(&request).await;
        let requeue = Requeue::from_result(&result).is_retry();

        let entry = match result {
            Ok(outcome) => {
                info!(
                    request = %request,
                    outcome = %outcome,
                    changed = outcome.wrote(),
                    "Reconciled"
                );
                PassEntry {
                    request: request.to_string(),
                    outcome: Some(outcome.to_string()),
                    error: None,
                    changed: outcome.wrote(),
                    requeue,
                }
            }
            Err(e) => {
                warn!(request = %request, error = %e, "Reconcile failed, would requeue");
                PassEntry {
                    request: request.to_string(),
                    outcome: None,
                    error: Some(e.to_string()),
                    changed: false,
                    requeue,
                }
            }
        };
        entries.push(entry);
    }

    Ok(PassReport {
        entries,
        apps: store.apps().await,
        writes: store.write_count().await,
    })
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::expect_used)]

    use super::*;
    use std::io::Write;

    const SNAPSHOT: &str = r"
installedPkgs:
  - metadata:
      name: web
      namespace: apps
    spec:
      pkgRef:
        publicName: nginx
        version: 1.2.0
  - metadata:
      name: broken
      namespace: apps
    spec:
      pkgRef:
        publicName: foo
        version: 9.9.9
pkgs:
  - metadata:
      name: nginx.1.2.0
    spec:
      publicName: nginx
      version: 1.2.0
      template:
        spec:
          fetch:
            - image:
                url: registry.example.com/nginx:1.2.0
          template:
            - ytt:
                paths: [config]
          deploy:
            - kapp: {}
";

    #[tokio::test]
    async fn test_pass_reports_each_intent() {
        let snapshot: ClusterSnapshot = manifest::from_yaml(SNAPSHOT).unwrap();
        let report = run_pass(snapshot, ControllerConfig::default()).await.unwrap();

        assert_eq!(report.entries.len(), 2);
        let broken = report
            .entries
            .iter()
            .find(|e| e.request == "apps/broken")
            .unwrap();
        assert!(broken.requeue);
        assert!(!broken.changed);
        assert!(broken.error.as_deref().unwrap_or_default().contains("9.9.9"));

        let web = report.entries.iter().find(|e| e.request == "apps/web").unwrap();
        assert_eq!(web.outcome.as_deref(), Some("app created"));
        assert!(web.changed);
        assert!(!web.requeue);

        assert_eq!(report.apps.len(), 1);
        assert_eq!(report.writes, 1);
        assert_eq!(report.retries(), 1);
    }

    #[tokio::test]
    async fn test_second_pass_over_result_writes_nothing() {
        let mut snapshot: ClusterSnapshot = manifest::from_yaml(SNAPSHOT).unwrap();
        let first = run_pass(snapshot.clone(), ControllerConfig::default()).await.unwrap();

        snapshot.apps = first.apps;
        let second = run_pass(snapshot, ControllerConfig::default()).await.unwrap();

        assert_eq!(second.writes, 0);
        let web = second.entries.iter().find(|e| e.request == "apps/web").unwrap();
        assert_eq!(web.outcome.as_deref(), Some("app unchanged"));
        assert!(!web.changed);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        file.write_all(SNAPSHOT.as_bytes()).unwrap();

        let snapshot = ClusterSnapshot::load(file.path()).unwrap();
        assert_eq!(snapshot.installed_pkgs.len(), 2);
        assert_eq!(snapshot.pkgs.len(), 1);
        assert!(snapshot.apps.is_empty());
    }

    #[test]
    fn test_intent_without_namespace_is_rejected() {
        let snapshot: ClusterSnapshot = manifest::from_yaml(
            "installedPkgs:\n  - metadata:\n      name: web\n    spec:\n      pkgRef:\n        publicName: nginx\n        version: 1.2.0\n",
        )
        .unwrap();

        assert!(matches!(
            snapshot.validate(),
            Err(Error::InvalidObject { .. })
        ));
    }
}
