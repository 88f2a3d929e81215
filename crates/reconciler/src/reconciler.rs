//! Reconcile entry point for installed-package intents.

use std::sync::Arc;

use pkgctl_core::App;
use tracing::{debug, error, info};

use crate::config::ControllerConfig;
use crate::error::{Error, Result};
use crate::installed_pkg::InstalledPkgCr;
use crate::merge::{AppMerger, TemplateMerger};
use crate::store::{AppStore, InstalledPkgStore, PkgStore};
use crate::timer::ReconcileTimer;
use crate::types::{ReconcileOutcome, Request};

/// Adapts a namespace/name request into a reconcile of the stored intent.
///
/// Holds no per-object state, so one instance may serve concurrent requests
/// for different objects. Requests for the same object must be serialized
/// by the caller.
pub struct InstalledPkgReconciler {
    intents: Arc<dyn InstalledPkgStore>,
    pkgs: Arc<dyn PkgStore>,
    apps: Arc<dyn AppStore>,
    merger: Arc<dyn AppMerger>,
    config: ControllerConfig,
}

impl InstalledPkgReconciler {
    /// Create a new reconciler.
    pub fn new(
        intents: Arc<dyn InstalledPkgStore>,
        pkgs: Arc<dyn PkgStore>,
        apps: Arc<dyn AppStore>,
        merger: Arc<dyn AppMerger>,
        config: ControllerConfig,
    ) -> Self {
        Self {
            intents,
            pkgs,
            apps,
            merger,
            config,
        }
    }

    /// Create a reconciler over one store serving every capability, with the
    /// default template merger.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidConfig` if the configuration is invalid.
    pub fn with_store<S>(store: Arc<S>, config: ControllerConfig) -> Result<Self>
    where
        S: InstalledPkgStore + PkgStore + AppStore + 'static,
    {
        ReconcilerBuilder::new()
            .with_store(store)
            .with_config(config)
            .build()
    }

    /// Reconcile the intent named by `request`.
    ///
    /// A missing or deleting intent is a clean no-op. Otherwise the result of
    /// the installed-package state machine is returned unchanged.
    ///
    /// # Errors
    ///
    /// Returns an error if the intent cannot be fetched or the state machine
    /// fails. Every error asks for a requeue.
    pub async fn reconcile(&self, request: &Request) -> Result<ReconcileOutcome> {
        let intent = match self.intents.get_installed_pkg(request).await {
            Ok(Some(intent)) => intent,
            Ok(None) => {
                info!(request = %request, "Could not find InstalledPkg");
                return Ok(ReconcileOutcome::IntentNotFound);
            }
            Err(e) => {
                error!(request = %request, error = %e, "Could not fetch InstalledPkg");
                return Err(e);
            }
        };

        if intent.metadata.is_being_deleted() {
            debug!(request = %request, "InstalledPkg is being deleted, nothing to do");
            return Ok(ReconcileOutcome::IntentDeleting);
        }

        InstalledPkgCr::new(
            &intent,
            self.pkgs.as_ref(),
            self.apps.as_ref(),
            self.merger.as_ref(),
        )
        .reconcile()
        .await
    }

    /// Re-check timer for an App under this controller's configuration.
    pub fn timer<'a>(&self, app: &'a App) -> ReconcileTimer<'a> {
        ReconcileTimer::with_config(app, &self.config)
    }

    /// Get the configuration.
    pub const fn config(&self) -> &ControllerConfig {
        &self.config
    }
}

/// Builder for `InstalledPkgReconciler`.
#[derive(Default)]
pub struct ReconcilerBuilder {
    intents: Option<Arc<dyn InstalledPkgStore>>,
    pkgs: Option<Arc<dyn PkgStore>>,
    apps: Option<Arc<dyn AppStore>>,
    merger: Option<Arc<dyn AppMerger>>,
    config: ControllerConfig,
}

impl ReconcilerBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Use one store for intents, packages and Apps.
    #[must_use]
    pub fn with_store<S>(mut self, store: Arc<S>) -> Self
    where
        S: InstalledPkgStore + PkgStore + AppStore + 'static,
    {
        self.intents = Some(store.clone());
        self.pkgs = Some(store.clone());
        self.apps = Some(store);
        self
    }

    /// Set the intent store.
    #[must_use]
    pub fn with_intents(mut self, intents: Arc<dyn InstalledPkgStore>) -> Self {
        self.intents = Some(intents);
        self
    }

    /// Set the catalog store.
    #[must_use]
    pub fn with_pkgs(mut self, pkgs: Arc<dyn PkgStore>) -> Self {
        self.pkgs = Some(pkgs);
        self
    }

    /// Set the App store.
    #[must_use]
    pub fn with_apps(mut self, apps: Arc<dyn AppStore>) -> Self {
        self.apps = Some(apps);
        self
    }

    /// Set a custom merger.
    #[must_use]
    pub fn with_merger(mut self, merger: Arc<dyn AppMerger>) -> Self {
        self.merger = Some(merger);
        self
    }

    /// Set the configuration.
    #[must_use]
    pub fn with_config(mut self, config: ControllerConfig) -> Self {
        self.config = config;
        self
    }

    /// Build the reconciler.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidConfig` if a store is missing or the
    /// configuration is invalid.
    pub fn build(self) -> Result<InstalledPkgReconciler> {
        self.config.validate()?;

        let intents = self
            .intents
            .ok_or_else(|| Error::invalid_config("InstalledPkg store is required"))?;
        let pkgs = self
            .pkgs
            .ok_or_else(|| Error::invalid_config("Pkg store is required"))?;
        let apps = self
            .apps
            .ok_or_else(|| Error::invalid_config("App store is required"))?;
        let merger = self
            .merger
            .unwrap_or_else(|| Arc::new(TemplateMerger::from_config(&self.config)));

        Ok(InstalledPkgReconciler::new(
            intents,
            pkgs,
            apps,
            merger,
            self.config,
        ))
    }
}
