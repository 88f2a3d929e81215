//! Converging one installed-package intent toward its App.

use itertools::Itertools;
use pkgctl_core::{App, InstalledPkg, Pkg};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::merge::AppMerger;
use crate::store::{AppStore, PkgStore};
use crate::types::ReconcileOutcome;

/// Reconciles a single fetched intent.
///
/// Per invocation this issues at most one catalog list, one App get and one
/// App create or update. There is no internal retry; every error is handed
/// back for the caller to requeue.
pub struct InstalledPkgCr<'a> {
    model: &'a InstalledPkg,
    pkgs: &'a dyn PkgStore,
    apps: &'a dyn AppStore,
    merger: &'a dyn AppMerger,
}

impl<'a> InstalledPkgCr<'a> {
    /// Wrap an intent with the capabilities needed to reconcile it.
    pub fn new(
        model: &'a InstalledPkg,
        pkgs: &'a dyn PkgStore,
        apps: &'a dyn AppStore,
        merger: &'a dyn AppMerger,
    ) -> Self {
        Self {
            model,
            pkgs,
            apps,
            merger,
        }
    }

    /// Resolve the package, then create or update the App.
    ///
    /// # Errors
    ///
    /// Returns an error if the package cannot be resolved, the desired App
    /// cannot be built, or any store call fails.
    pub async fn reconcile(&self) -> Result<ReconcileOutcome> {
        let key = self.model.metadata.key();
        info!(
            namespace = %key.namespace,
            name = %key.name,
            "Reconciling InstalledPkg"
        );

        let pkg = self.referenced_pkg().await?;

        match self.apps.get_app(&key).await? {
            None => self.create_app_from_pkg(&pkg).await,
            Some(existing) => self.reconcile_app_with_pkg(&existing, &pkg).await,
        }
    }

    async fn create_app_from_pkg(&self, pkg: &Pkg) -> Result<ReconcileOutcome> {
        let desired = self.merger.desired_app(&App::default(), self.model, pkg)?;

        self.apps.create_app(desired).await.inspect_err(|e| {
            warn!(key = %self.model.metadata.key(), error = %e, "Failed to create App");
        })?;

        info!(
            key = %self.model.metadata.key(),
            pkg = %pkg.spec.public_name,
            version = %pkg.spec.version,
            "Created App"
        );
        Ok(ReconcileOutcome::AppCreated)
    }

    async fn reconcile_app_with_pkg(
        &self,
        existing: &App,
        pkg: &Pkg,
    ) -> Result<ReconcileOutcome> {
        let desired = self.merger.desired_app(existing, self.model, pkg)?;

        if desired.semantically_equals(existing) {
            debug!(key = %self.model.metadata.key(), "App up to date, skipping update");
            return Ok(ReconcileOutcome::AppUnchanged);
        }

        self.apps.update_app(desired).await.inspect_err(|e| {
            warn!(key = %self.model.metadata.key(), error = %e, "Failed to update App");
        })?;

        info!(
            key = %self.model.metadata.key(),
            pkg = %pkg.spec.public_name,
            version = %pkg.spec.version,
            "Updated App"
        );
        Ok(ReconcileOutcome::AppUpdated)
    }

    /// Find the single catalog entry matching the intent's package reference.
    async fn referenced_pkg(&self) -> Result<Pkg> {
        let wanted = &self.model.spec.pkg_ref;
        let pkgs = self.pkgs.list_pkgs().await?;

        let mut matches = pkgs.into_iter().filter(|pkg| pkg.matches(wanted)).collect_vec();
        if matches.len() > 1 {
            warn!(
                pkg = %wanted.public_name,
                version = %wanted.version,
                count = matches.len(),
                "Catalog holds duplicate packages"
            );
            return Err(Error::duplicate_package(
                wanted.public_name.clone(),
                wanted.version.clone(),
                matches.len(),
            ));
        }

        matches.pop().ok_or_else(|| {
            warn!(pkg = %wanted.public_name, version = %wanted.version, "Package not found");
            Error::package_not_found(wanted.public_name.clone(), wanted.version.clone())
        })
    }
}
