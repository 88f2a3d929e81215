//! Installed-package reconciliation.
//!
//! An `InstalledPkg` declares that a catalog package (name + version) should
//! be running in a namespace. This crate keeps a same-named `App` converged
//! with that declaration:
//!
//! - **Entry point**: `InstalledPkgReconciler` fetches the intent named by a
//!   request and skips missing or deleting intents.
//! - **State machine**: `InstalledPkgCr` resolves the package, then creates
//!   the App or updates it only when it semantically differs.
//! - **Timer**: `ReconcileTimer` decides when an App is next due for a
//!   re-check, backing off exponentially after failures.
//!
//! Store access goes through the `InstalledPkgStore`, `PkgStore` and
//! `AppStore` traits. `InMemoryStore` backs tests and dry runs.
//!
//! # Example
//!
//! ```ignore
//! use pkgctl_reconciler::{ControllerConfig, InMemoryStore, InstalledPkgReconciler, Requeue};
//! use pkgctl_core::ObjectKey;
//!
//! #[tokio::main]
//! async fn main() -> pkgctl_reconciler::Result<()> {
//!     let store = InMemoryStore::new_arc();
//!     let reconciler = InstalledPkgReconciler::with_store(store, ControllerConfig::default())?;
//!
//!     let result = reconciler.reconcile(&ObjectKey::new("apps", "web")).await;
//!     if Requeue::from_result(&result).is_retry() {
//!         // hand back to the scheduler
//!     }
//!     Ok(())
//! }
//! ```

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![forbid(clippy::panic)]

pub mod config;
pub mod error;
pub mod installed_pkg;
pub mod merge;
pub mod reconciler;
pub mod store;
pub mod timer;
pub mod types;

// Re-export main types
pub use config::{ControllerConfig, DEFAULT_MAX_JITTER, DEFAULT_SYNC_PERIOD};
pub use error::{Error, Result};
pub use installed_pkg::InstalledPkgCr;
pub use merge::{AppMerger, TemplateMerger, INSTALLED_PKG_LABEL};
pub use reconciler::{InstalledPkgReconciler, ReconcilerBuilder};
pub use store::{AppStore, InMemoryStore, InstalledPkgStore, Operation, PkgStore, TracingStore};
pub use timer::ReconcileTimer;
pub use types::{ReconcileOutcome, Requeue, Request};
