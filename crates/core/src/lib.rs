//! Object model for the installed-package controller.
//!
//! Three kinds participate in reconciliation:
//!
//! - **`Pkg`**: a catalog entry, unique by `(publicName, version)`
//! - **`InstalledPkg`**: a user's intent to install a catalog entry
//! - **`App`**: the running application materialized from an intent
//!
//! All kinds serialize to the camelCase YAML/JSON shape used on the wire.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![forbid(clippy::panic)]

pub mod app;
pub mod duration;
pub mod error;
pub mod manifest;
pub mod meta;
pub mod package;

pub use app::{
    App, AppCondition, AppSpec, AppStatus, AppStatusFetch, ConditionStatus, ConditionType,
    DeployStep, FetchStep, GitSource, HelmTemplate, HttpSource, ImageSource, KappDeploy,
    KbldTemplate, SecretRef, TemplateStep, ValuesSource, YttTemplate, API_VERSION,
};
pub use error::{Error, Result};
pub use meta::{ObjectKey, ObjectMeta, OwnerReference};
pub use package::{AppTemplate, InstalledPkg, InstalledPkgSpec, PackageRef, Pkg, PkgSpec};
