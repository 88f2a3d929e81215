//! Catalog packages (`Pkg`) and installed-package intents (`InstalledPkg`).

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::app::{AppSpec, ValuesSource, API_VERSION};
use crate::meta::{ObjectMeta, OwnerReference};

/// Identifies a catalog entry by public name and version.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageRef {
    pub public_name: String,
    pub version: String,
}

impl PackageRef {
    /// Create a new package reference.
    pub fn new(public_name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            public_name: public_name.into(),
            version: version.into(),
        }
    }
}

impl fmt::Display for PackageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.public_name, self.version)
    }
}

/// A named, versioned package definition from the catalog.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pkg {
    pub metadata: ObjectMeta,
    pub spec: PkgSpec,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PkgSpec {
    pub public_name: String,
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<AppTemplate>,
}

/// App spec stamped out for every install of a package.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppTemplate {
    pub spec: AppSpec,
}

impl Pkg {
    /// Create a catalog entry named `<public_name>.<version>`.
    pub fn new(public_name: impl Into<String>, version: impl Into<String>) -> Self {
        let public_name = public_name.into();
        let version = version.into();
        Self {
            metadata: ObjectMeta::cluster_scoped(format!("{public_name}.{version}")),
            spec: PkgSpec {
                public_name,
                version,
                description: None,
                template: None,
            },
        }
    }

    /// Attach an App template.
    #[must_use]
    pub fn with_template(mut self, spec: AppSpec) -> Self {
        self.spec.template = Some(AppTemplate { spec });
        self
    }

    /// Whether this entry is the one `reference` asks for.
    pub fn matches(&self, reference: &PackageRef) -> bool {
        self.spec.public_name == reference.public_name && self.spec.version == reference.version
    }

    /// The `(public_name, version)` identity of this entry.
    pub fn package_ref(&self) -> PackageRef {
        PackageRef::new(self.spec.public_name.clone(), self.spec.version.clone())
    }
}

/// A user's declared desire to have a catalog package installed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstalledPkg {
    pub metadata: ObjectMeta,
    pub spec: InstalledPkgSpec,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstalledPkgSpec {
    pub pkg_ref: PackageRef,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_account_name: Option<String>,
    #[serde(
        default,
        with = "crate::duration::option_secs",
        skip_serializing_if = "Option::is_none"
    )]
    pub sync_period: Option<Duration>,
    /// Values handed to every template step that accepts values.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub values: Vec<ValuesSource>,
}

impl InstalledPkg {
    /// Kind name used in owner references and logs.
    pub const KIND: &'static str = "InstalledPkg";

    /// Create an intent to install `pkg_ref` as `namespace/name`.
    pub fn new(namespace: impl Into<String>, name: impl Into<String>, pkg_ref: PackageRef) -> Self {
        Self {
            metadata: ObjectMeta::new(namespace, name),
            spec: InstalledPkgSpec {
                pkg_ref,
                ..Default::default()
            },
        }
    }

    /// Set the service account.
    #[must_use]
    pub fn with_service_account(mut self, name: impl Into<String>) -> Self {
        self.spec.service_account_name = Some(name.into());
        self
    }

    /// Set the sync period.
    #[must_use]
    pub const fn with_sync_period(mut self, period: Duration) -> Self {
        self.spec.sync_period = Some(period);
        self
    }

    /// Add a values source.
    #[must_use]
    pub fn with_values(mut self, values: ValuesSource) -> Self {
        self.spec.values.push(values);
        self
    }

    /// Controller owner reference pointing at this intent.
    pub fn controller_reference(&self) -> OwnerReference {
        OwnerReference {
            api_version: API_VERSION.to_string(),
            kind: Self::KIND.to_string(),
            name: self.metadata.name.clone(),
            uid: self.metadata.uid.clone().unwrap_or_default(),
            controller: true,
            block_owner_deletion: true,
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn test_pkg_matches_name_and_version() {
        let pkg = Pkg::new("nginx", "1.2.0");
        assert!(pkg.matches(&PackageRef::new("nginx", "1.2.0")));
        assert!(!pkg.matches(&PackageRef::new("nginx", "1.3.0")));
        assert!(!pkg.matches(&PackageRef::new("redis", "1.2.0")));
        assert_eq!(pkg.metadata.name, "nginx.1.2.0");
    }

    #[test]
    fn test_controller_reference() {
        let mut intent = InstalledPkg::new("apps", "web", PackageRef::new("nginx", "1.2.0"));
        intent.metadata.uid = Some("uid-7".into());

        let owner = intent.controller_reference();
        assert_eq!(owner.kind, "InstalledPkg");
        assert_eq!(owner.name, "web");
        assert_eq!(owner.uid, "uid-7");
        assert!(owner.controller);
    }

    #[test]
    fn test_installed_pkg_yaml_shape() {
        let yaml = r"
metadata:
  name: web
  namespace: apps
spec:
  pkgRef:
    publicName: nginx
    version: 1.2.0
  serviceAccountName: deployer
  syncPeriod: 120
  values:
    - secretRef:
        name: web-values
";
        let intent: InstalledPkg = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(intent.spec.pkg_ref, PackageRef::new("nginx", "1.2.0"));
        assert_eq!(intent.spec.sync_period, Some(Duration::from_secs(120)));
        assert_eq!(intent.spec.values, vec![ValuesSource::secret("web-values")]);
        assert_eq!(intent.spec.pkg_ref.to_string(), "nginx@1.2.0");
    }
}
