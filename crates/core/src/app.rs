//! The materialized App resource.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::meta::ObjectMeta;

/// API version shared by every kind in this model.
pub const API_VERSION: &str = "kappctrl.k14s.io/v1alpha1";

/// A running application produced from a catalog package.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct App {
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: AppSpec,
    #[serde(default)]
    pub status: AppStatus,
}

impl App {
    /// Kind name used in owner references and logs.
    pub const KIND: &'static str = "App";

    /// Create an empty App with the given identity.
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            metadata: ObjectMeta::new(namespace, name),
            ..Default::default()
        }
    }

    /// Set the spec.
    #[must_use]
    pub fn with_spec(mut self, spec: AppSpec) -> Self {
        self.spec = spec;
        self
    }

    /// Set the status.
    #[must_use]
    pub fn with_status(mut self, status: AppStatus) -> Self {
        self.status = status;
        self
    }

    /// Structural equality ignoring store-assigned bookkeeping
    /// (`uid`, `resource_version`, `generation`, `creation_timestamp`).
    pub fn semantically_equals(&self, other: &Self) -> bool {
        self.metadata.semantically_equals(&other.metadata)
            && self.spec == other.spec
            && self.status == other.status
    }
}

/// Desired deployment description of an App.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_account_name: Option<String>,
    /// Resync interval; also the ceiling of failure backoff.
    #[serde(
        default,
        with = "crate::duration::option_secs",
        skip_serializing_if = "Option::is_none"
    )]
    pub sync_period: Option<Duration>,
    #[serde(default)]
    pub paused: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fetch: Vec<FetchStep>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub template: Vec<TemplateStep>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub deploy: Vec<DeployStep>,
}

/// Where App sources come from. Exactly one field is expected to be set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchStep {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inline: Option<BTreeMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<ImageSource>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git: Option<GitSource>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http: Option<HttpSource>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageSource {
    pub url: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GitSource {
    pub url: String,
    #[serde(default, rename = "ref", skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_path: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpSource {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,
}

/// A templating step. Exactly one field is expected to be set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateStep {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ytt: Option<YttTemplate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub helm_template: Option<HelmTemplate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kbld: Option<KbldTemplate>,
}

impl TemplateStep {
    /// Values sources of this step, if the step accepts values.
    pub fn values_from_mut(&mut self) -> Option<&mut Vec<ValuesSource>> {
        if let Some(ytt) = self.ytt.as_mut() {
            return Some(&mut ytt.values_from);
        }
        self.helm_template.as_mut().map(|helm| &mut helm.values_from)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct YttTemplate {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub paths: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub values_from: Vec<ValuesSource>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HelmTemplate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub values_from: Vec<ValuesSource>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KbldTemplate {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub paths: Vec<String>,
}

/// A source of template values: a secret reference or inline key/value pairs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValuesSource {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_ref: Option<SecretRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inline: Option<BTreeMap<String, String>>,
}

impl ValuesSource {
    /// Values read from the named secret.
    pub fn secret(name: impl Into<String>) -> Self {
        Self {
            secret_ref: Some(SecretRef { name: name.into() }),
            inline: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretRef {
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployStep {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kapp: Option<KappDeploy>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KappDeploy {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub into_ns: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub raw_options: Vec<String>,
}

/// Observed state of an App, written by the App's own controller.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppStatus {
    /// Ordered condition entries; the last one is the latest.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<AppCondition>,
    #[serde(default)]
    pub consecutive_reconcile_successes: u32,
    #[serde(default)]
    pub consecutive_reconcile_failures: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fetch: Option<AppStatusFetch>,
    #[serde(default)]
    pub observed_generation: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub friendly_description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub useful_error_message: Option<String>,
}

impl AppStatus {
    /// The most recently recorded condition.
    pub fn latest_condition(&self) -> Option<&AppCondition> {
        self.conditions.last()
    }

    /// When sources were last fetched, if ever.
    pub fn last_updated_at(&self) -> Option<DateTime<Utc>> {
        self.fetch.as_ref().map(|fetch| fetch.updated_at)
    }

    /// Status of an App whose last reconcile succeeded.
    pub fn succeeded(updated_at: DateTime<Utc>) -> Self {
        Self {
            conditions: vec![AppCondition::new(ConditionType::ReconcileSucceeded)],
            consecutive_reconcile_successes: 1,
            fetch: Some(AppStatusFetch::at(updated_at)),
            ..Default::default()
        }
    }

    /// Status of an App that has failed `failures` times in a row.
    pub fn failed(updated_at: DateTime<Utc>, failures: u32) -> Self {
        Self {
            conditions: vec![AppCondition::new(ConditionType::ReconcileFailed)],
            consecutive_reconcile_failures: failures,
            fetch: Some(AppStatusFetch::at(updated_at)),
            ..Default::default()
        }
    }
}

/// A named status entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppCondition {
    #[serde(rename = "type")]
    pub kind: ConditionType,
    #[serde(default)]
    pub status: ConditionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl AppCondition {
    /// A condition of the given type with status `True`.
    pub const fn new(kind: ConditionType) -> Self {
        Self {
            kind,
            status: ConditionStatus::True,
            reason: None,
            message: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConditionType {
    Reconciling,
    ReconcileSucceeded,
    ReconcileFailed,
    Deleting,
    DeleteFailed,
}

impl fmt::Display for ConditionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Reconciling => "Reconciling",
            Self::ReconcileSucceeded => "ReconcileSucceeded",
            Self::ReconcileFailed => "ReconcileFailed",
            Self::Deleting => "Deleting",
            Self::DeleteFailed => "DeleteFailed",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConditionStatus {
    #[default]
    True,
    False,
    Unknown,
}

/// Result of the most recent source fetch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppStatusFetch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub exit_code: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AppStatusFetch {
    /// A successful fetch that finished at `updated_at`.
    pub const fn at(updated_at: DateTime<Utc>) -> Self {
        Self {
            started_at: None,
            updated_at,
            exit_code: 0,
            error: None,
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn test_latest_condition_is_last_entry() {
        let status = AppStatus {
            conditions: vec![
                AppCondition::new(ConditionType::ReconcileFailed),
                AppCondition::new(ConditionType::ReconcileSucceeded),
            ],
            ..Default::default()
        };
        assert_eq!(
            status.latest_condition().map(|c| c.kind),
            Some(ConditionType::ReconcileSucceeded)
        );
        assert!(AppStatus::default().latest_condition().is_none());
    }

    #[test]
    fn test_semantic_equality_ignores_resource_version() {
        let app = App::new("default", "nginx");
        let mut stored = app.clone();
        stored.metadata.resource_version = Some("3".into());
        stored.metadata.uid = Some("abc".into());
        assert!(app.semantically_equals(&stored));

        stored.spec.paused = true;
        assert!(!app.semantically_equals(&stored));
    }

    #[test]
    fn test_values_from_mut_prefers_ytt_then_helm() {
        let mut kbld = TemplateStep {
            kbld: Some(KbldTemplate::default()),
            ..Default::default()
        };
        assert!(kbld.values_from_mut().is_none());

        let mut helm = TemplateStep {
            helm_template: Some(HelmTemplate::default()),
            ..Default::default()
        };
        if let Some(values) = helm.values_from_mut() {
            values.push(ValuesSource::secret("vals"));
        }
        assert_eq!(helm.helm_template.map(|h| h.values_from.len()), Some(1));
    }

    #[test]
    fn test_app_yaml_shape() {
        let yaml = r"
metadata:
  name: nginx
  namespace: default
spec:
  syncPeriod: 60
  fetch:
    - image:
        url: registry.example.com/nginx-bundle:1.0.0
  template:
    - ytt:
        paths: [config]
  deploy:
    - kapp:
        intoNs: web
status:
  consecutiveReconcileFailures: 2
  conditions:
    - type: ReconcileFailed
  fetch:
    updatedAt: 2024-05-01T10:00:00Z
";
        let app: App = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(app.spec.sync_period, Some(Duration::from_secs(60)));
        assert_eq!(app.status.consecutive_reconcile_failures, 2);
        assert_eq!(
            app.status.latest_condition().map(|c| c.kind),
            Some(ConditionType::ReconcileFailed)
        );
        assert!(app.status.last_updated_at().is_some());
        assert_eq!(
            app.spec.deploy.first().and_then(|d| d.kapp.as_ref()).and_then(|k| k.into_ns.clone()),
            Some("web".to_string())
        );
    }
}
