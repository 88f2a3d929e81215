//! Building the desired App from an intent and its catalog package.

use pkgctl_core::{App, InstalledPkg, Pkg};

use crate::config::ControllerConfig;
use crate::error::{Error, Result};

/// Label linking an App back to the intent that produced it.
pub const INSTALLED_PKG_LABEL: &str = "pkgctl.dev/installed-pkg";

/// Builds the App an intent should materialize as.
pub trait AppMerger: Send + Sync {
    /// Overlay `intent` and `pkg` onto `existing` (an empty App on create).
    ///
    /// # Errors
    ///
    /// Returns `Error::Merge` when no desired App can be built.
    fn desired_app(&self, existing: &App, intent: &InstalledPkg, pkg: &Pkg) -> Result<App>;
}

/// Stamps out the package's App template.
///
/// The App spec is replaced wholesale by the template, then the intent's
/// service account, sync period and values are overlaid. Status and store
/// bookkeeping of `existing` are kept as-is.
#[derive(Debug, Clone, Default)]
pub struct TemplateMerger {
    default_service_account: Option<String>,
}

impl TemplateMerger {
    /// Create a merger with no default service account.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a merger from controller configuration.
    pub fn from_config(config: &ControllerConfig) -> Self {
        Self {
            default_service_account: config.default_service_account.clone(),
        }
    }
}

impl AppMerger for TemplateMerger {
    fn desired_app(&self, existing: &App, intent: &InstalledPkg, pkg: &Pkg) -> Result<App> {
        let template = pkg.spec.template.as_ref().ok_or_else(|| {
            Error::merge(format!("package '{}' has no app template", pkg.package_ref()))
        })?;

        let mut desired = existing.clone();
        desired.metadata.name.clone_from(&intent.metadata.name);
        desired.metadata.namespace.clone_from(&intent.metadata.namespace);
        desired
            .metadata
            .labels
            .insert(INSTALLED_PKG_LABEL.to_string(), intent.metadata.name.clone());
        set_controller_reference(&mut desired, intent)?;

        let template_service_account = template.spec.service_account_name.clone();
        let template_sync_period = template.spec.sync_period;
        desired.spec = template.spec.clone();
        desired.spec.service_account_name = intent
            .spec
            .service_account_name
            .clone()
            .or_else(|| self.default_service_account.clone())
            .or(template_service_account);
        desired.spec.sync_period = intent.spec.sync_period.or(template_sync_period);

        if !intent.spec.values.is_empty() {
            for step in &mut desired.spec.template {
                if let Some(values_from) = step.values_from_mut() {
                    values_from.extend(intent.spec.values.iter().cloned());
                }
            }
        }

        Ok(desired)
    }
}

// An App controlled by someone else is never taken over.
fn set_controller_reference(app: &mut App, intent: &InstalledPkg) -> Result<()> {
    let owner = intent.controller_reference();

    if let Some(current) = app.metadata.controller_owner() {
        if current.kind != owner.kind || current.name != owner.name {
            return Err(Error::merge(format!(
                "app '{}' is already controlled by {} '{}'",
                app.metadata.key(),
                current.kind,
                current.name
            )));
        }
    }

    app.metadata
        .owner_references
        .retain(|o| !(o.controller || (o.kind == owner.kind && o.name == owner.name)));
    app.metadata.owner_references.push(owner);
    Ok(())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use pkgctl_core::{
        AppSpec, AppStatus, FetchStep, ImageSource, KbldTemplate, OwnerReference, PackageRef,
        TemplateStep, ValuesSource, YttTemplate,
    };
    use std::time::Duration;

    fn nginx_pkg() -> Pkg {
        Pkg::new("nginx", "1.2.0").with_template(AppSpec {
            service_account_name: Some("template-sa".into()),
            fetch: vec![FetchStep {
                image: Some(ImageSource {
                    url: "registry.example.com/nginx:1.2.0".into(),
                }),
                ..Default::default()
            }],
            template: vec![
                TemplateStep {
                    ytt: Some(YttTemplate {
                        paths: vec!["config".into()],
                        values_from: Vec::new(),
                    }),
                    ..Default::default()
                },
                TemplateStep {
                    kbld: Some(KbldTemplate::default()),
                    ..Default::default()
                },
            ],
            ..Default::default()
        })
    }

    fn web_intent() -> InstalledPkg {
        let mut intent = InstalledPkg::new("apps", "web", PackageRef::new("nginx", "1.2.0"));
        intent.metadata.uid = Some("intent-uid".into());
        intent
    }

    #[test]
    fn test_new_app_takes_identity_from_intent() {
        let app = TemplateMerger::new()
            .desired_app(&App::default(), &web_intent(), &nginx_pkg())
            .unwrap();

        assert_eq!(app.metadata.name, "web");
        assert_eq!(app.metadata.namespace, "apps");
        assert_eq!(app.metadata.labels.get(INSTALLED_PKG_LABEL).map(String::as_str), Some("web"));
        assert_eq!(app.spec.fetch, nginx_pkg().spec.template.unwrap().spec.fetch);

        let owner = app.metadata.controller_owner().unwrap();
        assert_eq!(owner.kind, "InstalledPkg");
        assert_eq!(owner.uid, "intent-uid");
    }

    #[test]
    fn test_service_account_precedence() {
        let pkg = nginx_pkg();
        let merger = TemplateMerger::from_config(
            &ControllerConfig::default().with_default_service_account("config-sa"),
        );

        let from_intent = merger
            .desired_app(&App::default(), &web_intent().with_service_account("intent-sa"), &pkg)
            .unwrap();
        assert_eq!(from_intent.spec.service_account_name.as_deref(), Some("intent-sa"));

        let from_config = merger.desired_app(&App::default(), &web_intent(), &pkg).unwrap();
        assert_eq!(from_config.spec.service_account_name.as_deref(), Some("config-sa"));

        let from_template = TemplateMerger::new()
            .desired_app(&App::default(), &web_intent(), &pkg)
            .unwrap();
        assert_eq!(
            from_template.spec.service_account_name.as_deref(),
            Some("template-sa")
        );
    }

    #[test]
    fn test_intent_sync_period_and_values_are_overlaid() {
        let intent = web_intent()
            .with_sync_period(Duration::from_secs(120))
            .with_values(ValuesSource::secret("web-values"));

        let app = TemplateMerger::new()
            .desired_app(&App::default(), &intent, &nginx_pkg())
            .unwrap();

        assert_eq!(app.spec.sync_period, Some(Duration::from_secs(120)));
        let ytt = app.spec.template.first().and_then(|s| s.ytt.clone()).unwrap();
        assert_eq!(ytt.values_from, vec![ValuesSource::secret("web-values")]);
    }

    #[test]
    fn test_existing_status_and_bookkeeping_are_preserved() {
        let mut existing = App::new("apps", "web").with_status(AppStatus::failed(chrono::Utc::now(), 3));
        existing.metadata.resource_version = Some("17".into());
        existing.spec.paused = true;

        let app = TemplateMerger::new()
            .desired_app(&existing, &web_intent(), &nginx_pkg())
            .unwrap();

        assert_eq!(app.status, existing.status);
        assert_eq!(app.metadata.resource_version.as_deref(), Some("17"));
        assert!(!app.spec.paused);
    }

    #[test]
    fn test_merge_is_idempotent() {
        let merger = TemplateMerger::new();
        let intent = web_intent().with_values(ValuesSource::secret("web-values"));
        let first = merger.desired_app(&App::default(), &intent, &nginx_pkg()).unwrap();
        let second = merger.desired_app(&first, &intent, &nginx_pkg()).unwrap();
        assert!(first.semantically_equals(&second));
    }

    #[test]
    fn test_package_without_template_fails() {
        let result =
            TemplateMerger::new().desired_app(&App::default(), &web_intent(), &Pkg::new("nginx", "1.2.0"));
        assert!(matches!(result, Err(Error::Merge { .. })));
    }

    #[test]
    fn test_app_controlled_by_another_owner_is_rejected() {
        let mut existing = App::new("apps", "web");
        existing.metadata.owner_references.push(OwnerReference {
            api_version: "apps/v1".into(),
            kind: "Deployment".into(),
            name: "other".into(),
            controller: true,
            ..Default::default()
        });

        let result = TemplateMerger::new().desired_app(&existing, &web_intent(), &nginx_pkg());
        assert!(matches!(result, Err(Error::Merge { .. })));
    }
}
