//! CLI command handlers.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use pkgctl_core::{manifest, App};
use pkgctl_reconciler::{ControllerConfig, ReconcileTimer};
use tracing::{debug, info};

use crate::cli::{Cli, Commands};
use crate::snapshot::{run_pass, ClusterSnapshot, PassReport};

/// Execute a CLI command.
///
/// # Errors
///
/// Returns an error if configuration or input files cannot be loaded, or
/// output cannot be written.
pub async fn execute_command(cli: Cli) -> Result<()> {
    let config = load_config(cli.config.as_deref())?;
    debug!(?config, "Loaded controller configuration");

    match cli.command {
        Commands::Reconcile {
            snapshot,
            json,
            output,
        } => cmd_reconcile(&snapshot, json, output, config).await,

        Commands::Timer { app, at } => cmd_timer(&app, at, &config),
    }
}

fn load_config(path: Option<&Path>) -> Result<ControllerConfig> {
    match path {
        Some(path) => ControllerConfig::from_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display())),
        None => ControllerConfig::from_env().context("Invalid PKGCTL_* environment"),
    }
}

/// Reconcile every intent in a snapshot once.
async fn cmd_reconcile(
    snapshot_path: &Path,
    json: bool,
    output: Option<PathBuf>,
    config: ControllerConfig,
) -> Result<()> {
    info!("Running reconcile pass over {}", snapshot_path.display());

    let snapshot = ClusterSnapshot::load(snapshot_path)
        .with_context(|| format!("Failed to load snapshot {}", snapshot_path.display()))?;
    let report = run_pass(snapshot, config)
        .await
        .context("Invalid controller configuration")?;

    if json {
        let rendered =
            serde_json::to_string_pretty(&report).context("Failed to render report as JSON")?;
        println!("{rendered}");
    } else {
        print_report(&report);
    }

    if let Some(path) = output {
        let rendered = manifest::to_yaml(&report.apps).context("Failed to render Apps")?;
        std::fs::write(&path, rendered)
            .with_context(|| format!("Failed to write Apps to {}", path.display()))?;
        info!("Wrote {} App(s) to {}", report.apps.len(), path.display());
    }

    Ok(())
}

fn print_report(report: &PassReport) {
    for entry in &report.entries {
        match (&entry.outcome, &entry.error) {
            (Some(outcome), _) => println!("{:<40} {outcome}", entry.request),
            (None, Some(error)) => println!("{:<40} requeue: {error}", entry.request),
            (None, None) => println!("{:<40} -", entry.request),
        }
    }
    println!(
        "{} intent(s), {} write(s), {} requeue(s)",
        report.entries.len(),
        report.writes,
        report.retries()
    );
}

/// Report the timer's answers for one App.
fn cmd_timer(app_path: &Path, at: Option<DateTime<Utc>>, config: &ControllerConfig) -> Result<()> {
    let app: App = manifest::from_file(app_path)
        .with_context(|| format!("Failed to load App {}", app_path.display()))?;
    let now = at.unwrap_or_else(Utc::now);

    let timer = ReconcileTimer::with_config(&app, config);
    let next = timer.duration_until_ready(None);

    println!("app:          {}", app.metadata.key());
    println!("sync period:  {}s", timer.sync_period().as_secs());
    println!("wait period:  {}s", timer.wait_period().as_secs());
    println!("next check:   {:.3}s", next.as_secs_f64());
    println!("ready at {now}: {}", timer.is_ready_at(now));

    Ok(())
}
