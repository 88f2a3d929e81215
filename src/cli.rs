//! CLI command definitions using clap.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};

/// pkgctl - installed-package controller
#[derive(Parser, Debug)]
#[command(name = "pkgctl")]
#[command(version)]
#[command(about = "Keeps declared package installs converged with running Apps")]
#[command(
    long_about = "pkgctl reconciles InstalledPkg intents against a package catalog and the Apps they materialize as. Commands run against a YAML snapshot of cluster objects, so no cluster is touched."
)]
pub struct Cli {
    /// Controller configuration file (TOML). Falls back to PKGCTL_* variables.
    #[arg(short, long, global = true, env = "PKGCTL_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run one reconcile pass over every intent in a snapshot
    Reconcile {
        /// Snapshot file (YAML or JSON) with installedPkgs, pkgs and apps
        snapshot: PathBuf,

        /// Print the report as JSON
        #[arg(long, default_value_t = false)]
        json: bool,

        /// Write the resulting Apps to this file as YAML
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show when an App is next due for a re-check
    Timer {
        /// App manifest (YAML or JSON)
        app: PathBuf,

        /// Evaluate readiness at this RFC 3339 instant instead of now
        #[arg(long)]
        at: Option<DateTime<Utc>>,
    },
}
