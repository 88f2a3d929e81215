#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

//! # pkgctl
//!
//! Dry-run front end for the installed-package controller. Loads cluster
//! snapshots, runs reconcile passes against in-memory stores and reports the
//! outcome of every request.

pub use pkgctl_core;
pub use pkgctl_reconciler;

pub mod cli;
pub mod commands;
pub mod snapshot;
