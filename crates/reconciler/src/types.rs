//! Core types for the reconciler.

use std::fmt;

use pkgctl_core::ObjectKey;

use crate::error::Result;

/// Locator handed to the entry point: the intent's namespace/name.
pub type Request = ObjectKey;

/// Successful result of one reconcile invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// The intent no longer exists.
    IntentNotFound,
    /// The intent carries a deletion marker.
    IntentDeleting,
    /// No App existed; one was created.
    AppCreated,
    /// The App differed from the desired state and was updated.
    AppUpdated,
    /// The App already matched the desired state.
    AppUnchanged,
}

impl ReconcileOutcome {
    /// Whether a create or update was issued.
    pub const fn wrote(self) -> bool {
        matches!(self, Self::AppCreated | Self::AppUpdated)
    }
}

impl fmt::Display for ReconcileOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::IntentNotFound => "intent not found",
            Self::IntentDeleting => "intent deleting",
            Self::AppCreated => "app created",
            Self::AppUpdated => "app updated",
            Self::AppUnchanged => "app unchanged",
        };
        write!(f, "{s}")
    }
}

/// What the caller's scheduler should do after a reconcile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requeue {
    /// Done for now; rely on the next scheduled resync.
    No,
    /// Retry later; pacing is up to the scheduler.
    Retry,
}

impl Requeue {
    /// Map a reconcile result to a requeue request.
    pub fn from_result(result: &Result<ReconcileOutcome>) -> Self {
        match result {
            Err(e) if e.requeue() => Self::Retry,
            _ => Self::No,
        }
    }

    /// Whether a retry was requested.
    pub const fn is_retry(self) -> bool {
        matches!(self, Self::Retry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn test_requeue_only_on_error() {
        assert_eq!(Requeue::from_result(&Ok(ReconcileOutcome::AppCreated)), Requeue::No);
        assert_eq!(Requeue::from_result(&Ok(ReconcileOutcome::IntentNotFound)), Requeue::No);
        assert!(Requeue::from_result(&Err(Error::package_not_found("foo", "1.0.0"))).is_retry());
    }

    #[test]
    fn test_outcome_wrote() {
        assert!(ReconcileOutcome::AppCreated.wrote());
        assert!(ReconcileOutcome::AppUpdated.wrote());
        assert!(!ReconcileOutcome::AppUnchanged.wrote());
        assert!(!ReconcileOutcome::IntentDeleting.wrote());
    }
}
