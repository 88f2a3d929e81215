//! Adaptive re-check timing for Apps.
//!
//! The timer answers two questions from an App's status alone:
//!
//! - `duration_until_ready`: how long a scheduler should wait before the
//!   next check. Successful Apps resync after `sync_period + jitter`, failing
//!   Apps back off exponentially, capped at their own sync period.
//! - `is_ready_at`: whether, as of a given instant, the unjittered wait has
//!   elapsed since the App was last fetched.
//!
//! Both are pure: no I/O, no hidden state beyond the inputs and the random
//! source handed to the jittered variant.

use std::error::Error as StdError;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use pkgctl_core::{App, AppStatus, ConditionType};
use rand::Rng;

use crate::config::{ControllerConfig, DEFAULT_MAX_JITTER, DEFAULT_SYNC_PERIOD};

/// What the status says about the last reconcile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LastReconcile {
    Succeeded,
    Failed { consecutive_failures: u32 },
}

/// Stateless calculator over one App's status and sync period.
#[derive(Debug, Clone, Copy)]
pub struct ReconcileTimer<'a> {
    status: &'a AppStatus,
    sync_period: Duration,
    max_jitter: Duration,
}

impl<'a> ReconcileTimer<'a> {
    /// Timer for an App, using the built-in defaults for anything unset.
    pub fn new(app: &'a App) -> Self {
        Self::from_status(
            &app.status,
            app.spec.sync_period.unwrap_or(DEFAULT_SYNC_PERIOD),
        )
    }

    /// Timer for an App, falling back to the controller's configuration.
    pub fn with_config(app: &'a App, config: &ControllerConfig) -> Self {
        Self {
            status: &app.status,
            sync_period: app.spec.sync_period.unwrap_or(config.default_sync_period),
            max_jitter: config.max_jitter,
        }
    }

    /// Timer over a bare status and sync period.
    pub const fn from_status(status: &'a AppStatus, sync_period: Duration) -> Self {
        Self {
            status,
            sync_period,
            max_jitter: DEFAULT_MAX_JITTER,
        }
    }

    /// The sync period in effect; also the failure backoff ceiling.
    pub const fn sync_period(&self) -> Duration {
        self.sync_period
    }

    /// Delay before the next check, jittered from the thread-local RNG.
    ///
    /// `last_error` is the outcome of a reconcile that has not yet been
    /// recorded in the status; when present it forces the failure path.
    pub fn duration_until_ready(&self, last_error: Option<&dyn StdError>) -> Duration {
        self.duration_until_ready_with(last_error, &mut rand::thread_rng())
    }

    /// Delay before the next check, jittered from `rng`.
    pub fn duration_until_ready_with<R: Rng + ?Sized>(
        &self,
        last_error: Option<&dyn StdError>,
        rng: &mut R,
    ) -> Duration {
        if last_error.is_some() {
            return self.failure_backoff(self.status.consecutive_reconcile_failures);
        }

        match self.last_reconcile() {
            LastReconcile::Succeeded => self.sync_period.saturating_add(self.jitter(rng)),
            LastReconcile::Failed {
                consecutive_failures,
            } => self.failure_backoff(consecutive_failures),
        }
    }

    /// Whether the unjittered wait has elapsed at `now`.
    ///
    /// An App that has never been fetched is always ready.
    pub fn is_ready_at(&self, now: DateTime<Utc>) -> bool {
        let Some(last_updated_at) = self.status.last_updated_at() else {
            return true;
        };

        let Ok(wait) = TimeDelta::from_std(self.wait_period()) else {
            return false;
        };

        last_updated_at
            .checked_add_signed(wait)
            .is_some_and(|ready_at| now >= ready_at)
    }

    /// The unjittered wait `is_ready_at` measures against.
    pub fn wait_period(&self) -> Duration {
        match self.last_reconcile() {
            LastReconcile::Succeeded => self.sync_period,
            LastReconcile::Failed {
                consecutive_failures,
            } => self.failure_backoff(consecutive_failures),
        }
    }

    /// `min(2^failures seconds, sync_period)`.
    fn failure_backoff(&self, consecutive_failures: u32) -> Duration {
        1u64.checked_shl(consecutive_failures)
            .map_or(self.sync_period, |secs| {
                Duration::from_secs(secs).min(self.sync_period)
            })
    }

    fn jitter<R: Rng + ?Sized>(&self, rng: &mut R) -> Duration {
        if self.max_jitter.is_zero() {
            return Duration::ZERO;
        }
        rng.gen_range(Duration::ZERO..self.max_jitter)
    }

    // No condition yet counts as failed with zero failures, so a fresh App
    // is re-checked after one second rather than a full sync period.
    fn last_reconcile(&self) -> LastReconcile {
        match self.status.latest_condition().map(|c| c.kind) {
            None => LastReconcile::Failed {
                consecutive_failures: 0,
            },
            Some(ConditionType::ReconcileFailed | ConditionType::DeleteFailed) => {
                LastReconcile::Failed {
                    consecutive_failures: self.status.consecutive_reconcile_failures,
                }
            }
            Some(
                ConditionType::ReconcileSucceeded
                | ConditionType::Reconciling
                | ConditionType::Deleting,
            ) => LastReconcile::Succeeded,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pkgctl_core::{AppCondition, AppSpec, AppStatusFetch};
    use rand::rngs::mock::StepRng;

    fn app_with(sync_period: Duration, status: AppStatus) -> App {
        App::new("default", "simple-app")
            .with_spec(AppSpec {
                sync_period: Some(sync_period),
                ..Default::default()
            })
            .with_status(status)
    }

    #[test]
    fn test_missing_sync_period_uses_default() {
        let app = App::new("default", "simple-app");
        assert_eq!(ReconcileTimer::new(&app).sync_period(), DEFAULT_SYNC_PERIOD);

        let config = ControllerConfig::default().with_default_sync_period(Duration::from_secs(90));
        assert_eq!(
            ReconcileTimer::with_config(&app, &config).sync_period(),
            Duration::from_secs(90)
        );
    }

    #[test]
    fn test_no_condition_backs_off_as_first_failure() {
        let mut status = AppStatus::default();
        // Counter is ignored when no condition has been recorded.
        status.consecutive_reconcile_failures = 4;
        let app = app_with(Duration::from_secs(30), status);

        let timer = ReconcileTimer::new(&app);
        assert_eq!(timer.duration_until_ready(None), Duration::from_secs(1));
        assert_eq!(timer.wait_period(), Duration::from_secs(1));
    }

    #[test]
    fn test_fetched_without_condition_is_ready_after_one_second() {
        let t0 = Utc::now();
        let status = AppStatus {
            fetch: Some(AppStatusFetch::at(t0)),
            consecutive_reconcile_failures: 4,
            ..Default::default()
        };
        let app = app_with(Duration::from_secs(30), status);

        let timer = ReconcileTimer::new(&app);
        assert!(!timer.is_ready_at(t0));
        assert!(!timer.is_ready_at(t0 + TimeDelta::milliseconds(999)));
        assert!(timer.is_ready_at(t0 + TimeDelta::seconds(1)));
    }

    #[test]
    fn test_error_forces_failure_path() {
        let now = Utc::now();
        let mut status = AppStatus::succeeded(now);
        status.consecutive_reconcile_failures = 3;
        let app = app_with(Duration::from_secs(60), status);

        let err = crate::error::Error::store("get_app", "timeout");
        assert_eq!(
            ReconcileTimer::new(&app).duration_until_ready(Some(&err as &dyn StdError)),
            Duration::from_secs(8)
        );
    }

    #[test]
    fn test_jitter_uses_supplied_rng() {
        let app = app_with(Duration::from_secs(30), AppStatus::succeeded(Utc::now()));
        let timer = ReconcileTimer::new(&app);

        let mut zero = StepRng::new(0, 0);
        assert_eq!(
            timer.duration_until_ready_with(None, &mut zero),
            Duration::from_secs(30)
        );
    }

    #[test]
    fn test_zero_jitter_bound_adds_nothing() {
        let app = app_with(Duration::from_secs(30), AppStatus::succeeded(Utc::now()));
        let config = ControllerConfig::default().with_max_jitter(Duration::ZERO);
        let timer = ReconcileTimer::with_config(&app, &config);
        assert_eq!(timer.duration_until_ready(None), Duration::from_secs(30));
    }

    #[test]
    fn test_huge_failure_count_is_capped() {
        let app = app_with(Duration::from_secs(300), AppStatus::failed(Utc::now(), 200));
        assert_eq!(
            ReconcileTimer::new(&app).duration_until_ready(None),
            Duration::from_secs(300)
        );
    }

    #[test]
    fn test_reconciling_condition_uses_sync_period() {
        let mut status = AppStatus::succeeded(Utc::now());
        status
            .conditions
            .push(AppCondition::new(ConditionType::Reconciling));
        let app = app_with(Duration::from_secs(30), status);
        assert_eq!(
            ReconcileTimer::new(&app).wait_period(),
            Duration::from_secs(30)
        );
    }

    #[test]
    fn test_never_fetched_is_ready() {
        let app = app_with(Duration::from_secs(30), AppStatus::default());
        assert!(ReconcileTimer::new(&app).is_ready_at(Utc::now()));
    }
}
