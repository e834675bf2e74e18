//! Adaptive admission gate for IP-pool directives during warmup.
//!
//! A new provider-side IP pool must ramp up send volume gradually to build
//! sender reputation. The limiter admits at most N sends per hour, where N
//! grows geometrically with the days elapsed since the warmup start date,
//! scaled down by the number of cooperating gateway instances.
//!
//! When admission is denied the IP-pool directive is skipped and the email
//! still goes out via the backend's default pool; denial is never an error.

use std::time::{Duration, Instant};

use chrono::{NaiveDate, Utc};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};

/// How long one limiter generation is valid before the hourly quota is
/// recomputed from the warmup schedule.
const GENERATION_LIFETIME: Duration = Duration::from_secs(24 * 60 * 60);

/// The admission window the hourly quota applies to.
const WINDOW: Duration = Duration::from_secs(60 * 60);

/// Warmup schedule parameters.
///
/// The quota for a given day is `floor(base_per_hour * growth_factor^days /
/// instances)` where `days` counts from `start_date`. All values are policy
/// tuning knobs for the operator; none are hardcoded, the only constraint is
/// staying under the provider's recommended warmup curve.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WarmupPolicy {
    /// First day of the warmup period.
    pub start_date: NaiveDate,

    /// Admitted sends per hour on the start date.
    #[serde(default = "defaults::base_per_hour")]
    pub base_per_hour: f64,

    /// Daily geometric growth of the hourly quota.
    #[serde(default = "defaults::growth_factor")]
    pub growth_factor: f64,

    /// Number of cooperating gateway instances sharing the quota.
    #[serde(default = "defaults::instances")]
    pub instances: u32,
}

mod defaults {
    pub const fn base_per_hour() -> f64 {
        100.0
    }

    pub const fn growth_factor() -> f64 {
        1.3
    }

    pub const fn instances() -> u32 {
        1
    }
}

impl WarmupPolicy {
    /// The hourly quota in effect on the given date.
    ///
    /// Zero before the warmup start date: nothing is admitted to a pool
    /// whose warmup has not begun.
    #[must_use]
    pub fn mails_per_hour(&self, on: NaiveDate) -> u64 {
        let days = (on - self.start_date).num_days();
        if days < 0 {
            return 0;
        }
        let exponent = i32::try_from(days).unwrap_or(i32::MAX);
        let rate =
            self.base_per_hour * self.growth_factor.powi(exponent) / f64::from(self.instances.max(1));
        if rate.is_finite() && rate >= 0.0 {
            // Quotas beyond u64 range mean the warmup is long over.
            if rate >= 1.8e19 { u64::MAX } else { rate as u64 }
        } else {
            0
        }
    }
}

struct Window {
    started_at: Instant,
    admitted: u64,
}

struct Generation {
    built_at: Instant,
    limit: u64,
    window: Mutex<Window>,
}

impl Generation {
    fn new(policy: &WarmupPolicy, now: Instant) -> Self {
        let limit = policy.mails_per_hour(Utc::now().date_naive());
        tracing::info!(limit, "rebuilt warmup limiter generation");
        Self {
            built_at: now,
            limit,
            window: Mutex::new(Window {
                started_at: now,
                admitted: 0,
            }),
        }
    }

    fn is_fresh(&self, now: Instant) -> bool {
        now.duration_since(self.built_at) < GENERATION_LIFETIME
    }

    fn admit(&self, now: Instant) -> bool {
        let mut window = self.window.lock();
        if now.duration_since(window.started_at) >= WINDOW {
            window.started_at = now;
            window.admitted = 0;
        }
        if window.admitted < self.limit {
            window.admitted += 1;
            true
        } else {
            false
        }
    }
}

/// Process-wide admission gate shared by every backend that honors IP-pool
/// directives during warmup.
///
/// The current generation is rebuilt lazily once it is 24 hours old so that
/// the quota follows the schedule. Readers fast-path under a read lock while
/// the generation is fresh. When it is stale, exactly one caller rebuilds it
/// under the write lock; everyone else is denied until the rebuild lands.
/// Denying on staleness is the deliberate fail-safe: under-sending is
/// preferred over bursting past the warmup quota during the refresh window.
pub struct WarmupLimiter {
    policy: WarmupPolicy,
    generation: RwLock<Option<Generation>>,
}

impl WarmupLimiter {
    #[must_use]
    pub fn new(policy: WarmupPolicy) -> Self {
        Self {
            policy,
            generation: RwLock::new(None),
        }
    }

    #[must_use]
    pub fn policy(&self) -> &WarmupPolicy {
        &self.policy
    }

    /// Whether one more IP-pool send is admitted right now.
    pub fn allow(&self) -> bool {
        let now = Instant::now();
        {
            let guard = self.generation.read();
            if let Some(generation) = guard.as_ref()
                && generation.is_fresh(now)
            {
                return generation.admit(now);
            }
        }

        // Stale or never built. try_write keeps this path non-blocking:
        // whoever wins rebuilds, the rest deny until the rebuild lands.
        self.generation.try_write().is_some_and(|mut guard| {
            if let Some(generation) = guard.as_ref()
                && generation.is_fresh(now)
            {
                // Another caller rebuilt it between our read and write.
                return generation.admit(now);
            }
            let generation = Generation::new(&self.policy, now);
            let admitted = generation.admit(now);
            *guard = Some(generation);
            admitted
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use chrono::Days;

    use super::*;

    fn policy(base: f64, growth: f64, instances: u32) -> WarmupPolicy {
        WarmupPolicy {
            start_date: Utc::now().date_naive(),
            base_per_hour: base,
            growth_factor: growth,
            instances,
        }
    }

    #[test]
    fn quota_grows_geometrically() {
        let p = WarmupPolicy {
            start_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            base_per_hour: 100.0,
            growth_factor: 1.5,
            instances: 1,
        };
        let day = |n: u64| p.start_date.checked_add_days(Days::new(n)).unwrap();
        assert_eq!(p.mails_per_hour(day(0)), 100);
        assert_eq!(p.mails_per_hour(day(1)), 150);
        assert_eq!(p.mails_per_hour(day(2)), 225);
    }

    #[test]
    fn quota_is_split_across_instances() {
        let p = WarmupPolicy {
            start_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            base_per_hour: 100.0,
            growth_factor: 2.0,
            instances: 4,
        };
        assert_eq!(p.mails_per_hour(p.start_date), 25);
    }

    #[test]
    fn nothing_is_admitted_before_the_start_date() {
        let p = WarmupPolicy {
            start_date: Utc::now()
                .date_naive()
                .checked_add_days(Days::new(7))
                .unwrap(),
            base_per_hour: 100.0,
            growth_factor: 1.3,
            instances: 1,
        };
        assert_eq!(p.mails_per_hour(Utc::now().date_naive()), 0);
        let limiter = WarmupLimiter::new(p);
        assert!(!limiter.allow());
    }

    #[test]
    fn admission_stops_at_the_hourly_quota() {
        let limiter = WarmupLimiter::new(policy(3.0, 1.0, 1));
        assert!(limiter.allow());
        assert!(limiter.allow());
        assert!(limiter.allow());
        assert!(!limiter.allow());
        assert!(!limiter.allow());
    }

    #[test]
    fn stale_generation_is_rebuilt_and_quota_reset() {
        let limiter = WarmupLimiter::new(policy(1.0, 1.0, 1));
        assert!(limiter.allow());
        assert!(!limiter.allow());

        // Age the generation past its lifetime; the next call rebuilds it
        // with a fresh window. Skipped when the host clock is too young to
        // represent an instant that far back.
        let Some(aged) = Instant::now().checked_sub(GENERATION_LIFETIME + Duration::from_secs(1))
        else {
            return;
        };
        {
            let mut guard = limiter.generation.write();
            let generation = guard.as_mut().unwrap();
            generation.built_at = aged;
        }
        assert!(limiter.allow());
    }
}
