//! Admission control — may an org start another job right now?
//!
//! Three independent limits, evaluated in order:
//!
//! ```text
//! org_active   < max_concurrent_per_org
//! total_active < max_total_concurrent
//! org_active   < floor(max_total_concurrent * max_org_capacity_percent / 100)
//! ```
//!
//! The share limit caps one org's slice of the pool even when its own
//! ceiling and the global ceiling would both allow more. Evaluation is
//! advisory: nothing is reserved.

use fairgrid_core::FairSchedulerConfig;

/// Outcome of an admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Admitted,
    /// The org is at `max_concurrent_per_org`.
    OrgLimit { active: u32, limit: u32 },
    /// The pool is at `max_total_concurrent`.
    GlobalLimit { active: u32, limit: u32 },
    /// The org holds its full share of the pool.
    ShareLimit { active: u32, limit: u32 },
}

impl Admission {
    pub fn is_admitted(&self) -> bool {
        matches!(self, Admission::Admitted)
    }
}

/// Evaluate the admission limits for an org with `org_active` jobs while
/// the pool runs `total_active`.
pub fn evaluate(config: &FairSchedulerConfig, org_active: u32, total_active: u32) -> Admission {
    if org_active >= config.max_concurrent_per_org {
        return Admission::OrgLimit {
            active: org_active,
            limit: config.max_concurrent_per_org,
        };
    }
    if total_active >= config.max_total_concurrent {
        return Admission::GlobalLimit {
            active: total_active,
            limit: config.max_total_concurrent,
        };
    }
    let share_cap = config.share_cap();
    if org_active >= share_cap {
        return Admission::ShareLimit {
            active: org_active,
            limit: share_cap,
        };
    }
    Admission::Admitted
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(per_org: u32, total: u32, percent: u32) -> FairSchedulerConfig {
        FairSchedulerConfig {
            max_concurrent_per_org: per_org,
            max_total_concurrent: total,
            max_org_capacity_percent: percent,
            ..FairSchedulerConfig::default()
        }
    }

    #[test]
    fn admits_idle_org() {
        assert_eq!(evaluate(&config(2, 10, 50), 0, 0), Admission::Admitted);
    }

    #[test]
    fn org_limit() {
        assert_eq!(
            evaluate(&config(2, 10, 100), 2, 2),
            Admission::OrgLimit { active: 2, limit: 2 }
        );
    }

    #[test]
    fn global_limit() {
        assert_eq!(
            evaluate(&config(5, 4, 100), 1, 4),
            Admission::GlobalLimit { active: 4, limit: 4 }
        );
    }

    #[test]
    fn share_limit_applies_below_org_limit() {
        // Share cap = floor(3 * 50 / 100) = 1, tighter than the per-org 2.
        let cfg = config(2, 3, 50);
        assert!(evaluate(&cfg, 0, 0).is_admitted());
        assert_eq!(
            evaluate(&cfg, 1, 1),
            Admission::ShareLimit { active: 1, limit: 1 }
        );
    }

    #[test]
    fn limits_checked_in_order() {
        // Every limit is violated; the per-org limit is reported first.
        let cfg = config(1, 1, 10);
        assert!(matches!(evaluate(&cfg, 1, 1), Admission::OrgLimit { .. }));
        // Per-org passes, global and share fail; global is reported.
        let cfg = config(5, 1, 10);
        assert!(matches!(evaluate(&cfg, 0, 1), Admission::GlobalLimit { .. }));
    }

    #[test]
    fn zero_share_cap_denies_everyone() {
        let cfg = config(5, 1, 50);
        assert_eq!(
            evaluate(&cfg, 0, 0),
            Admission::ShareLimit { active: 0, limit: 0 }
        );
    }
}
