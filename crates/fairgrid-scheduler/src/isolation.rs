//! Queue isolation — maps an org and strategy to a physical queue name.
//!
//! Pure naming. It does no admission control and never touches scheduler
//! state; callers use it to decide where a job is enqueued.

use fairgrid_core::IsolationStrategy;

/// Jobs with a priority strictly above this go to the `high` lane.
pub const HIGH_PRIORITY_THRESHOLD: i32 = 5;

/// Resolve the queue a job for `org_id` should be placed on.
///
/// - `Shared` → `base_name`
/// - `PerOrg` → `{base_name}:{org_id}`
/// - `PriorityLanes` → `{base_name}:high` if `priority > 5`, else
///   `{base_name}:normal` (a missing priority is normal)
pub fn get_queue_name(
    base_name: &str,
    org_id: &str,
    strategy: IsolationStrategy,
    priority: Option<i32>,
) -> String {
    match strategy {
        IsolationStrategy::Shared => base_name.to_string(),
        IsolationStrategy::PerOrg => format!("{base_name}:{org_id}"),
        IsolationStrategy::PriorityLanes => {
            if priority.is_some_and(|p| p > HIGH_PRIORITY_THRESHOLD) {
                format!("{base_name}:high")
            } else {
                format!("{base_name}:normal")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shared_returns_base_name() {
        assert_eq!(
            get_queue_name("jobs", "acme", IsolationStrategy::Shared, Some(9)),
            "jobs"
        );
    }

    #[test]
    fn per_org_appends_org() {
        assert_eq!(
            get_queue_name("jobs", "acme", IsolationStrategy::PerOrg, None),
            "jobs:acme"
        );
    }

    #[test]
    fn priority_lanes_split_above_five() {
        let lane = |p| get_queue_name("jobs", "acme", IsolationStrategy::PriorityLanes, p);
        assert_eq!(lane(Some(6)), "jobs:high");
        assert_eq!(lane(Some(5)), "jobs:normal");
        assert_eq!(lane(Some(-1)), "jobs:normal");
        assert_eq!(lane(None), "jobs:normal");
    }
}
