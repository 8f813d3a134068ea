use std::time::Duration;

use cim_aggregation::{AggregationConfig, DeadlinePolicySelector, RecoveryPolicy};
use proptest::prelude::*;

fn policy() -> impl Strategy<Value = RecoveryPolicy> {
    proptest::sample::select(RecoveryPolicy::ALL.to_vec())
}

proptest! {
    #[test]
    fn selection_depends_only_on_parity(key in 1i64..i64::MAX) {
        let selector = DeadlinePolicySelector::default();
        let first = selector.select(key);

        prop_assert_eq!(first, selector.select(key));
        prop_assert_eq!(first.forced_failure, key % 2 == 0);
        prop_assert_eq!(first.timeout_seconds(), if key % 2 == 0 { 2 } else { 5 });
    }

    #[test]
    fn configured_deadlines_follow_parity(key in 1i64..10_000, even in 1u64..60, odd in 1u64..60) {
        let raw = format!("[deadlines]\neven_secs = {even}\nodd_secs = {odd}\n");
        let config = AggregationConfig::from_toml_str(&raw).unwrap();

        let selection = config.selector().select(key);
        let expected = if key % 2 == 0 { even } else { odd };
        prop_assert_eq!(selection.timeout, Duration::from_secs(expected));
    }

    #[test]
    fn policies_parse_from_name_or_route(policy in policy(), upper in any::<bool>()) {
        let name = if upper { policy.name().to_uppercase() } else { policy.name().to_string() };

        prop_assert_eq!(name.parse::<RecoveryPolicy>().unwrap(), policy);
        prop_assert_eq!(policy.route().parse::<RecoveryPolicy>().unwrap(), policy);
    }
}

#[test]
fn recovering_policies_are_the_documented_three() {
    let recovering: Vec<_> = RecoveryPolicy::ALL
        .into_iter()
        .filter(RecoveryPolicy::recovers_locally)
        .collect();

    assert_eq!(
        recovering,
        vec![
            RecoveryPolicy::PropagateEmptyOnError,
            RecoveryPolicy::SwallowErrorUnconditionally,
            RecoveryPolicy::DefaultOnTimeout,
        ]
    );
}
