// Copyright 2025 Cowboy AI, LLC.

//! Recovery policies and the key-derived policy selector

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::model::CustomerId;

/// Strategy applied to the secondary computation before the barrier join
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RecoveryPolicy {
    /// Error-only hook: a failure becomes an empty set, success passes through
    PropagateEmptyOnError,
    /// Unconditional outcome hook: both paths run the same handler
    SwallowErrorUnconditionally,
    /// Completion observer with no substitution
    ObserveOnly,
    /// Deadline that fails the branch with `Timeout`
    FailOnTimeout,
    /// Deadline that substitutes an empty set
    DefaultOnTimeout,
}

impl RecoveryPolicy {
    /// Every policy, in route order
    pub const ALL: [RecoveryPolicy; 5] = [
        RecoveryPolicy::PropagateEmptyOnError,
        RecoveryPolicy::SwallowErrorUnconditionally,
        RecoveryPolicy::ObserveOnly,
        RecoveryPolicy::FailOnTimeout,
        RecoveryPolicy::DefaultOnTimeout,
    ];

    /// Policy name in kebab case
    pub fn name(&self) -> &'static str {
        match self {
            RecoveryPolicy::PropagateEmptyOnError => "propagate-empty-on-error",
            RecoveryPolicy::SwallowErrorUnconditionally => "swallow-error-unconditionally",
            RecoveryPolicy::ObserveOnly => "observe-only",
            RecoveryPolicy::FailOnTimeout => "fail-on-timeout",
            RecoveryPolicy::DefaultOnTimeout => "default-on-timeout",
        }
    }

    /// Route slug the policy is exposed under
    pub fn route(&self) -> &'static str {
        match self {
            RecoveryPolicy::PropagateEmptyOnError => "using-exceptionally",
            RecoveryPolicy::SwallowErrorUnconditionally => "using-handler",
            RecoveryPolicy::ObserveOnly => "using-when-complete",
            RecoveryPolicy::FailOnTimeout => "timeout",
            RecoveryPolicy::DefaultOnTimeout => "complete-on-timeout",
        }
    }

    /// Whether the policy races the branch against a deadline
    pub fn is_deadline_family(&self) -> bool {
        matches!(
            self,
            RecoveryPolicy::FailOnTimeout | RecoveryPolicy::DefaultOnTimeout
        )
    }

    /// Whether the caller can ever observe a secondary failure under this policy
    pub fn recovers_locally(&self) -> bool {
        !matches!(
            self,
            RecoveryPolicy::ObserveOnly | RecoveryPolicy::FailOnTimeout
        )
    }
}

impl fmt::Display for RecoveryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Unknown policy name
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown recovery policy: {0}")]
pub struct UnknownPolicy(pub String);

impl FromStr for RecoveryPolicy {
    type Err = UnknownPolicy;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_ascii_lowercase();
        RecoveryPolicy::ALL
            .into_iter()
            .find(|policy| policy.name() == needle || policy.route() == needle)
            .ok_or_else(|| UnknownPolicy(s.to_string()))
    }
}

/// What the selector derives from a key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PolicySelection {
    /// Whether the secondary lookup is made to fail (policies 1-3)
    pub forced_failure: bool,
    /// Deadline for the secondary branch (policies 4-5)
    pub timeout: Duration,
}

impl PolicySelection {
    /// Deadline in whole seconds
    pub fn timeout_seconds(&self) -> u64 {
        self.timeout.as_secs()
    }
}

/// Derives forced failure and deadline from key parity.
///
/// Even keys force failure and get the short deadline; odd keys do neither
/// and get the long deadline. Pure: the result depends only on the key and
/// the configured deadlines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeadlinePolicySelector {
    even_deadline: Duration,
    odd_deadline: Duration,
}

impl DeadlinePolicySelector {
    /// Deadline applied to even keys by default
    pub const DEFAULT_EVEN_SECS: u64 = 2;
    /// Deadline applied to odd keys by default
    pub const DEFAULT_ODD_SECS: u64 = 5;

    /// Create a selector with custom deadlines
    pub fn new(even_deadline: Duration, odd_deadline: Duration) -> Self {
        Self {
            even_deadline,
            odd_deadline,
        }
    }

    /// Select forced failure and deadline for `key`
    pub fn select(&self, key: CustomerId) -> PolicySelection {
        let even = key.rem_euclid(2) == 0;
        PolicySelection {
            forced_failure: even,
            timeout: if even {
                self.even_deadline
            } else {
                self.odd_deadline
            },
        }
    }
}

impl Default for DeadlinePolicySelector {
    fn default() -> Self {
        Self::new(
            Duration::from_secs(Self::DEFAULT_EVEN_SECS),
            Duration::from_secs(Self::DEFAULT_ODD_SECS),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_default_selection() {
        let selector = DeadlinePolicySelector::default();

        let even = selector.select(2);
        assert!(even.forced_failure);
        assert_eq!(even.timeout_seconds(), 2);

        let odd = selector.select(3);
        assert!(!odd.forced_failure);
        assert_eq!(odd.timeout_seconds(), 5);
    }

    #[test]
    fn test_negative_keys_use_parity() {
        let selector = DeadlinePolicySelector::default();
        assert!(selector.select(-4).forced_failure);
        assert!(!selector.select(-3).forced_failure);
    }

    #[test]
    fn test_policy_parsing() {
        for policy in RecoveryPolicy::ALL {
            assert_eq!(policy.name().parse::<RecoveryPolicy>().unwrap(), policy);
            assert_eq!(policy.route().parse::<RecoveryPolicy>().unwrap(), policy);
        }
        assert_eq!(
            " Using-Handler ".parse::<RecoveryPolicy>().unwrap(),
            RecoveryPolicy::SwallowErrorUnconditionally
        );
        assert!("retry".parse::<RecoveryPolicy>().is_err());
    }

    #[test]
    fn test_policy_families() {
        let deadline: Vec<_> = RecoveryPolicy::ALL
            .into_iter()
            .filter(RecoveryPolicy::is_deadline_family)
            .collect();
        assert_eq!(
            deadline,
            vec![RecoveryPolicy::FailOnTimeout, RecoveryPolicy::DefaultOnTimeout]
        );

        assert!(RecoveryPolicy::PropagateEmptyOnError.recovers_locally());
        assert!(RecoveryPolicy::SwallowErrorUnconditionally.recovers_locally());
        assert!(RecoveryPolicy::DefaultOnTimeout.recovers_locally());
        assert!(!RecoveryPolicy::ObserveOnly.recovers_locally());
        assert!(!RecoveryPolicy::FailOnTimeout.recovers_locally());
    }

    #[test]
    fn test_policy_serde() {
        let json = serde_json::to_string(&RecoveryPolicy::DefaultOnTimeout).unwrap();
        assert_eq!(json, "\"default-on-timeout\"");
        let back: RecoveryPolicy = serde_json::from_str(&json).unwrap();
        assert_eq!(back, RecoveryPolicy::DefaultOnTimeout);
    }

    proptest! {
        #[test]
        fn selection_is_referentially_transparent(key in any::<i64>()) {
            let selector = DeadlinePolicySelector::default();
            prop_assert_eq!(selector.select(key), selector.select(key));
        }

        #[test]
        fn selection_follows_parity(key in any::<i64>()) {
            let selection = DeadlinePolicySelector::default().select(key);
            if key % 2 == 0 {
                prop_assert!(selection.forced_failure);
                prop_assert_eq!(selection.timeout_seconds(), 2);
            } else {
                prop_assert!(!selection.forced_failure);
                prop_assert_eq!(selection.timeout_seconds(), 5);
            }
        }
    }
}
