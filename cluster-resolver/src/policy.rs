use crate::ResolveError;
use std::{fmt, str::FromStr};

/// The load balancing policy a resolver asks its connection to use.
///
/// Leaving the policy [`Unset`](BalancerPolicy::Unset) lets the connection
/// fall back to its own default.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum BalancerPolicy {
    #[default]
    Unset,
    /// Use the first reachable address.
    PickFirst,
    /// Spread calls across all addresses.
    RoundRobin,
}

impl BalancerPolicy {
    /// The accepted policy names, for help and error messages.
    pub const CHOICES: [&'static str; 2] = ["pick_first", "round_robin"];

    /// The policy name as used in a service config document. Empty when unset.
    pub fn as_str(&self) -> &'static str {
        match self {
            BalancerPolicy::Unset => "",
            BalancerPolicy::PickFirst => "pick_first",
            BalancerPolicy::RoundRobin => "round_robin",
        }
    }

    pub fn is_set(&self) -> bool {
        *self != BalancerPolicy::Unset
    }

    /// Replace the policy with the one named by `value`.
    ///
    /// Unknown names fail and leave the current policy untouched.
    ///
    /// ```
    /// use cluster_resolver::BalancerPolicy;
    ///
    /// let mut policy = BalancerPolicy::default();
    /// policy.set("round_robin").unwrap();
    /// assert!(policy.set("random").is_err());
    /// assert_eq!(policy.to_string(), "round_robin");
    /// ```
    pub fn set(&mut self, value: &str) -> Result<(), ResolveError> {
        *self = value.parse()?;
        Ok(())
    }

    /// Render the service config document selecting this policy, if one is set.
    pub fn service_config_json(&self) -> Option<String> {
        self.is_set().then(|| {
            format!(
                r#"{{"loadBalancingConfig": [{{ "{}": {{}} }}] }}"#,
                self.as_str()
            )
        })
    }
}

impl FromStr for BalancerPolicy {
    type Err = ResolveError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "pick_first" => Ok(BalancerPolicy::PickFirst),
            "round_robin" => Ok(BalancerPolicy::RoundRobin),
            _ => Err(ResolveError::UnsupportedBalancerPolicy {
                value: value.to_string(),
            }),
        }
    }
}

impl fmt::Display for BalancerPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
