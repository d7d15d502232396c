//! A parsed gRPC service config, as far as load balancing is concerned.

use crate::BalancerPolicy;
use anyhow::Context;
use serde::Deserialize;

/// The `loadBalancingConfig` portion of a gRPC service config document.
///
/// Entries are kept in document order; each names one policy together with
/// its (possibly empty) configuration object.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ServiceConfig {
    #[serde(rename = "loadBalancingConfig")]
    load_balancing_config: Vec<serde_json::Map<String, serde_json::Value>>,
}

impl ServiceConfig {
    /// Parse a JSON service config document.
    ///
    /// Fails if the document is malformed, has no `loadBalancingConfig`
    /// entries, or has an entry that does not name exactly one policy.
    pub fn from_json(document: &str) -> Result<Self, anyhow::Error> {
        let config: ServiceConfig =
            serde_json::from_str(document).context("malformed service config")?;

        if config.load_balancing_config.is_empty() {
            anyhow::bail!("service config has an empty loadBalancingConfig");
        }
        if let Some(entry) = config
            .load_balancing_config
            .iter()
            .find(|entry| entry.len() != 1)
        {
            anyhow::bail!(
                "loadBalancingConfig entries must name exactly one policy, got {}",
                entry.len()
            );
        }

        Ok(config)
    }

    /// Policy names in preference order.
    pub fn policy_names(&self) -> impl Iterator<Item = &str> {
        self.load_balancing_config
            .iter()
            .flat_map(|entry| entry.keys().map(String::as_str))
    }

    /// The first policy in the document this crate knows about.
    pub fn balancer_policy(&self) -> Option<BalancerPolicy> {
        self.policy_names().find_map(|name| name.parse().ok())
    }
}
