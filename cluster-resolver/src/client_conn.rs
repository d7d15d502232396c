//! The interface between a [`Resolver`](crate::Resolver) and the connection it
//! keeps up to date.

use crate::{ResolveError, ServiceConfig};
use std::fmt;

/// A single address a connection can dial.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Address {
    pub addr: String,
}

impl From<String> for Address {
    fn from(addr: String) -> Self {
        Self { addr }
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.addr)
    }
}

/// The connection state pushed by a resolver after each successful lookup.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct State {
    /// Addresses in the order discovery returned them. May be empty.
    pub addresses: Vec<Address>,
    /// Present only when the builder was configured with a balancer policy.
    pub service_config: Option<ServiceConfig>,
}

/// The connection runtime owning a resolver.
#[async_trait::async_trait]
pub trait ClientConn: Send + Sync {
    /// Replace the connection's addresses and service config with `state`.
    async fn update_state(&self, state: State) -> Result<(), anyhow::Error>;

    /// Signal a resolution failure without otherwise changing state.
    fn report_error(&self, err: &ResolveError);

    /// Validate and compile a load balancing service config document.
    fn parse_service_config(&self, document: &str) -> Result<ServiceConfig, anyhow::Error>;
}
