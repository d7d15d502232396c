//! Error types produced while building resolvers and refreshing their state.

use crate::{BalancerPolicy, ComponentKind};
use std::time::Duration;

/// Errors produced by this crate.
///
/// Construction errors (`InvalidTarget`, `UnsupportedTarget`,
/// `UnsupportedBalancerPolicy`, `ServiceConfig`) are returned to the caller.
/// Refresh errors (`Discover`, `UpdateState`) are never returned from
/// [`Resolver::resolve_now`](crate::Resolver::resolve_now); they are reported
/// to the [`ClientConn`](crate::ClientConn) and kept in the resolver snapshot.
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error("invalid dial target {target:?}: {reason}")]
    InvalidTarget { target: String, reason: &'static str },

    #[error("no resolver builder registered for scheme {scheme}")]
    UnknownScheme { scheme: String },

    #[error("unsupported target host {host}")]
    UnsupportedTarget { host: String },

    #[error(
        "unsupported balancer policy {value}; must be one of {}",
        BalancerPolicy::CHOICES.join(", ")
    )]
    UnsupportedBalancerPolicy { value: String },

    #[error("failed to initialize service config with load balancer policy {policy}: {source}")]
    ServiceConfig {
        policy: BalancerPolicy,
        #[source]
        source: anyhow::Error,
    },

    #[error("failed to discover {component} addresses (cluster {cluster}): {source}")]
    Discover {
        component: ComponentKind,
        cluster: String,
        #[source]
        source: DiscoveryError,
    },

    #[error("failed to update {component} addresses (cluster {cluster}): {source}")]
    UpdateState {
        component: ComponentKind,
        cluster: String,
        #[source]
        source: anyhow::Error,
    },
}

/// Why a single discovery lookup did not produce addresses.
#[derive(Debug, thiserror::Error)]
pub enum DiscoveryError {
    /// The lookup did not complete within the configured discovery timeout.
    #[error("discovery deadline exceeded after {0:?}")]
    DeadlineExceeded(Duration),

    /// The owning resolver was closed.
    #[error("discovery cancelled: resolver closed")]
    Cancelled,

    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}
