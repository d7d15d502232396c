//! Defines the interface a [`Resolver`](crate::Resolver) requires in order to
//! discover the addresses of a cluster component.

use crate::{ComponentKind, DiscoveryError};
use std::{collections::HashMap, sync::Arc, time::Duration};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Interface that provides the current addresses of the components of a cluster.
///
/// Implementations must respect the [`DiscoveryContext`] they are handed: once
/// it is done, the lookup should return promptly. Returning no addresses is
/// not an error.
#[async_trait::async_trait]
pub trait Discovery: Send + Sync {
    /// Return the addresses of the control-plane nodes matching `tags`.
    async fn discover_control_plane_addrs(
        &self,
        ctx: &DiscoveryContext,
        tags: &[String],
    ) -> Result<Vec<String>, anyhow::Error>;

    /// Return the addresses of the gateway nodes matching `tags`.
    async fn discover_gateway_addrs(
        &self,
        ctx: &DiscoveryContext,
        tags: &[String],
    ) -> Result<Vec<String>, anyhow::Error>;
}

#[async_trait::async_trait]
impl<T: Discovery + ?Sized> Discovery for Arc<T> {
    async fn discover_control_plane_addrs(
        &self,
        ctx: &DiscoveryContext,
        tags: &[String],
    ) -> Result<Vec<String>, anyhow::Error> {
        (**self).discover_control_plane_addrs(ctx, tags).await
    }

    async fn discover_gateway_addrs(
        &self,
        ctx: &DiscoveryContext,
        tags: &[String],
    ) -> Result<Vec<String>, anyhow::Error> {
        (**self).discover_gateway_addrs(ctx, tags).await
    }
}

// Stands in for a deadline when `Instant + timeout` would overflow.
const FAR_FUTURE: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// Cancellation and deadline for a single discovery lookup.
///
/// The context is done once the owning resolver is closed or the discovery
/// timeout has elapsed, whichever happens first.
#[derive(Debug, Clone)]
pub struct DiscoveryContext {
    token: CancellationToken,
    deadline: Instant,
    timeout: Duration,
}

impl DiscoveryContext {
    /// Create a context bounded by `timeout` from now and cancelled with `token`.
    pub fn new(token: CancellationToken, timeout: Duration) -> Self {
        let now = Instant::now();
        let deadline = now
            .checked_add(timeout)
            .unwrap_or_else(|| now + FAR_FUTURE);

        Self {
            token,
            deadline,
            timeout,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    /// Time left before the deadline, zero once it has passed.
    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    /// Why the context is done, or `None` while the lookup may still proceed.
    pub fn err(&self) -> Option<DiscoveryError> {
        if self.token.is_cancelled() {
            Some(DiscoveryError::Cancelled)
        } else if Instant::now() >= self.deadline {
            Some(DiscoveryError::DeadlineExceeded(self.timeout))
        } else {
            None
        }
    }

    /// Resolves once the context is done, yielding the reason.
    pub async fn done(&self) -> DiscoveryError {
        tokio::select! {
            biased;
            _ = self.token.cancelled() => DiscoveryError::Cancelled,
            _ = tokio::time::sleep_until(self.deadline) => {
                DiscoveryError::DeadlineExceeded(self.timeout)
            }
        }
    }
}

/// Implements [`Discovery`] with a fixed set of addresses per component.
///
/// Tags are ignored.
#[derive(Debug, Clone, Default)]
pub struct StaticDiscovery {
    addrs: HashMap<ComponentKind, Vec<String>>,
}

impl StaticDiscovery {
    /// Serve `addrs` for `component`, replacing any previous set.
    pub fn with_addrs<I, A>(mut self, component: ComponentKind, addrs: I) -> Self
    where
        I: IntoIterator<Item = A>,
        A: Into<String>,
    {
        self.addrs
            .insert(component, addrs.into_iter().map(Into::into).collect());
        self
    }

    fn lookup(
        &self,
        ctx: &DiscoveryContext,
        component: ComponentKind,
    ) -> Result<Vec<String>, anyhow::Error> {
        if let Some(err) = ctx.err() {
            return Err(err.into());
        }

        Ok(self.addrs.get(&component).cloned().unwrap_or_default())
    }
}

#[async_trait::async_trait]
impl Discovery for StaticDiscovery {
    async fn discover_control_plane_addrs(
        &self,
        ctx: &DiscoveryContext,
        _tags: &[String],
    ) -> Result<Vec<String>, anyhow::Error> {
        self.lookup(ctx, ComponentKind::ControlPlane)
    }

    async fn discover_gateway_addrs(
        &self,
        ctx: &DiscoveryContext,
        _tags: &[String],
    ) -> Result<Vec<String>, anyhow::Error> {
        self.lookup(ctx, ComponentKind::Gateway)
    }
}
