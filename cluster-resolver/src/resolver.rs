//! The per-target resolver: turns discovery lookups into connection state.

use crate::{
    Address, ClientConn, ComponentKind, DiscoveryContext, DiscoveryError, Options, ResolveError,
    ServiceConfig, State, Target,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::{fmt, sync::Arc};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

/// Keeps one dial target's connection in sync with discovery.
///
/// Created by [`ResolverBuilder::build`](crate::ResolverBuilder::build). The
/// connection runtime calls [`resolve_now`](Resolver::resolve_now) whenever it
/// wants fresh addresses and [`close`](Resolver::close) once it is done.
pub struct Resolver {
    cluster: String,
    component: ComponentKind,
    opts: Options,

    cc: Arc<dyn ClientConn>,
    // Only present when a balancer policy is configured.
    service_config: Option<ServiceConfig>,

    token: CancellationToken,
    created_at: DateTime<Utc>,

    // Held for the whole refresh, which serializes `resolve_now` calls.
    last: Mutex<LastResolution>,
}

#[derive(Default)]
struct LastResolution {
    resolved_at: Option<DateTime<Utc>>,
    error: Option<Arc<ResolveError>>,
    addrs: Vec<String>,
}

/// A copy of a resolver's state, for operational tooling.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolverSnapshot {
    pub cluster: String,
    pub component: ComponentKind,
    pub created_at: DateTime<Utc>,
    #[serde(rename = "addr_list")]
    pub addrs: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_resolved_at: Option<DateTime<Utc>>,
    #[serde(rename = "error", skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    pub closed: bool,
}

impl fmt::Debug for Resolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resolver")
            .field("cluster", &self.cluster)
            .field("component", &self.component)
            .field("created_at", &self.created_at)
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

impl Resolver {
    pub(crate) fn new(
        target: &Target,
        opts: Options,
        cc: Arc<dyn ClientConn>,
        service_config: Option<ServiceConfig>,
    ) -> Self {
        Self {
            cluster: target.cluster().to_string(),
            component: target.component(),
            opts,
            cc,
            service_config,
            // Not derived from any caller: the resolver's lifetime is its own.
            token: CancellationToken::new(),
            created_at: Utc::now(),
            last: Mutex::new(LastResolution::default()),
        }
    }

    pub fn cluster(&self) -> &str {
        &self.cluster
    }

    pub fn component(&self) -> ComponentKind {
        self.component
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Look up fresh addresses and push them to the connection.
    ///
    /// Concurrent calls are serialized. Failures are reported through
    /// [`ClientConn::report_error`] and recorded in the snapshot, never
    /// returned. An empty lookup result is still pushed.
    pub async fn resolve_now(&self) {
        let mut last = self.last.lock().await;
        let resolved_at = Utc::now();

        let (addrs, result) = self.refresh().await;

        *last = LastResolution {
            resolved_at: Some(resolved_at),
            error: result.err().map(Arc::new),
            addrs,
        };
    }

    /// Cancel any in-flight lookup. No further state is pushed once this returns.
    ///
    /// Calling it more than once is harmless.
    pub fn close(&self) {
        if !self.token.is_cancelled() {
            tracing::debug!(cluster = %self.cluster, component = %self.component, "closing resolver");
        }
        self.token.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolves once [`close`](Resolver::close) has been called.
    pub async fn closed(&self) {
        self.token.cancelled().await
    }

    /// Copy out the outcome of the most recently completed refresh.
    ///
    /// Waits for an in-flight refresh to finish.
    pub async fn snapshot(&self) -> ResolverSnapshot {
        let last = self.last.lock().await;

        ResolverSnapshot {
            cluster: self.cluster.clone(),
            component: self.component,
            created_at: self.created_at,
            addrs: last.addrs.clone(),
            last_resolved_at: last.resolved_at,
            last_error: last.error.as_ref().map(|err| err.to_string()),
            closed: self.is_closed(),
        }
    }

    /// Runs one refresh, returning the addresses it ended up with and whether
    /// it succeeded.
    async fn refresh(&self) -> (Vec<String>, Result<(), ResolveError>) {
        let state = match self.resolve().await {
            Ok(state) => state,
            Err(err) => {
                tracing::error!(
                    cluster = %self.cluster,
                    component = %self.component,
                    "failed to resolve new addresses: {}", err
                );
                self.cc.report_error(&err);
                return (Vec::new(), Err(err));
            }
        };

        if state.addresses.is_empty() {
            tracing::warn!(
                cluster = %self.cluster,
                component = %self.component,
                "found no addresses; updating connection state anyway"
            );
        } else {
            tracing::info!(
                cluster = %self.cluster,
                component = %self.component,
                "found {} addresses", state.addresses.len()
            );
        }

        let addrs = state
            .addresses
            .iter()
            .map(|address| address.addr.clone())
            .collect();

        if let Err(source) = self.cc.update_state(state).await {
            let err = ResolveError::UpdateState {
                component: self.component,
                cluster: self.cluster.clone(),
                source,
            };
            tracing::error!(
                cluster = %self.cluster,
                component = %self.component,
                "failed to update connection state: {}", err
            );
            self.cc.report_error(&err);
            return (addrs, Err(err));
        }

        (addrs, Ok(()))
    }

    #[tracing::instrument(
        level = "debug",
        skip(self),
        fields(cluster = %self.cluster, component = %self.component)
    )]
    async fn resolve(&self) -> Result<State, ResolveError> {
        tracing::info!("resolving {} addresses", self.component);

        let ctx = DiscoveryContext::new(self.token.child_token(), self.opts.discovery_timeout);
        let addrs = self
            .discover(&ctx)
            .await
            .map_err(|source| ResolveError::Discover {
                component: self.component,
                cluster: self.cluster.clone(),
                source,
            })?;

        tracing::debug!(addrs = %addrs.join(","), "discovered addresses");

        if let Some(policy) = self
            .service_config
            .as_ref()
            .and_then(ServiceConfig::balancer_policy)
        {
            tracing::debug!(balancer_policy = %policy, "attaching service config");
        }

        Ok(State {
            addresses: addrs.into_iter().map(Address::from).collect(),
            service_config: self.service_config.clone(),
        })
    }

    /// Runs the lookup for this resolver's component until it finishes or
    /// `ctx` is done. Results arriving after `ctx` is done are discarded.
    async fn discover(&self, ctx: &DiscoveryContext) -> Result<Vec<String>, DiscoveryError> {
        let discovery = &self.opts.discovery;
        let tags = &self.opts.discovery_tags;

        let lookup = async {
            match self.component {
                ComponentKind::ControlPlane => {
                    discovery.discover_control_plane_addrs(ctx, tags).await
                }
                ComponentKind::Gateway => discovery.discover_gateway_addrs(ctx, tags).await,
            }
        };

        tokio::select! {
            biased;
            result = lookup => match ctx.err() {
                Some(err) => Err(err),
                None => result.map_err(DiscoveryError::from),
            },
            err = ctx.done() => Err(err),
        }
    }
}
