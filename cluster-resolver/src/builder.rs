//! Provides the [`ResolverBuilder`] that manufactures one [`Resolver`] per dial
//! target and keeps track of everything it built.

use crate::{ClientConn, Options, ResolveError, Resolver, ResolverSnapshot, Target};
use serde::Serialize;
use std::sync::{Arc, Mutex, PoisonError};

/// Builds [`Resolver`]s for one scheme, i.e. one cluster.
///
/// Every resolver it builds is kept for introspection for as long as the
/// builder lives, including closed ones.
pub struct ResolverBuilder {
    scheme: String,
    opts: Options,

    // Never held across an await, and never while a resolver lock is taken.
    resolvers: Mutex<Vec<Arc<Resolver>>>,
}

/// A copy of a builder's configuration and of all its resolvers' state.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BuilderSnapshot {
    pub scheme: String,
    pub discovery_tags: Vec<String>,
    pub discovery_timeout: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub balancer_policy: String,
    pub resolvers: Vec<ResolverSnapshot>,
}

impl ResolverBuilder {
    pub(crate) fn new(scheme: String, opts: Options) -> Self {
        Self {
            scheme,
            opts,
            resolvers: Mutex::new(Vec::new()),
        }
    }

    /// The scheme dial targets must use to reach this builder.
    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    /// Build a resolver for `target` that keeps `cc` up to date.
    ///
    /// The first resolution happens before this returns, so the connection
    /// has addresses before its first call. A failing first resolution does
    /// not fail the build: it is reported to `cc` like any later failure.
    #[tracing::instrument(level = "debug", skip(self, target, cc), fields(target = %target))]
    pub async fn build(
        &self,
        target: &Target,
        cc: Arc<dyn ClientConn>,
    ) -> Result<Arc<Resolver>, ResolveError> {
        let resolver = Arc::new(self.new_resolver(target, cc)?);

        self.resolvers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Arc::clone(&resolver));

        resolver.resolve_now().await;

        Ok(resolver)
    }

    fn new_resolver(
        &self,
        target: &Target,
        cc: Arc<dyn ClientConn>,
    ) -> Result<Resolver, ResolveError> {
        let policy = self.opts.balancer_policy;
        let service_config = match policy.service_config_json() {
            Some(document) => Some(
                cc.parse_service_config(&document)
                    .map_err(|source| ResolveError::ServiceConfig { policy, source })?,
            ),
            None => None,
        };

        Ok(Resolver::new(target, self.opts.clone(), cc, service_config))
    }

    /// Number of resolvers built so far.
    pub fn len(&self) -> usize {
        self.resolvers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy out the builder's configuration and every resolver's snapshot.
    pub async fn snapshot(&self) -> BuilderSnapshot {
        // Copy the registry first so no resolver lock is awaited while the
        // registry lock is held.
        let resolvers = self
            .resolvers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        let mut snapshots = Vec::with_capacity(resolvers.len());
        for resolver in resolvers {
            snapshots.push(resolver.snapshot().await);
        }

        BuilderSnapshot {
            scheme: self.scheme.clone(),
            discovery_tags: self.opts.discovery_tags.clone(),
            discovery_timeout: format!("{:?}", self.opts.discovery_timeout),
            balancer_policy: self.opts.balancer_policy.to_string(),
            resolvers: snapshots,
        }
    }

    /// [`snapshot`](ResolverBuilder::snapshot) rendered as JSON.
    pub async fn snapshot_json(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::to_value(self.snapshot().await)
    }
}
