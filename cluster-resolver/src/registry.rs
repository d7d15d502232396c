//! Routes dial targets to the [`ResolverBuilder`] registered for their scheme.

use crate::{BuilderSnapshot, ResolveError, ResolvedChannelBuilder, ResolverBuilder, Target};
use std::{collections::HashMap, sync::Arc};

/// A set of [`ResolverBuilder`]s keyed by scheme, i.e. one per cluster.
///
/// ```
/// use cluster_resolver::{BuilderRegistry, Options, StaticDiscovery};
///
/// let mut registry = BuilderRegistry::default();
/// registry.register(Options::new(StaticDiscovery::default()).new_builder("east"));
/// registry.register(Options::new(StaticDiscovery::default()).new_builder("west"));
///
/// assert!(registry.channel("east://gateway/").is_ok());
/// assert!(registry.channel("north://gateway/").is_err());
/// assert!(registry.channel("west://vtgate/").is_err());
/// ```
#[derive(Default)]
pub struct BuilderRegistry {
    builders: HashMap<String, Arc<ResolverBuilder>>,
}

impl BuilderRegistry {
    /// Register `builder` under its scheme, replacing any builder previously
    /// registered for it.
    pub fn register(&mut self, builder: ResolverBuilder) -> Arc<ResolverBuilder> {
        let builder = Arc::new(builder);
        if let Some(previous) = self
            .builders
            .insert(builder.scheme().to_string(), Arc::clone(&builder))
        {
            tracing::warn!(
                scheme = previous.scheme(),
                "replacing resolver builder; its {} resolvers stay alive",
                previous.len()
            );
        }
        builder
    }

    pub fn get(&self, scheme: &str) -> Option<&Arc<ResolverBuilder>> {
        self.builders.get(scheme)
    }

    /// Start configuring a channel for a `{cluster}://{component}/` dial target.
    pub fn channel(&self, dial_target: &str) -> Result<ResolvedChannelBuilder, ResolveError> {
        let target: Target = dial_target.parse()?;
        let builder = self
            .get(target.cluster())
            .ok_or_else(|| ResolveError::UnknownScheme {
                scheme: target.cluster().to_string(),
            })?;

        Ok(ResolvedChannelBuilder::new(
            Arc::clone(builder),
            target.component(),
        ))
    }

    /// Snapshots of every registered builder, ordered by scheme.
    pub async fn snapshot(&self) -> Vec<BuilderSnapshot> {
        let mut builders: Vec<_> = self.builders.values().collect();
        builders.sort_by(|a, b| a.scheme().cmp(b.scheme()));

        let mut snapshots = Vec::with_capacity(builders.len());
        for builder in builders {
            snapshots.push(builder.snapshot().await);
        }
        snapshots
    }
}
