use crate::{BalancerPolicy, Discovery, ResolverBuilder};
use std::{fmt, sync::Arc, time::Duration};

/// Discovery timeout used unless [`Options::discovery_timeout`] is called.
pub const DEFAULT_DISCOVERY_TIMEOUT: Duration = Duration::from_millis(100);

/// Configuration shared by every resolver a [`ResolverBuilder`] creates.
///
/// ```
/// use cluster_resolver::{BalancerPolicy, ComponentKind, Options, StaticDiscovery};
/// use std::time::Duration;
///
/// let discovery = StaticDiscovery::default()
///     .with_addrs(ComponentKind::Gateway, ["10.0.0.1:15991"]);
///
/// let builder = Options::new(discovery)
///     .discovery_tags(["az:us-east-1a"])
///     .discovery_timeout(Duration::from_millis(250))
///     .balancer_policy(BalancerPolicy::RoundRobin)
///     .new_builder("cluster1");
///
/// assert_eq!(builder.scheme(), "cluster1");
/// ```
#[derive(Clone)]
pub struct Options {
    pub(crate) discovery: Arc<dyn Discovery>,
    pub(crate) discovery_tags: Vec<String>,
    pub(crate) discovery_timeout: Duration,
    pub(crate) balancer_policy: BalancerPolicy,
}

impl Options {
    /// Start configuring resolvers that look addresses up through `discovery`.
    pub fn new<D: Discovery + 'static>(discovery: D) -> Self {
        Self {
            discovery: Arc::new(discovery),
            discovery_tags: Vec::new(),
            discovery_timeout: DEFAULT_DISCOVERY_TIMEOUT,
            balancer_policy: BalancerPolicy::Unset,
        }
    }

    /// Set the tags passed to every discovery lookup. Their meaning is up to
    /// the [`Discovery`] implementation.
    pub fn discovery_tags<I, T>(self, tags: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        Self {
            discovery_tags: tags.into_iter().map(Into::into).collect(),
            ..self
        }
    }

    /// Set how long a single discovery lookup may take.
    ///
    /// A zero timeout is accepted, but every lookup will then fail with a
    /// deadline error.
    pub fn discovery_timeout(self, timeout: Duration) -> Self {
        Self {
            discovery_timeout: timeout,
            ..self
        }
    }

    /// Ask every connection to use `policy`. Defaults to [`BalancerPolicy::Unset`],
    /// which leaves the choice to the connection.
    pub fn balancer_policy(self, policy: BalancerPolicy) -> Self {
        Self {
            balancer_policy: policy,
            ..self
        }
    }

    /// Create a [`ResolverBuilder`] for `scheme`, which should be a cluster id.
    ///
    /// The builder keeps its own copy of these options.
    pub fn new_builder<T: ToString>(&self, scheme: T) -> ResolverBuilder {
        ResolverBuilder::new(scheme.to_string(), self.clone())
    }
}

impl fmt::Debug for Options {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Options")
            .field("discovery_tags", &self.discovery_tags)
            .field("discovery_timeout", &self.discovery_timeout)
            .field("balancer_policy", &self.balancer_policy)
            .finish_non_exhaustive()
    }
}
