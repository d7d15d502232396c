use crate::{ResolveError, ResolverBuilder};
use std::{fmt, str::FromStr};

/// The logical role a dial target resolves to inside a cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComponentKind {
    /// Control-plane nodes.
    ControlPlane,
    /// Gateway nodes.
    Gateway,
}

impl ComponentKind {
    /// Every supported component kind.
    pub const ALL: [ComponentKind; 2] = [ComponentKind::ControlPlane, ComponentKind::Gateway];

    /// The host part used for this component in a dial target.
    pub fn as_str(&self) -> &'static str {
        match self {
            ComponentKind::ControlPlane => "control-plane",
            ComponentKind::Gateway => "gateway",
        }
    }
}

impl fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ComponentKind {
    type Err = ResolveError;

    fn from_str(host: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == host)
            .ok_or_else(|| ResolveError::UnsupportedTarget {
                host: host.to_string(),
            })
    }
}

impl serde::Serialize for ComponentKind {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// A parsed dial target of the form `{cluster}://{component}/`.
///
/// The scheme names the cluster and selects the [`ResolverBuilder`], the host
/// selects which discovery lookup the resolver performs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    cluster: String,
    component: ComponentKind,
}

impl Target {
    /// Create a [`Target`] from its parts.
    pub fn new<T: ToString>(cluster: T, component: ComponentKind) -> Self {
        Self {
            cluster: cluster.to_string(),
            component,
        }
    }

    /// The cluster identifier, i.e. the scheme of the dial target.
    pub fn cluster(&self) -> &str {
        &self.cluster
    }

    /// The component kind, i.e. the host of the dial target.
    pub fn component(&self) -> ComponentKind {
        self.component
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}/", self.cluster, self.component)
    }
}

impl FromStr for Target {
    type Err = ResolveError;

    fn from_str(target: &str) -> Result<Self, Self::Err> {
        let invalid = |reason| ResolveError::InvalidTarget {
            target: target.to_string(),
            reason,
        };

        let (cluster, rest) = target
            .split_once("://")
            .ok_or_else(|| invalid("missing '://' separator"))?;
        if cluster.is_empty() {
            return Err(invalid("empty cluster scheme"));
        }

        let host = rest.split('/').next().unwrap_or_default();
        let component = host.parse()?;

        Ok(Self::new(cluster, component))
    }
}

/// Format the dial address for `component` on the cluster served by `builder`.
///
/// Channels should dial through this so their targets reach the builder's
/// resolvers.
///
/// ```
/// use cluster_resolver::{dial_addr, ComponentKind, Options, StaticDiscovery};
///
/// let builder = Options::new(StaticDiscovery::default()).new_builder("local");
/// assert_eq!(dial_addr(&builder, ComponentKind::Gateway), "local://gateway/");
/// ```
pub fn dial_addr(builder: &ResolverBuilder, component: ComponentKind) -> String {
    Target::new(builder.scheme(), component).to_string()
}
