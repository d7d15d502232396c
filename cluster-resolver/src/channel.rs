//! Provides a tonic [`Channel`] whose endpoints are driven by a [`Resolver`].

use crate::{
    BalancerPolicy, ClientConn, ComponentKind, ResolveError, Resolver, ResolverBuilder,
    ServiceConfig, State, Target,
};
use anyhow::Context as _;
use http::Request;
use std::{
    collections::HashSet,
    sync::{Arc, Mutex, PoisonError},
    task::{Context, Poll},
    time::Duration,
};
use tokio::sync::mpsc::Sender;
use tonic::body::BoxBody;
use tonic::client::GrpcService;
use tonic::transport::{Channel, ClientTlsConfig, Endpoint};
use tower::discover::Change;
use tower_service::Service;
use tracing_futures::Instrument;

// Determines the channel size of the channel we use
// to report endpoint changes to tonic.
// This is effectively how many changes we can report in one go.
// We set the number high to avoid any blocking on our side.
static GRPC_REPORT_ENDPOINTS_CHANNEL_SIZE: usize = 1024;

const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(10);

/// Implements [`ClientConn`] on top of [`Channel::balance_channel`].
///
/// Every pushed [`State`] is diffed against the endpoints the channel
/// currently knows, and only the difference is reported to tonic. With the
/// `pick_first` policy only the first address is kept.
#[derive(Debug)]
pub(crate) struct TonicClientConn {
    sender: Sender<Change<String, Endpoint>>,
    endpoint_config: EndpointConfig,
    endpoints: Mutex<HashSet<String>>,
}

#[derive(Debug)]
struct EndpointConfig {
    timeout: Option<Duration>,
    connect_timeout: Option<Duration>,
    tls_config: Option<ClientTlsConfig>,
}

impl TonicClientConn {
    fn new(sender: Sender<Change<String, Endpoint>>, endpoint_config: EndpointConfig) -> Self {
        Self {
            sender,
            endpoint_config,
            endpoints: Mutex::new(HashSet::new()),
        }
    }

    fn endpoints(&self) -> HashSet<String> {
        self.endpoints
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Resolves once the channel stopped listening for endpoint changes,
    /// i.e. every handle to it was dropped.
    async fn channel_closed(&self) {
        self.sender.closed().await
    }

    fn endpoint(&self, addr: &str) -> Result<Endpoint, anyhow::Error> {
        let config = &self.endpoint_config;
        let scheme = if config.tls_config.is_some() {
            "https"
        } else {
            "http"
        };

        let mut endpoint = Endpoint::from_shared(format!("{scheme}://{addr}"))
            .with_context(|| format!("invalid address {addr}"))?;

        if let Some(timeout) = config.timeout {
            endpoint = endpoint.timeout(timeout);
        }
        if let Some(connect_timeout) = config.connect_timeout {
            endpoint = endpoint.connect_timeout(connect_timeout);
        }
        if let Some(tls_config) = &config.tls_config {
            endpoint = endpoint
                .tls_config(tls_config.clone())
                .context("failed to apply tls config")?;
        }

        Ok(endpoint)
    }
}

#[async_trait::async_trait]
impl ClientConn for TonicClientConn {
    async fn update_state(&self, state: State) -> Result<(), anyhow::Error> {
        let policy = state
            .service_config
            .as_ref()
            .and_then(ServiceConfig::balancer_policy);
        let keep = match policy {
            Some(BalancerPolicy::PickFirst) => 1,
            _ => usize::MAX,
        };

        let mut wanted = HashSet::new();
        let mut inserts = Vec::new();
        let valid = state
            .addresses
            .into_iter()
            .filter_map(|address| match self.endpoint(&address.addr) {
                Ok(endpoint) => Some((address.addr, endpoint)),
                Err(err) => {
                    tracing::warn!("skipping address: {:#}", err);
                    None
                }
            });
        // Invalid addresses never count towards `keep`.
        for (addr, endpoint) in valid.take(keep) {
            if wanted.insert(addr.clone()) {
                inserts.push((addr, endpoint));
            }
        }

        let removals = {
            let mut current = self
                .endpoints
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            inserts.retain(|(addr, _)| !current.contains(addr));
            let removals: Vec<String> = current.difference(&wanted).cloned().collect();
            *current = wanted;
            removals
        };

        for (addr, endpoint) in inserts {
            tracing::debug!("adding endpoint {}", addr);
            self.sender
                .send(Change::Insert(addr, endpoint))
                .await
                .context("channel stopped accepting endpoint changes")?;
        }
        for addr in removals {
            tracing::debug!("removing endpoint {}", addr);
            self.sender
                .send(Change::Remove(addr))
                .await
                .context("channel stopped accepting endpoint changes")?;
        }

        Ok(())
    }

    fn report_error(&self, err: &ResolveError) {
        tracing::warn!("resolver error, keeping previous endpoints: {}", err);
    }

    fn parse_service_config(&self, document: &str) -> Result<ServiceConfig, anyhow::Error> {
        let config = ServiceConfig::from_json(document)?;
        if config.balancer_policy().is_none() {
            anyhow::bail!(
                "no supported load balancing policy in {:?}; must be one of {}",
                config.policy_names().collect::<Vec<_>>(),
                BalancerPolicy::CHOICES.join(", ")
            );
        }
        Ok(config)
    }
}

/// Implements tonic [`GrpcService`] for a [`Channel`] whose endpoints come from
/// a [`Resolver`].
///
/// ```rust
/// #[tokio::main]
/// async fn main() {
///     use cluster_resolver::{ComponentKind, Options, ResolvedChannel, StaticDiscovery};
///     use std::sync::Arc;
///
///     let discovery = StaticDiscovery::default()
///         .with_addrs(ComponentKind::Gateway, ["127.0.0.1:15991"]);
///     let builder = Arc::new(Options::new(discovery).new_builder("cluster1"));
///
///     let channel = ResolvedChannel::builder(builder, ComponentKind::Gateway)
///         .channel()
///         .await
///         .expect("failed to construct ResolvedChannel");
///
///     channel.close();
/// }
/// ```
#[derive(Debug, Clone)]
pub struct ResolvedChannel {
    channel: Channel,
    resolver: Arc<Resolver>,
    cc: Arc<TonicClientConn>,
}

impl From<ResolvedChannel> for Channel {
    fn from(channel: ResolvedChannel) -> Self {
        channel.channel
    }
}

impl ResolvedChannel {
    /// Start configuring a [`ResolvedChannel`] to `component` on the cluster
    /// served by `builder`.
    pub fn builder(
        builder: Arc<ResolverBuilder>,
        component: ComponentKind,
    ) -> ResolvedChannelBuilder {
        ResolvedChannelBuilder::new(builder, component)
    }

    /// The resolver feeding this channel.
    pub fn resolver(&self) -> &Arc<Resolver> {
        &self.resolver
    }

    /// The addresses the channel is currently balancing over.
    pub fn endpoints(&self) -> HashSet<String> {
        self.cc.endpoints()
    }

    /// Close the resolver. The channel keeps its last endpoints but stops
    /// refreshing them.
    pub fn close(&self) {
        self.resolver.close()
    }
}

impl Service<http::Request<BoxBody>> for ResolvedChannel {
    type Response = http::Response<<Channel as GrpcService<BoxBody>>::ResponseBody>;
    type Error = <Channel as GrpcService<BoxBody>>::Error;
    type Future = <Channel as GrpcService<BoxBody>>::Future;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        GrpcService::poll_ready(&mut self.channel, cx)
    }

    fn call(&mut self, request: Request<BoxBody>) -> Self::Future {
        GrpcService::call(&mut self.channel, request)
    }
}

/// Builder to configure and create a [`ResolvedChannel`].
pub struct ResolvedChannelBuilder {
    builder: Arc<ResolverBuilder>,
    component: ComponentKind,
    refresh_interval: Option<Duration>,
    timeout: Option<Duration>,
    connect_timeout: Option<Duration>,
    tls_config: Option<ClientTlsConfig>,
}

impl ResolvedChannelBuilder {
    pub fn new(builder: Arc<ResolverBuilder>, component: ComponentKind) -> Self {
        Self {
            builder,
            component,
            refresh_interval: None,
            timeout: None,
            connect_timeout: None,
            tls_config: None,
        }
    }

    /// Set how often the resolver is asked to refresh.
    /// Default interval in seconds is 10.
    pub fn refresh_interval(self, interval: Duration) -> Self {
        Self {
            refresh_interval: Some(interval),
            ..self
        }
    }

    /// Set a request timeout that will be applied to every new `Endpoint`.
    pub fn timeout(self, timeout: Duration) -> Self {
        Self {
            timeout: Some(timeout),
            ..self
        }
    }

    /// Set a connection timeout that will be applied to every new `Endpoint`.
    ///
    /// Defaults to the overall request `timeout` if not set.
    pub fn connect_timeout(self, connect_timeout: Duration) -> Self {
        Self {
            connect_timeout: Some(connect_timeout),
            ..self
        }
    }

    /// Configure the channel to use tls.
    ///
    /// Discovered addresses are dialed as given, so when they are IPs the
    /// `tls_config` should carry the expected domain name.
    pub fn with_tls(self, tls_config: ClientTlsConfig) -> Self {
        Self {
            tls_config: Some(tls_config),
            ..self
        }
    }

    /// Construct a [`ResolvedChannel`].
    ///
    /// The first resolution has run when this returns. Its failure does not
    /// fail construction; the channel simply starts without endpoints and
    /// picks them up on a later refresh.
    pub async fn channel(self) -> Result<ResolvedChannel, anyhow::Error> {
        let refresh_interval = self.refresh_interval.unwrap_or(DEFAULT_REFRESH_INTERVAL);
        if refresh_interval.is_zero() {
            anyhow::bail!("refresh interval must be greater than zero");
        }

        let (channel, sender) =
            Channel::balance_channel::<String>(GRPC_REPORT_ENDPOINTS_CHANNEL_SIZE);

        let cc = Arc::new(TonicClientConn::new(
            sender,
            EndpointConfig {
                timeout: self.timeout,
                connect_timeout: self.connect_timeout.or(self.timeout),
                tls_config: self.tls_config,
            },
        ));

        let target = Target::new(self.builder.scheme(), self.component);
        let resolver = self
            .builder
            .build(&target, Arc::clone(&cc) as Arc<dyn ClientConn>)
            .await
            .with_context(|| format!("failed to build resolver for {target}"))?;

        tokio::spawn(
            refresh_periodically(Arc::clone(&resolver), Arc::clone(&cc), refresh_interval)
                .instrument(tracing::debug_span!("refresh", target = %target)),
        );

        Ok(ResolvedChannel {
            channel,
            resolver,
            cc,
        })
    }
}

/// Calls [`Resolver::resolve_now`] every `interval` until the resolver is
/// closed or the channel is dropped.
async fn refresh_periodically(
    resolver: Arc<Resolver>,
    cc: Arc<TonicClientConn>,
    interval: Duration,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    // The first tick fires immediately and the build already resolved once.
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = resolver.closed() => break,
            _ = cc.channel_closed() => {
                resolver.close();
                break;
            }
            _ = ticker.tick() => resolver.resolve_now().await,
        }
    }

    tracing::debug!("stopped refreshing");
}

const _: () = {
    const fn assert_is_send<T: Send>() {}
    assert_is_send::<ResolvedChannelBuilder>();
    assert_is_send::<ResolvedChannel>();
};
