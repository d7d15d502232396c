//! `cluster-resolver` keeps a long-lived gRPC connection pointed at the right
//! nodes of a cluster by turning a pluggable [`Discovery`] into connection
//! state updates.
//!
//! Channels do not dial fixed addresses. They dial a logical target of the
//! form `{cluster}://{component}/`, and a [`Resolver`] looks the component's
//! addresses up whenever the connection asks for fresh ones.
//!
//! # Simple example
//!
//! ```rust
//! #[tokio::main]
//! async fn main() {
//!     use cluster_resolver::{ComponentKind, Options, ResolvedChannel, StaticDiscovery};
//!     use std::sync::Arc;
//!
//!     let discovery = StaticDiscovery::default()
//!         .with_addrs(ComponentKind::ControlPlane, ["10.0.0.1:15999", "10.0.0.2:15999"]);
//!
//!     // One builder per cluster, shared by every channel into that cluster.
//!     let builder = Arc::new(Options::new(discovery).new_builder("cluster1"));
//!
//!     let channel = ResolvedChannel::builder(builder, ComponentKind::ControlPlane)
//!         .channel()
//!         .await
//!         .expect("failed to construct ResolvedChannel");
//!
//!     // `channel` can now be handed to any tonic generated client.
//!     # channel.close();
//! }
//! ```
//!
//! [`ResolverBuilder`] also works with a different implementation of [`Discovery`].
//!
//! ```rust
//! use cluster_resolver::{Discovery, DiscoveryContext};
//!
//! // This finds nothing
//! struct EmptyDiscovery;
//!
//! #[async_trait::async_trait]
//! impl Discovery for EmptyDiscovery {
//!     async fn discover_control_plane_addrs(
//!         &self,
//!         _ctx: &DiscoveryContext,
//!         _tags: &[String],
//!     ) -> Result<Vec<String>, anyhow::Error> {
//!         Ok(Vec::new())
//!     }
//!
//!     async fn discover_gateway_addrs(
//!         &self,
//!         _ctx: &DiscoveryContext,
//!         _tags: &[String],
//!     ) -> Result<Vec<String>, anyhow::Error> {
//!         Ok(Vec::new())
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() {
//!     use cluster_resolver::{BalancerPolicy, ComponentKind, Options, ResolvedChannel};
//!     use std::{sync::Arc, time::Duration};
//!
//!     let builder = Options::new(EmptyDiscovery)
//!         .discovery_timeout(Duration::from_millis(500))
//!         .balancer_policy(BalancerPolicy::RoundRobin)
//!         .new_builder("cluster1");
//!
//!     let channel = ResolvedChannel::builder(Arc::new(builder), ComponentKind::Gateway)
//!         .refresh_interval(Duration::from_secs(3))
//!         .timeout(Duration::from_secs(10))
//!         .channel()
//!         .await
//!         .expect("failed to construct ResolvedChannel");
//!
//!     assert!(channel.endpoints().is_empty());
//!     # channel.close();
//! }
//! ```
//!
//! # Internals
//! A [`ResolverBuilder`] creates one [`Resolver`] per dial target and resolves
//! once before handing it back. Every [`Resolver::resolve_now`] runs one
//! bounded discovery lookup and pushes the outcome to its [`ClientConn`];
//! concurrent refreshes of one resolver are serialized.
//!
//! [`ResolvedChannel`] provides the [`ClientConn`] on top of tonic's
//! [`balance_channel`](tonic::transport::Channel::balance_channel), reporting
//! added and removed addresses through its bounded endpoint-change channel,
//! and asks its resolver for fresh addresses periodically.

mod builder;
mod channel;
mod client_conn;
mod discovery;
mod error;
mod options;
mod policy;
mod registry;
mod resolver;
mod service_config;
mod target;

pub use builder::*;
pub use channel::{ResolvedChannel, ResolvedChannelBuilder};
pub use client_conn::*;
pub use discovery::*;
pub use error::*;
pub use options::*;
pub use policy::*;
pub use registry::*;
pub use resolver::*;
pub use service_config::*;
pub use target::*;
