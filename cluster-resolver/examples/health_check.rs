use std::{sync::Arc, time::Duration};

use anyhow::Context;
use cluster_resolver::{BalancerPolicy, ComponentKind, Options, ResolvedChannel, StaticDiscovery};
use tonic_health::pb::{health_client::HealthClient, HealthCheckRequest};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Discovery would normally ask a directory service; here the gateway of
    // `local` is a server on localhost.
    let discovery = StaticDiscovery::default()
        .with_addrs(ComponentKind::Gateway, ["127.0.0.1:50051"]);

    let builder = Options::new(discovery)
        .discovery_timeout(Duration::from_millis(250))
        .balancer_policy(BalancerPolicy::RoundRobin)
        .new_builder("local");

    // The gateway addresses are resolved once before the channel is handed back.
    let channel = ResolvedChannel::builder(Arc::new(builder), ComponentKind::Gateway)
        .refresh_interval(Duration::from_secs(5))
        .timeout(Duration::from_secs(3))
        .channel()
        .await
        .context("failed to build ResolvedChannel")?;

    let mut client = HealthClient::new(channel.clone());

    let request = tonic::Request::new(HealthCheckRequest {
        service: String::new(),
    });

    let response = client.check(request).await?;

    println!("RESPONSE={response:?}");
    println!(
        "RESOLVER={}",
        serde_json::to_string_pretty(&channel.resolver().snapshot().await)?
    );

    channel.close();

    Ok(())
}
