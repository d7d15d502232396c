use cluster_resolver::{ClientConn, ComponentKind, Options, Resolver, ResolverBuilder, Target};
use std::sync::Arc;
use std::time::Duration;
use tests::fakes::{FakeDiscovery, RecordingClientConn};

fn gateway() -> Target {
    Target::new("cluster1", ComponentKind::Gateway)
}

async fn build(
    builder: &ResolverBuilder,
    target: &Target,
    cc: &Arc<RecordingClientConn>,
) -> Arc<Resolver> {
    builder
        .build(target, Arc::clone(cc) as Arc<dyn ClientConn>)
        .await
        .expect("failed to build resolver")
}

#[tokio::test]
async fn pushes_discovered_addresses_in_discovery_order() {
    let discovery = Arc::new(FakeDiscovery::new());
    discovery.set_addrs(ComponentKind::Gateway, ["b:2", "a:1", "c:3"]);
    let cc = Arc::new(RecordingClientConn::new());
    let builder = Options::new(Arc::clone(&discovery))
        .discovery_tags(["az:east"])
        .new_builder("cluster1");

    let resolver = build(&builder, &gateway(), &cc).await;

    let states = cc.states();
    assert_eq!(states.len(), 1);
    assert_eq!(cc.last_addrs().unwrap(), ["b:2", "a:1", "c:3"]);
    assert!(states[0].service_config.is_none());
    assert!(cc.errors().is_empty());

    let lookups = discovery.lookups();
    assert_eq!(lookups.len(), 1);
    assert_eq!(lookups[0].component, ComponentKind::Gateway);
    assert_eq!(lookups[0].tags, ["az:east"]);

    let snapshot = resolver.snapshot().await;
    assert_eq!(snapshot.addrs, ["b:2", "a:1", "c:3"]);
    assert!(snapshot.last_resolved_at.is_some());
    assert!(snapshot.last_error.is_none());
}

#[tokio::test]
async fn empty_discovery_still_pushes_state() {
    let discovery = Arc::new(FakeDiscovery::new());
    discovery.set_addrs(ComponentKind::Gateway, ["a:1"]);
    let cc = Arc::new(RecordingClientConn::new());
    let builder = Options::new(Arc::clone(&discovery)).new_builder("cluster1");
    let resolver = build(&builder, &gateway(), &cc).await;

    discovery.set_addrs(ComponentKind::Gateway, Vec::<String>::new());
    resolver.resolve_now().await;

    let states = cc.states();
    assert_eq!(states.len(), 2);
    assert!(states[1].addresses.is_empty());
    assert!(cc.errors().is_empty());

    let snapshot = resolver.snapshot().await;
    assert!(snapshot.addrs.is_empty());
    assert!(snapshot.last_error.is_none());
}

#[tokio::test(start_paused = true)]
async fn slow_discovery_times_out_without_pushing() {
    let discovery = Arc::new(FakeDiscovery::new());
    discovery.set_addrs(ComponentKind::Gateway, ["a:1"]);
    discovery.set_delay(Duration::from_secs(5));
    let cc = Arc::new(RecordingClientConn::new());
    let builder = Options::new(Arc::clone(&discovery))
        .discovery_timeout(Duration::from_millis(100))
        .new_builder("cluster1");

    let resolver = build(&builder, &gateway(), &cc).await;

    assert!(cc.states().is_empty());
    let errors = cc.errors();
    assert_eq!(errors.len(), 1);
    assert!(
        errors[0].starts_with("failed to discover gateway addresses (cluster cluster1)"),
        "{}",
        errors[0]
    );
    assert!(errors[0].contains("deadline exceeded"), "{}", errors[0]);

    let snapshot = resolver.snapshot().await;
    assert_eq!(snapshot.last_error.as_deref(), Some(errors[0].as_str()));
    assert!(snapshot.addrs.is_empty());
}

#[tokio::test]
async fn zero_timeout_fails_every_lookup() {
    let discovery = Arc::new(FakeDiscovery::new());
    discovery.set_addrs(ComponentKind::Gateway, ["a:1"]);
    let cc = Arc::new(RecordingClientConn::new());
    let builder = Options::new(Arc::clone(&discovery))
        .discovery_timeout(Duration::ZERO)
        .new_builder("cluster1");

    let resolver = build(&builder, &gateway(), &cc).await;
    resolver.resolve_now().await;

    assert!(cc.states().is_empty());
    assert_eq!(cc.errors().len(), 2);
    assert!(resolver.snapshot().await.last_error.is_some());
}

#[tokio::test]
async fn discovery_failure_is_reported_and_recovered_from() {
    let discovery = Arc::new(FakeDiscovery::new());
    discovery.set_addrs(ComponentKind::ControlPlane, ["cp:1"]);
    discovery.fail_with("directory unavailable");
    let cc = Arc::new(RecordingClientConn::new());
    let builder = Options::new(Arc::clone(&discovery)).new_builder("cluster1");
    let target = Target::new("cluster1", ComponentKind::ControlPlane);

    let resolver = build(&builder, &target, &cc).await;

    assert_eq!(
        cc.errors(),
        ["failed to discover control-plane addresses (cluster cluster1): directory unavailable"]
    );
    assert!(cc.states().is_empty());

    discovery.succeed();
    resolver.resolve_now().await;

    assert_eq!(cc.last_addrs().unwrap(), ["cp:1"]);
    let snapshot = resolver.snapshot().await;
    assert_eq!(snapshot.addrs, ["cp:1"]);
    assert!(snapshot.last_error.is_none());
}

#[tokio::test]
async fn rejected_update_is_recorded_and_reported() {
    let discovery = Arc::new(FakeDiscovery::new());
    discovery.set_addrs(ComponentKind::Gateway, ["a:1", "b:2"]);
    let cc = Arc::new(RecordingClientConn::new());
    cc.fail_updates();
    let builder = Options::new(Arc::clone(&discovery)).new_builder("cluster1");

    let resolver = build(&builder, &gateway(), &cc).await;

    assert_eq!(cc.states().len(), 1);
    assert_eq!(
        cc.errors(),
        ["failed to update gateway addresses (cluster cluster1): connection is shutting down"]
    );

    let snapshot = resolver.snapshot().await;
    assert_eq!(snapshot.addrs, ["a:1", "b:2"]);
    assert_eq!(snapshot.last_error.as_deref(), Some(cc.errors()[0].as_str()));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_refreshes_are_serialized() {
    let discovery = Arc::new(FakeDiscovery::new().numbered());
    discovery.set_delay(Duration::from_millis(5));
    let cc = Arc::new(RecordingClientConn::new());
    let builder = Options::new(Arc::clone(&discovery))
        .discovery_timeout(Duration::from_secs(5))
        .new_builder("cluster1");
    let resolver = build(&builder, &gateway(), &cc).await;

    let handles: Vec<_> = (0..10)
        .map(|_| {
            let resolver = Arc::clone(&resolver);
            tokio::spawn(async move { resolver.resolve_now().await })
        })
        .collect();
    for handle in handles {
        handle.await.expect("refresh panicked");
    }

    assert_eq!(discovery.lookups().len(), 11);
    assert_eq!(discovery.max_in_flight(), 1);
    assert_eq!(cc.states().len(), 11);
    assert!(cc.errors().is_empty());

    // The snapshot reflects whichever refresh completed last.
    let snapshot = resolver.snapshot().await;
    assert_eq!(Some(snapshot.addrs), cc.last_addrs());
}

#[tokio::test]
async fn close_cancels_later_lookups() {
    let discovery = Arc::new(FakeDiscovery::new());
    discovery.set_addrs(ComponentKind::Gateway, ["a:1"]);
    let cc = Arc::new(RecordingClientConn::new());
    let builder = Options::new(Arc::clone(&discovery)).new_builder("cluster1");
    let resolver = build(&builder, &gateway(), &cc).await;

    resolver.close();
    resolver.close();
    assert!(resolver.is_closed());
    resolver.resolve_now().await;

    let lookups = discovery.lookups();
    assert_eq!(lookups.len(), 2);
    assert!(!lookups[0].cancelled);
    assert!(lookups[1].cancelled);

    assert_eq!(cc.states().len(), 1);
    assert_eq!(cc.errors().len(), 1);
    assert!(cc.errors()[0].contains("cancelled"), "{}", cc.errors()[0]);
    assert!(resolver.snapshot().await.closed);
}

#[tokio::test(start_paused = true)]
async fn close_interrupts_in_flight_lookup() {
    let discovery = Arc::new(FakeDiscovery::new());
    discovery.set_addrs(ComponentKind::Gateway, ["a:1"]);
    let cc = Arc::new(RecordingClientConn::new());
    let builder = Options::new(Arc::clone(&discovery))
        .discovery_timeout(Duration::from_secs(60))
        .new_builder("cluster1");
    let resolver = build(&builder, &gateway(), &cc).await;

    discovery.set_delay(Duration::from_secs(30));
    let refresh = tokio::spawn({
        let resolver = Arc::clone(&resolver);
        async move { resolver.resolve_now().await }
    });
    tokio::time::sleep(Duration::from_secs(1)).await;

    let start = tokio::time::Instant::now();
    resolver.close();
    refresh.await.expect("refresh panicked");

    assert!(start.elapsed() < Duration::from_secs(1));
    assert_eq!(cc.states().len(), 1);
    assert!(cc.errors()[0].contains("cancelled"), "{}", cc.errors()[0]);
}

#[tokio::test]
async fn closing_one_resolver_leaves_siblings_running() {
    let discovery = Arc::new(FakeDiscovery::new());
    discovery.set_addrs(ComponentKind::Gateway, ["gw:1"]);
    discovery.set_addrs(ComponentKind::ControlPlane, ["cp:1"]);
    let builder = Options::new(Arc::clone(&discovery)).new_builder("cluster1");

    let gateway_cc = Arc::new(RecordingClientConn::new());
    let control_plane_cc = Arc::new(RecordingClientConn::new());
    let gateway_resolver = build(&builder, &gateway(), &gateway_cc).await;
    let control_plane_resolver = build(
        &builder,
        &Target::new("cluster1", ComponentKind::ControlPlane),
        &control_plane_cc,
    )
    .await;

    gateway_resolver.close();
    control_plane_resolver.resolve_now().await;

    assert_eq!(control_plane_cc.states().len(), 2);
    assert!(control_plane_cc.errors().is_empty());
    assert!(!control_plane_resolver.is_closed());
}
