//! Exercises the real UDP receive loop: bind, send, poll, parse, apply.

use statsd_ingest::config::NodeConfig;
use statsd_ingest::host::StdThreadFactory;
use statsd_ingest::node::Node;
use std::net::UdpSocket;
use std::time::Duration;

fn wait_for<F: Fn() -> bool>(cond: F, timeout: Duration) -> bool {
    let start = std::time::Instant::now();
    while start.elapsed() < timeout {
        if cond() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    false
}

#[test]
fn udp_datagrams_reach_the_registry() {
    // Node does not expose its bound address, so this test binds to a
    // fixed high port rather than letting the OS pick an ephemeral one.
    let mut config = NodeConfig::default();
    config.host = "127.0.0.1".to_string();
    config.port = "18125".to_string();
    let node = Node::new(config);
    node.start(&StdThreadFactory).expect("node should start");

    let client = UdpSocket::bind("127.0.0.1:0").expect("client bind");
    client
        .send_to(b"page.views:1|c\npage.views:1|c\n", "127.0.0.1:18125")
        .expect("send");

    let arrived = wait_for(|| node.registry().len() == 1, Duration::from_secs(2));
    assert!(arrived, "datagram was not applied to the registry in time");

    node.registry().flush_each(|name, entry| {
        assert_eq!(name, "page.views");
        assert_eq!(entry.scalar(), 2.0);
        false
    });

    node.stop().expect("node should stop cleanly");
}
