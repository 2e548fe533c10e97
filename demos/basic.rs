//! Configures a single node, starts ingestion, and flushes once.
//!
//! Run with: `cargo run --example basic`, then in another terminal:
//! `echo -n "page.views:1|c" | nc -u -w0 127.0.0.1 8125`

use statsd_ingest::config::NodeConfig;
use statsd_ingest::host::NullSink;
use statsd_ingest::plugin::Plugin;
use std::time::Duration;

fn main() {
    tracing_subscriber_init();

    let mut plugin = Plugin::new().expect("failed to read system hostname");
    plugin
        .configure(NodeConfig::default())
        .expect("default config is always valid");
    plugin.init().expect("failed to bind listening sockets");

    println!("listening on localhost:8125, flushing every 2s (Ctrl-C to stop)");
    loop {
        std::thread::sleep(Duration::from_secs(2));
        plugin.read(&NullSink);
    }
}

fn tracing_subscriber_init() {
    // Left as a no-op here: wiring an actual `tracing` subscriber is the
    // embedding host daemon's responsibility, not this crate's.
}
