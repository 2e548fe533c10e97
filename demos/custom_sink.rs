//! Demonstrates a custom `ValueSink` that prints every flushed record,
//! standing in for whatever transport the host daemon actually uses.

use statsd_ingest::config::NodeConfig;
use statsd_ingest::host::{ValueKind, ValueRecord, ValueSink};
use statsd_ingest::plugin::Plugin;
use statsd_ingest::MetricsError;
use std::time::Duration;

struct PrintSink;

impl ValueSink for PrintSink {
    fn dispatch(&self, record: &ValueRecord<'_>) -> Result<(), MetricsError> {
        let value = match record.value {
            ValueKind::Gauge(v) => v,
            ValueKind::Derive(v) => v as f64,
        };
        println!(
            "{} plugin_instance={} type={} {}={value}",
            record.host, record.plugin_instance, record.value_type, record.type_instance
        );
        Ok(())
    }
}

fn main() {
    let mut config = NodeConfig::default();
    config.node_name = "demo".to_string();

    let mut plugin = Plugin::new().expect("failed to read system hostname");
    plugin.configure(config).expect("default config is always valid");
    plugin.init().expect("failed to bind listening sockets");

    let sink = PrintSink;
    loop {
        std::thread::sleep(Duration::from_secs(2));
        plugin.read(&sink);
    }
}
