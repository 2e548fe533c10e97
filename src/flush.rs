//! Periodic flush: derived-value emission, delete-on-idle, and state reset.

use crate::config::NodeConfig;
use crate::duration::CdTime;
use crate::host::{HostnameProvider, ValueKind, ValueRecord, ValueSink};
use crate::node::Node;
use crate::registry::{MetricEntry, MetricType};
use tracing::{debug, error};

/// Runs one flush pass over `node`: emits derived values to `sink`, resets
/// per-interval state, and removes entries left idle by a configured
/// `Delete*` flag.
///
/// This is the operation the host daemon invokes on every collection tick,
/// once per node.
pub fn flush_node(node: &Node, hostname: &dyn HostnameProvider, sink: &dyn ValueSink) {
    let host = hostname.hostname();
    let config = node.config();
    debug!("statsd plugin: read: node {}", config.node_name);

    node.registry().flush_each(|name, entry| {
        if should_delete(config, entry) {
            debug!("statsd plugin: deleting metric \"{name}\"");
            return true;
        }

        submit_entry(config, &host, name, entry, sink);
        entry.reset_after_flush();
        false
    });
}

fn should_delete(config: &NodeConfig, entry: &MetricEntry) -> bool {
    if entry.updates_num() != 0 {
        return false;
    }
    match entry.metric_type() {
        MetricType::Counter => config.delete_on_idle.counters,
        MetricType::Timer => config.delete_on_idle.timers,
        MetricType::Gauge => config.delete_on_idle.gauges,
        MetricType::Set => config.delete_on_idle.sets,
    }
}

fn type_prefix(config: &NodeConfig, metric_type: MetricType) -> &str {
    match metric_type {
        MetricType::Counter => &config.prefixes.counter,
        MetricType::Timer => &config.prefixes.timer,
        MetricType::Gauge => &config.prefixes.gauge,
        MetricType::Set => &config.prefixes.set,
    }
}

fn full_name(config: &NodeConfig, metric_type: MetricType, name: &str) -> String {
    format!(
        "{}{}{}{}",
        config.prefixes.global,
        type_prefix(config, metric_type),
        name,
        config.prefixes.global_postfix
    )
}

fn submit_entry(
    config: &NodeConfig,
    host: &std::sync::Arc<str>,
    name: &str,
    entry: &MetricEntry,
    sink: &dyn ValueSink,
) {
    debug!("statsd plugin: submit metric");
    let full_name = full_name(config, entry.metric_type(), name);
    let time = CdTime::now();

    match entry.metric_type() {
        MetricType::Gauge => {
            dispatch(
                sink,
                host,
                config,
                &full_name,
                "gauge",
                time,
                ValueKind::Gauge(entry.scalar()),
            );
        }
        MetricType::Set => {
            dispatch(
                sink,
                host,
                config,
                &full_name,
                "objects",
                time,
                ValueKind::Gauge(entry.set_cardinality() as f64),
            );
        }
        MetricType::Counter => {
            dispatch(
                sink,
                host,
                config,
                &full_name,
                "derive",
                time,
                ValueKind::Derive(entry.scalar() as i64),
            );
            dispatch(
                sink,
                host,
                config,
                &full_name,
                "gauge",
                time,
                ValueKind::Gauge(entry.scalar()),
            );
        }
        MetricType::Timer => submit_timer(config, host, &full_name, entry, sink, time),
    }
}

#[allow(clippy::too_many_arguments)]
fn submit_timer(
    config: &NodeConfig,
    host: &std::sync::Arc<str>,
    full_name: &str,
    entry: &MetricEntry,
    sink: &dyn ValueSink,
    time: CdTime,
) {
    let have_events = entry.updates_num() > 0;
    let histogram = entry.histogram();

    let average_name = if config.leave_metrics_name_as_is {
        full_name.to_string()
    } else {
        format!("{full_name}-average")
    };
    let average = if have_events {
        histogram.map_or(f64::NAN, |h| h.average().as_millis_f64())
    } else {
        f64::NAN
    };
    dispatch(sink, host, config, &average_name, "latency", time, ValueKind::Gauge(average));

    if config.timer_outputs.lower {
        let v = if have_events {
            histogram.map_or(f64::NAN, |h| h.min().as_millis_f64())
        } else {
            f64::NAN
        };
        dispatch(sink, host, config, &format!("{full_name}-lower"), "latency", time, ValueKind::Gauge(v));
    }

    if config.timer_outputs.upper {
        let v = if have_events {
            histogram.map_or(f64::NAN, |h| h.max().as_millis_f64())
        } else {
            f64::NAN
        };
        dispatch(sink, host, config, &format!("{full_name}-upper"), "latency", time, ValueKind::Gauge(v));
    }

    if config.timer_outputs.sum {
        let v = if have_events {
            histogram.map_or(f64::NAN, |h| h.sum().as_millis_f64())
        } else {
            f64::NAN
        };
        dispatch(sink, host, config, &format!("{full_name}-sum"), "latency", time, ValueKind::Gauge(v));
    }

    for p in &config.timer_outputs.percentiles {
        let v = if have_events {
            histogram.map_or(f64::NAN, |h| h.percentile(*p).as_millis_f64())
        } else {
            f64::NAN
        };
        let suffix_name = format!("{full_name}-percentile-{:.0}", p);
        dispatch(sink, host, config, &suffix_name, "latency", time, ValueKind::Gauge(v));
    }

    // Kept last, since it dispatches with value type "gauge" rather than
    // the "latency" every series above used.
    if config.timer_outputs.count {
        let count = if have_events { entry.updates_num() as f64 } else { 0.0 };
        dispatch(sink, host, config, &format!("{full_name}-count"), "gauge", time, ValueKind::Gauge(count));
    }
}

fn dispatch(
    sink: &dyn ValueSink,
    host: &std::sync::Arc<str>,
    config: &NodeConfig,
    type_instance: &str,
    value_type: &'static str,
    time: CdTime,
    value: ValueKind,
) {
    let record = ValueRecord {
        host: std::sync::Arc::clone(host),
        plugin: "statsd",
        plugin_instance: &config.node_name,
        value_type,
        type_instance,
        time,
        value,
    };
    if let Err(err) = sink.dispatch(&record) {
        error!("statsd plugin: dispatch failed for \"{type_instance}\": {err}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{NullSink, SystemHostname};
    use parking_lot::Mutex;
    use std::sync::Arc;

    struct RecordingSink {
        records: Mutex<Vec<(String, &'static str, ValueKind)>>,
    }

    impl ValueSink for RecordingSink {
        fn dispatch(&self, record: &ValueRecord<'_>) -> Result<(), crate::MetricsError> {
            self.records.lock().push((
                record.type_instance.to_string(),
                record.value_type,
                record.value,
            ));
            Ok(())
        }
    }

    struct FixedHostname;
    impl HostnameProvider for FixedHostname {
        fn hostname(&self) -> Arc<str> {
            Arc::from("test-host")
        }
    }

    #[test]
    fn counter_flush_emits_derive_then_gauge() {
        let node = Node::new(NodeConfig::default());
        node.registry().add("page.views", 10.0, MetricType::Counter);
        node.registry().add("page.views", 1.0, MetricType::Counter);

        let sink = RecordingSink { records: Mutex::new(Vec::new()) };
        flush_node(&node, &FixedHostname, &sink);

        let records = sink.records.lock();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].0, "page.views");
        assert_eq!(records[0].1, "derive");
        assert_eq!(records[1].1, "gauge");
    }

    #[test]
    fn idle_entry_is_not_deleted_without_flag() {
        let node = Node::new(NodeConfig::default());
        node.registry().add("tmp", 1.0, MetricType::Counter);
        let sink = NullSink;
        flush_node(&node, &FixedHostname, &sink);
        flush_node(&node, &FixedHostname, &sink);
        assert_eq!(node.registry().len(), 1);
    }

    #[test]
    fn delete_on_idle_removes_after_second_flush() {
        let mut config = NodeConfig::default();
        config.delete_on_idle.sets = true;
        let node = Node::new(config);
        node.registry().set_add("login", "a");
        let sink = NullSink;
        flush_node(&node, &FixedHostname, &sink);
        assert_eq!(node.registry().len(), 1);
        flush_node(&node, &FixedHostname, &sink);
        assert!(node.registry().is_empty());
    }

    #[test]
    fn hostname_provider_is_usable() {
        let _ = SystemHostname::new();
    }
}
