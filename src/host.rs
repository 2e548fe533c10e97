//! Narrow contracts exposed by the host metrics daemon.
//!
//! This crate owns aggregation; everything else — thread creation, value
//! dispatch, hostname discovery, general logging — belongs to the process
//! embedding it. These traits are the seams at which that embedding
//! happens; nothing downstream of them is this crate's concern.

use crate::MetricsError;
use std::fmt;
use std::sync::Arc;
use std::thread::JoinHandle;

/// Tag distinguishing the two value kinds a [`ValueSink`] may receive, one
/// for each row of derived output this crate can emit.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum ValueKind {
    /// A point-in-time scalar (gauges, set cardinality, timer series,
    /// the absolute-value half of a counter flush).
    Gauge(f64),
    /// A monotonically-accumulating counter, from which the host computes
    /// a rate (the rate half of a counter flush).
    Derive(i64),
}

/// One row of derived output, ready for dispatch to the host daemon.
#[derive(Debug, Clone)]
pub struct ValueRecord<'a> {
    /// Local hostname, as provided by [`HostnameProvider`].
    pub host: Arc<str>,
    /// Always `"statsd"`; retained on the record so sinks that multiplex
    /// several plugins can distinguish the source.
    pub plugin: &'static str,
    /// The node's configured instance tag.
    pub plugin_instance: &'a str,
    /// Value-list type, e.g. `"gauge"`, `"derive"`, `"latency"`, `"objects"`.
    pub value_type: &'static str,
    /// Fully composed metric name (prefixes, name, suffix, postfix).
    pub type_instance: &'a str,
    /// Flush timestamp; every record in the same flush shares one value.
    pub time: crate::duration::CdTime,
    /// The value itself.
    pub value: ValueKind,
}

/// Destination for derived metric values. The host daemon implements this
/// over its own transport; this crate never constructs a sink itself.
pub trait ValueSink: Send + Sync {
    /// Dispatches one record.
    ///
    /// # Errors
    ///
    /// Returns an error if the sink could not accept the record. The flush
    /// engine logs the failure and continues with the remaining metrics.
    fn dispatch(&self, record: &ValueRecord<'_>) -> Result<(), MetricsError>;
}

/// A sink that discards every record; useful for nodes run without a
/// configured host transport (tests, dry runs).
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl ValueSink for NullSink {
    fn dispatch(&self, _record: &ValueRecord<'_>) -> Result<(), MetricsError> {
        Ok(())
    }
}

/// Provides the process-wide hostname attached to every dispatched record.
pub trait HostnameProvider: Send + Sync {
    /// Returns the local hostname.
    fn hostname(&self) -> Arc<str>;
}

/// A hostname provider that reads `uname()` once and caches the result.
pub struct SystemHostname(Arc<str>);

impl SystemHostname {
    /// Reads the local hostname via `uname()`.
    ///
    /// # Errors
    ///
    /// Returns an error if the nodename is not valid UTF-8.
    pub fn new() -> Result<Self, MetricsError> {
        let uname = rustix::system::uname();
        let nodename = uname.nodename();
        let nodename = nodename
            .to_str()
            .map_err(|_| MetricsError::from("hostname is not valid UTF-8"))?;
        Ok(Self(Arc::from(nodename)))
    }
}

impl HostnameProvider for SystemHostname {
    fn hostname(&self) -> Arc<str> {
        Arc::clone(&self.0)
    }
}

/// Spawns the background tasks this crate needs (one receive loop per
/// node), letting the host daemon control its own thread pool / naming /
/// priority conventions instead of this crate calling `std::thread::spawn`
/// directly.
pub trait ThreadFactory: Send + Sync {
    /// Spawns `f` as a named background task, returning a join handle.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying thread could not be created.
    fn spawn(
        &self,
        name: String,
        f: Box<dyn FnOnce() + Send>,
    ) -> Result<JoinHandle<()>, MetricsError>;
}

/// The default factory: `std::thread::Builder` named after the node.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdThreadFactory;

impl ThreadFactory for StdThreadFactory {
    fn spawn(
        &self,
        name: String,
        f: Box<dyn FnOnce() + Send>,
    ) -> Result<JoinHandle<()>, MetricsError> {
        std::thread::Builder::new()
            .name(name)
            .spawn(f)
            .map_err(MetricsError::from)
    }
}

impl fmt::Debug for dyn ValueSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("dyn ValueSink")
    }
}
