//! # statsd-ingest
//!
//! A StatsD ingestion plugin for a host metrics-collection daemon: a UDP
//! receive loop, a line-oriented StatsD wire parser, a keyed metric
//! registry for counters/gauges/timers/sets, a bounded-memory latency
//! histogram, and a periodic flush engine that derives and emits values.
//!
//! ## What this crate owns
//!
//! - The aggregation engine and its concurrency model (one mutex per
//!   node, guarding the registry and every metric payload within it).
//! - The wire parser, independent of any transport.
//! - The receive loop: socket binding, readiness multiplexing, and clean
//!   cancellation between datagrams.
//! - The flush engine: derived-value computation, delete-on-idle, reset.
//!
//! ## What it delegates to the host daemon
//!
//! Thread creation, value dispatch, and hostname discovery are exposed as
//! the narrow [`host::ThreadFactory`], [`host::ValueSink`], and
//! [`host::HostnameProvider`] traits; this crate never assumes a specific
//! host process. [`plugin::Plugin`] is the lifecycle facade a host wires
//! its `configure`/`init`/`read`/`shutdown` callbacks through.
//!
//! ## Quick start
//!
//! ```no_run
//! use statsd_ingest::config::NodeConfig;
//! use statsd_ingest::host::NullSink;
//! use statsd_ingest::plugin::Plugin;
//!
//! let mut plugin = Plugin::new().unwrap();
//! plugin.configure(NodeConfig::default()).unwrap();
//! plugin.init().unwrap();
//! // ... host daemon calls plugin.read(&sink) on every collection tick ...
//! plugin.read(&NullSink);
//! plugin.shutdown().unwrap();
//! ```

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![deny(clippy::todo)]
#![deny(clippy::unimplemented)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(missing_docs)]
#![warn(clippy::missing_errors_doc)]
#![warn(clippy::missing_panics_doc)]
#![allow(clippy::module_name_repetitions)]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod config;
pub mod duration;
mod error;
pub mod flush;
pub mod histogram;
pub mod host;
pub mod net;
pub mod node;
pub mod parser;
pub mod plugin;
pub mod registry;

pub use error::MetricsError;

/// Result type for operations in this crate.
pub type MetricResult<T> = Result<T, MetricsError>;
