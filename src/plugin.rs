//! Lifecycle facade wiring nodes into a host daemon's plugin ABI.

use crate::config::NodeConfig;
use crate::flush::flush_node;
use crate::host::{HostnameProvider, StdThreadFactory, SystemHostname, ThreadFactory, ValueSink};
use crate::node::Node;
use crate::MetricsError;
use std::sync::Arc;
use tracing::debug;

/// Owns every configured node and exposes the four callbacks a host daemon
/// drives a plugin through: `configure`, `init`, `read`, `shutdown`.
///
/// A `Plugin` has no knowledge of any particular host process; it is
/// parameterized entirely over the [`ThreadFactory`], [`ValueSink`], and
/// [`HostnameProvider`] the embedder supplies.
pub struct Plugin {
    nodes: Vec<Node>,
    thread_factory: Arc<dyn ThreadFactory>,
    hostname: Arc<dyn HostnameProvider>,
}

impl Plugin {
    /// Creates an empty plugin using the default thread factory
    /// (`std::thread::Builder`) and system hostname provider.
    ///
    /// # Errors
    ///
    /// Returns an error if the system hostname cannot be read.
    pub fn new() -> Result<Self, MetricsError> {
        Ok(Self {
            nodes: Vec::new(),
            thread_factory: Arc::new(StdThreadFactory),
            hostname: Arc::new(SystemHostname::new()?),
        })
    }

    /// Creates an empty plugin with host-supplied collaborators.
    #[must_use]
    pub fn with_host(
        thread_factory: Arc<dyn ThreadFactory>,
        hostname: Arc<dyn HostnameProvider>,
    ) -> Self {
        Self {
            nodes: Vec::new(),
            thread_factory,
            hostname,
        }
    }

    /// `configure`: registers one node from its configuration. May be
    /// called multiple times to register several independent nodes.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration fails validation.
    pub fn configure(&mut self, config: NodeConfig) -> Result<(), MetricsError> {
        config.validate()?;
        self.nodes.push(Node::new(config));
        Ok(())
    }

    /// `init`: starts every configured node's receive task.
    ///
    /// # Errors
    ///
    /// Returns the first error encountered binding a node's sockets or
    /// spawning its receive task.
    pub fn init(&self) -> Result<(), MetricsError> {
        for node in &self.nodes {
            node.start(self.thread_factory.as_ref())?;
        }
        Ok(())
    }

    /// `read`: invoked once per collection tick by the host daemon. Flushes
    /// every node and dispatches derived values to `sink`.
    pub fn read(&self, sink: &dyn ValueSink) {
        debug!("statsd plugin: read: nodes {}", self.nodes.len());
        for node in &self.nodes {
            flush_node(node, self.hostname.as_ref(), sink);
        }
    }

    /// `shutdown`: signals cancellation to every node's receive task and
    /// joins it.
    ///
    /// # Errors
    ///
    /// Returns the first error encountered joining a node's receive task.
    pub fn shutdown(&self) -> Result<(), MetricsError> {
        debug!("statsd plugin: shutting down {} nodes", self.nodes.len());
        for node in &self.nodes {
            node.stop()?;
        }
        Ok(())
    }

    /// The nodes currently registered, for diagnostics and tests.
    #[must_use]
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }
}
