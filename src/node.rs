//! A node: one independently configured ingestion endpoint.

use crate::config::NodeConfig;
use crate::host::ThreadFactory;
use crate::net::{CancelHandle, Receiver};
use crate::parser::{parse_datagram, GaugeOp, ParsedUpdate};
use crate::registry::{MetricRegistry, MetricType};
use crate::MetricsError;
use parking_lot::Mutex;
use std::sync::Arc;
use std::thread::JoinHandle;
use tracing::error;

enum RunState {
    Idle,
    Running {
        cancel: CancelHandle,
        handle: JoinHandle<()>,
    },
}

/// An independently configured ingestion instance: its own bind address,
/// config, registry, and receive task. A node's registry mutex is never
/// shared with any other node.
pub struct Node {
    config: NodeConfig,
    registry: Arc<MetricRegistry>,
    state: Mutex<RunState>,
}

impl Node {
    /// Constructs a node from its configuration. Does not bind any socket;
    /// call [`Node::start`] to begin receiving.
    #[must_use]
    pub fn new(config: NodeConfig) -> Self {
        Self {
            config,
            registry: Arc::new(MetricRegistry::new()),
            state: Mutex::new(RunState::Idle),
        }
    }

    /// This node's configuration.
    #[must_use]
    pub const fn config(&self) -> &NodeConfig {
        &self.config
    }

    /// This node's metric registry, for use by the flush engine.
    #[must_use]
    pub fn registry(&self) -> &MetricRegistry {
        &self.registry
    }

    /// Binds the listening sockets and spawns the receive task via
    /// `factory`. Calling `start` on an already-running node is a no-op.
    ///
    /// # Errors
    ///
    /// Returns an error if sockets could not be bound or the receive task
    /// could not be spawned.
    pub fn start(&self, factory: &dyn ThreadFactory) -> Result<(), MetricsError> {
        let mut state = self.state.lock();
        if matches!(*state, RunState::Running { .. }) {
            return Ok(());
        }

        let receiver = Receiver::bind(&self.config.host, &self.config.port)?;
        let cancel = receiver.cancel_handle()?;
        let registry = Arc::clone(&self.registry);
        let node_name = self.config.node_name.clone();

        let handle = factory.spawn(
            format!("statsd-{node_name}"),
            Box::new(move || {
                receiver.run(|datagram| apply_datagram(&registry, datagram));
            }),
        )?;

        *state = RunState::Running { cancel, handle };
        Ok(())
    }

    /// Signals cancellation to the receive task and joins it. A no-op if
    /// the node is not running.
    ///
    /// # Errors
    ///
    /// Returns an error if the receive task panicked.
    pub fn stop(&self) -> Result<(), MetricsError> {
        let mut state = self.state.lock();
        if let RunState::Running { cancel, handle } = std::mem::replace(&mut *state, RunState::Idle) {
            cancel.cancel();
            handle
                .join()
                .map_err(|_| MetricsError::from("receive task panicked"))?;
        }
        Ok(())
    }
}

impl Drop for Node {
    fn drop(&mut self) {
        if let Err(err) = self.stop() {
            error!("statsd plugin: error stopping node during drop: {err}");
        }
    }
}

/// Parses one received datagram and applies every well-formed line to
/// `registry`. Malformed lines are logged and otherwise ignored; they
/// never abort the rest of the datagram.
fn apply_datagram(registry: &MetricRegistry, datagram: &str) {
    for result in parse_datagram(datagram) {
        match result {
            Ok(update) => apply_update(registry, &update),
            Err(parse_err) => {
                error!("statsd plugin: Unable to parse line: \"{}\"", parse_err.echo);
            }
        }
    }
}

fn apply_update(registry: &MetricRegistry, update: &ParsedUpdate) {
    match update {
        ParsedUpdate::Counter { name, delta } => {
            registry.add(name, *delta, MetricType::Counter);
        }
        ParsedUpdate::Timer { name, duration } => {
            if let Err(err) = registry.timer_add(name, *duration) {
                error!("statsd plugin: failed to record timer sample for \"{name}\": {err}");
            }
        }
        ParsedUpdate::Gauge { name, op } => match op {
            GaugeOp::Absolute(v) => registry.set(name, *v, MetricType::Gauge),
            GaugeOp::Relative(v) => registry.add(name, *v, MetricType::Gauge),
        },
        ParsedUpdate::Set { name, member } => registry.set_add(name, member),
    }
}
