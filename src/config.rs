//! Per-node configuration.
//!
//! The host daemon's own config-file grammar is out of scope for this
//! crate; `NodeConfig` is the typed value that grammar is expected to
//! populate before handing it to [`crate::plugin::Plugin::configure`].

/// Which derived timer series a node emits on flush, beyond the average
/// that is always emitted.
#[derive(Debug, Clone, Default)]
pub struct TimerOutputs {
    /// Emit the `-lower` (minimum) series.
    pub lower: bool,
    /// Emit the `-upper` (maximum) series.
    pub upper: bool,
    /// Emit the `-sum` series.
    pub sum: bool,
    /// Emit the `-count` series (as a `gauge`, not `latency`, value type).
    pub count: bool,
    /// Percentiles to emit, each as `-percentile-<p>`. Every value must lie
    /// in `(0, 100)`.
    pub percentiles: Vec<f64>,
}

/// Name composition prefixes/postfix applied when emitting derived series.
#[derive(Debug, Clone, Default)]
pub struct NamePrefixes {
    /// Prepended to every metric regardless of type.
    pub global: String,
    /// Prepended to counter metrics, after `global`.
    pub counter: String,
    /// Prepended to timer metrics, after `global`.
    pub timer: String,
    /// Prepended to gauge metrics, after `global`.
    pub gauge: String,
    /// Prepended to set metrics, after `global`.
    pub set: String,
    /// Appended to every metric regardless of type.
    pub global_postfix: String,
}

/// Which idle (`updates_num == 0`) entries are removed at flush, per type.
#[derive(Debug, Clone, Default)]
pub struct DeleteOnIdle {
    /// Delete idle counters.
    pub counters: bool,
    /// Delete idle timers.
    pub timers: bool,
    /// Delete idle gauges.
    pub gauges: bool,
    /// Delete idle sets.
    pub sets: bool,
}

/// Full configuration for one node.
#[derive(Debug, Clone)]
pub struct NodeConfig {
    /// Bind host. Passed verbatim to name resolution, so a hostname,
    /// numeric address, or empty string (any address) are all accepted.
    pub host: String,
    /// Bind port or service name. Passed verbatim to name resolution.
    pub port: String,
    /// Instance tag attached to every record dispatched by this node.
    pub node_name: String,
    /// Idle-deletion flags, one per metric type.
    pub delete_on_idle: DeleteOnIdle,
    /// Which derived timer series to emit.
    pub timer_outputs: TimerOutputs,
    /// If true, the timer average series uses the bare composite name
    /// (no `-average` suffix) instead of the usual suffixed name.
    pub leave_metrics_name_as_is: bool,
    /// Name composition prefixes/postfix.
    pub prefixes: NamePrefixes,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: "8125".to_string(),
            node_name: "default".to_string(),
            delete_on_idle: DeleteOnIdle::default(),
            timer_outputs: TimerOutputs::default(),
            leave_metrics_name_as_is: false,
            prefixes: NamePrefixes::default(),
        }
    }
}

impl NodeConfig {
    /// Validates percentile values, which must each lie in `(0, 100)`.
    ///
    /// # Errors
    ///
    /// Returns an error naming the first out-of-range percentile found.
    pub fn validate(&self) -> Result<(), crate::MetricsError> {
        for p in &self.timer_outputs.percentiles {
            if !(*p > 0.0 && *p < 100.0) {
                return Err(crate::MetricsError::InvalidConfig(format!(
                    "TimerPercentile {p} is outside (0, 100)"
                )));
            }
        }
        Ok(())
    }
}
