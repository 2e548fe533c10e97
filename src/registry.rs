//! Keyed registry of metric state, guarded by a single per-node mutex.

use crate::histogram::LatencyHistogram;
use crate::MetricsError;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};

/// Upper bound on a metric name's length, matching the host daemon's
/// name-length ceiling. Longer names are truncated at insertion.
pub const MAX_NAME_LEN: usize = 1024;

/// The closed set of StatsD metric types.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum MetricType {
    /// Monotonically-accumulated sum, flushed as both a rate and a gauge.
    Counter,
    /// Sample stream of durations, summarized by percentile.
    Timer,
    /// Point-in-time scalar, updated absolutely or by signed delta.
    Gauge,
    /// Stream of discrete identifiers, summarized by distinct cardinality.
    Set,
}

impl MetricType {
    /// The single-character tag used as the first byte of the composite
    /// registry key, keeping same-named metrics of different types from
    /// aliasing.
    const fn tag(self) -> char {
        match self {
            Self::Counter => 'c',
            Self::Timer => 't',
            Self::Gauge => 'g',
            Self::Set => 's',
        }
    }
}

/// Per-type payload of a registry entry.
pub enum MetricValue {
    /// Accumulated value for a counter or gauge.
    Scalar(f64),
    /// Lazily-created latency histogram; absent until the first sample.
    Timer(Option<LatencyHistogram>),
    /// Distinct member set.
    Set(HashSet<String>),
}

/// One entry in the registry: a metric's current state plus the number of
/// updates applied since the last flush.
pub struct MetricEntry {
    metric_type: MetricType,
    value: MetricValue,
    updates_num: u64,
}

impl MetricEntry {
    /// The metric's fixed type.
    #[must_use]
    pub const fn metric_type(&self) -> MetricType {
        self.metric_type
    }

    /// Number of successful updates since the last flush reset.
    #[must_use]
    pub const fn updates_num(&self) -> u64 {
        self.updates_num
    }

    /// The current scalar value. Returns `0.0` if this entry is not a
    /// counter or gauge; callers dispatch on `metric_type()` first.
    #[must_use]
    pub fn scalar(&self) -> f64 {
        match self.value {
            MetricValue::Scalar(v) => v,
            _ => 0.0,
        }
    }

    /// The timer's histogram, if any sample has been recorded.
    #[must_use]
    pub fn histogram(&self) -> Option<&LatencyHistogram> {
        match &self.value {
            MetricValue::Timer(h) => h.as_ref(),
            _ => None,
        }
    }

    /// Number of distinct members currently held by a set metric.
    #[must_use]
    pub fn set_cardinality(&self) -> usize {
        match &self.value {
            MetricValue::Set(members) => members.len(),
            _ => 0,
        }
    }

    /// Resets `updates_num` to zero and, for sets, clears membership, as
    /// performed at the end of each flush.
    pub fn reset_after_flush(&mut self) {
        self.updates_num = 0;
        if let MetricValue::Set(members) = &mut self.value {
            members.clear();
        }
        if let MetricValue::Timer(hist) = &mut self.value {
            if let Some(h) = hist {
                h.reset();
            }
        }
    }
}

fn truncate_name(name: &str) -> &str {
    if name.len() <= MAX_NAME_LEN {
        return name;
    }
    let mut end = MAX_NAME_LEN;
    while !name.is_char_boundary(end) {
        end -= 1;
    }
    &name[..end]
}

fn composite_key(metric_type: MetricType, name: &str) -> String {
    let mut key = String::with_capacity(name.len() + 2);
    key.push(metric_type.tag());
    key.push(':');
    key.push_str(truncate_name(name));
    key
}

/// Keyed map of `(type, name) -> metric state`, guarded by a single mutex
/// shared by every writer and the periodic flush reader.
pub struct MetricRegistry {
    entries: Mutex<HashMap<String, MetricEntry>>,
}

impl Default for MetricRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Sets a metric's value absolutely (used by gauges).
    pub fn set(&self, name: &str, value: f64, metric_type: MetricType) {
        let key = composite_key(metric_type, name);
        let mut entries = self.entries.lock();
        let entry = entries.entry(key).or_insert_with(|| MetricEntry {
            metric_type,
            value: MetricValue::Scalar(0.0),
            updates_num: 0,
        });
        entry.value = MetricValue::Scalar(value);
        entry.updates_num += 1;
    }

    /// Adds a delta to a metric's value (used by counters and relative
    /// gauge updates).
    pub fn add(&self, name: &str, delta: f64, metric_type: MetricType) {
        let key = composite_key(metric_type, name);
        let mut entries = self.entries.lock();
        let entry = entries.entry(key).or_insert_with(|| MetricEntry {
            metric_type,
            value: MetricValue::Scalar(0.0),
            updates_num: 0,
        });
        if let MetricValue::Scalar(v) = &mut entry.value {
            *v += delta;
        }
        entry.updates_num += 1;
    }

    /// Records a timer sample, lazily creating the histogram on first use.
    ///
    /// # Errors
    ///
    /// Returns an error if the histogram cannot be created or the sample
    /// cannot be recorded.
    pub fn timer_add(
        &self,
        name: &str,
        duration: crate::duration::CdTime,
    ) -> Result<(), MetricsError> {
        let key = composite_key(MetricType::Timer, name);
        let mut entries = self.entries.lock();
        let entry = entries.entry(key).or_insert_with(|| MetricEntry {
            metric_type: MetricType::Timer,
            value: MetricValue::Timer(None),
            updates_num: 0,
        });
        if let MetricValue::Timer(hist) = &mut entry.value {
            let histogram = match hist {
                Some(h) => h,
                None => {
                    *hist = Some(LatencyHistogram::new()?);
                    hist.as_mut().expect("just inserted")
                }
            };
            histogram.add(duration)?;
        }
        entry.updates_num += 1;
        Ok(())
    }

    /// Inserts a member into a set metric. Re-inserting an existing member
    /// is a no-op on membership but still counts as an update.
    pub fn set_add(&self, name: &str, member: &str) {
        let key = composite_key(MetricType::Set, name);
        let mut entries = self.entries.lock();
        let entry = entries.entry(key).or_insert_with(|| MetricEntry {
            metric_type: MetricType::Set,
            value: MetricValue::Set(HashSet::new()),
            updates_num: 0,
        });
        if let MetricValue::Set(members) = &mut entry.value {
            members.insert(member.to_string());
        }
        entry.updates_num += 1;
    }

    /// Runs `f` once per registry entry under the single registry mutex,
    /// passing the bare metric name (type tag stripped) alongside its
    /// state. Returning `true` marks the entry for removal once iteration
    /// completes; removal is deferred so `f` never observes a map mutated
    /// mid-walk.
    pub fn flush_each<F>(&self, mut f: F)
    where
        F: FnMut(&str, &mut MetricEntry) -> bool,
    {
        let mut entries = self.entries.lock();
        let mut to_remove = Vec::new();
        for (key, entry) in entries.iter_mut() {
            let name = &key[2..];
            if f(name, entry) {
                to_remove.push(key.clone());
            }
        }
        for key in to_remove {
            entries.remove(&key);
        }
    }

    /// Number of entries currently held, for diagnostics and tests.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Whether the registry currently holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}
