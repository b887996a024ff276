//! Metric identity and the sink contract.
//!
//! A sink is the external metrics backend. It must be safe for concurrent
//! registration and updates, and registering the same identity twice must
//! resolve to the same instrument.

use std::fmt;
use std::time::Duration;

use crate::error::Result;

/// Name plus an unordered tag set.
///
/// Tags are kept sorted by key so that identities built from the same pairs
/// in any order compare and hash equal. A repeated key keeps its last value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MetricId {
    name: String,
    tags: Vec<(String, String)>,
}

impl MetricId {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), tags: Vec::new() }
    }

    /// Build from a name and borrowed pairs.
    pub fn with_tags(name: impl Into<String>, tags: &[(&str, &str)]) -> Self {
        tags.iter().fold(Self::new(name), |id, (k, v)| id.tag(*k, *v))
    }

    /// Add (or replace) one tag.
    pub fn tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let key = key.into();
        let value = value.into();
        match self.tags.binary_search_by(|(k, _)| k.as_str().cmp(&key)) {
            Ok(i) => self.tags[i].1 = value,
            Err(i) => self.tags.insert(i, (key, value)),
        }
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Tags sorted by key.
    pub fn tags(&self) -> &[(String, String)] {
        &self.tags
    }

    pub fn tag_value(&self, key: &str) -> Option<&str> {
        self.tags
            .binary_search_by(|(k, _)| k.as_str().cmp(key))
            .ok()
            .map(|i| self.tags[i].1.as_str())
    }
}

impl fmt::Display for MetricId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)?;
        if self.tags.is_empty() {
            return Ok(());
        }
        f.write_str("{")?;
        for (i, (k, v)) in self.tags.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{k}={v}")?;
        }
        f.write_str("}")
    }
}

/// Metrics backend accepting named counters and timers.
pub trait MeterSink: Send + Sync {
    /// Make the counter exist (value 0 when new). Idempotent.
    fn register_counter(&self, id: &MetricId) -> Result<()>;

    /// Add `by` to the counter, registering it first if needed.
    fn increment_counter(&self, id: &MetricId, by: u64) -> Result<()>;

    /// Record one timer sample, registering the timer first if needed.
    fn record_timer(&self, id: &MetricId, elapsed: Duration) -> Result<()>;
}

impl<S: MeterSink + ?Sized> MeterSink for std::sync::Arc<S> {
    fn register_counter(&self, id: &MetricId) -> Result<()> {
        (**self).register_counter(id)
    }

    fn increment_counter(&self, id: &MetricId, by: u64) -> Result<()> {
        (**self).increment_counter(id, by)
    }

    fn record_timer(&self, id: &MetricId, elapsed: Duration) -> Result<()> {
        (**self).record_timer(id, elapsed)
    }
}
