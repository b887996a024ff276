//! Sink forwarding to the `metrics` facade.
//!
//! Consumers install their own `metrics` recorder (prometheus, statsd, ...);
//! without a recorder installed every call is a no-op. Timers are emitted as
//! histograms in seconds.

use std::time::Duration;

use metrics::Label;

use calltally_core::error::Result;
use calltally_core::meter::{MeterSink, MetricId};

#[derive(Debug, Clone, Copy, Default)]
pub struct MetricsFacadeSink;

impl MetricsFacadeSink {
    pub fn new() -> Self {
        Self
    }
}

fn labels(id: &MetricId) -> Vec<Label> {
    id.tags().iter().map(|(k, v)| Label::new(k.clone(), v.clone())).collect()
}

impl MeterSink for MetricsFacadeSink {
    fn register_counter(&self, id: &MetricId) -> Result<()> {
        metrics::counter!(id.name().to_owned(), labels(id)).increment(0);
        Ok(())
    }

    fn increment_counter(&self, id: &MetricId, by: u64) -> Result<()> {
        metrics::counter!(id.name().to_owned(), labels(id)).increment(by);
        Ok(())
    }

    fn record_timer(&self, id: &MetricId, elapsed: Duration) -> Result<()> {
        metrics::histogram!(id.name().to_owned(), labels(id)).record(elapsed.as_secs_f64());
        Ok(())
    }
}
