//! Measurement wrapper: one timer sample and one success/failure count per call.
//!
//! ```ignore
//! let helper = MetricsHelper::new(sink, Arc::new(MeasureConfig::default()));
//! let fetch = helper.metric("fetch_sed").ignore_http_codes([404]).build();
//! let sed = fetch.measure(|| client.fetch(id))?;
//! ```
//!
//! Building a `Metric` registers every counter it may later increment with
//! value zero, so alerts see a defined series before the first call.

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use calltally_core::config::{MeasureConfig, Toggle};
use calltally_core::failure::Failure;
use calltally_core::meter::{MeterSink, MetricId};

use crate::best_effort::BestEffort;

/// Result classification of a measured call or event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Failure,
}

/// Builds measurement handles sharing one sink and configuration.
#[derive(Clone)]
pub struct MetricsHelper {
    sink: Arc<dyn MeterSink>,
    config: Arc<MeasureConfig>,
}

impl MetricsHelper {
    pub fn new(sink: Arc<dyn MeterSink>, config: Arc<MeasureConfig>) -> Self {
        Self { sink, config }
    }

    pub fn with_defaults(sink: Arc<dyn MeterSink>) -> Self {
        Self::new(sink, Arc::new(MeasureConfig::default()))
    }

    pub fn config(&self) -> &MeasureConfig {
        &self.config
    }

    /// Handle for `method` with every value taken from the configuration.
    pub fn init(&self, method: impl Into<String>) -> Metric {
        self.metric(method).build()
    }

    /// Handle builder for per-call overrides.
    pub fn metric(&self, method: impl Into<String>) -> MetricBuilder<'_> {
        let cfg = &self.config;
        MetricBuilder {
            helper: self,
            method: method.into(),
            meter_name: cfg.measure_meter_name.clone(),
            success: cfg.success_type_tag_value.clone(),
            failure: cfg.failure_type_tag_value.clone(),
            toggle_on: cfg.toggle_on_tag_value.clone(),
            toggle_off: cfg.toggle_off_tag_value.clone(),
            ignore_http_codes: Vec::new(),
            alert: Toggle::On,
        }
    }

    /// Count a one-off event: `<increment_meter_name>{event, type}`.
    pub fn increment(&self, event: &str, outcome: Outcome) {
        let cfg = &self.config;
        let type_value = match outcome {
            Outcome::Success => &cfg.success_type_tag_value,
            Outcome::Failure => &cfg.failure_type_tag_value,
        };
        let id = MetricId::new(cfg.increment_meter_name.as_str())
            .tag(cfg.event_tag.as_str(), event)
            .tag(cfg.type_tag.as_str(), type_value.as_str());
        self.sink.increment_counter(&id, 1).best_effort("event counter increment");
    }
}

pub struct MetricBuilder<'a> {
    helper: &'a MetricsHelper,
    method: String,
    meter_name: String,
    success: String,
    failure: String,
    toggle_on: String,
    toggle_off: String,
    ignore_http_codes: Vec<u16>,
    alert: Toggle,
}

impl MetricBuilder<'_> {
    pub fn meter_name(mut self, name: impl Into<String>) -> Self {
        self.meter_name = name.into();
        self
    }

    pub fn success(mut self, value: impl Into<String>) -> Self {
        self.success = value.into();
        self
    }

    pub fn failure(mut self, value: impl Into<String>) -> Self {
        self.failure = value.into();
        self
    }

    pub fn toggle_on(mut self, value: impl Into<String>) -> Self {
        self.toggle_on = value.into();
        self
    }

    pub fn toggle_off(mut self, value: impl Into<String>) -> Self {
        self.toggle_off = value.into();
        self
    }

    /// Failures carrying one of these HTTP statuses are tagged alert-off.
    pub fn ignore_http_codes(mut self, codes: impl IntoIterator<Item = u16>) -> Self {
        self.ignore_http_codes = codes.into_iter().collect();
        self
    }

    pub fn alert(mut self, alert: Toggle) -> Self {
        self.alert = alert;
        self
    }

    /// Build the handle and pre-register its counters with value zero.
    pub fn build(self) -> Metric {
        let helper = self.helper;
        let cfg = Arc::clone(&helper.config);
        let timer_id = MetricId::new(cfg.timer_name(&self.meter_name))
            .tag(cfg.method_tag.as_str(), self.method.as_str());
        let metric = Metric {
            sink: Arc::clone(&helper.sink),
            config: cfg,
            method: self.method,
            meter_name: self.meter_name,
            success: self.success,
            failure: self.failure,
            toggle_on: self.toggle_on,
            toggle_off: self.toggle_off,
            ignore_http_codes: self.ignore_http_codes,
            alert: self.alert,
            timer_id,
        };
        metric.preregister();
        metric
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Settled {
    Success,
    Failure,
    /// Failure whose HTTP status is on the ignore list.
    IgnoredFailure,
}

/// Bound measurement handle for one method.
pub struct Metric {
    sink: Arc<dyn MeterSink>,
    config: Arc<MeasureConfig>,
    method: String,
    meter_name: String,
    success: String,
    failure: String,
    toggle_on: String,
    toggle_off: String,
    ignore_http_codes: Vec<u16>,
    alert: Toggle,
    timer_id: MetricId,
}

impl Metric {
    pub fn method(&self) -> &str {
        &self.method
    }

    /// Identity of the counter incremented for a type/alert combination.
    /// `alert` is ignored when alert tagging is disabled.
    pub fn counter_id(&self, type_value: &str, alert: &str) -> MetricId {
        let cfg = &self.config;
        let id = MetricId::new(self.meter_name.as_str())
            .tag(cfg.method_tag.as_str(), self.method.as_str())
            .tag(cfg.type_tag.as_str(), type_value);
        if cfg.alert_tagging {
            id.tag(cfg.alert_tag.as_str(), alert)
        } else {
            id
        }
    }

    pub fn timer_id(&self) -> &MetricId {
        &self.timer_id
    }

    fn preregister(&self) {
        let alerts = if self.config.alert_tagging {
            vec![self.toggle_on.as_str(), self.toggle_off.as_str()]
        } else {
            vec![""]
        };
        for type_value in [self.success.as_str(), self.failure.as_str()] {
            for alert in &alerts {
                let id = self.counter_id(type_value, alert);
                self.sink.register_counter(&id).best_effort("counter pre-registration");
            }
        }
    }

    /// Run `work` once, time it, and count the outcome.
    ///
    /// The result is returned untouched. A panic is counted as a failure and
    /// keeps unwinding.
    pub fn measure<T, E, F>(&self, work: F) -> Result<T, E>
    where
        E: Failure,
        F: FnOnce() -> Result<T, E>,
    {
        let mut pending = Pending::start(self);
        let result = work();
        pending.settled = self.settle(&result);
        drop(pending);
        result
    }

    /// Async variant of [`Metric::measure`]. A future dropped before it
    /// completes is counted as a failure.
    pub async fn measure_async<T, E, F>(&self, work: F) -> Result<T, E>
    where
        E: Failure,
        F: Future<Output = Result<T, E>>,
    {
        let mut pending = Pending::start(self);
        let result = work.await;
        pending.settled = self.settle(&result);
        drop(pending);
        result
    }

    fn settle<T, E: Failure>(&self, result: &Result<T, E>) -> Settled {
        match result {
            Ok(_) => Settled::Success,
            Err(e) => match e.http_status() {
                Some(status) if self.ignore_http_codes.contains(&status) => Settled::IgnoredFailure,
                _ => Settled::Failure,
            },
        }
    }

    fn alert_text(&self, settled: Settled) -> &str {
        match settled {
            Settled::IgnoredFailure => &self.toggle_off,
            Settled::Success | Settled::Failure => self.alert.text(&self.toggle_on, &self.toggle_off),
        }
    }

    fn count(&self, settled: Settled) {
        let type_value = match settled {
            Settled::Success => &self.success,
            Settled::Failure | Settled::IgnoredFailure => &self.failure,
        };
        let id = self.counter_id(type_value, self.alert_text(settled));
        self.sink.increment_counter(&id, 1).best_effort("counter increment");
    }
}

/// Bookkeeping for one call in flight. Dropping it records the timer sample
/// and the counter, so the count happens on every exit path.
struct Pending<'m> {
    metric: &'m Metric,
    started: Instant,
    settled: Settled,
}

impl<'m> Pending<'m> {
    fn start(metric: &'m Metric) -> Self {
        Self { metric, started: Instant::now(), settled: Settled::Failure }
    }
}

impl Drop for Pending<'_> {
    fn drop(&mut self) {
        let elapsed = self.started.elapsed();
        let metric = self.metric;
        metric.sink.record_timer(&metric.timer_id, elapsed).best_effort("timer record");
        metric.count(self.settled);
    }
}
