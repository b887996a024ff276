//! Measurement wrapper behaviour against the in-process registry.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use calltally_core::config::{MeasureConfig, Toggle};
use calltally_core::error::{CallTallyError, Result};
use calltally_core::failure::HttpStatusError;
use calltally_core::meter::{MeterSink, MetricId};
use calltally_instrument::{MetricsHelper, Outcome, Registry};

fn counter(method: &str, type_value: &str, alert: &str) -> MetricId {
    MetricId::with_tags("method", &[("method", method), ("type", type_value), ("alert", alert)])
}

fn setup() -> (Arc<Registry>, MetricsHelper) {
    let registry = Arc::new(Registry::new());
    let helper = MetricsHelper::with_defaults(registry.clone());
    (registry, helper)
}

#[test]
fn init_preregisters_all_counters_at_zero() {
    let (registry, helper) = setup();
    helper.init("dummy");

    for type_value in ["successful", "failed"] {
        for alert in ["on", "off"] {
            assert_eq!(registry.counter(&counter("dummy", type_value, alert)), Some(0));
        }
    }
    assert_eq!(registry.counters_named("method").len(), 4);
}

#[test]
fn success_increments_success_counter_only() {
    let (registry, helper) = setup();
    let m = helper.init("dummy");

    let out = m.measure(|| Ok::<_, HttpStatusError>(42));
    assert_eq!(out.unwrap(), 42);

    assert_eq!(registry.counter(&counter("dummy", "successful", "on")), Some(1));
    assert_eq!(registry.counter(&counter("dummy", "failed", "on")), Some(0));
}

#[test]
fn failure_is_counted_and_returned_unchanged() {
    let (registry, helper) = setup();
    let m = helper.init("dummy");

    let err = m.measure(|| Err::<(), _>(HttpStatusError::new(500, "boom"))).unwrap_err();
    assert_eq!(err, HttpStatusError::new(500, "boom"));

    assert_eq!(registry.counter(&counter("dummy", "failed", "on")), Some(1));
    assert_eq!(registry.counter(&counter("dummy", "successful", "on")), Some(0));
}

#[test]
fn alert_off_tags_failure_off() {
    let (registry, helper) = setup();
    let m = helper.metric("dummy").alert(Toggle::Off).build();

    let _ = m.measure(|| Err::<(), _>(std::io::Error::other("down")));

    assert_eq!(registry.counter(&counter("dummy", "failed", "off")), Some(1));
    assert_eq!(registry.counter(&counter("dummy", "failed", "on")), Some(0));
}

#[test]
fn ignored_status_forces_alert_off() {
    let (registry, helper) = setup();
    let m = helper.metric("dummy").ignore_http_codes([404]).build();

    let _ = m.measure(|| Err::<(), _>(HttpStatusError::new(404, "missing")));
    assert_eq!(registry.counter(&counter("dummy", "failed", "off")), Some(1));

    let _ = m.measure(|| Err::<(), _>(HttpStatusError::new(500, "boom")));
    assert_eq!(registry.counter(&counter("dummy", "failed", "on")), Some(1));
}

#[test]
fn timer_records_each_call() {
    let (registry, helper) = setup();
    let m = helper.init("dummy");

    let _ = m.measure(|| {
        thread::sleep(Duration::from_millis(5));
        Ok::<_, HttpStatusError>(())
    });
    let _ = m.measure(|| Err::<(), _>(HttpStatusError::new(500, "boom")));

    let snap = registry.timer(&MetricId::with_tags("method.timer", &[("method", "dummy")])).unwrap();
    assert_eq!(snap.count, 2);
    assert!(snap.max >= Duration::from_millis(5));
}

#[test]
fn panic_is_counted_as_failure() {
    let (registry, helper) = setup();
    let m = helper.init("dummy");

    let caught = catch_unwind(AssertUnwindSafe(|| {
        let _ = m.measure(|| -> std::result::Result<(), HttpStatusError> { panic!("work blew up") });
    }));
    assert!(caught.is_err());

    assert_eq!(registry.counter(&counter("dummy", "failed", "on")), Some(1));
    assert_eq!(registry.counter(&counter("dummy", "successful", "on")), Some(0));
}

#[test]
fn concurrent_measurements_are_all_counted() {
    let (registry, helper) = setup();
    let m = Arc::new(helper.init("dummy"));

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let m = Arc::clone(&m);
            thread::spawn(move || {
                for _ in 0..100 {
                    let _ = m.measure(|| {
                        if i % 2 == 0 {
                            Ok(())
                        } else {
                            Err(HttpStatusError::new(502, "bad gateway"))
                        }
                    });
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    assert_eq!(registry.counter(&counter("dummy", "successful", "on")), Some(400));
    assert_eq!(registry.counter(&counter("dummy", "failed", "on")), Some(400));
}

#[test]
fn increment_counts_events() {
    let (registry, helper) = setup();
    helper.increment("sed_received", Outcome::Success);
    helper.increment("sed_received", Outcome::Failure);
    helper.increment("sed_received", Outcome::Success);

    let ok = MetricId::with_tags("event", &[("event", "sed_received"), ("type", "successful")]);
    let ko = MetricId::with_tags("event", &[("event", "sed_received"), ("type", "failed")]);
    assert_eq!(registry.counter(&ok), Some(2));
    assert_eq!(registry.counter(&ko), Some(1));
}

struct RejectingSink;

impl MeterSink for RejectingSink {
    fn register_counter(&self, id: &MetricId) -> Result<()> {
        Err(CallTallyError::SinkRejected { metric: id.to_string(), reason: "closed".into() })
    }

    fn increment_counter(&self, id: &MetricId, _by: u64) -> Result<()> {
        Err(CallTallyError::SinkRejected { metric: id.to_string(), reason: "closed".into() })
    }

    fn record_timer(&self, id: &MetricId, _elapsed: Duration) -> Result<()> {
        Err(CallTallyError::SinkRejected { metric: id.to_string(), reason: "closed".into() })
    }
}

#[test]
fn sink_errors_never_reach_the_caller() {
    let helper = MetricsHelper::with_defaults(Arc::new(RejectingSink));
    let m = helper.init("dummy");

    assert_eq!(m.measure(|| Ok::<_, HttpStatusError>("payload")).unwrap(), "payload");
    let err = m.measure(|| Err::<(), _>(HttpStatusError::new(503, "down"))).unwrap_err();
    assert_eq!(err.status, 503);
}

#[test]
fn custom_config_names_are_used() {
    let registry = Arc::new(Registry::new());
    let cfg = MeasureConfig {
        measure_meter_name: "operation".into(),
        method_tag: "op".into(),
        ..MeasureConfig::default()
    };
    let helper = MetricsHelper::new(registry.clone(), Arc::new(cfg));
    let m = helper.init("lookup");
    let _ = m.measure(|| Ok::<_, HttpStatusError>(()));

    let id = MetricId::with_tags("operation", &[("op", "lookup"), ("type", "successful"), ("alert", "on")]);
    assert_eq!(registry.counter(&id), Some(1));
    assert!(registry.timer(&MetricId::with_tags("operation.timer", &[("op", "lookup")])).is_some());
}

#[tokio::test]
async fn measure_async_counts_like_measure() {
    let (registry, helper) = setup();
    let m = helper.init("dummy");

    let out = m
        .measure_async(async {
            tokio::task::yield_now().await;
            Ok::<_, HttpStatusError>(7)
        })
        .await;
    assert_eq!(out.unwrap(), 7);

    let dropped = m.measure_async(async { std::future::pending::<std::result::Result<(), HttpStatusError>>().await });
    let timed_out = tokio::time::timeout(Duration::from_millis(10), dropped).await;
    assert!(timed_out.is_err());

    assert_eq!(registry.counter(&counter("dummy", "successful", "on")), Some(1));
    assert_eq!(registry.counter(&counter("dummy", "failed", "on")), Some(1));
}
