//! In-process metrics registry.
//!
//! Counters and timers are keyed by `MetricId` in `DashMap` shards and updated
//! with atomics, so concurrent registration and increments need no extra
//! locking. An optional series cap rejects new identities once reached; the
//! slot is reserved while the shard entry is held, so the cap is exact under
//! concurrent first use.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use dashmap::mapref::entry::Entry;
use dashmap::mapref::one::RefMut;
use dashmap::DashMap;

use calltally_core::error::{CallTallyError, Result};
use calltally_core::meter::{MeterSink, MetricId};

#[derive(Default)]
struct AtomicTimer {
    count: AtomicU64,
    sum_micros: AtomicU64,
    max_micros: AtomicU64,
}

impl AtomicTimer {
    fn observe(&self, elapsed: Duration) {
        let micros = u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX);
        self.count.fetch_add(1, Ordering::Relaxed);
        self.sum_micros.fetch_add(micros, Ordering::Relaxed);
        self.max_micros.fetch_max(micros, Ordering::Relaxed);
    }

    fn snapshot(&self) -> TimerSnapshot {
        TimerSnapshot {
            count: self.count.load(Ordering::Relaxed),
            total: Duration::from_micros(self.sum_micros.load(Ordering::Relaxed)),
            max: Duration::from_micros(self.max_micros.load(Ordering::Relaxed)),
        }
    }
}

/// Point-in-time view of one timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerSnapshot {
    pub count: u64,
    pub total: Duration,
    pub max: Duration,
}

#[derive(Default)]
pub struct Registry {
    counters: DashMap<MetricId, AtomicU64>,
    timers: DashMap<MetricId, AtomicTimer>,
    held: AtomicUsize,
    max_series: Option<usize>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry refusing new identities once `max_series` are held.
    pub fn with_max_series(max_series: usize) -> Self {
        Self { max_series: Some(max_series), ..Self::default() }
    }

    /// Current counter value, `None` if never registered.
    pub fn counter(&self, id: &MetricId) -> Option<u64> {
        self.counters.get(id).map(|c| c.load(Ordering::Relaxed))
    }

    pub fn timer(&self, id: &MetricId) -> Option<TimerSnapshot> {
        self.timers.get(id).map(|t| t.snapshot())
    }

    /// All counters whose name matches, for diagnostics and tests.
    pub fn counters_named(&self, name: &str) -> Vec<(MetricId, u64)> {
        let mut out: Vec<_> = self
            .counters
            .iter()
            .filter(|e| e.key().name() == name)
            .map(|e| (e.key().clone(), e.value().load(Ordering::Relaxed)))
            .collect();
        out.sort();
        out
    }

    /// Number of distinct counter and timer identities.
    pub fn series(&self) -> usize {
        self.held.load(Ordering::Acquire)
    }

    fn reject(id: &MetricId, reason: String) -> CallTallyError {
        CallTallyError::SinkRejected { metric: id.to_string(), reason }
    }

    /// Take one series slot. Called with the vacant shard entry held.
    fn reserve(&self, id: &MetricId) -> Result<()> {
        if id.name().is_empty() {
            return Err(Self::reject(id, "empty metric name".into()));
        }
        match self.max_series {
            None => {
                self.held.fetch_add(1, Ordering::AcqRel);
                Ok(())
            }
            Some(max) => self
                .held
                .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| (n < max).then_some(n + 1))
                .map(|_| ())
                .map_err(|_| Self::reject(id, format!("series limit {max} reached"))),
        }
    }

    fn counter_entry(&self, id: &MetricId) -> Result<RefMut<'_, MetricId, AtomicU64>> {
        match self.counters.entry(id.clone()) {
            Entry::Occupied(e) => Ok(e.into_ref()),
            Entry::Vacant(e) => {
                self.reserve(id)?;
                Ok(e.insert(AtomicU64::new(0)))
            }
        }
    }
}

impl MeterSink for Registry {
    fn register_counter(&self, id: &MetricId) -> Result<()> {
        self.counter_entry(id).map(|_| ())
    }

    fn increment_counter(&self, id: &MetricId, by: u64) -> Result<()> {
        if let Some(c) = self.counters.get(id) {
            c.fetch_add(by, Ordering::Relaxed);
            return Ok(());
        }
        self.counter_entry(id)?.fetch_add(by, Ordering::Relaxed);
        Ok(())
    }

    fn record_timer(&self, id: &MetricId, elapsed: Duration) -> Result<()> {
        if let Some(t) = self.timers.get(id) {
            t.observe(elapsed);
            return Ok(());
        }
        match self.timers.entry(id.clone()) {
            Entry::Occupied(e) => e.get().observe(elapsed),
            Entry::Vacant(e) => {
                self.reserve(id)?;
                e.insert(AtomicTimer::default()).observe(elapsed);
            }
        }
        Ok(())
    }
}
