//! Sinks shipped with calltally.
//!
//! - `Registry`: in-process store backed by `DashMap`, queried directly.
//! - `MetricsFacadeSink`: forwards to whatever `metrics` recorder is installed.

pub mod facade;
pub mod registry;

pub use facade::MetricsFacadeSink;
pub use registry::{Registry, TimerSnapshot};
