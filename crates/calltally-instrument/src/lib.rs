//! calltally instrument: measurement wrapper, HTTP request counting and sinks.
//!
//! This crate wires the core primitives into runnable pieces: the in-process
//! registry and `metrics` facade sinks, the measurement wrapper, the inbound
//! request filter (axum middleware) and the outbound request interceptor
//! (tower layer), plus the YAML config loader that builds them.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod best_effort;
pub mod config;
pub mod exchange;
pub mod filter;
pub mod interceptor;
pub mod measure;
pub mod sink;

pub use filter::RequestCountFilter;
pub use interceptor::{RequestCountInterceptor, RequestCountLayer};
pub use measure::{Metric, MetricsHelper, Outcome};
pub use sink::{MetricsFacadeSink, Registry};
