//! calltally core: transport-agnostic instrumentation primitives.
//!
//! This crate defines the metric identity and sink contract, the failure
//! classification used for tagging, the measurement configuration, and the
//! URI templater that turns dynamic URIs into low-cardinality labels. It
//! carries no runtime or HTTP dependencies so it can back any sink or framework.
//!
//! # Defensive guarantees
//! Panics, `unwrap`, and `expect` are compile-denied here. Every fallible path
//! surfaces as `CallTallyError`/`Result` or degrades to a valid fallback.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod config;
pub mod error;
pub mod failure;
pub mod meter;
pub mod uri;

pub use config::{MeasureConfig, Toggle};
pub use error::{CallTallyError, Result};
pub use failure::{Failure, HttpStatusError};
pub use meter::{MeterSink, MetricId};
pub use uri::{template_uri, UriTemplater};
