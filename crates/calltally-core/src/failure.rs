//! Failure classification for metric tags.
//!
//! Each error type names itself through [`Failure::kind`]; that name becomes
//! the `exception` tag of request counters. Errors that stem from an HTTP
//! status report it through [`Failure::http_status`], which the measurement
//! wrapper checks against a handle's ignore list.

use std::borrow::Cow;
use std::convert::Infallible;
use std::error::Error as StdError;
use std::io;

use thiserror::Error;

use crate::error::CallTallyError;

/// Kind name used when a call panicked instead of returning.
pub const PANIC_KIND: &str = "panic";
/// Kind name used when an in-flight call was dropped before it completed.
pub const CANCELLED_KIND: &str = "cancelled";

/// A failure that can be turned into metric tags.
pub trait Failure {
    /// Stable, low-cardinality name of the failure kind.
    fn kind(&self) -> Cow<'_, str>;

    /// HTTP status carried by the failure, if any.
    fn http_status(&self) -> Option<u16> {
        None
    }
}

/// Error raised for a non-success HTTP status.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("http status {status}: {message}")]
pub struct HttpStatusError {
    pub status: u16,
    pub message: String,
}

impl HttpStatusError {
    pub fn new(status: u16, message: impl Into<String>) -> Self {
        Self { status, message: message.into() }
    }

    /// True for 4xx statuses.
    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status)
    }

    /// True for 5xx statuses.
    pub fn is_server_error(&self) -> bool {
        (500..600).contains(&self.status)
    }
}

impl Failure for HttpStatusError {
    fn kind(&self) -> Cow<'_, str> {
        if self.is_client_error() {
            Cow::Borrowed("HttpClientError")
        } else if self.is_server_error() {
            Cow::Borrowed("HttpServerError")
        } else {
            Cow::Borrowed("HttpStatusError")
        }
    }

    fn http_status(&self) -> Option<u16> {
        Some(self.status)
    }
}

impl Failure for CallTallyError {
    fn kind(&self) -> Cow<'_, str> {
        Cow::Borrowed(self.code().as_str())
    }
}

impl Failure for io::Error {
    fn kind(&self) -> Cow<'_, str> {
        Cow::Borrowed("IoError")
    }
}

impl Failure for Infallible {
    fn kind(&self) -> Cow<'_, str> {
        match *self {}
    }
}

/// Boxed errors (e.g. `tower::BoxError`) are classified by downcasting to the
/// known failure types; anything else is reported as `BoxError`.
impl Failure for Box<dyn StdError + Send + Sync> {
    fn kind(&self) -> Cow<'_, str> {
        if let Some(e) = self.downcast_ref::<HttpStatusError>() {
            return e.kind();
        }
        // io::Error has an inherent `kind()`.
        if let Some(e) = self.downcast_ref::<io::Error>() {
            return Failure::kind(e);
        }
        if let Some(e) = self.downcast_ref::<CallTallyError>() {
            return e.kind();
        }
        Cow::Borrowed("BoxError")
    }

    fn http_status(&self) -> Option<u16> {
        self.downcast_ref::<HttpStatusError>().map(|e| e.status)
    }
}
