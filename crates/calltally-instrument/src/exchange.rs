//! Tagging policy shared by the inbound filter and the outbound interceptor.
//!
//! One exchange produces exactly one increment of
//! `call{method, uri, type, status, exception}`.

use std::borrow::Cow;
use std::sync::Arc;

use axum::http::{Request, Response, StatusCode};

use calltally_core::failure::{Failure, CANCELLED_KIND, PANIC_KIND};
use calltally_core::meter::{MeterSink, MetricId};
use calltally_core::uri::UriTemplater;

use crate::best_effort::BestEffort;

pub const COUNTER_METER_NAME: &str = "call";

pub const HTTP_METHOD_TAG: &str = "method";
pub const URI_TAG: &str = "uri";
pub const TYPE_TAG: &str = "type";
pub const STATUS_TAG: &str = "status";
pub const EXCEPTION_TAG: &str = "exception";

pub const SUCCESS_VALUE: &str = "successful";
pub const FAILURE_VALUE: &str = "failed";
pub const NO_EXCEPTION_TAG_VALUE: &str = "none";
pub const UNKNOWN_EXCEPTION_TAG_VALUE: &str = "unknown";
/// Status tag used when no response was obtained.
pub const UNKNOWN_STATUS_TAG_VALUE: &str = "-1";

/// Request side of an exchange.
pub trait ExchangeRequest {
    fn method(&self) -> &str;
    fn uri(&self) -> Cow<'_, str>;
}

impl<B> ExchangeRequest for Request<B> {
    fn method(&self) -> &str {
        Request::method(self).as_str()
    }

    fn uri(&self) -> Cow<'_, str> {
        Cow::Owned(Request::uri(self).to_string())
    }
}

/// Method and URI of a request, for callers without an `http::Request`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestHead {
    pub method: String,
    pub uri: String,
}

impl RequestHead {
    pub fn new(method: impl Into<String>, uri: impl Into<String>) -> Self {
        Self { method: method.into(), uri: uri.into() }
    }
}

impl ExchangeRequest for RequestHead {
    fn method(&self) -> &str {
        &self.method
    }

    fn uri(&self) -> Cow<'_, str> {
        Cow::Borrowed(&self.uri)
    }
}

/// Response side of an exchange.
pub trait ExchangeResponse {
    fn status(&self) -> u16;
}

impl<B> ExchangeResponse for Response<B> {
    fn status(&self) -> u16 {
        Response::status(self).as_u16()
    }
}

impl ExchangeResponse for StatusCode {
    fn status(&self) -> u16 {
        self.as_u16()
    }
}

impl ExchangeResponse for u16 {
    fn status(&self) -> u16 {
        *self
    }
}

/// What happened to one exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExchangeOutcome {
    status: Option<u16>,
    failure: Option<String>,
}

impl ExchangeOutcome {
    /// A response was obtained.
    pub fn response(status: u16) -> Self {
        Self { status: Some(status), failure: None }
    }

    /// The call failed; the status is taken from the failure when it has one.
    pub fn failed<E: Failure + ?Sized>(failure: &E) -> Self {
        Self { status: failure.http_status(), failure: Some(failure.kind().into_owned()) }
    }

    /// The call panicked before producing anything.
    pub fn panicked() -> Self {
        Self { status: None, failure: Some(PANIC_KIND.to_owned()) }
    }

    /// The call was dropped before it completed (timeout, disconnect).
    pub fn cancelled() -> Self {
        Self { status: None, failure: Some(CANCELLED_KIND.to_owned()) }
    }

    pub fn of<R: ExchangeResponse, E: Failure>(result: &Result<R, E>) -> Self {
        match result {
            Ok(response) => Self::response(response.status()),
            Err(e) => Self::failed(e),
        }
    }

    pub fn is_success(&self) -> bool {
        self.failure.is_none() && self.status.is_some_and(|s| s < 400)
    }

    pub fn type_tag(&self) -> &str {
        if self.is_success() {
            SUCCESS_VALUE
        } else {
            FAILURE_VALUE
        }
    }

    pub fn status_tag(&self) -> Cow<'static, str> {
        match self.status {
            Some(s) => Cow::Owned(s.to_string()),
            None => Cow::Borrowed(UNKNOWN_STATUS_TAG_VALUE),
        }
    }

    pub fn exception_tag(&self) -> &str {
        match (&self.failure, self.status) {
            (Some(kind), _) => kind.as_str(),
            (None, Some(s)) if s >= 400 => UNKNOWN_EXCEPTION_TAG_VALUE,
            (None, _) => NO_EXCEPTION_TAG_VALUE,
        }
    }

    /// Counter identity for this outcome.
    pub fn metric_id(&self, method: &str, uri_template: &str) -> MetricId {
        MetricId::new(COUNTER_METER_NAME)
            .tag(HTTP_METHOD_TAG, method)
            .tag(URI_TAG, uri_template)
            .tag(TYPE_TAG, self.type_tag())
            .tag(STATUS_TAG, self.status_tag())
            .tag(EXCEPTION_TAG, self.exception_tag())
    }
}

/// Counts exchanges into a sink.
#[derive(Clone)]
pub struct ExchangeRecorder {
    sink: Arc<dyn MeterSink>,
    templater: UriTemplater,
}

impl ExchangeRecorder {
    pub fn new(sink: Arc<dyn MeterSink>, templater: UriTemplater) -> Self {
        Self { sink, templater }
    }

    pub fn templater(&self) -> &UriTemplater {
        &self.templater
    }

    pub fn record(&self, method: &str, uri: &str, outcome: &ExchangeOutcome) {
        let id = outcome.metric_id(method, &self.templater.template(uri));
        tracing::trace!(metric = %id, "exchange counted");
        self.sink.increment_counter(&id, 1).best_effort("request counter increment");
    }

    /// Guard counting the exchange when dropped; unsettled means panicked.
    pub(crate) fn guard<'a, Q: ExchangeRequest>(&'a self, request: &'a Q) -> ExchangeGuard<'a, Q> {
        ExchangeGuard { recorder: self, request, outcome: ExchangeOutcome::panicked() }
    }
}

pub(crate) struct ExchangeGuard<'a, Q: ExchangeRequest> {
    recorder: &'a ExchangeRecorder,
    request: &'a Q,
    outcome: ExchangeOutcome,
}

impl<Q: ExchangeRequest> ExchangeGuard<'_, Q> {
    pub(crate) fn settle(&mut self, outcome: ExchangeOutcome) {
        self.outcome = outcome;
    }
}

impl<Q: ExchangeRequest> Drop for ExchangeGuard<'_, Q> {
    fn drop(&mut self) {
        let uri = self.request.uri();
        self.recorder.record(self.request.method(), &uri, &self.outcome);
    }
}

/// Guard owning everything it records, for use inside request futures.
///
/// Dropped unsettled it counts the exchange as panicked when unwinding and as
/// cancelled otherwise.
pub(crate) struct InFlight {
    recorder: ExchangeRecorder,
    method: String,
    uri: String,
    outcome: Option<ExchangeOutcome>,
}

impl InFlight {
    pub(crate) fn new(recorder: ExchangeRecorder, method: String, uri: String) -> Self {
        Self { recorder, method, uri, outcome: None }
    }

    pub(crate) fn settle(&mut self, outcome: ExchangeOutcome) {
        self.outcome = Some(outcome);
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        let outcome = match self.outcome.take() {
            Some(outcome) => outcome,
            None if std::thread::panicking() => ExchangeOutcome::panicked(),
            None => ExchangeOutcome::cancelled(),
        };
        self.recorder.record(&self.method, &self.uri, &outcome);
    }
}
