//! Inbound request filter: counts every server-side exchange.
//!
//! Disabled by default; enable it through config or the
//! `METRICS_REQUESTFILTER_ENABLE` environment variable. When disabled the
//! downstream call still runs, it just is not counted.
//!
//! Use the sync [`RequestCountFilter::filter_exchange`] around any handler, or
//! mount [`count_requests`] on an axum router:
//!
//! ```ignore
//! Router::new()
//!     .route("/sed/:id", get(handler))
//!     .layer(axum::middleware::from_fn_with_state(filter, count_requests))
//! ```

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;

use calltally_core::failure::Failure;
use calltally_core::meter::MeterSink;
use calltally_core::uri::UriTemplater;

use crate::config::CallTallyConfig;
use crate::exchange::{ExchangeOutcome, ExchangeRecorder, ExchangeRequest, ExchangeResponse, InFlight};

pub struct RequestCountFilter {
    recorder: ExchangeRecorder,
    enabled: bool,
}

impl RequestCountFilter {
    pub fn new(sink: Arc<dyn MeterSink>, enabled: bool) -> Self {
        Self::with_templater(sink, UriTemplater::default(), enabled)
    }

    pub fn with_templater(sink: Arc<dyn MeterSink>, templater: UriTemplater, enabled: bool) -> Self {
        Self { recorder: ExchangeRecorder::new(sink, templater), enabled }
    }

    /// Filter using the configured templater and `filter.enabled`.
    pub fn from_config(sink: Arc<dyn MeterSink>, cfg: &CallTallyConfig) -> Self {
        Self::with_templater(sink, cfg.templater, cfg.filter.enabled)
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// Run `next` exactly once and count the exchange when enabled.
    ///
    /// Whatever `next` returns is passed back unchanged; a panic in `next` is
    /// counted with exception `panic` before it keeps unwinding.
    pub fn filter_exchange<Q, R, E, F>(&self, request: &Q, next: F) -> Result<R, E>
    where
        Q: ExchangeRequest,
        R: ExchangeResponse,
        E: Failure,
        F: FnOnce(&Q) -> Result<R, E>,
    {
        if !self.enabled {
            return next(request);
        }
        let mut guard = self.recorder.guard(request);
        let result = next(request);
        guard.settle(ExchangeOutcome::of(&result));
        drop(guard);
        result
    }
}

/// axum middleware counting each request passing through the router.
///
/// The `uri` tag is the templated request path; the query string is left out.
pub async fn count_requests(
    State(filter): State<Arc<RequestCountFilter>>,
    request: Request,
    next: Next,
) -> Response {
    if !filter.enabled() {
        return next.run(request).await;
    }
    let mut in_flight = InFlight::new(
        filter.recorder.clone(),
        request.method().as_str().to_owned(),
        request.uri().path().to_owned(),
    );

    let response = next.run(request).await;

    in_flight.settle(ExchangeOutcome::response(response.status().as_u16()));
    response
}
