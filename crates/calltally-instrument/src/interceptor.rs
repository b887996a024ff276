//! Outbound request interceptor: counts every client-side exchange.
//!
//! Enabled by default. Wrap a blocking client call with
//! [`RequestCountInterceptor::intercept_exchange`], or stack
//! [`RequestCountLayer`] on a tower HTTP client service.

use std::sync::Arc;
use std::task::{Context, Poll};

use axum::http::{Request, Response};
use bytes::Bytes;
use futures_util::future::BoxFuture;
use tower::{Layer, Service};

use calltally_core::failure::Failure;
use calltally_core::meter::MeterSink;
use calltally_core::uri::UriTemplater;

use crate::config::CallTallyConfig;
use crate::exchange::{ExchangeOutcome, ExchangeRecorder, ExchangeRequest, ExchangeResponse, InFlight};

pub struct RequestCountInterceptor {
    recorder: ExchangeRecorder,
    enabled: bool,
}

impl RequestCountInterceptor {
    pub fn new(sink: Arc<dyn MeterSink>) -> Self {
        Self::with_templater(sink, UriTemplater::default(), true)
    }

    pub fn with_templater(sink: Arc<dyn MeterSink>, templater: UriTemplater, enabled: bool) -> Self {
        Self { recorder: ExchangeRecorder::new(sink, templater), enabled }
    }

    /// Interceptor using the configured templater and `interceptor.enabled`.
    pub fn from_config(sink: Arc<dyn MeterSink>, cfg: &CallTallyConfig) -> Self {
        Self::with_templater(sink, cfg.templater, cfg.interceptor.enabled)
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// Execute the outgoing request through `next` and count it.
    ///
    /// `body` is handed to `next` untouched. The result (response or failure)
    /// is returned as `next` produced it.
    pub fn intercept_exchange<Q, R, E, F>(&self, request: &Q, body: Bytes, next: F) -> Result<R, E>
    where
        Q: ExchangeRequest,
        R: ExchangeResponse,
        E: Failure,
        F: FnOnce(&Q, Bytes) -> Result<R, E>,
    {
        if !self.enabled {
            return next(request, body);
        }
        let mut guard = self.recorder.guard(request);
        let result = next(request, body);
        guard.settle(ExchangeOutcome::of(&result));
        drop(guard);
        result
    }
}

/// Tower layer counting requests sent through the wrapped client.
///
/// A request future dropped before completion is counted with exception
/// `cancelled`.
#[derive(Clone)]
pub struct RequestCountLayer {
    interceptor: Arc<RequestCountInterceptor>,
}

impl RequestCountLayer {
    pub fn new(interceptor: Arc<RequestCountInterceptor>) -> Self {
        Self { interceptor }
    }
}

impl<S> Layer<S> for RequestCountLayer {
    type Service = RequestCount<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RequestCount { inner, interceptor: Arc::clone(&self.interceptor) }
    }
}

#[derive(Clone)]
pub struct RequestCount<S> {
    inner: S,
    interceptor: Arc<RequestCountInterceptor>,
}

impl<S, B, RB> Service<Request<B>> for RequestCount<S>
where
    S: Service<Request<B>, Response = Response<RB>>,
    S::Error: Failure + Send + 'static,
    S::Future: Send + 'static,
    RB: Send + 'static,
{
    type Response = Response<RB>;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<B>) -> Self::Future {
        let in_flight = self.interceptor.enabled().then(|| {
            InFlight::new(
                self.interceptor.recorder.clone(),
                req.method().as_str().to_owned(),
                req.uri().to_string(),
            )
        });
        let fut = self.inner.call(req);
        Box::pin(async move {
            let mut in_flight = in_flight;
            let result = fut.await;
            if let Some(in_flight) = in_flight.as_mut() {
                in_flight.settle(ExchangeOutcome::of(&result));
            }
            result
        })
    }
}
