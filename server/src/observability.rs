use std::{
    sync::Arc,
    task::{Context as TaskContext, Poll},
    time::Duration,
};

use axum::{
    extract::MatchedPath,
    http::{HeaderValue, Request, Response, header::HeaderName},
};
use tower::{Layer, Service};
use tower_http::trace::{MakeSpan, OnResponse};
use tracing::{Level, Span, event, field};
use tracing_subscriber::{
    Registry,
    registry::{LookupSpan, SpanRef},
};
use uuid::Uuid;

pub(crate) static REQUEST_ID_HEADER: HeaderName = HeaderName::from_static("x-request-id");

/// Custom response logger that escalates log level for 4xx/5xx responses.
pub fn response_logger() -> ResponseLogger {
    ResponseLogger
}

#[derive(Clone, Copy, Debug, Default)]
pub struct ResponseLogger;

impl<B> OnResponse<B> for ResponseLogger {
    fn on_response(self, response: &Response<B>, latency: Duration, span: &Span) {
        let status = response.status();
        span.record(
            "http.response.status_code",
            field::display(status.as_u16()),
        );

        let latency_ms = latency.as_millis() as u64;
        if status.is_server_error() {
            event!(
                parent: span,
                Level::ERROR,
                http.response.status_code = status.as_u16(),
                latency_ms,
                "request completed"
            );
        } else if status.is_client_error() {
            event!(
                parent: span,
                Level::WARN,
                http.response.status_code = status.as_u16(),
                latency_ms,
                "request completed"
            );
        } else {
            event!(
                parent: span,
                Level::INFO,
                http.response.status_code = status.as_u16(),
                latency_ms,
                "request completed"
            );
        }
    }
}

#[derive(Clone, Debug)]
pub struct RequestContext {
    inner: Arc<RequestContextInner>,
}

#[derive(Debug)]
struct RequestContextInner {
    request_id: String,
}

impl RequestContext {
    fn new(request_id: String) -> Self {
        Self {
            inner: Arc::new(RequestContextInner { request_id }),
        }
    }

    pub fn request_id(&self) -> &str {
        &self.inner.request_id
    }
}

pub fn request_context_layer() -> RequestContextLayer {
    RequestContextLayer
}

/// Assigns every request an id (reusing `x-request-id` when the client sent
/// one) and stores it as a [`RequestContext`] extension.
#[derive(Clone, Default)]
pub struct RequestContextLayer;

#[derive(Clone)]
pub struct RequestContextMiddleware<S> {
    inner: S,
}

impl<S> Layer<S> for RequestContextLayer {
    type Service = RequestContextMiddleware<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RequestContextMiddleware { inner }
    }
}

impl<S, B> Service<Request<B>> for RequestContextMiddleware<S>
where
    S: Service<Request<B>>,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = S::Future;

    fn poll_ready(&mut self, cx: &mut TaskContext<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut request: Request<B>) -> Self::Future {
        let existing = request
            .headers()
            .get(&REQUEST_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .filter(|value| !value.is_empty())
            .map(str::to_owned);

        let request_id = match existing {
            Some(request_id) => request_id,
            None => {
                let request_id = Uuid::new_v4().to_string();
                if let Ok(header_value) = HeaderValue::from_str(&request_id) {
                    request
                        .headers_mut()
                        .insert(REQUEST_ID_HEADER.clone(), header_value);
                }
                request_id
            }
        };

        request
            .extensions_mut()
            .insert(RequestContext::new(request_id));

        self.inner.call(request)
    }
}

pub fn http_make_span() -> HttpMakeSpan {
    HttpMakeSpan
}

#[derive(Clone, Default)]
pub struct HttpMakeSpan;

impl<B> MakeSpan<B> for HttpMakeSpan {
    fn make_span(&mut self, request: &Request<B>) -> Span {
        let context = request.extensions().get::<RequestContext>().cloned();
        let request_id = context
            .as_ref()
            .map(|ctx| ctx.request_id().to_owned())
            .unwrap_or_else(|| "unknown".to_owned());
        let route = request
            .extensions()
            .get::<MatchedPath>()
            .map(|mp| mp.as_str().to_owned())
            .unwrap_or_else(|| request.uri().path().to_owned());

        let span = tracing::info_span!(
            "http_request",
            request_id = %request_id,
            http.request.method = %request.method(),
            http.route = %route,
            http.target = %request.uri(),
            http.response.status_code = field::Empty,
            user_id = field::Empty,
        );

        if let Some(ctx) = context {
            with_request_span_ref(&span, |span_ref| {
                span_ref.extensions_mut().insert(ctx.clone());
            });
        }

        span
    }
}

/// Attaches the caller identity to the current HTTP span once the
/// `X-User-Id` header has been accepted.
pub fn record_authenticated_identity(user_id: Option<&str>) {
    let span = Span::current();
    if span.is_disabled() {
        return;
    }

    if let Some(user_id) = user_id {
        span.record("user_id", field::display(user_id));
    }
}

pub fn current_request_context() -> Option<RequestContext> {
    let span = Span::current();
    if span.is_disabled() {
        return None;
    }

    let mut captured = None;
    with_request_span_ref(&span, |span_ref| {
        if let Some(existing) = span_ref.extensions().get::<RequestContext>() {
            captured = Some(existing.clone());
        }
    });
    captured
}

fn with_request_span_ref<F>(span: &Span, mut apply: F)
where
    F: FnMut(SpanRef<'_, Registry>),
{
    span.with_subscriber(|(id, dispatch)| {
        if let Some(registry) = dispatch.downcast_ref::<Registry>() {
            if let Some(span_ref) = registry.span(id) {
                apply(span_ref);
            }
        }
    });
}
