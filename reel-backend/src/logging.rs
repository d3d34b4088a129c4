//! Request tracing
//!

use std::time::Duration;

use axum::{http::header::CONTENT_LENGTH, response::Response};
use tower_http::{
    classify::{ServerErrorsAsFailures, SharedClassifier},
    trace::{OnRequest, OnResponse, TraceLayer},
};
use tracing::{trace, Span};

#[derive(Copy, Clone)]
pub(crate) struct ReelSpanner {}

impl<B> tower_http::trace::MakeSpan<B> for ReelSpanner {
    fn make_span(&mut self, request: &axum::http::Request<B>) -> Span {
        let method = request.method().to_string();
        // query strings can carry search terms, keep the path only
        let path = request.uri().path().to_string();
        tracing::info_span!(
            "request",
            method = %method,
            path = %path,
            status = tracing::field::Empty,
            latency_ms = tracing::field::Empty,
            bytes = tracing::field::Empty
        )
    }
}

impl<B> OnRequest<B> for ReelSpanner {
    fn on_request(&mut self, _request: &axum::http::Request<B>, _span: &Span) {
        trace!("request received");
    }
}

impl<B> OnResponse<B> for ReelSpanner {
    fn on_response(self, response: &Response<B>, latency: Duration, span: &Span) {
        span.record("status", response.status().as_u16());
        span.record("latency_ms", latency.as_millis() as u64);
        if let Some(content_length) = response
            .headers()
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse::<u64>().ok())
        {
            span.record("bytes", content_length);
        }
        if response.status().is_server_error() {
            tracing::event!(tracing::Level::WARN, "response sent");
        } else {
            tracing::event!(tracing::Level::INFO, "response sent");
        }
    }
}

pub(crate) fn logging_layer(
) -> TraceLayer<SharedClassifier<ServerErrorsAsFailures>, ReelSpanner, ReelSpanner, ReelSpanner>
{
    TraceLayer::new_for_http()
        .on_request(ReelSpanner {})
        .make_span_with(ReelSpanner {})
        .on_response(ReelSpanner {})
}
