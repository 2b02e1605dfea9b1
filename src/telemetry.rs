//! Log output for the marketplace service and the per-request trace id.
//!
//! The subscriber is installed once per process. Every request handled by the
//! router runs inside a [`RequestTrace`] scope; error responses read the id
//! from there.

use std::any::type_name_of_val;
use std::sync::atomic::{AtomicBool, Ordering};

use axum::{
    extract::Request,
    http::{HeaderName, HeaderValue},
    middleware::Next,
    response::Response,
};
use log::LevelFilter;
use thiserror::Error;
use tokio::task_local;
use tracing_log::LogTracer;
use tracing_subscriber::{
    EnvFilter, Registry, fmt,
    layer::Layer,
    layer::SubscriberExt,
    util::{SubscriberInitExt, TryInitError},
};

use crate::config::AppConfig;

/// Header carrying the request correlation id in both directions.
pub static TRACE_ID_HEADER: HeaderName = HeaderName::from_static("x-trace-id");

/// Correlation id of the request being served
#[derive(Debug, Clone)]
pub struct RequestTrace {
    pub trace_id: String,
}

task_local! {
    static REQUEST_TRACE: RequestTrace;
}

#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("log bridge rejected: {0}")]
    LogBridge(#[from] log::SetLoggerError),
    #[error("subscriber rejected: {0}")]
    Subscriber(#[from] TryInitError),
}

static SUBSCRIBER_READY: AtomicBool = AtomicBool::new(false);

type BoxedFmtLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// `json` unless the profile asks for `pretty`
fn output_layer(format: &str) -> BoxedFmtLayer {
    if format == "pretty" {
        fmt::layer().pretty().boxed()
    } else {
        fmt::layer().json().boxed()
    }
}

/// Route `log::` records (sea-orm, sqlx, seeds) into tracing. A bridge that
/// is already installed counts as success.
fn bridge_log_records() {
    let Err(err) = LogTracer::builder()
        .with_max_level(LevelFilter::Trace)
        .init()
    else {
        return;
    };
    if !type_name_of_val(log::logger()).contains("LogTracer") {
        eprintln!("marketplace: log bridge not installed ({err}); sea-orm and sqlx output is lost");
    }
}

/// Install the global subscriber. Later calls are no-ops once one succeeded.
pub fn init_tracing(config: &AppConfig) -> Result<(), TelemetryError> {
    if SUBSCRIBER_READY.swap(true, Ordering::SeqCst) {
        return Ok(());
    }

    bridge_log_records();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    let installed = tracing_subscriber::registry()
        .with(output_layer(&config.log_format))
        .with(filter)
        .try_init();

    if let Err(err) = installed {
        SUBSCRIBER_READY.store(false, Ordering::SeqCst);
        eprintln!("marketplace: keeping the existing subscriber ({err})");
    }
    Ok(())
}

/// Run `future` with `trace` as the current request trace.
pub async fn in_request_trace<Fut, R>(trace: RequestTrace, future: Fut) -> R
where
    Fut: std::future::Future<Output = R>,
{
    REQUEST_TRACE.scope(trace, future).await
}

/// Trace id of the request the current task is serving
pub fn current_trace_id() -> Option<String> {
    REQUEST_TRACE.try_with(|trace| trace.trace_id.clone()).ok()
}

/// Accept caller-supplied ids only when they are short and header-safe.
fn sanitize_inbound_trace_id(value: &HeaderValue) -> Option<String> {
    let raw = value.to_str().ok()?.trim();
    let valid = !raw.is_empty()
        && raw.len() <= 64
        && raw
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.');
    valid.then(|| raw.to_string())
}

/// Middleware that scopes every request in a [`RequestTrace`] and echoes the
/// id back in the `x-trace-id` response header.
pub async fn trace_context_middleware(request: Request, next: Next) -> Response {
    let trace_id = request
        .headers()
        .get(&TRACE_ID_HEADER)
        .and_then(sanitize_inbound_trace_id)
        .unwrap_or_else(|| uuid::Uuid::new_v4().simple().to_string());

    let span = tracing::info_span!(
        "request",
        trace_id = %trace_id,
        method = %request.method(),
        path = %request.uri().path()
    );
    let trace = RequestTrace {
        trace_id: trace_id.clone(),
    };

    let mut response = tracing::Instrument::instrument(
        in_request_trace(trace, next.run(request)),
        span,
    )
    .await;

    if let Ok(value) = HeaderValue::from_str(&trace_id) {
        response.headers_mut().insert(TRACE_ID_HEADER.clone(), value);
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn trace_id_visible_inside_scope_only() {
        assert!(current_trace_id().is_none());

        let seen = in_request_trace(
            RequestTrace {
                trace_id: "abc-123".to_string(),
            },
            async { current_trace_id() },
        )
        .await;

        assert_eq!(seen.as_deref(), Some("abc-123"));
        assert!(current_trace_id().is_none());
    }

    #[test]
    fn inbound_trace_id_sanitization() {
        let ok = HeaderValue::from_static("req-42_a.b");
        assert_eq!(sanitize_inbound_trace_id(&ok).as_deref(), Some("req-42_a.b"));

        let bad = HeaderValue::from_static("has spaces");
        assert!(sanitize_inbound_trace_id(&bad).is_none());

        let long = HeaderValue::from_str(&"a".repeat(65)).unwrap();
        assert!(sanitize_inbound_trace_id(&long).is_none());
    }
}
