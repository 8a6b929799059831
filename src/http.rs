use crate::aggregator::SnapshotAggregator;
use crate::metrics::Metrics;
use crate::static_files::{PublicRoot, StaticError};
use axum::body::Body;
use axum::extract::State;
use axum::http::{header::CONTENT_TYPE, HeaderValue, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::{routing::get, Json, Router};
use std::sync::Arc;
use tracing::debug;

#[derive(Clone)]
pub struct HttpAppState {
    pub metrics: Arc<Metrics>,
    pub aggregator: Arc<SnapshotAggregator>,
    pub public: Option<Arc<PublicRoot>>,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct ApiError {
    pub error: String,
}

pub fn build_router(state: HttpAppState) -> Router {
    Router::new()
        .route("/api/stats", get(stats_handler))
        .route("/healthz", get(healthz))
        .route("/metrics", get(metrics_handler))
        .fallback(static_handler)
        .with_state(state)
}

async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

async fn stats_handler(State(state): State<HttpAppState>) -> Response {
    state.metrics.inc_stats_request();
    match state.aggregator.collect().await {
        Ok(snapshot) => (StatusCode::OK, Json(snapshot)).into_response(),
        Err(err) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ApiError {
                error: err.to_string(),
            }),
        )
            .into_response(),
    }
}

async fn metrics_handler(State(state): State<HttpAppState>) -> Response {
    match state.metrics.encode_metrics() {
        Ok(encoded) => {
            let mut response = Response::new(Body::from(encoded));
            response.headers_mut().insert(
                CONTENT_TYPE,
                HeaderValue::from_static("text/plain; version=0.0.4"),
            );
            response
        }
        Err(err) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("ошибка кодирования метрик: {err}"),
        )
            .into_response(),
    }
}

async fn static_handler(State(state): State<HttpAppState>, method: Method, uri: Uri) -> Response {
    if method != Method::GET && method != Method::HEAD {
        return StatusCode::METHOD_NOT_ALLOWED.into_response();
    }
    let Some(public) = state.public.as_ref() else {
        return (StatusCode::NOT_FOUND, "Not found").into_response();
    };

    match public.read(uri.path()).await {
        Ok((bytes, content_type)) => {
            let mut response = Response::new(Body::from(bytes));
            response
                .headers_mut()
                .insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
            response
        }
        Err(StaticError::Forbidden) => {
            debug!(path = %uri.path(), "static path rejected");
            StatusCode::FORBIDDEN.into_response()
        }
        Err(StaticError::NotFound) => (StatusCode::NOT_FOUND, "Not found").into_response(),
    }
}
