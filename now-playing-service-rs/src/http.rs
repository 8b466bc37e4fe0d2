use std::{future::Future, net::SocketAddr, time::Instant};

use axum::{
    body::Body,
    extract::{ConnectInfo, Path, State},
    http::{header, HeaderMap, HeaderName, HeaderValue, Request, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::Utc;
use serde::Serialize;
use serde_json::{json, Value};
use tokio::net::TcpListener;
use uuid::Uuid;

use crate::{app_state::AppState, logging::logger};

const INFO_CACHE_CONTROL: &str = "public, max-age=30, stale-while-revalidate=120";
static REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// Who asked for what, captured before the handler runs.
struct RequestMeta {
    id: String,
    method: String,
    path: String,
    client_ip: Option<String>,
}

impl RequestMeta {
    fn capture(request: &Request<Body>) -> Self {
        let remote = request
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|info| info.0);
        Self {
            id: request_id(request.headers()),
            method: request.method().to_string(),
            path: request.uri().to_string(),
            client_ip: client_ip(request.headers(), remote),
        }
    }

    fn fields(&self) -> Value {
        json!({
            "requestId": self.id,
            "method": self.method,
            "rawUrl": self.path,
            "clientIp": self.client_ip,
        })
    }
}

fn request_id(headers: &HeaderMap) -> String {
    headers
        .get(&REQUEST_ID)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string())
}

/// First hop of `x-forwarded-for`, else the socket peer.
fn client_ip(headers: &HeaderMap, remote: Option<SocketAddr>) -> Option<String> {
    headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|raw| raw.split(',').map(str::trim).find(|hop| !hop.is_empty()))
        .map(str::to_string)
        .or_else(|| remote.map(|addr| addr.ip().to_string()))
}

async fn log_requests(request: Request<Body>, next: Next) -> Response {
    let meta = RequestMeta::capture(&request);
    let started_at = Instant::now();
    logger().debug("request.received", meta.fields());

    let mut response = next.run(request).await;

    let mut fields = meta.fields();
    fields["statusCode"] = json!(response.status().as_u16());
    fields["durationMs"] = json!(started_at.elapsed().as_secs_f64() * 1000.0);
    logger().info("request.completed", fields);

    if let Ok(value) = HeaderValue::from_str(&meta.id) {
        response.headers_mut().insert(REQUEST_ID.clone(), value);
    }
    response
}

fn json_response<T>(status: StatusCode, payload: T) -> Response
where
    T: Serialize,
{
    (status, Json(payload)).into_response()
}

#[derive(Debug)]
enum ApiError {
    NotFound(&'static str),
}

#[derive(Serialize)]
struct ErrorResponse<'a> {
    error: &'a str,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::NotFound(message) => (
                StatusCode::NOT_FOUND,
                Json(ErrorResponse { error: message }),
            )
                .into_response(),
        }
    }
}

#[derive(Serialize)]
struct HealthResponse<'a> {
    status: &'a str,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/internal/status", get(internal_status))
        .route("/info", get(get_info))
        .route("/info/{station}", get(get_station))
        .with_state(state)
        .layer(middleware::from_fn(log_requests))
}

pub async fn serve<F>(state: AppState, port: u16, shutdown: F) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr).await?;
    logger().info(
        "server.listening",
        json!({
            "address": addr.to_string()
        }),
    );

    axum::serve(
        listener,
        router(state).into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown)
    .await?;

    Ok(())
}

async fn healthz() -> Response {
    json_response(StatusCode::OK, HealthResponse { status: "ok" })
}

async fn internal_status(State(state): State<AppState>) -> Response {
    let last_cycle = state.last_cycle().await;
    let status = if last_cycle.is_some() { "ok" } else { "starting" };
    json_response(
        StatusCode::OK,
        json!({
            "status": status,
            "timestamp": Utc::now().to_rfc3339(),
            "stations": state.station_count().await,
            "uptimeSeconds": state.uptime_seconds(),
            "lastCycle": last_cycle,
        }),
    )
}

fn etag_matches(headers: &HeaderMap, etag: &str) -> bool {
    headers
        .get_all(header::IF_NONE_MATCH)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .map(str::trim)
        .any(|candidate| {
            candidate == "*" || candidate.trim_start_matches("W/") == etag
        })
}

async fn get_info(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let encoded = state.encoded().await;
    let etag = HeaderValue::from_str(&encoded.etag).ok();

    let mut response = if etag_matches(&headers, &encoded.etag) {
        StatusCode::NOT_MODIFIED.into_response()
    } else {
        (
            [(header::CONTENT_TYPE, "application/json")],
            encoded.body.clone(),
        )
            .into_response()
    };
    let response_headers = response.headers_mut();
    if let Some(etag) = etag {
        response_headers.insert(header::ETAG, etag);
    }
    response_headers.insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static(INFO_CACHE_CONTROL),
    );
    response
}

async fn get_station(
    State(state): State<AppState>,
    Path(station): Path<String>,
) -> Result<Response, ApiError> {
    let record = state
        .station(&station)
        .await
        .ok_or(ApiError::NotFound("Station not found"))?;
    Ok(Json(record).into_response())
}

/// Resolves on Ctrl+C or SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            logger().error(
                "shutdown.signal_failed",
                json!({ "signal": "ctrl_c", "error": err.to_string() }),
            );
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                logger().error(
                    "shutdown.signal_failed",
                    json!({ "signal": "sigterm", "error": err.to_string() }),
                );
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    logger().info("shutdown.requested", json!({}));
}
