// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! HTTP handlers for the pingback receiver.
//!
//! The XML-RPC endpoint always answers `200 OK` with an XML-RPC body, so
//! pingback clients only ever see a success value or a fault struct.

use crate::config::Config;
use crate::error::PingbackError;
use crate::models::{PingbackRecord, PingbackResponse};
use crate::recorder::PingSuccessCallback;
use crate::service::{InboundPing, PingbackService};
use axum::{
    body::Bytes,
    extract::{ConnectInfo, Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use serde::Serialize;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, warn};
use uuid::Uuid;

/// Shared application state.
pub struct AppState {
    pub service: PingbackService,
    pub callback: Arc<dyn PingSuccessCallback>,
    pub config: Config,
}

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: &'static str,
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
}

/// Build the service router.
pub fn router(state: Arc<AppState>) -> Router {
    let mut app = Router::new()
        .route("/health", get(health))
        .route("/healthz", get(health))
        .route("/pingback", post(pingback))
        .route("/pingbacks", get(history))
        .route("/pingbacks/:id", delete(delete_history));

    if state.config.metrics.enabled {
        app = app.route(&state.config.metrics.path, get(metrics));
    }

    app.layer(TraceLayer::new_for_http()).with_state(state)
}

/// Health check endpoint.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        service: "pingback-receiver",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// XML-RPC `pingback.ping` endpoint.
pub async fn pingback(
    State(state): State<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let caller_ip = client_ip(&headers, addr, state.config.site.trust_forwarded_for);
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok());

    let response = match std::str::from_utf8(&body) {
        Ok(body) => {
            state
                .service
                .receive(
                    InboundPing {
                        body,
                        content_type,
                        caller_ip,
                    },
                    state.callback.as_ref(),
                )
                .await
        }
        Err(_) => {
            debug!(%caller_ip, "Pingback body is not UTF-8");
            state.service.reject(
                caller_ip,
                PingbackError::MalformedRequest("body is not valid UTF-8".to_string()),
            )
        }
    };

    xml_response(response)
}

/// List recorded pingbacks, newest first.
pub async fn history(State(state): State<Arc<AppState>>) -> Response {
    match state.service.get_history().await {
        Ok(records) => Json::<Vec<PingbackRecord>>(records).into_response(),
        Err(err) => {
            error!(error = %err, "Failed to list pingback history");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: err.to_string(),
                    code: "STORAGE_ERROR",
                }),
            )
                .into_response()
        }
    }
}

/// Delete one recorded pingback.
pub async fn delete_history(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Response {
    let Ok(id) = Uuid::parse_str(&id) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: format!("invalid pingback id: {id}"),
                code: "INVALID_ID",
            }),
        )
            .into_response();
    };

    match state.service.delete_history(id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err @ PingbackError::NotFound(_)) => (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: err.to_string(),
                code: "NOT_FOUND",
            }),
        )
            .into_response(),
        Err(err) => {
            error!(%id, error = %err, "Failed to delete pingback");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: err.to_string(),
                    code: "STORAGE_ERROR",
                }),
            )
                .into_response()
        }
    }
}

/// Prometheus metrics endpoint.
pub async fn metrics(State(state): State<Arc<AppState>>) -> Response {
    match state.service.metrics().render() {
        Ok(text) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            text,
        )
            .into_response(),
        Err(err) => {
            warn!(error = %err, "Failed to render metrics");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

fn xml_response(response: PingbackResponse) -> Response {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/xml; charset=utf-8")],
        response.to_xml(),
    )
        .into_response()
}

/// Caller address, optionally taken from the first `X-Forwarded-For` hop.
pub fn client_ip(headers: &HeaderMap, peer: SocketAddr, trust_forwarded_for: bool) -> IpAddr {
    if trust_forwarded_for {
        let forwarded = headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .and_then(|v| v.trim().parse().ok());
        if let Some(ip) = forwarded {
            return ip;
        }
    }
    peer.ip()
}
