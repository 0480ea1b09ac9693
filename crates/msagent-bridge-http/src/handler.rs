//! HTTP route handlers.
//!
//! Every event route decodes its JSON body, formats the matching command and
//! hands it to the IPC client. The reply is logged but not surfaced: a 200
//! means the command was dispatched, not that the assistant reacted.

use crate::server::AppState;
use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use msagent_bridge_core::{format_command, EventKind, ProtocolConfig};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

/// Body of `GET /health`.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub peer_connected: bool,
    pub peer_response: String,
}

/// Body of every event route.
#[derive(Debug, Serialize)]
pub struct EventResponse {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delivered: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub peer_error: Option<String>,
}

impl EventResponse {
    fn ok() -> Self {
        Self {
            status: "ok",
            delivered: None,
            peer_error: None,
        }
    }
}

/// Body returned for requests whose JSON could not be decoded.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub status: &'static str,
    pub error: String,
}

type JsonBody = std::result::Result<Json<Value>, JsonRejection>;

/// Health check endpoint. Always 200; peer reachability is in the body.
pub async fn handle_health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let (peer_connected, peer_response) = state.client.ping().await;

    Json(HealthResponse {
        status: "ok",
        peer_connected,
        peer_response,
    })
}

pub async fn handle_vehicle(State(state): State<Arc<AppState>>, body: JsonBody) -> Response {
    dispatch_event(&state, EventKind::Vehicle, body).await
}

pub async fn handle_crash(State(state): State<Arc<AppState>>, body: JsonBody) -> Response {
    dispatch_event(&state, EventKind::Crash, body).await
}

pub async fn handle_dent(State(state): State<Arc<AppState>>, body: JsonBody) -> Response {
    dispatch_event(&state, EventKind::Dent, body).await
}

pub async fn handle_scratch(State(state): State<Arc<AppState>>, body: JsonBody) -> Response {
    dispatch_event(&state, EventKind::Scratch, body).await
}

pub async fn handle_surroundings(State(state): State<Arc<AppState>>, body: JsonBody) -> Response {
    dispatch_event(&state, EventKind::Surroundings, body).await
}

/// Format and forward one event.
async fn dispatch_event(state: &AppState, kind: EventKind, body: JsonBody) -> Response {
    let payload = match body {
        Ok(Json(payload)) => payload,
        Err(rejection) => return reject_body(kind, rejection),
    };

    debug!("{} event: {}", kind, payload);

    let command = format_command(kind, &payload);
    let reply = state.client.send(&command).await;

    let mut response = EventResponse::ok();
    if state.options.report_delivery {
        let failed = reply.starts_with(ProtocolConfig::ERROR_PREFIX);
        response.delivered = Some(!failed);
        if failed {
            response.peer_error = Some(reply);
        }
    }

    (StatusCode::OK, Json(response)).into_response()
}

fn reject_body(kind: EventKind, rejection: JsonRejection) -> Response {
    let message = rejection.body_text();
    warn!("Rejected {} request: {}", kind, message);
    (
        rejection.status(),
        Json(ErrorResponse {
            status: "error",
            error: message,
        }),
    )
        .into_response()
}
