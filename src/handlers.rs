use std::convert::Infallible;
use std::sync::Arc;

use axum::Json;
use axum::body::Body;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::{Response, header};
use bytes::Bytes;
use futures::Stream;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::mpsc;

use crate::AppState;
use crate::agents::AgentEvent;
use crate::error::{AppError, log_error};

// ============================================================================
// REQUEST TYPES
// ============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct UserQuery {
    pub query: String,
}

// ============================================================================
// EVENT PROJECTION
// ============================================================================

/// Maps one agent event to its text fragment, if any. Tool events and
/// anything else without a projection produce no output at all.
fn event_fragment(event: &AgentEvent) -> Option<String> {
    match event {
        AgentEvent::ChainStart { name } => Some(format!("Starting agent: {}.\n", name)),
        AgentEvent::ChainEnd { name } => Some(format!("{} agent done.\n", name)),
        AgentEvent::ModelStream { content } => {
            if content.is_empty() {
                None
            } else {
                Some(content.clone())
            }
        }
        _ => None,
    }
}

/// Relays an agent run's events as plain-text fragments, strictly in arrival
/// order. A failure ends the stream with one in-band `Error:` line; the
/// response status is already committed by then, so that line is the only
/// signal the client gets.
fn relay_stream(
    mut rx: mpsc::Receiver<AgentEvent>,
) -> impl Stream<Item = Result<Bytes, Infallible>> {
    async_stream::stream! {
        while let Some(event) = rx.recv().await {
            match event {
                AgentEvent::Error { message } => {
                    yield Ok(Bytes::from(format!("Error: {}\n", message)));
                    break;
                }
                other => {
                    if let Some(fragment) = event_fragment(&other) {
                        yield Ok(Bytes::from(fragment));
                    }
                }
            }
        }
    }
}

// ============================================================================
// STREAM HANDLER
// ============================================================================

/// Handler for streaming movie-query responses
///
/// POST /movie/
/// Body: UserQuery JSON
///
/// Returns: chunked text/plain stream of projected agent events; a body
/// that does not decode as UserQuery gets a structured JSON error instead
pub async fn movie_stream_handler(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<UserQuery>, JsonRejection>,
) -> Result<Response<Body>, AppError> {
    let Json(request) = payload.map_err(|rejection| {
        let err = AppError::bad_request(format!("invalid request body: {}", rejection));
        log_error(&err);
        err
    })?;

    // Empty queries pass through; the agent decides what to do with them
    let rx = state.agent.stream_query(request.query);

    Ok(Response::builder()
        .header(header::CONTENT_TYPE, "text/plain; charset=utf-8")
        .body(Body::from_stream(relay_stream(rx)))
        .unwrap())
}

// ============================================================================
// HEALTH HANDLER
// ============================================================================

pub async fn health_check() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

// ============================================================================
// TESTS
// ============================================================================
