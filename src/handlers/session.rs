// Session endpoints: thin wrappers that map store outcomes onto HTTP

use axum::{
    Json,
    body::to_bytes,
    extract::{Path, Request, State},
    http::{HeaderMap, Method, StatusCode, Uri, Version},
    response::{IntoResponse, Response},
};
use serde_json::{Value, json};
use tracing::error;

use crate::session::{SessionError, SessionInfo, SessionManagerState};

/// Largest request body captured into a snapshot
pub const MAX_SNAPSHOT_BODY_BYTES: usize = 64 * 1024;

/// POST /api/create
pub async fn create_session(
    State(state): State<SessionManagerState>,
) -> Result<Json<Value>, SessionError> {
    let session_id = state.manager.create().await?;
    Ok(Json(json!({ "session_id": session_id })))
}

/// ANY /api/request/:id
pub async fn record_request(
    State(state): State<SessionManagerState>,
    Path(session_id): Path<String>,
    request: Request,
) -> Result<Json<&'static str>, Response> {
    // Read the body before any lock is taken; a failed capture is only
    // reported once the session has admitted the request.
    let capture = request_snapshot(request).await;

    let captured = state
        .manager
        .record_capture(&session_id, capture)
        .await
        .map_err(IntoResponse::into_response)?;

    captured.map_err(|e| {
        error!("Failed to dump request for session {}: {}", session_id, e);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": "Failed to dump request" })),
        )
            .into_response()
    })?;

    Ok(Json("Request processed"))
}

/// GET /api/session/:id
pub async fn get_history(
    State(state): State<SessionManagerState>,
    Path(session_id): Path<String>,
) -> Result<Json<Vec<String>>, SessionError> {
    let history = state.manager.get_history(&session_id).await?;
    Ok(Json(history))
}

/// PUT /api/extend/:id
pub async fn extend_session(
    State(state): State<SessionManagerState>,
    Path(session_id): Path<String>,
) -> Result<Json<&'static str>, SessionError> {
    state.manager.extend(&session_id).await?;
    Ok(Json("Session extended"))
}

/// POST /api/clear/:id
pub async fn clear_session(
    State(state): State<SessionManagerState>,
    Path(session_id): Path<String>,
) -> Result<Json<&'static str>, SessionError> {
    state.manager.clear(&session_id).await?;
    Ok(Json("Session cleared"))
}

/// DELETE /api/delete/:id
pub async fn delete_session(
    State(state): State<SessionManagerState>,
    Path(session_id): Path<String>,
) -> Result<Json<&'static str>, SessionError> {
    state.manager.delete(&session_id).await?;
    Ok(Json("Session deleted"))
}

/// GET /api/info/:id
pub async fn session_info(
    State(state): State<SessionManagerState>,
    Path(session_id): Path<String>,
) -> Result<Json<SessionInfo>, SessionError> {
    let info = state.manager.info(&session_id).await?;
    Ok(Json(info))
}

/// Read the whole request and render it as text
pub async fn request_snapshot(request: Request) -> Result<String, axum::Error> {
    let (parts, body) = request.into_parts();
    let body = to_bytes(body, MAX_SNAPSHOT_BODY_BYTES).await?;
    Ok(format_snapshot(
        &parts.method,
        &parts.uri,
        parts.version,
        &parts.headers,
        &body,
    ))
}

/// Render a request in wire-like form: request line, headers, blank line, body.
/// Non UTF-8 bytes are replaced.
pub fn format_snapshot(
    method: &Method,
    uri: &Uri,
    version: Version,
    headers: &HeaderMap,
    body: &[u8],
) -> String {
    let mut out = String::with_capacity(128 + body.len());
    out.push_str(&format!("{} {} {:?}\r\n", method, uri, version));
    for (name, value) in headers {
        out.push_str(&format!(
            "{}: {}\r\n",
            name,
            String::from_utf8_lossy(value.as_bytes())
        ));
    }
    out.push_str("\r\n");
    out.push_str(&String::from_utf8_lossy(body));
    out
}
