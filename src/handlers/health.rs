use axum::{Json, extract::State, http::StatusCode};
use serde_json::{Value, json};

use crate::session::SessionManagerState;

pub async fn health_check(State(state): State<SessionManagerState>) -> (StatusCode, Json<Value>) {
    let stats = state.manager.stats().await;

    (
        StatusCode::OK,
        Json(json!({
            "status": "healthy",
            "service": "session-throttle-api",
            "version": env!("CARGO_PKG_VERSION"),
            "sessions": stats,
        })),
    )
}
