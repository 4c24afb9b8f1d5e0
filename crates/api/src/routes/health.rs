use axum::{extract::State, Json};
use serde::Serialize;

use crate::response::{ok, Envelope};
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub store: &'static str,
    pub llm: &'static str,
    pub whisper: &'static str,
    /// Why the whisper backend is degraded, when it is.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub whisper_error: Option<String>,
}

/// GET /health — liveness plus per-dependency status. Never 5xx: a sick
/// dependency shows up as DEGRADED in the body instead.
pub async fn health(State(state): State<AppState>) -> Json<Envelope<HealthResponse>> {
    let store = match state.store.ping() {
        Ok(()) => "OK",
        Err(_) => "DEGRADED",
    };
    let llm = state.engine.llm_status().await;
    let whisper = state.engine.whisper_status();
    let whisper_error = state.engine.degraded_reason();

    let status = if store == "OK" && llm == "OK" && whisper == "OK" {
        "OK"
    } else {
        "DEGRADED"
    };

    ok(HealthResponse {
        status,
        store,
        llm,
        whisper,
        whisper_error,
    })
}
