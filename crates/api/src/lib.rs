pub mod error;
pub mod response;
pub mod routes;
pub mod state;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use state::AppState;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api = Router::new()
        .route(
            "/transcriptions",
            post(routes::transcriptions::create).get(routes::transcriptions::list),
        )
        .route(
            "/transcriptions/{id}",
            get(routes::transcriptions::get).delete(routes::transcriptions::delete),
        )
        .route(
            "/transcriptions/{id}/summary",
            get(routes::transcriptions::summary),
        )
        .route(
            "/transcriptions/{id}/logs",
            get(routes::transcriptions::logs),
        )
        .route(
            "/transcriptions/{id}/reprocess",
            post(routes::transcriptions::reprocess),
        )
        .route(
            "/files/{id}/transcription.txt",
            get(routes::files::transcription_txt),
        )
        .route("/files/{id}/summary.txt", get(routes::files::summary_txt))
        .route("/files/{id}/export", get(routes::files::export))
        .route("/statistics", get(routes::transcriptions::statistics));

    let body_limit = state.body_limit();

    Router::new()
        .nest("/api/v1", api)
        .route("/health", get(routes::health::health))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
