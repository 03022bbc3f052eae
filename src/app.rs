use crate::state::AppState;
use axum::extract::DefaultBodyLimit;
use axum::Router;
use tower_http::trace::TraceLayer;

pub async fn create_app(state: AppState) -> Router {
    let body_limit = state.config.pipeline.max_upload_bytes as usize;

    crate::routes::configure_routes()
        .layer(TraceLayer::new_for_http())
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}
