use axum::routing::{delete, get, post};
use axum::Router;

use crate::state::AppState;

pub mod dto;
pub mod error;
pub mod events;
pub mod handler;
pub mod model;
pub mod repository;
pub mod service;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/movies/{movie_id}/upload", post(handler::upload_video))
        .route("/movies/{movie_id}/video", delete(handler::delete_video))
        .route("/movies/{movie_id}/manifest", get(handler::get_manifest))
        .route("/movies/{movie_id}/thumbnails", get(handler::get_thumbnails))
        .route("/jobs/{job_id}", get(handler::get_job_status))
        .route("/jobs/{job_id}/cancel", post(handler::cancel_job))
}
