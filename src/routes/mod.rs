mod categories;
mod health;
mod learners;
mod questions;
mod recommendations;
mod study;

use axum::Router;

use crate::state::AppState;

pub fn router(state: AppState) -> Router {
    Router::new()
        .nest("/health", health::router())
        .nest("/api/learners", learners::router())
        .nest("/api/categories", categories::router())
        .nest("/api/questions", questions::router())
        .nest("/api/study", study::router())
        .nest("/api/recommendations", recommendations::router())
        .with_state(state)
}
