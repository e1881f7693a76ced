#![allow(dead_code)]

pub mod config;
pub mod db;
pub mod engine;
pub mod logging;
pub mod metrics;
pub mod response;
pub mod routes;
pub mod seed;
pub mod services;
pub mod state;

use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::engine::EngineConfig;
use crate::state::AppState;

pub async fn create_app() -> Result<axum::Router, db::DbInitError> {
    let proxy = db::DatabaseProxy::from_env().await?;
    let state = AppState::new(proxy, EngineConfig::from_env());

    Ok(routes::router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()))
}
