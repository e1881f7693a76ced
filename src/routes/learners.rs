use axum::extract::{Path, State};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::operations;
use crate::response::AppError;
use crate::services::study::DEFAULT_STUDY_LEVEL;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_learner))
        .route("/:id", get(get_learner))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateLearnerRequest {
    id: Option<String>,
    display_name: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LearnerResponse {
    success: bool,
    id: String,
    display_name: String,
    study_level: i64,
    created_at: DateTime<Utc>,
}

async fn create_learner(
    State(state): State<AppState>,
    Json(payload): Json<CreateLearnerRequest>,
) -> Response {
    let pool = state.proxy().pool();
    let id = payload
        .id
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    let display_name = payload.display_name.unwrap_or_default();

    match operations::learners::find_by_id(pool, &id).await {
        Ok(Some(_)) => {
            return AppError::conflict(format!("learner {id} already exists")).into_response()
        }
        Ok(None) => {}
        Err(err) => return AppError::internal(err.to_string()).into_response(),
    }

    if let Err(err) =
        operations::learners::insert(pool, &id, &display_name, DEFAULT_STUDY_LEVEL).await
    {
        return AppError::internal(err.to_string()).into_response();
    }

    match operations::learners::find_by_id(pool, &id).await {
        Ok(Some(learner)) => Json(LearnerResponse {
            success: true,
            id: learner.id,
            display_name: learner.display_name,
            study_level: learner.study_level,
            created_at: learner.created_at,
        })
        .into_response(),
        Ok(None) => AppError::internal("learner vanished after insert").into_response(),
        Err(err) => AppError::internal(err.to_string()).into_response(),
    }
}

async fn get_learner(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    let pool = state.proxy().pool();

    match operations::learners::find_by_id(pool, &id).await {
        Ok(Some(learner)) => Json(LearnerResponse {
            success: true,
            id: learner.id,
            display_name: learner.display_name,
            study_level: learner.study_level,
            created_at: learner.created_at,
        })
        .into_response(),
        Ok(None) => AppError::not_found(format!("learner {id} not found")).into_response(),
        Err(err) => AppError::internal(err.to_string()).into_response(),
    }
}
