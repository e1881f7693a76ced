use axum::extract::{Path, Query, State};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use crate::db::operations;
use crate::db::operations::attempts::{CategoryStat, DifficultyStat, HistoryEntry};
use crate::response::AppError;
use crate::services::study;
use crate::state::AppState;

const MAX_HISTORY_LIMIT: i64 = 100;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/attempts", post(submit_attempt))
        .route("/:learner_id/history", get(recent_history))
        .route("/:learner_id/stats", get(study_stats))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SubmitAttemptRequest {
    learner_id: String,
    question_id: i64,
    correct: bool,
    #[serde(default)]
    response_seconds: f64,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SubmitAttemptResponse {
    success: bool,
    explanation: String,
    study_level: i64,
}

#[derive(Debug, Deserialize)]
struct HistoryParams {
    limit: Option<i64>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HistoryResponse {
    success: bool,
    recent_history: Vec<HistoryEntry>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StatsResponse {
    success: bool,
    category_stats: Vec<CategoryStat>,
    difficulty_stats: Vec<DifficultyStat>,
}

async fn submit_attempt(
    State(state): State<AppState>,
    Json(payload): Json<SubmitAttemptRequest>,
) -> Response {
    if payload.response_seconds < 0.0 {
        return AppError::validation("responseSeconds must not be negative").into_response();
    }

    match study::record_attempt(
        state.proxy(),
        &payload.learner_id,
        payload.question_id,
        payload.correct,
        payload.response_seconds,
    )
    .await
    {
        Ok(outcome) => Json(SubmitAttemptResponse {
            success: true,
            explanation: outcome.explanation,
            study_level: outcome.study_level,
        })
        .into_response(),
        Err(err) => AppError::from(err).into_response(),
    }
}

async fn recent_history(
    State(state): State<AppState>,
    Path(learner_id): Path<String>,
    Query(params): Query<HistoryParams>,
) -> Response {
    let pool = state.proxy().pool();
    let limit = params.limit.unwrap_or(10).clamp(1, MAX_HISTORY_LIMIT);

    match operations::learners::find_by_id(pool, &learner_id).await {
        Ok(Some(_)) => {}
        Ok(None) => {
            return AppError::not_found(format!("learner {learner_id} not found")).into_response()
        }
        Err(err) => return AppError::internal(err.to_string()).into_response(),
    }

    match operations::attempts::recent_history_with_questions(pool, &learner_id, limit).await {
        Ok(entries) => Json(HistoryResponse {
            success: true,
            recent_history: entries,
        })
        .into_response(),
        Err(err) => AppError::internal(err.to_string()).into_response(),
    }
}

async fn study_stats(State(state): State<AppState>, Path(learner_id): Path<String>) -> Response {
    let pool = state.proxy().pool();

    match operations::learners::find_by_id(pool, &learner_id).await {
        Ok(Some(_)) => {}
        Ok(None) => {
            return AppError::not_found(format!("learner {learner_id} not found")).into_response()
        }
        Err(err) => return AppError::internal(err.to_string()).into_response(),
    }

    let category_stats = match operations::attempts::category_stats(pool, &learner_id).await {
        Ok(stats) => stats,
        Err(err) => return AppError::internal(err.to_string()).into_response(),
    };
    let difficulty_stats = match operations::attempts::difficulty_stats(pool, &learner_id).await {
        Ok(stats) => stats,
        Err(err) => return AppError::internal(err.to_string()).into_response(),
    };

    Json(StatsResponse {
        success: true,
        category_stats,
        difficulty_stats,
    })
    .into_response()
}
