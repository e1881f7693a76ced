use axum::extract::{Path, Query, State};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::db::operations;
use crate::engine::types::{RequestStatus, StrategyKind};
use crate::metrics::Metrics;
use crate::response::AppError;
use crate::state::AppState;

const MAX_LIST_LIMIT: i64 = 20;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_recommendation).get(list_recommendations))
        .route("/:id", get(recommendation_detail))
        .route("/:id/result", post(recommendation_result))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateRecommendationRequest {
    learner_id: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateRecommendationResponse {
    success: bool,
    request_id: String,
    strategy: StrategyKind,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RecommendedQuestionPayload {
    question_id: i64,
    prompt: String,
    answer: String,
    explanation: String,
    difficulty_level: i64,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RecommendationResultResponse {
    success: bool,
    recommendation: Vec<RecommendedQuestionPayload>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListParams {
    learner_id: String,
    limit: Option<i64>,
    offset: Option<i64>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RequestSummary {
    request_id: String,
    learner_id: String,
    strategy: StrategyKind,
    status: RequestStatus,
    created_at: DateTime<Utc>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RequestListResponse {
    success: bool,
    recommendations: Vec<RequestSummary>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RequestDetailResponse {
    success: bool,
    recommendation: RequestSummary,
}

async fn create_recommendation(
    State(state): State<AppState>,
    Json(payload): Json<CreateRecommendationRequest>,
) -> Response {
    match state
        .recommender()
        .create_request(&payload.learner_id)
        .await
    {
        Ok(created) => Json(CreateRecommendationResponse {
            success: true,
            request_id: created.request_id,
            strategy: created.strategy,
        })
        .into_response(),
        Err(err) => AppError::from(err).into_response(),
    }
}

async fn recommendation_result(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    let item_ids = match state.recommender().fetch_recommendation(&id).await {
        Ok(ids) => ids,
        Err(err) => return AppError::from(err).into_response(),
    };

    let pool = state.proxy().pool();
    let mut recommendation = Vec::with_capacity(item_ids.len());
    for question_id in item_ids {
        match operations::catalog::find_question(pool, question_id).await {
            Ok(Some(row)) => recommendation.push(RecommendedQuestionPayload {
                question_id: row.id,
                prompt: row.prompt,
                answer: row.answer,
                explanation: row.explanation,
                difficulty_level: row.difficulty_level,
            }),
            Ok(None) => {
                return AppError::internal(format!(
                    "persisted recommendation references missing question {question_id}"
                ))
                .into_response()
            }
            Err(err) => return AppError::internal(err.to_string()).into_response(),
        }
    }

    Metrics::global().incr_recommendations_served();
    Json(RecommendationResultResponse {
        success: true,
        recommendation,
    })
    .into_response()
}

async fn list_recommendations(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Response {
    let limit = params.limit.unwrap_or(5).clamp(1, MAX_LIST_LIMIT);
    let offset = params.offset.unwrap_or(0).max(0);

    match operations::recommendations::list_for_learner(
        state.proxy().pool(),
        &params.learner_id,
        limit,
        offset,
    )
    .await
    {
        Ok(rows) => Json(RequestListResponse {
            success: true,
            recommendations: rows
                .into_iter()
                .map(|row| RequestSummary {
                    request_id: row.id,
                    learner_id: row.learner_id,
                    strategy: row.strategy,
                    status: row.status,
                    created_at: row.created_at,
                })
                .collect(),
        })
        .into_response(),
        Err(err) => AppError::internal(err.to_string()).into_response(),
    }
}

async fn recommendation_detail(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    match operations::recommendations::find_request(state.proxy().pool(), &id).await {
        Ok(Some(row)) => Json(RequestDetailResponse {
            success: true,
            recommendation: RequestSummary {
                request_id: row.id,
                learner_id: row.learner_id,
                strategy: row.strategy,
                status: row.status,
                created_at: row.created_at,
            },
        })
        .into_response(),
        Ok(None) => {
            AppError::not_found(format!("recommendation request {id} not found")).into_response()
        }
        Err(err) => AppError::internal(err.to_string()).into_response(),
    }
}
