use axum::extract::{Path, Query, State};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::db::operations;
use crate::db::operations::catalog::{NewQuestion, QuestionFilter, QuestionPatch, QuestionRow};
use crate::response::AppError;
use crate::state::AppState;

const MAX_PAGE_SIZE: i64 = 50;
const MAX_BATCH_SIZE: usize = 500;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_questions).post(create_question))
        .route("/batch", post(batch_create_questions))
        .route(
            "/:id",
            get(get_question).put(update_question).delete(deactivate_question),
        )
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListParams {
    category_id: Option<i64>,
    difficulty_level: Option<i64>,
    limit: Option<i64>,
    offset: Option<i64>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct QuestionPayload {
    question_id: i64,
    category_id: i64,
    prompt: String,
    answer: String,
    explanation: String,
    difficulty_level: i64,
    is_active: bool,
    created_at: DateTime<Utc>,
}

#[derive(Serialize)]
struct QuestionListResponse {
    success: bool,
    questions: Vec<QuestionPayload>,
    total: i64,
}

#[derive(Serialize)]
struct QuestionResponse {
    success: bool,
    question: QuestionPayload,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateQuestionRequest {
    category_id: i64,
    prompt: String,
    answer: String,
    explanation: Option<String>,
    difficulty_level: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BatchCreateRequest {
    questions: Vec<CreateQuestionRequest>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateQuestionRequest {
    category_id: Option<i64>,
    prompt: Option<String>,
    answer: Option<String>,
    explanation: Option<String>,
    difficulty_level: Option<i64>,
    is_active: Option<bool>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct BatchCreateResponse {
    success: bool,
    question_ids: Vec<i64>,
}

#[derive(Serialize)]
struct MessageResponse {
    success: bool,
    message: &'static str,
}

fn to_payload(row: QuestionRow) -> QuestionPayload {
    QuestionPayload {
        question_id: row.id,
        category_id: row.category_id,
        prompt: row.prompt,
        answer: row.answer,
        explanation: row.explanation,
        difficulty_level: row.difficulty_level,
        is_active: row.is_active,
        created_at: row.created_at,
    }
}

fn validate_difficulty(level: i64) -> Result<(), AppError> {
    if (1..=5).contains(&level) {
        Ok(())
    } else {
        Err(AppError::validation("difficultyLevel must be between 1 and 5"))
    }
}

async fn list_questions(State(state): State<AppState>, Query(params): Query<ListParams>) -> Response {
    let filter = QuestionFilter {
        category_id: params.category_id,
        difficulty_level: params.difficulty_level,
        limit: params.limit.unwrap_or(10).clamp(1, MAX_PAGE_SIZE),
        offset: params.offset.unwrap_or(0).max(0),
    };

    match operations::catalog::list_questions(state.proxy().pool(), &filter).await {
        Ok((rows, total)) => Json(QuestionListResponse {
            success: true,
            questions: rows.into_iter().map(to_payload).collect(),
            total,
        })
        .into_response(),
        Err(err) => AppError::internal(err.to_string()).into_response(),
    }
}

async fn get_question(State(state): State<AppState>, Path(id): Path<i64>) -> Response {
    match operations::catalog::find_question(state.proxy().pool(), id).await {
        Ok(Some(row)) => Json(QuestionResponse {
            success: true,
            question: to_payload(row),
        })
        .into_response(),
        Ok(None) => AppError::not_found(format!("question {id} not found")).into_response(),
        Err(err) => AppError::internal(err.to_string()).into_response(),
    }
}

async fn create_question(
    State(state): State<AppState>,
    Json(payload): Json<CreateQuestionRequest>,
) -> Response {
    if let Err(err) = validate_difficulty(payload.difficulty_level) {
        return err.into_response();
    }

    let pool = state.proxy().pool();
    match operations::catalog::category_exists(pool, payload.category_id).await {
        Ok(true) => {}
        Ok(false) => {
            return AppError::not_found(format!("category {} not found", payload.category_id))
                .into_response()
        }
        Err(err) => return AppError::internal(err.to_string()).into_response(),
    }

    let new = NewQuestion {
        category_id: payload.category_id,
        prompt: payload.prompt,
        answer: payload.answer,
        explanation: payload.explanation.unwrap_or_default(),
        difficulty_level: payload.difficulty_level,
    };

    match operations::catalog::insert_question(pool, &new).await {
        Ok(id) => match operations::catalog::find_question(pool, id).await {
            Ok(Some(row)) => Json(QuestionResponse {
                success: true,
                question: to_payload(row),
            })
            .into_response(),
            Ok(None) => AppError::internal("question vanished after insert").into_response(),
            Err(err) => AppError::internal(err.to_string()).into_response(),
        },
        Err(err) => AppError::internal(err.to_string()).into_response(),
    }
}

async fn batch_create_questions(
    State(state): State<AppState>,
    Json(payload): Json<BatchCreateRequest>,
) -> Response {
    if payload.questions.is_empty() {
        return AppError::validation("questions array must not be empty").into_response();
    }
    if payload.questions.len() > MAX_BATCH_SIZE {
        return AppError::validation("questions array allows at most 500 entries").into_response();
    }

    let pool = state.proxy().pool();
    let mut items = Vec::with_capacity(payload.questions.len());
    for entry in payload.questions {
        if let Err(err) = validate_difficulty(entry.difficulty_level) {
            return err.into_response();
        }
        match operations::catalog::category_exists(pool, entry.category_id).await {
            Ok(true) => {}
            Ok(false) => {
                return AppError::not_found(format!("category {} not found", entry.category_id))
                    .into_response()
            }
            Err(err) => return AppError::internal(err.to_string()).into_response(),
        }
        items.push(NewQuestion {
            category_id: entry.category_id,
            prompt: entry.prompt,
            answer: entry.answer,
            explanation: entry.explanation.unwrap_or_default(),
            difficulty_level: entry.difficulty_level,
        });
    }

    match operations::catalog::insert_questions_batch(pool, &items).await {
        Ok(ids) => Json(BatchCreateResponse {
            success: true,
            question_ids: ids,
        })
        .into_response(),
        Err(err) => AppError::internal(err.to_string()).into_response(),
    }
}

async fn update_question(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateQuestionRequest>,
) -> Response {
    if let Some(level) = payload.difficulty_level {
        if let Err(err) = validate_difficulty(level) {
            return err.into_response();
        }
    }

    let pool = state.proxy().pool();
    if let Some(category_id) = payload.category_id {
        match operations::catalog::category_exists(pool, category_id).await {
            Ok(true) => {}
            Ok(false) => {
                return AppError::not_found(format!("category {category_id} not found"))
                    .into_response()
            }
            Err(err) => return AppError::internal(err.to_string()).into_response(),
        }
    }

    let patch = QuestionPatch {
        category_id: payload.category_id,
        prompt: payload.prompt,
        answer: payload.answer,
        explanation: payload.explanation,
        difficulty_level: payload.difficulty_level,
        is_active: payload.is_active,
    };

    match operations::catalog::update_question(pool, id, &patch).await {
        Ok(true) => match operations::catalog::find_question(pool, id).await {
            Ok(Some(row)) => Json(QuestionResponse {
                success: true,
                question: to_payload(row),
            })
            .into_response(),
            Ok(None) => AppError::not_found(format!("question {id} not found")).into_response(),
            Err(err) => AppError::internal(err.to_string()).into_response(),
        },
        Ok(false) => AppError::not_found(format!("question {id} not found")).into_response(),
        Err(err) => AppError::internal(err.to_string()).into_response(),
    }
}

async fn deactivate_question(State(state): State<AppState>, Path(id): Path<i64>) -> Response {
    match operations::catalog::deactivate_question(state.proxy().pool(), id).await {
        Ok(true) => Json(MessageResponse {
            success: true,
            message: "question deactivated",
        })
        .into_response(),
        Ok(false) => AppError::not_found(format!("question {id} not found")).into_response(),
        Err(err) => AppError::internal(err.to_string()).into_response(),
    }
}
