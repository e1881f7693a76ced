use axum::extract::{Path, State};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use crate::db::operations;
use crate::response::AppError;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_categories).post(create_category))
        .route("/:id", get(get_category))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CategoryPayload {
    category_id: i64,
    name: String,
    description: String,
    question_count: i64,
}

#[derive(Serialize)]
struct CategoryListResponse {
    success: bool,
    categories: Vec<CategoryPayload>,
}

#[derive(Serialize)]
struct CategoryResponse {
    success: bool,
    category: CategoryPayload,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateCategoryRequest {
    name: String,
    description: Option<String>,
}

fn to_payload(row: operations::catalog::CategoryRow) -> CategoryPayload {
    CategoryPayload {
        category_id: row.id,
        name: row.name,
        description: row.description,
        question_count: row.question_count,
    }
}

async fn list_categories(State(state): State<AppState>) -> Response {
    match operations::catalog::list_categories(state.proxy().pool()).await {
        Ok(rows) => Json(CategoryListResponse {
            success: true,
            categories: rows.into_iter().map(to_payload).collect(),
        })
        .into_response(),
        Err(err) => AppError::internal(err.to_string()).into_response(),
    }
}

async fn get_category(State(state): State<AppState>, Path(id): Path<i64>) -> Response {
    match operations::catalog::find_category(state.proxy().pool(), id).await {
        Ok(Some(row)) => Json(CategoryResponse {
            success: true,
            category: to_payload(row),
        })
        .into_response(),
        Ok(None) => AppError::not_found(format!("category {id} not found")).into_response(),
        Err(err) => AppError::internal(err.to_string()).into_response(),
    }
}

async fn create_category(
    State(state): State<AppState>,
    Json(payload): Json<CreateCategoryRequest>,
) -> Response {
    let name = payload.name.trim();
    if name.is_empty() {
        return AppError::validation("category name must not be empty").into_response();
    }

    let pool = state.proxy().pool();
    let description = payload.description.unwrap_or_default();

    match operations::catalog::insert_category(pool, name, &description).await {
        Ok(id) => match operations::catalog::find_category(pool, id).await {
            Ok(Some(row)) => Json(CategoryResponse {
                success: true,
                category: to_payload(row),
            })
            .into_response(),
            Ok(None) => AppError::internal("category vanished after insert").into_response(),
            Err(err) => AppError::internal(err.to_string()).into_response(),
        },
        Err(err) => AppError::internal(err.to_string()).into_response(),
    }
}
