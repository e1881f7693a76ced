use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};

use crate::engine::types::AttemptRecord;

fn row_to_attempt(row: &sqlx::sqlite::SqliteRow) -> Result<AttemptRecord, sqlx::Error> {
    Ok(AttemptRecord {
        question_id: row.try_get("questionId")?,
        correct: row.try_get::<i64, _>("correct")? != 0,
        response_seconds: row.try_get("responseSeconds")?,
        timestamp: row.try_get("createdAt")?,
    })
}

pub async fn insert(
    pool: &SqlitePool,
    learner_id: &str,
    question_id: i64,
    correct: bool,
    response_seconds: f64,
    at: DateTime<Utc>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO "attempt_logs"
          ("learnerId", "questionId", "correct", "responseSeconds", "createdAt")
        VALUES ($1, $2, $3, $4, $5)
        "#,
    )
    .bind(learner_id)
    .bind(question_id)
    .bind(correct as i64)
    .bind(response_seconds)
    .bind(at)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn count_for_learner(pool: &SqlitePool, learner_id: &str) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar(r#"SELECT COUNT(*) FROM "attempt_logs" WHERE "learnerId" = $1"#)
        .bind(learner_id)
        .fetch_one(pool)
        .await
}

/// Full history ascending by timestamp, the order the scoring engines
/// consume it in.
pub async fn list_for_learner_asc(
    pool: &SqlitePool,
    learner_id: &str,
) -> Result<Vec<AttemptRecord>, sqlx::Error> {
    let rows = sqlx::query(
        r#"
        SELECT "questionId", "correct", "responseSeconds", "createdAt"
        FROM "attempt_logs"
        WHERE "learnerId" = $1
        ORDER BY "createdAt" ASC, "id" ASC
        "#,
    )
    .bind(learner_id)
    .fetch_all(pool)
    .await?;

    rows.iter().map(row_to_attempt).collect()
}

/// Most recent attempts, newest first.
pub async fn recent_for_learner(
    pool: &SqlitePool,
    learner_id: &str,
    limit: i64,
) -> Result<Vec<AttemptRecord>, sqlx::Error> {
    let rows = sqlx::query(
        r#"
        SELECT "questionId", "correct", "responseSeconds", "createdAt"
        FROM "attempt_logs"
        WHERE "learnerId" = $1
        ORDER BY "createdAt" DESC, "id" DESC
        LIMIT $2
        "#,
    )
    .bind(learner_id)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    rows.iter().map(row_to_attempt).collect()
}

#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub question_id: i64,
    pub prompt: String,
    pub correct: bool,
    pub response_seconds: f64,
    pub created_at: DateTime<Utc>,
}

pub async fn recent_history_with_questions(
    pool: &SqlitePool,
    learner_id: &str,
    limit: i64,
) -> Result<Vec<HistoryEntry>, sqlx::Error> {
    let rows = sqlx::query(
        r#"
        SELECT a."questionId", q."prompt", a."correct", a."responseSeconds", a."createdAt"
        FROM "attempt_logs" a
        JOIN "questions" q ON q."id" = a."questionId"
        WHERE a."learnerId" = $1
        ORDER BY a."createdAt" DESC, a."id" DESC
        LIMIT $2
        "#,
    )
    .bind(learner_id)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    rows.iter()
        .map(|row| {
            Ok(HistoryEntry {
                question_id: row.try_get("questionId")?,
                prompt: row.try_get("prompt")?,
                correct: row.try_get::<i64, _>("correct")? != 0,
                response_seconds: row.try_get("responseSeconds")?,
                created_at: row.try_get("createdAt")?,
            })
        })
        .collect()
}

#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryStat {
    pub category_id: i64,
    pub name: String,
    pub total: i64,
    pub correct: i64,
}

#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DifficultyStat {
    pub difficulty_level: i64,
    pub total: i64,
    pub correct: i64,
}

pub async fn category_stats(
    pool: &SqlitePool,
    learner_id: &str,
) -> Result<Vec<CategoryStat>, sqlx::Error> {
    let rows = sqlx::query(
        r#"
        SELECT c."id" AS "categoryId", c."name",
               COUNT(a."id") AS "total",
               COALESCE(SUM(a."correct"), 0) AS "correct"
        FROM "attempt_logs" a
        JOIN "questions" q ON q."id" = a."questionId"
        JOIN "categories" c ON c."id" = q."categoryId"
        WHERE a."learnerId" = $1
        GROUP BY c."id", c."name"
        ORDER BY c."id" ASC
        "#,
    )
    .bind(learner_id)
    .fetch_all(pool)
    .await?;

    rows.iter()
        .map(|row| {
            Ok(CategoryStat {
                category_id: row.try_get("categoryId")?,
                name: row.try_get("name")?,
                total: row.try_get("total")?,
                correct: row.try_get("correct")?,
            })
        })
        .collect()
}

pub async fn difficulty_stats(
    pool: &SqlitePool,
    learner_id: &str,
) -> Result<Vec<DifficultyStat>, sqlx::Error> {
    let rows = sqlx::query(
        r#"
        SELECT q."difficultyLevel",
               COUNT(a."id") AS "total",
               COALESCE(SUM(a."correct"), 0) AS "correct"
        FROM "attempt_logs" a
        JOIN "questions" q ON q."id" = a."questionId"
        WHERE a."learnerId" = $1
        GROUP BY q."difficultyLevel"
        ORDER BY q."difficultyLevel" ASC
        "#,
    )
    .bind(learner_id)
    .fetch_all(pool)
    .await?;

    rows.iter()
        .map(|row| {
            Ok(DifficultyStat {
                difficulty_level: row.try_get("difficultyLevel")?,
                total: row.try_get("total")?,
                correct: row.try_get("correct")?,
            })
        })
        .collect()
}
