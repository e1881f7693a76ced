use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};

use crate::engine::types::{RequestStatus, ScoredItem, StrategyKind};

#[derive(Debug, Clone)]
pub struct RequestRow {
    pub id: String,
    pub learner_id: String,
    pub strategy: StrategyKind,
    pub status: RequestStatus,
    pub created_at: DateTime<Utc>,
}

/// Result of the guarded completion write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompleteOutcome {
    /// This caller won the status CAS and persisted the list.
    Persisted,
    /// Another caller already flipped the request; nothing was written.
    AlreadyCompleted,
}

fn row_to_request(row: &sqlx::sqlite::SqliteRow) -> Result<RequestRow, sqlx::Error> {
    let strategy: String = row.try_get("strategy")?;
    let status: String = row.try_get("status")?;

    Ok(RequestRow {
        id: row.try_get("id")?,
        learner_id: row.try_get("learnerId")?,
        strategy: StrategyKind::parse(&strategy)
            .ok_or_else(|| sqlx::Error::Decode(format!("unknown strategy: {strategy}").into()))?,
        status: RequestStatus::parse(&status)
            .ok_or_else(|| sqlx::Error::Decode(format!("unknown status: {status}").into()))?,
        created_at: row.try_get("createdAt")?,
    })
}

pub async fn insert_request(
    pool: &SqlitePool,
    id: &str,
    learner_id: &str,
    strategy: StrategyKind,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO "recommendation_requests" ("id", "learnerId", "strategy", "status", "createdAt")
        VALUES ($1, $2, $3, 'pending', $4)
        "#,
    )
    .bind(id)
    .bind(learner_id)
    .bind(strategy.as_str())
    .bind(Utc::now())
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn find_request(
    pool: &SqlitePool,
    id: &str,
) -> Result<Option<RequestRow>, sqlx::Error> {
    let row = sqlx::query(
        r#"
        SELECT "id", "learnerId", "strategy", "status", "createdAt"
        FROM "recommendation_requests"
        WHERE "id" = $1
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(row_to_request).transpose()
}

pub async fn list_for_learner(
    pool: &SqlitePool,
    learner_id: &str,
    limit: i64,
    offset: i64,
) -> Result<Vec<RequestRow>, sqlx::Error> {
    let rows = sqlx::query(
        r#"
        SELECT "id", "learnerId", "strategy", "status", "createdAt"
        FROM "recommendation_requests"
        WHERE "learnerId" = $1
        ORDER BY "createdAt" DESC, "id" DESC
        LIMIT $2 OFFSET $3
        "#,
    )
    .bind(learner_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    rows.iter().map(row_to_request).collect()
}

/// Atomically flips the request pending→completed and persists the ranked
/// list. The UPDATE is predicated on the current status, so exactly one
/// caller ever persists; everyone else observes `AlreadyCompleted` and can
/// read the winner's rows.
pub async fn complete_request(
    pool: &SqlitePool,
    id: &str,
    ranked: &[ScoredItem],
) -> Result<CompleteOutcome, sqlx::Error> {
    let mut tx = pool.begin().await?;

    let updated = sqlx::query(
        r#"
        UPDATE "recommendation_requests"
        SET "status" = 'completed'
        WHERE "id" = $1 AND "status" = 'pending'
        "#,
    )
    .bind(id)
    .execute(&mut *tx)
    .await?;

    if updated.rows_affected() == 0 {
        tx.rollback().await?;
        return Ok(CompleteOutcome::AlreadyCompleted);
    }

    for (rank, item) in ranked.iter().enumerate() {
        sqlx::query(
            r#"
            INSERT INTO "recommendation_items" ("requestId", "questionId", "rank")
            VALUES ($1, $2, $3)
            "#,
        )
        .bind(id)
        .bind(item.question_id)
        .bind(rank as i64)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(CompleteOutcome::Persisted)
}

/// Persisted item ids for a request, ordered by rank.
pub async fn list_items(pool: &SqlitePool, request_id: &str) -> Result<Vec<i64>, sqlx::Error> {
    sqlx::query_scalar(
        r#"
        SELECT "questionId"
        FROM "recommendation_items"
        WHERE "requestId" = $1
        ORDER BY "rank" ASC
        "#,
    )
    .bind(request_id)
    .fetch_all(pool)
    .await
}
