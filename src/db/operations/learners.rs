use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};

#[derive(Debug, Clone)]
pub struct LearnerRow {
    pub id: String,
    pub display_name: String,
    pub study_level: i64,
    pub created_at: DateTime<Utc>,
}

fn row_to_learner(row: &sqlx::sqlite::SqliteRow) -> Result<LearnerRow, sqlx::Error> {
    Ok(LearnerRow {
        id: row.try_get("id")?,
        display_name: row.try_get("displayName")?,
        study_level: row.try_get("studyLevel")?,
        created_at: row.try_get("createdAt")?,
    })
}

pub async fn insert(
    pool: &SqlitePool,
    id: &str,
    display_name: &str,
    study_level: i64,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO "learners" ("id", "displayName", "studyLevel", "createdAt")
        VALUES ($1, $2, $3, $4)
        "#,
    )
    .bind(id)
    .bind(display_name)
    .bind(study_level)
    .bind(Utc::now())
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn find_by_id(pool: &SqlitePool, id: &str) -> Result<Option<LearnerRow>, sqlx::Error> {
    let row = sqlx::query(
        r#"
        SELECT "id", "displayName", "studyLevel", "createdAt"
        FROM "learners"
        WHERE "id" = $1
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(row_to_learner).transpose()
}

pub async fn study_level(pool: &SqlitePool, id: &str) -> Result<Option<i64>, sqlx::Error> {
    sqlx::query_scalar(r#"SELECT "studyLevel" FROM "learners" WHERE "id" = $1"#)
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn update_study_level(
    pool: &SqlitePool,
    id: &str,
    level: i64,
) -> Result<(), sqlx::Error> {
    sqlx::query(r#"UPDATE "learners" SET "studyLevel" = $1 WHERE "id" = $2"#)
        .bind(level)
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}
