use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};

use crate::engine::types::CatalogItem;

#[derive(Debug, Clone)]
pub struct QuestionRow {
    pub id: i64,
    pub category_id: i64,
    pub prompt: String,
    pub answer: String,
    pub explanation: String,
    pub difficulty_level: i64,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CategoryRow {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub question_count: i64,
}

#[derive(Debug, Clone, Default)]
pub struct QuestionFilter {
    pub category_id: Option<i64>,
    pub difficulty_level: Option<i64>,
    pub limit: i64,
    pub offset: i64,
}

#[derive(Debug, Clone)]
pub struct NewQuestion {
    pub category_id: i64,
    pub prompt: String,
    pub answer: String,
    pub explanation: String,
    pub difficulty_level: i64,
}

#[derive(Debug, Clone, Default)]
pub struct QuestionPatch {
    pub category_id: Option<i64>,
    pub prompt: Option<String>,
    pub answer: Option<String>,
    pub explanation: Option<String>,
    pub difficulty_level: Option<i64>,
    pub is_active: Option<bool>,
}

fn row_to_question(row: &sqlx::sqlite::SqliteRow) -> Result<QuestionRow, sqlx::Error> {
    Ok(QuestionRow {
        id: row.try_get("id")?,
        category_id: row.try_get("categoryId")?,
        prompt: row.try_get("prompt")?,
        answer: row.try_get("answer")?,
        explanation: row.try_get("explanation")?,
        difficulty_level: row.try_get("difficultyLevel")?,
        is_active: row.try_get::<i64, _>("isActive")? != 0,
        created_at: row.try_get("createdAt")?,
    })
}

const QUESTION_COLUMNS: &str = r#""id", "categoryId", "prompt", "answer", "explanation", "difficultyLevel", "isActive", "createdAt""#;

/// Active items with the metadata the ranking engines need.
pub async fn active_items(pool: &SqlitePool) -> Result<Vec<CatalogItem>, sqlx::Error> {
    let rows = sqlx::query(
        r#"
        SELECT "id", "categoryId", "difficultyLevel"
        FROM "questions"
        WHERE "isActive" = 1
        ORDER BY "id" ASC
        "#,
    )
    .fetch_all(pool)
    .await?;

    rows.iter()
        .map(|row| {
            Ok(CatalogItem {
                id: row.try_get("id")?,
                category_id: row.try_get("categoryId")?,
                difficulty: row.try_get("difficultyLevel")?,
            })
        })
        .collect()
}

/// Highest item id ever issued; the sequence model sizes its embedding
/// table from this so every historical id maps to a row.
pub async fn max_question_id(pool: &SqlitePool) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar(r#"SELECT COALESCE(MAX("id"), 0) FROM "questions""#)
        .fetch_one(pool)
        .await
}

pub async fn list_questions(
    pool: &SqlitePool,
    filter: &QuestionFilter,
) -> Result<(Vec<QuestionRow>, i64), sqlx::Error> {
    let mut where_clauses: Vec<String> = Vec::new();
    if filter.category_id.is_some() {
        where_clauses.push(r#""categoryId" = $1"#.to_string());
    }
    if filter.difficulty_level.is_some() {
        where_clauses.push(format!(
            r#""difficultyLevel" = ${}"#,
            where_clauses.len() + 1
        ));
    }
    let where_sql = if where_clauses.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", where_clauses.join(" AND "))
    };

    let count_sql = format!(r#"SELECT COUNT(*) FROM "questions" {where_sql}"#);
    let mut count_query = sqlx::query_scalar::<_, i64>(&count_sql);
    if let Some(category_id) = filter.category_id {
        count_query = count_query.bind(category_id);
    }
    if let Some(difficulty) = filter.difficulty_level {
        count_query = count_query.bind(difficulty);
    }
    let total = count_query.fetch_one(pool).await?;

    let list_sql = format!(
        r#"SELECT {QUESTION_COLUMNS} FROM "questions" {where_sql} ORDER BY "id" ASC LIMIT {} OFFSET {}"#,
        filter.limit.max(1),
        filter.offset.max(0),
    );
    let mut list_query = sqlx::query(&list_sql);
    if let Some(category_id) = filter.category_id {
        list_query = list_query.bind(category_id);
    }
    if let Some(difficulty) = filter.difficulty_level {
        list_query = list_query.bind(difficulty);
    }
    let rows = list_query.fetch_all(pool).await?;

    let questions = rows
        .iter()
        .map(row_to_question)
        .collect::<Result<Vec<_>, _>>()?;
    Ok((questions, total))
}

pub async fn find_question(
    pool: &SqlitePool,
    id: i64,
) -> Result<Option<QuestionRow>, sqlx::Error> {
    let sql = format!(r#"SELECT {QUESTION_COLUMNS} FROM "questions" WHERE "id" = $1"#);
    let row = sqlx::query(&sql).bind(id).fetch_optional(pool).await?;
    row.as_ref().map(row_to_question).transpose()
}

pub async fn insert_question(pool: &SqlitePool, new: &NewQuestion) -> Result<i64, sqlx::Error> {
    let result = sqlx::query(
        r#"
        INSERT INTO "questions"
          ("categoryId", "prompt", "answer", "explanation", "difficultyLevel", "isActive", "createdAt")
        VALUES ($1, $2, $3, $4, $5, 1, $6)
        "#,
    )
    .bind(new.category_id)
    .bind(&new.prompt)
    .bind(&new.answer)
    .bind(&new.explanation)
    .bind(new.difficulty_level)
    .bind(Utc::now())
    .execute(pool)
    .await?;

    Ok(result.last_insert_rowid())
}

pub async fn insert_questions_batch(
    pool: &SqlitePool,
    items: &[NewQuestion],
) -> Result<Vec<i64>, sqlx::Error> {
    let mut tx = pool.begin().await?;
    let now = Utc::now();
    let mut ids = Vec::with_capacity(items.len());

    for item in items {
        let result = sqlx::query(
            r#"
            INSERT INTO "questions"
              ("categoryId", "prompt", "answer", "explanation", "difficultyLevel", "isActive", "createdAt")
            VALUES ($1, $2, $3, $4, $5, 1, $6)
            "#,
        )
        .bind(item.category_id)
        .bind(&item.prompt)
        .bind(&item.answer)
        .bind(&item.explanation)
        .bind(item.difficulty_level)
        .bind(now)
        .execute(&mut *tx)
        .await?;
        ids.push(result.last_insert_rowid());
    }

    tx.commit().await?;
    Ok(ids)
}

pub async fn update_question(
    pool: &SqlitePool,
    id: i64,
    patch: &QuestionPatch,
) -> Result<bool, sqlx::Error> {
    let Some(existing) = find_question(pool, id).await? else {
        return Ok(false);
    };

    let result = sqlx::query(
        r#"
        UPDATE "questions"
        SET "categoryId" = $1, "prompt" = $2, "answer" = $3,
            "explanation" = $4, "difficultyLevel" = $5, "isActive" = $6
        WHERE "id" = $7
        "#,
    )
    .bind(patch.category_id.unwrap_or(existing.category_id))
    .bind(patch.prompt.as_deref().unwrap_or(&existing.prompt))
    .bind(patch.answer.as_deref().unwrap_or(&existing.answer))
    .bind(patch.explanation.as_deref().unwrap_or(&existing.explanation))
    .bind(patch.difficulty_level.unwrap_or(existing.difficulty_level))
    .bind(patch.is_active.unwrap_or(existing.is_active) as i64)
    .bind(id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Soft delete: attempt logs and persisted recommendations keep pointing at
/// the row, it just stops being a candidate.
pub async fn deactivate_question(pool: &SqlitePool, id: i64) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(r#"UPDATE "questions" SET "isActive" = 0 WHERE "id" = $1"#)
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn list_categories(pool: &SqlitePool) -> Result<Vec<CategoryRow>, sqlx::Error> {
    let rows = sqlx::query(
        r#"
        SELECT c."id", c."name", c."description", COUNT(q."id") AS "questionCount"
        FROM "categories" c
        LEFT JOIN "questions" q ON q."categoryId" = c."id"
        GROUP BY c."id", c."name", c."description"
        ORDER BY c."id" ASC
        "#,
    )
    .fetch_all(pool)
    .await?;

    rows.iter()
        .map(|row| {
            Ok(CategoryRow {
                id: row.try_get("id")?,
                name: row.try_get("name")?,
                description: row.try_get("description")?,
                question_count: row.try_get("questionCount")?,
            })
        })
        .collect()
}

pub async fn find_category(
    pool: &SqlitePool,
    id: i64,
) -> Result<Option<CategoryRow>, sqlx::Error> {
    let row = sqlx::query(
        r#"
        SELECT c."id", c."name", c."description", COUNT(q."id") AS "questionCount"
        FROM "categories" c
        LEFT JOIN "questions" q ON q."categoryId" = c."id"
        WHERE c."id" = $1
        GROUP BY c."id", c."name", c."description"
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    row.map(|row| {
        Ok(CategoryRow {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            description: row.try_get("description")?,
            question_count: row.try_get("questionCount")?,
        })
    })
    .transpose()
}

pub async fn insert_category(
    pool: &SqlitePool,
    name: &str,
    description: &str,
) -> Result<i64, sqlx::Error> {
    let result = sqlx::query(
        r#"INSERT INTO "categories" ("name", "description", "createdAt") VALUES ($1, $2, $3)"#,
    )
    .bind(name)
    .bind(description)
    .bind(Utc::now())
    .execute(pool)
    .await?;
    Ok(result.last_insert_rowid())
}

pub async fn category_exists(pool: &SqlitePool, id: i64) -> Result<bool, sqlx::Error> {
    let found: Option<i64> = sqlx::query_scalar(r#"SELECT "id" FROM "categories" WHERE "id" = $1"#)
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(found.is_some())
}
