use sqlx::types::Json;
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::resume::{ResumeChanges, ResumeCreate, ResumeRow};

/// Inserts a new resume and returns the stored row.
pub async fn create_resume(pool: &PgPool, new: ResumeCreate) -> Result<ResumeRow, AppError> {
    let row: ResumeRow = sqlx::query_as(
        r#"
        INSERT INTO resumes
            (id, user_id, title, content, file_type, file_path, file_url,
             original_filename, analysis)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(&new.user_id)
    .bind(&new.title)
    .bind(&new.content)
    .bind(&new.file_type)
    .bind(&new.file_path)
    .bind(&new.file_url)
    .bind(&new.original_filename)
    .bind(new.analysis.map(Json))
    .fetch_one(pool)
    .await?;

    info!("Created resume {} for user {}", row.id, row.user_id);
    Ok(row)
}

pub async fn get_resume(
    pool: &PgPool,
    id: Uuid,
    user_id: &str,
) -> Result<Option<ResumeRow>, AppError> {
    let row = sqlx::query_as("SELECT * FROM resumes WHERE id = $1 AND user_id = $2")
        .bind(id)
        .bind(user_id)
        .fetch_optional(pool)
        .await?;
    Ok(row)
}

/// Same as `get_resume` but absent rows become `NotFound`.
pub async fn require_resume(pool: &PgPool, id: Uuid, user_id: &str) -> Result<ResumeRow, AppError> {
    get_resume(pool, id, user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Resume not found".to_string()))
}

/// The user's resumes, newest first.
pub async fn list_user_resumes(pool: &PgPool, user_id: &str) -> Result<Vec<ResumeRow>, AppError> {
    let rows = sqlx::query_as("SELECT * FROM resumes WHERE user_id = $1 ORDER BY created_at DESC")
        .bind(user_id)
        .fetch_all(pool)
        .await?;
    Ok(rows)
}

/// Applies the non-empty fields of `changes` and bumps `updated_at`.
pub async fn update_resume(
    pool: &PgPool,
    id: Uuid,
    user_id: &str,
    changes: ResumeChanges,
) -> Result<Option<ResumeRow>, AppError> {
    let row = sqlx::query_as(
        r#"
        UPDATE resumes SET
            title             = COALESCE($3, title),
            content           = COALESCE($4, content),
            file_type         = COALESCE($5, file_type),
            optimized_content = COALESCE($6, optimized_content),
            analysis          = COALESCE($7, analysis),
            updated_at        = NOW()
        WHERE id = $1 AND user_id = $2
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(user_id)
    .bind(changes.title)
    .bind(changes.content)
    .bind(changes.file_type)
    .bind(changes.optimized_content)
    .bind(changes.analysis.map(Json))
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

/// Returns whether a row was removed.
pub async fn delete_resume(pool: &PgPool, id: Uuid, user_id: &str) -> Result<bool, AppError> {
    let result = sqlx::query("DELETE FROM resumes WHERE id = $1 AND user_id = $2")
        .bind(id)
        .bind(user_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}
