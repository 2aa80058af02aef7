use std::future::Future;

use axum::{
    extract::{Multipart, Path, State},
    http::header,
    response::IntoResponse,
    Json,
};
use bytes::Bytes;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{info, warn};
use uuid::Uuid;

use crate::auth::{CurrentUser, PremiumUser};
use crate::errors::AppError;
use crate::models::resume::{
    JobDescription, Resume, ResumeChanges, ResumeCreate, ResumeOptimizationRequest, ResumeUpdate,
};
use crate::optimizer::extract::{extract_text, FileType};
use crate::optimizer::sections::{classify_sections, SectionMap};
use crate::resumes::repository;
use crate::state::AppState;
use crate::storage::{object_key, BlobStore};

struct UploadForm {
    filename: String,
    data: Bytes,
    job_description: Option<JobDescription>,
}

async fn read_upload_form(mut multipart: Multipart) -> Result<UploadForm, AppError> {
    let mut file: Option<(String, Bytes)> = None;
    let mut jd_raw: Option<String> = None;

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                let filename = field.file_name().unwrap_or_default().to_string();
                let data = field.bytes().await?;
                file = Some((filename, data));
            }
            "job_description" => jd_raw = Some(field.text().await?),
            _ => {}
        }
    }

    let (filename, data) =
        file.ok_or_else(|| AppError::Validation("Missing file field".to_string()))?;

    let job_description = match jd_raw.as_deref().map(str::trim) {
        Some(raw) if !raw.is_empty() => Some(
            serde_json::from_str::<JobDescription>(raw)
                .map_err(|e| AppError::Validation(format!("Invalid job description: {e}")))?,
        ),
        _ => None,
    };

    Ok(UploadForm {
        filename,
        data,
        job_description,
    })
}

async fn extract_in_background(data: Bytes, file_type: FileType) -> Result<String, AppError> {
    let text = tokio::task::spawn_blocking(move || extract_text(&data, file_type))
        .await
        .map_err(anyhow::Error::from)??;

    if text.trim().is_empty() {
        return Err(AppError::UnprocessableEntity(
            "No text could be extracted from the document".to_string(),
        ));
    }
    Ok(text)
}

/// Uploads are refused once the user is at or over the quota.
fn check_quota(used: u64, quota: u64) -> Result<(), AppError> {
    if used >= quota {
        return Err(AppError::Validation("Storage quota exceeded".to_string()));
    }
    Ok(())
}

/// Removes the stored object, then awaits `delete_row`. A failed object delete leaves the
/// row in place.
async fn delete_object_then_row<F>(
    storage: &dyn BlobStore,
    key: Option<&str>,
    delete_row: F,
) -> Result<bool, AppError>
where
    F: Future<Output = Result<bool, AppError>>,
{
    if let Some(key) = key {
        storage.delete(key).await?;
    }
    delete_row.await
}

async fn read_stored_file(storage: &dyn BlobStore, key: Option<&str>) -> Result<Bytes, AppError> {
    let key = key.ok_or_else(|| AppError::NotFound("Resume has no stored file".to_string()))?;
    storage.download(key).await
}

/// POST /api/v1/resumes/upload
pub async fn handle_upload(
    State(state): State<AppState>,
    user: CurrentUser,
    multipart: Multipart,
) -> Result<Json<Resume>, AppError> {
    let form = read_upload_form(multipart).await?;

    let file_type = FileType::from_filename(&form.filename)?;

    if form.data.len() > state.config.max_upload_size {
        return Err(AppError::PayloadTooLarge(format!(
            "File exceeds the {} byte limit",
            state.config.max_upload_size
        )));
    }

    let used = state.storage.usage(&user.user_id).await?;
    if let Err(e) = check_quota(used, state.config.storage_quota_bytes) {
        warn!("User {} is at {used} bytes of storage", user.user_id);
        return Err(e);
    }

    let key = object_key(&user.user_id, Uuid::new_v4(), file_type);
    let file_url = state
        .storage
        .upload(&key, form.data.clone(), file_type.content_type())
        .await?;

    let stored = async {
        let content = extract_in_background(form.data, file_type).await?;
        let jd_text = form.job_description.as_ref().map(JobDescription::to_prompt_text);
        let analysis = state
            .optimizer
            .analyze_resume(&content, jd_text.as_deref())
            .await?;

        repository::create_resume(
            &state.db,
            ResumeCreate {
                user_id: user.user_id.clone(),
                title: form.filename.clone(),
                content,
                file_type: file_type.to_string(),
                file_path: key.clone(),
                file_url,
                original_filename: form.filename.clone(),
                analysis: Some(analysis),
            },
        )
        .await
    }
    .await;

    match stored {
        Ok(row) => Ok(Json(row.into())),
        Err(e) => {
            // The row never landed, so the object would be unreachable.
            if let Err(cleanup) = state.storage.delete(&key).await {
                warn!("Could not remove orphaned upload {key}: {cleanup}");
            }
            Err(e)
        }
    }
}

/// GET /api/v1/resumes
pub async fn handle_list(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Json<Vec<Resume>>, AppError> {
    let rows = repository::list_user_resumes(&state.db, &user.user_id).await?;
    Ok(Json(rows.into_iter().map(Resume::from).collect()))
}

/// GET /api/v1/resumes/:id
pub async fn handle_get(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Resume>, AppError> {
    let row = repository::require_resume(&state.db, id, &user.user_id).await?;
    Ok(Json(row.into()))
}

/// PUT /api/v1/resumes/:id
pub async fn handle_update(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
    Json(update): Json<ResumeUpdate>,
) -> Result<Json<Resume>, AppError> {
    let existing = repository::require_resume(&state.db, id, &user.user_id).await?;

    let mut changes = ResumeChanges::from(update);
    if let Some(content) = changes.content.as_deref() {
        if content != existing.content {
            info!("Content of resume {id} changed, re-analyzing");
            changes.analysis = Some(state.optimizer.analyze_resume(content, None).await?);
        }
    }

    let row = repository::update_resume(&state.db, id, &user.user_id, changes)
        .await?
        .ok_or_else(|| AppError::NotFound("Resume not found".to_string()))?;
    Ok(Json(row.into()))
}

/// POST /api/v1/resumes/:id/optimize
pub async fn handle_optimize(
    State(state): State<AppState>,
    PremiumUser(user): PremiumUser,
    Path(id): Path<Uuid>,
    Json(req): Json<ResumeOptimizationRequest>,
) -> Result<Json<Resume>, AppError> {
    if req.resume_id != id {
        return Err(AppError::Validation(
            "resume_id does not match the resume in the path".to_string(),
        ));
    }

    let existing = repository::require_resume(&state.db, id, &user.user_id).await?;
    info!(
        "Optimizing resume {id} ({} level) for user {}",
        req.optimization_level, user.user_id
    );

    let jd = req.job_description.as_ref();
    let jd_text = jd.map(JobDescription::to_prompt_text);
    let analysis = state
        .optimizer
        .analyze_resume(&existing.content, jd_text.as_deref())
        .await?;

    let sections = classify_sections(&existing.content);
    if sections.is_empty() {
        warn!("Resume {id} has no recognized section headers");
    }
    let optimized = state
        .optimizer
        .generate_optimized_resume(&sections, jd.map(|j| j.title.as_str()))
        .await?;

    let changes = ResumeChanges {
        content: Some(optimized.clone()),
        optimized_content: Some(optimized),
        analysis: Some(analysis),
        ..Default::default()
    };
    let row = repository::update_resume(&state.db, id, &user.user_id, changes)
        .await?
        .ok_or_else(|| AppError::NotFound("Resume not found".to_string()))?;
    Ok(Json(row.into()))
}

/// GET /api/v1/resumes/:id/sections
pub async fn handle_sections(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<SectionMap>, AppError> {
    let row = repository::require_resume(&state.db, id, &user.user_id).await?;
    Ok(Json(classify_sections(&row.content)))
}

#[derive(Debug, Default, Deserialize)]
pub struct SectionOptimizeRequest {
    #[serde(default)]
    pub job_title: Option<String>,
}

/// POST /api/v1/resumes/:id/sections/optimize
pub async fn handle_optimize_sections(
    State(state): State<AppState>,
    PremiumUser(user): PremiumUser,
    Path(id): Path<Uuid>,
    Json(req): Json<SectionOptimizeRequest>,
) -> Result<Json<SectionMap>, AppError> {
    let row = repository::require_resume(&state.db, id, &user.user_id).await?;
    let sections = classify_sections(&row.content);
    let optimized = state
        .optimizer
        .optimize_sections(&sections, req.job_title.as_deref())
        .await;
    Ok(Json(optimized))
}

/// GET /api/v1/resumes/:id/file
pub async fn handle_download(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let row = repository::require_resume(&state.db, id, &user.user_id).await?;
    let data = read_stored_file(state.storage.as_ref(), row.file_path.as_deref()).await?;

    let content_type = FileType::from_extension(&row.file_type)
        .map(FileType::content_type)
        .unwrap_or("application/octet-stream");
    let filename = row
        .original_filename
        .unwrap_or_else(|| format!("{id}.{}", row.file_type))
        .replace('"', "");

    Ok((
        [
            (header::CONTENT_TYPE, content_type.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{filename}\""),
            ),
        ],
        data,
    ))
}

/// DELETE /api/v1/resumes/:id
pub async fn handle_delete(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let row = repository::require_resume(&state.db, id, &user.user_id).await?;

    let removed = delete_object_then_row(
        state.storage.as_ref(),
        row.file_path.as_deref(),
        repository::delete_resume(&state.db, id, &user.user_id),
    )
    .await?;
    if !removed {
        return Err(AppError::NotFound("Resume not found".to_string()));
    }

    info!("Deleted resume {id} for user {}", user.user_id);
    Ok(Json(json!({ "message": "Resume deleted successfully" })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    use crate::storage::tests::MemoryStore;

    #[test]
    fn test_quota_is_exceeded_at_the_limit() {
        assert!(check_quota(0, 100).is_ok());
        assert!(check_quota(99, 100).is_ok());
        for used in [100, 101] {
            let err = check_quota(used, 100).unwrap_err();
            assert!(matches!(err, AppError::Validation(ref m) if m == "Storage quota exceeded"));
        }
    }

    #[tokio::test]
    async fn test_delete_removes_object_before_row() {
        let store = MemoryStore::default();
        store.insert("user_1/a.pdf", b"%PDF");

        let removed = delete_object_then_row(&store, Some("user_1/a.pdf"), async {
            assert!(!store.contains("user_1/a.pdf"));
            Ok(true)
        })
        .await
        .unwrap();

        assert!(removed);
        assert_eq!(store.log(), vec!["delete user_1/a.pdf".to_string()]);
    }

    #[tokio::test]
    async fn test_failed_object_delete_keeps_row() {
        let store = MemoryStore::default();
        store.insert("user_1/a.pdf", b"%PDF");
        store.fail_deletes.store(true, Ordering::SeqCst);
        let row_deleted = AtomicBool::new(false);

        let result = delete_object_then_row(&store, Some("user_1/a.pdf"), async {
            row_deleted.store(true, Ordering::SeqCst);
            Ok(true)
        })
        .await;

        assert!(matches!(result, Err(AppError::S3(_))));
        assert!(!row_deleted.load(Ordering::SeqCst));
        assert!(store.contains("user_1/a.pdf"));
    }

    #[tokio::test]
    async fn test_delete_without_stored_file_only_deletes_row() {
        let store = MemoryStore::default();
        let removed = delete_object_then_row(&store, None, async { Ok(false) })
            .await
            .unwrap();
        assert!(!removed);
        assert!(store.log().is_empty());
    }

    #[tokio::test]
    async fn test_read_stored_file() {
        let store = MemoryStore::default();
        store.insert("user_1/a.docx", b"PK docx");

        let data = read_stored_file(&store, Some("user_1/a.docx")).await.unwrap();
        assert_eq!(&data[..], b"PK docx");

        let err = read_stored_file(&store, Some("user_1/missing.pdf")).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
        let err = read_stored_file(&store, None).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }
}
