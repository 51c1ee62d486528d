use axum::{
    extract::{Multipart, State},
    Json,
};
use tracing::info;

use crate::errors::AppError;
use crate::extraction::{ExtractionResult, UploadedFile};
use crate::state::AppState;

/// POST /api/v1/resumes/extract
///
/// Accepts a multipart form with a single `file` field and returns the
/// extracted text plus metadata. Extraction is not a metered action, so no
/// entitlement check happens here.
pub async fn handle_extract(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<ExtractionResult>, AppError> {
    let mut file: Option<UploadedFile> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Malformed multipart body: {e}")))?
    {
        if field.name() == Some("file") {
            let name = field.file_name().unwrap_or("resume").to_string();
            let content_type = field.content_type().unwrap_or_default().to_string();
            let bytes = field
                .bytes()
                .await
                .map_err(|e| AppError::Validation(format!("Failed to read upload: {e}")))?;
            file = Some(UploadedFile {
                name,
                content_type,
                bytes,
            });
        }
    }

    let file = file.ok_or_else(|| {
        AppError::Validation("Multipart body must contain a `file` field".to_string())
    })?;

    info!(
        "extracting text from upload {} ({} bytes, {})",
        file.name,
        file.bytes.len(),
        file.content_type
    );

    // Decoding a 10 MiB document can take a while; keep it off the runtime's
    // async workers.
    let extractor = state.extractor.clone();
    let result = tokio::task::spawn_blocking(move || extractor.extract(&file))
        .await
        .map_err(|e| AppError::Internal(anyhow::anyhow!("extraction task failed: {e}")))??;

    Ok(Json(result))
}
