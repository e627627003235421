use axum::{
    body::Body,
    extract::{Multipart, Path, State},
    http::{header, StatusCode},
    response::Response,
    Json,
};
use shared::UploadResponse;
use std::sync::Arc;

use crate::error::{AppError, AppResult};
use crate::uploads;
use crate::AppState;

use super::AuthUser;

/// Reads the `file` field of a multipart body, enforces the size limit and
/// stores it. Returns the public path.
pub(crate) async fn store_image_field(
    state: &AppState,
    multipart: &mut Multipart,
) -> AppResult<String> {
    let max = state.config.max_upload_bytes;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::validation(format!("Invalid multipart body: {e}")))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let bytes = field
            .bytes()
            .await
            .map_err(|e| AppError::validation(format!("Failed to read upload: {e}")))?;

        if bytes.is_empty() {
            return Err(AppError::validation("Uploaded file is empty"));
        }
        if bytes.len() > max {
            return Err(AppError::validation(format!(
                "File exceeds the {max} byte limit"
            )));
        }
        let extension = uploads::sniff_image(&bytes)
            .ok_or_else(|| AppError::validation("Only PNG, JPEG, GIF and WebP images are accepted"))?;

        let path = uploads::store(&state.config.upload_dir, extension, &bytes)
            .await
            .map_err(|e| AppError::internal(format!("Failed to store upload: {e}")))?;
        tracing::info!(path = %path, size = bytes.len(), "stored upload");
        return Ok(path);
    }

    Err(AppError::validation("Missing 'file' field"))
}

pub async fn upload(
    State(state): State<Arc<AppState>>,
    _auth: AuthUser,
    mut multipart: Multipart,
) -> AppResult<(StatusCode, Json<UploadResponse>)> {
    let path = store_image_field(&state, &mut multipart).await?;
    Ok((StatusCode::CREATED, Json(UploadResponse { path })))
}

pub async fn serve(
    State(state): State<Arc<AppState>>,
    Path(path): Path<String>,
    _auth: AuthUser,
) -> AppResult<Response> {
    let file = uploads::resolve(&state.config.upload_dir, &path)
        .ok_or_else(|| AppError::validation("Invalid image path"))?;

    let data = match tokio::fs::read(&file).await {
        Ok(d) => d,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(AppError::not_found(format!("Image {} not found", path)))
        }
        Err(e) => return Err(AppError::internal(format!("Failed to read image: {e}"))),
    };

    let mime = mime_guess::from_path(&file).first_or_octet_stream();
    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, mime.as_ref())
        .header(header::CACHE_CONTROL, "private, max-age=86400")
        .body(Body::from(data))
        .map_err(|e| AppError::internal(e.to_string()))
}
