//! File upload endpoints.
//!
//! - POST /api/v1/upload/weather      (multipart `file`)
//! - POST /api/v1/upload/production   (multipart `file`)
//! - POST /api/v1/upload/images       (multipart `images`, optional `panel_id`)

use axum::extract::{Multipart, State};
use axum::http::HeaderMap;
use axum::Json;
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::db::queries::{self, NewPanelImage};
use crate::errors::{AppError, ErrorResponse};
use crate::routes::auth::optional_user;
use crate::routes::AppState;
use crate::services::ingest;

/// Result of a tabular upload.
#[derive(Debug, Serialize, ToSchema)]
pub struct UploadResponse {
    pub message: String,
    pub count: usize,
    /// Uppercased file extension of the upload
    pub file_type: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UploadedImage {
    pub filename: String,
    pub file_path: String,
    pub panel_id: Option<String>,
    pub uploaded_by: Option<Uuid>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ImageUploadResponse {
    pub message: String,
    pub files: Vec<UploadedImage>,
}

fn file_type_label(filename: &str) -> String {
    filename
        .rsplit('.')
        .next()
        .unwrap_or_default()
        .to_uppercase()
}

/// Pull the uploaded file out of a multipart body.
async fn read_file_field(multipart: &mut Multipart) -> Result<(String, Vec<u8>), AppError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Malformed multipart body: {}", e)))?
    {
        let is_file = field.name() == Some("file") || field.file_name().is_some();
        if !is_file {
            continue;
        }
        let filename = field
            .file_name()
            .map(str::to_string)
            .ok_or_else(|| {
                AppError::Validation("Uploaded file must have a filename".to_string())
            })?;
        let bytes = field
            .bytes()
            .await
            .map_err(|e| AppError::Validation(format!("Failed to read upload: {}", e)))?;
        return Ok((filename, bytes.to_vec()));
    }

    Err(AppError::Validation(
        "No file provided. Please upload a file (CSV, XLSX, or PDF)".to_string(),
    ))
}

/// Upload a weather data file.
#[utoipa::path(
    post,
    path = "/api/v1/upload/weather",
    tag = "Uploads",
    responses(
        (status = 200, description = "Records imported", body = UploadResponse),
        (status = 400, description = "Validation or parse failure", body = ErrorResponse),
    )
)]
pub async fn upload_weather(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, AppError> {
    let (filename, bytes) = read_file_field(&mut multipart).await?;

    let records = ingest::ingest_weather(&filename, &bytes)?;
    if records.is_empty() {
        return Err(AppError::Validation(
            "No data extracted from file. The file appears to be empty or could not be parsed"
                .to_string(),
        ));
    }

    let count = queries::insert_weather_batch(&state.pool, &records).await? as usize;
    tracing::info!("Imported {} weather records from '{}'", count, filename);

    Ok(Json(UploadResponse {
        message: format!("Successfully uploaded {} weather records", count),
        count,
        file_type: file_type_label(&filename),
    }))
}

/// Upload a production data file.
#[utoipa::path(
    post,
    path = "/api/v1/upload/production",
    tag = "Uploads",
    responses(
        (status = 200, description = "Records imported", body = UploadResponse),
        (status = 400, description = "Validation or parse failure", body = ErrorResponse),
    )
)]
pub async fn upload_production(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, AppError> {
    let (filename, bytes) = read_file_field(&mut multipart).await?;

    let records = ingest::ingest_production(&filename, &bytes)?;
    if records.is_empty() {
        return Err(AppError::Validation(
            "No data extracted from file. The file appears to be empty or could not be parsed"
                .to_string(),
        ));
    }

    let count = queries::insert_production_batch(&state.pool, &records).await? as usize;
    tracing::info!("Imported {} production records from '{}'", count, filename);

    Ok(Json(UploadResponse {
        message: format!("Successfully uploaded {} production records", count),
        count,
        file_type: file_type_label(&filename),
    }))
}

/// Upload solar panel images.
///
/// Each image must decode as a real image. When a bearer token is present
/// it must verify; the verified user is recorded as the uploader.
#[utoipa::path(
    post,
    path = "/api/v1/upload/images",
    tag = "Uploads",
    responses(
        (status = 200, description = "Images stored", body = ImageUploadResponse),
        (status = 400, description = "No or invalid images", body = ErrorResponse),
        (status = 401, description = "Unverifiable bearer token", body = ErrorResponse),
    )
)]
pub async fn upload_images(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<Json<ImageUploadResponse>, AppError> {
    let user = optional_user(&headers, &state.auth).await?;

    let mut files: Vec<(String, Vec<u8>)> = Vec::new();
    let mut panel_id: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Malformed multipart body: {}", e)))?
    {
        let field_name = field.name().map(str::to_string);
        if let Some(filename) = field.file_name().map(str::to_string) {
            let bytes = field
                .bytes()
                .await
                .map_err(|e| AppError::Validation(format!("Failed to read upload: {}", e)))?;
            files.push((filename, bytes.to_vec()));
        } else if field_name.as_deref() == Some("panel_id") {
            let text = field
                .text()
                .await
                .map_err(|e| AppError::Validation(format!("Failed to read panel_id: {}", e)))?;
            if !text.trim().is_empty() {
                panel_id = Some(text.trim().to_string());
            }
        }
    }

    if files.is_empty() {
        return Err(AppError::Validation("No images provided".to_string()));
    }

    let image_dir = state.media_root.join("images");
    let mut uploaded = Vec::with_capacity(files.len());
    for (filename, bytes) in &files {
        let file_path = ingest::save_image(&image_dir, filename, bytes)?;
        let row = queries::insert_panel_image(
            &state.pool,
            NewPanelImage {
                filename: filename.clone(),
                file_path,
                panel_id: panel_id.clone(),
                uploaded_by: user.as_ref().map(|u| u.id),
            },
        )
        .await?;
        uploaded.push(UploadedImage {
            filename: row.filename,
            file_path: row.file_path,
            panel_id: row.panel_id,
            uploaded_by: row.uploaded_by,
        });
    }

    Ok(Json(ImageUploadResponse {
        message: format!("Successfully uploaded {} images", uploaded.len()),
        files: uploaded,
    }))
}
