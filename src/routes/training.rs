//! Model training endpoints.
//!
//! - POST /api/v1/training
//! - GET  /api/v1/training/status
//!
//! Training runs inline in the triggering request; the job row records
//! the pending → running → completed/failed transitions so a background
//! executor is a drop-in change.

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::db::models::TrainingJob;
use crate::db::queries;
use crate::errors::{AppError, ErrorResponse};
use crate::routes::AppState;
use crate::services::trainer::{self, TrainingOutcome};

#[derive(Debug, Deserialize, ToSchema)]
pub struct TrainingRequest {
    /// Model type to train (default "regression")
    pub model_type: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TrainingResponse {
    pub message: String,
    pub job_id: Uuid,
    pub results: TrainingOutcome,
}

/// Start a training job.
#[utoipa::path(
    post,
    path = "/api/v1/training",
    tag = "Training",
    request_body = TrainingRequest,
    responses(
        (status = 200, description = "Training completed", body = TrainingResponse),
        (status = 500, description = "Training failed", body = ErrorResponse),
    )
)]
pub async fn start_training(
    State(state): State<AppState>,
    body: Option<Json<TrainingRequest>>,
) -> Result<Json<TrainingResponse>, AppError> {
    let model_type = body
        .and_then(|Json(req)| req.model_type)
        .unwrap_or_else(|| "regression".to_string());

    let job = queries::create_training_job(&state.pool, &model_type).await?;
    queries::mark_job_running(&state.pool, job.id).await?;
    tracing::info!("Training job {} started for '{}'", job.id, model_type);

    match trainer::train_model(&state.pool, &state.models_dir, &model_type).await {
        Ok(outcome) => {
            queries::mark_job_completed(&state.pool, job.id, outcome.training_samples as i32)
                .await?;
            Ok(Json(TrainingResponse {
                message: "Training completed".to_string(),
                job_id: job.id,
                results: outcome,
            }))
        }
        Err(e) => {
            if let Err(update_err) =
                queries::mark_job_failed(&state.pool, job.id, &e.to_string()).await
            {
                tracing::error!(
                    "Failed to record failure of training job {}: {}",
                    job.id,
                    update_err
                );
            }
            Err(e)
        }
    }
}

/// Get recent training jobs, newest first.
#[utoipa::path(
    get,
    path = "/api/v1/training/status",
    tag = "Training",
    responses(
        (status = 200, description = "Last 10 training jobs", body = [TrainingJob]),
    )
)]
pub async fn training_status(
    State(state): State<AppState>,
) -> Result<Json<Vec<TrainingJob>>, AppError> {
    let jobs = queries::recent_training_jobs(&state.pool, 10).await?;
    Ok(Json(jobs))
}
