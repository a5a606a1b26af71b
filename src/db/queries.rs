use chrono::{NaiveDateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::models::{
    ModelVersion, PanelImage, Prediction, ProductionData, TrainingJob, WeatherData,
};
use crate::services::ingest::{NewProductionRecord, NewWeatherRecord};

/// Parameters for registering a freshly trained model version.
pub struct NewModelVersion {
    pub version_name: String,
    pub model_type: String,
    pub file_path: String,
    pub accuracy_score: f64,
    pub mse: f64,
    pub training_data_start: Option<NaiveDateTime>,
    pub training_data_end: Option<NaiveDateTime>,
}

/// Parameters for recording an uploaded panel image.
pub struct NewPanelImage {
    pub filename: String,
    pub file_path: String,
    pub panel_id: Option<String>,
    pub uploaded_by: Option<Uuid>,
}

// ---------------------------------------------------------------------------
// Weather & production ingestion
// ---------------------------------------------------------------------------

/// Insert a batch of ingested weather records in one transaction.
pub async fn insert_weather_batch(
    pool: &PgPool,
    records: &[NewWeatherRecord],
) -> Result<u64, sqlx::Error> {
    let mut tx = pool.begin().await?;
    for record in records {
        sqlx::query(
            "INSERT INTO weather_data (
                id, timestamp, temperature, humidity, wind_speed,
                cloud_cover, solar_irradiance, precipitation, is_forecast, location
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
        )
        .bind(Uuid::new_v4())
        .bind(record.timestamp)
        .bind(record.temperature)
        .bind(record.humidity)
        .bind(record.wind_speed)
        .bind(record.cloud_cover)
        .bind(record.solar_irradiance)
        .bind(record.precipitation)
        .bind(record.is_forecast)
        .bind(&record.location)
        .execute(&mut *tx)
        .await?;
    }
    tx.commit().await?;
    Ok(records.len() as u64)
}

/// Insert a batch of ingested production records in one transaction.
pub async fn insert_production_batch(
    pool: &PgPool,
    records: &[NewProductionRecord],
) -> Result<u64, sqlx::Error> {
    let mut tx = pool.begin().await?;
    for record in records {
        sqlx::query(
            "INSERT INTO production_data (
                id, timestamp, energy_output_kwh, panel_id, system_capacity_kw, efficiency
            ) VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(Uuid::new_v4())
        .bind(record.timestamp)
        .bind(record.energy_output_kwh)
        .bind(&record.panel_id)
        .bind(record.system_capacity_kw)
        .bind(record.efficiency)
        .execute(&mut *tx)
        .await?;
    }
    tx.commit().await?;
    Ok(records.len() as u64)
}

/// Get the weather row matching an exact timestamp, if any.
pub async fn weather_at(
    pool: &PgPool,
    timestamp: NaiveDateTime,
) -> Result<Option<WeatherData>, sqlx::Error> {
    sqlx::query_as::<_, WeatherData>(
        "SELECT id, timestamp, temperature, humidity, wind_speed, cloud_cover,
                solar_irradiance, precipitation, is_forecast, location, created_at
         FROM weather_data
         WHERE timestamp = $1
         LIMIT 1",
    )
    .bind(timestamp)
    .fetch_optional(pool)
    .await
}

/// All weather rows, chronological. Training input.
pub async fn all_weather(pool: &PgPool) -> Result<Vec<WeatherData>, sqlx::Error> {
    sqlx::query_as::<_, WeatherData>(
        "SELECT id, timestamp, temperature, humidity, wind_speed, cloud_cover,
                solar_irradiance, precipitation, is_forecast, location, created_at
         FROM weather_data
         ORDER BY timestamp",
    )
    .fetch_all(pool)
    .await
}

/// All production rows, chronological. Training input.
pub async fn all_production(pool: &PgPool) -> Result<Vec<ProductionData>, sqlx::Error> {
    sqlx::query_as::<_, ProductionData>(
        "SELECT id, timestamp, energy_output_kwh, panel_id, system_capacity_kw,
                efficiency, created_at
         FROM production_data
         ORDER BY timestamp",
    )
    .fetch_all(pool)
    .await
}

// ---------------------------------------------------------------------------
// Predictions
// ---------------------------------------------------------------------------

/// The newest stored predictions of a given type (descending timestamp).
/// Callers reverse into chronological order for charts.
pub async fn stored_predictions(
    pool: &PgPool,
    prediction_type: &str,
    limit: i64,
) -> Result<Vec<Prediction>, sqlx::Error> {
    sqlx::query_as::<_, Prediction>(
        "SELECT id, prediction_type, timestamp, predicted_output_kwh, confidence_score,
                model_version, weather_data_id, actual_output_kwh, created_at
         FROM predictions
         WHERE prediction_type = $1
         ORDER BY timestamp DESC
         LIMIT $2",
    )
    .bind(prediction_type)
    .bind(limit)
    .fetch_all(pool)
    .await
}

/// Most recent predictions across all types (dashboard).
pub async fn recent_predictions(
    pool: &PgPool,
    limit: i64,
) -> Result<Vec<Prediction>, sqlx::Error> {
    sqlx::query_as::<_, Prediction>(
        "SELECT id, prediction_type, timestamp, predicted_output_kwh, confidence_score,
                model_version, weather_data_id, actual_output_kwh, created_at
         FROM predictions
         ORDER BY timestamp DESC
         LIMIT $1",
    )
    .bind(limit)
    .fetch_all(pool)
    .await
}

/// Most recent production rows (dashboard).
pub async fn recent_production(
    pool: &PgPool,
    limit: i64,
) -> Result<Vec<ProductionData>, sqlx::Error> {
    sqlx::query_as::<_, ProductionData>(
        "SELECT id, timestamp, energy_output_kwh, panel_id, system_capacity_kw,
                efficiency, created_at
         FROM production_data
         ORDER BY timestamp DESC
         LIMIT $1",
    )
    .bind(limit)
    .fetch_all(pool)
    .await
}

// ---------------------------------------------------------------------------
// Model versions
// ---------------------------------------------------------------------------

/// The active model version for a model type, if one exists.
pub async fn active_model(
    pool: &PgPool,
    model_type: &str,
) -> Result<Option<ModelVersion>, sqlx::Error> {
    sqlx::query_as::<_, ModelVersion>(
        "SELECT id, version_name, model_type, file_path, accuracy_score, mse,
                is_active, training_data_start, training_data_end, created_at
         FROM model_versions
         WHERE model_type = $1 AND is_active
         LIMIT 1",
    )
    .bind(model_type)
    .fetch_optional(pool)
    .await
}

/// Register a new model version and promote it to active.
///
/// Deactivate-all-of-type and insert-active run in one transaction, so
/// readers never observe zero or two active rows for a model type.
pub async fn activate_model_version(
    pool: &PgPool,
    params: NewModelVersion,
) -> Result<ModelVersion, sqlx::Error> {
    let mut tx = pool.begin().await?;

    sqlx::query("UPDATE model_versions SET is_active = FALSE WHERE model_type = $1 AND is_active")
        .bind(&params.model_type)
        .execute(&mut *tx)
        .await?;

    let version = sqlx::query_as::<_, ModelVersion>(
        "INSERT INTO model_versions (
            id, version_name, model_type, file_path, accuracy_score, mse,
            is_active, training_data_start, training_data_end
        ) VALUES ($1, $2, $3, $4, $5, $6, TRUE, $7, $8)
        RETURNING id, version_name, model_type, file_path, accuracy_score, mse,
                  is_active, training_data_start, training_data_end, created_at",
    )
    .bind(Uuid::new_v4())
    .bind(&params.version_name)
    .bind(&params.model_type)
    .bind(&params.file_path)
    .bind(params.accuracy_score)
    .bind(params.mse)
    .bind(params.training_data_start)
    .bind(params.training_data_end)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(version)
}

// ---------------------------------------------------------------------------
// Training jobs
// ---------------------------------------------------------------------------

/// Create a training job in the `pending` state.
pub async fn create_training_job(
    pool: &PgPool,
    model_type: &str,
) -> Result<TrainingJob, sqlx::Error> {
    sqlx::query_as::<_, TrainingJob>(
        "INSERT INTO training_jobs (id, status, model_type)
         VALUES ($1, 'pending', $2)
         RETURNING id, status, model_type, training_data_count, started_at,
                   completed_at, error_message, created_at",
    )
    .bind(Uuid::new_v4())
    .bind(model_type)
    .fetch_one(pool)
    .await
}

/// Transition a job to `running` and stamp its start time.
pub async fn mark_job_running(pool: &PgPool, job_id: Uuid) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE training_jobs SET status = 'running', started_at = $2 WHERE id = $1")
        .bind(job_id)
        .bind(Utc::now())
        .execute(pool)
        .await?;
    Ok(())
}

/// Transition a job to `completed` with the sample count used.
pub async fn mark_job_completed(
    pool: &PgPool,
    job_id: Uuid,
    training_data_count: i32,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE training_jobs
         SET status = 'completed', training_data_count = $2, completed_at = $3
         WHERE id = $1",
    )
    .bind(job_id)
    .bind(training_data_count)
    .bind(Utc::now())
    .execute(pool)
    .await?;
    Ok(())
}

/// Transition a job to `failed` with its error message.
pub async fn mark_job_failed(
    pool: &PgPool,
    job_id: Uuid,
    error_message: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE training_jobs
         SET status = 'failed', error_message = $2, completed_at = $3
         WHERE id = $1",
    )
    .bind(job_id)
    .bind(error_message)
    .bind(Utc::now())
    .execute(pool)
    .await?;
    Ok(())
}

/// The most recent training jobs, newest first.
pub async fn recent_training_jobs(
    pool: &PgPool,
    limit: i64,
) -> Result<Vec<TrainingJob>, sqlx::Error> {
    sqlx::query_as::<_, TrainingJob>(
        "SELECT id, status, model_type, training_data_count, started_at,
                completed_at, error_message, created_at
         FROM training_jobs
         ORDER BY created_at DESC
         LIMIT $1",
    )
    .bind(limit)
    .fetch_all(pool)
    .await
}

// ---------------------------------------------------------------------------
// Panel images
// ---------------------------------------------------------------------------

/// Record an uploaded panel image.
pub async fn insert_panel_image(
    pool: &PgPool,
    params: NewPanelImage,
) -> Result<PanelImage, sqlx::Error> {
    sqlx::query_as::<_, PanelImage>(
        "INSERT INTO panel_images (id, filename, file_path, panel_id, uploaded_by)
         VALUES ($1, $2, $3, $4, $5)
         RETURNING id, filename, file_path, panel_id, uploaded_by, created_at",
    )
    .bind(Uuid::new_v4())
    .bind(&params.filename)
    .bind(&params.file_path)
    .bind(&params.panel_id)
    .bind(params.uploaded_by)
    .fetch_one(pool)
    .await
}
