use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

/// An ingested weather observation (or forecast sample).
///
/// Numeric columns are nullable at the schema level — the ingestion
/// pipeline always writes coerced values, but rows inserted by other
/// clients may carry NULLs, which the training pipeline imputes.
#[derive(Debug, Clone, FromRow, Serialize, ToSchema)]
pub struct WeatherData {
    pub id: Uuid,
    pub timestamp: NaiveDateTime,
    pub temperature: Option<f64>,
    pub humidity: Option<f64>,
    pub wind_speed: Option<f64>,
    pub cloud_cover: Option<f64>,
    pub solar_irradiance: Option<f64>,
    pub precipitation: Option<f64>,
    pub is_forecast: bool,
    pub location: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A measured energy production record.
#[derive(Debug, Clone, FromRow, Serialize, ToSchema)]
pub struct ProductionData {
    pub id: Uuid,
    pub timestamp: NaiveDateTime,
    pub energy_output_kwh: f64,
    pub panel_id: Option<String>,
    pub system_capacity_kw: Option<f64>,
    pub efficiency: Option<f64>,
    pub created_at: DateTime<Utc>,
}

/// A stored prediction row, produced by a past training/inference run.
#[derive(Debug, Clone, FromRow, Serialize, ToSchema)]
pub struct Prediction {
    pub id: Uuid,
    /// "hourly" or "daily"
    pub prediction_type: String,
    pub timestamp: NaiveDateTime,
    pub predicted_output_kwh: f64,
    pub confidence_score: Option<f64>,
    pub model_version: Option<String>,
    pub weather_data_id: Option<Uuid>,
    pub actual_output_kwh: Option<f64>,
    pub created_at: DateTime<Utc>,
}

/// A trained model artifact and its evaluation metrics.
/// At most one row per model_type has `is_active = true`.
#[derive(Debug, Clone, FromRow, Serialize, ToSchema)]
pub struct ModelVersion {
    pub id: Uuid,
    pub version_name: String,
    pub model_type: String,
    pub file_path: String,
    /// R² on the held-out test split
    pub accuracy_score: Option<f64>,
    pub mse: Option<f64>,
    pub is_active: bool,
    pub training_data_start: Option<NaiveDateTime>,
    pub training_data_end: Option<NaiveDateTime>,
    pub created_at: DateTime<Utc>,
}

/// A training job record. Executed inline today, but the state machine
/// (pending → running → completed/failed) supports a background worker.
#[derive(Debug, Clone, FromRow, Serialize, ToSchema)]
pub struct TrainingJob {
    pub id: Uuid,
    pub status: String,
    pub model_type: String,
    pub training_data_count: Option<i32>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Metadata for an uploaded solar panel image.
#[derive(Debug, Clone, FromRow, Serialize, ToSchema)]
pub struct PanelImage {
    pub id: Uuid,
    pub filename: String,
    pub file_path: String,
    pub panel_id: Option<String>,
    pub uploaded_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}
