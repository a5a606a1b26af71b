//! Energy prediction service.
//!
//! Loads the active trained model on construction and falls back to a
//! simple irradiance heuristic when no usable model exists — predictions
//! must always be servable, even with zero trained models.

use std::path::Path;

use chrono::{Duration, NaiveDateTime, Timelike, Utc};
use serde::Serialize;
use sqlx::PgPool;
use utoipa::ToSchema;

use crate::db::queries;
use crate::errors::AppError;
use crate::services::model::{load_model, RegressionModel, NUM_FEATURES};

/// Feature vector used when no weather row matches a timestamp:
/// temperature, humidity, wind_speed, cloud_cover, solar_irradiance,
/// precipitation under average conditions.
pub const DEFAULT_FEATURES: [f64; NUM_FEATURES] = [20.0, 50.0, 5.0, 30.0, 500.0, 0.0];

/// Fixed confidence scores — a policy value, not statistically derived.
pub const MODEL_CONFIDENCE: f64 = 0.85;
pub const HEURISTIC_CONFIDENCE: f64 = 0.5;

/// Weather features echoed with each prediction.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct WeatherFeatureSnapshot {
    pub temperature: f64,
    pub solar_irradiance: f64,
    pub cloud_cover: f64,
}

/// One on-demand prediction.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PredictionPoint {
    pub timestamp: NaiveDateTime,
    pub predicted_output_kwh: f64,
    pub confidence_score: f64,
    pub model_version: Option<String>,
    pub weather_features: WeatherFeatureSnapshot,
}

/// Prediction engine with a stored-model fallback chain.
pub struct EnergyPredictor {
    model: Option<RegressionModel>,
    pub model_loaded: bool,
    pub model_version: Option<String>,
}

impl EnergyPredictor {
    /// Load the active regression model. Never fails: a missing model row
    /// or artifact file leaves the predictor in heuristic mode.
    pub async fn load(pool: &PgPool, models_dir: &Path) -> Self {
        match queries::active_model(pool, "regression").await {
            Ok(Some(version)) => {
                let path = resolve_artifact_path(models_dir, &version.file_path);
                match load_model(&path) {
                    Ok(persisted) => Self {
                        model: Some(persisted.model),
                        model_loaded: true,
                        model_version: Some(version.version_name),
                    },
                    Err(e) => {
                        tracing::warn!(
                            "Active model '{}' could not be loaded ({}); using heuristic",
                            version.version_name,
                            e
                        );
                        Self::heuristic()
                    }
                }
            }
            Ok(None) => Self::heuristic(),
            Err(e) => {
                tracing::warn!("Failed to query active model ({}); using heuristic", e);
                Self::heuristic()
            }
        }
    }

    fn heuristic() -> Self {
        Self {
            model: None,
            model_loaded: false,
            model_version: None,
        }
    }

    /// Weather feature vector for an exact timestamp, with per-field
    /// defaults for missing rows or null columns.
    async fn weather_features(pool: &PgPool, timestamp: NaiveDateTime) -> [f64; NUM_FEATURES] {
        match queries::weather_at(pool, timestamp).await {
            Ok(Some(weather)) => [
                weather.temperature.unwrap_or(DEFAULT_FEATURES[0]),
                weather.humidity.unwrap_or(DEFAULT_FEATURES[1]),
                weather.wind_speed.unwrap_or(DEFAULT_FEATURES[2]),
                weather.cloud_cover.unwrap_or(DEFAULT_FEATURES[3]),
                weather.solar_irradiance.unwrap_or(DEFAULT_FEATURES[4]),
                weather.precipitation.unwrap_or(DEFAULT_FEATURES[5]),
            ],
            Ok(None) => DEFAULT_FEATURES,
            Err(e) => {
                tracing::warn!("Weather feature lookup failed: {}", e);
                DEFAULT_FEATURES
            }
        }
    }

    /// Predict hourly output from a feature vector: trained model when
    /// loaded, otherwise `max(0, solar_irradiance * 0.5)`.
    fn predict_from_features(
        &self,
        features: &[f64; NUM_FEATURES],
    ) -> Result<(f64, f64), AppError> {
        match &self.model {
            Some(model) => Ok((model.predict_one(features)?, MODEL_CONFIDENCE)),
            None => Ok(((features[4] * 0.5).max(0.0), HEURISTIC_CONFIDENCE)),
        }
    }

    /// Hourly predictions for the next `hours` integer hour offsets from now.
    pub async fn predict_hourly(
        &self,
        pool: &PgPool,
        hours: usize,
    ) -> Result<Vec<PredictionPoint>, AppError> {
        let now = second_precision(Utc::now().naive_utc());
        let mut predictions = Vec::with_capacity(hours);

        for i in 0..hours {
            let timestamp = now + Duration::hours(i as i64);
            let features = Self::weather_features(pool, timestamp).await;
            let (predicted, confidence) = self.predict_from_features(&features)?;
            predictions.push(self.point(timestamp, predicted, confidence, &features));
        }

        Ok(predictions)
    }

    /// Daily predictions for the next `days` day-start timestamps; each
    /// multiplies the hourly-equivalent prediction by 24.
    pub async fn predict_daily(
        &self,
        pool: &PgPool,
        days: usize,
    ) -> Result<Vec<PredictionPoint>, AppError> {
        let today = Utc::now()
            .naive_utc()
            .date()
            .and_hms_opt(0, 0, 0)
            .expect("midnight is always valid");
        let mut predictions = Vec::with_capacity(days);

        for i in 0..days {
            let timestamp = today + Duration::days(i as i64);
            let features = Self::weather_features(pool, timestamp).await;
            let (hourly, confidence) = self.predict_from_features(&features)?;
            predictions.push(self.point(timestamp, hourly * 24.0, confidence, &features));
        }

        Ok(predictions)
    }

    fn point(
        &self,
        timestamp: NaiveDateTime,
        predicted_output_kwh: f64,
        confidence_score: f64,
        features: &[f64; NUM_FEATURES],
    ) -> PredictionPoint {
        PredictionPoint {
            timestamp,
            predicted_output_kwh,
            confidence_score,
            model_version: self.model_version.clone(),
            weather_features: WeatherFeatureSnapshot {
                temperature: features[0],
                solar_irradiance: features[4],
                cloud_cover: features[3],
            },
        }
    }
}

/// Model artifact paths are stored relative to the models directory (a
/// bare filename), but absolute paths from older rows are honored.
fn resolve_artifact_path(models_dir: &Path, file_path: &str) -> std::path::PathBuf {
    let stored = Path::new(file_path);
    if stored.is_absolute() {
        stored.to_path_buf()
    } else {
        models_dir.join(stored)
    }
}

fn second_precision(ts: NaiveDateTime) -> NaiveDateTime {
    ts.with_nanosecond(0).unwrap_or(ts)
}
