//! Model training pipeline.
//!
//! Joins historical weather and production records on truncated-hour
//! timestamps, imputes missing features, fits the regression forest,
//! evaluates it on a held-out split, persists the artifact and promotes it
//! to active.

use std::collections::HashMap;
use std::path::Path;

use chrono::{NaiveDateTime, Utc};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use sqlx::PgPool;
use utoipa::ToSchema;

use crate::db::models::{ProductionData, WeatherData};
use crate::db::queries::{self, NewModelVersion};
use crate::errors::AppError;
use crate::helpers::truncate_to_hour;
use crate::services::model::{
    mean_absolute_error, mean_squared_error, r2_score, save_model, PersistedModel,
    RegressionModel, NUM_FEATURES,
};

/// Split seed, fixed for reproducibility.
const SPLIT_SEED: u64 = 42;
/// Held-out fraction for evaluation.
const TEST_FRACTION: f64 = 0.2;
/// Sample count synthesized when the join yields nothing.
const SYNTHETIC_SAMPLES: usize = 1000;
/// Plausible upper bounds per feature for synthetic data.
const SYNTHETIC_SCALES: [f64; NUM_FEATURES] = [40.0, 100.0, 20.0, 100.0, 1000.0, 50.0];

/// Result of a training run.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct TrainingOutcome {
    pub version_name: String,
    pub mse: f64,
    pub mae: f64,
    pub r2_score: f64,
    pub training_samples: usize,
    pub test_samples: usize,
    pub model_path: String,
    /// True when no joined weather/production data existed and the model
    /// was fit on synthesized samples — the data-starvation signal.
    pub synthetic_data: bool,
}

/// Joined training set. Feature cells may be NaN where the weather row
/// carried a NULL; imputation resolves them.
struct TrainingSet {
    features: Vec<Vec<f64>>,
    targets: Vec<f64>,
    data_start: Option<NaiveDateTime>,
    data_end: Option<NaiveDateTime>,
}

/// Inner-join weather and production rows on their truncated hour.
///
/// The first weather row seen per hour wins; production rows without a
/// weather partner are dropped (sub-hour granularity mismatches are
/// unrecoverable, lossy by design).
fn join_training_data(weather: &[WeatherData], production: &[ProductionData]) -> TrainingSet {
    let mut by_hour: HashMap<NaiveDateTime, &WeatherData> = HashMap::new();
    for row in weather {
        by_hour.entry(truncate_to_hour(row.timestamp)).or_insert(row);
    }

    let mut features = Vec::new();
    let mut targets = Vec::new();
    let mut data_start: Option<NaiveDateTime> = None;
    let mut data_end: Option<NaiveDateTime> = None;

    for row in production {
        let Some(weather_row) = by_hour.get(&truncate_to_hour(row.timestamp)) else {
            continue;
        };
        features.push(vec![
            weather_row.temperature.unwrap_or(f64::NAN),
            weather_row.humidity.unwrap_or(f64::NAN),
            weather_row.wind_speed.unwrap_or(f64::NAN),
            weather_row.cloud_cover.unwrap_or(f64::NAN),
            weather_row.solar_irradiance.unwrap_or(f64::NAN),
            weather_row.precipitation.unwrap_or(f64::NAN),
        ]);
        targets.push(row.energy_output_kwh);
        data_start = Some(data_start.map_or(row.timestamp, |s| s.min(row.timestamp)));
        data_end = Some(data_end.map_or(row.timestamp, |e| e.max(row.timestamp)));
    }

    TrainingSet {
        features,
        targets,
        data_start,
        data_end,
    }
}

fn median(values: &mut Vec<f64>) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.sort_by(|a, b| a.partial_cmp(b).expect("non-finite values filtered"));
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        (values[mid - 1] + values[mid]) / 2.0
    } else {
        values[mid]
    }
}

/// Replace NaN cells with the column median, computed from the joined
/// training set only — imputation reflects rows actually used.
fn impute_column_medians(features: &mut [Vec<f64>]) {
    for column in 0..NUM_FEATURES {
        let mut finite: Vec<f64> = features
            .iter()
            .map(|row| row[column])
            .filter(|v| v.is_finite())
            .collect();
        let fill = median(&mut finite);
        for row in features.iter_mut() {
            if !row[column].is_finite() {
                row[column] = fill;
            }
        }
    }
}

/// Synthesize samples from plausible feature ranges so the pipeline
/// remains exercisable without real data.
fn synthesize_samples(n: usize) -> (Vec<Vec<f64>>, Vec<f64>) {
    let mut rng = StdRng::seed_from_u64(SPLIT_SEED);
    let mut features = Vec::with_capacity(n);
    let mut targets = Vec::with_capacity(n);
    for _ in 0..n {
        let row: Vec<f64> = SYNTHETIC_SCALES
            .iter()
            .map(|scale| rng.gen::<f64>() * scale)
            .collect();
        let noise = (rng.gen::<f64>() - 0.5) * 20.0;
        targets.push((row[4] * 0.5 + noise).max(0.0));
        features.push(row);
    }
    (features, targets)
}

/// 80/20 train/test split with a seeded shuffle.
#[allow(clippy::type_complexity)]
fn train_test_split(
    features: Vec<Vec<f64>>,
    targets: Vec<f64>,
) -> Result<(Vec<Vec<f64>>, Vec<Vec<f64>>, Vec<f64>, Vec<f64>), AppError> {
    let n = features.len();
    let test_len = ((n as f64) * TEST_FRACTION).round().max(1.0) as usize;
    if n < 2 || test_len >= n {
        return Err(AppError::Validation(format!(
            "Not enough joined samples to train: {}",
            n
        )));
    }

    let mut indices: Vec<usize> = (0..n).collect();
    indices.shuffle(&mut StdRng::seed_from_u64(SPLIT_SEED));

    let (test_idx, train_idx) = indices.split_at(test_len);
    let take = |idx: &[usize]| -> (Vec<Vec<f64>>, Vec<f64>) {
        (
            idx.iter().map(|&i| features[i].clone()).collect(),
            idx.iter().map(|&i| targets[i]).collect(),
        )
    };
    let (test_x, test_y) = take(test_idx);
    let (train_x, train_y) = take(train_idx);

    Ok((train_x, test_x, train_y, test_y))
}

/// Run the full training pipeline and promote the resulting model.
pub async fn train_model(
    pool: &PgPool,
    models_dir: &Path,
    model_type: &str,
) -> Result<TrainingOutcome, AppError> {
    let weather = queries::all_weather(pool).await?;
    let production = queries::all_production(pool).await?;

    let mut set = join_training_data(&weather, &production);

    let synthetic_data = set.features.is_empty();
    if synthetic_data {
        tracing::warn!("No joined training data found; synthesizing {} samples", SYNTHETIC_SAMPLES);
        let (features, targets) = synthesize_samples(SYNTHETIC_SAMPLES);
        set.features = features;
        set.targets = targets;
    } else {
        impute_column_medians(&mut set.features);
    }

    let (train_x, test_x, train_y, test_y) = train_test_split(set.features, set.targets)?;

    let model = RegressionModel::fit(&train_x, &train_y)?;
    let predictions = model.predict(&test_x)?;

    let mse = mean_squared_error(&predictions, &test_y);
    let mae = mean_absolute_error(&predictions, &test_y);
    let r2 = r2_score(&predictions, &test_y);

    let version_name = format!("model_{}", Utc::now().format("%Y%m%d_%H%M%S"));
    let file_name = format!("{}.json", version_name);
    let artifact_path = models_dir.join(&file_name);

    save_model(
        &artifact_path,
        &PersistedModel {
            version_name: version_name.clone(),
            model_type: model_type.to_string(),
            trained_at: Utc::now(),
            model,
        },
    )?;

    queries::activate_model_version(
        pool,
        NewModelVersion {
            version_name: version_name.clone(),
            model_type: model_type.to_string(),
            // Stored relative to the models directory.
            file_path: file_name,
            accuracy_score: r2,
            mse,
            training_data_start: set.data_start,
            training_data_end: set.data_end,
        },
    )
    .await?;

    tracing::info!(
        "Trained model '{}' on {} samples (synthetic: {}, r2: {:.4})",
        version_name,
        train_x.len(),
        synthetic_data,
        r2
    );

    Ok(TrainingOutcome {
        version_name,
        mse,
        mae,
        r2_score: r2,
        training_samples: train_x.len(),
        test_samples: test_x.len(),
        model_path: artifact_path.display().to_string(),
        synthetic_data,
    })
}
