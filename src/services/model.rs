//! Regression model wrapper and persistence.
//!
//! Wraps the random-forest regressor behind a small API so the trainer
//! and predictor never touch smartcore types directly, and serializes
//! fitted models as JSON artifacts on the blob store (local filesystem).

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use smartcore::ensemble::random_forest_regressor::{
    RandomForestRegressor, RandomForestRegressorParameters,
};
use smartcore::linalg::basic::matrix::DenseMatrix;

use crate::errors::AppError;

/// Feature columns consumed by the model, in vector order.
pub const FEATURE_COLUMNS: [&str; 6] = [
    "temperature",
    "humidity",
    "wind_speed",
    "cloud_cover",
    "solar_irradiance",
    "precipitation",
];

pub const NUM_FEATURES: usize = FEATURE_COLUMNS.len();

/// Forest hyperparameters: 100 trees, max depth 10, fixed seed.
const N_TREES: usize = 100;
const MAX_DEPTH: u16 = 10;
const SEED: u64 = 42;

type Forest = RandomForestRegressor<f64, f64, DenseMatrix<f64>, Vec<f64>>;

/// A fitted regression model.
#[derive(Debug, Serialize, Deserialize)]
pub struct RegressionModel {
    forest: Forest,
}

impl RegressionModel {
    /// Fit the forest on row-major feature vectors and targets.
    pub fn fit(features: &Vec<Vec<f64>>, targets: &Vec<f64>) -> Result<Self, AppError> {
        let x = DenseMatrix::from_2d_vec(features);
        let params = RandomForestRegressorParameters::default()
            .with_n_trees(N_TREES)
            .with_max_depth(MAX_DEPTH)
            .with_seed(SEED);
        let forest = Forest::fit(&x, targets, params)
            .map_err(|e| AppError::Internal(format!("Model fitting failed: {}", e)))?;
        Ok(Self { forest })
    }

    /// Predict targets for row-major feature vectors.
    pub fn predict(&self, features: &Vec<Vec<f64>>) -> Result<Vec<f64>, AppError> {
        let x = DenseMatrix::from_2d_vec(features);
        self.forest
            .predict(&x)
            .map_err(|e| AppError::Internal(format!("Model inference failed: {}", e)))
    }

    /// Predict for a single feature vector.
    pub fn predict_one(&self, features: &[f64; NUM_FEATURES]) -> Result<f64, AppError> {
        let predictions = self.predict(&vec![features.to_vec()])?;
        predictions
            .first()
            .copied()
            .ok_or_else(|| AppError::Internal("Model returned no prediction".to_string()))
    }
}

/// A model artifact as persisted on disk.
#[derive(Debug, Serialize, Deserialize)]
pub struct PersistedModel {
    pub version_name: String,
    pub model_type: String,
    pub trained_at: DateTime<Utc>,
    pub model: RegressionModel,
}

/// Write a model artifact as JSON.
pub fn save_model(path: &Path, persisted: &PersistedModel) -> Result<(), AppError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| AppError::Internal(format!("Failed to create model directory: {}", e)))?;
    }
    let file = std::fs::File::create(path)
        .map_err(|e| AppError::Internal(format!("Failed to create model file: {}", e)))?;
    serde_json::to_writer(std::io::BufWriter::new(file), persisted)
        .map_err(|e| AppError::Internal(format!("Failed to serialize model: {}", e)))
}

/// Read a model artifact back. Fails with NotFound when the backing file
/// is missing, so callers can fall back to heuristic mode.
pub fn load_model(path: &Path) -> Result<PersistedModel, AppError> {
    if !path.exists() {
        return Err(AppError::NotFound(format!(
            "Model file not found: {}",
            path.display()
        )));
    }
    let file = std::fs::File::open(path)
        .map_err(|e| AppError::Internal(format!("Failed to open model file: {}", e)))?;
    serde_json::from_reader(std::io::BufReader::new(file))
        .map_err(|e| AppError::Internal(format!("Failed to deserialize model: {}", e)))
}

// ---------------------------------------------------------------------------
// Evaluation metrics
// ---------------------------------------------------------------------------

/// Mean squared error.
pub fn mean_squared_error(predictions: &[f64], targets: &[f64]) -> f64 {
    if predictions.is_empty() || predictions.len() != targets.len() {
        return f64::MAX;
    }
    predictions
        .iter()
        .zip(targets)
        .map(|(p, t)| (p - t).powi(2))
        .sum::<f64>()
        / predictions.len() as f64
}

/// Mean absolute error.
pub fn mean_absolute_error(predictions: &[f64], targets: &[f64]) -> f64 {
    if predictions.is_empty() || predictions.len() != targets.len() {
        return f64::MAX;
    }
    predictions
        .iter()
        .zip(targets)
        .map(|(p, t)| (p - t).abs())
        .sum::<f64>()
        / predictions.len() as f64
}

/// Coefficient of determination. Zero when the targets have no variance.
pub fn r2_score(predictions: &[f64], targets: &[f64]) -> f64 {
    if predictions.is_empty() || predictions.len() != targets.len() {
        return 0.0;
    }
    let mean = targets.iter().sum::<f64>() / targets.len() as f64;
    let ss_tot: f64 = targets.iter().map(|t| (t - mean).powi(2)).sum();
    if ss_tot == 0.0 {
        return 0.0;
    }
    let ss_res: f64 = predictions
        .iter()
        .zip(targets)
        .map(|(p, t)| (t - p).powi(2))
        .sum();
    1.0 - ss_res / ss_tot
}
