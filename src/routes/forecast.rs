//! Solar forecast proxy endpoint.
//!
//! - GET /api/v1/forecast/solar?lat=&lon=

use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;
use utoipa::IntoParams;

use crate::errors::{AppError, ErrorResponse};
use crate::routes::AppState;
use crate::services::forecast::{self, ForecastPayload};

#[derive(Debug, Deserialize, IntoParams)]
pub struct SolarForecastQuery {
    /// Latitude in decimal degrees
    pub lat: Option<String>,
    /// Longitude in decimal degrees
    pub lon: Option<String>,
}

/// Get the solar radiation forecast for a coordinate.
///
/// Serves from the in-process cache when a fresh entry exists for the
/// rounded coordinate, otherwise proxies the radiation provider and
/// attaches reverse-geocoded location metadata.
#[utoipa::path(
    get,
    path = "/api/v1/forecast/solar",
    tag = "Forecast",
    params(SolarForecastQuery),
    responses(
        (status = 200, description = "Solar forecast payload", body = ForecastPayload),
        (status = 400, description = "Missing or invalid coordinates", body = ErrorResponse),
        (status = 500, description = "Forecast provider not configured", body = ErrorResponse),
        (status = 502, description = "Forecast provider unavailable", body = ErrorResponse),
    )
)]
pub async fn get_solar_forecast(
    State(state): State<AppState>,
    Query(params): Query<SolarForecastQuery>,
) -> Result<Json<ForecastPayload>, AppError> {
    let (lat_str, lon_str) = match (params.lat, params.lon) {
        (Some(lat), Some(lon)) => (lat, lon),
        _ => {
            return Err(AppError::Validation(
                "Both lat and lon query parameters are required".to_string(),
            ))
        }
    };

    let lat: f64 = lat_str.parse().map_err(|_| {
        AppError::Validation(format!(
            "Could not parse coordinates: lat=\"{}\". Expected numeric values.",
            lat_str
        ))
    })?;
    let lon: f64 = lon_str.parse().map_err(|_| {
        AppError::Validation(format!(
            "Could not parse coordinates: lon=\"{}\". Expected numeric values.",
            lon_str
        ))
    })?;

    let payload =
        forecast::get_solar_forecast(&state.cache, &state.solcast, &state.nominatim, lat, lon)
            .await?;

    Ok(Json(payload))
}
