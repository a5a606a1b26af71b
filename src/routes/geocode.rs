//! Geocoding proxy endpoint.
//!
//! - GET /api/v1/geocode/search?q=

use axum::extract::{Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::errors::{AppError, ErrorResponse};
use crate::routes::AppState;
use crate::services::nominatim::GeocodeMatch;

#[derive(Debug, Deserialize, IntoParams)]
pub struct GeocodeSearchQuery {
    /// Free-text location query, minimum 3 characters
    pub q: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct GeocodeSearchResponse {
    pub results: Vec<GeocodeMatch>,
}

/// Search for locations by name.
///
/// Proxies the rate-limited geocoding provider; provider failures yield
/// an empty result list rather than an error.
#[utoipa::path(
    get,
    path = "/api/v1/geocode/search",
    tag = "Geocode",
    params(GeocodeSearchQuery),
    responses(
        (status = 200, description = "Matching locations", body = GeocodeSearchResponse),
        (status = 400, description = "Query shorter than 3 characters", body = ErrorResponse),
    )
)]
pub async fn search_locations(
    State(state): State<AppState>,
    Query(params): Query<GeocodeSearchQuery>,
) -> Result<Json<GeocodeSearchResponse>, AppError> {
    let query = params.q.unwrap_or_default();
    let results = state.nominatim.search(&query).await?;
    Ok(Json(GeocodeSearchResponse { results }))
}
