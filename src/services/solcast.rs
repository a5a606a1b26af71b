//! Solcast radiation forecast client.
//!
//! Fetches hourly GHI samples from the Solcast API (or any provider with
//! the same response shape). The base URL is injected so tests can point
//! the client at a mock server.

use serde::{Deserialize, Serialize};

use crate::errors::AppError;

/// Hard cap on the number of forecast hours requested, regardless of
/// configuration. Solcast bills per returned sample.
pub const MAX_FORECAST_HOURS: u32 = 336;

/// One hourly radiation sample from the provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RadiationSample {
    /// End of the sample period, ISO 8601.
    pub period_end: Option<String>,
    /// Global horizontal irradiance in W/m².
    pub ghi: Option<f64>,
    pub air_temp: Option<f64>,
    pub cloud_opacity: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct SolcastResponse {
    forecasts: Option<Vec<RadiationSample>>,
    radiation: Option<Vec<RadiationSample>>,
}

/// Client for the Solcast radiation forecast API.
#[derive(Debug, Clone)]
pub struct SolcastClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    max_hours: u32,
}

impl SolcastClient {
    pub fn new(base_url: &str, api_key: &str, max_hours: u32) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(20))
            .build()
            .expect("Failed to build HTTP client");
        Self {
            client,
            base_url: base_url.to_string(),
            api_key: api_key.to_string(),
            max_hours,
        }
    }

    /// Fetch the hourly radiation forecast for a coordinate.
    ///
    /// Fails with a configuration error when the endpoint or key is unset,
    /// and an upstream error on non-2xx responses or responses without a
    /// non-empty `forecasts`/`radiation` array.
    pub async fn fetch_radiation(
        &self,
        lat: f64,
        lon: f64,
    ) -> Result<Vec<RadiationSample>, AppError> {
        if self.base_url.is_empty() || self.api_key.is_empty() {
            return Err(AppError::Configuration(
                "Solcast API is not configured. Set SOLCAST_BASE_URL and SOLCAST_API_KEY."
                    .to_string(),
            ));
        }

        let hours = self.max_hours.min(MAX_FORECAST_HOURS);

        let response = self
            .client
            .get(&self.base_url)
            .query(&[
                ("latitude", lat.to_string()),
                ("longitude", lon.to_string()),
                ("format", "json".to_string()),
                ("api_key", self.api_key.clone()),
                ("hours", hours.to_string()),
            ])
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| AppError::Upstream(format!("Solcast request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(AppError::Upstream(format!(
                "Solcast returned HTTP {}",
                response.status()
            )));
        }

        let body: SolcastResponse = response
            .json()
            .await
            .map_err(|e| AppError::Upstream(format!("Solcast JSON parse error: {}", e)))?;

        let samples = body
            .forecasts
            .filter(|f| !f.is_empty())
            .or(body.radiation.filter(|r| !r.is_empty()))
            .unwrap_or_default();

        if samples.is_empty() {
            return Err(AppError::Upstream(
                "Solcast response did not include forecast data".to_string(),
            ));
        }

        Ok(samples)
    }

    /// Number of forecast hours this client will request.
    pub fn capped_hours(&self) -> u32 {
        self.max_hours.min(MAX_FORECAST_HOURS)
    }
}
