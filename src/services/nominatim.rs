//! Nominatim geocoding client.
//!
//! Every outbound call routes through the shared [`RateLimiter`] first —
//! Nominatim's usage policy allows one request per second process-wide.
//! Reverse lookups never fail (they degrade to an all-null location);
//! forward searches degrade to an empty result list.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::errors::AppError;
use crate::services::rate_limit::RateLimiter;

/// Minimum forward-search query length.
pub const MIN_QUERY_LENGTH: usize = 3;

/// Reverse-geocoded location metadata. All fields null when the provider
/// is unreachable or unconfigured.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct LocationMeta {
    pub display_name: Option<String>,
    pub city: Option<String>,
    pub country: Option<String>,
}

impl LocationMeta {
    pub fn unknown() -> Self {
        Self {
            display_name: None,
            city: None,
            country: None,
        }
    }
}

/// One forward-geocoding match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct GeocodeMatch {
    pub display_name: Option<String>,
    pub lat: f64,
    pub lon: f64,
    pub city: Option<String>,
    pub country: Option<String>,
}

// --- Nominatim JSON response types ---

#[derive(Debug, Default, Deserialize)]
struct NominatimAddress {
    city: Option<String>,
    town: Option<String>,
    village: Option<String>,
    country: Option<String>,
}

impl NominatimAddress {
    /// City resolution order: city, then town, then village.
    fn resolve_city(self) -> Option<String> {
        self.city.or(self.town).or(self.village)
    }
}

#[derive(Debug, Deserialize)]
struct ReverseResponse {
    display_name: Option<String>,
    #[serde(default)]
    address: NominatimAddress,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    display_name: Option<String>,
    lat: String,
    lon: String,
    #[serde(default)]
    address: NominatimAddress,
}

/// Client for the Nominatim geocoding API.
#[derive(Debug, Clone)]
pub struct NominatimClient {
    client: reqwest::Client,
    base_url: String,
    user_agent: String,
    email: String,
    limiter: Arc<RateLimiter>,
}

impl NominatimClient {
    pub fn new(base_url: &str, user_agent: &str, email: &str, limiter: Arc<RateLimiter>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(15))
            .build()
            .expect("Failed to build HTTP client");
        Self {
            client,
            base_url: base_url.to_string(),
            user_agent: user_agent.to_string(),
            email: email.to_string(),
            limiter,
        }
    }

    async fn call(
        &self,
        endpoint: &str,
        params: &[(&str, String)],
    ) -> Result<serde_json::Value, AppError> {
        if self.base_url.is_empty() {
            return Err(AppError::Configuration(
                "Nominatim base URL is not configured".to_string(),
            ));
        }

        self.limiter.acquire().await;

        let url = format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            endpoint.trim_start_matches('/')
        );

        let mut request = self
            .client
            .get(&url)
            .query(params)
            .header(reqwest::header::USER_AGENT, &self.user_agent);
        if !self.email.is_empty() {
            request = request.query(&[("email", self.email.as_str())]);
        }

        let response = request
            .send()
            .await
            .map_err(|e| AppError::Upstream(format!("Nominatim request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(AppError::Upstream(format!(
                "Nominatim returned HTTP {}",
                response.status()
            )));
        }

        response
            .json()
            .await
            .map_err(|e| AppError::Upstream(format!("Nominatim JSON parse error: {}", e)))
    }

    /// Reverse-geocode a coordinate. Never fails: any provider error
    /// degrades to an all-null location.
    pub async fn reverse(&self, lat: f64, lon: f64) -> LocationMeta {
        match self.try_reverse(lat, lon).await {
            Ok(meta) => meta,
            Err(e) => {
                tracing::warn!("Reverse geocoding failed for ({}, {}): {}", lat, lon, e);
                LocationMeta::unknown()
            }
        }
    }

    async fn try_reverse(&self, lat: f64, lon: f64) -> Result<LocationMeta, AppError> {
        let value = self
            .call(
                "reverse",
                &[
                    ("lat", lat.to_string()),
                    ("lon", lon.to_string()),
                    ("format", "jsonv2".to_string()),
                    ("zoom", "10".to_string()),
                    ("addressdetails", "1".to_string()),
                ],
            )
            .await?;

        let parsed: ReverseResponse = serde_json::from_value(value)
            .map_err(|e| AppError::Upstream(format!("Nominatim response structure error: {}", e)))?;

        Ok(LocationMeta {
            display_name: parsed.display_name,
            country: parsed.address.country.clone(),
            city: parsed.address.resolve_city(),
        })
    }

    /// Forward-geocode a free-text query.
    ///
    /// Queries shorter than [`MIN_QUERY_LENGTH`] are rejected; provider
    /// failures yield an empty result list rather than propagating.
    pub async fn search(&self, query: &str) -> Result<Vec<GeocodeMatch>, AppError> {
        let query = query.trim();
        if query.len() < MIN_QUERY_LENGTH {
            return Err(AppError::Validation(format!(
                "Query parameter \"q\" must be at least {} characters long",
                MIN_QUERY_LENGTH
            )));
        }

        match self.try_search(query).await {
            Ok(matches) => Ok(matches),
            Err(e) => {
                tracing::warn!("Location search failed for '{}': {}", query, e);
                Ok(Vec::new())
            }
        }
    }

    async fn try_search(&self, query: &str) -> Result<Vec<GeocodeMatch>, AppError> {
        let value = self
            .call(
                "search",
                &[
                    ("q", query.to_string()),
                    ("format", "jsonv2".to_string()),
                    ("limit", "5".to_string()),
                    ("addressdetails", "1".to_string()),
                ],
            )
            .await?;

        let items: Vec<SearchItem> = serde_json::from_value(value)
            .map_err(|e| AppError::Upstream(format!("Nominatim response structure error: {}", e)))?;

        let mut matches = Vec::with_capacity(items.len());
        for item in items {
            let lat = item.lat.parse::<f64>().map_err(|_| {
                AppError::Upstream(format!("Nominatim returned non-numeric lat '{}'", item.lat))
            })?;
            let lon = item.lon.parse::<f64>().map_err(|_| {
                AppError::Upstream(format!("Nominatim returned non-numeric lon '{}'", item.lon))
            })?;
            matches.push(GeocodeMatch {
                display_name: item.display_name,
                lat,
                lon,
                country: item.address.country.clone(),
                city: item.address.resolve_city(),
            });
        }

        Ok(matches)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_client(base_url: &str) -> NominatimClient {
        NominatimClient::new(
            base_url,
            "SolarForecastDashboard/1.0 (test)",
            "",
            Arc::new(RateLimiter::new(Duration::ZERO)),
        )
    }

    #[tokio::test]
    async fn test_reverse_resolves_city() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/reverse"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "display_name": "San Francisco, California, United States",
                "address": {"city": "San Francisco", "country": "United States"}
            })))
            .mount(&server)
            .await;

        let meta = test_client(&server.uri()).reverse(37.7749, -122.4194).await;
        assert_eq!(meta.city.as_deref(), Some("San Francisco"));
        assert_eq!(meta.country.as_deref(), Some("United States"));
    }

    #[tokio::test]
    async fn test_reverse_falls_back_to_town_then_village() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/reverse"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "display_name": "Somewhere rural",
                "address": {"town": "Gruyères", "country": "Switzerland"}
            })))
            .mount(&server)
            .await;

        let meta = test_client(&server.uri()).reverse(46.58, 7.08).await;
        assert_eq!(meta.city.as_deref(), Some("Gruyères"));
    }

    #[tokio::test]
    async fn test_reverse_degrades_to_nulls_on_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let meta = test_client(&server.uri()).reverse(37.7749, -122.4194).await;
        assert_eq!(meta, LocationMeta::unknown());
    }

    #[tokio::test]
    async fn test_reverse_degrades_when_unconfigured() {
        let meta = test_client("").reverse(37.7749, -122.4194).await;
        assert_eq!(meta, LocationMeta::unknown());
    }

    #[tokio::test]
    async fn test_search_rejects_short_query() {
        let result = test_client("http://unused.invalid").search("ab").await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_search_trims_before_length_check() {
        let result = test_client("http://unused.invalid").search("  a  ").await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_search_three_characters_is_attempted() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search"))
            .and(query_param("q", "Zur"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {
                    "display_name": "Zurich, Switzerland",
                    "lat": "47.3769",
                    "lon": "8.5417",
                    "address": {"city": "Zurich", "country": "Switzerland"}
                }
            ])))
            .mount(&server)
            .await;

        let matches = test_client(&server.uri()).search("Zur").await.unwrap();
        assert_eq!(matches.len(), 1);
        assert!((matches[0].lat - 47.3769).abs() < 1e-9);
        assert_eq!(matches[0].city.as_deref(), Some("Zurich"));
    }

    #[tokio::test]
    async fn test_search_returns_empty_on_provider_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let matches = test_client(&server.uri()).search("Zurich").await.unwrap();
        assert!(matches.is_empty());
    }

    #[tokio::test]
    async fn test_search_returns_empty_on_malformed_coordinates() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {"display_name": "Broken", "lat": "not-a-number", "lon": "8.5"}
            ])))
            .mount(&server)
            .await;

        let matches = test_client(&server.uri()).search("Zurich").await.unwrap();
        assert!(matches.is_empty());
    }

    #[tokio::test]
    async fn test_calls_are_rate_limited() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "display_name": "x", "address": {}
            })))
            .mount(&server)
            .await;

        let client = NominatimClient::new(
            &server.uri(),
            "test",
            "",
            Arc::new(RateLimiter::new(Duration::from_millis(50))),
        );

        let start = std::time::Instant::now();
        client.reverse(0.0, 0.0).await;
        client.reverse(0.0, 0.0).await;
        client.reverse(0.0, 0.0).await;
        assert!(start.elapsed() >= Duration::from_millis(100));
    }
}
