//! Solar forecast aggregation service.
//!
//! Transforms raw provider radiation samples into hourly PV-power
//! estimates and daily energy summaries, composes the cache and the
//! reverse-geocode lookup, and annotates every payload with its cache
//! provenance.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::errors::AppError;
use crate::helpers::round_to;
use crate::services::cache::ForecastCache;
use crate::services::nominatim::{LocationMeta, NominatimClient};
use crate::services::solcast::{RadiationSample, SolcastClient};

/// Number of hourly entries included in the payload.
const HOURLY_FORECAST_ENTRIES: usize = 48;
/// Number of days in the daily energy summary.
const DAILY_SUMMARY_DAYS: usize = 7;

/// Query location echoed back with reverse-geocoded metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct LocationInfo {
    pub lat: f64,
    pub lon: f64,
    pub display_name: Option<String>,
    pub city: Option<String>,
    pub country: Option<String>,
}

/// Conditions from the first (nearest) provider sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct CurrentConditions {
    pub ghi: Option<f64>,
    pub air_temp: Option<f64>,
    pub cloud_opacity: Option<f64>,
    pub period_end: Option<String>,
}

/// One hourly forecast entry with the derived PV-power estimate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct HourlyForecastEntry {
    /// End of the forecast period, ISO 8601.
    pub time: String,
    pub ghi: Option<f64>,
    /// Estimated PV power for a 1 kWp panel at 20% efficiency, in kW.
    pub pv_kw: Option<f64>,
    pub air_temp: Option<f64>,
    pub cloud_opacity: Option<f64>,
}

/// Total solar energy for one calendar day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct DailyEnergySummary {
    /// Calendar day, `YYYY-MM-DD`.
    pub date: String,
    pub kwh_per_m2: f64,
}

/// Cache provenance attached to every forecast response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct CacheInfo {
    /// "origin" for a fresh provider fetch, "cache" for a cached payload.
    pub source: String,
    pub expires_at: DateTime<Utc>,
}

/// The full solar forecast payload served to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ForecastPayload {
    pub location: LocationInfo,
    pub current_conditions: CurrentConditions,
    pub hourly_forecast: Vec<HourlyForecastEntry>,
    pub daily_summary: Vec<DailyEnergySummary>,
    pub forecast_length: usize,
    pub cache: CacheInfo,
}

/// Validate coordinate ranges. Boundary values (±90, ±180) are accepted.
pub fn validate_coordinates(lat: f64, lon: f64) -> Result<(), AppError> {
    if !lat.is_finite() || !lon.is_finite() {
        return Err(AppError::Validation(
            "Coordinates must be finite numbers".to_string(),
        ));
    }
    if !(-90.0..=90.0).contains(&lat) {
        return Err(AppError::Validation(format!(
            "Latitude must be between -90 and 90 degrees. Received: {}",
            lat
        )));
    }
    if !(-180.0..=180.0).contains(&lon) {
        return Err(AppError::Validation(format!(
            "Longitude must be between -180 and 180 degrees. Received: {}",
            lon
        )));
    }
    Ok(())
}

/// Estimate PV power in kW for a GHI sample.
///
/// Treats GHI in W/m² as a flat 1 kWp panel at 20% efficiency; null when
/// GHI is absent.
pub fn estimate_pv_power_kw(ghi: Option<f64>) -> Option<f64> {
    ghi.map(|ghi| round_to(ghi * 0.2 / 1000.0, 3))
}

/// Summarize total energy per calendar day.
///
/// Groups samples by the day prefix of their period-end timestamp, sums
/// `ghi / 1000` per day (W/m² → kWh/m² per hourly sample), and returns the
/// first `days` days in ascending date order, rounded to 2 decimals.
pub fn summarize_daily_energy(samples: &[RadiationSample], days: usize) -> Vec<DailyEnergySummary> {
    let mut daily_totals: BTreeMap<String, f64> = BTreeMap::new();
    for sample in samples {
        let Some(period_end) = sample.period_end.as_deref() else {
            continue;
        };
        let Some(ghi) = sample.ghi else {
            continue;
        };
        let day = period_end.split('T').next().unwrap_or(period_end);
        *daily_totals.entry(day.to_string()).or_insert(0.0) += ghi / 1000.0;
    }

    daily_totals
        .into_iter()
        .take(days)
        .map(|(date, total)| DailyEnergySummary {
            date,
            kwh_per_m2: round_to(total, 2),
        })
        .collect()
}

/// Build the forecast payload from provider samples.
pub fn build_forecast_payload(
    lat: f64,
    lon: f64,
    samples: &[RadiationSample],
    location_meta: LocationMeta,
    capped_hours: u32,
    cache: CacheInfo,
) -> ForecastPayload {
    let hourly_forecast: Vec<HourlyForecastEntry> = samples
        .iter()
        .take(HOURLY_FORECAST_ENTRIES)
        .filter_map(|sample| {
            let time = sample.period_end.clone()?;
            Some(HourlyForecastEntry {
                time,
                ghi: sample.ghi,
                pv_kw: estimate_pv_power_kw(sample.ghi),
                air_temp: sample.air_temp,
                cloud_opacity: sample.cloud_opacity,
            })
        })
        .collect();

    let current_conditions = samples
        .first()
        .map(|sample| CurrentConditions {
            ghi: sample.ghi,
            air_temp: sample.air_temp,
            cloud_opacity: sample.cloud_opacity,
            period_end: sample.period_end.clone(),
        })
        .unwrap_or(CurrentConditions {
            ghi: None,
            air_temp: None,
            cloud_opacity: None,
            period_end: None,
        });

    ForecastPayload {
        location: LocationInfo {
            lat,
            lon,
            display_name: location_meta.display_name,
            city: location_meta.city,
            country: location_meta.country,
        },
        current_conditions,
        hourly_forecast,
        daily_summary: summarize_daily_energy(samples, DAILY_SUMMARY_DAYS),
        forecast_length: samples.len().min(capped_hours as usize),
        cache,
    }
}

/// Resolve a solar forecast for a coordinate.
///
/// Checks the cache first; on a miss, fetches from the provider, attaches
/// reverse-geocoded location metadata (a geocoding failure degrades to
/// nulls, never fails the forecast), stores the fresh payload, and returns
/// it annotated with origin provenance.
///
/// The check-fetch-store sequence is not atomic: two concurrent misses for
/// the same key may both call the provider, last write wins.
pub async fn get_solar_forecast(
    cache: &ForecastCache,
    solcast: &SolcastClient,
    nominatim: &NominatimClient,
    lat: f64,
    lon: f64,
) -> Result<ForecastPayload, AppError> {
    validate_coordinates(lat, lon)?;

    if let Some(hit) = cache.lookup(lat, lon) {
        tracing::debug!("Forecast cache hit for ({}, {})", lat, lon);
        let mut payload = hit.payload;
        payload.cache = CacheInfo {
            source: "cache".to_string(),
            expires_at: hit.expires_at,
        };
        return Ok(payload);
    }

    let samples = solcast.fetch_radiation(lat, lon).await?;
    tracing::debug!(
        "Fetched {} radiation samples for ({}, {})",
        samples.len(),
        lat,
        lon
    );

    let location_meta = nominatim.reverse(lat, lon).await;

    let payload = build_forecast_payload(
        lat,
        lon,
        &samples,
        location_meta,
        solcast.capped_hours(),
        CacheInfo {
            source: "origin".to_string(),
            expires_at: cache.fresh_expiry(),
        },
    );

    cache.store(lat, lon, payload.clone());

    Ok(payload)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(period_end: &str, ghi: Option<f64>) -> RadiationSample {
        RadiationSample {
            period_end: Some(period_end.to_string()),
            ghi,
            air_temp: Some(20.0),
            cloud_opacity: Some(10.0),
        }
    }

    #[test]
    fn test_validate_boundary_coordinates_accepted() {
        assert!(validate_coordinates(-90.0, 0.0).is_ok());
        assert!(validate_coordinates(90.0, 0.0).is_ok());
        assert!(validate_coordinates(0.0, -180.0).is_ok());
        assert!(validate_coordinates(0.0, 180.0).is_ok());
    }

    #[test]
    fn test_validate_out_of_range_rejected() {
        assert!(matches!(
            validate_coordinates(91.0, 0.0),
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            validate_coordinates(-91.0, 0.0),
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            validate_coordinates(0.0, 181.0),
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            validate_coordinates(0.0, -181.0),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn test_validate_non_finite_rejected() {
        assert!(validate_coordinates(f64::NAN, 0.0).is_err());
        assert!(validate_coordinates(0.0, f64::INFINITY).is_err());
    }

    #[test]
    fn test_estimate_pv_power() {
        // 650 W/m² * 0.2 / 1000 = 0.13 kW
        assert_eq!(estimate_pv_power_kw(Some(650.0)), Some(0.13));
        // Rounds to 3 decimals: 123.4 * 0.2 / 1000 = 0.02468 → 0.025
        assert_eq!(estimate_pv_power_kw(Some(123.4)), Some(0.025));
        assert_eq!(estimate_pv_power_kw(None), None);
    }

    #[test]
    fn test_daily_summary_groups_and_sorts() {
        // Out of order on purpose — the summary must sort ascending.
        let samples = vec![
            sample("2024-06-02T10:00:00Z", Some(500.0)),
            sample("2024-06-01T10:00:00Z", Some(400.0)),
            sample("2024-06-01T11:00:00Z", Some(600.0)),
        ];
        let summary = summarize_daily_energy(&samples, 7);

        assert_eq!(summary.len(), 2);
        assert_eq!(summary[0].date, "2024-06-01");
        assert_eq!(summary[0].kwh_per_m2, 1.0); // (400 + 600) / 1000
        assert_eq!(summary[1].date, "2024-06-02");
        assert_eq!(summary[1].kwh_per_m2, 0.5);
    }

    #[test]
    fn test_daily_summary_skips_missing_fields() {
        let samples = vec![
            RadiationSample {
                period_end: None,
                ghi: Some(999.0),
                air_temp: None,
                cloud_opacity: None,
            },
            sample("2024-06-01T10:00:00Z", None),
            sample("2024-06-01T11:00:00Z", Some(250.0)),
        ];
        let summary = summarize_daily_energy(&samples, 7);
        assert_eq!(summary.len(), 1);
        assert_eq!(summary[0].kwh_per_m2, 0.25);
    }

    #[test]
    fn test_daily_summary_truncates_to_requested_days() {
        let samples: Vec<RadiationSample> = (1..=10)
            .map(|day| sample(&format!("2024-06-{:02}T10:00:00Z", day), Some(100.0)))
            .collect();
        let summary = summarize_daily_energy(&samples, 7);
        assert_eq!(summary.len(), 7);
        assert_eq!(summary[0].date, "2024-06-01");
        assert_eq!(summary[6].date, "2024-06-07");
    }

    #[test]
    fn test_daily_summary_rounds_to_two_decimals() {
        let samples = vec![
            sample("2024-06-01T10:00:00Z", Some(333.0)),
            sample("2024-06-01T11:00:00Z", Some(333.0)),
        ];
        let summary = summarize_daily_energy(&samples, 7);
        assert_eq!(summary[0].kwh_per_m2, 0.67);
    }

    #[test]
    fn test_payload_caps_hourly_entries() {
        let samples: Vec<RadiationSample> = (0..100)
            .map(|i| sample(&format!("2024-06-01T{:02}:00:00Z", i % 24), Some(100.0)))
            .collect();
        let payload = build_forecast_payload(
            37.7749,
            -122.4194,
            &samples,
            LocationMeta::unknown(),
            336,
            CacheInfo {
                source: "origin".to_string(),
                expires_at: Utc::now(),
            },
        );
        assert_eq!(payload.hourly_forecast.len(), 48);
        assert_eq!(payload.forecast_length, 100);
        assert!(payload.daily_summary.len() <= 7);
    }

    #[test]
    fn test_payload_drops_entries_without_period_end() {
        let samples = vec![
            sample("2024-06-01T10:00:00Z", Some(500.0)),
            RadiationSample {
                period_end: None,
                ghi: Some(500.0),
                air_temp: None,
                cloud_opacity: None,
            },
        ];
        let payload = build_forecast_payload(
            0.0,
            0.0,
            &samples,
            LocationMeta::unknown(),
            336,
            CacheInfo {
                source: "origin".to_string(),
                expires_at: Utc::now(),
            },
        );
        assert_eq!(payload.hourly_forecast.len(), 1);
        assert_eq!(payload.hourly_forecast[0].pv_kw, Some(0.1));
    }

    #[test]
    fn test_payload_current_conditions_from_first_sample() {
        let samples = vec![
            sample("2024-06-01T10:00:00Z", Some(420.0)),
            sample("2024-06-01T11:00:00Z", Some(500.0)),
        ];
        let payload = build_forecast_payload(
            0.0,
            0.0,
            &samples,
            LocationMeta::unknown(),
            336,
            CacheInfo {
                source: "origin".to_string(),
                expires_at: Utc::now(),
            },
        );
        assert_eq!(payload.current_conditions.ghi, Some(420.0));
        assert_eq!(
            payload.current_conditions.period_end.as_deref(),
            Some("2024-06-01T10:00:00Z")
        );
    }

    mod end_to_end {
        use super::*;
        use crate::services::rate_limit::RateLimiter;
        use std::sync::Arc;
        use std::time::Duration;
        use wiremock::matchers::{method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        async fn radiation_server() -> MockServer {
            let server = MockServer::start().await;
            let forecasts: Vec<serde_json::Value> = (0..72)
                .map(|i| {
                    serde_json::json!({
                        "period_end": format!("2024-06-{:02}T{:02}:00:00Z",
                                              1 + i / 24, i % 24),
                        "ghi": 500.0,
                        "air_temp": 20.0,
                        "cloud_opacity": 5.0
                    })
                })
                .collect();
            Mock::given(method("GET"))
                .and(path("/"))
                .respond_with(
                    ResponseTemplate::new(200)
                        .set_body_json(serde_json::json!({ "forecasts": forecasts })),
                )
                .mount(&server)
                .await;
            server
        }

        #[tokio::test]
        async fn test_origin_then_cache_within_rounding_tolerance() {
            let server = radiation_server().await;
            let cache = ForecastCache::new(900);
            let solcast = SolcastClient::new(&server.uri(), "test-key", 336);
            // Nominatim unconfigured — location degrades to nulls.
            let nominatim = NominatimClient::new(
                "",
                "test",
                "",
                Arc::new(RateLimiter::new(Duration::ZERO)),
            );

            let first = get_solar_forecast(&cache, &solcast, &nominatim, 37.7749, -122.4194)
                .await
                .unwrap();
            assert_eq!(first.cache.source, "origin");
            assert!(first.hourly_forecast.len() <= 48);
            assert!(first.daily_summary.len() <= 7);
            assert!(first
                .daily_summary
                .windows(2)
                .all(|pair| pair[0].date < pair[1].date));
            assert!(first.location.city.is_none());

            // Second request within rounding tolerance hits the cache.
            let second = get_solar_forecast(&cache, &solcast, &nominatim, 37.77491, -122.41941)
                .await
                .unwrap();
            assert_eq!(second.cache.source, "cache");
            assert_eq!(second.hourly_forecast, first.hourly_forecast);
        }

        #[tokio::test]
        async fn test_invalid_coordinates_never_reach_provider() {
            let cache = ForecastCache::new(900);
            let solcast = SolcastClient::new("http://unused.invalid", "key", 336);
            let nominatim = NominatimClient::new(
                "",
                "test",
                "",
                Arc::new(RateLimiter::new(Duration::ZERO)),
            );

            let result = get_solar_forecast(&cache, &solcast, &nominatim, 91.0, 0.0).await;
            assert!(matches!(result, Err(AppError::Validation(_))));
        }
    }
}
