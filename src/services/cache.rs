//! In-memory forecast cache keyed by rounded coordinates.
//!
//! Keys round both coordinates to 4 decimal places (≈11 m), so nearby
//! requests share an entry. Expired entries are evicted lazily on the next
//! lookup; there is no size bound beyond TTL expiry. A TTL of zero is a
//! configuration kill-switch: lookups always miss and stores are no-ops.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};

use crate::helpers::round_coord;
use crate::services::forecast::ForecastPayload;

/// A cached payload together with its expiry.
#[derive(Debug, Clone)]
pub struct CachedForecast {
    pub payload: ForecastPayload,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug)]
pub struct ForecastCache {
    ttl_seconds: u64,
    entries: Mutex<HashMap<String, CachedForecast>>,
}

impl ForecastCache {
    pub fn new(ttl_seconds: u64) -> Self {
        Self {
            ttl_seconds,
            entries: Mutex::new(HashMap::new()),
        }
    }

    fn key(lat: f64, lon: f64) -> String {
        format!("{:.4}:{:.4}", round_coord(lat), round_coord(lon))
    }

    /// When a payload stored now would expire.
    pub fn fresh_expiry(&self) -> DateTime<Utc> {
        Utc::now() + Duration::seconds(self.ttl_seconds as i64)
    }

    /// Look up a live entry. Returns a clone, so callers can never mutate
    /// cached state. Removes the entry if it has expired.
    pub fn lookup(&self, lat: f64, lon: f64) -> Option<CachedForecast> {
        self.lookup_at(lat, lon, Utc::now())
    }

    fn lookup_at(&self, lat: f64, lon: f64, now: DateTime<Utc>) -> Option<CachedForecast> {
        if self.ttl_seconds == 0 {
            return None;
        }
        let key = Self::key(lat, lon);
        let mut entries = self.entries.lock().expect("forecast cache lock poisoned");
        match entries.get(&key) {
            Some(cached) if cached.expires_at > now => Some(cached.clone()),
            Some(_) => {
                entries.remove(&key);
                None
            }
            None => None,
        }
    }

    /// Insert or overwrite the entry for these coordinates.
    pub fn store(&self, lat: f64, lon: f64, payload: ForecastPayload) {
        if self.ttl_seconds == 0 {
            return;
        }
        let entry = CachedForecast {
            payload,
            expires_at: self.fresh_expiry(),
        };
        let mut entries = self.entries.lock().expect("forecast cache lock poisoned");
        entries.insert(Self::key(lat, lon), entry);
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::forecast::{CacheInfo, CurrentConditions, ForecastPayload, LocationInfo};

    fn sample_payload(lat: f64, lon: f64) -> ForecastPayload {
        ForecastPayload {
            location: LocationInfo {
                lat,
                lon,
                display_name: Some("San Francisco".to_string()),
                city: Some("San Francisco".to_string()),
                country: Some("United States".to_string()),
            },
            current_conditions: CurrentConditions {
                ghi: Some(500.0),
                air_temp: Some(18.0),
                cloud_opacity: Some(10.0),
                period_end: Some("2024-06-01T12:00:00Z".to_string()),
            },
            hourly_forecast: vec![],
            daily_summary: vec![],
            forecast_length: 48,
            cache: CacheInfo {
                source: "origin".to_string(),
                expires_at: Utc::now(),
            },
        }
    }

    #[test]
    fn test_store_then_lookup_returns_payload() {
        let cache = ForecastCache::new(900);
        cache.store(37.7749, -122.4194, sample_payload(37.7749, -122.4194));

        let hit = cache.lookup(37.7749, -122.4194).expect("expected cache hit");
        assert_eq!(hit.payload, sample_payload(37.7749, -122.4194));
    }

    #[test]
    fn test_lookup_returns_clone_not_alias() {
        let cache = ForecastCache::new(900);
        cache.store(37.7749, -122.4194, sample_payload(37.7749, -122.4194));

        let mut hit = cache.lookup(37.7749, -122.4194).unwrap();
        hit.payload.forecast_length = 0;
        hit.payload.location.city = None;

        // The stored copy is untouched.
        let again = cache.lookup(37.7749, -122.4194).unwrap();
        assert_eq!(again.payload.forecast_length, 48);
        assert_eq!(again.payload.location.city.as_deref(), Some("San Francisco"));
    }

    #[test]
    fn test_nearby_coordinates_share_entry() {
        let cache = ForecastCache::new(900);
        cache.store(37.7749, -122.4194, sample_payload(37.7749, -122.4194));

        // Differs by less than 0.00005 degrees — same rounded key.
        assert!(cache.lookup(37.77491, -122.41941).is_some());
        // A genuinely different coordinate misses.
        assert!(cache.lookup(37.7759, -122.4194).is_none());
    }

    #[test]
    fn test_expired_entry_is_removed() {
        let cache = ForecastCache::new(900);
        cache.store(37.7749, -122.4194, sample_payload(37.7749, -122.4194));
        assert_eq!(cache.len(), 1);

        let later = Utc::now() + Duration::seconds(901);
        assert!(cache.lookup_at(37.7749, -122.4194, later).is_none());
        assert_eq!(cache.len(), 0, "expired entry should be evicted");
    }

    #[test]
    fn test_zero_ttl_disables_caching() {
        let cache = ForecastCache::new(0);
        cache.store(37.7749, -122.4194, sample_payload(37.7749, -122.4194));
        assert_eq!(cache.len(), 0, "store should be a no-op with zero TTL");
        assert!(cache.lookup(37.7749, -122.4194).is_none());
    }

    #[test]
    fn test_store_overwrites_unconditionally() {
        let cache = ForecastCache::new(900);
        cache.store(37.7749, -122.4194, sample_payload(37.7749, -122.4194));

        let mut replacement = sample_payload(37.7749, -122.4194);
        replacement.forecast_length = 24;
        cache.store(37.7749, -122.4194, replacement);

        let hit = cache.lookup(37.7749, -122.4194).unwrap();
        assert_eq!(hit.payload.forecast_length, 24);
        assert_eq!(cache.len(), 1);
    }
}
