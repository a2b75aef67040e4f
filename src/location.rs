use crate::config::Config;
use crate::errors::AppError;
use crate::geo::{self, Coordinate, CANADA_BOUNDS};
use crate::models::{
    IpGeolocationResponse, LocationHint, LocationSource, Property, RankedProperty,
    ReverseGeocodeResponse, UserLocation,
};
use moka::future::Cache;
use reqwest::Client;
use std::time::Duration;

/// Geolocation calls must not hang the resolver; each request gets this cap.
const GEO_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Principal city per Canadian IANA timezone. Used by the timezone heuristic
/// when neither device coordinates nor IP lookup produced anything.
const TIMEZONE_CITIES: &[(&str, &str, &str, f64, f64)] = &[
    ("America/Toronto", "Toronto", "ON", 43.6532, -79.3832),
    ("America/Vancouver", "Vancouver", "BC", 49.2827, -123.1207),
    ("America/Edmonton", "Edmonton", "AB", 53.5461, -113.4938),
    ("America/Winnipeg", "Winnipeg", "MB", 49.8951, -97.1384),
    ("America/Regina", "Regina", "SK", 50.4452, -104.6189),
    ("America/Halifax", "Halifax", "NS", 44.6488, -63.5752),
    ("America/Moncton", "Moncton", "NB", 46.0878, -64.7782),
    ("America/St_Johns", "St. John's", "NL", 47.5615, -52.7126),
];

/// Resolves a best-effort user location via an ordered cascade:
/// device coordinates, IP geolocation, timezone heuristic, hardcoded default.
/// Each step swallows its own failures; `resolve` never errors.
pub struct LocationResolver {
    client: Client,
    geocoder_base_urls: Vec<String>,
    ip_geo_base_urls: Vec<String>,
    /// IP lookups hit free endpoints, so results are cached per address.
    ip_cache: Cache<String, UserLocation>,
}

impl LocationResolver {
    pub fn new(config: &Config) -> Result<Self, AppError> {
        let client = Client::builder()
            .timeout(GEO_REQUEST_TIMEOUT)
            .build()
            .map_err(|e| {
                AppError::Internal(format!("Failed to create geolocation client: {}", e))
            })?;

        let ip_cache = Cache::builder()
            .time_to_live(Duration::from_secs(3600))
            .max_capacity(50_000)
            .build();

        Ok(Self {
            client,
            geocoder_base_urls: config.geocoder_base_urls.clone(),
            ip_geo_base_urls: config.ip_geo_base_urls.clone(),
            ip_cache,
        })
    }

    /// Produces one best-effort location. First cascade step to succeed wins;
    /// the hardcoded default guarantees a result even when every network call
    /// fails.
    pub async fn resolve(&self, hint: &LocationHint) -> UserLocation {
        if let Some(location) = self.from_device(hint).await {
            tracing::info!(
                "Location resolved from device coordinates: {}, {}",
                location.city,
                location.province
            );
            return location;
        }

        if let Some(ip) = hint.ip.as_deref() {
            if let Some(location) = self.from_ip(ip).await {
                tracing::info!(
                    "Location resolved from IP address: {}, {}",
                    location.city,
                    location.province
                );
                return location;
            }
        }

        if let Some(timezone) = hint.timezone.as_deref() {
            if let Some(location) = Self::from_timezone(timezone) {
                tracing::info!(
                    "Location resolved from timezone {}: {}",
                    timezone,
                    location.city
                );
                return location;
            }
        }

        tracing::info!("All location strategies failed, using default");
        Self::default_location()
    }

    /// Ranks candidate listings by distance from `reference`, nearest first.
    pub fn rank_properties(
        reference: &UserLocation,
        properties: &[Property],
        limit: usize,
    ) -> Vec<RankedProperty> {
        geo::rank_by_distance(reference.coordinate, properties, limit)
            .into_iter()
            .map(|ranked| RankedProperty {
                property: ranked.item,
                distance_km: ranked.distance_km,
            })
            .collect()
    }

    /// Always-available fallback: Toronto, ON.
    pub fn default_location() -> UserLocation {
        UserLocation {
            coordinate: Coordinate::new(43.6532, -79.3832),
            city: "Toronto".to_string(),
            province: "ON".to_string(),
            accuracy: None,
            source: LocationSource::Default,
        }
    }

    /// Step 1: device coordinates. Accepted only if inside the supported
    /// region and reverse geocoding names a city; otherwise this step fails
    /// silently and the cascade moves on.
    async fn from_device(&self, hint: &LocationHint) -> Option<UserLocation> {
        let coordinate = hint.coordinate?;

        if !CANADA_BOUNDS.contains(coordinate) {
            tracing::debug!(
                "Device coordinate ({}, {}) outside supported region, discarding",
                coordinate.lat,
                coordinate.lng
            );
            return None;
        }

        let (city, province) = self.reverse_geocode(coordinate).await?;
        Some(UserLocation {
            coordinate,
            city,
            province,
            accuracy: hint.accuracy,
            source: LocationSource::Device,
        })
    }

    /// Tries each configured geocoding endpoint in order; first usable
    /// response wins. Endpoints disagree on field names, which the wire
    /// model absorbs.
    async fn reverse_geocode(&self, coordinate: Coordinate) -> Option<(String, String)> {
        for base_url in &self.geocoder_base_urls {
            let url = format!("{}/reverse-geocode-client", base_url);
            let response = self
                .client
                .get(&url)
                .query(&[
                    ("latitude", coordinate.lat.to_string()),
                    ("longitude", coordinate.lng.to_string()),
                    ("localityLanguage", "en".to_string()),
                ])
                .send()
                .await;

            let response = match response {
                Ok(r) if r.status().is_success() => r,
                Ok(r) => {
                    tracing::debug!("Geocoder {} returned {}", base_url, r.status());
                    continue;
                }
                Err(e) => {
                    tracing::debug!("Geocoder {} unreachable: {}", base_url, e);
                    continue;
                }
            };

            let body: ReverseGeocodeResponse = match response.json().await {
                Ok(b) => b,
                Err(e) => {
                    tracing::debug!("Geocoder {} returned unparsable body: {}", base_url, e);
                    continue;
                }
            };

            if let Some(code) = body.country_code.as_deref() {
                if !code.eq_ignore_ascii_case("CA") {
                    tracing::debug!("Geocoder {} placed coordinate in {}", base_url, code);
                    continue;
                }
            }

            match body.city {
                Some(city) if !city.trim().is_empty() => {
                    let province = body.province.unwrap_or_default();
                    return Some((city, province));
                }
                _ => continue,
            }
        }
        None
    }

    /// Step 2: IP geolocation. Accepts the first endpoint whose response is
    /// HTTP-success, in-country, and carries coordinates inside the region.
    async fn from_ip(&self, ip: &str) -> Option<UserLocation> {
        let ip = ip.trim();
        if ip.is_empty() {
            return None;
        }

        if let Some(cached) = self.ip_cache.get(ip).await {
            tracing::debug!("IP geolocation cache hit for {}", ip);
            return Some(cached);
        }

        for base_url in &self.ip_geo_base_urls {
            let url = format!("{}/json/{}", base_url, ip);
            let response = match self.client.get(&url).send().await {
                Ok(r) if r.status().is_success() => r,
                Ok(r) => {
                    tracing::debug!("IP endpoint {} returned {}", base_url, r.status());
                    continue;
                }
                Err(e) => {
                    tracing::debug!("IP endpoint {} unreachable: {}", base_url, e);
                    continue;
                }
            };

            let body: IpGeolocationResponse = match response.json().await {
                Ok(b) => b,
                Err(e) => {
                    tracing::debug!("IP endpoint {} returned unparsable body: {}", base_url, e);
                    continue;
                }
            };

            if let Some(location) = Self::location_from_ip_response(&body) {
                self.ip_cache.insert(ip.to_string(), location.clone()).await;
                return Some(location);
            }
        }
        None
    }

    fn location_from_ip_response(body: &IpGeolocationResponse) -> Option<UserLocation> {
        let in_country = body
            .country_code
            .as_deref()
            .map(|c| c.eq_ignore_ascii_case("CA"))
            .or_else(|| {
                body.country
                    .as_deref()
                    .map(|c| c.eq_ignore_ascii_case("Canada"))
            })
            .unwrap_or(false);
        if !in_country {
            return None;
        }

        let coordinate = Coordinate::new(body.latitude?, body.longitude?);
        if !CANADA_BOUNDS.contains(coordinate) {
            return None;
        }

        Some(UserLocation {
            coordinate,
            city: body.city.clone().unwrap_or_else(|| "Toronto".to_string()),
            province: body.region.clone().unwrap_or_default(),
            accuracy: None,
            source: LocationSource::IpAddress,
        })
    }

    /// Step 3: timezone heuristic. Purely local, no network.
    fn from_timezone(timezone: &str) -> Option<UserLocation> {
        TIMEZONE_CITIES
            .iter()
            .find(|(zone, ..)| zone.eq_ignore_ascii_case(timezone.trim()))
            .map(|(_, city, province, lat, lng)| UserLocation {
                coordinate: Coordinate::new(*lat, *lng),
                city: city.to_string(),
                province: province.to_string(),
                accuracy: None,
                source: LocationSource::Timezone,
            })
    }
}
