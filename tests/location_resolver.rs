/// Location resolver cascade tests with mocked geocoding/IP endpoints.
/// The resolver must never fail: whatever breaks, it falls through the
/// cascade and ends at the hardcoded default.
use maplenest_core::config::Config;
use maplenest_core::geo::Coordinate;
use maplenest_core::location::LocationResolver;
use maplenest_core::models::{LocationHint, LocationSource};
use wiremock::matchers::{method, path, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Helper function to create a test config pointing at mock servers
fn create_test_config(geocoder_urls: Vec<String>, ip_geo_urls: Vec<String>) -> Config {
    Config {
        port: 8080,
        use_mock_providers: true,
        trustii_base_url: "https://api.trustii.test".to_string(),
        trustii_api_token: String::new(),
        payment_base_url: "https://api.payments.test".to_string(),
        payment_secret_key: String::new(),
        geocoder_base_urls: geocoder_urls,
        ip_geo_base_urls: ip_geo_urls,
        mock_processing_secs: 30,
        poll_interval_secs: 5,
    }
}

fn toronto_hint() -> LocationHint {
    LocationHint {
        coordinate: Some(Coordinate::new(43.6532, -79.3832)),
        accuracy: Some(120.0),
        ip: Some("203.0.113.7".to_string()),
        timezone: Some("America/Toronto".to_string()),
    }
}

#[tokio::test]
async fn device_coordinates_win_when_geocoder_responds() {
    let geocoder = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/reverse-geocode-client"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "locality": "Toronto",
            "principalSubdivision": "Ontario",
            "countryCode": "CA"
        })))
        .mount(&geocoder)
        .await;

    let config = create_test_config(vec![geocoder.uri()], vec!["http://127.0.0.1:9".to_string()]);
    let resolver = LocationResolver::new(&config).unwrap();

    let location = resolver.resolve(&toronto_hint()).await;
    assert_eq!(location.source, LocationSource::Device);
    assert_eq!(location.city, "Toronto");
    assert_eq!(location.province, "Ontario");
    assert_eq!(location.accuracy, Some(120.0));
}

#[tokio::test]
async fn out_of_region_coordinates_fall_through_to_ip() {
    let geocoder = MockServer::start().await;
    let ip_geo = MockServer::start().await;

    // The geocoder must not be consulted for a coordinate outside Canada.
    Mock::given(method("GET"))
        .and(path("/reverse-geocode-client"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&geocoder)
        .await;

    Mock::given(method("GET"))
        .and(path_regex(r"^/json/.+$"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "countryCode": "CA",
            "lat": 45.5017,
            "lon": -73.5673,
            "city": "Montreal",
            "regionName": "Quebec"
        })))
        .mount(&ip_geo)
        .await;

    let config = create_test_config(vec![geocoder.uri()], vec![ip_geo.uri()]);
    let resolver = LocationResolver::new(&config).unwrap();

    let hint = LocationHint {
        // Mexico City: inside no Canadian bounding box
        coordinate: Some(Coordinate::new(19.4326, -99.1332)),
        ..toronto_hint()
    };

    let location = resolver.resolve(&hint).await;
    assert_eq!(location.source, LocationSource::IpAddress);
    assert_eq!(location.city, "Montreal");
    assert_eq!(location.province, "Quebec");
}

#[tokio::test]
async fn geocoder_fallback_tries_next_endpoint() {
    let broken = MockServer::start().await;
    let working = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/reverse-geocode-client"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&broken)
        .await;

    Mock::given(method("GET"))
        .and(path("/reverse-geocode-client"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "city": "Toronto",
            "region": "Ontario"
        })))
        .mount(&working)
        .await;

    let config = create_test_config(
        vec![broken.uri(), working.uri()],
        vec!["http://127.0.0.1:9".to_string()],
    );
    let resolver = LocationResolver::new(&config).unwrap();

    let location = resolver.resolve(&toronto_hint()).await;
    assert_eq!(location.source, LocationSource::Device);
    assert_eq!(location.city, "Toronto");
}

#[tokio::test]
async fn foreign_ip_result_falls_through_to_timezone() {
    let geocoder = MockServer::start().await;
    let ip_geo = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/reverse-geocode-client"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&geocoder)
        .await;

    Mock::given(method("GET"))
        .and(path_regex(r"^/json/.+$"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "countryCode": "US",
            "lat": 40.7128,
            "lon": -74.0060,
            "city": "New York"
        })))
        .mount(&ip_geo)
        .await;

    let config = create_test_config(vec![geocoder.uri()], vec![ip_geo.uri()]);
    let resolver = LocationResolver::new(&config).unwrap();

    let location = resolver.resolve(&toronto_hint()).await;
    assert_eq!(location.source, LocationSource::Timezone);
    assert_eq!(location.city, "Toronto");
    assert_eq!(location.province, "ON");
}

#[tokio::test]
async fn all_strategies_failing_yields_default() {
    let geocoder = MockServer::start().await;
    let ip_geo = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&geocoder)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&ip_geo)
        .await;

    let config = create_test_config(vec![geocoder.uri()], vec![ip_geo.uri()]);
    let resolver = LocationResolver::new(&config).unwrap();

    let hint = LocationHint {
        timezone: Some("Europe/Paris".to_string()),
        ..toronto_hint()
    };

    let location = resolver.resolve(&hint).await;
    assert_eq!(location.source, LocationSource::Default);
    assert_eq!(location.city, "Toronto");
    assert_eq!(location.province, "ON");
}

#[tokio::test]
async fn empty_hint_yields_default_without_network() {
    let config = create_test_config(
        vec!["http://127.0.0.1:9".to_string()],
        vec!["http://127.0.0.1:9".to_string()],
    );
    let resolver = LocationResolver::new(&config).unwrap();

    let location = resolver.resolve(&LocationHint::default()).await;
    assert_eq!(location.source, LocationSource::Default);
    assert_eq!(location.city, "Toronto");
}

#[tokio::test]
async fn ip_lookups_are_cached() {
    let ip_geo = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path_regex(r"^/json/.+$"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "countryCode": "CA",
            "lat": 49.2827,
            "lon": -123.1207,
            "city": "Vancouver",
            "regionName": "British Columbia"
        })))
        .expect(1)
        .mount(&ip_geo)
        .await;

    let config = create_test_config(vec!["http://127.0.0.1:9".to_string()], vec![ip_geo.uri()]);
    let resolver = LocationResolver::new(&config).unwrap();

    let hint = LocationHint {
        ip: Some("198.51.100.22".to_string()),
        ..Default::default()
    };

    let first = resolver.resolve(&hint).await;
    let second = resolver.resolve(&hint).await;
    assert_eq!(first.city, "Vancouver");
    assert_eq!(second.city, "Vancouver");
    assert_eq!(second.source, LocationSource::IpAddress);
}
