use serde::Deserialize;

/// Values that show up in checked-in `.env.example` files and must never be
/// sent to a live provider.
const PLACEHOLDER_PREFIXES: &[&str] = &["your_", "changeme", "placeholder", "sk_test_xxx"];

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub port: u16,
    /// When true, the mock payment/verification providers are wired in and
    /// provider failures may degrade to synthetic data. Never enable in
    /// production.
    pub use_mock_providers: bool,
    pub trustii_base_url: String,
    pub trustii_api_token: String,
    pub payment_base_url: String,
    pub payment_secret_key: String,
    /// Reverse-geocoding endpoints, tried in order.
    pub geocoder_base_urls: Vec<String>,
    /// IP-geolocation endpoints, tried in order.
    pub ip_geo_base_urls: Vec<String>,
    /// How long a mock verification inquiry takes end to end.
    pub mock_processing_secs: u64,
    pub poll_interval_secs: u64,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let use_mock_providers = std::env::var("USE_MOCK_PROVIDERS")
            .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(true);

        let config = Self {
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("PORT must be a valid number between 1-65535"))?,
            use_mock_providers,
            trustii_base_url: env_url_or("TRUSTII_BASE_URL", "https://api.trustii.co")?,
            trustii_api_token: env_secret("TRUSTII_API_TOKEN", use_mock_providers)?,
            payment_base_url: env_url_or("PAYMENT_BASE_URL", "https://api.stripe.com")?,
            payment_secret_key: env_secret("PAYMENT_SECRET_KEY", use_mock_providers)?,
            geocoder_base_urls: env_url_list(
                "GEOCODER_BASE_URLS",
                "https://api.bigdatacloud.net/data",
            )?,
            ip_geo_base_urls: env_url_list("IP_GEO_BASE_URLS", "http://ip-api.com")?,
            mock_processing_secs: env_u64_or("MOCK_PROCESSING_SECS", 30)?,
            poll_interval_secs: env_u64_or("POLL_INTERVAL_SECS", 5)?,
        };

        if config.mock_processing_secs == 0 {
            anyhow::bail!("MOCK_PROCESSING_SECS must be greater than zero");
        }
        if config.poll_interval_secs == 0 {
            anyhow::bail!("POLL_INTERVAL_SECS must be greater than zero");
        }

        // Log successful configuration load (without sensitive values)
        tracing::info!("Configuration loaded successfully");
        tracing::info!(
            "Provider mode: {}",
            if config.use_mock_providers { "mock" } else { "live" }
        );
        tracing::debug!("Trustii base URL: {}", config.trustii_base_url);
        tracing::debug!("Payment base URL: {}", config.payment_base_url);
        tracing::debug!("Geocoder endpoints: {:?}", config.geocoder_base_urls);
        tracing::debug!("IP geolocation endpoints: {:?}", config.ip_geo_base_urls);
        tracing::debug!("Server port: {}", config.port);

        Ok(config)
    }

    /// True for empty values and the placeholder strings shipped in
    /// `.env.example` files. Live providers refuse to start with these.
    pub fn is_placeholder(value: &str) -> bool {
        let trimmed = value.trim().to_ascii_lowercase();
        trimmed.is_empty()
            || PLACEHOLDER_PREFIXES
                .iter()
                .any(|prefix| trimmed.starts_with(prefix))
    }
}

fn env_url_or(name: &str, default: &str) -> anyhow::Result<String> {
    let url = std::env::var(name).unwrap_or_else(|_| default.to_string());
    if !url.starts_with("http://") && !url.starts_with("https://") {
        anyhow::bail!("{} must start with http:// or https://", name);
    }
    Ok(url.trim_end_matches('/').to_string())
}

/// Comma-separated URL list; order defines fallback priority.
fn env_url_list(name: &str, default: &str) -> anyhow::Result<Vec<String>> {
    let raw = std::env::var(name).unwrap_or_else(|_| default.to_string());
    let urls: Vec<String> = raw
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.trim_end_matches('/').to_string())
        .collect();

    if urls.is_empty() {
        anyhow::bail!("{} must contain at least one URL", name);
    }
    for url in &urls {
        if !url.starts_with("http://") && !url.starts_with("https://") {
            anyhow::bail!("{} entries must start with http:// or https://", name);
        }
    }
    Ok(urls)
}

fn env_u64_or(name: &str, default: u64) -> anyhow::Result<u64> {
    match std::env::var(name) {
        Ok(value) => value
            .trim()
            .parse()
            .map_err(|_| anyhow::anyhow!("{} must be a positive integer", name)),
        Err(_) => Ok(default),
    }
}

/// Secrets are mandatory in live mode and optional in mock mode. The live
/// provider constructors re-check at startup so misconfiguration fails fast.
fn env_secret(name: &str, mock_mode: bool) -> anyhow::Result<String> {
    let value = std::env::var(name).unwrap_or_default();
    if !mock_mode && Config::is_placeholder(&value) {
        anyhow::bail!(
            "{} is missing or a placeholder; set it or enable USE_MOCK_PROVIDERS",
            name
        );
    }
    Ok(value)
}
