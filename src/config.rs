use std::{env, fmt::Display, path::PathBuf, str::FromStr, time::Duration};

use tracing::{info, warn};

pub const DEFAULT_API_URL: &str = "http://localhost:5000";
/// Storage slot holding the bearer token between runs
pub const TOKEN_SLOT: &str = "token";

/// Runtime settings, read from the environment (and `.env`)
#[derive(Debug, Clone)]
pub struct Config {
    pub api_url: String,
    pub api_token: Option<String>,
    pub cache_dir: PathBuf,
    /// Applied to every HTTP request
    pub request_timeout: Duration,
    pub revalidate_interval: Option<Duration>,
    pub toast_duration: Duration,
}

impl Config {
    pub fn load() -> Self {
        if let Err(e) = dotenv::dotenv() {
            info!("No .env file loaded: {e}");
        }

        let revalidate_secs: u64 = try_load("ESTATE_REVALIDATE_SECS", 60);
        Self {
            api_url: try_load("ESTATE_API_URL", DEFAULT_API_URL.to_string()),
            api_token: var("ESTATE_API_TOKEN").filter(|t| !t.trim().is_empty()),
            cache_dir: match var("ESTATE_CACHE_DIR").filter(|d| !d.trim().is_empty()) {
                Some(dir) => PathBuf::from(dir),
                None => {
                    let dir = default_cache_dir();
                    info!("ESTATE_CACHE_DIR not set, using default: {}", dir.display());
                    dir
                }
            },
            request_timeout: Duration::from_secs(try_load("ESTATE_REQUEST_TIMEOUT_SECS", 30)),
            revalidate_interval: Some(Duration::from_secs(revalidate_secs)).filter(|d| !d.is_zero()),
            toast_duration: Duration::from_secs(try_load("ESTATE_TOAST_SECS", 5)),
        }
    }
}

/// `estate-scout` under the platform's local data directory.
pub fn default_cache_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("estate-scout")
}

fn var(key: &str) -> Option<String> {
    env::var(key).ok()
}

fn try_load<T>(key: &str, default: T) -> T
where
    T: FromStr + Display,
    T::Err: Display,
{
    match var(key) {
        None => {
            info!("{key} not set, using default: {default}");
            default
        }
        Some(raw) => raw.trim().parse().unwrap_or_else(|e| {
            warn!("Invalid {key} value {raw:?}: {e}; using default: {default}");
            default
        }),
    }
}
