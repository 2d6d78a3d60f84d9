use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVar(String),
    #[error("Invalid value for environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
///
/// The LiveKit signing credentials are deliberately optional here: their
/// absence is a hard error at session-start time, not at process start, so
/// the ingestion side of the service stays usable without them.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub livekit_api_key: Option<String>,
    pub livekit_api_secret: Option<String>,
    pub livekit_url: Option<String>,
    pub store_path: PathBuf,
    pub extractor_interpreter: String,
    pub extractor_script: PathBuf,
    pub extractor_timeout: Duration,
    pub extractor_lenient: bool,
    pub token_ttl: Duration,
    pub default_agent_id: String,
    pub log_level: Level,
}

fn seconds_var(name: &str, default: u64) -> Result<Duration, ConfigError> {
    match std::env::var(name) {
        Ok(raw) => raw
            .parse::<u64>()
            .map(Duration::from_secs)
            .map_err(|_| {
                ConfigError::InvalidValue(
                    name.to_string(),
                    format!("'{}' is not a whole number of seconds", raw),
                )
            }),
        Err(_) => Ok(Duration::from_secs(default)),
    }
}

impl Config {
    /// Loads configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        let bind_address_str =
            std::env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
        let bind_address = bind_address_str
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string()))?;

        let livekit_api_key = std::env::var("LIVEKIT_API_KEY").ok().filter(|v| !v.is_empty());
        let livekit_api_secret = std::env::var("LIVEKIT_API_SECRET")
            .ok()
            .filter(|v| !v.is_empty());
        let livekit_url = std::env::var("LIVEKIT_URL").ok().filter(|v| !v.is_empty());

        let store_path = std::env::var("AGENTS_DB_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./agents.json"));

        let extractor_interpreter =
            std::env::var("EXTRACTOR_INTERPRETER").unwrap_or_else(|_| "python3".to_string());
        let extractor_script = std::env::var("EXTRACTOR_SCRIPT")
            .map(PathBuf::from)
            .map_err(|_| ConfigError::MissingVar("EXTRACTOR_SCRIPT".to_string()))?;

        let extractor_timeout = seconds_var("EXTRACTOR_TIMEOUT_SECS", 60)?;
        let extractor_lenient = std::env::var("EXTRACTOR_LENIENT")
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
            .unwrap_or(false);

        let token_ttl = seconds_var("TOKEN_TTL_SECS", 600)?;

        let default_agent_id = std::env::var("DEFAULT_AGENT_ID")
            .unwrap_or_else(|_| studeo_core::DEFAULT_AGENT_ID.to_string());

        let log_level_str = std::env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        Ok(Self {
            bind_address,
            livekit_api_key,
            livekit_api_secret,
            livekit_url,
            store_path,
            extractor_interpreter,
            extractor_script,
            extractor_timeout,
            extractor_lenient,
            token_ttl,
            default_agent_id,
            log_level,
        })
    }
}
