use std::{env, path::PathBuf, str::FromStr, time::Duration};

use serde::Serialize;
use thiserror::Error;
use url::Url;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0}")]
    Message(String),
}

#[derive(Debug, Clone, Serialize)]
pub struct Config {
    pub port: u16,
    pub snapshot_path: PathBuf,
    pub stations_file: Option<PathBuf>,
    pub error_log_path: PathBuf,
    pub index_html_path: Option<PathBuf>,
    pub logo_base_url: String,
    pub cycle: CycleConfig,
    pub upstream: UpstreamConfig,
    pub notifier: Option<SmtpConfig>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CycleConfig {
    pub interval_seconds: u64,
    pub concurrency: usize,
    pub adapter_timeout_ms: u64,
}

/// Settings shared by every adapter when talking to station endpoints.
#[derive(Debug, Clone, Serialize)]
pub struct UpstreamConfig {
    pub fetch_timeout_ms: u64,
    pub user_agent: String,
    pub calendar_base_url: String,
    #[serde(skip_serializing)]
    pub calendar_api_key: Option<String>,
    pub ffmpeg_bin: String,
    pub tesseract_bin: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    #[serde(skip_serializing)]
    pub password: String,
    pub from_address: String,
    pub to_address: String,
}

impl Config {
    pub fn load() -> Result<Self, ConfigError> {
        let port = env_number("PORT", 4020)?;
        let snapshot_path = env_path("SNAPSHOT_PATH").unwrap_or_else(|| "info.json".into());
        let stations_file = env_path("STATIONS_FILE");
        let error_log_path = env_path("ERROR_LOG_PATH").unwrap_or_else(|| "errorlog.txt".into());
        let index_html_path = env_path("INDEX_HTML_PATH");
        let logo_base_url = env::var("LOGO_BASE_URL")
            .unwrap_or_else(|_| "https://internetradioprotocol.org/".to_string());
        validate_base_url("LOGO_BASE_URL", &logo_base_url)?;

        Ok(Self {
            port,
            snapshot_path,
            stations_file,
            error_log_path,
            index_html_path,
            logo_base_url,
            cycle: CycleConfig::from_env()?,
            upstream: UpstreamConfig::from_env()?,
            notifier: SmtpConfig::from_env()?,
        })
    }
}

impl CycleConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let interval_seconds = env_number("CYCLE_INTERVAL_SECONDS", 60)?;
        let concurrency = env_number("CYCLE_CONCURRENCY", 10)?;
        if concurrency == 0 {
            return Err(ConfigError::Message(
                "CYCLE_CONCURRENCY must be greater than zero.".into(),
            ));
        }
        let adapter_timeout_ms = env_number("ADAPTER_TIMEOUT_MS", 30_000)?;

        Ok(Self {
            interval_seconds,
            concurrency,
            adapter_timeout_ms,
        })
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_seconds)
    }

    pub fn adapter_timeout(&self) -> Duration {
        Duration::from_millis(self.adapter_timeout_ms)
    }
}

impl Default for CycleConfig {
    fn default() -> Self {
        Self {
            interval_seconds: 60,
            concurrency: 10,
            adapter_timeout_ms: 30_000,
        }
    }
}

impl UpstreamConfig {
    fn from_env() -> Result<Self, ConfigError> {
        const DEFAULT_CALENDAR_BASE_URL: &str = "https://www.googleapis.com/calendar/v3";

        let fetch_timeout_ms = env_number("FETCH_TIMEOUT_MS", 10_000)?;
        if fetch_timeout_ms == 0 {
            return Err(ConfigError::Message(
                "FETCH_TIMEOUT_MS must be greater than zero.".into(),
            ));
        }
        let user_agent = env::var("HTTP_USER_AGENT")
            .unwrap_or_else(|_| "Mozilla/5.0 (compatible; now-playing-service-rs)".to_string());
        if user_agent.trim().is_empty() {
            return Err(ConfigError::Message(
                "HTTP_USER_AGENT cannot be blank.".into(),
            ));
        }
        let calendar_base_url = env::var("GOOGLE_CALENDAR_BASE_URL")
            .unwrap_or_else(|_| DEFAULT_CALENDAR_BASE_URL.to_string());
        validate_base_url("GOOGLE_CALENDAR_BASE_URL", &calendar_base_url)?;

        Ok(Self {
            fetch_timeout_ms,
            user_agent,
            calendar_base_url,
            calendar_api_key: env_non_empty("GOOGLE_CALENDAR_API_KEY"),
            ffmpeg_bin: env::var("FFMPEG_BIN").unwrap_or_else(|_| "ffmpeg".to_string()),
            tesseract_bin: env::var("TESSERACT_BIN").unwrap_or_else(|_| "tesseract".to_string()),
        })
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            fetch_timeout_ms: 10_000,
            user_agent: "Mozilla/5.0 (compatible; now-playing-service-rs)".to_string(),
            calendar_base_url: "https://www.googleapis.com/calendar/v3".to_string(),
            calendar_api_key: None,
            ffmpeg_bin: "ffmpeg".to_string(),
            tesseract_bin: "tesseract".to_string(),
        }
    }
}

impl SmtpConfig {
    fn from_env() -> Result<Option<Self>, ConfigError> {
        let Some(host) = env_non_empty("SMTP_HOST") else {
            return Ok(None);
        };
        let port = env_number("SMTP_PORT", 465)?;
        let username = env_required("SMTP_USERNAME")?;
        let password = env_required("SMTP_PASSWORD")?;
        let from_address = env_non_empty("NOTIFY_FROM").unwrap_or_else(|| username.clone());
        let to_address = env_non_empty("NOTIFY_TO").unwrap_or_else(|| from_address.clone());

        Ok(Some(Self {
            host,
            port,
            username,
            password,
            from_address,
            to_address,
        }))
    }
}

fn validate_base_url(key: &str, value: &str) -> Result<(), ConfigError> {
    let url =
        Url::parse(value).map_err(|err| ConfigError::Message(format!("Invalid {key}: {err}")))?;
    if url.scheme() != "https" && url.scheme() != "http" {
        return Err(ConfigError::Message(format!(
            "{key} must be an http(s) URL"
        )));
    }
    Ok(())
}

fn env_required(key: &str) -> Result<String, ConfigError> {
    env_non_empty(key).ok_or_else(|| ConfigError::Message(format!("{key} must be set")))
}

fn env_non_empty(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn env_path(key: &str) -> Option<PathBuf> {
    env_non_empty(key).map(PathBuf::from)
}

/// Parses `key` when set; unset means `default`, garbage is an error.
fn env_number<T: FromStr>(key: &str, default: T) -> Result<T, ConfigError> {
    match env_non_empty(key) {
        Some(value) => value.parse().map_err(|_| {
            ConfigError::Message(format!(
                "{key} must be a valid {}",
                std::any::type_name::<T>()
            ))
        }),
        None => Ok(default),
    }
}
