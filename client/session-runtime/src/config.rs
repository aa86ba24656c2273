use serde::Deserialize;
use std::env;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub api_base_url: String,
    pub api_timeout_ms: u64,
    pub duration_seconds: u64,
    pub tick_interval_ms: u64,
    pub submit_on_timeout: bool,
    pub report_attempts: usize,
    pub storage_path: String,
    pub redis_uri: Option<String>,
    pub log_format: LogFormat,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:8000".to_string(),
            api_timeout_ms: 10_000,
            duration_seconds: 60 * 60,
            tick_interval_ms: 1000,
            submit_on_timeout: false,
            report_attempts: 3,
            storage_path: ".safeinterview/start-times.json".to_string(),
            redis_uri: None,
            log_format: LogFormat::Pretty,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        dotenvy::dotenv().ok();

        // Determine environment (defaults to dev)
        let env = env::var("APP_ENV").unwrap_or_else(|_| "dev".to_string());

        // config/{env}.toml first, APP__SECTION__KEY environment overrides on top
        let settings = config::Config::builder()
            .add_source(config::File::with_name(&format!("config/{}", env)).required(false))
            .add_source(config::Environment::with_prefix("APP").separator("__"))
            .build()?;

        let defaults = Config::default();

        let api_base_url = settings
            .get_string("api.base_url")
            .or_else(|_| env::var("SAFEINTERVIEW_API_URL"))
            .unwrap_or(defaults.api_base_url);

        let api_timeout_ms = settings
            .get_int("api.timeout_ms")
            .ok()
            .map(|v| v as u64)
            .or_else(|| env_number("SAFEINTERVIEW_API_TIMEOUT_MS"))
            .filter(|v| *v > 0)
            .unwrap_or(defaults.api_timeout_ms);

        let duration_seconds = settings
            .get_int("session.duration_seconds")
            .ok()
            .map(|v| v as u64)
            .or_else(|| env_number("INTERVIEW_DURATION_SECONDS"))
            .filter(|v| *v > 0)
            .unwrap_or(defaults.duration_seconds);

        let tick_interval_ms = settings
            .get_int("session.tick_interval_ms")
            .ok()
            .map(|v| v as u64)
            .or_else(|| env_number("INTERVIEW_TICK_INTERVAL_MS"))
            .filter(|v| *v > 0)
            .unwrap_or(defaults.tick_interval_ms);

        let submit_on_timeout = settings
            .get_bool("session.submit_on_timeout")
            .ok()
            .or_else(|| {
                env::var("INTERVIEW_SUBMIT_ON_TIMEOUT")
                    .ok()
                    .map(|v| v != "0" && !v.eq_ignore_ascii_case("false"))
            })
            .unwrap_or(defaults.submit_on_timeout);

        let report_attempts = settings
            .get_int("anticheat.report_attempts")
            .ok()
            .map(|v| v as u64)
            .or_else(|| env_number("ANTICHEAT_REPORT_ATTEMPTS"))
            .filter(|v| *v > 0)
            .map(|v| v as usize)
            .unwrap_or(defaults.report_attempts);

        let storage_path = settings
            .get_string("storage.path")
            .or_else(|_| env::var("SAFEINTERVIEW_STORAGE_PATH"))
            .unwrap_or(defaults.storage_path);

        let redis_uri = settings
            .get_string("storage.redis_uri")
            .or_else(|_| env::var("REDIS_URI"))
            .ok()
            .filter(|v| !v.trim().is_empty());

        let log_format = match settings
            .get_string("logging.format")
            .or_else(|_| env::var("LOG_FORMAT"))
            .map(|v| v.to_lowercase())
            .as_deref()
        {
            Ok("json") => LogFormat::Json,
            _ => LogFormat::Pretty,
        };

        Ok(Config {
            api_base_url,
            api_timeout_ms,
            duration_seconds,
            tick_interval_ms,
            submit_on_timeout,
            report_attempts,
            storage_path,
            redis_uri,
            log_format,
        })
    }
}

fn env_number(key: &str) -> Option<u64> {
    env::var(key).ok().and_then(|v| v.trim().parse::<u64>().ok())
}
