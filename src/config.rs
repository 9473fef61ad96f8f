use crate::error::{AppError, Result};

pub const ADVICE_API_URL: &str = "https://api.openai.com/v1";
pub const ADVICE_MODEL: &str = "gpt-5.2";

/// Reference timestamp used when a request carries no (valid) `refTime`.
/// The transaction dataset ends in early 2019, so "now" would show nothing.
pub const DEFAULT_REF_TIME: &str = "2019-02-15T00:00:00Z";

/// Cumulative probabilities are clamped this far from 0 and 1 before the
/// inverse CDF is evaluated.
pub const PROBABILITY_EPSILON: f64 = 1e-6;

/// Bell curve display range, in standard deviations either side of the mean.
pub const DISPLAY_Z_MIN: f64 = -4.0;
pub const DISPLAY_Z_MAX: f64 = 4.0;

/// Number of samples used to draw the bell curve.
pub const BELL_CURVE_POINTS: usize = 220;

/// Entries always shown at the head of a windowed leaderboard.
pub const LEADERBOARD_HEAD: u32 = 3;

/// A gap marker is inserted before the subject only when its rank exceeds this.
pub const LEADERBOARD_GAP_AFTER: u32 = 5;

/// Pie slices below this share are drawn without a label.
pub const SMALL_SLICE_THRESHOLD: f64 = 0.03;

/// Categories forwarded to the advice prompt.
pub const ADVICE_TOP_CATEGORIES: usize = 5;

/// Keys that may share the amounts map but are not spend categories.
pub const RESERVED_KEYS: &[&str] = &["total", "budget"];

pub const METRIC_LABEL: &str = "Spent Ratio";

#[derive(Debug, Clone)]
pub struct Config {
    pub log_level: String,
    pub db_path: String,
    pub api_port: u16,
    /// Base URL of an OpenAI-compatible API (ADVICE_API_URL)
    pub advice_api_url: String,
    /// Bearer key for the advice API. Advice is cache-only when unset (ADVICE_API_KEY)
    pub advice_api_key: Option<String>,
    pub advice_model: String,
    /// JSON file holding previously generated advice (ADVICE_STORE_PATH)
    pub advice_store_path: String,
    pub advice_timeout_secs: u64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            db_path: std::env::var("DB_PATH").unwrap_or_else(|_| "spend-insights.db".to_string()),
            api_port: std::env::var("API_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse::<u16>()
                .map_err(|_| AppError::Config("API_PORT must be a valid port number".to_string()))?,
            advice_api_url: std::env::var("ADVICE_API_URL")
                .unwrap_or_else(|_| ADVICE_API_URL.to_string()),
            advice_api_key: std::env::var("ADVICE_API_KEY")
                .ok()
                .map(|k| k.trim().to_string())
                .filter(|k| !k.is_empty()),
            advice_model: std::env::var("ADVICE_MODEL").unwrap_or_else(|_| ADVICE_MODEL.to_string()),
            advice_store_path: std::env::var("ADVICE_STORE_PATH")
                .unwrap_or_else(|_| "advice-cache.json".to_string()),
            advice_timeout_secs: std::env::var("ADVICE_TIMEOUT_SECS")
                .unwrap_or_else(|_| "30".to_string())
                .parse::<u64>()
                .unwrap_or(30),
        })
    }
}
