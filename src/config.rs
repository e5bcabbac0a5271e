use reqwest::Url;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};

use crate::alerts::types::NotifyPolicy;
use crate::error::MonitorError;

pub const ENV_TARGET_URL: &str = "TARGET_URL";
pub const ENV_THRESHOLD_LOW: &str = "THRESHOLD_LOW";
pub const ENV_THRESHOLD_HIGH: &str = "THRESHOLD_HIGH";
pub const ENV_WEBHOOK_URL: &str = "DISCORD_WEBHOOK_URL";

/// What to watch and where to report it. Built once per run from the environment.
#[derive(Debug, Clone)]
pub struct MonitorRequest {
    pub target_url: String,
    pub threshold_low: f64,
    pub threshold_high: f64,
    pub webhook_url: String,
}

/// Tuning knobs read from the optional TOML file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub fetch: FetchSettings,
    pub extraction: ExtractionSettings,
    pub alert: AlertSettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FetchSettings {
    pub navigation_timeout_secs: u64,
    pub relaxed_timeout_secs: u64,
    pub settle_delay_ms: u64,
    pub headless: bool,
    pub chrome_executable: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ExtractionSettings {
    pub price_label: String,
    pub value_selector: String,
    pub card_selector: String,
    pub unit_phrase: String,
    pub element_timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AlertSettings {
    pub policy: NotifyPolicy,
    pub webhook_timeout_secs: u64,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            navigation_timeout_secs: 30,
            relaxed_timeout_secs: 20,
            settle_delay_ms: 5000,
            headless: true,
            chrome_executable: None,
        }
    }
}

impl Default for ExtractionSettings {
    fn default() -> Self {
        Self {
            price_label: "Current Price".to_string(),
            value_selector: "[class*='text-2xl'], [class*='text-3xl'], [class*='text-4xl']"
                .to_string(),
            card_selector: "[class*='card'], [class*='rounded-lg']".to_string(),
            unit_phrase: "USDrise per ATOM".to_string(),
            element_timeout_ms: 10_000,
        }
    }
}

impl Default for AlertSettings {
    fn default() -> Self {
        Self {
            policy: NotifyPolicy::Band,
            webhook_timeout_secs: 15,
        }
    }
}

impl FetchSettings {
    pub fn navigation_timeout(&self) -> Duration {
        Duration::from_secs(self.navigation_timeout_secs)
    }

    pub fn relaxed_timeout(&self) -> Duration {
        Duration::from_secs(self.relaxed_timeout_secs)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }
}

impl ExtractionSettings {
    pub fn element_timeout(&self) -> Duration {
        Duration::from_millis(self.element_timeout_ms)
    }
}

impl AlertSettings {
    pub fn webhook_timeout(&self) -> Duration {
        Duration::from_secs(self.webhook_timeout_secs)
    }
}

/// Everything a run needs, passed by reference into each component.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    pub request: MonitorRequest,
    pub settings: Settings,
}

impl Settings {
    /// Load settings from `path`. A missing file means defaults; a broken one is an error.
    pub fn load(path: &Path) -> Result<Self, MonitorError> {
        if !path.exists() {
            info!("No settings file at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path).map_err(|e| {
            MonitorError::config(format!("Failed to read {}: {}", path.display(), e))
        })?;

        toml::from_str(&contents).map_err(|e| {
            MonitorError::config(format!("Failed to parse {}: {}", path.display(), e))
        })
    }
}

impl MonitorRequest {
    pub fn from_env() -> Result<Self, MonitorError> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, MonitorError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| -> Result<String, MonitorError> {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .ok_or_else(|| MonitorError::config(format!("{} not set", key)))
        };

        let target_url = parse_url(ENV_TARGET_URL, required(ENV_TARGET_URL)?)?;
        let threshold_low = parse_threshold(ENV_THRESHOLD_LOW, &required(ENV_THRESHOLD_LOW)?)?;
        let threshold_high = parse_threshold(ENV_THRESHOLD_HIGH, &required(ENV_THRESHOLD_HIGH)?)?;
        let webhook_url = parse_url(ENV_WEBHOOK_URL, required(ENV_WEBHOOK_URL)?)?;

        if threshold_low > threshold_high {
            warn!(
                "{} ({}) is above {} ({}); every price will be out of band",
                ENV_THRESHOLD_LOW, threshold_low, ENV_THRESHOLD_HIGH, threshold_high
            );
        }

        Ok(Self {
            target_url,
            threshold_low,
            threshold_high,
            webhook_url,
        })
    }
}

fn parse_url(key: &str, raw: String) -> Result<String, MonitorError> {
    Url::parse(&raw)
        .map_err(|e| MonitorError::config(format!("{} is not a valid URL: {}", key, e)))?;
    Ok(raw)
}

// `str::parse::<f64>` is locale-independent but accepts "inf" and "NaN".
fn parse_threshold(key: &str, raw: &str) -> Result<f64, MonitorError> {
    let value: f64 = raw
        .parse()
        .map_err(|_| MonitorError::config(format!("{} is not a number: {:?}", key, raw)))?;
    if !value.is_finite() {
        return Err(MonitorError::config(format!("{} must be finite: {:?}", key, raw)));
    }
    Ok(value)
}
