use reqwest::StatusCode;

/// Fatal failures of a monitoring run. Every variant ends the process with exit code 1.
#[derive(Debug, thiserror::Error)]
pub enum MonitorError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Browser unavailable: {0}")]
    Browser(String),

    #[error("Failed to fetch {url}: {reason}")]
    Fetch { url: String, reason: String },

    #[error("Could not extract price from {url}")]
    Extraction { url: String },

    #[error("Webhook rejected notification: HTTP {status}: {body}")]
    Webhook { status: StatusCode, body: String },

    #[error("Webhook request failed: {0}")]
    Http(#[from] reqwest::Error),
}

impl MonitorError {
    pub fn config(msg: impl Into<String>) -> Self {
        MonitorError::Config(msg.into())
    }
}
