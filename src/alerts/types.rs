use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::extraction::types::ExtractedPrice;

/// When a price counts as alert-worthy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum NotifyPolicy {
    /// Outside the inclusive band: `value <= low || value >= high`.
    #[serde(rename = "band")]
    Band,
    /// The historical rule, which also fires for any non-zero price.
    #[serde(rename = "legacy_nonzero")]
    LegacyNonZero,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    AtOrBelowLow,
    AtOrAboveHigh,
    /// Inside the band, but the legacy policy notifies on any non-zero value.
    NonZero,
    InBand,
}

impl Decision {
    pub fn should_notify(&self) -> bool {
        !matches!(self, Decision::InBand)
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Decision::AtOrBelowLow => write!(f, "at or below low threshold"),
            Decision::AtOrAboveHigh => write!(f, "at or above high threshold"),
            Decision::NonZero => write!(f, "non-zero price"),
            Decision::InBand => write!(f, "inside band"),
        }
    }
}

/// Alert content, built right before dispatch.
#[derive(Debug, Clone)]
pub struct NotificationMessage {
    pub url: String,
    pub price: ExtractedPrice,
    pub threshold_low: f64,
    pub threshold_high: f64,
    pub decision: Decision,
    pub timestamp: DateTime<Utc>,
}

/// Discord-style webhook body.
#[derive(Debug, Serialize)]
pub struct WebhookPayload {
    pub content: String,
}
