use chrono::{DateTime, Utc};

use crate::alerts::types::{Decision, NotificationMessage, NotifyPolicy, WebhookPayload};
use crate::config::MonitorRequest;
use crate::extraction::types::ExtractedPrice;

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S UTC";

/// Place `value` relative to the inclusive band `[low, high]`.
pub fn evaluate(value: f64, low: f64, high: f64, policy: NotifyPolicy) -> Decision {
    if value <= low {
        Decision::AtOrBelowLow
    } else if value >= high {
        Decision::AtOrAboveHigh
    } else if policy == NotifyPolicy::LegacyNonZero && value != 0.0 {
        Decision::NonZero
    } else {
        Decision::InBand
    }
}

impl NotificationMessage {
    pub fn new(
        request: &MonitorRequest,
        price: ExtractedPrice,
        decision: Decision,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            url: request.target_url.clone(),
            price,
            threshold_low: request.threshold_low,
            threshold_high: request.threshold_high,
            decision,
            timestamp,
        }
    }

    pub fn render(&self) -> String {
        format!(
            "🔔 Price alert ({})\nURL: {}\nCurrent price: {}\nThresholds: low {} / high {}\nSource: {} strategy\nTime: {}",
            self.decision,
            self.url,
            self.price.value,
            self.threshold_low,
            self.threshold_high,
            self.price.strategy,
            self.timestamp.format(TIMESTAMP_FORMAT)
        )
    }

    pub fn payload(&self) -> WebhookPayload {
        WebhookPayload {
            content: self.render(),
        }
    }
}
