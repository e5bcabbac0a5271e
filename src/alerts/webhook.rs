use reqwest::Client;
use std::time::Duration;
use tracing::info;

use crate::alerts::types::NotificationMessage;
use crate::error::MonitorError;

pub struct WebhookNotifier {
    url: String,
    timeout: Duration,
    dry_run: bool,
}

impl WebhookNotifier {
    pub fn new(url: String, timeout: Duration, dry_run: bool) -> Self {
        Self {
            url,
            timeout,
            dry_run,
        }
    }

    /// POST the message. Any non-2xx answer is fatal and carries the response body.
    pub async fn send(&self, message: &NotificationMessage) -> Result<(), MonitorError> {
        let payload = message.payload();

        if self.dry_run {
            info!("Dry run, not posting notification:\n{}", payload.content);
            return Ok(());
        }

        // One client per alert; a run posts at most once.
        let client = Client::builder().timeout(self.timeout).build()?;
        let response = client.post(&self.url).json(&payload).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(MonitorError::Webhook { status, body });
        }

        info!("Notification delivered (HTTP {})", status.as_u16());
        Ok(())
    }
}
