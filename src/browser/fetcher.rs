use std::time::Duration;
use tokio::time::timeout;
use tracing::{info, warn};

use super::{LoadCondition, NavigationOutcome, PageSession};
use crate::config::FetchSettings;
use crate::error::MonitorError;

/// Navigation policy: full load first, one relaxed retry, then a fixed settle delay.
pub struct PageFetcher<'a> {
    settings: &'a FetchSettings,
}

impl<'a> PageFetcher<'a> {
    pub fn new(settings: &'a FetchSettings) -> Self {
        Self { settings }
    }

    /// Navigate `page` to `url` and wait for client-side rendering to settle.
    ///
    /// A non-2xx document status is logged, not fatal: client-rendered apps
    /// often fill in the content anyway. Only a failed retry aborts the run.
    pub async fn load(
        &self,
        page: &mut dyn PageSession,
        url: &str,
    ) -> Result<NavigationOutcome, MonitorError> {
        info!("Navigating to {}", url);

        let first = attempt(
            page,
            url,
            LoadCondition::Load,
            self.settings.navigation_timeout(),
        )
        .await;

        let outcome = match first {
            Ok(outcome) => outcome,
            Err(reason) => {
                warn!("Full load failed ({}), retrying with DOMContentLoaded", reason);
                attempt(
                    page,
                    url,
                    LoadCondition::DomContentLoaded,
                    self.settings.relaxed_timeout(),
                )
                .await
                .map_err(|reason| MonitorError::Fetch {
                    url: url.to_string(),
                    reason,
                })?
            }
        };

        match outcome.status {
            Some(status) if outcome.is_ok() => {
                info!("Navigation status {} for {}", status, outcome.final_url)
            }
            Some(status) => warn!(
                "Navigation status {} for {} is not OK, continuing anyway",
                status, outcome.final_url
            ),
            None => info!("Navigation status not reported for {}", outcome.final_url),
        }

        let settle = self.settings.settle_delay();
        if !settle.is_zero() {
            info!("Waiting {:?} for the page to render", settle);
            tokio::time::sleep(settle).await;
        }

        Ok(outcome)
    }
}

async fn attempt(
    page: &mut dyn PageSession,
    url: &str,
    condition: LoadCondition,
    limit: Duration,
) -> Result<NavigationOutcome, String> {
    match timeout(limit, page.navigate(url, condition)).await {
        Ok(Ok(outcome)) => Ok(outcome),
        Ok(Err(e)) => Err(e.to_string()),
        Err(_) => Err(format!("timed out after {:?}", limit)),
    }
}
