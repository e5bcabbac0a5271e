use chrono::Utc;
use tracing::{info, warn};

use crate::alerts::evaluator::evaluate;
use crate::alerts::types::{Decision, NotificationMessage};
use crate::alerts::webhook::WebhookNotifier;
use crate::browser::fetcher::PageFetcher;
use crate::browser::{PageLauncher, PageSession};
use crate::config::MonitorConfig;
use crate::error::MonitorError;
use crate::extraction::pipeline::PricePipeline;
use crate::extraction::types::ExtractedPrice;

/// What a completed run decided.
#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    pub price: ExtractedPrice,
    pub decision: Decision,
    pub notified: bool,
}

/// One monitoring pass: fetch, extract, decide, maybe notify.
pub async fn run(
    config: &MonitorConfig,
    launcher: &dyn PageLauncher,
    notifier: &WebhookNotifier,
) -> Result<RunReport, MonitorError> {
    let price = fetch_price(config, launcher).await?;

    let request = &config.request;
    let decision = evaluate(
        price.value,
        request.threshold_low,
        request.threshold_high,
        config.settings.alert.policy,
    );
    info!(
        "Price {} vs band [{}, {}]: {}",
        price.value, request.threshold_low, request.threshold_high, decision
    );

    if !decision.should_notify() {
        info!("No notification needed");
        return Ok(RunReport {
            price,
            decision,
            notified: false,
        });
    }

    let message = NotificationMessage::new(request, price, decision, Utc::now());
    notifier.send(&message).await?;

    Ok(RunReport {
        price,
        decision,
        notified: true,
    })
}

/// Browser phase. The session is closed whether extraction succeeds or not.
async fn fetch_price(
    config: &MonitorConfig,
    launcher: &dyn PageLauncher,
) -> Result<ExtractedPrice, MonitorError> {
    let mut session = launcher
        .open()
        .await
        .map_err(|e| MonitorError::Browser(format!("{:#}", e)))?;

    let result = load_and_extract(config, session.as_mut()).await;

    if let Err(e) = session.close().await {
        warn!("Failed to close browser session: {:#}", e);
    }
    result
}

async fn load_and_extract(
    config: &MonitorConfig,
    page: &mut dyn PageSession,
) -> Result<ExtractedPrice, MonitorError> {
    let url = &config.request.target_url;

    PageFetcher::new(&config.settings.fetch).load(page, url).await?;

    PricePipeline::new(&config.settings.extraction)
        .run(page)
        .await
        .ok_or_else(|| MonitorError::Extraction { url: url.clone() })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alerts::types::NotifyPolicy;
    use crate::browser::testing::{NavStep, ScriptedLauncher};
    use crate::config::{MonitorRequest, Settings};
    use crate::extraction::types::StrategyKind;
    use std::time::Duration;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const PAGE: &str = r#"
        <html><body>
          <div class="card">
            <span>Current Price</span>
            <div class="text-2xl">4.74</div>
            <span>USDrise per ATOM</span>
          </div>
        </body></html>
    "#;

    fn config(webhook_url: &str, policy: NotifyPolicy) -> MonitorConfig {
        let mut settings = Settings::default();
        settings.fetch.settle_delay_ms = 0;
        settings.extraction.element_timeout_ms = 200;
        settings.alert.policy = policy;
        MonitorConfig {
            request: MonitorRequest {
                target_url: "https://example.com/pool".to_string(),
                threshold_low: 2.0,
                threshold_high: 5.0,
                webhook_url: webhook_url.to_string(),
            },
            settings,
        }
    }

    fn notifier(config: &MonitorConfig) -> WebhookNotifier {
        WebhookNotifier::new(
            config.request.webhook_url.clone(),
            Duration::from_secs(5),
            false,
        )
    }

    async fn webhook(status: u16, body: &str, expected_calls: u64) -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(status).set_body_string(body))
            .expect(expected_calls)
            .mount(&server)
            .await;
        server
    }

    #[tokio::test]
    async fn test_in_band_price_is_quiet_with_band_policy() {
        let server = webhook(204, "", 0).await;
        let config = config(&server.uri(), NotifyPolicy::Band);
        let launcher = ScriptedLauncher::new(PAGE, vec![NavStep::Ok(Some(200))]);

        let report = run(&config, &launcher, &notifier(&config)).await.unwrap();

        assert_eq!(report.price.value, 4.74);
        assert_eq!(report.price.strategy, StrategyKind::LabeledElement);
        assert_eq!(report.decision, Decision::InBand);
        assert!(!report.notified);
        assert!(launcher.was_closed());
    }

    #[tokio::test]
    async fn test_in_band_price_notifies_with_legacy_policy() {
        let server = webhook(204, "", 1).await;
        let config = config(&server.uri(), NotifyPolicy::LegacyNonZero);
        let launcher = ScriptedLauncher::new(PAGE, vec![NavStep::Ok(Some(200))]);

        let report = run(&config, &launcher, &notifier(&config)).await.unwrap();

        assert_eq!(report.decision, Decision::NonZero);
        assert!(report.notified);
    }

    #[tokio::test]
    async fn test_out_of_band_price_notifies() {
        let server = webhook(200, "ok", 1).await;
        let mut config = config(&server.uri(), NotifyPolicy::Band);
        config.request.threshold_high = 4.5;
        let launcher = ScriptedLauncher::new(PAGE, vec![]);

        let report = run(&config, &launcher, &notifier(&config)).await.unwrap();

        assert_eq!(report.decision, Decision::AtOrAboveHigh);
        assert!(report.notified);
    }

    #[tokio::test(start_paused = true)]
    async fn test_navigation_timing_out_twice_is_fatal() {
        let config = config("http://127.0.0.1:9/unused", NotifyPolicy::Band);
        let launcher = ScriptedLauncher::new(PAGE, vec![NavStep::Hang, NavStep::Hang]);

        let err = run(&config, &launcher, &notifier(&config)).await.unwrap_err();

        assert!(matches!(err, MonitorError::Fetch { .. }));
        assert!(err.to_string().contains("Failed to fetch"));
        assert_eq!(launcher.navigations.lock().unwrap().len(), 2);
        assert!(launcher.was_closed());
    }

    #[tokio::test]
    async fn test_page_without_price_is_fatal() {
        let server = webhook(204, "", 0).await;
        let config = config(&server.uri(), NotifyPolicy::LegacyNonZero);
        let launcher = ScriptedLauncher::new(
            "<html><body><p>Loading market data…</p></body></html>",
            vec![NavStep::Ok(Some(200))],
        );

        let err = run(&config, &launcher, &notifier(&config)).await.unwrap_err();

        assert!(matches!(err, MonitorError::Extraction { .. }));
        assert!(err.to_string().contains("Could not extract price"));
        assert!(launcher.was_closed());
    }

    #[tokio::test]
    async fn test_webhook_failure_is_fatal() {
        let server = webhook(500, "internal error", 1).await;
        let config = config(&server.uri(), NotifyPolicy::LegacyNonZero);
        let launcher = ScriptedLauncher::new(PAGE, vec![NavStep::Ok(Some(200))]);

        let err = run(&config, &launcher, &notifier(&config)).await.unwrap_err();

        let msg = err.to_string();
        assert!(msg.contains("500"));
        assert!(msg.contains("internal error"));
    }

    #[tokio::test]
    async fn test_degraded_navigation_still_extracts() {
        let server = webhook(204, "", 0).await;
        let config = config(&server.uri(), NotifyPolicy::Band);
        let launcher = ScriptedLauncher::new(
            PAGE,
            vec![NavStep::Fail("net::ERR_TIMED_OUT"), NavStep::Ok(Some(404))],
        );

        let report = run(&config, &launcher, &notifier(&config)).await.unwrap();
        assert_eq!(report.price.value, 4.74);
    }

    #[tokio::test]
    async fn test_repeated_runs_agree() {
        let server = webhook(204, "", 0).await;
        let config = config(&server.uri(), NotifyPolicy::Band);
        let launcher = ScriptedLauncher::new(PAGE, vec![]);
        let notifier = notifier(&config);

        let first = run(&config, &launcher, &notifier).await.unwrap();
        let second = run(&config, &launcher, &notifier).await.unwrap();
        assert_eq!(first, second);
    }
}
