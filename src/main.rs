mod alerts;
mod browser;
mod config;
mod error;
mod extraction;
mod monitor;

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use alerts::webhook::WebhookNotifier;
use browser::chromium::ChromiumLauncher;
use browser::snapshot::SnapshotLauncher;
use browser::PageLauncher;
use config::{MonitorConfig, MonitorRequest, Settings};

/// Watch a rendered price page and alert a webhook when the price leaves its band.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// Optional TOML file with fetch, extraction and alert tuning.
    #[arg(long, default_value = "monitor.toml")]
    config: PathBuf,

    /// Replay a saved HTML page instead of launching Chromium.
    #[arg(long)]
    snapshot: Option<PathBuf>,

    /// Log the notification instead of posting it.
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();

    // Configuration errors surface here, before any network activity.
    let config = MonitorConfig {
        request: MonitorRequest::from_env()?,
        settings: Settings::load(&args.config)?,
    };

    tracing::info!("Monitoring {}", config.request.target_url);
    tracing::info!(
        "Band: [{}, {}], policy: {:?}",
        config.request.threshold_low,
        config.request.threshold_high,
        config.settings.alert.policy
    );

    let launcher: Box<dyn PageLauncher> = match &args.snapshot {
        Some(path) => {
            tracing::info!("Replaying snapshot {}", path.display());
            Box::new(SnapshotLauncher::from_file(path)?)
        }
        None => Box::new(ChromiumLauncher::new(config.settings.fetch.clone())),
    };

    let notifier = WebhookNotifier::new(
        config.request.webhook_url.clone(),
        config.settings.alert.webhook_timeout(),
        args.dry_run,
    );

    let report = monitor::run(&config, launcher.as_ref(), &notifier).await?;

    tracing::info!(
        "✅ Done: price {} via {} strategy ({}), {}",
        report.price.value,
        report.price.strategy,
        report.decision,
        if report.notified { "notification sent" } else { "no notification" }
    );

    Ok(())
}
