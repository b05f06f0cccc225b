use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{debug, info};

use sitewatch::commands::{CommandPoller, CommandResponder, StatusReporter};
use sitewatch::config::Config;
use sitewatch::monitoring::{
    HealthTracker, HttpProber, MonitoringExecutor, MonitoringScheduler, Target, TlsExpiryChecker,
};
use sitewatch::notifier::{AlertDispatcher, TelegramClient};

#[derive(Debug, Parser)]
#[command(version, about = "Watches HTTP endpoints and TLS certificates, alerts on Telegram")]
struct Cli {
    /// Path to config.toml, defaults to $XDG_CONFIG_HOME/sitewatch/config.toml
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Run a single monitor cycle and exit
    #[arg(long)]
    once: bool,

    /// Print the effective configuration and exit
    #[arg(long)]
    print_config: bool,
}

#[actix_web::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    logger::init();

    let cli = Cli::parse();
    let mut config = Config::from_config(cli.config.as_ref())?;
    config.apply_env()?;

    if cli.print_config {
        println!("{config}");
        return Ok(());
    }
    debug!("{config}");

    let settings = config.validate().context("invalid configuration")?;

    let targets: Arc<[Target]> = settings.targets.into();
    let tracker = Arc::new(HealthTracker::for_targets(&targets));
    let certificates = Arc::new(TlsExpiryChecker::new(settings.tls_timeout)?);
    let telegram = TelegramClient::new(&settings.token, &settings.api_url, settings.request_timeout)?;

    let executor = Arc::new(MonitoringExecutor::new(
        targets.clone(),
        Arc::new(HttpProber::new(settings.probe)?),
        certificates.clone(),
        tracker.clone(),
        settings.threshold,
        AlertDispatcher::new(Arc::new(telegram.clone()), settings.recipients),
    ));

    if cli.once {
        executor.run_cycle().await;
        return Ok(());
    }

    let reporter = StatusReporter::new(targets.clone(), tracker, certificates);

    let scheduler = MonitoringScheduler::new(executor, settings.interval)
        .run_on_start(settings.run_on_start)
        .spawn();
    let poller = CommandPoller::new(
        telegram,
        CommandResponder::new(reporter.clone()),
        settings.poll_timeout,
    )
    .spawn();

    let server = match settings.http_bind {
        Some(addr) => Some(sitewatch::http::run_server(addr, reporter)?),
        None => None,
    };
    let server_handle = server.as_ref().map(|server| server.handle());
    if let Some(server) = server {
        actix_web::rt::spawn(server);
    }

    info!(targets = targets.len(), "sitewatch running");
    tokio::signal::ctrl_c().await?;
    info!("Shutting down");

    scheduler.abort();
    poller.abort();
    if let Some(handle) = server_handle {
        handle.stop(true).await;
    }

    Ok(())
}
