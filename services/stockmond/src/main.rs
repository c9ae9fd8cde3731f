use std::net::SocketAddr;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use extract::Patterns;
use fetch::PageClient;
use metrics::MetricsHandle;
use monitor::Monitor;
use notify::TelegramNotifier;
use tokio::task;
use tracing::{info, Level};
use uuid::Uuid;

mod config;

use config::MonitorConfig;

#[derive(Parser, Debug)]
struct Args {
    #[arg(long, env = "MONITOR_CONFIG", default_value = "monitor.json")]
    config: String,

    #[arg(long, env = "TELEGRAM_BOT_TOKEN")]
    bot_token: String,

    #[arg(long, env = "TELEGRAM_CHAT_ID", allow_hyphen_values = true)]
    chat_id: String,

    #[arg(long, env = "METRICS_ADDR", default_value = "127.0.0.1:9109")]
    metrics_addr: SocketAddr,
}

fn log_startup(args: &Args, config: &MonitorConfig, run_id: &str) {
    info!(path = %args.config, "config loaded");
    info!(
        items = config.items.len(),
        interval_secs = config.interval_secs,
        workers = config.max_workers,
        "monitor configured"
    );
    info!(addr = %args.metrics_addr, "metrics bind planned");
    info!(%run_id, "run initialized");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(Level::INFO)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let config = MonitorConfig::load(&args.config)
        .with_context(|| format!("failed to read config from {}", args.config))?;
    config.validate()?;

    let run_id = Uuid::new_v4().to_string();
    log_startup(&args, &config, &run_id);

    let patterns = Patterns::compile(&config.stock_pattern, &config.price_pattern)?;
    let client = PageClient::new(fetch::DEFAULT_TIMEOUT)?;
    let notifier = TelegramNotifier::new(&args.bot_token, &args.chat_id, &config.message_title)?;

    let handle = MetricsHandle::new();
    let monitor_metrics = handle.monitor_metrics()?;
    let metrics_addr = args.metrics_addr;
    task::spawn(async move {
        if let Err(err) = handle.serve(metrics_addr).await {
            tracing::error!(error = ?err, "metrics server error");
        }
    });

    info!(run_id = %run_id, items = config.items.len(), "ready");

    let monitor = Monitor::new(
        config.items.clone(),
        client,
        patterns,
        config.max_workers,
        Duration::from_secs(config.interval_secs),
        notifier,
        monitor_metrics,
    );
    monitor.run().await
}
