mod aggregator;
mod api;
mod config;
mod crawler;
mod error;
mod extractor;
mod html;
mod orchestrator;
mod queue;
mod record;
mod resolver;
mod sink;
mod validator;
mod worker;

use anyhow::{bail, Result};
use dotenv::dotenv;
use std::env;
use tokio_util::sync::CancellationToken;
use tracing::warn;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;

    match env::args().nth(1).as_deref() {
        None => run_once(config).await,
        Some("serve") => api::serve(config).await,
        Some(other) => bail!("unknown command {other:?}; run without arguments or with `serve`"),
    }
}

/// One full scrape with the configured plan, written to the configured CSV.
async fn run_once(config: Config) -> Result<()> {
    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Ctrl-C received, finishing in-flight tasks");
            on_signal.cancel();
        }
    });

    orchestrator::run_to_csv(&config, &config.plan, cancel, None, &config.output).await?;
    Ok(())
}
