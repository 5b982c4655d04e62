use anyhow::Context;
use tracing_subscriber::{EnvFilter, fmt};
use tracing::info;

use saintbi::config::{ConsoleConfig, SessionTiming};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Init logging
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("warn"))
        .context("building log filter")?;
    fmt().with_env_filter(filter).with_writer(std::io::stderr).init();

    let config = ConsoleConfig::from_env().context("reading SAINTBI_* configuration")?;
    let timing = SessionTiming::default();
    let rust_log = std::env::var("RUST_LOG").unwrap_or_else(|_| "<unset>".to_string());
    info!(
        target: "saintbi",
        "SAINT BI console starting: RUST_LOG='{}', api_url={}, user_cache='{}', session_secs={}, warning_secs={}",
        rust_log, config.api_url, config.user_cache.display(), timing.total.as_secs(), timing.warning_seconds()
    );

    saintbi::cli::run(config).await
}
