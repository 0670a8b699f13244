#![cfg(not(tarpaulin_include))]

use inventoria::app;
use inventoria::config::AppConfig;

/// Main entry point for the inventory web service
///
/// Reads its configuration from `INVENTORIA_*` environment variables and
/// serves the dashboard until the process is stopped. Log output is
/// controlled with `RUST_LOG` and defaults to `info`.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = AppConfig::from_env()?;
    app::run(config).await
}
