use tracing_subscriber::{EnvFilter, fmt};
use tracing::info;

use filedrop::config::{has_flag, ServiceConfig, USAGE};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().collect();
    if has_flag(&args, "--help") || has_flag(&args, "-h") {
        println!("{}", USAGE);
        return Ok(());
    }

    // Init logging
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))?;
    fmt().with_env_filter(filter).init();

    let cfg = ServiceConfig::from_env().apply_args(&args);

    // Startup banner at info level so something always prints at default verbosity
    let rust_log = std::env::var("RUST_LOG").unwrap_or_else(|_| "<unset>".to_string());
    info!(
        target: "filedrop",
        "filedrop starting: RUST_LOG='{}', http_port={}, registry_url={}, storage_root='{}'",
        rust_log, cfg.http_port, cfg.registry_url.as_deref().unwrap_or("<in-memory>"), cfg.storage_root
    );

    filedrop::server::run_with_config(cfg).await
}
