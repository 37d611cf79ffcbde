//!
//! dirserve binary
//! ---------------
//! Command-line entry point. Configuration comes from an optional JSON file, `DIRSERVE_*`
//! environment variables and CLI flags, in increasing precedence.

use std::env;

use anyhow::Result;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use dirserve::config::{self, ServerConfig};

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))?;
    let _ = fmt().with_env_filter(filter).try_init();

    let args: Vec<String> = env::args().collect();
    if config::wants_help(&args) {
        println!("{}", config::USAGE);
        return Ok(());
    }

    let cfg = ServerConfig::from_env_and_args(&args)?;
    let rust_log = env::var("RUST_LOG").unwrap_or_else(|_| "<unset>".to_string());
    info!(target: "startup", "dirserve {} starting: RUST_LOG='{}', addr={}, root='{}'", env!("CARGO_PKG_VERSION"), rust_log, cfg.addr, cfg.root);
    if cfg.debug {
        let mut shown = cfg.clone();
        if shown.auth_http.is_some() { shown.auth_http = Some("***".to_string()); }
        info!(target: "startup", "effective config: {}", serde_json::to_string(&shown)?);
    }

    dirserve::server::run(cfg).await
}
