//! updown-echo: a TCP fixture for exercising network paths
//!
//! Every accepted connection gets its own task that answers each chunk it
//! reads:
//! - Chunks starting with `U` get a one-byte checksum (sum mod 128)
//! - Everything else is echoed back verbatim
//!
//! Features:
//! - Listening socket recreated forever on any setup or accept failure
//! - Optional memory padding to inflate the process footprint
//! - Configuration via CLI arguments, environment or TOML file

mod config;
mod padding;
mod protocol;
mod server;

use config::Config;
use padding::Padding;
use server::Server;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::load()?;

    // Initialize logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let padding = Padding::allocate(config.padding_mb)?;

    println!("{}", banner(&config));

    info!(
        listen = %config.listen,
        direction = ?config.direction,
        padding_bytes = padding.len(),
        workers = ?config.workers,
        timeout_secs = config.timeout.as_secs(),
        enforce_timeout = config.enforce_timeout,
        "Starting updown-echo server"
    );

    let server = Server::new(&config)?;
    let runtime = build_runtime(config.workers)?;
    runtime.block_on(server.run());

    drop(padding);
    Ok(())
}

/// One-line startup banner: build tag, default direction flag, padding.
fn banner(config: &Config) -> String {
    format!(
        "Build Rust {} (Upstream-mode={}, Padding={}MiB)",
        env!("CARGO_PKG_VERSION"),
        config.direction.flag(),
        config.padding_mb
    )
}

/// Build the multi-threaded runtime, sized from config when given.
fn build_runtime(workers: Option<usize>) -> std::io::Result<tokio::runtime::Runtime> {
    let mut builder = tokio::runtime::Builder::new_multi_thread();
    if let Some(workers) = workers.filter(|&w| w > 0) {
        builder.worker_threads(workers);
    }
    builder.enable_all().build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Direction;
    use std::time::Duration;

    fn config(direction: Direction, padding_mb: usize) -> Config {
        Config {
            listen: "0.0.0.0:8888".to_string(),
            direction,
            padding_mb,
            workers: None,
            timeout: Duration::from_secs(15),
            enforce_timeout: false,
            log_level: "info".to_string(),
        }
    }

    #[test]
    fn test_banner_upstream() {
        assert_eq!(
            banner(&config(Direction::Upstream, 2)),
            format!(
                "Build Rust {} (Upstream-mode=1, Padding=2MiB)",
                env!("CARGO_PKG_VERSION")
            )
        );
    }

    #[test]
    fn test_banner_default() {
        assert_eq!(
            banner(&config(Direction::Echo, 0)),
            format!(
                "Build Rust {} (Upstream-mode=0, Padding=0MiB)",
                env!("CARGO_PKG_VERSION")
            )
        );
    }
}
