//! Periscope - rewriting forward proxy daemon.
//!
//! Runs the HTTP API server that fetches client-supplied target URLs and
//! rewrites the returned documents so every embedded reference keeps
//! flowing through the proxy.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use directories::ProjectDirs;
use periscope_core::FetchConfig;
use periscope_server::{Server, ServerConfig};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Periscope - rewriting forward proxy
#[derive(Parser, Debug)]
#[command(name = "periscope", version, about)]
struct Args {
    /// Host to bind to
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// Port to bind to
    #[arg(long, default_value_t = periscope_server::DEFAULT_PORT)]
    port: u16,

    /// Externally-reachable base URL (defaults to http://host:port)
    #[arg(long)]
    public_url: Option<String>,

    /// Upstream fetch time budget in seconds
    #[arg(long, default_value_t = 30)]
    timeout_secs: u64,

    /// Upstream response body ceiling in bytes
    #[arg(long, default_value_t = periscope_core::DEFAULT_MAX_BODY_BYTES)]
    max_body_bytes: usize,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,

    /// Set log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Directory for rolling log files (defaults to the platform data dir)
    #[arg(long)]
    log_dir: Option<PathBuf>,
}

/// Get the logs directory path.
fn logs_dir(args: &Args) -> Option<PathBuf> {
    if let Some(ref dir) = args.log_dir {
        return Some(dir.clone());
    }
    ProjectDirs::from("", "periscope", "Periscope").map(|dirs| dirs.data_dir().join("logs"))
}

/// Initialize logging with file rotation.
fn init_logging(args: &Args) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let log_level = if args.debug { "debug" } else { &args.log_level };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "periscope={log_level},periscope_core={log_level},periscope_server={log_level},warn"
        ))
    });

    if let Some(log_dir) = logs_dir(args) {
        if std::fs::create_dir_all(&log_dir).is_ok() {
            let file_appender = RollingFileAppender::builder()
                .rotation(Rotation::DAILY)
                .max_log_files(5)
                .filename_prefix("periscope")
                .filename_suffix("log")
                .build(&log_dir)
                .ok();

            if let Some(appender) = file_appender {
                let (non_blocking, guard) = tracing_appender::non_blocking(appender);

                tracing_subscriber::registry()
                    .with(env_filter)
                    .with(fmt::layer().with_writer(std::io::stdout))
                    .with(fmt::layer().with_writer(non_blocking).with_ansi(false))
                    .init();

                tracing::info!("Logging to {:?}", log_dir);
                return Some(guard);
            }
        }
    }

    // Fallback: console logging only
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    tracing::warn!("File logging unavailable, using console only");
    None
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let _guard = init_logging(&args);

    let fetch = FetchConfig::default()
        .with_timeout(Duration::from_secs(args.timeout_secs))
        .with_max_body_bytes(args.max_body_bytes);

    let mut config = ServerConfig::default()
        .with_host(args.host)
        .with_port(args.port)
        .with_fetch_config(fetch);
    if let Some(public_url) = args.public_url {
        config = config.with_public_url(public_url);
    }

    let server = Server::new(config)?;
    tracing::info!("Periscope listening on {}", server.addr());
    server.run().await?;

    Ok(())
}
