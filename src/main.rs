mod server;

use anyhow::Context;
use askbot_core::{BotConfig, Credentials, DEFAULT_CONFIG_PATH};
use background_service::{CycleSettings, PollCycle, SeenPosts};
use clap::Parser;
use qa_client::{QaClient, QaConfig};
use reddit_client::{RedditClient, RedditConfig};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "askbot")]
#[command(version, about = "Answers new r/PESU posts using the AskPESU QA backend")]
struct Args {
    /// Address the health server binds to
    #[arg(long, default_value = "0.0.0.0")]
    host: String,

    #[arg(long, default_value_t = 7860)]
    port: u16,

    /// Log at debug level
    #[arg(long)]
    debug: bool,

    /// Path to the TOML configuration file
    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            eprintln!("Ignoring unreadable .env file: {e}");
        }
    }

    let default_level = if args.debug { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = BotConfig::load(&args.config)
        .with_context(|| format!("loading {}", args.config.display()))?;
    let credentials = Credentials::from_env().context("reading credentials from environment")?;

    let reddit = RedditClient::new(
        RedditConfig::from_credentials(&credentials, &config.user_agent)
            .with_request_timeout(config.reddit_timeout()),
    )
    .context("building Reddit client")?;

    let qa = QaClient::new(
        QaConfig::new(&credentials.ask_base_url)
            .context("parsing ASK_PESU_URL")?
            .with_timeout(config.backend_timeout())
            .with_strategy(config.capacity_strategy),
    )
    .context("building QA backend client")?;

    info!(
        "Watching r/{} every {} minutes (up to {} posts per cycle)",
        config.subreddit, config.interval, config.n
    );

    let shutdown = CancellationToken::new();
    let cycle = PollCycle::new(
        Arc::new(reddit),
        Arc::new(qa),
        CycleSettings::from_config(&config),
    );
    let scheduler = background_service::spawn(
        cycle,
        config.interval_duration(),
        SeenPosts::new(config.seen_capacity),
        shutdown.clone(),
    );

    let addr: SocketAddr = format!("{}:{}", args.host, args.port)
        .parse()
        .with_context(|| format!("invalid listen address {}:{}", args.host, args.port))?;
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    info!("Health server listening on http://{}", addr);

    let server_shutdown = shutdown.clone();
    let served = axum::serve(listener, server::router())
        .with_graceful_shutdown(async move {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => info!("Received Ctrl-C, shutting down"),
                _ = server_shutdown.cancelled() => {}
            }
        })
        .await;

    info!("Stopping scheduler");
    scheduler.shutdown().await;

    served.context("health server failed")?;
    info!("Shutdown complete");
    Ok(())
}
