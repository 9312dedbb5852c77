use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use teloxide::Bot;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cloud_music_bot::cli::{Cli, Commands};
use cloud_music_bot::config::Config;
use cloud_music_bot::context::ServiceContext;
use cloud_music_bot::extractors::{normalize_extension, ytdlp::YtDlpExtractor, ExtractionOptions, Extractor};
use cloud_music_bot::server::{self, AppState};
use cloud_music_bot::telegram::{self, TelegramChannel};
use cloud_music_bot::utils;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.log_json);

    match cli.command {
        Commands::Serve { host, port } => {
            let mut config = Config::load(cli.config.as_deref())?;
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }

            warn_missing_dependencies(&config.download.yt_dlp_path).await;
            serve(config).await?;
        }
        Commands::Fetch { query, output_dir } => {
            let mut config = Config::load_unchecked(cli.config.as_deref())?;
            if let Some(dir) = output_dir {
                config.download.dir = dir;
            }
            fetch(&config, &query).await?;
        }
        Commands::Config { show } => {
            let config = Config::load_unchecked(cli.config.as_deref())?;
            if show {
                config.display();
                if let Err(e) = config.validate() {
                    println!("\n⚠️  Configuration is incomplete: {}", e);
                }
            } else {
                println!("# Example config.yaml");
                print!("{}", serde_yaml::to_string(&Config::default())?);
            }
        }
        Commands::Doctor => {
            let config = Config::load_unchecked(cli.config.as_deref())?;
            let missing = utils::check_dependencies(&config.download.yt_dlp_path).await;
            if missing.is_empty() {
                println!("✓ yt-dlp and ffmpeg are available");
            } else {
                println!("Missing tools:");
                for dep in &missing {
                    println!("   • {}", dep);
                }
                anyhow::bail!("{} required tool(s) not found", missing.len());
            }
        }
    }

    Ok(())
}

fn init_tracing(verbose: bool, json: bool) {
    let default_filter = if verbose {
        "cloud_music_bot=debug,tower_http=debug"
    } else {
        "cloud_music_bot=info"
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_filter.into());

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

/// Check for required external tools (non-fatal in containers)
async fn warn_missing_dependencies(yt_dlp_path: &str) {
    let missing_deps = utils::check_dependencies(yt_dlp_path).await;
    for dep in missing_deps {
        tracing::warn!("Dependency check: {} (continuing anyway)", dep);
    }
}

async fn serve(config: Config) -> Result<()> {
    let bot = Bot::new(&config.telegram.bot_token);
    telegram::register_webhook(&bot, &config.telegram).await?;

    let address = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("Failed to bind {}", address))?;

    let (updates_tx, updates_rx) = server::update_queue(config.server.queue_capacity);
    let state = AppState::new(updates_tx, config.telegram.webhook_secret.clone());

    let extractor = Arc::new(YtDlpExtractor::with_path(&config.download.yt_dlp_path));
    let channel = Arc::new(TelegramChannel::new(bot));
    let ctx = Arc::new(ServiceContext::new(config, extractor, channel)?);

    let worker = tokio::spawn(server::run_update_worker(ctx, updates_rx));

    tracing::info!("Cloud Music Bot listening on {}", address);
    server::serve(listener, state, shutdown_signal()).await?;

    // The router (and with it the last queue sender) is gone, so the worker drains and exits
    if let Err(e) = worker.await {
        tracing::warn!("Update worker ended abnormally: {}", e);
    }

    tracing::info!("Shut down cleanly");
    Ok(())
}

async fn fetch(config: &Config, query: &str) -> Result<()> {
    fs_err::create_dir_all(&config.download.dir).context("Failed to create output directory")?;

    let extractor = YtDlpExtractor::with_path(&config.download.yt_dlp_path);
    let options = ExtractionOptions::from_config(&config.download);

    tracing::info!("Fetching best match for: {}", query);
    let track = extractor.retrieve(query, &options).await?;
    let path = normalize_extension(&track.path, options.post_processor.codec);

    println!("Title: {}", track.title);
    println!("Saved to: {}", path.display());
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Received Ctrl+C, shutting down...");
}
