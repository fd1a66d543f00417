mod singleton;
mod watch;

use std::future::IntoFuture;
use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};
use axum::Router;
use clap::{Parser, Subcommand};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use zoukcal_core::config::DEFAULT_CONFIG_FILE;
use zoukcal_core::{DirStore, JsonSnapshot, Pipeline, Rebuilder, Scheduler, SiteConfig};

#[derive(Parser)]
#[command(name = "zoukcal")]
#[command(about = "Build the event calendar site, rebuild on change and serve a preview")]
struct Cli {
    /// Config file (TOML); missing file means defaults
    #[arg(short, long, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Directory holding the event records
    #[arg(long)]
    content_dir: Option<PathBuf>,

    /// Directory the site is generated into
    #[arg(long)]
    output_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one rebuild pass and exit
    Build,
    /// Rebuild, then watch for changes and serve the output (default)
    Serve {
        /// Port for the preview server
        #[arg(short, long)]
        port: Option<u16>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "zoukcal=info,zoukcal_core=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let mut config = SiteConfig::load(&cli.config)?;
    if let Some(dir) = cli.content_dir {
        config.content_dir = dir;
    }
    if let Some(dir) = cli.output_dir {
        config.output_dir = dir;
    }

    match cli.command.unwrap_or(Commands::Serve { port: None }) {
        Commands::Build => build(&config),
        Commands::Serve { port } => {
            if let Some(port) = port {
                config.port = port;
            }
            serve(config).await
        }
    }
}

fn rebuilder(config: &SiteConfig) -> Result<Rebuilder<DirStore, JsonSnapshot>> {
    let pipeline = Pipeline::from_config(DirStore::new(&config.content_dir), config)?;
    Ok(Rebuilder::new(pipeline, JsonSnapshot::new(&config.output_dir)))
}

fn build(config: &SiteConfig) -> Result<()> {
    let _lock = singleton::acquire_lock(&config.output_dir)?;

    let stats = rebuilder(config)?.rebuild()?;
    info!(
        "Wrote {} events to {}",
        stats.occurrences,
        config.output_dir.display()
    );
    Ok(())
}

async fn serve(config: SiteConfig) -> Result<()> {
    // Ensure only one process rebuilds into this output directory
    let _lock = singleton::acquire_lock(&config.output_dir)?;

    let scheduler = Scheduler::new(rebuilder(&config)?);
    let (_watcher, signals) =
        watch::spawn(&config.content_dir, &config.watch_paths, &config.output_dir)?;

    let app = Router::new()
        .fallback_service(ServeDir::new(&config.output_dir))
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", config.bind, config.port)
        .parse()
        .with_context(|| format!("Invalid bind address {}:{}", config.bind, config.port))?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Preview server at http://{}", addr);

    tokio::select! {
        result = scheduler.run(signals) => result?,
        result = axum::serve(listener, app).into_future() => result?,
    }

    Ok(())
}
