use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use sn_core::{Result, SourceProfile};
use sn_scrappers::cli::{handle_command, SyncArgs, SyncCommands};
use sn_scrappers::logging::init_logging;
use sn_scrappers::{start_daily_sync, NewsSync, DEFAULT_SYNC_CRON};
use sn_web::AppState;
use tracing::info;

#[derive(Parser, Debug)]
#[command(author, version, about = "Veterinary news synchronization for the shelter platform", long_about = None)]
pub struct Cli {
    /// Storage backend: memory or sqlite
    #[arg(long, env = "SN_STORAGE", default_value = "sqlite", global = true)]
    storage: String,
    /// SQLite database file (defaults to ./news.db)
    #[arg(long, env = "SN_DATABASE", global = true)]
    database: Option<PathBuf>,
    /// JSON source profile overriding the built-in markup assumptions
    #[arg(long, env = "SN_PROFILE", global = true)]
    profile: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Serve the HTTP API and run the daily sync
    Serve {
        #[arg(long, env = "SN_ADDR", default_value = "127.0.0.1:3000")]
        addr: SocketAddr,
        /// Cron expression for the daily sync, in local time
        #[arg(long, env = "SN_SYNC_CRON", default_value = DEFAULT_SYNC_CRON)]
        cron: String,
        /// Don't schedule the daily sync
        #[arg(long)]
        no_schedule: bool,
        /// Bearer token for the admin endpoints
        #[arg(long, env = "SN_ADMIN_TOKEN")]
        admin_token: Option<String>,
    },
    #[command(flatten)]
    Sync(SyncCommands),
}

fn load_profile(path: Option<&PathBuf>) -> Result<SourceProfile> {
    match path {
        Some(path) => {
            let profile = SourceProfile::from_file(path)?;
            info!("📄 Source profile loaded from {}", path.display());
            Ok(profile)
        }
        None => Ok(SourceProfile::default()),
    }
}

async fn serve(
    sync: Arc<NewsSync>,
    addr: SocketAddr,
    cron: Option<&str>,
    admin_token: Option<String>,
) -> Result<()> {
    // Kept alive for as long as the server runs.
    let _scheduler = match cron {
        Some(cron) => Some(start_daily_sync(sync.clone(), cron).await?),
        None => None,
    };

    if admin_token.is_none() {
        info!("🔒 No admin token configured, admin endpoints are disabled");
    }
    let app = sn_web::create_app(AppState::new(sync, admin_token)).await;

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {}", addr))?;
    info!("🌐 Listening on http://{}", addr);
    axum::serve(listener, app).await.context("serving HTTP")?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let logger = init_logging().with_prefix("[sn]");
    let cli = Cli::parse();

    let profile = load_profile(cli.profile.as_ref())?;
    let storage = sn_storage::create_storage(&cli.storage, cli.database.as_deref()).await?;
    let sync = Arc::new(NewsSync::with_http(storage, profile)?);
    logger.info(&format!("📰 News source: {}", sync.profile().name));

    match cli.command {
        Commands::Serve {
            addr,
            cron,
            no_schedule,
            admin_token,
        } => {
            let cron = (!no_schedule).then_some(cron.as_str());
            serve(sync, addr, cron, admin_token).await
        }
        Commands::Sync(command) => handle_command(SyncArgs { command }, &sync).await,
    }
}
