use clap::{Args, Subcommand};
use sn_core::{NewsItem, Result};

use crate::manager::NewsSync;

#[derive(Args, Debug)]
pub struct SyncArgs {
    #[command(subcommand)]
    pub command: SyncCommands,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum SyncCommands {
    /// Run the pipeline once and wait for the report
    Sync,
    /// Re-fetch article bodies for stored items with thin content
    UpdateContent,
    /// List stored news, newest first
    List {
        /// Show at most this many items
        #[arg(short, long)]
        limit: Option<usize>,
    },
}

pub async fn handle_command(args: SyncArgs, sync: &NewsSync) -> Result<()> {
    match args.command {
        SyncCommands::Sync => {
            let report = sync.sync_now().await?;
            println!(
                "🆕 {} saved, 📝 {} updated, ⏭️ {} skipped ({} candidates)",
                report.saved, report.updated, report.skipped, report.total
            );
        }
        SyncCommands::UpdateContent => {
            let report = sync.update_content().await?;
            println!("📝 {} of {} checked items updated", report.updated, report.checked);
        }
        SyncCommands::List { limit } => {
            let items = sync.storage().list_news().await?;
            if items.is_empty() {
                println!("No news stored yet");
            }
            for item in items.iter().take(limit.unwrap_or(usize::MAX)) {
                println!("{}", format_item(item));
            }
        }
    }
    Ok(())
}

fn format_item(item: &NewsItem) -> String {
    let marker = if item.important { "❗" } else { "📰" };
    match &item.external_link {
        Some(link) => format!("{} [{}] #{} {} - {}", marker, item.date, item.id, item.title, link),
        None => format!("{} [{}] #{} {}", marker, item.date, item.id, item.title),
    }
}
