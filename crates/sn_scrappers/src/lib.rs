pub mod cli;
pub mod logging;
pub mod manager;
pub mod reconciler;
pub mod scheduler;
pub mod scrapers;

pub use cli::{handle_command, SyncArgs, SyncCommands};
pub use manager::{NewsSync, RunOutcome, SyncPhase, SyncStatus, SyncTrigger};
pub use reconciler::{NewsStatus, Reconciler};
pub use scheduler::{start_daily_sync, DEFAULT_SYNC_CRON};
pub use scrapers::{ArticleEnricher, HttpFetcher, ListingExtractor, PageFetcher};

pub mod prelude {
    pub use super::manager::{NewsSync, SyncTrigger};
    pub use super::scrapers::PageFetcher;
    pub use sn_core::{Candidate, Error, NewsItem, Result, SyncReport};
}
