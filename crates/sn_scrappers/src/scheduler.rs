use std::sync::Arc;

use anyhow::anyhow;
use sn_core::{Error, Result};
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::info;

use crate::manager::{NewsSync, SyncTrigger};

/// Every day at 06:00 local time (sec min hour day month weekday).
pub const DEFAULT_SYNC_CRON: &str = "0 0 6 * * *";

/// Register the daily fire-and-forget sync and start the scheduler. The
/// returned scheduler must be kept alive for the job to keep firing.
pub async fn start_daily_sync(sync: Arc<NewsSync>, cron: &str) -> Result<JobScheduler> {
    let job = Job::new_async_tz(cron, chrono::Local, move |_uuid, _scheduler| {
        let sync = sync.clone();
        Box::pin(async move {
            info!("⏰ Scheduled sync triggered");
            if sync.spawn_sync() == SyncTrigger::AlreadyRunning {
                info!("⏰ Previous run still active, skipping this tick");
            }
        })
    })
    .map_err(|e| Error::Config(format!("Invalid cron expression {:?}: {:?}", cron, e)))?;

    let scheduler = JobScheduler::new()
        .await
        .map_err(|e| Error::External(anyhow!("Failed to create scheduler: {:?}", e)))?;
    scheduler
        .add(job)
        .await
        .map_err(|e| Error::External(anyhow!("Failed to schedule sync job: {:?}", e)))?;
    scheduler
        .start()
        .await
        .map_err(|e| Error::External(anyhow!("Failed to start scheduler: {:?}", e)))?;

    info!("📅 Daily sync scheduled ({})", cron);
    Ok(scheduler)
}
