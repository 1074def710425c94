use std::collections::HashSet;
use std::sync::Arc;

use chrono::NaiveDate;
use sn_core::{is_placeholder, Candidate, Error, NewsItem, NewsStorage, Result, SyncReport};
use tracing::{debug, info};

const SHORT_CONTENT_CHARS: usize = 50;
const BRIEF_CONTENT_CHARS: usize = 100;

/// What merging one candidate did to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NewsStatus {
    New,
    Updated,
    Unchanged,
}

/// Whether `content` may replace what is stored for `stored`.
///
/// Content only ever grows: the replacement must be strictly longer, and the
/// stored body must look incomplete (a placeholder, very short, or brief
/// while the replacement is not).
pub fn should_upgrade(stored: &NewsItem, content: &str) -> bool {
    let current = stored.content.chars().count();
    let candidate = content.chars().count();
    if candidate <= current {
        return false;
    }
    let stored_placeholder = is_placeholder(&stored.content, &stored.title);
    if is_placeholder(content, &stored.title) && !stored_placeholder {
        return false;
    }
    stored_placeholder
        || current < SHORT_CONTENT_CHARS
        || (current < BRIEF_CONTENT_CHARS && candidate > BRIEF_CONTENT_CHARS)
}

/// Stored content that some longer body could still replace.
pub fn needs_content(stored: &NewsItem) -> bool {
    is_placeholder(&stored.content, &stored.title)
        || stored.content.chars().count() < BRIEF_CONTENT_CHARS
}

/// Insert-or-upgrade merge of candidates into the store, keyed by
/// `(title, date)`.
pub struct Reconciler {
    storage: Arc<dyn NewsStorage>,
    source: String,
}

impl Reconciler {
    pub fn new(storage: Arc<dyn NewsStorage>, source: impl Into<String>) -> Self {
        Self {
            storage,
            source: source.into(),
        }
    }

    pub async fn reconcile(&self, candidates: Vec<Candidate>) -> Result<SyncReport> {
        let mut report = SyncReport {
            total: candidates.len(),
            ..SyncReport::default()
        };
        let mut seen: HashSet<(String, NaiveDate)> = HashSet::new();

        for candidate in candidates {
            if !seen.insert((candidate.title.clone(), candidate.date)) {
                report.skipped += 1;
                continue;
            }
            match self.merge(candidate).await? {
                NewsStatus::New => report.saved += 1,
                NewsStatus::Updated => report.updated += 1,
                NewsStatus::Unchanged => report.skipped += 1,
            }
        }

        info!(
            saved = report.saved,
            updated = report.updated,
            skipped = report.skipped,
            total = report.total,
            "Reconciliation finished"
        );
        Ok(report)
    }

    pub async fn merge(&self, candidate: Candidate) -> Result<NewsStatus> {
        if let Some(stored) = self.storage.find_by_key(&candidate.title, candidate.date).await? {
            let upgraded = self
                .upgrade(&stored, &candidate.content, candidate.link.as_deref())
                .await?;
            return Ok(if upgraded {
                NewsStatus::Updated
            } else {
                NewsStatus::Unchanged
            });
        }

        let item = candidate.into_new_item(&self.source);
        match self.storage.insert_news(&item).await {
            Ok(stored) => {
                debug!(id = stored.id, title = %stored.title, "Stored new item");
                Ok(NewsStatus::New)
            }
            // Another run inserted the same story first.
            Err(Error::Duplicate { title, date }) => {
                debug!(%title, %date, "Insert lost to a concurrent writer");
                Ok(NewsStatus::Unchanged)
            }
            Err(e) => Err(e),
        }
    }

    /// Apply `content` to `stored` if it passes the upgrade rule. A missing
    /// `link` keeps the stored one.
    pub async fn upgrade(&self, stored: &NewsItem, content: &str, link: Option<&str>) -> Result<bool> {
        if !should_upgrade(stored, content) {
            return Ok(false);
        }
        let link = link.or(stored.external_link.as_deref());
        self.storage.update_content(stored.id, content, link).await?;
        debug!(id = stored.id, title = %stored.title, "Upgraded stored content");
        Ok(true)
    }
}
