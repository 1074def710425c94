use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Suffix appended to a headline when no real body could be found for it.
pub const PLACEHOLDER_SUFFIX: &str = ". Подробнее на сайте источника.";

/// A persisted news story. Identity is `(title, date)`; `id` is storage-internal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewsItem {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub source: String,
    pub date: NaiveDate,
    pub important: bool,
    pub external_link: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Fields of a news item before the store assigns `id` and `createdAt`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewNewsItem {
    pub title: String,
    pub content: String,
    pub source: String,
    pub date: NaiveDate,
    #[serde(default)]
    pub important: bool,
    #[serde(default)]
    pub external_link: Option<String>,
}

/// A news record extracted during the current run, not yet reconciled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub title: String,
    pub date: NaiveDate,
    pub content: String,
    pub important: bool,
    pub link: Option<String>,
}

impl Candidate {
    pub fn has_placeholder(&self) -> bool {
        is_placeholder(&self.content, &self.title)
    }

    pub fn into_new_item(self, source: &str) -> NewNewsItem {
        NewNewsItem {
            title: self.title,
            content: self.content,
            source: source.to_string(),
            date: self.date,
            important: self.important,
            external_link: self.link,
        }
    }
}

pub fn placeholder_content(title: &str) -> String {
    format!("{}{}", title, PLACEHOLDER_SUFFIX)
}

/// Bare titles and synthesized "read more" bodies are both placeholders.
pub fn is_placeholder(content: &str, title: &str) -> bool {
    let content = content.trim();
    content == title.trim()
        || content
            .strip_suffix(PLACEHOLDER_SUFFIX)
            .map_or(false, |head| head == title.trim())
}

/// Outcome of one full pipeline run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncReport {
    /// Newly inserted stories.
    pub saved: usize,
    /// Stored stories whose content was upgraded.
    pub updated: usize,
    pub skipped: usize,
    pub total: usize,
}

/// Outcome of re-enriching already stored items.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentUpdateReport {
    pub checked: usize,
    pub updated: usize,
}
