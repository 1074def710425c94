use async_trait::async_trait;
use chrono::NaiveDate;
use crate::types::{NewNewsItem, NewsItem};
use crate::Result;

#[async_trait]
pub trait NewsStorage: Send + Sync {
    /// All stored items, most recent `date` first
    async fn list_news(&self) -> Result<Vec<NewsItem>>;

    /// Get a single item by its storage id
    async fn get_news(&self, id: i64) -> Result<Option<NewsItem>>;

    /// Look up a story by its identity key
    async fn find_by_key(&self, title: &str, date: NaiveDate) -> Result<Option<NewsItem>>;

    /// Insert a new story. Fails with `Error::Duplicate` if the key is taken.
    async fn insert_news(&self, item: &NewNewsItem) -> Result<NewsItem>;

    /// Replace every editable field of an item
    async fn update_news(&self, id: i64, item: &NewNewsItem) -> Result<Option<NewsItem>>;

    /// Overwrite only the body and link of an item
    async fn update_content(&self, id: i64, content: &str, external_link: Option<&str>) -> Result<()>;

    /// Returns false when nothing was deleted
    async fn delete_news(&self, id: i64) -> Result<bool>;
}
