use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use sn_core::{Error, NewNewsItem, NewsItem, NewsStorage, Result};
use std::sync::Arc;
use tokio::sync::RwLock;
use crate::StorageBackend;

#[derive(Default)]
pub struct MemoryStore {
    items: Vec<NewsItem>,
    next_id: i64,
}

impl MemoryStore {
    pub fn insert(&mut self, item: &NewNewsItem) -> Result<NewsItem> {
        if self.find(&item.title, item.date).is_some() {
            return Err(Error::Duplicate {
                title: item.title.clone(),
                date: item.date,
            });
        }
        self.next_id += 1;
        let stored = NewsItem {
            id: self.next_id,
            title: item.title.clone(),
            content: item.content.clone(),
            source: item.source.clone(),
            date: item.date,
            important: item.important,
            external_link: item.external_link.clone(),
            created_at: Utc::now(),
        };
        self.items.push(stored.clone());
        Ok(stored)
    }

    pub fn find(&self, title: &str, date: NaiveDate) -> Option<&NewsItem> {
        self.items.iter().find(|item| item.title == title && item.date == date)
    }

    fn get_mut(&mut self, id: i64) -> Option<&mut NewsItem> {
        self.items.iter_mut().find(|item| item.id == id)
    }

    pub fn sorted(&self) -> Vec<NewsItem> {
        let mut items = self.items.clone();
        items.sort_by(|a, b| b.date.cmp(&a.date).then(b.id.cmp(&a.id)));
        items
    }
}

/// Process-local repository; used by tests and `--storage memory`.
#[derive(Clone, Default)]
pub struct MemoryStorage {
    store: Arc<RwLock<MemoryStore>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StorageBackend for MemoryStorage {
    fn get_error_message() -> &'static str {
        "Memory storage should be available"
    }

    async fn new() -> Result<Self> where Self: Sized {
        Ok(MemoryStorage::new())
    }
}

#[async_trait]
impl NewsStorage for MemoryStorage {
    async fn list_news(&self) -> Result<Vec<NewsItem>> {
        Ok(self.store.read().await.sorted())
    }

    async fn get_news(&self, id: i64) -> Result<Option<NewsItem>> {
        let store = self.store.read().await;
        Ok(store.items.iter().find(|item| item.id == id).cloned())
    }

    async fn find_by_key(&self, title: &str, date: NaiveDate) -> Result<Option<NewsItem>> {
        Ok(self.store.read().await.find(title, date).cloned())
    }

    async fn insert_news(&self, item: &NewNewsItem) -> Result<NewsItem> {
        self.store.write().await.insert(item)
    }

    async fn update_news(&self, id: i64, item: &NewNewsItem) -> Result<Option<NewsItem>> {
        let mut store = self.store.write().await;
        if let Some(existing) = store.find(&item.title, item.date) {
            if existing.id != id {
                return Err(Error::Duplicate {
                    title: item.title.clone(),
                    date: item.date,
                });
            }
        }
        Ok(store.get_mut(id).map(|stored| {
            stored.title = item.title.clone();
            stored.content = item.content.clone();
            stored.source = item.source.clone();
            stored.date = item.date;
            stored.important = item.important;
            stored.external_link = item.external_link.clone();
            stored.clone()
        }))
    }

    async fn update_content(&self, id: i64, content: &str, external_link: Option<&str>) -> Result<()> {
        let mut store = self.store.write().await;
        let stored = store.get_mut(id).ok_or(Error::NotFound(id))?;
        stored.content = content.to_string();
        stored.external_link = external_link.map(str::to_string);
        Ok(())
    }

    async fn delete_news(&self, id: i64) -> Result<bool> {
        let mut store = self.store.write().await;
        let before = store.items.len();
        store.items.retain(|item| item.id != id);
        Ok(store.items.len() != before)
    }
}
