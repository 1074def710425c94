use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sn_core::{Error, NewNewsItem, NewsItem, NewsStorage, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use crate::StorageBackend;

const MIGRATIONS: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS news (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        title TEXT NOT NULL,
        content TEXT NOT NULL,
        source TEXT NOT NULL,
        date TEXT NOT NULL,
        important INTEGER NOT NULL DEFAULT 0,
        external_link TEXT,
        created_at TEXT NOT NULL,
        UNIQUE (title, date)
    )
    "#,
    "CREATE INDEX IF NOT EXISTS news_date_idx ON news (date DESC)",
    // Add future migrations here
];

const DATE_FORMAT: &str = "%Y-%m-%d";

pub struct SQLiteStorage {
    pool: SqlitePool,
    db_path: Option<PathBuf>,
}

#[async_trait]
impl StorageBackend for SQLiteStorage {
    fn get_error_message() -> &'static str {
        "SQLite database should be available at ./news.db"
    }

    async fn new() -> Result<Self> {
        Self::new_with_path(Path::new("news.db")).await
    }
}

impl SQLiteStorage {
    pub async fn new_with_path(db_path: &Path) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true);
        let mut storage = Self::connect(options).await?;
        storage.db_path = Some(db_path.to_path_buf());
        Ok(storage)
    }

    /// A private database that disappears with the pool.
    pub async fn in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .map_err(|e| Error::Database(format!("Invalid connection string: {}", e)))?;
        Self::connect(options).await
    }

    async fn connect(options: SqliteConnectOptions) -> Result<Self> {
        // One shared connection; the pipeline never writes concurrently.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .map_err(|e| Error::Database(format!("Failed to connect to database: {}", e)))?;

        for (i, migration) in MIGRATIONS.iter().enumerate() {
            sqlx::query(migration)
                .execute(&pool)
                .await
                .map_err(|e| Error::Database(format!("Failed to run migration {}: {}", i, e)))?;
        }

        Ok(Self { pool, db_path: None })
    }

    pub fn get_db_path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }
}

fn row_to_item(row: &SqliteRow) -> Result<NewsItem> {
    let date: String = row.try_get("date").map_err(db_error)?;
    let created_at: String = row.try_get("created_at").map_err(db_error)?;
    let important: i64 = row.try_get("important").map_err(db_error)?;

    Ok(NewsItem {
        id: row.try_get("id").map_err(db_error)?,
        title: row.try_get("title").map_err(db_error)?,
        content: row.try_get("content").map_err(db_error)?,
        source: row.try_get("source").map_err(db_error)?,
        date: NaiveDate::parse_from_str(&date, DATE_FORMAT)
            .map_err(|e| Error::Database(format!("Failed to parse date {}: {}", date, e)))?,
        important: important != 0,
        external_link: row.try_get("external_link").map_err(db_error)?,
        created_at: DateTime::parse_from_rfc3339(&created_at)
            .map_err(|e| Error::Database(format!("Failed to parse timestamp {}: {}", created_at, e)))?
            .with_timezone(&Utc),
    })
}

fn db_error(e: sqlx::Error) -> Error {
    Error::Database(e.to_string())
}

fn write_error(e: sqlx::Error, item: &NewNewsItem) -> Error {
    let unique = e
        .as_database_error()
        .map_or(false, |db| db.is_unique_violation());
    if unique {
        Error::Duplicate {
            title: item.title.clone(),
            date: item.date,
        }
    } else {
        Error::Database(format!("Failed to store news item: {}", e))
    }
}

#[async_trait]
impl NewsStorage for SQLiteStorage {
    async fn list_news(&self) -> Result<Vec<NewsItem>> {
        let rows = sqlx::query("SELECT * FROM news ORDER BY date DESC, id DESC")
            .fetch_all(&self.pool)
            .await
            .map_err(db_error)?;
        rows.iter().map(row_to_item).collect()
    }

    async fn get_news(&self, id: i64) -> Result<Option<NewsItem>> {
        let row = sqlx::query("SELECT * FROM news WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error)?;
        row.as_ref().map(row_to_item).transpose()
    }

    async fn find_by_key(&self, title: &str, date: NaiveDate) -> Result<Option<NewsItem>> {
        let row = sqlx::query("SELECT * FROM news WHERE title = ? AND date = ?")
            .bind(title)
            .bind(date.format(DATE_FORMAT).to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error)?;
        row.as_ref().map(row_to_item).transpose()
    }

    async fn insert_news(&self, item: &NewNewsItem) -> Result<NewsItem> {
        let created_at = Utc::now();
        let result = sqlx::query(
            r#"
            INSERT INTO news
            (title, content, source, date, important, external_link, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&item.title)
        .bind(&item.content)
        .bind(&item.source)
        .bind(item.date.format(DATE_FORMAT).to_string())
        .bind(item.important as i64)
        .bind(item.external_link.as_deref())
        .bind(created_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| write_error(e, item))?;

        let id = result.last_insert_rowid();
        self.get_news(id)
            .await?
            .ok_or_else(|| Error::Storage(format!("Inserted news item {} vanished", id)))
    }

    async fn update_news(&self, id: i64, item: &NewNewsItem) -> Result<Option<NewsItem>> {
        let result = sqlx::query(
            r#"
            UPDATE news
            SET title = ?, content = ?, source = ?, date = ?, important = ?, external_link = ?
            WHERE id = ?
            "#,
        )
        .bind(&item.title)
        .bind(&item.content)
        .bind(&item.source)
        .bind(item.date.format(DATE_FORMAT).to_string())
        .bind(item.important as i64)
        .bind(item.external_link.as_deref())
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(|e| write_error(e, item))?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        self.get_news(id).await
    }

    async fn update_content(&self, id: i64, content: &str, external_link: Option<&str>) -> Result<()> {
        let result = sqlx::query("UPDATE news SET content = ?, external_link = ? WHERE id = ?")
            .bind(content)
            .bind(external_link)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| Error::Database(format!("Failed to update news content: {}", e)))?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound(id));
        }
        Ok(())
    }

    async fn delete_news(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM news WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(db_error)?;
        Ok(result.rows_affected() > 0)
    }
}
