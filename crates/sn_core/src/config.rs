//! Everything the pipeline assumes about the upstream site's markup lives here,
//! so that a layout change on their side is a one-file change on ours.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::{Error, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceProfile {
    /// Publisher label stored in `NewsItem::source`
    pub name: String,
    pub base_url: String,
    pub listing_path: String,
    pub user_agent: String,
    pub listing_timeout_secs: u64,
    pub article_timeout_secs: u64,
    pub staleness_months: u32,
    pub min_title_chars: usize,
    /// Elements scanned on the listing page for date-prefixed headlines
    pub headline_selector: String,
    /// Pagination and accessibility captions that look like headlines
    pub ui_captions: Vec<String>,
    /// Lowercase stems; a title containing any of them is important
    pub important_keywords: Vec<String>,
    pub noise_selectors: Vec<String>,
    /// Main-content containers, highest priority first
    pub content_selectors: Vec<String>,
    /// Phrases introducing links to other stories inside an article
    pub headline_lead_ins: Vec<String>,
    pub photo_credit_prefixes: Vec<String>,
}

impl Default for SourceProfile {
    fn default() -> Self {
        Self {
            name: "Госветслужба".to_string(),
            base_url: "https://www.fsvps.gov.ru".to_string(),
            listing_path: "/news".to_string(),
            user_agent: concat!("shelter-news-sync/", env!("CARGO_PKG_VERSION")).to_string(),
            listing_timeout_secs: 15,
            article_timeout_secs: 30,
            staleness_months: 24,
            min_title_chars: 15,
            headline_selector: "a, p, span, div, li, td, h1, h2, h3, h4, h5, h6, strong, b".to_string(),
            ui_captions: strings(&[
                "Версия для слабовидящих",
                "Обычная версия сайта",
                "Следующая страница",
                "Предыдущая страница",
                "Показать ещё новости",
                "Показать еще новости",
                "Вернуться к списку новостей",
                "Архив новостей",
            ]),
            important_keywords: strings(&[
                "важн",
                "карантин",
                "бешенств",
                "опасн",
                "срочн",
                "обязательн",
                "вспышк",
            ]),
            noise_selectors: strings(&[
                "script",
                "style",
                "noscript",
                "iframe",
                "nav",
                "header",
                "footer",
                "aside",
                "time",
                ".sidebar",
                "[class*='sidebar']",
                "[class*='breadcrumb']",
                "[class*='related']",
                "[class*='similar']",
                "[class*='other-news']",
                "[class*='more-news']",
                "[class*='share']",
                "[class*='social']",
                "[class*='comment']",
                "[class*='byline']",
                "[class*='author']",
                "[class*='views']",
                "[class*='news-date']",
                ".date",
                ".meta",
            ]),
            content_selectors: strings(&[
                "[itemprop='articleBody']",
                "article",
                ".news-detail",
                ".news-text",
                ".article-body",
                ".article",
                ".entry-content",
                ".post-content",
                "#content",
                ".content",
                ".text",
                "main",
                "[role='main']",
            ]),
            headline_lead_ins: strings(&[
                "Читайте также",
                "Смотрите также",
                "Другие новости",
                "Похожие новости",
                "Последние новости",
                "Все новости",
            ]),
            photo_credit_prefixes: strings(&[
                "Фото:",
                "Фото -",
                "Фото —",
                "Фото с сайта",
                "Источник фото",
                "Photo:",
            ]),
        }
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl SourceProfile {
    /// Load a profile from JSON. Missing fields keep their defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let profile: Self = serde_json::from_str(&raw)?;
        profile.validate()?;
        Ok(profile)
    }

    pub fn validate(&self) -> Result<()> {
        self.base()?;
        if self.name.trim().is_empty() {
            return Err(Error::Config("source name must not be empty".to_string()));
        }
        if self.staleness_months == 0 {
            return Err(Error::Config("staleness_months must be positive".to_string()));
        }
        Ok(())
    }

    pub fn base(&self) -> Result<Url> {
        Url::parse(&self.base_url)
            .map_err(|e| Error::InvalidUrl(format!("{}: {}", self.base_url, e)))
    }

    pub fn listing_url(&self) -> Result<Url> {
        self.resolve(&self.listing_path)
    }

    /// Resolve an href found on the site against its origin.
    pub fn resolve(&self, href: &str) -> Result<Url> {
        self.base()?
            .join(href)
            .map_err(|e| Error::InvalidUrl(format!("{}: {}", href, e)))
    }

    pub fn is_same_origin(&self, url: &str) -> bool {
        match (self.base(), Url::parse(url)) {
            (Ok(base), Ok(url)) => base.origin() == url.origin(),
            _ => false,
        }
    }

    pub fn listing_timeout(&self) -> Duration {
        Duration::from_secs(self.listing_timeout_secs)
    }

    pub fn article_timeout(&self) -> Duration {
        Duration::from_secs(self.article_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_profile_is_valid() {
        let profile = SourceProfile::default();
        assert!(profile.validate().is_ok());
        assert!(profile.article_timeout() > profile.listing_timeout());
        assert_eq!(profile.listing_url().unwrap().as_str(), "https://www.fsvps.gov.ru/news");
    }

    #[test]
    fn test_resolve_and_origin() {
        let profile = SourceProfile {
            base_url: "https://vet.example.org".to_string(),
            ..SourceProfile::default()
        };
        let url = profile.resolve("/news/42").unwrap();
        assert_eq!(url.as_str(), "https://vet.example.org/news/42");
        assert!(profile.is_same_origin(url.as_str()));
        assert!(!profile.is_same_origin("https://elsewhere.example.org/news/42"));
        assert!(!profile.is_same_origin("not a url"));
    }

    #[test]
    fn test_partial_profile_file_keeps_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, r#"{{"base_url": "https://vet.example.org", "listing_path": "/press"}}"#).unwrap();
        let profile = SourceProfile::from_file(file.path()).unwrap();
        assert_eq!(profile.listing_url().unwrap().as_str(), "https://vet.example.org/press");
        assert_eq!(profile.staleness_months, 24);
        assert!(!profile.important_keywords.is_empty());
    }

    #[test]
    fn test_invalid_base_url_rejected() {
        let profile = SourceProfile {
            base_url: "::nope::".to_string(),
            ..SourceProfile::default()
        };
        assert!(matches!(profile.validate(), Err(Error::InvalidUrl(_))));
    }
}
