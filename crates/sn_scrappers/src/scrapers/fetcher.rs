use std::time::Duration;

use async_trait::async_trait;
use sn_core::{Error, Result, SourceProfile};
use tracing::debug;

/// Retrieves raw HTML. The pipeline only ever talks to the network
/// through this seam, so tests can serve pages from memory.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &str, timeout: Duration) -> Result<String>;
}

#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(user_agent: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .build()?;
        Ok(Self { client })
    }

    pub fn for_profile(profile: &SourceProfile) -> Result<Self> {
        Self::new(&profile.user_agent)
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &str, timeout: Duration) -> Result<String> {
        debug!(%url, ?timeout, "Fetching page");
        let response = self
            .client
            .get(url)
            .timeout(timeout)
            .send()
            .await?
            .error_for_status()?;
        let body = response.text().await?;
        if body.trim().is_empty() {
            return Err(Error::Scraping(format!("Empty response body from {}", url)));
        }
        Ok(body)
    }
}
