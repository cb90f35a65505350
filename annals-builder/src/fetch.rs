use std::collections::HashMap;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::task::JoinSet;
use tracing::{debug, warn};

const USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) annals-builder/0.1 (historical map data prep)";

/// Seam between the scrapers and the network, so parsers and walks run
/// against canned pages in tests.
#[async_trait]
pub trait PageSource: Send + Sync {
    async fn fetch_page(&self, url: &str) -> Result<String>;

    /// Fetch many pages, keyed by URL. Per-URL failures are returned, not
    /// raised. The default is sequential; live sources may batch.
    async fn fetch_pages(&self, urls: &[String]) -> HashMap<String, Result<String>> {
        let mut results = HashMap::with_capacity(urls.len());
        for url in urls {
            results.insert(url.clone(), self.fetch_page(url).await);
        }
        results
    }
}

/// Live HTTP fetcher: one retry round after a fixed delay, matching the old
/// scripts' wait-and-try-again habit, and batched concurrent GETs with a
/// pause between batches to stay under the rate limits.
pub struct HttpFetcher {
    client: reqwest::Client,
    pub max_attempts: u32,
    pub retry_delay: Duration,
    pub batch_size: usize,
    pub batch_pause: Duration,
}

impl HttpFetcher {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(30))
            .build()
            .context("building http client")?;
        Ok(HttpFetcher {
            client,
            max_attempts: 3,
            retry_delay: Duration::from_secs(5),
            batch_size: 5,
            batch_pause: Duration::from_secs(2),
        })
    }

    async fn get_text(&self, url: &str) -> Result<String> {
        let mut last_err = None;
        for attempt in 1..=self.max_attempts {
            match self.try_get(url).await {
                Ok(body) => return Ok(body),
                Err(e) => {
                    warn!(url, attempt, error = %e, "fetch failed");
                    last_err = Some(e);
                    if attempt < self.max_attempts {
                        tokio::time::sleep(self.retry_delay).await;
                    }
                }
            }
        }
        Err(last_err.unwrap_or_else(|| anyhow::anyhow!("no attempts made for {url}")))
    }

    async fn try_get(&self, url: &str) -> Result<String> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .with_context(|| format!("GET {url}"))?
            .error_for_status()
            .with_context(|| format!("GET {url}"))?;
        let body = response.text().await.with_context(|| format!("reading {url}"))?;
        debug!(url, bytes = body.len(), "fetched");
        Ok(body)
    }

    /// Fetch a set of URLs in fixed-size concurrent batches with a pause
    /// between batches. Per-URL failures are returned, not raised.
    pub async fn fetch_batched(&self, urls: &[String]) -> HashMap<String, Result<String>> {
        let mut results = HashMap::with_capacity(urls.len());

        for (i, batch) in urls.chunks(self.batch_size.max(1)).enumerate() {
            if i > 0 {
                tokio::time::sleep(self.batch_pause).await;
            }
            let mut set = JoinSet::new();
            for url in batch {
                let url = url.clone();
                let client = self.client.clone();
                set.spawn(async move {
                    let res = async {
                        let response = client
                            .get(&url)
                            .send()
                            .await
                            .with_context(|| format!("GET {url}"))?
                            .error_for_status()
                            .with_context(|| format!("GET {url}"))?;
                        response.text().await.with_context(|| format!("reading {url}"))
                    }
                    .await;
                    (url, res)
                });
            }
            while let Some(joined) = set.join_next().await {
                match joined {
                    Ok((url, res)) => {
                        results.insert(url, res);
                    }
                    Err(e) => warn!(error = %e, "fetch task panicked"),
                }
            }
        }

        results
    }
}

#[async_trait]
impl PageSource for HttpFetcher {
    async fn fetch_page(&self, url: &str) -> Result<String> {
        self.get_text(url).await
    }

    async fn fetch_pages(&self, urls: &[String]) -> HashMap<String, Result<String>> {
        self.fetch_batched(urls).await
    }
}

/// Canned pages for tests and offline reprocessing.
#[derive(Debug, Default)]
pub struct StaticPages {
    pages: HashMap<String, String>,
}

impl StaticPages {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, url: impl Into<String>, body: impl Into<String>) {
        self.pages.insert(url.into(), body.into());
    }
}

#[async_trait]
impl PageSource for StaticPages {
    async fn fetch_page(&self, url: &str) -> Result<String> {
        self.pages
            .get(url)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("no canned page for {url}"))
    }
}
