//! Page fetching over plain HTTP.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tokio::time::Instant;

use crate::error::{AppError, Result};
use crate::models::{Config, FetchedPage, TargetConfig};
use crate::utils::http;
use crate::utils::text::{find_link_by_text, visible_text};

/// Source of rendered page text for the detector.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// URL loaded first, for logs and error context.
    fn entry_url(&self) -> &str;

    /// Retrieve the page to inspect.
    ///
    /// Implementations holding external resources enforce the fetch budget
    /// themselves, so they can release those resources when it runs out.
    async fn fetch(&self) -> Result<FetchedPage>;
}

/// Run `work` until `budget` after `started` has passed, mapping expiry to
/// [`AppError::Timeout`].
pub async fn within_budget<T>(
    url: &str,
    started: Instant,
    budget: Duration,
    work: impl Future<Output = Result<T>>,
) -> Result<T> {
    tokio::time::timeout_at(started + budget, work)
        .await
        .map_err(|_| AppError::timeout(url, budget.as_secs()))?
}

/// Fetches server-rendered HTML and extracts its visible text.
pub struct HttpFetcher {
    client: Client,
    target: TargetConfig,
    budget: Duration,
}

impl HttpFetcher {
    /// Create a fetcher with a client configured from `config.fetcher`.
    pub fn new(config: &Config) -> Result<Self> {
        let client = http::create_async_client(&config.fetcher)?;
        Ok(Self::with_client(
            client,
            config.target.clone(),
            Duration::from_secs(config.fetcher.timeout_secs),
        ))
    }

    pub fn with_client(client: Client, target: TargetConfig, budget: Duration) -> Self {
        Self {
            client,
            target,
            budget,
        }
    }

    async fn fetch_direct(&self) -> Result<FetchedPage> {
        let url = &self.target.film_url;
        log::info!("Fetching film page: {}", url);
        let html = http::fetch_text(&self.client, url).await?;
        Ok(FetchedPage::direct(url.as_str(), visible_text(&html)))
    }

    async fn fetch_via_cinema(&self) -> Result<FetchedPage> {
        let cinema_url = &self.target.cinema_url;
        log::info!("Fetching cinema page: {}", cinema_url);
        let cinema_html = http::fetch_text(&self.client, cinema_url).await?;

        let Some(film_url) = find_link_by_text(&cinema_html, cinema_url, &self.target.film_name)
        else {
            log::info!(
                "Film '{}' not listed on cinema page yet",
                self.target.film_name
            );
            return Ok(FetchedPage::film_not_listed(
                cinema_url.as_str(),
                visible_text(&cinema_html),
            ));
        };

        log::info!("Film found on cinema page, following {}", film_url);
        let film_html = http::fetch_text(&self.client, &film_url).await?;
        let text = visible_text(&film_html);
        Ok(FetchedPage::via_cinema(film_url, text))
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    fn entry_url(&self) -> &str {
        self.target.entry_url()
    }

    async fn fetch(&self) -> Result<FetchedPage> {
        let (url, started) = (self.entry_url(), Instant::now());
        if self.target.via_cinema_page {
            within_budget(url, started, self.budget, self.fetch_via_cinema()).await
        } else {
            within_budget(url, started, self.budget, self.fetch_direct()).await
        }
    }
}
