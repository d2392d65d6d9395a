//! Page fetching through a headless browser.
//!
//! Requires a WebDriver endpoint (e.g. `chromedriver --port=9515`). Used
//! when the cinema site renders its showtimes with JavaScript.

use std::time::Duration;

use tokio::time::Instant;

use async_trait::async_trait;
use regex::Regex;
use thirtyfour::{ChromiumLikeCapabilities, prelude::*};

use crate::error::{AppError, Result};
use crate::models::{Config, FetchedPage, TargetConfig};
use crate::services::PageFetcher;
use crate::services::within_budget;
use crate::utils::text::{label_matches, normalize_whitespace};

/// Consent-banner button labels, tried in order.
const CONSENT_LABELS: &[&str] = &[
    r"^tout accepter$",
    r"^accepter( et fermer)?$",
    r"^j'?accepte$",
    r"^continuer$",
    r"^ok$",
    r"^fermer$",
];

const CONSENT_ATTEMPTS: usize = 3;

/// Clickable elements a consent banner may use.
const CONSENT_CANDIDATES: &str = "button, a, [role='button']";

const LINK_POLL: Duration = Duration::from_millis(500);

/// Fetches rendered page text from a WebDriver-controlled Chrome.
pub struct BrowserFetcher {
    webdriver_url: String,
    render_wait: Duration,
    link_wait: Duration,
    budget: Duration,
    target: TargetConfig,
    consent: Vec<Regex>,
}

impl BrowserFetcher {
    pub fn new(config: &Config) -> Result<Self> {
        let consent = CONSENT_LABELS
            .iter()
            .map(|p| Regex::new(&format!("(?i){p}")))
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| AppError::config(format!("invalid consent pattern: {e}")))?;

        Ok(Self {
            webdriver_url: config.fetcher.webdriver_url.clone(),
            render_wait: Duration::from_millis(config.fetcher.render_wait_ms),
            link_wait: Duration::from_millis(config.fetcher.link_wait_ms),
            budget: Duration::from_secs(config.fetcher.timeout_secs),
            target: config.target.clone(),
            consent,
        })
    }

    async fn connect(&self) -> Result<WebDriver> {
        let mut caps = DesiredCapabilities::chrome();
        for arg in [
            "--headless=new",
            "--no-sandbox",
            "--disable-dev-shm-usage",
            "--disable-gpu",
            "--window-size=1920,1080",
        ] {
            caps.add_arg(arg)
                .map_err(|e| AppError::fetch(&self.webdriver_url, e))?;
        }

        WebDriver::new(&self.webdriver_url, caps)
            .await
            .map_err(|e| AppError::fetch(&self.webdriver_url, format!("WebDriver: {e}")))
    }

    /// Dismiss the cookie banner if one shows up. Never fails.
    async fn accept_cookies(&self, driver: &WebDriver) {
        for _ in 0..CONSENT_ATTEMPTS {
            let buttons = driver
                .find_all(By::Css(CONSENT_CANDIDATES))
                .await
                .unwrap_or_default();

            for pattern in &self.consent {
                for button in &buttons {
                    let Ok(label) = button.text().await else {
                        continue;
                    };
                    if pattern.is_match(normalize_whitespace(&label).as_str())
                        && button.click().await.is_ok()
                    {
                        log::info!("Cookie banner dismissed");
                        tokio::time::sleep(Duration::from_millis(400)).await;
                        return;
                    }
                }
            }
            tokio::time::sleep(Duration::from_millis(700)).await;
        }
    }

    async fn open(&self, driver: &WebDriver, url: &str) -> Result<()> {
        log::info!("Opening {}", url);
        driver
            .goto(url)
            .await
            .map_err(|e| AppError::fetch(url, e))?;
        tokio::time::sleep(self.render_wait).await;
        self.accept_cookies(driver).await;
        Ok(())
    }

    async fn body_text(driver: &WebDriver, url: &str) -> Result<String> {
        let body = driver
            .find(By::Tag("body"))
            .await
            .map_err(|e| AppError::fetch(url, e))?;
        body.text().await.map_err(|e| AppError::fetch(url, e))
    }

    /// Accessible name parts of a link: text, `title`, `aria-label`, image `alt`.
    async fn link_labels(link: &WebElement) -> Vec<String> {
        let mut labels = Vec::new();
        if let Ok(text) = link.text().await {
            labels.push(text);
        }
        for attr in ["title", "aria-label"] {
            if let Ok(Some(value)) = link.attr(attr).await {
                labels.push(value);
            }
        }
        for img in link.find_all(By::Tag("img")).await.unwrap_or_default() {
            if let Ok(Some(alt)) = img.attr("alt").await {
                labels.push(alt);
            }
        }
        labels
    }

    /// Poll the page for the film link until `link_wait` runs out.
    async fn find_film_link(&self, driver: &WebDriver) -> Option<WebElement> {
        let deadline = Instant::now() + self.link_wait;
        loop {
            for link in driver.find_all(By::Tag("a")).await.unwrap_or_default() {
                let labels = Self::link_labels(&link).await;
                if label_matches(&self.target.film_name, labels.iter().map(String::as_str)) {
                    return Some(link);
                }
            }
            if Instant::now() >= deadline {
                return None;
            }
            tokio::time::sleep(LINK_POLL).await;
        }
    }

    async fn scrape(&self, driver: &WebDriver) -> Result<FetchedPage> {
        if !self.target.via_cinema_page {
            let url = &self.target.film_url;
            self.open(driver, url).await?;
            let text = Self::body_text(driver, url).await?;
            return Ok(FetchedPage::direct(url.as_str(), text));
        }

        let cinema_url = &self.target.cinema_url;
        self.open(driver, cinema_url).await?;

        let Some(link) = self.find_film_link(driver).await else {
            log::info!(
                "Film '{}' not listed on cinema page yet",
                self.target.film_name
            );
            let text = Self::body_text(driver, cinema_url).await?;
            return Ok(FetchedPage::film_not_listed(cinema_url.as_str(), text));
        };

        link.click()
            .await
            .map_err(|e| AppError::fetch(cinema_url, format!("film link click: {e}")))?;
        tokio::time::sleep(self.render_wait).await;
        self.accept_cookies(driver).await;

        let film_url = driver
            .current_url()
            .await
            .map(|u| u.to_string())
            .unwrap_or_else(|_| self.target.film_url.clone());
        log::info!("Film page opened from cinema page: {}", film_url);

        let text = Self::body_text(driver, &film_url).await?;
        Ok(FetchedPage::via_cinema(film_url, text))
    }
}

#[async_trait]
impl PageFetcher for BrowserFetcher {
    fn entry_url(&self) -> &str {
        self.target.entry_url()
    }

    async fn fetch(&self) -> Result<FetchedPage> {
        let (url, started) = (self.entry_url(), Instant::now());
        let driver = within_budget(url, started, self.budget, self.connect()).await?;

        // The session is closed below on every outcome, timeout included.
        let result = within_budget(url, started, self.budget, self.scrape(&driver)).await;

        if let Err(e) = driver.quit().await {
            log::warn!("Failed to quit browser: {}", e);
        }

        result
    }
}
