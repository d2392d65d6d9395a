//! Service layer for the watcher.
//!
//! This module contains the business logic for:
//! - Availability detection (`AvailabilityDetector`)
//! - Page fetching (`HttpFetcher`, `BrowserFetcher` with the `browser` feature)
//! - Alert delivery (`SmtpMailer`, `LogMailer`)

#[cfg(feature = "browser")]
mod browser;
mod detector;
mod fetcher;
mod mailer;

#[cfg(feature = "browser")]
pub use browser::BrowserFetcher;
pub use detector::AvailabilityDetector;
pub use fetcher::{HttpFetcher, PageFetcher, within_budget};
pub use mailer::{LogMailer, Mailer, SmtpMailer, build_message};

use crate::error::Result;
use crate::models::{Config, FetchMode};

/// Build the fetcher selected by `fetcher.mode`.
pub fn create_fetcher(config: &Config) -> Result<Box<dyn PageFetcher>> {
    match config.fetcher.mode {
        FetchMode::Http => Ok(Box::new(HttpFetcher::new(config)?)),
        #[cfg(feature = "browser")]
        FetchMode::Browser => Ok(Box::new(BrowserFetcher::new(config)?)),
        #[cfg(not(feature = "browser"))]
        FetchMode::Browser => Err(crate::error::AppError::config(
            "fetcher.mode = \"browser\" requires the `browser` feature",
        )),
    }
}
