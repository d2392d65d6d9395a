//! Application configuration structures.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{AppError, Result};

/// Root application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Film and cinema being watched
    #[serde(default)]
    pub target: TargetConfig,

    /// Availability heuristic settings
    #[serde(default)]
    pub detection: DetectionConfig,

    /// Page fetching behavior
    #[serde(default)]
    pub fetcher: FetcherConfig,

    /// SMTP delivery settings (secrets come from the environment)
    #[serde(default)]
    pub mail: MailConfig,

    /// Persisted state location
    #[serde(default)]
    pub storage: StorageConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration or return default if loading fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(&path).unwrap_or_else(|e| {
            log::warn!(
                "Config load failed from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            Self::default()
        })
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.target.film_name.trim().is_empty() {
            return Err(AppError::validation("target.film_name is empty"));
        }
        Url::parse(&self.target.film_url)
            .map_err(|e| AppError::validation(format!("target.film_url: {e}")))?;
        Url::parse(&self.target.cinema_url)
            .map_err(|e| AppError::validation(format!("target.cinema_url: {e}")))?;
        if self.detection.cinema_keyword.trim().is_empty() {
            return Err(AppError::validation("detection.cinema_keyword is empty"));
        }
        if self
            .detection
            .reservation_signals
            .iter()
            .any(|s| s.trim().is_empty())
        {
            return Err(AppError::validation(
                "detection.reservation_signals contains an empty entry",
            ));
        }
        if self.fetcher.user_agent.trim().is_empty() {
            return Err(AppError::validation("fetcher.user_agent is empty"));
        }
        if self.fetcher.timeout_secs == 0 {
            return Err(AppError::validation("fetcher.timeout_secs must be > 0"));
        }
        if self.mail.smtp_host.trim().is_empty() {
            return Err(AppError::validation("mail.smtp_host is empty"));
        }
        if self.mail.timeout_secs == 0 {
            return Err(AppError::validation("mail.timeout_secs must be > 0"));
        }
        if self.storage.state_file.trim().is_empty() {
            return Err(AppError::validation("storage.state_file is empty"));
        }
        Ok(())
    }
}

/// The film and cinema being watched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetConfig {
    /// Film title as displayed on the cinema site
    #[serde(default = "defaults::film_name")]
    pub film_name: String,

    /// Film page URL
    #[serde(default = "defaults::film_url")]
    pub film_url: String,

    /// Cinema display name used in notifications
    #[serde(default = "defaults::cinema_name")]
    pub cinema_name: String,

    /// Cinema page URL
    #[serde(default = "defaults::cinema_url")]
    pub cinema_url: String,

    /// Reach the film page by following its link from the cinema page
    #[serde(default = "defaults::via_cinema_page")]
    pub via_cinema_page: bool,
}

impl TargetConfig {
    /// URL of the first page the fetcher loads.
    pub fn entry_url(&self) -> &str {
        if self.via_cinema_page {
            &self.cinema_url
        } else {
            &self.film_url
        }
    }
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            film_name: defaults::film_name(),
            film_url: defaults::film_url(),
            cinema_name: defaults::cinema_name(),
            cinema_url: defaults::cinema_url(),
            via_cinema_page: defaults::via_cinema_page(),
        }
    }
}

/// Availability heuristic settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionConfig {
    /// Cinema keyword that must appear on the page
    #[serde(default = "defaults::cinema_keyword")]
    pub cinema_keyword: String,

    /// Substrings indicating a booking call-to-action
    #[serde(default = "defaults::reservation_signals")]
    pub reservation_signals: Vec<String>,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            cinema_keyword: defaults::cinema_keyword(),
            reservation_signals: defaults::reservation_signals(),
        }
    }
}

/// How the page is retrieved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum FetchMode {
    /// Plain HTTP GET, text extracted from the HTML body
    #[default]
    Http,
    /// Headless browser through a WebDriver endpoint
    Browser,
}

/// Page fetching behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetcherConfig {
    #[serde(default)]
    pub mode: FetchMode,

    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Time budget for the whole fetch, in seconds
    #[serde(default = "defaults::fetch_timeout")]
    pub timeout_secs: u64,

    /// WebDriver endpoint for browser mode
    #[serde(default = "defaults::webdriver_url")]
    pub webdriver_url: String,

    /// Pause after navigation so scripts can render, in milliseconds
    #[serde(default = "defaults::render_wait")]
    pub render_wait_ms: u64,

    /// How long browser mode waits for the film link to show up, in milliseconds
    #[serde(default = "defaults::link_wait")]
    pub link_wait_ms: u64,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            mode: FetchMode::default(),
            user_agent: defaults::user_agent(),
            timeout_secs: defaults::fetch_timeout(),
            webdriver_url: defaults::webdriver_url(),
            render_wait_ms: defaults::render_wait(),
            link_wait_ms: defaults::link_wait(),
        }
    }
}

/// SMTP delivery settings.
///
/// Credentials and sender address are never read from this file; see
/// [`MailCredentials::resolve`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailConfig {
    #[serde(default = "defaults::smtp_host")]
    pub smtp_host: String,

    #[serde(default = "defaults::smtp_port")]
    pub smtp_port: u16,

    /// Default recipient, overridden by `ALERT_TO`
    #[serde(default)]
    pub recipient: Option<String>,

    /// SMTP session timeout in seconds
    #[serde(default = "defaults::mail_timeout")]
    pub timeout_secs: u64,
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            smtp_host: defaults::smtp_host(),
            smtp_port: defaults::smtp_port(),
            recipient: None,
            timeout_secs: defaults::mail_timeout(),
        }
    }
}

/// SMTP secrets resolved from the process environment.
#[derive(Clone)]
pub struct MailCredentials {
    pub user: String,
    pub password: String,
    pub from: String,
    pub to: String,
}

impl MailCredentials {
    pub const USER_VAR: &'static str = "SMTP_USER";
    pub const PASSWORD_VAR: &'static str = "SMTP_PASSWORD";
    pub const FROM_VAR: &'static str = "MAIL_FROM";
    pub const TO_VAR: &'static str = "ALERT_TO";

    /// Resolve credentials through an arbitrary variable lookup.
    pub fn resolve(mail: &MailConfig, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let to = get(Self::TO_VAR).or_else(|| mail.recipient.clone());
        let fields = [
            (Self::USER_VAR, get(Self::USER_VAR)),
            (Self::PASSWORD_VAR, get(Self::PASSWORD_VAR)),
            (Self::FROM_VAR, get(Self::FROM_VAR)),
            (Self::TO_VAR, to),
        ];

        let missing: Vec<&str> = fields
            .iter()
            .filter(|(_, value)| value.is_none())
            .map(|(key, _)| *key)
            .collect();
        if !missing.is_empty() {
            return Err(AppError::mail(format!(
                "missing SMTP settings: {}",
                missing.join(", ")
            )));
        }

        let [(_, user), (_, password), (_, from), (_, to)] = fields;
        Ok(Self {
            user: user.unwrap_or_default(),
            password: password.unwrap_or_default(),
            from: from.unwrap_or_default(),
            to: to.unwrap_or_default(),
        })
    }
}

impl std::fmt::Debug for MailCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MailCredentials")
            .field("user", &self.user)
            .field("password", &"***")
            .field("from", &self.from)
            .field("to", &self.to)
            .finish()
    }
}

/// Persisted state location.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// JSON file holding the last observed status
    #[serde(default = "defaults::state_file")]
    pub state_file: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            state_file: defaults::state_file(),
        }
    }
}

mod defaults {
    // Target defaults
    pub fn film_name() -> String {
        "Avatar : De feu et de cendres".into()
    }
    pub fn film_url() -> String {
        "https://www.pathe.fr/films/avatar-de-feu-et-de-cendres-11387".into()
    }
    pub fn cinema_name() -> String {
        "Pathé Brumath".into()
    }
    pub fn cinema_url() -> String {
        "https://www.pathe.fr/cinemas/cinema-pathe-brumath".into()
    }
    pub fn via_cinema_page() -> bool {
        true
    }

    // Detection defaults
    pub fn cinema_keyword() -> String {
        "Brumath".into()
    }
    pub fn reservation_signals() -> Vec<String> {
        vec![
            "réserver".into(),
            "reserver".into(),
            "e-billet".into(),
            "billetterie".into(),
        ]
    }

    // Fetcher defaults
    pub fn user_agent() -> String {
        "Mozilla/5.0 (compatible; showtime-watch/0.1)".into()
    }
    pub fn fetch_timeout() -> u64 {
        45
    }
    pub fn webdriver_url() -> String {
        "http://localhost:9515".into()
    }
    pub fn render_wait() -> u64 {
        1500
    }
    pub fn link_wait() -> u64 {
        8000
    }

    // Mail defaults
    pub fn smtp_host() -> String {
        "smtp-relay.brevo.com".into()
    }
    pub fn smtp_port() -> u16 {
        587
    }
    pub fn mail_timeout() -> u64 {
        30
    }

    // Storage defaults
    pub fn state_file() -> String {
        "state.json".into()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn validate_default_config_ok() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn validate_rejects_empty_keyword() {
        let mut config = Config::default();
        config.detection.cinema_keyword = "  ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_timeout() {
        let mut config = Config::default();
        config.fetcher.timeout_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_bad_url() {
        let mut config = Config::default();
        config.target.cinema_url = "not a url".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn partial_toml_falls_back_to_defaults() {
        let config: Config = toml::from_str(
            r#"
            [target]
            film_name = "Dune"

            [fetcher]
            mode = "browser"
            "#,
        )
        .unwrap();

        assert_eq!(config.target.film_name, "Dune");
        assert_eq!(config.target.cinema_name, "Pathé Brumath");
        assert_eq!(config.fetcher.mode, FetchMode::Browser);
        assert_eq!(config.fetcher.timeout_secs, 45);
        assert_eq!(config.fetcher.link_wait_ms, 8000);
        assert_eq!(config.detection.reservation_signals.len(), 4);
        assert_eq!(config.storage.state_file, "state.json");
    }

    #[test]
    fn entry_url_follows_navigation_mode() {
        let mut target = TargetConfig::default();
        assert_eq!(target.entry_url(), target.cinema_url);
        target.via_cinema_page = false;
        assert_eq!(target.entry_url(), target.film_url);
    }

    #[test]
    fn credentials_resolve_with_recipient_fallback() {
        let env: HashMap<&str, &str> = [
            ("SMTP_USER", "user"),
            ("SMTP_PASSWORD", "secret"),
            ("MAIL_FROM", "bot@example.com"),
        ]
        .into_iter()
        .collect();
        let mail = MailConfig {
            recipient: Some("me@example.com".into()),
            ..MailConfig::default()
        };

        let creds =
            MailCredentials::resolve(&mail, |k| env.get(k).map(|v| v.to_string())).unwrap();
        assert_eq!(creds.to, "me@example.com");
        assert_eq!(creds.from, "bot@example.com");
        assert!(!format!("{creds:?}").contains("secret"));
    }

    #[test]
    fn credentials_report_missing_variables() {
        let err = MailCredentials::resolve(&MailConfig::default(), |_| None).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("SMTP_USER"));
        assert!(message.contains("ALERT_TO"));
    }
}
