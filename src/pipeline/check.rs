// src/pipeline/check.rs

//! One scheduled availability check.
//!
//! Load state → fetch → detect → decide → alert → save. Anything that fails
//! before the save leaves the persisted state as it was; a failed alert does
//! not prevent the save.

use std::time::Duration;

use chrono::Utc;

use crate::error::{AppError, Result};
use crate::models::{
    AvailabilityStatus, Config, Detection, FetchedPage, Notification, PersistedState,
};
use crate::pipeline::transition::{NotificationAction, decide, next_state};
use crate::services::{AvailabilityDetector, Mailer, PageFetcher};
use crate::storage::StateStore;

/// Extra time a fetcher gets past its budget to close what it opened.
const FETCH_GRACE: Duration = Duration::from_secs(5);

/// Everything a completed check observed and did.
#[derive(Debug, Clone)]
pub struct CheckOutcome {
    pub previous: Option<PersistedState>,
    pub page: FetchedPage,
    pub detection: Detection,
    /// Final status; unavailable whenever the film is not listed
    pub status: AvailabilityStatus,
    pub action: NotificationAction,
    /// Whether an alert was actually delivered
    pub delivered: bool,
    pub state: PersistedState,
}

/// Run the check once against the given collaborators.
pub async fn run_check(
    config: &Config,
    detector: &AvailabilityDetector,
    fetcher: &dyn PageFetcher,
    mailer: &dyn Mailer,
    store: &dyn StateStore,
) -> Result<CheckOutcome> {
    let previous = store.load().await?;
    match &previous {
        Some(state) => log::info!(
            "Previous status: {} (checked {})",
            state.status,
            state.last_checked
        ),
        None => log::info!("No previous status"),
    }

    // Fetchers enforce the budget themselves; this only catches one that hangs.
    let timeout_secs = config.fetcher.timeout_secs;
    let page = tokio::time::timeout(
        Duration::from_secs(timeout_secs) + FETCH_GRACE,
        fetcher.fetch(),
    )
    .await
    .map_err(|_| AppError::timeout(fetcher.entry_url(), timeout_secs))??;

    let detection = detector.detect(&page.text);
    let status = if page.is_film_listed() {
        detection.status
    } else {
        AvailabilityStatus::Unavailable
    };
    log::info!(
        "film_listed={:?} keyword_found={} reservation_signal={} nb_horaires={} => {}",
        page.film_listed,
        detection.evidence.keyword_found,
        detection.evidence.reservation_signal_found,
        detection.evidence.time_pattern_count,
        status
    );

    let action = decide(previous.as_ref().map(|s| s.status), status);
    let now = Utc::now();

    let delivered = match action {
        NotificationAction::Notify => {
            log::info!("Transition to available, sending alert");
            let notification = Notification::availability(&config.target, &page, &detection, now);
            match mailer.send(&notification).await {
                Ok(()) => true,
                Err(e) => {
                    log::error!("Alert not delivered: {}", e);
                    false
                }
            }
        }
        NotificationAction::Skip => {
            log::info!("No unavailable -> available transition");
            false
        }
    };

    let state = next_state(previous.as_ref(), status, now);
    store.save(&state).await?;
    log::info!("State saved: {}", state.status);

    Ok(CheckOutcome {
        previous,
        page,
        detection,
        status,
        action,
        delivered,
        state,
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, Ordering};

    use async_trait::async_trait;
    use chrono::TimeZone;
    use tokio::time::Instant;

    use super::*;
    use crate::models::MailConfig;
    use crate::services::SmtpMailer;
    use crate::services::within_budget;

    struct StaticFetcher(FetchedPage);

    #[async_trait]
    impl PageFetcher for StaticFetcher {
        fn entry_url(&self) -> &str {
            &self.0.url
        }

        async fn fetch(&self) -> Result<FetchedPage> {
            Ok(self.0.clone())
        }
    }

    struct HangingFetcher;

    #[async_trait]
    impl PageFetcher for HangingFetcher {
        fn entry_url(&self) -> &str {
            "https://example.com/slow"
        }

        async fn fetch(&self) -> Result<FetchedPage> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(FetchedPage::direct("https://example.com/slow", "Brumath 14:30"))
        }
    }

    /// Holds a session that must be released even when the page never loads.
    struct SessionFetcher {
        budget: Duration,
        released: AtomicBool,
    }

    #[async_trait]
    impl PageFetcher for SessionFetcher {
        fn entry_url(&self) -> &str {
            "https://example.com/rendered"
        }

        async fn fetch(&self) -> Result<FetchedPage> {
            let result = within_budget(self.entry_url(), Instant::now(), self.budget, async {
                tokio::time::sleep(Duration::from_secs(300)).await;
                Ok(FetchedPage::direct("https://example.com/rendered", ""))
            })
            .await;
            self.released.store(true, Ordering::SeqCst);
            result
        }
    }

    struct FailingFetcher;

    #[async_trait]
    impl PageFetcher for FailingFetcher {
        fn entry_url(&self) -> &str {
            "https://example.com/down"
        }

        async fn fetch(&self) -> Result<FetchedPage> {
            Err(AppError::fetch("https://example.com/down", "HTTP status 503"))
        }
    }

    #[derive(Default)]
    struct RecordingMailer {
        sent: Mutex<Vec<Notification>>,
        fail: bool,
    }

    #[async_trait]
    impl Mailer for RecordingMailer {
        async fn send(&self, notification: &Notification) -> Result<()> {
            if self.fail {
                return Err(AppError::mail("connection refused"));
            }
            self.sent.lock().unwrap().push(notification.clone());
            Ok(())
        }
    }

    impl RecordingMailer {
        fn sent_count(&self) -> usize {
            self.sent.lock().unwrap().len()
        }
    }

    #[derive(Default)]
    struct MemoryStore {
        state: Mutex<Option<PersistedState>>,
        fail_save: bool,
    }

    impl MemoryStore {
        fn with(state: PersistedState) -> Self {
            Self {
                state: Mutex::new(Some(state)),
                fail_save: false,
            }
        }

        fn current(&self) -> Option<PersistedState> {
            self.state.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl StateStore for MemoryStore {
        async fn load(&self) -> Result<Option<PersistedState>> {
            Ok(self.current())
        }

        async fn save(&self, state: &PersistedState) -> Result<()> {
            if self.fail_save {
                return Err(AppError::store("read-only filesystem"));
            }
            *self.state.lock().unwrap() = Some(state.clone());
            Ok(())
        }
    }

    fn detector(config: &Config) -> AvailabilityDetector {
        AvailabilityDetector::from_config(&config.detection).unwrap()
    }

    fn stored(status: AvailabilityStatus) -> PersistedState {
        let at = Utc.with_ymd_and_hms(2026, 1, 9, 20, 0, 0).unwrap();
        PersistedState {
            status,
            last_checked: at,
            available_since: status.is_available().then_some(at),
        }
    }

    fn page(text: &str) -> StaticFetcher {
        StaticFetcher(FetchedPage::via_cinema(
            "https://www.pathe.fr/films/avatar-de-feu-et-de-cendres-11387",
            text,
        ))
    }

    #[tokio::test]
    async fn test_first_run_available_notifies() {
        let config = Config::default();
        let mailer = RecordingMailer::default();
        let store = MemoryStore::default();

        let outcome = run_check(
            &config,
            &detector(&config),
            &page("Brumath ... réserver ... 14:30"),
            &mailer,
            &store,
        )
        .await
        .unwrap();

        assert!(outcome.detection.is_available());
        assert_eq!(outcome.action, NotificationAction::Notify);
        assert!(outcome.delivered);
        assert_eq!(mailer.sent_count(), 1);
        assert_eq!(
            store.current().map(|s| s.status),
            Some(AvailabilityStatus::Available)
        );

        let sent = mailer.sent.lock().unwrap();
        assert!(sent[0].body.contains("reservation_signal: true"));
        assert!(sent[0].body.contains("nb_horaires: 1"));
    }

    #[tokio::test]
    async fn test_still_available_skips() {
        let config = Config::default();
        let mailer = RecordingMailer::default();
        let previous = stored(AvailabilityStatus::Available);
        let store = MemoryStore::with(previous.clone());

        let outcome = run_check(
            &config,
            &detector(&config),
            &page("Brumath ... réserver ... 14:30"),
            &mailer,
            &store,
        )
        .await
        .unwrap();

        assert_eq!(outcome.action, NotificationAction::Skip);
        assert_eq!(mailer.sent_count(), 0);
        let state = store.current().unwrap();
        assert_eq!(state.status, AvailabilityStatus::Available);
        assert_eq!(state.available_since, previous.available_since);
        assert!(state.last_checked > previous.last_checked);
    }

    #[tokio::test]
    async fn test_falling_edge_updates_without_alert() {
        let config = Config::default();
        let mailer = RecordingMailer::default();
        let store = MemoryStore::with(stored(AvailabilityStatus::Available));

        let outcome = run_check(&config, &detector(&config), &page("Brumath"), &mailer, &store)
            .await
            .unwrap();

        assert!(!outcome.detection.is_available());
        assert_eq!(outcome.action, NotificationAction::Skip);
        assert_eq!(mailer.sent_count(), 0);
        assert_eq!(
            store.current().map(|s| s.status),
            Some(AvailabilityStatus::Unavailable)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetch_timeout_leaves_state_untouched() {
        let mut config = Config::default();
        config.fetcher.timeout_secs = 1;
        let mailer = RecordingMailer::default();
        let previous = stored(AvailabilityStatus::Available);
        let store = MemoryStore::with(previous.clone());

        let err = run_check(&config, &detector(&config), &HangingFetcher, &mailer, &store)
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Timeout { secs: 1, .. }));
        assert_eq!(store.current(), Some(previous));
        assert_eq!(mailer.sent_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetch_timeout_releases_session() {
        let mut config = Config::default();
        config.fetcher.timeout_secs = 10;
        let fetcher = SessionFetcher {
            budget: Duration::from_secs(10),
            released: AtomicBool::new(false),
        };
        let store = MemoryStore::default();

        let err = run_check(
            &config,
            &detector(&config),
            &fetcher,
            &RecordingMailer::default(),
            &store,
        )
        .await
        .unwrap_err();

        assert!(matches!(err, AppError::Timeout { secs: 10, .. }));
        assert!(fetcher.released.load(Ordering::SeqCst));
        assert!(store.current().is_none());
    }

    #[tokio::test]
    async fn test_fetch_failure_leaves_state_untouched() {
        let config = Config::default();
        let store = MemoryStore::with(stored(AvailabilityStatus::Unavailable));

        let err = run_check(
            &config,
            &detector(&config),
            &FailingFetcher,
            &RecordingMailer::default(),
            &store,
        )
        .await
        .unwrap_err();

        assert!(err.is_fetch());
        assert_eq!(store.current(), Some(stored(AvailabilityStatus::Unavailable)));
    }

    #[tokio::test]
    async fn test_failed_alert_still_persists_available() {
        let config = Config::default();
        let mailer = RecordingMailer {
            fail: true,
            ..RecordingMailer::default()
        };
        let store = MemoryStore::with(stored(AvailabilityStatus::Unavailable));

        let outcome = run_check(
            &config,
            &detector(&config),
            &page("Brumath Billetterie"),
            &mailer,
            &store,
        )
        .await
        .unwrap();

        assert_eq!(outcome.action, NotificationAction::Notify);
        assert!(!outcome.delivered);
        assert_eq!(
            store.current().map(|s| s.status),
            Some(AvailabilityStatus::Available)
        );
    }

    #[tokio::test]
    async fn test_missing_smtp_settings_still_persists_available() {
        let config = Config::default();
        let mailer = SmtpMailer::with_env(MailConfig::default(), |_| None);
        let store = MemoryStore::with(stored(AvailabilityStatus::Unavailable));

        let outcome = run_check(
            &config,
            &detector(&config),
            &page("Brumath réserver 18:45"),
            &mailer,
            &store,
        )
        .await
        .unwrap();

        assert_eq!(outcome.action, NotificationAction::Notify);
        assert!(!outcome.delivered);
        let state = store.current().unwrap();
        assert_eq!(state.status, AvailabilityStatus::Available);
        assert!(state.available_since.is_some());
    }

    #[tokio::test]
    async fn test_save_failure_is_reported() {
        let config = Config::default();
        let store = MemoryStore {
            fail_save: true,
            ..MemoryStore::default()
        };

        let err = run_check(
            &config,
            &detector(&config),
            &page("Brumath 14:30"),
            &RecordingMailer::default(),
            &store,
        )
        .await
        .unwrap_err();

        assert!(matches!(err, AppError::Store(_)));
    }

    #[tokio::test]
    async fn test_unlisted_film_is_unavailable() {
        let config = Config::default();
        let mailer = RecordingMailer::default();
        let store = MemoryStore::default();
        let fetcher = StaticFetcher(FetchedPage::film_not_listed(
            "https://www.pathe.fr/cinemas/cinema-pathe-brumath",
            "Pathé Brumath - Dune - Réserver 14:30",
        ));

        let outcome = run_check(&config, &detector(&config), &fetcher, &mailer, &store)
            .await
            .unwrap();

        assert!(outcome.detection.is_available());
        assert_eq!(outcome.status, AvailabilityStatus::Unavailable);
        assert_eq!(outcome.action, NotificationAction::Skip);
        assert_eq!(mailer.sent_count(), 0);
    }

    #[tokio::test]
    async fn test_two_runs_notify_once() {
        let config = Config::default();
        let mailer = RecordingMailer::default();
        let store = MemoryStore::default();
        let fetcher = page("Brumath réserver 20:15");

        let first = run_check(&config, &detector(&config), &fetcher, &mailer, &store)
            .await
            .unwrap();
        let second = run_check(&config, &detector(&config), &fetcher, &mailer, &store)
            .await
            .unwrap();

        assert_eq!(first.action, NotificationAction::Notify);
        assert_eq!(second.action, NotificationAction::Skip);
        assert_eq!(mailer.sent_count(), 1);
    }
}
