//! Alert message content.

use chrono::{DateTime, Utc};

use super::{Detection, FetchedPage, TargetConfig};

/// Timestamp layout used in logs and alert bodies.
pub const UTC_FORMAT: &str = "%Y-%m-%d %H:%M:%S UTC";

/// A plain-text alert ready for delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub subject: String,
    pub body: String,
}

impl Notification {
    /// Build the "showtimes available" alert.
    pub fn availability(
        target: &TargetConfig,
        page: &FetchedPage,
        detection: &Detection,
        at: DateTime<Utc>,
    ) -> Self {
        let subject = format!(
            "🎬 {}: séances dispo - {}",
            target.cinema_name, target.film_name
        );

        let film_listed = page
            .film_listed
            .map(|listed| listed.to_string())
            .unwrap_or_else(|| "n/a".to_string());

        let evidence = &detection.evidence;
        let body = format!(
            "Film: {film}\n\
             Cinéma: {cinema}\n\
             URL film: {film_url}\n\
             URL cinéma: {cinema_url}\n\
             \n\
             Détails:\n\
             - film_found_on_cinema_page: {film_listed}\n\
             - film_page_url: {page_url}\n\
             - keyword_found: {keyword}\n\
             - reservation_signal: {signal}\n\
             - nb_horaires: {times}\n\
             \n\
             Date (UTC): {date}",
            film = target.film_name,
            cinema = target.cinema_name,
            film_url = target.film_url,
            cinema_url = target.cinema_url,
            page_url = page.url,
            keyword = evidence.keyword_found,
            signal = evidence.reservation_signal_found,
            times = evidence.time_pattern_count,
            date = at.format(UTC_FORMAT),
        );

        Self { subject, body }
    }
}
