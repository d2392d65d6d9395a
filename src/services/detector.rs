//! Showtime availability detection.
//!
//! Decides from rendered page text whether bookable showtimes are listed,
//! using a cinema keyword, booking call-to-action phrases and `HH:MM` times.

use regex::Regex;

use crate::error::{AppError, Result};
use crate::models::{AvailabilityStatus, Detection, DetectionConfig, DetectionEvidence};

/// Clock times 00:00 through 23:59 standing on word boundaries.
const TIME_PATTERN: &str = r"\b(?:[01]\d|2[0-3]):[0-5]\d\b";

/// Keyword + pattern heuristic over page text.
#[derive(Debug, Clone)]
pub struct AvailabilityDetector {
    keyword: String,
    signals: Vec<String>,
    time_pattern: Regex,
}

impl AvailabilityDetector {
    /// Create a detector for a cinema keyword and a set of reservation signals.
    pub fn new(keyword: &str, signals: &[String]) -> Result<Self> {
        let time_pattern = Regex::new(TIME_PATTERN)
            .map_err(|e| AppError::config(format!("invalid time pattern: {e}")))?;

        Ok(Self {
            keyword: keyword.to_lowercase(),
            signals: signals.iter().map(|s| s.to_lowercase()).collect(),
            time_pattern,
        })
    }

    pub fn from_config(config: &DetectionConfig) -> Result<Self> {
        Self::new(&config.cinema_keyword, &config.reservation_signals)
    }

    /// Inspect page text.
    ///
    /// All three signals are always evaluated so the evidence is complete,
    /// but a missing keyword alone makes the page unavailable.
    pub fn detect(&self, page_text: &str) -> Detection {
        let lower = page_text.to_lowercase();

        let evidence = DetectionEvidence {
            keyword_found: lower.contains(&self.keyword),
            reservation_signal_found: self.signals.iter().any(|s| lower.contains(s)),
            time_pattern_count: self.time_pattern.find_iter(page_text).count(),
        };

        let available = evidence.keyword_found
            && (evidence.reservation_signal_found || evidence.time_pattern_count >= 1);

        log::debug!(
            "keyword_found={} reservation_signal={} nb_horaires={} available={}",
            evidence.keyword_found,
            evidence.reservation_signal_found,
            evidence.time_pattern_count,
            available
        );

        Detection {
            status: AvailabilityStatus::from_available(available),
            evidence,
        }
    }
}
