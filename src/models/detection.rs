//! Detector output.

use serde::{Deserialize, Serialize};

use super::AvailabilityStatus;

/// Signals found on the page, kept for diagnostics and the alert body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DetectionEvidence {
    pub keyword_found: bool,
    pub reservation_signal_found: bool,
    pub time_pattern_count: usize,
}

/// Status decided by the detector together with its evidence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Detection {
    pub status: AvailabilityStatus,
    pub evidence: DetectionEvidence,
}

impl Detection {
    pub fn is_available(&self) -> bool {
        self.status.is_available()
    }
}
