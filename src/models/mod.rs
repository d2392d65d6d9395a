// src/models/mod.rs

//! Domain models for the watcher.
//!
//! This module contains all data structures used throughout the application,
//! organized by their primary purpose.

mod availability;
mod config;
mod detection;
mod notification;
mod page;

// Re-export all public types
pub use availability::{AvailabilityStatus, PersistedState};
pub use config::{
    Config, DetectionConfig, FetchMode, FetcherConfig, MailConfig, MailCredentials,
    StorageConfig, TargetConfig,
};
pub use detection::{Detection, DetectionEvidence};
pub use notification::{Notification, UTC_FORMAT};
pub use page::FetchedPage;
