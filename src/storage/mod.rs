//! Persistence of the last observed availability.
//!
//! One small JSON record survives between scheduled runs:
//!
//! ```text
//! state.json
//! {
//!   "status": "available",
//!   "last_checked": "2026-01-10T08:30:00Z",
//!   "available_since": "2026-01-10T08:30:00Z"
//! }
//! ```

pub mod local;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::PersistedState;

// Re-export for convenience
pub use local::LocalStateStore;

/// Trait for state storage backends.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Load the last persisted state; `None` on the first run.
    async fn load(&self) -> Result<Option<PersistedState>>;

    /// Replace the persisted state.
    async fn save(&self, state: &PersistedState) -> Result<()>;
}
