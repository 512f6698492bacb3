//! Entry lifecycle transitions and setup retry backoff
//!
//! ```text
//! NotLoaded ─▶ SetupInProgress ─▶ Loaded ─────────┐
//!                   │   ▲                          ▼
//!                   ├─▶ SetupRetry ──────▶ UnloadInProgress ─▶ NotLoaded
//!                   └─▶ SetupError ──────▶        │
//!                                                 └─▶ FailedUnload
//! ```
//!
//! `SetupRetry` and `SetupError` may go back to `SetupInProgress`.
//! `FailedUnload` has no way out.

use std::time::Duration;

use crate::entry::ConfigEntryState;
use thiserror::Error;

/// A lifecycle move the state machine does not allow
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("config entry cannot move from {from:?} to {to:?} (allowed: {allowed:?})")]
pub struct InvalidTransition {
    pub from: ConfigEntryState,
    pub to: ConfigEntryState,
    pub allowed: &'static [ConfigEntryState],
}

impl ConfigEntryState {
    /// States reachable in one step
    pub fn successors(self) -> &'static [ConfigEntryState] {
        use ConfigEntryState::*;

        match self {
            NotLoaded => &[SetupInProgress],
            SetupInProgress => &[Loaded, SetupError, SetupRetry],
            SetupError | SetupRetry => &[SetupInProgress, UnloadInProgress],
            Loaded => &[UnloadInProgress],
            UnloadInProgress => &[NotLoaded, FailedUnload],
            FailedUnload => &[],
        }
    }

    pub fn try_transition(self, to: ConfigEntryState) -> Result<ConfigEntryState, InvalidTransition> {
        let allowed = self.successors();
        if allowed.contains(&to) {
            Ok(to)
        } else {
            Err(InvalidTransition {
                from: self,
                to,
                allowed,
            })
        }
    }
}

/// Delay before the next setup attempt of an entry whose robot was not ready
///
/// `2^min(tries, 4) * 5` seconds plus up to 100ms of jitter:
/// 5s, 10s, 20s, 40s, 80s, then 80s.
pub fn calculate_retry_delay(tries: u32) -> Duration {
    let base_secs = 2_u64.pow(tries.min(4)) * 5;
    let jitter_ms = rand::random::<u64>() % 100;
    Duration::from_secs(base_secs) + Duration::from_millis(jitter_ms)
}
