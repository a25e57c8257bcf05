//! Per-client fixed-window admission control.
//!
//! Bounds how often a client may hit a sensitive endpoint (login) within a
//! window. Each client key owns one [`AdmissionRecord`] holding a count and
//! the instant its window ends.
//!
//! # Algorithm
//!
//! On every tracked request for `key`:
//!
//! 1. No record, or `now >= window_end`: start a new window with `count = 1`
//!    and admit.
//! 2. `count < limit`: increment and admit.
//! 3. Otherwise reject until `window_end`.
//!
//! This is a fixed-window counter, not a sliding log. A client can get up
//! to `2 × limit` requests admitted around a window boundary. That burst is
//! accepted for login throttling in exchange for O(1) memory and O(1)
//! decisions per key.
//!
//! # Concurrency
//!
//! Records live in a [`DashMap`]. The lookup and the mutation for a key run
//! under the shard's write lock through the entry API, so two concurrent
//! calls can never both start a new window for the same key.
//!
//! # Housekeeping
//!
//! [`AdmissionController::sweep`] drops records whose window has ended. It
//! only bounds memory; stale records never affect decisions because expired
//! windows are re-initialized lazily.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use thiserror::Error;
use tokio::time::Instant;

/// Longest accepted window. Keeps `now + window` far away from overflow.
pub const MAX_WINDOW: Duration = Duration::from_secs(365 * 24 * 3600);

/// Configuration errors for [`AdmissionController`].
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdmissionError {
    #[error("admission limit must be greater than 0")]
    ZeroLimit,

    #[error("admission window must be greater than 0")]
    ZeroWindow,

    #[error("admission window must not exceed {MAX_WINDOW:?}")]
    WindowTooLong,
}

/// Outcome of an admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Request admitted; `remaining` more fit in the current window.
    Admitted { remaining: u32 },
    /// Request rejected until the current window ends.
    Rejected { retry_after: Duration },
}

impl Admission {
    pub fn is_admitted(&self) -> bool {
        matches!(self, Admission::Admitted { .. })
    }

    /// Whole seconds a rejected client should wait, rounded up, at least 1.
    pub fn retry_after_secs(&self) -> Option<u64> {
        match self {
            Admission::Admitted { .. } => None,
            Admission::Rejected { retry_after } => Some(ceil_secs(*retry_after)),
        }
    }
}

fn ceil_secs(duration: Duration) -> u64 {
    let secs = duration.as_secs() + u64::from(duration.subsec_nanos() > 0);
    secs.max(1)
}

#[derive(Debug, Clone, Copy)]
struct AdmissionRecord {
    count: u32,
    window_end: Instant,
}

/// Shared handle to a per-client admission table.
///
/// Clones share the same table. Build one per protected surface at startup
/// and hand clones to the middleware and the sweep task.
#[derive(Debug, Clone)]
pub struct AdmissionController {
    records: Arc<DashMap<String, AdmissionRecord>>,
    limit: u32,
    window: Duration,
}

impl AdmissionController {
    /// Create a controller admitting `limit` requests per `window` per key.
    pub fn new(limit: u32, window: Duration) -> Result<Self, AdmissionError> {
        if limit == 0 {
            return Err(AdmissionError::ZeroLimit);
        }
        if window.is_zero() {
            return Err(AdmissionError::ZeroWindow);
        }
        if window > MAX_WINDOW {
            return Err(AdmissionError::WindowTooLong);
        }

        Ok(Self {
            records: Arc::new(DashMap::new()),
            limit,
            window,
        })
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Admit or reject one request from `key`.
    pub fn allow(&self, key: &str) -> bool {
        self.check(key).is_admitted()
    }

    /// Admit or reject one request from `key`, with details.
    pub fn check(&self, key: &str) -> Admission {
        self.check_at(key, Instant::now())
    }

    /// Admit or reject one request from `key` as if the time were `now`.
    pub fn check_at(&self, key: &str, now: Instant) -> Admission {
        let fresh = AdmissionRecord {
            count: 1,
            window_end: now + self.window,
        };

        match self.records.entry(key.to_owned()) {
            Entry::Vacant(slot) => {
                slot.insert(fresh);
                Admission::Admitted {
                    remaining: self.limit - 1,
                }
            }
            Entry::Occupied(mut slot) => {
                let record = slot.get_mut();
                if now >= record.window_end {
                    *record = fresh;
                    Admission::Admitted {
                        remaining: self.limit - 1,
                    }
                } else if record.count < self.limit {
                    record.count += 1;
                    Admission::Admitted {
                        remaining: self.limit - record.count,
                    }
                } else {
                    Admission::Rejected {
                        retry_after: record.window_end.saturating_duration_since(now),
                    }
                }
            }
        }
    }

    /// Remove records whose window has ended. Returns how many were removed.
    pub fn sweep(&self) -> usize {
        self.sweep_at(Instant::now())
    }

    /// Remove records whose window has ended by `now`.
    pub fn sweep_at(&self, now: Instant) -> usize {
        let mut removed = 0;
        self.records.retain(|_, record| {
            let live = now < record.window_end;
            if !live {
                removed += 1;
            }
            live
        });
        removed
    }

    /// Number of clients currently holding a record.
    pub fn tracked_clients(&self) -> usize {
        self.records.len()
    }

    /// Current count for `key`, if it has a record.
    pub fn count_for(&self, key: &str) -> Option<u32> {
        self.records.get(key).map(|record| record.count)
    }
}
