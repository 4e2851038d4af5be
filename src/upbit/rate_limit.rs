// =============================================================================
// Rate-Limit Tracker — follows Upbit's `Remaining-Req` header to avoid 429s
// =============================================================================
//
// Upbit reports the remaining request budget per endpoint group on every
// response:
//
//   Remaining-Req: group=default; min=1800; sec=29
//
// `sec` is the number of requests still allowed in the current second for
// that group (`min` is legacy and ignored).  The tracker keeps the last value
// seen per group; before a request the client asks how long to wait, which is
// non-zero only when the group's budget for the current second is exhausted.
// =============================================================================

use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use serde::Serialize;
use tracing::{debug, warn};

/// Remaining-per-second budget at or below which a warning is logged.
const SEC_WARN_THRESHOLD: u32 = 1;

/// Length of Upbit's rate-limit window.
const WINDOW: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy)]
struct GroupState {
    remaining_sec: u32,
    seen_at: Instant,
}

/// Parsed `Remaining-Req` header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RemainingReq {
    pub group: String,
    pub sec: u32,
}

impl RemainingReq {
    /// Parse `group=default; min=1800; sec=29`.  Returns `None` when the group
    /// or the `sec` field is missing.
    pub fn parse(header: &str) -> Option<Self> {
        let mut group = None;
        let mut sec = None;

        for part in header.split(';') {
            let (key, value) = match part.trim().split_once('=') {
                Some(kv) => kv,
                None => continue,
            };
            match key.trim() {
                "group" => group = Some(value.trim().to_string()),
                "sec" => sec = value.trim().parse::<u32>().ok(),
                _ => {}
            }
        }

        Some(Self {
            group: group?,
            sec: sec?,
        })
    }
}

/// Thread-safe tracker of the last seen budget per endpoint group.
#[derive(Default)]
pub struct RateLimitTracker {
    groups: RwLock<HashMap<String, GroupState>>,
}

impl RateLimitTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Update the tracker from the HTTP response headers.
    pub fn update_from_headers(&self, headers: &reqwest::header::HeaderMap) {
        let parsed = headers
            .get("Remaining-Req")
            .and_then(|v| v.to_str().ok())
            .and_then(RemainingReq::parse);

        if let Some(remaining) = parsed {
            self.record(remaining, Instant::now());
        }
    }

    fn record(&self, remaining: RemainingReq, seen_at: Instant) {
        if remaining.sec <= SEC_WARN_THRESHOLD {
            warn!(
                group = %remaining.group,
                remaining_sec = remaining.sec,
                "rate-limit budget nearly exhausted"
            );
        } else {
            debug!(group = %remaining.group, remaining_sec = remaining.sec, "rate-limit budget updated");
        }

        self.groups.write().insert(
            remaining.group,
            GroupState {
                remaining_sec: remaining.sec,
                seen_at,
            },
        );
    }

    /// How long to wait before sending a request in `group`.
    pub fn wait_time(&self, group: &str) -> Duration {
        self.wait_time_at(group, Instant::now())
    }

    fn wait_time_at(&self, group: &str, now: Instant) -> Duration {
        match self.groups.read().get(group) {
            Some(state) if state.remaining_sec == 0 => {
                WINDOW.saturating_sub(now.saturating_duration_since(state.seen_at))
            }
            _ => Duration::ZERO,
        }
    }

    /// Last seen per-second budget for every group, sorted by group name.
    pub fn snapshot(&self) -> Vec<RemainingReq> {
        let mut out: Vec<RemainingReq> = self
            .groups
            .read()
            .iter()
            .map(|(group, state)| RemainingReq {
                group: group.clone(),
                sec: state.remaining_sec,
            })
            .collect();
        out.sort_by(|a, b| a.group.cmp(&b.group));
        out
    }
}

impl std::fmt::Debug for RateLimitTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimitTracker")
            .field("groups", &self.snapshot())
            .finish()
    }
}
