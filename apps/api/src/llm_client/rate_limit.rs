//! Process-wide request quota for upstream analysis calls.
//!
//! Two fixed windows are tracked: one hour (always enforced) and one minute
//! (optional). A window resets to `(0, now)` once more than its length has
//! elapsed since it started. Counters live in memory only, so a restart
//! resets the quota.

use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use thiserror::Error;
use tokio::time::Instant;

const HOUR: Duration = Duration::from_secs(60 * 60);
const MINUTE: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuotaWindow {
    Minute,
    Hour,
}

impl fmt::Display for QuotaWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QuotaWindow::Minute => f.write_str("per-minute"),
            QuotaWindow::Hour => f.write_str("hourly"),
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{window} quota of {limit} requests exhausted, resets in {}s", retry_after.as_secs())]
pub struct QuotaExceeded {
    pub window: QuotaWindow,
    pub limit: u32,
    pub retry_after: Duration,
}

#[derive(Debug)]
struct Window {
    kind: QuotaWindow,
    limit: u32,
    length: Duration,
    count: u32,
    started: Instant,
}

impl Window {
    fn new(kind: QuotaWindow, limit: u32, length: Duration, now: Instant) -> Self {
        Self {
            kind,
            limit,
            length,
            count: 0,
            started: now,
        }
    }

    fn roll(&mut self, now: Instant) {
        if now.duration_since(self.started) > self.length {
            self.count = 0;
            self.started = now;
        }
    }

    fn check(&self, now: Instant) -> Result<(), QuotaExceeded> {
        if self.count >= self.limit {
            let elapsed = now.duration_since(self.started);
            return Err(QuotaExceeded {
                window: self.kind,
                limit: self.limit,
                retry_after: self.length.saturating_sub(elapsed),
            });
        }
        Ok(())
    }
}

#[derive(Debug)]
struct Windows {
    hour: Window,
    minute: Option<Window>,
}

impl Windows {
    fn iter_mut(&mut self) -> impl Iterator<Item = &mut Window> {
        std::iter::once(&mut self.hour).chain(self.minute.as_mut())
    }
}

/// Shared quota guard. Cheap to share behind an `Arc`.
#[derive(Debug)]
pub struct RateLimiter {
    windows: Mutex<Windows>,
}

impl RateLimiter {
    /// `per_minute = None` disables the minute window.
    pub fn new(per_hour: u32, per_minute: Option<u32>) -> Self {
        let now = Instant::now();
        Self {
            windows: Mutex::new(Windows {
                hour: Window::new(QuotaWindow::Hour, per_hour, HOUR, now),
                minute: per_minute.map(|limit| Window::new(QuotaWindow::Minute, limit, MINUTE, now)),
            }),
        }
    }

    /// Atomically checks every window and reserves one slot in each.
    ///
    /// The reservation is released when the returned permit is dropped
    /// without [`QuotaPermit::commit`].
    pub fn try_acquire(&self) -> Result<QuotaPermit<'_>, QuotaExceeded> {
        let now = Instant::now();
        let mut windows = self.lock();

        for window in windows.iter_mut() {
            window.roll(now);
        }
        for window in windows.iter_mut() {
            window.check(now)?;
        }

        let mut starts = [None; 2];
        for (slot, window) in starts.iter_mut().zip(windows.iter_mut()) {
            window.count += 1;
            *slot = Some(window.started);
        }

        Ok(QuotaPermit {
            limiter: self,
            starts,
            committed: false,
        })
    }

    /// Requests counted in the current hourly window.
    pub fn used_this_hour(&self) -> u32 {
        let now = Instant::now();
        let mut windows = self.lock();
        windows.hour.roll(now);
        windows.hour.count
    }

    fn release(&self, starts: &[Option<Instant>; 2]) {
        let mut windows = self.lock();
        for (start, window) in starts.iter().zip(windows.iter_mut()) {
            // A window that rolled over since the reservation already forgot it.
            if *start == Some(window.started) {
                window.count = window.count.saturating_sub(1);
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, Windows> {
        self.windows.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// A reserved quota slot.
#[derive(Debug)]
#[must_use = "dropping an uncommitted permit releases the slot"]
pub struct QuotaPermit<'a> {
    limiter: &'a RateLimiter,
    starts: [Option<Instant>; 2],
    committed: bool,
}

impl QuotaPermit<'_> {
    /// Keeps the slot counted against the quota.
    pub fn commit(mut self) {
        self.committed = true;
    }
}

impl Drop for QuotaPermit<'_> {
    fn drop(&mut self) {
        if !self.committed {
            self.limiter.release(&self.starts);
        }
    }
}
