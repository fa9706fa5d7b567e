//! Bounded retry with exponential backoff, expressed as a small state machine.
//!
//! ```text
//! Attempting(n) ──ok──────────────────────────▶ Succeeded
//!      │ retryable err, n < max ──▶ Retrying(n, delay) ──sleep──▶ Attempting(n + 1)
//!      │ retryable err, n = max ──▶ Exhausted
//!      └ fatal err ───────────────▶ Aborted
//! ```

use std::time::Duration;

use async_trait::async_trait;

/// Abstracts the backoff wait so retry timing can be observed without real delays.
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Production sleeper backed by the tokio timer.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts per logical call, including the first. Never below 1.
    pub max_attempts: u32,
    /// Delay after attempt `n` is `unit * 2^n`.
    pub unit: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3)
    }
}

#[derive(Debug, PartialEq)]
pub enum RetryState<T, E> {
    Attempting { attempt: u32 },
    Retrying { attempt: u32, delay: Duration, error: E },
    Succeeded { attempt: u32, value: T },
    Exhausted { attempts: u32, error: E },
    Aborted { attempt: u32, error: E },
}

impl RetryPolicy {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            unit: Duration::from_secs(1),
        }
    }

    pub fn start<T, E>(&self) -> RetryState<T, E> {
        RetryState::Attempting { attempt: 1 }
    }

    /// Backoff after the given (1-based) failed attempt: 2s, 4s, 8s, ...
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.unit.saturating_mul(factor)
    }

    /// Transition taken once attempt `attempt` has produced `outcome`.
    pub fn advance<T, E>(
        &self,
        attempt: u32,
        outcome: Result<T, E>,
        is_retryable: impl Fn(&E) -> bool,
    ) -> RetryState<T, E> {
        match outcome {
            Ok(value) => RetryState::Succeeded { attempt, value },
            Err(error) if !is_retryable(&error) => RetryState::Aborted { attempt, error },
            Err(error) if attempt >= self.max_attempts => RetryState::Exhausted {
                attempts: attempt,
                error,
            },
            Err(error) => RetryState::Retrying {
                attempt,
                delay: self.delay_after(attempt),
                error,
            },
        }
    }
}
