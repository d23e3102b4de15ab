//! Bounded retry with growing backoff.
//!
//! Chunked synthesis fires one request per text piece against a service
//! that throttles sporadically; a failed piece is retried a fixed number
//! of times with waits that grow as attempts run out, and only then fails
//! the whole job. The policy is plain data (attempt bound + backoff
//! function) so a fake failing operation can exercise it without a real
//! backend or a real clock.

use std::time::Duration;

use crate::clock::Clock;

const DEFAULT_MAX_ATTEMPTS: u32 = 10;

/// Waits grow as the budget shrinks: ~3 s after the first failure, 23 s
/// before the final attempt.
fn default_backoff(attempt: u32) -> Duration {
    let remaining = DEFAULT_MAX_ATTEMPTS.saturating_sub(attempt).max(1);
    Duration::from_secs(1 + 22 / u64::from(remaining))
}

#[derive(Clone, Copy)]
pub struct RetryPolicy {
    /// Total attempts, first try included.
    pub max_attempts: u32,
    /// Wait before retry number `attempt + 1`; `attempt` starts at 1.
    pub backoff: fn(u32) -> Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_attempts: DEFAULT_MAX_ATTEMPTS, backoff: default_backoff }
    }
}

impl RetryPolicy {
    /// Run `op` until it succeeds or the attempt budget is spent.
    /// `what` labels the warning lines and the final error.
    pub fn run<T>(
        &self,
        clock: &dyn Clock,
        what: &str,
        mut op: impl FnMut() -> anyhow::Result<T>,
    ) -> anyhow::Result<T> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match op() {
                Ok(value) => return Ok(value),
                Err(err) if attempt < self.max_attempts => {
                    let wait = (self.backoff)(attempt);
                    tracing::warn!(
                        "{what}: attempt {attempt}/{} failed ({err:#}), retrying in {} s",
                        self.max_attempts,
                        wait.as_secs()
                    );
                    clock.sleep(wait);
                }
                Err(err) => {
                    return Err(err.context(format!(
                        "{what}: giving up after {} attempts",
                        self.max_attempts
                    )));
                }
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
