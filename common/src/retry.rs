//! Stateless backoff decisions for failing per-object operations.

use rand::Rng;

use crate::store::StoreError;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Backoff {
    Retry(std::time::Duration),
    GiveUp,
}

/// Backoff policy. Stateless: the caller threads the attempt number in, so
/// the same policy value serves every worker.
///
/// The delay for attempt `n` is `min(base_delay * 2^(n-1), max_delay)` plus
/// uniform jitter of up to half the computed delay. The curve is a tunable,
/// not a contract; the jitter keeps concurrent workers from retrying in
/// lockstep.
#[derive(Copy, Clone, Debug)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: std::time::Duration,
    pub max_delay: std::time::Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: std::time::Duration::from_millis(500),
            max_delay: std::time::Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    #[must_use]
    pub fn with_max_attempts(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            ..Self::default()
        }
    }

    /// Decide the fate of an operation that has failed `attempt` times.
    /// Fatal errors give up regardless of the remaining budget.
    #[must_use]
    pub fn decide(&self, attempt: u32, error: &StoreError) -> Backoff {
        if !error.is_retryable() {
            return Backoff::GiveUp;
        }
        if attempt >= self.max_attempts {
            return Backoff::GiveUp;
        }
        Backoff::Retry(self.delay_for(attempt))
    }

    fn delay_for(&self, attempt: u32) -> std::time::Duration {
        let exponent = attempt.saturating_sub(1).min(20);
        let backoff = self
            .base_delay
            .saturating_mul(2u32.saturating_pow(exponent))
            .min(self.max_delay);
        let jitter_cap = (backoff / 2).as_millis() as u64;
        let jitter = if jitter_cap == 0 {
            std::time::Duration::ZERO
        } else {
            std::time::Duration::from_millis(rand::thread_rng().gen_range(0..=jitter_cap))
        };
        backoff + jitter
    }
}
