//! Bounded retry with backoff for external calls.
//!
//! Every directory, enrichment and model call goes through [`RetryPolicy::call`].
//! Only transient errors (see [`OutreachError::is_transient`]) are retried;
//! anything else is returned on the first attempt.

use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

use crate::config::RetrySettings;
use crate::error::Result;

/// Default attempt bound.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Delay schedule between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    /// Same delay before every retry.
    Fixed(Duration),
    /// `base × 2^retry`, capped at `cap`.
    Exponential { base: Duration, cap: Duration },
}

/// Retry configuration for one class of external call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum number of attempts, including the first one.
    pub max_attempts: u32,
    pub backoff: Backoff,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            backoff: Backoff::Exponential {
                base: Duration::from_secs(2),
                cap: Duration::from_secs(10),
            },
        }
    }
}

impl From<&RetrySettings> for RetryPolicy {
    fn from(settings: &RetrySettings) -> Self {
        let base = Duration::from_millis(settings.base_delay_ms);
        let backoff = match settings.strategy.as_str() {
            "fixed" => Backoff::Fixed(base),
            _ => Backoff::Exponential {
                base,
                cap: Duration::from_millis(settings.max_delay_ms),
            },
        };
        Self {
            max_attempts: settings.max_attempts.max(1),
            backoff,
        }
    }
}

impl RetryPolicy {
    /// A policy with no delay between attempts (tests, offline sources).
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff: Backoff::Fixed(Duration::ZERO),
        }
    }

    /// Delay to wait after the `retry`-th failure (0-based).
    pub fn delay_for(&self, retry: u32) -> Duration {
        match self.backoff {
            Backoff::Fixed(d) => d,
            Backoff::Exponential { base, cap } => {
                let factor = 2u32.saturating_pow(retry);
                base.saturating_mul(factor).min(cap)
            }
        }
    }

    /// Run `op` until it succeeds, fails permanently, or the attempt budget is
    /// spent. The last error is returned on exhaustion.
    pub async fn call<T, F, Fut>(&self, label: &str, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match op().await {
                Ok(value) => {
                    if attempt > 1 {
                        debug!(label, attempt, "call succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(e) if e.is_transient() && attempt < self.max_attempts => {
                    let delay = self.delay_for(attempt - 1);
                    warn!(
                        label,
                        attempt,
                        max_attempts = self.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "transient failure, retrying"
                    );
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                }
                Err(e) => {
                    if e.is_transient() {
                        warn!(label, attempts = attempt, error = %e, "retry budget exhausted");
                    }
                    return Err(e);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;
    use crate::error::OutreachError;

    #[test]
    fn exponential_delay_doubles_and_caps() {
        let policy = RetryPolicy {
            max_attempts: 5,
            backoff: Backoff::Exponential {
                base: Duration::from_millis(100),
                cap: Duration::from_millis(350),
            },
        };
        assert_eq!(policy.delay_for(0), Duration::from_millis(100));
        assert_eq!(policy.delay_for(1), Duration::from_millis(200));
        assert_eq!(policy.delay_for(2), Duration::from_millis(350));
        assert_eq!(policy.delay_for(40), Duration::from_millis(350));
    }

    #[test]
    fn fixed_delay_is_constant() {
        let policy = RetryPolicy {
            max_attempts: 3,
            backoff: Backoff::Fixed(Duration::from_secs(2)),
        };
        assert_eq!(policy.delay_for(0), policy.delay_for(2));
    }

    #[test]
    fn policy_from_settings() {
        let settings = RetrySettings {
            max_attempts: 0,
            strategy: "fixed".into(),
            base_delay_ms: 500,
            max_delay_ms: 1000,
        };
        let policy = RetryPolicy::from(&settings);
        assert_eq!(policy.max_attempts, 1);
        assert_eq!(policy.backoff, Backoff::Fixed(Duration::from_millis(500)));
    }

    #[tokio::test]
    async fn succeeds_after_transient_failures() {
        let calls = Arc::new(AtomicU32::new(0));
        let policy = RetryPolicy::immediate(3);

        let c = calls.clone();
        let result = policy
            .call("flaky", || {
                let c = c.clone();
                async move {
                    let n = c.fetch_add(1, Ordering::SeqCst) + 1;
                    if n < 3 {
                        Err(OutreachError::Network("reset".into()))
                    } else {
                        Ok(n)
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        let calls = Arc::new(AtomicU32::new(0));
        let policy = RetryPolicy::immediate(3);

        let c = calls.clone();
        let result: Result<()> = policy
            .call("down", || {
                let c = c.clone();
                async move {
                    c.fetch_add(1, Ordering::SeqCst);
                    Err(OutreachError::unavailable("directory offline"))
                }
            })
            .await;

        assert!(matches!(result, Err(OutreachError::Unavailable { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn permanent_errors_are_not_retried() {
        let calls = Arc::new(AtomicU32::new(0));
        let policy = RetryPolicy::immediate(3);

        let c = calls.clone();
        let result: Result<()> = policy
            .call("bad-input", || {
                let c = c.clone();
                async move {
                    c.fetch_add(1, Ordering::SeqCst);
                    Err(OutreachError::malformed("not json"))
                }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
