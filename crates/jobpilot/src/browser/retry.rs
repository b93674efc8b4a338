//! Shared bounded-attempt helpers.
//!
//! Every multi-step apply loop and every navigation retry goes through
//! these, so the iteration ceilings and the stuck-form heuristic are
//! defined once instead of per adapter.

use std::future::Future;
use std::time::Duration;

/// Retry policy for a single recoverable operation.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total attempts, including the first one. Must be at least 1.
    pub max_attempts: u32,
    /// Pause between attempts.
    pub delay_ms: u64,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay_ms: u64) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay_ms,
        }
    }
}

/// Runs `op` up to `policy.max_attempts` times, sleeping between
/// attempts. Returns the first success or the last error.
pub async fn with_retries<T, E, F, Fut>(policy: RetryPolicy, mut op: F) -> Result<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let mut attempt = 1;
    loop {
        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(e) if attempt < policy.max_attempts => {
                log::warn!("Attempt {}/{} failed: {}", attempt, policy.max_attempts, e);
                tokio::time::sleep(Duration::from_millis(policy.delay_ms)).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Verdict for one observed step of a multi-step form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepVerdict {
    Proceed,
    /// The same step repeated beyond the threshold, or the step ceiling
    /// was hit. Carries a diagnostic reason.
    Stuck(String),
}

/// Stuck-form detector for multi-step "next/continue" loops.
///
/// Feed it a fingerprint of the current form step each iteration. If the
/// fingerprint repeats `repeat_threshold` times in a row, or the total
/// step count exceeds `max_steps`, the loop must stop with `failed`
/// rather than spin forever.
#[derive(Debug)]
pub struct StepGuard {
    max_steps: u32,
    repeat_threshold: u32,
    steps_seen: u32,
    last_fingerprint: Option<String>,
    repeats: u32,
}

impl StepGuard {
    pub fn new(max_steps: u32, repeat_threshold: u32) -> Self {
        Self {
            max_steps: max_steps.max(1),
            repeat_threshold: repeat_threshold.max(2),
            steps_seen: 0,
            last_fingerprint: None,
            repeats: 0,
        }
    }

    pub fn observe(&mut self, fingerprint: &str) -> StepVerdict {
        self.steps_seen += 1;

        if self.last_fingerprint.as_deref() == Some(fingerprint) {
            self.repeats += 1;
        } else {
            self.last_fingerprint = Some(fingerprint.to_string());
            self.repeats = 1;
        }

        if self.repeats >= self.repeat_threshold {
            return StepVerdict::Stuck(format!(
                "form stuck: step repeated {} times",
                self.repeats
            ));
        }
        if self.steps_seen > self.max_steps {
            return StepVerdict::Stuck(format!(
                "form stuck: exceeded {} step ceiling",
                self.max_steps
            ));
        }
        StepVerdict::Proceed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn test_with_retries_succeeds_first_attempt() {
        let calls = AtomicU32::new(0);
        let result: Result<u32, String> =
            with_retries(RetryPolicy::new(3, 0), |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok(42) }
            })
            .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_with_retries_recovers_after_failures() {
        let calls = AtomicU32::new(0);
        let result: Result<u32, String> = with_retries(RetryPolicy::new(3, 0), |attempt| {
            calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if attempt < 3 {
                    Err("transient".to_string())
                } else {
                    Ok(attempt)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_with_retries_gives_up_after_ceiling() {
        let calls = AtomicU32::new(0);
        let result: Result<u32, String> = with_retries(RetryPolicy::new(2, 0), |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err("down".to_string()) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_step_guard_detects_repeats() {
        let mut guard = StepGuard::new(10, 3);
        assert_eq!(guard.observe("step-1"), StepVerdict::Proceed);
        assert_eq!(guard.observe("step-1"), StepVerdict::Proceed);
        assert!(matches!(guard.observe("step-1"), StepVerdict::Stuck(_)));
    }

    #[test]
    fn test_step_guard_resets_on_progress() {
        let mut guard = StepGuard::new(10, 3);
        assert_eq!(guard.observe("step-1"), StepVerdict::Proceed);
        assert_eq!(guard.observe("step-1"), StepVerdict::Proceed);
        assert_eq!(guard.observe("step-2"), StepVerdict::Proceed);
        assert_eq!(guard.observe("step-2"), StepVerdict::Proceed);
        assert!(matches!(guard.observe("step-2"), StepVerdict::Stuck(_)));
    }

    #[test]
    fn test_step_guard_enforces_ceiling() {
        let mut guard = StepGuard::new(3, 5);
        for i in 0..3 {
            assert_eq!(guard.observe(&format!("step-{}", i)), StepVerdict::Proceed);
        }
        assert!(matches!(guard.observe("step-99"), StepVerdict::Stuck(_)));
    }
}
