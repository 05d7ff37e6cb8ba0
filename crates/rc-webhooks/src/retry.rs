//! Retry scheduling with exponential backoff.
//!
//! Decides whether a failed delivery is rescheduled or terminated, and
//! computes when the retry sweep should pick it up again.

use chrono::{DateTime, Duration, Utc};

use crate::model::{DeliveryAttempt, DeliveryStatus, Endpoint};

/// Backoff configuration, passed explicitly to the components that need
/// it at startup.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Delay before the first retry.
    pub base_delay: std::time::Duration,
    /// Upper bound on any single delay.
    pub max_delay: std::time::Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base_delay: std::time::Duration::from_secs(60),
            max_delay: std::time::Duration::from_secs(86_400),
        }
    }
}

impl RetryPolicy {
    pub fn new(base_delay: std::time::Duration, max_delay: std::time::Duration) -> Self {
        Self { base_delay, max_delay }
    }

    /// Delay before the retry that follows failed attempt `attempt_count`:
    /// `base · 2^(attempt_count - 1)`, capped at `max_delay`.
    pub fn backoff(&self, attempt_count: i32) -> std::time::Duration {
        let exponent = attempt_count.saturating_sub(1).clamp(0, 62) as u32;
        let delay = match 2u64.checked_pow(exponent) {
            Some(factor) => self.base_delay.saturating_mul(factor.min(u32::MAX as u64) as u32),
            None => self.max_delay,
        };
        delay.min(self.max_delay)
    }
}

/// Outcome of handing a failed attempt to the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDisposition {
    /// The attempt was rescheduled; the sweep redispatches it at/after
    /// this instant.
    Scheduled(DateTime<Utc>),
    /// The retry budget is exhausted; the attempt is terminally failed.
    Exhausted,
}

/// Advances a failed delivery's state: reschedule or terminate.
#[derive(Debug, Clone, Copy, Default)]
pub struct RetryScheduler {
    policy: RetryPolicy,
}

impl RetryScheduler {
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Apply a transient failure to `attempt`.
    ///
    /// While attempts remain, the record moves to `retrying` with
    /// `next_retry_at` set and the attempt counter advanced; otherwise it
    /// is terminally failed with `completed_at` set.
    pub fn on_failure(
        &self,
        attempt: &mut DeliveryAttempt,
        endpoint: &Endpoint,
        error_message: &str,
        response_status: Option<i32>,
        response_body: Option<String>,
    ) -> RetryDisposition {
        if attempt.attempt_count < endpoint.retry_count {
            let delay = self.policy.backoff(attempt.attempt_count);
            let next_retry_at = Utc::now()
                + Duration::from_std(delay).unwrap_or_else(|_| Duration::seconds(i64::MAX / 1_000));

            attempt.status = DeliveryStatus::Retrying;
            attempt.error_message = Some(error_message.to_string());
            attempt.response_status = response_status;
            attempt.response_body = response_body;
            attempt.last_attempt_at = Some(Utc::now());
            attempt.next_retry_at = Some(next_retry_at);
            attempt.attempt_count += 1;

            RetryDisposition::Scheduled(next_retry_at)
        } else {
            attempt.mark_terminal_failure(error_message, response_status, response_body);
            RetryDisposition::Exhausted
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use uuid::Uuid;

    fn policy_1s() -> RetryPolicy {
        RetryPolicy::new(
            std::time::Duration::from_secs(1),
            std::time::Duration::from_secs(60),
        )
    }

    #[test]
    fn test_backoff_doubles_per_attempt() {
        let p = policy_1s();
        assert_eq!(p.backoff(1), std::time::Duration::from_secs(1));
        assert_eq!(p.backoff(2), std::time::Duration::from_secs(2));
        assert_eq!(p.backoff(3), std::time::Duration::from_secs(4));
        assert_eq!(p.backoff(4), std::time::Duration::from_secs(8));
    }

    #[test]
    fn test_backoff_is_capped() {
        let p = policy_1s();
        assert_eq!(p.backoff(7), std::time::Duration::from_secs(60));
        assert_eq!(p.backoff(40), std::time::Duration::from_secs(60));
    }

    #[test]
    fn test_backoff_non_decreasing() {
        let p = RetryPolicy::default();
        let mut prev = std::time::Duration::ZERO;
        for k in 1..30 {
            let d = p.backoff(k);
            assert!(d >= prev, "backoff must be non-decreasing at k={}", k);
            assert!(d <= p.max_delay);
            prev = d;
        }
    }

    #[test]
    fn test_on_failure_reschedules_while_budget_remains() {
        let endpoint = Endpoint::new("ep", "http://example.com").with_retry_count(3);
        let mut attempt = DeliveryAttempt::new(endpoint.id, "config.created", json!({}));
        let scheduler = RetryScheduler::new(policy_1s());

        let disposition = scheduler.on_failure(&mut attempt, &endpoint, "HTTP 503", Some(503), None);
        assert!(matches!(disposition, RetryDisposition::Scheduled(_)));
        assert_eq!(attempt.status, DeliveryStatus::Retrying);
        assert_eq!(attempt.attempt_count, 2);
        assert!(attempt.next_retry_at.is_some());
        assert!(attempt.completed_at.is_none());
        assert_eq!(attempt.error_message.as_deref(), Some("HTTP 503"));
    }

    #[test]
    fn test_on_failure_exhausts_at_retry_count() {
        let endpoint = Endpoint::new("ep", "http://example.com").with_retry_count(2);
        let mut attempt = DeliveryAttempt::new(endpoint.id, "config.created", json!({}));
        let scheduler = RetryScheduler::new(policy_1s());

        assert!(matches!(
            scheduler.on_failure(&mut attempt, &endpoint, "timeout", None, None),
            RetryDisposition::Scheduled(_)
        ));
        assert_eq!(attempt.attempt_count, 2);

        let disposition = scheduler.on_failure(&mut attempt, &endpoint, "timeout", None, None);
        assert_eq!(disposition, RetryDisposition::Exhausted);
        assert_eq!(attempt.status, DeliveryStatus::Failed);
        assert_eq!(attempt.attempt_count, 2); // never exceeds the budget
        assert!(attempt.completed_at.is_some());
        assert!(attempt.next_retry_at.is_none());
    }

    #[test]
    fn test_retry_budget_of_one_fails_immediately() {
        let endpoint = Endpoint::new("ep", "http://example.com").with_retry_count(1);
        let mut attempt = DeliveryAttempt::new(endpoint.id, "config.created", json!({}));
        let scheduler = RetryScheduler::default();

        let disposition = scheduler.on_failure(&mut attempt, &endpoint, "HTTP 500", Some(500), None);
        assert_eq!(disposition, RetryDisposition::Exhausted);
        assert_eq!(attempt.attempt_count, 1);
    }

    #[test]
    fn test_next_retry_increases_across_retries() {
        let endpoint = Endpoint::new("ep", "http://example.com").with_retry_count(4);
        let mut attempt = DeliveryAttempt::new(endpoint.id, "config.created", json!({}));
        let scheduler = RetryScheduler::new(policy_1s());

        let mut last = None;
        for _ in 0..3 {
            match scheduler.on_failure(&mut attempt, &endpoint, "timeout", None, None) {
                RetryDisposition::Scheduled(at) => {
                    if let Some(prev) = last {
                        assert!(at > prev);
                    }
                    last = Some(at);
                }
                RetryDisposition::Exhausted => panic!("budget should not be exhausted yet"),
            }
        }
    }
}
