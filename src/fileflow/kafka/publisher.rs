//! Broker publisher with bounded retry
//!
//! Wraps a [`RecordSink`] and turns its transient failures into a bounded
//! exponential-backoff retry loop. The backoff sleep blocks only the worker
//! handling the current file, never the scanner or other workers.

use std::time::Duration;
use tokio::time::sleep;

use super::error::SinkError;
use super::sink::RecordSink;

// Caps the shift so the doubling can never overflow
const MAX_EXPONENTIAL_SHIFT: u32 = 6;

/// Terminal status of one publish call, retries included.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishOutcome {
    /// Broker acknowledged the record
    Delivered,
    /// Permanent rejection; retrying cannot help
    Rejected(String),
    /// Transient failure that survived every allowed retry
    TransientFailure(String),
}

/// Bounded exponential backoff: `base * 2^attempt`, capped at `max_delay`.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 5,
            base_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let shift = attempt.min(MAX_EXPONENTIAL_SHIFT);
        let delay = self.base_delay.saturating_mul(1 << shift);
        delay.min(self.max_delay)
    }
}

/// Publishes records through a sink, absorbing transient failures.
pub struct BrokerPublisher<S: RecordSink> {
    sink: S,
    policy: RetryPolicy,
}

impl<S: RecordSink> BrokerPublisher<S> {
    pub fn new(sink: S, policy: RetryPolicy) -> Self {
        Self { sink, policy }
    }

    /// Publish one record, retrying transient failures up to
    /// `policy.max_retries` times. Exhausting the budget yields
    /// [`PublishOutcome::TransientFailure`]; it is never silently dropped.
    pub async fn publish(&self, key: Option<&str>, payload: &[u8]) -> PublishOutcome {
        let mut attempt: u32 = 0;
        loop {
            log::debug!(
                "publish attempt {}/{} (payload {} bytes)",
                attempt + 1,
                self.policy.max_retries + 1,
                payload.len()
            );
            match self.sink.send(key, payload).await {
                Ok(()) => return PublishOutcome::Delivered,
                Err(SinkError::Permanent(reason)) => {
                    log::debug!("permanent broker rejection: {}", reason);
                    return PublishOutcome::Rejected(reason);
                }
                Err(SinkError::Transient(reason)) => {
                    if attempt >= self.policy.max_retries {
                        return PublishOutcome::TransientFailure(reason);
                    }
                    let delay = self.policy.delay_for(attempt);
                    log::warn!(
                        "transient publish failure (attempt {}/{}), retrying in {:?}: {}",
                        attempt + 1,
                        self.policy.max_retries + 1,
                        delay,
                        reason
                    );
                    sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }

    /// Flush the underlying sink. Records are individually acknowledged, so
    /// a flush failure is logged, not escalated.
    pub fn flush(&self) {
        if let Err(e) = self.sink.flush(Duration::from_secs(10)) {
            log::warn!("sink flush failed: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct ScriptedSink {
        script: Mutex<VecDeque<Result<(), SinkError>>>,
        attempts: AtomicUsize,
    }

    impl ScriptedSink {
        fn new(script: Vec<Result<(), SinkError>>) -> Self {
            Self {
                script: Mutex::new(script.into()),
                attempts: AtomicUsize::new(0),
            }
        }

        fn attempts(&self) -> usize {
            self.attempts.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl RecordSink for ScriptedSink {
        async fn send(&self, _key: Option<&str>, _payload: &[u8]) -> Result<(), SinkError> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            self.script.lock().unwrap().pop_front().unwrap_or(Ok(()))
        }

        fn flush(&self, _timeout: Duration) -> Result<(), SinkError> {
            Ok(())
        }
    }

    fn fast_policy(max_retries: u32) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            base_delay: Duration::from_millis(0),
            max_delay: Duration::from_millis(0),
        }
    }

    #[tokio::test]
    async fn test_delivered_first_try() {
        let publisher = BrokerPublisher::new(ScriptedSink::new(vec![Ok(())]), fast_policy(3));
        assert_eq!(publisher.publish(None, b"x").await, PublishOutcome::Delivered);
    }

    #[tokio::test]
    async fn test_transient_then_delivered() {
        let sink = ScriptedSink::new(vec![
            Err(SinkError::Transient("blip".into())),
            Err(SinkError::Transient("blip".into())),
            Ok(()),
        ]);
        let publisher = BrokerPublisher::new(sink, fast_policy(2));
        assert_eq!(publisher.publish(None, b"x").await, PublishOutcome::Delivered);
        assert_eq!(publisher.sink.attempts(), 3);
    }

    #[tokio::test]
    async fn test_retry_budget_exhausted() {
        let sink = ScriptedSink::new(vec![
            Err(SinkError::Transient("down".into())),
            Err(SinkError::Transient("down".into())),
            Err(SinkError::Transient("down".into())),
        ]);
        let publisher = BrokerPublisher::new(sink, fast_policy(2));
        assert!(matches!(
            publisher.publish(None, b"x").await,
            PublishOutcome::TransientFailure(_)
        ));
        // 1 initial attempt + exactly max_retries retries
        assert_eq!(publisher.sink.attempts(), 3);
    }

    #[tokio::test]
    async fn test_permanent_rejection_skips_retry() {
        let sink = ScriptedSink::new(vec![Err(SinkError::Permanent("too large".into()))]);
        let publisher = BrokerPublisher::new(sink, fast_policy(5));
        assert!(matches!(
            publisher.publish(None, b"x").await,
            PublishOutcome::Rejected(_)
        ));
        assert_eq!(publisher.sink.attempts(), 1);
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let policy = RetryPolicy {
            max_retries: 10,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(500),
        };
        assert_eq!(policy.delay_for(0), Duration::from_millis(100));
        assert_eq!(policy.delay_for(1), Duration::from_millis(200));
        assert_eq!(policy.delay_for(2), Duration::from_millis(400));
        assert_eq!(policy.delay_for(3), Duration::from_millis(500));
        assert_eq!(policy.delay_for(60), Duration::from_millis(500));
    }
}
