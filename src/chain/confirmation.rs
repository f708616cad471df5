//! Confirmation polling for broadcast transactions
//!
//! A freshly broadcast hash usually becomes queryable within seconds, so the
//! poller asks every 500ms during the first minute. After that the
//! transaction is likely delayed and the poller backs off to every 10s, until
//! one hour after the start, when it gives up and hands the hash back to the
//! caller for manual follow-up.

use super::{ChainClient, TxHash, TxInfo};
use crate::config::PollerConfig;
use crate::error::{GatewayError, GatewayResult};

use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Two-phase backoff schedule, measured from the start of polling
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSchedule {
    pub fast_interval: Duration,
    pub fast_window: Duration,
    pub slow_interval: Duration,
    pub give_up_after: Duration,
}

impl PollSchedule {
    /// Delay before the next attempt after a miss at `elapsed`,
    /// or `None` once the give-up deadline is reached
    pub fn delay_after(&self, elapsed: Duration) -> Option<Duration> {
        if elapsed < self.fast_window {
            Some(self.fast_interval)
        } else if elapsed < self.give_up_after {
            Some(self.slow_interval)
        } else {
            None
        }
    }
}

impl Default for PollSchedule {
    fn default() -> Self {
        Self::from(&PollerConfig::default())
    }
}

impl From<&PollerConfig> for PollSchedule {
    fn from(config: &PollerConfig) -> Self {
        Self {
            fast_interval: config.fast_interval(),
            fast_window: config.fast_window(),
            slow_interval: config.slow_interval(),
            give_up_after: config.give_up_after(),
        }
    }
}

/// Waits for a transaction hash to show up on chain
pub struct ConfirmationPoller {
    client: Arc<dyn ChainClient>,
    schedule: PollSchedule,
}

impl ConfirmationPoller {
    pub fn new(client: Arc<dyn ChainClient>, schedule: PollSchedule) -> Self {
        Self { client, schedule }
    }

    /// Poll until the transaction is found or the give-up deadline passes
    ///
    /// The first attempt is immediate. Every lookup failure counts as a miss.
    pub async fn wait_for(&self, tx_hash: &TxHash) -> GatewayResult<TxInfo> {
        let started = Instant::now();
        let mut attempts: u32 = 0;

        loop {
            attempts += 1;
            crate::metrics::record_poll_attempt();

            match self.client.tx_info(tx_hash).await {
                Ok(tx_info) => {
                    let elapsed = started.elapsed();
                    info!(
                        "Transaction {} confirmed at height {} after {} attempts ({:.1}s)",
                        tx_hash,
                        tx_info.height,
                        attempts,
                        elapsed.as_secs_f64()
                    );
                    crate::metrics::record_tx_confirmed(elapsed.as_secs_f64());
                    return Ok(tx_info);
                }
                Err(e) => {
                    let elapsed = started.elapsed();
                    match self.schedule.delay_after(elapsed) {
                        Some(delay) if e.is_retryable() => {
                            debug!(
                                "Transaction {} not yet available (attempt {}): {}; retrying in {:?}",
                                tx_hash, attempts, e, delay
                            );
                            tokio::time::sleep(delay).await;
                        }
                        Some(delay) => {
                            // Still a miss; the deadline alone ends polling
                            warn!(
                                "Unexpected error polling {} (attempt {}): {}; retrying in {:?}",
                                tx_hash, attempts, e, delay
                            );
                            tokio::time::sleep(delay).await;
                        }
                        None => {
                            warn!(
                                "Giving up on transaction {} after {} attempts: {}",
                                tx_hash, attempts, e
                            );
                            crate::metrics::record_tx_queued();
                            return Err(GatewayError::SubmissionQueued {
                                tx_hash: tx_hash.to_string(),
                            });
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::{sample_tx_info, MockChainClient};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;
    use tokio_test::{assert_err, assert_ok};

    /// Paused-clock timers resolve to whole milliseconds
    fn assert_close(actual: Duration, expected: Duration) {
        let diff = if actual > expected {
            actual - expected
        } else {
            expected - actual
        };
        assert!(
            diff <= Duration::from_millis(1),
            "expected {:?}, got {:?}",
            expected,
            actual
        );
    }

    fn not_found(hash: &TxHash) -> GatewayError {
        GatewayError::TxNotFound {
            tx_hash: hash.to_string(),
        }
    }

    #[test]
    fn test_schedule_phases() {
        let schedule = PollSchedule::default();
        assert_eq!(
            schedule.delay_after(Duration::ZERO),
            Some(Duration::from_millis(500))
        );
        assert_eq!(
            schedule.delay_after(Duration::from_millis(59_999)),
            Some(Duration::from_millis(500))
        );
        assert_eq!(
            schedule.delay_after(Duration::from_secs(60)),
            Some(Duration::from_secs(10))
        );
        assert_eq!(
            schedule.delay_after(Duration::from_secs(3599)),
            Some(Duration::from_secs(10))
        );
        assert_eq!(schedule.delay_after(Duration::from_secs(3600)), None);
        assert_eq!(schedule.delay_after(Duration::from_secs(3601)), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_attempt_is_immediate() {
        let start = Instant::now();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_in_mock = seen.clone();

        let mut client = MockChainClient::new();
        client.expect_tx_info().times(1).returning(move |hash| {
            seen_in_mock.lock().unwrap().push(Instant::now());
            Ok(sample_tx_info(hash.as_str(), 10))
        });

        let poller = ConfirmationPoller::new(Arc::new(client), PollSchedule::default());
        let info = assert_ok!(poller.wait_for(&TxHash::new("ABC123")).await);

        assert_eq!(info.txhash, "ABC123");
        assert_eq!(seen.lock().unwrap()[0], start);
    }

    #[tokio::test(start_paused = true)]
    async fn test_confirms_on_third_attempt() {
        let start = Instant::now();
        let calls = Arc::new(AtomicU32::new(0));
        let seen = Arc::new(Mutex::new(Vec::new()));
        let (calls_in_mock, seen_in_mock) = (calls.clone(), seen.clone());

        let mut client = MockChainClient::new();
        client.expect_tx_info().returning(move |hash| {
            seen_in_mock.lock().unwrap().push(Instant::now());
            if calls_in_mock.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(not_found(hash))
            } else {
                Ok(sample_tx_info(hash.as_str(), 77))
            }
        });

        let poller = ConfirmationPoller::new(Arc::new(client), PollSchedule::default());
        let info = assert_ok!(poller.wait_for(&TxHash::new("ABC123")).await);

        assert_eq!(info.height, 77);
        assert_eq!(calls.load(Ordering::SeqCst), 3);

        let seen = seen.lock().unwrap();
        assert_close(seen[1] - seen[0], Duration::from_millis(500));
        assert_close(seen[2] - seen[1], Duration::from_millis(500));
        assert!(seen[2] - start <= Duration::from_millis(1100));
    }

    #[tokio::test(start_paused = true)]
    async fn test_backs_off_after_fast_window() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_in_mock = seen.clone();
        let start = Instant::now();

        let mut client = MockChainClient::new();
        client.expect_tx_info().returning(move |hash| {
            let now = Instant::now();
            seen_in_mock.lock().unwrap().push(now);
            if now - start >= Duration::from_secs(95) {
                Ok(sample_tx_info(hash.as_str(), 1))
            } else {
                Err(GatewayError::Remote("connection reset".into()))
            }
        });

        let poller = ConfirmationPoller::new(Arc::new(client), PollSchedule::default());
        assert_ok!(poller.wait_for(&TxHash::new("ABC123")).await);

        let seen = seen.lock().unwrap();
        for pair in seen.windows(2) {
            let since_start = pair[0] - start;
            let gap = pair[1] - pair[0];
            if since_start < Duration::from_secs(60) {
                assert_close(gap, Duration::from_millis(500));
            } else {
                assert_close(gap, Duration::from_secs(10));
            }
        }
        // 120 fast attempts cover the first minute, then 10s steps up to 100s
        assert_eq!(seen.len(), 120 + 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unexpected_errors_keep_polling() {
        let calls = Arc::new(AtomicU32::new(0));
        let calls_in_mock = calls.clone();

        let mut client = MockChainClient::new();
        client.expect_tx_info().returning(move |hash| {
            if calls_in_mock.fetch_add(1, Ordering::SeqCst) < 3 {
                Err(GatewayError::Internal("bad gateway body".into()))
            } else {
                Ok(sample_tx_info(hash.as_str(), 5))
            }
        });

        let start = Instant::now();
        let poller = ConfirmationPoller::new(Arc::new(client), PollSchedule::default());
        let info = assert_ok!(poller.wait_for(&TxHash::new("ABC123")).await);

        assert_eq!(info.height, 5);
        assert_eq!(calls.load(Ordering::SeqCst), 4);
        assert_close(start.elapsed(), Duration::from_millis(1500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_gives_up_at_hard_deadline() {
        let start = Instant::now();
        let last = Arc::new(Mutex::new(start));
        let last_in_mock = last.clone();

        let mut client = MockChainClient::new();
        client.expect_tx_info().returning(move |hash| {
            *last_in_mock.lock().unwrap() = Instant::now();
            Err(not_found(hash))
        });

        let poller = ConfirmationPoller::new(Arc::new(client), PollSchedule::default());
        let err = assert_err!(poller.wait_for(&TxHash::new("ABC123")).await);

        assert!(matches!(err, GatewayError::SubmissionQueued { ref tx_hash } if tx_hash == "ABC123"));
        assert!(err.to_string().contains("ABC123"));

        let last_attempt = *last.lock().unwrap() - start;
        assert_close(last_attempt, Duration::from_secs(3600));
        assert_close(start.elapsed(), Duration::from_secs(3600));
    }

    #[tokio::test(start_paused = true)]
    async fn test_custom_schedule() {
        let schedule = PollSchedule {
            fast_interval: Duration::from_millis(100),
            fast_window: Duration::from_secs(1),
            slow_interval: Duration::from_secs(1),
            give_up_after: Duration::from_secs(3),
        };

        let calls = Arc::new(AtomicU32::new(0));
        let calls_in_mock = calls.clone();
        let mut client = MockChainClient::new();
        client.expect_tx_info().returning(move |hash| {
            calls_in_mock.fetch_add(1, Ordering::SeqCst);
            Err(not_found(hash))
        });

        let poller = ConfirmationPoller::new(Arc::new(client), schedule);
        assert_err!(poller.wait_for(&TxHash::new("BEEF")).await);

        // 10 fast attempts, then attempts at 1s, 2s and a final one at 3s
        assert_eq!(calls.load(Ordering::SeqCst), 10 + 3);
    }
}
