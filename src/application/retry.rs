//! Bounded retry for boolean probes

use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::infrastructure::traits::{Sleeper, ThreadSleeper};

/// Retries a probe while it reports `false`.
///
/// A fixed number of attempts with a fixed delay between them. Exhausting
/// the attempts yields `Ok(false)`, indistinguishable from a single failed
/// probe. Errors returned by the probe are not retried.
#[derive(Clone)]
pub struct ProbeRetry {
    attempts: u32,
    interval: Duration,
    sleeper: Arc<dyn Sleeper>,
}

impl ProbeRetry {
    pub fn new(attempts: u32, interval: Duration) -> Self {
        Self::with_sleeper(attempts, interval, Arc::new(ThreadSleeper))
    }

    pub fn with_sleeper(attempts: u32, interval: Duration, sleeper: Arc<dyn Sleeper>) -> Self {
        Self {
            attempts: attempts.max(1),
            interval,
            sleeper,
        }
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn run<E>(&self, mut probe: impl FnMut() -> Result<bool, E>) -> Result<bool, E> {
        for attempt in 1..=self.attempts {
            if probe()? {
                return Ok(true);
            }
            if attempt < self.attempts {
                debug!(attempt, max = self.attempts, "probe negative, retrying");
                self.sleeper.sleep(self.interval);
            }
        }
        Ok(false)
    }
}

impl std::fmt::Debug for ProbeRetry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProbeRetry")
            .field("attempts", &self.attempts)
            .field("interval", &self.interval)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingSleeper {
        sleeps: Mutex<Vec<Duration>>,
    }

    impl Sleeper for RecordingSleeper {
        fn sleep(&self, duration: Duration) {
            self.sleeps.lock().unwrap().push(duration);
        }
    }

    fn retry(attempts: u32) -> (ProbeRetry, Arc<RecordingSleeper>) {
        let sleeper = Arc::new(RecordingSleeper::default());
        let retry = ProbeRetry::with_sleeper(attempts, Duration::from_secs(1), sleeper.clone());
        (retry, sleeper)
    }

    #[test]
    fn given_always_false_when_running_then_five_attempts_four_sleeps() {
        let (retry, sleeper) = retry(5);
        let mut calls = 0;

        let result: Result<bool, ()> = retry.run(|| {
            calls += 1;
            Ok(false)
        });

        assert_eq!(result, Ok(false));
        assert_eq!(calls, 5);
        assert_eq!(*sleeper.sleeps.lock().unwrap(), vec![Duration::from_secs(1); 4]);
    }

    #[test]
    fn given_true_on_third_attempt_when_running_then_stops_early() {
        let (retry, sleeper) = retry(5);
        let mut calls = 0;

        let result: Result<bool, ()> = retry.run(|| {
            calls += 1;
            Ok(calls == 3)
        });

        assert_eq!(result, Ok(true));
        assert_eq!(calls, 3);
        assert_eq!(sleeper.sleeps.lock().unwrap().len(), 2);
    }

    #[test]
    fn given_error_when_running_then_propagates_without_retry() {
        let (retry, sleeper) = retry(5);
        let mut calls = 0;

        let result: Result<bool, &str> = retry.run(|| {
            calls += 1;
            Err("boom")
        });

        assert_eq!(result, Err("boom"));
        assert_eq!(calls, 1);
        assert!(sleeper.sleeps.lock().unwrap().is_empty());
    }

    #[test]
    fn given_zero_attempts_when_created_then_probes_once() {
        let (retry, _) = retry(0);

        assert_eq!(retry.attempts(), 1);
    }
}
