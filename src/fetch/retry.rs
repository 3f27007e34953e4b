use crate::error::{CommitGridError, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::time::Duration;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RetryPolicy {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_base_delay", with = "human_duration")]
    pub base_delay: Duration,
    #[serde(default = "default_max_delay", with = "human_duration")]
    pub max_delay: Duration,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_base_delay() -> Duration {
    Duration::from_millis(500)
}

fn default_max_delay() -> Duration {
    Duration::from_secs(60)
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay: default_base_delay(),
            max_delay: default_max_delay(),
        }
    }
}

impl RetryPolicy {
    /// Retries with no waiting, for tests and dry runs.
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_attempts == 0 {
            return Err(CommitGridError::Config("retry.max_attempts must be at least 1".to_string()));
        }
        if self.base_delay > self.max_delay {
            return Err(CommitGridError::Config(
                "retry.base_delay must not exceed retry.max_delay".to_string(),
            ));
        }
        Ok(())
    }

    /// Delay before attempt `attempt + 1`, given that `attempt` (1-based) just failed.
    pub fn delay_for(&self, attempt: u32, err: &CommitGridError) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        let backoff = self.base_delay.saturating_mul(1u32 << exponent);
        let wanted = match err.retry_after() {
            Some(requested) => backoff.max(requested),
            None => backoff,
        };
        wanted.min(self.max_delay)
    }

    /// Runs `op` until it succeeds, fails with a non-retryable error, or
    /// the attempt budget runs out. `sleep` is handed each backoff delay.
    pub fn run<T, F, S>(&self, what: &str, mut op: F, mut sleep: S) -> Result<T>
    where
        F: FnMut() -> Result<T>,
        S: FnMut(Duration),
    {
        let mut attempt = 1;
        loop {
            match op() {
                Ok(value) => return Ok(value),
                Err(err) if err.is_retryable() && attempt < self.max_attempts => {
                    let delay = self.delay_for(attempt, &err);
                    warn!(
                        target: "commitgrid::fetch",
                        %err,
                        attempt,
                        max_attempts = self.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        "{what} failed, retrying"
                    );
                    sleep(delay);
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

mod human_duration {
    use super::*;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&humantime::format_duration(*value).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Duration, D::Error> {
        let raw = String::deserialize(deserializer)?;
        humantime::parse_duration(&raw).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    fn transient() -> CommitGridError {
        CommitGridError::transient("test", "boom")
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let policy = RetryPolicy {
            max_attempts: 10,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(350),
        };
        assert_eq!(policy.delay_for(1, &transient()), Duration::from_millis(100));
        assert_eq!(policy.delay_for(2, &transient()), Duration::from_millis(200));
        assert_eq!(policy.delay_for(3, &transient()), Duration::from_millis(350));
    }

    #[test]
    fn rate_limit_delay_wins_over_backoff() {
        let policy = RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(60),
        };
        let err = CommitGridError::RateLimited {
            source_name: "test".to_string(),
            retry_after: Some(Duration::from_secs(5)),
        };
        assert_eq!(policy.delay_for(1, &err), Duration::from_secs(5));
    }

    #[test]
    fn retries_until_success() {
        let policy = RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(10),
            max_delay: Duration::from_secs(1),
        };
        let mut calls = 0;
        let slept = RefCell::new(Vec::new());
        let value = policy
            .run(
                "query",
                || {
                    calls += 1;
                    if calls < 3 {
                        Err(transient())
                    } else {
                        Ok(42)
                    }
                },
                |d| slept.borrow_mut().push(d),
            )
            .unwrap();
        assert_eq!(value, 42);
        assert_eq!(calls, 3);
        assert_eq!(
            *slept.borrow(),
            vec![Duration::from_millis(10), Duration::from_millis(20)]
        );
    }

    #[test]
    fn gives_up_after_budget() {
        let mut calls = 0;
        let result: Result<()> = RetryPolicy::immediate(2).run(
            "query",
            || {
                calls += 1;
                Err(transient())
            },
            |_| {},
        );
        assert!(result.is_err());
        assert_eq!(calls, 2);
    }

    #[test]
    fn does_not_retry_malformed_responses() {
        let mut calls = 0;
        let result: Result<()> = RetryPolicy::immediate(5).run(
            "query",
            || {
                calls += 1;
                Err(CommitGridError::permanent("test", "bad json"))
            },
            |_| {},
        );
        assert!(result.is_err());
        assert_eq!(calls, 1);
    }
}
