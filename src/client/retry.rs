use crate::client::constants::DEFAULT_REPLY_TIMEOUT;
use std::time::Duration;

/// How long a probe waits per attempt and how many attempts it may make.
///
/// `max_attempts: None` retries forever. A probe against an unreachable
/// server then never completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub timeout: Duration,
    pub max_attempts: Option<u32>,
}

impl RetryPolicy {
    pub fn unbounded(timeout: Duration) -> Self {
        Self {
            timeout,
            max_attempts: None,
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }

    /// Whether another attempt may start after `attempts_made`.
    pub fn allows(&self, attempts_made: u32) -> bool {
        self.max_attempts.map_or(true, |max| attempts_made < max)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::unbounded(DEFAULT_REPLY_TIMEOUT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unbounded_always_allows() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.timeout, Duration::from_secs(1));
        assert!(policy.allows(0));
        assert!(policy.allows(u32::MAX - 1));
    }

    #[test]
    fn test_bounded() {
        let policy = RetryPolicy::unbounded(Duration::from_millis(10)).with_max_attempts(3);
        assert!(policy.allows(0));
        assert!(policy.allows(2));
        assert!(!policy.allows(3));
    }
}
