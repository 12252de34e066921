//! Bounded retry counter for upstream reconnection.

/// Default number of reconnects allowed per session.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Counts upstream reconnects and refuses once the bound is reached.
///
/// The count is never reset within a session, so the bound covers the
/// whole session lifetime rather than consecutive failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    count: u32,
    max_retries: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_RETRIES)
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32) -> Self {
        Self {
            count: 0,
            max_retries,
        }
    }

    /// Consume one retry.
    ///
    /// Returns `true` if the retry was granted. Once the bound is reached the
    /// count stays at the bound and every call returns `false`.
    pub fn attempt(&mut self) -> bool {
        if self.count < self.max_retries {
            self.count += 1;
            true
        } else {
            false
        }
    }

    /// Whether no retries remain.
    pub fn exhausted(&self) -> bool {
        self.count >= self.max_retries
    }

    /// Retries consumed so far.
    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_bound() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_retries(), 3);
        assert_eq!(policy.count(), 0);
        assert!(!policy.exhausted());
    }

    #[test]
    fn test_attempt_until_exhausted() {
        let mut policy = RetryPolicy::new(3);
        assert!(policy.attempt());
        assert!(policy.attempt());
        assert!(!policy.exhausted());
        assert!(policy.attempt());
        assert!(policy.exhausted());

        assert!(!policy.attempt());
        assert!(!policy.attempt());
        assert_eq!(policy.count(), 3);
    }

    #[test]
    fn test_zero_bound_is_immediately_exhausted() {
        let mut policy = RetryPolicy::new(0);
        assert!(policy.exhausted());
        assert!(!policy.attempt());
        assert_eq!(policy.count(), 0);
    }
}
