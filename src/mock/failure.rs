//! Failure injection for mock clients
//!
//! Failures are keyed by operation and optionally by target (object key,
//! workspace location, job id). A targeted failure takes precedence over an
//! untargeted one for the same operation.

use std::collections::HashMap;
use std::time::Duration;

/// Operations a mock can fail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MockOperation {
    GetJobDetails,
    Compress,
    Encrypt,
    Put,
}

/// Failure configuration for an operation
#[derive(Debug, Clone, Default)]
pub struct FailureConfig {
    /// Error code to return (if any)
    pub error_code: Option<String>,
    /// Error message to return
    pub error_message: Option<String>,
    /// Delay to add before responding
    pub delay: Option<Duration>,
    /// Number of times to fail before succeeding (None = always fail)
    pub fail_count: Option<u32>,
}

impl FailureConfig {
    /// Create a config that returns an error
    pub fn error(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error_code: Some(code.into()),
            error_message: Some(message.into()),
            ..Self::default()
        }
    }

    /// Create a config that just adds delay
    pub fn delay(duration: Duration) -> Self {
        Self {
            delay: Some(duration),
            ..Self::default()
        }
    }

    /// Add a delay before the error (or success)
    pub fn with_delay(mut self, duration: Duration) -> Self {
        self.delay = Some(duration);
        self
    }

    /// Set the number of times to fail before succeeding
    pub fn with_fail_count(mut self, count: u32) -> Self {
        self.fail_count = Some(count);
        self
    }

    pub fn code(&self) -> &str {
        self.error_code.as_deref().unwrap_or("INTERNAL")
    }

    pub fn message(&self) -> &str {
        self.error_message.as_deref().unwrap_or("injected failure")
    }
}

type FailureKey = (MockOperation, Option<String>);

/// Failure injector shared by the mocks
#[derive(Debug, Default)]
pub struct FailureInjector {
    configs: HashMap<FailureKey, FailureConfig>,
    call_counts: HashMap<FailureKey, u32>,
}

impl FailureInjector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inject a failure for every call of `op`
    pub fn inject(&mut self, op: MockOperation, config: FailureConfig) {
        self.insert((op, None), config);
    }

    /// Inject a failure for calls of `op` on `target` only
    pub fn inject_for(&mut self, op: MockOperation, target: impl Into<String>, config: FailureConfig) {
        self.insert((op, Some(target.into())), config);
    }

    fn insert(&mut self, key: FailureKey, config: FailureConfig) {
        self.call_counts.insert(key.clone(), 0);
        self.configs.insert(key, config);
    }

    pub fn clear(&mut self) {
        self.configs.clear();
        self.call_counts.clear();
    }

    /// Failure to apply to this call, if any.
    ///
    /// A config whose `fail_count` is used up still applies its delay but no
    /// longer returns an error.
    pub fn check(&mut self, op: MockOperation, target: &str) -> Option<FailureConfig> {
        let targeted = (op, Some(target.to_string()));
        let key = if self.configs.contains_key(&targeted) {
            targeted
        } else {
            (op, None)
        };

        let config = self.configs.get(&key)?.clone();
        let count = self.call_counts.entry(key).or_insert(0);
        *count += 1;

        if let Some(limit) = config.fail_count {
            if *count > limit {
                return Some(FailureConfig {
                    delay: config.delay,
                    ..FailureConfig::default()
                });
            }
        }

        Some(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_config_error() {
        let config = FailureConfig::error("NETWORK", "reset by peer");
        assert_eq!(config.code(), "NETWORK");
        assert_eq!(config.message(), "reset by peer");
        assert!(config.delay.is_none());
    }

    #[test]
    fn test_untargeted_applies_to_all() {
        let mut injector = FailureInjector::new();
        assert!(injector.check(MockOperation::Put, "a.zip").is_none());

        injector.inject(MockOperation::Put, FailureConfig::error("NETWORK", "down"));
        assert!(injector.check(MockOperation::Put, "a.zip").is_some());
        assert!(injector.check(MockOperation::Put, "b.zip").is_some());
        assert!(injector.check(MockOperation::Compress, "dist").is_none());
    }

    #[test]
    fn test_targeted_only_hits_target() {
        let mut injector = FailureInjector::new();
        injector.inject_for(MockOperation::Compress, "dist", FailureConfig::error("IO", "x"));

        assert!(injector.check(MockOperation::Compress, "dist").is_some());
        assert!(injector.check(MockOperation::Compress, "other").is_none());
    }

    #[test]
    fn test_fail_count_then_succeed() {
        let mut injector = FailureInjector::new();
        injector.inject(
            MockOperation::GetJobDetails,
            FailureConfig::error("THROTTLED", "slow down").with_fail_count(2),
        );

        for _ in 0..2 {
            let config = injector.check(MockOperation::GetJobDetails, "job").unwrap();
            assert!(config.error_code.is_some());
        }
        let config = injector.check(MockOperation::GetJobDetails, "job").unwrap();
        assert!(config.error_code.is_none());
    }

    #[test]
    fn test_clear() {
        let mut injector = FailureInjector::new();
        injector.inject(MockOperation::Encrypt, FailureConfig::error("X", "y"));
        injector.clear();
        assert!(injector.check(MockOperation::Encrypt, "").is_none());
    }
}
