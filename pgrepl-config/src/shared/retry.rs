use serde::{Deserialize, Serialize};

use crate::shared::ValidationError;

/// Backoff policy for operations retried until a deadline, such as dropping a
/// replication slot that is still in use.
///
/// The number of attempts is bounded by the operation's timeout, not by this policy.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Initial delay, in milliseconds, before the first retry.
    pub initial_delay_ms: u64,

    /// Maximum delay between retries.
    pub max_delay_ms: u64,

    /// Exponential backoff multiplier applied to the delay after each attempt.
    pub backoff_factor: f32,
}

impl RetryConfig {
    /// Validates the backoff parameters.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.initial_delay_ms == 0 {
            return Err(ValidationError::InvalidRetry(
                "`initial_delay_ms` must be greater than zero".to_owned(),
            ));
        }

        if self.max_delay_ms < self.initial_delay_ms {
            return Err(ValidationError::InvalidRetry(
                "`max_delay_ms` must not be smaller than `initial_delay_ms`".to_owned(),
            ));
        }

        if !self.backoff_factor.is_finite() || self.backoff_factor < 1.0 {
            return Err(ValidationError::InvalidRetry(
                "`backoff_factor` must be a finite number greater than or equal to 1".to_owned(),
            ));
        }

        Ok(())
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            initial_delay_ms: 500,
            max_delay_ms: 10_000,
            backoff_factor: 2.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_retry_config_is_valid() {
        assert!(RetryConfig::default().validate().is_ok());
    }

    #[test]
    fn rejects_shrinking_backoff() {
        let config = RetryConfig {
            backoff_factor: 0.5,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ValidationError::InvalidRetry(_))
        ));
    }

    #[test]
    fn rejects_max_delay_below_initial_delay() {
        let config = RetryConfig {
            initial_delay_ms: 1_000,
            max_delay_ms: 100,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
