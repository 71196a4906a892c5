//! Retry policy for page requests.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// How long to wait between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Backoff {
    /// Same delay after every failed attempt.
    Fixed {
        #[serde(with = "secs")]
        delay: Duration,
    },
    /// `base * 2^(n-1)` after the n-th failed attempt.
    Exponential {
        #[serde(with = "secs")]
        base: Duration,
    },
}

/// Bounded retry policy: at most `max_attempts` requests per page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Backoff,
}

impl RetryPolicy {
    /// Five attempts, five seconds apart.
    pub fn fixed_default() -> Self {
        Self {
            max_attempts: 5,
            backoff: Backoff::Fixed {
                delay: Duration::from_secs(5),
            },
        }
    }

    /// Zero-delay policy, used to exercise retry exhaustion without waiting.
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            backoff: Backoff::Fixed {
                delay: Duration::ZERO,
            },
        }
    }

    /// Delay to wait after failed attempt number `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        match self.backoff {
            Backoff::Fixed { delay } => delay,
            Backoff::Exponential { base } => {
                let exp = attempt.saturating_sub(1).min(16);
                base.saturating_mul(1u32 << exp)
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::fixed_default()
    }
}

/// Blocks the current thread between attempts. Injected so tests can record
/// delays instead of sleeping.
pub type Sleeper = fn(Duration);

pub fn thread_sleep(d: Duration) {
    if !d.is_zero() {
        std::thread::sleep(d);
    }
}

mod secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_f64(d.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(d)?;
        Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_delay_is_constant() {
        let p = RetryPolicy::fixed_default();
        assert_eq!(p.max_attempts, 5);
        assert_eq!(p.delay_for(1), Duration::from_secs(5));
        assert_eq!(p.delay_for(4), Duration::from_secs(5));
    }

    #[test]
    fn exponential_delay_doubles() {
        let p = RetryPolicy {
            max_attempts: 4,
            backoff: Backoff::Exponential {
                base: Duration::from_millis(500),
            },
        };
        assert_eq!(p.delay_for(1), Duration::from_millis(500));
        assert_eq!(p.delay_for(2), Duration::from_millis(1000));
        assert_eq!(p.delay_for(3), Duration::from_millis(2000));
    }

    #[test]
    fn immediate_policy_never_waits() {
        let p = RetryPolicy::immediate(3);
        assert!(p.delay_for(1).is_zero());
        assert!(p.delay_for(3).is_zero());
    }

    #[test]
    fn partial_toml_keeps_default_backoff() {
        let p: RetryPolicy = toml::from_str("max_attempts = 2").unwrap();
        assert_eq!(p.max_attempts, 2);
        assert_eq!(p.delay_for(1), Duration::from_secs(5));
    }

    #[test]
    fn backoff_from_toml() {
        let p: RetryPolicy = toml::from_str(
            r#"
            max_attempts = 3
            [backoff]
            type = "exponential"
            base = 0.25
            "#,
        )
        .unwrap();
        assert_eq!(p.max_attempts, 3);
        assert_eq!(p.delay_for(2), Duration::from_millis(500));
    }
}
