use std::time::Duration;

use anyhow::{Context, Result};

const MAX_VALIDITY_ENV: &str = "VIGIL_JWT_MAX_VALIDITY";
const DEFAULT_VALIDITY_ENV: &str = "VIGIL_JWT_DEFAULT_VALIDITY";

// Token validity policy sourced from environment variables (seconds).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenPolicy {
    /// Hard cap on any issued token's validity.
    pub jwt_max_validity: Duration,
    /// Validity applied when the caller does not request one.
    pub jwt_default_validity: Duration,
}

impl Default for TokenPolicy {
    fn default() -> Self {
        Self {
            jwt_max_validity: Duration::from_secs(720 * 3600),
            jwt_default_validity: Duration::from_secs(24 * 3600),
        }
    }
}

impl TokenPolicy {
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();
        let jwt_max_validity = read_seconds(MAX_VALIDITY_ENV)?.unwrap_or(defaults.jwt_max_validity);
        let jwt_default_validity =
            read_seconds(DEFAULT_VALIDITY_ENV)?.unwrap_or(defaults.jwt_default_validity);
        Ok(Self {
            jwt_max_validity,
            jwt_default_validity,
        })
    }

    /// The validity a token issuance call should use: the requested duration
    /// when one was given, the policy default otherwise, always capped by
    /// the policy maximum.
    pub fn effective_validity(&self, requested: Option<Duration>) -> Duration {
        let requested = match requested {
            Some(duration) if !duration.is_zero() => duration,
            _ => self.jwt_default_validity,
        };
        requested.min(self.jwt_max_validity)
    }
}

fn read_seconds(name: &str) -> Result<Option<Duration>> {
    match std::env::var(name) {
        Ok(value) => {
            let seconds: u64 = value
                .parse()
                .with_context(|| format!("parse {name} as seconds"))?;
            Ok(Some(Duration::from_secs(seconds)))
        }
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let policy = TokenPolicy::default();
        assert!(policy.jwt_default_validity < policy.jwt_max_validity);
    }

    #[test]
    fn effective_validity_caps_and_defaults() {
        let policy = TokenPolicy {
            jwt_max_validity: Duration::from_secs(600),
            jwt_default_validity: Duration::from_secs(60),
        };
        assert_eq!(
            policy.effective_validity(Some(Duration::from_secs(120))),
            Duration::from_secs(120)
        );
        assert_eq!(
            policy.effective_validity(Some(Duration::from_secs(3600))),
            Duration::from_secs(600)
        );
        assert_eq!(policy.effective_validity(None), Duration::from_secs(60));
        assert_eq!(
            policy.effective_validity(Some(Duration::ZERO)),
            Duration::from_secs(60)
        );
    }
}
