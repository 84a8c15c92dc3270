// Copyright (c) 2025 - Cowboy AI, Inc.
//! Runtime configuration
//!
//! Settings that are not part of a project's declarative description:
//! provider region, template host and readiness polling budget. Loaded from
//! the environment with defaults for every value.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::errors::{FormationError, FormationResult};

fn default_region() -> String {
    "us-east-1".to_string()
}

fn default_template_host() -> String {
    "https://s3.amazonaws.com".to_string()
}

fn default_capabilities() -> Vec<String> {
    vec!["CAPABILITY_IAM".to_string()]
}

fn default_poll_interval_secs() -> u64 {
    10
}

fn default_poll_max_attempts() -> u32 {
    180
}

/// Readiness polling budget
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadinessPolicy {
    /// Delay between status polls
    pub interval: Duration,
    /// Polls before giving up with a timeout
    pub max_attempts: u32,
}

impl ReadinessPolicy {
    pub fn new(interval: Duration, max_attempts: u32) -> Self {
        Self {
            interval,
            max_attempts,
        }
    }

    /// Upper bound on time spent sleeping between polls
    pub fn budget(&self) -> Duration {
        self.interval * self.max_attempts
    }
}

impl Default for ReadinessPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(default_poll_interval_secs()),
            max_attempts: default_poll_max_attempts(),
        }
    }
}

/// Configuration for a formation run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormationConfig {
    /// Provider region used when a project does not name one
    #[serde(default = "default_region")]
    pub region: String,

    /// Host prefix for template URLs
    #[serde(default = "default_template_host")]
    pub template_host: String,

    /// Capability flags passed on create and update
    #[serde(default = "default_capabilities")]
    pub capabilities: Vec<String>,

    /// Seconds between readiness polls
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    /// Readiness polls before timing out
    #[serde(default = "default_poll_max_attempts")]
    pub poll_max_attempts: u32,
}

impl Default for FormationConfig {
    fn default() -> Self {
        Self {
            region: default_region(),
            template_host: default_template_host(),
            capabilities: default_capabilities(),
            poll_interval_secs: default_poll_interval_secs(),
            poll_max_attempts: default_poll_max_attempts(),
        }
    }
}

impl FormationConfig {
    /// Load configuration from environment variables
    ///
    /// - `FORMATION_REGION`
    /// - `FORMATION_TEMPLATE_HOST`
    /// - `FORMATION_CAPABILITIES` (comma separated)
    /// - `FORMATION_POLL_INTERVAL_SECS`
    /// - `FORMATION_POLL_MAX_ATTEMPTS`
    pub fn from_env() -> FormationResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> FormationResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let region = lookup("FORMATION_REGION").unwrap_or(defaults.region);
        let template_host = lookup("FORMATION_TEMPLATE_HOST").unwrap_or(defaults.template_host);
        let capabilities = lookup("FORMATION_CAPABILITIES")
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|c| !c.is_empty())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or(defaults.capabilities);

        let poll_interval_secs = match lookup("FORMATION_POLL_INTERVAL_SECS") {
            Some(raw) => raw.parse().map_err(|_| {
                FormationError::Configuration(format!(
                    "FORMATION_POLL_INTERVAL_SECS is not a number: {}",
                    raw
                ))
            })?,
            None => defaults.poll_interval_secs,
        };

        let poll_max_attempts = match lookup("FORMATION_POLL_MAX_ATTEMPTS") {
            Some(raw) => raw.parse().map_err(|_| {
                FormationError::Configuration(format!(
                    "FORMATION_POLL_MAX_ATTEMPTS is not a number: {}",
                    raw
                ))
            })?,
            None => defaults.poll_max_attempts,
        };

        if poll_max_attempts == 0 {
            return Err(FormationError::Configuration(
                "FORMATION_POLL_MAX_ATTEMPTS must be at least 1".to_string(),
            ));
        }

        Ok(Self {
            region,
            template_host,
            capabilities,
            poll_interval_secs,
            poll_max_attempts,
        })
    }

    /// Readiness polling policy
    pub fn readiness(&self) -> ReadinessPolicy {
        ReadinessPolicy::new(
            Duration::from_secs(self.poll_interval_secs),
            self.poll_max_attempts,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_config_default() {
        let config = FormationConfig::default();
        assert_eq!(config.region, "us-east-1");
        assert_eq!(config.capabilities, vec!["CAPABILITY_IAM"]);
        assert_eq!(config.readiness().interval, Duration::from_secs(10));
        assert_eq!(config.readiness().budget(), Duration::from_secs(1800));
    }

    #[test]
    fn test_config_from_lookup() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("FORMATION_REGION", "eu-west-1"),
            ("FORMATION_CAPABILITIES", "CAPABILITY_IAM, CAPABILITY_NAMED_IAM"),
            ("FORMATION_POLL_MAX_ATTEMPTS", "5"),
        ]);
        let config = FormationConfig::from_lookup(|k| env.get(k).map(|v| v.to_string())).unwrap();

        assert_eq!(config.region, "eu-west-1");
        assert_eq!(config.capabilities.len(), 2);
        assert_eq!(config.poll_max_attempts, 5);
        assert_eq!(config.poll_interval_secs, 10);
    }

    #[test]
    fn test_config_rejects_bad_numbers() {
        let result = FormationConfig::from_lookup(|k| {
            (k == "FORMATION_POLL_INTERVAL_SECS").then(|| "soon".to_string())
        });
        assert!(matches!(result, Err(FormationError::Configuration(_))));

        let zero = FormationConfig::from_lookup(|k| {
            (k == "FORMATION_POLL_MAX_ATTEMPTS").then(|| "0".to_string())
        });
        assert!(zero.is_err());
    }

    #[test]
    fn test_config_serde_defaults() {
        let config: FormationConfig = serde_json::from_str(r#"{"region": "us-west-2"}"#).unwrap();
        assert_eq!(config.region, "us-west-2");
        assert_eq!(config.template_host, "https://s3.amazonaws.com");
    }
}
