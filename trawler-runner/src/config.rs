//! Runner configuration
//!
//! Defines all configurable parameters for the runner including coordinator
//! connection settings, realtime transport credentials and the presence
//! heartbeat interval.

use std::time::Duration;

use trawler_core::domain::runner::RunnerIdentity;

use crate::realtime::RealtimeSettings;

/// Runner configuration
///
/// All intervals are configurable to allow tuning for different deployment
/// scenarios (dev vs prod, fast vs slow networks).
#[derive(Debug, Clone)]
pub struct Config {
    /// Human-readable name for this runner instance
    pub runner_name: String,

    /// Stable identifier used for presence tracking
    pub runner_id: String,

    /// Coordinator base URL (e.g., "http://localhost:8080")
    pub coordinator_url: String,

    /// API key sent with every coordinator request
    pub api_key: String,

    /// Realtime transport endpoint (http(s) or ws(s) URL)
    pub realtime_url: String,

    /// Access key for the realtime transport
    pub realtime_key: String,

    /// How often to re-announce this runner as online
    pub presence_interval: Duration,

    /// How long a single queue wait lasts before the worker loop re-checks
    /// for shutdown
    pub job_wait_timeout: Duration,
}

impl Config {
    /// Creates a new configuration with defaults for the intervals
    pub fn new(
        runner_name: String,
        coordinator_url: String,
        api_key: String,
        realtime_url: String,
        realtime_key: String,
    ) -> Self {
        Self {
            runner_id: uuid::Uuid::new_v4().to_string(),
            runner_name,
            coordinator_url,
            api_key,
            realtime_url,
            realtime_key,
            presence_interval: Duration::from_secs(30),
            job_wait_timeout: Duration::from_secs(5),
        }
    }

    /// Creates configuration from environment variables
    ///
    /// Expected environment variables:
    /// - RUNNER_NAME (required)
    /// - RUNNER_ID (optional, default: random v4 uuid)
    /// - COORDINATOR_URL (required)
    /// - COORDINATOR_API_KEY (required)
    /// - REALTIME_URL (required)
    /// - REALTIME_KEY (required)
    /// - PRESENCE_INTERVAL (optional, seconds, default: 30)
    /// - JOB_WAIT_TIMEOUT (optional, seconds, default: 5)
    pub fn from_env() -> anyhow::Result<Self> {
        let runner_name = std::env::var("RUNNER_NAME")
            .map_err(|_| anyhow::anyhow!("RUNNER_NAME environment variable not set"))?;

        let coordinator_url = std::env::var("COORDINATOR_URL")
            .map_err(|_| anyhow::anyhow!("COORDINATOR_URL environment variable not set"))?;

        let api_key = std::env::var("COORDINATOR_API_KEY")
            .map_err(|_| anyhow::anyhow!("COORDINATOR_API_KEY environment variable not set"))?;

        let realtime_url = std::env::var("REALTIME_URL")
            .map_err(|_| anyhow::anyhow!("REALTIME_URL environment variable not set"))?;

        let realtime_key = std::env::var("REALTIME_KEY")
            .map_err(|_| anyhow::anyhow!("REALTIME_KEY environment variable not set"))?;

        let runner_id = std::env::var("RUNNER_ID")
            .ok()
            .filter(|id| !id.is_empty())
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

        let presence_interval = std::env::var("PRESENCE_INTERVAL")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(30));

        let job_wait_timeout = std::env::var("JOB_WAIT_TIMEOUT")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(5));

        Ok(Self {
            runner_name,
            runner_id,
            coordinator_url,
            api_key,
            realtime_url,
            realtime_key,
            presence_interval,
            job_wait_timeout,
        })
    }

    /// Validates the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.runner_name.is_empty() {
            anyhow::bail!("runner_name cannot be empty");
        }

        if self.coordinator_url.is_empty() {
            anyhow::bail!("coordinator_url cannot be empty");
        }

        if !self.coordinator_url.starts_with("http://")
            && !self.coordinator_url.starts_with("https://")
        {
            anyhow::bail!("coordinator_url must start with http:// or https://");
        }

        if self.api_key.is_empty() {
            anyhow::bail!("api_key cannot be empty");
        }

        let realtime_ok = ["http://", "https://", "ws://", "wss://"]
            .iter()
            .any(|scheme| self.realtime_url.starts_with(scheme));
        if !realtime_ok {
            anyhow::bail!("realtime_url must start with http(s):// or ws(s)://");
        }

        if self.realtime_key.is_empty() {
            anyhow::bail!("realtime_key cannot be empty");
        }

        if self.presence_interval.as_secs() == 0 {
            anyhow::bail!("presence_interval must be greater than 0");
        }

        if self.job_wait_timeout.as_secs() == 0 {
            anyhow::bail!("job_wait_timeout must be greater than 0");
        }

        Ok(())
    }

    /// The identity stamped on presence and broadcast messages
    pub fn identity(&self) -> RunnerIdentity {
        RunnerIdentity::new(self.runner_name.clone(), self.runner_id.clone())
    }

    /// Settings for the realtime subsystem derived from this configuration
    pub fn realtime_settings(&self) -> RealtimeSettings {
        RealtimeSettings {
            endpoint: self.realtime_url.clone(),
            access_key: self.realtime_key.clone(),
            identity: self.identity(),
            presence_interval: self.presence_interval,
            reconnect_schedule: crate::realtime::default_reconnect_schedule(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new(
            "trawler-runner".to_string(),
            "http://localhost:8080".to_string(),
            "dev-key".to_string(),
            "http://localhost:4000".to_string(),
            "dev-key".to_string(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.presence_interval, Duration::from_secs(30));
        assert_eq!(config.job_wait_timeout, Duration::from_secs(5));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();

        // Valid config should pass
        assert!(config.validate().is_ok());

        // Empty runner_name should fail
        config.runner_name = String::new();
        assert!(config.validate().is_err());

        config.runner_name = "test".to_string();

        // Invalid coordinator URL should fail
        config.coordinator_url = "not-a-url".to_string();
        assert!(config.validate().is_err());

        config.coordinator_url = "http://localhost:8080".to_string();

        // Realtime URL accepts ws(s) schemes too
        config.realtime_url = "wss://realtime.example.com".to_string();
        assert!(config.validate().is_ok());

        config.realtime_url = "ftp://nope".to_string();
        assert!(config.validate().is_err());

        config.realtime_url = "http://localhost:4000".to_string();

        // Zero presence interval should fail
        config.presence_interval = Duration::from_secs(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_identity_from_config() {
        let config = Config::default();
        let identity = config.identity();
        assert_eq!(identity.runner_name, "trawler-runner");
        assert_eq!(identity.runner_id, config.runner_id);
    }

    #[test]
    fn test_realtime_settings_from_config() {
        let config = Config::default();
        let settings = config.realtime_settings();
        assert_eq!(settings.endpoint, config.realtime_url);
        assert_eq!(settings.presence_interval, config.presence_interval);
        assert_eq!(settings.reconnect_schedule.len(), 6);
        assert_eq!(settings.reconnect_schedule[0], Duration::from_secs(1));
        assert_eq!(settings.reconnect_schedule[5], Duration::from_secs(32));
    }
}
