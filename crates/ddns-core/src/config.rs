//! Configuration types for the DDNS system
//!
//! [`Configuration`] is what the operator supplies (credential, zone, name,
//! type). [`EngineConfig`] holds the engine's timing and retry tunables; its
//! defaults are the values the engine is designed around.

use crate::record::RecordType;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Operator configuration for one managed name
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Configuration {
    /// Provider API token
    /// ⚠️ NEVER log this value
    #[serde(default)]
    pub api_token: String,

    /// Zone identifier at the provider
    #[serde(default)]
    pub zone_id: String,

    /// Fully-qualified record name (e.g. "host.example.com")
    #[serde(default)]
    pub record_name: String,

    #[serde(default)]
    pub record_type: RecordType,
}

// Custom Debug implementation that hides the API token
impl fmt::Debug for Configuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Configuration")
            .field("api_token", &"<REDACTED>")
            .field("zone_id", &self.zone_id)
            .field("record_name", &self.record_name)
            .field("record_type", &self.record_type)
            .finish()
    }
}

impl Configuration {
    pub fn new(
        api_token: impl Into<String>,
        zone_id: impl Into<String>,
        record_name: impl Into<String>,
        record_type: RecordType,
    ) -> Self {
        Self {
            api_token: api_token.into(),
            zone_id: zone_id.into(),
            record_name: record_name.into(),
            record_type,
        }
    }

    /// Validate the configuration
    ///
    /// A configuration that fails here must prevent the engine from starting.
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.api_token.trim().is_empty() {
            return Err(crate::Error::config("API token cannot be empty"));
        }
        if self.zone_id.trim().is_empty() {
            return Err(crate::Error::config("Zone ID cannot be empty"));
        }
        if self.record_name.trim().is_empty() {
            return Err(crate::Error::config("Record name cannot be empty"));
        }
        if self.record_name.len() > 253 {
            return Err(crate::Error::config(format!(
                "Record name too long: {} chars (max 253)",
                self.record_name.len()
            )));
        }
        Ok(())
    }

    /// Whether two configurations point at the same set of records
    pub fn same_target(&self, other: &Configuration) -> bool {
        self.zone_id == other.zone_id
            && self.record_name.eq_ignore_ascii_case(&other.record_name)
            && self.record_type == other.record_type
    }
}

/// Engine configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Interval between reconciliation cycles
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,

    /// Delay before the confirming observation
    #[serde(default = "default_confirm_delay_ms")]
    pub confirm_delay_ms: u64,

    /// Attempts per address resolution
    #[serde(default = "default_resolve_attempts")]
    pub resolve_attempts: usize,

    /// Pause between resolution attempts
    #[serde(default = "default_resolve_retry_delay_ms")]
    pub resolve_retry_delay_ms: u64,

    /// Attempts per record mutation
    #[serde(default = "default_mutation_attempts")]
    pub mutation_attempts: usize,

    /// Pause between mutation attempts
    #[serde(default = "default_mutation_retry_delay_ms")]
    pub mutation_retry_delay_ms: u64,

    /// TTL for created records when no sibling record supplies one
    #[serde(default = "default_ttl")]
    pub default_ttl: u32,

    /// Capacity of the engine event channel
    ///
    /// When full, new events are dropped (with a warning log).
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,
}

impl EngineConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn confirm_delay(&self) -> Duration {
        Duration::from_millis(self.confirm_delay_ms)
    }

    pub fn resolve_retry_delay(&self) -> Duration {
        Duration::from_millis(self.resolve_retry_delay_ms)
    }

    pub fn mutation_retry_delay(&self) -> Duration {
        Duration::from_millis(self.mutation_retry_delay_ms)
    }

    /// Validate the engine configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.tick_interval_ms == 0 {
            return Err(crate::Error::config("Tick interval must be > 0"));
        }
        if self.resolve_attempts == 0 {
            return Err(crate::Error::config("Resolve attempts must be >= 1"));
        }
        if self.mutation_attempts == 0 {
            return Err(crate::Error::config("Mutation attempts must be >= 1"));
        }
        if self.event_channel_capacity == 0 {
            return Err(crate::Error::config("Event channel capacity must be > 0"));
        }
        Ok(())
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval_ms(),
            confirm_delay_ms: default_confirm_delay_ms(),
            resolve_attempts: default_resolve_attempts(),
            resolve_retry_delay_ms: default_resolve_retry_delay_ms(),
            mutation_attempts: default_mutation_attempts(),
            mutation_retry_delay_ms: default_mutation_retry_delay_ms(),
            default_ttl: default_ttl(),
            event_channel_capacity: default_event_channel_capacity(),
        }
    }
}

fn default_tick_interval_ms() -> u64 {
    5_000
}

fn default_confirm_delay_ms() -> u64 {
    3_000
}

fn default_resolve_attempts() -> usize {
    3
}

fn default_resolve_retry_delay_ms() -> u64 {
    1_000
}

fn default_mutation_attempts() -> usize {
    3
}

fn default_mutation_retry_delay_ms() -> u64 {
    2_000
}

fn default_ttl() -> u32 {
    3600
}

fn default_event_channel_capacity() -> usize {
    1000
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_are_fatal() {
        let mut config = Configuration::new("token", "zone", "host.example.com", RecordType::A);
        assert!(config.validate().is_ok());

        config.zone_id.clear();
        assert!(matches!(config.validate(), Err(crate::Error::Config(_))));

        let config = Configuration::default();
        assert!(config.validate().is_err());
    }

    #[test]
    fn debug_hides_token() {
        let config = Configuration::new("secret_token_12345", "zone", "h.example.com", RecordType::A);
        let text = format!("{:?}", config);
        assert!(!text.contains("secret_token"));
        assert!(text.contains("<REDACTED>"));
    }

    #[test]
    fn same_target_ignores_credential() {
        let a = Configuration::new("one", "zone", "Host.example.com", RecordType::A);
        let b = Configuration::new("two", "zone", "host.example.com", RecordType::A);
        let c = Configuration::new("one", "zone", "host.example.com", RecordType::Aaaa);
        assert!(a.same_target(&b));
        assert!(!a.same_target(&c));
    }

    #[test]
    fn engine_defaults() {
        let engine = EngineConfig::default();
        assert_eq!(engine.tick_interval(), Duration::from_secs(5));
        assert_eq!(engine.confirm_delay(), Duration::from_secs(3));
        assert_eq!(engine.resolve_attempts, 3);
        assert_eq!(engine.resolve_retry_delay(), Duration::from_secs(1));
        assert_eq!(engine.mutation_attempts, 3);
        assert_eq!(engine.mutation_retry_delay(), Duration::from_secs(2));
        assert_eq!(engine.default_ttl, 3600);
        assert!(engine.validate().is_ok());
    }

    #[test]
    fn configuration_defaults_record_type_when_absent() {
        let config: Configuration = serde_json::from_str(
            r#"{"api_token":"t","zone_id":"z","record_name":"h.example.com"}"#,
        )
        .unwrap();
        assert_eq!(config.record_type, RecordType::A);
    }
}
