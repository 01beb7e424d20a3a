//! Configuration for the update engine.

use chrono::Duration;
use serde::Deserialize;

/// Configuration parameters for applying realtime updates.
///
/// Loaded by the embedding application; every field has a default so a
/// partial document deserializes.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct UpdaterConfig {
    /// Longest time staged changes may wait before being published
    /// (milliseconds). Fast-path batches publish immediately regardless.
    pub max_publish_delay_ms: u64,

    /// Whether search views include cancelled trips for display.
    pub include_planned_cancellations: bool,

    /// Largest difference between aimed and scheduled departure accepted
    /// by fuzzy matching (minutes).
    pub fuzzy_tolerance_mins: i64,

    /// Drop realtime rows for service dates before yesterday.
    pub purge_expired_data: bool,
}

impl UpdaterConfig {
    /// Create a new configuration with the given parameters.
    pub fn new(
        max_publish_delay_ms: u64,
        include_planned_cancellations: bool,
        fuzzy_tolerance_mins: i64,
        purge_expired_data: bool,
    ) -> Self {
        Self {
            max_publish_delay_ms,
            include_planned_cancellations,
            fuzzy_tolerance_mins,
            purge_expired_data,
        }
    }

    /// Returns the maximum publish delay.
    pub fn max_publish_delay(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.max_publish_delay_ms)
    }

    /// Returns the fuzzy matching tolerance as a Duration.
    ///
    /// Values too large to represent saturate.
    pub fn fuzzy_tolerance(&self) -> Duration {
        Duration::try_minutes(self.fuzzy_tolerance_mins).unwrap_or(Duration::MAX)
    }
}

impl Default for UpdaterConfig {
    fn default() -> Self {
        Self {
            max_publish_delay_ms: 1000,
            include_planned_cancellations: false,
            fuzzy_tolerance_mins: 15,
            purge_expired_data: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = UpdaterConfig::default();

        assert_eq!(config.max_publish_delay_ms, 1000);
        assert!(!config.include_planned_cancellations);
        assert_eq!(config.fuzzy_tolerance_mins, 15);
        assert!(config.purge_expired_data);
    }

    #[test]
    fn duration_methods() {
        let config = UpdaterConfig::default();

        assert_eq!(config.max_publish_delay(), std::time::Duration::from_secs(1));
        assert_eq!(config.fuzzy_tolerance(), Duration::minutes(15));
    }

    #[test]
    fn custom_config() {
        let config = UpdaterConfig::new(0, true, 5, false);

        assert_eq!(config.max_publish_delay(), std::time::Duration::ZERO);
        assert!(config.include_planned_cancellations);
        assert_eq!(config.fuzzy_tolerance(), Duration::minutes(5));
        assert!(!config.purge_expired_data);
    }

    #[test]
    fn huge_tolerance_saturates() {
        let config = UpdaterConfig {
            fuzzy_tolerance_mins: i64::MAX,
            ..UpdaterConfig::default()
        };
        assert_eq!(config.fuzzy_tolerance(), Duration::MAX);
    }

    #[test]
    fn partial_document_uses_defaults() {
        let config: UpdaterConfig =
            serde_json::from_str(r#"{ "fuzzy_tolerance_mins": 30 }"#).unwrap();
        assert_eq!(config.fuzzy_tolerance_mins, 30);
        assert_eq!(config.max_publish_delay_ms, 1000);
        assert!(config.purge_expired_data);
    }
}
