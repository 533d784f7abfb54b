//! Assembly configuration.

use std::time::Duration;

use auraseal_core::part::MAX_PAYLOAD_LEN;
use serde::{Deserialize, Serialize};

/// Assembly configuration.
///
/// Controls fetch timeouts and retries, fan-out bounds, the per-part
/// acceptance threshold, and the partitioning bound shared with the
/// packaging side.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AssemblyConfig {
    /// Timeout for one part fetch attempt.
    ///
    /// Default: 10s
    #[serde(with = "duration_secs")]
    pub fetch_timeout: Duration,

    /// Retries after a timed-out fetch before the part is treated as
    /// corrupt.
    ///
    /// Default: 3
    pub max_retries: u32,

    /// Part fetches in flight at once, across all components.
    ///
    /// Default: 8
    pub max_concurrent_fetches: usize,

    /// Minimum health score at which a fetched part is accepted without
    /// triggering recovery.
    ///
    /// Default: 0.954
    pub min_coherence: f32,

    /// Partitioning bound the packaging side used; determines the exact size
    /// of every rebuilt part.
    ///
    /// Default: 5120 (the wire-format bound)
    pub max_part_size: usize,
}

impl Default for AssemblyConfig {
    fn default() -> Self {
        Self {
            fetch_timeout: Duration::from_secs(10),
            max_retries: 3,
            max_concurrent_fetches: 8,
            min_coherence: 0.954,
            max_part_size: MAX_PAYLOAD_LEN,
        }
    }
}

/// Serde helper for `Duration` as seconds.
mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_secs().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_values() {
        let config = AssemblyConfig::default();
        assert_eq!(config.fetch_timeout, Duration::from_secs(10));
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.max_concurrent_fetches, 8);
        assert!((config.min_coherence - 0.954).abs() < f32::EPSILON);
        assert_eq!(config.max_part_size, 5120);
    }

    #[test]
    fn serialization_roundtrip() {
        let config = AssemblyConfig {
            fetch_timeout: Duration::from_secs(42),
            ..Default::default()
        };
        let json = serde_json::to_string(&config).unwrap();
        let restored: AssemblyConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.fetch_timeout, Duration::from_secs(42));
        assert_eq!(restored.max_retries, config.max_retries);
    }
}
