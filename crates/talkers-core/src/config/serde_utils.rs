//! Shared serialization helpers for configuration types

/// Serialize `std::time::Duration` as a u64 of seconds, which reads better
/// in TOML config files than the structured default.
pub mod duration_secs {
    use serde::{self, Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    /// Serialize a Duration as seconds (u64)
    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    /// Deserialize a Duration from seconds (u64)
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
    use serde::{Deserialize, Serialize};
    use std::time::Duration;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct TestConfig {
        #[serde(with = "duration_secs")]
        timeout: Duration,
    }

    #[test]
    fn test_duration_secs_serialize() {
        let config = TestConfig {
            timeout: Duration::from_secs(30),
        };
        let toml = toml::to_string(&config).unwrap();
        assert_eq!(toml.trim(), "timeout = 30");
    }

    #[test]
    fn test_duration_secs_roundtrip() {
        let original = TestConfig {
            timeout: Duration::from_secs(3600),
        };
        let encoded = toml::to_string(&original).unwrap();
        let parsed: TestConfig = toml::from_str(&encoded).unwrap();
        assert_eq!(original, parsed);
    }
}
