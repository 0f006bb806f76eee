//! Simulated kernel configuration

use serde::{Deserialize, Serialize};

/// Tunables of a simulated kernel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Process id reported for every caller
    pub pid: i32,
    /// Maximum entries waiting on one channel
    pub channel_capacity: usize,
}

impl SimConfig {
    /// Parses a configuration from JSON; missing fields take defaults
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn with_pid(mut self, pid: i32) -> Self {
        self.pid = pid;
        self
    }

    pub fn with_channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity;
        self
    }
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            pid: 1,
            channel_capacity: 64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SimConfig::default();
        assert_eq!(config.pid, 1);
        assert_eq!(config.channel_capacity, 64);
    }

    #[test]
    fn test_partial_json() {
        let config = SimConfig::from_json(r#"{"pid": 4242}"#).unwrap();
        assert_eq!(config.pid, 4242);
        assert_eq!(config.channel_capacity, 64);
    }
}
