//! Resource manager configuration

use serde::{Deserialize, Serialize};

/// Limits of a resource manager (`resmgr_attr_t`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResmgrAttr {
    /// Initial receive buffer size
    pub msg_max_size: usize,
}

impl ResmgrAttr {
    /// Parses limits from JSON; missing fields take defaults
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn with_msg_max_size(mut self, size: usize) -> Self {
        self.msg_max_size = size;
        self
    }
}

impl Default for ResmgrAttr {
    fn default() -> Self {
        Self { msg_max_size: 4096 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        assert_eq!(ResmgrAttr::default().msg_max_size, 4096);
        assert_eq!(ResmgrAttr::from_json("{}").unwrap(), ResmgrAttr::default());
    }

    #[test]
    fn test_from_json() {
        let attr = ResmgrAttr::from_json(r#"{"msg_max_size": 512}"#).unwrap();
        assert_eq!(attr.msg_max_size, 512);
    }
}
