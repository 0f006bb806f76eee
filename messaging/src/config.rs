//! Transport configuration

use ipc::EncodingMode;
use serde::{Deserialize, Serialize};

/// Encoding policy and initial buffer sizes of a transport
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Encoding used unless a call overrides it
    pub encoding: EncodingMode,
    /// Initial size of the receive buffer
    pub receive_buffer_len: usize,
    /// Initial size of the reply buffer
    pub reply_buffer_len: usize,
}

impl TransportConfig {
    /// Structured encoding with default buffer sizes
    pub fn structured() -> Self {
        Self::default()
    }

    /// Raw encoding with default buffer sizes
    pub fn raw() -> Self {
        Self {
            encoding: EncodingMode::Raw,
            ..Self::default()
        }
    }

    /// Parses a configuration from JSON; missing fields take defaults
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn with_encoding(mut self, encoding: EncodingMode) -> Self {
        self.encoding = encoding;
        self
    }

    pub fn with_receive_buffer_len(mut self, len: usize) -> Self {
        self.receive_buffer_len = len;
        self
    }

    pub fn with_reply_buffer_len(mut self, len: usize) -> Self {
        self.reply_buffer_len = len;
        self
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            encoding: EncodingMode::Structured,
            receive_buffer_len: 1024,
            reply_buffer_len: 1024,
        }
    }
}
