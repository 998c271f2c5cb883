use std::path::Path;

use doglink_frame::codec::PACKET_HEADER_SIZE;
use doglink_frame::{FrameConfig, DEFAULT_BYTE_TIMEOUT_MS, DEFAULT_MAX_FRAME_LEN};
use doglink_transport::DEFAULT_BAUD_RATE;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SessionError};

/// Default time without an accepted frame before the session unpairs.
pub const DEFAULT_LOST_LINK_MS: u64 = 3000;

/// Default number of transmissions of one frame before giving up on the link.
pub const DEFAULT_MAX_SEND_ATTEMPTS: u32 = 3;

/// Configuration for a DOG session and the link under it.
///
/// Loaded from JSON; missing fields take their defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SessionConfig {
    /// Tag this DOG answers pair requests for.
    pub own_tag: u8,
    /// Lost-link timeout in milliseconds.
    pub lost_link_ms: u64,
    /// Per-byte receive watchdog in milliseconds.
    pub receive_watchdog_ms: u64,
    /// Per-byte transmit watchdog in milliseconds.
    pub transmit_watchdog_ms: u64,
    /// Transmissions of one frame before the link counts as lost.
    pub max_send_attempts: u32,
    /// Maximum accepted frame-data length in bytes.
    pub max_frame_len: usize,
    /// Serial line speed when the link is a device.
    pub baud_rate: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            own_tag: 0,
            lost_link_ms: DEFAULT_LOST_LINK_MS,
            receive_watchdog_ms: DEFAULT_BYTE_TIMEOUT_MS,
            transmit_watchdog_ms: DEFAULT_BYTE_TIMEOUT_MS,
            max_send_attempts: DEFAULT_MAX_SEND_ATTEMPTS,
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
            baud_rate: DEFAULT_BAUD_RATE,
        }
    }
}

impl SessionConfig {
    /// Load and validate a JSON config file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.lost_link_ms == 0 {
            return Err(SessionError::Config("lost_link_ms must be > 0".into()));
        }
        if self.receive_watchdog_ms == 0 || self.transmit_watchdog_ms == 0 {
            return Err(SessionError::Config("watchdog timeouts must be > 0".into()));
        }
        if self.max_send_attempts == 0 {
            return Err(SessionError::Config("max_send_attempts must be >= 1".into()));
        }
        if self.baud_rate == 0 {
            return Err(SessionError::Config("baud_rate must be > 0".into()));
        }
        if self.max_frame_len < PACKET_HEADER_SIZE {
            return Err(SessionError::Config(format!(
                "max_frame_len must be >= {PACKET_HEADER_SIZE}"
            )));
        }
        Ok(())
    }

    /// Framing settings for the receive side.
    pub fn receive_frame_config(&self) -> FrameConfig {
        FrameConfig {
            max_frame_len: self.max_frame_len,
            byte_timeout_ms: self.receive_watchdog_ms,
            ..FrameConfig::default()
        }
    }

    /// Framing settings for the transmit side.
    pub fn transmit_frame_config(&self) -> FrameConfig {
        FrameConfig {
            max_frame_len: self.max_frame_len,
            byte_timeout_ms: self.transmit_watchdog_ms,
            ..FrameConfig::default()
        }
    }
}
