//! Application packet types carried inside addressed frames.
//!
//! FARMER → DOG: pair request, encryption key, control command.
//! DOG → FARMER: status report, acknowledgement, encryption reset request.

use serde::Serialize;

use crate::error::{FrameError, Result};

/// Payload length of a pair request (the requested DOG tag).
pub const PAIR_REQUEST_LEN: usize = 1;

/// Payload length of an encryption key.
pub const ENCRYPTION_KEY_LEN: usize = 32;

/// Payload length of a control command (header byte + three data bytes).
pub const COMMAND_LEN: usize = 4;

/// Payload length of a status report (raw IMU sample bytes).
pub const STATUS_REPORT_LEN: usize = 12;

/// Packet type byte, the first byte after the frame addressing header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum PacketType {
    /// DOG → FARMER telemetry.
    StatusReport,
    /// FARMER → DOG request to pair with a tag.
    PairRequest,
    /// DOG → FARMER pairing acknowledgement.
    Ack,
    /// FARMER → DOG 32-byte cipher key.
    EncryptionKey,
    /// FARMER → DOG encrypted control command.
    Command,
    /// DOG → FARMER request to restart the key stream at offset 0.
    ResetEncryption,
}

impl PacketType {
    /// Parse a packet type byte.
    pub fn from_byte(byte: u8) -> Result<Self> {
        match byte {
            0x00 => Ok(PacketType::StatusReport),
            0x01 => Ok(PacketType::PairRequest),
            0x02 => Ok(PacketType::Ack),
            0x03 => Ok(PacketType::EncryptionKey),
            0x04 => Ok(PacketType::Command),
            0x05 => Ok(PacketType::ResetEncryption),
            other => Err(FrameError::UnknownPacketType(other)),
        }
    }

    /// Wire value.
    pub fn as_byte(self) -> u8 {
        match self {
            PacketType::StatusReport => 0x00,
            PacketType::PairRequest => 0x01,
            PacketType::Ack => 0x02,
            PacketType::EncryptionKey => 0x03,
            PacketType::Command => 0x04,
            PacketType::ResetEncryption => 0x05,
        }
    }

    /// Human-readable name.
    pub fn name(self) -> &'static str {
        match self {
            PacketType::StatusReport => "STATUS_REPORT",
            PacketType::PairRequest => "PAIR_REQUEST",
            PacketType::Ack => "ACK",
            PacketType::EncryptionKey => "ENCRYPTION_KEY",
            PacketType::Command => "COMMAND",
            PacketType::ResetEncryption => "RESET_ENCRYPTION",
        }
    }

    /// Expected payload length, where the protocol fixes one.
    pub fn payload_len(self) -> Option<usize> {
        match self {
            PacketType::PairRequest => Some(PAIR_REQUEST_LEN),
            PacketType::EncryptionKey => Some(ENCRYPTION_KEY_LEN),
            PacketType::Command => Some(COMMAND_LEN),
            PacketType::StatusReport => Some(STATUS_REPORT_LEN),
            PacketType::Ack | PacketType::ResetEncryption => Some(0),
        }
    }

    /// Returns true for packets a FARMER sends to a DOG.
    pub fn is_farmer_to_dog(self) -> bool {
        matches!(
            self,
            PacketType::PairRequest | PacketType::EncryptionKey | PacketType::Command
        )
    }
}

impl std::fmt::Display for PacketType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
