use doglink_transport::TransportError;

/// Errors that can occur during frame encoding/decoding and transmission.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The first byte is not the `0x7E` start marker.
    #[error("invalid start marker 0x{0:02X} (expected 0x7E)")]
    InvalidStartMarker(u8),

    /// The declared length does not match the bytes present.
    #[error("length mismatch (declared {declared} bytes, found {actual})")]
    LengthMismatch { declared: usize, actual: usize },

    /// The checksum byte does not match the frame data.
    #[error("checksum mismatch (expected 0x{expected:02X}, got 0x{actual:02X})")]
    ChecksumMismatch { expected: u8, actual: u8 },

    /// The API identifier is not one this link understands.
    #[error("unknown API identifier 0x{0:02X}")]
    UnknownApi(u8),

    /// The packet type byte is not one this link understands.
    #[error("unknown packet type 0x{0:02X}")]
    UnknownPacketType(u8),

    /// The frame data is too short for its API kind.
    #[error("truncated {kind} frame ({len} bytes, need at least {min})")]
    Truncated {
        kind: &'static str,
        len: usize,
        min: usize,
    },

    /// The requested API kind does not carry a packet type.
    #[error("{0} frames carry no packet type")]
    NotAPacket(&'static str),

    /// The frame data exceeds the configured maximum.
    #[error("frame too large ({size} bytes, max {max})")]
    FrameTooLarge { size: usize, max: usize },

    /// A transmission is already in progress.
    #[error("transmitter busy")]
    TransmitterBusy,

    /// The byte transport failed.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// An I/O error occurred while reading or writing frames.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The stream closed before a complete frame was received.
    #[error("connection closed (incomplete frame)")]
    ConnectionClosed,
}

pub type Result<T> = std::result::Result<T, FrameError>;
