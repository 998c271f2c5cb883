use std::fmt;
use std::time::Duration;

use bytes::{BufMut, Bytes, BytesMut};
use serde::Serialize;

use crate::error::{FrameError, Result};
use crate::packet::PacketType;

/// First byte of every frame.
pub const START_MARKER: u8 = 0x7E;

/// Start marker + 2-byte length.
pub const PREAMBLE_SIZE: usize = 3;

/// Trailing checksum byte.
pub const CHECKSUM_SIZE: usize = 1;

/// Frame-data bytes ahead of the payload in addressed frames:
/// API identifier, two addressing bytes, one id/RSSI byte, options, packet type.
pub const PACKET_HEADER_SIZE: usize = 6;

/// Frame id stamped on every outbound frame of this link.
pub const FRAME_ID: u8 = 0x01;

/// Options byte of outbound frames.
pub const OPTIONS: u8 = 0x00;

/// Transmit-result status meaning the peer radio acknowledged delivery.
pub const DELIVERED: u8 = 0x00;

/// Default maximum frame-data length accepted by the receiver.
pub const DEFAULT_MAX_FRAME_LEN: usize = 45;

/// Default per-byte watchdog. One character at 9600 baud takes ~1.04 ms.
pub const DEFAULT_BYTE_TIMEOUT_MS: u64 = 10;

/// 16-bit radio link address, most significant byte first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub struct Address {
    pub msb: u8,
    pub lsb: u8,
}

impl Address {
    pub const fn new(msb: u8, lsb: u8) -> Self {
        Self { msb, lsb }
    }

    pub const fn from_u16(value: u16) -> Self {
        let [msb, lsb] = value.to_be_bytes();
        Self { msb, lsb }
    }

    pub const fn as_u16(self) -> u16 {
        u16::from_be_bytes([self.msb, self.lsb])
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:02X}{:02X}", self.msb, self.lsb)
    }
}

/// Role of a frame, carried in its API identifier byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ApiKind {
    /// `0x81`: a packet received from the peer (carries FARMER commands).
    Command,
    /// `0x01`: a transmit request (carries DOG responses).
    Response,
    /// `0x89`: delivery outcome of the last transmit request.
    TxResult,
    /// `0x8A`: radio modem reset/status notice.
    Reset,
}

impl ApiKind {
    pub fn from_byte(byte: u8) -> Result<Self> {
        match byte {
            0x81 => Ok(ApiKind::Command),
            0x01 => Ok(ApiKind::Response),
            0x89 => Ok(ApiKind::TxResult),
            0x8A => Ok(ApiKind::Reset),
            other => Err(FrameError::UnknownApi(other)),
        }
    }

    pub fn as_byte(self) -> u8 {
        match self {
            ApiKind::Command => 0x81,
            ApiKind::Response => 0x01,
            ApiKind::TxResult => 0x89,
            ApiKind::Reset => 0x8A,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ApiKind::Command => "command",
            ApiKind::Response => "response",
            ApiKind::TxResult => "tx-result",
            ApiKind::Reset => "reset",
        }
    }

    /// Smallest valid frame-data length for this kind.
    pub fn min_data_len(self) -> usize {
        match self {
            ApiKind::Command | ApiKind::Response => PACKET_HEADER_SIZE,
            ApiKind::TxResult => 3,
            ApiKind::Reset => 2,
        }
    }
}

/// A decoded frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// Packet received from the peer radio.
    Command {
        source: Address,
        rssi: u8,
        packet_type: PacketType,
        payload: Bytes,
    },
    /// Packet this device asks its radio to transmit.
    Response {
        frame_id: u8,
        dest: Address,
        packet_type: PacketType,
        payload: Bytes,
    },
    /// Delivery outcome for the transmit request with `frame_id`.
    TxResult { frame_id: u8, status: u8 },
    /// Radio modem status notice.
    Reset { status: u8 },
}

impl Frame {
    /// Outbound frame addressed to `dest`.
    pub fn response(dest: Address, packet_type: PacketType, payload: impl Into<Bytes>) -> Self {
        Frame::Response {
            frame_id: FRAME_ID,
            dest,
            packet_type,
            payload: payload.into(),
        }
    }

    /// Inbound frame as the radio would deliver it from `source`.
    pub fn command(source: Address, packet_type: PacketType, payload: impl Into<Bytes>) -> Self {
        Frame::Command {
            source,
            rssi: 0,
            packet_type,
            payload: payload.into(),
        }
    }

    /// Addressed frame of the given kind. Only `Command` and `Response` carry packets.
    pub fn packet(
        kind: ApiKind,
        address: Address,
        packet_type: PacketType,
        payload: impl Into<Bytes>,
    ) -> Result<Self> {
        match kind {
            ApiKind::Command => Ok(Frame::command(address, packet_type, payload)),
            ApiKind::Response => Ok(Frame::response(address, packet_type, payload)),
            ApiKind::TxResult | ApiKind::Reset => Err(FrameError::NotAPacket(kind.name())),
        }
    }

    pub fn kind(&self) -> ApiKind {
        match self {
            Frame::Command { .. } => ApiKind::Command,
            Frame::Response { .. } => ApiKind::Response,
            Frame::TxResult { .. } => ApiKind::TxResult,
            Frame::Reset { .. } => ApiKind::Reset,
        }
    }

    /// Peer address: source of inbound packets, destination of outbound ones.
    pub fn address(&self) -> Option<Address> {
        match self {
            Frame::Command { source, .. } => Some(*source),
            Frame::Response { dest, .. } => Some(*dest),
            Frame::TxResult { .. } | Frame::Reset { .. } => None,
        }
    }

    pub fn packet_type(&self) -> Option<PacketType> {
        match self {
            Frame::Command { packet_type, .. } | Frame::Response { packet_type, .. } => {
                Some(*packet_type)
            }
            Frame::TxResult { .. } | Frame::Reset { .. } => None,
        }
    }

    /// Application payload; empty for status frames.
    pub fn payload(&self) -> &[u8] {
        match self {
            Frame::Command { payload, .. } | Frame::Response { payload, .. } => payload,
            Frame::TxResult { .. } | Frame::Reset { .. } => &[],
        }
    }

    /// Length of the frame data (the value of the length field).
    pub fn data_len(&self) -> usize {
        match self {
            Frame::Command { payload, .. } | Frame::Response { payload, .. } => {
                PACKET_HEADER_SIZE + payload.len()
            }
            Frame::TxResult { .. } => 3,
            Frame::Reset { .. } => 2,
        }
    }

    /// Total bytes on the wire.
    pub fn wire_size(&self) -> usize {
        PREAMBLE_SIZE + self.data_len() + CHECKSUM_SIZE
    }

    /// Encode into a fresh buffer.
    pub fn to_wire(&self) -> Result<Bytes> {
        let mut buf = BytesMut::with_capacity(self.wire_size());
        encode_frame(self, &mut buf)?;
        Ok(buf.freeze())
    }
}

/// Running frame checksum: `0xFF` minus the 8-bit sum of the frame data.
///
/// The single definition shared by the encoder, the decoder and the
/// byte-at-a-time receiver.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Checksum {
    sum: u8,
}

impl Checksum {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, byte: u8) {
        self.sum = self.sum.wrapping_add(byte);
    }

    pub fn extend(&mut self, data: &[u8]) {
        for &byte in data {
            self.update(byte);
        }
    }

    /// 8-bit sum of the bytes seen so far.
    pub fn sum(&self) -> u8 {
        self.sum
    }

    /// Checksum byte for the bytes seen so far.
    pub fn value(&self) -> u8 {
        0xFF - self.sum
    }

    pub fn matches(&self, byte: u8) -> bool {
        byte == self.value()
    }
}

/// Checksum byte of `data`.
pub fn checksum(data: &[u8]) -> u8 {
    let mut sum = Checksum::new();
    sum.extend(data);
    sum.value()
}

/// Encode a frame into the wire format.
///
/// Wire format:
/// ```text
/// ┌──────┬──────────┬────────────────────────────────────────────┬──────────┐
/// │ 0x7E │ Length   │ Frame data                                 │ Checksum │
/// │      │ (2B BE)  │ api, addr/id (4B), packet type, payload    │ 0xFF-sum │
/// └──────┴──────────┴────────────────────────────────────────────┴──────────┘
/// ```
pub fn encode_frame(frame: &Frame, dst: &mut BytesMut) -> Result<()> {
    let data_len = frame.data_len();
    if data_len > u16::MAX as usize {
        return Err(FrameError::FrameTooLarge {
            size: data_len,
            max: u16::MAX as usize,
        });
    }

    dst.reserve(frame.wire_size());
    dst.put_u8(START_MARKER);
    dst.put_u16(data_len as u16);

    let data_start = dst.len();
    dst.put_u8(frame.kind().as_byte());
    match frame {
        Frame::Command {
            source,
            rssi,
            packet_type,
            payload,
        } => {
            dst.put_u8(source.msb);
            dst.put_u8(source.lsb);
            dst.put_u8(*rssi);
            dst.put_u8(OPTIONS);
            dst.put_u8(packet_type.as_byte());
            dst.put_slice(payload);
        }
        Frame::Response {
            frame_id,
            dest,
            packet_type,
            payload,
        } => {
            dst.put_u8(*frame_id);
            dst.put_u8(dest.msb);
            dst.put_u8(dest.lsb);
            dst.put_u8(OPTIONS);
            dst.put_u8(packet_type.as_byte());
            dst.put_slice(payload);
        }
        Frame::TxResult { frame_id, status } => {
            dst.put_u8(*frame_id);
            dst.put_u8(*status);
        }
        Frame::Reset { status } => dst.put_u8(*status),
    }

    let sum = checksum(&dst[data_start..]);
    dst.put_u8(sum);
    Ok(())
}

/// Encode an addressed packet straight to wire bytes.
pub fn encode(
    kind: ApiKind,
    address: Address,
    packet_type: PacketType,
    payload: &[u8],
) -> Result<Bytes> {
    Frame::packet(kind, address, packet_type, Bytes::copy_from_slice(payload))?.to_wire()
}

/// Decode one complete wire frame (start marker through checksum).
///
/// Nothing is returned unless the length and checksum both hold.
pub fn decode_frame(wire: &[u8]) -> Result<Frame> {
    let min = PREAMBLE_SIZE + CHECKSUM_SIZE;
    if wire.len() < min {
        return Err(FrameError::Truncated {
            kind: "wire",
            len: wire.len(),
            min,
        });
    }
    if wire[0] != START_MARKER {
        return Err(FrameError::InvalidStartMarker(wire[0]));
    }

    let declared = u16::from_be_bytes([wire[1], wire[2]]) as usize;
    let actual = wire.len() - min;
    if declared != actual {
        return Err(FrameError::LengthMismatch { declared, actual });
    }

    let data = &wire[PREAMBLE_SIZE..PREAMBLE_SIZE + declared];
    let expected = checksum(data);
    let received = wire[wire.len() - 1];
    if expected != received {
        return Err(FrameError::ChecksumMismatch {
            expected,
            actual: received,
        });
    }

    decode_frame_data(data)
}

/// Parse checksum-validated frame data (API identifier through payload).
pub fn decode_frame_data(data: &[u8]) -> Result<Frame> {
    let Some(&api) = data.first() else {
        return Err(FrameError::Truncated {
            kind: "frame",
            len: 0,
            min: 1,
        });
    };
    let kind = ApiKind::from_byte(api)?;
    let min = kind.min_data_len();
    if data.len() < min {
        return Err(FrameError::Truncated {
            kind: kind.name(),
            len: data.len(),
            min,
        });
    }

    let frame = match kind {
        ApiKind::Command => Frame::Command {
            source: Address::new(data[1], data[2]),
            rssi: data[3],
            packet_type: PacketType::from_byte(data[5])?,
            payload: Bytes::copy_from_slice(&data[PACKET_HEADER_SIZE..]),
        },
        ApiKind::Response => Frame::Response {
            frame_id: data[1],
            dest: Address::new(data[2], data[3]),
            packet_type: PacketType::from_byte(data[5])?,
            payload: Bytes::copy_from_slice(&data[PACKET_HEADER_SIZE..]),
        },
        ApiKind::TxResult => Frame::TxResult {
            frame_id: data[1],
            status: data[2],
        },
        ApiKind::Reset => Frame::Reset { status: data[1] },
    };
    Ok(frame)
}

/// Configuration for the framing layer.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Maximum frame-data length. Default: 45 bytes.
    pub max_frame_len: usize,
    /// Per-byte watchdog while a frame is in flight. Default: 10 ms.
    pub byte_timeout_ms: u64,
    /// Read timeout for blocking operations.
    pub read_timeout: Option<Duration>,
    /// Write timeout for blocking operations.
    pub write_timeout: Option<Duration>,
}

impl FrameConfig {
    /// Reject a frame the receiving side would drop for its length.
    pub fn check_size(&self, frame: &Frame) -> Result<()> {
        let size = frame.data_len();
        if size > self.max_frame_len {
            return Err(FrameError::FrameTooLarge {
                size,
                max: self.max_frame_len,
            });
        }
        Ok(())
    }
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
            byte_timeout_ms: DEFAULT_BYTE_TIMEOUT_MS,
            read_timeout: None,
            write_timeout: None,
        }
    }
}
