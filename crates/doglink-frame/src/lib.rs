//! Checksummed framing for the DOG/FARMER serial radio link.
//!
//! Every frame on the wire is:
//! - a `0x7E` start marker
//! - a 2-byte big-endian length of the frame data
//! - the frame data (API identifier, addressing, packet type, payload)
//! - a 1-byte checksum, `0xFF - sum(frame data)`
//!
//! [`FrameReceiver`] and [`FrameTransmitter`] move frames one byte at a time,
//! guarded by per-byte watchdogs. [`FrameReader`] and [`FrameWriter`] drive
//! them over blocking `Read`/`Write` streams.

pub mod codec;
pub mod error;
pub mod packet;
pub mod reader;
pub mod receiver;
pub mod transmitter;
pub mod writer;

pub use codec::{
    checksum, decode_frame, decode_frame_data, encode, encode_frame, Address, ApiKind, Checksum,
    Frame, FrameConfig, DEFAULT_BYTE_TIMEOUT_MS, DEFAULT_MAX_FRAME_LEN, DELIVERED, FRAME_ID,
    START_MARKER,
};
pub use error::{FrameError, Result};
pub use packet::PacketType;
pub use reader::FrameReader;
pub use receiver::{FrameReceiver, ReceivePhase};
pub use transmitter::{FrameTransmitter, TransmitPhase, TransmitProgress};
pub use writer::FrameWriter;
