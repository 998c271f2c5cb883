//! Byte-at-a-time frame reassembly.

use bytes::{BufMut, Bytes, BytesMut};
use doglink_transport::{TimerId, Timers};
use tracing::{debug, trace};

use crate::codec::{Checksum, FrameConfig, START_MARKER};

/// Where the receiver is within the current frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceivePhase {
    WaitForStart,
    WaitForLenHi,
    WaitForLenLo,
    Receiving,
}

/// Reassembles frames from single bytes.
///
/// Every byte past the start marker re-arms [`TimerId::ReceiveWatchdog`]; if
/// it fires, the partial frame is abandoned. Completed frames are handed out
/// only when their checksum holds, as the frame data (API identifier through
/// payload) ready for [`crate::decode_frame_data`].
#[derive(Debug)]
pub struct FrameReceiver {
    phase: ReceivePhase,
    max_frame_len: usize,
    byte_timeout_ms: u64,
    len_hi: u8,
    remaining: usize,
    checksum: Checksum,
    buffer: BytesMut,
}

impl FrameReceiver {
    pub fn new(config: &FrameConfig) -> Self {
        Self {
            phase: ReceivePhase::WaitForStart,
            max_frame_len: config.max_frame_len,
            byte_timeout_ms: config.byte_timeout_ms,
            len_hi: 0,
            remaining: 0,
            checksum: Checksum::new(),
            buffer: BytesMut::with_capacity(config.max_frame_len),
        }
    }

    pub fn phase(&self) -> ReceivePhase {
        self.phase
    }

    /// Feed one received byte. Returns the frame data when a valid frame completes.
    pub fn on_byte<T: Timers>(&mut self, byte: u8, timers: &mut T) -> Option<Bytes> {
        match self.phase {
            ReceivePhase::WaitForStart => {
                if byte == START_MARKER {
                    timers.arm(TimerId::ReceiveWatchdog, self.byte_timeout_ms);
                    self.phase = ReceivePhase::WaitForLenHi;
                } else {
                    trace!(byte, "skipping byte outside frame");
                }
                None
            }
            ReceivePhase::WaitForLenHi => {
                self.len_hi = byte;
                timers.arm(TimerId::ReceiveWatchdog, self.byte_timeout_ms);
                self.phase = ReceivePhase::WaitForLenLo;
                None
            }
            ReceivePhase::WaitForLenLo => {
                let len = u16::from_be_bytes([self.len_hi, byte]) as usize;
                if len == 0 || len > self.max_frame_len {
                    debug!(len, max = self.max_frame_len, "rejecting frame length");
                    self.resync(timers);
                    return None;
                }
                self.remaining = len;
                self.checksum = Checksum::new();
                self.buffer.clear();
                timers.arm(TimerId::ReceiveWatchdog, self.byte_timeout_ms);
                self.phase = ReceivePhase::Receiving;
                None
            }
            ReceivePhase::Receiving if self.remaining > 0 => {
                self.buffer.put_u8(byte);
                self.checksum.update(byte);
                self.remaining -= 1;
                timers.arm(TimerId::ReceiveWatchdog, self.byte_timeout_ms);
                None
            }
            ReceivePhase::Receiving => {
                self.resync(timers);
                if self.checksum.matches(byte) {
                    trace!(len = self.buffer.len(), "frame complete");
                    Some(self.buffer.split().freeze())
                } else {
                    debug!(
                        expected = self.checksum.value(),
                        actual = byte,
                        "dropping frame with bad checksum"
                    );
                    None
                }
            }
        }
    }

    /// Abandon any partial frame. Returns true if one was in progress.
    pub fn on_watchdog_expired(&mut self) -> bool {
        if self.phase == ReceivePhase::WaitForStart {
            return false;
        }
        debug!(
            phase = ?self.phase,
            received = self.buffer.len(),
            "receive watchdog expired; abandoning partial frame"
        );
        self.phase = ReceivePhase::WaitForStart;
        self.buffer.clear();
        true
    }

    fn resync<T: Timers>(&mut self, timers: &mut T) {
        timers.cancel(TimerId::ReceiveWatchdog);
        self.phase = ReceivePhase::WaitForStart;
    }
}

#[cfg(test)]
mod tests {
    use doglink_transport::TimerBank;

    use super::*;
    use crate::codec::{encode, Address, ApiKind};
    use crate::packet::PacketType;

    fn feed(rx: &mut FrameReceiver, timers: &mut TimerBank, bytes: &[u8]) -> Vec<Bytes> {
        bytes
            .iter()
            .filter_map(|&b| rx.on_byte(b, timers))
            .collect()
    }

    fn pair_request() -> Bytes {
        encode(
            ApiKind::Command,
            Address::new(0x21, 0x8B),
            PacketType::PairRequest,
            &[0x03],
        )
        .unwrap()
    }

    #[test]
    fn emits_frame_data_for_valid_frame() {
        let mut rx = FrameReceiver::new(&FrameConfig::default());
        let mut timers = TimerBank::new();
        let wire = pair_request();

        let frames = feed(&mut rx, &mut timers, &wire);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].as_ref(), &wire[3..wire.len() - 1]);
        assert_eq!(rx.phase(), ReceivePhase::WaitForStart);
        assert!(!timers.is_armed(TimerId::ReceiveWatchdog));
    }

    #[test]
    fn skips_noise_between_frames() {
        let mut rx = FrameReceiver::new(&FrameConfig::default());
        let mut timers = TimerBank::new();
        let wire = pair_request();

        let mut stream = vec![0x00, 0x13, 0xFF];
        stream.extend_from_slice(&wire);
        stream.extend_from_slice(&[0x42, 0x42]);
        stream.extend_from_slice(&wire);

        assert_eq!(feed(&mut rx, &mut timers, &stream).len(), 2);
    }

    #[test]
    fn drops_frame_with_bad_checksum() {
        let mut rx = FrameReceiver::new(&FrameConfig::default());
        let mut timers = TimerBank::new();
        let mut wire = pair_request().to_vec();
        let last = wire.len() - 1;
        wire[last] = wire[last].wrapping_add(1);

        assert!(feed(&mut rx, &mut timers, &wire).is_empty());
        assert_eq!(rx.phase(), ReceivePhase::WaitForStart);

        // The next good frame still gets through.
        assert_eq!(feed(&mut rx, &mut timers, &pair_request()).len(), 1);
    }

    #[test]
    fn every_byte_rearms_watchdog() {
        let mut rx = FrameReceiver::new(&FrameConfig::default());
        let mut timers = TimerBank::new();
        let wire = pair_request();

        rx.on_byte(wire[0], &mut timers);
        assert_eq!(timers.deadline(TimerId::ReceiveWatchdog), Some(10));
        timers.advance(7);
        rx.on_byte(wire[1], &mut timers);
        assert_eq!(timers.deadline(TimerId::ReceiveWatchdog), Some(17));
    }

    #[test]
    fn watchdog_abandons_partial_frame() {
        let mut rx = FrameReceiver::new(&FrameConfig::default());
        let mut timers = TimerBank::new();
        let wire = pair_request();

        feed(&mut rx, &mut timers, &wire[..5]);
        assert_eq!(rx.phase(), ReceivePhase::Receiving);
        assert_eq!(timers.advance(10), vec![TimerId::ReceiveWatchdog]);
        assert!(rx.on_watchdog_expired());
        assert_eq!(rx.phase(), ReceivePhase::WaitForStart);
        assert!(!rx.on_watchdog_expired());

        // The rest of the stale frame is noise; a fresh frame decodes.
        assert!(feed(&mut rx, &mut timers, &wire[5..]).is_empty());
        assert_eq!(feed(&mut rx, &mut timers, &wire).len(), 1);
    }

    #[test]
    fn rejects_zero_and_oversized_lengths() {
        let mut rx = FrameReceiver::new(&FrameConfig::default());
        let mut timers = TimerBank::new();

        feed(&mut rx, &mut timers, &[0x7E, 0x00, 0x00]);
        assert_eq!(rx.phase(), ReceivePhase::WaitForStart);
        assert!(!timers.is_armed(TimerId::ReceiveWatchdog));

        feed(&mut rx, &mut timers, &[0x7E, 0x01, 0x00]);
        assert_eq!(rx.phase(), ReceivePhase::WaitForStart);

        let cfg = FrameConfig {
            max_frame_len: 7,
            ..FrameConfig::default()
        };
        let mut small = FrameReceiver::new(&cfg);
        let key = encode(
            ApiKind::Command,
            Address::new(0x21, 0x8B),
            PacketType::EncryptionKey,
            &[0u8; 32],
        )
        .unwrap();
        assert!(feed(&mut small, &mut timers, &key).is_empty());
        assert_eq!(feed(&mut small, &mut timers, &pair_request()).len(), 1);
    }

    #[test]
    fn start_marker_inside_payload_is_data() {
        let mut rx = FrameReceiver::new(&FrameConfig::default());
        let mut timers = TimerBank::new();
        let wire = encode(
            ApiKind::Command,
            Address::new(0x7E, 0x7E),
            PacketType::Command,
            &[0x7E, 0x7E, 0x7E, 0x7E],
        )
        .unwrap();

        let frames = feed(&mut rx, &mut timers, &wire);
        assert_eq!(frames.len(), 1);
        assert_eq!(&frames[0][6..], &[0x7E, 0x7E, 0x7E, 0x7E]);
    }
}

#[cfg(test)]
mod proptests {
    use doglink_transport::TimerBank;
    use proptest::prelude::*;

    use super::*;
    use crate::codec::{encode, Address, ApiKind, START_MARKER};
    use crate::packet::PacketType;

    fn noise() -> impl Strategy<Value = Vec<u8>> {
        prop::collection::vec(any::<u8>().prop_filter("start marker", |b| *b != START_MARKER), 0..24)
    }

    fn wire() -> impl Strategy<Value = Bytes> {
        (
            prop_oneof![Just(ApiKind::Command), Just(ApiKind::Response)],
            any::<u16>(),
            (0x00..=0x05u8).prop_map(|b| PacketType::from_byte(b).unwrap()),
            prop::collection::vec(any::<u8>(), 0..=32),
        )
            .prop_map(|(kind, address, packet_type, payload)| {
                encode(kind, Address::from_u16(address), packet_type, &payload).unwrap()
            })
    }

    fn emitted(bytes: &[u8]) -> Vec<Bytes> {
        let mut rx = FrameReceiver::new(&FrameConfig::default());
        let mut timers = TimerBank::new();
        bytes
            .iter()
            .filter_map(|&b| rx.on_byte(b, &mut timers))
            .collect()
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(256))]

        #[test]
        fn one_frame_between_noise(before in noise(), wire in wire(), after in noise()) {
            let mut stream = before;
            stream.extend_from_slice(&wire);
            stream.extend_from_slice(&after);

            let frames = emitted(&stream);
            prop_assert_eq!(frames.len(), 1);
            prop_assert_eq!(frames[0].as_ref(), &wire[3..wire.len() - 1]);
        }

        #[test]
        fn flipped_checksum_bit_emits_nothing(wire in wire(), bit in 0..8u32) {
            let mut corrupted = wire.to_vec();
            let last = corrupted.len() - 1;
            corrupted[last] ^= 1 << bit;

            prop_assert!(emitted(&corrupted).is_empty());
        }
    }
}
