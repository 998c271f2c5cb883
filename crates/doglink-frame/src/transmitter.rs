//! Byte-at-a-time frame transmission.

use bytes::Bytes;
use doglink_transport::{ByteSink, TimerId, Timers};
use tracing::{trace, warn};

use crate::codec::FrameConfig;
use crate::error::{FrameError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransmitPhase {
    Idle,
    Sending,
}

/// Outcome of a "byte accepted" signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransmitProgress {
    /// Nothing was being sent.
    Ignored,
    /// The next byte went out.
    InProgress,
    /// The final byte was accepted; the transmitter is idle again.
    Complete,
}

/// Pushes one encoded frame into a [`ByteSink`], one byte per completion signal.
///
/// A frame that stalls for longer than the byte watchdog is abandoned. The
/// transmitter never resends on its own.
#[derive(Debug)]
pub struct FrameTransmitter {
    phase: TransmitPhase,
    buffer: Bytes,
    send_index: usize,
    byte_timeout_ms: u64,
    last_byte_sent: bool,
}

impl FrameTransmitter {
    pub fn new(config: &FrameConfig) -> Self {
        Self {
            phase: TransmitPhase::Idle,
            buffer: Bytes::new(),
            send_index: 0,
            byte_timeout_ms: config.byte_timeout_ms,
            last_byte_sent: false,
        }
    }

    pub fn phase(&self) -> TransmitPhase {
        self.phase
    }

    pub fn is_idle(&self) -> bool {
        self.phase == TransmitPhase::Idle
    }

    /// Whether the most recent frame finished leaving the transmitter.
    pub fn is_last_byte_sent(&self) -> bool {
        self.last_byte_sent
    }

    /// Begin sending `frame` (complete wire bytes).
    pub fn start<S, T>(&mut self, frame: Bytes, sink: &mut S, timers: &mut T) -> Result<()>
    where
        S: ByteSink,
        T: Timers,
    {
        if self.phase == TransmitPhase::Sending {
            return Err(FrameError::TransmitterBusy);
        }
        let Some(&first) = frame.first() else {
            return Err(FrameError::Truncated {
                kind: "wire",
                len: 0,
                min: 1,
            });
        };

        sink.send_byte(first)?;
        trace!(len = frame.len(), "transmit started");
        self.buffer = frame;
        self.send_index = 1;
        self.last_byte_sent = false;
        self.phase = TransmitPhase::Sending;
        timers.arm(TimerId::TransmitWatchdog, self.byte_timeout_ms);
        Ok(())
    }

    /// Handle the transport's "byte accepted" signal.
    pub fn on_byte_sent<S, T>(&mut self, sink: &mut S, timers: &mut T) -> Result<TransmitProgress>
    where
        S: ByteSink,
        T: Timers,
    {
        if self.phase == TransmitPhase::Idle {
            return Ok(TransmitProgress::Ignored);
        }

        if self.send_index == self.buffer.len() {
            timers.cancel(TimerId::TransmitWatchdog);
            self.phase = TransmitPhase::Idle;
            self.last_byte_sent = true;
            trace!(len = self.buffer.len(), "transmit complete");
            return Ok(TransmitProgress::Complete);
        }

        if let Err(err) = sink.send_byte(self.buffer[self.send_index]) {
            timers.cancel(TimerId::TransmitWatchdog);
            self.phase = TransmitPhase::Idle;
            return Err(err.into());
        }
        self.send_index += 1;
        timers.arm(TimerId::TransmitWatchdog, self.byte_timeout_ms);
        Ok(TransmitProgress::InProgress)
    }

    /// Abort the frame in flight. Returns true if one was aborted.
    pub fn on_watchdog_expired(&mut self) -> bool {
        if self.phase == TransmitPhase::Idle {
            return false;
        }
        warn!(
            sent = self.send_index,
            total = self.buffer.len(),
            "transmit watchdog expired; frame lost"
        );
        self.phase = TransmitPhase::Idle;
        true
    }
}
