use std::io::{ErrorKind, Read};
use std::time::Instant;

use bytes::{Buf, BytesMut};
use doglink_transport::{LinkStream, TimerBank, TimerId};
use tracing::debug;

use crate::codec::{decode_frame_data, Frame, FrameConfig};
use crate::error::{FrameError, Result};
use crate::receiver::FrameReceiver;

const READ_CHUNK_SIZE: usize = 256;

/// Reads complete frames from any `Read` stream.
///
/// Bytes go through a [`FrameReceiver`], so noise between frames is skipped,
/// corrupted frames are dropped and a gap longer than the byte watchdog
/// between two reads abandons the partial frame. Callers only ever see
/// frames whose checksum held and whose contents decoded.
pub struct FrameReader<T> {
    inner: T,
    receiver: FrameReceiver,
    timers: TimerBank,
    started: Instant,
    pending: BytesMut,
    config: FrameConfig,
}

impl<T: Read> FrameReader<T> {
    /// Create a new frame reader with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Create a new frame reader with explicit configuration.
    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self {
            inner,
            receiver: FrameReceiver::new(&config),
            timers: TimerBank::new(),
            started: Instant::now(),
            pending: BytesMut::with_capacity(READ_CHUNK_SIZE),
            config,
        }
    }

    /// Read the next valid frame (blocking).
    ///
    /// Returns `Err(FrameError::ConnectionClosed)` when EOF is reached. A read
    /// timeout abandons any partial frame and surfaces as `FrameError::Io`.
    pub fn read_frame(&mut self) -> Result<Frame> {
        loop {
            while self.pending.has_remaining() {
                let byte = self.pending.get_u8();
                let Some(data) = self.receiver.on_byte(byte, &mut self.timers) else {
                    continue;
                };
                match decode_frame_data(&data) {
                    Ok(frame) => return Ok(frame),
                    Err(err) => debug!(%err, "skipping undecodable frame"),
                }
            }

            let mut chunk = [0u8; READ_CHUNK_SIZE];
            let read = match self.inner.read(&mut chunk) {
                Ok(n) => n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if matches!(err.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {
                    self.receiver.on_watchdog_expired();
                    return Err(FrameError::Io(err));
                }
                Err(err) => return Err(FrameError::Io(err)),
            };

            if read == 0 {
                return Err(FrameError::ConnectionClosed);
            }

            self.tick();
            self.pending.extend_from_slice(&chunk[..read]);
        }
    }

    /// Advance the watchdog clock to the arrival time of the latest chunk.
    fn tick(&mut self) {
        let now = self.started.elapsed().as_millis() as u64;
        for id in self.timers.advance_to(now) {
            if id == TimerId::ReceiveWatchdog {
                self.receiver.on_watchdog_expired();
            }
        }
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the reader and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Current frame reader configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }
}

impl FrameReader<LinkStream> {
    /// Create a frame reader for a `LinkStream` and apply the read timeout from config.
    pub fn with_config_link(mut inner: LinkStream, config: FrameConfig) -> Result<Self> {
        inner.set_read_timeout(config.read_timeout)?;
        Ok(Self::with_config(inner, config))
    }
}
