use std::io::{Read, Write};
use std::path::Path;
use std::time::Duration;

use serialport::SerialPort;
use tracing::debug;

use crate::error::{Result, TransportError};
use crate::timer::TimerId;

/// Hands one byte at a time to the transport.
///
/// Implementations must not block waiting for the byte to leave the wire; the
/// "byte accepted" signal is delivered separately (see [`crate::LinkEvent::ByteSent`]).
pub trait ByteSink {
    /// Queue `byte` for transmission.
    fn send_byte(&mut self, byte: u8) -> Result<()>;
}

impl ByteSink for Vec<u8> {
    fn send_byte(&mut self, byte: u8) -> Result<()> {
        self.push(byte);
        Ok(())
    }
}

impl<S: ByteSink + ?Sized> ByteSink for &mut S {
    fn send_byte(&mut self, byte: u8) -> Result<()> {
        (**self).send_byte(byte)
    }
}

/// One-shot timers keyed by [`TimerId`].
///
/// Arming an already armed timer replaces its deadline. An expired or
/// cancelled timer never fires.
pub trait Timers {
    /// Arm (or re-arm) `id` to fire after `duration_ms` milliseconds.
    fn arm(&mut self, id: TimerId, duration_ms: u64);

    /// Disarm `id`. No-op if it is not armed.
    fn cancel(&mut self, id: TimerId);
}

/// Link speed used when the configuration does not name one.
pub const DEFAULT_BAUD_RATE: u32 = 9600;

/// Stand-in for "no timeout" on a serial port, which always has one.
const DEVICE_BLOCKING_TIMEOUT: Duration = Duration::from_secs(24 * 60 * 60);

/// A connected radio link byte stream — implements Read + Write.
///
/// On Unix this is either a Unix domain socket (a simulated radio hop) or a
/// serial port driving the radio modem.
pub struct LinkStream {
    inner: LinkStreamInner,
}

enum LinkStreamInner {
    #[cfg(unix)]
    Unix(std::os::unix::net::UnixStream),
    Serial(Box<dyn SerialPort>),
}

impl Read for LinkStream {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match &mut self.inner {
            #[cfg(unix)]
            LinkStreamInner::Unix(stream) => stream.read(buf),
            LinkStreamInner::Serial(port) => port.read(buf),
        }
    }
}

impl Write for LinkStream {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match &mut self.inner {
            #[cfg(unix)]
            LinkStreamInner::Unix(stream) => stream.write(buf),
            LinkStreamInner::Serial(port) => port.write(buf),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match &mut self.inner {
            #[cfg(unix)]
            LinkStreamInner::Unix(stream) => stream.flush(),
            LinkStreamInner::Serial(port) => port.flush(),
        }
    }
}

impl LinkStream {
    /// Create a LinkStream from a Unix domain socket stream.
    #[cfg(unix)]
    pub(crate) fn from_unix(stream: std::os::unix::net::UnixStream) -> Self {
        Self {
            inner: LinkStreamInner::Unix(stream),
        }
    }

    /// Wrap an already opened serial port.
    pub fn from_serial(port: Box<dyn SerialPort>) -> Self {
        Self {
            inner: LinkStreamInner::Serial(port),
        }
    }

    /// Open the serial device at `path` (8N1, no flow control) at `baud_rate`.
    pub fn open_device(path: impl AsRef<Path>, baud_rate: u32) -> Result<Self> {
        let path = path.as_ref();
        let port = serialport::new(path.to_string_lossy(), baud_rate)
            .timeout(DEVICE_BLOCKING_TIMEOUT)
            .open()
            .map_err(|e| TransportError::Open {
                path: path.to_path_buf(),
                source: e.into(),
            })?;
        debug!(?path, baud_rate, "opened serial device");
        Ok(Self::from_serial(port))
    }

    /// Set read timeout on the underlying stream. `None` blocks.
    ///
    /// A serial port has a single timeout for both directions.
    pub fn set_read_timeout(&mut self, timeout: Option<Duration>) -> Result<()> {
        match &mut self.inner {
            #[cfg(unix)]
            LinkStreamInner::Unix(stream) => stream.set_read_timeout(timeout).map_err(Into::into),
            LinkStreamInner::Serial(port) => port
                .set_timeout(timeout.unwrap_or(DEVICE_BLOCKING_TIMEOUT))
                .map_err(|e| TransportError::Io(e.into())),
        }
    }

    /// Set write timeout on the underlying stream.
    ///
    /// On a serial port `None` keeps the current (shared) timeout.
    pub fn set_write_timeout(&mut self, timeout: Option<Duration>) -> Result<()> {
        match &mut self.inner {
            #[cfg(unix)]
            LinkStreamInner::Unix(stream) => stream.set_write_timeout(timeout).map_err(Into::into),
            LinkStreamInner::Serial(port) => match timeout {
                Some(timeout) => port
                    .set_timeout(timeout)
                    .map_err(|e| TransportError::Io(e.into())),
                None => Ok(()),
            },
        }
    }

    /// Try to clone this stream (creates a new file descriptor).
    ///
    /// Timeouts of a cloned serial port are independent of the original.
    pub fn try_clone(&self) -> Result<Self> {
        let inner = match &self.inner {
            #[cfg(unix)]
            LinkStreamInner::Unix(stream) => LinkStreamInner::Unix(stream.try_clone()?),
            LinkStreamInner::Serial(port) => LinkStreamInner::Serial(
                port.try_clone().map_err(|e| TransportError::Io(e.into()))?,
            ),
        };
        Ok(Self { inner })
    }

    /// Transport name for diagnostics.
    pub fn kind(&self) -> &'static str {
        match &self.inner {
            #[cfg(unix)]
            LinkStreamInner::Unix(_) => "unix",
            LinkStreamInner::Serial(_) => "serial",
        }
    }
}

impl std::fmt::Debug for LinkStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LinkStream")
            .field("type", &self.kind())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vec_sink_collects_bytes() {
        let mut sink = Vec::new();
        sink.send_byte(0x7E).unwrap();
        sink.send_byte(0x00).unwrap();
        assert_eq!(sink, vec![0x7E, 0x00]);
    }

    #[test]
    fn open_missing_device_reports_path() {
        let err =
            LinkStream::open_device("/nonexistent/doglink/tty", DEFAULT_BAUD_RATE).unwrap_err();
        assert!(matches!(err, TransportError::Open { .. }));
        assert!(err.to_string().contains("/nonexistent/doglink/tty"));
    }

    #[test]
    #[cfg(unix)]
    fn unix_pair_read_write_and_clone() {
        let (left, right) = std::os::unix::net::UnixStream::pair().unwrap();
        let mut left = LinkStream::from_unix(left);
        let right = LinkStream::from_unix(right);
        let mut reader = right.try_clone().unwrap();

        left.write_all(&[0x7E, 0x01]).unwrap();
        let mut buf = [0u8; 2];
        reader.read_exact(&mut buf).unwrap();
        assert_eq!(buf, [0x7E, 0x01]);
        assert_eq!(right.kind(), "unix");
    }

    #[test]
    #[cfg(unix)]
    fn serial_read_honours_timeout() {
        let (master, _slave) = serialport::TTYPort::pair().unwrap();
        let mut link = LinkStream::from_serial(Box::new(master));
        link.set_read_timeout(Some(Duration::from_millis(100))).unwrap();

        let started = std::time::Instant::now();
        let err = link.read(&mut [0u8; 8]).unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::TimedOut);
        assert!(started.elapsed() < Duration::from_secs(1));
        assert_eq!(link.kind(), "serial");
    }

    #[test]
    #[cfg(unix)]
    fn serial_pair_carries_bytes_and_clones_keep_own_timeout() {
        let (master, slave) = serialport::TTYPort::pair().unwrap();
        let mut dog = LinkStream::from_serial(Box::new(master));
        let mut farmer = LinkStream::from_serial(Box::new(slave));
        farmer.set_read_timeout(Some(Duration::from_secs(2))).unwrap();

        let mut rx = dog.try_clone().unwrap();
        rx.set_read_timeout(Some(Duration::from_millis(20))).unwrap();

        dog.write_all(&[0x7E, 0x00, 0x06]).unwrap();
        dog.flush().unwrap();
        let mut buf = [0u8; 3];
        farmer.read_exact(&mut buf).unwrap();
        assert_eq!(buf, [0x7E, 0x00, 0x06]);

        let err = rx.read(&mut [0u8; 1]).unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::TimedOut);
    }
}
