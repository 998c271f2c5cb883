//! Interrupt-to-task hand-off.
//!
//! Signal sources (the byte reader, write completion, timer expiry, operator
//! keys) never touch protocol state. Each posts one [`LinkEvent`] and the
//! dispatch loop drains the queue in order, running one handler to completion
//! per event.

use std::io::Write;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, SyncSender, TryRecvError, TrySendError};
use std::time::Duration;

use tracing::{trace, warn};

use crate::error::{Result, TransportError};
use crate::timer::TimerId;
use crate::traits::ByteSink;

/// Default queue depth. Comfortably above one maximum-length frame.
pub const DEFAULT_QUEUE_CAPACITY: usize = 256;

/// A single asynchronous signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkEvent {
    /// One byte arrived from the transport.
    ByteReceived(u8),
    /// The transport accepted the last byte handed to it.
    ByteSent,
    /// A timer expired.
    TimerExpired(TimerId),
    /// Operator key press.
    KeyPressed(char),
}

/// Producer side of the event queue. Cheap to clone, one per signal source.
#[derive(Debug, Clone)]
pub struct EventSender {
    tx: SyncSender<LinkEvent>,
}

impl EventSender {
    /// Post an event, waiting for room if the queue is full.
    pub fn post(&self, event: LinkEvent) -> Result<()> {
        self.tx
            .send(event)
            .map_err(|_| TransportError::QueueClosed)
    }

    /// Post an event without waiting.
    pub fn try_post(&self, event: LinkEvent) -> Result<()> {
        self.tx.try_send(event).map_err(|err| match err {
            TrySendError::Full(_) => TransportError::QueueFull,
            TrySendError::Disconnected(_) => TransportError::QueueClosed,
        })
    }
}

/// Consumer side of the event queue, owned by the dispatch loop.
#[derive(Debug)]
pub struct EventQueue {
    rx: Receiver<LinkEvent>,
}

impl EventQueue {
    /// Next event, if one is already queued.
    pub fn try_next(&self) -> Result<Option<LinkEvent>> {
        match self.rx.try_recv() {
            Ok(event) => Ok(Some(event)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(TransportError::QueueClosed),
        }
    }

    /// Wait up to `timeout` for the next event.
    pub fn next_timeout(&self, timeout: Duration) -> Result<Option<LinkEvent>> {
        match self.rx.recv_timeout(timeout) {
            Ok(event) => Ok(Some(event)),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => Err(TransportError::QueueClosed),
        }
    }
}

/// Create a bounded single-consumer event queue.
pub fn event_queue(capacity: usize) -> (EventSender, EventQueue) {
    let (tx, rx) = mpsc::sync_channel(capacity);
    (EventSender { tx }, EventQueue { rx })
}

/// A [`ByteSink`] over a blocking writer.
///
/// Each byte is written and flushed, then [`LinkEvent::ByteSent`] is posted,
/// standing in for the "transmit register empty" interrupt of a UART.
pub struct StreamSink<W> {
    inner: W,
    events: EventSender,
}

impl<W: Write> StreamSink<W> {
    /// Wrap `inner`, signalling completions on `events`.
    pub fn new(inner: W, events: EventSender) -> Self {
        Self { inner, events }
    }

    /// Mutably borrow the underlying writer.
    pub fn get_mut(&mut self) -> &mut W {
        &mut self.inner
    }

    /// Consume the sink and return the inner writer.
    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write> ByteSink for StreamSink<W> {
    fn send_byte(&mut self, byte: u8) -> Result<()> {
        self.inner.write_all(&[byte])?;
        self.inner.flush()?;
        trace!(byte, "byte written");
        match self.events.try_post(LinkEvent::ByteSent) {
            // The transmit watchdog recovers from a lost completion.
            Err(TransportError::QueueFull) => {
                warn!("event queue full; dropping byte-sent signal");
                Ok(())
            }
            other => other,
        }
    }
}
