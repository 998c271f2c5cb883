//! Byte transport abstraction for the DOG radio link.
//!
//! This is the lowest layer of doglink. It owns the seams between the protocol
//! state machines and the outside world:
//! - [`ByteSink`]: hand one byte to the transport (`transport.send_byte`)
//! - [`Timers`]: arm and cancel the per-byte watchdogs and the lost-link timer
//! - [`EventQueue`]: the interrupt-to-task hand-off for byte/timer signals
//! - [`LinkStream`]: a concrete byte stream (Unix socket or serial device node)

pub mod error;
pub mod event;
pub mod timer;
pub mod traits;

#[cfg(unix)]
pub mod uds;

pub use error::{Result, TransportError};
pub use event::{
    event_queue, EventQueue, EventSender, LinkEvent, StreamSink, DEFAULT_QUEUE_CAPACITY,
};
pub use timer::{TimerBank, TimerId};
pub use traits::{ByteSink, LinkStream, Timers, DEFAULT_BAUD_RATE};

#[cfg(unix)]
pub use uds::UnixDomainSocket;
