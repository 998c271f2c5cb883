//! DOG side of a paired serial-radio link.
//!
//! A DOG pairs with one FARMER by tag, receives a 32-byte stream key and then
//! obeys encrypted drive commands, answering each with a status report.
//!
//! # Crate Structure
//!
//! - [`transport`]: byte links (Unix sockets, device nodes), event queue, timers
//! - [`frame`]: `0x7E` API frames, checksum, byte-driven receiver and transmitter
//! - [`session`]: pairing state machine, cipher, dispatcher and node runtime

/// Re-export transport types.
pub mod transport {
    pub use doglink_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use doglink_frame::*;
}

/// Re-export session types.
pub mod session {
    pub use doglink_session::*;
}
