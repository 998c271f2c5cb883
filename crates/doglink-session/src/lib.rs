//! DOG side of the DOG/FARMER radio link.
//!
//! [`SessionController`] owns pairing and the rolling-key cipher,
//! [`FrameDispatcher`] turns frames into session events and replies into
//! frames, and [`Node`] ties both to the byte-level receive and transmit
//! machines behind a single run-to-completion event loop.

pub mod actuation;
pub mod cipher;
pub mod command;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod node;
pub mod runtime;
pub mod session;

pub use actuation::{Actuation, StaticTelemetry, Telemetry, TelemetrySource, TracingActuator};
pub use cipher::{decode_stream, Key, StreamCipher, KEY_LEN};
pub use command::{DriveCommand, BRAKE_BIT, COMMAND_HEADER, PERIPHERAL_BIT};
pub use config::{SessionConfig, DEFAULT_LOST_LINK_MS, DEFAULT_MAX_SEND_ATTEMPTS};
pub use dispatcher::FrameDispatcher;
pub use error::{Result, SessionError};
pub use node::Node;
pub use runtime::{run_node, spawn_key_reader, NodeReport, NodeRuntime, StopReason};
pub use session::{Reply, SessionController, SessionEvent, SessionPhase};
