//! DOG pairing session.
//!
//! ```text
//! WaitingToPair ──PairRequest(own tag)──▶ PairedAwaitingKey ──EncryptionKey──▶ Paired
//!       ▲                                        │                              │ Command
//!       └────────────── Unpair / LostLink ───────┴──────────────────────────────┘
//! ```

use doglink_frame::Address;
use doglink_transport::{TimerId, Timers};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::actuation::Actuation;
use crate::cipher::{Key, StreamCipher};
use crate::command::DriveCommand;
use crate::config::SessionConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SessionPhase {
    WaitingToPair,
    PairedAwaitingKey,
    Paired,
}

/// Input to the session, already classified and length-checked.
#[derive(Clone, PartialEq, Eq)]
pub enum SessionEvent {
    PairRequest { source: Address, tag: u8 },
    EncryptionKey { source: Address, key: Key },
    Command { source: Address, ciphertext: [u8; 4] },
    Unpair,
    LostLink,
}

impl SessionEvent {
    pub fn name(&self) -> &'static str {
        match self {
            SessionEvent::PairRequest { .. } => "pair-request",
            SessionEvent::EncryptionKey { .. } => "encryption-key",
            SessionEvent::Command { .. } => "command",
            SessionEvent::Unpair => "unpair",
            SessionEvent::LostLink => "lost-link",
        }
    }
}

impl std::fmt::Debug for SessionEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionEvent::PairRequest { source, tag } => f
                .debug_struct("PairRequest")
                .field("source", source)
                .field("tag", tag)
                .finish(),
            SessionEvent::EncryptionKey { source, .. } => f
                .debug_struct("EncryptionKey")
                .field("source", source)
                .field("key", &"<redacted>")
                .finish(),
            SessionEvent::Command { source, .. } => f
                .debug_struct("Command")
                .field("source", source)
                .finish_non_exhaustive(),
            SessionEvent::Unpair => f.write_str("Unpair"),
            SessionEvent::LostLink => f.write_str("LostLink"),
        }
    }
}

/// Reply the session wants sent to its peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reply {
    Ack,
    StatusReport,
    ResetEncryption,
}

/// Pairing state plus the actuators it drives.
#[derive(Debug)]
pub struct SessionController<A> {
    phase: SessionPhase,
    own_tag: u8,
    lost_link_ms: u64,
    peer: Option<Address>,
    cipher: Option<StreamCipher>,
    actuation: A,
}

impl<A: Actuation> SessionController<A> {
    pub fn new(config: &SessionConfig, actuation: A) -> Self {
        Self {
            phase: SessionPhase::WaitingToPair,
            own_tag: config.own_tag,
            lost_link_ms: config.lost_link_ms,
            peer: None,
            cipher: None,
            actuation,
        }
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn own_tag(&self) -> u8 {
        self.own_tag
    }

    /// Address of the paired FARMER.
    pub fn peer(&self) -> Option<Address> {
        self.peer
    }

    /// Current key offset, once a key has arrived.
    pub fn key_index(&self) -> Option<usize> {
        self.cipher.as_ref().map(StreamCipher::index)
    }

    pub fn actuation(&self) -> &A {
        &self.actuation
    }

    pub fn actuation_mut(&mut self) -> &mut A {
        &mut self.actuation
    }

    /// Run one event to completion.
    pub fn handle<T: Timers>(&mut self, event: SessionEvent, timers: &mut T) -> Option<Reply> {
        match (self.phase, event) {
            (_, SessionEvent::Unpair) => {
                self.unpair(timers, "unpair requested");
                None
            }
            (_, SessionEvent::LostLink) => {
                self.unpair(timers, "lost link");
                None
            }
            (SessionPhase::WaitingToPair, SessionEvent::PairRequest { source, tag }) => {
                if tag != self.own_tag {
                    debug!(tag, own_tag = self.own_tag, %source, "pair request for another tag");
                    return None;
                }
                self.peer = Some(source);
                self.actuation.activate();
                timers.arm(TimerId::LostLink, self.lost_link_ms);
                self.phase = SessionPhase::PairedAwaitingKey;
                info!(peer = %source, tag, "paired; awaiting key");
                Some(Reply::Ack)
            }
            (SessionPhase::PairedAwaitingKey, SessionEvent::EncryptionKey { source, key })
                if self.is_peer(source) =>
            {
                self.cipher = Some(StreamCipher::new(key));
                timers.arm(TimerId::LostLink, self.lost_link_ms);
                self.actuation.session_active();
                self.phase = SessionPhase::Paired;
                info!(peer = %source, "key received; session active");
                Some(Reply::StatusReport)
            }
            (SessionPhase::Paired, SessionEvent::Command { source, ciphertext })
                if self.is_peer(source) =>
            {
                let cipher = self.cipher.as_mut()?;
                let plain = cipher.apply(&ciphertext);
                timers.arm(TimerId::LostLink, self.lost_link_ms);
                match DriveCommand::from_plaintext(&plain) {
                    Some(command) => {
                        self.actuation.apply_command(&command);
                        Some(Reply::StatusReport)
                    }
                    None => {
                        warn!(header = plain[0], "key stream out of step; requesting reset");
                        cipher.reset();
                        Some(Reply::ResetEncryption)
                    }
                }
            }
            (phase, event) => {
                debug!(?phase, event = event.name(), "ignoring event");
                None
            }
        }
    }

    fn is_peer(&self, source: Address) -> bool {
        let matches = self.peer == Some(source);
        if !matches {
            debug!(%source, peer = ?self.peer, "frame from unpaired address");
        }
        matches
    }

    fn unpair<T: Timers>(&mut self, timers: &mut T, reason: &'static str) {
        self.actuation.deactivate();
        timers.cancel(TimerId::LostLink);
        if self.phase != SessionPhase::WaitingToPair {
            info!(peer = ?self.peer, reason, "unpaired");
        }
        self.peer = None;
        self.cipher = None;
        self.phase = SessionPhase::WaitingToPair;
    }
}
