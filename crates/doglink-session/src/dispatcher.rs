use bytes::Bytes;
use doglink_frame::{decode_frame_data, Address, Frame, PacketType, DELIVERED};
use doglink_transport::Timers;
use tracing::{debug, warn};

use crate::actuation::{Actuation, TelemetrySource};
use crate::config::SessionConfig;
use crate::session::{Reply, SessionController, SessionEvent};

/// Routes completed frames into the session and turns its replies into wire bytes.
///
/// Also owns delivery retry: the last frame built is kept until the radio
/// reports it delivered, and resent on failure up to `max_send_attempts`
/// transmissions in total. Running out of attempts ends the session as if the
/// link had been lost.
#[derive(Debug)]
pub struct FrameDispatcher<A, S> {
    session: SessionController<A>,
    telemetry: S,
    max_send_attempts: u32,
    last_sent: Option<Bytes>,
    attempts: u32,
}

impl<A: Actuation, S: TelemetrySource> FrameDispatcher<A, S> {
    pub fn new(config: &SessionConfig, actuation: A, telemetry: S) -> Self {
        Self {
            session: SessionController::new(config, actuation),
            telemetry,
            max_send_attempts: config.max_send_attempts,
            last_sent: None,
            attempts: 0,
        }
    }

    pub fn session(&self) -> &SessionController<A> {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut SessionController<A> {
        &mut self.session
    }

    /// Transmissions of the last frame so far.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Last frame built and not yet confirmed delivered.
    pub fn last_sent(&self) -> Option<&Bytes> {
        self.last_sent.as_ref()
    }

    /// Handle checksum-valid frame data from the receiver.
    ///
    /// Returns wire bytes to transmit, if any.
    pub fn on_frame_received<T: Timers>(&mut self, data: &[u8], timers: &mut T) -> Option<Bytes> {
        match decode_frame_data(data) {
            Ok(frame) => self.on_frame(frame, timers),
            Err(err) => {
                debug!(%err, "dropping undecodable frame");
                None
            }
        }
    }

    /// Handle a decoded frame.
    pub fn on_frame<T: Timers>(&mut self, frame: Frame, timers: &mut T) -> Option<Bytes> {
        match frame {
            Frame::Command {
                source,
                packet_type,
                payload,
                ..
            } => {
                let event = classify(source, packet_type, &payload)?;
                let reply = self.session.handle(event, timers)?;
                self.build(reply)
            }
            Frame::TxResult { status, .. } => self.on_tx_result(status, timers),
            Frame::Reset { status } => {
                debug!(status, "radio reset notice");
                None
            }
            Frame::Response { dest, .. } => {
                debug!(%dest, "ignoring inbound transmit request");
                None
            }
        }
    }

    /// Operator override keys: `D` sends an ack to the current peer, `S` unpairs.
    pub fn on_key_pressed<T: Timers>(&mut self, key: char, timers: &mut T) -> Option<Bytes> {
        match key.to_ascii_uppercase() {
            'D' => self.build(Reply::Ack),
            'S' => {
                self.end_session(SessionEvent::Unpair, timers);
                None
            }
            other => {
                debug!(key = %other, "unmapped key");
                None
            }
        }
    }

    /// The lost-link timer fired.
    pub fn on_lost_link<T: Timers>(&mut self, timers: &mut T) {
        self.end_session(SessionEvent::LostLink, timers);
    }

    /// Encode a reply to the current peer.
    pub fn build(&mut self, reply: Reply) -> Option<Bytes> {
        let Some(peer) = self.session.peer() else {
            debug!(?reply, "no peer to reply to");
            return None;
        };

        let frame = match reply {
            Reply::Ack => Frame::response(peer, PacketType::Ack, Bytes::new()),
            Reply::StatusReport => {
                let sample = self.telemetry.sample();
                Frame::response(
                    peer,
                    PacketType::StatusReport,
                    Bytes::copy_from_slice(&sample),
                )
            }
            Reply::ResetEncryption => {
                Frame::response(peer, PacketType::ResetEncryption, Bytes::new())
            }
        };

        match frame.to_wire() {
            Ok(wire) => {
                debug!(?reply, %peer, len = wire.len(), "reply built");
                self.last_sent = Some(wire.clone());
                self.attempts = 1;
                Some(wire)
            }
            Err(err) => {
                warn!(%err, ?reply, "failed to encode reply");
                None
            }
        }
    }

    fn on_tx_result<T: Timers>(&mut self, status: u8, timers: &mut T) -> Option<Bytes> {
        if status == DELIVERED {
            self.last_sent = None;
            self.attempts = 0;
            return None;
        }

        let Some(frame) = self.last_sent.clone() else {
            debug!(status, "delivery failure with nothing to resend");
            return None;
        };

        if self.attempts >= self.max_send_attempts {
            warn!(
                status,
                attempts = self.attempts,
                "delivery failed on every attempt; treating link as lost"
            );
            self.end_session(SessionEvent::LostLink, timers);
            return None;
        }

        self.attempts += 1;
        warn!(
            status,
            attempt = self.attempts,
            max = self.max_send_attempts,
            "delivery failed; resending"
        );
        Some(frame)
    }

    fn end_session<T: Timers>(&mut self, event: SessionEvent, timers: &mut T) {
        self.last_sent = None;
        self.attempts = 0;
        self.session.handle(event, timers);
    }
}

/// Turn an inbound packet into a session event, dropping malformed ones.
fn classify(source: Address, packet_type: PacketType, payload: &[u8]) -> Option<SessionEvent> {
    if !packet_type.is_farmer_to_dog() {
        debug!(%packet_type, %source, "ignoring packet meant for a FARMER");
        return None;
    }
    if packet_type.payload_len() != Some(payload.len()) {
        warn!(%packet_type, len = payload.len(), "dropping packet with malformed payload");
        return None;
    }

    match packet_type {
        PacketType::PairRequest => Some(SessionEvent::PairRequest {
            source,
            tag: payload[0],
        }),
        PacketType::EncryptionKey => Some(SessionEvent::EncryptionKey {
            source,
            key: payload.try_into().ok()?,
        }),
        PacketType::Command => Some(SessionEvent::Command {
            source,
            ciphertext: payload.try_into().ok()?,
        }),
        PacketType::StatusReport | PacketType::Ack | PacketType::ResetEncryption => None,
    }
}
