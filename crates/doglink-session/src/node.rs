//! Run-to-completion dispatch of link events.

use std::collections::VecDeque;

use bytes::Bytes;
use doglink_frame::{FrameReceiver, FrameTransmitter, TransmitProgress};
use doglink_transport::{ByteSink, LinkEvent, TimerBank, TimerId};
use tracing::{debug, trace};

use crate::actuation::{Actuation, TelemetrySource};
use crate::config::SessionConfig;
use crate::dispatcher::FrameDispatcher;
use crate::error::Result;
use crate::session::{SessionController, SessionPhase};

/// One DOG: receiver, transmitter and dispatcher sharing a timer bank.
///
/// Every [`LinkEvent`] is handled to completion before the next. Replies built
/// while the transmitter is busy wait in a FIFO and go out as soon as it is
/// idle again, since the radio link is half duplex.
pub struct Node<A, S, K> {
    receiver: FrameReceiver,
    transmitter: FrameTransmitter,
    dispatcher: FrameDispatcher<A, S>,
    outbound: VecDeque<Bytes>,
    timers: TimerBank,
    sink: K,
}

impl<A, S, K> Node<A, S, K>
where
    A: Actuation,
    S: TelemetrySource,
    K: ByteSink,
{
    pub fn new(config: &SessionConfig, actuation: A, telemetry: S, sink: K) -> Self {
        Self {
            receiver: FrameReceiver::new(&config.receive_frame_config()),
            transmitter: FrameTransmitter::new(&config.transmit_frame_config()),
            dispatcher: FrameDispatcher::new(config, actuation, telemetry),
            outbound: VecDeque::new(),
            timers: TimerBank::new(),
            sink,
        }
    }

    /// Handle one event.
    pub fn handle(&mut self, event: LinkEvent) -> Result<()> {
        trace!(?event, "link event");
        match event {
            LinkEvent::ByteReceived(byte) => {
                if let Some(data) = self.receiver.on_byte(byte, &mut self.timers) {
                    if let Some(reply) = self.dispatcher.on_frame_received(&data, &mut self.timers)
                    {
                        self.enqueue(reply)?;
                    }
                }
            }
            LinkEvent::ByteSent => {
                let progress = self
                    .transmitter
                    .on_byte_sent(&mut self.sink, &mut self.timers)?;
                if progress == TransmitProgress::Complete {
                    self.pump()?;
                }
            }
            LinkEvent::TimerExpired(TimerId::ReceiveWatchdog) => {
                self.receiver.on_watchdog_expired();
            }
            LinkEvent::TimerExpired(TimerId::TransmitWatchdog) => {
                if self.transmitter.on_watchdog_expired() {
                    self.pump()?;
                }
            }
            LinkEvent::TimerExpired(TimerId::LostLink) => {
                self.dispatcher.on_lost_link(&mut self.timers);
            }
            LinkEvent::KeyPressed(key) => {
                if let Some(reply) = self.dispatcher.on_key_pressed(key, &mut self.timers) {
                    self.enqueue(reply)?;
                }
            }
        }
        Ok(())
    }

    /// Move the clock to `now_ms` and handle every timer that expired.
    pub fn advance_clock(&mut self, now_ms: u64) -> Result<()> {
        for id in self.timers.advance_to(now_ms) {
            self.handle(LinkEvent::TimerExpired(id))?;
        }
        Ok(())
    }

    /// Earliest armed timer deadline on the node clock.
    pub fn next_deadline(&self) -> Option<u64> {
        self.timers.next_deadline()
    }

    pub fn now(&self) -> u64 {
        self.timers.now()
    }

    pub fn phase(&self) -> SessionPhase {
        self.dispatcher.session().phase()
    }

    pub fn session(&self) -> &SessionController<A> {
        self.dispatcher.session()
    }

    pub fn dispatcher(&self) -> &FrameDispatcher<A, S> {
        &self.dispatcher
    }

    pub fn receiver(&self) -> &FrameReceiver {
        &self.receiver
    }

    pub fn transmitter(&self) -> &FrameTransmitter {
        &self.transmitter
    }

    pub fn timers(&self) -> &TimerBank {
        &self.timers
    }

    /// Frames waiting for the transmitter.
    pub fn pending_frames(&self) -> usize {
        self.outbound.len()
    }

    pub fn sink(&self) -> &K {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut K {
        &mut self.sink
    }

    fn enqueue(&mut self, frame: Bytes) -> Result<()> {
        self.outbound.push_back(frame);
        if !self.transmitter.is_idle() {
            debug!(queued = self.outbound.len(), "transmitter busy; reply queued");
        }
        self.pump()
    }

    fn pump(&mut self) -> Result<()> {
        if !self.transmitter.is_idle() {
            return Ok(());
        }
        if let Some(frame) = self.outbound.pop_front() {
            self.transmitter
                .start(frame, &mut self.sink, &mut self.timers)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use doglink_frame::{decode_frame, encode, Address, ApiKind, PacketType};

    use super::*;
    use crate::actuation::{StaticTelemetry, TracingActuator};

    const FARMER: Address = Address::new(0x21, 0x8B);

    fn node() -> Node<TracingActuator, StaticTelemetry, Vec<u8>> {
        let config = SessionConfig {
            own_tag: 3,
            ..SessionConfig::default()
        };
        Node::new(
            &config,
            TracingActuator::new(),
            StaticTelemetry([0; 12]),
            Vec::new(),
        )
    }

    fn receive(node: &mut Node<TracingActuator, StaticTelemetry, Vec<u8>>, wire: &[u8]) {
        for &byte in wire {
            node.handle(LinkEvent::ByteReceived(byte)).unwrap();
        }
    }

    fn drain(node: &mut Node<TracingActuator, StaticTelemetry, Vec<u8>>) {
        while !node.transmitter().is_idle() {
            node.handle(LinkEvent::ByteSent).unwrap();
        }
    }

    #[test]
    fn pair_request_transmits_ack() {
        let mut n = node();
        receive(
            &mut n,
            &encode(ApiKind::Command, FARMER, PacketType::PairRequest, &[3]).unwrap(),
        );
        drain(&mut n);

        assert_eq!(n.phase(), SessionPhase::PairedAwaitingKey);
        assert_eq!(
            n.sink().as_slice(),
            &[0x7E, 0x00, 0x06, 0x01, 0x01, 0x21, 0x8B, 0x00, 0x02, 0x4F]
        );
        assert!(n.transmitter().is_last_byte_sent());
    }

    #[test]
    fn reply_queued_while_transmitter_busy() {
        let mut n = node();
        receive(
            &mut n,
            &encode(ApiKind::Command, FARMER, PacketType::PairRequest, &[3]).unwrap(),
        );
        // Ack is mid-flight: only the start marker has gone out.
        assert_eq!(n.sink().len(), 1);

        n.handle(LinkEvent::KeyPressed('d')).unwrap();
        assert_eq!(n.pending_frames(), 1);

        drain(&mut n);
        assert_eq!(n.pending_frames(), 0);

        let wire = n.sink().clone();
        assert_eq!(wire.len(), 20);
        assert_eq!(decode_frame(&wire[..10]).unwrap(), decode_frame(&wire[10..]).unwrap());
    }

    #[test]
    fn lost_link_timer_unpairs() {
        let mut n = node();
        receive(
            &mut n,
            &encode(ApiKind::Command, FARMER, PacketType::PairRequest, &[3]).unwrap(),
        );
        drain(&mut n);

        n.advance_clock(2999).unwrap();
        assert_eq!(n.phase(), SessionPhase::PairedAwaitingKey);
        n.advance_clock(3000).unwrap();
        assert_eq!(n.phase(), SessionPhase::WaitingToPair);
        assert!(!n.session().actuation().is_active());
        assert_eq!(n.next_deadline(), None);
    }

    #[test]
    fn stalled_transmit_is_abandoned_and_queue_moves_on() {
        let mut n = node();
        receive(
            &mut n,
            &encode(ApiKind::Command, FARMER, PacketType::PairRequest, &[3]).unwrap(),
        );
        n.handle(LinkEvent::KeyPressed('D')).unwrap();

        n.advance_clock(10).unwrap();
        // First ack abandoned after one byte; the queued ack started.
        assert_eq!(n.pending_frames(), 0);
        assert!(!n.transmitter().is_idle());
        assert_eq!(n.sink().as_slice(), &[0x7E, 0x7E]);
    }

    #[test]
    fn partial_frame_dropped_after_gap() {
        let mut n = node();
        let wire = encode(ApiKind::Command, FARMER, PacketType::PairRequest, &[3]).unwrap();

        receive(&mut n, &wire[..4]);
        n.advance_clock(10).unwrap();
        receive(&mut n, &wire[4..]);
        assert_eq!(n.phase(), SessionPhase::WaitingToPair);

        receive(&mut n, &wire);
        assert_eq!(n.phase(), SessionPhase::PairedAwaitingKey);
    }
}
