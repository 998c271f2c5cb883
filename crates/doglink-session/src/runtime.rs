//! Blocking host loop for a [`Node`] over a real link.
//!
//! A reader thread turns incoming bytes into [`LinkEvent::ByteReceived`], the
//! sink signals [`LinkEvent::ByteSent`] after each write, and the loop itself
//! plays the timer interrupt by advancing the node clock from a monotonic
//! `Instant`. All protocol state lives on the loop thread.

use std::io::{ErrorKind, Read};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use doglink_transport::{
    event_queue, EventQueue, EventSender, LinkEvent, LinkStream, StreamSink,
    DEFAULT_QUEUE_CAPACITY,
};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::actuation::{Actuation, TelemetrySource};
use crate::config::SessionConfig;
use crate::error::Result;
use crate::node::Node;
use crate::session::SessionPhase;

/// Longest the loop sleeps without checking for shutdown.
const IDLE_POLL_MS: u64 = 50;

const READ_CHUNK_SIZE: usize = 64;

/// Why the loop returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum StopReason {
    Shutdown,
    LinkClosed,
}

/// Final state of a node run.
#[derive(Debug, Clone, Serialize)]
pub struct NodeReport {
    pub stopped_by: StopReason,
    pub phase: SessionPhase,
    pub peer: Option<String>,
    pub events_handled: u64,
    pub uptime_ms: u64,
}

/// Event queue and shutdown flag for one node run.
pub struct NodeRuntime {
    events: EventSender,
    queue: EventQueue,
    shutdown: Arc<AtomicBool>,
}

impl Default for NodeRuntime {
    fn default() -> Self {
        Self::new(DEFAULT_QUEUE_CAPACITY)
    }
}

impl NodeRuntime {
    pub fn new(queue_capacity: usize) -> Self {
        let (events, queue) = event_queue(queue_capacity);
        Self {
            events,
            queue,
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Use an externally owned shutdown flag (e.g. one set by a signal handler).
    pub fn with_shutdown(mut self, shutdown: Arc<AtomicBool>) -> Self {
        self.shutdown = shutdown;
        self
    }

    /// Sender for additional signal sources such as operator keys.
    pub fn events(&self) -> EventSender {
        self.events.clone()
    }

    pub fn shutdown_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.shutdown)
    }

    /// Run a node over `stream` until shutdown or until the peer closes the link.
    pub fn run<A, S>(
        self,
        stream: LinkStream,
        config: &SessionConfig,
        actuation: A,
        telemetry: S,
    ) -> Result<NodeReport>
    where
        A: Actuation,
        S: TelemetrySource,
    {
        let Self {
            events,
            queue,
            shutdown,
        } = self;

        let mut reader_stream = stream.try_clone()?;
        reader_stream.set_read_timeout(Some(Duration::from_millis(IDLE_POLL_MS)))?;
        let reader_stop = Arc::new(AtomicBool::new(false));
        let reader = spawn_byte_reader(reader_stream, events.clone(), Arc::clone(&reader_stop))?;

        let sink = StreamSink::new(stream, events);
        let mut node = Node::new(config, actuation, telemetry, sink);
        let started = Instant::now();
        let mut handled = 0u64;

        info!(own_tag = config.own_tag, "node running");

        let stopped_by = loop {
            if shutdown.load(Ordering::SeqCst) {
                break StopReason::Shutdown;
            }

            let now = elapsed_ms(started);
            node.advance_clock(now)?;
            let wait = node
                .next_deadline()
                .map_or(IDLE_POLL_MS, |deadline| deadline.saturating_sub(now))
                .clamp(1, IDLE_POLL_MS);

            match queue.next_timeout(Duration::from_millis(wait))? {
                Some(event) => {
                    node.advance_clock(elapsed_ms(started))?;
                    if let Err(err) = node.handle(event) {
                        if reader.is_finished() {
                            debug!(%err, "write failed after link closed");
                            break StopReason::LinkClosed;
                        }
                        return Err(err);
                    }
                    handled += 1;
                }
                None if reader.is_finished() => break StopReason::LinkClosed,
                None => {}
            }
        };

        // The reader wakes within IDLE_POLL_MS; a blocked post fails once the queue is gone.
        reader_stop.store(true, Ordering::SeqCst);
        drop(queue);
        if reader.join().is_err() {
            warn!("link reader thread panicked");
        }

        let report = NodeReport {
            stopped_by,
            phase: node.phase(),
            peer: node.session().peer().map(|peer| peer.to_string()),
            events_handled: handled,
            uptime_ms: elapsed_ms(started),
        };
        info!(stopped_by = ?report.stopped_by, phase = ?report.phase, "node stopped");
        Ok(report)
    }
}

/// Run a node with a fresh event queue, stopping when `shutdown` is set.
pub fn run_node<A, S>(
    stream: LinkStream,
    config: &SessionConfig,
    actuation: A,
    telemetry: S,
    shutdown: Arc<AtomicBool>,
) -> Result<NodeReport>
where
    A: Actuation,
    S: TelemetrySource,
{
    NodeRuntime::default()
        .with_shutdown(shutdown)
        .run(stream, config, actuation, telemetry)
}

/// Post each non-whitespace byte of `input` as an operator key press.
pub fn spawn_key_reader<R>(mut input: R, events: EventSender) -> Result<JoinHandle<()>>
where
    R: Read + Send + 'static,
{
    let handle = thread::Builder::new()
        .name("doglink-keys".into())
        .spawn(move || {
            let mut buf = [0u8; 16];
            loop {
                let n = match input.read(&mut buf) {
                    Ok(0) => return,
                    Ok(n) => n,
                    Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                    Err(err) => {
                        warn!(%err, "key input failed");
                        return;
                    }
                };
                for key in buf[..n]
                    .iter()
                    .filter(|b| b.is_ascii_graphic())
                    .map(|&b| b as char)
                {
                    if events.post(LinkEvent::KeyPressed(key)).is_err() {
                        return;
                    }
                }
            }
        })?;
    Ok(handle)
}

fn spawn_byte_reader(
    mut stream: LinkStream,
    events: EventSender,
    stop: Arc<AtomicBool>,
) -> Result<JoinHandle<()>> {
    let handle = thread::Builder::new()
        .name("doglink-rx".into())
        .spawn(move || {
            let mut buf = [0u8; READ_CHUNK_SIZE];
            while !stop.load(Ordering::SeqCst) {
                let n = match stream.read(&mut buf) {
                    Ok(0) => {
                        debug!("link closed by peer");
                        return;
                    }
                    Ok(n) => n,
                    Err(err)
                        if matches!(
                            err.kind(),
                            ErrorKind::Interrupted | ErrorKind::WouldBlock | ErrorKind::TimedOut
                        ) =>
                    {
                        continue
                    }
                    Err(err) => {
                        warn!(%err, "link read failed");
                        return;
                    }
                };
                for &byte in &buf[..n] {
                    if events.post(LinkEvent::ByteReceived(byte)).is_err() {
                        return;
                    }
                }
            }
        })?;
    Ok(handle)
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}
