//! In-process message transport: fan-out, the audit log, the time-horizon
//! gate and the critical-section hook.
//!
//! The transport is intentionally a trivial delivery layer. It never
//! schedules and never reorders a single broadcast's copies; the algorithm's
//! correctness lives in the peers.

use core::fmt;
use std::sync::Mutex;
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};

use error_stack::Report;
use futures::channel::mpsc;
use tokio::sync::watch;
use tracing::debug;

use crate::core::EventKey;
use crate::error::ProtocolError;
use crate::message::{Message, MessageKind, PeerId, Recipient};

/// The shared integer the critical-section hook mutates. Any value works;
/// the operations log records every change it undergoes.
const INITIAL_CRITICAL_INT: i64 = 10;

/// One delivered message copy, as recorded in the audit log.
///
/// Broadcasts appear once per receiver; the receiver field names the copy's
/// destination even though the message itself stayed broadcast-addressed.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Delivery {
    pub kind: MessageKind,
    pub sender: PeerId,
    pub receiver: PeerId,
    pub timestamp: u64,
}

impl Delivery {
    /// Audit-log ordering key: extended Lamport time of the send event.
    #[must_use]
    pub fn key(&self) -> EventKey {
        EventKey {
            timestamp: self.timestamp,
            peer: self.sender,
        }
    }
}

impl fmt::Display for Delivery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{},{},{},{}",
            self.kind, self.sender, self.receiver, self.timestamp
        )
    }
}

/// One critical-section entry.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Operation {
    pub index: usize,
    pub peer: PeerId,
    pub from: i64,
    pub to: i64,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Operation {}: Process {} changed critical int from {} to {}",
            self.index, self.peer, self.from, self.to
        )
    }
}

/// Fan-out dispatcher and simulation lifeline.
pub struct Transport {
    inboxes: Vec<mpsc::UnboundedSender<Message>>,
    duration: u64,
    stop: watch::Sender<bool>,
    audit: Mutex<Vec<Delivery>>,
    critical_int: AtomicI64,
    /// Peers currently inside the critical-section hook. The hook takes no
    /// lock; exclusion is derived from the protocol, and this counter is
    /// how a violation gets caught.
    occupancy: AtomicUsize,
    operations: Mutex<Vec<Operation>>,
}

impl Transport {
    pub(crate) fn new(
        inboxes: Vec<mpsc::UnboundedSender<Message>>,
        duration: u64,
        stop: watch::Sender<bool>,
    ) -> Self {
        Self {
            inboxes,
            duration,
            stop,
            audit: Mutex::new(Vec::new()),
            critical_int: AtomicI64::new(INITIAL_CRITICAL_INT),
            occupancy: AtomicUsize::new(0),
            operations: Mutex::new(Vec::new()),
        }
    }

    /// Total number of peers. Immutable for the simulation's lifetime.
    #[must_use]
    pub fn process_count(&self) -> usize {
        self.inboxes.len()
    }

    /// Deliver a message to its recipients.
    ///
    /// A timestamp at or past the horizon stops every peer and delivers
    /// nothing; this is how the simulation terminates. Unicasts go to the
    /// named receiver; broadcasts are copied to every peer but the sender.
    /// Each delivered copy is appended to the audit log.
    ///
    /// # Errors
    ///
    /// A sender or receiver outside the registered peer range is a protocol
    /// violation.
    pub fn send(&self, message: Message) -> Result<(), Report<ProtocolError>> {
        if message.timestamp >= self.duration {
            debug!(
                timestamp = message.timestamp,
                duration = self.duration,
                "time horizon reached, stopping all peers"
            );
            self.stop.send_replace(true);
            return Ok(());
        }

        if message.sender.0 >= self.inboxes.len() {
            return Err(Report::new(ProtocolError::UnknownSender(message.sender)));
        }

        match message.recipient {
            Recipient::Peer(receiver) => {
                if receiver.0 >= self.inboxes.len() {
                    return Err(Report::new(ProtocolError::UnknownReceiver(receiver)));
                }
                self.deliver(message, receiver);
            }
            Recipient::Broadcast => {
                for id in (0..self.inboxes.len()).map(PeerId) {
                    if id != message.sender {
                        self.deliver(message, id);
                    }
                }
            }
        }
        Ok(())
    }

    fn deliver(&self, message: Message, receiver: PeerId) {
        // A peer that already observed the stop signal has dropped its
        // inbox; its copy is neither delivered nor recorded.
        if self.inboxes[receiver.0].unbounded_send(message).is_ok() {
            self.audit.lock().unwrap().push(Delivery {
                kind: message.kind,
                sender: message.sender,
                receiver,
                timestamp: message.timestamp,
            });
        }
    }

    /// The hook peers call to do work under mutual exclusion: even-id peers
    /// increment the shared integer, odd-id peers decrement it, and every
    /// entry is recorded in the operations log.
    ///
    /// # Errors
    ///
    /// A second peer arriving while the hook is occupied falsifies the
    /// protocol's exclusion guarantee and aborts the run.
    pub fn critical_section(&self, peer: PeerId) -> Result<(), Report<ProtocolError>> {
        let occupants = self.occupancy.fetch_add(1, Ordering::SeqCst);
        if occupants != 0 {
            self.occupancy.fetch_sub(1, Ordering::SeqCst);
            self.stop.send_replace(true);
            return Err(Report::new(ProtocolError::ExclusionViolated(peer))
                .attach_printable(format!("{occupants} peer(s) already inside")));
        }

        let from = self.critical_int.load(Ordering::SeqCst);
        let to = if peer.0 % 2 == 0 { from + 1 } else { from - 1 };
        self.critical_int.store(to, Ordering::SeqCst);

        let mut operations = self.operations.lock().unwrap();
        let index = operations.len();
        operations.push(Operation {
            index,
            peer,
            from,
            to,
        });
        drop(operations);

        self.occupancy.fetch_sub(1, Ordering::SeqCst);
        Ok(())
    }

    /// Stop every peer loop at its next check.
    pub(crate) fn stop_all(&self) {
        self.stop.send_replace(true);
    }

    pub(crate) fn deliveries(&self) -> Vec<Delivery> {
        self.audit.lock().unwrap().clone()
    }

    pub(crate) fn operations(&self) -> Vec<Operation> {
        self.operations.lock().unwrap().clone()
    }
}
