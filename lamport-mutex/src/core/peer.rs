//! Pure peer state machine - no I/O, no async, no synchronization.
//!
//! [`PeerCore`] holds everything one peer knows: its clock, its view of the
//! pending-request queue, and the acknowledgement count for its own
//! outstanding request. Handling a message returns the [`Effect`]s the
//! caller must perform, in order; the async runner, the deterministic
//! scenarios and the model checker all drive the same transitions.

use error_stack::Report;

use crate::core::clock::LamportClock;
use crate::core::queue::{EventKey, RequestQueue};
use crate::error::ProtocolError;
use crate::message::{Message, MessageKind, PeerId};

/// Where a peer is in its request cycle.
///
/// `Granted` is observable: it spans from the moment the permission
/// predicate holds until [`PeerCore::leave`] broadcasts the RELEASE. While
/// `Requested` or `Granted`, the peer's own id appears exactly once in its
/// queue.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Phase {
    Idle,
    Requested,
    Granted,
}

/// Side effect the caller must perform.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Effect {
    /// Hand the message to the transport.
    Send(Message),
    /// Run the critical-section hook, then call [`PeerCore::leave`] and send
    /// the RELEASE it returns.
    Enter,
}

/// Outcome of handling one message.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Handled {
    /// Clock value right after the receive tick.
    pub time: u64,
    /// Effects to perform, in order.
    pub effects: Vec<Effect>,
}

/// The per-peer protocol state machine.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct PeerCore {
    id: PeerId,
    peers: usize,
    clock: LamportClock,
    queue: RequestQueue,
    /// ACKNOWLEDGEs received since our own most recent REQUEST.
    permissions: usize,
    phase: Phase,
    /// A RUN_COMMAND arrived; initiate a request at the next idle turn.
    armed: bool,
}

impl PeerCore {
    #[must_use]
    pub fn new(id: PeerId, peers: usize) -> Self {
        Self {
            id,
            peers,
            clock: LamportClock::new(),
            queue: RequestQueue::new(),
            permissions: 0,
            phase: Phase::Idle,
            armed: false,
        }
    }

    #[must_use]
    pub fn id(&self) -> PeerId {
        self.id
    }

    #[must_use]
    pub fn now(&self) -> u64 {
        self.clock.now()
    }

    #[must_use]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    #[must_use]
    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    #[must_use]
    pub fn is_armed(&self) -> bool {
        self.armed
    }

    /// Handle one incoming message: merge the clock, tick for the receive
    /// event, then dispatch on the kind.
    ///
    /// # Errors
    ///
    /// A REQUEST from a peer that is already queued, or a RELEASE from a
    /// peer that does not own the queue head, violates the protocol and is
    /// fatal to the run.
    pub fn handle(&mut self, message: &Message) -> Result<Handled, Report<ProtocolError>> {
        self.clock.observe(message.timestamp);
        let time = self.clock.tick();

        let effects = match message.kind {
            MessageKind::RunCommand => {
                self.armed = true;
                Vec::new()
            }
            MessageKind::Request => {
                let entry = EventKey {
                    timestamp: message.timestamp,
                    peer: message.sender,
                };
                if !self.queue.insert(entry) {
                    return Err(Report::new(ProtocolError::DuplicateRequest(message.sender))
                        .attach_printable(format!(
                            "request at time {} while an earlier one is still queued",
                            message.timestamp
                        )));
                }
                // Reply with the clock as of this receive event.
                vec![Effect::Send(Message::acknowledge(
                    self.id,
                    message.sender,
                    self.clock.now(),
                ))]
            }
            MessageKind::Acknowledge => {
                self.permissions += 1;
                self.try_grant()
            }
            MessageKind::Release => {
                let head = self.queue.head().ok_or_else(|| {
                    Report::new(ProtocolError::ReleaseNotAtHead(message.sender))
                        .attach_printable("the queue is empty")
                })?;
                if head.peer != message.sender {
                    return Err(Report::new(ProtocolError::ReleaseNotAtHead(message.sender))
                        .attach_printable(format!(
                            "the queue head belongs to process {}",
                            head.peer
                        )));
                }
                self.queue.pop_head();
                if self.queue.head().is_some_and(|next| next.peer == self.id) {
                    self.try_grant()
                } else {
                    Vec::new()
                }
            }
        };

        Ok(Handled { time, effects })
    }

    /// Permission predicate: every other peer has acknowledged our request
    /// and it sits at the head of our queue.
    fn permission_granted(&self) -> bool {
        self.permissions == self.peers - 1
            && self.queue.head().is_some_and(|head| head.peer == self.id)
    }

    fn try_grant(&mut self) -> Vec<Effect> {
        if self.phase == Phase::Requested && self.permission_granted() {
            // The tick for entering the critical section.
            self.clock.tick();
            self.phase = Phase::Granted;
            vec![Effect::Enter]
        } else {
            Vec::new()
        }
    }

    /// Initiate a REQUEST: tick, queue our own entry, return the broadcast.
    ///
    /// # Errors
    ///
    /// Only an idle peer may initiate; a second outstanding request would
    /// put its id in the queue twice.
    pub fn initiate(&mut self) -> Result<Message, Report<ProtocolError>> {
        if self.phase != Phase::Idle {
            return Err(Report::new(ProtocolError::WrongPhase {
                peer: self.id,
                operation: "initiate a request",
            }));
        }
        Ok(self.request())
    }

    fn request(&mut self) -> Message {
        let timestamp = self.clock.tick();
        let inserted = self.queue.insert(EventKey {
            timestamp,
            peer: self.id,
        });
        debug_assert!(inserted, "an idle peer has no queued entry");
        self.phase = Phase::Requested;
        Message::request(self.id, timestamp)
    }

    /// Pass the run token to the ring successor.
    pub fn forward_token(&mut self) -> Message {
        let timestamp = self.clock.tick();
        Message::run_command(self.id, self.id.next(self.peers), timestamp)
    }

    /// Fire a pending RUN_COMMAND: if armed and idle, clear the flag and
    /// return the REQUEST plus the forwarded token.
    ///
    /// A token that arrives while a request is outstanding stays armed until
    /// the peer is idle again, so one peer never holds two queue entries.
    pub fn fire(&mut self) -> Option<(Message, Message)> {
        if !self.armed || self.phase != Phase::Idle {
            return None;
        }
        self.armed = false;
        let request = self.request();
        let token = self.forward_token();
        Some((request, token))
    }

    /// Leave the critical section: reset the acknowledgement count, drop our
    /// own head entry and return the RELEASE broadcast.
    ///
    /// # Errors
    ///
    /// Only the peer currently holding the grant may release.
    pub fn leave(&mut self) -> Result<Message, Report<ProtocolError>> {
        if self.phase != Phase::Granted {
            return Err(Report::new(ProtocolError::WrongPhase {
                peer: self.id,
                operation: "leave the critical section",
            }));
        }
        self.permissions = 0;
        let popped = self.queue.pop_head();
        debug_assert!(
            popped.is_some_and(|entry| entry.peer == self.id),
            "a granted peer owns the queue head"
        );
        let timestamp = self.clock.tick();
        self.phase = Phase::Idle;
        Ok(Message::release(self.id, timestamp))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initiate_queues_own_entry() {
        let mut core = PeerCore::new(PeerId(0), 2);
        let request = core.initiate().expect("fresh peer is idle");
        assert_eq!(request.kind, MessageKind::Request);
        assert_eq!(request.timestamp, 1);
        assert_eq!(core.phase(), Phase::Requested);
        assert_eq!(core.queue_len(), 1);
    }

    #[test]
    fn test_initiate_twice_is_rejected() {
        let mut core = PeerCore::new(PeerId(0), 2);
        core.initiate().expect("fresh peer is idle");
        assert!(core.initiate().is_err());
    }

    #[test]
    fn test_request_is_acknowledged_with_the_receive_time() {
        let mut core = PeerCore::new(PeerId(1), 2);
        let handled = core
            .handle(&Message::request(PeerId(0), 5))
            .expect("first request from peer 0");
        // observe(5) then tick: the receive event lands at 6.
        assert_eq!(handled.time, 6);
        assert_eq!(
            handled.effects,
            vec![Effect::Send(Message::acknowledge(PeerId(1), PeerId(0), 6))]
        );
        assert_eq!(core.queue_len(), 1);
    }

    #[test]
    fn test_handle_leaves_clock_past_the_message() {
        let mut core = PeerCore::new(PeerId(1), 2);
        core.handle(&Message::request(PeerId(0), 17))
            .expect("request handled");
        assert!(core.now() > 17);
    }

    #[test]
    fn test_duplicate_request_is_rejected() {
        let mut core = PeerCore::new(PeerId(1), 3);
        core.handle(&Message::request(PeerId(0), 1))
            .expect("first request");
        let error = core
            .handle(&Message::request(PeerId(0), 4))
            .expect_err("second request from the same peer");
        assert_eq!(
            *error.current_context(),
            ProtocolError::DuplicateRequest(PeerId(0))
        );
    }

    #[test]
    fn test_full_grant_cycle_for_two_peers() {
        let mut core = PeerCore::new(PeerId(0), 2);
        core.initiate().expect("fresh peer is idle");

        let handled = core
            .handle(&Message::acknowledge(PeerId(1), PeerId(0), 2))
            .expect("acknowledge handled");
        assert_eq!(handled.effects, vec![Effect::Enter]);
        assert_eq!(core.phase(), Phase::Granted);

        let release = core.leave().expect("granted peer releases");
        assert_eq!(release.kind, MessageKind::Release);
        assert_eq!(core.phase(), Phase::Idle);
        assert_eq!(core.queue_len(), 0);
    }

    #[test]
    fn test_no_grant_while_another_request_is_ahead() {
        // Peer 1 requested at time 5, but peer 0's request at the same time
        // wins the tie-break, so all acknowledgements in the world must not
        // grant peer 1.
        let mut core = PeerCore::new(PeerId(1), 3);
        for _ in 0..4 {
            core.clock.tick();
        }
        core.initiate().expect("idle");
        assert_eq!(core.now(), 5);
        core.handle(&Message::request(PeerId(0), 5))
            .expect("competing request");

        core.handle(&Message::acknowledge(PeerId(0), PeerId(1), 7))
            .expect("ack");
        let handled = core
            .handle(&Message::acknowledge(PeerId(2), PeerId(1), 7))
            .expect("ack");
        assert!(handled.effects.is_empty());
        assert_eq!(core.phase(), Phase::Requested);
    }

    #[test]
    fn test_release_unblocks_the_next_head() {
        let mut core = PeerCore::new(PeerId(1), 3);
        for _ in 0..4 {
            core.clock.tick();
        }
        core.initiate().expect("idle");
        core.handle(&Message::request(PeerId(0), 5))
            .expect("competing request");
        core.handle(&Message::acknowledge(PeerId(0), PeerId(1), 7))
            .expect("ack");
        core.handle(&Message::acknowledge(PeerId(2), PeerId(1), 7))
            .expect("ack");

        let handled = core
            .handle(&Message::release(PeerId(0), 9))
            .expect("release from the head owner");
        assert_eq!(handled.effects, vec![Effect::Enter]);
        assert_eq!(core.phase(), Phase::Granted);
    }

    #[test]
    fn test_release_from_non_head_is_refused() {
        let mut core = PeerCore::new(PeerId(2), 3);
        core.handle(&Message::request(PeerId(0), 1))
            .expect("request queued");
        let error = core
            .handle(&Message::release(PeerId(1), 3))
            .expect_err("peer 1 does not own the head");
        assert_eq!(
            *error.current_context(),
            ProtocolError::ReleaseNotAtHead(PeerId(1))
        );
        // The head entry must survive the refused release.
        assert_eq!(core.queue_len(), 1);
    }

    #[test]
    fn test_release_on_empty_queue_is_refused() {
        let mut core = PeerCore::new(PeerId(1), 2);
        assert!(core.handle(&Message::release(PeerId(0), 2)).is_err());
    }

    #[test]
    fn test_run_command_arms_but_defers_while_requested() {
        let mut core = PeerCore::new(PeerId(1), 2);
        core.initiate().expect("idle");
        core.handle(&Message::run_command(PeerId(0), PeerId(1), 3))
            .expect("token handled");
        assert!(core.is_armed());
        // Still requested: the token must wait.
        assert!(core.fire().is_none());
        assert!(core.is_armed());

        core.handle(&Message::acknowledge(PeerId(0), PeerId(1), 4))
            .expect("ack");
        core.leave().expect("granted");
        let (request, token) = core.fire().expect("idle again");
        assert_eq!(request.kind, MessageKind::Request);
        assert_eq!(token.kind, MessageKind::RunCommand);
        assert!(!core.is_armed());
    }

    #[test]
    fn test_leave_without_grant_is_rejected() {
        let mut core = PeerCore::new(PeerId(0), 2);
        assert!(core.leave().is_err());
    }
}
