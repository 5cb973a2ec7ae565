//! Protocol messages exchanged between peers.

use core::fmt;

/// Dense peer identifier in `0..N`.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct PeerId(pub usize);

impl PeerId {
    /// The ring successor, used to pass the run token along.
    #[must_use]
    pub fn next(self, peers: usize) -> Self {
        Self((self.0 + 1) % peers)
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The four message kinds of the protocol.
///
/// `Request` and `Release` are broadcast; `Acknowledge` is the unicast reply
/// to a request. `RunCommand` is not part of the algorithm: it is the
/// simulation's workload token, passed around the peer ring to trigger the
/// next request.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum MessageKind {
    Request,
    Acknowledge,
    Release,
    RunCommand,
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageKind::Request => f.write_str("REQUEST"),
            MessageKind::Acknowledge => f.write_str("ACKNOWLEDGE"),
            MessageKind::Release => f.write_str("RELEASE"),
            MessageKind::RunCommand => f.write_str("RUN_COMMAND"),
        }
    }
}

/// Where a message is addressed.
///
/// The transport materialises a `Broadcast` into one copy per peer other
/// than the sender; the message itself is never rewritten.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum Recipient {
    Broadcast,
    Peer(PeerId),
}

/// An immutable protocol message.
///
/// The constructors enforce the kind-specific addressing rules, so a unicast
/// REQUEST or a broadcast ACKNOWLEDGE cannot be expressed. Range checks
/// against the peer count happen in the transport, the only place that knows
/// it.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct Message {
    pub kind: MessageKind,
    pub sender: PeerId,
    pub recipient: Recipient,
    /// The sender's clock value at send time.
    pub timestamp: u64,
}

impl Message {
    #[must_use]
    pub fn request(sender: PeerId, timestamp: u64) -> Self {
        Self {
            kind: MessageKind::Request,
            sender,
            recipient: Recipient::Broadcast,
            timestamp,
        }
    }

    #[must_use]
    pub fn release(sender: PeerId, timestamp: u64) -> Self {
        Self {
            kind: MessageKind::Release,
            sender,
            recipient: Recipient::Broadcast,
            timestamp,
        }
    }

    #[must_use]
    pub fn acknowledge(sender: PeerId, receiver: PeerId, timestamp: u64) -> Self {
        Self {
            kind: MessageKind::Acknowledge,
            sender,
            recipient: Recipient::Peer(receiver),
            timestamp,
        }
    }

    #[must_use]
    pub fn run_command(sender: PeerId, receiver: PeerId, timestamp: u64) -> Self {
        Self {
            kind: MessageKind::RunCommand,
            sender,
            recipient: Recipient::Peer(receiver),
            timestamp,
        }
    }
}
