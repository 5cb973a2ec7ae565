//! Error types carried in `error_stack` reports.

use core::fmt;

use crate::message::PeerId;

/// A violated invariant of the mutual-exclusion protocol.
///
/// Any of these falsifies the correctness premise of the run (they indicate
/// a broken peer, not an environmental fault), so they are fatal to the
/// simulation rather than recoverable.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ProtocolError {
    /// Message sender outside the registered peer range.
    UnknownSender(PeerId),
    /// Unicast receiver outside the registered peer range.
    UnknownReceiver(PeerId),
    /// A peer observed a second REQUEST from a peer that is already queued.
    DuplicateRequest(PeerId),
    /// RELEASE from a peer that does not own the queue head.
    ReleaseNotAtHead(PeerId),
    /// A request-cycle transition attempted in the wrong phase.
    WrongPhase {
        peer: PeerId,
        operation: &'static str,
    },
    /// A peer entered the critical section while it was occupied.
    ExclusionViolated(PeerId),
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProtocolError::UnknownSender(peer) => {
                write!(f, "message sender {peer} is not a registered peer")
            }
            ProtocolError::UnknownReceiver(peer) => {
                write!(f, "message receiver {peer} is not a registered peer")
            }
            ProtocolError::DuplicateRequest(peer) => {
                write!(f, "process {peer} already has a queued request")
            }
            ProtocolError::ReleaseNotAtHead(peer) => {
                write!(f, "RELEASE from process {peer}, which is not first in queue")
            }
            ProtocolError::WrongPhase { peer, operation } => {
                write!(f, "process {peer} cannot {operation} in its current phase")
            }
            ProtocolError::ExclusionViolated(peer) => {
                write!(
                    f,
                    "process {peer} entered the critical section while it was occupied"
                )
            }
        }
    }
}

impl core::error::Error for ProtocolError {}

/// Driver input rejected before any peer starts.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ConfigError {
    /// The algorithm needs at least two peers to coordinate.
    TooFewProcesses(usize),
    /// A zero-tick horizon would stop the run before the first send.
    ZeroDuration,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::TooFewProcesses(count) => {
                write!(f, "at least two processes are required, got {count}")
            }
            ConfigError::ZeroDuration => f.write_str("duration must be at least one tick"),
        }
    }
}

impl core::error::Error for ConfigError {}
