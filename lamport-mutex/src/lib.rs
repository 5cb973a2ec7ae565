//! # Summary
//!
//! This crate implements Lamport's distributed mutual-exclusion algorithm as
//! an in-process simulation. A fixed set of peers, each owning its own
//! logical clock, coordinates exclusive access to a shared critical section
//! using only asynchronous REQUEST, ACKNOWLEDGE and RELEASE messages. There
//! is no central coordinator and no physical clock.
//!
//! # Architecture
//!
//! - [`core`]: pure state machines, the logical clock, the pending-request
//!   queue and the peer protocol logic. No I/O, no async, no locks; the same
//!   code is driven by the async runtime, the unit tests and the model
//!   checker.
//! - [`Peer`]: the async runner. One tokio task per peer pulls messages off
//!   an unbounded inbox channel, feeds them through the core and performs the
//!   returned effects.
//! - [`Transport`]: a trivial delivery layer. It fans broadcasts out into
//!   per-receiver copies, records every delivered copy in an audit log,
//!   terminates the run once a timestamp crosses the configured horizon, and
//!   hosts the critical-section hook whose exclusion the protocol derives.
//! - [`Simulation`]: lifecycle. Builds the peers and the transport, runs all
//!   peer loops to completion and collects a [`SimulationReport`].
//!
//! # Quick Start
//!
//! ```ignore
//! use lamport_mutex::{Simulation, SimulationConfig};
//!
//! let config = SimulationConfig::new(4, 100)?;
//! let report = Simulation::new(&config).run().await?;
//!
//! for operation in &report.operations {
//!     println!("{operation}");
//! }
//! ```
//!
//! The report carries the audit log sorted by extended Lamport time, the
//! critical-section operations in execution order, and the final state of
//! every peer.

#![warn(clippy::pedantic)]

mod config;
pub mod core;
mod error;
mod message;
mod peer;
mod simulation;
mod transport;

pub use config::SimulationConfig;
pub use error::{ConfigError, ProtocolError};
pub use message::{Message, MessageKind, PeerId, Recipient};
pub use peer::{Peer, PeerReport};
pub use simulation::{Simulation, SimulationReport};
pub use transport::{Delivery, Operation, Transport};
