//! Pure state machine core for the mutual-exclusion protocol - no I/O, no
//! async, no synchronization.
//!
//! This module contains the state transition logic that is shared between:
//! - The async runtime implementation
//! - The deterministic protocol scenarios
//! - The Stateright model checker tests
//!
//! By extracting this logic, the checker and the unit tests exercise the
//! exact same transitions as the production code.
//!
//! # Modules
//!
//! - [`clock`]: the scalar Lamport clock
//! - [`queue`]: the pending-request queue and its ordering key
//! - [`peer`]: the per-peer protocol state machine (`PeerCore`)

pub mod clock;
pub mod peer;
pub mod queue;

pub use clock::LamportClock;
pub use peer::{Effect, Handled, PeerCore, Phase};
pub use queue::{EventKey, RequestQueue};
