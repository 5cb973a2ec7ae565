//! Simulation lifecycle: build the peers, run them to the time horizon,
//! collect the report.

use std::sync::Arc;

use error_stack::Report;
use futures::channel::mpsc;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{debug, instrument};

use crate::config::SimulationConfig;
use crate::core::PeerCore;
use crate::error::ProtocolError;
use crate::message::PeerId;
use crate::peer::{Peer, PeerReport};
use crate::transport::{Delivery, Operation, Transport};

/// Everything a finished run leaves behind.
#[derive(Clone, Debug)]
pub struct SimulationReport {
    /// Every delivered message copy, in extended Lamport order.
    pub deliveries: Vec<Delivery>,
    /// Critical-section operations, in execution order.
    pub operations: Vec<Operation>,
    /// Per-peer final state, ordered by peer id.
    pub peers: Vec<PeerReport>,
}

/// A configured set of peers wired to a shared transport, ready to run.
pub struct Simulation {
    transport: Arc<Transport>,
    peers: Vec<Peer>,
}

impl Simulation {
    #[must_use]
    pub fn new(config: &SimulationConfig) -> Self {
        let (stop_tx, stop_rx) = watch::channel(false);
        let (senders, receivers): (Vec<_>, Vec<_>) = (0..config.process_count)
            .map(|_| mpsc::unbounded())
            .unzip();

        let transport = Arc::new(Transport::new(senders, config.duration, stop_tx));
        let peers = receivers
            .into_iter()
            .enumerate()
            .map(|(id, inbox)| {
                Peer::new(
                    PeerCore::new(PeerId(id), config.process_count),
                    inbox,
                    Arc::clone(&transport),
                    stop_rx.clone(),
                )
            })
            .collect();

        Self { transport, peers }
    }

    /// Run every peer loop concurrently and wait for all of them to exit.
    ///
    /// # Errors
    ///
    /// Propagates the first protocol violation any peer observed; the
    /// remaining peers are stopped before this returns.
    ///
    /// # Panics
    ///
    /// Panics if a peer task itself panics, which the protocol code never
    /// does.
    #[instrument(skip_all, name = "simulation", fields(peers = self.transport.process_count()))]
    pub async fn run(self) -> Result<SimulationReport, Report<ProtocolError>> {
        let Self { transport, peers } = self;

        let mut tasks = JoinSet::new();
        for peer in peers {
            tasks.spawn(peer.run());
        }

        let mut reports = Vec::with_capacity(transport.process_count());
        let mut failure = None;
        while let Some(joined) = tasks.join_next().await {
            match joined.expect("peer task panicked") {
                Ok(report) => reports.push(report),
                Err(error) => {
                    // One broken peer invalidates the whole run; wind the
                    // others down and keep the first failure.
                    transport.stop_all();
                    failure.get_or_insert(error);
                }
            }
        }
        if let Some(error) = failure {
            return Err(error);
        }

        debug!("all peer loops exited");
        reports.sort_by_key(|report| report.id);

        let mut deliveries = transport.deliveries();
        deliveries.sort_by_key(Delivery::key);

        Ok(SimulationReport {
            deliveries,
            operations: transport.operations(),
            peers: reports,
        })
    }
}
