//! Async peer runner: the inbox loop and effect execution.

use std::sync::Arc;

use error_stack::Report;
use futures::StreamExt;
use futures::channel::mpsc;
use tokio::sync::watch;
use tracing::{debug, info, instrument};

use crate::core::{Effect, PeerCore};
use crate::error::ProtocolError;
use crate::message::{Message, PeerId};
use crate::transport::Transport;

/// Final state a peer reports when its loop exits.
#[derive(Clone, Copy, Debug)]
pub struct PeerReport {
    pub id: PeerId,
    /// Clock value at exit.
    pub time: u64,
    /// Entries left in the request queue at exit.
    pub queue_len: usize,
}

/// One peer process: the pure core plus its inbox and transport handle.
///
/// The inbox sender lives in the transport and may be fed from any task;
/// everything else is owned by this loop, so no further locking is needed.
pub struct Peer {
    core: PeerCore,
    inbox: mpsc::UnboundedReceiver<Message>,
    transport: Arc<Transport>,
    stop: watch::Receiver<bool>,
}

impl Peer {
    pub(crate) fn new(
        core: PeerCore,
        inbox: mpsc::UnboundedReceiver<Message>,
        transport: Arc<Transport>,
        stop: watch::Receiver<bool>,
    ) -> Self {
        Self {
            core,
            inbox,
            transport,
            stop,
        }
    }

    /// The peer's processing loop.
    ///
    /// Each turn handles one inbox message and then fires a deferred run
    /// token, if any. Peer 0 seeds the simulation with the first REQUEST and
    /// the first token before entering the loop. The loop exits once the
    /// transport broadcasts the stop signal.
    ///
    /// # Errors
    ///
    /// Returns the first protocol violation observed by this peer; the
    /// caller is expected to abort the whole run.
    #[instrument(skip_all, name = "peer", fields(id = %self.core.id()))]
    pub async fn run(mut self) -> Result<PeerReport, Report<ProtocolError>> {
        debug!("peer started");

        if self.core.id() == PeerId(0) {
            let request = self.core.initiate()?;
            self.send(request)?;
            let token = self.core.forward_token();
            self.send(token)?;
        }

        loop {
            if *self.stop.borrow() {
                break;
            }

            tokio::select! {
                changed = self.stop.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    // Re-check the flag before firing anything new.
                    continue;
                }
                message = self.inbox.next() => {
                    let Some(message) = message else { break };
                    self.process(message)?;
                }
            }

            if let Some((request, token)) = self.core.fire() {
                self.send(request)?;
                self.send(token)?;
            }
        }

        let report = PeerReport {
            id: self.core.id(),
            time: self.core.now(),
            queue_len: self.core.queue_len(),
        };
        info!(
            "Time {}: Process {} stopped! Size of process queue at the end: {}",
            report.time, report.id, report.queue_len
        );
        Ok(report)
    }

    fn process(&mut self, message: Message) -> Result<(), Report<ProtocolError>> {
        let kind = message.kind;
        let handled = self.core.handle(&message)?;
        info!(
            "Time {}: Process {} received {}",
            handled.time,
            self.core.id(),
            kind
        );

        for effect in handled.effects {
            match effect {
                Effect::Send(reply) => self.send(reply)?,
                Effect::Enter => {
                    self.transport.critical_section(self.core.id())?;
                    let release = self.core.leave()?;
                    self.send(release)?;
                }
            }
        }
        Ok(())
    }

    fn send(&self, message: Message) -> Result<(), Report<ProtocolError>> {
        self.transport.send(message)?;
        info!(
            "Time {}: Process {} send {}",
            message.timestamp,
            self.core.id(),
            message.kind
        );
        Ok(())
    }
}
