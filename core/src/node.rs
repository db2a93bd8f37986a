//! Mesh node: the cooperative processing loop
//!
//! I/O threads never touch the engine. They hand received packets and bridged
//! frames to the node through an mpsc channel; a single tokio task owns the
//! [`MeshEngine`], processes one input at a time, sends whatever became due
//! and sleeps until the next scheduler deadline.

use crate::config::EngineConfig;
use crate::routing::{
    Action, EngineSummary, IfaceId, LinkAddr, LocalInterface, MeshEngine, RouteTable,
};
use crate::MeshError;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

// ============================================================================
// EXTERNAL COLLABORATORS
// ============================================================================

/// Errors reported by the I/O layer
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("Interface {0} unavailable")]
    InterfaceDown(IfaceId),

    #[error("Send failed: {0}")]
    SendFailed(String),

    #[error("Local delivery failed: {0}")]
    DeliveryFailed(String),
}

/// Link-layer I/O provided by the platform (raw sockets, TAP device)
#[async_trait]
pub trait LinkIo: Send + Sync {
    /// Participating interfaces; ids must be dense starting at 0
    fn local_interfaces(&self) -> Vec<LocalInterface>;

    /// Best-effort send of `payload` to `dest` out of `iface`
    async fn transmit(
        &self,
        iface: IfaceId,
        dest: LinkAddr,
        payload: &[u8],
    ) -> Result<(), TransportError>;

    /// Write a bridged frame to the local virtual interface
    async fn deliver_local(&self, frame: &[u8]) -> Result<(), TransportError>;
}

/// Monotonic milliseconds
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> u64;
}

/// Clock on tokio's timer, so paused-time tests advance it
#[derive(Debug, Clone)]
pub struct TokioClock {
    start: tokio::time::Instant,
}

impl TokioClock {
    pub fn new() -> Self {
        Self {
            start: tokio::time::Instant::now(),
        }
    }
}

impl Default for TokioClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for TokioClock {
    fn now_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }
}

// ============================================================================
// COMMANDS
// ============================================================================

/// Inputs accepted by the processing loop
#[derive(Debug)]
pub enum NodeCommand {
    /// A mesh packet read from a participating interface
    Packet {
        payload: Vec<u8>,
        sender: LinkAddr,
        iface: IfaceId,
    },
    /// A frame read from the local virtual interface
    LocalFrame(Vec<u8>),
    /// Request table sizes
    GetSummary { reply: mpsc::Sender<EngineSummary> },
    /// Flush all routes and stop
    Shutdown,
}

/// Cloneable handle used by I/O threads to feed the node
#[derive(Clone)]
pub struct NodeHandle {
    command_tx: mpsc::Sender<NodeCommand>,
    routes: RouteTable,
}

impl NodeHandle {
    pub async fn packet_received(
        &self,
        payload: Vec<u8>,
        sender: LinkAddr,
        iface: IfaceId,
    ) -> Result<(), MeshError> {
        self.send(NodeCommand::Packet {
            payload,
            sender,
            iface,
        })
        .await
    }

    pub async fn local_frame(&self, frame: Vec<u8>) -> Result<(), MeshError> {
        self.send(NodeCommand::LocalFrame(frame)).await
    }

    pub async fn summary(&self) -> Result<EngineSummary, MeshError> {
        let (reply_tx, mut reply_rx) = mpsc::channel(1);
        self.send(NodeCommand::GetSummary { reply: reply_tx }).await?;
        reply_rx.recv().await.ok_or(MeshError::NodeStopped)
    }

    pub async fn shutdown(&self) -> Result<(), MeshError> {
        self.send(NodeCommand::Shutdown).await
    }

    /// Installed routes, readable from any thread
    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }

    async fn send(&self, command: NodeCommand) -> Result<(), MeshError> {
        self.command_tx
            .send(command)
            .await
            .map_err(|_| MeshError::NodeStopped)
    }
}

// ============================================================================
// NODE
// ============================================================================

pub struct MeshNode<L: LinkIo> {
    engine: MeshEngine,
    io: Arc<L>,
    clock: Arc<dyn Clock>,
    command_rx: mpsc::Receiver<NodeCommand>,
}

impl<L: LinkIo + 'static> MeshNode<L> {
    /// Build the engine over the interfaces reported by `io`
    pub fn new(
        config: EngineConfig,
        io: Arc<L>,
        clock: Arc<dyn Clock>,
    ) -> Result<(Self, NodeHandle), MeshError> {
        let routes = RouteTable::new();
        let engine = MeshEngine::new(config, io.local_interfaces(), Arc::new(routes.clone()))?;
        let (command_tx, command_rx) = mpsc::channel(256);

        let node = Self {
            engine,
            io,
            clock,
            command_rx,
        };
        let handle = NodeHandle { command_tx, routes };
        Ok((node, handle))
    }

    /// Build and spawn the node on the current tokio runtime
    pub fn spawn(
        config: EngineConfig,
        io: Arc<L>,
        clock: Arc<dyn Clock>,
    ) -> Result<(NodeHandle, tokio::task::JoinHandle<EngineSummary>), MeshError> {
        let (node, handle) = Self::new(config, io, clock)?;
        Ok((handle, tokio::spawn(node.run())))
    }

    /// Run until shutdown is requested or every handle is dropped.
    /// Returns the table sizes after the final flush.
    pub async fn run(mut self) -> EngineSummary {
        self.engine.start(self.clock.now_ms());
        info!(
            "Mesh node started on {} interface(s)",
            self.engine.interfaces().len()
        );

        loop {
            let now = self.clock.now_ms();
            let wait = self
                .engine
                .next_deadline()
                .map(|due| due.saturating_sub(now))
                .unwrap_or(self.engine.config().sweep_interval_ms);

            tokio::select! {
                command = self.command_rx.recv() => {
                    match command {
                        Some(NodeCommand::Packet { payload, sender, iface }) => {
                            let outcome = self.engine.handle_packet(
                                &payload,
                                sender,
                                iface,
                                self.clock.now_ms(),
                            );
                            debug!("Packet from {} on {}: {:?}", sender, iface, outcome);
                        }
                        Some(NodeCommand::LocalFrame(frame)) => {
                            let outcome = self.engine.handle_local_frame(&frame, self.clock.now_ms());
                            debug!("Local frame: {:?}", outcome);
                        }
                        Some(NodeCommand::GetSummary { reply }) => {
                            let _ = reply.send(self.engine.summary()).await;
                        }
                        Some(NodeCommand::Shutdown) | None => break,
                    }
                }
                _ = tokio::time::sleep(Duration::from_millis(wait)) => {}
            }

            self.engine.poll(self.clock.now_ms());
            self.flush().await;
        }

        self.engine.shutdown(self.clock.now_ms());
        self.flush().await;
        let summary = self.engine.summary();
        info!("Mesh node stopped: {:?}", summary);
        summary
    }

    /// Carry out queued transmissions and deliveries. Failures are logged
    /// and never retried.
    async fn flush(&mut self) {
        for action in self.engine.drain_actions() {
            match action {
                Action::Transmit(t) => {
                    if let Err(e) = self.io.transmit(t.iface, t.dest, &t.payload).await {
                        warn!("Transmit on {} to {} failed: {}", t.iface, t.dest, e);
                    }
                }
                Action::Deliver(frame) => {
                    if let Err(e) = self.io.deliver_local(&frame).await {
                        warn!("Local delivery failed: {}", e);
                    }
                }
            }
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
