// TQMesh Core: transmission-quality mesh routing
//
// Nodes flood small originator broadcasts, count which of them arrive through
// which neighbour and route every destination through the neighbour with the
// best rolling quality. Bridged Ethernet frames ride on top of those routes.

pub mod config;
pub mod node;
pub mod routing;
pub mod wire;

use thiserror::Error;

pub use config::{ConfigError, EngineConfig};
pub use node::{Clock, LinkIo, MeshNode, NodeHandle, TokioClock, TransportError};
pub use routing::{
    Action, EngineSummary, FrameOutcome, IfaceId, LinkAddr, LocalInterface, MeshEngine,
    NextHop, PacketOutcome, RouteObserver, RouteTable,
};
pub use wire::{MeshPacket, WireError};

// ============================================================================
// ERROR TYPES
// ============================================================================

#[derive(Debug, Error)]
pub enum MeshError {
    #[error("No participating interfaces")]
    NoInterfaces,

    #[error("Interface {name} has id {got}, expected {expected}")]
    InterfaceIndex {
        name: String,
        expected: usize,
        got: usize,
    },

    #[error("Initial table allocation failed: {0}")]
    Allocation(String),

    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Mesh node is not running")]
    NodeStopped,
}

// ============================================================================
// LOGGING
// ============================================================================

/// Install a fmt subscriber filtered by `RUST_LOG` (default `info`).
/// Safe to call more than once; later calls are no-ops.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .try_init();
}
