//! Transmission-quality mesh routing
//!
//! Every node periodically floods a small originator broadcast. Receivers
//! count which broadcasts arrive through which neighbour, combine that with
//! how many of their own broadcasts the neighbour echoed back, and keep the
//! neighbour with the best rolling quality as next hop:
//! - Window: sliding sequence-number bitmap
//! - Neighbor / Originator: per-node reachability state
//! - Quality / Route: link estimation and best-next-hop selection
//! - Scheduler: due-time ordered transmission queue
//! - Announce / Gateway: bridged hosts and uplink-capable nodes
//! - Engine: the single-writer state tying it together

pub mod address;
pub mod announce;
pub mod engine;
pub mod gateway;
pub mod neighbor;
pub mod originator;
pub mod quality;
pub mod route;
pub mod scheduler;
pub mod window;

pub use address::{IfaceId, LinkAddr, LocalInterface};
pub use announce::{HostAnnouncementEntry, HostAnnouncementTable, Owner};
pub use engine::{
    Action, DropReason, EngineSummary, FrameOutcome, MeshEngine, PacketOutcome, Transmission,
};
pub use gateway::{choose_gateway, GatewayEntry, GatewayList};
pub use neighbor::{NeighborKey, NeighborRecord, QUALITY_HISTORY};
pub use originator::{ReachabilityEntry, ReachabilityTable};
pub use quality::{LinkEstimate, LinkQualityEstimator};
pub use route::{NextHop, RouteChange, RouteObserver, RouteTable};
pub use scheduler::{ForwardingScheduler, ForwardingTask, RelayRequest};
pub use window::{SlidingWindow, WINDOW_SIZE};
