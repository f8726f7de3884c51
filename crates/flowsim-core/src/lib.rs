//! Discrete-event simulation of bandwidth allocation on a capacitated directed graph.
//!
//! A [`Network`] of nodes and links carries [`Flow`]s that realize [`Connection`]s. The
//! [`Simulator`] advances an integer clock from event to event and, after every tick, lets an
//! [`Aftermath`] (normally a bandwidth allocator) redistribute bandwidth among the active flows.

pub mod aftermath;
pub mod config;
pub mod connection;
pub mod error;
pub mod event;
pub mod flow;
pub mod link;
pub mod log;
pub mod logger;
pub mod network;
pub mod node;
pub mod path;
pub mod simulator;
mod token;

pub use colored;

pub use aftermath::{aftermath_fn, Aftermath, VoidAftermath};
pub use config::SimulatorConfig;
pub use connection::{Connection, ConnectionStatus};
pub use error::SimError;
pub use event::{Event, EventId, EventKey, EventTrigger};
pub use flow::Flow;
pub use link::Link;
pub use logger::{LogSettings, LoggerFactory, MemoryLoggerFactory, VoidLoggerFactory};
pub use network::Network;
pub use node::Node;
pub use path::AcyclicPath;
pub use simulator::{Simulator, SimulatorState};

/// Simulated time.
pub type Time = u64;
/// Node id, an index in `0..num_nodes`.
pub type NodeId = usize;
pub type LinkId = usize;
pub type FlowId = usize;
pub type ConnectionId = usize;
