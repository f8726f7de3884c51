//! Error type shared by the whole simulator.

use thiserror::Error;

use crate::connection::ConnectionStatus;
use crate::simulator::SimulatorState;
use crate::{ConnectionId, EventId, FlowId, LinkId, NodeId, Time};

/// Failure of a simulator, network or graph model operation.
///
/// Every variant is a hard stop for the call that produced it: nothing was mutated.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SimError {
    #[error("node {node} does not exist (network has {num_nodes} nodes)")]
    UnknownNode { node: NodeId, num_nodes: usize },
    #[error("link capacity must be positive, got {0}")]
    NonPositiveCapacity(f64),
    #[error("source and destination must differ (both are node {0})")]
    SelfLoop(NodeId),
    #[error("connection size must exceed the flow precision, got {0}")]
    NonPositiveSize(f64),
    #[error("link {link} starts at node {from} but the path ends at node {path_end}")]
    DiscontinuousPath { link: LinkId, from: NodeId, path_end: NodeId },
    #[error("link {link} would revisit node {node}")]
    CyclicPath { link: LinkId, node: NodeId },
    #[error("link {0} belongs to a different network")]
    ForeignNetwork(LinkId),
    #[error("object was created by a different simulator")]
    ForeignSimulator,
    #[error("path has no links")]
    EmptyPath,
    #[error("path goes {path_src} -> {path_dst} but connection goes {src} -> {dst}")]
    PathEndpointMismatch {
        path_src: NodeId,
        path_dst: NodeId,
        src: NodeId,
        dst: NodeId,
    },
    #[error("link {0} is not present in the network")]
    UnknownLink(LinkId),
    #[error("flow {0} is not active")]
    UnknownFlow(FlowId),
    #[error("connection {0} does not exist")]
    UnknownConnection(ConnectionId),
    #[error("event {0} was never inserted or was already dequeued")]
    UnknownEvent(EventId),
    #[error("{operation} is not allowed in state {state:?}")]
    IllegalState {
        operation: &'static str,
        state: SimulatorState,
    },
    #[error("connection {id} is {actual:?}, expected {expected:?}")]
    ConnectionStatus {
        id: ConnectionId,
        actual: ConnectionStatus,
        expected: ConnectionStatus,
    },
    #[error("event time {time} is not in the future (now is {now})")]
    EventNotInFuture { time: Time, now: Time },
    #[error("event {0} is not active")]
    InactiveEvent(EventId),
    #[error("flow {flow} cannot get bandwidth {bandwidth}: link {link} has only {available} available")]
    InsufficientCapacity {
        flow: FlowId,
        link: LinkId,
        bandwidth: f64,
        available: f64,
    },
    #[error("bandwidth must be non-negative, got {0}")]
    NegativeBandwidth(f64),
    #[error("flow weight must be positive and finite, got {0}")]
    NonPositiveWeight(f64),
    #[error("flow upper limit must be non-negative, got {0}")]
    NegativeUpperLimit(f64),
    #[error("threshold {threshold} exceeds the remainder {remainder}")]
    ThresholdAboveRemainder { threshold: f64, remainder: f64 },
    #[error("no route from node {src} to node {dst}")]
    NoRoute { src: NodeId, dst: NodeId },
    #[error("configuration error: {0}")]
    Config(String),
}

impl SimError {
    /// Returns true for misuse of the engine state machine or of an entity lifecycle.
    pub fn is_illegal_state(&self) -> bool {
        matches!(
            self,
            SimError::IllegalState { .. }
                | SimError::ConnectionStatus { .. }
                | SimError::InactiveEvent(_)
                | SimError::UnknownEvent(_)
        )
    }

    /// Returns true for invalid arguments, including capacity and cross-ownership violations.
    pub fn is_illegal_argument(&self) -> bool {
        !self.is_illegal_state() && !matches!(self, SimError::Config(_))
    }
}
