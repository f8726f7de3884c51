//! Observation of node, link, flow and connection state over time.
//!
//! The engine keeps one tracker per entity ([`NodeLog`], [`LinkLog`], [`FlowLog`],
//! [`ConnectionLog`]), which compresses every reported change with an [`IntervalLog`] and
//! forwards the resulting intervals and the final summary to a sink created by the
//! [`LoggerFactory`] passed to [`Simulator::setup`](crate::Simulator::setup).

pub mod interval;
pub mod memory;
pub mod tracker;
pub mod void;

use serde::{Deserialize, Serialize};

use crate::{ConnectionId, FlowId, LinkId, NodeId, Time};

pub use interval::{IntervalLog, LogInterval};
pub use memory::{MemoryLog, MemoryLoggerFactory};
pub use tracker::{ConnectionLog, ConnectionSummary, FlowLog, LinkLog, NodeLog};
pub use void::VoidLoggerFactory;

/// Selects which records are passed to the sinks.
///
/// `*_info` flags control the final summary, the others control interval records.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogSettings {
    pub connection_info: bool,
    pub connection_bandwidth: bool,
    pub flow_info: bool,
    pub flow_bandwidth: bool,
    pub link_info: bool,
    pub link_utilization: bool,
    pub link_num_active_flows: bool,
    pub node_info: bool,
    pub node_num_active_flows: bool,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self::all()
    }
}

impl LogSettings {
    pub fn all() -> Self {
        Self {
            connection_info: true,
            connection_bandwidth: true,
            flow_info: true,
            flow_bandwidth: true,
            link_info: true,
            link_utilization: true,
            link_num_active_flows: true,
            node_info: true,
            node_num_active_flows: true,
        }
    }

    pub fn none() -> Self {
        Self {
            connection_info: false,
            connection_bandwidth: false,
            flow_info: false,
            flow_bandwidth: false,
            link_info: false,
            link_utilization: false,
            link_num_active_flows: false,
            node_info: false,
            node_num_active_flows: false,
        }
    }

    /// Keeps only the final summaries.
    pub fn info_only() -> Self {
        Self {
            connection_info: true,
            flow_info: true,
            link_info: true,
            node_info: true,
            ..Self::none()
        }
    }
}

// Summary records -----------------------------------------------------------------------------

/// Summary of a node over the whole run.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct NodeInfo {
    pub node_id: NodeId,
    pub avg_num_active_flows: f64,
    pub metadata: Option<String>,
}

/// Summary of a link over its lifetime.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct LinkInfo {
    pub link_id: LinkId,
    pub src: NodeId,
    pub dst: NodeId,
    pub start_time: Time,
    pub end_time: Time,
    pub duration: Time,
    pub avg_utilization: f64,
    pub avg_num_active_flows: f64,
    pub metadata: Option<String>,
}

/// Summary of a flow over its lifetime.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FlowInfo {
    pub flow_id: FlowId,
    pub connection_id: ConnectionId,
    pub src: NodeId,
    pub dst: NodeId,
    pub path: Vec<LinkId>,
    pub start_time: Time,
    pub end_time: Time,
    pub duration: Time,
    pub total_transmitted: f64,
    pub avg_bandwidth: f64,
    pub metadata: Option<String>,
}

/// Summary of a connection over its lifetime.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ConnectionInfo {
    pub connection_id: ConnectionId,
    pub src: NodeId,
    pub dst: NodeId,
    pub total_size: f64,
    pub transmitted: f64,
    pub flow_ids: Vec<FlowId>,
    pub start_time: Time,
    pub end_time: Time,
    pub duration: Time,
    pub avg_bandwidth: f64,
    pub finished: bool,
    pub metadata: Option<String>,
}

// Sinks ---------------------------------------------------------------------------------------

/// Receives the records of one node.
pub trait NodeLogger {
    fn save_num_active_flows(&mut self, interval: LogInterval<usize>);
    fn save_info(&mut self, info: NodeInfo);
}

/// Receives the records of one link.
pub trait LinkLogger {
    fn save_utilization(&mut self, interval: LogInterval<f64>);
    fn save_num_active_flows(&mut self, interval: LogInterval<usize>);
    fn save_info(&mut self, info: LinkInfo);
}

/// Receives the records of one flow.
pub trait FlowLogger {
    fn save_bandwidth(&mut self, interval: LogInterval<f64>);
    fn save_info(&mut self, info: FlowInfo);
}

/// Receives the records of one connection.
pub trait ConnectionLogger {
    fn save_bandwidth(&mut self, interval: LogInterval<f64>);
    fn save_info(&mut self, info: ConnectionInfo);
}

/// Creates the sinks of every entity taking part in a run.
pub trait LoggerFactory {
    fn create_node_logger(&mut self, node: NodeId) -> Box<dyn NodeLogger>;
    fn create_link_logger(&mut self, link: LinkId) -> Box<dyn LinkLogger>;
    fn create_flow_logger(&mut self, flow: FlowId) -> Box<dyn FlowLogger>;
    fn create_connection_logger(&mut self, connection: ConnectionId) -> Box<dyn ConnectionLogger>;

    /// Which records are forwarded to the sinks.
    fn settings(&self) -> LogSettings {
        LogSettings::default()
    }

    /// Called once at the end of the run, after every sink received its summary.
    fn close(&mut self) {}
}
