use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use serde::Serialize;

use crate::logger::{
    ConnectionInfo, ConnectionLogger, FlowInfo, FlowLogger, LinkInfo, LinkLogger, LogInterval, LogSettings,
    LoggerFactory, NodeInfo, NodeLogger,
};
use crate::{ConnectionId, FlowId, LinkId, NodeId};

/// Everything recorded during a run, keyed by entity id.
#[derive(Clone, Debug, Default, Serialize)]
pub struct MemoryLog {
    pub node_num_active_flows: BTreeMap<NodeId, Vec<LogInterval<usize>>>,
    pub node_info: BTreeMap<NodeId, NodeInfo>,
    pub link_utilization: BTreeMap<LinkId, Vec<LogInterval<f64>>>,
    pub link_num_active_flows: BTreeMap<LinkId, Vec<LogInterval<usize>>>,
    pub link_info: BTreeMap<LinkId, LinkInfo>,
    pub flow_bandwidth: BTreeMap<FlowId, Vec<LogInterval<f64>>>,
    pub flow_info: BTreeMap<FlowId, FlowInfo>,
    pub connection_bandwidth: BTreeMap<ConnectionId, Vec<LogInterval<f64>>>,
    pub connection_info: BTreeMap<ConnectionId, ConnectionInfo>,
    pub closed: bool,
}

impl MemoryLog {
    /// Serializes the whole log as JSON.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

struct MemoryLogger {
    id: usize,
    log: Rc<RefCell<MemoryLog>>,
}

impl NodeLogger for MemoryLogger {
    fn save_num_active_flows(&mut self, interval: LogInterval<usize>) {
        self.log
            .borrow_mut()
            .node_num_active_flows
            .entry(self.id)
            .or_default()
            .push(interval);
    }

    fn save_info(&mut self, info: NodeInfo) {
        self.log.borrow_mut().node_info.insert(self.id, info);
    }
}

impl LinkLogger for MemoryLogger {
    fn save_utilization(&mut self, interval: LogInterval<f64>) {
        self.log
            .borrow_mut()
            .link_utilization
            .entry(self.id)
            .or_default()
            .push(interval);
    }

    fn save_num_active_flows(&mut self, interval: LogInterval<usize>) {
        self.log
            .borrow_mut()
            .link_num_active_flows
            .entry(self.id)
            .or_default()
            .push(interval);
    }

    fn save_info(&mut self, info: LinkInfo) {
        self.log.borrow_mut().link_info.insert(self.id, info);
    }
}

impl FlowLogger for MemoryLogger {
    fn save_bandwidth(&mut self, interval: LogInterval<f64>) {
        self.log.borrow_mut().flow_bandwidth.entry(self.id).or_default().push(interval);
    }

    fn save_info(&mut self, info: FlowInfo) {
        self.log.borrow_mut().flow_info.insert(self.id, info);
    }
}

impl ConnectionLogger for MemoryLogger {
    fn save_bandwidth(&mut self, interval: LogInterval<f64>) {
        self.log
            .borrow_mut()
            .connection_bandwidth
            .entry(self.id)
            .or_default()
            .push(interval);
    }

    fn save_info(&mut self, info: ConnectionInfo) {
        self.log.borrow_mut().connection_info.insert(self.id, info);
    }
}

/// Factory whose sinks write into a shared [`MemoryLog`].
///
/// Keep the handle returned by [`log`](Self::log) to inspect the records after the run.
pub struct MemoryLoggerFactory {
    log: Rc<RefCell<MemoryLog>>,
    settings: LogSettings,
}

impl Default for MemoryLoggerFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryLoggerFactory {
    pub fn new() -> Self {
        Self {
            log: Rc::new(RefCell::new(MemoryLog::default())),
            settings: LogSettings::all(),
        }
    }

    pub fn with_settings(mut self, settings: LogSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn log(&self) -> Rc<RefCell<MemoryLog>> {
        self.log.clone()
    }

    fn logger(&self, id: usize) -> Box<MemoryLogger> {
        Box::new(MemoryLogger {
            id,
            log: self.log.clone(),
        })
    }
}

impl LoggerFactory for MemoryLoggerFactory {
    fn create_node_logger(&mut self, node: NodeId) -> Box<dyn NodeLogger> {
        self.logger(node)
    }

    fn create_link_logger(&mut self, link: LinkId) -> Box<dyn LinkLogger> {
        self.logger(link)
    }

    fn create_flow_logger(&mut self, flow: FlowId) -> Box<dyn FlowLogger> {
        self.logger(flow)
    }

    fn create_connection_logger(&mut self, connection: ConnectionId) -> Box<dyn ConnectionLogger> {
        self.logger(connection)
    }

    fn settings(&self) -> LogSettings {
        self.settings
    }

    fn close(&mut self) {
        self.log.borrow_mut().closed = true;
    }
}
