use crate::logger::{
    ConnectionInfo, ConnectionLogger, FlowInfo, FlowLogger, LinkInfo, LinkLogger, LogInterval, LogSettings,
    LoggerFactory, NodeInfo, NodeLogger,
};
use crate::{ConnectionId, FlowId, LinkId, NodeId};

/// Sink that drops every record.
pub struct VoidLogger;

impl NodeLogger for VoidLogger {
    fn save_num_active_flows(&mut self, _interval: LogInterval<usize>) {}
    fn save_info(&mut self, _info: NodeInfo) {}
}

impl LinkLogger for VoidLogger {
    fn save_utilization(&mut self, _interval: LogInterval<f64>) {}
    fn save_num_active_flows(&mut self, _interval: LogInterval<usize>) {}
    fn save_info(&mut self, _info: LinkInfo) {}
}

impl FlowLogger for VoidLogger {
    fn save_bandwidth(&mut self, _interval: LogInterval<f64>) {}
    fn save_info(&mut self, _info: FlowInfo) {}
}

impl ConnectionLogger for VoidLogger {
    fn save_bandwidth(&mut self, _interval: LogInterval<f64>) {}
    fn save_info(&mut self, _info: ConnectionInfo) {}
}

/// Factory of [`VoidLogger`] sinks, for runs where only the final network state matters.
#[derive(Default)]
pub struct VoidLoggerFactory;

impl LoggerFactory for VoidLoggerFactory {
    fn create_node_logger(&mut self, _node: NodeId) -> Box<dyn NodeLogger> {
        Box::new(VoidLogger)
    }

    fn create_link_logger(&mut self, _link: LinkId) -> Box<dyn LinkLogger> {
        Box::new(VoidLogger)
    }

    fn create_flow_logger(&mut self, _flow: FlowId) -> Box<dyn FlowLogger> {
        Box::new(VoidLogger)
    }

    fn create_connection_logger(&mut self, _connection: ConnectionId) -> Box<dyn ConnectionLogger> {
        Box::new(VoidLogger)
    }

    fn settings(&self) -> LogSettings {
        LogSettings::none()
    }
}
