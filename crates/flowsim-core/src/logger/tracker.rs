//! Per-entity trackers that sit between the engine and the logger sinks.

use crate::logger::void::VoidLogger;
use crate::logger::{
    ConnectionInfo, ConnectionLogger, FlowInfo, FlowLogger, IntervalLog, LinkInfo, LinkLogger, LogInterval,
    LogSettings, NodeInfo, NodeLogger,
};
use crate::{ConnectionId, FlowId, LinkId, NodeId, Time};

fn average(sum: f64, duration: Time) -> f64 {
    if duration == 0 {
        0.
    } else {
        sum / duration as f64
    }
}

// Node ----------------------------------------------------------------------------------------

/// Tracks the number of flows touching a node.
pub struct NodeLog {
    sink: Box<dyn NodeLogger>,
    settings: LogSettings,
    num_active_flows: IntervalLog<usize>,
    num_active_flows_sum: f64,
}

impl NodeLog {
    pub fn new(sink: Box<dyn NodeLogger>, settings: LogSettings, now: Time) -> Self {
        let mut log = Self {
            sink,
            settings,
            num_active_flows: IntervalLog::exact(),
            num_active_flows_sum: 0.,
        };
        log.record_num_active_flows(now, 0);
        log
    }

    /// Tracker used before the network is attached to a simulator.
    pub fn detached() -> Self {
        Self::new(Box::new(VoidLogger), LogSettings::none(), 0)
    }

    pub fn record_num_active_flows(&mut self, now: Time, num_active_flows: usize) {
        if let Some(interval) = self.num_active_flows.update(now, num_active_flows) {
            self.save_num_active_flows(interval);
        }
    }

    /// Closes the tracker at the end of the run. The average is taken over `[0, now)`.
    pub fn flush(&mut self, now: Time, node_id: NodeId, metadata: Option<String>) {
        for interval in self.num_active_flows.finish(now) {
            self.save_num_active_flows(interval);
        }
        if self.settings.node_info {
            self.sink.save_info(NodeInfo {
                node_id,
                avg_num_active_flows: average(self.num_active_flows_sum, now),
                metadata,
            });
        }
    }

    fn save_num_active_flows(&mut self, interval: LogInterval<usize>) {
        self.num_active_flows_sum += interval.duration() as f64 * interval.value as f64;
        if self.settings.node_num_active_flows {
            self.sink.save_num_active_flows(interval);
        }
    }
}

// Link ----------------------------------------------------------------------------------------

/// Tracks utilization and number of flows of a link.
pub struct LinkLog {
    sink: Box<dyn LinkLogger>,
    settings: LogSettings,
    inception: Time,
    utilization: IntervalLog<f64>,
    utilization_sum: f64,
    num_active_flows: IntervalLog<usize>,
    num_active_flows_sum: f64,
}

impl LinkLog {
    pub fn new(sink: Box<dyn LinkLogger>, settings: LogSettings, precision: f64, now: Time) -> Self {
        let mut log = Self {
            sink,
            settings,
            inception: now,
            utilization: IntervalLog::within(precision),
            utilization_sum: 0.,
            num_active_flows: IntervalLog::exact(),
            num_active_flows_sum: 0.,
        };
        log.record_utilization(now, 0.);
        log.record_num_active_flows(now, 0);
        log
    }

    pub fn detached() -> Self {
        Self::new(Box::new(VoidLogger), LogSettings::none(), f64::EPSILON, 0)
    }

    pub fn record_utilization(&mut self, now: Time, utilization: f64) {
        if let Some(interval) = self.utilization.update(now, utilization) {
            self.save_utilization(interval);
        }
    }

    pub fn record_num_active_flows(&mut self, now: Time, num_active_flows: usize) {
        if let Some(interval) = self.num_active_flows.update(now, num_active_flows) {
            self.save_num_active_flows(interval);
        }
    }

    /// Closes the tracker when the link is removed or the run ends.
    pub fn flush(&mut self, now: Time, link_id: LinkId, src: NodeId, dst: NodeId, metadata: Option<String>) {
        for interval in self.utilization.finish(now) {
            self.save_utilization(interval);
        }
        for interval in self.num_active_flows.finish(now) {
            self.save_num_active_flows(interval);
        }
        if self.settings.link_info {
            let duration = now - self.inception;
            self.sink.save_info(LinkInfo {
                link_id,
                src,
                dst,
                start_time: self.inception,
                end_time: now,
                duration,
                avg_utilization: average(self.utilization_sum, duration),
                avg_num_active_flows: average(self.num_active_flows_sum, duration),
                metadata,
            });
        }
    }

    fn save_utilization(&mut self, interval: LogInterval<f64>) {
        self.utilization_sum += interval.duration() as f64 * interval.value;
        if self.settings.link_utilization {
            self.sink.save_utilization(interval);
        }
    }

    fn save_num_active_flows(&mut self, interval: LogInterval<usize>) {
        self.num_active_flows_sum += interval.duration() as f64 * interval.value as f64;
        if self.settings.link_num_active_flows {
            self.sink.save_num_active_flows(interval);
        }
    }
}

// Flow ----------------------------------------------------------------------------------------

/// Tracks the bandwidth of a flow.
pub struct FlowLog {
    sink: Box<dyn FlowLogger>,
    settings: LogSettings,
    inception: Time,
    bandwidth: IntervalLog<f64>,
    bandwidth_sum: f64,
}

impl FlowLog {
    pub fn new(sink: Box<dyn FlowLogger>, settings: LogSettings, precision: f64, now: Time) -> Self {
        let mut log = Self {
            sink,
            settings,
            inception: now,
            bandwidth: IntervalLog::within(precision),
            bandwidth_sum: 0.,
        };
        log.record_bandwidth(now, 0.);
        log
    }

    pub fn detached() -> Self {
        Self::new(Box::new(VoidLogger), LogSettings::none(), f64::EPSILON, 0)
    }

    pub fn record_bandwidth(&mut self, now: Time, bandwidth: f64) {
        if let Some(interval) = self.bandwidth.update(now, bandwidth) {
            self.save_bandwidth(interval);
        }
    }

    /// Closes the tracker when the flow ends.
    #[allow(clippy::too_many_arguments)]
    pub fn flush(
        &mut self,
        now: Time,
        flow_id: FlowId,
        connection_id: ConnectionId,
        src: NodeId,
        dst: NodeId,
        path: Vec<LinkId>,
        metadata: Option<String>,
    ) {
        for interval in self.bandwidth.finish(now) {
            self.save_bandwidth(interval);
        }
        if self.settings.flow_info {
            let duration = now - self.inception;
            self.sink.save_info(FlowInfo {
                flow_id,
                connection_id,
                src,
                dst,
                path,
                start_time: self.inception,
                end_time: now,
                duration,
                total_transmitted: self.bandwidth_sum,
                avg_bandwidth: average(self.bandwidth_sum, duration),
                metadata,
            });
        }
    }

    fn save_bandwidth(&mut self, interval: LogInterval<f64>) {
        self.bandwidth_sum += interval.duration() as f64 * interval.value;
        if self.settings.flow_bandwidth {
            self.sink.save_bandwidth(interval);
        }
    }
}

// Connection ----------------------------------------------------------------------------------

/// Tracks the total bandwidth of a connection.
pub struct ConnectionLog {
    sink: Box<dyn ConnectionLogger>,
    settings: LogSettings,
    precision: f64,
    inception: Time,
    bandwidth: IntervalLog<f64>,
    bandwidth_sum: f64,
}

/// Static properties of a connection reported in its summary.
pub struct ConnectionSummary {
    pub connection_id: ConnectionId,
    pub src: NodeId,
    pub dst: NodeId,
    pub total_size: f64,
    pub flow_ids: Vec<FlowId>,
    pub metadata: Option<String>,
}

impl ConnectionLog {
    pub fn new(sink: Box<dyn ConnectionLogger>, settings: LogSettings, precision: f64, now: Time) -> Self {
        let mut log = Self {
            sink,
            settings,
            precision,
            inception: now,
            bandwidth: IntervalLog::within(precision),
            bandwidth_sum: 0.,
        };
        log.record_bandwidth(now, 0.);
        log
    }

    pub fn record_bandwidth(&mut self, now: Time, bandwidth: f64) {
        if let Some(interval) = self.bandwidth.update(now, bandwidth) {
            self.save_bandwidth(interval);
        }
    }

    /// Closes the tracker when the connection terminates or the run ends.
    pub fn flush(&mut self, now: Time, summary: ConnectionSummary) {
        for interval in self.bandwidth.finish(now) {
            self.save_bandwidth(interval);
        }
        if self.settings.connection_info {
            let duration = now - self.inception;
            self.sink.save_info(ConnectionInfo {
                connection_id: summary.connection_id,
                src: summary.src,
                dst: summary.dst,
                total_size: summary.total_size,
                transmitted: self.bandwidth_sum,
                flow_ids: summary.flow_ids,
                start_time: self.inception,
                end_time: now,
                duration,
                avg_bandwidth: average(self.bandwidth_sum, duration),
                finished: summary.total_size - self.bandwidth_sum <= self.precision,
                metadata: summary.metadata,
            });
        }
    }

    fn save_bandwidth(&mut self, interval: LogInterval<f64>) {
        self.bandwidth_sum += interval.duration() as f64 * interval.value;
        if self.settings.connection_bandwidth {
            self.sink.save_bandwidth(interval);
        }
    }
}
