//! Flow of data along a fixed path.

use std::fmt;

use crate::logger::FlowLog;
use crate::path::AcyclicPath;
use crate::{ConnectionId, FlowId, LinkId, NodeId, Time};

/// Part of a connection routed over one acyclic path.
///
/// Flows are owned by the [`Network`](crate::Network) while active. Bandwidth is changed only
/// through [`Simulator::allocate_flow_bandwidth`](crate::Simulator::allocate_flow_bandwidth),
/// which keeps links and the parent connection consistent.
pub struct Flow {
    id: FlowId,
    connection: ConnectionId,
    src: NodeId,
    dst: NodeId,
    path: AcyclicPath,
    bandwidth: f64,
    metadata: Option<String>,
    pub(crate) log: FlowLog,
}

impl Flow {
    pub(crate) fn new(
        id: FlowId,
        connection: ConnectionId,
        src: NodeId,
        dst: NodeId,
        path: AcyclicPath,
        log: FlowLog,
    ) -> Self {
        Self {
            id,
            connection,
            src,
            dst,
            path,
            bandwidth: 0.,
            metadata: None,
            log,
        }
    }

    pub fn id(&self) -> FlowId {
        self.id
    }

    pub fn connection(&self) -> ConnectionId {
        self.connection
    }

    pub fn src(&self) -> NodeId {
        self.src
    }

    pub fn dst(&self) -> NodeId {
        self.dst
    }

    pub fn path(&self) -> &AcyclicPath {
        &self.path
    }

    pub fn links(&self) -> &[LinkId] {
        self.path.links()
    }

    pub fn bandwidth(&self) -> f64 {
        self.bandwidth
    }

    pub fn metadata(&self) -> Option<&str> {
        self.metadata.as_deref()
    }

    pub(crate) fn set_metadata(&mut self, metadata: impl Into<String>) {
        self.metadata = Some(metadata.into());
    }

    pub(crate) fn set_bandwidth(&mut self, bandwidth: f64, now: Time) {
        self.bandwidth = bandwidth;
        self.log.record_bandwidth(now, bandwidth);
    }

    pub(crate) fn flush_log(&mut self, now: Time) {
        self.log.flush(
            now,
            self.id,
            self.connection,
            self.src,
            self.dst,
            self.path.links().to_vec(),
            self.metadata.clone(),
        );
    }
}

impl fmt::Display for Flow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Flow#{}[ {} -> {}; connection={}; bw={}; path={:?} ]",
            self.id,
            self.src,
            self.dst,
            self.connection,
            self.bandwidth,
            self.path.links()
        )
    }
}
