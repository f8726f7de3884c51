//! Connection: a demand to move an amount of data between two nodes.

use std::collections::BTreeSet;
use std::fmt;

use serde::Serialize;

use crate::error::SimError;
use crate::logger::{ConnectionLog, ConnectionSummary};
use crate::token::OwnerToken;
use crate::{ConnectionId, FlowId, NodeId, Time};

/// Lifecycle of a connection. Transitions only go forward.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum ConnectionStatus {
    AwaitingActivation,
    Active,
    Terminated,
}

/// A connection realized by zero or more flows.
///
/// The remainder is decreased lazily by `elapsed * total_bandwidth` whenever simulated time
/// advances, so it may end slightly below zero if completion falls between two ticks.
pub struct Connection {
    id: ConnectionId,
    simulator: OwnerToken,
    src: NodeId,
    dst: NodeId,
    total_size: f64,
    remainder: f64,
    remainder_update_threshold: f64,
    flows: BTreeSet<FlowId>,
    past_and_present_flows: Vec<FlowId>,
    total_bandwidth: f64,
    status: ConnectionStatus,
    precision: f64,
    metadata: Option<String>,
    log: Option<ConnectionLog>,
}

impl Connection {
    pub(crate) fn new(
        id: ConnectionId,
        simulator: OwnerToken,
        src: NodeId,
        dst: NodeId,
        total_size: f64,
        precision: f64,
    ) -> Result<Self, SimError> {
        if src == dst {
            return Err(SimError::SelfLoop(src));
        }
        if total_size.is_nan() || total_size <= precision {
            return Err(SimError::NonPositiveSize(total_size));
        }
        Ok(Self {
            id,
            simulator,
            src,
            dst,
            total_size,
            remainder: total_size,
            remainder_update_threshold: total_size,
            flows: BTreeSet::new(),
            past_and_present_flows: Vec::new(),
            total_bandwidth: 0.,
            status: ConnectionStatus::AwaitingActivation,
            precision,
            metadata: None,
            log: None,
        })
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn src(&self) -> NodeId {
        self.src
    }

    pub fn dst(&self) -> NodeId {
        self.dst
    }

    pub fn total_size(&self) -> f64 {
        self.total_size
    }

    /// Amount of data left to send.
    pub fn remainder(&self) -> f64 {
        self.remainder
    }

    pub fn remainder_update_threshold(&self) -> f64 {
        self.remainder_update_threshold
    }

    /// Sum of the current bandwidths of all flows.
    pub fn total_bandwidth(&self) -> f64 {
        self.total_bandwidth
    }

    pub fn status(&self) -> ConnectionStatus {
        self.status
    }

    pub fn is_active(&self) -> bool {
        self.status == ConnectionStatus::Active
    }

    /// Currently active flows.
    pub fn flows(&self) -> &BTreeSet<FlowId> {
        &self.flows
    }

    /// Every flow that was ever part of the connection, in start order.
    pub fn past_and_present_flow_ids(&self) -> &[FlowId] {
        &self.past_and_present_flows
    }

    pub fn metadata(&self) -> Option<&str> {
        self.metadata.as_deref()
    }

    pub fn set_metadata(&mut self, metadata: impl Into<String>) {
        self.metadata = Some(metadata.into());
    }

    /// Requests a wake-up once `threshold` of data is sent (counting from now).
    ///
    /// Fails if the threshold exceeds the remainder.
    pub fn set_remainder_update_threshold(&mut self, threshold: f64) -> Result<(), SimError> {
        if threshold > self.remainder {
            return Err(SimError::ThresholdAboveRemainder {
                threshold,
                remainder: self.remainder,
            });
        }
        self.remainder_update_threshold = threshold;
        Ok(())
    }

    pub fn is_remainder_update_threshold_passed(&self) -> bool {
        self.remainder_update_threshold <= self.precision
    }

    /// Simulated time until the update threshold is passed or, if it already is, until the
    /// connection completes. `Time::MAX` when the connection has no bandwidth.
    pub fn time_till_update_needed(&self) -> Time {
        if self.total_bandwidth == 0. {
            return Time::MAX;
        }
        let left = if self.remainder_update_threshold > self.precision {
            self.remainder_update_threshold
        } else {
            self.remainder
        };
        ((left - self.precision) / self.total_bandwidth).ceil().max(0.) as Time
    }

    pub(crate) fn simulator(&self) -> OwnerToken {
        self.simulator
    }

    // Mutation by the simulator --------------------------------------------------------------

    pub(crate) fn activate(&mut self, log: ConnectionLog) {
        self.status = ConnectionStatus::Active;
        self.log = Some(log);
    }

    /// Applies `elapsed` time of progress. Returns true if the connection is complete.
    pub(crate) fn reduce_remainder(&mut self, elapsed: Time) -> bool {
        let sent = elapsed as f64 * self.total_bandwidth;
        self.remainder -= sent;
        self.remainder_update_threshold -= sent;
        self.remainder <= self.precision
    }

    pub(crate) fn add_flow(&mut self, flow_id: FlowId) {
        self.flows.insert(flow_id);
        self.past_and_present_flows.push(flow_id);
    }

    pub(crate) fn remove_flow(&mut self, flow_id: FlowId, bandwidth: f64, now: Time) {
        self.flows.remove(&flow_id);
        self.adapt_bandwidth(-bandwidth, now);
    }

    pub(crate) fn adapt_bandwidth(&mut self, delta: f64, now: Time) {
        self.total_bandwidth += delta;
        if self.total_bandwidth < 0. || self.flows.is_empty() {
            self.total_bandwidth = 0.;
        }
        if let Some(log) = self.log.as_mut() {
            log.record_bandwidth(now, self.total_bandwidth);
        }
    }

    pub(crate) fn flush_log(&mut self, now: Time) {
        let summary = ConnectionSummary {
            connection_id: self.id,
            src: self.src,
            dst: self.dst,
            total_size: self.total_size,
            flow_ids: self.past_and_present_flows.clone(),
            metadata: self.metadata.clone(),
        };
        if let Some(log) = self.log.as_mut() {
            log.flush(now, summary);
        }
    }

    pub(crate) fn terminate(&mut self) {
        self.status = ConnectionStatus::Terminated;
    }
}

impl fmt::Display for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Connection#{}[ {} -> {}; size=({}/{} remaining); flows={:?} ]",
            self.id, self.src, self.dst, self.remainder, self.total_size, self.flows
        )
    }
}
