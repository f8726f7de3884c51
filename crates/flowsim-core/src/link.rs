//! Network link.

use std::collections::BTreeSet;
use std::fmt;

use crate::logger::LinkLog;
use crate::token::OwnerToken;
use crate::{FlowId, LinkId, NodeId, Time};

/// A directed link with fixed capacity.
///
/// The remainder capacity is kept up to date on every bandwidth change of the flows routed over
/// the link, and is reset to exactly the capacity whenever none of them holds any bandwidth.
pub struct Link {
    id: LinkId,
    from: NodeId,
    to: NodeId,
    capacity: f64,
    remainder_capacity: f64,
    active_flows: BTreeSet<FlowId>,
    // flows with non-zero bandwidth
    num_loaded_flows: usize,
    network: OwnerToken,
    metadata: Option<String>,
    pub(crate) log: LinkLog,
}

impl Link {
    pub(crate) fn new(id: LinkId, from: NodeId, to: NodeId, capacity: f64, network: OwnerToken, log: LinkLog) -> Self {
        Self {
            id,
            from,
            to,
            capacity,
            remainder_capacity: capacity,
            active_flows: BTreeSet::new(),
            num_loaded_flows: 0,
            network,
            metadata: None,
            log,
        }
    }

    pub fn id(&self) -> LinkId {
        self.id
    }

    pub fn from(&self) -> NodeId {
        self.from
    }

    pub fn to(&self) -> NodeId {
        self.to
    }

    pub fn capacity(&self) -> f64 {
        self.capacity
    }

    /// Capacity not allocated to any flow.
    pub fn remainder_capacity(&self) -> f64 {
        self.remainder_capacity
    }

    pub fn used_capacity(&self) -> f64 {
        self.capacity - self.remainder_capacity
    }

    /// Fraction of the capacity allocated to flows.
    pub fn utilization(&self) -> f64 {
        (self.capacity - self.remainder_capacity) / self.capacity
    }

    pub fn active_flows(&self) -> &BTreeSet<FlowId> {
        &self.active_flows
    }

    pub fn num_active_flows(&self) -> usize {
        self.active_flows.len()
    }

    pub fn has_active_flow(&self, flow_id: FlowId) -> bool {
        self.active_flows.contains(&flow_id)
    }

    pub fn metadata(&self) -> Option<&str> {
        self.metadata.as_deref()
    }

    pub fn set_metadata(&mut self, metadata: impl Into<String>) {
        self.metadata = Some(metadata.into());
    }

    pub(crate) fn network(&self) -> OwnerToken {
        self.network
    }

    /// Whether a flow currently holding `current` can switch to `bandwidth` on this link.
    pub(crate) fn can_carry(&self, current: f64, bandwidth: f64, precision: f64) -> bool {
        bandwidth - (self.remainder_capacity + current) < precision
    }

    // Mutation by the network ----------------------------------------------------------------

    pub(crate) fn add_flow(&mut self, flow_id: FlowId, now: Time) {
        self.active_flows.insert(flow_id);
        self.log.record_num_active_flows(now, self.active_flows.len());
    }

    pub(crate) fn remove_flow(&mut self, flow_id: FlowId, bandwidth: f64, now: Time) {
        self.active_flows.remove(&flow_id);
        self.change_allocation(bandwidth, 0., now);
        self.log.record_num_active_flows(now, self.active_flows.len());
    }

    pub(crate) fn change_allocation(&mut self, old: f64, new: f64, now: Time) {
        self.remainder_capacity += old;
        self.remainder_capacity -= new;
        match (old > 0., new > 0.) {
            (false, true) => self.num_loaded_flows += 1,
            (true, false) => self.num_loaded_flows -= 1,
            _ => {}
        }
        if self.num_loaded_flows == 0 {
            self.remainder_capacity = self.capacity;
        }
        self.log.record_utilization(now, self.utilization());
    }

    pub(crate) fn flush_log(&mut self, now: Time) {
        self.log.flush(now, self.id, self.from, self.to, self.metadata.clone());
    }
}

impl fmt::Display for Link {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Link#{}[ {} -> {} ({}/{} left) ]",
            self.id, self.from, self.to, self.remainder_capacity, self.capacity
        )
    }
}
