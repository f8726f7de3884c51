//! Network node.

use std::collections::{BTreeMap, BTreeSet};

use crate::logger::NodeLog;
use crate::{FlowId, LinkId, NodeId, Time};

/// A node in the network.
///
/// Nodes are created together with the network and live as long as it does.
pub struct Node {
    id: NodeId,
    outgoing_links: BTreeSet<LinkId>,
    incoming_links: BTreeSet<LinkId>,
    outgoing_links_to: BTreeMap<NodeId, Vec<LinkId>>,
    incoming_links_from: BTreeMap<NodeId, Vec<LinkId>>,
    active_flows: BTreeSet<FlowId>,
    metadata: Option<String>,
    pub(crate) log: NodeLog,
}

impl Node {
    pub(crate) fn new(id: NodeId) -> Self {
        Self {
            id,
            outgoing_links: BTreeSet::new(),
            incoming_links: BTreeSet::new(),
            outgoing_links_to: BTreeMap::new(),
            incoming_links_from: BTreeMap::new(),
            active_flows: BTreeSet::new(),
            metadata: None,
            log: NodeLog::detached(),
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn outgoing_links(&self) -> &BTreeSet<LinkId> {
        &self.outgoing_links
    }

    pub fn incoming_links(&self) -> &BTreeSet<LinkId> {
        &self.incoming_links
    }

    /// Links going from this node to `to`, in creation order.
    pub fn outgoing_links_to(&self, to: NodeId) -> &[LinkId] {
        self.outgoing_links_to.get(&to).map_or(&[], |links| links.as_slice())
    }

    /// Links coming into this node from `from`, in creation order.
    pub fn incoming_links_from(&self, from: NodeId) -> &[LinkId] {
        self.incoming_links_from.get(&from).map_or(&[], |links| links.as_slice())
    }

    /// Nodes reachable over one outgoing link.
    pub fn neighbors(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.outgoing_links_to.keys().copied()
    }

    /// Flows that start at this node or pass through it.
    pub fn active_flows(&self) -> &BTreeSet<FlowId> {
        &self.active_flows
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

    // Mutation by the network ----------------------------------------------------------------

    pub(crate) fn add_outgoing_link(&mut self, link_id: LinkId, to: NodeId) {
        self.outgoing_links.insert(link_id);
        self.outgoing_links_to.entry(to).or_default().push(link_id);
    }

    pub(crate) fn add_incoming_link(&mut self, link_id: LinkId, from: NodeId) {
        self.incoming_links.insert(link_id);
        self.incoming_links_from.entry(from).or_default().push(link_id);
    }

    pub(crate) fn remove_outgoing_link(&mut self, link_id: LinkId, to: NodeId) {
        self.outgoing_links.remove(&link_id);
        remove_from_index(&mut self.outgoing_links_to, to, link_id);
    }

    pub(crate) fn remove_incoming_link(&mut self, link_id: LinkId, from: NodeId) {
        self.incoming_links.remove(&link_id);
        remove_from_index(&mut self.incoming_links_from, from, link_id);
    }

    pub(crate) fn add_flow(&mut self, flow_id: FlowId, now: Time) {
        self.active_flows.insert(flow_id);
        self.log.record_num_active_flows(now, self.active_flows.len());
    }

    pub(crate) fn remove_flow(&mut self, flow_id: FlowId, now: Time) {
        self.active_flows.remove(&flow_id);
        self.log.record_num_active_flows(now, self.active_flows.len());
    }

    pub(crate) fn flush_log(&mut self, now: Time) {
        self.log.flush(now, self.id, self.metadata.clone());
    }
}

fn remove_from_index(index: &mut BTreeMap<NodeId, Vec<LinkId>>, node: NodeId, link_id: LinkId) {
    if let Some(links) = index.get_mut(&node) {
        links.retain(|&id| id != link_id);
        if links.is_empty() {
            index.remove(&node);
        }
    }
}
