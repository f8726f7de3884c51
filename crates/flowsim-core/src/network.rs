//! Network: nodes, links and the flows currently routed over them.

use std::collections::{BTreeMap, BTreeSet};

use rustc_hash::FxHashMap;

use crate::config::DEFAULT_FLOW_PRECISION;
use crate::error::SimError;
use crate::flow::Flow;
use crate::link::Link;
use crate::logger::{FlowLog, LinkLog, LoggerFactory, NodeLog};
use crate::node::Node;
use crate::path::AcyclicPath;
use crate::token::OwnerToken;
use crate::{ConnectionId, FlowId, LinkId, NodeId, Time};

/// A flow that was just ended, with the bandwidth it held.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EndedFlow {
    pub id: FlowId,
    pub connection: ConnectionId,
    pub bandwidth: f64,
}

/// Directed multigraph with a fixed set of nodes.
///
/// Links can be added before the network is handed to a simulator with [`add_link`](Self::add_link).
/// During a run all mutation goes through the [`Simulator`](crate::Simulator).
pub struct Network {
    token: OwnerToken,
    nodes: Vec<Node>,
    next_link_id: LinkId,
    links: BTreeMap<LinkId, Link>,
    links_between: FxHashMap<(NodeId, NodeId), Vec<LinkId>>,
    next_flow_id: FlowId,
    active_flows: BTreeMap<FlowId, Flow>,
    flow_active_links: BTreeSet<LinkId>,
    precision: f64,
}

impl Network {
    /// Creates a network with nodes `0..num_nodes` and no links.
    pub fn new(num_nodes: usize) -> Self {
        Self {
            token: OwnerToken::fresh(),
            nodes: (0..num_nodes).map(Node::new).collect(),
            next_link_id: 0,
            links: BTreeMap::new(),
            links_between: FxHashMap::default(),
            next_flow_id: 0,
            active_flows: BTreeMap::new(),
            flow_active_links: BTreeSet::new(),
            precision: DEFAULT_FLOW_PRECISION,
        }
    }

    /// Adds a link and returns its id. Parallel links are allowed.
    pub fn add_link(&mut self, from: NodeId, to: NodeId, capacity: f64) -> Result<LinkId, SimError> {
        self.insert_link(from, to, capacity, LinkLog::detached())
    }

    // Nodes -----------------------------------------------------------------------------------

    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    pub fn node(&self, id: NodeId) -> Result<&Node, SimError> {
        self.nodes.get(id).ok_or(SimError::UnknownNode {
            node: id,
            num_nodes: self.nodes.len(),
        })
    }

    pub fn node_mut(&mut self, id: NodeId) -> Result<&mut Node, SimError> {
        let num_nodes = self.nodes.len();
        self.nodes
            .get_mut(id)
            .ok_or(SimError::UnknownNode { node: id, num_nodes })
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn check_node(&self, id: NodeId) -> Result<(), SimError> {
        self.node(id).map(|_| ())
    }

    // Links -----------------------------------------------------------------------------------

    pub fn link(&self, id: LinkId) -> Result<&Link, SimError> {
        self.links.get(&id).ok_or(SimError::UnknownLink(id))
    }

    pub fn link_mut(&mut self, id: LinkId) -> Result<&mut Link, SimError> {
        self.links.get_mut(&id).ok_or(SimError::UnknownLink(id))
    }

    /// Links present in the network, ordered by id.
    pub fn links(&self) -> impl Iterator<Item = &Link> {
        self.links.values()
    }

    pub fn num_links(&self) -> usize {
        self.links.len()
    }

    pub fn contains_link(&self, id: LinkId) -> bool {
        self.links.contains_key(&id)
    }

    /// Links going from `from` to `to`, in creation order.
    pub fn links_between(&self, from: NodeId, to: NodeId) -> &[LinkId] {
        self.links_between.get(&(from, to)).map_or(&[], |links| links.as_slice())
    }

    pub fn outgoing_links(&self, node: NodeId) -> Result<&BTreeSet<LinkId>, SimError> {
        Ok(self.node(node)?.outgoing_links())
    }

    pub fn incoming_links(&self, node: NodeId) -> Result<&BTreeSet<LinkId>, SimError> {
        Ok(self.node(node)?.incoming_links())
    }

    /// Links carrying at least one active flow.
    pub fn flow_active_links(&self) -> &BTreeSet<LinkId> {
        &self.flow_active_links
    }

    // Flows -----------------------------------------------------------------------------------

    pub fn active_flow(&self, id: FlowId) -> Result<&Flow, SimError> {
        self.active_flows.get(&id).ok_or(SimError::UnknownFlow(id))
    }

    pub(crate) fn active_flow_mut(&mut self, id: FlowId) -> Result<&mut Flow, SimError> {
        self.active_flows.get_mut(&id).ok_or(SimError::UnknownFlow(id))
    }

    pub fn active_flows(&self) -> impl Iterator<Item = &Flow> {
        self.active_flows.values()
    }

    pub fn active_flow_ids(&self) -> Vec<FlowId> {
        self.active_flows.keys().copied().collect()
    }

    pub fn num_active_flows(&self) -> usize {
        self.active_flows.len()
    }

    pub fn is_flow_active(&self, id: FlowId) -> bool {
        self.active_flows.contains_key(&id)
    }

    /// Whether the flow could be given `bandwidth` without exceeding any link on its path.
    pub fn can_allocate_flow_bandwidth(&self, id: FlowId, bandwidth: f64) -> bool {
        let Some(flow) = self.active_flows.get(&id) else {
            return false;
        };
        let fits = flow.links().iter().all(|link_id| {
            self.links
                .get(link_id)
                .map_or(false, |link| link.can_carry(flow.bandwidth(), bandwidth, self.precision))
        });
        fits && bandwidth >= 0.
    }

    pub fn precision(&self) -> f64 {
        self.precision
    }

    pub(crate) fn token(&self) -> OwnerToken {
        self.token
    }

    // Mutation by the simulator --------------------------------------------------------------

    /// Replaces every node and link tracker with one backed by `factory`.
    pub(crate) fn attach(&mut self, factory: &mut dyn LoggerFactory, precision: f64, now: Time) {
        self.precision = precision;
        let settings = factory.settings();
        for node in self.nodes.iter_mut() {
            node.log = NodeLog::new(factory.create_node_logger(node.id()), settings, now);
        }
        for link in self.links.values_mut() {
            link.log = LinkLog::new(factory.create_link_logger(link.id()), settings, precision, now);
        }
    }

    pub(crate) fn next_link_id(&self) -> LinkId {
        self.next_link_id
    }

    pub(crate) fn next_flow_id(&self) -> FlowId {
        self.next_flow_id
    }

    pub(crate) fn check_new_link(&self, from: NodeId, to: NodeId, capacity: f64) -> Result<(), SimError> {
        self.check_node(from)?;
        self.check_node(to)?;
        if from == to {
            return Err(SimError::SelfLoop(from));
        }
        if capacity.is_nan() || capacity <= 0. {
            return Err(SimError::NonPositiveCapacity(capacity));
        }
        Ok(())
    }

    pub(crate) fn insert_link(
        &mut self,
        from: NodeId,
        to: NodeId,
        capacity: f64,
        log: LinkLog,
    ) -> Result<LinkId, SimError> {
        self.check_new_link(from, to, capacity)?;
        let id = self.next_link_id;
        self.next_link_id += 1;
        self.links.insert(id, Link::new(id, from, to, capacity, self.token, log));
        self.nodes[from].add_outgoing_link(id, to);
        self.nodes[to].add_incoming_link(id, from);
        self.links_between.entry((from, to)).or_default().push(id);
        Ok(id)
    }

    /// Removes the link, ending every flow routed over it first.
    pub(crate) fn remove_link(&mut self, id: LinkId, now: Time) -> Result<Vec<EndedFlow>, SimError> {
        let flows: Vec<FlowId> = self.link(id)?.active_flows().iter().copied().collect();
        let mut ended = Vec::with_capacity(flows.len());
        for flow_id in flows {
            ended.push(self.end_flow(flow_id, now)?);
        }

        let mut link = self.links.remove(&id).ok_or(SimError::UnknownLink(id))?;
        self.nodes[link.from()].remove_outgoing_link(id, link.to());
        self.nodes[link.to()].remove_incoming_link(id, link.from());
        if let Some(parallel) = self.links_between.get_mut(&(link.from(), link.to())) {
            parallel.retain(|&other| other != id);
            if parallel.is_empty() {
                self.links_between.remove(&(link.from(), link.to()));
            }
        }
        self.flow_active_links.remove(&id);
        link.flush_log(now);
        Ok(ended)
    }

    /// Starts a flow over a path already checked against this network.
    pub(crate) fn start_flow(
        &mut self,
        connection: ConnectionId,
        path: AcyclicPath,
        log: FlowLog,
        now: Time,
    ) -> Result<FlowId, SimError> {
        let (Some(src), Some(dst)) = (path.src(), path.dst()) else {
            return Err(SimError::EmptyPath);
        };
        for link_id in path.links() {
            self.link(*link_id)?;
        }

        let id = self.next_flow_id;
        self.next_flow_id += 1;
        self.nodes[src].add_flow(id, now);
        for link_id in path.links() {
            if let Some(link) = self.links.get_mut(link_id) {
                link.add_flow(id, now);
                self.nodes[link.to()].add_flow(id, now);
            }
            self.flow_active_links.insert(*link_id);
        }
        self.active_flows.insert(id, Flow::new(id, connection, src, dst, path, log));
        Ok(id)
    }

    /// Ends an active flow, releasing its bandwidth on every link of its path.
    pub(crate) fn end_flow(&mut self, id: FlowId, now: Time) -> Result<EndedFlow, SimError> {
        let mut flow = self.active_flows.remove(&id).ok_or(SimError::UnknownFlow(id))?;
        let bandwidth = flow.bandwidth();
        self.nodes[flow.src()].remove_flow(id, now);
        for link_id in flow.links() {
            if let Some(link) = self.links.get_mut(link_id) {
                link.remove_flow(id, bandwidth, now);
                self.nodes[link.to()].remove_flow(id, now);
                if link.num_active_flows() == 0 {
                    self.flow_active_links.remove(link_id);
                }
            }
        }
        flow.set_bandwidth(0., now);
        flow.flush_log(now);
        Ok(EndedFlow {
            id,
            connection: flow.connection(),
            bandwidth,
        })
    }

    /// Ends every active flow and restarts flow numbering from zero.
    pub(crate) fn finalize_flows(&mut self, now: Time) -> Result<Vec<EndedFlow>, SimError> {
        let ids = self.active_flow_ids();
        let mut ended = Vec::with_capacity(ids.len());
        for id in ids {
            ended.push(self.end_flow(id, now)?);
        }
        self.next_flow_id = 0;
        Ok(ended)
    }

    /// Sets the bandwidth of an active flow. Returns the parent connection and the change.
    ///
    /// Values in `(-precision, 0)` are treated as zero. Nothing changes if any link of the path
    /// cannot carry the new value.
    pub(crate) fn allocate_flow_bandwidth(
        &mut self,
        id: FlowId,
        bandwidth: f64,
        now: Time,
    ) -> Result<(ConnectionId, f64), SimError> {
        let flow = self.active_flow(id)?;
        let bandwidth = if bandwidth < 0. && bandwidth > -self.precision {
            0.
        } else {
            bandwidth
        };
        if !(bandwidth >= 0.) {
            return Err(SimError::NegativeBandwidth(bandwidth));
        }
        let old = flow.bandwidth();
        for link_id in flow.links() {
            let link = self.link(*link_id)?;
            if !link.can_carry(old, bandwidth, self.precision) {
                return Err(SimError::InsufficientCapacity {
                    flow: id,
                    link: *link_id,
                    bandwidth,
                    available: link.remainder_capacity() + old,
                });
            }
        }

        let flow = self.active_flows.get_mut(&id).ok_or(SimError::UnknownFlow(id))?;
        flow.set_bandwidth(bandwidth, now);
        for link_id in flow.links() {
            if let Some(link) = self.links.get_mut(link_id) {
                link.change_allocation(old, bandwidth, now);
            }
        }
        Ok((flow.connection(), bandwidth - old))
    }

    pub(crate) fn flush_logs(&mut self, now: Time) {
        for node in self.nodes.iter_mut() {
            node.flush_log(now);
        }
        for link in self.links.values_mut() {
            link.flush_log(now);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_paths() -> Network {
        // 0 -> 1 -> 2 and a parallel 0 -> 1
        let mut network = Network::new(3);
        network.add_link(0, 1, 10.).unwrap();
        network.add_link(1, 2, 5.).unwrap();
        network.add_link(0, 1, 3.).unwrap();
        network
    }

    fn path(network: &Network, links: &[LinkId]) -> AcyclicPath {
        AcyclicPath::from_links(links.iter().map(|id| network.link(*id).unwrap())).unwrap()
    }

    #[test]
    fn test_add_link_validation() {
        let mut network = Network::new(3);
        assert!(matches!(network.add_link(0, 3, 1.), Err(SimError::UnknownNode { node: 3, .. })));
        assert_eq!(network.add_link(0, 1, 0.), Err(SimError::NonPositiveCapacity(0.)));
        assert_eq!(network.add_link(0, 1, -2.), Err(SimError::NonPositiveCapacity(-2.)));
        assert_eq!(network.add_link(1, 1, 2.), Err(SimError::SelfLoop(1)));
        assert_eq!(network.num_links(), 0);
        assert_eq!(network.add_link(0, 1, 1.), Ok(0));
    }

    #[test]
    fn test_parallel_links() {
        let network = two_paths();
        assert_eq!(network.links_between(0, 1), &[0, 2]);
        assert_eq!(network.links_between(1, 0), &[] as &[LinkId]);
        let node = network.node(0).unwrap();
        assert_eq!(node.outgoing_links_to(1), &[0, 2]);
        assert_eq!(network.node(1).unwrap().incoming_links_from(0), &[0, 2]);
        assert_eq!(node.neighbors().collect::<Vec<_>>(), vec![1]);
    }

    #[test]
    fn test_flow_registration() {
        let mut network = two_paths();
        let p = path(&network, &[2, 1]);
        let id = network.start_flow(0, p, FlowLog::detached(), 0).unwrap();
        assert_eq!(id, 0);
        assert!(network.node(0).unwrap().has_active_flow(id));
        assert!(network.node(1).unwrap().has_active_flow(id));
        assert!(network.node(2).unwrap().has_active_flow(id));
        assert_eq!(network.flow_active_links().iter().copied().collect::<Vec<_>>(), vec![1, 2]);

        network.allocate_flow_bandwidth(id, 3., 0).unwrap();
        assert_eq!(network.link(2).unwrap().remainder_capacity(), 0.);
        assert_eq!(network.link(1).unwrap().remainder_capacity(), 2.);

        let ended = network.end_flow(id, 1).unwrap();
        assert_eq!(ended.bandwidth, 3.);
        assert!(network.flow_active_links().is_empty());
        assert_eq!(network.link(2).unwrap().remainder_capacity(), 3.);
        assert!(network.node(1).unwrap().active_flows().is_empty());
        assert!(network.end_flow(id, 1).is_err());
    }

    #[test]
    fn test_allocation_is_checked_on_every_link() {
        let mut network = two_paths();
        let p = path(&network, &[0, 1]);
        let id = network.start_flow(0, p, FlowLog::detached(), 0).unwrap();
        assert!(network.can_allocate_flow_bandwidth(id, 5.));
        assert!(!network.can_allocate_flow_bandwidth(id, 5.1));
        assert!(!network.can_allocate_flow_bandwidth(id, -1.));
        let err = network.allocate_flow_bandwidth(id, 6., 0).unwrap_err();
        assert!(matches!(err, SimError::InsufficientCapacity { link: 1, .. }));
        assert_eq!(network.link(0).unwrap().remainder_capacity(), 10.);
        assert_eq!(network.active_flow(id).unwrap().bandwidth(), 0.);

        assert_eq!(network.allocate_flow_bandwidth(id, -1e-12, 0).unwrap().1, 0.);
        assert_eq!(
            network.allocate_flow_bandwidth(id, -0.5, 0),
            Err(SimError::NegativeBandwidth(-0.5))
        );
    }

    #[test]
    fn test_remainder_restored_exactly() {
        let mut network = Network::new(2);
        network.add_link(0, 1, 10.).unwrap();
        let ids: Vec<FlowId> = (0..3)
            .map(|_| {
                let p = path(&network, &[0]);
                network.start_flow(0, p, FlowLog::detached(), 0).unwrap()
            })
            .collect();
        for id in &ids {
            network.allocate_flow_bandwidth(*id, 10. / 3., 0).unwrap();
        }
        for id in &ids {
            network.allocate_flow_bandwidth(*id, 0., 0).unwrap();
        }
        assert_eq!(network.link(0).unwrap().remainder_capacity(), 10.);
    }

    #[test]
    fn test_remove_link_ends_flows() {
        let mut network = two_paths();
        let a = network.start_flow(0, path(&network, &[0, 1]), FlowLog::detached(), 0).unwrap();
        let b = network.start_flow(1, path(&network, &[2]), FlowLog::detached(), 0).unwrap();
        let ended = network.remove_link(1, 5).unwrap();
        assert_eq!(ended.iter().map(|f| f.id).collect::<Vec<_>>(), vec![a]);
        assert!(!network.contains_link(1));
        assert!(network.is_flow_active(b));
        assert!(network.node(1).unwrap().outgoing_links().is_empty());
        assert_eq!(network.flow_active_links().iter().copied().collect::<Vec<_>>(), vec![2]);
        assert_eq!(network.remove_link(1, 5), Err(SimError::UnknownLink(1)));
    }

    #[test]
    fn test_finalize_resets_numbering() {
        let mut network = two_paths();
        network.start_flow(0, path(&network, &[0]), FlowLog::detached(), 0).unwrap();
        network.start_flow(0, path(&network, &[2]), FlowLog::detached(), 0).unwrap();
        assert_eq!(network.finalize_flows(3).unwrap().len(), 2);
        assert_eq!(network.num_active_flows(), 0);
        let id = network.start_flow(0, path(&network, &[0]), FlowLog::detached(), 4).unwrap();
        assert_eq!(id, 0);
    }
}
