//! Routing strategies that start the flows of a freshly activated connection.

use rand::prelude::*;
use rand_pcg::Pcg64;
use rustc_hash::FxHashMap;

use flowsim_core::{log_debug, AcyclicPath, ConnectionId, LinkId, Network, NodeId, SimError, Simulator};

use crate::shortest_paths::{ecmp_next_hops, hop_distances, ksp_paths};
use crate::utility::convert_to_acyclic;

/// Decides along which paths a connection sends its data.
pub trait RoutingStrategy {
    /// Adds the initial flows of an active connection.
    fn assign_start_flows(&mut self, sim: &mut Simulator, connection: ConnectionId) -> Result<(), SimError>;
}

/// Routing that sends every connection over exactly one path.
pub trait SinglePathRoutingStrategy {
    /// Chooses the path of a connection from `src` to `dst`.
    fn assign_single_path(&mut self, network: &Network, src: NodeId, dst: NodeId) -> Result<AcyclicPath, SimError>;
}

fn start_single_path_flow<S: SinglePathRoutingStrategy>(
    strategy: &mut S,
    sim: &mut Simulator,
    connection: ConnectionId,
) -> Result<(), SimError> {
    let (src, dst) = endpoints(sim, connection)?;
    let path = strategy.assign_single_path(sim.network(), src, dst)?;
    log_debug!(sim, "routed connection {} over {:?}", connection, path.links());
    sim.add_flow_to_connection(connection, path)?;
    Ok(())
}

fn endpoints(sim: &Simulator, connection: ConnectionId) -> Result<(NodeId, NodeId), SimError> {
    let connection = sim.connection(connection)?;
    Ok((connection.src(), connection.dst()))
}

// Void ----------------------------------------------------------------------------------------------------------------

/// Starts no flows, leaving routing to the aftermath.
#[derive(Default)]
pub struct VoidRoutingStrategy {}

impl RoutingStrategy for VoidRoutingStrategy {
    fn assign_start_flows(&mut self, _sim: &mut Simulator, _connection: ConnectionId) -> Result<(), SimError> {
        Ok(())
    }
}

// ECMP ----------------------------------------------------------------------------------------------------------------

/// Single-path equal-cost multi-path routing by hop count.
///
/// The path is built hop by hop, each time picking uniformly at random among the outgoing links
/// that lie on a shortest path to the destination. Routing tables are computed once from the
/// network given to [`new`](Self::new).
pub struct EcmpRoutingStrategy {
    next_hops: FxHashMap<(NodeId, NodeId), Vec<LinkId>>,
    rand: Pcg64,
}

impl EcmpRoutingStrategy {
    pub fn new(network: &Network, seed: u64) -> Self {
        let distances = hop_distances(network);
        let next_hops = ecmp_next_hops(network, &distances);
        log::debug!(
            target: flowsim_core::log::LOG_TARGET,
            "ecmp tables computed for {} node pairs",
            next_hops.len()
        );
        Self {
            next_hops,
            rand: Pcg64::seed_from_u64(seed),
        }
    }

    /// Links on shortest paths from `node` towards `dst`.
    pub fn next_hops(&self, node: NodeId, dst: NodeId) -> &[LinkId] {
        self.next_hops.get(&(node, dst)).map_or(&[], |hops| hops.as_slice())
    }

}

impl SinglePathRoutingStrategy for EcmpRoutingStrategy {
    fn assign_single_path(&mut self, network: &Network, src: NodeId, dst: NodeId) -> Result<AcyclicPath, SimError> {
        let mut path = AcyclicPath::new();
        let mut current = src;
        while current != dst {
            let hops = self.next_hops.get(&(current, dst)).ok_or(SimError::NoRoute { src, dst })?;
            let hop = network.link(hops[self.rand.gen_range(0..hops.len())])?;
            path.push(hop)?;
            current = hop.to();
        }
        Ok(path)
    }
}

impl RoutingStrategy for EcmpRoutingStrategy {
    fn assign_start_flows(&mut self, sim: &mut Simulator, connection: ConnectionId) -> Result<(), SimError> {
        start_single_path_flow(self, sim, connection)
    }
}

// Explicit paths ------------------------------------------------------------------------------------------------------

/// Starts one flow per path registered for the connection's endpoints.
#[derive(Default)]
pub struct ExplicitPathsRoutingStrategy {
    paths: FxHashMap<(NodeId, NodeId), Vec<Vec<LinkId>>>,
}

impl ExplicitPathsRoutingStrategy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a path given as link ids for connections from `src` to `dst`.
    pub fn add_path(&mut self, src: NodeId, dst: NodeId, links: Vec<LinkId>) {
        self.paths.entry((src, dst)).or_default().push(links);
    }

    pub fn paths(&self, src: NodeId, dst: NodeId) -> &[Vec<LinkId>] {
        self.paths.get(&(src, dst)).map_or(&[], |paths| paths.as_slice())
    }
}

impl RoutingStrategy for ExplicitPathsRoutingStrategy {
    fn assign_start_flows(&mut self, sim: &mut Simulator, connection: ConnectionId) -> Result<(), SimError> {
        let (src, dst) = endpoints(sim, connection)?;
        let paths = self.paths(src, dst);
        if paths.is_empty() {
            return Err(SimError::NoRoute { src, dst });
        }
        for links in paths {
            let path = path_from_links(sim.network(), links)?;
            sim.add_flow_to_connection(connection, path)?;
        }
        Ok(())
    }
}

// K-shortest paths ----------------------------------------------------------------------------------------------------

fn path_from_links(network: &Network, links: &[LinkId]) -> Result<AcyclicPath, SimError> {
    AcyclicPath::from_links(links.iter().map(|link| network.link(*link)).collect::<Result<Vec<_>, _>>()?)
}

/// Single-path routing that picks uniformly at random among the `k` shortest loopless paths
/// between the endpoints.
///
/// Paths are computed once, for every pair of nodes, from the network given to
/// [`new`](Self::new).
pub struct KspRoutingStrategy {
    paths: FxHashMap<(NodeId, NodeId), Vec<Vec<LinkId>>>,
    rand: Pcg64,
}

impl KspRoutingStrategy {
    pub fn new(network: &Network, k: usize, seed: u64) -> Result<Self, SimError> {
        let paths = ksp_paths(network, k)?;
        log::debug!(
            target: flowsim_core::log::LOG_TARGET,
            "k-shortest paths (k = {}) computed for {} node pairs",
            k,
            paths.len()
        );
        Ok(Self {
            paths,
            rand: Pcg64::seed_from_u64(seed),
        })
    }

    /// Candidate paths from `src` to `dst`, shortest first.
    pub fn paths(&self, src: NodeId, dst: NodeId) -> &[Vec<LinkId>] {
        self.paths.get(&(src, dst)).map_or(&[], |paths| paths.as_slice())
    }
}

impl SinglePathRoutingStrategy for KspRoutingStrategy {
    fn assign_single_path(&mut self, network: &Network, src: NodeId, dst: NodeId) -> Result<AcyclicPath, SimError> {
        let paths = self.paths.get(&(src, dst)).ok_or(SimError::NoRoute { src, dst })?;
        let chosen = &paths[self.rand.gen_range(0..paths.len())];
        path_from_links(network, chosen)
    }
}

impl RoutingStrategy for KspRoutingStrategy {
    fn assign_start_flows(&mut self, sim: &mut Simulator, connection: ConnectionId) -> Result<(), SimError> {
        start_single_path_flow(self, sim, connection)
    }
}

/// Multi-path routing that starts one flow on each of the `k` shortest loopless paths.
pub struct KspMultiPathRoutingStrategy {
    paths: ExplicitPathsRoutingStrategy,
}

impl KspMultiPathRoutingStrategy {
    pub fn new(network: &Network, k: usize) -> Result<Self, SimError> {
        let mut paths = ExplicitPathsRoutingStrategy::new();
        for ((src, dst), found) in ksp_paths(network, k)? {
            for links in found {
                paths.add_path(src, dst, links);
            }
        }
        Ok(Self { paths })
    }

    pub fn paths(&self, src: NodeId, dst: NodeId) -> &[Vec<LinkId>] {
        self.paths.paths(src, dst)
    }
}

impl RoutingStrategy for KspMultiPathRoutingStrategy {
    fn assign_start_flows(&mut self, sim: &mut Simulator, connection: ConnectionId) -> Result<(), SimError> {
        self.paths.assign_start_flows(sim, connection)
    }
}

// Valiant -------------------------------------------------------------------------------------------------------------

/// Single-path routing through a random intermediate node.
///
/// The walk follows ECMP next hops to a valiant node chosen uniformly at random, then ECMP next
/// hops to the destination. Cycles of the walk are cut out. A connection whose endpoints coincide
/// with the chosen node simply takes the ECMP route.
pub struct ValiantRoutingStrategy {
    valiant_nodes: Vec<NodeId>,
    avoid_endpoints: bool,
    next_hops: FxHashMap<(NodeId, NodeId), Vec<LinkId>>,
    rand: Pcg64,
}

impl ValiantRoutingStrategy {
    /// With `avoid_endpoints` set, the valiant node is never the source or destination of the
    /// connection.
    pub fn new(
        network: &Network,
        valiant_nodes: Vec<NodeId>,
        avoid_endpoints: bool,
        seed: u64,
    ) -> Result<Self, SimError> {
        for node in valiant_nodes.iter() {
            network.check_node(*node)?;
        }
        let next_hops = ecmp_next_hops(network, &hop_distances(network));
        Ok(Self {
            valiant_nodes,
            avoid_endpoints,
            next_hops,
            rand: Pcg64::seed_from_u64(seed),
        })
    }

    fn choose_valiant_node(&mut self, src: NodeId, dst: NodeId) -> Option<NodeId> {
        let candidates: Vec<NodeId> = self
            .valiant_nodes
            .iter()
            .copied()
            .filter(|node| !self.avoid_endpoints || (*node != src && *node != dst))
            .collect();
        if candidates.is_empty() {
            return None;
        }
        Some(candidates[self.rand.gen_range(0..candidates.len())])
    }
}

impl SinglePathRoutingStrategy for ValiantRoutingStrategy {
    fn assign_single_path(&mut self, network: &Network, src: NodeId, dst: NodeId) -> Result<AcyclicPath, SimError> {
        let via = self.choose_valiant_node(src, dst).ok_or(SimError::NoRoute { src, dst })?;
        let mut passed_via = via == src;
        let mut walk = Vec::new();
        let mut current = src;
        while current != dst {
            let towards = if passed_via { dst } else { via };
            let hops = self
                .next_hops
                .get(&(current, towards))
                .ok_or(SimError::NoRoute { src, dst })?;
            let hop = network.link(hops[self.rand.gen_range(0..hops.len())])?;
            walk.push(hop.id());
            current = hop.to();
            if current == via {
                passed_via = true;
            }
        }
        convert_to_acyclic(network, &walk)
    }
}

impl RoutingStrategy for ValiantRoutingStrategy {
    fn assign_start_flows(&mut self, sim: &mut Simulator, connection: ConnectionId) -> Result<(), SimError> {
        start_single_path_flow(self, sim, connection)
    }
}
