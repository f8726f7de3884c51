//! Hop-count shortest paths over the present links of a network.

use std::collections::{BTreeSet, VecDeque};

use rustc_hash::{FxHashMap, FxHashSet};

use flowsim_core::{LinkId, Network, NodeId, SimError};

/// Distance between nodes with no path between them.
pub const UNREACHABLE: usize = usize::MAX;

/// All-pairs hop distances computed with the Floyd–Warshall algorithm.
///
/// `distances[i][j]` is the number of links on a shortest path from `i` to `j`, or
/// [`UNREACHABLE`].
pub fn hop_distances(network: &Network) -> Vec<Vec<usize>> {
    let node_count = network.num_nodes();
    let mut distances = vec![vec![UNREACHABLE; node_count]; node_count];
    #[allow(clippy::needless_range_loop)]
    for node in 0..node_count {
        distances[node][node] = 0;
    }
    for link in network.links() {
        distances[link.from()][link.to()] = 1;
    }

    for k in 0..node_count {
        for i in 0..node_count {
            if distances[i][k] == UNREACHABLE {
                continue;
            }
            for j in 0..node_count {
                if distances[k][j] != UNREACHABLE && distances[i][k] + distances[k][j] < distances[i][j] {
                    distances[i][j] = distances[i][k] + distances[k][j];
                }
            }
        }
    }
    distances
}

/// For every pair of distinct nodes `(node, dst)` with a path between them, the outgoing links of
/// `node` that lie on some shortest path towards `dst`.
pub fn ecmp_next_hops(network: &Network, distances: &[Vec<usize>]) -> FxHashMap<(NodeId, NodeId), Vec<LinkId>> {
    let mut next_hops: FxHashMap<(NodeId, NodeId), Vec<LinkId>> = FxHashMap::default();
    for link in network.links() {
        let (node, neighbor) = (link.from(), link.to());
        for dst in 0..distances.len() {
            if dst == node || distances[neighbor][dst] == UNREACHABLE {
                continue;
            }
            if distances[node][dst] == distances[neighbor][dst] + 1 {
                next_hops.entry((node, dst)).or_default().push(link.id());
            }
        }
    }
    next_hops
}

/// Fewest-hop path from `src` to `dst` that avoids the blocked nodes and links.
///
/// Links are explored in id order, so among equally short paths the result is deterministic.
fn shortest_path_avoiding(
    network: &Network,
    src: NodeId,
    dst: NodeId,
    blocked_nodes: &FxHashSet<NodeId>,
    blocked_links: &FxHashSet<LinkId>,
) -> Result<Option<Vec<LinkId>>, SimError> {
    let mut arrived_by: FxHashMap<NodeId, LinkId> = FxHashMap::default();
    let mut seen = FxHashSet::default();
    seen.insert(src);
    let mut queue = VecDeque::from([src]);
    while let Some(node) = queue.pop_front() {
        if node == dst {
            let mut path = Vec::new();
            let mut current = dst;
            while let Some(link_id) = arrived_by.get(&current) {
                path.push(*link_id);
                current = network.link(*link_id)?.from();
            }
            path.reverse();
            return Ok(Some(path));
        }
        for link_id in network.outgoing_links(node)? {
            let to = network.link(*link_id)?.to();
            if blocked_links.contains(link_id) || blocked_nodes.contains(&to) || !seen.insert(to) {
                continue;
            }
            arrived_by.insert(to, *link_id);
            queue.push_back(to);
        }
    }
    Ok(None)
}

/// Up to `k` loopless paths from `src` to `dst` in order of increasing hop count (Yen's
/// algorithm). Paths of equal length are ordered by their link ids.
pub fn k_shortest_paths(network: &Network, src: NodeId, dst: NodeId, k: usize) -> Result<Vec<Vec<LinkId>>, SimError> {
    network.check_node(src)?;
    network.check_node(dst)?;
    let mut found: Vec<Vec<LinkId>> = Vec::new();
    if k == 0 || src == dst {
        return Ok(found);
    }
    let no_nodes = FxHashSet::default();
    let no_links = FxHashSet::default();
    match shortest_path_avoiding(network, src, dst, &no_nodes, &no_links)? {
        Some(path) => found.push(path),
        None => return Ok(found),
    }

    let mut candidates: BTreeSet<(usize, Vec<LinkId>)> = BTreeSet::new();
    while found.len() < k {
        let last = found[found.len() - 1].clone();
        let mut blocked_nodes = FxHashSet::default();
        for spur in 0..last.len() {
            let root = &last[..spur];
            let spur_node = network.link(last[spur])?.from();
            let blocked_links: FxHashSet<LinkId> = found
                .iter()
                .filter(|path| path.len() > spur && path[..spur] == *root)
                .map(|path| path[spur])
                .collect();
            if let Some(spur_path) = shortest_path_avoiding(network, spur_node, dst, &blocked_nodes, &blocked_links)? {
                let mut path = root.to_vec();
                path.extend(spur_path);
                if !found.contains(&path) {
                    candidates.insert((path.len(), path));
                }
            }
            // the root of the next spur may not pass through this node again
            blocked_nodes.insert(spur_node);
        }
        match candidates.pop_first() {
            Some((_, path)) => found.push(path),
            None => break,
        }
    }
    Ok(found)
}

/// K-shortest paths for every ordered pair of distinct connected nodes.
pub fn ksp_paths(network: &Network, k: usize) -> Result<FxHashMap<(NodeId, NodeId), Vec<Vec<LinkId>>>, SimError> {
    let mut paths = FxHashMap::default();
    for src in 0..network.num_nodes() {
        for dst in 0..network.num_nodes() {
            let found = k_shortest_paths(network, src, dst, k)?;
            if !found.is_empty() {
                paths.insert((src, dst), found);
            }
        }
    }
    Ok(paths)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn diamond() -> Network {
        let mut network = Network::new(5);
        network.add_link(0, 1, 1.).unwrap();
        network.add_link(0, 2, 1.).unwrap();
        network.add_link(1, 3, 1.).unwrap();
        network.add_link(2, 3, 1.).unwrap();
        network.add_link(3, 4, 1.).unwrap();
        network.add_link(0, 4, 1.).unwrap();
        network
    }

    #[test]
    fn test_hop_distances() {
        let distances = hop_distances(&diamond());
        assert_eq!(distances[0], vec![0, 1, 1, 2, 1]);
        assert_eq!(distances[1][4], 2);
        assert_eq!(distances[3][0], UNREACHABLE);
        assert_eq!(distances[4][4], 0);
    }

    #[test]
    fn test_ecmp_next_hops() {
        let network = diamond();
        let next_hops = ecmp_next_hops(&network, &hop_distances(&network));
        assert_eq!(next_hops[&(0, 3)], vec![0, 1]);
        assert_eq!(next_hops[&(0, 4)], vec![5]);
        assert_eq!(next_hops[&(1, 4)], vec![2]);
        assert!(!next_hops.contains_key(&(3, 0)));
        assert!(!next_hops.contains_key(&(0, 0)));
    }

    #[test]
    fn test_k_shortest_paths() {
        let network = diamond();
        assert_eq!(k_shortest_paths(&network, 0, 4, 5).unwrap(), vec![vec![5], vec![0, 2, 4], vec![1, 3, 4]]);
        assert_eq!(k_shortest_paths(&network, 0, 4, 2).unwrap(), vec![vec![5], vec![0, 2, 4]]);
        assert_eq!(k_shortest_paths(&network, 0, 3, 1).unwrap(), vec![vec![0, 2]]);
        assert!(k_shortest_paths(&network, 3, 0, 5).unwrap().is_empty());
        assert!(k_shortest_paths(&network, 0, 0, 5).unwrap().is_empty());
        assert!(k_shortest_paths(&network, 0, 4, 0).unwrap().is_empty());
        assert!(k_shortest_paths(&network, 0, 9, 1).is_err());
    }

    #[test]
    fn test_k_shortest_paths_are_loopless() {
        // 0 <-> 1 <-> 2 with a shortcut 0 -> 2
        let mut network = Network::new(3);
        network.add_link(0, 1, 1.).unwrap(); // 0
        network.add_link(1, 0, 1.).unwrap(); // 1
        network.add_link(1, 2, 1.).unwrap(); // 2
        network.add_link(2, 1, 1.).unwrap(); // 3
        network.add_link(0, 2, 1.).unwrap(); // 4
        assert_eq!(k_shortest_paths(&network, 0, 2, 10).unwrap(), vec![vec![4], vec![0, 2]]);
        assert_eq!(k_shortest_paths(&network, 2, 0, 10).unwrap(), vec![vec![3, 1]]);

        let paths = ksp_paths(&network, 10).unwrap();
        assert_eq!(paths.len(), 6);
        assert_eq!(paths[&(1, 2)], vec![vec![2], vec![1, 4]]);
    }
}
